//! Bluetooth LE source listening to one RuuviTag's broadcasts

use super::traits::{Observation, ReadingSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bluer::{
    Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty, DiscoveryFilter,
    DiscoveryTransport, Session,
};
use futures::stream::{BoxStream, Stream, StreamExt};
use futures::FutureExt;
use std::collections::HashMap;
use testdrive_shared::ruuvi::{self, DecodeError};
use tracing::{debug, info, warn};

/// Parse a MAC-style hardware identifier
pub fn parse_address(mac: &str) -> Result<Address> {
    mac.trim()
        .parse::<Address>()
        .map_err(|e| anyhow!("Invalid RuuviTag MAC {:?}: {}", mac, e))
}

/// Turn one manufacturer-data map into an observation
pub fn observation_from(
    address: Address,
    manufacturer_data: &HashMap<u16, Vec<u8>>,
    rssi: Option<i16>,
) -> Result<Observation, DecodeError> {
    let reading = ruuvi::decode_advertisement(manufacturer_data)?;
    Ok(Observation {
        source_id: address.to_string(),
        reading: reading.into(),
        rssi,
    })
}

/// Device events that had piled up since the last read
#[derive(Debug, Default, PartialEq)]
struct Backlog {
    /// Newest manufacturer data among the queued events
    latest: Option<HashMap<u16, Vec<u8>>>,
    /// Newest signal strength among the queued events
    rssi: Option<i16>,
    /// Broadcasts superseded by a newer one
    skipped: usize,
    /// The stream ended while draining
    closed: bool,
}

/// Take every event already queued without waiting, keeping only the newest.
///
/// With duplicate reporting on, the tag broadcasts faster than the reader
/// relays, so anything queued between reads is stale.
fn drain_queued<S>(events: &mut S) -> Backlog
where
    S: Stream<Item = DeviceEvent> + Unpin,
{
    let mut backlog = Backlog::default();
    loop {
        match events.next().now_or_never() {
            None => break,
            Some(None) => {
                backlog.closed = true;
                break;
            }
            Some(Some(DeviceEvent::PropertyChanged(property))) => match property {
                DeviceProperty::ManufacturerData(data) => {
                    if backlog.latest.replace(data).is_some() {
                        backlog.skipped += 1;
                    }
                }
                DeviceProperty::Rssi(rssi) => backlog.rssi = Some(rssi),
                _ => {}
            },
            #[allow(unreachable_patterns)]
            Some(Some(_)) => {}
        }
    }
    backlog
}

enum Step {
    Adapter(Option<AdapterEvent>),
    Device(Option<DeviceEvent>),
}

/// Scans for a single RuuviTag and yields every broadcast it makes.
///
/// No timeout is applied: if the tag never shows up, `next_observation`
/// waits until the caller gives up.
pub struct DeviceSource {
    _session: Session,
    adapter: Adapter,
    target: Address,
    /// Kept alive for the whole lifetime so the adapter keeps scanning
    discovery: BoxStream<'static, AdapterEvent>,
    /// Property changes of the target once it has been seen
    device_events: Option<BoxStream<'static, DeviceEvent>>,
    rssi: Option<i16>,
}

impl DeviceSource {
    /// Power up the default adapter and start an LE scan for `target`
    pub async fn open(target: Address) -> Result<Self> {
        let session = Session::new().await.context("BlueZ session unavailable")?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;

        let filter = DiscoveryFilter {
            transport: DiscoveryTransport::Le,
            duplicate_data: true,
            ..Default::default()
        };
        adapter.set_discovery_filter(filter).await?;

        let discovery = adapter.discover_devices().await?.boxed();
        info!("[SCAN] Adapter {} scanning for {}", adapter.name(), target);

        Ok(Self {
            _session: session,
            adapter,
            target,
            discovery,
            device_events: None,
            rssi: None,
        })
    }

    fn observe(&self, data: &HashMap<u16, Vec<u8>>) -> Option<Observation> {
        match observation_from(self.target, data, self.rssi) {
            Ok(observation) => Some(observation),
            Err(DecodeError::NotRuuvi) => {
                debug!("[SCAN] {} broadcast without Ruuvi data", self.target);
                None
            }
            Err(e) => {
                warn!("[SCAN] Ignoring broadcast from {}: {}", self.target, e);
                None
            }
        }
    }

    /// Subscribe to the target and return its current data, if any
    async fn attach(&mut self) -> Result<Option<Observation>> {
        let device = self.adapter.device(self.target)?;
        self.rssi = device.rssi().await?;
        self.device_events = Some(device.events().await?.boxed());
        info!("[SCAN] Found {} (rssi {:?})", self.target, self.rssi);

        Ok(device
            .manufacturer_data()
            .await?
            .and_then(|data| self.observe(&data)))
    }
}

#[async_trait]
impl ReadingSource for DeviceSource {
    async fn next_observation(&mut self) -> Result<Observation> {
        if let Some(events) = self.device_events.as_mut() {
            let backlog = drain_queued(events);
            if backlog.rssi.is_some() {
                self.rssi = backlog.rssi;
            }
            if backlog.closed {
                self.device_events = None;
            }
            if backlog.skipped > 0 {
                debug!(
                    "[SCAN] Skipped {} stale broadcast(s) from {}",
                    backlog.skipped, self.target
                );
            }
            if let Some(observation) = backlog.latest.and_then(|data| self.observe(&data)) {
                return Ok(observation);
            }
        }

        loop {
            let step = match self.device_events.as_mut() {
                Some(events) => tokio::select! {
                    event = events.next() => Step::Device(event),
                    event = self.discovery.next() => Step::Adapter(event),
                },
                None => Step::Adapter(self.discovery.next().await),
            };

            match step {
                Step::Adapter(None) => {
                    return Err(anyhow!("Bluetooth discovery stopped"));
                }
                Step::Adapter(Some(AdapterEvent::DeviceAdded(addr)))
                    if addr == self.target && self.device_events.is_none() =>
                {
                    if let Some(observation) = self.attach().await? {
                        return Ok(observation);
                    }
                }
                Step::Adapter(Some(AdapterEvent::DeviceRemoved(addr))) if addr == self.target => {
                    warn!("[SCAN] Lost {}, waiting for it to reappear", self.target);
                    self.device_events = None;
                }
                Step::Adapter(Some(_)) => {}
                Step::Device(Some(DeviceEvent::PropertyChanged(property))) => match property {
                    DeviceProperty::ManufacturerData(data) => {
                        if let Some(observation) = self.observe(&data) {
                            return Ok(observation);
                        }
                    }
                    DeviceProperty::Rssi(rssi) => self.rssi = Some(rssi),
                    _ => {}
                },
                #[allow(unreachable_patterns)]
                Step::Device(Some(_)) => {}
                Step::Device(None) => {
                    self.device_events = None;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "Bluetooth"
    }
}
