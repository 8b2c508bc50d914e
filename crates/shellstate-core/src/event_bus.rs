use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use masterror::AppError;
use shellstate_proto::snapshot::{
    audio::AudioSnapshot, battery::BatterySnapshot, bluetooth::BluetoothSnapshot,
    hypr::HyprSnapshot, media::MediaSnapshot, network::WifiSnapshot, system::SystemSnapshot,
};

/// Identifies which subsystem a snapshot event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Wifi,
    Bluetooth,
    Audio,
    Hypr,
    Battery,
    Media,
    System,
}

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SnapshotEvent {
    Wifi(WifiSnapshot),
    Bluetooth(BluetoothSnapshot),
    Audio(AudioSnapshot),
    Hypr(HyprSnapshot),
    Battery(BatterySnapshot),
    Media(MediaSnapshot),
    System(SystemSnapshot),
}

impl SnapshotEvent {
    pub fn kind(&self) -> SnapshotKind {
        match self {
            Self::Wifi(_) => SnapshotKind::Wifi,
            Self::Bluetooth(_) => SnapshotKind::Bluetooth,
            Self::Audio(_) => SnapshotKind::Audio,
            Self::Hypr(_) => SnapshotKind::Hypr,
            Self::Battery(_) => SnapshotKind::Battery,
            Self::Media(_) => SnapshotKind::Media,
            Self::System(_) => SnapshotKind::System,
        }
    }
}

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum BusEvent {
    Snapshot(SnapshotEvent),
}

#[derive(Debug)]
struct EventBusInner {
    queue: Mutex<VecDeque<BusEvent>>,
    capacity: usize,
}

impl EventBusInner {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.get())),
            capacity: capacity.get(),
        }
    }

    /// Enqueues an event. A queued snapshot for the same subsystem is
    /// replaced in place: consumers only ever need the newest state, so a
    /// slow reader never observes a backlog of superseded snapshots.
    fn push(&self, event: BusEvent) -> Result<(), EventBusError> {
        let mut queue = self.queue.lock().map_err(|_| EventBusError::Poisoned)?;

        let BusEvent::Snapshot(ref snapshot) = event;
        let kind = snapshot.kind();

        if let Some(slot) = queue.iter_mut().find(
            |queued| matches!(queued, BusEvent::Snapshot(existing) if existing.kind() == kind),
        ) {
            *slot = event;
            return Ok(());
        }

        if queue.len() >= self.capacity {
            return Err(EventBusError::QueueFull {
                capacity: self.capacity,
            });
        }

        queue.push_back(event);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum EventBusError {
    QueueFull { capacity: usize },
    Poisoned,
}

impl std::fmt::Display for EventBusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueueFull { capacity } => {
                write!(f, "Event queue is full (capacity: {})", capacity)
            }
            Self::Poisoned => write!(f, "Event queue state is poisoned"),
        }
    }
}

impl std::error::Error for EventBusError {}

impl From<EventBusError> for AppError {
    fn from(err: EventBusError) -> Self {
        AppError::internal(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl EventBus {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Arc::new(EventBusInner::new(capacity)),
        }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn publish(&self, event: BusEvent) -> Result<(), EventBusError> {
        self.inner.push(event)
    }

    pub fn drain(&self) -> Result<Vec<BusEvent>, EventBusError> {
        let mut queue = self
            .inner
            .queue
            .lock()
            .map_err(|_| EventBusError::Poisoned)?;

        Ok(queue.drain(..).collect())
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    inner: Arc<EventBusInner>,
}

impl EventSender {
    pub fn try_send(&self, event: BusEvent) -> Result<(), EventBusError> {
        self.inner.push(event)
    }
}

#[derive(Debug)]
pub struct EventReceiver {
    inner: Arc<EventBusInner>,
}

impl EventReceiver {
    pub fn try_recv(&mut self) -> Result<Option<BusEvent>, EventBusError> {
        let mut queue = self
            .inner
            .queue
            .lock()
            .map_err(|_| EventBusError::Poisoned)?;

        Ok(queue.pop_front())
    }
}
