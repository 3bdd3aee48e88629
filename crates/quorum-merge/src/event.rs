use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use quorum_types::{EntityId, FieldMap, SourceId};

/// Observational record of an accepted update.
///
/// Carries the seen counts after the update was applied. Progress events
/// never influence whether or when an entity merges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub source: SourceId,
    pub entity: EntityId,
    pub fields: FieldMap,
    pub required_seen: usize,
    pub optional_seen: usize,
}

/// The single merged record emitted for an entity.
///
/// Deliberately does not say whether the entity completed with full optional
/// data or was flushed after optional sources were exhausted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub entity: EntityId,
    pub fields: FieldMap,
}

/// Either notification shape, for consumers that want one stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    Progress(ProgressEvent),
    Merged(MergedRecord),
}

/// Consumer of engine notifications.
///
/// Called synchronously on the stack of whichever `update` or
/// `source_exhausted` call produced the notification. Both methods default
/// to no-ops so observers implement only what they need.
pub trait MergeObserver: Send {
    fn on_progress(&mut self, _event: &ProgressEvent) {}

    fn on_merged(&mut self, _record: &MergedRecord) {}
}

/// Forwards notifications onto a broadcast channel.
///
/// Sending never blocks the engine. If no receiver is listening the
/// notification is dropped; lagging receivers observe
/// `RecvError::Lagged` per tokio broadcast semantics.
pub struct ChannelObserver {
    sender: broadcast::Sender<Notification>,
    progress: bool,
}

impl ChannelObserver {
    /// Create an observer and its first receiver.
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Notification>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (
            Self {
                sender,
                progress: true,
            },
            receiver,
        )
    }

    /// Only forward merged records.
    pub fn merged_only(mut self) -> Self {
        self.progress = false;
        self
    }

    /// Additional receivers see notifications sent after they subscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<Notification> {
        self.sender.clone()
    }
}

impl MergeObserver for ChannelObserver {
    fn on_progress(&mut self, event: &ProgressEvent) {
        if self.progress {
            let _ = self.sender.send(Notification::Progress(event.clone()));
        }
    }

    fn on_merged(&mut self, record: &MergedRecord) {
        let _ = self.sender.send(Notification::Merged(record.clone()));
    }
}

/// Shared log written by a [`RecordingObserver`].
#[derive(Clone, Debug, Default)]
pub struct Recording {
    inner: Arc<Mutex<Vec<Notification>>>,
}

impl Recording {
    /// Every notification received so far, in order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn merged(&self) -> Vec<MergedRecord> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Merged(record) => Some(record),
                Notification::Progress(_) => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Progress(event) => Some(event),
                Notification::Merged(_) => None,
            })
            .collect()
    }

    fn push(&self, notification: Notification) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

/// Observer that keeps every notification, for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    recording: Recording,
}

impl RecordingObserver {
    /// Create an observer and a handle to read what it records.
    pub fn new() -> (Self, Recording) {
        let observer = Self::default();
        let recording = observer.recording.clone();
        (observer, recording)
    }
}

impl MergeObserver for RecordingObserver {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self.recording.push(Notification::Progress(event.clone()));
    }

    fn on_merged(&mut self, record: &MergedRecord) {
        self.recording.push(Notification::Merged(record.clone()));
    }
}
