use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use quorum_merge::{
    Completion, MergeEngine, MergeObserver, MergeResult, MergedRecord, RecordStore, UpdateOutcome,
};
use quorum_types::{EntityId, FieldMap, SourceId};

use crate::error::{FeedError, FeedResult};
use crate::producer::RecordSink;

/// Default queue depth between producers and the merge task.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

enum Command {
    Update {
        source: SourceId,
        id: EntityId,
        fields: FieldMap,
        respond_to: oneshot::Sender<MergeResult<UpdateOutcome>>,
    },
    Exhausted {
        source: SourceId,
        respond_to: oneshot::Sender<MergeResult<Vec<MergedRecord>>>,
    },
    Stats {
        respond_to: oneshot::Sender<ServiceStats>,
    },
    Pending {
        respond_to: oneshot::Sender<Vec<(EntityId, Completion)>>,
    },
}

/// Engine counters as seen by the merge task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub merged: u64,
    /// Entities still resident.
    pub resident: usize,
}

/// Forwards merged records out of the merge task.
///
/// Unbounded so that a slow consumer never stalls the engine or loses
/// records; the engine emits each entity at most once, which bounds it.
struct ForwardingObserver {
    merged: mpsc::UnboundedSender<MergedRecord>,
}

impl MergeObserver for ForwardingObserver {
    fn on_merged(&mut self, record: &MergedRecord) {
        let _ = self.merged.send(record.clone());
    }
}

/// Everything returned by [`MergeService::spawn`].
pub struct ServiceParts<S: RecordStore = quorum_merge::InMemoryRecordStore> {
    pub handle: MergeHandle,
    /// Every merged record, in emission order. Closes when the task ends.
    pub merged: mpsc::UnboundedReceiver<MergedRecord>,
    /// Resolves to the engine, observers removed, once every handle has
    /// been dropped.
    pub task: JoinHandle<MergeEngine<S>>,
}

/// Owns a [`MergeEngine`] on a dedicated task.
///
/// Producers on any number of tasks talk to it through cloned
/// [`MergeHandle`]s; the task applies commands one at a time, so the engine
/// itself never needs a lock.
pub struct MergeService;

impl MergeService {
    pub fn spawn<S>(mut engine: MergeEngine<S>, capacity: usize) -> ServiceParts<S>
    where
        S: RecordStore + Send + 'static,
    {
        let (merged_tx, merged_rx) = mpsc::unbounded_channel();
        engine.add_observer(Box::new(ForwardingObserver { merged: merged_tx }));

        let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));
        let task = tokio::spawn(async move {
            info!("merge service started");
            while let Some(command) = rx.recv().await {
                apply(&mut engine, command);
            }
            info!(
                merged = engine.merged_count(),
                resident = engine.resident_count(),
                "merge service stopped"
            );
            engine.clear_observers();
            engine
        });

        ServiceParts {
            handle: MergeHandle { sender: tx },
            merged: merged_rx,
            task,
        }
    }
}

fn apply<S: RecordStore>(engine: &mut MergeEngine<S>, command: Command) {
    match command {
        Command::Update {
            source,
            id,
            fields,
            respond_to,
        } => {
            let _ = respond_to.send(engine.update(source.as_str(), id, fields));
        }
        Command::Exhausted { source, respond_to } => {
            let result = engine.source_exhausted(source.as_str());
            if let Ok(flushed) = &result {
                debug!(source = %source, flushed = flushed.len(), "exhaustion applied");
            }
            let _ = respond_to.send(result);
        }
        Command::Stats { respond_to } => {
            let _ = respond_to.send(ServiceStats {
                merged: engine.merged_count(),
                resident: engine.resident_count(),
            });
        }
        Command::Pending { respond_to } => {
            let _ = respond_to.send(engine.pending());
        }
    }
}

/// Cloneable sender side of a [`MergeService`].
#[derive(Clone, Debug)]
pub struct MergeHandle {
    sender: mpsc::Sender<Command>,
}

impl MergeHandle {
    pub async fn update(
        &self,
        source: SourceId,
        id: EntityId,
        fields: FieldMap,
    ) -> FeedResult<UpdateOutcome> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Update {
            source,
            id,
            fields,
            respond_to,
        })
        .await?;
        Ok(response.await.map_err(|_| FeedError::ServiceClosed)??)
    }

    /// Declare `source` exhausted. Returns the records flushed by the sweep.
    pub async fn exhausted(&self, source: SourceId) -> FeedResult<Vec<MergedRecord>> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Exhausted { source, respond_to }).await?;
        Ok(response.await.map_err(|_| FeedError::ServiceClosed)??)
    }

    pub async fn stats(&self) -> FeedResult<ServiceStats> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Stats { respond_to }).await?;
        response.await.map_err(|_| FeedError::ServiceClosed)
    }

    /// Resident entities and why each has not merged.
    pub async fn pending(&self) -> FeedResult<Vec<(EntityId, Completion)>> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Pending { respond_to }).await?;
        response.await.map_err(|_| FeedError::ServiceClosed)
    }

    async fn send(&self, command: Command) -> FeedResult<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| FeedError::ServiceClosed)
    }
}

#[async_trait]
impl RecordSink for MergeHandle {
    async fn emit(&self, source: &SourceId, id: EntityId, fields: FieldMap) -> FeedResult<()> {
        self.update(source.clone(), id, fields).await.map(|_| ())
    }

    async fn exhausted(&self, source: &SourceId) -> FeedResult<()> {
        MergeHandle::exhausted(self, source.clone()).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_merge::SourceRegistry;
    use serde_json::json;

    fn source(name: &str) -> SourceId {
        SourceId::new(name).unwrap()
    }

    fn fields(key: &str, value: serde_json::Value) -> FieldMap {
        FieldMap::from([(key.to_string(), value)])
    }

    fn spawn() -> ServiceParts {
        let registry = SourceRegistry::new(["ds1", "ds2"], ["dsp"]).unwrap();
        MergeService::spawn(MergeEngine::new(registry), 8)
    }

    #[tokio::test]
    async fn serializes_updates_and_forwards_merges() {
        let ServiceParts {
            handle,
            mut merged,
            task,
        } = spawn();

        let outcome = handle
            .update(source("ds1"), EntityId::from("1"), fields("a", json!(1)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::Pending {
                required_seen: 1,
                optional_seen: 0
            }
        );

        handle
            .update(source("ds2"), EntityId::from("1"), fields("b", json!(2)))
            .await
            .unwrap();
        let outcome = handle
            .update(source("dsp"), EntityId::from("1"), fields("c", json!(3)))
            .await
            .unwrap();
        assert!(outcome.merged().is_some());

        let record = merged.recv().await.unwrap();
        assert_eq!(record.entity, EntityId::from("1"));
        assert_eq!(record.fields.len(), 3);

        drop(handle);
        let engine = task.await.unwrap();
        assert_eq!(engine.merged_count(), 1);
        assert!(merged.recv().await.is_none());
    }

    #[tokio::test]
    async fn exhaustion_flushes_through_the_handle() {
        let ServiceParts {
            handle,
            mut merged,
            task,
        } = spawn();

        for name in ["ds1", "ds2"] {
            handle
                .update(source(name), EntityId::from("7"), FieldMap::new())
                .await
                .unwrap();
        }
        let pending = handle.pending().await.unwrap();
        assert_eq!(pending, vec![(EntityId::from("7"), Completion::AwaitingOptional)]);

        let flushed = handle.exhausted(source("dsp")).await.unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(merged.recv().await.unwrap().entity, EntityId::from("7"));
        assert_eq!(
            handle.stats().await.unwrap(),
            ServiceStats {
                merged: 1,
                resident: 0
            }
        );

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_source_is_rejected() {
        let ServiceParts { handle, .. } = spawn();
        let err = handle
            .update(source("nope"), EntityId::from("1"), FieldMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Merge(_)));
    }

    #[tokio::test]
    async fn closed_service_reports_closed() {
        let ServiceParts { handle, task, .. } = spawn();
        task.abort();
        let _ = task.await;
        let err = handle.stats().await.unwrap_err();
        assert!(matches!(err, FeedError::ServiceClosed));
    }

    #[tokio::test]
    async fn concurrent_handles_merge_each_entity_once() {
        let ServiceParts {
            handle,
            mut merged,
            task,
        } = spawn();

        let mut producers = Vec::new();
        for name in ["ds1", "ds2"] {
            let handle = handle.clone();
            producers.push(tokio::spawn(async move {
                for id in 0..50u64 {
                    handle
                        .update(source(name), EntityId::from(id), FieldMap::new())
                        .await
                        .unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }
        handle.exhausted(source("dsp")).await.unwrap();
        drop(handle);
        task.await.unwrap();

        let mut count = 0;
        while merged.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 50);
    }
}
