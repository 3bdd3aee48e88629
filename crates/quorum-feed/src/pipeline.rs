use std::sync::Arc;

use tracing::{info, warn};

use quorum_types::SourceId;

use crate::error::{FeedError, FeedResult};
use crate::producer::{ProduceStats, Producer, RecordSink};
use crate::service::MergeHandle;
use crate::session::Session;

/// How one source's run ended.
#[derive(Debug)]
pub struct SourceReport {
    pub source: SourceId,
    pub result: FeedResult<ProduceStats>,
}

/// Drive `producer` into `sink`, then declare its source exhausted.
///
/// Exhaustion is signalled after a successful run even if no rows were
/// produced. A failed run is never reported as exhausted.
pub async fn run_producer<P>(
    producer: &P,
    session: &Session,
    sink: &dyn RecordSink,
) -> FeedResult<ProduceStats>
where
    P: Producer + ?Sized,
{
    let source = producer.source();

    if producer.requires_session() && !session.is_authenticated() {
        warn!(source = %source, session = %session.id(), "source requires an authenticated session");
        return Err(FeedError::Unauthenticated {
            source_name: source.to_string(),
        });
    }

    let stats = match producer.produce(session, sink).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(source = %source, error = %e, "producer failed; source left open");
            return Err(e);
        }
    };

    sink.exhausted(source).await?;
    info!(
        source = %source,
        emitted = stats.emitted,
        filtered = stats.filtered,
        skipped = stats.skipped,
        "source exhausted"
    );
    Ok(stats)
}

/// Run every producer concurrently against one merge service.
///
/// Reports come back in the order `producers` was given.
pub async fn run_all(
    producers: Vec<Arc<dyn Producer>>,
    session: Session,
    handle: MergeHandle,
) -> Vec<SourceReport> {
    let tasks: Vec<_> = producers
        .into_iter()
        .map(|producer| {
            let session = session.clone();
            let handle = handle.clone();
            let source = producer.source().clone();
            let task = tokio::spawn(async move {
                run_producer(producer.as_ref(), &session, &handle).await
            });
            (source, task)
        })
        .collect();
    drop(handle);

    let mut reports = Vec::with_capacity(tasks.len());
    for (source, task) in tasks {
        let result = task.await.unwrap_or_else(|e| Err(FeedError::from(e)));
        reports.push(SourceReport { source, result });
    }
    reports
}
