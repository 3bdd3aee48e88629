use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use quorum_types::{EntityId, FieldMap, SourceId};

use crate::crosswalk::{Crosswalk, RowOutcome};
use crate::error::FeedResult;
use crate::session::Session;

/// Destination for producer output.
///
/// Implemented by [`crate::MergeHandle`]; tests implement it directly to
/// capture what a producer emits.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, source: &SourceId, id: EntityId, fields: FieldMap) -> FeedResult<()>;

    async fn exhausted(&self, source: &SourceId) -> FeedResult<()>;
}

/// A data source that turns raw rows into canonical updates.
#[async_trait]
pub trait Producer: Send + Sync {
    /// The source name updates are attributed to.
    fn source(&self) -> &SourceId;

    /// Whether `produce` must be given an authenticated session.
    fn requires_session(&self) -> bool {
        false
    }

    /// Emit every row into `sink`. Does not signal exhaustion; see
    /// [`crate::run_producer`].
    async fn produce(&self, session: &Session, sink: &dyn RecordSink) -> FeedResult<ProduceStats>;
}

/// Row counts for one `produce` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProduceStats {
    /// Rows emitted as updates.
    pub emitted: u64,
    /// Rows rejected by the row filter.
    pub filtered: u64,
    /// Rows without a usable entity id.
    pub skipped: u64,
}

impl ProduceStats {
    pub fn rows(&self) -> u64 {
        self.emitted + self.filtered + self.skipped
    }
}

/// Run one raw row through `crosswalk` and emit the result.
pub(crate) async fn emit_row(
    source: &SourceId,
    crosswalk: &Crosswalk,
    row: &Value,
    sink: &dyn RecordSink,
    stats: &mut ProduceStats,
) -> FeedResult<()> {
    match crosswalk.apply(row) {
        RowOutcome::Record(id, fields) => {
            sink.emit(source, id, fields).await?;
            stats.emitted += 1;
        }
        RowOutcome::Filtered => stats.filtered += 1,
        RowOutcome::MissingId => {
            debug!(source = %source, "row without entity id skipped");
            stats.skipped += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Sink that records every call.
    #[derive(Default)]
    pub struct CollectingSink {
        pub emitted: Mutex<Vec<(SourceId, EntityId, FieldMap)>>,
        pub exhausted: Mutex<Vec<SourceId>>,
    }

    impl CollectingSink {
        pub fn emitted_ids(&self) -> Vec<EntityId> {
            self.emitted
                .lock()
                .unwrap()
                .iter()
                .map(|(_, id, _)| id.clone())
                .collect()
        }

        pub fn exhausted_sources(&self) -> Vec<SourceId> {
            self.exhausted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordSink for CollectingSink {
        async fn emit(&self, source: &SourceId, id: EntityId, fields: FieldMap) -> FeedResult<()> {
            self.emitted.lock().unwrap().push((source.clone(), id, fields));
            Ok(())
        }

        async fn exhausted(&self, source: &SourceId) -> FeedResult<()> {
            self.exhausted.lock().unwrap().push(source.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CollectingSink;
    use super::*;
    use crate::crosswalk::{FieldRule, RowFilter};
    use serde_json::json;

    #[tokio::test]
    async fn emit_row_counts_each_outcome() {
        let source = SourceId::new("lara").unwrap();
        let crosswalk = Crosswalk::new(FieldRule::key("LICENSEID"))
            .field("Name", FieldRule::key("NAME"))
            .with_filter(RowFilter::new(FieldRule::key("COUNTY"), ["Wayne"]));
        let sink = CollectingSink::default();
        let mut stats = ProduceStats::default();

        let rows = [
            json!({"LICENSEID": "1", "NAME": "A", "COUNTY": "Wayne"}),
            json!({"LICENSEID": "2", "NAME": "B", "COUNTY": "Kent"}),
            json!({"NAME": "C", "COUNTY": "Wayne"}),
        ];
        for row in &rows {
            emit_row(&source, &crosswalk, row, &sink, &mut stats).await.unwrap();
        }

        assert_eq!(
            stats,
            ProduceStats {
                emitted: 1,
                filtered: 1,
                skipped: 1
            }
        );
        assert_eq!(stats.rows(), 3);
        assert_eq!(sink.emitted_ids(), vec![EntityId::from("1")]);
        assert!(sink.exhausted_sources().is_empty());
    }
}
