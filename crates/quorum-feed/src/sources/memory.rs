use async_trait::async_trait;
use serde_json::Value;

use quorum_types::SourceId;

use crate::crosswalk::Crosswalk;
use crate::error::FeedResult;
use crate::producer::{emit_row, ProduceStats, Producer, RecordSink};
use crate::session::Session;

/// Producer over rows already in memory.
#[derive(Clone, Debug)]
pub struct StaticProducer {
    source: SourceId,
    crosswalk: Crosswalk,
    rows: Vec<Value>,
    requires_session: bool,
}

impl StaticProducer {
    pub fn new(source: SourceId, crosswalk: Crosswalk, rows: Vec<Value>) -> Self {
        Self {
            source,
            crosswalk,
            rows,
            requires_session: false,
        }
    }

    pub fn requiring_session(mut self, required: bool) -> Self {
        self.requires_session = required;
        self
    }
}

#[async_trait]
impl Producer for StaticProducer {
    fn source(&self) -> &SourceId {
        &self.source
    }

    fn requires_session(&self) -> bool {
        self.requires_session
    }

    async fn produce(&self, _session: &Session, sink: &dyn RecordSink) -> FeedResult<ProduceStats> {
        let mut stats = ProduceStats::default();
        for row in &self.rows {
            emit_row(&self.source, &self.crosswalk, row, sink, &mut stats).await?;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosswalk::FieldRule;
    use crate::producer::testing::CollectingSink;
    use quorum_types::EntityId;
    use serde_json::json;

    #[tokio::test]
    async fn emits_rows_in_order() {
        let producer = StaticProducer::new(
            SourceId::new("ds1").unwrap(),
            Crosswalk::new(FieldRule::key("id")).field("a", FieldRule::key("a")),
            vec![json!({"id": 2, "a": "x"}), json!({"id": 1})],
        );
        let sink = CollectingSink::default();

        let stats = producer.produce(&Session::anonymous(), &sink).await.unwrap();

        assert_eq!(stats.emitted, 2);
        assert_eq!(sink.emitted_ids(), vec![EntityId::from(2u64), EntityId::from(1u64)]);
        assert!(!producer.requires_session());
        assert!(producer.requiring_session(true).requires_session());
    }
}
