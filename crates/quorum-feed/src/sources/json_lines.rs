use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use quorum_types::SourceId;

use crate::crosswalk::Crosswalk;
use crate::error::{FeedError, FeedResult};
use crate::producer::{emit_row, ProduceStats, Producer, RecordSink};
use crate::session::Session;

/// Producer reading newline-delimited JSON from a file.
///
/// Each non-blank line is one row: an object for keyed sources or an array
/// for positional ones. A line that is not valid JSON aborts the run.
#[derive(Clone, Debug)]
pub struct JsonLinesProducer {
    source: SourceId,
    path: PathBuf,
    crosswalk: Crosswalk,
    requires_session: bool,
}

impl JsonLinesProducer {
    pub fn new(source: SourceId, path: impl Into<PathBuf>, crosswalk: Crosswalk) -> Self {
        Self {
            source,
            path: path.into(),
            crosswalk,
            requires_session: false,
        }
    }

    pub fn requiring_session(mut self, required: bool) -> Self {
        self.requires_session = required;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Producer for JsonLinesProducer {
    fn source(&self) -> &SourceId {
        &self.source
    }

    fn requires_session(&self) -> bool {
        self.requires_session
    }

    async fn produce(&self, _session: &Session, sink: &dyn RecordSink) -> FeedResult<ProduceStats> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut stats = ProduceStats::default();
        let mut line_no = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let row: Value = serde_json::from_str(line).map_err(|e| FeedError::Parse {
                path: self.path.clone(),
                line: line_no,
                message: e.to_string(),
            })?;
            emit_row(&self.source, &self.crosswalk, &row, sink, &mut stats).await?;
        }

        debug!(source = %self.source, path = %self.path.display(), rows = stats.rows(), "file read");
        Ok(stats)
    }
}
