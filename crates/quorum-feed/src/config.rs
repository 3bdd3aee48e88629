use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use quorum_merge::SourceRegistry;
use quorum_types::{SourceId, SourceKind};

use crate::crosswalk::{Crosswalk, FieldRule, RowFilter};
use crate::error::{FeedError, FeedResult};
use crate::producer::Producer;
use crate::service::DEFAULT_CHANNEL_CAPACITY;
use crate::sources::JsonLinesProducer;

/// A pipeline: the sources to read and how each maps onto canonical fields.
///
/// Loaded from TOML. Source order within each kind is merge priority.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Queue depth between producers and the merge task.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,
    /// Directory relative source paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// One `[[source]]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    /// JSON-lines file, relative to the config file.
    pub path: PathBuf,
    /// Rule producing the entity id.
    pub id: FieldRule,
    #[serde(default)]
    pub filter: Option<RowFilter>,
    #[serde(default)]
    pub requires_session: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldRule>,
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            sources: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl SourceConfig {
    pub fn crosswalk(&self) -> Crosswalk {
        let crosswalk = self
            .fields
            .iter()
            .fold(Crosswalk::new(self.id.clone()), |crosswalk, (name, rule)| {
                crosswalk.field(name.clone(), rule.clone())
            });
        match &self.filter {
            Some(filter) => crosswalk.with_filter(filter.clone()),
            None => crosswalk,
        }
    }
}

impl PipelineConfig {
    /// Read, parse, and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> FeedResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir)
    }

    /// Parse and validate config text; relative paths resolve against
    /// `base_dir`.
    pub fn from_toml_str(content: &str, base_dir: impl Into<PathBuf>) -> FeedResult<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| FeedError::Config(format!("invalid pipeline config: {e}")))?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FeedResult<()> {
        if self.channel_capacity == 0 {
            return Err(FeedError::Config(
                "channel_capacity must be greater than zero".into(),
            ));
        }
        if self.sources.is_empty() {
            return Err(FeedError::Config("no sources configured".into()));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            SourceId::new(source.name.as_str())
                .map_err(|e| FeedError::Config(format!("source {:?}: {e}", source.name)))?;
            if !names.insert(source.name.as_str()) {
                return Err(FeedError::Config(format!(
                    "source {} is configured twice",
                    source.name
                )));
            }
        }

        if !self.sources.iter().any(|s| s.kind.is_required()) {
            return Err(FeedError::Config(
                "at least one source must be required".into(),
            ));
        }
        Ok(())
    }

    /// Registry with sources in file order within each kind.
    pub fn registry(&self) -> FeedResult<SourceRegistry> {
        let names = |kind: SourceKind| {
            self.sources
                .iter()
                .filter(move |s| s.kind == kind)
                .map(|s| s.name.clone())
        };
        Ok(SourceRegistry::new(
            names(SourceKind::Required),
            names(SourceKind::Optional),
        )?)
    }

    pub fn resolve_path(&self, source: &SourceConfig) -> PathBuf {
        self.base_dir.join(&source.path)
    }

    /// One JSON-lines producer per source, in file order.
    pub fn producers(&self) -> FeedResult<Vec<Arc<dyn Producer>>> {
        self.sources
            .iter()
            .map(|source| {
                let id = SourceId::new(source.name.as_str()).map_err(quorum_merge::MergeError::from)?;
                let producer =
                    JsonLinesProducer::new(id, self.resolve_path(source), source.crosswalk())
                        .requiring_session(source.requires_session);
                Ok(Arc::new(producer) as Arc<dyn Producer>)
            })
            .collect()
    }
}
