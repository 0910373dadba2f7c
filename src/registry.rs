//! Source registry loading and validation.
//!
//! The registry is a YAML file with an optional `topic` block and an ordered
//! `sources` list:
//!
//! ```yaml
//! topic:
//!   primary: ["purdue", "boilermaker"]
//! sources:
//!   - name: Hammer & Rails
//!     endpoint: https://www.hammerandrails.com/rss/index.xml
//!   - name: PurdueSports
//!     kind: scrape
//!     endpoint: https://purduesports.com/sports/mens-basketball/news
//!     rules:
//!       item: "article.card"
//!       title: "h3"
//!       link: "a"
//!       time: "time"
//! ```
//!
//! `kind` defaults to `syndication`; `url` is accepted as an alias for
//! `endpoint`. An optional `aliases` map turns loose source names or endpoint
//! hosts into the display label articles are attributed to:
//!
//! ```yaml
//! aliases:
//!   hammerandrails.com: Hammer & Rails
//!   purdue sports: PurdueSports
//! ```
//!
//! Keys are matched case-insensitively against the trimmed name first, then
//! the endpoint host. Everything is validated before the first request goes out, so a
//! broken registry fails the run instead of silently dropping sources.

use crate::models::{ScrapeRules, Source, Strategy};
use crate::score::Topic;
use scraper::Selector;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("reading registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing registry: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("registry lists no sources")]
    Empty,
    #[error("source #{index}: {reason}")]
    Invalid { index: usize, reason: String },
}

/// How a source's endpoint is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Syndication,
    Scrape,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    topic: Topic,
    #[serde(default)]
    aliases: HashMap<String, String>,
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    name: String,
    #[serde(default)]
    kind: SourceKind,
    #[serde(alias = "url")]
    endpoint: String,
    #[serde(default)]
    rules: Option<RulesEntry>,
}

#[derive(Debug, Deserialize)]
struct RulesEntry {
    item: String,
    title: Option<String>,
    summary: Option<String>,
    link: Option<String>,
    time: Option<String>,
}

/// Validated sources plus the topic they are scored against.
#[derive(Debug, Clone)]
pub struct Registry {
    pub topic: Topic,
    pub sources: Vec<Source>,
}

fn compile(index: usize, field: &str, css: &str) -> Result<Selector, RegistryError> {
    Selector::parse(css).map_err(|e| RegistryError::Invalid {
        index,
        reason: format!("bad `{field}` selector {css:?}: {e}"),
    })
}

fn compile_opt(
    index: usize,
    field: &str,
    css: Option<&str>,
) -> Result<Option<Selector>, RegistryError> {
    css.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| compile(index, field, s))
        .transpose()
}

impl RulesEntry {
    fn compile(&self, index: usize) -> Result<ScrapeRules, RegistryError> {
        Ok(ScrapeRules {
            item: compile(index, "item", self.item.trim())?,
            title: compile_opt(index, "title", self.title.as_deref())?,
            summary: compile_opt(index, "summary", self.summary.as_deref())?,
            link: compile_opt(index, "link", self.link.as_deref())?,
            time: compile_opt(index, "time", self.time.as_deref())?,
        })
    }
}

/// Display label for a source, looked up by name then by endpoint host.
fn canonical_name(aliases: &HashMap<String, String>, name: &str, endpoint: &Url) -> String {
    let by_name = aliases.get(&name.to_lowercase());
    let by_host = || {
        endpoint
            .host_str()
            .map(|h| h.trim_start_matches("www.").to_lowercase())
            .and_then(|h| aliases.get(&h))
    };
    by_name
        .or_else(by_host)
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| name.to_string())
}

impl SourceEntry {
    fn into_source(
        self,
        index: usize,
        aliases: &HashMap<String, String>,
    ) -> Result<Source, RegistryError> {
        let invalid = |reason: String| RegistryError::Invalid { index, reason };

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(invalid("empty name".to_string()));
        }

        let endpoint = Url::parse(self.endpoint.trim())
            .map_err(|e| invalid(format!("{name}: bad endpoint {:?}: {e}", self.endpoint)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(invalid(format!("{name}: endpoint must be http(s)")));
        }

        let name = canonical_name(aliases, &name, &endpoint);

        let strategy = match (self.kind, self.rules) {
            (SourceKind::Syndication, _) => Strategy::Syndication,
            (SourceKind::Scrape, Some(rules)) => Strategy::Scrape(rules.compile(index)?),
            (SourceKind::Scrape, None) => {
                return Err(invalid(format!("{name}: scrape source needs `rules`")));
            }
        };

        Ok(Source {
            name,
            endpoint,
            strategy,
        })
    }
}

impl Registry {
    /// Parse and validate a registry document.
    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_yaml::from_str(yaml)?;
        if file.sources.is_empty() {
            return Err(RegistryError::Empty);
        }
        let aliases: HashMap<String, String> = file
            .aliases
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        let sources = file
            .sources
            .into_iter()
            .enumerate()
            .map(|(i, entry)| entry.into_source(i, &aliases))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            topic: file.topic,
            sources,
        })
    }

    /// Read and validate the registry at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, RegistryError> {
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RegistryError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let registry = Self::from_yaml(&yaml)?;
        let scrape = registry
            .sources
            .iter()
            .filter(|s| matches!(s.strategy, Strategy::Scrape(_)))
            .count();
        info!(
            sources = registry.sources.len(),
            scrape,
            syndication = registry.sources.len() - scrape,
            "Loaded source registry"
        );
        Ok(registry)
    }
}
