//! Work items and their inputs: the id list and the id -> source URL mapping.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One unit of fetchable content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub source: String,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }
}

/// True if `id` can be used as a file stem inside the staging and shard dirs.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\', '\0'])
}

/// Parse an id list: one id per line, trimmed, blank lines skipped, duplicates
/// dropped (first occurrence wins).
pub fn parse_ids(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

/// Read an id list file (see [`parse_ids`]).
pub fn load_ids(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read id list: {}", path.display()))?;
    Ok(parse_ids(&text))
}

/// id -> source URL for every entry that carries a usable URL.
#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    urls: HashMap<String, String>,
    /// Entries present in the mapping but without a usable URL.
    pub without_source: usize,
}

impl SourceMap {
    /// Parse the JSON mapping `{ "<id>": { "<url_field>": "https://..." , ... }, ... }`.
    /// Entries with a missing or non-string field, or a URL that does not parse,
    /// are counted in `without_source` and left out.
    pub fn from_json(json: &str, url_field: &str) -> Result<Self> {
        let raw: HashMap<String, serde_json::Value> =
            serde_json::from_str(json).context("parse id -> source mapping")?;
        let mut map = SourceMap::default();
        for (id, entry) in raw {
            let url = entry
                .get(url_field)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|u| url::Url::parse(u).is_ok());
            match url {
                Some(u) => {
                    map.urls.insert(id, u.to_string());
                }
                None => map.without_source += 1,
            }
        }
        Ok(map)
    }

    pub fn load(path: &Path, url_field: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read id -> source mapping: {}", path.display()))?;
        Self::from_json(&json, url_field).with_context(|| format!("in {}", path.display()))
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.urls.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Pair each id with its source, preserving `ids` order. Returns the items and
    /// the number of ids that had no source.
    pub fn resolve(&self, ids: &[String]) -> (Vec<WorkItem>, usize) {
        let mut missing = 0usize;
        let items = ids
            .iter()
            .filter_map(|id| match self.get(id) {
                Some(url) => Some(WorkItem::new(id.clone(), url)),
                None => {
                    missing += 1;
                    None
                }
            })
            .collect();
        (items, missing)
    }
}

impl FromIterator<(String, String)> for SourceMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        SourceMap {
            urls: iter.into_iter().collect(),
            without_source: 0,
        }
    }
}
