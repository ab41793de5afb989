//! Per-industry query collections.
//!
//! Each industry has a JSON file `<queries_dir>/<industry>.json`, holding either
//! a plain array of strings or an object keyed by industry:
//!
//! ```json
//! { "smart_manufacturing": ["industrial iot platforms", "mes software vendors"] }
//! ```

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, instrument};

use sourcescout_shared::{Industry, Query, Result, SourceScoutError};

/// Loads ordered query lists from a directory of JSON files.
#[derive(Debug, Clone)]
pub struct QueryStore {
    dir: PathBuf,
}

impl QueryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the collection file for an industry.
    pub fn path_for(&self, industry: &Industry) -> PathBuf {
        self.dir.join(format!("{}.json", industry.as_str()))
    }

    /// Load the industry's queries in file order. Fails with a config error
    /// if the collection is missing, unreadable, or empty.
    #[instrument(skip(self), fields(industry = %industry))]
    pub fn load(&self, industry: &Industry) -> Result<Vec<Query>> {
        let path = self.path_for(industry);
        if !path.exists() {
            return Err(SourceScoutError::config(format!(
                "no query collection for '{industry}' (expected {})",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| SourceScoutError::io(&path, e))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            SourceScoutError::config(format!("invalid query collection {}: {e}", path.display()))
        })?;

        let list = match &value {
            Value::Array(items) => items,
            Value::Object(map) => map
                .get(industry.as_str())
                .or_else(|| {
                    map.iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(&industry.display_name()))
                        .map(|(_, v)| v)
                })
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    SourceScoutError::config(format!(
                        "{} has no query list for '{industry}'",
                        path.display()
                    ))
                })?,
            _ => {
                return Err(SourceScoutError::config(format!(
                    "{} must hold an array or an object of arrays",
                    path.display()
                )));
            }
        };

        let mut queries = Vec::with_capacity(list.len());
        for item in list {
            let text = item.as_str().ok_or_else(|| {
                SourceScoutError::config(format!(
                    "{} contains a non-string query: {item}",
                    path.display()
                ))
            })?;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            queries.push(Query {
                text: text.to_string(),
                industry: industry.clone(),
            });
        }

        if queries.is_empty() {
            return Err(SourceScoutError::config(format!(
                "query collection for '{industry}' is empty"
            )));
        }

        debug!(count = queries.len(), "loaded queries");
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ss_queries_{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn industry() -> Industry {
        Industry::new("smart_manufacturing").unwrap()
    }

    #[test]
    fn loads_array_in_order_dropping_blanks() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("smart_manufacturing.json"),
            r#"["digital twin", "  ", " mes software "]"#,
        )
        .unwrap();

        let queries = QueryStore::new(&dir).load(&industry()).unwrap();
        let texts: Vec<_> = queries.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, ["digital twin", "mes software"]);
        assert_eq!(queries[0].industry, industry());
    }

    #[test]
    fn loads_object_keyed_by_industry() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("smart_manufacturing.json"),
            r#"{"smart_manufacturing": ["a", "b"], "fintech": ["c"]}"#,
        )
        .unwrap();

        let queries = QueryStore::new(&dir).load(&industry()).unwrap();
        assert_eq!(queries.len(), 2);
    }

    #[test]
    fn loads_object_keyed_by_display_name() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("smart_manufacturing.json"),
            r#"{"Smart Manufacturing": ["a"]}"#,
        )
        .unwrap();

        assert_eq!(QueryStore::new(&dir).load(&industry()).unwrap().len(), 1);
    }

    #[test]
    fn missing_collection_is_config_error() {
        let err = QueryStore::new(temp_dir()).load(&industry()).unwrap_err();
        assert!(matches!(err, SourceScoutError::Config { .. }));
    }

    #[test]
    fn empty_or_invalid_collection_is_config_error() {
        let dir = temp_dir();
        let store = QueryStore::new(&dir);

        std::fs::write(dir.join("smart_manufacturing.json"), "[]").unwrap();
        assert!(matches!(store.load(&industry()), Err(SourceScoutError::Config { .. })));

        std::fs::write(dir.join("smart_manufacturing.json"), "{not json").unwrap();
        assert!(matches!(store.load(&industry()), Err(SourceScoutError::Config { .. })));

        std::fs::write(dir.join("smart_manufacturing.json"), r#"{"fintech": ["x"]}"#).unwrap();
        assert!(matches!(store.load(&industry()), Err(SourceScoutError::Config { .. })));
    }
}
