//! Registry client (§4.3): fetch the remote extension catalog, apply a
//! query filter, and expand registry names into the logical dependency
//! names scripts use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::http_cache::HttpCache;

pub const DEFAULT_CATALOG_URL: &str = "https://registry.k6.io/extensions.json";
pub const DEFAULT_FILTER: &str = "$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ExtensionType {
    JavaScript,
    Output,
}

/// One entry in the remote extension catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub url: String,
    pub types: Vec<ExtensionType>,
}

/// Fetches and decodes the registry document, honoring a JMESPath-style
/// filter expression and the disk HTTP cache.
pub struct RegistryClient {
    catalog_url: String,
    filter: String,
    cache: HttpCache,
    token: Option<String>,
}

impl RegistryClient {
    #[must_use]
    pub fn new(catalog_url: impl Into<String>, filter: impl Into<String>, cache_dir: impl Into<std::path::PathBuf>, token: Option<String>) -> Self {
        RegistryClient {
            catalog_url: catalog_url.into(),
            filter: filter.into(),
            cache: HttpCache::new(cache_dir),
            token,
        }
    }

    /// Fetch, filter, and decode the registry into entries.
    ///
    /// # Errors
    /// Returns [`ResolverError::RegistryFetch`] on network failure,
    /// [`ResolverError::RegistryFilter`] if the filter expression doesn't
    /// select an array, or [`ResolverError::RegistryParse`] if the
    /// filtered value doesn't decode into entries.
    pub fn fetch(&self) -> Result<Vec<RegistryEntry>, ResolverError> {
        tracing::debug!(url = %self.catalog_url, filter = %self.filter, "fetching extension registry");
        let raw = self.cache.get(&self.catalog_url, self.token.as_deref())?;
        let value: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| ResolverError::RegistryParse {
                url: self.catalog_url.clone(),
                message: e.to_string(),
            })?;

        let filtered = apply_filter(&value, &self.filter)?;

        serde_json::from_value(filtered).map_err(|e| ResolverError::RegistryParse {
            url: self.catalog_url.clone(),
            message: e.to_string(),
        })
    }
}

fn apply_filter(value: &serde_json::Value, filter: &str) -> Result<serde_json::Value, ResolverError> {
    if filter == DEFAULT_FILTER || filter.trim().is_empty() {
        return Ok(value.clone());
    }
    let selected = jsonpath_lib::select(value, filter).map_err(|e| ResolverError::RegistryFilter {
        filter: filter.to_owned(),
        message: e.to_string(),
    })?;
    // jsonpath_lib::select returns Vec<&Value>; a filter selecting the
    // top-level array yields one element that is itself the array.
    match selected.as_slice() {
        [single] => Ok((*single).clone()),
        other => Ok(serde_json::Value::Array(other.iter().map(|v| (*v).clone()).collect())),
    }
}

/// Expand registry entries into every logical name a script may use to
/// refer to them (§4.3). When two entries expand to the same name, the
/// last one wins (§9 "Registry expansion generates ambiguity").
#[must_use]
pub fn expand(entries: &[RegistryEntry]) -> BTreeMap<String, RegistryEntry> {
    let mut map = BTreeMap::new();
    for entry in entries {
        for name in logical_names(entry) {
            map.insert(name, entry.clone());
        }
    }
    map
}

/// The "unique" expansion variant used by preload: exactly one name per
/// entry (its shortest/most specific logical name), so a given source
/// repository is never preloaded twice under two different aliases.
#[must_use]
pub fn expand_unique(entries: &[RegistryEntry]) -> BTreeMap<String, RegistryEntry> {
    let mut map = BTreeMap::new();
    for entry in entries {
        let shortest = logical_names(entry).into_iter().min_by_key(String::len);
        if let Some(name) = shortest {
            map.insert(name, entry.clone());
        }
    }
    map
}

fn logical_names(entry: &RegistryEntry) -> Vec<String> {
    let mut names = Vec::new();
    for kind in &entry.types {
        match kind {
            ExtensionType::Output => {
                names.push(entry.name.clone());
                if let Some(stripped) = entry.name.strip_prefix("xk6-output-") {
                    names.push(stripped.to_owned());
                }
                if let Some(stripped) = entry.name.strip_prefix("xk6-") {
                    names.push(stripped.to_owned());
                }
            }
            ExtensionType::JavaScript => {
                let base = entry.name.strip_prefix("xk6-").unwrap_or(&entry.name);
                names.push(format!("k6/x/{base}"));
                if let Some(idx) = base.rfind('-') {
                    if let Some(suffix) = base.get(idx + 1..) {
                        names.push(format!("k6/x/{suffix}"));
                    }
                }
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn js_entry(name: &str) -> RegistryEntry {
        RegistryEntry {
            name: name.to_owned(),
            url: format!("https://github.com/grafana/{name}"),
            types: vec![ExtensionType::JavaScript],
        }
    }

    fn output_entry(name: &str) -> RegistryEntry {
        RegistryEntry {
            name: name.to_owned(),
            url: format!("https://github.com/grafana/{name}"),
            types: vec![ExtensionType::Output],
        }
    }

    #[test]
    fn javascript_expansion_yields_k6_x_name() {
        let entries = vec![js_entry("xk6-faker")];
        let expanded = expand(&entries);
        assert!(expanded.contains_key("k6/x/faker"));
    }

    #[test]
    fn javascript_expansion_yields_dash_suffix_alias() {
        let entries = vec![js_entry("xk6-sql-driver")];
        let expanded = expand(&entries);
        assert!(expanded.contains_key("k6/x/sql-driver"));
        assert!(expanded.contains_key("k6/x/driver"));
    }

    #[test]
    fn output_expansion_yields_three_names() {
        let entries = vec![output_entry("xk6-output-influxdb")];
        let expanded = expand(&entries);
        assert!(expanded.contains_key("xk6-output-influxdb"));
        assert!(expanded.contains_key("influxdb"));
        assert!(expanded.contains_key("output-influxdb"));
    }

    #[test]
    fn last_write_wins_on_collision() {
        let a = js_entry("xk6-faker");
        let mut b = js_entry("xk6-faker");
        b.url = "https://github.com/someone-else/xk6-faker".to_owned();
        let expanded = expand(&[a, b.clone()]);
        assert_eq!(expanded.get("k6/x/faker").unwrap().url, b.url);
    }

    #[test]
    fn unique_expansion_emits_one_name_per_entry() {
        let entries = vec![js_entry("xk6-sql-driver"), output_entry("xk6-output-influxdb")];
        let expanded = expand_unique(&entries);
        assert_eq!(expanded.len(), 2);
        assert!(expanded.contains_key("k6/x/driver"));
        assert!(expanded.contains_key("influxdb"));
    }

    /// Registry expansion closure (§8).
    #[test]
    fn expansion_closure_for_javascript_with_suffix() {
        let entries = vec![js_entry("xk6-top-level-module")];
        let expanded = expand(&entries);
        assert!(expanded.contains_key("k6/x/top-level-module"));
        assert!(expanded.contains_key("k6/x/module"));
    }

    #[test]
    fn default_filter_passes_value_through_unchanged() {
        let value = serde_json::json!([{"name": "xk6-faker", "url": "u", "types": ["JavaScript"]}]);
        let filtered = apply_filter(&value, DEFAULT_FILTER).unwrap();
        assert_eq!(filtered, value);
    }
}
