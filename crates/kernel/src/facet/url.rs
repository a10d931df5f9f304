//! URL state of facets.
//!
//! The query-string processor reads active items from
//! `f[0]=alias:value&f[1]=alias:value` and writes them back the same way.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use super::{FacetDefinition, FacetSource};

/// Id of the query-string URL processor.
pub const QUERY_STRING_PROCESSOR: &str = "query_string";

/// Active items read from the URL, keyed by facet id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UrlState {
    items: BTreeMap<String, Vec<String>>,
}

impl UrlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value for a facet, ignoring duplicates.
    pub fn add(&mut self, facet_id: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let values = self.items.entry(facet_id.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Values for a facet.
    pub fn get(&self, facet_id: &str) -> Option<&[String]> {
        self.items
            .get(facet_id)
            .filter(|v| !v.is_empty())
            .map(|v| v.as_slice())
    }

    /// Whether any facet has values.
    pub fn is_empty(&self) -> bool {
        self.items.values().all(|v| v.is_empty())
    }

    /// Facet ids with values.
    pub fn facet_ids(&self) -> impl Iterator<Item = &String> {
        self.items.iter().filter(|(_, v)| !v.is_empty()).map(|(k, _)| k)
    }

    /// Copy of the state without one value.
    pub fn without(&self, facet_id: &str, value: &str) -> Self {
        let mut state = self.clone();
        if let Some(values) = state.items.get_mut(facet_id) {
            values.retain(|v| v != value);
        }
        state.items.retain(|_, v| !v.is_empty());
        state
    }

    /// Keep only facets accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.items.retain(|facet_id, _| keep(facet_id));
    }
}

/// Reads and writes facet state in URLs.
pub trait UrlProcessor: Send + Sync {
    fn id(&self) -> &'static str;

    /// Read the active items of `facets` from a raw query string.
    fn parse(
        &self,
        source: &FacetSource,
        facets: &[FacetDefinition],
        query_string: &str,
    ) -> UrlState;

    /// Render `state` as a query string.
    fn build(&self, source: &FacetSource, facets: &[FacetDefinition], state: &UrlState) -> String;
}

/// `f[0]=alias:value` query-string processor.
pub struct QueryStringUrlProcessor;

fn decode(part: &str) -> Option<String> {
    urlencoding::decode(&part.replace('+', " "))
        .ok()
        .map(|s| s.into_owned())
}

impl QueryStringUrlProcessor {
    /// Whether a decoded key is the filter key, bare or indexed (`f[3]`).
    fn is_filter_key(key: &str, filter_key: &str) -> bool {
        match key.strip_prefix(filter_key) {
            Some("") => true,
            Some(rest) => rest.starts_with('[') && rest.ends_with(']'),
            None => false,
        }
    }
}

impl UrlProcessor for QueryStringUrlProcessor {
    fn id(&self) -> &'static str {
        QUERY_STRING_PROCESSOR
    }

    fn parse(
        &self,
        source: &FacetSource,
        facets: &[FacetDefinition],
        query_string: &str,
    ) -> UrlState {
        let by_alias: HashMap<&str, &str> = facets
            .iter()
            .map(|f| (f.url_alias(), f.id.as_str()))
            .collect();

        let mut state = UrlState::new();
        for pair in query_string.trim_start_matches('?').split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let (Some(key), Some(value)) = (decode(key), decode(value)) else {
                debug!(pair, "undecodable query parameter ignored");
                continue;
            };
            if !Self::is_filter_key(&key, &source.filter_key) {
                continue;
            }
            let Some((alias, raw)) = value.split_once(source.separator.as_str()) else {
                continue;
            };
            match by_alias.get(alias) {
                Some(facet_id) if !raw.is_empty() => state.add(*facet_id, raw),
                Some(_) => {}
                None => debug!(alias, source = %source.id, "unknown facet alias in URL"),
            }
        }
        state
    }

    fn build(&self, source: &FacetSource, facets: &[FacetDefinition], state: &UrlState) -> String {
        let mut parts = Vec::new();
        for facet in facets {
            for value in state.get(&facet.id).unwrap_or_default() {
                let key = format!("{}[{}]", source.filter_key, parts.len());
                let value = format!("{}{}{}", facet.url_alias(), source.separator, value);
                parts.push(format!(
                    "{}={}",
                    urlencoding::encode(&key),
                    urlencoding::encode(&value)
                ));
            }
        }
        parts.join("&")
    }
}

/// URL processors by id.
pub struct UrlProcessorRegistry {
    processors: HashMap<String, Box<dyn UrlProcessor>>,
}

impl Default for UrlProcessorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            processors: HashMap::new(),
        };
        registry.register(Box::new(QueryStringUrlProcessor));
        registry
    }
}

impl UrlProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Box<dyn UrlProcessor>) {
        self.processors.insert(processor.id().to_string(), processor);
    }

    pub fn get(&self, id: &str) -> Option<&dyn UrlProcessor> {
        self.processors.get(id).map(|p| p.as_ref())
    }

    /// Parse the URL state of a facet source.
    ///
    /// An unknown processor yields an empty state.
    pub fn parse(
        &self,
        source: &FacetSource,
        facets: &[FacetDefinition],
        query_string: &str,
    ) -> UrlState {
        match self.get(&source.url_processor) {
            Some(processor) => processor.parse(source, facets, query_string),
            None => {
                warn!(
                    processor = %source.url_processor,
                    source = %source.id,
                    "URL processor not found; ignoring URL filters"
                );
                UrlState::new()
            }
        }
    }

    /// Build a query string for a facet source; empty for an unknown processor.
    pub fn build(
        &self,
        source: &FacetSource,
        facets: &[FacetDefinition],
        state: &UrlState,
    ) -> String {
        self.get(&source.url_processor)
            .map(|processor| processor.build(source, facets, state))
            .unwrap_or_default()
    }
}
