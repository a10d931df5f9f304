//! In-memory search backend.
//!
//! Evaluates condition trees, keywords, sorts and facet counts over indexed
//! entity translations held in memory.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use tracing::debug;

use super::{
    BUNDLE_FIELD, Condition, ConditionGroup, ConditionNode, ConditionOperator, ConditionValue,
    Conjunction, DATASOURCE_FIELD, FacetRequest, IndexClient, IndexFieldType, IndexInfo,
    LANGUAGE_FIELD, LINK_SOURCE_ID_FIELD, MISSING_RAW_VALUE, RELEVANCE_FIELD, RawFacetValue,
    ResultItem, ResultSet, SearchQuery, SortDirection, datasource_id, facet_tag,
};
use crate::entity::Entity;
use crate::filter::FilterOperator;

/// Search backend keeping every index in memory.
#[derive(Default)]
pub struct MemoryIndex {
    indexes: DashMap<String, IndexInfo>,
    /// index id -> documents in indexing order
    documents: DashMap<String, Vec<ResultItem>>,
}

impl MemoryIndex {
    /// Create a backend without indexes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index definition.
    pub fn add_index(&self, index: IndexInfo) {
        self.documents.entry(index.id.clone()).or_default();
        self.indexes.insert(index.id.clone(), index);
    }

    /// Index every translation of an entity. Returns the number of documents written.
    ///
    /// Entities of a type or bundle the index does not cover are skipped.
    pub fn index_entity(&self, index_id: &str, entity: &Entity) -> Result<usize> {
        let index = self
            .indexes
            .get(index_id)
            .map(|i| i.value().clone())
            .with_context(|| format!("unknown index '{index_id}'"))?;

        if !index.indexes_bundle(&entity.entity_type, &entity.bundle) {
            return Ok(0);
        }

        let mut langcodes = vec![entity.langcode.clone()];
        langcodes.extend(entity.translations.keys().cloned());

        let mut written = 0;
        for langcode in langcodes {
            let translation = entity.translation(&langcode);
            let document = build_document(&index, &translation);
            let mut documents = self.documents.entry(index.id.clone()).or_default();
            match documents.iter_mut().find(|d| d.id == document.id) {
                Some(existing) => *existing = document,
                None => documents.push(document),
            }
            written += 1;
        }
        Ok(written)
    }

    /// Number of documents in an index.
    pub fn document_count(&self, index_id: &str) -> usize {
        self.documents.get(index_id).map(|d| d.len()).unwrap_or(0)
    }
}

fn build_document(index: &IndexInfo, entity: &Entity) -> ResultItem {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for field in &index.fields {
        let values = match field.property() {
            "label" | "title" | "name" => vec![entity.label.clone()],
            "id" => vec![entity.id.clone()],
            "bundle" | "type" => vec![entity.bundle.clone()],
            "langcode" => vec![entity.langcode.clone()],
            property => entity.field_strings(property),
        };
        let values: Vec<String> = match field.field_type {
            IndexFieldType::Date => values.iter().filter_map(|v| to_timestamp(v)).collect(),
            _ => values,
        };
        if !values.is_empty() {
            fields.insert(field.id.clone(), values);
        }
    }

    fields.insert(DATASOURCE_FIELD.to_string(), vec![datasource_id(&entity.entity_type)]);
    fields.insert(BUNDLE_FIELD.to_string(), vec![entity.bundle.clone()]);
    fields.insert(LANGUAGE_FIELD.to_string(), vec![entity.langcode.clone()]);
    fields.insert(LINK_SOURCE_ID_FIELD.to_string(), vec![entity.id.clone()]);

    ResultItem {
        id: ResultItem::item_id(&entity.entity_type, &entity.id, &entity.langcode),
        entity_type: entity.entity_type.clone(),
        entity_id: entity.id.clone(),
        langcode: entity.langcode.clone(),
        score: 0.0,
        fields,
    }
}

/// Convert a stored date value into a Unix timestamp string.
fn to_timestamp(value: &str) -> Option<String> {
    if value.parse::<i64>().is_ok() {
        return Some(value.to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp().to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp().to_string());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp().to_string())
}

/// Compare two stored values, numerically when both are numbers.
fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn values_equal(a: &str, b: &str) -> bool {
    compare_values(a, b) == Ordering::Equal
}

fn matches_condition(doc: &ResultItem, condition: &Condition) -> bool {
    let values = doc.values(&condition.field);

    if condition.value == ConditionValue::Null {
        return match condition.operator {
            ConditionOperator::Eq => values.is_empty(),
            ConditionOperator::Ne => !values.is_empty(),
            _ => false,
        };
    }

    match condition.operator {
        ConditionOperator::Eq | ConditionOperator::In => {
            let targets = condition.value.as_list();
            values.iter().any(|v| targets.iter().any(|t| values_equal(v, t)))
        }
        ConditionOperator::Ne | ConditionOperator::NotIn => {
            let targets = condition.value.as_list();
            !values.iter().any(|v| targets.iter().any(|t| values_equal(v, t)))
        }
        ConditionOperator::Gt
        | ConditionOperator::Lt
        | ConditionOperator::Gte
        | ConditionOperator::Lte => {
            let Some(target) = condition.value.as_text() else {
                return false;
            };
            values.iter().any(|v| {
                let ord = compare_values(v, &target);
                match condition.operator {
                    ConditionOperator::Gt => ord == Ordering::Greater,
                    ConditionOperator::Lt => ord == Ordering::Less,
                    ConditionOperator::Gte => ord != Ordering::Less,
                    _ => ord != Ordering::Greater,
                }
            })
        }
    }
}

/// Evaluate a group. Nested groups tagged `skip_tag` count as matching.
fn matches_group(doc: &ResultItem, group: &ConditionGroup, skip_tag: Option<&str>) -> bool {
    let mut results = group.conditions.iter().filter_map(|node| match node {
        ConditionNode::Condition(c) => Some(matches_condition(doc, c)),
        ConditionNode::Group(g) if skip_tag.is_some_and(|tag| g.has_tag(tag)) => None,
        ConditionNode::Group(g) => Some(matches_group(doc, g, skip_tag)),
    });
    match group.conjunction {
        Conjunction::And => results.all(|m| m),
        Conjunction::Or => {
            let collected: Vec<bool> = results.collect();
            collected.is_empty() || collected.into_iter().any(|m| m)
        }
    }
}

/// Keyword score: occurrences of all keys, or `None` when a key is missing.
fn keyword_score(doc: &ResultItem, query: &SearchQuery, fulltext_fields: &[String]) -> Option<f64> {
    if query.keys.is_empty() {
        return Some(0.0);
    }
    let haystack: Vec<String> = fulltext_fields
        .iter()
        .flat_map(|f| doc.values(f).iter().map(|v| v.to_lowercase()))
        .collect();

    let mut score = 0.0;
    for key in &query.keys {
        let key = key.to_lowercase();
        let hits: usize = haystack.iter().map(|h| h.matches(key.as_str()).count()).sum();
        if hits == 0 {
            return None;
        }
        score += hits as f64;
    }
    Some(score)
}

fn matches_language(doc: &ResultItem, query: &SearchQuery) -> bool {
    query
        .languages
        .as_ref()
        .is_none_or(|langs| langs.iter().any(|l| *l == doc.langcode))
}

fn compare_documents(a: &ResultItem, b: &ResultItem, query: &SearchQuery) -> Ordering {
    for sort in &query.sorts {
        let ord = if sort.field == RELEVANCE_FIELD {
            a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal)
        } else {
            match (a.values(&sort.field).first(), b.values(&sort.field).first()) {
                (Some(x), Some(y)) => compare_values(x, y),
                // Items without a value sort last in either direction.
                (Some(_), None) => return Ordering::Less,
                (None, Some(_)) => return Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        };
        let ord = match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn count_facet(
    documents: &[ResultItem],
    query: &SearchQuery,
    request: &FacetRequest,
    fulltext_fields: &[String],
) -> Vec<RawFacetValue> {
    let tag = facet_tag(&request.field);
    let skip_tag = (request.operator.base() == FilterOperator::Or).then_some(tag.as_str());

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut missing = 0;
    for doc in documents {
        if !matches_language(doc, query)
            || keyword_score(doc, query, fulltext_fields).is_none()
            || !matches_group(doc, &query.root, skip_tag)
        {
            continue;
        }
        let values: HashSet<&String> = doc.values(&request.field).iter().collect();
        if values.is_empty() {
            missing += 1;
        }
        for value in values {
            *counts.entry(value.clone()).or_default() += 1;
        }
    }

    let mut buckets: Vec<RawFacetValue> = counts
        .into_iter()
        .filter(|(_, count)| *count >= request.min_count.max(1))
        .map(|(raw, count)| RawFacetValue { raw, count })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.raw.cmp(&b.raw)));
    if request.limit > 0 {
        buckets.truncate(request.limit);
    }
    if request.missing && missing > 0 && missing >= request.min_count {
        buckets.push(RawFacetValue {
            raw: MISSING_RAW_VALUE.to_string(),
            count: missing,
        });
    }
    buckets
}

impl IndexClient for MemoryIndex {
    fn index(&self, index_id: &str) -> Option<IndexInfo> {
        self.indexes.get(index_id).map(|i| i.value().clone())
    }

    fn indexes(&self) -> Vec<IndexInfo> {
        let mut indexes: Vec<IndexInfo> = self.indexes.iter().map(|i| i.value().clone()).collect();
        indexes.sort_by(|a, b| a.id.cmp(&b.id));
        indexes
    }

    fn execute(&self, query: &SearchQuery) -> Result<ResultSet> {
        let Some(index) = self.index(&query.index_id) else {
            bail!("unknown index '{}'", query.index_id);
        };
        if !index.enabled {
            bail!("index '{}' is disabled", index.id);
        }

        let documents: Vec<ResultItem> = self
            .documents
            .get(&index.id)
            .map(|d| d.value().clone())
            .unwrap_or_default();
        let fulltext_fields = query
            .fulltext_fields
            .clone()
            .unwrap_or_else(|| index.fulltext_fields());

        let mut matches: Vec<ResultItem> = documents
            .iter()
            .filter(|doc| matches_language(doc, query) && matches_group(doc, &query.root, None))
            .filter_map(|doc| {
                keyword_score(doc, query, &fulltext_fields).map(|score| ResultItem {
                    score,
                    ..doc.clone()
                })
            })
            .collect();

        let facets = query
            .facets
            .iter()
            .map(|request| {
                (
                    request.facet_id.clone(),
                    count_facet(&documents, query, request, &fulltext_fields),
                )
            })
            .collect();

        matches.sort_by(|a, b| compare_documents(a, b, query));
        let result_count = matches.len();
        let items: Vec<ResultItem> = matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        debug!(
            index = %index.id,
            result_count,
            returned = items.len(),
            "memory index query executed"
        );

        Ok(ResultSet {
            result_count,
            items,
            facets,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::index::{IndexDatasource, IndexField};
    use serde_json::json;

    fn field(id: &str, field_type: IndexFieldType) -> IndexField {
        IndexField {
            id: id.to_string(),
            label: id.to_string(),
            field_type,
            property_path: None,
            definition: None,
        }
    }

    fn backend() -> MemoryIndex {
        let backend = MemoryIndex::new();
        backend.add_index(IndexInfo {
            id: "content".into(),
            label: "Content".into(),
            enabled: true,
            datasources: vec![IndexDatasource {
                entity_type: "node".into(),
                bundles: vec!["article".into()],
            }],
            fields: vec![
                field("title", IndexFieldType::Fulltext),
                field("status", IndexFieldType::Boolean),
                field("tags", IndexFieldType::String),
                field("created", IndexFieldType::Date),
            ],
        });
        let articles = [
            ("1", "Rust news", true, vec!["42"], "2020-01-10"),
            ("2", "Drupal news", true, vec!["43"], "2020-02-10"),
            ("3", "Draft post", false, vec![], "2020-03-10"),
        ];
        for (id, title, status, tags, created) in articles {
            let entity = Entity::new("node", "article", id, title)
                .with_field("status", [json!(status)])
                .with_field("tags", tags.into_iter().map(|t| json!({"target_id": t})))
                .with_field("created", [json!(created)]);
            backend.index_entity("content", &entity).unwrap();
        }
        backend
            .index_entity("content", &Entity::new("node", "page", "9", "Skipped"))
            .unwrap();
        backend
    }

    #[test]
    fn indexes_only_covered_bundles() {
        assert_eq!(backend().document_count("content"), 3);
    }

    #[test]
    fn date_fields_are_timestamps() {
        let backend = backend();
        let mut query = SearchQuery::new("content");
        query.add_condition("created", 1_580_515_200_i64, ConditionOperator::Gte);
        let results = backend.execute(&query).unwrap();
        assert_eq!(results.result_count, 2);
    }

    #[test]
    fn null_condition_matches_empty_fields() {
        let backend = backend();
        let mut query = SearchQuery::new("content");
        query.add_condition("tags", ConditionValue::Null, ConditionOperator::Eq);
        let results = backend.execute(&query).unwrap();
        assert_eq!(results.result_count, 1);
        assert_eq!(results.items[0].entity_id, "3");
    }

    #[test]
    fn keys_match_all_terms() {
        let backend = backend();
        let mut query = SearchQuery::new("content");
        query.add_key("news").add_key("rust");
        let results = backend.execute(&query).unwrap();
        assert_eq!(results.result_count, 1);
        assert_eq!(results.items[0].entity_id, "1");
    }

    #[test]
    fn sort_and_range() {
        let backend = backend();
        let mut query = SearchQuery::new("content");
        query.sort("created", SortDirection::Desc).range(1, 1);
        let results = backend.execute(&query).unwrap();
        assert_eq!(results.result_count, 3);
        assert_eq!(results.items.len(), 1);
        assert_eq!(results.items[0].entity_id, "2");
    }

    #[test]
    fn or_facets_ignore_their_own_group() {
        let backend = backend();
        let mut query = SearchQuery::new("content");
        let mut group = ConditionGroup::new(Conjunction::Or).with_tag(facet_tag("tags"));
        group.add_condition("tags", "42", ConditionOperator::Eq);
        query.add_condition_group(group);
        query.add_facet(FacetRequest {
            facet_id: "tags".into(),
            field: "tags".into(),
            operator: FilterOperator::Or,
            limit: 0,
            min_count: 1,
            missing: true,
        });
        let results = backend.execute(&query).unwrap();

        assert_eq!(results.result_count, 1);
        let tags = &results.facets["tags"];
        assert_eq!(
            tags,
            &vec![
                RawFacetValue { raw: "42".into(), count: 1 },
                RawFacetValue { raw: "43".into(), count: 1 },
                RawFacetValue { raw: "!".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn and_facets_respect_their_own_group() {
        let backend = backend();
        let mut query = SearchQuery::new("content");
        let mut group = ConditionGroup::new(Conjunction::And).with_tag(facet_tag("tags"));
        group.add_condition("tags", "42", ConditionOperator::Eq);
        query.add_condition_group(group);
        query.add_facet(FacetRequest {
            facet_id: "tags".into(),
            field: "tags".into(),
            operator: FilterOperator::And,
            limit: 0,
            min_count: 1,
            missing: false,
        });
        let results = backend.execute(&query).unwrap();
        assert_eq!(results.facets["tags"].len(), 1);
    }

    #[test]
    fn unknown_index_is_an_error() {
        let backend = backend();
        assert!(backend.execute(&SearchQuery::new("missing")).is_err());
    }

    #[test]
    fn language_restriction() {
        let backend = backend();
        backend
            .index_entity(
                "content",
                &Entity::new("node", "article", "4", "Hello").with_translation("nl", "Hallo"),
            )
            .unwrap();
        let mut query = SearchQuery::new("content");
        query.languages = Some(vec!["nl".into()]);
        let results = backend.execute(&query).unwrap();
        assert_eq!(results.result_count, 1);
        assert_eq!(results.items[0].id, "entity:node/4:nl");
    }
}
