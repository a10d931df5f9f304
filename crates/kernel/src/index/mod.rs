//! Search index model: index definitions, the backend query object and result sets.
//!
//! The list engine never talks to a concrete search engine. It builds a
//! [`SearchQuery`] and hands it to an [`IndexClient`], which returns a
//! [`ResultSet`] with item references and raw facet counts.

pub mod memory;
pub mod sql;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::field_type::FieldDefinition;
use crate::filter::FilterOperator;

/// Index field holding the datasource id (`entity:<entity_type>`).
pub const DATASOURCE_FIELD: &str = "search_api_datasource";

/// Index field holding the entity bundle.
pub const BUNDLE_FIELD: &str = "search_api_bundle";

/// Index field holding the item language.
pub const LANGUAGE_FIELD: &str = "search_api_language";

/// Pseudo field sorting by fulltext relevance.
pub const RELEVANCE_FIELD: &str = "search_api_relevance";

/// Index field holding the item's own entity id.
pub const LINK_SOURCE_ID_FIELD: &str = "list_page_link_source_id";

/// Data type of an index field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFieldType {
    /// Tokenized, stemmed text.
    Fulltext,
    /// Tokenized text matched literally.
    FulltextUnstemmed,
    #[default]
    String,
    Integer,
    Decimal,
    /// Unix timestamp.
    Date,
    Boolean,
}

impl IndexFieldType {
    /// Whether keyword search runs against the field.
    pub fn is_fulltext(self) -> bool {
        matches!(self, IndexFieldType::Fulltext | IndexFieldType::FulltextUnstemmed)
    }

    /// Whether values compare numerically.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            IndexFieldType::Integer
                | IndexFieldType::Decimal
                | IndexFieldType::Date
                | IndexFieldType::Boolean
        )
    }

    /// Whether lists can be sorted on the field.
    pub fn is_sortable(self) -> bool {
        !self.is_fulltext()
    }
}

/// A field of a search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexField {
    /// Field identifier in the index.
    pub id: String,

    /// Human-readable label.
    #[serde(default)]
    pub label: String,

    /// Index data type.
    #[serde(rename = "type", default)]
    pub field_type: IndexFieldType,

    /// Entity property the value is read from (defaults to the field id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_path: Option<String>,

    /// Definition of the underlying entity field, when it is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<FieldDefinition>,
}

impl IndexField {
    /// Entity property backing this field.
    pub fn property(&self) -> &str {
        self.property_path.as_deref().unwrap_or(&self.id)
    }
}

/// An entity datasource of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDatasource {
    /// Indexed entity type.
    pub entity_type: String,

    /// Bundles selected for indexing.
    #[serde(default)]
    pub bundles: Vec<String>,
}

impl IndexDatasource {
    /// Datasource id as stored in [`DATASOURCE_FIELD`].
    pub fn id(&self) -> String {
        datasource_id(&self.entity_type)
    }
}

/// Datasource id for an entity type.
pub fn datasource_id(entity_type: &str) -> String {
    format!("entity:{entity_type}")
}

fn default_true() -> bool {
    true
}

/// A search index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Machine name.
    pub id: String,

    /// Human-readable label.
    #[serde(default)]
    pub label: String,

    /// Disabled indexes are never queried.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Indexed entity types and bundles.
    #[serde(default)]
    pub datasources: Vec<IndexDatasource>,

    /// Indexed fields.
    #[serde(default)]
    pub fields: Vec<IndexField>,
}

impl IndexInfo {
    /// Look up a field by id.
    pub fn field(&self, id: &str) -> Option<&IndexField> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Type of a field, including the built-in fields every index carries.
    pub fn field_type(&self, id: &str) -> Option<IndexFieldType> {
        match id {
            DATASOURCE_FIELD | BUNDLE_FIELD | LANGUAGE_FIELD | LINK_SOURCE_ID_FIELD => {
                Some(IndexFieldType::String)
            }
            _ => self.field(id).map(|f| f.field_type),
        }
    }

    /// Ids of all fulltext fields.
    pub fn fulltext_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.field_type.is_fulltext())
            .map(|f| f.id.clone())
            .collect()
    }

    /// Whether the index covers `bundle` of `entity_type`.
    pub fn indexes_bundle(&self, entity_type: &str, bundle: &str) -> bool {
        self.datasources
            .iter()
            .any(|d| d.entity_type == entity_type && d.bundles.iter().any(|b| b == bundle))
    }
}

/// Comparison operator of a query condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
}

impl ConditionOperator {
    /// Symbol as written in queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Eq => "=",
            ConditionOperator::Ne => "<>",
            ConditionOperator::Gt => ">",
            ConditionOperator::Lt => "<",
            ConditionOperator::Gte => ">=",
            ConditionOperator::Lte => "<=",
            ConditionOperator::In => "IN",
            ConditionOperator::NotIn => "NOT IN",
        }
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// Matches fields without any value.
    Null,
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl ConditionValue {
    /// Single value as text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ConditionValue::Integer(i) => Some(i.to_string()),
            ConditionValue::Text(s) => Some(s.clone()),
            ConditionValue::Null | ConditionValue::List(_) => None,
        }
    }

    /// Values as a list; scalars become one-element lists.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            ConditionValue::List(items) => items.clone(),
            ConditionValue::Null => Vec::new(),
            other => other.as_text().into_iter().collect(),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Text(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::Text(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Integer(value)
    }
}

impl From<Vec<String>> for ConditionValue {
    fn from(value: Vec<String>) -> Self {
        ConditionValue::List(value)
    }
}

/// A single field condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub value: ConditionValue,
    pub operator: ConditionOperator,
}

/// How the members of a condition group combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

/// Member of a condition group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    Condition(Condition),
    Group(ConditionGroup),
}

/// A group of conditions combined by one conjunction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub conjunction: Conjunction,

    /// Tags such as `facet:<field>` marking the group's origin.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub conditions: Vec<ConditionNode>,
}

impl ConditionGroup {
    /// Create an empty group.
    pub fn new(conjunction: Conjunction) -> Self {
        Self {
            conjunction,
            ..Default::default()
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add a condition.
    pub fn add_condition(
        &mut self,
        field: impl Into<String>,
        value: impl Into<ConditionValue>,
        operator: ConditionOperator,
    ) -> &mut Self {
        self.conditions.push(ConditionNode::Condition(Condition {
            field: field.into(),
            value: value.into(),
            operator,
        }));
        self
    }

    /// Add a nested group.
    pub fn add_group(&mut self, group: ConditionGroup) -> &mut Self {
        self.conditions.push(ConditionNode::Group(group));
        self
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether the group carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    fn collect_conditions<'a>(&'a self, field: &str, out: &mut Vec<&'a Condition>) {
        for node in &self.conditions {
            match node {
                ConditionNode::Condition(c) if c.field == field => out.push(c),
                ConditionNode::Condition(_) => {}
                ConditionNode::Group(g) => g.collect_conditions(field, out),
            }
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

/// One sort key of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySort {
    pub field: String,
    pub direction: SortDirection,
}

/// Request for value counts on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRequest {
    /// Facet the counts are reported under.
    pub facet_id: String,

    /// Index field counted.
    pub field: String,

    /// OR facets count without their own condition group.
    pub operator: FilterOperator,

    /// Maximum number of buckets, 0 for unlimited.
    pub limit: usize,

    /// Buckets below this count are dropped.
    pub min_count: usize,

    /// Whether to report items without a value.
    pub missing: bool,
}

/// Tag put on the condition group a facet adds for `field`.
pub fn facet_tag(field: &str) -> String {
    format!("facet:{field}")
}

/// A query against one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub index_id: String,

    /// Top-level conditions, combined with AND.
    pub root: ConditionGroup,

    /// Fulltext keywords; all must match.
    #[serde(default)]
    pub keys: Vec<String>,

    /// Fields keywords are searched in; `None` means all fulltext fields.
    #[serde(default)]
    pub fulltext_fields: Option<Vec<String>>,

    #[serde(default)]
    pub sorts: Vec<QuerySort>,

    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    pub facets: Vec<FacetRequest>,

    /// Free-form tags for extensions.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Restrict results to these languages.
    #[serde(default)]
    pub languages: Option<Vec<String>>,
}

impl SearchQuery {
    /// Create an empty query.
    pub fn new(index_id: impl Into<String>) -> Self {
        Self {
            index_id: index_id.into(),
            root: ConditionGroup::new(Conjunction::And),
            keys: Vec::new(),
            fulltext_fields: None,
            sorts: Vec::new(),
            offset: 0,
            limit: None,
            facets: Vec::new(),
            tags: BTreeSet::new(),
            languages: None,
        }
    }

    /// Add a top-level condition.
    pub fn add_condition(
        &mut self,
        field: impl Into<String>,
        value: impl Into<ConditionValue>,
        operator: ConditionOperator,
    ) -> &mut Self {
        self.root.add_condition(field, value, operator);
        self
    }

    /// Add a top-level condition group. Empty groups are ignored.
    pub fn add_condition_group(&mut self, group: ConditionGroup) -> &mut Self {
        if !group.is_empty() {
            self.root.add_group(group);
        }
        self
    }

    /// Append a fulltext keyword.
    pub fn add_key(&mut self, key: impl Into<String>) -> &mut Self {
        let key = key.into();
        if !key.trim().is_empty() && !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    /// Restrict keyword search to `field` (in addition to earlier restrictions).
    pub fn add_fulltext_field(&mut self, field: impl Into<String>) -> &mut Self {
        let field = field.into();
        let fields = self.fulltext_fields.get_or_insert_with(Vec::new);
        if !fields.contains(&field) {
            fields.push(field);
        }
        self
    }

    /// Set the sort on `field`, replacing an existing sort on it in place.
    pub fn sort(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        let field = field.into();
        match self.sorts.iter_mut().find(|s| s.field == field) {
            Some(existing) => existing.direction = direction,
            None => self.sorts.push(QuerySort { field, direction }),
        }
        self
    }

    /// Direction of the sort on `field`, if any.
    pub fn sort_direction(&self, field: &str) -> Option<SortDirection> {
        self.sorts.iter().find(|s| s.field == field).map(|s| s.direction)
    }

    /// Set offset and limit.
    pub fn range(&mut self, offset: usize, limit: usize) -> &mut Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Request value counts for a facet.
    pub fn add_facet(&mut self, request: FacetRequest) -> &mut Self {
        self.facets.retain(|f| f.facet_id != request.facet_id);
        self.facets.push(request);
        self
    }

    /// All conditions on `field`, at any nesting depth.
    pub fn find_conditions(&self, field: &str) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.root.collect_conditions(field, &mut out);
        out
    }
}

/// A result item referencing an indexed entity translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Item id (`entity:<entity_type>/<id>:<langcode>`).
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub langcode: String,

    /// Relevance score for keyword queries.
    #[serde(default)]
    pub score: f64,

    /// Indexed field values.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ResultItem {
    /// Item id for an entity translation.
    pub fn item_id(entity_type: &str, entity_id: &str, langcode: &str) -> String {
        format!("entity:{entity_type}/{entity_id}:{langcode}")
    }

    /// Values of an indexed field.
    pub fn values(&self, field: &str) -> &[String] {
        self.fields.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Count of one raw value of a facet field. The raw value `!` counts items
/// without any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFacetValue {
    pub raw: String,
    pub count: usize,
}

/// Raw value reported for the missing bucket.
pub const MISSING_RAW_VALUE: &str = "!";

/// Result of executing a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Total number of matches, ignoring the range.
    pub result_count: usize,

    /// Matches within the requested range.
    pub items: Vec<ResultItem>,

    /// Raw value counts keyed by facet id.
    #[serde(default)]
    pub facets: BTreeMap<String, Vec<RawFacetValue>>,
}

/// Search backend used by the list engine.
pub trait IndexClient: Send + Sync {
    /// Look up an index definition.
    fn index(&self, index_id: &str) -> Option<IndexInfo>;

    /// All index definitions.
    fn indexes(&self) -> Vec<IndexInfo>;

    /// Start a query against an enabled index.
    fn create_query(&self, index_id: &str) -> Option<SearchQuery> {
        self.index(index_id)
            .filter(|index| index.enabled)
            .map(|index| SearchQuery::new(index.id))
    }

    /// Run a query. Backend failures propagate to the caller.
    fn execute(&self, query: &SearchQuery) -> anyhow::Result<ResultSet>;
}
