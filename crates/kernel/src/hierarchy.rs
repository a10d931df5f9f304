//! Hierarchy resolution for hierarchy-aware filter operators.
//!
//! Entity types opt in by registering a [`HierarchyHandler`]. Types without a
//! handler are not hierarchy-capable and expand to nothing.

use std::collections::{HashMap, HashSet, VecDeque};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::Entity;

/// Maximum depth walked when expanding a hierarchy.
const MAX_HIERARCHY_DEPTH: usize = 100;

/// Returns the ids related to a value within one entity type's hierarchy.
pub trait HierarchyHandler: Send + Sync {
    /// The value itself plus its related ids, or `None` when the value is unknown.
    fn hierarchy(&self, raw_value: &str) -> Option<Vec<String>>;
}

/// Outcome of a hierarchy lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyLookup {
    /// No handler is registered for the entity type.
    Unsupported,
    /// The handler exists but does not know the value.
    NotFound,
    /// The value and its related ids, value first.
    Resolved(Vec<String>),
}

/// Registry of hierarchy handlers keyed by entity type.
#[derive(Default)]
pub struct HierarchyResolver {
    handlers: HashMap<String, Box<dyn HierarchyHandler>>,
}

impl HierarchyResolver {
    /// Create a resolver with no hierarchy-capable entity types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for an entity type, replacing any previous one.
    pub fn register(&mut self, entity_type: impl Into<String>, handler: Box<dyn HierarchyHandler>) {
        self.handlers.insert(entity_type.into(), handler);
    }

    /// Whether the entity type is hierarchy-capable.
    pub fn supports(&self, entity_type: &str) -> bool {
        self.handlers.contains_key(entity_type)
    }

    /// Look up the hierarchy of a value, distinguishing why nothing was found.
    pub fn lookup(&self, entity_type: &str, raw_value: &str) -> HierarchyLookup {
        let Some(handler) = self.handlers.get(entity_type) else {
            return HierarchyLookup::Unsupported;
        };
        match handler.hierarchy(raw_value) {
            Some(ids) => {
                debug!(entity_type, value = raw_value, expanded = ids.len(), "hierarchy expanded");
                HierarchyLookup::Resolved(ids)
            }
            None => HierarchyLookup::NotFound,
        }
    }

    /// The hierarchy of a value; empty when unsupported or unknown.
    pub fn get_hierarchy(&self, entity_type: &str, raw_value: &str) -> Vec<String> {
        match self.lookup(entity_type, raw_value) {
            HierarchyLookup::Resolved(ids) => ids,
            HierarchyLookup::Unsupported | HierarchyLookup::NotFound => Vec::new(),
        }
    }
}

/// Which relatives a term hierarchy returns alongside the term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyDirection {
    #[default]
    Descendants,
    Ancestors,
    Both,
}

/// Parent/child hierarchy over terms, built from a parent reference field.
pub struct TermHierarchy {
    direction: HierarchyDirection,
    /// term id -> parent ids
    parents: DashMap<String, Vec<String>>,
    /// term id -> child ids
    children: DashMap<String, Vec<String>>,
}

impl TermHierarchy {
    /// Create an empty hierarchy.
    pub fn new(direction: HierarchyDirection) -> Self {
        Self {
            direction,
            parents: DashMap::new(),
            children: DashMap::new(),
        }
    }

    /// Build from terms whose `parent_field` references their parents.
    pub fn from_entities<'a>(
        entities: impl IntoIterator<Item = &'a Entity>,
        parent_field: &str,
        direction: HierarchyDirection,
    ) -> Self {
        let hierarchy = Self::new(direction);
        for entity in entities {
            let parents = entity.field_strings(parent_field);
            hierarchy.add_term(&entity.id, parents);
        }
        hierarchy
    }

    /// Add a term with its parents. Roots pass no parents (or "0").
    pub fn add_term(&self, id: &str, parents: Vec<String>) {
        let parents: Vec<String> = parents.into_iter().filter(|p| p != "0" && p != id).collect();
        for parent in &parents {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(id.to_string());
        }
        self.parents.insert(id.to_string(), parents);
    }

    fn walk(
        &self,
        start: &str,
        edges: &DashMap<String, Vec<String>>,
        out: &mut Vec<String>,
        seen: &mut HashSet<String>,
    ) {
        let mut queue = VecDeque::from([(start.to_string(), 0usize)]);
        while let Some((id, depth)) = queue.pop_front() {
            if depth >= MAX_HIERARCHY_DEPTH {
                continue;
            }
            let next: Vec<String> = edges.get(&id).map(|v| v.clone()).unwrap_or_default();
            for related in next {
                if seen.insert(related.clone()) {
                    out.push(related.clone());
                    queue.push_back((related, depth + 1));
                }
            }
        }
    }
}

impl HierarchyHandler for TermHierarchy {
    fn hierarchy(&self, raw_value: &str) -> Option<Vec<String>> {
        if !self.parents.contains_key(raw_value) {
            return None;
        }

        let mut out = vec![raw_value.to_string()];
        let mut seen = HashSet::from([raw_value.to_string()]);

        if matches!(self.direction, HierarchyDirection::Descendants | HierarchyDirection::Both) {
            self.walk(raw_value, &self.children, &mut out, &mut seen);
        }
        if matches!(self.direction, HierarchyDirection::Ancestors | HierarchyDirection::Both) {
            self.walk(raw_value, &self.parents, &mut out, &mut seen);
        }

        Some(out)
    }
}
