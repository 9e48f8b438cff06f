use docstore_types::{Kind, Namespace};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::key::Key;
use crate::value::Value;

/// Comparison operator of a property filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Predicate over one property: `property <op> value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub op: FilterOp,
    pub value: Value,
}

impl PropertyFilter {
    pub fn new(property: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            property: property.into(),
            op,
            value,
        }
    }

    /// Evaluate the filter against an entity.
    ///
    /// Entities lacking the property, or holding a value of another type,
    /// never match.
    pub fn matches(&self, entity: &Entity) -> bool {
        use std::cmp::Ordering::*;

        let Some(actual) = entity.get(&self.property) else {
            return false;
        };
        match (self.op, actual.compare(&self.value)) {
            (_, None) => false,
            (FilterOp::Equal, Some(ord)) => ord == Equal,
            (FilterOp::LessThan, Some(ord)) => ord == Less,
            (FilterOp::LessThanOrEqual, Some(ord)) => ord != Greater,
            (FilterOp::GreaterThan, Some(ord)) => ord == Greater,
            (FilterOp::GreaterThanOrEqual, Some(ord)) => ord != Less,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Sort order on one property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOrder {
    pub property: String,
    pub direction: Direction,
}

/// Opaque position in a query's result set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(Vec<u8>);

impl Cursor {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A structured query over one kind in one namespace.
///
/// A query with an ancestor only returns descendants of that key and is
/// strongly consistent; other queries are eventually consistent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub namespace: Namespace,
    pub kind: Kind,
    pub ancestor: Option<Key>,
    pub filters: Vec<PropertyFilter>,
    pub order: Vec<PropertyOrder>,
    /// Maximum number of results across all pages.
    pub limit: Option<usize>,
    pub keys_only: bool,
    pub start_cursor: Option<Cursor>,
}

impl Query {
    /// A query returning every entity of `kind` in `namespace`.
    pub fn kind(namespace: Namespace, kind: Kind) -> Self {
        Self {
            namespace,
            kind,
            ancestor: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            keys_only: false,
            start_cursor: None,
        }
    }

    pub fn ancestor(mut self, ancestor: Key) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    pub fn filter(mut self, filter: PropertyFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.order.push(PropertyOrder {
            property: property.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn start_at(mut self, cursor: Cursor) -> Self {
        self.start_cursor = Some(cursor);
        self
    }
}

/// One page of query results.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPage {
    pub entities: Vec<Entity>,
    /// Cursor positioned after the last entity of this page.
    pub end_cursor: Cursor,
    /// `true` if another page may follow.
    pub more_results: bool,
}
