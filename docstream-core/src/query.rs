//! Query predicates for selecting documents from a collection.
//!
//! A [`Predicate`] is an opaque filter handed to the backend. Backends with a real query
//! engine translate it; the in-memory backend ignores it and returns the whole collection.
//!
//! ```ignore
//! use docstream::query::{Predicate, SortDirection};
//!
//! let predicate = Predicate::new()
//!     .where_eq("status", "active")
//!     .filter("age", Comparison::Gte, 18)
//!     .order_by("name", SortDirection::Asc)
//!     .limit(20);
//! ```

use bson::Bson;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Comparison applied between a document field and a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Field equals one of the values in an array.
    In,
    /// Field equals none of the values in an array.
    NotIn,
    /// Array field contains the value.
    ArrayContains,
}

/// A single `field <op> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Comparison,
    pub value: Bson,
}

/// Ordering applied to query results.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// A conjunction of conditions with optional ordering and limit.
///
/// An empty predicate matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    /// Conditions that must all hold.
    pub conditions: Vec<Condition>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition on `field`.
    pub fn filter(mut self, field: impl Into<String>, op: Comparison, value: impl Into<Bson>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Shorthand for an equality condition.
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.filter(field, Comparison::Eq, value)
    }

    /// Shorthand for an `In` condition over the given values.
    pub fn where_in<V>(self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Bson>,
    {
        let values = values
            .into_iter()
            .map(Into::into)
            .collect::<Vec<Bson>>();

        self.filter(field, Comparison::In, Bson::Array(values))
    }

    /// Orders results by `field`. A later call replaces an earlier one.
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Caps the number of returned documents.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if the predicate places no restriction on the result.
    pub fn is_unrestricted(&self) -> bool {
        self.conditions.is_empty() && self.limit.is_none()
    }
}
