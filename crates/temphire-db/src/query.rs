//! # Entity Queries
//!
//! A query names the resource it targets, carries a predicate and
//! optionally pins the fetch strategy it runs under.
//!
//! ```rust
//! use temphire_core::{FetchStrategy, Predicate};
//! use temphire_db::EntityQuery;
//!
//! let query = EntityQuery::from_resource("StaffingResources")
//!     .where_(Predicate::eq("lastName", "Smith"))
//!     .using(FetchStrategy::FromLocalCache);
//!
//! assert_eq!(query.resource_name(), "StaffingResources");
//! assert_eq!(query.fetch_strategy(), Some(FetchStrategy::FromLocalCache));
//! ```

use temphire_core::{FetchStrategy, Predicate};

/// Immutable description of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    resource_name: String,
    predicate: Predicate,
    fetch_strategy: Option<FetchStrategy>,
}

impl EntityQuery {
    /// Base query returning everything in a resource.
    pub fn from_resource(resource_name: impl Into<String>) -> Self {
        EntityQuery {
            resource_name: resource_name.into(),
            predicate: Predicate::True,
            fetch_strategy: None,
        }
    }

    /// Narrows the query; repeated calls AND the predicates together.
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.predicate = self.predicate & predicate;
        self
    }

    /// Pins the fetch strategy.
    pub fn using(mut self, strategy: FetchStrategy) -> Self {
        self.fetch_strategy = Some(strategy);
        self
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Strategy pinned with [`using`](Self::using), if any.
    pub fn fetch_strategy(&self) -> Option<FetchStrategy> {
        self.fetch_strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_ands_predicates() {
        let query = EntityQuery::from_resource("People")
            .where_(Predicate::eq("lastName", "Smith"))
            .where_(Predicate::eq("firstName", "Jane"));

        assert_eq!(
            query.predicate(),
            &(Predicate::eq("lastName", "Smith") & Predicate::eq("firstName", "Jane"))
        );
        assert_eq!(query.fetch_strategy(), None);
    }

    #[test]
    fn test_base_query_matches_everything() {
        assert!(EntityQuery::from_resource("People").predicate().is_true());
    }
}
