//! Read-only queries
//!
//! Results are deterministically ordered and never mutate the store.

pub mod decision_queries;

pub use decision_queries::{
    decision_get, decision_list, decision_stats, evidence_trace, task_list, DecisionDetail,
    DecisionFilters, DecisionStats, PaginatedDecisions, PaginationParams, TaskFilters,
};
