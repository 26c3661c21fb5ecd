//! Reviewer authority lookup
//!
//! Authority is an external capability: an identity maps to a value in
//! [0, 1]. The directory also knows which reviewers serve a scope, used
//! when a validation task needs an assignee.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::Scope;

/// Authority assumed for identities the directory does not know
pub const DEFAULT_AUTHORITY: f64 = 0.5;

/// Injected authority and reviewer-pool lookup
pub trait AuthorityDirectory: Send + Sync {
    /// Raw authority for an identity, `None` if unknown
    fn authority_of(&self, identity: &str) -> Option<f64>;

    /// Reviewers responsible for a repository or workspace
    fn reviewers_for(&self, scope: &Scope) -> Vec<String>;

    /// Every known reviewer; the escalation pool
    fn all_reviewers(&self) -> Vec<String>;

    /// Authority clamped to [0, 1], defaulting to [`DEFAULT_AUTHORITY`]
    fn authority(&self, identity: &str) -> f64 {
        self.authority_of(identity)
            .filter(|a| a.is_finite())
            .map(|a| a.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_AUTHORITY)
    }
}

/// Knows nobody: every identity gets the default authority, no reviewers
///
/// # Example
/// ```
/// use memora_core::authority::{AuthorityDirectory, NoopAuthorityDirectory, DEFAULT_AUTHORITY};
///
/// let dir = NoopAuthorityDirectory;
/// assert_eq!(dir.authority("anyone"), DEFAULT_AUTHORITY);
/// assert!(dir.all_reviewers().is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuthorityDirectory;

impl AuthorityDirectory for NoopAuthorityDirectory {
    fn authority_of(&self, _identity: &str) -> Option<f64> {
        None
    }

    fn reviewers_for(&self, _scope: &Scope) -> Vec<String> {
        Vec::new()
    }

    fn all_reviewers(&self) -> Vec<String> {
        Vec::new()
    }
}

/// In-memory directory, typically loaded from configuration
///
/// # Example
/// ```
/// use memora_core::authority::{AuthorityDirectory, StaticAuthorityDirectory};
/// use memora_core::model::Scope;
///
/// let scope = Scope::Repository("acme/api".to_string());
/// let dir = StaticAuthorityDirectory::new()
///     .with_identity("alice", 0.9)
///     .with_reviewer(scope.clone(), "alice");
/// assert_eq!(dir.authority("alice"), 0.9);
/// assert_eq!(dir.reviewers_for(&scope), vec!["alice".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorityDirectory {
    authority: BTreeMap<String, f64>,
    pools: BTreeMap<Scope, BTreeSet<String>>,
}

impl StaticAuthorityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, identity: impl Into<String>, authority: f64) -> Self {
        self.authority.insert(identity.into(), authority);
        self
    }

    pub fn with_reviewer(mut self, scope: Scope, identity: impl Into<String>) -> Self {
        self.pools.entry(scope).or_default().insert(identity.into());
        self
    }
}

impl AuthorityDirectory for StaticAuthorityDirectory {
    fn authority_of(&self, identity: &str) -> Option<f64> {
        self.authority.get(identity).copied()
    }

    fn reviewers_for(&self, scope: &Scope) -> Vec<String> {
        self.pools
            .get(scope)
            .map(|pool| pool.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn all_reviewers(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self.pools.values().flatten().collect();
        all.into_iter().cloned().collect()
    }
}
