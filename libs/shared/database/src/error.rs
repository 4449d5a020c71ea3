use thiserror::Error;

use crate::supabase::{is_constraint_violation, is_transient};

/// Failure reported by a persistence collaborator, classified only as far as
/// callers need to decide on retry and compensation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Network-level or upstream failure; the caller may retry with backoff.
    #[error("Transient store failure: {0}")]
    Transient(String),

    /// The store rejected the write because of a uniqueness or integrity rule.
    #[error("Store constraint violated: {0}")]
    Constraint(String),

    #[error("Store failure: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        if is_transient(&err) {
            StoreError::Transient(err.to_string())
        } else if is_constraint_violation(&err) {
            StoreError::Constraint(err.to_string())
        } else {
            StoreError::Persistence(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Persistence(format!("Failed to parse store response: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::SupabaseError;

    #[test]
    fn classifies_supabase_errors() {
        let transient: StoreError = anyhow::Error::from(SupabaseError::Api {
            status: 502,
            message: "bad gateway".into(),
        }).into();
        assert!(transient.is_transient());

        let constraint: StoreError = anyhow::Error::from(SupabaseError::Constraint(
            "23505".into(),
        )).into();
        assert!(matches!(constraint, StoreError::Constraint(_)));

        let other: StoreError = anyhow::anyhow!("unexpected payload").into();
        assert!(matches!(other, StoreError::Persistence(_)));
    }
}
