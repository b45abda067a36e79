//! Boundary for free-text explanations of a finished profile.
//!
//! The engine never talks to a text-generation service itself. It builds an
//! [`ExplanationRequest`] (a field-keyed snapshot of the profile plus the caller's
//! question) and hands it to whatever [`ExplanationService`] the caller supplies.
//! No conversation state is kept between requests.
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use field_guard::explain::{ExplanationRequest, ExplanationService};
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl ExplanationService for Canned {
//!     async fn explain(&self, request: &ExplanationRequest) -> field_guard::error::Result<String> {
//!         Ok(format!("{} fields profiled", request.snapshot.fields.len()))
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::analyzers::inference::SemanticType;
use crate::analyzers::profile::{AnalysisProfile, RuleStrength, TypeSummary};
use crate::error::{EngineError, Result};

/// What an explanation service sees of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub semantic_type: SemanticType,
    pub missing_ratio: f64,
    pub distinct_count: usize,
    pub summary: TypeSummary,
    /// Statements of the field's rules, in rule order
    pub rules: Vec<String>,
    pub enforced_rules: usize,
    pub outlier_count: usize,
}

/// Read-only, serializable subset of a profile keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub dataset: String,
    pub row_count: usize,
    pub fields: BTreeMap<String, FieldSummary>,
    /// Relationship rule statements touching any included field
    pub relationships: Vec<String>,
}

impl ProfileSnapshot {
    /// Snapshot of every column.
    pub fn from_profile(profile: &AnalysisProfile) -> Self {
        let names: Vec<&str> = profile.columns.iter().map(|c| c.name.as_str()).collect();
        Self::build(profile, &names)
    }

    /// Snapshot of the named columns only.
    pub fn for_fields(profile: &AnalysisProfile, fields: &[&str]) -> Result<Self> {
        if let Some(missing) = fields.iter().find(|f| profile.column(f).is_none()) {
            return Err(EngineError::ColumnNotFound {
                column: missing.to_string(),
            });
        }
        Ok(Self::build(profile, fields))
    }

    fn build(profile: &AnalysisProfile, fields: &[&str]) -> Self {
        let mut summaries = BTreeMap::new();
        for column in profile.columns.iter().filter(|c| fields.contains(&c.name.as_str())) {
            let own_rules: Vec<_> = profile
                .rules
                .iter()
                .filter(|r| r.field == column.name && r.related_field.is_none())
                .collect();
            summaries.insert(
                column.name.clone(),
                FieldSummary {
                    semantic_type: column.semantic_type,
                    missing_ratio: column.missing_ratio,
                    distinct_count: column.distinct_count,
                    summary: column.summary.clone(),
                    rules: own_rules.iter().map(|r| r.statement.clone()).collect(),
                    enforced_rules: own_rules
                        .iter()
                        .filter(|r| r.strength == RuleStrength::Enforced)
                        .count(),
                    outlier_count: profile
                        .outliers
                        .iter()
                        .filter(|o| o.column == column.name)
                        .count(),
                },
            );
        }

        let relationships = profile
            .rules
            .iter()
            .filter(|r| {
                r.related_field.as_deref().is_some_and(|other| {
                    fields.contains(&r.field.as_str()) || fields.contains(&other)
                })
            })
            .map(|r| r.statement.clone())
            .collect();

        Self {
            dataset: profile.dataset.name.clone(),
            row_count: profile.dataset.row_count,
            fields: summaries,
            relationships,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A one-shot question about a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationRequest {
    pub snapshot: ProfileSnapshot,
    pub query: String,
}

impl ExplanationRequest {
    pub fn new(snapshot: ProfileSnapshot, query: impl Into<String>) -> Self {
        Self {
            snapshot,
            query: query.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An external service that answers questions about a profile.
#[async_trait]
pub trait ExplanationService: Send + Sync {
    /// Returns a free-text answer; failures should use [`EngineError::Explanation`].
    async fn explain(&self, request: &ExplanationRequest) -> Result<String>;
}

/// Builds a request for `fields` (all fields when `None`) and passes it to `service`.
#[instrument(skip(service, profile), fields(dataset = %profile.dataset.name))]
pub async fn explain_profile(
    service: &dyn ExplanationService,
    profile: &AnalysisProfile,
    fields: Option<&[&str]>,
    query: &str,
) -> Result<String> {
    let snapshot = match fields {
        Some(fields) => ProfileSnapshot::for_fields(profile, fields)?,
        None => ProfileSnapshot::from_profile(profile),
    };
    debug!(fields = snapshot.fields.len(), "Requesting explanation");
    service
        .explain(&ExplanationRequest::new(snapshot, query))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::AnalysisRunner;
    use crate::test_fixtures::{correlated_dataset, deterministic_config, orders_dataset};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<ExplanationRequest>>,
    }

    #[async_trait]
    impl ExplanationService for Recording {
        async fn explain(&self, request: &ExplanationRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(format!("{} fields", request.snapshot.fields.len()))
        }
    }

    struct Unavailable;

    #[async_trait]
    impl ExplanationService for Unavailable {
        async fn explain(&self, _request: &ExplanationRequest) -> Result<String> {
            Err(EngineError::explanation("service unavailable"))
        }
    }

    async fn profile(dataset: crate::dataset::Dataset) -> AnalysisProfile {
        AnalysisRunner::new(deterministic_config())
            .run_async(&dataset)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_subset() {
        let profile = profile(orders_dataset()).await;
        let snapshot = ProfileSnapshot::for_fields(&profile, &["amount", "paid"]).unwrap();
        assert_eq!(
            snapshot.fields.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["amount", "paid"]
        );
        let amount = &snapshot.fields["amount"];
        assert_eq!(amount.semantic_type, SemanticType::Numeric);
        assert!(amount.outlier_count > 0);
        assert!(amount.enforced_rules > 0);

        let missing = ProfileSnapshot::for_fields(&profile, &["nope"]);
        assert!(matches!(missing, Err(EngineError::ColumnNotFound { .. })));
    }

    #[tokio::test]
    async fn test_relationship_statements_follow_fields() {
        let profile = profile(correlated_dataset()).await;
        let snapshot = ProfileSnapshot::for_fields(&profile, &["weight"]).unwrap();
        assert_eq!(snapshot.relationships.len(), 1);
        assert!(snapshot.relationships[0].contains("`height`"));
    }

    #[tokio::test]
    async fn test_service_receives_request_verbatim() {
        let profile = profile(orders_dataset()).await;
        let service = Recording::default();
        let answer = explain_profile(&service, &profile, None, "Which fields are risky?")
            .await
            .unwrap();
        assert_eq!(answer, format!("{} fields", profile.columns.len()));

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].query, "Which fields are risky?");
        assert!(seen[0].to_json().unwrap().contains("\"query\""));
    }

    #[tokio::test]
    async fn test_service_errors_propagate() {
        let profile = profile(orders_dataset()).await;
        let result = explain_profile(&Unavailable, &profile, Some(&["amount"]), "why?").await;
        assert!(matches!(result, Err(EngineError::Explanation(_))));
    }
}
