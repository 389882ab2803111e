// src/model.rs
//! Shared records flowing between the pipeline stages and the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Marker stored in place of a value when no AUM figure could be determined.
pub const UNAVAILABLE_SENTINEL: &str = "NAO_DISPONIVEL";

/// Which URL field of an organization produced a given attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Website,
    Linkedin,
    Instagram,
    X,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Website => "website",
            SourceKind::Linkedin => "linkedin",
            SourceKind::Instagram => "instagram",
            SourceKind::X => "x",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload used to register an organization (API and seed file).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewOrganization {
    pub name: String,
    #[serde(default)]
    pub url_site: Option<String>,
    #[serde(default)]
    pub url_linkedin: Option<String>,
    #[serde(default)]
    pub url_instagram: Option<String>,
    #[serde(default)]
    pub url_x: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub url_site: Option<String>,
    pub url_linkedin: Option<String>,
    pub url_instagram: Option<String>,
    pub url_x: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Non-empty URL fields in fixed processing order: website, LinkedIn, Instagram, X.
    pub fn sources(&self) -> Vec<(SourceKind, String)> {
        [
            (SourceKind::Website, &self.url_site),
            (SourceKind::Linkedin, &self.url_linkedin),
            (SourceKind::Instagram, &self.url_instagram),
            (SourceKind::X, &self.url_x),
        ]
        .into_iter()
        .filter_map(|(kind, url)| {
            url.as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(|u| (kind, u.to_string()))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
}

/// One log row per (organization, url) per run. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceAttempt {
    pub organization_id: i64,
    pub url: String,
    pub status: AttemptStatus,
    pub content_length: usize,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of extracting an AUM figure from one excerpt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionOutcome {
    /// Display string (e.g. `R$ 2.3 BI`) or [`UNAVAILABLE_SENTINEL`].
    pub aum_value: String,
    pub aum_numeric: Option<f64>,
    pub aum_unit: Option<String>,
    pub confidence_score: f64,
    pub is_available: bool,
    pub source_url: String,
    pub source_type: String,
}

impl ExtractionOutcome {
    pub fn unavailable(source_url: &str) -> Self {
        Self {
            aum_value: UNAVAILABLE_SENTINEL.to_string(),
            aum_numeric: None,
            aum_unit: None,
            confidence_score: 0.0,
            is_available: false,
            source_url: source_url.to_string(),
            source_type: "ai_extraction".to_string(),
        }
    }
}

/// Persisted form of an available [`ExtractionOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AumSnapshot {
    pub organization_id: i64,
    pub aum_value: String,
    pub aum_numeric: Option<f64>,
    pub aum_unit: Option<String>,
    pub source_url: String,
    pub source_type: SourceKind,
    pub confidence_score: f64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

/// Token/cost accounting for one UTC calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpendLedger {
    pub date: NaiveDate,
    pub total_tokens: u64,
    pub requests_count: u64,
    pub cost_usd: f64,
}

impl SpendLedger {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_tokens: 0,
            requests_count: 0,
            cost_usd: 0.0,
        }
    }
}

/// Per-source entry of an organization result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceResult {
    pub url: String,
    pub source_kind: SourceKind,
    pub status: AttemptStatus,
    pub content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aum: Option<ExtractionOutcome>,
}

impl SourceResult {
    pub fn aum_found(&self) -> bool {
        self.aum.as_ref().is_some_and(|a| a.is_available)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganizationResult {
    pub organization_id: i64,
    pub organization_name: String,
    pub scraped_urls: Vec<SourceResult>,
    pub aum_found: bool,
    pub aum_snapshots: Vec<ExtractionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrganizationResult {
    pub fn new(org: &Organization) -> Self {
        Self {
            organization_id: org.id,
            organization_name: org.name.clone(),
            scraped_urls: Vec::new(),
            aum_found: false,
            aum_snapshots: Vec::new(),
            error: None,
        }
    }

    /// Result for a task that died before producing its own result.
    pub fn failed(organization_id: i64, organization_name: String, error: String) -> Self {
        Self {
            organization_id,
            organization_name,
            scraped_urls: Vec::new(),
            aum_found: false,
            aum_snapshots: Vec::new(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    pub message: String,
    pub companies_processed: usize,
    pub successful_scrapes: usize,
    pub failed_scrapes: usize,
    pub results: Vec<OrganizationResult>,
}

impl BatchResult {
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            companies_processed: 0,
            successful_scrapes: 0,
            failed_scrapes: 0,
            results: Vec::new(),
        }
    }
}
