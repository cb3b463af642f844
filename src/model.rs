// Core structs: Offer, OfferSettings, FacetCatalog and the error taxonomy
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Manufacturer constant stamped on every harvested offer.
pub const MAKE: &str = "Audi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferCategory {
    Finance,
    Promotion,
}

impl OfferCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferCategory::Finance => "finance",
            OfferCategory::Promotion => "promotion",
        }
    }

    /// Label used when describing the offer to the completion model.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            OfferCategory::Finance => "Financial",
            OfferCategory::Promotion => "Promotion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "finance" => Some(OfferCategory::Finance),
            "promotion" => Some(OfferCategory::Promotion),
            _ => None,
        }
    }
}

impl fmt::Display for OfferCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text of one offer article on a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOfferBlock {
    pub category: OfferCategory,
    pub text: String,
}

/// Structured attributes of a single offer block.
///
/// Every optional field stays `None` unless the offer text states it.
/// `full_offer` keeps the raw block text for auditing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferSettings {
    pub payment: Option<f64>,
    pub payment_label: Option<String>,
    pub term: Option<u32>,
    pub down_payment: Option<f64>,
    pub down_payment_label: Option<String>,
    pub expiration: Option<NaiveDate>,
    pub price: Option<String>,
    pub disclaimer: String,
    pub apr: Option<String>,
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub free_text: Option<String>,
    pub vin: Option<String>,
    pub msrp: Option<f64>,
    pub full_offer: String,
}

/// One listing paired with one offer block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub audience_model: String,
    pub make: String,
    pub model: Option<String>,
    pub trim: Option<String>,
    pub year: Option<i32>,
    #[serde(rename = "type")]
    pub offer_type: Option<OfferCategory>,
    pub offer_settings: OfferSettings,
}

/// Model, trim and year resolved from a listing's display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingIdentity {
    pub model: Option<String>,
    pub trim: Option<String>,
    pub year: Option<i32>,
}

impl Offer {
    pub fn new(
        audience_model: &str,
        identity: &ListingIdentity,
        category: OfferCategory,
        offer_settings: OfferSettings,
    ) -> Self {
        Self {
            audience_model: audience_model.to_string(),
            make: MAKE.to_string(),
            model: identity.model.clone(),
            trim: identity.trim.clone(),
            year: identity.year,
            offer_type: Some(category),
            offer_settings,
        }
    }
}

/// Vocabularies read from the search page sidebar. Built once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetCatalog {
    pub years: BTreeSet<i32>,
    pub styles: BTreeSet<String>,
    pub models: BTreeSet<String>,
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no element matches {0}")]
    NotFound(String),
    #[error("element handle is stale")]
    StaleElement,
    #[error("no page is loaded")]
    NoPage,
    #[error("invalid selector {0}")]
    InvalidSelector(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Http(String),
    #[error("completion request timed out")]
    Timeout,
    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unreadable completion envelope: {0}")]
    InvalidEnvelope(String),
    #[error("completion request could not be built: {0}")]
    InvalidRequest(String),
}

impl CompletionError {
    /// Network hiccups, timeouts, rate limits and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Http(_) | CompletionError::Timeout => true,
            CompletionError::Status { status, .. } => *status == 429 || *status >= 500,
            CompletionError::InvalidEnvelope(_) | CompletionError::InvalidRequest(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("completion response is not an offer record: {0}")]
    Format(String),
    #[error("completion service unavailable: {0}")]
    Service(#[from] CompletionError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("facet sidebar incomplete: {0}")]
    FacetNotFound(String),
    #[error("listing count changed: expected {expected}, found {found}")]
    ListingIntegrity { expected: usize, found: usize },
    #[error("browser failure: {0}")]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),
}
