//! Core type definitions for country configuration sync.
//!
//! This crate defines the data shared by every layer of the sync stack:
//! - `CountryConfiguration`, the unit of synchronization, with its packages,
//!   services, intake form, legal requirements and localization
//! - Execution context identifiers (UUID v7)
//! - Timestamp advancement for `metadata.lastUpdated`
//!
//! Nothing here performs I/O.

mod config;
mod form;
mod ids;
pub mod timestamp;

pub use config::{
    CompanyDetailsForm, CompanyType, ConfigMetadata, CountryConfiguration, CountryPackage,
    CountryService, LegalRequirements, Localization,
};
pub use form::{FieldKind, FieldOption, FieldValidation, FormField, FormSection, SectionCondition};
pub use ids::ContextId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("country code mismatch: expected {expected}, got {actual}")]
    CodeMismatch { expected: String, actual: String },
}
