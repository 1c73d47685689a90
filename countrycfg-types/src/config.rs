//! `CountryConfiguration` and its parts.

use crate::form::FormSection;
use crate::{ConfigError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Business configuration for one jurisdiction.
///
/// Keyed by `country_code`. `metadata.last_updated` decides which of two
/// versions of the same code wins when they meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryConfiguration {
    pub country_code: String,
    pub country_name: String,
    pub active: bool,
    #[serde(default)]
    pub base_price: f64,
    #[serde(default)]
    pub timeframe: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub company_details_form: CompanyDetailsForm,
    #[serde(default)]
    pub packages: Vec<CountryPackage>,
    #[serde(default)]
    pub services: Vec<CountryService>,
    #[serde(default)]
    pub legal_requirements: LegalRequirements,
    #[serde(default)]
    pub localization: Localization,
    #[serde(default)]
    pub metadata: ConfigMetadata,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl CountryConfiguration {
    /// Creates an inactive, content-empty configuration for `code`.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            country_code: code.into(),
            country_name: name.into(),
            active: false,
            base_price: 0.0,
            timeframe: String::new(),
            currency: default_currency(),
            company_details_form: CompanyDetailsForm::default(),
            packages: Vec::new(),
            services: Vec::new(),
            legal_requirements: LegalRequirements::default(),
            localization: Localization::default(),
            metadata: ConfigMetadata::default(),
        }
    }

    /// Creates the bootstrap stub for a jurisdiction that is not onboarded yet.
    ///
    /// Stubs carry no `last_updated`, so any stamped copy of the same code
    /// outranks them.
    #[must_use]
    pub fn placeholder(
        code: impl Into<String>,
        name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let mut config = Self::new(code, name);
        config.timeframe = "0 days".to_string();
        config.legal_requirements = LegalRequirements {
            minimum_capital: Some(0.0),
            minimum_directors: Some(1),
            minimum_shareholders: Some(1),
            minimum_age: Some(18),
            residency_requirement: Some(false),
            local_director_required: Some(false),
            corporate_director_allowed: Some(true),
            ..LegalRequirements::default()
        };
        config.localization.number_format = "#,##0.00".to_string();
        config.metadata = ConfigMetadata {
            consultant_required: true,
            estimated_processing_time: "0 days".to_string(),
            supported_languages: vec!["en".to_string()],
            region: Some(region.into()),
            popularity: Some(0),
            difficulty: Some("medium".to_string()),
            processing_time: Some("0 days".to_string()),
            tags: vec!["passive".to_string(), "coming-soon".to_string()],
            version: Some("1.0.0".to_string()),
            ..ConfigMetadata::default()
        };
        config
    }

    /// Whether this is a placeholder: inactive with no packages, services
    /// or form sections.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        !self.active
            && self.packages.is_empty()
            && self.services.is_empty()
            && self.company_details_form.sections.is_empty()
    }

    /// Checks the identity fields every write needs.
    pub fn validate_identity(&self) -> Result<()> {
        if self.country_code.trim().is_empty() {
            return Err(ConfigError::MissingField("countryCode"));
        }
        if self.country_name.trim().is_empty() {
            return Err(ConfigError::MissingField("countryName"));
        }
        Ok(())
    }

    /// The `lastUpdated` stamp, if any.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.metadata.last_updated
    }

    /// Compares two versions of the same jurisdiction by `last_updated`.
    ///
    /// A missing stamp ranks lowest. Content plays no part, so a newer
    /// deactivated copy outranks an older configured one.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.last_updated().cmp(&other.last_updated())
    }

    /// Whether `self` should replace `other` under last-write-wins.
    ///
    /// Equal ranks keep the existing entry.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        self.rank_cmp(other) == Ordering::Greater
    }

    /// Available packages, sorted ascending by `order`.
    #[must_use]
    pub fn available_packages(&self) -> Vec<CountryPackage> {
        let mut packages: Vec<_> = self.packages.iter().filter(|p| p.available).cloned().collect();
        packages.sort_by_key(|p| p.order);
        packages
    }

    /// Available services, sorted ascending by `order`.
    #[must_use]
    pub fn available_services(&self) -> Vec<CountryService> {
        let mut services: Vec<_> = self.services.iter().filter(|s| s.available).cloned().collect();
        services.sort_by_key(|s| s.order);
        services
    }

    /// Form sections sorted by `order`, each with its fields sorted too.
    #[must_use]
    pub fn ordered_sections(&self) -> Vec<FormSection> {
        let mut sections: Vec<_> = self
            .company_details_form
            .sections
            .iter()
            .map(FormSection::with_ordered_fields)
            .collect();
        sections.sort_by_key(|s| s.order);
        sections
    }
}

/// Container for the form sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyDetailsForm {
    #[serde(default)]
    pub sections: Vec<FormSection>,
}

/// A pricing tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryPackage {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub popular: bool,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub available: bool,
    pub order: i32,
}

/// An add-on service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryService {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub available: bool,
    #[serde(default)]
    pub required: bool,
    pub order: i32,
    /// Service ids that must be selected first.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Jurisdiction constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_shareholders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_shareholders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_directors: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residency_requirement: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_director_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corporate_director_allowed: Option<bool>,
    #[serde(default)]
    pub allowed_business_types: Vec<String>,
    #[serde(default)]
    pub restricted_business_types: Vec<String>,
    #[serde(default)]
    pub compliance_requirements: Vec<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub company_types: Vec<CompanyType>,
}

/// A legal entity type offered in a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyType {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Locale settings for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Localization {
    pub currency: String,
    pub date_format: String,
    pub time_zone: String,
    pub language: String,
    #[serde(default)]
    pub number_format: String,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
}

impl Default for Localization {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            date_format: "MM/DD/YYYY".to_string(),
            time_zone: "UTC".to_string(),
            language: "en".to_string(),
            number_format: String::new(),
            translations: BTreeMap::new(),
        }
    }
}

/// Free-form annotations. `last_updated` drives conflict resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMetadata {
    #[serde(default)]
    pub consultant_required: bool,
    #[serde(default)]
    pub estimated_processing_time: String,
    #[serde(default)]
    pub supported_languages: Vec<String>,
    #[serde(default)]
    pub special_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
}
