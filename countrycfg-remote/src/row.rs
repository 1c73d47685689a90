//! Row shape of the remote `country_configurations` table.
//!
//! The remote table only carries the headline fields of a configuration.
//! Packages, services and the intake form live in the local cache and
//! travel between contexts through the broadcast transport.

use chrono::{DateTime, Utc};
use countrycfg_types::CountryConfiguration;
use serde::{Deserialize, Deserializer, Serialize};

const DEFAULT_PROCESSING_TIME: &str = "5-7 business days";

/// One row of the remote table, keyed by `country_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRow {
    pub country_code: String,
    pub country_name: String,
    #[serde(rename = "is_active", default, deserialize_with = "nullable")]
    pub active: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub currency: String,
    #[serde(default, deserialize_with = "nullable")]
    pub language: String,
    #[serde(default, deserialize_with = "nullable")]
    pub time_zone: String,
    #[serde(default, deserialize_with = "nullable")]
    pub date_format: String,
    #[serde(default, deserialize_with = "nullable")]
    pub minimum_capital: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub minimum_directors: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub minimum_shareholders: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub requires_local_director: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub requires_local_address: bool,
    #[serde(default = "allowed", deserialize_with = "allowed_if_null")]
    pub allows_foreign_ownership: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub processing_time: String,
    #[serde(default, deserialize_with = "nullable")]
    pub popularity: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub benefits: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn allowed() -> bool {
    true
}

fn allowed_if_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(allowed))
}

impl CountryRow {
    /// Projects a configuration onto the remote row shape.
    pub fn from_config(config: &CountryConfiguration) -> Self {
        let legal = &config.legal_requirements;
        let non_empty = |s: &str, fallback: &str| {
            if s.trim().is_empty() { fallback.to_string() } else { s.to_string() }
        };

        Self {
            country_code: config.country_code.clone(),
            country_name: config.country_name.clone(),
            active: config.active,
            currency: non_empty(&config.currency, "USD"),
            language: non_empty(&config.localization.language, "en"),
            time_zone: non_empty(&config.localization.time_zone, "UTC"),
            date_format: non_empty(&config.localization.date_format, "MM/DD/YYYY"),
            minimum_capital: legal.minimum_capital.unwrap_or(0.0),
            minimum_directors: legal.minimum_directors.unwrap_or(1),
            minimum_shareholders: legal.minimum_shareholders.unwrap_or(1),
            requires_local_director: legal.local_director_required.unwrap_or(false),
            requires_local_address: legal.residency_requirement.unwrap_or(false),
            allows_foreign_ownership: allowed(),
            processing_time: non_empty(&config.timeframe, DEFAULT_PROCESSING_TIME),
            popularity: config.metadata.popularity.unwrap_or(0),
            description: config
                .metadata
                .description
                .clone()
                .unwrap_or_else(|| format!("Company formation in {}", config.country_name)),
            benefits: config.metadata.benefits.clone(),
            requirements: legal.required_documents.clone(),
            updated_at: config.metadata.last_updated,
        }
    }

    /// Overlays the row's fields onto `config`, keeping everything the row
    /// does not carry.
    pub fn apply_to(&self, config: &mut CountryConfiguration) {
        config.country_name = self.country_name.clone();
        config.active = self.active;
        if !self.currency.is_empty() {
            config.currency = self.currency.clone();
        }
        if !self.language.is_empty() {
            config.localization.language = self.language.clone();
        }
        if !self.time_zone.is_empty() {
            config.localization.time_zone = self.time_zone.clone();
        }
        if !self.date_format.is_empty() {
            config.localization.date_format = self.date_format.clone();
        }

        let legal = &mut config.legal_requirements;
        legal.minimum_capital = Some(self.minimum_capital);
        legal.minimum_directors = Some(self.minimum_directors);
        legal.minimum_shareholders = Some(self.minimum_shareholders);
        legal.local_director_required = Some(self.requires_local_director);
        legal.residency_requirement = Some(self.requires_local_address);
        legal.required_documents = self.requirements.clone();

        if !self.processing_time.is_empty() {
            config.timeframe = self.processing_time.clone();
        }
        config.metadata.popularity = Some(self.popularity);
        if !self.description.is_empty() {
            config.metadata.description = Some(self.description.clone());
        }
        config.metadata.benefits = self.benefits.clone();
        config.metadata.last_updated = self.updated_at;
    }

    /// Builds a configuration from the row alone. Packages, services and
    /// the intake form are left empty.
    pub fn to_config(&self) -> CountryConfiguration {
        let mut config = CountryConfiguration::new(&self.country_code, &self.country_name);
        self.apply_to(&mut config);
        config
    }
}

impl From<&CountryConfiguration> for CountryRow {
    fn from(config: &CountryConfiguration) -> Self {
        Self::from_config(config)
    }
}
