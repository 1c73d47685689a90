//! Built-in configurations every context starts from.
//!
//! Fully configured jurisdictions ship as JSON in `data/`. Jurisdictions
//! not onboarded yet get a placeholder so their code is reserved.
//! Neither carries a `lastUpdated` stamp, so anything persisted or
//! received later outranks them.

use crate::error::SyncResult;
use countrycfg_types::CountryConfiguration;

const DEFAULT_CONFIGURATIONS: &str = include_str!("../data/default_configurations.json");

/// Jurisdictions reserved with a placeholder: `(code, name, region)`.
pub const PASSIVE_JURISDICTIONS: &[(&str, &str, &str)] = &[
    ("US", "United States", "North America"),
    ("AE", "United Arab Emirates", "Middle East"),
    ("EE", "Estonia", "Europe"),
    ("MT", "Malta", "Europe"),
    ("PT", "Portugal", "Europe"),
    ("PA", "Panama", "Central America"),
    ("CH", "Switzerland", "Europe"),
    ("SG", "Singapore", "Asia"),
    ("NL", "Netherlands", "Europe"),
    ("IE", "Ireland", "Europe"),
    ("GI", "Gibraltar", "Europe"),
    ("LT", "Lithuania", "Europe"),
    ("CA", "Canada", "North America"),
    ("BG", "Bulgaria", "Europe"),
    ("ES", "Spain", "Europe"),
    ("ME", "Montenegro", "Europe"),
    ("NO", "Norway", "Europe"),
];

/// The fully configured built-in jurisdictions.
pub fn default_configurations() -> SyncResult<Vec<CountryConfiguration>> {
    Ok(serde_json::from_str(DEFAULT_CONFIGURATIONS)?)
}

/// Placeholders for every passive jurisdiction.
pub fn passive_configurations() -> Vec<CountryConfiguration> {
    PASSIVE_JURISDICTIONS
        .iter()
        .map(|(code, name, region)| CountryConfiguration::placeholder(*code, *name, *region))
        .collect()
}
