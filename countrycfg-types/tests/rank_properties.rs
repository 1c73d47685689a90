//! Property tests for the last-write-wins ranking.
//!
//! Merging by rank must be order independent, otherwise contexts that
//! receive the same updates in different orders would diverge.

use chrono::{TimeZone, Utc};
use countrycfg_types::{CountryConfiguration, CountryPackage};
use proptest::prelude::*;
use std::cmp::Ordering;

fn version_strategy() -> impl Strategy<Value = CountryConfiguration> {
    (any::<bool>(), proptest::option::of(0i64..1_000_000), 0usize..3).prop_map(
        |(active, stamp, packages)| {
            let mut config = CountryConfiguration::new("CR", "Costa Rica");
            config.active = active;
            config.metadata.last_updated = stamp.map(|s| Utc.timestamp_opt(s, 0).unwrap());
            config.packages = (0..packages)
                .map(|i| CountryPackage {
                    id: format!("p{i}"),
                    name: format!("Package {i}"),
                    price: 10.0,
                    original_price: None,
                    popular: false,
                    recommended: false,
                    features: vec![],
                    description: None,
                    available: true,
                    order: i as i32,
                })
                .collect();
            config
        },
    )
}

fn merge(current: Option<CountryConfiguration>, incoming: &CountryConfiguration) -> CountryConfiguration {
    match current {
        Some(existing) if !incoming.supersedes(&existing) => existing,
        _ => incoming.clone(),
    }
}

proptest! {
    #[test]
    fn rank_is_antisymmetric(a in version_strategy(), b in version_strategy()) {
        prop_assert_eq!(a.rank_cmp(&b), b.rank_cmp(&a).reverse());
    }

    #[test]
    fn supersedes_is_irreflexive(a in version_strategy()) {
        prop_assert!(!a.supersedes(&a));
    }

    #[test]
    fn merge_order_does_not_change_rank(a in version_strategy(), b in version_strategy()) {
        let ab = merge(Some(a.clone()), &b);
        let ba = merge(Some(b.clone()), &a);
        prop_assert_eq!(ab.rank_cmp(&ba), Ordering::Equal);
    }

    #[test]
    fn merge_is_idempotent(a in version_strategy(), b in version_strategy()) {
        let once = merge(Some(a), &b);
        let twice = merge(Some(once.clone()), &b);
        prop_assert_eq!(once, twice);
    }
}
