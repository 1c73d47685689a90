use chrono::{DateTime, Duration as TimeDelta, Utc};
use countrycfg_remote::mock::MemoryRemote;
use countrycfg_remote::CountryRow;
use countrycfg_store::{ConfigCache, MemoryStore, SharedStore};
use countrycfg_sync::transport::mock::RecordingChannel;
use countrycfg_sync::{
    ChangeSource, ChannelKind, ConfigChange, ConfigRegistry, MergeOutcome, MessageType,
    RegistryConfig, RegistryError, SyncSnapshot, Transport, TransportConfig, UpsertOutcome,
};
use countrycfg_types::{
    ConfigError, ContextId, CountryConfiguration, CountryPackage, CountryService, FieldKind,
    FormField, FormSection,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CACHE_KEY: &str = "country_configurations";

fn cache_on(store: &Arc<MemoryStore>) -> ConfigCache {
    ConfigCache::new(store.clone(), CACHE_KEY, ContextId::new())
}

fn registry() -> (ConfigRegistry, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (ConfigRegistry::new(RegistryConfig::default(), cache_on(&store)), store)
}

fn at(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap()
}

fn configured(code: &str, name: &str) -> CountryConfiguration {
    let mut config = CountryConfiguration::new(code, name);
    config.active = true;
    config
}

fn stamped(code: &str, name: &str, millis: i64) -> CountryConfiguration {
    let mut config = configured(code, name);
    config.metadata.last_updated = Some(at(millis));
    config
}

fn package(id: &str, order: i32, available: bool) -> CountryPackage {
    CountryPackage {
        id: id.to_string(),
        name: id.to_string(),
        price: 100.0,
        original_price: None,
        popular: false,
        recommended: false,
        features: Vec::new(),
        description: None,
        available,
        order,
    }
}

fn service(id: &str, order: i32, available: bool) -> CountryService {
    CountryService {
        id: id.to_string(),
        name: id.to_string(),
        price: 50.0,
        description: String::new(),
        category: "Legal".to_string(),
        available,
        required: false,
        order,
        dependencies: Vec::new(),
    }
}

fn text_field(id: &str, order: i32) -> FormField {
    FormField {
        id: id.to_string(),
        label: id.to_string(),
        placeholder: None,
        required: false,
        description: None,
        order,
        kind: FieldKind::Text {
            validation: None,
            default_value: None,
        },
    }
}

fn section(id: &str, order: i32, fields: Vec<FormField>) -> FormSection {
    FormSection {
        id: id.to_string(),
        title: id.to_string(),
        description: None,
        fields,
        order,
        conditional: None,
    }
}

fn recorder(registry: &ConfigRegistry) -> Arc<Mutex<Vec<ConfigChange>>> {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    registry.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
    changes
}

// ── Bootstrap ───────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_seeds_defaults_and_placeholders() {
    let (registry, _) = registry();

    let seeded = registry.bootstrap().await;

    assert_eq!(seeded.len(), 19);
    assert_eq!(registry.len().await, 19);

    let georgia = registry.get("GE").await.unwrap();
    assert!(georgia.active);
    assert_eq!(georgia.packages.len(), 5);
    assert_eq!(georgia.last_updated(), None);

    let us = registry.get("US").await.unwrap();
    assert!(us.is_placeholder());
    assert_eq!(us.metadata.region.as_deref(), Some("North America"));

    let active: Vec<String> = registry
        .list_active()
        .await
        .into_iter()
        .map(|c| c.country_code)
        .collect();
    assert_eq!(active, vec!["CR", "GE"]);
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let (registry, _) = registry();
    registry.bootstrap().await;
    let before = registry.all().await;

    let seeded = registry.bootstrap().await;

    assert!(seeded.is_empty());
    assert_eq!(registry.all().await, before);
}

#[tokio::test]
async fn bootstrap_never_clobbers_an_active_entry() {
    let (registry, _) = registry();
    let mut united_states = configured("US", "United States");
    united_states.packages.push(package("llc-us", 1, true));
    registry.upsert(united_states).await.unwrap();
    let before = registry.get("US").await.unwrap();

    registry.bootstrap().await;

    assert_eq!(registry.get("US").await.unwrap(), before);
}

#[tokio::test]
async fn bootstrap_persists() {
    let (registry, store) = registry();
    registry.bootstrap().await;

    let cached = cache_on(&store).load().unwrap();
    assert_eq!(cached.len(), 19);
}

// ── Reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn reads_on_absent_code_are_empty() {
    let (registry, _) = registry();
    assert!(registry.get("XX").await.is_none());
    assert!(registry.get_packages("XX").await.is_empty());
    assert!(registry.get_services("XX").await.is_empty());
    assert!(registry.get_form_sections("XX").await.is_empty());
    assert!(!registry.is_selectable("XX").await);
}

#[tokio::test]
async fn projections_are_filtered_and_ordered() {
    let (registry, _) = registry();
    let mut config = configured("MT", "Malta");
    config.packages = vec![
        package("premium", 3, true),
        package("basic", 1, true),
        package("retired", 0, false),
        package("standard", 2, true),
    ];
    config.services = vec![service("audit", 2, true), service("trademark", 1, true), service("old", 0, false)];
    config.company_details_form.sections = vec![
        section("directors", 2, vec![text_field("b", 2), text_field("a", 1)]),
        section("company", 1, vec![text_field("name", 1)]),
    ];
    registry.upsert(config).await.unwrap();

    let packages: Vec<String> = registry.get_packages("MT").await.into_iter().map(|p| p.id).collect();
    assert_eq!(packages, vec!["basic", "standard", "premium"]);

    let services: Vec<String> = registry.get_services("MT").await.into_iter().map(|s| s.id).collect();
    assert_eq!(services, vec!["trademark", "audit"]);

    let sections = registry.get_form_sections("MT").await;
    assert_eq!(sections[0].id, "company");
    assert_eq!(sections[1].id, "directors");
    let fields: Vec<&str> = sections[1].fields.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(fields, vec!["a", "b"]);
}

#[tokio::test]
async fn selectable_means_present_and_active() {
    let (registry, _) = registry();
    registry.bootstrap().await;
    assert!(registry.is_selectable("GE").await);
    assert!(!registry.is_selectable("NO").await);
}

#[tokio::test]
async fn all_is_sorted_by_code() {
    let (registry, _) = registry();
    registry.bootstrap().await;
    let codes: Vec<String> = registry.all().await.into_iter().map(|c| c.country_code).collect();
    let mut sorted = codes.clone();
    sorted.sort();
    assert_eq!(codes, sorted);
}

// ── Upsert ──────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_stamps_last_updated() {
    let (registry, _) = registry();
    let before = Utc::now() - TimeDelta::seconds(1);

    let outcome = registry.upsert(configured("GE", "Georgia")).await.unwrap();

    assert_eq!(outcome, UpsertOutcome::LocalOnly);
    let stored = registry.get("GE").await.unwrap();
    assert!(stored.active);
    assert!(stored.last_updated().unwrap() > before);
}

#[tokio::test]
async fn upsert_always_moves_the_stamp_forward() {
    let (registry, _) = registry();
    let future = Utc::now() + TimeDelta::days(1);
    let mut config = configured("GE", "Georgia");
    config.metadata.last_updated = Some(future);

    registry.upsert(config.clone()).await.unwrap();
    let first = registry.get("GE").await.unwrap().last_updated().unwrap();
    registry.upsert(config).await.unwrap();
    let second = registry.get("GE").await.unwrap().last_updated().unwrap();

    assert!(first > future);
    assert!(second > first);
}

#[tokio::test]
async fn upsert_rejects_missing_identity() {
    let (registry, _) = registry();

    let err = registry.upsert(configured("", "Nowhere")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InvalidConfiguration(ConfigError::MissingField("countryCode"))
    ));

    let err = registry.upsert(configured("XX", "  ")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::InvalidConfiguration(ConfigError::MissingField("countryName"))
    ));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn upsert_persists_to_cache() {
    let (registry, store) = registry();
    registry.upsert(configured("GE", "Georgia")).await.unwrap();

    let cached = cache_on(&store).load().unwrap();
    assert_eq!(cached.get("GE"), registry.get("GE").await.as_ref());
}

#[tokio::test]
async fn upsert_pushes_to_remote() {
    let remote = Arc::new(MemoryRemote::new());
    let (registry, _) = registry();
    let registry = registry.with_remote(remote.clone());

    let outcome = registry.upsert(configured("GE", "Georgia")).await.unwrap();

    assert_eq!(outcome, UpsertOutcome::Synced);
    let row = remote.row("GE").unwrap();
    assert!(row.active);
    assert_eq!(row.updated_at, registry.get("GE").await.unwrap().last_updated());
}

#[tokio::test]
async fn remote_failure_is_a_warning_not_an_error() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_failing(true);
    let (registry, _) = registry();
    let registry = registry.with_remote(remote.clone());

    let outcome = registry.upsert(configured("GE", "Georgia")).await.unwrap();

    assert!(outcome.is_warning());
    assert!(matches!(outcome, UpsertOutcome::RemoteSyncFailed { .. }));
    assert!(registry.get("GE").await.is_some());
}

#[tokio::test]
async fn slow_remote_times_out() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_latency(Some(Duration::from_millis(500)));
    let store = Arc::new(MemoryStore::new());
    let config = RegistryConfig {
        remote_timeout_ms: 20,
        ..RegistryConfig::default()
    };
    let registry = ConfigRegistry::new(config, cache_on(&store)).with_remote(remote.clone());

    let outcome = registry.upsert(configured("GE", "Georgia")).await.unwrap();

    match outcome {
        UpsertOutcome::RemoteSyncFailed { reason } => assert!(reason.contains("20")),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(registry.get("GE").await.is_some());
}

#[tokio::test]
async fn upsert_broadcasts_even_when_remote_fails() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_failing(true);
    let bus = Arc::new(RecordingChannel::new(ChannelKind::Bus));
    let transport = Arc::new(
        Transport::new(ContextId::new(), TransportConfig::default()).with_channel(bus.clone()),
    );
    let (registry, _) = registry();
    let registry = registry.with_remote(remote).with_transport(transport);

    registry.upsert(configured("GE", "Georgia")).await.unwrap();

    let sent = bus.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageType::ConfigUpdated);
    assert_eq!(
        sent[0].configuration().unwrap(),
        registry.get("GE").await.unwrap()
    );
}

// ── Update ──────────────────────────────────────────────────────

#[tokio::test]
async fn update_applies_closure() {
    let (registry, _) = registry();
    registry.bootstrap().await;

    let outcome = registry.update("EE", |c| c.active = true).await.unwrap();

    assert_eq!(outcome, Some(UpsertOutcome::LocalOnly));
    let estonia = registry.get("EE").await.unwrap();
    assert!(estonia.active);
    assert!(estonia.last_updated().is_some());
}

#[tokio::test]
async fn update_on_absent_code_is_none() {
    let (registry, _) = registry();
    assert_eq!(registry.update("XX", |c| c.active = true).await.unwrap(), None);
    assert!(registry.get("XX").await.is_none());
}

#[tokio::test]
async fn update_cannot_change_identity() {
    let (registry, _) = registry();
    registry.bootstrap().await;

    let err = registry
        .update("EE", |c| c.country_code = "LV".to_string())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RegistryError::InvalidConfiguration(ConfigError::CodeMismatch { .. })
    ));
    assert!(registry.get("LV").await.is_none());
}

// ── Remove ──────────────────────────────────────────────────────

#[tokio::test]
async fn remove_absent_code_returns_false() {
    let (registry, _) = registry();
    registry.bootstrap().await;
    let before = registry.all().await;

    assert!(!registry.remove("XX").await);
    assert_eq!(registry.all().await, before);
}

#[tokio::test]
async fn remove_existing_code() {
    let remote = Arc::new(MemoryRemote::new());
    let (registry, store) = registry();
    let registry = registry.with_remote(remote.clone());
    registry.upsert(configured("GE", "Georgia")).await.unwrap();
    assert!(remote.row("GE").is_some());

    assert!(registry.remove("GE").await);

    assert!(registry.get("GE").await.is_none());
    assert!(!cache_on(&store).load().unwrap().contains_key("GE"));
    assert!(remote.row("GE").is_none());
    assert_eq!(remote.delete_count(), 1);
}

#[tokio::test]
async fn remove_succeeds_when_remote_fails() {
    let remote = Arc::new(MemoryRemote::new());
    let (registry, _) = registry();
    let registry = registry.with_remote(remote.clone());
    registry.upsert(configured("GE", "Georgia")).await.unwrap();
    remote.set_failing(true);

    assert!(registry.remove("GE").await);
    assert!(registry.get("GE").await.is_none());
}

#[tokio::test]
async fn remove_is_not_broadcast() {
    let bus = Arc::new(RecordingChannel::new(ChannelKind::Bus));
    let transport = Arc::new(
        Transport::new(ContextId::new(), TransportConfig::default()).with_channel(bus.clone()),
    );
    let (registry, _) = registry();
    let registry = registry.with_transport(transport);
    registry.upsert(configured("GE", "Georgia")).await.unwrap();

    registry.remove("GE").await;

    assert_eq!(bus.sent().len(), 1);
}

// ── Merge ───────────────────────────────────────────────────────

#[tokio::test]
async fn merge_inserts_absent_code() {
    let (registry, _) = registry();
    let outcome = registry
        .merge_incoming("GE", stamped("GE", "Georgia", 1_000), ChangeSource::Broadcast)
        .await;
    assert_eq!(outcome, MergeOutcome::Inserted);
    assert!(registry.get("GE").await.is_some());
}

#[tokio::test]
async fn stale_copy_leaves_entry_unchanged() {
    let (registry, _) = registry();
    registry.upsert(configured("GE", "Georgia")).await.unwrap();
    let current = registry.get("GE").await.unwrap();

    let mut stale = current.clone();
    stale.active = false;
    stale.metadata.last_updated = Some(current.last_updated().unwrap() - TimeDelta::hours(1));
    let outcome = registry.merge_incoming("GE", stale, ChangeSource::Broadcast).await;

    assert_eq!(outcome, MergeOutcome::Ignored);
    assert_eq!(registry.get("GE").await.unwrap(), current);
}

#[tokio::test]
async fn newer_copy_wins_in_either_order() {
    let older = stamped("CR", "Costa Rica", 1_000);
    let mut newer = stamped("CR", "Costa Rica", 2_000);
    newer.packages.push(package("basic-cr", 1, true));

    let (forward, _) = registry();
    forward.merge_incoming("CR", older.clone(), ChangeSource::Broadcast).await;
    forward.merge_incoming("CR", newer.clone(), ChangeSource::Broadcast).await;

    let (backward, _) = registry();
    backward.merge_incoming("CR", newer.clone(), ChangeSource::Broadcast).await;
    let outcome = backward.merge_incoming("CR", older, ChangeSource::Broadcast).await;

    assert_eq!(outcome, MergeOutcome::Ignored);
    assert_eq!(forward.get("CR").await.unwrap(), newer);
    assert_eq!(backward.get("CR").await.unwrap(), newer);
}

#[tokio::test]
async fn merging_twice_is_idempotent() {
    let (registry, _) = registry();
    let config = stamped("GE", "Georgia", 5_000);

    assert_eq!(
        registry.merge_incoming("GE", config.clone(), ChangeSource::Broadcast).await,
        MergeOutcome::Inserted
    );
    let once = registry.all().await;
    assert_eq!(
        registry.merge_incoming("GE", config, ChangeSource::Broadcast).await,
        MergeOutcome::Ignored
    );
    assert_eq!(registry.all().await, once);
}

#[tokio::test]
async fn newer_deactivation_replaces_configured_entry() {
    let (registry, _) = registry();
    let mut configured_copy = stamped("GE", "Georgia", 1_000);
    configured_copy.packages.push(package("basic-ge", 1, true));
    registry.merge_incoming("GE", configured_copy, ChangeSource::Broadcast).await;

    let mut deactivated = CountryConfiguration::new("GE", "Georgia");
    deactivated.metadata.last_updated = Some(at(2_000));
    let outcome = registry
        .merge_incoming("GE", deactivated.clone(), ChangeSource::Broadcast)
        .await;

    assert_eq!(outcome, MergeOutcome::Replaced);
    assert_eq!(registry.get("GE").await.unwrap(), deactivated);
}

#[tokio::test]
async fn stale_snapshot_does_not_revert_local_write() {
    let (registry, _) = registry();
    let mut older = stamped("GE", "Georgia", 1_000);
    older.packages.push(package("basic-ge", 1, true));
    registry.upsert(CountryConfiguration::new("GE", "Georgia")).await.unwrap();
    let written = registry.get("GE").await.unwrap();

    let changed = registry
        .merge_snapshot(SyncSnapshot::from_configs([older]), ChangeSource::Broadcast)
        .await;

    assert!(changed.is_empty());
    assert_eq!(registry.get("GE").await.unwrap(), written);
    assert!(!written.active);
}

#[tokio::test]
async fn bootstrap_keeps_deactivated_entries() {
    let (registry, _) = registry();
    for code in ["GE", "EE"] {
        let mut deactivated = CountryConfiguration::new(code, "Deactivated");
        deactivated.metadata.last_updated = Some(at(1_000));
        registry.merge_incoming(code, deactivated, ChangeSource::Broadcast).await;
    }
    let before_ge = registry.get("GE").await.unwrap();
    let before_ee = registry.get("EE").await.unwrap();

    registry.bootstrap().await;

    assert_eq!(registry.get("GE").await.unwrap(), before_ge);
    assert_eq!(registry.get("EE").await.unwrap(), before_ee);
    assert!(registry.get("EE").await.unwrap().metadata.tags.is_empty());
}

#[tokio::test]
async fn merge_rejects_mismatched_or_invalid() {
    let (registry, _) = registry();
    assert_eq!(
        registry.merge_incoming("GE", stamped("CR", "Costa Rica", 1), ChangeSource::Broadcast).await,
        MergeOutcome::Ignored
    );
    assert_eq!(
        registry.merge_incoming("GE", stamped("GE", "", 1), ChangeSource::Broadcast).await,
        MergeOutcome::Ignored
    );
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn merge_snapshot_reports_changed_codes() {
    let (registry, _) = registry();
    registry.merge_incoming("GE", stamped("GE", "Georgia", 5_000), ChangeSource::Broadcast).await;

    let snapshot = SyncSnapshot::from_configs([
        stamped("GE", "Georgia (old)", 1_000),
        stamped("CR", "Costa Rica", 1_000),
        stamped("AE", "United Arab Emirates", 1_000),
    ]);
    let changed = registry.merge_snapshot(snapshot, ChangeSource::Broadcast).await;

    assert_eq!(changed, vec!["AE", "CR"]);
    assert_eq!(registry.get("GE").await.unwrap().country_name, "Georgia");
}

#[tokio::test]
async fn merge_snapshot_skips_miskeyed_entries() {
    let (registry, _) = registry();
    let mut snapshot = SyncSnapshot::default();
    snapshot
        .configurations
        .insert("GE".to_string(), stamped("CR", "Costa Rica", 1_000));

    assert!(registry.merge_snapshot(snapshot, ChangeSource::Broadcast).await.is_empty());
    assert!(registry.is_empty().await);
}

// ── Cache ───────────────────────────────────────────────────────

#[tokio::test]
async fn initialize_overlays_cache_on_defaults() {
    let store = Arc::new(MemoryStore::new());
    let mut custom = stamped("GE", "Georgia (custom)", 1_000);
    custom.base_price = 999.0;
    cache_on(&store).save([&custom]).unwrap();

    let registry = ConfigRegistry::new(RegistryConfig::default(), cache_on(&store));
    let count = registry.initialize().await;

    assert_eq!(count, 19);
    assert_eq!(registry.get("GE").await.unwrap(), custom);
    assert_eq!(cache_on(&store).load().unwrap().len(), 19);
}

#[tokio::test]
async fn initialize_survives_a_corrupt_cache() {
    let store = Arc::new(MemoryStore::new());
    store.set(CACHE_KEY, "{ corrupt", ContextId::new()).unwrap();

    let registry = ConfigRegistry::new(RegistryConfig::default(), cache_on(&store));

    assert_eq!(registry.initialize().await, 19);
}

#[tokio::test]
async fn reload_from_cache_picks_up_sibling_writes() {
    let store = Arc::new(MemoryStore::new());
    let a = ConfigRegistry::new(RegistryConfig::default(), cache_on(&store));
    let b = ConfigRegistry::new(RegistryConfig::default(), cache_on(&store));
    a.upsert(configured("GE", "Georgia")).await.unwrap();

    let changed = b.reload_from_cache().await;

    assert_eq!(changed, vec!["GE"]);
    assert_eq!(b.get("GE").await, a.get("GE").await);
}

#[tokio::test]
async fn persisted_snapshot_matches_memory() {
    let (registry, _) = registry();
    registry.bootstrap().await;
    registry.upsert(configured("GE", "Georgia")).await.unwrap();

    let snapshot = registry.persisted_snapshot().await;

    assert_eq!(snapshot.len(), 19);
    assert_eq!(snapshot.configurations.get("GE"), registry.get("GE").await.as_ref());
}

// ── Remote overlay ──────────────────────────────────────────────

#[tokio::test]
async fn refresh_without_remote_is_noop() {
    let (registry, _) = registry();
    assert!(registry.refresh_from_remote().await.unwrap().is_empty());
}

#[tokio::test]
async fn refresh_applies_only_newer_rows() {
    let (registry, _) = registry();
    registry.bootstrap().await;
    registry.upsert(configured("CR", "Costa Rica")).await.unwrap();

    let mut georgia = CountryRow::from_config(&configured("GE", "Georgia (remote)"));
    georgia.updated_at = Some(Utc::now() + TimeDelta::days(1));
    let mut costa_rica = CountryRow::from_config(&configured("CR", "Costa Rica (remote)"));
    costa_rica.updated_at = Some(at(1_000));
    let mut kosovo = CountryRow::from_config(&configured("XK", "Kosovo"));
    kosovo.updated_at = Some(at(1_000));
    let remote = Arc::new(MemoryRemote::with_rows([georgia, costa_rica, kosovo]));
    let registry = registry.with_remote(remote);

    let changed = registry.refresh_from_remote().await.unwrap();

    assert_eq!(changed, vec!["GE", "XK"]);
    let ge = registry.get("GE").await.unwrap();
    assert_eq!(ge.country_name, "Georgia (remote)");
    assert_eq!(ge.packages.len(), 5, "packages are not in the row and must survive");
    assert_eq!(registry.get("CR").await.unwrap().country_name, "Costa Rica");
    assert!(registry.get("XK").await.unwrap().active);
}

#[tokio::test]
async fn refresh_failure_is_returned() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_failing(true);
    let (registry, _) = registry();
    let registry = registry.with_remote(remote);
    registry.bootstrap().await;

    assert!(registry.refresh_from_remote().await.is_err());
    assert_eq!(registry.len().await, 19);
}

// ── Listeners ───────────────────────────────────────────────────

#[tokio::test]
async fn listeners_see_changes() {
    let (registry, _) = registry();
    let changes = recorder(&registry);

    registry.upsert(configured("GE", "Georgia")).await.unwrap();
    registry
        .merge_incoming("CR", stamped("CR", "Costa Rica", 1), ChangeSource::Broadcast)
        .await;
    registry.remove("GE").await;

    assert_eq!(
        *changes.lock().unwrap(),
        vec![
            ConfigChange::Updated {
                code: "GE".to_string(),
                source: ChangeSource::Local
            },
            ConfigChange::Updated {
                code: "CR".to_string(),
                source: ChangeSource::Broadcast
            },
            ConfigChange::Removed {
                code: "GE".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn ignored_merges_are_silent() {
    let (registry, _) = registry();
    registry
        .merge_incoming("CR", stamped("CR", "Costa Rica", 5), ChangeSource::Broadcast)
        .await;
    let changes = recorder(&registry);

    registry
        .merge_incoming("CR", stamped("CR", "Costa Rica", 1), ChangeSource::Broadcast)
        .await;
    registry.remove("XX").await;

    assert!(changes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bootstrap_notifies_once() {
    let (registry, _) = registry();
    let changes = recorder(&registry);

    registry.bootstrap().await;

    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    match &changes[0] {
        ConfigChange::Synced { codes, source } => {
            assert_eq!(codes.len(), 19);
            assert_eq!(*source, ChangeSource::Bootstrap);
        }
        other => panic!("unexpected change {other:?}"),
    }
}

#[tokio::test]
async fn unsubscribe_stops_notifications() {
    let (registry, _) = registry();
    let count = Arc::new(Mutex::new(0));
    let counter = count.clone();
    let id = registry.subscribe(move |_| *counter.lock().unwrap() += 1);

    registry.upsert(configured("GE", "Georgia")).await.unwrap();
    assert!(registry.unsubscribe(id));
    assert!(!registry.unsubscribe(id));
    registry.upsert(configured("CR", "Costa Rica")).await.unwrap();

    assert_eq!(*count.lock().unwrap(), 1);
}
