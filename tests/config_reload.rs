//! File-driven reconfiguration of live breakers.

use circuit_guard::admin::BreakerRegistry;
use circuit_guard::config::watcher::ConfigWatcher;
use circuit_guard::config::{load_config, parse_config};
use circuit_guard::{BreakerConfig, CircuitBreaker, FailureClassifier};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::Validation;

const INITIAL: &str = r#"
[[breakers]]
name = "catalog"
max_failures = 4
open_duration = "2s"
"#;

const UPDATED: &str = r#"
[[breakers]]
name = "catalog"
max_failures = 2
open_duration = "250ms"

[[breakers]]
name = "reviews"
"#;

#[test]
fn test_parse_builds_registry() {
    let config = parse_config(INITIAL).unwrap();
    let registry = BreakerRegistry::from_config(&config, circuit_guard::NoopListener);
    let catalog = registry.get("catalog").unwrap();
    assert_eq!(catalog.config().max_failures, 4);
    assert_eq!(catalog.config().open_duration, Duration::from_secs(2));
}

#[tokio::test]
async fn test_watcher_reconfigures_running_breaker() {
    let path = std::env::temp_dir().join(format!("circuit-guard-reload-{}.toml", std::process::id()));
    fs::write(&path, INITIAL).unwrap();

    let registry = BreakerRegistry::default();
    let catalog = Arc::new(CircuitBreaker::new(
        "catalog",
        BreakerConfig::new().classifier(FailureClassifier::new().ignore::<Validation>()),
    ));
    registry.register(catalog.clone()).unwrap();
    registry.apply_config(&load_config(&path).unwrap());
    assert_eq!(catalog.config().max_failures, 4);

    let (watcher, updates) = ConfigWatcher::new(&path);
    let _handle = watcher.run().unwrap();
    let applier = registry.clone();
    tokio::spawn(async move { applier.apply_updates(updates).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(&path, UPDATED).unwrap();

    let reconfigured = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if catalog.config().max_failures == 2 && registry.get("reviews").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(reconfigured.is_ok(), "reload was not applied");

    assert_eq!(catalog.config().open_duration, Duration::from_millis(250));
    assert!(!catalog.config().classifier.classify(&Validation));

    let _ = fs::remove_file(&path);
}
