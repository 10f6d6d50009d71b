//! Logging setup through the configured filter.
//!
//! Kept in its own test binary: the subscriber is process-global.

use pmu_studio_core::{open_with_config, FfiStudioConfig};

#[test]
fn test_config_log_filter_is_installed() {
    let dir = tempfile::tempdir().unwrap();
    let config = FfiStudioConfig {
        database_path: dir.path().join("studio.db").to_string_lossy().into_owned(),
        api_base_url: None,
        studio_id: "studio-1".into(),
        api_token: None,
        request_timeout_secs: 30,
        log_filter: "pmu_studio_core=trace".into(),
    };

    let core = open_with_config(config.clone()).unwrap();
    assert!(!core.is_online());

    // RUST_LOG takes precedence over the configured filter
    if std::env::var_os("RUST_LOG").is_none() {
        assert!(tracing::enabled!(target: "pmu_studio_core", tracing::Level::TRACE));
        assert!(!tracing::enabled!(target: "other_crate", tracing::Level::TRACE));
    }

    // A second open keeps the installed subscriber
    open_with_config(config).unwrap();
}
