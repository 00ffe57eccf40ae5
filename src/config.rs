//! Plain `std::env::var` configuration reading, same idiom as `webserver_sync.rs` and
//! `src/bin/search.rs`: no config-file crate, defaults supplied with `unwrap_or_else`.

use std::str::FromStr;

use search_core::schedule::TransferMode;
use search_core::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub dataset_path: String,
    pub max_search_time: Duration,
    pub transfer_mode: TransferMode,
    pub transfer_node_id_column: String,
    pub min_transfer_time: Duration,
    /// Accepted and logged, not otherwise observed by the core. Reserved for the
    /// out-of-scope profiling collaborator.
    pub profile: Option<String>,
}

impl Config {
    pub fn from_env() -> Config {
        let dataset_path = std::env::var("DATASET_PATH").unwrap_or_else(|_| "gtfs".to_owned());

        let max_search_time_hours: i32 = std::env::var("MAX_SEARCH_TIME_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);

        let transfer_mode = std::env::var("TRANSFER_MODE")
            .ok()
            .map(|v| TransferMode::from_str(&v).unwrap_or_else(|err| panic!("{}", err)))
            .unwrap_or(TransferMode::ByNodeId);

        let transfer_node_id_column =
            std::env::var("TRANSFER_NODE_ID").unwrap_or_else(|_| "asw_node_id".to_owned());

        let min_transfer_time_seconds: i32 = std::env::var("MIN_TRANSFER_TIME_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(180);

        let profile = std::env::var("PROFILE").ok();
        if let Some(profile) = &profile {
            eprintln!("PROFILE={} accepted but not observed by the core", profile);
        }

        Config {
            dataset_path,
            max_search_time: Duration::seconds(max_search_time_hours * 60 * 60),
            transfer_mode,
            transfer_node_id_column,
            min_transfer_time: Duration::seconds(min_transfer_time_seconds),
            profile,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    // from_env reads process-wide state; serialize the two tests that touch it so they
    // don't see each other's vars under cargo test's default parallel test threads.
    static ENV_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn from_env_defaults_when_nothing_is_set() {
        let _guard = ENV_GUARD.lock().unwrap();
        for key in [
            "DATASET_PATH",
            "MAX_SEARCH_TIME_HOURS",
            "TRANSFER_MODE",
            "TRANSFER_NODE_ID",
            "MIN_TRANSFER_TIME_SECONDS",
            "PROFILE",
        ] {
            std::env::remove_var(key);
        }

        let config = Config::from_env();
        assert_eq!(config.dataset_path, "gtfs");
        assert_eq!(config.max_search_time, Duration::seconds(24 * 60 * 60));
        assert_eq!(config.transfer_mode, TransferMode::ByNodeId);
        assert_eq!(config.transfer_node_id_column, "asw_node_id");
        assert_eq!(config.min_transfer_time, Duration::seconds(180));
        assert_eq!(config.profile, None);
    }

    #[test]
    fn from_env_reads_every_var_when_set() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("DATASET_PATH", "/tmp/some-feed");
        std::env::set_var("MAX_SEARCH_TIME_HOURS", "2");
        std::env::set_var("TRANSFER_MODE", "by_transfers_txt");
        std::env::set_var("TRANSFER_NODE_ID", "my_node_id");
        std::env::set_var("MIN_TRANSFER_TIME_SECONDS", "90");
        std::env::set_var("PROFILE", "heap");

        let config = Config::from_env();
        assert_eq!(config.dataset_path, "/tmp/some-feed");
        assert_eq!(config.max_search_time, Duration::seconds(2 * 60 * 60));
        assert_eq!(config.transfer_mode, TransferMode::ByTransfersTxt);
        assert_eq!(config.transfer_node_id_column, "my_node_id");
        assert_eq!(config.min_transfer_time, Duration::seconds(90));
        assert_eq!(config.profile.as_deref(), Some("heap"));

        for key in [
            "DATASET_PATH",
            "MAX_SEARCH_TIME_HOURS",
            "TRANSFER_MODE",
            "TRANSFER_NODE_ID",
            "MIN_TRANSFER_TIME_SECONDS",
            "PROFILE",
        ] {
            std::env::remove_var(key);
        }
    }
}
