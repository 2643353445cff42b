use crate::transport::{SyncConfig, TransportKind};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Local store
    pub db_path: String,
    pub debug: bool,

    // Sync settings
    pub origin: String,
    pub transport: TransportKind,
    pub max_fragment_size: usize,
    pub max_fragments: usize,
    pub frame_interval_ms: u64,
    pub scan_timeout_ms: u64,
    pub close_grace_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "fintrack.db".to_string(),
            debug: false,
            origin: "http://localhost:3000".to_string(),
            transport: TransportKind::Broadcast,
            max_fragment_size: 800,
            max_fragments: 99,
            frame_interval_ms: 250,
            scan_timeout_ms: 4000,
            close_grace_ms: 1000,
            connect_timeout_ms: 30_000,
        }
    }
}

impl Config {
    /// Transport settings for the sync service.
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig::new(self.origin.clone())
            .transport(self.transport)
            .max_fragment_size(self.max_fragment_size)
            .max_fragments(self.max_fragments)
            .frame_interval(Duration::from_millis(self.frame_interval_ms))
            .scan_timeout(Duration::from_millis(self.scan_timeout_ms))
            .close_grace(Duration::from_millis(self.close_grace_ms))
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Build a `Config` from any key lookup (the environment, in production).
pub fn load_config_from<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let number = |key: &str, default: u64| -> u64 {
        var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
    };

    let db_path = var("FINTRACK_DB_PATH").unwrap_or(defaults.db_path);

    let debug = var("DEBUG").is_some();

    let origin = var("FINTRACK_ORIGIN").unwrap_or(defaults.origin);

    let transport = match var("FINTRACK_TRANSPORT") {
        Some(v) => TransportKind::from_str(&v)
            .ok_or_else(|| anyhow::anyhow!("unknown FINTRACK_TRANSPORT {:?}", v))?,
        None => defaults.transport,
    };

    let max_fragment_size = number("FINTRACK_MAX_FRAGMENT_SIZE", defaults.max_fragment_size as u64) as usize;
    let max_fragments = number("FINTRACK_MAX_FRAGMENTS", defaults.max_fragments as u64) as usize;
    let frame_interval_ms = number("FINTRACK_FRAME_INTERVAL_MS", defaults.frame_interval_ms);
    let scan_timeout_ms = number("FINTRACK_SCAN_TIMEOUT_MS", defaults.scan_timeout_ms);
    let close_grace_ms = number("FINTRACK_CLOSE_GRACE_MS", defaults.close_grace_ms);
    let connect_timeout_ms = number("FINTRACK_CONNECT_TIMEOUT_MS", defaults.connect_timeout_ms);

    let config = Config {
        db_path,
        debug,
        origin,
        transport,
        max_fragment_size,
        max_fragments,
        frame_interval_ms,
        scan_timeout_ms,
        close_grace_ms,
        connect_timeout_ms,
    };

    config.to_sync_config().validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_config_from(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.db_path, "fintrack.db");
        assert_eq!(cfg.transport, TransportKind::Broadcast);
        assert_eq!(cfg.max_fragment_size, 800);
        assert!(!cfg.debug);
    }

    #[test]
    fn test_load_config_defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.origin, "http://localhost:3000");
        assert_eq!(cfg.scan_timeout_ms, 4000);
        assert_eq!(cfg.connect_timeout_ms, 30_000);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let cfg = load(&[
            ("FINTRACK_DB_PATH", "/tmp/test.db"),
            ("FINTRACK_ORIGIN", "https://fintrack.app"),
            ("FINTRACK_TRANSPORT", "duplex"),
            ("FINTRACK_MAX_FRAGMENT_SIZE", "400"),
            ("FINTRACK_FRAME_INTERVAL_MS", "100"),
            ("DEBUG", "1"),
        ])
        .unwrap();

        assert_eq!(cfg.db_path, "/tmp/test.db");
        assert_eq!(cfg.origin, "https://fintrack.app");
        assert_eq!(cfg.transport, TransportKind::Duplex);
        assert_eq!(cfg.max_fragment_size, 400);
        assert_eq!(cfg.frame_interval_ms, 100);
        assert!(cfg.debug);
    }

    #[test]
    fn test_load_config_parse_error_uses_default() {
        let cfg = load(&[("FINTRACK_SCAN_TIMEOUT_MS", "soon")]).unwrap();
        assert_eq!(cfg.scan_timeout_ms, 4000);
    }

    #[test]
    fn test_load_config_unknown_transport() {
        assert!(load(&[("FINTRACK_TRANSPORT", "smoke-signals")]).is_err());
    }

    #[test]
    fn test_load_config_rejects_invalid_sync_settings() {
        assert!(load(&[("FINTRACK_MAX_FRAGMENTS", "0")]).is_err());
        assert!(load(&[("FINTRACK_ORIGIN", "")]).is_err());
    }

    #[test]
    fn test_to_sync_config() {
        let cfg = Config {
            scan_timeout_ms: 1500,
            transport: TransportKind::Duplex,
            ..Default::default()
        };
        let sync = cfg.to_sync_config();
        assert_eq!(sync.scan_timeout, Duration::from_millis(1500));
        assert_eq!(sync.transport, TransportKind::Duplex);
        assert_eq!(sync.origin, cfg.origin);
    }
}
