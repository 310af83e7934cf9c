use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::availability::OverrunPolicy;
use crate::model::OwnerId;

/// Daemon settings, read from `PAWSLOT_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub overrun_policy: OverrunPolicy,
    /// Account ids given the admin role at startup.
    pub admin_ids: Vec<OwnerId>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            overrun_policy: OverrunPolicy::Offer,
            admin_ids: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparsable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let drop_overrun = lookup("PAWSLOT_DROP_OVERRUN_SLOTS")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(false);

        Self {
            data_dir: lookup("PAWSLOT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: lookup("PAWSLOT_METRICS_PORT").and_then(|v| u16::from_str(v.trim()).ok()),
            compact_threshold: parsed("PAWSLOT_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            compact_interval: parsed("PAWSLOT_COMPACT_INTERVAL_SECS")
                .filter(|&s| s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
            overrun_policy: if drop_overrun {
                OverrunPolicy::Drop
            } else {
                OverrunPolicy::Offer
            },
            admin_ids: lookup("PAWSLOT_ADMINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("pawslot.wal")
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn reads_all_keys() {
        let cfg = Config::from_lookup(lookup(&[
            ("PAWSLOT_DATA_DIR", "/var/lib/pawslot"),
            ("PAWSLOT_METRICS_PORT", "9100"),
            ("PAWSLOT_COMPACT_THRESHOLD", "50"),
            ("PAWSLOT_COMPACT_INTERVAL_SECS", "5"),
            ("PAWSLOT_DROP_OVERRUN_SLOTS", "true"),
            ("PAWSLOT_ADMINS", "ana, ,ben"),
        ]));
        assert_eq!(cfg.wal_path(), PathBuf::from("/var/lib/pawslot/pawslot.wal"));
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.compact_threshold, 50);
        assert_eq!(cfg.compact_interval, Duration::from_secs(5));
        assert_eq!(cfg.overrun_policy, OverrunPolicy::Drop);
        assert_eq!(cfg.admin_ids, vec!["ana".to_string(), "ben".to_string()]);
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = Config::from_lookup(lookup(&[
            ("PAWSLOT_METRICS_PORT", "99999"),
            ("PAWSLOT_COMPACT_THRESHOLD", "lots"),
            ("PAWSLOT_COMPACT_INTERVAL_SECS", "0"),
            ("PAWSLOT_DROP_OVERRUN_SLOTS", "maybe"),
        ]));
        assert_eq!(cfg.metrics_port, None);
        assert_eq!(cfg.compact_threshold, 1000);
        assert_eq!(cfg.compact_interval, Duration::from_secs(30));
        assert_eq!(cfg.overrun_policy, OverrunPolicy::Offer);
    }
}
