use serde::{Deserialize, Serialize};

use crate::schedule::MatchOrdering;

pub const MIN_SCHEDULER_INTERVAL_MS: u64 = 1_000;
pub const MAX_SCHEDULER_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LircConfig {
    /// Remote name in the lircd configuration.
    pub remote: String,
    pub device: String,
    pub irsend: String,
}

impl Default for LircConfig {
    fn default() -> Self {
        Self {
            remote: "BRYANT".to_string(),
            device: "/run/lirc/lircd".to_string(),
            irsend: "/usr/bin/irsend".to_string(),
        }
    }
}

/// Missing keys in a config file keep their default values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub binding: String,
    pub data_dir: String,
    pub op_modes: Vec<String>,
    pub home_url: String,
    pub scheduler_interval_ms: u64,
    /// IANA timezone name; empty means the host's local time.
    pub timezone: String,
    pub match_ordering: MatchOrdering,
    pub lirc: LircConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binding: "0.0.0.0:7801".to_string(),
            data_dir: "/var/lib/wit".to_string(),
            op_modes: vec!["COOL74".to_string(), "HEAT72".to_string()],
            home_url: String::new(),
            scheduler_interval_ms: 5_000,
            timezone: String::new(),
            match_ordering: MatchOrdering::Legacy,
            lirc: LircConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.scheduler_interval_ms = self
            .scheduler_interval_ms
            .clamp(MIN_SCHEDULER_INTERVAL_MS, MAX_SCHEDULER_INTERVAL_MS);

        self.op_modes = self
            .op_modes
            .iter()
            .map(|mode| mode.trim().to_string())
            .filter(|mode| !mode.is_empty())
            .collect();
        self.timezone = self.timezone.trim().to_string();

        if self.data_dir.trim().is_empty() {
            self.data_dir = Self::default().data_dir;
        }
    }

    pub fn set_op_modes(&mut self, csv: &str) {
        self.op_modes = csv.split(',').map(str::to_string).collect();
    }
}
