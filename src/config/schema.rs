use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checker::{MatchPolicy, TitleStrategy};

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_CHECK_TIMES_LIMIT: u32 = 5;
pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 200;
pub const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_profile_name")]
    pub current_profile_name: String,
    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub checker: CheckerSettings,
    #[serde(default)]
    pub log: LogSettings,
}

fn default_profile_name() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_profiles() -> BTreeMap<String, Profile> {
    let mut profiles = BTreeMap::new();
    profiles.insert(DEFAULT_PROFILE.to_string(), Profile::default());
    profiles
}

impl Default for Config {
    fn default() -> Self {
        Self {
            current_profile_name: default_profile_name(),
            profiles: default_profiles(),
            checker: CheckerSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl Config {
    /// the active profile, if it exists
    pub fn current_profile(&self) -> Option<&Profile> {
        self.profiles.get(&self.current_profile_name)
    }
}

/// per-profile rule settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// give up on windows no rule matched after `check_times_limit` checks
    #[serde(default)]
    pub ignore_window_on_rule_check_timeout: bool,
    /// rule file; defaults to `~/.deskrules/rules.<profile>.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerSettings {
    #[serde(default = "default_check_times_limit")]
    pub check_times_limit: u32,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    #[serde(default)]
    pub title_strategy: TitleStrategy,
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
    /// how often states of closed windows are evicted
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_check_times_limit() -> u32 {
    DEFAULT_CHECK_TIMES_LIMIT
}

fn default_settle_interval_ms() -> u64 {
    DEFAULT_SETTLE_INTERVAL_MS
}

fn default_settle_timeout_ms() -> u64 {
    DEFAULT_SETTLE_TIMEOUT_MS
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            check_times_limit: DEFAULT_CHECK_TIMES_LIMIT,
            match_policy: MatchPolicy::default(),
            title_strategy: TitleStrategy::default(),
            settle_interval_ms: DEFAULT_SETTLE_INTERVAL_MS,
            settle_timeout_ms: DEFAULT_SETTLE_TIMEOUT_MS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
