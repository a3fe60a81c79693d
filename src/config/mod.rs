mod schema;

pub use schema::{
    CheckerSettings, Config, LogSettings, Profile, DEFAULT_CHECK_TIMES_LIMIT, DEFAULT_LOG_LEVEL,
    DEFAULT_PROFILE, DEFAULT_SETTLE_INTERVAL_MS, DEFAULT_SETTLE_TIMEOUT_MS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};

use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::checker::{MatchPolicy, TitleStrategy};

const CONFIG_ENV_VAR: &str = "DESKRULES_CONFIG";
const CONFIG_DIR: &str = ".deskrules";

/// `~/.deskrules`
pub fn deskrules_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .join(CONFIG_DIR))
}

/// resolve the config file: explicit override, then `DESKRULES_CONFIG`, then
/// `~/.deskrules/config.json`
pub fn get_config_path(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    Ok(deskrules_dir()?.join("config.json"))
}

/// load the config at `path`, writing defaults there when it does not exist
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        save_to(path, &config)?;
        return Ok(config);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

pub fn save_to(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let mut content =
        serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    content.push('\n');

    fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// rule file of the active profile
///
/// `profiles.<name>.rules_path` with `~` expanded, else
/// `~/.deskrules/rules.<name>.json`
pub fn rules_path(config: &Config) -> Result<PathBuf> {
    let configured = config
        .current_profile()
        .and_then(|profile| profile.rules_path.as_deref());

    match configured {
        Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).into_owned())),
        None => Ok(deskrules_dir()?.join(format!("rules.{}.json", config.current_profile_name))),
    }
}

/// verify the config file at `path` and return a list of problems
pub fn verify(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(anyhow!("config file not found: {}", path.display()));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: Config =
        serde_json::from_str(&content).map_err(|e| anyhow!("invalid JSON: {}", e))?;

    Ok(verify_config(&config))
}

pub fn verify_config(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();

    if config.current_profile().is_none() {
        let known: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
        errors.push(format!(
            "current_profile_name: profile '{}' does not exist (known: {})",
            config.current_profile_name,
            if known.is_empty() {
                "none".to_string()
            } else {
                known.join(", ")
            }
        ));
    }

    let checker = &config.checker;
    if checker.check_times_limit == 0 {
        errors.push("checker.check_times_limit: must be at least 1".to_string());
    }
    if checker.settle_interval_ms == 0 {
        errors.push("checker.settle_interval_ms: must be at least 1".to_string());
    }
    if checker.settle_interval_ms > checker.settle_timeout_ms {
        errors.push(format!(
            "checker.settle_interval_ms: {} is larger than settle_timeout_ms ({})",
            checker.settle_interval_ms, checker.settle_timeout_ms
        ));
    }
    if checker.sweep_interval_secs == 0 {
        errors.push("checker.sweep_interval_secs: must be at least 1".to_string());
    }

    if config.log.level.parse::<log::LevelFilter>().is_err() {
        errors.push(format!(
            "log.level: invalid level '{}': use off, error, warn, info, debug or trace",
            config.log.level
        ));
    }

    errors
}

/// set one value by dotted key, e.g. `checker.match_policy first`
///
/// `profiles.<name>.*` creates the profile when it does not exist
pub fn set_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["current_profile_name"] | ["profile"] => {
            if value.is_empty() {
                return Err(anyhow!("Profile name cannot be empty"));
            }
            config.current_profile_name = value.to_string();
        }
        ["profiles", name, "ignore_window_on_rule_check_timeout"] => {
            config
                .profiles
                .entry(name.to_string())
                .or_default()
                .ignore_window_on_rule_check_timeout = parse_bool(value)?;
        }
        ["profiles", name, "rules_path"] => {
            let profile = config.profiles.entry(name.to_string()).or_default();
            profile.rules_path = match value {
                "" | "null" | "none" => None,
                path => Some(path.to_string()),
            };
        }
        ["checker", "check_times_limit"] => {
            config.checker.check_times_limit = parse_number(value)?;
        }
        ["checker", "match_policy"] => {
            config.checker.match_policy = MatchPolicy::parse(value).ok_or_else(|| {
                anyhow!("Invalid match_policy: {}. Use all or first", value)
            })?;
        }
        ["checker", "title_strategy"] => {
            config.checker.title_strategy = TitleStrategy::parse(value).ok_or_else(|| {
                anyhow!("Invalid title_strategy: {}. Use eager or settle", value)
            })?;
        }
        ["checker", "settle_interval_ms"] => {
            config.checker.settle_interval_ms = parse_number(value)?;
        }
        ["checker", "settle_timeout_ms"] => {
            config.checker.settle_timeout_ms = parse_number(value)?;
        }
        ["checker", "sweep_interval_secs"] => {
            config.checker.sweep_interval_secs = parse_number(value)?;
        }
        ["log", "level"] => {
            value
                .parse::<log::LevelFilter>()
                .map_err(|_| anyhow!("Invalid log level: {}", value))?;
            config.log.level = value.to_lowercase();
        }
        _ => {
            return Err(anyhow!(
                "Unknown config key: {}. Valid keys include: current_profile_name, profiles.<name>.ignore_window_on_rule_check_timeout, profiles.<name>.rules_path, checker.check_times_limit, checker.match_policy, checker.title_strategy, log.level, etc.",
                key
            ));
        }
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid number: {}", value))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "Invalid boolean value: {}. Use true/false, yes/no, 1/0, or on/off",
            value
        )),
    }
}
