use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_spark_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// IANA zone used for "today". System local clock when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub reminders: RemindersSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Never asked; treated like denied.
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_permission")]
    pub permission: Permission,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// `HH:MM` for habits without their own reminder time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_time: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_permission() -> Permission {
    Permission::Granted
}

fn default_check_interval() -> u64 {
    300
}

impl Default for RemindersSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            permission: default_permission(),
            check_interval_secs: default_check_interval(),
            default_time: Some("20:00".to_string()),
        }
    }
}

impl Config {
    /// The configured zone, or `None` for the system local clock.
    pub fn tz(&self) -> Result<Option<Tz>> {
        self.timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| anyhow::anyhow!("invalid timezone: {name}"))
            })
            .transpose()
    }

    /// Permission after the `enabled` switch: disabled reminders act as denied.
    pub fn effective_permission(&self) -> Permission {
        if self.reminders.enabled {
            self.reminders.permission
        } else {
            Permission::Denied
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_spark_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    println!("Config ({}):\n", config_path()?.display());
    println!("- timezone: {}", cfg.timezone.as_deref().unwrap_or("<system local>"));
    println!("- reminders.enabled: {}", cfg.reminders.enabled);
    println!("- reminders.permission: {:?}", cfg.reminders.permission);
    println!("- reminders.check_interval_secs: {}", cfg.reminders.check_interval_secs);
    println!(
        "- reminders.default_time: {}",
        cfg.reminders.default_time.as_deref().unwrap_or("<not set>")
    );
    Ok(())
}
