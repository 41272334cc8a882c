//! TOML-based CLI configuration.
//!
//! Stands in for the identity provider: stores the acting user's id,
//! display name, and local-day preferences. Stored at
//! `~/.config/habithive/config.toml`; a fresh file with a generated user id
//! is written on first use.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use habithive_core::store::data_dir;
use habithive_core::Profile;

fn default_display_name() -> String {
    "New Bee".to_string()
}

fn default_day_start_hour() -> u32 {
    4
}

/// Local identity and day preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub user_id: Uuid,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Offset of local time from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Hour at which the day rolls over (0-23).
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            display_name: default_display_name(),
            avatar_url: None,
            utc_offset_minutes: 0,
            day_start_hour: default_day_start_hour(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load the config, creating and persisting a default on first use.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be parsed or a fresh
    /// one cannot be written.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
    }

    /// The profile row this config represents.
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.user_id,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            utc_offset_minutes: self.utc_offset_minutes,
            day_start_hour: self.day_start_hour,
        }
    }
}
