use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Context;

/// Saved connection settings, kept in `~/.shipyard/profile.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Profile {
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

impl Profile {
    /// Loads the saved profile. A missing profile file is an empty profile.
    pub fn load() -> anyhow::Result<Self> {
        let profile_path = Profile::build_config_path()?;

        let profile_json = match fs::read_to_string(&profile_path) {
            Ok(profile_json) => profile_json,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Profile::default()),
            Err(err) => return Err(err).with_context(|| format!("reading {}", profile_path.display())),
        };

        let profile: Profile = serde_json::from_str(&profile_json)
            .with_context(|| format!("parsing {}", profile_path.display()))?;

        Ok(profile)
    }

    fn build_config_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::home_dir().context("cannot determine home directory")?;

        path.push(".shipyard");
        path.push("profile.json");

        Ok(path)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let profile_path = Profile::build_config_path()?;

        if let Some(parent) = profile_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let profile_json = serde_json::to_string_pretty(&self)?;

        Ok(fs::write(&profile_path, profile_json)?)
    }
}
