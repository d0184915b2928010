// User configuration loaded from YAML

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::agenda::TimeRange;
use crate::models::{FamilyMember, default_members, everyone};

const APP_DIR: &str = "famcal";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the `.famcal` store
    pub store_path: PathBuf,
    /// Time range selected when the agenda opens
    pub default_range: TimeRange,
    pub members: Vec<FamilyMember>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            default_range: TimeRange::default(),
            members: default_members(),
        }
    }
}

impl Config {
    /// Default location: `$CONFIG_DIR/famcal/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(eyre!("Config file not found: {:?}", p));
                }
                p.to_path_buf()
            }
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read config {:?}", path))?;
        let config = Self::from_yaml(&content).with_context(|| format!("Invalid config {:?}", path))?;
        info!(path = ?path, members = config.members.len(), "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.normalize()?;
        Ok(config)
    }

    /// Ensure the sentinel member leads the roster and ids are unique
    fn normalize(&mut self) -> Result<()> {
        if !self.members.iter().any(FamilyMember::is_sentinel) {
            self.members.insert(0, everyone());
        }
        for (i, member) in self.members.iter().enumerate() {
            if member.id.trim().is_empty() {
                return Err(eyre!("Member {} has an empty id", i));
            }
            if self.members[..i].iter().any(|m| m.id == member.id) {
                return Err(eyre!("Duplicate member id: {}", member.id));
            }
        }
        Ok(())
    }

    pub fn member(&self, id: &str) -> Option<&FamilyMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Like `member`, but an unknown id is an error naming the valid ones
    pub fn require_member(&self, id: &str) -> Result<&FamilyMember> {
        self.member(id).ok_or_else(|| {
            let known: Vec<&str> = self.members.iter().map(|m| m.id.as_str()).collect();
            eyre!("Unknown member '{}' (known: {})", id, known.join(", "))
        })
    }

    /// A member events can be assigned to; the "whole family" sentinel is not one
    pub fn require_person(&self, id: &str) -> Result<&FamilyMember> {
        let member = self.require_member(id)?;
        if member.is_sentinel() {
            return Err(eyre!("'{}' is not a person; pick who the event is for", id));
        }
        Ok(member)
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}
