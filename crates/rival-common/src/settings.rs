// settings.rs -- user settings, versioned JSON on disk
//
// The settings file is rewritten whenever the shell changes a value, so the
// schema carries a version and older files migrate stepwise on load. A
// missing file is not an error: defaults are written back.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const SETTINGS_VERSION: u32 = 3;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings version {0} is newer than this build supports")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    pub enabled: bool,
    pub skills: bool,
    pub packets: bool,
    pub abnormals: bool,
    pub ping: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            skills: false,
            packets: false,
            abnormals: false,
            ping: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingSettings {
    pub timeout_ms: i64,
    pub interval_ms: i64,
    pub samples: usize,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            interval_ms: 6000,
            samples: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillSettings {
    pub enabled: bool,
    pub retry_count: u32,
    pub retry_ms: i64,
    pub retry_jitter_comp: i64,
    pub server_timeout_ms: i64,
    pub force_clip_strict: bool,
    pub defend_success_strict: bool,
    pub delay_on_fail: bool,
    pub jitter_compensation: bool,
    pub charge_jitter_max: i64,
}

impl Default for SkillSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_count: 2,
            retry_ms: 30,
            retry_jitter_comp: 15,
            server_timeout_ms: 200,
            force_clip_strict: true,
            defend_success_strict: false,
            delay_on_fail: true,
            jitter_compensation: true,
            charge_jitter_max: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationSettings {
    pub enable_instant_skills: bool,
    pub enable_instant_chains: bool,
    pub enable_predictive_retries: bool,
}

impl Default for EmulationSettings {
    fn default() -> Self {
        Self {
            enable_instant_skills: true,
            enable_instant_chains: true,
            enable_predictive_retries: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketSettings {
    pub queue_throttle_ms: i64,
    pub max_queue_size: usize,
}

impl Default for PacketSettings {
    fn default() -> Self {
        Self {
            queue_throttle_ms: 0,
            max_queue_size: 2048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesyncSettings {
    /// Back-correction distance applied to in-action location notifies,
    /// stored negated (the shell negates the operator's value).
    pub back_correction: f32,
}

impl Default for DesyncSettings {
    fn default() -> Self {
        Self { back_correction: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub version: u32,
    pub enabled: bool,
    pub debug: DebugSettings,
    pub ping: PingSettings,
    pub skills: SkillSettings,
    pub emulation: EmulationSettings,
    pub packets: PacketSettings,
    pub desync: DesyncSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            enabled: true,
            debug: DebugSettings::default(),
            ping: PingSettings::default(),
            skills: SkillSettings::default(),
            emulation: EmulationSettings::default(),
            packets: PacketSettings::default(),
            desync: DesyncSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `path`, migrating older versions in place. A missing file
    /// yields defaults and writes them back so the operator has something
    /// to edit.
    pub fn load(path: &Path) -> Result<Settings, SettingsError> {
        if !path.exists() {
            let settings = Settings::default();
            settings.save(path)?;
            return Ok(settings);
        }
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        let settings = Self::from_value(value)?;
        Ok(settings)
    }

    pub fn from_value(mut value: Value) -> Result<Settings, SettingsError> {
        let mut version = value.get("version").and_then(Value::as_u64).unwrap_or(1) as u32;
        if version > SETTINGS_VERSION {
            return Err(SettingsError::UnsupportedVersion(version));
        }
        while version < SETTINGS_VERSION {
            value = migrate_step(value, version);
            version += 1;
        }
        let settings: Settings = serde_json::from_value(value)?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// One migration step, `from` → `from + 1`.
fn migrate_step(mut value: Value, from: u32) -> Value {
    let obj = match value.as_object_mut() {
        Some(obj) => obj,
        None => return Value::Object(Default::default()),
    };
    match from {
        // v1 kept a single boolean `debug`
        1 => {
            if let Some(flag) = obj.remove("debug").and_then(|v| v.as_bool().map(Value::Bool)) {
                obj.insert(
                    "debug".to_string(),
                    serde_json::json!({ "enabled": flag }),
                );
            }
        }
        // v2 had no desync section and kept back_correction at top level
        2 => {
            if let Some(bc) = obj.remove("back_correction") {
                obj.insert("desync".to_string(), serde_json::json!({ "back_correction": bc }));
            }
        }
        _ => {}
    }
    obj.insert("version".to_string(), Value::from(from + 1));
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let s = Settings::default();
        let text = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&text).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_migrate_v1_debug_flag() {
        let v1 = serde_json::json!({
            "version": 1,
            "enabled": false,
            "debug": true,
        });
        let s = Settings::from_value(v1).unwrap();
        assert_eq!(s.version, SETTINGS_VERSION);
        assert!(!s.enabled);
        assert!(s.debug.enabled);
        assert!(!s.debug.skills);
    }

    #[test]
    fn test_migrate_v2_back_correction() {
        let v2 = serde_json::json!({
            "version": 2,
            "back_correction": -12.5,
        });
        let s = Settings::from_value(v2).unwrap();
        assert_eq!(s.desync.back_correction, -12.5);
    }

    #[test]
    fn test_newer_version_rejected() {
        let v = serde_json::json!({ "version": SETTINGS_VERSION + 1 });
        assert!(matches!(
            Settings::from_value(v),
            Err(SettingsError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_unknown_top_level_field_rejected() {
        let v = serde_json::json!({
            "version": SETTINGS_VERSION,
            "no_such_field": 1,
        });
        assert!(Settings::from_value(v).is_err());
    }

    #[test]
    fn test_missing_sections_fill_defaults() {
        let v = serde_json::json!({ "version": SETTINGS_VERSION, "enabled": false });
        let s = Settings::from_value(v).unwrap();
        assert!(!s.enabled);
        assert_eq!(s.skills, SkillSettings::default());
    }
}
