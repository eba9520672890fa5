use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actions::DEFAULT_ACTION_DELAY_MS;
use crate::hotkeys::{HotkeyBinding, DEFAULT_ACTION_KEY, DEFAULT_TOGGLE_KEY};
use crate::types::{HotkeyScope, Region};

pub const MIN_SIMILARITY: u8 = 50;
pub const MAX_SIMILARITY: u8 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub toggle_key: String,
    pub action_key: String,
    pub scope: HotkeyScope,
    /// Percent, 50..=100.
    pub similarity: u8,
    pub loop_delay_ms: u64,
    pub default_delay_ms: u64,
    pub region: Option<Region>,
    pub reference: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            toggle_key: DEFAULT_TOGGLE_KEY.to_string(),
            action_key: DEFAULT_ACTION_KEY.to_string(),
            scope: HotkeyScope::Focused,
            similarity: 80,
            loop_delay_ms: 250,
            default_delay_ms: DEFAULT_ACTION_DELAY_MS,
            region: None,
            reference: None,
        }
    }
}

impl Settings {
    /// Missing or malformed files give defaults.
    pub fn load(path: &Path) -> Self {
        let mut settings: Self = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        settings.similarity = settings.similarity.clamp(MIN_SIMILARITY, MAX_SIMILARITY);
        if settings.toggle_key.trim().is_empty() {
            settings.toggle_key = DEFAULT_TOGGLE_KEY.to_string();
        }
        if settings.action_key.trim().is_empty() {
            settings.action_key = DEFAULT_ACTION_KEY.to_string();
        }
        settings
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }

    pub fn binding(&self) -> HotkeyBinding {
        HotkeyBinding {
            toggle_key: self.toggle_key.to_lowercase(),
            action_key: self.action_key.to_lowercase(),
            scope: self.scope,
        }
    }

    pub fn set_binding(&mut self, binding: &HotkeyBinding) {
        self.toggle_key = binding.toggle_key.clone();
        self.action_key = binding.action_key.clone();
        self.scope = binding.scope;
    }

    pub fn threshold(&self) -> f64 {
        self.similarity as f64 / 100.0
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
        assert_eq!(s.threshold(), 0.8);
        assert_eq!(s.binding(), HotkeyBinding::default());
    }

    #[test]
    fn partial_file_fills_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"similarity": 20, "scope": "global", "toggle_key": "F6"}"#).unwrap();
        let s = Settings::load(&path);
        assert_eq!(s.similarity, 50);
        assert_eq!(s.scope, HotkeyScope::Global);
        assert_eq!(s.binding().toggle_key, "f6");
        assert_eq!(s.action_key, "f10");
        assert_eq!(s.loop_delay(), Duration::from_millis(250));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let s = Settings {
            similarity: 92,
            region: Some(Region { left: 5, top: 6, width: 70, height: 80 }),
            reference: Some(PathBuf::from("button.png")),
            ..Settings::default()
        };
        s.save(&path);
        assert_eq!(Settings::load(&path), s);
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }
}
