//! Configuration loader - YAML viewer config + .env environment + persisted state

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::viewer::Settings;

/// Main configuration loaded from viewer.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Paths or URLs tried in order by the Demo button
    pub demo_candidates: Vec<String>,
    /// Control values the viewer starts with
    pub defaults: Settings,
    pub window: WindowSize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: f32,
    pub height: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            demo_candidates: vec![
                "data/sort_evo_demo.csv".to_string(),
                "data/sort_evo_demo.csv.gz".to_string(),
                "logs/evolution.csv".to_string(),
            ],
            defaults: Settings::default(),
            window: WindowSize { width: 1280.0, height: 820.0 },
        }
    }
}

impl ViewerConfig {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ViewerConfig = serde_yaml::from_str(&content)?;
        config.sanitize();
        Ok(config)
    }

    /// Playback speed must be a positive, finite number of steps per second
    fn sanitize(&mut self) {
        let speed = self.defaults.speed;
        if !speed.is_finite() || speed <= 0.0 {
            warn!("Ignoring playback speed {} from config, using 1.0", speed);
            self.defaults.speed = 1.0;
        }
    }

    /// Like `load`, but a missing file means built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        info!("Loaded config from {} ({} demo candidates)", path.display(), config.demo_candidates.len());
        Ok(config)
    }
}

/// Environment loaded from .env
#[derive(Debug, Clone)]
pub struct Env {
    pub log_dir: String,
    pub state_file: PathBuf,
}

impl Env {
    /// Load environment from .env file
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Env {
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            state_file: std::env::var("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("viewer_state.yaml")),
        }
    }
}

/// What survives between sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    pub last_source: Option<String>,
}

impl ViewerState {
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            if let Ok(contents) = std::fs::read_to_string(path) {
                if let Ok(state) = serde_yaml::from_str(&contents) {
                    info!("Loaded viewer state from {}", path.display());
                    return state;
                }
            }
            warn!("Ignoring unreadable viewer state {}", path.display());
        }
        Self::default()
    }

    pub fn save(&self, path: &Path) {
        match serde_yaml::to_string(self) {
            Ok(yaml) => match std::fs::write(path, yaml) {
                Ok(()) => info!("Saved viewer state to {}", path.display()),
                Err(e) => warn!("Could not write {}: {}", path.display(), e),
            },
            Err(e) => warn!("Could not serialize viewer state: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Algo;
    use crate::render::RevealMode;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "demo_candidates:\n  - https://example.org/run.csv\ndefaults:\n  filters:\n    algo: MS\n  reveal: top-n\n  speed: 4.0\n";
        let config: ViewerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.demo_candidates, vec!["https://example.org/run.csv".to_string()]);
        assert_eq!(config.defaults.filters.algo, Some(Algo::MergeSort));
        assert_eq!(config.defaults.reveal, RevealMode::TopN);
        assert_eq!(config.defaults.speed, 4.0);
        assert_eq!(config.window.width, 1280.0);
    }

    #[test]
    fn test_bad_speed_falls_back() {
        let path = std::env::temp_dir().join(format!("sort_evo_viz_speed_{}.yaml", std::process::id()));
        for speed in ["-5.0", "0", ".nan", ".inf"] {
            std::fs::write(&path, format!("defaults:\n  speed: {}\n", speed)).unwrap();
            let config = ViewerConfig::load(&path).unwrap();
            assert_eq!(config.defaults.speed, 1.0, "speed {}", speed);
        }
        std::fs::write(&path, "defaults:\n  speed: 2.5\n").unwrap();
        assert_eq!(ViewerConfig::load(&path).unwrap().defaults.speed, 2.5);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_config_is_default() {
        let config = ViewerConfig::load_or_default("/nonexistent/viewer.yaml").unwrap();
        assert_eq!(config.demo_candidates.len(), 3);
    }

    #[test]
    fn test_state_round_trip() {
        let path = std::env::temp_dir().join(format!("sort_evo_viz_state_{}.yaml", std::process::id()));
        let state = ViewerState { last_source: Some("logs/run.csv".into()) };
        state.save(&path);
        assert_eq!(ViewerState::load(&path), state);
        std::fs::remove_file(&path).ok();
        assert_eq!(ViewerState::load(&path), ViewerState::default());
    }
}
