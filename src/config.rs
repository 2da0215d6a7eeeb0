use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::StrategyKind;

/// Which physical camera to prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointed away from the user
    Environment,
    /// Front camera
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub facing: FacingMode,
    /// Ideal capture width; best effort
    pub width: u32,
    /// Ideal capture height; best effort
    pub height: u32,
    pub frame_rate: u32,
    /// Give up on a stream that shows no frame after this long
    pub acquire_timeout_ms: u64,
    /// Attempts for retryable acquisition errors
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Explicit device index, overrides facing preference
    pub device_index: Option<u32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            width: 1280,
            height: 720,
            frame_rate: 30,
            acquire_timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 2_000,
            device_index: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Also try the color-inverted image (light-on-dark codes)
    pub try_inverted: bool,
    /// Luma gain for the last-chance pass (0 disables it)
    pub contrast_boost: f32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            try_inverted: true,
            contrast_boost: 1.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    pub try_harder: bool,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self { try_harder: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    pub enabled: bool,
    /// Candidates below this score are ignored
    pub min_confidence: f32,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min: f32,
    pub max: f32,
    /// Zoom change per wheel notch
    pub wheel_step: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 4.0,
            wheel_step: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Same code is not reported again within this window
    pub cooldown_ms: u64,

    /// Distinct codes remembered by the debouncer
    pub cooldown_capacity: usize,

    /// Delay between polling ticks
    pub tick_interval_ms: u64,

    /// Delay after a successful detection before normal cadence resumes
    pub success_pause_ms: u64,

    /// Strategy priority, first match wins
    pub strategy_order: Vec<StrategyKind>,

    pub camera: CameraConfig,
    pub qr: QrConfig,
    pub linear: LinearConfig,
    pub ml: MlConfig,
    pub zoom: ZoomConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2_500,
            cooldown_capacity: 256,
            tick_interval_ms: 100,
            success_pause_ms: 2_000,
            strategy_order: StrategyKind::default_order(),
            camera: CameraConfig::default(),
            qr: QrConfig::default(),
            linear: LinearConfig::default(),
            ml: MlConfig::default(),
            zoom: ZoomConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from the platform-specific config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let config = Self::load_from(&config_path)?;
            tracing::info!("✓ Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            let config = ScannerConfig::default();
            config.save_to(&config_path)?;
            tracing::info!("✓ Created default config at: {}", config_path.display());
            Ok(config)
        }
    }

    /// Load and validate a config file at an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: ScannerConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cooldown_ms == 0 {
            return Err(ConfigError::Invalid("cooldown_ms must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.strategy_order.is_empty() {
            return Err(ConfigError::Invalid("strategy_order is empty".into()));
        }
        let unique: HashSet<_> = self.strategy_order.iter().collect();
        if unique.len() != self.strategy_order.len() {
            return Err(ConfigError::Invalid(
                "strategy_order lists a strategy twice".into(),
            ));
        }
        if self.zoom.min < 1.0 || self.zoom.max < self.zoom.min {
            return Err(ConfigError::Invalid(format!(
                "zoom range {}..{} is invalid",
                self.zoom.min, self.zoom.max
            )));
        }
        Ok(())
    }

    /// Default config file path under the user config directory
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("checkout-scanner").join("config.json"))
    }

    /// Log directory next to the config file
    pub fn log_dir() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("checkout-scanner").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }
}
