use serde::Deserialize;

use crate::config::ConfigError;
use crate::storage::paths;

const VIEWER_JSON: &str = include_str!("../assets/viewer.json");

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub view: ViewDefaults,
    pub target_fps: f64,
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub show_status_bar: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

/// The view `R` snaps back to.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ViewDefaults {
    pub real_offset: f32,
    pub imaginary_offset: f32,
    pub zoom: f32,
    pub zoom_factor: f32,
}

impl Default for ViewDefaults {
    fn default() -> Self {
        Self {
            real_offset: -0.7,
            imaginary_offset: 0.0,
            zoom: 1.0,
            zoom_factor: 1.5,
        }
    }
}

impl ViewerConfig {
    /// Minimum seconds between two scheduler ticks.
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.target_fps
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.window;
        if !(w.width.is_finite() && w.width > 0.0 && w.height.is_finite() && w.height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "window size must be positive, got {}x{}",
                w.width, w.height
            )));
        }

        let v = &self.view;
        if !(v.real_offset.is_finite() && v.imaginary_offset.is_finite()) {
            return Err(ConfigError::Invalid("view offsets must be finite".to_string()));
        }
        if !(v.zoom.is_normal() && v.zoom > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "zoom must be positive, got {}",
                v.zoom
            )));
        }
        if !(v.zoom_factor.is_finite() && v.zoom_factor > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "zoom_factor must be greater than 1, got {}",
                v.zoom_factor
            )));
        }

        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }

        Ok(())
    }
}

/// 内置默认配置（编译期嵌入）。
pub fn default_viewer_config() -> Result<ViewerConfig, ConfigError> {
    parse_viewer_config(VIEWER_JSON)
}

/// 加载配置：用户目录下存在 `viewer.json` 时优先使用，否则回退到内置配置。
pub fn load_viewer_config() -> Result<ViewerConfig, ConfigError> {
    let path = paths::viewer_config_path();
    if !path.exists() {
        log::debug!("no user config at {}, using built-in defaults", path.display());
        return default_viewer_config();
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = parse_viewer_config(&content)?;
    log::info!("loaded viewer config from {}", path.display());
    Ok(config)
}

fn parse_viewer_config(json: &str) -> Result<ViewerConfig, ConfigError> {
    let config: ViewerConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}
