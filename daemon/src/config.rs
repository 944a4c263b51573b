use anyhow::{Context, Result};
use common::{MeasureSpec, ScaleMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::playback::VideoSource;
use crate::surface::SurfaceTarget;
use crate::validate_enum;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub video: VideoSettings,

    #[serde(default)]
    pub surface: SurfaceSettings,
}

/// General daemon settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// What to play and how to size it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoSettings {
    /// Path to the video file (`~` is expanded)
    #[serde(default)]
    pub source: String,

    /// Scale mode name or code (none/0, center/1, fit-horizontal/2,
    /// fit-vertical/3, fit-all/4)
    #[serde(default = "default_scale")]
    pub scale: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            source: String::new(),
            scale: default_scale(),
        }
    }
}

fn default_scale() -> String {
    "none".to_string()
}

/// Surface the daemon renders into
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurfaceSettings {
    #[serde(default = "default_surface_name")]
    pub name: String,

    /// Native window to render into; the video sink opens its own if unset
    #[serde(default)]
    pub window_handle: Option<u64>,

    /// Announce the surface as available at startup
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Width constraint for measurement passes (exact:N, at-most:N, unspecified)
    #[serde(default = "default_measure_spec")]
    pub width: String,

    /// Height constraint for measurement passes
    #[serde(default = "default_measure_spec")]
    pub height: String,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            name: default_surface_name(),
            window_handle: None,
            auto_start: true,
            width: default_measure_spec(),
            height: default_measure_spec(),
        }
    }
}

fn default_surface_name() -> String {
    "main".to_string()
}
fn default_true() -> bool {
    true
}
fn default_measure_spec() -> String {
    "unspecified".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("loopview");

        Ok(config_dir.join("config.toml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.validate_log_level(&self.general.log_level)?;

        ScaleMode::parse(&self.video.scale).context("Invalid [video] scale")?;
        self.surface
            .width
            .parse::<MeasureSpec>()
            .context("Invalid [surface] width")?;
        self.surface
            .height
            .parse::<MeasureSpec>()
            .context("Invalid [surface] height")?;

        if self.video.source.trim().is_empty() {
            log::warn!("No [video] source configured, playback will fail to load");
        }

        Ok(())
    }

    fn validate_log_level(&self, level: &str) -> Result<()> {
        validate_enum!(level, "trace", "debug", "info", "warn", "error")
    }

    /// Configured scale mode; None when unset or unrecognised
    pub fn scale_mode(&self) -> Option<ScaleMode> {
        ScaleMode::parse(&self.video.scale).ok().flatten()
    }

    pub fn video_source(&self) -> VideoSource {
        VideoSource::new(shellexpand::tilde(self.video.source.trim()).into_owned())
    }

    pub fn surface_target(&self) -> SurfaceTarget {
        SurfaceTarget {
            name: self.surface.name.clone(),
            window_handle: self.surface.window_handle,
        }
    }

    pub fn width_spec(&self) -> MeasureSpec {
        self.surface.width.parse().unwrap_or(MeasureSpec::unspecified())
    }

    pub fn height_spec(&self) -> MeasureSpec {
        self.surface
            .height
            .parse()
            .unwrap_or(MeasureSpec::unspecified())
    }
}
