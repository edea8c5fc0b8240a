use crate::pose::BodySide;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RepCountConfig {
    pub counter: CounterConfig,
    pub source: SourceConfig,
    pub overlay: OverlayConfig,
    pub export: ExportConfig,
    pub upload: UploadConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CounterConfig {
    /// Knee angle above which the leg counts as extended (UP)
    #[serde(default = "default_up_threshold")]
    pub up_threshold: f64,

    /// Knee angle below which an extended leg counts as flexed (DOWN)
    #[serde(default = "default_down_threshold")]
    pub down_threshold: f64,

    /// Side of the body whose hip, knee and ankle are measured
    #[serde(default = "default_side")]
    pub side: BodySide,

    /// Use the other side when the preferred side is not fully visible
    #[serde(default = "default_fallback_to_opposite_side")]
    pub fallback_to_opposite_side: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Landmark recording to replay (NDJSON, one frame per line)
    #[serde(default)]
    pub recording: Option<PathBuf>,

    /// Frame resolution reported for replayed frames (width, height)
    #[serde(default = "default_resolution")]
    pub resolution: (u32, u32),

    /// Replay pacing in frames per second; 0 replays as fast as possible
    #[serde(default = "default_replay_fps")]
    pub replay_fps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OverlayConfig {
    /// Draw the status box and leg segments onto RGB frames
    #[serde(default = "default_overlay_enabled")]
    pub enabled: bool,

    /// Path to TrueType font file for the REPS/STAGE text
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Font size for the counter values
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    /// Directory the CSV export is written to
    #[serde(default = "default_export_dir")]
    pub directory: String,

    /// Export file name, also used as the logical upload name
    #[serde(default = "default_export_file_name")]
    pub file_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Directory used by the local archive uploader
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// Viewer reference template; `{id}` is replaced with the artifact identifier
    #[serde(default = "default_viewer_url_template")]
    pub viewer_url_template: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl RepCountConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("repcount.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("counter.up_threshold", default_up_threshold())?
            .set_default("counter.down_threshold", default_down_threshold())?
            .set_default("counter.side", default_side().to_string())?
            .set_default(
                "counter.fallback_to_opposite_side",
                default_fallback_to_opposite_side(),
            )?
            .set_default(
                "source.resolution",
                vec![default_resolution().0, default_resolution().1],
            )?
            .set_default("source.replay_fps", default_replay_fps())?
            .set_default("overlay.enabled", default_overlay_enabled())?
            .set_default("overlay.font_path", default_font_path())?
            .set_default("overlay.font_size", default_font_size() as f64)?
            .set_default("export.directory", default_export_dir())?
            .set_default("export.file_name", default_export_file_name())?
            .set_default("upload.archive_dir", default_archive_dir())?
            .set_default("upload.viewer_url_template", default_viewer_url_template())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("REPCOUNT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: RepCountConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counter = &self.counter;
        if !(counter.up_threshold.is_finite() && counter.down_threshold.is_finite()) {
            return Err(ConfigError::Message(
                "Counter thresholds must be finite".to_string(),
            ));
        }

        if counter.down_threshold < 0.0 || counter.up_threshold > 180.0 {
            return Err(ConfigError::Message(
                "Counter thresholds must lie within [0, 180] degrees".to_string(),
            ));
        }

        if counter.down_threshold >= counter.up_threshold {
            return Err(ConfigError::Message(format!(
                "Counter down_threshold ({}) must be below up_threshold ({})",
                counter.down_threshold, counter.up_threshold
            )));
        }

        if self.source.resolution.0 == 0 || self.source.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Source resolution must be greater than 0".to_string(),
            ));
        }

        if self.overlay.font_size <= 0.0 {
            return Err(ConfigError::Message(
                "Overlay font_size must be greater than 0".to_string(),
            ));
        }

        if self.export.file_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Export file_name must not be empty".to_string(),
            ));
        }

        if !self.upload.viewer_url_template.contains("{id}") {
            return Err(ConfigError::Message(
                "Upload viewer_url_template must contain '{id}'".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Full path of the CSV export
    pub fn export_path(&self) -> PathBuf {
        Path::new(&self.export.directory).join(&self.export.file_name)
    }

    /// Serialize to TOML, e.g. for `--print-config`
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for RepCountConfig {
    fn default() -> Self {
        Self {
            counter: CounterConfig {
                up_threshold: default_up_threshold(),
                down_threshold: default_down_threshold(),
                side: default_side(),
                fallback_to_opposite_side: default_fallback_to_opposite_side(),
            },
            source: SourceConfig {
                recording: None,
                resolution: default_resolution(),
                replay_fps: default_replay_fps(),
            },
            overlay: OverlayConfig {
                enabled: default_overlay_enabled(),
                font_path: default_font_path(),
                font_size: default_font_size(),
            },
            export: ExportConfig {
                directory: default_export_dir(),
                file_name: default_export_file_name(),
            },
            upload: UploadConfig {
                archive_dir: default_archive_dir(),
                viewer_url_template: default_viewer_url_template(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_up_threshold() -> f64 {
    crate::counter::DEFAULT_UP_THRESHOLD
}
fn default_down_threshold() -> f64 {
    crate::counter::DEFAULT_DOWN_THRESHOLD
}
fn default_side() -> BodySide {
    BodySide::Left
}
fn default_fallback_to_opposite_side() -> bool {
    true
}

fn default_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_replay_fps() -> u32 {
    0
}

fn default_overlay_enabled() -> bool {
    true
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    32.0
}

fn default_export_dir() -> String {
    ".".to_string()
}
fn default_export_file_name() -> String {
    "squat_position_data.csv".to_string()
}

fn default_archive_dir() -> String {
    "./archive".to_string()
}
fn default_viewer_url_template() -> String {
    "https://drive.google.com/file/d/{id}/view".to_string()
}

fn default_event_bus_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RepCountConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.counter.side, BodySide::Left);
        assert_eq!(config.counter.up_threshold, 160.0);
        assert_eq!(config.counter.down_threshold, 120.0);
        assert_eq!(
            config.export_path(),
            Path::new(".").join("squat_position_data.csv")
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = RepCountConfig::default();

        // Inverted hysteresis band
        config.counter.down_threshold = 170.0;
        assert!(config.validate().is_err());

        config.counter.down_threshold = 120.0;
        config.counter.up_threshold = 190.0;
        assert!(config.validate().is_err());

        config.counter.up_threshold = 160.0;
        config.upload.viewer_url_template = "https://example.com/view".to_string();
        assert!(config.validate().is_err());

        config.upload.viewer_url_template = default_viewer_url_template();
        config.export.file_name = "  ".to_string();
        assert!(config.validate().is_err());

        config.export.file_name = default_export_file_name();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[counter]
side = "right"
up_threshold = 150.0

[export]
file_name = "session.csv"
"#
        )
        .unwrap();

        let config = RepCountConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.counter.side, BodySide::Right);
        assert_eq!(config.counter.up_threshold, 150.0);
        assert_eq!(config.counter.down_threshold, 120.0);
        assert_eq!(config.export.file_name, "session.csv");
        assert_eq!(config.source.resolution, (640, 480));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = RepCountConfig::load_from_file("/nonexistent/repcount.toml").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.export.file_name, "squat_position_data.csv");
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let toml_text = RepCountConfig::default().to_toml().unwrap();
        assert!(toml_text.contains("[counter]"));
        assert!(toml_text.contains("side = \"left\""));

        let parsed: RepCountConfig = toml::from_str(&toml_text).unwrap();
        assert_eq!(parsed.counter.side, BodySide::Left);
    }
}
