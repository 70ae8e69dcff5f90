//! Configuration system
//!
//! Engine settings grouped by subsystem. Every section falls back to its
//! defaults, so a config file only needs the values it changes.

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_str_with_format(&contents, path)
    }

    /// Parse configuration text, picking the format from the file name's extension
    fn from_str_with_format(contents: &str, path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Load configuration from file, or defaults when the file does not exist
    fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        if std::path::Path::new(path).exists() {
            Self::load_from_file(path)
        } else {
            log::info!("No config at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Application identity handed to the Vulkan instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name
    pub name: String,
    /// Application version (major, minor, patch)
    pub version: (u32, u32, u32),
    /// Enable validation layers and the debug messenger
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "A_GrogApp_00".to_string(),
            version: (0, 0, 0),
            debug: cfg!(debug_assertions),
        }
    }
}

/// Window creation and placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Client width in screen coordinates
    pub width: u32,
    /// Client height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
    /// Monitor to open on; out of range means the primary one
    pub monitor: usize,
    /// Center on the monitor instead of keeping the system's placement
    pub center: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "DrunkSpock".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
            monitor: 0,
            center: true,
        }
    }
}

/// Game loop pacing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Game update interval in ms
    pub update_tic_ms: u64,
    /// Render interval in ms
    pub render_tic_ms: u64,
    /// Frames shorter than this trigger a nap
    pub idle_threshold_ms: u64,
    /// Length of the nap in ms
    pub idle_sleep_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            update_tic_ms: 33,
            render_tic_ms: 33,
            idle_threshold_ms: 5,
            idle_sleep_ms: 5,
        }
    }
}

/// Swapchain and pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// SPIR-V vertex shader path
    pub vertex_shader: String,
    /// SPIR-V fragment shader path
    pub fragment_shader: String,
    /// Frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Use mailbox presentation when the surface offers it
    pub prefer_mailbox: bool,
    /// Clear color (RGBA)
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vertex_shader: "target/shaders/triangle.spv".to_string(),
            fragment_shader: "target/shaders/triangle_frag.spv".to_string(),
            max_frames_in_flight: 2,
            prefer_mailbox: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Application identity
    pub app: AppConfig,
    /// Window settings
    pub window: WindowConfig,
    /// Loop pacing
    pub timing: TimingConfig,
    /// Rendering settings
    pub render: RenderConfig,
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [window]
            title = "Grog"
            width = 800

            [timing]
            update_tic_ms = 16
        "#;
        let config = EngineConfig::from_str_with_format(text, "drunk_spock.toml").unwrap();
        assert_eq!(config.window.title, "Grog");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.timing.update_tic_ms, 16);
        assert_eq!(config.timing.render_tic_ms, 33);
        assert_eq!(config.app.name, "A_GrogApp_00");
    }

    #[test]
    fn test_ron_config() {
        let text = r#"(render: (max_frames_in_flight: 3, prefer_mailbox: false))"#;
        let config = EngineConfig::from_str_with_format(text, "engine.ron").unwrap();
        assert_eq!(config.render.max_frames_in_flight, 3);
        assert!(!config.render.prefer_mailbox);
        assert_eq!(config.render.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = EngineConfig::from_str_with_format("", "engine.ini").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = EngineConfig::from_str_with_format("[window\nwidth=", "bad.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_save_and_load_toml() {
        let path = std::env::temp_dir().join(format!("drunk_spock_cfg_{}.toml", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let mut config = EngineConfig::default();
        config.app.name = "Saved".to_string();
        config.window.monitor = 1;
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = EngineConfig::load_or_default("definitely/not/here.toml").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
