//! Configuration for sightsound paths and services.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SIGHTSOUND_HOME, SIGHTSOUND_API_KEY)
//! 2. Config file (.sightsound/config.yaml)
//! 3. Defaults (~/.sightsound, public service endpoints)
//!
//! Config file discovery:
//! - Searches current directory and parents for .sightsound/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::Coordinates;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ai: Option<AiConfig>,
    #[serde(default)]
    pub camera: Option<CameraConfig>,
    #[serde(default)]
    pub location: Option<LocationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub endpoint: Option<String>,
    pub description_model: Option<String>,
    pub speech_model: Option<String>,
    pub male_voice: Option<String>,
    pub female_voice: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub binary: Option<String>,
    pub user_device: Option<String>,
    pub environment_device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    pub endpoint: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Resolved configuration with absolute paths and filled-in defaults
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to sightsound home (state and history)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// AI service settings
    pub ai: AiSettings,
    /// Camera capture settings
    pub camera: CameraSettings,
    /// Location settings
    pub location: LocationSettings,
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub endpoint: String,
    pub description_model: String,
    pub speech_model: String,
    pub male_voice: String,
    pub female_voice: String,
    pub api_key: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            description_model: "gemini-2.0-flash".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            male_voice: "Algenib".to_string(),
            female_voice: "Achernar".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub binary: String,
    pub user_device: String,
    pub environment_device: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            user_device: "/dev/video0".to_string(),
            environment_device: "/dev/video1".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationSettings {
    pub endpoint: String,
    /// Fixed position, if configured
    pub coordinates: Option<Coordinates>,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            coordinates: None,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".sightsound").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn ai_settings(config: Option<&AiConfig>) -> AiSettings {
    let defaults = AiSettings::default();

    let api_key = std::env::var("SIGHTSOUND_API_KEY")
        .or_else(|_| std::env::var("GEMINI_API_KEY"))
        .ok()
        .or_else(|| config.and_then(|c| c.api_key.clone()));

    AiSettings {
        endpoint: config
            .and_then(|c| c.endpoint.clone())
            .unwrap_or(defaults.endpoint),
        description_model: config
            .and_then(|c| c.description_model.clone())
            .unwrap_or(defaults.description_model),
        speech_model: config
            .and_then(|c| c.speech_model.clone())
            .unwrap_or(defaults.speech_model),
        male_voice: config
            .and_then(|c| c.male_voice.clone())
            .unwrap_or(defaults.male_voice),
        female_voice: config
            .and_then(|c| c.female_voice.clone())
            .unwrap_or(defaults.female_voice),
        api_key,
    }
}

fn camera_settings(config: Option<&CameraConfig>) -> CameraSettings {
    let defaults = CameraSettings::default();

    CameraSettings {
        binary: config
            .and_then(|c| c.binary.clone())
            .unwrap_or(defaults.binary),
        user_device: config
            .and_then(|c| c.user_device.clone())
            .unwrap_or(defaults.user_device),
        environment_device: config
            .and_then(|c| c.environment_device.clone())
            .unwrap_or(defaults.environment_device),
    }
}

fn location_settings(config: Option<&LocationConfig>) -> LocationSettings {
    let defaults = LocationSettings::default();

    let coordinates = config.and_then(|c| match (c.latitude, c.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
        _ => None,
    });

    LocationSettings {
        endpoint: config
            .and_then(|c| c.endpoint.clone())
            .unwrap_or(defaults.endpoint),
        coordinates,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".sightsound");

    // Check for config file
    let config_file = find_config_file();

    let (home, ai, camera, location) = if let Some(ref config_path) = config_file {
        // Config file found - use it as base
        let config = load_config_file(config_path)?;

        // Resolve home path
        let home = if let Ok(env_home) = std::env::var("SIGHTSOUND_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            // home is relative to .sightsound/ directory
            let sightsound_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(sightsound_dir, home_path)
        } else {
            default_home.clone()
        };

        (
            home,
            ai_settings(config.ai.as_ref()),
            camera_settings(config.camera.as_ref()),
            location_settings(config.location.as_ref()),
        )
    } else {
        // No config file - use env vars or defaults
        let home = std::env::var("SIGHTSOUND_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        (
            home,
            ai_settings(None),
            camera_settings(None),
            location_settings(None),
        )
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        ai,
        camera,
        location,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Get the sightsound home directory (state and history).
pub fn sightsound_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the history directory ($SIGHTSOUND_HOME/history)
pub fn history_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("history"))
}

/// Get the configured API key, or a pointer at how to set one.
pub fn api_key() -> Result<String> {
    config()?.ai.api_key.clone().context(
        "No API key configured. Set SIGHTSOUND_API_KEY or add ai.api_key to config.yaml",
    )
}
