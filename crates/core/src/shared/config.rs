use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::relocation::backup_relocator::CollisionPolicy;
use crate::segment::domain::segment_key::DateFormat;
use crate::shared::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BIT_RATE, DEFAULT_CODEC, DEFAULT_FRAME_RATE,
    DEFAULT_IMAGE_EXTENSIONS, DEFAULT_STAGING_MAX_RETRY_MS, DEFAULT_STAGING_RETRY_MS,
    DEFAULT_VIDEO_EXTENSION, DEFAULT_WATCH_DEBOUNCE_MS,
};

/// Fatal startup failure: nothing is processed when the configuration is
/// unusable.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{role} directory is not configured")]
    Missing { role: &'static str },
    #[error("{role} directory does not exist: {path}")]
    NotFound { role: &'static str, path: PathBuf },
    #[error("failed to create {role} directory {path}: {source}")]
    Create {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fixed output dimensions must be positive and even, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("frame rate must be positive, got {0}")]
    InvalidFrameRate(f64),
}

/// How the width/height of a segment video is chosen.
///
/// Exactly one policy applies per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DimensionPolicy {
    /// Size of the first frame written to the output. That is the first
    /// recovered frame when the output already has frames, so a segment never
    /// changes size between passes; only a new (or damaged) output takes the
    /// size of its first decodable new still.
    FirstFrame,
    /// Every output uses this size.
    Fixed { width: u32, height: u32 },
}

/// Externally supplied settings, passed by value into each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CamrollConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub log_dir: PathBuf,
    pub recursive: bool,
    pub image_extensions: Vec<String>,
    pub video_extension: String,
    pub date_format: DateFormat,
    pub dimensions: DimensionPolicy,
    pub frame_rate: f64,
    pub codec: String,
    pub bit_rate: usize,
    pub collision_policy: CollisionPolicy,
    pub staging_retry_ms: u64,
    pub staging_max_retry_ms: u64,
    /// `None` retries forever. With a cap, a file whose producer never lets
    /// go stays in the source directory and is retried on the next pass.
    pub staging_max_attempts: Option<u32>,
    pub watch_debounce_ms: u64,
}

impl Default for CamrollConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            backup_dir: PathBuf::new(),
            staging_dir: PathBuf::new(),
            log_dir: PathBuf::from("log"),
            recursive: false,
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            video_extension: DEFAULT_VIDEO_EXTENSION.to_string(),
            date_format: DateFormat::Compact,
            dimensions: DimensionPolicy::FirstFrame,
            frame_rate: DEFAULT_FRAME_RATE,
            codec: DEFAULT_CODEC.to_string(),
            bit_rate: DEFAULT_BIT_RATE,
            collision_policy: CollisionPolicy::UniqueSuffix,
            staging_retry_ms: DEFAULT_STAGING_RETRY_MS,
            staging_max_retry_ms: DEFAULT_STAGING_MAX_RETRY_MS,
            staging_max_attempts: None,
            watch_debounce_ms: DEFAULT_WATCH_DEBOUNCE_MS,
        }
    }
}

impl CamrollConfig {
    /// `<config dir>/camroll/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the required directories and creates the private ones.
    ///
    /// Staging defaults to `<source>/.staging` when not configured.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        require_dir("source", &self.source_dir)?;
        require_dir("output", &self.output_dir)?;
        require_dir("backup", &self.backup_dir)?;

        if self.staging_dir.as_os_str().is_empty() {
            self.staging_dir = self.source_dir.join(".staging");
        }
        ensure_dir("staging", &self.staging_dir)?;
        ensure_dir("log", &self.log_dir)?;

        if let DimensionPolicy::Fixed { width, height } = self.dimensions {
            // YUV 4:2:0 needs even dimensions.
            if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
                return Err(ConfigError::InvalidDimensions { width, height });
            }
        }
        if self.frame_rate <= 0.0 || !self.frame_rate.is_finite() {
            return Err(ConfigError::InvalidFrameRate(self.frame_rate));
        }
        Ok(self)
    }

    pub fn staging_retry(&self) -> Duration {
        Duration::from_millis(self.staging_retry_ms)
    }

    pub fn staging_max_retry(&self) -> Duration {
        Duration::from_millis(self.staging_max_retry_ms.max(self.staging_retry_ms))
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

fn require_dir(role: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Missing { role });
    }
    if !path.is_dir() {
        return Err(ConfigError::NotFound {
            role,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn ensure_dir(role: &'static str, path: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(path).map_err(|source| ConfigError::Create {
        role,
        path: path.to_path_buf(),
        source,
    })
}
