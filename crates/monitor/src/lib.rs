//! Drowsiness Monitor
//!
//! Runs the DMS frame loop against a frame source and renders the
//! resulting overlay. The `gui-opencv` feature adds the live camera,
//! Haar cascade detection and an on-screen window closed with ESC.

pub mod app;
pub mod devices;
pub mod display;
pub mod exit;
#[cfg(feature = "gui-opencv")]
pub mod window;

pub use app::MonitorApp;
pub use devices::{open_display, open_source};
pub use display::{load_font, AnnotatedFrameWriter, DisplaySink};
pub use exit::{ExitControl, ExitFlag};

use std::path::{Path, PathBuf};

use camera_capture::{CameraConfig, CameraError};
use dms::{DmsConfig, DmsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Looked up in the working directory; absent means defaults
pub const DEFAULT_CONFIG_PATH: &str = "drowsiness.toml";

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("DMS error: {0}")]
    Dms(#[from] DmsError),

    #[error("Display error: {0}")]
    Display(String),

    #[error("Signal handler error: {0}")]
    Signal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Display and loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show frames in a window (builds with the gui-opencv feature)
    pub window: bool,
    /// Where annotated frames are written when no window is shown
    pub output_dir: Option<PathBuf>,
    /// TrueType font for overlay text in written frames
    pub font_path: Option<PathBuf>,
    /// How long each iteration waits for an exit request
    pub key_wait_ms: u64,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window: true,
            output_dir: None,
            font_path: None,
            key_wait_ms: 1,
            max_frames: None,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub camera: CameraConfig,
    pub dms: DmsConfig,
    pub display: DisplayConfig,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl MonitorConfig {
    /// Load from a TOML file layered over the defaults
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .build()?;
        let config: MonitorConfig = settings.try_deserialize()?;
        config.dms.validate()?;
        Ok(config)
    }
}

/// Initialize logging
pub fn init_logging(json: bool) {
    let builder = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.expect("Failed to set tracing subscriber");

    info!("Logging initialized");
}
