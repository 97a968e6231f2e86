//! Error types for the scene crate.
//!
//! Construction-time problems (bad configuration, a window that cannot be
//! opened) surface as `Result`s.  Per-frame operations never fail.

use std::io;
use std::path::PathBuf;

use hand_gesture::LandmarkError;
use thiserror::Error;

/// Invalid or unreadable [`SceneConfig`](crate::config::SceneConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no particle groups configured")]
    NoGroups,

    #[error("particle group '{role}' has zero particles")]
    EmptyGroup { role: &'static str },

    #[error("carousel needs at least one item")]
    NoCarouselItems,

    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field:    &'static str,
        value:    f64,
        expected: &'static str,
    },
}

/// Everything that can go wrong while building or running the scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("carousel index {index} out of range for {len} items")]
    CarouselIndex { index: usize, len: usize },

    #[error("failed to open replay source {path}: {source}")]
    Replay {
        path:   String,
        #[source]
        source: io::Error,
    },

    #[error("window error: {0}")]
    Window(String),
}

/// A replay line that could not be turned into an observation.
#[derive(Debug, Error)]
pub enum ReplayLineError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hand {hand} point {index} has fewer than two coordinates")]
    ShortPoint { hand: usize, index: usize },

    #[error(transparent)]
    Landmarks(#[from] LandmarkError),
}
