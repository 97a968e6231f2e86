//! # party_scene
//!
//! A birthday particle scene steered by hand gestures.  About 2,500 glowing
//! particles move between a party hat, a starburst and a two-tier cake with
//! candles; a ring of photos orbits the starburst and can be pulled to the
//! front.
//!
//! ## Gesture → Scene mapping
//!
//! | Gesture | Mode | Particles | Photos |
//! |---|---|---|---|
//! | No hands / closed fist | `Idle` | Party hat, spin steered by hand position | Hidden |
//! | Open hand | `Burst` | Starburst sphere | Orbit the burst, nearest one selected |
//! | Open hand, thumb–index pinch | `Focus` | Starburst sphere | Selected photo enlarged at the front |
//! | Two-hand heart | `Gesture2` | Birthday cake, heartbeat pulse | Hidden; candle flames lit |
//!
//! Moving the hand left and right shifts the photo ring and, in `Idle`,
//! changes how fast the hat turns.
//!
//! ## Observation sources
//!
//! * (default): **Simulation**, keyboard shortcuts hold up synthetic hands.
//! * `--replay <file|->`: JSON lines of tracker landmarks, one frame per
//!   line, e.g. piped from an external hand tracker.
//!
//! ### Simulation keyboard shortcuts
//!
//! | Key | Hand |
//! |---|---|
//! | `F` | Closed fist |
//! | `O` | Open palm |
//! | `P` | Pinch |
//! | `H` | Two-hand heart |
//! | `N` | Hands out of view |
//! | `←` / `→` (hold) | Move hand |
//! | `Q` / `Esc` | Quit |

pub mod error;
pub mod config;
pub mod viewpoint;
pub mod choreographer;
pub mod carousel;
pub mod decor;
pub mod gesture;
pub mod visualizer;
pub mod app;

pub use app::{run, FrameClock, FrameSummary, InputSource, RunOptions, Stage};
pub use config::SceneConfig;
pub use error::{ConfigError, ReplayLineError, SceneError};
