//! Scene configuration.
//!
//! Every section is optional in the TOML file; missing keys take the
//! defaults below.
//!
//! ```toml
//! seed = 7
//!
//! [classifier]
//! openness_closed = 0.22
//!
//! [[groups]]
//! role = "primary"
//! count = 1200
//! base_size = 2.0
//! color = 0xffe86a
//!
//! [carousel]
//! item_count = 6
//! ```

use std::fs;
use std::path::Path;

use glam::Vec3;
use hand_gesture::Thresholds;
use particle_layout::{LayoutParams, Role};
use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

// ════════════════════════════════════════════════════════════════════════════
// Groups
// ════════════════════════════════════════════════════════════════════════════

/// One particle group: a role, a size and a colour.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct GroupConfig {
    pub role:      Role,
    pub count:     usize,
    pub base_size: f32,
    /// `0xRRGGBB`.
    pub color:     u32,
}

impl GroupConfig {
    /// Base colour as linear `[0, 1]` RGB.
    pub fn base_color(&self) -> Vec3 {
        let c = self.color;
        Vec3::new(
            ((c >> 16) & 0xff) as f32 / 255.0,
            ((c >> 8) & 0xff) as f32 / 255.0,
            (c & 0xff) as f32 / 255.0,
        )
    }
}

fn default_groups() -> Vec<GroupConfig> {
    vec![
        GroupConfig { role: Role::Primary,  count: 1800, base_size: 2.2, color: 0xffe86a },
        GroupConfig { role: Role::Accent,   count: 520,  base_size: 3.4, color: 0xff4fd8 },
        GroupConfig { role: Role::Tertiary, count: 220,  base_size: 3.0, color: 0x6af1ff },
    ]
}

// ════════════════════════════════════════════════════════════════════════════
// Motion
// ════════════════════════════════════════════════════════════════════════════

/// Convergence and rotation rates.  Every rate is applied once per frame,
/// whatever the frame time.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Fraction of the remaining distance covered per frame.
    pub convergence_rate: f32,
    /// Fixed step rate of headless runs.
    pub reference_fps:    f32,
    /// Upper clamp on the frame time, in seconds.
    pub max_dt:           f32,
    /// Hat spin per frame with the hand centred.
    pub idle_spin:        f32,
    /// Extra hat spin per frame per unit of control offset.
    pub idle_spin_bias:   f32,
    pub burst_spin:       f32,
    /// Peak extra scale of the cake heartbeat.
    pub pulse_amplitude:  f32,
    pub pulse_rate:       f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            convergence_rate: 0.08,
            reference_fps:    60.0,
            max_dt:           0.033,
            idle_spin:        0.003,
            idle_spin_bias:   0.08,
            burst_spin:       0.006,
            pulse_amplitude:  0.06,
            pulse_rate:       2.2,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Carousel
// ════════════════════════════════════════════════════════════════════════════

/// Photo ring geometry and smoothing.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    pub item_count:       usize,
    pub orbit_radius:     f32,
    /// Depth of the ring centre.
    pub orbit_z:          f32,
    pub orbit_y:          f32,
    pub bob_amplitude:    f32,
    pub roll_amplitude:   f32,
    /// Horizontal orbit shift at full control offset (±0.5).
    pub follow_range:     f32,
    /// Orbit-follow smoothing while bursting.
    pub follow_smoothing: f32,
    /// Orbit-follow smoothing in every other mode.
    pub rest_smoothing:   f32,
    pub item_smoothing:   f32,
    pub hide_smoothing:   f32,
    /// Item scale at the back of the ring.
    pub far_scale:        f32,
    /// Item scale at the front of the ring.
    pub near_scale:       f32,
    pub focus_position:   [f32; 3],
    pub focus_scale:      f32,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        CarouselConfig {
            item_count:       5,
            orbit_radius:     36.0,
            orbit_z:          45.0,
            orbit_y:          8.0,
            bob_amplitude:    3.6,
            roll_amplitude:   0.06,
            follow_range:     34.0,
            follow_smoothing: 0.12,
            rest_smoothing:   0.08,
            item_smoothing:   0.12,
            hide_smoothing:   0.08,
            far_scale:        1.4,
            near_scale:       4.6,
            focus_position:   [0.0, 8.0, 85.0],
            focus_scale:      8.5,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SceneConfig
// ════════════════════════════════════════════════════════════════════════════

/// Top-level configuration for a [`Stage`](crate::app::Stage).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Seed for the layout generator.
    pub seed:       u64,
    pub classifier: Thresholds,
    pub layout:     LayoutParams,
    pub groups:     Vec<GroupConfig>,
    pub motion:     MotionConfig,
    pub carousel:   CarouselConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            seed:       0x5eed_ba11,
            classifier: Thresholds::default(),
            layout:     LayoutParams::default(),
            groups:     default_groups(),
            motion:     MotionConfig::default(),
            carousel:   CarouselConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&text)?;
        info!(path = %path.display(), groups = cfg.groups.len(), "loaded scene config");
        Ok(cfg)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: SceneConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn total_particles(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    /// Reject configurations the scene cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.classifier;
        positive("classifier.two_hand_proximity", t.two_hand_proximity)?;
        positive("classifier.openness_closed", t.openness_closed)?;
        positive("classifier.pinch", t.pinch)?;

        let hat = &self.layout.hat;
        positive("layout.hat.height", hat.height)?;
        positive("layout.hat.base_radius", hat.base_radius)?;
        finite("layout.hat.twist", hat.twist)?;
        positive("layout.explode_radius", self.layout.explode_radius)?;
        let cake = &self.layout.cake;
        finite("layout.cake.y0", cake.y0)?;
        positive("layout.cake.base_radius", cake.base_radius)?;
        positive("layout.cake.base_height", cake.base_height)?;
        positive("layout.cake.top_radius", cake.top_radius)?;
        positive("layout.cake.top_height", cake.top_height)?;
        positive("layout.cake.candle_height", cake.candle_height)?;
        finite("layout.cake.jitter", cake.jitter)?;

        if self.groups.is_empty() {
            return Err(ConfigError::NoGroups);
        }
        for g in &self.groups {
            if g.count == 0 {
                return Err(ConfigError::EmptyGroup { role: g.role.name() });
            }
            positive("groups.base_size", g.base_size)?;
        }

        let m = &self.motion;
        rate("motion.convergence_rate", m.convergence_rate)?;
        positive("motion.reference_fps", m.reference_fps)?;
        positive("motion.max_dt", m.max_dt)?;
        finite("motion.idle_spin", m.idle_spin)?;
        finite("motion.idle_spin_bias", m.idle_spin_bias)?;
        finite("motion.burst_spin", m.burst_spin)?;
        finite("motion.pulse_amplitude", m.pulse_amplitude)?;
        finite("motion.pulse_rate", m.pulse_rate)?;

        let c = &self.carousel;
        if c.item_count == 0 {
            return Err(ConfigError::NoCarouselItems);
        }
        positive("carousel.orbit_radius", c.orbit_radius)?;
        finite("carousel.orbit_z", c.orbit_z)?;
        finite("carousel.orbit_y", c.orbit_y)?;
        finite("carousel.bob_amplitude", c.bob_amplitude)?;
        finite("carousel.roll_amplitude", c.roll_amplitude)?;
        finite("carousel.follow_range", c.follow_range)?;
        rate("carousel.follow_smoothing", c.follow_smoothing)?;
        rate("carousel.rest_smoothing", c.rest_smoothing)?;
        rate("carousel.item_smoothing", c.item_smoothing)?;
        rate("carousel.hide_smoothing", c.hide_smoothing)?;
        positive("carousel.far_scale", c.far_scale)?;
        positive("carousel.near_scale", c.near_scale)?;
        for v in c.focus_position {
            finite("carousel.focus_position", v)?;
        }
        positive("carousel.focus_scale", c.focus_scale)?;
        Ok(())
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value: value as f64, expected: "a finite number" })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value: value as f64, expected: "> 0" })
    }
}

fn rate(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value: value as f64, expected: "in (0, 1]" })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SceneConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.groups.len(), 3);
        assert_eq!(cfg.total_particles(), 1800 + 520 + 220);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = SceneConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, SceneConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_keys() {
        let cfg = SceneConfig::from_toml_str(
            r#"
            seed = 42

            [classifier]
            pinch = 0.08

            [carousel]
            item_count = 7

            [[groups]]
            role = "accent"
            count = 10
            base_size = 1.5
            color = 0x102030
            "#,
        )
        .unwrap();
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.classifier.pinch, 0.08);
        assert_eq!(cfg.classifier.openness_closed, 0.25);
        assert_eq!(cfg.carousel.item_count, 7);
        assert_eq!(cfg.carousel.orbit_radius, 36.0);
        assert_eq!(cfg.groups.len(), 1);
        assert_eq!(cfg.groups[0].role, Role::Accent);
        assert_eq!(cfg.groups[0].color, 0x102030);
    }

    #[test]
    fn zero_count_group_is_rejected() {
        let mut cfg = SceneConfig::default();
        cfg.groups[1].count = 0;
        match cfg.validate() {
            Err(ConfigError::EmptyGroup { role }) => assert_eq!(role, "accent"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn zero_carousel_items_is_rejected() {
        let mut cfg = SceneConfig::default();
        cfg.carousel.item_count = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::NoCarouselItems)));
    }

    #[test]
    fn no_groups_is_rejected() {
        let mut cfg = SceneConfig::default();
        cfg.groups.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoGroups)));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut cfg = SceneConfig::default();
        cfg.motion.max_dt = f32::NAN;
        match cfg.validate() {
            Err(ConfigError::OutOfRange { field, .. }) => assert_eq!(field, "motion.max_dt"),
            other => panic!("unexpected {:?}", other),
        }

        let mut cfg = SceneConfig::default();
        cfg.motion.convergence_rate = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = SceneConfig::from_toml_str("seed = \"seven\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = SceneConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn hex_color_unpacks_to_rgb() {
        let g = GroupConfig { role: Role::Primary, count: 1, base_size: 1.0, color: 0xff8000 };
        let c = g.base_color();
        assert_eq!(c.x, 1.0);
        assert!((c.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.z, 0.0);
    }
}
