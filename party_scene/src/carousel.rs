//! Photo carousel.
//!
//! A ring of framed photos orbits with the primary particle group while the
//! scene is bursting.  The photo nearest the viewer is the *selected* one;
//! pinching (Focus) pulls it to the front and enlarges it.  In the hat and
//! cake formations the ring is hidden and shrinks away.
//!
//! Selection only changes in Burst, so a Burst → Focus switch always focuses
//! the photo that was in front at that moment.

use std::f32::consts::TAU;

use glam::Vec3;
use hand_gesture::{ControlSignal, Mode};
use tracing::{debug, warn};

use crate::config::CarouselConfig;
use crate::error::{ConfigError, SceneError};
use crate::viewpoint::Viewpoint;

// ════════════════════════════════════════════════════════════════════════════
// CarouselItem
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CarouselItem {
    pub position: Vec3,
    pub scale:    Vec3,
    /// Unit vector toward the viewpoint.
    pub facing:   Vec3,
    /// Rotation about the facing axis.
    pub roll:     f32,
    pub visible:  bool,
    /// Width / height of the photo.
    pub aspect:   f32,
}

impl CarouselItem {
    fn hidden() -> Self {
        CarouselItem {
            position: Vec3::ZERO,
            scale:    Vec3::ZERO,
            facing:   Vec3::Z,
            roll:     0.0,
            visible:  false,
            aspect:   1.0,
        }
    }
}

/// Index of the ring slot nearest the viewer for a ring rotated by
/// `rotation`.  Ties go to the lower index.
fn front_index(rotation: f32, count: usize) -> usize {
    let step = TAU / count.max(1) as f32;
    let mut best = 0;
    let mut max_z = f32::NEG_INFINITY;
    for i in 0..count {
        let z = (rotation + i as f32 * step).cos();
        if z > max_z {
            max_z = z;
            best = i;
        }
    }
    best
}

// ════════════════════════════════════════════════════════════════════════════
// Carousel
// ════════════════════════════════════════════════════════════════════════════

pub struct Carousel {
    items:        Vec<CarouselItem>,
    selected:     usize,
    orbit_offset: f32,
    config:       CarouselConfig,
}

impl Carousel {
    pub fn new(config: CarouselConfig) -> Result<Self, ConfigError> {
        if config.item_count == 0 {
            return Err(ConfigError::NoCarouselItems);
        }
        Ok(Carousel {
            items: vec![CarouselItem::hidden(); config.item_count],
            selected: 0,
            orbit_offset: 0.0,
            config,
        })
    }

    pub fn items(&self)          -> &[CarouselItem] { &self.items }
    pub fn selected_index(&self) -> usize           { self.selected }
    /// Current horizontal shift of the ring centre.
    pub fn orbit_offset(&self)   -> f32             { self.orbit_offset }
    pub fn config(&self)         -> &CarouselConfig { &self.config }

    /// Record the aspect ratio of photo `index` once it is known.
    /// Non-finite or non-positive values are ignored.
    pub fn set_aspect(&mut self, index: usize, aspect: f32) -> Result<(), SceneError> {
        let len = self.items.len();
        let item = self.items.get_mut(index).ok_or(SceneError::CarouselIndex { index, len })?;
        if aspect.is_finite() && aspect > 0.0 {
            item.aspect = aspect;
        } else {
            warn!(index, aspect, "ignoring invalid photo aspect ratio");
        }
        Ok(())
    }

    /// Advance every item one frame.  Smoothing factors apply once per call.
    pub fn update(
        &mut self,
        _dt:            f32,
        mode:           Mode,
        control:        ControlSignal,
        elapsed:        f32,
        group_rotation: f32,
        viewpoint:      &Viewpoint,
    ) -> &[CarouselItem] {
        let cfg = self.config;

        let follow = if mode == Mode::Burst { cfg.follow_smoothing } else { cfg.rest_smoothing };
        let target_offset = control.offset() * cfg.follow_range;
        self.orbit_offset += (target_offset - self.orbit_offset) * follow;

        match mode {
            Mode::Idle | Mode::Gesture2 => {
                for item in &mut self.items {
                    item.visible = false;
                    item.scale = item.scale.lerp(Vec3::ZERO, cfg.hide_smoothing);
                }
            }
            Mode::Burst => self.orbit(elapsed, group_rotation, viewpoint),
            Mode::Focus => self.present(viewpoint),
        }
        &self.items
    }

    fn orbit(&mut self, elapsed: f32, group_rotation: f32, viewpoint: &Viewpoint) {
        let cfg = self.config;
        let a = cfg.item_smoothing;
        let step = TAU / self.items.len() as f32;
        let z_min = cfg.orbit_z - cfg.orbit_radius;

        for (i, item) in self.items.iter_mut().enumerate() {
            let phase = i as f32;
            let angle = group_rotation + phase * step;
            let target = Vec3::new(
                self.orbit_offset + angle.sin() * cfg.orbit_radius,
                cfg.orbit_y + (elapsed + phase).sin() * cfg.bob_amplitude,
                angle.cos() * cfg.orbit_radius + cfg.orbit_z,
            );

            item.visible = true;
            item.position = item.position.lerp(target, a);
            item.facing = viewpoint.facing_from(item.position);
            item.roll = (elapsed * 0.7 + phase).sin() * cfg.roll_amplitude;

            let depth = ((target.z - z_min) / (2.0 * cfg.orbit_radius)).clamp(0.0, 1.0);
            let d = cfg.far_scale + (cfg.near_scale - cfg.far_scale) * depth;
            item.scale = item.scale.lerp(Vec3::new(d * item.aspect, d, d), a);
        }

        let best = front_index(group_rotation, self.items.len());
        if best != self.selected {
            debug!(from = self.selected, to = best, "carousel selection changed");
            self.selected = best;
        }
    }

    fn present(&mut self, viewpoint: &Viewpoint) {
        let cfg = self.config;
        let a = cfg.item_smoothing;
        let front = Vec3::from_array(cfg.focus_position);
        let s = cfg.focus_scale;

        for (i, item) in self.items.iter_mut().enumerate() {
            item.visible = true;
            if i == self.selected {
                item.position = item.position.lerp(front, a);
                item.scale = item.scale.lerp(Vec3::new(s * item.aspect, s, s), a);
                item.facing = viewpoint.facing_from(item.position);
                item.roll = 0.0;
            } else {
                item.scale = item.scale.lerp(Vec3::ZERO, a);
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
