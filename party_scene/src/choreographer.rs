//! Particle choreography.
//!
//! Each [`ParticleGroup`] holds one target table per formation and a live
//! position buffer.  Every frame the buffer is pulled a fixed fraction of the
//! way toward the formation of the current [`Mode`], so a mode change is
//! visible on the very next frame and the motion settles exponentially.
//!
//! ```text
//!   Idle ──────► Cone   (slow spin steered by the hand, shimmer)
//!   Burst ─────► Sphere (steady spin, strong shimmer)
//!   Focus ─────► Sphere (same as Burst)
//!   Gesture2 ──► Cake   (rotation reset, heartbeat scale pulse)
//! ```

use glam::Vec3;
use hand_gesture::{ControlSignal, Mode};
use particle_layout::{generate_targets, phases, Formation, LayoutParams, Role, TargetTable};
use rand::Rng;

use crate::config::{GroupConfig, MotionConfig};

/// Formation a mode pulls the particles toward.
pub fn formation_for(mode: Mode) -> Formation {
    match mode {
        Mode::Idle                => Formation::Cone,
        Mode::Burst | Mode::Focus => Formation::Sphere,
        Mode::Gesture2            => Formation::Cake,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GroupParams
// ════════════════════════════════════════════════════════════════════════════

/// Group-level transform after one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupParams {
    pub role:           Role,
    /// Rotation about the vertical axis applied this frame.
    pub rotation_delta: f32,
    /// Accumulated rotation about the vertical axis.
    pub rotation:       f32,
    pub scale:          f32,
}

// ════════════════════════════════════════════════════════════════════════════
// ParticleGroup
// ════════════════════════════════════════════════════════════════════════════

pub struct ParticleGroup {
    role:       Role,
    base_size:  f32,
    base_color: Vec3,
    targets:    TargetTable,
    phases:     Vec<f32>,

    positions:  Vec<Vec3>,
    sizes:      Vec<f32>,
    colors:     Vec<Vec3>,

    rotation:   f32,
    scale:      f32,
}

impl ParticleGroup {
    /// Sample targets and phases for `cfg`.  The group starts in the hat.
    pub fn generate<R: Rng>(cfg: &GroupConfig, layout: &LayoutParams, rng: &mut R) -> Self {
        let targets = generate_targets(cfg.role, cfg.count, layout, rng);
        let phases = phases(cfg.count, rng);
        let positions = targets.get(Formation::Cone).to_vec();
        ParticleGroup {
            role:       cfg.role,
            base_size:  cfg.base_size,
            base_color: cfg.base_color(),
            sizes:      vec![cfg.base_size; cfg.count],
            colors:     vec![cfg.base_color(); cfg.count],
            targets,
            phases,
            positions,
            rotation:   0.0,
            scale:      1.0,
        }
    }

    pub fn role(&self)       -> Role          { self.role }
    pub fn len(&self)        -> usize         { self.positions.len() }
    pub fn is_empty(&self)   -> bool          { self.positions.is_empty() }
    pub fn base_size(&self)  -> f32           { self.base_size }
    pub fn base_color(&self) -> Vec3          { self.base_color }
    pub fn targets(&self)    -> &TargetTable  { &self.targets }
    /// Positions in the group's local frame (before rotation and scale).
    pub fn positions(&self)  -> &[Vec3]       { &self.positions }
    pub fn sizes(&self)      -> &[f32]        { &self.sizes }
    pub fn colors(&self)     -> &[Vec3]       { &self.colors }
    pub fn rotation(&self)   -> f32           { self.rotation }
    pub fn scale(&self)      -> f32           { self.scale }

    fn params(&self, rotation_delta: f32) -> GroupParams {
        GroupParams { role: self.role, rotation_delta, rotation: self.rotation, scale: self.scale }
    }

    fn advance(
        &mut self,
        mode:    Mode,
        control: ControlSignal,
        t:       f32,
        motion:  &MotionConfig,
    ) -> GroupParams {
        if self.is_empty() {
            return self.params(0.0);
        }

        let target = self.targets.get(formation_for(mode));
        for (p, goal) in self.positions.iter_mut().zip(target) {
            *p += (*goal - *p) * motion.convergence_rate;
        }

        let delta = match mode {
            Mode::Idle => {
                let delta = motion.idle_spin + motion.idle_spin_bias * control.offset();
                self.rotation += delta;
                self.scale = 1.0;
                self.shimmer(t, (10.0, 0.85, 0.25), Some((8.0, 0.78, 0.40)));
                delta
            }
            Mode::Gesture2 => {
                let delta = -self.rotation;
                self.rotation = 0.0;
                self.scale = 1.0 + (t * motion.pulse_rate).sin().abs() * motion.pulse_amplitude;
                self.shimmer(t, (6.0, 0.95, 0.18), None);
                delta
            }
            Mode::Burst | Mode::Focus => {
                let delta = motion.burst_spin;
                self.rotation += delta;
                self.scale = 1.0;
                self.shimmer(t, (7.0, 0.9, 0.25), Some((9.0, 0.85, 0.5)));
                delta
            }
        };
        self.params(delta)
    }

    /// Per-particle size (and optionally brightness) oscillation.  Each tuple
    /// is `(angular rate, offset, amplitude)`; `None` restores the base colour.
    fn shimmer(&mut self, t: f32, size: (f32, f32, f32), brightness: Option<(f32, f32, f32)>) {
        let (sw, so, sa) = size;
        for (s, ph) in self.sizes.iter_mut().zip(&self.phases) {
            *s = self.base_size * (so + sa * (sw * t + ph).sin());
        }
        match brightness {
            Some((bw, bo, ba)) => {
                for (c, ph) in self.colors.iter_mut().zip(&self.phases) {
                    *c = self.base_color * (bo + ba * (bw * t + ph).sin());
                }
            }
            None => self.colors.fill(self.base_color),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Choreographer
// ════════════════════════════════════════════════════════════════════════════

pub struct Choreographer {
    groups: Vec<ParticleGroup>,
    motion: MotionConfig,
}

impl Choreographer {
    pub fn new(groups: Vec<ParticleGroup>, motion: MotionConfig) -> Self {
        Choreographer { groups, motion }
    }

    /// Generate every configured group from one random stream.
    pub fn generate<R: Rng>(
        groups: &[GroupConfig],
        layout: &LayoutParams,
        motion: MotionConfig,
        rng:    &mut R,
    ) -> Self {
        let groups = groups.iter().map(|g| ParticleGroup::generate(g, layout, rng)).collect();
        Self::new(groups, motion)
    }

    /// Step every group one frame toward the formation of `mode`.
    ///
    /// Each call covers `convergence_rate` of the remaining distance and one
    /// spin step, whatever the frame time is; the frame clock caps frame times at
    /// `max_dt`.  `elapsed` drives the shimmer and pulse oscillators.
    pub fn advance(
        &mut self,
        _dt:     f32,
        mode:    Mode,
        control: ControlSignal,
        elapsed: f32,
    ) -> Vec<GroupParams> {
        let motion = self.motion;
        self.groups
            .iter_mut()
            .map(|g| g.advance(mode, control, elapsed, &motion))
            .collect()
    }

    pub fn groups(&self) -> &[ParticleGroup] { &self.groups }
    pub fn motion(&self) -> &MotionConfig    { &self.motion }

    /// Rotation of the primary group, which the carousel orbits with.
    pub fn primary_rotation(&self) -> f32 {
        self.groups
            .iter()
            .find(|g| g.role == Role::Primary)
            .or_else(|| self.groups.first())
            .map_or(0.0, |g| g.rotation)
    }

    /// Largest distance from any particle to its target in `formation`.
    pub fn max_distance_to(&self, formation: Formation) -> f32 {
        self.groups
            .iter()
            .flat_map(|g| g.positions.iter().zip(g.targets.get(formation)))
            .map(|(p, t)| p.distance(*t))
            .fold(0.0, f32::max)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    fn group(role: Role, count: usize) -> GroupConfig {
        GroupConfig { role, count, base_size: 2.0, color: 0x80c0ff }
    }

    fn make(count: usize) -> Choreographer {
        let mut rng = StdRng::seed_from_u64(11);
        Choreographer::generate(
            &[group(Role::Primary, count), group(Role::Accent, count / 2)],
            &LayoutParams::default(),
            MotionConfig::default(),
            &mut rng,
        )
    }

    fn place_at(ch: &mut Choreographer, formation: Formation) {
        for g in &mut ch.groups {
            g.positions = g.targets.get(formation).to_vec();
        }
    }

    #[test]
    fn starts_in_the_hat() {
        let ch = make(200);
        assert_eq!(ch.max_distance_to(Formation::Cone), 0.0);
    }

    #[test]
    fn particles_at_target_stay_put() {
        let mut ch = make(200);
        for mode in Mode::ALL {
            place_at(&mut ch, formation_for(mode));
            ch.advance(DT, mode, ControlSignal::CENTER, 1.0);
            assert!(ch.max_distance_to(formation_for(mode)) < 1e-5, "{mode}");
        }
    }

    #[test]
    fn distance_shrinks_monotonically_without_overshoot() {
        let mut ch = make(200);
        place_at(&mut ch, Formation::Sphere);
        let start: Vec<Vec3> = ch.groups[0].positions.clone();
        let goal: Vec<Vec3> = ch.groups[0].targets.get(Formation::Cone).to_vec();

        let mut prev = ch.max_distance_to(Formation::Cone);
        for i in 0..40 {
            ch.advance(DT, Mode::Idle, ControlSignal::CENTER, i as f32 * DT);
            let d = ch.max_distance_to(Formation::Cone);
            assert!(d < prev, "step {i}: {d} >= {prev}");
            prev = d;

            for ((p, s), g) in ch.groups[0].positions.iter().zip(&start).zip(&goal) {
                assert!((*p - *g).dot(*s - *g) >= -1e-4, "overshot");
            }
        }
    }

    #[test]
    fn mode_switch_is_visible_on_the_next_frame() {
        let mut ch = make(200);
        let before: Vec<f32> = ch.groups[0]
            .positions
            .iter()
            .zip(ch.groups[0].targets.get(Formation::Sphere))
            .map(|(p, t)| p.distance(*t))
            .collect();

        ch.advance(DT, Mode::Burst, ControlSignal::CENTER, 0.0);

        let rate = MotionConfig::default().convergence_rate;
        for ((p, t), b) in ch.groups[0]
            .positions
            .iter()
            .zip(ch.groups[0].targets.get(Formation::Sphere))
            .zip(&before)
        {
            let after = p.distance(*t);
            assert!((after - b * (1.0 - rate)).abs() < 1e-3);
            if *b > 1e-3 {
                assert!(after < *b);
            }
        }
    }

    #[test]
    fn focus_uses_the_burst_formation() {
        let mut a = make(100);
        let mut b = make(100);
        for i in 0..10 {
            a.advance(DT, Mode::Burst, ControlSignal::CENTER, i as f32 * DT);
            b.advance(DT, Mode::Focus, ControlSignal::CENTER, i as f32 * DT);
        }
        assert_eq!(a.groups[0].positions, b.groups[0].positions);
        assert_eq!(a.primary_rotation(), b.primary_rotation());
    }

    #[test]
    fn idle_spin_follows_the_hand() {
        let mut left = make(50);
        let mut centre = make(50);
        let mut right = make(50);
        for _ in 0..30 {
            left.advance(DT, Mode::Idle, ControlSignal::new(0.2), 0.0);
            centre.advance(DT, Mode::Idle, ControlSignal::CENTER, 0.0);
            right.advance(DT, Mode::Idle, ControlSignal::new(0.8), 0.0);
        }
        assert!(right.primary_rotation() > centre.primary_rotation());
        assert!(centre.primary_rotation() > left.primary_rotation());
        // 30 frames of 0.003 rad with the hand centred.
        assert!((centre.primary_rotation() - 0.09).abs() < 1e-3);
    }

    #[test]
    fn cake_resets_rotation_and_pulses() {
        let mut ch = make(100);
        for _ in 0..20 {
            ch.advance(DT, Mode::Burst, ControlSignal::CENTER, 0.0);
        }
        assert!(ch.primary_rotation() > 0.0);

        let mut scales = Vec::new();
        for i in 0..120 {
            let params = ch.advance(DT, Mode::Gesture2, ControlSignal::CENTER, i as f32 * DT);
            for p in &params {
                assert_eq!(p.rotation, 0.0);
                assert!(p.scale >= 1.0 && p.scale <= 1.06 + 1e-6);
            }
            scales.push(params[0].scale);
        }
        let max = scales.iter().cloned().fold(0.0, f32::max);
        assert!(max > 1.05);

        let g = &ch.groups[0];
        assert!(g.colors.iter().all(|c| *c == g.base_color));
    }

    #[test]
    fn shimmer_stays_in_band() {
        let mut ch = make(100);
        ch.advance(DT, Mode::Burst, ControlSignal::CENTER, 3.7);
        let g = &ch.groups[0];
        for s in &g.sizes {
            assert!(*s >= g.base_size * 0.65 - 1e-4 && *s <= g.base_size * 1.15 + 1e-4);
        }
        ch.advance(DT, Mode::Idle, ControlSignal::CENTER, 3.7);
        let g = &ch.groups[0];
        for s in &g.sizes {
            assert!(*s >= g.base_size * 0.60 - 1e-4 && *s <= g.base_size * 1.10 + 1e-4);
        }
    }

    #[test]
    fn empty_group_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ch = Choreographer::generate(
            &[group(Role::Tertiary, 0)],
            &LayoutParams::default(),
            MotionConfig::default(),
            &mut rng,
        );
        let params = ch.advance(DT, Mode::Burst, ControlSignal::CENTER, 1.0);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].rotation_delta, 0.0);
        assert!(ch.groups[0].is_empty());
        assert_eq!(ch.primary_rotation(), 0.0);
    }

    #[test]
    fn every_call_covers_the_same_fraction_whatever_the_frame_time() {
        for dt in [0.0, 0.016, 0.033, 0.5] {
            let mut ch = make(100);
            let before: Vec<f32> = ch.groups[0]
                .positions
                .iter()
                .zip(ch.groups[0].targets.get(Formation::Sphere))
                .map(|(p, t)| p.distance(*t))
                .collect();

            let params = ch.advance(dt, Mode::Burst, ControlSignal::CENTER, 0.0);
            assert!((params[0].rotation_delta - 0.006).abs() < 1e-7, "dt {dt}");

            for ((p, t), b) in ch.groups[0]
                .positions
                .iter()
                .zip(ch.groups[0].targets.get(Formation::Sphere))
                .zip(&before)
            {
                let after = p.distance(*t);
                assert!((after - b * 0.92).abs() < 1e-3, "dt {dt}: {after} vs {}", b * 0.92);
            }
        }
    }
}
