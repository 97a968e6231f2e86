//! # particle_layout
//!
//! Precomputed target positions for every particle of a group, one point
//! cloud per [`Formation`]:
//!
//! | Formation | Shape | Sampling |
//! |---|---|---|
//! | [`Formation::Cone`]   | party hat | height uniform, radius shrinking linearly, twisted |
//! | [`Formation::Sphere`] | starburst | inverse-CDF polar angle, cube-root radius |
//! | [`Formation::Cake`]   | layered cake with candles | 70 / 20 / 10 % across base, top tier and candles, jittered |
//!
//! Tables are generated once per group at start-up from an injected RNG and
//! never change afterwards.  Seed a [`rand::rngs::StdRng`] for reproducible
//! layouts:
//!
//! ```rust
//! use particle_layout::{generate_targets, Formation, LayoutParams, Role};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let table = generate_targets(Role::Primary, 100, &LayoutParams::default(), &mut rng);
//! assert_eq!(table.get(Formation::Cake).len(), 100);
//! ```

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;
use serde::Deserialize;

// ════════════════════════════════════════════════════════════════════════════
// Formation
// ════════════════════════════════════════════════════════════════════════════

/// A target layout shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Formation {
    Cone,
    Sphere,
    Cake,
}

impl Formation {
    pub const ALL: [Formation; 3] = [Formation::Cone, Formation::Sphere, Formation::Cake];

    pub fn name(&self) -> &'static str {
        match self {
            Formation::Cone   => "cone",
            Formation::Sphere => "sphere",
            Formation::Cake   => "cake",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Role: per-group visual role and its sampling traits
// ════════════════════════════════════════════════════════════════════════════

/// Visual role of a particle group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dense glowing fill.
    Primary,
    /// Sparser highlight particles hugging the surface.
    Accent,
    /// Larger ornaments, pushed slightly outward.
    Tertiary,
}

/// How a cone cross-section radius is drawn from a uniform sample `u`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RadiusProfile {
    /// `sqrt(u)`: uniform over the disc area.
    AreaUniform,
    /// `inner + (1 - inner)·u`: concentrated near the surface.
    Shell { inner: f32 },
}

impl RadiusProfile {
    fn ratio(self, u: f32) -> f32 {
        match self {
            RadiusProfile::AreaUniform     => u.sqrt(),
            RadiusProfile::Shell { inner } => inner + (1.0 - inner) * u,
        }
    }
}

/// Numeric traits that differ between roles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoleStyle {
    pub cone_profile:      RadiusProfile,
    pub sphere_multiplier: f32,
    pub cake_xz_scale:     f32,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Primary, Role::Accent, Role::Tertiary];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Primary  => "primary",
            Role::Accent   => "accent",
            Role::Tertiary => "tertiary",
        }
    }

    pub fn style(&self) -> RoleStyle {
        match self {
            Role::Primary => RoleStyle {
                cone_profile:      RadiusProfile::AreaUniform,
                sphere_multiplier: 1.0,
                cake_xz_scale:     1.0,
            },
            Role::Accent => RoleStyle {
                cone_profile:      RadiusProfile::Shell { inner: 0.82 },
                sphere_multiplier: 1.0,
                cake_xz_scale:     1.0,
            },
            Role::Tertiary => RoleStyle {
                cone_profile:      RadiusProfile::Shell { inner: 0.82 },
                sphere_multiplier: 1.25,
                cake_xz_scale:     1.03,
            },
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Parameters
// ════════════════════════════════════════════════════════════════════════════

/// Party-hat cone, centred on the origin.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HatParams {
    pub height:      f32,
    pub base_radius: f32,
    /// Extra rotation (radians) per unit of height.
    pub twist:       f32,
}

impl Default for HatParams {
    fn default() -> Self {
        HatParams { height: 76.0, base_radius: 34.0, twist: 0.09 }
    }
}

/// Two-tier cake with a ring of candles on top.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CakeParams {
    /// Centre height of the bottom tier.
    pub y0:            f32,
    pub base_radius:   f32,
    pub base_height:   f32,
    pub top_radius:    f32,
    pub top_height:    f32,
    pub candle_count:  usize,
    pub candle_radius: f32,
    pub candle_height: f32,
    /// Radius of the circle the candles stand on.
    pub candle_ring:   f32,
    /// Angular offset of the first candle.
    pub candle_phase:  f32,
    /// Full width of the per-axis jitter.
    pub jitter:        f32,
}

impl Default for CakeParams {
    fn default() -> Self {
        CakeParams {
            y0:            10.0,
            base_radius:   26.0,
            base_height:   22.0,
            top_radius:    18.0,
            top_height:    14.0,
            candle_count:  5,
            candle_radius: 1.3,
            candle_height: 16.0,
            candle_ring:   10.0,
            candle_phase:  0.35,
            jitter:        0.9,
        }
    }
}

impl CakeParams {
    /// Height of the top surface of the upper tier.
    pub fn top_surface_y(&self) -> f32 {
        self.y0 + self.base_height / 2.0 + self.top_height
    }

    /// Height of the candle tips.
    pub fn candle_tip_y(&self) -> f32 {
        self.top_surface_y() + self.candle_height
    }

    /// Ring angle of candle `i`.
    pub fn candle_angle(&self, i: usize) -> f32 {
        (i as f32 / self.candle_count.max(1) as f32) * TAU + self.candle_phase
    }

    /// Foot of each candle on the top tier.
    pub fn candle_positions(&self) -> Vec<Vec3> {
        (0..self.candle_count)
            .map(|i| {
                let a = self.candle_angle(i);
                Vec3::new(a.cos() * self.candle_ring, self.top_surface_y(), a.sin() * self.candle_ring)
            })
            .collect()
    }
}

/// Everything the generators need.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub hat:            HatParams,
    pub explode_radius: f32,
    pub cake:           CakeParams,
}

impl Default for LayoutParams {
    fn default() -> Self {
        LayoutParams {
            hat:            HatParams::default(),
            explode_radius: 72.0,
            cake:           CakeParams::default(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TargetTable
// ════════════════════════════════════════════════════════════════════════════

/// Per-formation target positions for one group.  Every formation holds the
/// same number of points.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetTable {
    cone:   Vec<Vec3>,
    sphere: Vec<Vec3>,
    cake:   Vec<Vec3>,
}

impl TargetTable {
    pub fn get(&self, formation: Formation) -> &[Vec3] {
        match formation {
            Formation::Cone   => &self.cone,
            Formation::Sphere => &self.sphere,
            Formation::Cake   => &self.cake,
        }
    }

    pub fn len(&self) -> usize { self.cone.len() }
    pub fn is_empty(&self) -> bool { self.cone.is_empty() }
}

// ════════════════════════════════════════════════════════════════════════════
// Generators
// ════════════════════════════════════════════════════════════════════════════

/// Sample `count` targets for every formation.
///
/// Points are drawn particle by particle (cone, sphere, cake for particle 0,
/// then particle 1, …) so a given seed always yields the same table.
pub fn generate_targets<R: Rng>(
    role:   Role,
    count:  usize,
    params: &LayoutParams,
    rng:    &mut R,
) -> TargetTable {
    let style = role.style();
    let mut cone   = Vec::with_capacity(count);
    let mut sphere = Vec::with_capacity(count);
    let mut cake   = Vec::with_capacity(count);

    for _ in 0..count {
        cone.push(sample_cone(&params.hat, style.cone_profile, rng));
        sphere.push(sample_sphere(params.explode_radius * style.sphere_multiplier, rng));
        let p = sample_cake(&params.cake, rng);
        cake.push(Vec3::new(p.x * style.cake_xz_scale, p.y, p.z * style.cake_xz_scale));
    }

    TargetTable { cone, sphere, cake }
}

/// Random per-particle phase offsets in `[0, 2π)`.
pub fn phases<R: Rng>(count: usize, rng: &mut R) -> Vec<f32> {
    (0..count).map(|_| rng.gen::<f32>() * TAU).collect()
}

fn sample_cone<R: Rng>(hat: &HatParams, profile: RadiusProfile, rng: &mut R) -> Vec3 {
    let h = rng.gen::<f32>() * hat.height;
    let y = h - hat.height / 2.0;
    let max_r = if hat.height > 0.0 { (1.0 - h / hat.height) * hat.base_radius } else { 0.0 };
    let r = max_r * profile.ratio(rng.gen::<f32>());
    let theta = rng.gen::<f32>() * TAU + h * hat.twist;
    Vec3::new(r * theta.cos(), y, r * theta.sin())
}

fn sample_sphere<R: Rng>(radius: f32, rng: &mut R) -> Vec3 {
    let u: f32 = rng.gen();
    let v: f32 = rng.gen();
    let phi = (2.0 * v - 1.0).clamp(-1.0, 1.0).acos();
    let lambda = TAU * u;
    let rad = radius * rng.gen::<f32>().cbrt();
    Vec3::new(
        rad * phi.sin() * lambda.cos(),
        rad * phi.sin() * lambda.sin(),
        rad * phi.cos(),
    )
}

fn sample_cake<R: Rng>(cake: &CakeParams, rng: &mut R) -> Vec3 {
    let pick: f32 = rng.gen();

    let (x, y, z) = if pick < 0.70 || (pick >= 0.90 && cake.candle_count == 0) {
        let (x, z) = disc_point(cake.base_radius, rng);
        let y = cake.y0 - cake.base_height / 2.0 + rng.gen::<f32>() * cake.base_height;
        (x, y, z)
    } else if pick < 0.90 {
        let (x, z) = disc_point(cake.top_radius, rng);
        let y = cake.y0 + cake.base_height / 2.0 + rng.gen::<f32>() * cake.top_height;
        (x, y, z)
    } else {
        let c = rng.gen_range(0..cake.candle_count);
        let a = cake.candle_angle(c);
        let (dx, dz) = disc_point(cake.candle_radius, rng);
        let y = cake.top_surface_y() + rng.gen::<f32>() * cake.candle_height;
        (a.cos() * cake.candle_ring + dx, y, a.sin() * cake.candle_ring + dz)
    };

    let mut jitter = || (rng.gen::<f32>() - 0.5) * cake.jitter;
    Vec3::new(x + jitter(), y + jitter(), z + jitter())
}

/// Area-uniform point in a disc of radius `r` on the XZ plane.
fn disc_point<R: Rng>(r: f32, rng: &mut R) -> (f32, f32) {
    let rr = r * rng.gen::<f32>().sqrt();
    let a = rng.gen::<f32>() * TAU;
    (rr * a.cos(), rr * a.sin())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
