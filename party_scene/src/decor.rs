//! Mode-gated decorations: the birthday banner and balloon over the hat, the
//! caption and candle flames over the cake.

use glam::Vec3;
use hand_gesture::Mode;
use particle_layout::{CakeParams, HatParams, LayoutParams};

use crate::viewpoint::Viewpoint;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TitlePose {
    pub y:       f32,
    pub opacity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BalloonPose {
    pub position: Vec3,
    /// Spin about the viewing axis.
    pub spin:     f32,
    pub scale:    f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptionPose {
    pub scale:   f32,
    pub opacity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlamePose {
    pub position: Vec3,
    pub scale:    f32,
    pub opacity:  f32,
    pub facing:   Vec3,
}

/// Everything decorative that is visible this frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecorFrame {
    pub title:   Option<TitlePose>,
    pub balloon: Option<BalloonPose>,
    pub caption: Option<CaptionPose>,
    pub flames:  Vec<FlamePose>,
}

pub struct Decorations {
    hat:  HatParams,
    cake: CakeParams,
}

impl Decorations {
    pub fn new(layout: &LayoutParams) -> Self {
        Decorations { hat: layout.hat, cake: layout.cake }
    }

    pub fn update(&self, mode: Mode, t: f32, viewpoint: &Viewpoint) -> DecorFrame {
        match mode {
            Mode::Idle => DecorFrame {
                title: Some(TitlePose {
                    y:       52.0 + (t * 0.8).sin(),
                    opacity: 0.86 + 0.12 * (t * 2.0).sin(),
                }),
                balloon: Some(BalloonPose {
                    position: Vec3::new(0.0, self.hat.height / 2.0 + 8.0 + (t * 1.2).sin() * 1.2, 0.0),
                    spin:     t * 0.6,
                    scale:    1.0 + 0.08 * (t * 5.0).sin(),
                }),
                ..DecorFrame::default()
            },
            Mode::Gesture2 => DecorFrame {
                caption: Some(CaptionPose {
                    scale:   1.0 + (t * 2.6).sin().abs() * 0.05,
                    opacity: 0.88 + 0.10 * (t * 2.2).sin(),
                }),
                flames: self.flames(t, viewpoint),
                ..DecorFrame::default()
            },
            Mode::Burst | Mode::Focus => DecorFrame::default(),
        }
    }

    fn flames(&self, t: f32, viewpoint: &Viewpoint) -> Vec<FlamePose> {
        let top = self.cake.candle_tip_y() + 1.6;
        (0..self.cake.candle_count)
            .map(|i| {
                let k = i as f32;
                let a = self.cake.candle_angle(i);
                let position = Vec3::new(
                    a.cos() * self.cake.candle_ring,
                    top + (t * 3.0 + k).sin() * 0.9,
                    a.sin() * self.cake.candle_ring,
                );
                FlamePose {
                    position,
                    scale:   1.0 + 0.15 * (t * 12.0 + k).sin(),
                    opacity: 0.85 + 0.10 * (t * 8.0 + k).sin(),
                    facing:  viewpoint.facing_from(position),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decor() -> Decorations {
        Decorations::new(&LayoutParams::default())
    }

    #[test]
    fn hat_shows_title_and_balloon_only() {
        let f = decor().update(Mode::Idle, 1.3, &Viewpoint::at(1.3));
        let title = f.title.unwrap();
        assert!((title.y - 52.0).abs() <= 1.0);
        assert!(title.opacity >= 0.74 && title.opacity <= 0.98);
        let balloon = f.balloon.unwrap();
        assert!((balloon.position.y - 46.0).abs() <= 1.2 + 1e-4);
        assert!(f.caption.is_none());
        assert!(f.flames.is_empty());
    }

    #[test]
    fn cake_shows_caption_and_one_flame_per_candle() {
        let layout = LayoutParams::default();
        let view = Viewpoint::at(2.0);
        let f = decor().update(Mode::Gesture2, 2.0, &view);
        assert!(f.title.is_none() && f.balloon.is_none());
        let caption = f.caption.unwrap();
        assert!(caption.scale >= 1.0 && caption.scale <= 1.05 + 1e-6);

        assert_eq!(f.flames.len(), layout.cake.candle_count);
        let tip = layout.cake.candle_tip_y() + 1.6;
        for (flame, candle) in f.flames.iter().zip(layout.cake.candle_positions()) {
            assert!((flame.position.x - candle.x).abs() < 1e-4);
            assert!((flame.position.z - candle.z).abs() < 1e-4);
            assert!((flame.position.y - tip).abs() <= 0.9 + 1e-4);
            assert!((flame.facing.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn burst_and_focus_show_nothing() {
        for mode in [Mode::Burst, Mode::Focus] {
            assert_eq!(decor().update(mode, 0.5, &Viewpoint::default()), DecorFrame::default());
        }
    }
}
