//! # hand_gesture
//!
//! Turns the per-frame output of a hand tracker (zero, one or two hands, each
//! 21 normalized 2D landmarks) into one of four scene [`Mode`]s plus a
//! continuous [`ControlSignal`] taken from the primary hand's horizontal
//! position.
//!
//! ## Gesture → Mode mapping
//!
//! | Gesture | Hands | Mode |
//! |---|---|---|
//! | Index tips and thumb tips of both hands touching (heart) | 2 | [`Mode::Gesture2`] |
//! | Closed fist (fingertips near the wrist) | 1 | [`Mode::Idle`] |
//! | Open hand, thumb and index pinched | 1 | [`Mode::Focus`] |
//! | Open hand | 1 | [`Mode::Burst`] |
//! | Nothing in view | 0 | [`Mode::Idle`] |
//!
//! Two hands that do not form the heart are classified as if only the first
//! hand were present.
//!
//! ```rust
//! use hand_gesture::{HandObservation, ModeState, Mode, Thresholds};
//!
//! let mut state = ModeState::new(Thresholds::default());
//! state.apply(&HandObservation::NoHands);
//! assert_eq!(state.mode(), Mode::Idle);
//! assert_eq!(state.control().value(), 0.5);
//! ```

use std::fmt;

use glam::Vec2;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

// ════════════════════════════════════════════════════════════════════════════
// Landmark layout
// ════════════════════════════════════════════════════════════════════════════

/// Number of landmarks the tracker reports per hand.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST:       usize = 0;
pub const THUMB_TIP:   usize = 4;
pub const INDEX_TIP:   usize = 8;
pub const MIDDLE_BASE: usize = 9;
pub const MIDDLE_TIP:  usize = 12;
pub const RING_TIP:    usize = 16;
pub const PINKY_TIP:   usize = 20;

// ════════════════════════════════════════════════════════════════════════════
// LandmarkError
// ════════════════════════════════════════════════════════════════════════════

/// Reasons a raw tracker frame cannot be turned into a [`HandObservation`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LandmarkError {
    #[error("hand has {found} landmarks, expected {expected}")]
    WrongCount { expected: usize, found: usize },

    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },

    #[error("observation contains {0} hands, at most 2 are supported")]
    TooManyHands(usize),
}

// ════════════════════════════════════════════════════════════════════════════
// Hand
// ════════════════════════════════════════════════════════════════════════════

/// One tracked hand: 21 landmarks in normalized `[0,1]×[0,1]` image space.
///
/// Only the landmarks the classifier reads get named accessors; the rest are
/// reachable through [`Hand::landmarks`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hand {
    landmarks: [Vec2; LANDMARK_COUNT],
}

impl Hand {
    /// Validate and copy a landmark sequence.
    pub fn new(landmarks: &[Vec2]) -> Result<Self, LandmarkError> {
        check_count(landmarks.len())?;
        let mut out = [Vec2::ZERO; LANDMARK_COUNT];
        out.copy_from_slice(landmarks);
        Self::from_array(out)
    }

    /// Build from `[x, y]` pairs, the shape most trackers serialise.
    pub fn from_points(points: &[[f32; 2]]) -> Result<Self, LandmarkError> {
        check_count(points.len())?;
        let mut out = [Vec2::ZERO; LANDMARK_COUNT];
        for (slot, &p) in out.iter_mut().zip(points) {
            *slot = Vec2::from(p);
        }
        Self::from_array(out)
    }

    fn from_array(landmarks: [Vec2; LANDMARK_COUNT]) -> Result<Self, LandmarkError> {
        if let Some(index) = landmarks.iter().position(|p| !p.is_finite()) {
            return Err(LandmarkError::NonFinite { index });
        }
        Ok(Hand { landmarks })
    }

    pub fn landmarks(&self) -> &[Vec2; LANDMARK_COUNT] { &self.landmarks }

    pub fn wrist(&self)       -> Vec2 { self.landmarks[WRIST] }
    pub fn thumb_tip(&self)   -> Vec2 { self.landmarks[THUMB_TIP] }
    pub fn index_tip(&self)   -> Vec2 { self.landmarks[INDEX_TIP] }
    pub fn middle_tip(&self)  -> Vec2 { self.landmarks[MIDDLE_TIP] }
    pub fn ring_tip(&self)    -> Vec2 { self.landmarks[RING_TIP] }
    pub fn pinky_tip(&self)   -> Vec2 { self.landmarks[PINKY_TIP] }
    /// Base of the middle finger; its x drives the [`ControlSignal`].
    pub fn middle_base(&self) -> Vec2 { self.landmarks[MIDDLE_BASE] }

    /// The four non-thumb fingertips.
    pub fn fingertips(&self) -> [Vec2; 4] {
        [self.index_tip(), self.middle_tip(), self.ring_tip(), self.pinky_tip()]
    }

    /// Mean fingertip-to-wrist distance.  Small for a fist, large for an
    /// open hand.
    pub fn openness(&self) -> f32 {
        let wrist = self.wrist();
        let tips = self.fingertips();
        tips.iter().map(|t| t.distance(wrist)).sum::<f32>() / tips.len() as f32
    }

    /// Thumb-tip to index-tip distance.
    pub fn pinch(&self) -> f32 {
        self.thumb_tip().distance(self.index_tip())
    }
}

fn check_count(found: usize) -> Result<(), LandmarkError> {
    if found == LANDMARK_COUNT {
        Ok(())
    } else {
        Err(LandmarkError::WrongCount { expected: LANDMARK_COUNT, found })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandObservation
// ════════════════════════════════════════════════════════════════════════════

/// Everything the tracker saw in one camera frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum HandObservation {
    #[default]
    NoHands,
    One(Hand),
    Two(Hand, Hand),
}

impl HandObservation {
    /// Assemble from already-validated hands.
    pub fn from_hands(hands: Vec<Hand>) -> Result<Self, LandmarkError> {
        let mut it = hands.into_iter();
        match (it.next(), it.next(), it.len()) {
            (None, _, _)                => Ok(HandObservation::NoHands),
            (Some(a), None, _)          => Ok(HandObservation::One(a)),
            (Some(a), Some(b), 0)       => Ok(HandObservation::Two(a, b)),
            (Some(_), Some(_), extra)   => Err(LandmarkError::TooManyHands(2 + extra)),
        }
    }

    /// Strict conversion from raw `[x, y]` sequences, one per hand.
    pub fn try_from_raw(raw: &[Vec<[f32; 2]>]) -> Result<Self, LandmarkError> {
        if raw.len() > 2 {
            return Err(LandmarkError::TooManyHands(raw.len()));
        }
        let hands = raw.iter()
            .map(|points| Hand::from_points(points))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_hands(hands)
    }

    /// Lenient conversion used on the live stream: anything malformed is
    /// logged and treated as an empty frame.
    pub fn from_raw(raw: &[Vec<[f32; 2]>]) -> Self {
        match Self::try_from_raw(raw) {
            Ok(obs) => obs,
            Err(error) => {
                warn!(%error, "malformed hand observation, treating as no hands");
                HandObservation::NoHands
            }
        }
    }

    /// The hand used for single-hand rules (the first one reported).
    pub fn primary(&self) -> Option<&Hand> {
        match self {
            HandObservation::NoHands     => None,
            HandObservation::One(h)      => Some(h),
            HandObservation::Two(h, _)   => Some(h),
        }
    }

    pub fn hand_count(&self) -> usize {
        match self {
            HandObservation::NoHands     => 0,
            HandObservation::One(_)      => 1,
            HandObservation::Two(_, _)   => 2,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Mode
// ════════════════════════════════════════════════════════════════════════════

/// Discrete visual state of the whole scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Closed hand or no hand: the resting party-hat formation.
    #[default]
    Idle,
    /// Open hand: expanded starburst with the photo carousel orbiting.
    Burst,
    /// Pinch: the selected photo is pulled to the front.
    Focus,
    /// Two-hand heart: the cake formation.
    Gesture2,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Idle, Mode::Burst, Mode::Focus, Mode::Gesture2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle     => "idle",
            Mode::Burst    => "burst",
            Mode::Focus    => "focus",
            Mode::Gesture2 => "gesture2",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ControlSignal
// ════════════════════════════════════════════════════════════════════════════

/// Horizontal hand position in `[0, 1]`; `0.5` is the centre of the frame.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct ControlSignal(f32);

impl ControlSignal {
    pub const CENTER: ControlSignal = ControlSignal(0.5);

    /// Clamp into `[0, 1]`.  Trackers report points slightly outside the
    /// frame when a hand is partly cropped.
    pub fn new(x: f32) -> Self {
        if x.is_finite() { ControlSignal(x.clamp(0.0, 1.0)) } else { Self::CENTER }
    }

    pub fn value(self) -> f32 { self.0 }

    /// Signed offset from the centre, in `[-0.5, 0.5]`.
    pub fn offset(self) -> f32 { self.0 - 0.5 }
}

impl Default for ControlSignal {
    fn default() -> Self { Self::CENTER }
}

// ════════════════════════════════════════════════════════════════════════════
// Thresholds
// ════════════════════════════════════════════════════════════════════════════

/// Classifier distances, all in normalized image units.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Both index-tip and thumb-tip gaps between two hands must be below this
    /// for the heart gesture.
    pub two_hand_proximity: f32,
    /// Mean fingertip-to-wrist distance below which a hand counts as closed.
    pub openness_closed: f32,
    /// Thumb-to-index distance below which an open hand counts as pinching.
    pub pinch: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            two_hand_proximity: 0.15,
            openness_closed:    0.25,
            pinch:              0.05,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// classify
// ════════════════════════════════════════════════════════════════════════════

/// Result of classifying one observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub mode:    Mode,
    pub control: ControlSignal,
}

/// Classify one observation.
///
/// `previous` is returned unchanged whenever no single-hand rule runs (no
/// hands, or the two-hand heart), which keeps the control signal sticky.
pub fn classify(
    observation: &HandObservation,
    previous:    ControlSignal,
    thresholds:  &Thresholds,
) -> Classification {
    if let HandObservation::Two(a, b) = observation {
        let index_gap = a.index_tip().distance(b.index_tip());
        let thumb_gap = a.thumb_tip().distance(b.thumb_tip());
        if index_gap < thresholds.two_hand_proximity
            && thumb_gap < thresholds.two_hand_proximity
        {
            return Classification { mode: Mode::Gesture2, control: previous };
        }
    }

    let Some(hand) = observation.primary() else {
        return Classification { mode: Mode::Idle, control: previous };
    };

    let control = ControlSignal::new(hand.middle_base().x);
    let mode = if hand.openness() < thresholds.openness_closed {
        Mode::Idle
    } else if hand.pinch() < thresholds.pinch {
        Mode::Focus
    } else {
        Mode::Burst
    };
    Classification { mode, control }
}

// ════════════════════════════════════════════════════════════════════════════
// ModeState: the single owner of Mode + ControlSignal
// ════════════════════════════════════════════════════════════════════════════

/// Session-wide mode and control signal.
///
/// The frame loop owns exactly one of these and feeds it every observation it
/// drains from the tracker channel, so there is a single writer.
#[derive(Clone, Debug)]
pub struct ModeState {
    mode:          Mode,
    control:       ControlSignal,
    thresholds:    Thresholds,
    hands_present: bool,
    transitions:   u64,
    observations:  u64,
}

impl ModeState {
    pub fn new(thresholds: Thresholds) -> Self {
        ModeState {
            mode:          Mode::Idle,
            control:       ControlSignal::CENTER,
            thresholds,
            hands_present: false,
            transitions:   0,
            observations:  0,
        }
    }

    /// Classify `observation` and store the result.
    pub fn apply(&mut self, observation: &HandObservation) -> Classification {
        let result = classify(observation, self.control, &self.thresholds);
        if result.mode != self.mode {
            self.transitions += 1;
            debug!(from = %self.mode, to = %result.mode, control = result.control.value(), "mode transition");
        }
        self.mode          = result.mode;
        self.control       = result.control;
        self.hands_present = observation.hand_count() > 0;
        self.observations += 1;
        result
    }

    pub fn mode(&self)          -> Mode          { self.mode }
    pub fn control(&self)       -> ControlSignal { self.control }
    pub fn thresholds(&self)    -> &Thresholds   { &self.thresholds }
    /// Whether the last observation contained at least one hand.
    pub fn hands_present(&self) -> bool          { self.hands_present }
    /// Number of mode changes since construction.
    pub fn transitions(&self)   -> u64           { self.transitions }
    /// Number of observations applied so far.
    pub fn observations(&self)  -> u64           { self.observations }
}

impl Default for ModeState {
    fn default() -> Self { Self::new(Thresholds::default()) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Wrist at `(x, 0.8)`, the four fingertips straight above it at
    /// `openness`, thumb tip `pinch` to the right of the index tip, middle
    /// base at `(x, 0.7)`.
    fn make_hand(x: f32, openness: f32, pinch: f32) -> Hand {
        let wrist = Vec2::new(x, 0.8);
        let mut lm = [wrist; LANDMARK_COUNT];
        let tip = Vec2::new(x, 0.8 - openness);
        for i in [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP] {
            lm[i] = tip;
        }
        lm[THUMB_TIP]   = tip + Vec2::new(pinch, 0.0);
        lm[MIDDLE_BASE] = Vec2::new(x, 0.7);
        Hand::new(&lm).unwrap()
    }

    fn run(obs: &HandObservation, previous: f32) -> Classification {
        classify(obs, ControlSignal::new(previous), &Thresholds::default())
    }

    // ── Hand ─────────────────────────────────────────────────────────────

    #[test]
    fn hand_rejects_wrong_landmark_count() {
        let err = Hand::new(&[Vec2::ZERO; 20]).unwrap_err();
        assert_eq!(err, LandmarkError::WrongCount { expected: 21, found: 20 });
    }

    #[test]
    fn hand_rejects_nan() {
        let mut lm = [Vec2::splat(0.5); LANDMARK_COUNT];
        lm[7].y = f32::NAN;
        assert_eq!(Hand::new(&lm).unwrap_err(), LandmarkError::NonFinite { index: 7 });
    }

    #[test]
    fn from_points_validates_like_new() {
        let err = Hand::from_points(&[[0.5, 0.5]; 22]).unwrap_err();
        assert_eq!(err, LandmarkError::WrongCount { expected: 21, found: 22 });

        let mut pts = [[0.5, 0.5]; LANDMARK_COUNT];
        pts[3][0] = f32::INFINITY;
        assert_eq!(Hand::from_points(&pts).unwrap_err(), LandmarkError::NonFinite { index: 3 });

        pts[3] = [0.1, 0.9];
        let hand = Hand::from_points(&pts).unwrap();
        assert_eq!(hand.landmarks()[3], Vec2::new(0.1, 0.9));
        assert_eq!(hand.wrist(), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn openness_and_pinch_measure_distances() {
        let h = make_hand(0.5, 0.3, 0.1);
        assert!((h.openness() - 0.3).abs() < 1e-5);
        assert!((h.pinch() - 0.1).abs() < 1e-5);
    }

    // ── Single hand ──────────────────────────────────────────────────────

    #[test]
    fn closed_hand_is_idle() {
        let c = run(&HandObservation::One(make_hand(0.3, 0.24, 0.2)), 0.5);
        assert_eq!(c.mode, Mode::Idle);
        assert!((c.control.value() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn closed_hand_wins_over_pinch() {
        let c = run(&HandObservation::One(make_hand(0.5, 0.1, 0.0)), 0.5);
        assert_eq!(c.mode, Mode::Idle);
    }

    #[test]
    fn open_pinched_hand_is_focus() {
        let c = run(&HandObservation::One(make_hand(0.6, 0.26, 0.04)), 0.5);
        assert_eq!(c.mode, Mode::Focus);
    }

    #[test]
    fn open_hand_is_burst() {
        let c = run(&HandObservation::One(make_hand(0.7, 0.4, 0.06)), 0.5);
        assert_eq!(c.mode, Mode::Burst);
        assert!((c.control.value() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn control_is_clamped_into_unit_range() {
        let c = run(&HandObservation::One(make_hand(1.2, 0.4, 0.2)), 0.5);
        assert_eq!(c.control.value(), 1.0);
    }

    // ── No hands ─────────────────────────────────────────────────────────

    #[test]
    fn no_hands_is_idle_and_control_sticks() {
        for prev in [0.0, 0.2, 0.5, 0.93] {
            let c = run(&HandObservation::NoHands, prev);
            assert_eq!(c.mode, Mode::Idle);
            assert_eq!(c.control.value(), prev);
        }
    }

    // ── Two hands ────────────────────────────────────────────────────────

    #[test]
    fn heart_gesture_overrides_single_hand_rules() {
        // Index tips 0.05 apart, thumb tips 0.05 + (0.13 - 0.10) = 0.08 apart.
        let a = make_hand(0.45, 0.4, 0.10);
        let b = make_hand(0.50, 0.4, 0.13);
        let c = run(&HandObservation::Two(a, b), 0.25);
        assert_eq!(c.mode, Mode::Gesture2);
        assert_eq!(c.control.value(), 0.25, "heart must not move the control signal");
    }

    #[test]
    fn heart_needs_both_gaps_below_threshold() {
        // Index tips close, thumbs 0.05 + 0.2 apart.
        let a = make_hand(0.45, 0.4, 0.0);
        let b = make_hand(0.50, 0.4, 0.2);
        assert_ne!(run(&HandObservation::Two(a, b), 0.5).mode, Mode::Gesture2);
    }

    #[test]
    fn distant_hands_fall_back_to_first_hand() {
        let first  = make_hand(0.2, 0.3, 0.02);
        let second = make_hand(0.8, 0.1, 0.3);
        let c = run(&HandObservation::Two(first, second), 0.5);
        assert_eq!(c.mode, Mode::Focus);
        assert!((c.control.value() - 0.2).abs() < 1e-6);
    }

    // ── Raw conversion ───────────────────────────────────────────────────

    #[test]
    fn malformed_raw_frame_becomes_no_hands() {
        let short = vec![vec![[0.5, 0.5]; 20]];
        assert_eq!(HandObservation::from_raw(&short), HandObservation::NoHands);
        let three = vec![vec![[0.5, 0.5]; 21]; 3];
        assert_eq!(
            HandObservation::try_from_raw(&three),
            Err(LandmarkError::TooManyHands(3))
        );
    }

    #[test]
    fn raw_frame_with_two_hands_round_trips_hand_count() {
        let raw = vec![vec![[0.1, 0.2]; 21], vec![[0.3, 0.4]; 21]];
        let obs = HandObservation::from_raw(&raw);
        assert_eq!(obs.hand_count(), 2);
        assert_eq!(obs.primary().unwrap().wrist(), Vec2::new(0.1, 0.2));
    }

    // ── ModeState ────────────────────────────────────────────────────────

    #[test]
    fn mode_state_counts_transitions_and_tracks_presence() {
        let mut s = ModeState::default();
        s.apply(&HandObservation::One(make_hand(0.6, 0.4, 0.2)));
        assert_eq!(s.mode(), Mode::Burst);
        assert!(s.hands_present());
        s.apply(&HandObservation::One(make_hand(0.6, 0.4, 0.2)));
        assert_eq!(s.transitions(), 1);
        s.apply(&HandObservation::NoHands);
        assert_eq!(s.mode(), Mode::Idle);
        assert!(!s.hands_present());
        assert!((s.control().value() - 0.6).abs() < 1e-6);
        assert_eq!(s.transitions(), 2);
        assert_eq!(s.observations(), 3);
    }

    #[test]
    fn permanently_empty_stream_stays_idle() {
        let mut s = ModeState::default();
        for _ in 0..100 {
            s.apply(&HandObservation::NoHands);
        }
        assert_eq!(s.mode(), Mode::Idle);
        assert_eq!(s.control(), ControlSignal::CENTER);
        assert_eq!(s.transitions(), 0);
    }
}
