//! Hand observation sources: keyboard simulation and JSON-lines replay.
//!
//! The public interface is [`TrackerEvent`] delivered over a `mpsc` channel.
//! The frame loop does not need to know whether observations come from a
//! live tracker piped into `--replay -`, a recorded file, or the keyboard.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use glam::Vec2;
use hand_gesture::{Hand, HandObservation, LandmarkError, INDEX_TIP, LANDMARK_COUNT, THUMB_TIP};
use tracing::{debug, info, warn};

use crate::error::{ReplayLineError, SceneError};

/// Typical hand-tracker frame period.
pub const TRACKER_INTERVAL: Duration = Duration::from_millis(33);

// ════════════════════════════════════════════════════════════════════════════
// TrackerEvent
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum TrackerEvent {
    /// One camera frame worth of hands.
    Frame(HandObservation),
    /// The source has nothing more to deliver; the last mode stays in force.
    EndOfStream,
    /// Quit the application.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// ObservationSource trait
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`TrackerEvent`]s over a channel.
pub trait ObservationSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<TrackerEvent>);
}

/// Spawn a source on its own thread and return the receiving end.
pub fn spawn_observation_source<S: ObservationSource>(source: S) -> Receiver<TrackerEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// Synthetic hands
// ════════════════════════════════════════════════════════════════════════════

/// Poses the simulator can hold up in front of the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandPose {
    Away,
    Fist,
    OpenPalm,
    Pinch,
    /// Two hands, index tips and thumb tips touching.
    Heart,
}

// Finger directions from vertical, thumb first.
const FINGER_ANGLES: [f32; 5] = [-1.1, -0.35, 0.0, 0.3, 0.6];
const OPEN_REACH: f32 = 0.35;
const FIST_REACH: f32 = 0.12;
const WRIST_Y:    f32 = 0.8;

fn splayed_hand(wrist: Vec2, reach: f32) -> [Vec2; LANDMARK_COUNT] {
    let mut lm = [wrist; LANDMARK_COUNT];
    for (f, angle) in FINGER_ANGLES.iter().enumerate() {
        // Image y grows downward, so fingers point toward -y.
        let dir = Vec2::new(angle.sin(), -angle.cos());
        for joint in 0..4 {
            lm[1 + f * 4 + joint] = wrist + dir * reach * (joint + 1) as f32 / 4.0;
        }
    }
    lm
}

/// Landmarks for `pose` with the hand centred at horizontal position `x`.
pub fn synthesize(pose: HandPose, x: f32) -> Result<HandObservation, LandmarkError> {
    let wrist = Vec2::new(x, WRIST_Y);
    let hands = match pose {
        HandPose::Away => Vec::new(),
        HandPose::Fist => vec![Hand::new(&splayed_hand(wrist, FIST_REACH))?],
        HandPose::OpenPalm => vec![Hand::new(&splayed_hand(wrist, OPEN_REACH))?],
        HandPose::Pinch => {
            let mut lm = splayed_hand(wrist, OPEN_REACH);
            lm[THUMB_TIP] = lm[INDEX_TIP] + Vec2::new(0.02, 0.0);
            vec![Hand::new(&lm)?]
        }
        HandPose::Heart => {
            let mut left = splayed_hand(Vec2::new(x - 0.12, WRIST_Y), OPEN_REACH);
            let mut right = splayed_hand(Vec2::new(x + 0.12, WRIST_Y), OPEN_REACH);
            left[INDEX_TIP]  = Vec2::new(x - 0.02, 0.50);
            right[INDEX_TIP] = Vec2::new(x + 0.02, 0.50);
            left[THUMB_TIP]  = Vec2::new(x - 0.02, 0.62);
            right[THUMB_TIP] = Vec2::new(x + 0.02, 0.62);
            vec![Hand::new(&left)?, Hand::new(&right)?]
        }
    };
    HandObservation::from_hands(hands)
}

// ════════════════════════════════════════════════════════════════════════════
// SimObservationSource: keyboard simulation
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Copy, Debug)]
pub enum SimInput {
    KeyDown(SimKey),
}

/// Simulated key codes (mapped from minifb keys by the visualizer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    Fist,       // F
    OpenPalm,   // O
    Pinch,      // P
    Heart,      // H
    NoHands,    // N
    MoveLeft,   // ←
    MoveRight,  // →
    Quit,       // Q / Esc
}

const SIM_STEP: f32 = 0.02;

/// Observation source driven by [`SimInput`]s from the visualizer window.
///
/// Holds the current pose and re-emits it every `interval`, the way a camera
/// tracker reports continuously.
pub struct SimObservationSource {
    pub rx:       Receiver<SimInput>,
    pub interval: Duration,
}

impl SimObservationSource {
    pub fn new(rx: Receiver<SimInput>) -> Self {
        SimObservationSource { rx, interval: TRACKER_INTERVAL }
    }
}

impl ObservationSource for SimObservationSource {
    fn run(self: Box<Self>, tx: Sender<TrackerEvent>) {
        let mut pose = HandPose::Away;
        let mut x = 0.5_f32;

        loop {
            match self.rx.recv_timeout(self.interval) {
                Ok(SimInput::KeyDown(SimKey::Quit)) => {
                    let _ = tx.send(TrackerEvent::Quit);
                    return;
                }
                Ok(SimInput::KeyDown(key)) => {
                    match key {
                        SimKey::Fist      => pose = HandPose::Fist,
                        SimKey::OpenPalm  => pose = HandPose::OpenPalm,
                        SimKey::Pinch     => pose = HandPose::Pinch,
                        SimKey::Heart     => pose = HandPose::Heart,
                        SimKey::NoHands   => pose = HandPose::Away,
                        SimKey::MoveLeft  => x = (x - SIM_STEP).max(0.05),
                        SimKey::MoveRight => x = (x + SIM_STEP).min(0.95),
                        SimKey::Quit      => {}
                    }
                    debug!(?pose, x, "simulated hand changed");
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }

            match synthesize(pose, x) {
                Ok(obs) => {
                    if tx.send(TrackerEvent::Frame(obs)).is_err() {
                        return;
                    }
                }
                Err(error) => warn!(%error, ?pose, "could not synthesize hand"),
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ReplayObservationSource: JSON lines
// ════════════════════════════════════════════════════════════════════════════

/// Parse one replay line: a JSON array of hands, each an array of `[x, y]`
/// (or `[x, y, z]`) points.
pub fn parse_replay_line(line: &str) -> Result<HandObservation, ReplayLineError> {
    let hands: Vec<Vec<Vec<f32>>> = serde_json::from_str(line)?;
    let raw = hands
        .iter()
        .enumerate()
        .map(|(hand, points)| {
            points
                .iter()
                .enumerate()
                .map(|(index, p)| match p.as_slice() {
                    [x, y, ..] => Ok([*x, *y]),
                    _ => Err(ReplayLineError::ShortPoint { hand, index }),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(HandObservation::try_from_raw(&raw)?)
}

/// Replays recorded (or piped) tracker output, one JSON line per frame.
pub struct ReplayObservationSource<R> {
    reader:   R,
    interval: Duration,
}

impl<R: BufRead + Send + 'static> ReplayObservationSource<R> {
    pub fn new(reader: R) -> Self {
        ReplayObservationSource { reader, interval: TRACKER_INTERVAL }
    }

    /// Pause between frames; zero replays as fast as the consumer reads.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl ReplayObservationSource<Box<dyn BufRead + Send>> {
    /// Open a file, or stdin for `-`.
    pub fn open(path: &str) -> Result<Self, SceneError> {
        let reader: Box<dyn BufRead + Send> = if path == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            let file = File::open(path)
                .map_err(|source| SceneError::Replay { path: path.to_string(), source })?;
            Box::new(BufReader::new(file))
        };
        info!(path, "replaying hand observations");
        Ok(Self::new(reader))
    }
}

impl<R: BufRead + Send + 'static> ObservationSource for ReplayObservationSource<R> {
    fn run(self: Box<Self>, tx: Sender<TrackerEvent>) {
        let interval = self.interval;
        let mut frames = 0u64;

        for (n, line) in self.reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(error) => {
                    warn!(%error, "replay read failed");
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let obs = match parse_replay_line(line) {
                Ok(obs) => obs,
                Err(ReplayLineError::Json(error)) => {
                    warn!(line = n + 1, %error, "skipping unparsable replay line");
                    continue;
                }
                Err(error) => {
                    warn!(line = n + 1, %error, "malformed hand observation, treating as no hands");
                    HandObservation::NoHands
                }
            };

            if tx.send(TrackerEvent::Frame(obs)).is_err() {
                return;
            }
            frames += 1;
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }

        info!(frames, "replay finished");
        let _ = tx.send(TrackerEvent::EndOfStream);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
