//! Top-level scene state and the frame loop.
//!
//! `Stage` owns the `ModeState`, the `Choreographer`, the `Carousel` and the
//! `Decorations`.  It consumes hand observations and advances everything once
//! per frame; `run()` wires it to an observation source and the visualizer.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use hand_gesture::{Classification, ControlSignal, HandObservation, Mode, ModeState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, trace};

use crate::carousel::Carousel;
use crate::choreographer::{Choreographer, GroupParams};
use crate::config::SceneConfig;
use crate::decor::{DecorFrame, Decorations};
use crate::error::{ConfigError, SceneError};
use crate::gesture::{
    spawn_observation_source, ReplayObservationSource, SimInput, SimObservationSource, TrackerEvent,
};
use crate::viewpoint::Viewpoint;
use crate::visualizer::Visualizer;

// ════════════════════════════════════════════════════════════════════════════
// FrameClock
// ════════════════════════════════════════════════════════════════════════════

/// Monotonic frame timer.
pub struct FrameClock {
    start:  Instant,
    last:   Instant,
    max_dt: f32,
}

impl FrameClock {
    pub fn new(max_dt: f32) -> Self {
        let now = Instant::now();
        FrameClock { start: now, last: now, max_dt }
    }

    /// `(dt, elapsed)` in seconds; `dt` is capped at `max_dt`.
    pub fn tick(&mut self) -> (f32, f32) {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32().min(self.max_dt);
        self.last = now;
        (dt, now.duration_since(self.start).as_secs_f32())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FrameSummary
// ════════════════════════════════════════════════════════════════════════════

/// What one `Stage::tick` produced, besides the buffers it updated in place.
#[derive(Clone, Debug)]
pub struct FrameSummary {
    pub mode:      Mode,
    pub control:   ControlSignal,
    pub selected:  usize,
    pub groups:    Vec<GroupParams>,
    pub decor:     DecorFrame,
    pub viewpoint: Viewpoint,
}

// ════════════════════════════════════════════════════════════════════════════
// Stage
// ════════════════════════════════════════════════════════════════════════════

pub struct Stage {
    modes:         ModeState,
    choreographer: Choreographer,
    carousel:      Carousel,
    decorations:   Decorations,
    frames:        u64,
}

impl Stage {
    /// Validate `config` and lay out every particle group.
    pub fn new(config: &SceneConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let choreographer =
            Choreographer::generate(&config.groups, &config.layout, config.motion, &mut rng);
        let carousel = Carousel::new(config.carousel)?;

        info!(
            seed = config.seed,
            groups = config.groups.len(),
            particles = config.total_particles(),
            photos = config.carousel.item_count,
            "stage ready"
        );

        Ok(Stage {
            modes: ModeState::new(config.classifier),
            choreographer,
            carousel,
            decorations: Decorations::new(&config.layout),
            frames: 0,
        })
    }

    /// Classify one tracker frame and make it the current mode.
    pub fn handle_observation(&mut self, observation: &HandObservation) -> Classification {
        self.modes.apply(observation)
    }

    /// Advance the whole scene by one frame.
    pub fn tick(&mut self, dt: f32, elapsed: f32) -> FrameSummary {
        let mode = self.modes.mode();
        let control = self.modes.control();
        let viewpoint = Viewpoint::at(elapsed);

        let groups = self.choreographer.advance(dt, mode, control, elapsed);
        self.carousel.update(
            dt,
            mode,
            control,
            elapsed,
            self.choreographer.primary_rotation(),
            &viewpoint,
        );
        let decor = self.decorations.update(mode, elapsed, &viewpoint);
        self.frames += 1;

        trace!(
            frame = self.frames,
            %mode,
            control = control.value(),
            selected = self.carousel.selected_index(),
            "tick"
        );

        FrameSummary {
            mode,
            control,
            selected: self.carousel.selected_index(),
            groups,
            decor,
            viewpoint,
        }
    }

    /// Record a photo's aspect ratio once its image is known.
    pub fn set_photo_aspect(&mut self, index: usize, aspect: f32) -> Result<(), SceneError> {
        self.carousel.set_aspect(index, aspect)
    }

    pub fn mode(&self)                   -> Mode          { self.modes.mode() }
    pub fn control(&self)                -> ControlSignal { self.modes.control() }
    pub fn modes(&self)                  -> &ModeState    { &self.modes }
    pub fn choreographer(&self)          -> &Choreographer { &self.choreographer }
    pub fn carousel(&self)               -> &Carousel     { &self.carousel }
    pub fn frames(&self)                 -> u64           { self.frames }

    /// One-line status for the window's status bar.
    pub fn status_line(&self, fps: f32) -> String {
        format!(
            "{}  hand {}  x {:.2}  photo {}  {:.0} fps",
            self.mode().as_str(),
            if self.modes.hands_present() { "yes" } else { "no" },
            self.control().value(),
            self.carousel.selected_index() + 1,
            fps,
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Where hand observations come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    /// Keyboard-driven simulated hands.
    Keyboard,
    /// JSON lines from a file, or stdin for `-`.
    Replay(String),
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub input:           InputSource,
    /// Run this many frames without a window, then exit.
    pub headless_frames: Option<u64>,
}

/// Run the scene.
///
/// This is the entry point called from `main.rs`.  It builds the stage, the
/// observation source and (unless headless) the visualizer, then drives the
/// observation/render loop at ~60 fps.
pub fn run(config: SceneConfig, opts: RunOptions) -> Result<(), SceneError> {
    let stage = Stage::new(&config)?;
    match opts.headless_frames {
        Some(frames) => run_headless(stage, &config, &opts.input, frames),
        None => run_windowed(stage, &config, &opts.input),
    }
}

fn run_windowed(mut stage: Stage, config: &SceneConfig, input: &InputSource) -> Result<(), SceneError> {
    // ── Sim input channel ─────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let tracker_rx = match input {
        InputSource::Keyboard => spawn_observation_source(SimObservationSource::new(sim_rx)),
        InputSource::Replay(path) => {
            drop(sim_rx);
            spawn_observation_source(ReplayObservationSource::open(path)?)
        }
    };

    // ── Visualizer (owns the window and the sim input sender) ────────────
    let mut vis = Visualizer::new(sim_tx)?;
    let mut clock = FrameClock::new(config.motion.max_dt);
    let mut fps = 0.0_f32;

    // ── Main loop ─────────────────────────────────────────────────────────
    while vis.is_open() {
        // 1. Poll window input → SimInput
        if !vis.poll_input() { break; }

        // 2. Drain tracker events; the last observation wins.
        if !drain(&tracker_rx, &mut stage) { return Ok(()); }

        // 3. Per-frame logic
        let (dt, elapsed) = clock.tick();
        if dt > 0.0 {
            fps += (1.0 / dt - fps) * 0.05;
        }
        let summary = stage.tick(dt, elapsed);

        // 4. Render
        let status = stage.status_line(fps);
        vis.render(&stage, &summary, &status)?;
    }

    info!(
        frames = stage.frames(),
        observations = stage.modes().observations(),
        transitions = stage.modes().transitions(),
        "window closed"
    );
    Ok(())
}

/// Apply everything waiting on `rx`.  Returns false on a quit request.
fn drain(rx: &Receiver<TrackerEvent>, stage: &mut Stage) -> bool {
    loop {
        match rx.try_recv() {
            Ok(TrackerEvent::Frame(obs)) => { stage.handle_observation(&obs); }
            Ok(TrackerEvent::EndOfStream) => info!("observation stream ended, holding the last mode"),
            Ok(TrackerEvent::Quit) => return false,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return true,
        }
    }
}

/// Fixed-step run without a window: one tracker frame per scene frame.
fn run_headless(
    mut stage: Stage,
    config:    &SceneConfig,
    input:     &InputSource,
    frames:    u64,
) -> Result<(), SceneError> {
    let mut tracker = match input {
        InputSource::Keyboard => None,
        InputSource::Replay(path) => Some(spawn_observation_source(
            ReplayObservationSource::open(path)?.with_interval(Duration::ZERO),
        )),
    };

    let dt = 1.0 / config.motion.reference_fps;
    for frame in 0..frames {
        match tracker.as_ref().map(|rx| rx.recv()) {
            Some(Ok(TrackerEvent::Frame(obs))) => { stage.handle_observation(&obs); }
            Some(_) => {
                debug!(frame, "observation stream ended");
                tracker = None;
            }
            None => {}
        }

        let summary = stage.tick(dt, frame as f32 * dt);
        if frame % 60 == 0 {
            info!(
                frame,
                mode = %summary.mode,
                control = summary.control.value(),
                selected = summary.selected,
                rotation = stage.choreographer().primary_rotation(),
                "headless frame"
            );
        }
    }

    info!(
        frames,
        observations = stage.modes().observations(),
        transitions = stage.modes().transitions(),
        "headless run finished"
    );
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupConfig;
    use crate::gesture::{synthesize, HandPose};
    use particle_layout::{Formation, Role};

    fn small_config() -> SceneConfig {
        SceneConfig {
            groups: vec![
                GroupConfig { role: Role::Primary,  count: 300, base_size: 2.2, color: 0xffe86a },
                GroupConfig { role: Role::Accent,   count: 100, base_size: 3.4, color: 0xff4fd8 },
                GroupConfig { role: Role::Tertiary, count: 50,  base_size: 3.0, color: 0x6af1ff },
            ],
            ..SceneConfig::default()
        }
    }

    fn make() -> Stage {
        Stage::new(&small_config()).unwrap()
    }

    fn show(stage: &mut Stage, pose: HandPose, x: f32) {
        stage.handle_observation(&synthesize(pose, x).unwrap());
    }

    fn run_frames(stage: &mut Stage, n: usize, dt: f32) {
        for _ in 0..n {
            let t = stage.frames() as f32 * dt;
            stage.tick(dt, t);
        }
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut cfg = small_config();
        cfg.groups[0].count = 0;
        assert!(matches!(Stage::new(&cfg), Err(ConfigError::EmptyGroup { .. })));

        let mut cfg = small_config();
        cfg.carousel.item_count = 0;
        assert!(matches!(Stage::new(&cfg), Err(ConfigError::NoCarouselItems)));
    }

    #[test]
    fn starts_idle_in_the_hat() {
        let mut stage = make();
        assert_eq!(stage.mode(), Mode::Idle);
        let summary = stage.tick(1.0 / 60.0, 0.0);
        assert_eq!(summary.mode, Mode::Idle);
        assert!(summary.decor.title.is_some());
        assert!(stage.choreographer().max_distance_to(Formation::Cone) < 1e-4);
    }

    #[test]
    fn same_seed_same_scene() {
        let a = make();
        let b = make();
        for (ga, gb) in a.choreographer().groups().iter().zip(b.choreographer().groups()) {
            assert_eq!(ga.targets(), gb.targets());
        }
    }

    #[test]
    fn fist_pulls_the_burst_back_into_the_hat() {
        let mut stage = make();
        show(&mut stage, HandPose::OpenPalm, 0.5);
        assert_eq!(stage.mode(), Mode::Burst);
        run_frames(&mut stage, 300, 1.0 / 60.0);
        assert!(stage.choreographer().max_distance_to(Formation::Sphere) < 1e-3);

        show(&mut stage, HandPose::Fist, 0.5);
        assert_eq!(stage.mode(), Mode::Idle);

        let cone_distances = |stage: &Stage| -> Vec<f32> {
            stage
                .choreographer()
                .groups()
                .iter()
                .flat_map(|g| g.positions().iter().zip(g.targets().get(Formation::Cone)))
                .map(|(p, t)| p.distance(*t))
                .collect()
        };
        let initial = cone_distances(&stage);
        run_frames(&mut stage, 50, 0.016);

        // 0.92^50 of the starting distance is left, about 1.55%.
        let left = 0.92f32.powi(50);
        for (d, d0) in cone_distances(&stage).iter().zip(&initial) {
            assert!((d - d0 * left).abs() < 1e-3, "{d} vs {}", d0 * left);
            assert!(*d <= d0 * 0.016 + 1e-3);
        }

        run_frames(&mut stage, 10, 0.016);
        for (d, d0) in cone_distances(&stage).iter().zip(&initial) {
            assert!(*d <= d0 * 0.01 + 1e-3);
        }
    }

    #[test]
    fn first_frame_after_a_switch_moves_even_with_zero_dt() {
        let mut stage = make();
        let before = stage.choreographer().max_distance_to(Formation::Sphere);
        show(&mut stage, HandPose::OpenPalm, 0.5);
        stage.tick(0.0, 0.0);
        let after = stage.choreographer().max_distance_to(Formation::Sphere);
        assert!((after - before * 0.92).abs() < 1e-3, "{after} vs {}", before * 0.92);
    }

    #[test]
    fn heart_builds_the_cake_and_hides_the_photos() {
        let mut stage = make();
        show(&mut stage, HandPose::OpenPalm, 0.5);
        run_frames(&mut stage, 120, 1.0 / 60.0);
        assert!(stage.carousel().items().iter().all(|i| i.visible));

        show(&mut stage, HandPose::Heart, 0.5);
        assert_eq!(stage.mode(), Mode::Gesture2);
        run_frames(&mut stage, 120, 1.0 / 60.0);

        for item in stage.carousel().items() {
            assert!(!item.visible);
            assert!(item.scale.max_element() < 0.01);
        }
        let summary = stage.tick(1.0 / 60.0, 5.0);
        assert!(summary.decor.caption.is_some());
        assert_eq!(summary.decor.flames.len(), 5);
        assert!(summary.groups.iter().all(|g| g.rotation == 0.0));
        assert!(stage.choreographer().max_distance_to(Formation::Cake) < 0.05);
    }

    #[test]
    fn pinch_focuses_the_front_photo() {
        let mut stage = make();
        show(&mut stage, HandPose::OpenPalm, 0.5);
        run_frames(&mut stage, 90, 1.0 / 60.0);
        let selected = stage.carousel().selected_index();

        show(&mut stage, HandPose::Pinch, 0.5);
        assert_eq!(stage.mode(), Mode::Focus);
        run_frames(&mut stage, 200, 1.0 / 60.0);

        assert_eq!(stage.carousel().selected_index(), selected);
        let item = stage.carousel().items()[selected];
        assert!((item.scale.y - 8.5).abs() < 0.05);
        // Focus keeps the starburst.
        assert!(stage.choreographer().max_distance_to(Formation::Sphere) < 1e-3);
    }

    #[test]
    fn losing_the_hand_keeps_mode_and_control() {
        let mut stage = make();
        show(&mut stage, HandPose::OpenPalm, 0.7);
        show(&mut stage, HandPose::Away, 0.5);
        assert_eq!(stage.mode(), Mode::Idle);
        assert!((stage.control().value() - 0.7).abs() < 1e-5);
        assert!(!stage.modes().hands_present());
    }

    #[test]
    fn photo_aspect_index_is_checked() {
        let mut stage = make();
        assert!(stage.set_photo_aspect(0, 1.33).is_ok());
        assert!(matches!(
            stage.set_photo_aspect(9, 1.0),
            Err(SceneError::CarouselIndex { index: 9, len: 5 })
        ));
    }

    #[test]
    fn drain_applies_the_latest_frame_and_honours_quit() {
        let mut stage = make();
        let (tx, rx) = mpsc::channel();
        tx.send(TrackerEvent::Frame(synthesize(HandPose::OpenPalm, 0.5).unwrap())).unwrap();
        tx.send(TrackerEvent::Frame(synthesize(HandPose::Heart, 0.5).unwrap())).unwrap();
        tx.send(TrackerEvent::EndOfStream).unwrap();
        assert!(drain(&rx, &mut stage));
        assert_eq!(stage.mode(), Mode::Gesture2);

        tx.send(TrackerEvent::Quit).unwrap();
        assert!(!drain(&rx, &mut stage));
    }

    #[test]
    fn status_line_names_the_mode() {
        let mut stage = make();
        show(&mut stage, HandPose::OpenPalm, 0.5);
        assert!(stage.status_line(60.0).starts_with("burst"));
    }

    #[test]
    fn frame_clock_caps_dt() {
        let mut clock = FrameClock::new(0.033);
        let (dt0, e0) = clock.tick();
        std::thread::sleep(Duration::from_millis(50));
        let (dt1, e1) = clock.tick();
        assert!(dt0 >= 0.0 && dt0 <= 0.033);
        assert_eq!(dt1, 0.033);
        assert!(e1 >= e0 + 0.049);
    }

    #[test]
    fn headless_run_without_input_completes() {
        let opts = RunOptions { input: InputSource::Keyboard, headless_frames: Some(30) };
        assert!(run(small_config(), opts).is_ok());
    }
}
