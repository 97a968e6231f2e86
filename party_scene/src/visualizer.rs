//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     HAPPY BIRTHDAY  (Idle)                   │
//! │                                                              │
//! │         [photo]     · particle hat / burst / cake ·          │
//! │                        ▲ candle flames (cake)                │
//! │                                                              │
//! │  status bar: mode · control · selected photo · fps           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Particles are drawn as perspective-sized squares, back to front per
//! group; photos as framed cards; flames as diamonds.

use std::sync::mpsc::Sender;
use std::time::Duration;

use glam::{Mat3, Mat4, Vec3};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::app::{FrameSummary, Stage};
use crate::error::SceneError;
use crate::gesture::{SimInput, SimKey};
use crate::viewpoint::Viewpoint;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 960;
pub const WIN_H:     usize = 600;
const STATUS_H:      usize = 18;
const STATUS_Y:      usize = WIN_H - STATUS_H;
const BG_COLOR:      u32   = 0xFF05070B;
const STATUS_BG:     u32   = 0xFF101826;
const TEXT_COLOR:    u32   = 0xFFE8E8F0;
const FRAME_COLOR:   u32   = 0xFFFFD36A;  // photo border
const SELECT_COLOR:  u32   = 0xFFFFFFFF;
const FLAME_COLOR:   u32   = 0xFFFFA23A;
const TITLE_COLOR:   u32   = 0xFFFF4FD8;
const BALLOON_COLOR: u32   = 0xFFFF5A5A;
const PHOTO_TINTS:   [u32; 5] = [0xFF3A6EA5, 0xFF7A4FA0, 0xFF2F8F6F, 0xFFA0584F, 0xFF8F8A3A];

const TITLE_TEXT:    &str  = "HAPPY BIRTHDAY";
const CAPTION_TEXT:  &str  = "MAKE A WISH";

const FOV_Y_DEG:     f32   = 60.0;
const NEAR:          f32   = 0.1;
const FAR:           f32   = 1200.0;

// ════════════════════════════════════════════════════════════════════════════
// Camera
// ════════════════════════════════════════════════════════════════════════════

/// Perspective projection from world space to window pixels.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    view_proj: Mat4,
    width:     f32,
    height:    f32,
    focal_px:  f32,
}

impl Camera {
    pub fn new(view: &Viewpoint, width: usize, height: usize) -> Self {
        let (w, h) = (width as f32, height.max(1) as f32);
        let fov = FOV_Y_DEG.to_radians();
        let proj = Mat4::perspective_rh(fov, w / h, NEAR, FAR);
        let look = Mat4::look_at_rh(view.eye, view.target, Vec3::Y);
        Camera {
            view_proj: proj * look,
            width:     w,
            height:    h,
            focal_px:  0.5 * h / (0.5 * fov).tan(),
        }
    }

    /// Pixel position and view depth of `p`; `None` behind the near plane.
    pub fn project(&self, p: Vec3) -> Option<(f32, f32, f32)> {
        let clip = self.view_proj * p.extend(1.0);
        if clip.w <= NEAR {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some((
            (ndc.x + 1.0) * 0.5 * self.width,
            (1.0 - ndc.y) * 0.5 * self.height,
            clip.w,
        ))
    }

    /// On-screen size of a world-space length seen at `depth`.
    pub fn pixels(&self, size: f32, depth: f32) -> f32 {
        size * self.focal_px / depth.max(NEAR)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas
// ════════════════════════════════════════════════════════════════════════════

/// ARGB framebuffer with clipped drawing primitives.
pub struct Canvas {
    buf:    Vec<u32>,
    width:  usize,
    height: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Canvas { buf: vec![BG_COLOR; width * height], width, height }
    }

    pub fn pixels(&self) -> &[u32] { &self.buf }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.buf[y * self.width + x])
    }

    pub fn clear(&mut self, color: u32) {
        self.buf.fill(color);
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.buf[y as usize * self.width + x as usize] = color;
        }
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: u32, t: f32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            let i = y as usize * self.width + x as usize;
            self.buf[i] = blend(self.buf[i], color, t);
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u32) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(self.width as i32);
        let y1 = (y + h).min(self.height as i32);
        for row in y0..y1 {
            for col in x0..x1 {
                self.buf[row as usize * self.width + col as usize] = color;
            }
        }
    }

    /// Translucent square centred on `(cx, cy)`.
    fn splat(&mut self, cx: i32, cy: i32, r: i32, color: u32, opacity: f32) {
        for y in cy - r..=cy + r {
            for x in cx - r..=cx + r {
                self.blend_pixel(x, y, color, opacity);
            }
        }
    }

    pub fn draw_border(&mut self, x: i32, y: i32, w: i32, h: i32, color: u32) {
        if w <= 0 || h <= 0 {
            return;
        }
        for col in x..x + w {
            self.set_pixel(col, y, color);
            self.set_pixel(col, y + h - 1, color);
        }
        for row in y..y + h {
            self.set_pixel(x, row, color);
            self.set_pixel(x + w - 1, row, color);
        }
    }

    fn draw_diamond(&mut self, cx: i32, cy: i32, r: i32, color: u32) {
        for dy in -r..=r {
            let span = r - dy.abs();
            for dx in -span..=span {
                self.set_pixel(cx + dx, cy + dy, color);
            }
        }
    }

    fn draw_circle(&mut self, cx: i32, cy: i32, r: i32, color: u32) {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// 3×5 bitmap font, each glyph pixel drawn as a `scale`×`scale` block.
    pub fn draw_label(&mut self, text: &str, x: i32, y: i32, scale: i32, color: u32) {
        let scale = scale.max(1);
        let mut cx = x;
        for ch in text.chars() {
            for (row, &bits) in char_glyph(ch).iter().enumerate() {
                for col in 0..3 {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row as i32 * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale;
            if cx >= self.width as i32 {
                break;
            }
        }
    }

    /// Label centred horizontally on `cx`.
    fn draw_label_centered(&mut self, text: &str, cx: i32, y: i32, scale: i32, color: u32) {
        let w = text.chars().count() as i32 * 4 * scale.max(1);
        self.draw_label(text, cx - w / 2, y, scale, color);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Scene painting (window independent)
// ════════════════════════════════════════════════════════════════════════════

/// Paint one frame of `stage` into `canvas`.
pub fn paint(canvas: &mut Canvas, stage: &Stage, summary: &FrameSummary, status: &str) {
    canvas.clear(BG_COLOR);
    let cam = Camera::new(&summary.viewpoint, canvas.width, canvas.height);

    // ── Particles ─────────────────────────────────────────────────────────
    for (group, params) in stage.choreographer().groups().iter().zip(&summary.groups) {
        let rot = Mat3::from_rotation_y(params.rotation);
        for ((p, size), color) in group.positions().iter().zip(group.sizes()).zip(group.colors()) {
            let world = rot * (*p * params.scale);
            let Some((sx, sy, depth)) = cam.project(world) else { continue };
            let r = (cam.pixels(*size, depth) * 0.5).clamp(0.0, 6.0) as i32;
            canvas.splat(sx as i32, sy as i32, r, to_argb(*color), 0.7);
        }
    }

    // ── Decorations ───────────────────────────────────────────────────────
    let decor = &summary.decor;
    if let Some(title) = decor.title {
        if let Some((sx, sy, _)) = cam.project(Vec3::new(0.0, title.y, 0.0)) {
            let color = blend(BG_COLOR, TITLE_COLOR, title.opacity);
            canvas.draw_label_centered(TITLE_TEXT, sx as i32, sy as i32, 4, color);
        }
    }
    if let Some(balloon) = decor.balloon {
        if let Some((sx, sy, depth)) = cam.project(balloon.position) {
            let r = cam.pixels(3.0 * balloon.scale, depth) as i32;
            canvas.draw_circle(sx as i32, sy as i32, r.max(2), BALLOON_COLOR);
        }
    }
    if let Some(caption) = decor.caption {
        let color = blend(BG_COLOR, TEXT_COLOR, caption.opacity);
        let scale = (3.0 * caption.scale).round() as i32;
        canvas.draw_label_centered(CAPTION_TEXT, canvas.width as i32 / 2, 40, scale, color);
    }
    for flame in &decor.flames {
        if let Some((sx, sy, depth)) = cam.project(flame.position) {
            let r = cam.pixels(1.2 * flame.scale, depth) as i32;
            let color = blend(BG_COLOR, FLAME_COLOR, flame.opacity);
            canvas.draw_diamond(sx as i32, sy as i32, r.max(1), color);
        }
    }

    // ── Photos, far to near ───────────────────────────────────────────────
    let items = stage.carousel().items();
    let mut order: Vec<usize> = (0..items.len()).filter(|&i| items[i].visible).collect();
    order.sort_by(|&a, &b| items[a].position.z.total_cmp(&items[b].position.z));
    for i in order {
        let item = &items[i];
        let Some((sx, sy, depth)) = cam.project(item.position) else { continue };
        let w = cam.pixels(item.scale.x, depth) as i32;
        let h = cam.pixels(item.scale.y, depth) as i32;
        if w < 2 || h < 2 {
            continue;
        }
        let (x, y) = (sx as i32 - w / 2, sy as i32 - h / 2);
        canvas.fill_rect(x, y, w, h, PHOTO_TINTS[i % PHOTO_TINTS.len()]);
        canvas.draw_border(x, y, w, h, FRAME_COLOR);
        if i == summary.selected {
            canvas.draw_border(x - 2, y - 2, w + 4, h + 4, SELECT_COLOR);
        }
    }

    // ── Status bar ────────────────────────────────────────────────────────
    canvas.fill_rect(0, STATUS_Y as i32, canvas.width as i32, STATUS_H as i32, STATUS_BG);
    canvas.draw_label(status, 8, STATUS_Y as i32 + 4, 2, TEXT_COLOR);
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    canvas: Canvas,
    sim_tx: Sender<SimInput>,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self, SceneError> {
        let mut window = Window::new(
            "Party Scene - hand gestures",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| SceneError::Window(e.to_string()))?;

        window.limit_update_rate(Some(Duration::from_millis(16))); // ~60fps

        Ok(Visualizer { window, canvas: Canvas::new(WIN_W, WIN_H), sim_tx })
    }

    /// Returns false when the window should close.
    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll keyboard inputs and translate to SimInput events.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let held     = |k: Key| self.window.is_key_down(k);

        if one_shot(Key::Q) || one_shot(Key::Escape) {
            let _ = self.sim_tx.send(SimInput::KeyDown(SimKey::Quit));
            return false;
        }

        let presses = [
            (Key::F, SimKey::Fist),
            (Key::O, SimKey::OpenPalm),
            (Key::P, SimKey::Pinch),
            (Key::H, SimKey::Heart),
            (Key::N, SimKey::NoHands),
        ];
        let mut keys: Vec<SimKey> = presses
            .iter()
            .filter(|(k, _)| one_shot(*k))
            .map(|&(_, s)| s)
            .collect();
        if held(Key::Left)  { keys.push(SimKey::MoveLeft); }
        if held(Key::Right) { keys.push(SimKey::MoveRight); }

        for key in keys {
            let _ = self.sim_tx.send(SimInput::KeyDown(key));
        }
        true
    }

    /// Render one frame.
    pub fn render(&mut self, stage: &Stage, summary: &FrameSummary, status: &str) -> Result<(), SceneError> {
        paint(&mut self.canvas, stage, summary, status);
        self.window
            .update_with_buffer(self.canvas.pixels(), WIN_W, WIN_H)
            .map_err(|e| SceneError::Window(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Colour helpers and the 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

/// Linear RGB in `[0, 1]` (values above 1 saturate) to opaque ARGB.
fn to_argb(c: Vec3) -> u32 {
    let ch = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    0xFF000000 | (ch(c.x) << 16) | (ch(c.y) << 8) | ch(c.z)
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let mix = |shift: u32| {
        let ca = ((a >> shift) & 0xFF) as f32;
        let cb = ((b >> shift) & 0xFF) as f32;
        ((ca * (1.0 - t) + cb * t).round() as u32) << shift
    };
    0xFF000000 | mix(16) | mix(8) | mix(0)
}

fn char_glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '|' => [0b010, 0b010, 0b010, 0b010, 0b010],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
