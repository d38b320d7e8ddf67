//! In-memory host doubles shared by the unit tests.
//!
//! `PixelSurface` keeps a sparse pixel map and honours the save/restore
//! transform stack, so a rotated draw followed by the matching rotated clear
//! can be checked pixel for pixel. The other doubles record what the game
//! asked of its host and let a test fire the callbacks by hand.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::GameConfig;
use crate::draw::{DrawManager, DrawSurface};
use crate::engine::{Clock, FrameScheduler, Host};
use crate::error::{InputError, SurfaceError};
use crate::geom::{Point, Rect, Size};
use crate::input::{InputAdapter, InputSink, RawInput};
use crate::resources::{ImageLoader, LoadEvent, LoadSink, ResourceRegistry};
use crate::surface::{ImageSource, Placement, Surface, SurfaceFactory};
use crate::viewport::ScrollArea;

/// Value written by `fill_rect`.
pub const FILL: u32 = 0xF111;

// =============================================================
// Images and surfaces
// =============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestImage {
    pub id: u32,
    pub size: Size,
}

impl TestImage {
    pub fn new(id: u32, width: f64, height: f64) -> Self {
        Self { id, size: Size::new(width, height) }
    }
}

impl ImageSource for TestImage {
    fn size(&self) -> Size {
        self.size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Save,
    Restore,
    Translate(f64, f64),
    Rotate(f64),
    DrawImage { image: u32, src: Rect, dst: Rect },
    ClearRect(Rect),
    FillRect { rect: Rect, color: String, alpha: f64 },
    StrokeRect { rect: Rect, color: String, line_width: f64 },
    FillText { text: String, x: f64, y: f64, color: String, font: String },
    Smoothing(bool),
    Resize(Size),
}

/// Canvas transform `[a, b, c, d, e, f]`: `(x, y) -> (a x + c y + e, b x + d y + f)`.
#[derive(Debug, Clone, Copy)]
struct Affine([f64; 6]);

impl Affine {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn apply(self, p: Point) -> Point {
        let [a, b, c, d, e, f] = self.0;
        Point::new(a * p.x + c * p.y + e, b * p.x + d * p.y + f)
    }

    fn invert(self, p: Point) -> Point {
        let [a, b, c, d, e, f] = self.0;
        let det = a * d - b * c;
        let (x, y) = (p.x - e, p.y - f);
        Point::new((d * x - c * y) / det, (a * y - b * x) / det)
    }

    fn translate(self, tx: f64, ty: f64) -> Self {
        let [a, b, c, d, e, f] = self.0;
        Self([a, b, c, d, a * tx + c * ty + e, b * tx + d * ty + f])
    }

    fn rotate(self, r: f64) -> Self {
        let [a, b, c, d, e, f] = self.0;
        let (sin, cos) = r.sin_cos();
        Self([a * cos + c * sin, b * cos + d * sin, c * cos - a * sin, d * cos - b * sin, e, f])
    }
}

pub struct PixelSurface {
    size: Size,
    pixels: HashMap<(i64, i64), u32>,
    transform: Affine,
    stack: Vec<Affine>,
    pub ops: Vec<Op>,
    pub smoothing: bool,
    /// Make `draw_image` fail.
    pub fail_draws: bool,
}

impl PixelSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            pixels: HashMap::new(),
            transform: Affine::IDENTITY,
            stack: Vec::new(),
            ops: Vec::new(),
            smoothing: true,
            fail_draws: false,
        }
    }

    /// Write `value` to every pixel whose center falls inside `rect` under
    /// the current transform. `0` erases.
    #[allow(clippy::cast_possible_truncation)]
    fn paint(&mut self, rect: Rect, value: u32) {
        let corners = [
            Point::new(rect.x, rect.y),
            Point::new(rect.x + rect.width, rect.y),
            Point::new(rect.x, rect.y + rect.height),
            Point::new(rect.x + rect.width, rect.y + rect.height),
        ]
        .map(|p| self.transform.apply(p));
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min).floor().max(0.0) as i64;
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min).floor().max(0.0) as i64;
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max).ceil().min(self.size.width) as i64;
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max).ceil().min(self.size.height) as i64;

        for py in min_y..max_y {
            for px in min_x..max_x {
                #[allow(clippy::cast_precision_loss)]
                let center = Point::new(px as f64 + 0.5, py as f64 + 0.5);
                if rect.contains(self.transform.invert(center)) {
                    if value == 0 {
                        self.pixels.remove(&(px, py));
                    } else {
                        self.pixels.insert((px, py), value);
                    }
                }
            }
        }
    }

    pub fn pixel(&self, x: i64, y: i64) -> u32 {
        self.pixels.get(&(x, y)).copied().unwrap_or(0)
    }

    pub fn painted(&self) -> usize {
        self.pixels.len()
    }

    /// Painted pixels whose center lies in `rect` (device space).
    #[allow(clippy::cast_precision_loss)]
    pub fn painted_in(&self, rect: Rect) -> usize {
        self.pixels
            .keys()
            .filter(|(x, y)| rect.contains(Point::new(*x as f64 + 0.5, *y as f64 + 0.5)))
            .count()
    }

    /// Whether save and restore calls are balanced.
    pub fn balanced(&self) -> bool {
        self.stack.is_empty()
    }
}

impl Surface for PixelSurface {
    type Image = TestImage;

    fn save(&mut self) {
        self.stack.push(self.transform);
        self.ops.push(Op::Save);
    }

    fn restore(&mut self) {
        if let Some(t) = self.stack.pop() {
            self.transform = t;
        }
        self.ops.push(Op::Restore);
    }

    fn translate(&mut self, x: f64, y: f64) -> Result<(), SurfaceError> {
        self.transform = self.transform.translate(x, y);
        self.ops.push(Op::Translate(x, y));
        Ok(())
    }

    fn rotate(&mut self, radians: f64) -> Result<(), SurfaceError> {
        self.transform = self.transform.rotate(radians);
        self.ops.push(Op::Rotate(radians));
        Ok(())
    }

    fn draw_image(&mut self, image: &TestImage, src: Rect, dst: Rect) -> Result<(), SurfaceError> {
        if self.fail_draws {
            return Err(SurfaceError::Canvas("draw rejected".into()));
        }
        self.paint(dst, image.id);
        self.ops.push(Op::DrawImage { image: image.id, src, dst });
        Ok(())
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.paint(rect, 0);
        self.ops.push(Op::ClearRect(rect));
    }

    fn fill_rect(&mut self, rect: Rect, color: &str, alpha: f64) {
        self.paint(rect, FILL);
        self.ops.push(Op::FillRect { rect, color: color.into(), alpha });
    }

    fn stroke_rect(&mut self, rect: Rect, color: &str, line_width: f64) {
        self.ops.push(Op::StrokeRect { rect, color: color.into(), line_width });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: &str, font: &str) -> Result<(), SurfaceError> {
        self.ops.push(Op::FillText { text: text.into(), x, y, color: color.into(), font: font.into() });
        Ok(())
    }

    fn set_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled;
        self.ops.push(Op::Smoothing(enabled));
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
        self.pixels.clear();
        self.ops.push(Op::Resize(size));
    }

    fn size(&self) -> Size {
        self.size
    }
}

/// Surfaces created so far, shared with the test.
pub type Created = Rc<RefCell<Vec<(String, Placement, Size)>>>;

#[derive(Default)]
pub struct PixelFactory {
    pub created: Created,
    pub fail: bool,
}

impl SurfaceFactory<PixelSurface> for PixelFactory {
    fn create(&mut self, name: &str, placement: Placement, size: Size) -> Result<PixelSurface, SurfaceError> {
        if self.fail {
            return Err(SurfaceError::Create(name.to_owned()));
        }
        self.created.borrow_mut().push((name.to_owned(), placement, size));
        Ok(PixelSurface::new(size))
    }
}

// =============================================================
// Image loading
// =============================================================

#[derive(Default)]
pub struct LoaderLog {
    pub requests: Vec<(String, String)>,
    pub sink: Option<LoadSink<TestImage>>,
    pub timeout: Option<(u32, Box<dyn FnOnce()>)>,
}

/// Loader that records requests; the test reports outcomes via [`LoaderHandle`].
#[derive(Default)]
pub struct RecordingLoader {
    log: Rc<RefCell<LoaderLog>>,
}

#[derive(Clone)]
pub struct LoaderHandle {
    log: Rc<RefCell<LoaderLog>>,
}

impl RecordingLoader {
    pub fn new() -> (Self, LoaderHandle) {
        let log = Rc::new(RefCell::new(LoaderLog::default()));
        (Self { log: Rc::clone(&log) }, LoaderHandle { log })
    }
}

impl ImageLoader<TestImage> for RecordingLoader {
    fn load(&mut self, name: &str, source: &str, sink: LoadSink<TestImage>) {
        let mut log = self.log.borrow_mut();
        log.requests.push((name.to_owned(), source.to_owned()));
        log.sink = Some(sink);
    }

    fn arm_timeout(&mut self, ms: u32, on_timeout: Box<dyn FnOnce()>) {
        self.log.borrow_mut().timeout = Some((ms, on_timeout));
    }
}

impl LoaderHandle {
    pub fn requests(&self) -> Vec<(String, String)> {
        self.log.borrow().requests.clone()
    }

    pub fn timeout_ms(&self) -> Option<u32> {
        self.log.borrow().timeout.as_ref().map(|(ms, _)| *ms)
    }

    fn send(&self, event: LoadEvent<TestImage>) {
        let sink = self.log.borrow().sink.clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub fn succeed(&self, name: &str, image: TestImage) {
        self.send(LoadEvent::Loaded { name: name.to_owned(), image });
    }

    pub fn fail(&self, name: &str) {
        self.send(LoadEvent::Failed { name: name.to_owned() });
    }

    /// Fire the armed timeout, if any. Returns whether one was armed.
    pub fn fire_timeout(&self) -> bool {
        let armed = self.log.borrow_mut().timeout.take();
        match armed {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }
}

// =============================================================
// Viewport
// =============================================================

#[derive(Debug, Default)]
pub struct ScrollLog {
    pub moves: Vec<(f64, f64)>,
    pub view: Option<(Size, bool)>,
    pub area: Option<Size>,
}

#[derive(Default)]
pub struct RecordingScroll {
    pub log: Rc<RefCell<ScrollLog>>,
}

impl ScrollArea for RecordingScroll {
    fn move_to(&mut self, x: f64, y: f64) {
        self.log.borrow_mut().moves.push((x, y));
    }

    fn set_view_size(&mut self, view: Size, fullscreen: bool) {
        self.log.borrow_mut().view = Some((view, fullscreen));
    }

    fn set_area_size(&mut self, area: Size) {
        self.log.borrow_mut().area = Some(area);
    }
}

// =============================================================
// Time
// =============================================================

#[derive(Clone, Default)]
pub struct ManualClock(pub Rc<Cell<f64>>);

impl ManualClock {
    pub fn advance(&self, ms: f64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.0.get()
    }
}

#[derive(Default)]
pub struct SchedulerLog {
    pub requests: usize,
    pub pending: Option<Rc<dyn Fn()>>,
}

/// Scheduler that holds the requested frame until the test fires it.
#[derive(Default, Clone)]
pub struct ManualScheduler {
    pub log: Rc<RefCell<SchedulerLog>>,
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self, callback: Rc<dyn Fn()>) {
        let mut log = self.log.borrow_mut();
        log.requests += 1;
        log.pending = Some(callback);
    }
}

impl ManualScheduler {
    pub fn requests(&self) -> usize {
        self.log.borrow().requests
    }

    pub fn has_pending(&self) -> bool {
        self.log.borrow().pending.is_some()
    }

    /// Run the pending frame callback. Returns whether there was one.
    pub fn fire(&self) -> bool {
        let pending = self.log.borrow_mut().pending.take();
        match pending {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

// =============================================================
// Input
// =============================================================

#[derive(Default)]
pub struct InputLog {
    pub sink: Option<InputSink>,
    pub connected: bool,
    pub lock_requests: usize,
    pub lock_unsupported: bool,
    pub fail_connect: bool,
}

#[derive(Default, Clone)]
pub struct ScriptedInput {
    pub log: Rc<RefCell<InputLog>>,
}

impl InputAdapter for ScriptedInput {
    fn connect(&mut self, sink: InputSink) -> Result<(), InputError> {
        let mut log = self.log.borrow_mut();
        if log.fail_connect {
            return Err(InputError::Attach("scripted failure".into()));
        }
        log.sink = Some(sink);
        log.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut log = self.log.borrow_mut();
        log.sink = None;
        log.connected = false;
    }

    fn request_pointer_lock(&mut self) -> Result<(), InputError> {
        let mut log = self.log.borrow_mut();
        log.lock_requests += 1;
        if log.lock_unsupported { Err(InputError::PointerLockUnsupported) } else { Ok(()) }
    }
}

impl ScriptedInput {
    /// Deliver `raw` through the connected sink. Returns whether one was connected.
    pub fn send(&self, raw: RawInput) -> bool {
        let sink = self.log.borrow().sink.clone();
        match sink {
            Some(sink) => {
                sink(raw);
                true
            }
            None => false,
        }
    }
}

// =============================================================
// Assemblies
// =============================================================

/// Draw surface over pixel surfaces with images loaded through a recording loader.
pub fn draw_surface(config: &GameConfig) -> (DrawSurface<PixelSurface>, LoaderHandle) {
    let (loader, handle) = RecordingLoader::new();
    let surface = DrawSurface::new(config, Box::new(PixelFactory::default()), ResourceRegistry::new(Box::new(loader)));
    (surface, handle)
}

pub fn draw_manager(config: &GameConfig) -> DrawManager<PixelSurface> {
    let (surface, _loader) = draw_surface(config);
    DrawManager::new(config, surface)
}

/// Handles on every host double behind a [`Host`].
pub struct HostDoubles {
    pub created: Created,
    pub loader: LoaderHandle,
    pub scroll: Rc<RefCell<ScrollLog>>,
    pub input: ScriptedInput,
    pub clock: ManualClock,
    pub scheduler: ManualScheduler,
}

pub fn host() -> (Host<PixelSurface>, HostDoubles) {
    let factory = PixelFactory::default();
    let (loader, loader_handle) = RecordingLoader::new();
    let scroll = RecordingScroll::default();
    let input = ScriptedInput::default();
    let clock = ManualClock::default();
    let scheduler = ManualScheduler::default();
    let doubles = HostDoubles {
        created: Rc::clone(&factory.created),
        loader: loader_handle,
        scroll: Rc::clone(&scroll.log),
        input: input.clone(),
        clock: clock.clone(),
        scheduler: scheduler.clone(),
    };
    let host = Host {
        surfaces: Box::new(factory),
        images: Box::new(loader),
        scroll: Box::new(scroll),
        input: Box::new(input),
        clock: Box::new(clock),
        scheduler: Box::new(scheduler),
    };
    (host, doubles)
}
