//! Game loop.
//!
//! A [`Game`] owns every component (draw manager, viewport, tile map, event
//! router) plus the host's clock and frame scheduler. It lives behind a
//! [`GameHandle`] so that host callbacks (frame, image load, load timeout,
//! input) can reach it. Those callbacks hold a weak handle; if the game is
//! already borrowed when one fires, the event is queued and replayed at the
//! end of whichever entry point holds the borrow.
//!
//! Per tick: compute the scaled delta, pan the viewport, advance and redraw
//! animations (which ends with the transient-layer wipe), then call user
//! hooks in registration order, then ask for the next frame.
//!
//! Hooks run while the game is borrowed, so they steer the loop through
//! [`FrameContext::control`]. Requests queue there and are applied as soon
//! as the tick or the input dispatch that raised them returns.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use log::{debug, info, warn};

use crate::config::GameConfig;
use crate::draw::{DrawManager, DrawSurface};
use crate::error::{ConfigError, DrawError, GameError};
use crate::events::{Capabilities, EventRouter, HookRef};
use crate::geom::Size;
use crate::input::{InputAdapter, InputFrame, InputSink, InputState, RawInput};
use crate::map::TileMap;
use crate::resources::{ImageLoader, LoadEvent, LoadReport, LoadSink, ResourceRegistry, TimeoutSink};
use crate::surface::{Persistence, Placement, Surface, SurfaceFactory};
use crate::viewport::{ScrollArea, Viewport};

/// Monotonic wall clock in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Host per-frame callback mechanism (`requestAnimationFrame` in a browser).
pub trait FrameScheduler {
    /// Call `callback` once, at the next frame.
    fn request_frame(&mut self, callback: Rc<dyn Fn()>);
}

/// Everything a game needs from its host.
pub struct Host<S: Surface> {
    pub surfaces: Box<dyn SurfaceFactory<S>>,
    pub images: Box<dyn ImageLoader<S::Image>>,
    pub scroll: Box<dyn ScrollArea>,
    pub input: Box<dyn InputAdapter>,
    pub clock: Box<dyn Clock>,
    pub scheduler: Box<dyn FrameScheduler>,
}

/// Borrowed view of the game handed to hooks.
pub struct FrameContext<'a, S: Surface> {
    pub config: &'a GameConfig,
    pub draw: &'a mut DrawManager<S>,
    pub viewport: &'a mut Viewport,
    pub map: &'a mut TileMap,
    pub input: &'a InputState,
    pub control: &'a mut GameControl<S>,
}

enum GameCommand<S: Surface> {
    Pause,
    Unpause,
    SetSpeed(f64),
    AddHook(HookRef<S>),
    AddEventHook(HookRef<S>),
    RemoveHook(HookRef<S>),
}

/// Loop changes requested from inside a hook.
pub struct GameControl<S: Surface> {
    commands: Vec<GameCommand<S>>,
}

impl<S: Surface> Default for GameControl<S> {
    fn default() -> Self {
        Self { commands: Vec::new() }
    }
}

impl<S: Surface> GameControl<S> {
    pub fn pause(&mut self) {
        self.commands.push(GameCommand::Pause);
    }

    pub fn unpause(&mut self) {
        self.commands.push(GameCommand::Unpause);
    }

    /// Invalid multipliers are logged and ignored when applied.
    pub fn set_speed(&mut self, multiplier: f64) {
        self.commands.push(GameCommand::SetSpeed(multiplier));
    }

    /// Register a per-tick hook. It first ticks on the next frame.
    pub fn add_hook(&mut self, hook: HookRef<S>) {
        self.commands.push(GameCommand::AddHook(hook));
    }

    pub fn add_event_hook(&mut self, hook: HookRef<S>) {
        self.commands.push(GameCommand::AddEventHook(hook));
    }

    /// Drop `hook` from both lists. A hook may pass itself.
    pub fn remove_hook(&mut self, hook: HookRef<S>) {
        self.commands.push(GameCommand::RemoveHook(hook));
    }

    /// Requests not yet applied.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.commands.len()
    }

    fn take(&mut self) -> Vec<GameCommand<S>> {
        std::mem::take(&mut self.commands)
    }
}

pub type GameHandle<S> = Rc<RefCell<Game<S>>>;

/// Called once when image loading finishes, after the first tick.
pub type ReadyCallback<S> = Box<dyn FnOnce(&GameHandle<S>, &LoadReport)>;

/// Host event waiting for the game to become available.
enum Deferred<I> {
    Frame,
    Input(RawInput),
    Load(LoadEvent<I>),
    Timeout(u64),
}

type DeferredQueue<I> = Rc<RefCell<VecDeque<Deferred<I>>>>;

/// Deliver `event` to the game now if it is free, otherwise queue it.
fn enqueue<S: Surface + 'static>(
    weak: &Weak<RefCell<Game<S>>>,
    queue: &DeferredQueue<S::Image>,
    event: Deferred<S::Image>,
) {
    let Some(handle) = weak.upgrade() else {
        return;
    };
    let ready = match handle.try_borrow_mut() {
        Ok(mut game) => game.process_all(event),
        Err(_) => {
            queue.borrow_mut().push_back(event);
            return;
        }
    };
    if let Some((callback, report)) = ready {
        callback(&handle, &report);
    }
}

pub struct Game<S: Surface + 'static> {
    config: GameConfig,
    draw: DrawManager<S>,
    viewport: Viewport,
    map: TileMap,
    router: EventRouter<S>,
    hooks: Vec<HookRef<S>>,
    control: GameControl<S>,
    clock: Box<dyn Clock>,
    scheduler: Box<dyn FrameScheduler>,

    started: bool,
    paused: bool,
    time_ms: f64,
    time_started_ms: f64,
    frame_pending: bool,
    ticks: u64,

    on_ready: Option<ReadyCallback<S>>,
    ready: Option<(ReadyCallback<S>, LoadReport)>,
    last_report: Option<LoadReport>,

    deferred: DeferredQueue<S::Image>,
    frame_callback: Rc<dyn Fn()>,
    load_sink: LoadSink<S::Image>,
    timeout_sink: TimeoutSink,
}

impl<S: Surface + 'static> Game<S> {
    /// Build a game over `host` and connect its input adapter.
    ///
    /// # Errors
    ///
    /// [`GameError::Config`] if `config` does not validate,
    /// [`GameError::Input`] if the input adapter cannot attach.
    pub fn new(config: GameConfig, host: Host<S>) -> Result<GameHandle<S>, GameError> {
        config.validate()?;
        let Host { surfaces, images, scroll, input, clock, scheduler } = host;
        let deferred: DeferredQueue<S::Image> = Rc::new(RefCell::new(VecDeque::new()));

        let mut input_sink: Option<InputSink> = None;
        let handle = Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let frame_callback: Rc<dyn Fn()> = {
                let (weak, queue) = (weak.clone(), Rc::clone(&deferred));
                Rc::new(move || enqueue(&weak, &queue, Deferred::Frame))
            };
            let load_sink: LoadSink<S::Image> = {
                let (weak, queue) = (weak.clone(), Rc::clone(&deferred));
                Rc::new(move |event| enqueue(&weak, &queue, Deferred::Load(event)))
            };
            let timeout_sink: TimeoutSink = {
                let (weak, queue) = (weak.clone(), Rc::clone(&deferred));
                Rc::new(move |generation| enqueue(&weak, &queue, Deferred::Timeout(generation)))
            };
            let on_input: InputSink = {
                let (weak, queue) = (weak.clone(), Rc::clone(&deferred));
                Rc::new(move |raw| enqueue(&weak, &queue, Deferred::Input(raw)))
            };
            input_sink = Some(on_input);

            let surface = DrawSurface::new(&config, surfaces, ResourceRegistry::new(images));
            RefCell::new(Self {
                draw: DrawManager::new(&config, surface),
                viewport: Viewport::new(&config, scroll),
                map: TileMap::new(&config),
                router: EventRouter::new(input),
                hooks: Vec::new(),
                control: GameControl::default(),
                clock,
                scheduler,
                started: false,
                paused: false,
                time_ms: 0.0,
                time_started_ms: 0.0,
                frame_pending: false,
                ticks: 0,
                on_ready: None,
                ready: None,
                last_report: None,
                deferred: Rc::clone(&deferred),
                frame_callback,
                load_sink,
                timeout_sink,
                config,
            })
        });

        if let Some(sink) = input_sink {
            handle.borrow_mut().router.connect(sink)?;
        }
        info!("game: created ({}x{} view)", handle.borrow().config.view_width, handle.borrow().config.view_height);
        Ok(handle)
    }

    // --- Lifecycle ---

    /// Start the clock, size the viewport and load every queued image. The
    /// first tick runs once loading completes, then `on_ready` is called.
    ///
    /// # Errors
    ///
    /// [`GameError::Busy`] if the game is already borrowed.
    pub fn start(handle: &GameHandle<S>, on_ready: Option<ReadyCallback<S>>) -> Result<(), GameError> {
        let ready = {
            let mut game = handle.try_borrow_mut().map_err(|_| GameError::Busy)?;
            game.begin(on_ready);
            game.drain();
            game.ready.take()
        };
        if let Some((callback, report)) = ready {
            callback(handle, &report);
        }
        Ok(())
    }

    fn begin(&mut self, on_ready: Option<ReadyCallback<S>>) {
        if self.started {
            warn!("game: start called twice");
            return;
        }
        let now = self.clock.now_ms();
        self.time_ms = now;
        self.time_started_ms = now;
        self.started = true;
        self.on_ready = on_ready;
        self.viewport.start();

        let sink = Rc::clone(&self.load_sink);
        let on_timeout = Rc::clone(&self.timeout_sink);
        let timeout_ms = self.config.load_timeout_ms;
        let report = self.draw.surface_mut().resources_mut().begin_load(sink, timeout_ms, on_timeout);
        if let Some(report) = report {
            self.finish_load(report);
        }
    }

    /// Stop ticking until [`Self::unpause`].
    pub fn pause(&mut self) {
        if self.started && !self.paused {
            self.paused = true;
            info!("game: paused");
        }
    }

    /// Resume ticking. The delta baseline is reset so the paused interval
    /// does not count as game time.
    pub fn unpause(&mut self) {
        if self.started && self.paused {
            self.time_ms = self.clock.now_ms();
            self.paused = false;
            info!("game: resumed");
            if self.is_running() {
                self.request_frame();
            }
        }
    }

    /// Change the game speed multiplier.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `multiplier` is negative or not finite.
    pub fn set_speed(&mut self, multiplier: f64) -> Result<(), ConfigError> {
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(ConfigError::Invalid {
                field: "game_speed",
                reason: format!("must not be negative, got {multiplier}"),
            });
        }
        self.config.game_speed = multiplier;
        Ok(())
    }

    // --- Tick ---

    /// Whether ticks run: started, resources loaded and not paused.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started && !self.paused && self.last_report.is_some()
    }

    fn on_frame(&mut self) {
        self.frame_pending = false;
        self.update();
    }

    /// Run a tick if the game is running, then schedule the next frame.
    pub fn update(&mut self) {
        self.apply_commands();
        if !self.is_running() {
            return;
        }
        let now = self.clock.now_ms();
        let delta = (now - self.time_ms).max(0.0) * self.config.game_speed;
        self.time_ms = now;
        self.tick(delta);
        self.apply_commands();
        if self.is_running() {
            self.request_frame();
        }
    }

    fn tick(&mut self, delta_ms: f64) {
        self.ticks += 1;
        self.viewport.update(self.router.state().cursor);
        self.draw.update(delta_ms);

        let mut ctx = FrameContext {
            config: &self.config,
            draw: &mut self.draw,
            viewport: &mut self.viewport,
            map: &mut self.map,
            input: self.router.state(),
            control: &mut self.control,
        };
        for hook in &self.hooks {
            match hook.try_borrow_mut() {
                Ok(mut hook) => hook.update(&mut ctx, delta_ms),
                Err(_) => debug!("game: hook busy, skipping update"),
            }
        }
    }

    fn request_frame(&mut self) {
        if self.frame_pending {
            return;
        }
        self.frame_pending = true;
        self.scheduler.request_frame(Rc::clone(&self.frame_callback));
    }

    // --- Host events ---

    /// Fold a host input event into the input state and dispatch it.
    pub fn handle_input(&mut self, raw: RawInput) {
        match &raw {
            RawInput::Resize { width, height } => {
                let window = Size::new(*width, *height);
                if self.viewport.resize(window) {
                    self.draw.resize_view(window);
                }
            }
            RawInput::PointerLockChange { locked } => self.viewport.set_pointer_lock(*locked),
            _ => {}
        }

        let frame = self.input_frame();
        let Some(event) = self.router.normalize(raw, &frame) else {
            return;
        };
        let mut ctx = FrameContext {
            config: &self.config,
            draw: &mut self.draw,
            viewport: &mut self.viewport,
            map: &mut self.map,
            input: self.router.state(),
            control: &mut self.control,
        };
        self.router.dispatch(&event, &mut ctx);
        self.apply_commands();
    }

    fn apply_commands(&mut self) {
        for command in self.control.take() {
            match command {
                GameCommand::Pause => self.pause(),
                GameCommand::Unpause => self.unpause(),
                GameCommand::SetSpeed(multiplier) => {
                    if let Err(e) = self.set_speed(multiplier) {
                        warn!("game: speed change ignored: {e}");
                    }
                }
                GameCommand::AddHook(hook) => {
                    self.add_hook(hook);
                }
                GameCommand::AddEventHook(hook) => self.add_event_hook(hook),
                GameCommand::RemoveHook(hook) => {
                    self.remove_hook(&hook);
                }
            }
        }
    }

    fn input_frame(&self) -> InputFrame {
        InputFrame {
            view: self.viewport.view_size(),
            area: self.viewport.area_size(),
            tile: self.config.tile_size(),
            pan: self.viewport.pan(),
            cursor_speed: self.config.cursor_speed,
        }
    }

    /// An image finished loading.
    pub fn image_loaded(&mut self, name: &str, image: S::Image) {
        if let Some(report) = self.draw.surface_mut().resources_mut().on_loaded(name, image) {
            self.finish_load(report);
        }
    }

    /// An image failed to load.
    pub fn image_failed(&mut self, name: &str) {
        if let Some(report) = self.draw.surface_mut().resources_mut().on_failed(name) {
            self.finish_load(report);
        }
    }

    /// The load timeout for load `generation` fired.
    pub fn load_timed_out(&mut self, generation: u64) {
        let after_ms = self.config.load_timeout_ms;
        if let Some(report) = self.draw.surface_mut().resources_mut().on_timeout(generation, after_ms) {
            self.finish_load(report);
        }
    }

    fn finish_load(&mut self, report: LoadReport) {
        info!("game: resources ready, starting loop");
        self.last_report = Some(report.clone());
        // Loading time is not game time.
        self.time_ms = self.clock.now_ms();
        self.update();
        if let Some(callback) = self.on_ready.take() {
            self.ready = Some((callback, report));
        }
    }

    fn process(&mut self, event: Deferred<S::Image>) {
        match event {
            Deferred::Frame => self.on_frame(),
            Deferred::Input(raw) => self.handle_input(raw),
            Deferred::Load(LoadEvent::Loaded { name, image }) => self.image_loaded(&name, image),
            Deferred::Load(LoadEvent::Failed { name }) => self.image_failed(&name),
            Deferred::Timeout(generation) => self.load_timed_out(generation),
        }
    }

    /// Replay events that arrived while the game was borrowed.
    fn drain(&mut self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            self.process(event);
        }
    }

    fn process_all(&mut self, event: Deferred<S::Image>) -> Option<(ReadyCallback<S>, LoadReport)> {
        self.process(event);
        self.drain();
        self.ready.take()
    }

    // --- Hooks ---

    /// Register a per-tick hook. Hooks that do not declare
    /// [`Capabilities::UPDATE`] are rejected and never ticked.
    pub fn add_hook(&mut self, hook: HookRef<S>) -> bool {
        let accepted = hook.try_borrow().is_ok_and(|h| h.capabilities().contains(Capabilities::UPDATE));
        if accepted {
            self.hooks.push(hook);
        } else {
            debug!("game: hook without update rejected");
        }
        accepted
    }

    /// Register a hook for input events.
    pub fn add_event_hook(&mut self, hook: HookRef<S>) {
        self.router.add_hook(hook);
    }

    /// Remove `hook` from both the tick and event lists. Returns whether it
    /// was registered anywhere.
    pub fn remove_hook(&mut self, hook: &HookRef<S>) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| !Rc::ptr_eq(h, hook));
        let removed_update = self.hooks.len() != before;
        let removed_event = self.router.remove_hook(hook);
        removed_update || removed_event
    }

    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    // --- Setup shortcuts ---

    /// # Errors
    ///
    /// [`DrawError::Surface`] if the host cannot create the surface.
    pub fn add_layer(&mut self, name: &str, placement: Placement, persistence: Persistence) -> Result<(), DrawError> {
        self.draw.surface_mut().add_layer(name, placement, persistence)
    }

    pub fn add_image(&mut self, name: &str, source: &str) {
        self.draw.surface_mut().resources_mut().add_image(name, source);
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `columns` or `rows` is zero.
    pub fn add_sprite(&mut self, name: &str, source: &str, columns: usize, rows: usize) -> Result<(), ConfigError> {
        self.draw.surface_mut().resources_mut().add_sprite(name, source, columns, rows)
    }

    /// Ask the host to capture the pointer.
    pub fn request_pointer_lock(&mut self) -> bool {
        self.router.request_pointer_lock()
    }

    /// Borrow every component at once, e.g. to load a map before starting.
    pub fn context(&mut self) -> FrameContext<'_, S> {
        FrameContext {
            config: &self.config,
            draw: &mut self.draw,
            viewport: &mut self.viewport,
            map: &mut self.map,
            input: self.router.state(),
            control: &mut self.control,
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub fn draw(&self) -> &DrawManager<S> {
        &self.draw
    }

    pub fn draw_mut(&mut self) -> &mut DrawManager<S> {
        &mut self.draw
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    #[must_use]
    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut TileMap {
        &mut self.map
    }

    #[must_use]
    pub fn input(&self) -> &InputState {
        self.router.state()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a frame callback is outstanding.
    #[must_use]
    pub fn is_frame_pending(&self) -> bool {
        self.frame_pending
    }

    /// Ticks run since start.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Wall-clock time since [`Self::start`].
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        if self.started { self.clock.now_ms() - self.time_started_ms } else { 0.0 }
    }

    /// Report of the most recent completed load.
    #[must_use]
    pub fn last_report(&self) -> Option<&LoadReport> {
        self.last_report.as_ref()
    }
}
