//! Browser host: `web-sys` implementations of the host traits.
//!
//! This module is the only place that touches the DOM. Every fallible
//! `web-sys` call is converted to a crate error at this boundary; nothing
//! here panics.
//!
//! Page layout built by [`mount`]:
//!
//! ```text
//! #<id>            view window (fixed size, overflow hidden)
//!   #<id>_area     scrollable game area, moved by the viewport
//!     <canvas>     background layers
//!   #<id>_overlay  view-sized overlay
//!     <canvas>     overlay layers
//! ```

#[cfg(test)]
#[path = "web_test.rs"]
mod web_test;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use log::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use web_sys::{
    CanvasRenderingContext2d, Document, Event, EventTarget, HtmlCanvasElement, HtmlElement, HtmlImageElement,
    KeyboardEvent, MouseEvent, WheelEvent, Window,
};

use crate::config::GameConfig;
use crate::engine::{Clock, FrameScheduler, Game, GameHandle, Host};
use crate::error::{GameError, InputError, SurfaceError};
use crate::geom::{Rect, Size};
use crate::input::{Button, InputAdapter, InputSink, Key, Modifiers, RawInput};
use crate::resources::{ImageLoader, LoadEvent, LoadSink};
use crate::surface::{ImageSource, Placement, Surface, SurfaceFactory};
use crate::viewport::ScrollArea;

/// Fallback frame interval when `requestAnimationFrame` is unavailable.
const FALLBACK_FRAME_MS: u32 = 16;

fn js_err(value: JsValue) -> SurfaceError {
    SurfaceError::Canvas(format!("{value:?}"))
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    if let Err(e) = element.style().set_property(property, value) {
        warn!("web: could not set {property}={value}: {e:?}");
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixels(v: f64) -> u32 {
    v.max(0.0).round() as u32
}

// =============================================================
// Logging
// =============================================================

/// Route `log` output to the browser console and install the panic hook.
pub fn init_logging(level: log::Level) {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(level) {
        warn!("web: logger already installed: {e}");
    }
}

// =============================================================
// Images and surfaces
// =============================================================

/// A decoded `<img>` element.
#[derive(Clone)]
pub struct WebImage(HtmlImageElement);

impl ImageSource for WebImage {
    fn size(&self) -> Size {
        Size::new(f64::from(self.0.natural_width()), f64::from(self.0.natural_height()))
    }
}

/// A `<canvas>` element and its 2D context.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    /// # Errors
    ///
    /// Returns [`SurfaceError::Canvas`] if the canvas has no 2D context.
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, SurfaceError> {
        let ctx = canvas
            .get_context("2d")
            .map_err(js_err)?
            .ok_or_else(|| SurfaceError::Canvas("2d context unavailable".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| SurfaceError::Canvas("context is not 2d".into()))?;
        Ok(Self { canvas, ctx })
    }

    #[must_use]
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl Surface for CanvasSurface {
    type Image = WebImage;

    fn save(&mut self) {
        self.ctx.save();
    }

    fn restore(&mut self) {
        self.ctx.restore();
    }

    fn translate(&mut self, x: f64, y: f64) -> Result<(), SurfaceError> {
        self.ctx.translate(x, y).map_err(js_err)
    }

    fn rotate(&mut self, radians: f64) -> Result<(), SurfaceError> {
        self.ctx.rotate(radians).map_err(js_err)
    }

    fn draw_image(&mut self, image: &WebImage, src: Rect, dst: Rect) -> Result<(), SurfaceError> {
        self.ctx
            .draw_image_with_html_image_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                &image.0, src.x, src.y, src.width, src.height, dst.x, dst.y, dst.width, dst.height,
            )
            .map_err(js_err)
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.ctx.clear_rect(rect.x, rect.y, rect.width, rect.height);
    }

    fn fill_rect(&mut self, rect: Rect, color: &str, alpha: f64) {
        self.ctx.set_global_alpha(alpha);
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
        self.ctx.set_global_alpha(1.0);
    }

    fn stroke_rect(&mut self, rect: Rect, color: &str, line_width: f64) {
        self.ctx.set_line_width(line_width);
        self.ctx.set_stroke_style_str(color);
        self.ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: &str, font: &str) -> Result<(), SurfaceError> {
        self.ctx.set_font(font);
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_text(text, x, y).map_err(js_err)
    }

    fn set_smoothing(&mut self, enabled: bool) {
        self.ctx.set_image_smoothing_enabled(enabled);
    }

    fn resize(&mut self, size: Size) {
        self.canvas.set_width(pixels(size.width));
        self.canvas.set_height(pixels(size.height));
    }

    fn size(&self) -> Size {
        Size::new(f64::from(self.canvas.width()), f64::from(self.canvas.height()))
    }
}

/// Creates one absolutely positioned canvas per layer, stacked in creation
/// order inside the overlay or game-area element.
pub struct DomSurfaceFactory {
    document: Document,
    overlay: HtmlElement,
    area: HtmlElement,
    prefix: String,
    created: u32,
}

impl DomSurfaceFactory {
    #[must_use]
    pub fn new(document: Document, overlay: HtmlElement, area: HtmlElement, prefix: &str) -> Self {
        Self { document, overlay, area, prefix: prefix.to_owned(), created: 0 }
    }
}

impl SurfaceFactory<CanvasSurface> for DomSurfaceFactory {
    fn create(&mut self, name: &str, placement: Placement, size: Size) -> Result<CanvasSurface, SurfaceError> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|e| SurfaceError::Create(format!("{name}: {e:?}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| SurfaceError::Create(name.to_owned()))?;
        canvas.set_id(&format!("{}_{name}", self.prefix));
        set_style(&canvas, "position", "absolute");
        set_style(&canvas, "left", "0px");
        set_style(&canvas, "top", "0px");
        set_style(&canvas, "z-index", &self.created.to_string());
        self.created += 1;

        let parent = match placement {
            Placement::Overlay => &self.overlay,
            Placement::Background => &self.area,
        };
        parent.append_child(&canvas).map_err(|e| SurfaceError::Create(format!("{name}: {e:?}")))?;

        let mut surface = CanvasSurface::new(canvas)?;
        surface.resize(size);
        Ok(surface)
    }
}

// =============================================================
// Viewport
// =============================================================

/// Moves the game-area element inside the view element with CSS offsets.
pub struct DomScrollArea {
    view: HtmlElement,
    overlay: HtmlElement,
    area: HtmlElement,
}

impl DomScrollArea {
    #[must_use]
    pub fn new(view: HtmlElement, overlay: HtmlElement, area: HtmlElement) -> Self {
        Self { view, overlay, area }
    }
}

impl ScrollArea for DomScrollArea {
    fn move_to(&mut self, x: f64, y: f64) {
        set_style(&self.area, "left", &format!("{x}px"));
        set_style(&self.area, "top", &format!("{y}px"));
    }

    fn set_view_size(&mut self, view: Size, fullscreen: bool) {
        let (w, h) = (format!("{}px", view.width), format!("{}px", view.height));
        for element in [&self.view, &self.overlay] {
            set_style(element, "width", &w);
            set_style(element, "height", &h);
        }
        if fullscreen {
            set_style(&self.view, "position", "fixed");
            set_style(&self.view, "left", "0px");
            set_style(&self.view, "top", "0px");
        }
    }

    fn set_area_size(&mut self, area: Size) {
        set_style(&self.area, "width", &format!("{}px", area.width));
        set_style(&self.area, "height", &format!("{}px", area.height));
    }
}

// =============================================================
// Image loading
// =============================================================

struct PendingImage {
    image: HtmlImageElement,
    _onload: Closure<dyn FnMut()>,
    _onerror: Closure<dyn FnMut()>,
}

impl PendingImage {
    fn detach(&self) {
        self.image.set_onload(None);
        self.image.set_onerror(None);
    }
}

/// Requests that have not reported yet, keyed by resource name. Shared
/// between the loader and the handlers of the requests it holds.
struct InFlight<T>(Rc<RefCell<HashMap<String, T>>>);

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(HashMap::new())))
    }
}

impl<T> Clone for InFlight<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> InFlight<T> {
    /// Track `entry`, returning the request it supersedes.
    fn insert(&self, name: &str, entry: T) -> Option<T> {
        self.0.borrow_mut().insert(name.to_owned(), entry)
    }

    /// Stop tracking `name`. The entry is handed back so a handler can keep
    /// itself alive until it returns.
    fn settle(&self, name: &str) -> Option<T> {
        self.0.borrow_mut().remove(name)
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

/// Detach and release the element for `name` once it has reported.
fn settle_image(pending: &InFlight<PendingImage>, name: &str) -> Option<PendingImage> {
    let entry = pending.settle(name);
    if let Some(entry) = &entry {
        entry.detach();
    }
    entry
}

/// Fetches images through `<img>` elements.
#[derive(Default)]
pub struct DomImageLoader {
    pending: InFlight<PendingImage>,
    timeout: Option<Timeout>,
}

impl DomImageLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Images requested that have not yet loaded or failed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl ImageLoader<WebImage> for DomImageLoader {
    fn load(&mut self, name: &str, source: &str, sink: LoadSink<WebImage>) {
        let image = match HtmlImageElement::new() {
            Ok(image) => image,
            Err(e) => {
                warn!("web: cannot create <img> for `{name}`: {e:?}");
                sink(LoadEvent::Failed { name: name.to_owned() });
                return;
            }
        };

        let onload = {
            let (sink, pending, name, image) =
                (Rc::clone(&sink), self.pending.clone(), name.to_owned(), image.clone());
            Closure::wrap(Box::new(move || {
                let settled = settle_image(&pending, &name);
                sink(LoadEvent::Loaded { name: name.clone(), image: WebImage(image.clone()) });
                drop(settled);
            }) as Box<dyn FnMut()>)
        };
        let onerror = {
            let (pending, name) = (self.pending.clone(), name.to_owned());
            Closure::wrap(Box::new(move || {
                let settled = settle_image(&pending, &name);
                sink(LoadEvent::Failed { name: name.clone() });
                drop(settled);
            }) as Box<dyn FnMut()>)
        };
        image.set_onload(Some(onload.as_ref().unchecked_ref()));
        image.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        image.set_src(source);
        debug!("web: fetching `{name}` from {source}");

        let entry = PendingImage { image, _onload: onload, _onerror: onerror };
        if let Some(replaced) = self.pending.insert(name, entry) {
            replaced.detach();
        }
    }

    fn arm_timeout(&mut self, ms: u32, on_timeout: Box<dyn FnOnce()>) {
        self.timeout = Some(Timeout::new(ms, on_timeout));
    }
}

// =============================================================
// Time
// =============================================================

/// `Date.now()`.
pub struct DateClock;

impl Clock for DateClock {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

/// `requestAnimationFrame`, falling back to a short timer.
pub struct RafScheduler {
    window: Option<Window>,
}

impl RafScheduler {
    #[must_use]
    pub fn new(window: Option<Window>) -> Self {
        Self { window }
    }
}

impl FrameScheduler for RafScheduler {
    fn request_frame(&mut self, callback: Rc<dyn Fn()>) {
        let Some(window) = &self.window else {
            Timeout::new(FALLBACK_FRAME_MS, move || callback()).forget();
            return;
        };

        let holder: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
        let holder_for_cb = Rc::clone(&holder);
        let callback_for_cb = Rc::clone(&callback);
        let cb = Closure::wrap(Box::new(move |_ts: f64| {
            callback_for_cb();
            holder_for_cb.borrow_mut().take();
        }) as Box<dyn FnMut(f64)>);

        if window.request_animation_frame(cb.as_ref().unchecked_ref()).is_ok() {
            *holder.borrow_mut() = Some(cb);
        } else {
            Timeout::new(FALLBACK_FRAME_MS, move || callback()).forget();
        }
    }
}

// =============================================================
// Input
// =============================================================

struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

/// Window, document and overlay listeners translated into [`RawInput`].
pub struct DomInput {
    window: Window,
    document: Document,
    view: HtmlElement,
    overlay: HtmlElement,
    listeners: Vec<Listener>,
    mouse_over: Rc<Cell<bool>>,
}

impl DomInput {
    #[must_use]
    pub fn new(window: Window, document: Document, view: HtmlElement, overlay: HtmlElement) -> Self {
        Self { window, document, view, overlay, listeners: Vec::new(), mouse_over: Rc::new(Cell::new(false)) }
    }

    fn listen(
        &mut self,
        target: &EventTarget,
        kind: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<(), InputError> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target
            .add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())
            .map_err(|e| InputError::Attach(format!("{kind}: {e:?}")))?;
        self.listeners.push(Listener { target: target.clone(), kind, closure });
        Ok(())
    }

    /// Listener for a button event reported in view coordinates.
    fn button_handler(
        &self,
        sink: &InputSink,
        make: fn(f64, f64, Button) -> RawInput,
    ) -> impl FnMut(Event) + 'static {
        let (sink, view, over) = (Rc::clone(sink), self.view.clone(), Rc::clone(&self.mouse_over));
        move |event: Event| {
            let Some(e) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            if over.get() {
                e.prevent_default();
            }
            let rect = view.get_bounding_client_rect();
            let x = f64::from(e.client_x()) - rect.left();
            let y = f64::from(e.client_y()) - rect.top();
            sink(make(x, y, Button::from_code(e.button())));
        }
    }
}

fn key_modifiers(e: &KeyboardEvent) -> Modifiers {
    Modifiers { shift: e.shift_key(), ctrl: e.ctrl_key(), alt: e.alt_key(), meta: e.meta_key() }
}

impl InputAdapter for DomInput {
    fn connect(&mut self, sink: InputSink) -> Result<(), InputError> {
        let window: EventTarget = self.window.clone().into();
        let document: EventTarget = self.document.clone().into();
        let overlay: EventTarget = self.overlay.clone().into();

        let down = self.button_handler(&sink, |x, y, button| RawInput::MouseDown { x, y, button });
        self.listen(&window, "mousedown", down)?;
        let up = self.button_handler(&sink, |x, y, button| RawInput::MouseUp { x, y, button });
        self.listen(&window, "mouseup", up)?;
        let click = self.button_handler(&sink, |x, y, button| RawInput::Click { x, y, button });
        self.listen(&window, "click", click)?;

        let moved = {
            let (sink, view) = (Rc::clone(&sink), self.view.clone());
            move |event: Event| {
                let Some(e) = event.dyn_ref::<MouseEvent>() else {
                    return;
                };
                let rect = view.get_bounding_client_rect();
                sink(RawInput::MouseMove {
                    x: f64::from(e.client_x()) - rect.left(),
                    y: f64::from(e.client_y()) - rect.top(),
                    movement_x: f64::from(e.movement_x()),
                    movement_y: f64::from(e.movement_y()),
                });
            }
        };
        self.listen(&window, "mousemove", moved)?;

        let wheel = {
            let (sink, over) = (Rc::clone(&sink), Rc::clone(&self.mouse_over));
            move |event: Event| {
                let Some(e) = event.dyn_ref::<WheelEvent>() else {
                    return;
                };
                if over.get() {
                    e.prevent_default();
                }
                sink(RawInput::Wheel { dx: e.delta_x(), dy: e.delta_y() });
            }
        };
        self.listen(&window, "wheel", wheel)?;

        for (kind, down) in [("keydown", true), ("keyup", false)] {
            let sink = Rc::clone(&sink);
            self.listen(&window, kind, move |event: Event| {
                let Some(e) = event.dyn_ref::<KeyboardEvent>() else {
                    return;
                };
                let (key, modifiers) = (Key::new(e.key()), key_modifiers(e));
                sink(if down { RawInput::KeyDown { key, modifiers } } else { RawInput::KeyUp { key, modifiers } });
            })?;
        }

        let resize = {
            let (sink, window) = (Rc::clone(&sink), self.window.clone());
            move |_event: Event| {
                let width = window.inner_width().map_or(None, |v| v.as_f64());
                let height = window.inner_height().map_or(None, |v| v.as_f64());
                if let (Some(width), Some(height)) = (width, height) {
                    sink(RawInput::Resize { width, height });
                }
            }
        };
        self.listen(&window, "resize", resize)?;

        let lock_change = {
            let (sink, doc) = (Rc::clone(&sink), self.document.clone());
            move |_event: Event| sink(RawInput::PointerLockChange { locked: doc.pointer_lock_element().is_some() })
        };
        self.listen(&document, "pointerlockchange", lock_change)?;

        let lock_error = {
            let sink = Rc::clone(&sink);
            move |event: Event| sink(RawInput::PointerLockError { message: event.type_() })
        };
        self.listen(&document, "pointerlockerror", lock_error)?;

        let context_menu = {
            let over = Rc::clone(&self.mouse_over);
            move |event: Event| {
                if over.get() {
                    event.prevent_default();
                }
            }
        };
        self.listen(&document, "contextmenu", context_menu)?;

        for (kind, inside) in [("mouseenter", true), ("mouseleave", false)] {
            let (sink, over) = (Rc::clone(&sink), Rc::clone(&self.mouse_over));
            self.listen(&overlay, kind, move |_event: Event| {
                over.set(inside);
                sink(if inside { RawInput::MouseEnter } else { RawInput::MouseLeave });
            })?;
        }

        debug!("web: {} input listeners attached", self.listeners.len());
        Ok(())
    }

    fn disconnect(&mut self) {
        for listener in self.listeners.drain(..) {
            if let Err(e) = listener
                .target
                .remove_event_listener_with_callback(listener.kind, listener.closure.as_ref().unchecked_ref())
            {
                warn!("web: could not detach {}: {e:?}", listener.kind);
            }
        }
    }

    fn request_pointer_lock(&mut self) -> Result<(), InputError> {
        self.overlay.request_pointer_lock();
        Ok(())
    }
}

impl Drop for DomInput {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================
// Mounting
// =============================================================

fn div(document: &Document, id: &str) -> Result<HtmlElement, GameError> {
    document
        .create_element("div")
        .map_err(|e| GameError::Host(format!("create #{id}: {e:?}")))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| GameError::Host(format!("#{id} is not an HTML element")))
        .map(|el| {
            el.set_id(id);
            el
        })
}

/// Build a game inside the element with id `element_id`.
///
/// # Errors
///
/// [`GameError::Host`] if the page has no window, document or element with
/// that id, plus anything [`Game::new`] reports.
pub fn mount(element_id: &str, config: GameConfig) -> Result<GameHandle<CanvasSurface>, GameError> {
    let window = web_sys::window().ok_or_else(|| GameError::Host("no window".into()))?;
    let document = window.document().ok_or_else(|| GameError::Host("no document".into()))?;
    let view = document
        .get_element_by_id(element_id)
        .ok_or_else(|| GameError::Host(format!("no element #{element_id}")))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| GameError::Host(format!("#{element_id} is not an HTML element")))?;

    let area = div(&document, &format!("{element_id}_area"))?;
    let overlay = div(&document, &format!("{element_id}_overlay"))?;
    set_style(&view, "position", "relative");
    set_style(&view, "overflow", "hidden");
    for element in [&area, &overlay] {
        set_style(element, "position", "absolute");
        set_style(element, "left", "0px");
        set_style(element, "top", "0px");
    }
    set_style(&overlay, "z-index", "1");
    for element in [&area, &overlay] {
        view.append_child(element).map_err(|e| GameError::Host(format!("append: {e:?}")))?;
    }

    let host = Host {
        surfaces: Box::new(DomSurfaceFactory::new(document.clone(), overlay.clone(), area.clone(), element_id)),
        images: Box::new(DomImageLoader::new()),
        scroll: Box::new(DomScrollArea::new(view.clone(), overlay.clone(), area)),
        input: Box::new(DomInput::new(window.clone(), document, view, overlay)),
        clock: Box::new(DateClock),
        scheduler: Box::new(RafScheduler::new(Some(window))),
    };
    Game::new(config, host)
}
