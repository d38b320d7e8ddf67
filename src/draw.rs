//! Drawing: stateless layer operations and the animation manager.
//!
//! [`DrawSurface`] owns the layers and the resource registry and exposes
//! draw calls addressed by layer name. Every call that puts pixels on a
//! transient layer flags that layer for the end-of-tick wipe.
//!
//! [`DrawManager`] adds the list of live animations and the per-tick update:
//! advance and redraw every animation, then wipe dirty transient layers.
//! The wipe runs after all draws of the tick, never before.

#[cfg(test)]
#[path = "draw_test.rs"]
mod draw_test;

use log::{debug, warn};
use uuid::Uuid;

use crate::animation::{Animation, AnimationId, AnimationOptions};
use crate::config::GameConfig;
use crate::consts::{DEFAULT_FONT, DEFAULT_TEXT_COLOR, DEFAULT_TEXT_SIZE};
use crate::error::{DrawError, SurfaceError};
use crate::geom::{Point, Rect, Size, is_unrotated};
use crate::layer::{Layer, LayerRegistry};
use crate::resources::ResourceRegistry;
use crate::surface::{Persistence, Placement, Surface, SurfaceFactory};

/// Stroke and optional fill for [`DrawSurface::rectangle`].
#[derive(Debug, Clone, PartialEq)]
pub struct RectStyle {
    pub stroke: String,
    pub fill: Option<String>,
    /// Opacity of the fill only; the outline is always opaque.
    pub fill_alpha: f64,
}

impl Default for RectStyle {
    fn default() -> Self {
        Self { stroke: "black".into(), fill: None, fill_alpha: 1.0 }
    }
}

/// Colour, pixel size and family for [`DrawSurface::text`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: String,
    pub size: f64,
    pub font: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self { color: DEFAULT_TEXT_COLOR.into(), size: DEFAULT_TEXT_SIZE, font: DEFAULT_FONT.into() }
    }
}

/// Run `op` with the surface rotated by `rotation` about the center of
/// `rect`. `op` receives `rect` expressed in the transformed space.
///
/// Unrotated calls skip the save/translate/rotate/restore sequence.
fn with_rotation<S: Surface>(
    surface: &mut S,
    rect: Rect,
    rotation: f64,
    op: impl FnOnce(&mut S, Rect) -> Result<(), SurfaceError>,
) -> Result<(), SurfaceError> {
    if is_unrotated(rotation) {
        return op(surface, rect);
    }
    let center = rect.center();
    let local = Rect::new(-rect.width / 2.0, -rect.height / 2.0, rect.width, rect.height);
    surface.save();
    let result = rotate_about(surface, center, rotation).and_then(|()| op(surface, local));
    surface.restore();
    result
}

fn rotate_about<S: Surface>(surface: &mut S, center: Point, rotation: f64) -> Result<(), SurfaceError> {
    surface.translate(center.x, center.y)?;
    surface.rotate(rotation)
}

pub struct DrawSurface<S: Surface> {
    layers: LayerRegistry<S>,
    resources: ResourceRegistry<S::Image>,
    factory: Box<dyn SurfaceFactory<S>>,
    view: Size,
    area: Size,
    tile: Size,
    smoothing: bool,
}

impl<S: Surface> DrawSurface<S> {
    #[must_use]
    pub fn new(config: &GameConfig, factory: Box<dyn SurfaceFactory<S>>, resources: ResourceRegistry<S::Image>) -> Self {
        Self {
            layers: LayerRegistry::new(),
            resources,
            factory,
            view: config.view_size(),
            area: config.game_area_size(),
            tile: config.tile_size(),
            smoothing: config.smoothing,
        }
    }

    // --- Layers ---

    /// Create a layer. Overlay layers are sized to the view, background
    /// layers to the game area. Adding an existing name replaces that layer.
    ///
    /// # Errors
    ///
    /// Returns [`DrawError::Surface`] if the host cannot create the surface.
    pub fn add_layer(&mut self, name: &str, placement: Placement, persistence: Persistence) -> Result<(), DrawError> {
        let size = match placement {
            Placement::Overlay => self.view,
            Placement::Background => self.area,
        };
        let mut surface = self.factory.create(name, placement, size)?;
        surface.set_smoothing(self.smoothing);
        if self.layers.insert(Layer::new(name, surface, placement, persistence)).is_some() {
            warn!("draw: layer `{name}` replaced");
        }
        debug!("draw: added {placement:?} {persistence:?} layer `{name}` ({}x{})", size.width, size.height);
        Ok(())
    }

    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&Layer<S>> {
        self.layers.get(name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer<S>> {
        self.layers.get_mut(name)
    }

    /// Whether `name` exists and is wiped by the per-tick clear pass.
    #[must_use]
    pub fn is_transient(&self, name: &str) -> bool {
        self.layers.get(name).is_some_and(|l| !l.is_persistent())
    }

    #[must_use]
    pub fn layers(&self) -> &LayerRegistry<S> {
        &self.layers
    }

    fn layer_or_err(&mut self, name: &str) -> Result<&mut Layer<S>, DrawError> {
        self.layers.get_mut(name).ok_or_else(|| DrawError::MissingLayer(name.to_owned()))
    }

    // --- Resources ---

    #[must_use]
    pub fn resources(&self) -> &ResourceRegistry<S::Image> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceRegistry<S::Image> {
        &mut self.resources
    }

    // --- Images ---

    /// Draw a whole image at `at`, scaled to `size` (natural size if `None`),
    /// rotated about its center.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingImage`] if the image is not loaded,
    /// [`DrawError::MissingLayer`] if the layer does not exist.
    pub fn image(
        &mut self,
        image: &str,
        layer: &str,
        at: Point,
        size: Option<Size>,
        rotation: f64,
    ) -> Result<(), DrawError> {
        let natural = self
            .resources
            .image_size(image)
            .ok_or_else(|| DrawError::MissingImage(image.to_owned()))?;
        let src = Rect::new(0.0, 0.0, natural.width, natural.height);
        let dst = Rect::from_parts(at, size.unwrap_or(natural));
        self.blit(image, layer, src, dst, rotation)
    }

    /// Draw the `src` region of an image into `dst`.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingImage`] or [`DrawError::MissingLayer`].
    pub fn sub_image(&mut self, image: &str, layer: &str, dst: Rect, src: Rect, rotation: f64) -> Result<(), DrawError> {
        self.blit(image, layer, src, dst, rotation)
    }

    /// Draw one frame of a sprite sheet at `at`, scaled to `size` (one tile
    /// if `None`).
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingSprite`], [`DrawError::MissingImage`],
    /// [`DrawError::MissingLayer`], or [`DrawError::FrameOutOfRange`].
    pub fn sub_sprite(
        &mut self,
        sheet: &str,
        layer: &str,
        frame: usize,
        at: Point,
        size: Option<Size>,
        rotation: f64,
    ) -> Result<(), DrawError> {
        let sprite = self
            .resources
            .sprite(sheet)
            .ok_or_else(|| DrawError::MissingSprite(sheet.to_owned()))?;
        let natural = self
            .resources
            .image_size(sheet)
            .ok_or_else(|| DrawError::MissingImage(sheet.to_owned()))?;
        let src = sprite.frame_source_rect(natural, frame)?;
        let dst = Rect::from_parts(at, size.unwrap_or(self.tile));
        self.blit(sheet, layer, src, dst, rotation)
    }

    fn blit(&mut self, image: &str, layer: &str, src: Rect, dst: Rect, rotation: f64) -> Result<(), DrawError> {
        let img = self
            .resources
            .image(image)
            .ok_or_else(|| DrawError::MissingImage(image.to_owned()))?;
        let target = self
            .layers
            .get_mut(layer)
            .ok_or_else(|| DrawError::MissingLayer(layer.to_owned()))?;
        with_rotation(target.surface_mut(), dst, rotation, |s, local| s.draw_image(img, src, local))?;
        target.mark_drawn();
        Ok(())
    }

    // --- Shapes and text ---

    /// Outline `rect` with a 1px stroke, optionally filling it first.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingLayer`] if the layer does not exist.
    pub fn rectangle(&mut self, layer: &str, rect: Rect, style: &RectStyle) -> Result<(), DrawError> {
        let target = self.layer_or_err(layer)?;
        let surface = target.surface_mut();
        surface.save();
        if let Some(fill) = &style.fill {
            surface.fill_rect(rect, fill, style.fill_alpha);
        }
        surface.stroke_rect(rect, &style.stroke, 1.0);
        surface.restore();
        target.mark_drawn();
        Ok(())
    }

    /// Draw `text` with its top edge at `at`.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingLayer`] or [`DrawError::Surface`].
    pub fn text(&mut self, layer: &str, text: &str, at: Point, style: &TextStyle) -> Result<(), DrawError> {
        let target = self.layer_or_err(layer)?;
        let font = format!("{}px {}", style.size, style.font);
        let surface = target.surface_mut();
        surface.save();
        let result = surface.fill_text(text, at.x, at.y + style.size, &style.color, &font);
        surface.restore();
        result?;
        target.mark_drawn();
        Ok(())
    }

    // --- Clearing ---

    /// Clear `rect`, rotated about its center exactly as a draw with the
    /// same geometry would be.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingLayer`] or [`DrawError::Surface`].
    pub fn clear_rectangle(&mut self, layer: &str, rect: Rect, rotation: f64) -> Result<(), DrawError> {
        let target = self.layer_or_err(layer)?;
        with_rotation(target.surface_mut(), rect, rotation, |s, local| {
            s.clear_rect(local);
            Ok(())
        })?;
        Ok(())
    }

    /// Clear the view rectangle of a layer.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingLayer`] if the layer does not exist.
    pub fn clear_layer(&mut self, layer: &str) -> Result<(), DrawError> {
        let view = self.view;
        self.layer_or_err(layer)?.clear(view);
        Ok(())
    }

    /// Wipe every transient layer drawn on since its last wipe.
    pub fn clear_transient_layers(&mut self) -> usize {
        self.layers.clear_transient(self.view)
    }

    // --- Sizing ---

    /// Follow a new view size: overlay layers are resized.
    pub fn resize_view(&mut self, view: Size) {
        self.view = view;
        self.resize_where(Placement::Overlay, view);
    }

    /// Follow a new game-area size: background layers are resized.
    pub fn resize_area(&mut self, area: Size) {
        self.area = area;
        self.resize_where(Placement::Background, area);
    }

    fn resize_where(&mut self, placement: Placement, size: Size) {
        let smoothing = self.smoothing;
        for layer in self.layers.iter_mut().filter(|l| l.placement() == placement) {
            let surface = layer.surface_mut();
            surface.resize(size);
            // Resizing a canvas resets its context state.
            surface.set_smoothing(smoothing);
        }
    }

    pub fn set_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled;
        for layer in self.layers.iter_mut() {
            layer.surface_mut().set_smoothing(enabled);
        }
    }

    #[must_use]
    pub fn view_size(&self) -> Size {
        self.view
    }

    #[must_use]
    pub fn area_size(&self) -> Size {
        self.area
    }

    #[must_use]
    pub fn tile_size(&self) -> Size {
        self.tile
    }
}

/// Live animations plus the surface they draw on.
pub struct DrawManager<S: Surface> {
    surface: DrawSurface<S>,
    animations: Vec<Animation>,
    default_frame_ms: f64,
}

impl<S: Surface> DrawManager<S> {
    #[must_use]
    pub fn new(config: &GameConfig, surface: DrawSurface<S>) -> Self {
        Self { surface, animations: Vec::new(), default_frame_ms: config.default_frame_ms }
    }

    #[must_use]
    pub fn surface(&self) -> &DrawSurface<S> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut DrawSurface<S> {
        &mut self.surface
    }

    /// Start an animation of `sheet` on `layer`.
    ///
    /// The sheet must be registered and its image loaded, since the default
    /// size is one frame of the image.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingImage`] or [`DrawError::MissingSprite`].
    pub fn animation(&mut self, sheet: &str, layer: &str, options: AnimationOptions) -> Result<AnimationId, DrawError> {
        let resources = self.surface.resources();
        let natural = resources
            .image_size(sheet)
            .ok_or_else(|| DrawError::MissingImage(sheet.to_owned()))?;
        let sprite = resources
            .sprite(sheet)
            .ok_or_else(|| DrawError::MissingSprite(sheet.to_owned()))?
            .clone();

        let size = options.size.unwrap_or_else(|| sprite.frame_size(natural));
        let frame_ms = options.frame_ms.filter(|ms| *ms > 0.0).unwrap_or(self.default_frame_ms);
        let rect = Rect::from_parts(options.position, size);
        if self.surface.is_transient(layer) {
            warn!("draw: layer `{layer}` is transient; animations on it are wiped after each draw");
        }
        let id = Uuid::new_v4();
        debug!("draw: animation {id} of `{sheet}` on `{layer}` ({:?})", options.mode);
        self.animations.push(Animation::new(id, sprite, layer, rect, frame_ms, options));
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: AnimationId) -> Option<&Animation> {
        self.animations.iter().find(|a| a.id() == id)
    }

    /// Mutable access for changes that do not touch pixels (pause, direction,
    /// property binding). Use [`Self::with_animation`] for moves and rotations.
    pub fn get_mut(&mut self, id: AnimationId) -> Option<&mut Animation> {
        self.animations.iter_mut().find(|a| a.id() == id)
    }

    /// Run `op` against an animation and the surface it draws on.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingAnimation`] if `id` is not live.
    pub fn with_animation<T>(
        &mut self,
        id: AnimationId,
        op: impl FnOnce(&mut Animation, &mut DrawSurface<S>) -> T,
    ) -> Result<T, DrawError> {
        let anim = self
            .animations
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or(DrawError::MissingAnimation(id))?;
        Ok(op(anim, &mut self.surface))
    }

    /// Shift an animation by `(dx, dy)`, erasing its old footprint.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingAnimation`] if `id` is not live.
    pub fn move_animation(&mut self, id: AnimationId, dx: f64, dy: f64) -> Result<(), DrawError> {
        self.with_animation(id, |anim, surface| anim.move_by(dx, dy, surface))
    }

    /// Rotate an animation by `radians`, erasing its old footprint.
    ///
    /// # Errors
    ///
    /// [`DrawError::MissingAnimation`] if `id` is not live.
    pub fn rotate_animation(&mut self, id: AnimationId, radians: f64) -> Result<(), DrawError> {
        self.with_animation(id, |anim, surface| anim.rotate(radians, surface))
    }

    /// Drop an animation, erasing it from its layer if it is on screen.
    pub fn remove_animation(&mut self, id: AnimationId) -> Option<Animation> {
        let index = self.animations.iter().position(|a| a.id() == id)?;
        let mut anim = self.animations.remove(index);
        if anim.is_drawn() {
            anim.clear(&mut self.surface);
        }
        Some(anim)
    }

    pub fn animations(&self) -> impl Iterator<Item = &Animation> {
        self.animations.iter()
    }

    #[must_use]
    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    /// Advance and redraw every animation, then wipe dirty transient layers.
    pub fn update(&mut self, delta_ms: f64) {
        for anim in &mut self.animations {
            anim.frame_update(delta_ms);
            anim.draw(&mut self.surface);
        }
        self.surface.clear_transient_layers();
    }

    /// Follow a new view size.
    pub fn resize_view(&mut self, view: Size) {
        self.surface.resize_view(view);
    }

    /// Follow a new game-area size.
    pub fn resize_area(&mut self, area: Size) {
        self.surface.resize_area(area);
    }
}
