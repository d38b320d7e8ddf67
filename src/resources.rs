//! Image and sprite sheet registry.
//!
//! Images are registered by name, then fetched together by [`ResourceRegistry::begin_load`].
//! Loading behaves as a count-down latch: it completes once every requested
//! image has either loaded or failed, in whatever order the host reports
//! them. An optional timeout gives up on images the host never reports.
//!
//! Draw calls look images up here; an image that has not arrived yet simply
//! makes the draw fail, and the caller tries again next tick.

#[cfg(test)]
#[path = "resources_test.rs"]
mod resources_test;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::error::{ConfigError, LoadError};
use crate::geom::Size;
use crate::sprite::SpriteSheet;
use crate::surface::ImageSource;

/// Outcome of one image fetch, reported by the host.
pub enum LoadEvent<I> {
    Loaded { name: String, image: I },
    Failed { name: String },
}

/// Callback the host invokes once per requested image.
pub type LoadSink<I> = Rc<dyn Fn(LoadEvent<I>)>;

/// Callback fired when a load times out; receives the load generation.
pub type TimeoutSink = Rc<dyn Fn(u64)>;

/// Host side of image fetching.
pub trait ImageLoader<I> {
    /// Start fetching `source`. Must eventually report through `sink`, or
    /// never (the timeout covers that case).
    fn load(&mut self, name: &str, source: &str, sink: LoadSink<I>);

    /// Call `on_timeout` once after `ms` milliseconds.
    fn arm_timeout(&mut self, ms: u32, on_timeout: Box<dyn FnOnce()>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No load has been started since the last completion.
    Idle,
    Loading,
    Complete,
}

/// Summary produced when a load completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: Vec<String>,
    pub timed_out: bool,
}

pub struct ResourceRegistry<I> {
    images: HashMap<String, I>,
    sprites: HashMap<String, SpriteSheet>,
    to_load: BTreeMap<String, String>,
    sources: HashMap<String, String>,
    pending: BTreeSet<String>,
    report: LoadReport,
    state: LoadState,
    generation: u64,
    loader: Box<dyn ImageLoader<I>>,
}

impl<I: ImageSource> ResourceRegistry<I> {
    #[must_use]
    pub fn new(loader: Box<dyn ImageLoader<I>>) -> Self {
        Self {
            images: HashMap::new(),
            sprites: HashMap::new(),
            to_load: BTreeMap::new(),
            sources: HashMap::new(),
            pending: BTreeSet::new(),
            report: LoadReport::default(),
            state: LoadState::Idle,
            generation: 0,
            loader,
        }
    }

    /// Queue an image for the next load.
    pub fn add_image(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.to_load.insert(name.into(), source.into());
    }

    /// Queue a sprite sheet image and register its grid.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `columns` or `rows` is zero.
    pub fn add_sprite(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        columns: usize,
        rows: usize,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        let sheet = SpriteSheet::new(name.clone(), columns, rows)?;
        self.sprites.insert(name.clone(), sheet);
        self.add_image(name, source);
        Ok(())
    }

    /// Make an already decoded image available immediately.
    pub fn insert_image(&mut self, name: impl Into<String>, image: I) {
        self.images.insert(name.into(), image);
    }

    /// Hand every queued image to the loader.
    ///
    /// Returns the report straight away when nothing was queued; otherwise
    /// completion arrives through [`Self::on_loaded`], [`Self::on_failed`] or
    /// [`Self::on_timeout`].
    pub fn begin_load(&mut self, sink: LoadSink<I>, timeout_ms: u32, on_timeout: TimeoutSink) -> Option<LoadReport> {
        self.generation += 1;
        self.report = LoadReport::default();
        if self.to_load.is_empty() {
            self.state = LoadState::Complete;
            debug!("resources: nothing to load");
            return Some(self.report.clone());
        }

        self.state = LoadState::Loading;
        let batch = std::mem::take(&mut self.to_load);
        info!("resources: loading {} image(s)", batch.len());
        self.pending.extend(batch.keys().cloned());
        for (name, source) in batch {
            self.loader.load(&name, &source, Rc::clone(&sink));
            self.sources.insert(name, source);
        }
        if timeout_ms > 0 {
            let generation = self.generation;
            self.loader.arm_timeout(timeout_ms, Box::new(move || on_timeout(generation)));
        }
        None
    }

    /// Record a successful fetch. Returns the report if this completed the load.
    ///
    /// Images arriving after a timeout are still stored and become drawable.
    pub fn on_loaded(&mut self, name: &str, image: I) -> Option<LoadReport> {
        self.images.insert(name.to_owned(), image);
        if !self.pending.remove(name) {
            debug!("resources: late image `{name}` stored");
            return None;
        }
        self.report.loaded += 1;
        self.settle()
    }

    /// Record a failed fetch. Returns the report if this completed the load.
    pub fn on_failed(&mut self, name: &str) -> Option<LoadReport> {
        if !self.pending.remove(name) {
            return None;
        }
        let err = LoadError::Failed {
            name: name.to_owned(),
            source_url: self.sources.get(name).cloned().unwrap_or_default(),
        };
        warn!("resources: {err}");
        self.report.failed.push(name.to_owned());
        self.settle()
    }

    /// Give up on every image still pending. Returns the report if load
    /// `generation` is still in progress; stale timeouts are ignored.
    pub fn on_timeout(&mut self, generation: u64, after_ms: u32) -> Option<LoadReport> {
        if self.state != LoadState::Loading || generation != self.generation {
            return None;
        }
        let pending: Vec<String> = std::mem::take(&mut self.pending).into_iter().collect();
        let err = LoadError::Timeout { after_ms, pending: pending.clone() };
        warn!("resources: {err}");
        self.report.failed.extend(pending);
        self.report.timed_out = true;
        self.state = LoadState::Complete;
        Some(self.report.clone())
    }

    fn settle(&mut self) -> Option<LoadReport> {
        if self.state != LoadState::Loading || !self.pending.is_empty() {
            return None;
        }
        self.state = LoadState::Complete;
        info!("resources: load complete ({} loaded, {} failed)", self.report.loaded, self.report.failed.len());
        Some(self.report.clone())
    }

    /// Incremented by every [`Self::begin_load`].
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state
    }

    #[must_use]
    pub fn image(&self, name: &str) -> Option<&I> {
        self.images.get(name)
    }

    #[must_use]
    pub fn image_size(&self, name: &str) -> Option<Size> {
        self.images.get(name).map(ImageSource::size)
    }

    #[must_use]
    pub fn sprite(&self, name: &str) -> Option<&SpriteSheet> {
        self.sprites.get(name)
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    /// Names of images handed to the loader that have not reported yet.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }
}
