//! Toolkit for small tile-based 2D games rendered in a web page.
//!
//! The crate is compiled to WebAssembly and runs in the browser. It owns the
//! game loop, a stack of named canvas layers, sprite animations, an
//! edge-panning camera over a scrollable game area, a tile map with
//! collision grids, and routing of mouse/keyboard input to game objects.
//! Everything except [`web`] talks to the host through small traits, so the
//! core runs (and is tested) without a browser.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Game loop, host bundle, clock and frame scheduler traits |
//! | [`draw`] | Layer draw operations and the animation manager |
//! | [`animation`] | Per-sprite playback state machine |
//! | [`layer`] | Named layers and per-tick clear bookkeeping |
//! | [`resources`] | Image and sprite sheet registry with load tracking |
//! | [`sprite`] | Sprite sheet grid descriptor |
//! | [`viewport`] | Edge-panning camera |
//! | [`map`] | Tile map and collision grids |
//! | [`input`] | Raw and normalized input events, cursor/tile state |
//! | [`events`] | Capability-filtered dispatch to hooks |
//! | [`surface`] | Host drawing surface traits |
//! | [`web`] | Browser implementations of the host traits |
//! | [`geom`] | Points, sizes and rectangles |
//! | [`config`] | Game configuration |
//! | [`error`] | Error types |
//! | [`consts`] | Default tunables |

pub mod animation;
pub mod config;
pub mod consts;
pub mod draw;
pub mod engine;
pub mod error;
pub mod events;
pub mod geom;
pub mod input;
pub mod layer;
pub mod map;
pub mod resources;
pub mod sprite;
pub mod surface;
pub mod viewport;
pub mod web;

#[cfg(test)]
pub(crate) mod test_support;
