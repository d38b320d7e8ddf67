//! Tile map and collision grids.
//!
//! A map is a grid of sprite frame indices, `tiles[row][column]`, drawn once
//! onto a persistent background layer when it is loaded. It is not redrawn
//! per tick. Collision grids are boolean grids of the same shape, keyed by
//! name and edited cell by cell.
//!
//! Cell access is bounds-checked: out-of-range cells are an error, and
//! [`TileMap::is_blocked`] treats them as solid.

#[cfg(test)]
#[path = "map_test.rs"]
mod map_test;

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::draw::DrawSurface;
use crate::error::{DrawError, MapError};
use crate::geom::{Point, Rect, Size};
use crate::surface::Surface;

/// Serialized form of a map: the tile grid plus optional collision grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub sheet: String,
    pub layer: String,
    pub tiles: Vec<Vec<usize>>,
    #[serde(default)]
    pub collision: BTreeMap<String, Vec<Vec<bool>>>,
}

impl MapData {
    /// # Errors
    ///
    /// Returns [`MapError::Parse`] for malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Outcome of drawing a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapStats {
    pub drawn: usize,
    /// Cells whose frame could not be drawn (image not loaded, bad frame).
    pub failed: usize,
}

/// Width and height of a rectangular grid.
fn dimensions<T>(grid: &[Vec<T>]) -> Result<(usize, usize), MapError> {
    let columns = grid.first().map_or(0, Vec::len);
    if columns == 0 {
        return Err(MapError::Empty);
    }
    if let Some((row, cells)) = grid.iter().enumerate().find(|(_, r)| r.len() != columns) {
        return Err(MapError::Ragged { row, expected: columns, found: cells.len() });
    }
    Ok((columns, grid.len()))
}

/// Boolean per-cell grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionGrid {
    columns: usize,
    rows: usize,
    cells: Vec<bool>,
}

impl CollisionGrid {
    /// An all-clear grid.
    #[must_use]
    pub fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows, cells: vec![false; columns * rows] }
    }

    /// # Errors
    ///
    /// [`MapError::Empty`] or [`MapError::Ragged`].
    pub fn from_rows(grid: &[Vec<bool>]) -> Result<Self, MapError> {
        let (columns, rows) = dimensions(grid)?;
        Ok(Self { columns, rows, cells: grid.concat() })
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn index(&self, x: usize, y: usize) -> Result<usize, MapError> {
        if x < self.columns && y < self.rows {
            Ok(y * self.columns + x)
        } else {
            Err(MapError::OutOfBounds { x, y, columns: self.columns, rows: self.rows })
        }
    }

    /// # Errors
    ///
    /// [`MapError::OutOfBounds`] if `(x, y)` is off the grid.
    pub fn get(&self, x: usize, y: usize) -> Result<bool, MapError> {
        let i = self.index(x, y)?;
        Ok(self.cells[i])
    }

    /// # Errors
    ///
    /// [`MapError::OutOfBounds`] if `(x, y)` is off the grid.
    pub fn set(&mut self, x: usize, y: usize, blocked: bool) -> Result<(), MapError> {
        let i = self.index(x, y)?;
        self.cells[i] = blocked;
        Ok(())
    }

    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

pub struct TileMap {
    sheet: Option<String>,
    layer: Option<String>,
    tiles: Vec<Vec<usize>>,
    columns: usize,
    rows: usize,
    tile: Size,
    collision: BTreeMap<String, CollisionGrid>,
}

impl TileMap {
    #[must_use]
    pub fn new(config: &GameConfig) -> Self {
        Self {
            sheet: None,
            layer: None,
            tiles: Vec::new(),
            columns: 0,
            rows: 0,
            tile: config.tile_size(),
            collision: BTreeMap::new(),
        }
    }

    /// Store `tiles` and draw every cell onto `layer` at
    /// `(column * tile_width, row * tile_height)`.
    ///
    /// Cells that fail to draw are counted in the returned stats rather than
    /// aborting the load.
    ///
    /// # Errors
    ///
    /// [`MapError::Empty`] or [`MapError::Ragged`] for a malformed grid,
    /// [`MapError::Draw`] if the layer does not exist.
    pub fn load_sprite_map<S: Surface>(
        &mut self,
        draw: &mut DrawSurface<S>,
        layer: &str,
        sheet: &str,
        tiles: Vec<Vec<usize>>,
    ) -> Result<MapStats, MapError> {
        let (columns, rows) = dimensions(&tiles)?;
        if draw.layer(layer).is_none() {
            return Err(DrawError::MissingLayer(layer.to_owned()).into());
        }
        if draw.is_transient(layer) {
            warn!("map: layer `{layer}` is transient; the map will be wiped next tick");
        }

        let mut stats = MapStats::default();
        for (row, cells) in tiles.iter().enumerate() {
            for (column, &frame) in cells.iter().enumerate() {
                let at = self.tile_origin(column, row);
                match draw.sub_sprite(sheet, layer, frame, at, Some(self.tile), 0.0) {
                    Ok(()) => stats.drawn += 1,
                    Err(e) => {
                        debug!("map: cell ({column}, {row}): {e}");
                        stats.failed += 1;
                    }
                }
            }
        }
        if stats.failed > 0 {
            warn!("map: {} of {} cells failed to draw", stats.failed, columns * rows);
        }
        info!("map: loaded {columns}x{rows} `{sheet}` map onto `{layer}`");

        self.sheet = Some(sheet.to_owned());
        self.layer = Some(layer.to_owned());
        self.tiles = tiles;
        self.columns = columns;
        self.rows = rows;
        Ok(stats)
    }

    /// Draw `data` and install its collision grids.
    ///
    /// # Errors
    ///
    /// Any error of [`Self::load_sprite_map`] or [`Self::load_collision`].
    pub fn load_data<S: Surface>(&mut self, draw: &mut DrawSurface<S>, data: MapData) -> Result<MapStats, MapError> {
        let stats = self.load_sprite_map(draw, &data.layer, &data.sheet, data.tiles)?;
        for (name, grid) in data.collision {
            self.load_collision(&name, &grid)?;
        }
        Ok(stats)
    }

    // --- Collision ---

    /// Create an all-clear collision grid the size of the map.
    ///
    /// # Errors
    ///
    /// [`MapError::Empty`] if no map is loaded.
    pub fn new_collision_layer(&mut self, name: &str) -> Result<(), MapError> {
        if self.columns == 0 {
            return Err(MapError::Empty);
        }
        self.collision.insert(name.to_owned(), CollisionGrid::new(self.columns, self.rows));
        Ok(())
    }

    /// Install a collision grid from rows of booleans.
    ///
    /// # Errors
    ///
    /// [`MapError::Empty`] or [`MapError::Ragged`] for a malformed grid,
    /// [`MapError::DimensionMismatch`] if a map is loaded and the shapes differ.
    pub fn load_collision(&mut self, name: &str, grid: &[Vec<bool>]) -> Result<(), MapError> {
        let collision = CollisionGrid::from_rows(grid)?;
        if self.columns > 0 && (collision.columns != self.columns || collision.rows != self.rows) {
            return Err(MapError::DimensionMismatch {
                columns: self.columns,
                rows: self.rows,
                found_columns: collision.columns,
                found_rows: collision.rows,
            });
        }
        debug!("map: collision layer `{name}` ({} blocked)", collision.blocked_count());
        self.collision.insert(name.to_owned(), collision);
        Ok(())
    }

    #[must_use]
    pub fn collision_layer(&self, name: &str) -> Option<&CollisionGrid> {
        self.collision.get(name)
    }

    /// # Errors
    ///
    /// [`MapError::UnknownCollisionLayer`] or [`MapError::OutOfBounds`].
    pub fn set_collision(&mut self, name: &str, x: usize, y: usize, blocked: bool) -> Result<(), MapError> {
        self.collision
            .get_mut(name)
            .ok_or_else(|| MapError::UnknownCollisionLayer(name.to_owned()))?
            .set(x, y, blocked)
    }

    /// # Errors
    ///
    /// [`MapError::UnknownCollisionLayer`] or [`MapError::OutOfBounds`].
    pub fn check_collision(&self, name: &str, x: usize, y: usize) -> Result<bool, MapError> {
        self.collision
            .get(name)
            .ok_or_else(|| MapError::UnknownCollisionLayer(name.to_owned()))?
            .get(x, y)
    }

    /// Whether `(x, y)` is solid on `name`. Off-grid cells are solid; an
    /// unknown layer blocks nothing.
    #[must_use]
    pub fn is_blocked(&self, name: &str, x: usize, y: usize) -> bool {
        match self.check_collision(name, x, y) {
            Ok(blocked) => blocked,
            Err(MapError::OutOfBounds { .. }) => true,
            Err(_) => false,
        }
    }

    // --- Cells ---

    /// Frame index at `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`MapError::OutOfBounds`] if `(x, y)` is off the map.
    pub fn tile_at(&self, x: usize, y: usize) -> Result<usize, MapError> {
        self.tiles
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .ok_or(MapError::OutOfBounds { x, y, columns: self.columns, rows: self.rows })
    }

    /// Top-left pixel of a cell in game-area space.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn tile_origin(&self, x: usize, y: usize) -> Point {
        Point::new(x as f64 * self.tile.width, y as f64 * self.tile.height)
    }

    /// Cell containing a game-area pixel, if it is on the map.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn tile_containing(&self, p: Point) -> Option<(usize, usize)> {
        let extent = Rect::new(
            0.0,
            0.0,
            self.columns as f64 * self.tile.width,
            self.rows as f64 * self.tile.height,
        );
        if !extent.contains(p) {
            return None;
        }
        let x = (p.x / self.tile.width).floor() as usize;
        let y = (p.y / self.tile.height).floor() as usize;
        (x < self.columns && y < self.rows).then_some((x, y))
    }

    /// Width in cells.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Height in cells.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.columns > 0
    }

    #[must_use]
    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    #[must_use]
    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    #[must_use]
    pub fn tile_size(&self) -> Size {
        self.tile
    }
}
