//! Map description and tile derivation.
//!
//! The server describes a map sparsely: straight roads given by a start point
//! and one end coordinate, and rectangular buildings. The scene wants a dense
//! grid instead, with one tile per unit cell and per-edge connectivity so road
//! borders can be drawn only where a tile does not continue into its neighbour.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A straight road. Exactly one of `x1` (horizontal) or `y1` (vertical) is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    pub x0: i64,
    pub y0: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x1: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y1: Option<i64>,
}

impl Road {
    pub fn is_horizontal(&self) -> bool {
        self.x1.is_some()
    }

    /// Inclusive x range covered by the road.
    pub fn x_span(&self) -> (i64, i64) {
        match self.x1 {
            Some(x1) => (self.x0.min(x1), self.x0.max(x1)),
            None => (self.x0, self.x0),
        }
    }

    /// Inclusive y range covered by the road.
    pub fn y_span(&self) -> (i64, i64) {
        match self.y1 {
            Some(y1) => (self.y0.min(y1), self.y0.max(y1)),
            None => (self.y0, self.y0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Office {
    pub id: String,
    pub x: i64,
    pub y: i64,
    pub offset_x: i64,
    pub offset_y: i64,
}

/// Loot archetype: how a kind of loot looks and what it is worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootType {
    pub name: String,
    pub file: String,
    /// Asset format, e.g. `obj`.
    #[serde(rename = "type")]
    pub format: String,
    #[serde(default)]
    pub rotation: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
    pub scale: f64,
    #[serde(default)]
    pub value: u64,
}

/// Body of `GET /api/v1/maps/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDescription {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub roads: Vec<Road>,
    #[serde(default)]
    pub buildings: Vec<Building>,
    #[serde(default)]
    pub offices: Vec<Office>,
    #[serde(default)]
    pub loot_types: Vec<LootType>,
}

bitflags! {
    /// Sides of a road tile that continue into the neighbouring road tile.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TileEdges: u8 {
        const UP = 0b0001;
        const RIGHT = 0b0010;
        const DOWN = 0b0100;
        const LEFT = 0b1000;
    }
}

/// One unit cell of the derived grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tile {
    pub road: bool,
    pub edges: TileEdges,
}

/// Map derivation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// No roads and no buildings: the grid would have no extent.
    Empty,
    /// A building with a negative width or height.
    NegativeSize { x: i64, y: i64 },
    /// The covered area does not fit in memory.
    TooLarge,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Empty => write!(f, "map has no roads or buildings"),
            MapError::NegativeSize { x, y } => {
                write!(f, "building at ({x}, {y}) has negative size")
            }
            MapError::TooLarge => write!(f, "map extent is too large"),
        }
    }
}

impl std::error::Error for MapError {}

/// Dense tile grid covering every road and building of a map.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    pub xmin: i64,
    pub xmax: i64,
    pub ymin: i64,
    pub ymax: i64,
    /// Row-major, `height()` rows of `width()` tiles.
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn derive(map: &MapDescription) -> Result<Self, MapError> {
        if let Some(b) = map.buildings.iter().find(|b| b.w < 0 || b.h < 0) {
            return Err(MapError::NegativeSize { x: b.x, y: b.y });
        }

        let road_x = map.roads.iter().map(Road::x_span);
        let road_y = map.roads.iter().map(Road::y_span);
        let building_x = map.buildings.iter().map(|b| (b.x, b.x.saturating_add(b.w)));
        let building_y = map.buildings.iter().map(|b| (b.y, b.y.saturating_add(b.h)));

        let (xmin, xmax) = bounds(road_x.chain(building_x)).ok_or(MapError::Empty)?;
        let (ymin, ymax) = bounds(road_y.chain(building_y)).ok_or(MapError::Empty)?;

        let count = span_len(xmin, xmax)
            .zip(span_len(ymin, ymax))
            .and_then(|(w, h)| w.checked_mul(h))
            .ok_or(MapError::TooLarge)?;

        let mut grid = Self {
            xmin,
            xmax,
            ymin,
            ymax,
            tiles: vec![Tile::default(); count],
        };

        for road in &map.roads {
            grid.lay_road(road);
        }

        debug!(
            map = %map.id,
            xmin,
            xmax,
            ymin,
            ymax,
            roads = map.roads.len(),
            "Derived tile grid"
        );
        Ok(grid)
    }

    fn lay_road(&mut self, road: &Road) {
        let horizontal = road.is_horizontal();
        let (start, end) = if horizontal {
            road.x_span()
        } else {
            road.y_span()
        };
        let (back, forward) = if horizontal {
            (TileEdges::LEFT, TileEdges::RIGHT)
        } else {
            (TileEdges::UP, TileEdges::DOWN)
        };

        for z in start..=end {
            let (x, y) = if horizontal { (z, road.y0) } else { (road.x0, z) };
            let Some(tile) = self.tile_mut(x, y) else {
                continue;
            };
            tile.road = true;
            if z != start {
                tile.edges |= back;
            }
            if z != end {
                tile.edges |= forward;
            }
        }
    }

    pub fn width(&self) -> usize {
        (self.xmax - self.xmin + 1) as usize
    }

    pub fn height(&self) -> usize {
        (self.ymax - self.ymin + 1) as usize
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < self.xmin || x > self.xmax || y < self.ymin || y > self.ymax {
            return None;
        }
        let col = (x - self.xmin) as usize;
        let row = (y - self.ymin) as usize;
        Some(row * self.width() + col)
    }

    /// Tile at absolute map coordinates.
    pub fn tile(&self, x: i64, y: i64) -> Option<&Tile> {
        self.index(x, y).map(|i| &self.tiles[i])
    }

    fn tile_mut(&mut self, x: i64, y: i64) -> Option<&mut Tile> {
        let i = self.index(x, y)?;
        self.tiles.get_mut(i)
    }

    /// Iterates road tiles with their absolute coordinates, row by row.
    pub fn road_tiles(&self) -> impl Iterator<Item = (i64, i64, &Tile)> {
        let width = self.width();
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.road)
            .map(move |(i, t)| {
                let x = self.xmin + (i % width) as i64;
                let y = self.ymin + (i / width) as i64;
                (x, y, t)
            })
    }
}

/// Number of tiles in `min..=max`, if representable.
fn span_len(min: i64, max: i64) -> Option<usize> {
    let len = max.checked_sub(min)?.checked_add(1)?;
    usize::try_from(len).ok().filter(|&n| n > 0)
}

fn bounds(spans: impl Iterator<Item = (i64, i64)>) -> Option<(i64, i64)> {
    spans.fold(None, |acc, (lo, hi)| match acc {
        None => Some((lo, hi)),
        Some((min, max)) => Some((min.min(lo), max.max(hi))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(roads: Vec<Road>, buildings: Vec<Building>) -> MapDescription {
        MapDescription {
            id: "map1".into(),
            name: "Town".into(),
            roads,
            buildings,
            offices: Vec::new(),
            loot_types: Vec::new(),
        }
    }

    fn horizontal(x0: i64, y0: i64, x1: i64) -> Road {
        Road {
            x0,
            y0,
            x1: Some(x1),
            y1: None,
        }
    }

    fn vertical(x0: i64, y0: i64, y1: i64) -> Road {
        Road {
            x0,
            y0,
            x1: None,
            y1: Some(y1),
        }
    }

    #[test]
    fn empty_map_is_rejected() {
        assert_eq!(
            TileGrid::derive(&map_with(vec![], vec![])),
            Err(MapError::Empty)
        );
    }

    #[test]
    fn horizontal_road_edges() {
        let grid = TileGrid::derive(&map_with(vec![horizontal(0, 0, 3)], vec![])).unwrap();
        assert_eq!((grid.width(), grid.height()), (4, 1));

        let first = grid.tile(0, 0).unwrap();
        assert!(first.road);
        assert_eq!(first.edges, TileEdges::RIGHT);

        let middle = grid.tile(2, 0).unwrap();
        assert_eq!(middle.edges, TileEdges::LEFT | TileEdges::RIGHT);

        let last = grid.tile(3, 0).unwrap();
        assert_eq!(last.edges, TileEdges::LEFT);
    }

    #[test]
    fn reversed_roads_and_crossings() {
        // A vertical road given bottom-up crosses the horizontal one at (2, 0).
        let map = map_with(vec![horizontal(0, 0, 3), vertical(2, 2, -1)], vec![]);
        let grid = TileGrid::derive(&map).unwrap();
        assert_eq!((grid.ymin, grid.ymax), (-1, 2));

        let top = grid.tile(2, -1).unwrap();
        assert_eq!(top.edges, TileEdges::DOWN);

        let crossing = grid.tile(2, 0).unwrap();
        assert_eq!(crossing.edges, TileEdges::all());

        let bottom = grid.tile(2, 2).unwrap();
        assert_eq!(bottom.edges, TileEdges::UP);

        assert!(!grid.tile(0, 1).unwrap().road);
        assert_eq!(grid.road_tiles().count(), 4 + 3);
    }

    #[test]
    fn buildings_extend_bounds() {
        let map = map_with(
            vec![horizontal(0, 0, 2)],
            vec![Building {
                x: 1,
                y: 1,
                w: 4,
                h: 2,
            }],
        );
        let grid = TileGrid::derive(&map).unwrap();
        assert_eq!((grid.xmin, grid.xmax, grid.ymin, grid.ymax), (0, 5, 0, 3));
        assert!(grid.tile(6, 0).is_none());
    }

    #[test]
    fn negative_building_size_is_rejected() {
        let map = map_with(
            vec![horizontal(0, 0, 2)],
            vec![Building {
                x: 5,
                y: 0,
                w: -10,
                h: 1,
            }],
        );
        assert_eq!(
            TileGrid::derive(&map),
            Err(MapError::NegativeSize { x: 5, y: 0 })
        );
    }

    #[test]
    fn huge_extent_is_rejected() {
        let map = map_with(vec![horizontal(i64::MIN, 0, i64::MAX)], vec![]);
        assert_eq!(TileGrid::derive(&map), Err(MapError::TooLarge));
    }

    #[test]
    fn parses_server_map() {
        let body = r##"{
            "id": "map1", "name": "Map 1",
            "roads": [{"x0": 0, "y0": 0, "x1": 40}, {"x0": 40, "y0": 0, "y1": 30}],
            "buildings": [{"x": 5, "y": 5, "w": 30, "h": 20}],
            "offices": [{"id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0}],
            "lootTypes": [{"name": "key", "file": "assets/key.obj", "type": "obj",
                           "rotation": 90, "color": "#338844", "scale": 0.03, "value": 10}]
        }"##;
        let map: MapDescription = serde_json::from_str(body).unwrap();
        assert_eq!(map.loot_types[0].format, "obj");
        assert_eq!(map.offices[0].offset_x, 5);
        let grid = TileGrid::derive(&map).unwrap();
        assert_eq!((grid.width(), grid.height()), (41, 31));
    }
}
