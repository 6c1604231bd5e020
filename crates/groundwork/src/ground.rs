use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Rect;

/// Side length in pixels of one ground cell.
pub const CELL_SIZE: i32 = 8;

/// Terrain classification of an 8x8 cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ground {
    Empty,
    Traversable,
    Wall,
    LowWall,
    WallTopRight,
    WallTopLeft,
    WallBottomLeft,
    WallBottomRight,
    WallTopRightWater,
    WallTopLeftWater,
    WallBottomLeftWater,
    WallBottomRightWater,
    DeepWater,
    ShallowWater,
    Grass,
    Hole,
    Ice,
    Ladder,
    Prickle,
    Lava,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WallCorner {
    TopRight,
    TopLeft,
    BottomLeft,
    BottomRight,
}

impl WallCorner {
    fn wall_on_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight)
    }

    fn diagonal_column(self, row: i32, size8: i32) -> i32 {
        match self {
            Self::TopRight | Self::BottomLeft => row,
            Self::TopLeft | Self::BottomRight => size8 - row - 1,
        }
    }

    fn is_wall_pixel(self, x_in: i32, y_in: i32) -> bool {
        let last = CELL_SIZE - 1;
        match self {
            Self::TopRight => y_in <= x_in,
            Self::TopLeft => x_in + y_in <= last,
            Self::BottomLeft => y_in >= x_in,
            Self::BottomRight => x_in + y_in >= last,
        }
    }
}

impl Ground {
    fn wall_corner(self) -> Option<(WallCorner, Ground)> {
        let corner = match self {
            Self::WallTopRight => (WallCorner::TopRight, Self::Traversable),
            Self::WallTopLeft => (WallCorner::TopLeft, Self::Traversable),
            Self::WallBottomLeft => (WallCorner::BottomLeft, Self::Traversable),
            Self::WallBottomRight => (WallCorner::BottomRight, Self::Traversable),
            Self::WallTopRightWater => (WallCorner::TopRight, Self::DeepWater),
            Self::WallTopLeftWater => (WallCorner::TopLeft, Self::DeepWater),
            Self::WallBottomLeftWater => (WallCorner::BottomLeft, Self::DeepWater),
            Self::WallBottomRightWater => (WallCorner::BottomRight, Self::DeepWater),
            _ => return None,
        };
        Some(corner)
    }

    pub fn is_diagonal(self) -> bool {
        self.wall_corner().is_some()
    }

    /// Ground of one pixel inside a cell tagged with `self`, given the pixel's
    /// offset inside the cell. Only diagonal kinds vary within a cell.
    pub fn resolve_in_cell(self, x_in: i32, y_in: i32) -> Ground {
        match self.wall_corner() {
            Some((corner, open)) => {
                if corner.is_wall_pixel(x_in, y_in) {
                    Self::Wall
                } else {
                    open
                }
            }
            None => self,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    #[default]
    Low,
    Intermediate,
    High,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Low, Layer::Intermediate, Layer::High];

    pub fn index(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Intermediate => 1,
            Self::High => 2,
        }
    }

    pub fn below(self) -> Option<Layer> {
        match self {
            Self::Low => None,
            Self::Intermediate => Some(Self::Low),
            Self::High => Some(Self::Intermediate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroundError {
    #[error("map size {width}x{height} is not a multiple of {CELL_SIZE}")]
    MapSizeNotAligned { width: i32, height: i32 },
    #[error("map size {width}x{height} has too many cells")]
    MapTooLarge { width: i32, height: i32 },
    #[error("tile box {rect:?} is not aligned to the {CELL_SIZE}px ground grid")]
    TileNotAligned { rect: Rect },
    #[error("diagonal ground {ground:?} requires a square tile, got {width}x{height}")]
    DiagonalOnNonSquareTile {
        ground: Ground,
        width: i32,
        height: i32,
    },
}

fn cell_count(width8: i32, height8: i32) -> Option<usize> {
    usize::try_from(width8)
        .ok()?
        .checked_mul(usize::try_from(height8).ok()?)
}

/// Per-layer terrain classification over the 8x8 cell grid of a map.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundGrid {
    width8: i32,
    height8: i32,
    cells: [Vec<Ground>; 3],
}

impl GroundGrid {
    pub fn new(map_width: i32, map_height: i32) -> Result<Self, GroundError> {
        if map_width <= 0
            || map_height <= 0
            || map_width % CELL_SIZE != 0
            || map_height % CELL_SIZE != 0
        {
            return Err(GroundError::MapSizeNotAligned {
                width: map_width,
                height: map_height,
            });
        }
        let width8 = map_width / CELL_SIZE;
        let height8 = map_height / CELL_SIZE;
        let count = cell_count(width8, height8).ok_or(GroundError::MapTooLarge {
            width: map_width,
            height: map_height,
        })?;
        Ok(Self {
            width8,
            height8,
            cells: [
                vec![Ground::Traversable; count],
                vec![Ground::Empty; count],
                vec![Ground::Empty; count],
            ],
        })
    }

    pub fn width8(&self) -> i32 {
        self.width8
    }

    pub fn height8(&self) -> i32 {
        self.height8
    }

    fn index_of(&self, cell_x: i32, cell_y: i32) -> Option<usize> {
        if cell_x < 0 || cell_y < 0 || cell_x >= self.width8 || cell_y >= self.height8 {
            return None;
        }
        Some((cell_y * self.width8 + cell_x) as usize)
    }

    pub fn cell(&self, layer: Layer, cell_x: i32, cell_y: i32) -> Option<Ground> {
        self.index_of(cell_x, cell_y)
            .map(|index| self.cells[layer.index()][index])
    }

    fn set_cell(&mut self, layer: Layer, cell_x: i32, cell_y: i32, ground: Ground) {
        if let Some(index) = self.index_of(cell_x, cell_y) {
            self.cells[layer.index()][index] = ground;
        }
    }

    /// Ground cell covering pixel `(x, y)`. Pixels outside the map read as
    /// `Wall`.
    pub fn tile_ground(&self, layer: Layer, x: i32, y: i32) -> Ground {
        self.cell(layer, x.div_euclid(CELL_SIZE), y.div_euclid(CELL_SIZE))
            .unwrap_or(Ground::Wall)
    }

    pub fn add_tile(&mut self, layer: Layer, rect: Rect, ground: Ground) -> Result<(), GroundError> {
        if rect.is_empty() || !rect.is_aligned_to(CELL_SIZE) {
            return Err(GroundError::TileNotAligned { rect });
        }
        let x8 = rect.x.div_euclid(CELL_SIZE);
        let y8 = rect.y.div_euclid(CELL_SIZE);
        let width8 = rect.width / CELL_SIZE;
        let height8 = rect.height / CELL_SIZE;

        if ground == Ground::Empty {
            return Ok(());
        }

        let Some((corner, open)) = ground.wall_corner() else {
            for cell_y in y8..y8 + height8 {
                for cell_x in x8..x8 + width8 {
                    self.set_cell(layer, cell_x, cell_y, ground);
                }
            }
            return Ok(());
        };

        if width8 != height8 {
            return Err(GroundError::DiagonalOnNonSquareTile {
                ground,
                width: rect.width,
                height: rect.height,
            });
        }
        for row in 0..height8 {
            let diagonal = corner.diagonal_column(row, width8);
            for column in 0..width8 {
                let cell = if column == diagonal {
                    ground
                } else if (column > diagonal) == corner.wall_on_right() {
                    Ground::Wall
                } else {
                    open
                };
                self.set_cell(layer, x8 + column, y8 + row, cell);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GroundGrid {
        GroundGrid::new(64, 64).expect("grid")
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn cell_count_of_huge_maps_does_not_overflow() {
        let side = i32::MAX / CELL_SIZE;
        assert_eq!(
            cell_count(side, side),
            Some(side as usize * side as usize)
        );
        assert_eq!(cell_count(-1, 8), None);
    }

    fn cells(grid: &GroundGrid, layer: Layer, size8: i32) -> Vec<Vec<Ground>> {
        (0..size8)
            .map(|y| {
                (0..size8)
                    .map(|x| grid.cell(layer, x, y).expect("cell"))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn defaults_are_traversable_low_and_empty_above() {
        let grid = grid();
        assert_eq!(grid.width8(), 8);
        assert_eq!(grid.height8(), 8);
        assert_eq!(grid.tile_ground(Layer::Low, 5, 5), Ground::Traversable);
        assert_eq!(grid.tile_ground(Layer::Intermediate, 5, 5), Ground::Empty);
        assert_eq!(grid.tile_ground(Layer::High, 63, 63), Ground::Empty);
    }

    #[test]
    fn rejects_unaligned_map_size() {
        assert_eq!(
            GroundGrid::new(20, 16).expect_err("err"),
            GroundError::MapSizeNotAligned {
                width: 20,
                height: 16
            }
        );
    }

    #[test]
    fn uniform_ground_fills_every_covered_cell() {
        let mut grid = grid();
        grid.add_tile(Layer::Low, Rect::new(8, 16, 24, 8), Ground::Hole)
            .expect("tile");
        for x in 1..4 {
            assert_eq!(grid.cell(Layer::Low, x, 2), Some(Ground::Hole));
        }
        assert_eq!(grid.cell(Layer::Low, 0, 2), Some(Ground::Traversable));
        assert_eq!(grid.cell(Layer::Low, 4, 2), Some(Ground::Traversable));
        assert_eq!(grid.cell(Layer::Low, 1, 3), Some(Ground::Traversable));
    }

    #[test]
    fn wall_top_right_triangulation() {
        let mut grid = grid();
        grid.add_tile(Layer::Low, Rect::new(0, 0, 16, 16), Ground::WallTopRight)
            .expect("tile");
        assert_eq!(grid.cell(Layer::Low, 0, 0), Some(Ground::WallTopRight));
        assert_eq!(grid.cell(Layer::Low, 1, 0), Some(Ground::Wall));
        assert_eq!(grid.cell(Layer::Low, 0, 1), Some(Ground::Traversable));
        assert_eq!(grid.cell(Layer::Low, 1, 1), Some(Ground::WallTopRight));
    }

    #[test]
    fn wall_bottom_right_water_triangulation() {
        let mut grid = grid();
        grid.add_tile(
            Layer::Low,
            Rect::new(0, 0, 16, 16),
            Ground::WallBottomRightWater,
        )
        .expect("tile");
        assert_eq!(
            grid.cell(Layer::Low, 0, 1),
            Some(Ground::WallBottomRightWater)
        );
        assert_eq!(
            grid.cell(Layer::Low, 1, 0),
            Some(Ground::WallBottomRightWater)
        );
        assert_eq!(grid.cell(Layer::Low, 1, 1), Some(Ground::Wall));
        assert_eq!(grid.cell(Layer::Low, 0, 0), Some(Ground::DeepWater));
    }

    #[test]
    fn larger_diagonals_put_walls_on_the_expected_side() {
        use Ground::{Traversable as T, Wall as W};

        let mut grid = grid();
        grid.add_tile(Layer::Low, Rect::new(0, 0, 24, 24), Ground::WallTopLeft)
            .expect("tile");
        let d = Ground::WallTopLeft;
        assert_eq!(
            cells(&grid, Layer::Low, 3),
            vec![vec![W, W, d], vec![W, d, T], vec![d, T, T]]
        );

        let mut grid = GroundGrid::new(64, 64).expect("grid");
        grid.add_tile(Layer::Low, Rect::new(0, 0, 24, 24), Ground::WallBottomLeft)
            .expect("tile");
        let d = Ground::WallBottomLeft;
        assert_eq!(
            cells(&grid, Layer::Low, 3),
            vec![vec![d, T, T], vec![W, d, T], vec![W, W, d]]
        );
    }

    #[test]
    fn diagonal_on_rectangular_tile_is_rejected() {
        let mut grid = grid();
        let err = grid
            .add_tile(Layer::Low, Rect::new(0, 0, 16, 8), Ground::WallTopLeftWater)
            .expect_err("err");
        assert_eq!(
            err,
            GroundError::DiagonalOnNonSquareTile {
                ground: Ground::WallTopLeftWater,
                width: 16,
                height: 8
            }
        );
    }

    #[test]
    fn unaligned_tile_is_rejected() {
        let mut grid = grid();
        let rect = Rect::new(4, 0, 8, 8);
        assert_eq!(
            grid.add_tile(Layer::Low, rect, Ground::Wall),
            Err(GroundError::TileNotAligned { rect })
        );
    }

    #[test]
    fn overhanging_tiles_are_clipped_silently() {
        let mut grid = grid();
        grid.add_tile(Layer::Low, Rect::new(-8, 56, 16, 16), Ground::WallTopRight)
            .expect("tile");
        assert_eq!(grid.cell(Layer::Low, 0, 7), Some(Ground::Wall));
        grid.add_tile(Layer::Low, Rect::new(56, -8, 16, 16), Ground::Lava)
            .expect("tile");
        assert_eq!(grid.cell(Layer::Low, 7, 0), Some(Ground::Lava));
    }

    #[test]
    fn empty_ground_leaves_cells_unchanged() {
        let mut grid = grid();
        grid.add_tile(Layer::Low, Rect::new(0, 0, 8, 8), Ground::Ice)
            .expect("tile");
        grid.add_tile(Layer::Low, Rect::new(0, 0, 8, 8), Ground::Empty)
            .expect("tile");
        assert_eq!(grid.cell(Layer::Low, 0, 0), Some(Ground::Ice));
    }

    #[test]
    fn pixels_outside_the_map_read_as_wall() {
        let grid = grid();
        assert_eq!(grid.tile_ground(Layer::Low, -1, 0), Ground::Wall);
        assert_eq!(grid.tile_ground(Layer::Low, 0, 64), Ground::Wall);
    }

    #[test]
    fn diagonal_cells_split_at_pixel_level() {
        assert_eq!(Ground::WallTopRight.resolve_in_cell(7, 0), Ground::Wall);
        assert_eq!(Ground::WallTopRight.resolve_in_cell(0, 7), Ground::Traversable);
        assert_eq!(Ground::WallTopLeft.resolve_in_cell(0, 0), Ground::Wall);
        assert_eq!(Ground::WallTopLeft.resolve_in_cell(7, 7), Ground::Traversable);
        assert_eq!(Ground::WallBottomLeftWater.resolve_in_cell(0, 7), Ground::Wall);
        assert_eq!(Ground::WallBottomLeftWater.resolve_in_cell(7, 0), Ground::DeepWater);
        assert_eq!(Ground::WallBottomRight.resolve_in_cell(7, 7), Ground::Wall);
        assert_eq!(Ground::Grass.resolve_in_cell(3, 3), Ground::Grass);
    }

    #[test]
    fn ground_names_use_snake_case() {
        let parsed: Ground = serde_json::from_str("\"wall_bottom_right_water\"").expect("ground");
        assert_eq!(parsed, Ground::WallBottomRightWater);
        let parsed: Layer = serde_json::from_str("\"intermediate\"").expect("layer");
        assert_eq!(parsed, Layer::Intermediate);
    }
}
