use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Byte value of a live cell.
pub const ALIVE: u8 = 0xFF;
/// Byte value of a dead cell.
pub const DEAD: u8 = 0x00;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GridError {
    #[error("grid has no rows")]
    Empty,
    #[error("grid rows must not be empty")]
    ZeroWidth,
    #[error("row {row} is {found} cells wide, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("cell ({x}, {y}) holds {value:#04x}, which is neither alive nor dead")]
    BadCell { x: usize, y: usize, value: u8 },
    #[error("raw buffer holds {found} bytes, expected {expected} for a {height}x{width} grid")]
    BadLength {
        found: usize,
        expected: usize,
        height: usize,
        width: usize,
    },
}

/// Coordinate of a live cell, column first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

/// A full toroidal world: H rows of W cell bytes.
///
/// The derived serde impls do not validate, so anything arriving off the
/// wire goes through [`Grid::validate`] before it is trusted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: Vec<Vec<u8>>,
}

impl Grid {
    pub fn dead(height: usize, width: usize) -> Grid {
        Grid {
            rows: vec![vec![DEAD; width]; height],
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    /// Checks the shape and cell-value invariants the derived
    /// `Deserialize` cannot enforce.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.rows.is_empty() {
            return Err(GridError::Empty);
        }
        let width = self.rows[0].len();
        if width == 0 {
            return Err(GridError::ZeroWidth);
        }
        for (y, row) in self.rows.iter().enumerate() {
            if row.len() != width {
                return Err(GridError::RaggedRow {
                    row: y,
                    found: row.len(),
                    expected: width,
                });
            }
            for (x, &value) in row.iter().enumerate() {
                if value != ALIVE && value != DEAD {
                    return Err(GridError::BadCell { x, y, value });
                }
            }
        }
        Ok(())
    }

    /// Decodes the row-major byte encoding used by the grid store.
    pub fn from_raw(height: usize, width: usize, bytes: &[u8]) -> Result<Grid, GridError> {
        if height == 0 {
            return Err(GridError::Empty);
        }
        if width == 0 {
            return Err(GridError::ZeroWidth);
        }
        if bytes.len() != height * width {
            return Err(GridError::BadLength {
                found: bytes.len(),
                expected: height * width,
                height,
                width,
            });
        }
        let grid = Grid {
            rows: bytes.chunks(width).map(<[u8]>::to_vec).collect(),
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Row-major byte encoding, the inverse of [`Grid::from_raw`].
    pub fn to_raw(&self) -> Vec<u8> {
        self.rows.concat()
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.rows[y][x] = value;
    }

    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.rows[y][x] == ALIVE
    }

    pub fn alive_count(&self) -> u64 {
        self.rows
            .iter()
            .flatten()
            .filter(|&&cell| cell == ALIVE)
            .count() as u64
    }

    pub fn alive_cells(&self) -> Vec<Cell> {
        let mut cells = Vec::new();
        for (y, row) in self.rows.iter().enumerate() {
            for (x, &cell) in row.iter().enumerate() {
                if cell == ALIVE {
                    cells.push(Cell { x, y });
                }
            }
        }
        cells
    }

    fn live_neighbours(&self, x: usize, y: usize) -> u8 {
        let height = self.height() as isize;
        let width = self.width() as isize;
        let mut alive = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dy == 0 && dx == 0 {
                    continue;
                }
                let ny = (y as isize + dy).rem_euclid(height) as usize;
                let nx = (x as isize + dx).rem_euclid(width) as usize;
                if self.rows[ny][nx] == ALIVE {
                    alive += 1;
                }
            }
        }
        alive
    }

    /// One synchronous application of the rule over the whole torus.
    ///
    /// This is the single-process reference the distributed pipeline must
    /// agree with pointwise; the workers run the same rule over strips.
    pub fn step(&self) -> Grid {
        let mut next = Grid::dead(self.height(), self.width());
        for y in 0..self.height() {
            for x in 0..self.width() {
                next.rows[y][x] = next_state(self.rows[y][x], self.live_neighbours(x, y));
            }
        }
        next
    }
}

/// The B3/S23 rule for one cell given its live-neighbour count.
pub fn next_state(cell: u8, live_neighbours: u8) -> u8 {
    if cell == ALIVE {
        match live_neighbours {
            2 | 3 => ALIVE,
            _ => DEAD,
        }
    } else if live_neighbours == 3 {
        ALIVE
    } else {
        DEAD
    }
}
