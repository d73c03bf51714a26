use thiserror::Error;

use crate::grid::{Grid, GridError};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PartitionError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("a grid of height {height} cannot be split across {workers} workers")]
    TooManyWorkers { height: usize, workers: usize },
}

/// One worker's share of the grid: global row range `[start, start + rows)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StripSpec {
    pub start: usize,
    pub rows: usize,
}

/// Splits `height` rows across `workers`: the first N-1 workers own
/// ⌊H/N⌋ rows each and the last picks up the remainder.
pub fn split(height: usize, workers: usize) -> Result<Vec<StripSpec>, PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if height < workers {
        return Err(PartitionError::TooManyWorkers { height, workers });
    }
    let base = height / workers;
    Ok((0..workers)
        .map(|i| StripSpec {
            start: i * base,
            rows: if i == workers - 1 {
                base + height % workers
            } else {
                base
            },
        })
        .collect())
}

/// The initial strip payload for one worker: its owned rows bracketed by
/// the toroidally adjacent rows as halos.
pub fn strip_with_halos(grid: &Grid, spec: StripSpec) -> Vec<Vec<u8>> {
    let height = grid.height();
    let mut rows = Vec::with_capacity(spec.rows + 2);
    rows.push(grid.rows[(spec.start + height - 1) % height].clone());
    rows.extend_from_slice(&grid.rows[spec.start..spec.start + spec.rows]);
    rows.push(grid.rows[(spec.start + spec.rows) % height].clone());
    rows
}

/// Reassembles worker snapshots, given in worker-id order, into a grid.
pub fn assemble(strips: Vec<Vec<Vec<u8>>>) -> Result<Grid, GridError> {
    let grid = Grid {
        rows: strips.into_iter().flatten().collect(),
    };
    grid.validate()?;
    Ok(grid)
}
