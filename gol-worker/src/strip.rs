//! The strip state machine: Uninitialized → Start → Ready → Step* → Stop.
//!
//! A strip stores its owned rows plus one halo row on each side. The
//! stencil wraps horizontally inside the strip; vertical neighbours come
//! from the halo slots, which the caller refreshes before every step.

use gol_common::grid::{next_state, ALIVE};

use crate::error::WorkerError;

#[derive(Debug)]
pub struct Strip {
    worker_id: usize,
    width: usize,
    /// Index 0 is the top halo, the last index the bottom halo.
    rows: Vec<Vec<u8>>,
}

impl Strip {
    /// Validates an `owned + 2`-row payload and takes ownership of it.
    /// The caller is expected to advance once immediately; Start counts
    /// as the run's first turn.
    pub fn new(rows: Vec<Vec<u8>>, worker_id: usize) -> Result<Strip, WorkerError> {
        if rows.len() < 3 {
            return Err(WorkerError::InvalidInput(format!(
                "a strip needs at least one owned row between two halos, got {} rows",
                rows.len()
            )));
        }
        let width = rows[0].len();
        if width == 0 {
            return Err(WorkerError::InvalidInput("rows must not be empty".into()));
        }
        if let Some(bad) = rows.iter().position(|row| row.len() != width) {
            return Err(WorkerError::InvalidInput(format!(
                "row {bad} is {} cells wide, expected {width}",
                rows[bad].len()
            )));
        }
        Ok(Strip {
            worker_id,
            width,
            rows,
        })
    }

    /// Installs fresh halos and advances one turn.
    pub fn step(
        &mut self,
        top_halo: Vec<u8>,
        bottom_halo: Vec<u8>,
    ) -> Result<(Vec<u8>, Vec<u8>), WorkerError> {
        if top_halo.len() != self.width || bottom_halo.len() != self.width {
            return Err(WorkerError::InvalidInput(format!(
                "halo widths {}/{} do not match strip width {}",
                top_halo.len(),
                bottom_halo.len(),
                self.width
            )));
        }
        self.rows[0] = top_halo;
        *self.rows.last_mut().expect("strip always has rows") = bottom_halo;
        Ok(self.advance())
    }

    /// Applies the rule to every owned row in place and returns the new
    /// edge rows. Halo slots are left untouched; they are stale until the
    /// next step installs fresh ones.
    pub fn advance(&mut self) -> (Vec<u8>, Vec<u8>) {
        let owned = self.owned_rows();
        let mut next = Vec::with_capacity(owned);
        for y in 1..=owned {
            let mut row = Vec::with_capacity(self.width);
            for x in 0..self.width {
                row.push(next_state(self.rows[y][x], self.live_neighbours(x, y)));
            }
            next.push(row);
        }
        for (i, row) in next.into_iter().enumerate() {
            self.rows[i + 1] = row;
        }
        (self.rows[1].clone(), self.rows[owned].clone())
    }

    fn live_neighbours(&self, x: usize, y: usize) -> u8 {
        let width = self.width as isize;
        let mut alive = 0;
        for dy in -1..=1_isize {
            for dx in -1..=1_isize {
                if dy == 0 && dx == 0 {
                    continue;
                }
                // y ± 1 always lands on a stored row thanks to the halos.
                let ny = (y as isize + dy) as usize;
                let nx = (x as isize + dx).rem_euclid(width) as usize;
                if self.rows[ny][nx] == ALIVE {
                    alive += 1;
                }
            }
        }
        alive
    }

    /// The owned rows with halos stripped.
    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        self.rows[1..=self.owned_rows()].to_vec()
    }

    pub fn alive_count(&self) -> u64 {
        self.rows[1..=self.owned_rows()]
            .iter()
            .flatten()
            .filter(|&&cell| cell == ALIVE)
            .count() as u64
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    fn owned_rows(&self) -> usize {
        self.rows.len() - 2
    }
}
