//! The controller's side channel for grids: raw row-major bytes in an
//! images directory, `{H}x{W}` in, `{H}x{W}x{turn}` out.

use std::path::PathBuf;

use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use gol_common::grid::{Grid, GridError, ALIVE, DEAD};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("grid io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("grid file is malformed: {0}")]
    Malformed(#[from] GridError),
}

#[derive(Clone)]
pub struct GridStore {
    dir: PathBuf,
}

impl GridStore {
    pub fn new(dir: PathBuf) -> GridStore {
        GridStore { dir }
    }

    /// Reads `{height}x{width}`; a missing file falls back to a random
    /// seed so a bare checkout can still run.
    pub async fn load_or_random(&self, height: usize, width: usize) -> Result<Grid, StoreError> {
        let path = self.dir.join(format!("{height}x{width}"));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Grid::from_raw(height, width, &bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("no grid file at {}, seeding randomly", path.display());
                Ok(random_grid(height, width))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, grid: &Grid, turn: u32) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(format!("{}x{}x{turn}", grid.height(), grid.width()));
        tokio::fs::write(&path, grid.to_raw()).await?;
        info!("wrote {}", path.display());
        Ok(())
    }
}

fn random_grid(height: usize, width: usize) -> Grid {
    let mut rng = rand::thread_rng();
    Grid {
        rows: (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| if rng.gen_bool(0.5) { ALIVE } else { DEAD })
                    .collect()
            })
            .collect(),
    }
}
