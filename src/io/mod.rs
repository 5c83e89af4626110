//! Snapshot output.
//!
//! The solver treats snapshot writing as an external, synchronous
//! collaborator: the driver hands each block's state and the simulated time
//! to a [`SnapshotSink`] and waits. One sink per block; writes for a block
//! are serialized by construction.

mod vtk;

pub use vtk::{block_base_name, VtkWriter};

use thiserror::Error;

use crate::block::Block;

/// Error from snapshot writing.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// I/O error during file operations.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumer of per-checkpoint block state.
pub trait SnapshotSink {
    /// Persist `(h, hu, hv)` of the block's interior at `time`.
    fn write(&mut self, block: &Block, time: f64) -> Result<(), SnapshotError>;
}

/// Sink that drops everything; for runs where only the final statistics
/// matter, and for tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn write(&mut self, _block: &Block, _time: f64) -> Result<(), SnapshotError> {
        Ok(())
    }
}
