//! Legacy-VTK snapshot writer.
//!
//! Writes one `STRUCTURED_POINTS` file per block per checkpoint, readable
//! by ParaView and friends. Cell data carries water height, both momenta,
//! bathymetry, and the simulated time as a field array. The ghost ring is
//! excluded via the writer's ghost-size descriptor.
//!
//! File names are deterministic: `{base}_{bx}_{by}_{counter:04}.vtk`, so
//! `out_1_0_0007.vtk` is checkpoint 7 of the block at position (1, 0).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::block::Block;
use crate::types::GhostSize;

use super::{SnapshotError, SnapshotSink};

/// Deterministic per-block file-name stem from an output base name and the
/// block's position in the process grid.
pub fn block_base_name(base: &str, bx: usize, by: usize) -> String {
    format!("{base}_{bx}_{by}")
}

/// Snapshot writer producing one legacy-VTK file per checkpoint.
pub struct VtkWriter {
    base: String,
    ghost: GhostSize,
    counter: usize,
}

impl VtkWriter {
    /// Create a writer for the block at process-grid position `(bx, by)`.
    ///
    /// `ghost` describes the halo widths to skip; the solver always passes
    /// a one-cell ring.
    pub fn new(base: &str, bx: usize, by: usize, ghost: GhostSize) -> Self {
        Self {
            base: block_base_name(base, bx, by),
            ghost,
            counter: 0,
        }
    }

    fn next_path(&mut self) -> PathBuf {
        let path = PathBuf::from(format!("{}_{:04}.vtk", self.base, self.counter));
        self.counter += 1;
        path
    }
}

impl SnapshotSink for VtkWriter {
    fn write(&mut self, block: &Block, time: f64) -> Result<(), SnapshotError> {
        let path = self.next_path();
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);

        let GhostSize(ghost) = self.ghost;
        let nx = block.nx();
        let ny = block.ny();
        let h = block.water_height();
        let hu = block.momentum_x();
        let hv = block.momentum_y();
        let b = block.bathymetry();

        writeln!(out, "# vtk DataFile Version 2.0")?;
        writeln!(out, "shallow water snapshot t={time}")?;
        writeln!(out, "ASCII")?;
        writeln!(out, "DATASET STRUCTURED_POINTS")?;
        writeln!(out, "DIMENSIONS {} {} 1", nx + 1, ny + 1)?;
        writeln!(out, "ORIGIN {} {} 0", block.origin_x(), block.origin_y())?;
        writeln!(out, "SPACING {} {} 1", block.dx(), block.dy())?;
        writeln!(out, "CELL_DATA {}", nx * ny)?;

        writeln!(out, "FIELD FieldData 1")?;
        writeln!(out, "TIME 1 1 double")?;
        writeln!(out, "{time}")?;

        for (name, grid) in [("h", h), ("hu", hu), ("hv", hv), ("b", b)] {
            writeln!(out, "SCALARS {name} double 1")?;
            writeln!(out, "LOOKUP_TABLE default")?;
            for y in ghost.bottom..ghost.bottom + ny {
                for x in ghost.left..ghost.left + nx {
                    writeln!(out, "{}", grid[(x, y)])?;
                }
            }
        }

        out.flush()?;
        Ok(())
    }
}
