//! Simulation driver: per-iteration orchestration and the checkpoint loop.
//!
//! Each iteration runs, in order: ghost exchange → x-sweep → (global mode)
//! Δt min-reduction across ranks → y-sweep → update → advance simulated
//! time → snapshot when a checkpoint instant has been crossed.
//!
//! A driver owns the blocks living on its rank: one block per rank in a
//! distributed run, or the whole process grid when running single-process
//! with `ConnectWithinRank` edges. Blocks reference their neighbours by
//! index (arena style); the communication transport is a constructor
//! argument, not a global.

use std::time::Instant;

use log::{info, warn};
use thiserror::Error;

use crate::block::{Block, BlockError};
use crate::comm::{CommError, Transport};
use crate::exchange::{exchange_bathymetry, exchange_ghost_layers};
use crate::flux::{FluxKind, FluxSolver, SolverParams};
use crate::io::{SnapshotError, SnapshotSink};
use crate::layout::{block_extent, ProcessGrid};
use crate::scenario::Scenario;
use crate::timestep::TimestepMode;
use crate::types::{Boundary, Side, Sides};

/// Iteration guard against runaway runs (vanishing Δt, bad parameters).
const MAX_ITERATIONS: usize = 10_000_000;

/// Error from a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A block operation failed.
    #[error(transparent)]
    Block(#[from] BlockError),
    /// Ghost exchange failed.
    #[error(transparent)]
    Comm(#[from] CommError),
    /// A snapshot writer failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Run configuration.
#[derive(Clone, Copy, Debug)]
pub struct SimulationConfig {
    /// Simulated seconds to run.
    pub duration: f64,
    /// Number of snapshot instants (evenly spaced over the duration).
    pub checkpoint_count: usize,
    /// Flux operator variant.
    pub flux: FluxKind,
    /// Physical parameters for the flux operator.
    pub params: SolverParams,
    /// Global or local timestepping.
    pub mode: TimestepMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration: 100.0,
            checkpoint_count: 100,
            flux: FluxKind::default(),
            params: SolverParams::default(),
            mode: TimestepMode::Global,
        }
    }
}

/// Outcome of a completed run.
#[derive(Clone, Copy, Debug)]
pub struct SimulationStats {
    /// Iterations taken.
    pub iterations: usize,
    /// Simulated time reached (minimum over this rank's blocks).
    pub final_time: f64,
    /// Wall-clock seconds spent in the loop.
    pub wall_seconds: f64,
    /// Smallest Δt used.
    pub dt_min: f64,
    /// Largest Δt used.
    pub dt_max: f64,
}

/// Driver for the blocks on one rank.
pub struct Simulation<T: Transport> {
    blocks: Vec<Block>,
    transport: T,
    config: SimulationConfig,
    time: f64,
}

impl<T: Transport> Simulation<T> {
    /// Distributed construction: this rank owns one block of the process
    /// grid, with `Connect` edges toward every neighbouring rank.
    pub fn distributed(
        transport: T,
        grid: &ProcessGrid,
        resolution: (usize, usize),
        scenario: &dyn Scenario,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        let rank = transport.rank();
        let block = build_block(grid, rank, resolution, scenario, &config, false);
        let mut sim = Self {
            blocks: vec![block],
            transport,
            config,
            time: 0.0,
        };
        exchange_bathymetry(&mut sim.blocks, &sim.transport)?;
        Ok(sim)
    }

    /// Single-process construction: every block of the process grid lives
    /// in this driver, connected through `ConnectWithinRank` arena edges.
    pub fn single_process(
        transport: T,
        grid: &ProcessGrid,
        resolution: (usize, usize),
        scenario: &dyn Scenario,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        let blocks = (0..grid.ranks)
            .map(|rank| build_block(grid, rank, resolution, scenario, &config, true))
            .collect();
        let mut sim = Self {
            blocks,
            transport,
            config,
            time: 0.0,
        };
        exchange_bathymetry(&mut sim.blocks, &sim.transport)?;
        Ok(sim)
    }

    /// Blocks on this rank.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Simulated time reached so far (minimum over this rank's blocks).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Run configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Total water mass over this rank's blocks.
    pub fn mass(&self) -> f64 {
        self.blocks.iter().map(Block::mass).sum()
    }

    /// One full iteration. Returns the Δt applied (the global Δt in global
    /// mode; the smallest Δt any advancing block used in local mode, or 0.0
    /// if every block was out of sync).
    pub fn step(&mut self) -> Result<f64, SimulationError> {
        exchange_ghost_layers(&mut self.blocks, &self.transport)?;

        let dt = match self.config.mode {
            TimestepMode::Global => {
                for block in &mut self.blocks {
                    block.compute_x_sweep();
                }
                let local_min = self
                    .blocks
                    .iter()
                    .map(Block::max_timestep)
                    .fold(f64::INFINITY, f64::min);
                let dt = self.transport.all_reduce_min(local_min)?;
                assert!(
                    dt.is_finite() && dt > 0.0,
                    "no finite timestep candidate; domain entirely dry?"
                );
                for block in &mut self.blocks {
                    block.set_max_timestep(dt);
                    block.compute_y_sweep();
                }
                for block in &mut self.blocks {
                    block.update_unknowns(dt)?;
                }
                dt
            }
            TimestepMode::Local(_) => {
                let mut smallest_applied = f64::INFINITY;
                for block in &mut self.blocks {
                    if !block.all_ghost_layers_in_sync() {
                        continue;
                    }
                    block.compute_x_sweep();
                    block.compute_y_sweep();
                    let dt = block.max_timestep();
                    block.update_unknowns(dt)?;
                    smallest_applied = smallest_applied.min(dt);
                }
                if smallest_applied.is_finite() {
                    smallest_applied
                } else {
                    0.0
                }
            }
        };

        self.time = self
            .blocks
            .iter()
            .map(Block::total_local_timestep)
            .fold(f64::INFINITY, f64::min);
        Ok(dt)
    }

    /// Run to the configured duration, emitting snapshots at every
    /// checkpoint instant (plus the initial state at t = 0).
    ///
    /// `sinks` holds one writer per block, in block order.
    pub fn run(
        &mut self,
        sinks: &mut [Box<dyn SnapshotSink>],
    ) -> Result<SimulationStats, SimulationError> {
        assert_eq!(
            sinks.len(),
            self.blocks.len(),
            "one snapshot sink per block"
        );

        for (block, sink) in self.blocks.iter().zip(sinks.iter_mut()) {
            sink.write(block, 0.0)?;
        }

        let checkpoint_delta = self.config.duration / self.config.checkpoint_count as f64;
        let start = Instant::now();
        let mut iterations = 0usize;
        let mut dt_min = f64::INFINITY;
        let mut dt_max: f64 = 0.0;

        'checkpoints: for checkpoint in 1..=self.config.checkpoint_count {
            let instant = checkpoint as f64 * checkpoint_delta;
            while self.time < instant {
                let dt = self.step()?;
                iterations += 1;
                if dt > 0.0 {
                    dt_min = dt_min.min(dt);
                    dt_max = dt_max.max(dt);
                }
                if iterations >= MAX_ITERATIONS {
                    warn!("iteration limit reached at t = {}", self.time);
                    break 'checkpoints;
                }
            }
            if self.transport.rank() == 0 {
                info!("checkpoint {checkpoint} at t = {:.3}s", self.time);
            }
            for (block, sink) in self.blocks.iter().zip(sinks.iter_mut()) {
                sink.write(block, self.time)?;
            }
        }

        Ok(SimulationStats {
            iterations,
            final_time: self.time,
            wall_seconds: start.elapsed().as_secs_f64(),
            dt_min,
            dt_max,
        })
    }
}

/// Build one rank's block: extent and origin from the layout, boundary
/// types from the tiling (connect toward neighbours, scenario type at the
/// domain edge), initial state from the scenario.
fn build_block(
    grid: &ProcessGrid,
    rank: usize,
    resolution: (usize, usize),
    scenario: &dyn Scenario,
    config: &SimulationConfig,
    within_rank: bool,
) -> Block {
    let bounds = scenario.bounds();
    let extent = block_extent(grid, rank, resolution.0, resolution.1, &bounds);
    let dx = bounds.width() / resolution.0 as f64;
    let dy = bounds.height() / resolution.1 as f64;

    let mut block = Block::new(
        extent.nx,
        extent.ny,
        dx,
        dy,
        extent.origin_x,
        extent.origin_y,
        FluxSolver::from_kind(config.flux, config.params),
        config.mode,
    );

    let boundaries = Sides::new(
        edge_boundary(grid, rank, Side::Left, scenario, within_rank),
        edge_boundary(grid, rank, Side::Right, scenario, within_rank),
        edge_boundary(grid, rank, Side::Bottom, scenario, within_rank),
        edge_boundary(grid, rank, Side::Top, scenario, within_rank),
    );
    block.init_scenario(scenario, boundaries);
    block
}

fn edge_boundary(
    grid: &ProcessGrid,
    rank: usize,
    side: Side,
    scenario: &dyn Scenario,
    within_rank: bool,
) -> Boundary {
    match grid.neighbour(rank, side) {
        Some(neighbour) if within_rank => Boundary::ConnectWithinRank(neighbour),
        Some(neighbour) => Boundary::Connect(neighbour),
        None => Block::scenario_boundary(scenario.boundary_type(side)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::NullTransport;
    use crate::scenario::StillWater;
    use crate::types::{DomainBounds, Side};

    fn config() -> SimulationConfig {
        SimulationConfig {
            duration: 1.0,
            checkpoint_count: 1,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn single_process_wires_arena_edges() {
        let scenario = StillWater {
            bounds: DomainBounds::new(0.0, 8.0, 0.0, 8.0),
            depth: 1.0,
            bed: -1.0,
        };
        let grid = ProcessGrid::new(4);
        let sim =
            Simulation::single_process(NullTransport, &grid, (8, 8), &scenario, config()).unwrap();
        assert_eq!(sim.blocks().len(), 4);
        // Block 0 sits bottom-left: connected right and top, walls left
        // and bottom.
        let b = &sim.blocks()[0];
        assert_eq!(b.boundaries()[Side::Right], Boundary::ConnectWithinRank(2));
        assert_eq!(b.boundaries()[Side::Top], Boundary::ConnectWithinRank(1));
        assert_eq!(b.boundaries()[Side::Left], Boundary::Wall);
        assert_eq!(b.boundaries()[Side::Bottom], Boundary::Wall);
    }

    #[test]
    fn step_advances_time_and_conserves_walled_mass() {
        let scenario = StillWater {
            bounds: DomainBounds::new(0.0, 8.0, 0.0, 8.0),
            depth: 2.0,
            bed: -2.0,
        };
        let grid = ProcessGrid::new(2);
        let mut sim =
            Simulation::single_process(NullTransport, &grid, (8, 8), &scenario, config()).unwrap();
        let mass0 = sim.mass();
        for _ in 0..5 {
            let dt = sim.step().unwrap();
            assert!(dt > 0.0);
        }
        assert!(sim.time() > 0.0);
        assert!((sim.mass() - mass0).abs() < 1e-9 * mass0);
    }

    #[test]
    fn blocks_partition_the_requested_resolution() {
        let scenario = StillWater {
            bounds: DomainBounds::new(0.0, 10.0, 0.0, 10.0),
            depth: 1.0,
            bed: -1.0,
        };
        let grid = ProcessGrid::new(2);
        let sim =
            Simulation::single_process(NullTransport, &grid, (10, 10), &scenario, config()).unwrap();
        let nx_total: usize = sim.blocks().iter().map(|b| b.nx()).sum();
        assert_eq!(nx_total, 10);
        assert!(sim.blocks().iter().all(|b| b.ny() == 10));
    }
}
