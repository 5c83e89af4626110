//! Sweep kernels: the dimensionally-split flux loops.
//!
//! The x-sweep evaluates the flux operator across the edge between
//! `(x, y)` and `(x+1, y)` for every `0 ≤ x ≤ nx`, `0 ≤ y ≤ ny+1` and
//! accumulates the left-going wave at cell `x` and the right-going wave at
//! cell `x+1`. The y-sweep first forms the intermediate star states at the
//! fixed Δt, then runs the same operator across horizontal edges with `hv`
//! in place of `hu`.
//!
//! Each edge writes disjoint columns of the four net-update arrays, so the
//! parallel variants split the outer x loop across threads by handing each
//! task its own contiguous column chunks; each thread carries a private
//! copy of the flux operator and the wave-speed reduction is a max. The
//! inner y loops carry no loop dependency and read/write contiguously, so
//! they are open to vectorization.

use crate::flux::WavePropagationSolver;

use super::Block;

/// X-sweep over every vertical edge. Returns the maximum horizontal wave
/// speed observed.
#[cfg_attr(feature = "parallel", allow(dead_code))]
pub(super) fn x_sweep_serial(block: &mut Block) -> f64 {
    let (nx, ny) = (block.nx, block.ny);
    let mut max_speed = 0.0f64;
    for x in 0..=nx {
        for y in 0..ny + 2 {
            let upd = block.solver.compute_net_updates(
                block.h[(x, y)],
                block.h[(x + 1, y)],
                block.hu[(x, y)],
                block.hu[(x + 1, y)],
                block.b[(x, y)],
                block.b[(x + 1, y)],
            );
            block.h_net_left[(x, y)] = upd.h_left;
            block.h_net_right[(x + 1, y)] = upd.h_right;
            block.hu_net_left[(x, y)] = upd.hu_left;
            block.hu_net_right[(x + 1, y)] = upd.hu_right;
            max_speed = max_speed.max(upd.max_wave_speed);
        }
    }
    max_speed
}

/// Parallel x-sweep: one task per edge column.
///
/// Edge `x` owns column `x` of the left-going arrays and column `x+1` of
/// the right-going arrays, so the column chunks handed to each task are
/// disjoint by construction.
#[cfg(feature = "parallel")]
pub(super) fn x_sweep_parallel(block: &mut Block) -> f64 {
    use rayon::prelude::*;

    let (nx, ny) = (block.nx, block.ny);
    let stride = ny + 2;
    let solver = block.solver;
    let h = block.h.as_slice();
    let hu = block.hu.as_slice();
    let b = block.b.as_slice();

    let hl = block.h_net_left.as_mut_slice();
    let hr = block.h_net_right.as_mut_slice();
    let hul = block.hu_net_left.as_mut_slice();
    let hur = block.hu_net_right.as_mut_slice();

    hl.par_chunks_mut(stride)
        .take(nx + 1)
        .zip(hr[stride..].par_chunks_mut(stride))
        .zip(hul.par_chunks_mut(stride).take(nx + 1))
        .zip(hur[stride..].par_chunks_mut(stride))
        .enumerate()
        .map(|(x, (((hl_col, hr_col), hul_col), hur_col))| {
            let local_solver = solver;
            let h_l = &h[x * stride..(x + 1) * stride];
            let h_r = &h[(x + 1) * stride..(x + 2) * stride];
            let hu_l = &hu[x * stride..(x + 1) * stride];
            let hu_r = &hu[(x + 1) * stride..(x + 2) * stride];
            let b_l = &b[x * stride..(x + 1) * stride];
            let b_r = &b[(x + 1) * stride..(x + 2) * stride];

            let mut local_max = 0.0f64;
            for y in 0..stride {
                let upd = local_solver
                    .compute_net_updates(h_l[y], h_r[y], hu_l[y], hu_r[y], b_l[y], b_r[y]);
                hl_col[y] = upd.h_left;
                hr_col[y] = upd.h_right;
                hul_col[y] = upd.hu_left;
                hur_col[y] = upd.hu_right;
                local_max = local_max.max(upd.max_wave_speed);
            }
            local_max
        })
        .reduce(|| 0.0f64, f64::max)
}

/// Y-sweep: star states at the fixed Δt, then net updates across every
/// horizontal edge. Returns the maximum vertical wave speed observed.
#[cfg_attr(feature = "parallel", allow(dead_code))]
pub(super) fn y_sweep_serial(block: &mut Block) -> f64 {
    let (nx, ny) = (block.nx, block.ny);
    let rel_x = block.max_timestep / block.dx;

    for x in 1..=nx {
        for y in 0..ny + 2 {
            block.h_star[(x, y)] = block.h[(x, y)]
                - rel_x * (block.h_net_left[(x, y)] + block.h_net_right[(x, y)]);
            block.hu_star[(x, y)] = block.hu[(x, y)]
                - rel_x * (block.hu_net_left[(x, y)] + block.hu_net_right[(x, y)]);
        }
    }

    let mut max_speed = 0.0f64;
    for x in 1..=nx {
        for y in 0..=ny {
            let upd = block.solver.compute_net_updates(
                block.h[(x, y)],
                block.h[(x, y + 1)],
                block.hv[(x, y)],
                block.hv[(x, y + 1)],
                block.b[(x, y)],
                block.b[(x, y + 1)],
            );
            block.h_net_below[(x, y)] = upd.h_left;
            block.h_net_above[(x, y + 1)] = upd.h_right;
            block.hv_net_below[(x, y)] = upd.hu_left;
            block.hv_net_above[(x, y + 1)] = upd.hu_right;
            max_speed = max_speed.max(upd.max_wave_speed);
        }
    }
    max_speed
}

/// Parallel y-sweep: one task per interior column; stars and vertical net
/// updates for a column never leave it.
#[cfg(feature = "parallel")]
pub(super) fn y_sweep_parallel(block: &mut Block) -> f64 {
    use rayon::prelude::*;

    let (nx, ny) = (block.nx, block.ny);
    let stride = ny + 2;
    let rel_x = block.max_timestep / block.dx;
    let solver = block.solver;

    let h = block.h.as_slice();
    let hu = block.hu.as_slice();
    let hv = block.hv.as_slice();
    let b = block.b.as_slice();
    let hnl = block.h_net_left.as_slice();
    let hnr = block.h_net_right.as_slice();
    let hunl = block.hu_net_left.as_slice();
    let hunr = block.hu_net_right.as_slice();

    // Star and vertical-update arrays all have nx+1 columns; column 0 is
    // unused, so the chunking starts at column 1.
    let h_star = &mut block.h_star.as_mut_slice()[stride..];
    let hu_star = &mut block.hu_star.as_mut_slice()[stride..];
    let below = &mut block.h_net_below.as_mut_slice()[stride..];
    let above = &mut block.h_net_above.as_mut_slice()[stride..];
    let hv_below = &mut block.hv_net_below.as_mut_slice()[stride..];
    let hv_above = &mut block.hv_net_above.as_mut_slice()[stride..];

    h_star
        .par_chunks_mut(stride)
        .zip(hu_star.par_chunks_mut(stride))
        .zip(below.par_chunks_mut(stride))
        .zip(above.par_chunks_mut(stride))
        .zip(hv_below.par_chunks_mut(stride))
        .zip(hv_above.par_chunks_mut(stride))
        .enumerate()
        .map(
            |(i, (((((hs_col, hus_col), below_col), above_col), hvb_col), hva_col))| {
                let x = i + 1;
                let local_solver = solver;
                let h_col = &h[x * stride..(x + 1) * stride];
                let hu_col = &hu[x * stride..(x + 1) * stride];
                let hv_col = &hv[x * stride..(x + 1) * stride];
                let b_col = &b[x * stride..(x + 1) * stride];
                let hnl_col = &hnl[x * stride..(x + 1) * stride];
                let hnr_col = &hnr[x * stride..(x + 1) * stride];
                let hunl_col = &hunl[x * stride..(x + 1) * stride];
                let hunr_col = &hunr[x * stride..(x + 1) * stride];

                for y in 0..stride {
                    hs_col[y] = h_col[y] - rel_x * (hnl_col[y] + hnr_col[y]);
                    hus_col[y] = hu_col[y] - rel_x * (hunl_col[y] + hunr_col[y]);
                }

                let mut local_max = 0.0f64;
                for y in 0..=ny {
                    let upd = local_solver.compute_net_updates(
                        h_col[y],
                        h_col[y + 1],
                        hv_col[y],
                        hv_col[y + 1],
                        b_col[y],
                        b_col[y + 1],
                    );
                    below_col[y] = upd.h_left;
                    above_col[y + 1] = upd.h_right;
                    hvb_col[y] = upd.hu_left;
                    hva_col[y + 1] = upd.hu_right;
                    local_max = local_max.max(upd.max_wave_speed);
                }
                local_max
            },
        )
        .reduce(|| 0.0f64, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux::{FluxKind, FluxSolver, SolverParams};
    use crate::scenario::{RadialDamBreak, ScenarioBoundary};
    use crate::timestep::TimestepMode;
    use crate::types::{Boundary, DomainBounds, Sides};

    fn dam_break_block(n: usize) -> Block {
        let scenario = RadialDamBreak {
            bounds: DomainBounds::new(0.0, n as f64, 0.0, n as f64),
            center: (n as f64 / 2.0, n as f64 / 2.0),
            radius: n as f64 / 4.0,
            h_inner: 2.0,
            h_outer: 1.0,
            bed: -2.0,
            boundary: ScenarioBoundary::Outflow,
        };
        let mut block = Block::new(
            n,
            n,
            1.0,
            1.0,
            0.0,
            0.0,
            FluxSolver::from_kind(FluxKind::Hlle, SolverParams::default()),
            TimestepMode::Global,
        );
        let boundaries = Sides::uniform(Boundary::Outflow);
        block.init_scenario(&scenario, boundaries);
        block.apply_boundary_conditions();
        block
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_x_sweep_matches_serial() {
        let mut serial = dam_break_block(16);
        let mut parallel = dam_break_block(16);
        let speed_serial = x_sweep_serial(&mut serial);
        let speed_parallel = x_sweep_parallel(&mut parallel);
        assert_eq!(speed_serial, speed_parallel, "max is order-independent");
        assert_eq!(
            serial.h_net_left.as_slice(),
            parallel.h_net_left.as_slice()
        );
        assert_eq!(
            serial.hu_net_right.as_slice(),
            parallel.hu_net_right.as_slice()
        );
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_y_sweep_matches_serial() {
        let mut serial = dam_break_block(16);
        let mut parallel = dam_break_block(16);
        let _ = x_sweep_serial(&mut serial);
        let _ = x_sweep_parallel(&mut parallel);
        serial.max_timestep = 0.05;
        parallel.max_timestep = 0.05;
        let speed_serial = y_sweep_serial(&mut serial);
        let speed_parallel = y_sweep_parallel(&mut parallel);
        assert_eq!(speed_serial, speed_parallel);
        assert_eq!(serial.h_star.as_slice(), parallel.h_star.as_slice());
        assert_eq!(
            serial.h_net_above.as_slice(),
            parallel.h_net_above.as_slice()
        );
        assert_eq!(
            serial.hv_net_below.as_slice(),
            parallel.hv_net_below.as_slice()
        );
    }

    #[test]
    fn x_sweep_writes_each_edge_cell_exactly_once() {
        // Poison the net-update arrays, run the sweep, and check which
        // entries were overwritten: every edge target in the sweep range,
        // and nothing outside it (column 0 of the right-going arrays has no
        // generating edge).
        let mut block = dam_break_block(4);
        const POISON: f64 = 777.25;
        block.h_net_left.fill(POISON);
        block.h_net_right.fill(POISON);
        let speed = x_sweep_serial(&mut block);
        assert!(speed > 0.0);

        for y in 0..block.ny + 2 {
            for x in 0..=block.nx {
                assert_ne!(block.h_net_left[(x, y)], POISON, "left at ({x}, {y})");
                assert_ne!(block.h_net_right[(x + 1, y)], POISON, "right at ({x}, {y})");
            }
            assert_eq!(
                block.h_net_right[(0, y)],
                POISON,
                "no edge generates a right-going wave into column 0"
            );
            assert_eq!(
                block.h_net_left[(block.nx + 1, y)],
                POISON,
                "no edge generates a left-going wave into the last column"
            );
        }
    }
}
