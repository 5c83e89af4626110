//! Timestep management.
//!
//! The stable timestep is derived from the CFL condition after each
//! horizontal sweep. Two modes exist:
//!
//! - **Global**: the candidate is min-reduced across all participating
//!   ranks between the horizontal and vertical sweep; every block then
//!   advances by the same Δt in the same iteration.
//! - **Local**: every block rounds its candidate down to a dyadic fraction
//!   of a shared reference Δt and advances independently; a block only
//!   computes when all its ghost layers are in sync (see
//!   [`crate::block::Block::all_ghost_layers_in_sync`]). Fast blocks then
//!   take an exact integer multiple of the steps slow blocks take, and
//!   neighbouring blocks meet at dyadic points in simulated time.

/// Operating CFL coefficient applied to the horizontal sweep's wave speed.
///
/// Deliberately below the stability limit to leave margin for the vertical
/// sweep, which reuses the already-fixed Δt.
pub const CFL_NUMBER: f64 = 0.4;

/// The vertical sweep asserts `Δt < CFL_ORTHOGONAL_LIMIT · dy / max_speed`.
pub const CFL_ORTHOGONAL_LIMIT: f64 = 0.5;

/// How the per-iteration timestep is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimestepMode {
    /// One Δt for all blocks, min-reduced across ranks each iteration.
    Global,
    /// Per-block Δt on a dyadic schedule.
    Local(LocalTimestepping),
}

impl TimestepMode {
    /// True in local-timestepping mode.
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, TimestepMode::Local(_))
    }
}

/// Configuration for local timestepping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTimestepping {
    /// Reference Δt the dyadic schedule divides; every block step is
    /// `reference_dt / 2^k` for some k ≥ 0.
    pub reference_dt: f64,
}

/// CFL-stable timestep candidate for one sweep direction.
///
/// Returns infinity when no waves were observed (e.g. an entirely dry
/// block), leaving the reduction to pick a finite Δt from elsewhere.
#[inline]
pub fn cfl_timestep(cell_size: f64, max_wave_speed: f64) -> f64 {
    if max_wave_speed < 1e-14 {
        f64::INFINITY
    } else {
        CFL_NUMBER * cell_size / max_wave_speed
    }
}

/// Round `dt` down to the largest dyadic fraction `reference / 2^k` that
/// does not exceed it.
///
/// Candidates at or above the reference collapse to the reference itself, so
/// the schedule is bounded above and every block's step divides evenly into
/// some slower block's step.
pub fn dyadic_round_down(dt: f64, reference: f64) -> f64 {
    debug_assert!(reference > 0.0 && dt > 0.0);
    if dt >= reference {
        return reference;
    }
    let mut k = (reference / dt).log2().ceil() as i32;
    // log2 rounding can land one notch too high or low; settle exactly.
    while reference / f64::powi(2.0, k) > dt {
        k += 1;
    }
    while k > 0 && reference / f64::powi(2.0, k - 1) <= dt {
        k -= 1;
    }
    reference / f64::powi(2.0, k)
}

/// True when `t` lies on the dyadic grid `{n · reference / 2^max_depth}`,
/// within floating-point slack. Used by tests to audit exchanged timestep
/// envelopes.
pub fn is_dyadic_instant(t: f64, reference: f64, max_depth: u32) -> bool {
    let quantum = reference / f64::powi(2.0, max_depth as i32);
    let steps = t / quantum;
    (steps - steps.round()).abs() < 1e-9 * steps.abs().max(1.0)
}
