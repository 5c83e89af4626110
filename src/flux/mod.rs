//! Pointwise Riemann flux operators.
//!
//! Every operator solves a 1-D Riemann problem across a single cell edge of
//! the shallow water equations and reports the result as *net updates*: the
//! wave contribution leaving the edge toward the left cell and toward the
//! right cell, for both the height and the momentum unknown, plus the
//! largest absolute wave speed observed at the edge. The same operator
//! serves both sweep directions; the vertical sweep simply passes `hv` where
//! the horizontal sweep passes `hu`.
//!
//! Operators are pure and thread-safe: they read their six scalar arguments
//! and produce a [`NetUpdates`] value, with no shared state. Three variants
//! are provided behind one trait:
//!
//! - [`Hlle`]: wave decomposition with Einfeldt speed bounds (robust)
//! - [`FWave`]: flux-difference splitting with Roe eigenvalues (sharp)
//! - [`AugRie`]: hydrostatic-reconstruction-augmented decomposition
//!   (positivity-minded near steep bathymetry)
//!
//! Selection happens at construction time through [`FluxSolver`]; dispatch
//! in the hot loops is a plain enum match that inlines, never a virtual
//! call per edge.

mod augrie;
mod fwave;
mod hlle;

pub use augrie::AugRie;
pub use fwave::FWave;
pub use hlle::Hlle;

/// Gravitational acceleration used throughout the solver [m/s²].
pub const GRAVITY: f64 = 9.81;

/// Net effect of the waves at one edge.
///
/// The left cell accumulates `h_left`/`hu_left`, the right cell
/// `h_right`/`hu_right`; summed over both sides the updates equal the
/// (source-corrected) flux difference across the edge, which is what makes
/// the scheme conservative.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NetUpdates {
    /// Height update carried into the left cell.
    pub h_left: f64,
    /// Height update carried into the right cell.
    pub h_right: f64,
    /// Momentum update carried into the left cell.
    pub hu_left: f64,
    /// Momentum update carried into the right cell.
    pub hu_right: f64,
    /// Largest absolute eigenvalue along the edge [m/s].
    pub max_wave_speed: f64,
}

impl NetUpdates {
    /// The no-wave result (both sides dry, or identical states on a flat bed).
    #[inline]
    pub fn zero() -> Self {
        Self::default()
    }

    /// All components finite and the wave speed non-negative.
    pub fn is_valid(&self) -> bool {
        self.h_left.is_finite()
            && self.h_right.is_finite()
            && self.hu_left.is_finite()
            && self.hu_right.is_finite()
            && self.max_wave_speed.is_finite()
            && self.max_wave_speed >= 0.0
    }
}

/// Physical parameters shared by all operator variants.
#[derive(Clone, Copy, Debug)]
pub struct SolverParams {
    /// Gravitational acceleration [m/s²].
    pub gravity: f64,
    /// Depth below which a cell is treated as dry [m].
    pub dry_tolerance: f64,
    /// Threshold under which a wave-speed gap counts as degenerate.
    pub zero_tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            dry_tolerance: 1e-5,
            zero_tolerance: 1e-12,
        }
    }
}

/// A pointwise Riemann flux operator.
///
/// # Contract
///
/// - Consistency: equal wet states over a flat bed produce zero updates.
/// - Conservation: `h_left + h_right` equals the height-flux difference
///   across the edge (and analogously for momentum).
/// - Purity: no side effects, no interior mutability; implementations are
///   `Send + Sync` so sweep kernels may share or copy them freely.
pub trait WavePropagationSolver: Send + Sync {
    /// Solve the edge Riemann problem.
    ///
    /// # Arguments
    /// * `h_l`, `h_r` - water height on either side of the edge
    /// * `hu_l`, `hu_r` - momentum normal to the edge
    /// * `b_l`, `b_r` - bathymetry (bed elevation, negative under water)
    fn compute_net_updates(
        &self,
        h_l: f64,
        h_r: f64,
        hu_l: f64,
        hu_r: f64,
        b_l: f64,
        b_r: f64,
    ) -> NetUpdates;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Which operator variant a block should run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FluxKind {
    /// Einfeldt-bounded wave decomposition.
    #[default]
    Hlle,
    /// Flux-difference splitting on Roe eigenvalues.
    FWave,
    /// Augmented decomposition with hydrostatic reconstruction.
    AugRie,
}

/// Concrete operator selected at construction time.
///
/// Enum dispatch keeps the per-edge call monomorphic enough to inline and
/// vectorize, while still allowing runtime selection from configuration.
#[derive(Clone, Copy, Debug)]
pub enum FluxSolver {
    /// See [`Hlle`].
    Hlle(Hlle),
    /// See [`FWave`].
    FWave(FWave),
    /// See [`AugRie`].
    AugRie(AugRie),
}

impl FluxSolver {
    /// Build the selected variant with the given parameters.
    pub fn from_kind(kind: FluxKind, params: SolverParams) -> Self {
        match kind {
            FluxKind::Hlle => FluxSolver::Hlle(Hlle::new(params)),
            FluxKind::FWave => FluxSolver::FWave(FWave::new(params)),
            FluxKind::AugRie => FluxSolver::AugRie(AugRie::new(params)),
        }
    }
}

impl Default for FluxSolver {
    fn default() -> Self {
        FluxSolver::Hlle(Hlle::default())
    }
}

impl WavePropagationSolver for FluxSolver {
    #[inline]
    fn compute_net_updates(
        &self,
        h_l: f64,
        h_r: f64,
        hu_l: f64,
        hu_r: f64,
        b_l: f64,
        b_r: f64,
    ) -> NetUpdates {
        match self {
            FluxSolver::Hlle(s) => s.compute_net_updates(h_l, h_r, hu_l, hu_r, b_l, b_r),
            FluxSolver::FWave(s) => s.compute_net_updates(h_l, h_r, hu_l, hu_r, b_l, b_r),
            FluxSolver::AugRie(s) => s.compute_net_updates(h_l, h_r, hu_l, hu_r, b_l, b_r),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FluxSolver::Hlle(s) => s.name(),
            FluxSolver::FWave(s) => s.name(),
            FluxSolver::AugRie(s) => s.name(),
        }
    }
}

// =============================================================================
// Shared pieces
// =============================================================================

/// Edge state after dry-cell normalization.
///
/// A dry side is replaced by a reflecting wall image of the wet side so the
/// wet-wet machinery stays finite; the image side's updates are discarded
/// afterwards. Scenarios are required to stay in the wet regime, so this is
/// a guard on ghost/edge arithmetic, not a wetting-drying scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DryFix {
    None,
    BothDry,
    LeftMirrored,
    RightMirrored,
}

#[inline]
pub(crate) fn apply_dry_fix(
    params: &SolverParams,
    h_l: &mut f64,
    h_r: &mut f64,
    hu_l: &mut f64,
    hu_r: &mut f64,
    b_l: &mut f64,
    b_r: &mut f64,
) -> DryFix {
    let dry_l = *h_l <= params.dry_tolerance;
    let dry_r = *h_r <= params.dry_tolerance;
    match (dry_l, dry_r) {
        (true, true) => DryFix::BothDry,
        (true, false) => {
            *h_l = *h_r;
            *hu_l = -*hu_r;
            *b_l = *b_r;
            DryFix::LeftMirrored
        }
        (false, true) => {
            *h_r = *h_l;
            *hu_r = -*hu_l;
            *b_r = *b_l;
            DryFix::RightMirrored
        }
        (false, false) => DryFix::None,
    }
}

#[inline]
pub(crate) fn discard_mirrored_side(updates: &mut NetUpdates, fix: DryFix) {
    match fix {
        DryFix::LeftMirrored => {
            updates.h_left = 0.0;
            updates.hu_left = 0.0;
        }
        DryFix::RightMirrored => {
            updates.h_right = 0.0;
            updates.hu_right = 0.0;
        }
        DryFix::None | DryFix::BothDry => {}
    }
}

/// Roe averages `(u_roe, c_roe)` of the two wet states.
#[inline]
pub(crate) fn roe_averages(g: f64, h_l: f64, h_r: f64, u_l: f64, u_r: f64) -> (f64, f64) {
    let sqrt_h_l = h_l.sqrt();
    let sqrt_h_r = h_r.sqrt();
    let h_roe = 0.5 * (h_l + h_r);
    let u_roe = (sqrt_h_l * u_l + sqrt_h_r * u_r) / (sqrt_h_l + sqrt_h_r);
    (u_roe, (g * h_roe).sqrt())
}

/// Einfeldt wave speed estimates: Roe characteristics widened by the
/// one-sided characteristics, guaranteeing `s_l ≤ λ_roe ≤ s_r`.
#[inline]
pub(crate) fn einfeldt_speeds(g: f64, h_l: f64, h_r: f64, u_l: f64, u_r: f64) -> (f64, f64) {
    let c_l = (g * h_l).sqrt();
    let c_r = (g * h_r).sqrt();
    let (u_roe, c_roe) = roe_averages(g, h_l, h_r, u_l, u_r);
    ((u_l - c_l).min(u_roe - c_roe), (u_r + c_r).max(u_roe + c_roe))
}

/// Flux difference across the edge with the bathymetry source term folded
/// into the momentum component.
///
/// For the lake-at-rest equilibrium (`h + b` constant, zero momentum) the
/// corrected difference vanishes identically, which is what makes every
/// variant built on it well-balanced.
#[allow(clippy::too_many_arguments)]
#[inline]
pub(crate) fn corrected_flux_difference(
    g: f64,
    h_l: f64,
    h_r: f64,
    hu_l: f64,
    hu_r: f64,
    u_l: f64,
    u_r: f64,
    b_l: f64,
    b_r: f64,
) -> (f64, f64) {
    let df_h = hu_r - hu_l;
    let df_hu = (hu_r * u_r + 0.5 * g * h_r * h_r) - (hu_l * u_l + 0.5 * g * h_l * h_l)
        + 0.5 * g * (b_r - b_l) * (h_l + h_r);
    (df_h, df_hu)
}

/// Split the corrected flux difference into two waves `β_p · [1, s_p]` and
/// assign each to the upwind side by the sign of its speed.
///
/// A zero-speed wave is split evenly so the side totals still sum to the
/// flux difference.
#[inline]
pub(crate) fn decompose_waves(s_l: f64, s_r: f64, df_h: f64, df_hu: f64) -> NetUpdates {
    let inv = 1.0 / (s_r - s_l);
    let beta = [(s_r * df_h - df_hu) * inv, (df_hu - s_l * df_h) * inv];
    let speeds = [s_l, s_r];

    let mut out = NetUpdates {
        max_wave_speed: s_l.abs().max(s_r.abs()),
        ..NetUpdates::zero()
    };
    for p in 0..2 {
        let (dh, dhu) = (beta[p], beta[p] * speeds[p]);
        if speeds[p] < 0.0 {
            out.h_left += dh;
            out.hu_left += dhu;
        } else if speeds[p] > 0.0 {
            out.h_right += dh;
            out.hu_right += dhu;
        } else {
            out.h_left += 0.5 * dh;
            out.hu_left += 0.5 * dhu;
            out.h_right += 0.5 * dh;
            out.hu_right += 0.5 * dhu;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solvers() -> Vec<FluxSolver> {
        vec![
            FluxSolver::from_kind(FluxKind::Hlle, SolverParams::default()),
            FluxSolver::from_kind(FluxKind::FWave, SolverParams::default()),
            FluxSolver::from_kind(FluxKind::AugRie, SolverParams::default()),
        ]
    }

    #[test]
    fn still_water_flat_bed_produces_no_waves() {
        for solver in solvers() {
            let upd = solver.compute_net_updates(2.0, 2.0, 0.0, 0.0, -2.0, -2.0);
            assert!(
                upd.h_left.abs() < 1e-12 && upd.h_right.abs() < 1e-12,
                "{}: height updates {:?}",
                solver.name(),
                upd
            );
            assert!(upd.hu_left.abs() < 1e-12 && upd.hu_right.abs() < 1e-12);
            assert!(upd.max_wave_speed > 0.0, "celerity is still reported");
        }
    }

    #[test]
    fn lake_at_rest_over_bathymetry_jump_is_balanced() {
        // h + b constant across the edge, zero momentum.
        for solver in solvers() {
            let upd = solver.compute_net_updates(1.0, 0.8, 0.0, 0.0, -1.0, -0.8);
            assert!(
                upd.h_left.abs() < 1e-12
                    && upd.h_right.abs() < 1e-12
                    && upd.hu_left.abs() < 1e-12
                    && upd.hu_right.abs() < 1e-12,
                "{}: not well balanced: {:?}",
                solver.name(),
                upd
            );
        }
    }

    #[test]
    fn dam_break_sends_mass_to_the_right() {
        for solver in solvers() {
            let upd = solver.compute_net_updates(2.0, 1.0, 0.0, 0.0, -3.0, -3.0);
            assert!(upd.is_valid(), "{}: {:?}", solver.name(), upd);
            // Updates are subtracted in the cell update, so the gaining
            // right cell receives a negative height update.
            assert!(
                upd.h_right < 0.0,
                "{}: right cell should gain mass, got {:?}",
                solver.name(),
                upd
            );
            assert!(upd.max_wave_speed > 0.0);
        }
    }

    #[test]
    fn updates_are_conservative() {
        // Left + right updates must reproduce the corrected flux difference.
        let g = GRAVITY;
        for solver in solvers() {
            let (h_l, h_r, hu_l, hu_r, b) = (1.7, 1.1, 0.4, -0.3, -2.0);
            let upd = solver.compute_net_updates(h_l, h_r, hu_l, hu_r, b, b);
            let (df_h, df_hu) =
                corrected_flux_difference(g, h_l, h_r, hu_l, hu_r, hu_l / h_l, hu_r / h_r, b, b);
            assert!(
                (upd.h_left + upd.h_right - df_h).abs() < 1e-10,
                "{}: height not conservative",
                solver.name()
            );
            assert!(
                (upd.hu_left + upd.hu_right - df_hu).abs() < 1e-9,
                "{}: momentum not conservative",
                solver.name()
            );
        }
    }

    #[test]
    fn both_dry_yields_zero() {
        for solver in solvers() {
            let upd = solver.compute_net_updates(0.0, 0.0, 0.0, 0.0, 1.0, 1.0);
            assert_eq!(upd, NetUpdates::zero(), "{}", solver.name());
        }
    }

    #[test]
    fn dry_side_receives_nothing() {
        for solver in solvers() {
            let upd = solver.compute_net_updates(0.0, 1.5, 0.0, -0.5, 0.5, -1.5);
            assert_eq!(upd.h_left, 0.0, "{}", solver.name());
            assert_eq!(upd.hu_left, 0.0, "{}", solver.name());
            assert!(upd.is_valid());
        }
    }

    #[test]
    fn supercritical_flow_is_fully_upwind() {
        // u >> c: both characteristics point right, the left cell is untouched.
        let solver = FluxSolver::from_kind(FluxKind::Hlle, SolverParams::default());
        let upd = solver.compute_net_updates(1.0, 1.0, 10.0, 9.0, 0.0, 0.0);
        assert!(upd.h_left.abs() < 1e-12 && upd.hu_left.abs() < 1e-12);
    }

    #[test]
    fn flux_kind_roundtrip_names() {
        assert_eq!(
            FluxSolver::from_kind(FluxKind::Hlle, SolverParams::default()).name(),
            "hlle"
        );
        assert_eq!(
            FluxSolver::from_kind(FluxKind::FWave, SolverParams::default()).name(),
            "fwave"
        );
        assert_eq!(
            FluxSolver::from_kind(FluxKind::AugRie, SolverParams::default()).name(),
            "augrie"
        );
    }
}
