//! F-Wave net-update solver.
//!
//! Splits the bathymetry-corrected flux difference directly into waves
//! travelling at the two Roe eigenvalues. Sharper than the Einfeldt-bounded
//! variant at smooth features, but without the widened speed bounds it can
//! under-resolve strong transcritical rarefactions.
//!
//! Reference: Bale, LeVeque, Mitran, Rossmanith, "A wave propagation method
//! for conservation laws and balance laws with spatially varying flux
//! functions" (2002).

use super::{
    apply_dry_fix, corrected_flux_difference, decompose_waves, discard_mirrored_side, roe_averages,
    DryFix, NetUpdates, SolverParams, WavePropagationSolver,
};

/// Flux-difference splitting on Roe eigenvalues.
#[derive(Clone, Copy, Debug, Default)]
pub struct FWave {
    params: SolverParams,
}

impl FWave {
    /// Create a solver with the given physical parameters.
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    /// Physical parameters in use.
    pub fn params(&self) -> &SolverParams {
        &self.params
    }
}

impl WavePropagationSolver for FWave {
    #[inline]
    fn compute_net_updates(
        &self,
        mut h_l: f64,
        mut h_r: f64,
        mut hu_l: f64,
        mut hu_r: f64,
        mut b_l: f64,
        mut b_r: f64,
    ) -> NetUpdates {
        let fix = apply_dry_fix(
            &self.params,
            &mut h_l,
            &mut h_r,
            &mut hu_l,
            &mut hu_r,
            &mut b_l,
            &mut b_r,
        );
        if fix == DryFix::BothDry {
            return NetUpdates::zero();
        }

        let g = self.params.gravity;
        let u_l = hu_l / h_l;
        let u_r = hu_r / h_r;

        let (u_roe, c_roe) = roe_averages(g, h_l, h_r, u_l, u_r);
        let lambda_1 = u_roe - c_roe;
        let lambda_2 = u_roe + c_roe;
        if lambda_2 - lambda_1 < self.params.zero_tolerance {
            return NetUpdates {
                max_wave_speed: lambda_1.abs().max(lambda_2.abs()),
                ..NetUpdates::zero()
            };
        }

        let (df_h, df_hu) = corrected_flux_difference(g, h_l, h_r, hu_l, hu_r, u_l, u_r, b_l, b_r);
        let mut updates = decompose_waves(lambda_1, lambda_2, df_h, df_hu);
        discard_mirrored_side(&mut updates, fix);
        updates
    }

    fn name(&self) -> &'static str {
        "fwave"
    }
}
