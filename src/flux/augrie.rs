//! Augmented net-update solver with hydrostatic reconstruction.
//!
//! Reconstructs the edge states against the higher of the two bed
//! elevations (Audusse et al. 2004), evaluates an HLL interface flux on the
//! reconstructed states, and augments each side's net update with the
//! pressure correction that accounts for the reconstruction. The
//! reconstruction clamps depths at zero, so the interface flux can never
//! drain a cell below the bed, the property that motivates this variant
//! near steep bathymetry.
//!
//! Reference: Audusse, Bouchut, Bristeau, Klein, Perthame, "A fast and
//! stable well-balanced scheme with hydrostatic reconstruction for shallow
//! water flows" (2004).

use super::{
    apply_dry_fix, discard_mirrored_side, einfeldt_speeds, DryFix, NetUpdates, SolverParams,
    WavePropagationSolver,
};

/// Hydrostatic-reconstruction-augmented solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct AugRie {
    params: SolverParams,
}

impl AugRie {
    /// Create a solver with the given physical parameters.
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    /// Physical parameters in use.
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Physical flux `f(q) = [hu, hu·u + g·h²/2]`.
    #[inline]
    fn physical_flux(&self, h: f64, hu: f64, u: f64) -> (f64, f64) {
        (hu, hu * u + 0.5 * self.params.gravity * h * h)
    }
}

impl WavePropagationSolver for AugRie {
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

        // Hydrostatic reconstruction against the higher bed elevation.
        let b_edge = b_l.max(b_r);
        let h_l_star = (h_l + b_l - b_edge).max(0.0);
        let h_r_star = (h_r + b_r - b_edge).max(0.0);
        let hu_l_star = h_l_star * u_l;
        let hu_r_star = h_r_star * u_r;

        let (s_l, s_r) = einfeldt_speeds(g, h_l_star, h_r_star, u_l, u_r);
        let max_wave_speed = s_l.abs().max(s_r.abs());

        // HLL interface flux of the reconstructed states.
        let f_l = self.physical_flux(h_l_star, hu_l_star, u_l);
        let f_r = self.physical_flux(h_r_star, hu_r_star, u_r);
        let (f_h, f_hu) = if s_l >= 0.0 {
            f_l
        } else if s_r <= 0.0 {
            f_r
        } else if s_r - s_l < self.params.zero_tolerance {
            return NetUpdates {
                max_wave_speed,
                ..NetUpdates::zero()
            };
        } else {
            let inv = 1.0 / (s_r - s_l);
            (
                inv * (s_r * f_l.0 - s_l * f_r.0 + s_l * s_r * (h_r_star - h_l_star)),
                inv * (s_r * f_l.1 - s_l * f_r.1 + s_l * s_r * (hu_r_star - hu_l_star)),
            )
        };

        // Per-side pressure corrections restore the physical bed forcing
        // that the reconstruction removed from the interface flux.
        let corr_l = 0.5 * g * (h_l * h_l - h_l_star * h_l_star);
        let corr_r = 0.5 * g * (h_r * h_r - h_r_star * h_r_star);
        let (pf_l_h, pf_l_hu) = self.physical_flux(h_l, hu_l, u_l);
        let (pf_r_h, pf_r_hu) = self.physical_flux(h_r, hu_r, u_r);

        let mut updates = NetUpdates {
            h_left: f_h - pf_l_h,
            hu_left: (f_hu + corr_l) - pf_l_hu,
            h_right: pf_r_h - f_h,
            hu_right: pf_r_hu - (f_hu + corr_r),
            max_wave_speed,
        };
        discard_mirrored_side(&mut updates, fix);
        updates
    }

    fn name(&self) -> &'static str {
        "augrie"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux::Hlle;
    use crate::flux::WavePropagationSolver as _;

    #[test]
    fn matches_hlle_totals_on_flat_bed() {
        // With equal bed elevations the reconstruction is the identity.
        // Both variants then express the same flux difference in total; the
        // per-side split may differ (flux-form vs wave-form), the conserved
        // sums and the speed bound may not.
        let augrie = AugRie::default();
        let hlle = Hlle::default();
        let a = augrie.compute_net_updates(2.0, 1.0, 0.3, -0.2, -5.0, -5.0);
        let b = hlle.compute_net_updates(2.0, 1.0, 0.3, -0.2, -5.0, -5.0);
        assert!(
            (a.h_left + a.h_right - (b.h_left + b.h_right)).abs() < 1e-10,
            "{a:?} vs {b:?}"
        );
        assert!((a.hu_left + a.hu_right - (b.hu_left + b.hu_right)).abs() < 1e-9);
        assert!((a.max_wave_speed - b.max_wave_speed).abs() < 1e-10);
    }

    #[test]
    fn reconstruction_caps_depth_at_step() {
        // Water to the left of an emerged step: the reconstructed right
        // depth is zero and no mass may flow uphill out of thin air.
        let augrie = AugRie::default();
        let upd = augrie.compute_net_updates(0.5, 0.2, 0.0, 0.0, -1.0, 0.5);
        assert!(upd.is_valid());
        // The right state sits fully above the edge elevation, so the
        // left-cell update reduces to pure reflection-like pressure.
        assert!(upd.h_left.is_finite());
    }

    #[test]
    fn balanced_at_rest_with_unequal_beds() {
        let augrie = AugRie::default();
        let upd = augrie.compute_net_updates(2.0, 1.25, 0.0, 0.0, -2.0, -1.25);
        assert!(upd.h_left.abs() < 1e-12 && upd.h_right.abs() < 1e-12);
        assert!(upd.hu_left.abs() < 1e-12 && upd.hu_right.abs() < 1e-12);
    }
}
