//! Scenario providers: initial conditions and outer boundary behaviour.
//!
//! A scenario answers pointwise questions about the physical domain
//! (bathymetry, initial water height and momentum as functions of physical
//! coordinates) plus the domain bounds and the boundary condition to apply
//! where the simulation domain ends. Blocks sample these functions at cell
//! centres during initialization and never talk to the scenario again.

use crate::types::{DomainBounds, Side};

/// Boundary condition a scenario requests at a domain edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScenarioBoundary {
    /// Zero-gradient open boundary.
    #[default]
    Outflow,
    /// Reflecting wall.
    Wall,
}

/// Pointwise description of the initial state and the outer boundary.
pub trait Scenario: Send + Sync {
    /// Bed elevation at `(x, y)` [m]; negative under water.
    fn bathymetry(&self, x: f64, y: f64) -> f64;

    /// Initial water height at `(x, y)` [m].
    fn water_height(&self, x: f64, y: f64) -> f64;

    /// Initial x-momentum at `(x, y)` [m²/s].
    fn momentum_x(&self, _x: f64, _y: f64) -> f64 {
        0.0
    }

    /// Initial y-momentum at `(x, y)` [m²/s].
    fn momentum_y(&self, _x: f64, _y: f64) -> f64 {
        0.0
    }

    /// Physical position of a domain boundary.
    fn boundary_pos(&self, side: Side) -> f64;

    /// Boundary condition at a domain edge.
    fn boundary_type(&self, _side: Side) -> ScenarioBoundary {
        ScenarioBoundary::Outflow
    }

    /// Domain bounds assembled from [`Scenario::boundary_pos`].
    fn bounds(&self) -> DomainBounds {
        DomainBounds::new(
            self.boundary_pos(Side::Left),
            self.boundary_pos(Side::Right),
            self.boundary_pos(Side::Bottom),
            self.boundary_pos(Side::Top),
        )
    }
}

// =============================================================================
// Built-in scenarios
// =============================================================================

/// Circular dam break: a raised column of water collapsing outward over a
/// flat bed. The classic demonstration setup for radial symmetry checks.
#[derive(Clone, Debug)]
pub struct RadialDamBreak {
    /// Domain extent.
    pub bounds: DomainBounds,
    /// Centre of the raised column.
    pub center: (f64, f64),
    /// Column radius [m].
    pub radius: f64,
    /// Water height inside the column [m].
    pub h_inner: f64,
    /// Water height outside the column [m].
    pub h_outer: f64,
    /// Flat bed elevation [m].
    pub bed: f64,
    /// Boundary condition on all four sides.
    pub boundary: ScenarioBoundary,
}

impl RadialDamBreak {
    /// The default demo: 1000 m square domain, 100 m column raised to 15 m
    /// over 10 m of ambient water, open boundaries.
    pub fn demo() -> Self {
        let bounds = DomainBounds::new(0.0, 1000.0, 0.0, 1000.0);
        Self {
            center: (500.0, 500.0),
            bounds,
            radius: 100.0,
            h_inner: 15.0,
            h_outer: 10.0,
            bed: -10.0,
            boundary: ScenarioBoundary::Outflow,
        }
    }
}

impl Scenario for RadialDamBreak {
    fn bathymetry(&self, _x: f64, _y: f64) -> f64 {
        self.bed
    }

    fn water_height(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.center.0;
        let dy = y - self.center.1;
        if (dx * dx + dy * dy).sqrt() < self.radius {
            self.h_inner
        } else {
            self.h_outer
        }
    }

    fn boundary_pos(&self, side: Side) -> f64 {
        self.bounds.position(side)
    }

    fn boundary_type(&self, _side: Side) -> ScenarioBoundary {
        self.boundary
    }
}

/// Uniform water at rest over a flat bed, walls all around. Any change the
/// solver produces on this scenario is a defect.
#[derive(Clone, Debug)]
pub struct StillWater {
    /// Domain extent.
    pub bounds: DomainBounds,
    /// Water height everywhere [m].
    pub depth: f64,
    /// Flat bed elevation [m].
    pub bed: f64,
}

impl Scenario for StillWater {
    fn bathymetry(&self, _x: f64, _y: f64) -> f64 {
        self.bed
    }

    fn water_height(&self, _x: f64, _y: f64) -> f64 {
        self.depth
    }

    fn boundary_pos(&self, side: Side) -> f64 {
        self.bounds.position(side)
    }

    fn boundary_type(&self, _side: Side) -> ScenarioBoundary {
        ScenarioBoundary::Wall
    }
}

/// Lake at rest over a sinusoidal bed: `b(x, y) = base + amp · sin(x / wavelength)`
/// with the water surface at elevation zero (`h = -b`). Exercises the
/// well-balanced property of the flux operators.
#[derive(Clone, Debug)]
pub struct LakeAtRest {
    /// Domain extent.
    pub bounds: DomainBounds,
    /// Mean bed elevation [m]; must stay below the surface.
    pub base: f64,
    /// Bed oscillation amplitude [m].
    pub amplitude: f64,
    /// Bed oscillation wavelength scale [m].
    pub wavelength: f64,
}

impl Scenario for LakeAtRest {
    fn bathymetry(&self, x: f64, _y: f64) -> f64 {
        self.base + self.amplitude * (x / self.wavelength).sin()
    }

    fn water_height(&self, x: f64, y: f64) -> f64 {
        -self.bathymetry(x, y)
    }

    fn boundary_pos(&self, side: Side) -> f64 {
        self.bounds.position(side)
    }

    fn boundary_type(&self, _side: Side) -> ScenarioBoundary {
        ScenarioBoundary::Wall
    }
}
