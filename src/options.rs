use crate::newton::NewtonSettings;
use crate::position::Position;
use serde::{Deserialize, Serialize};

/// Tolerances and policies for a cutting pass.
///
/// All tolerances are absolute unless stated otherwise.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutOptions {
    /// A local through-thickness coordinate below this magnitude is treated as lying in the
    /// cutting plane.
    pub minimal_tolerance: f64,
    /// Points closer than this are merged, and points closer to a polygon are considered on it.
    pub point_tolerance: f64,
    /// Slack for reference-domain inclusion tests.
    pub reference_tolerance: f64,
    pub newton_max_iterations: usize,
    /// Newton tolerance relative to the element diameter.
    pub newton_tolerance: f64,
    /// Position given to volume cells that cannot be classified from any cut.
    pub default_position: Position,
    /// Whether inside cells take part in dof-set construction.
    pub include_inner: bool,
}

impl Default for CutOptions {
    fn default() -> Self {
        Self {
            minimal_tolerance: 1e-14,
            point_tolerance: 1e-10,
            reference_tolerance: 1e-10,
            newton_max_iterations: 20,
            newton_tolerance: 1e-12,
            default_position: Position::Outside,
            include_inner: true,
        }
    }
}

impl CutOptions {
    pub fn newton_settings(&self) -> NewtonSettings {
        NewtonSettings {
            max_iterations: Some(self.newton_max_iterations),
            tolerance: self.newton_tolerance,
        }
    }

    pub fn with_minimal_tolerance(self, minimal_tolerance: f64) -> Self {
        Self {
            minimal_tolerance,
            ..self
        }
    }

    pub fn with_point_tolerance(self, point_tolerance: f64) -> Self {
        Self { point_tolerance, ..self }
    }

    pub fn with_reference_tolerance(self, reference_tolerance: f64) -> Self {
        Self {
            reference_tolerance,
            ..self
        }
    }

    pub fn with_newton_max_iterations(self, newton_max_iterations: usize) -> Self {
        Self {
            newton_max_iterations,
            ..self
        }
    }

    pub fn with_newton_tolerance(self, newton_tolerance: f64) -> Self {
        Self {
            newton_tolerance,
            ..self
        }
    }

    pub fn with_default_position(self, default_position: Position) -> Self {
        Self {
            default_position,
            ..self
        }
    }

    pub fn with_include_inner(self, include_inner: bool) -> Self {
        Self { include_inner, ..self }
    }
}
