//! Newton's method for small, fixed-size systems.
use crate::shape::ReferenceMap;
use log::debug;
use nalgebra::{Matrix3, Point3, Vector3};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonSettings {
    pub max_iterations: Option<usize>,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewtonError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
    /// The procedure failed because the Jacobian was singular at the given iteration.
    SingularJacobian(usize),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &NewtonError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            &NewtonError::SingularJacobian(iter) => {
                write!(f, "Failed to solve Jacobian system at iteration {}. Jacobian not invertible?", iter)
            }
        }
    }
}

impl Error for NewtonError {}

/// A function `R^3 -> R^3` with its Jacobian.
pub trait DifferentiableVectorFunction3 {
    fn eval(&self, x: &Vector3<f64>) -> Vector3<f64>;

    fn jacobian(&self, x: &Vector3<f64>) -> Matrix3<f64>;
}

/// Attempts to solve the non-linear equation F(u) = 0, starting from the given `x`.
///
/// The solution is said to have converged if ```|F(u)|_2 <= tolerance```.
///
/// If successful, returns the number of iterations performed.
pub fn newton<F>(function: &F, x: &mut Vector3<f64>, settings: NewtonSettings) -> Result<usize, NewtonError>
where
    F: DifferentiableVectorFunction3,
{
    let mut f = function.eval(x);
    let mut iter = 0;

    while f.norm() > settings.tolerance {
        if settings
            .max_iterations
            .map(|max_iter| iter == max_iter)
            .unwrap_or(false)
        {
            return Err(NewtonError::MaximumIterationsReached(iter));
        }

        // Solve the system J dx = -f
        let j = function.jacobian(x);
        let dx = j
            .lu()
            .solve(&(-f))
            .ok_or(NewtonError::SingularJacobian(iter))?;
        *x += dx;
        f = function.eval(x);
        debug!("Newton residual at iter {}: {:e}", iter, f.norm());
        iter += 1;
    }

    Ok(iter)
}

struct TranslatedMap<'a, M> {
    map: &'a M,
    x: &'a Point3<f64>,
}

impl<M: ReferenceMap> DifferentiableVectorFunction3 for TranslatedMap<'_, M> {
    fn eval(&self, xi: &Vector3<f64>) -> Vector3<f64> {
        self.map.map_reference_coords(xi) - self.x
    }

    fn jacobian(&self, xi: &Vector3<f64>) -> Matrix3<f64> {
        self.map.reference_jacobian(xi)
    }
}

/// Computes the reference coordinates `xi` such that `map(xi) = x`.
///
/// The tolerance in `settings` is relative to the diameter of the mapped geometry.
pub fn map_physical_coordinates<M: ReferenceMap>(
    map: &M,
    x: &Point3<f64>,
    settings: NewtonSettings,
) -> Result<Vector3<f64>, NewtonError> {
    // We solve T(xi) - x = 0. Since x should lie close to the geometry, its diameter gives a
    // representative scale, so the convergence criterion becomes
    //   ||T(xi) - x|| <= eps * diameter
    let settings = NewtonSettings {
        tolerance: settings.tolerance * map.diameter(),
        ..settings
    };
    let mut xi = map.initial_guess();
    newton(&TranslatedMap { map, x }, &mut xi, settings)?;
    Ok(xi)
}
