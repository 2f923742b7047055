use std::fmt;

use faer::{sparse::SparseColMat, Mat};

use crate::{linear::LinearSolver, Float, SimError};

/// A square nonlinear system `F(x) = 0`.
pub trait NonlinearProblem {
    fn num_variables(&self) -> usize;

    fn residual(&self, x: &Mat<Float>, r: &mut Mat<Float>);

    fn jacobian(&self, x: &Mat<Float>) -> Result<SparseColMat<usize, Float>, SimError>;
}

/// Parameters for the Newton solver.
#[derive(Clone, Debug, PartialEq)]
pub struct NewtonParams {
    /// Absolute residual tolerance.
    pub absolute_tolerance: Float,
    /// Residual tolerance relative to the initial residual.
    pub relative_tolerance: Float,
    /// Maximum number of Newton iterations permitted.
    pub maximum_iterations: u32,
    /// Damping applied to each correction.
    pub relaxation_parameter: Float,
    /// Name of the sparse direct backend.
    pub linear_solver: String,
    /// Whether exceeding `maximum_iterations` is an error.
    pub error_on_nonconvergence: bool,
    /// Log one line per iteration.
    pub report: bool,
}

impl Default for NewtonParams {
    fn default() -> Self {
        Self {
            absolute_tolerance: 1e-10,
            relative_tolerance: 1e-9,
            maximum_iterations: 50,
            relaxation_parameter: 1.0,
            linear_solver: "default".to_string(),
            error_on_nonconvergence: true,
            report: true,
        }
    }
}

impl fmt::Display for NewtonParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "newton_solver: absolute_tolerance = {:e}, relative_tolerance = {:e}, \
             maximum_iterations = {}, relaxation_parameter = {}, linear_solver = {}, \
             error_on_nonconvergence = {}, report = {}",
            self.absolute_tolerance,
            self.relative_tolerance,
            self.maximum_iterations,
            self.relaxation_parameter,
            self.linear_solver,
            self.error_on_nonconvergence,
            self.report
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolveResult {
    /// Number of Newton corrections applied.
    pub iterations: u32,
    pub converged: bool,
    /// Final residual norm.
    pub residual: Float,
    /// Final residual norm relative to the initial one.
    pub relative_residual: Float,
}

impl fmt::Display for SolveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} iterations (r (abs) = {:.3e}, r (rel) = {:.3e})",
            if self.converged {
                "converged"
            } else {
                "not converged"
            },
            self.iterations,
            self.residual,
            self.relative_residual
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewtonSolver {
    params: NewtonParams,
    linear: LinearSolver,
}

impl NewtonSolver {
    pub fn new(params: NewtonParams) -> Result<Self, SimError> {
        if !(params.relaxation_parameter > 0.0) {
            return Err(SimError::invalid(
                "relaxation_parameter",
                format!("must be positive, got {}", params.relaxation_parameter),
            ));
        }
        let linear = LinearSolver::from_name(&params.linear_solver)?;
        Ok(Self { params, linear })
    }

    pub fn params(&self) -> &NewtonParams {
        &self.params
    }

    pub fn linear_solver(&self) -> &LinearSolver {
        &self.linear
    }

    fn converged(&self, iteration: u32, residual: Float, relative: Float) -> bool {
        if self.params.report {
            tracing::event!(
                tracing::Level::INFO,
                "Newton iteration {}: r (abs) = {:.3e} (tol = {:.3e}) r (rel) = {:.3e} (tol = {:.3e})",
                iteration,
                residual,
                self.params.absolute_tolerance,
                relative,
                self.params.relative_tolerance
            );
        }
        residual < self.params.absolute_tolerance || relative < self.params.relative_tolerance
    }

    /// Solves `F(x) = 0` starting from `x`, updated in place.
    pub fn solve(
        &self,
        problem: &dyn NonlinearProblem,
        x: &mut Mat<Float>,
    ) -> Result<SolveResult, SimError> {
        let n = problem.num_variables();
        assert_eq!(x.nrows(), n);

        let mut r = Mat::zeros(n, 1);
        problem.residual(x, &mut r);
        let residual0 = r.norm_l2();
        let relative_to = |residual: Float| {
            if residual0 > 0.0 {
                residual / residual0
            } else {
                0.0
            }
        };

        let mut iterations = 0;
        let mut residual = residual0;
        let mut converged = self.converged(iterations, residual, relative_to(residual));

        while !converged && iterations < self.params.maximum_iterations {
            let jacobian = problem.jacobian(x)?;
            // r now holds the correction
            self.linear.solve_in_place(&jacobian, &mut r)?;
            for i in 0..n {
                x[(i, 0)] -= self.params.relaxation_parameter * r[(i, 0)];
            }
            iterations += 1;

            problem.residual(x, &mut r);
            residual = r.norm_l2();
            if !residual.is_finite() {
                return Err(SimError::NonConvergence {
                    iterations,
                    residual,
                    relative: relative_to(residual),
                });
            }
            converged = self.converged(iterations, residual, relative_to(residual));
        }

        let result = SolveResult {
            iterations,
            converged,
            residual,
            relative_residual: relative_to(residual),
        };

        if converged {
            tracing::event!(
                tracing::Level::DEBUG,
                "Newton solver finished in {} iterations",
                iterations
            );
        } else if self.params.error_on_nonconvergence {
            return Err(SimError::NonConvergence {
                iterations,
                residual,
                relative: result.relative_residual,
            });
        } else {
            tracing::event!(tracing::Level::WARN, "Newton solver did not converge: {result}");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // x_i^2 = target_i, component by component
    struct Squares {
        target: Vec<Float>,
    }

    impl NonlinearProblem for Squares {
        fn num_variables(&self) -> usize {
            self.target.len()
        }

        fn residual(&self, x: &Mat<Float>, r: &mut Mat<Float>) {
            for (i, t) in self.target.iter().enumerate() {
                r[(i, 0)] = x[(i, 0)] * x[(i, 0)] - t;
            }
        }

        fn jacobian(&self, x: &Mat<Float>) -> Result<SparseColMat<usize, Float>, SimError> {
            let triplets: Vec<_> = (0..self.target.len())
                .map(|i| (i, i, 2.0 * x[(i, 0)]))
                .collect();
            SparseColMat::try_new_from_triplets(self.target.len(), self.target.len(), &triplets)
                .map_err(|e| SimError::Assembly(format!("{e:?}")))
        }
    }

    fn params(max_iter: u32) -> NewtonParams {
        NewtonParams {
            absolute_tolerance: 1e-12,
            relative_tolerance: 1e-14,
            maximum_iterations: max_iter,
            linear_solver: "mumps".to_string(),
            report: false,
            ..Default::default()
        }
    }

    #[test]
    fn converges_quadratically() {
        let problem = Squares {
            target: vec![2.0, 9.0],
        };
        let mut x = Mat::from_fn(2, 1, |_, _| 1.0);
        let result = NewtonSolver::new(params(20))
            .unwrap()
            .solve(&problem, &mut x)
            .unwrap();
        assert!(result.converged);
        assert!(result.iterations <= 8);
        assert_relative_eq!(x[(0, 0)], Float::sqrt(2.0), epsilon = 1e-12);
        assert_relative_eq!(x[(1, 0)], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn exact_initial_guess_needs_no_iteration() {
        let problem = Squares {
            target: vec![4.0],
        };
        let mut x = Mat::from_fn(1, 1, |_, _| 2.0);
        let result = NewtonSolver::new(params(5))
            .unwrap()
            .solve(&problem, &mut x)
            .unwrap();
        assert_eq!(result.iterations, 0);
        assert!(result.converged);
    }

    #[test]
    fn iteration_cap_is_fatal_by_default() {
        let problem = Squares {
            target: vec![2.0],
        };
        let mut x = Mat::from_fn(1, 1, |_, _| 100.0);
        let err = NewtonSolver::new(params(2))
            .unwrap()
            .solve(&problem, &mut x)
            .unwrap_err();
        assert!(matches!(err, SimError::NonConvergence { iterations: 2, .. }));
    }

    #[test]
    fn iteration_cap_can_be_tolerated() {
        let problem = Squares {
            target: vec![2.0],
        };
        let mut x = Mat::from_fn(1, 1, |_, _| 100.0);
        let params = NewtonParams {
            error_on_nonconvergence: false,
            ..params(2)
        };
        let result = NewtonSolver::new(params)
            .unwrap()
            .solve(&problem, &mut x)
            .unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
    }

    #[test]
    fn unknown_linear_solver_fails_early() {
        let params = NewtonParams {
            linear_solver: "petsc-magic".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            NewtonSolver::new(params),
            Err(SimError::UnknownLinearSolver(_))
        ));
    }
}
