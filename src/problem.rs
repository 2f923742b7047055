use std::{fmt, rc::Rc};

use faer::{sparse::SparseColMat, Mat};

use crate::{
    bc::{constrained_values, DirichletBC},
    form::{assemble_jacobian, assemble_residual, WeakForm},
    non_linear::{NewtonParams, NewtonSolver, NonlinearProblem, SolveResult},
    space::MixedSpace,
    Float, Function, SimError,
};

/// Residual `F(w; w_prev) = 0` with Dirichlet constraints, solved for the
/// current field `w`.
pub struct NonlinearVariationalProblem<'pb> {
    pub(crate) form: Rc<dyn WeakForm + 'pb>,
    pub(crate) space: Rc<MixedSpace>,
    pub(crate) bcs: Rc<[DirichletBC]>,
    pub(crate) pressure_reference: Option<DirichletBC>,
    pub(crate) solution: Function,
    pub(crate) previous: Function,
    // prescribed value per dof, built once from `bcs` and `pressure_reference`
    constraints: Vec<Option<Float>>,
}

impl<'pb> NonlinearVariationalProblem<'pb> {
    pub fn new(
        form: impl WeakForm + 'pb,
        space: Rc<MixedSpace>,
        bcs: Vec<DirichletBC>,
    ) -> Self {
        let bcs: Rc<[DirichletBC]> = bcs.into();
        let constraints = constrained_values(space.dim(), bcs.iter());
        Self {
            form: Rc::new(form),
            solution: Function::zeros(Rc::clone(&space)),
            previous: Function::zeros(Rc::clone(&space)),
            space,
            bcs,
            pressure_reference: None,
            constraints,
        }
    }

    /// Pins the pressure dofs selected by `bc`, removing the constant pressure
    /// mode left when velocity is prescribed on the whole boundary.
    pub fn with_pressure_reference(mut self, bc: DirichletBC) -> Self {
        self.constraints =
            constrained_values(self.space.dim(), self.bcs.iter().chain(Some(&bc)));
        self.pressure_reference = Some(bc);
        self
    }

    pub fn form(&self) -> &dyn WeakForm {
        &*self.form
    }

    pub fn space(&self) -> &Rc<MixedSpace> {
        &self.space
    }

    pub fn bcs(&self) -> &[DirichletBC] {
        &self.bcs
    }

    pub fn solution(&self) -> &Function {
        &self.solution
    }

    pub fn solution_mut(&mut self) -> &mut Function {
        &mut self.solution
    }

    pub fn previous(&self) -> &Function {
        &self.previous
    }

    /// Copies the current field into the previous time level.
    pub fn advance(&mut self) {
        self.previous.assign(&self.solution);
    }
}

impl fmt::Debug for NonlinearVariationalProblem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonlinearVariationalProblem")
            .field("form", &self.form.name())
            .field("space", &self.space.to_string())
            .field("bcs", &self.bcs)
            .field("pressure_reference", &self.pressure_reference)
            .finish()
    }
}

// residual and Jacobian of the problem at a fixed previous time level
struct Discrete<'a> {
    form: &'a dyn WeakForm,
    space: &'a MixedSpace,
    previous: &'a Mat<Float>,
    constraints: &'a [Option<Float>],
}

impl NonlinearProblem for Discrete<'_> {
    fn num_variables(&self) -> usize {
        self.space.dim()
    }

    fn residual(&self, x: &Mat<Float>, r: &mut Mat<Float>) {
        assemble_residual(self.form, self.space, x, self.previous, self.constraints, r)
    }

    fn jacobian(&self, x: &Mat<Float>) -> Result<SparseColMat<usize, Float>, SimError> {
        assemble_jacobian(self.form, self.space, x, self.previous, self.constraints)
    }
}

#[derive(Debug)]
pub struct NonlinearVariationalSolver<'pb> {
    pub(crate) problem: NonlinearVariationalProblem<'pb>,
    newton: NewtonSolver,
}

impl<'pb> NonlinearVariationalSolver<'pb> {
    pub fn new(
        problem: NonlinearVariationalProblem<'pb>,
        params: NewtonParams,
    ) -> Result<Self, SimError> {
        Ok(Self {
            problem,
            newton: NewtonSolver::new(params)?,
        })
    }

    pub fn problem(&self) -> &NonlinearVariationalProblem<'pb> {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut NonlinearVariationalProblem<'pb> {
        &mut self.problem
    }

    pub fn newton(&self) -> &NewtonSolver {
        &self.newton
    }

    /// Applies the boundary values to the current field and solves for it.
    pub fn solve(&mut self) -> Result<SolveResult, SimError> {
        let NonlinearVariationalProblem {
            form,
            space,
            bcs,
            pressure_reference,
            solution,
            previous,
            constraints,
        } = &mut self.problem;

        let x = solution.coefficients_mut();
        for bc in bcs.iter().chain(pressure_reference.iter()) {
            bc.apply(x);
        }

        let discrete = Discrete {
            form: &**form,
            space,
            previous: previous.coefficients(),
            constraints,
        };
        self.newton.solve(&discrete, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        form::NavierStokes,
        mesh::{near, Diagonal, Mesh},
        space::SubSpace,
    };

    fn params() -> NewtonParams {
        NewtonParams {
            absolute_tolerance: 1e-12,
            relative_tolerance: 1e-14,
            maximum_iterations: 5,
            linear_solver: "mumps".to_string(),
            report: false,
            ..Default::default()
        }
    }

    fn cavity(n: usize, lid_speed: Float) -> NonlinearVariationalSolver<'static> {
        let mesh = Rc::new(Mesh::unit_square(n, n, Diagonal::Right));
        let space = Rc::new(MixedSpace::new(mesh));
        let bcs = vec![
            DirichletBC::new("lid", &space, SubSpace::Velocity, [lid_speed, 0.0], |x, b| {
                b && near(x[1], 1.0)
            })
            .unwrap(),
            DirichletBC::new("walls", &space, SubSpace::Velocity, [0.0, 0.0], |x, b| {
                b && !near(x[1], 1.0)
            })
            .unwrap(),
        ];
        let gauge = DirichletBC::new("gauge", &space, SubSpace::Pressure, 0.0, |x, _| {
            near(x[0], 0.0) && near(x[1], 0.0)
        })
        .unwrap();
        let problem = NonlinearVariationalProblem::new(
            NavierStokes::new(0.01, 1.0, 0.01),
            Rc::clone(&space),
            bcs,
        )
        .with_pressure_reference(gauge);
        NonlinearVariationalSolver::new(problem, params()).unwrap()
    }

    #[test]
    fn quiescent_cavity_needs_no_correction() {
        let mut solver = cavity(3, 0.0);
        let result = solver.solve().unwrap();
        assert_eq!(result.iterations, 0);
        assert_eq!(solver.problem().solution().coefficients().norm_l2(), 0.0);
    }

    #[test]
    fn driven_cavity_converges_and_respects_boundary_values() {
        let mut solver = cavity(4, 1.0);
        let result = solver.solve().unwrap();
        assert!(result.converged);
        assert!(result.iterations >= 1 && result.iterations <= 5);

        let problem = solver.problem();
        let x = problem.solution().coefficients();
        for bc in problem.bcs() {
            for &(dof, value) in bc.dofs() {
                assert!((x[(dof, 0)] - value).abs() < 1e-12);
            }
        }
        assert!(problem.solution().kinetic_energy() > 0.0);
    }

    #[test]
    fn advance_copies_the_current_field() {
        let mut solver = cavity(2, 1.0);
        solver.solve().unwrap();
        solver.problem_mut().advance();
        let problem = solver.problem();
        assert_eq!(
            problem.previous().coefficients(),
            problem.solution().coefficients()
        );
    }
}
