use std::{fmt, rc::Rc};

use crate::{
    bc::DirichletBC,
    config::CavityConfig,
    form::NavierStokes,
    grid::Grid,
    mesh::{near, Mesh, Point},
    problem::{NonlinearVariationalProblem, NonlinearVariationalSolver},
    space::{MixedSpace, SubSpace},
    Float, Function, SimError,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Delta(Float),
    Steps(usize),
}

fn on_lid([_, y]: Point, on_boundary: bool) -> bool {
    on_boundary && near(y, 1.0)
}

fn on_walls(x: Point, on_boundary: bool) -> bool {
    on_boundary && !on_lid(x, on_boundary)
}

fn at_origin([x, y]: Point, _on_boundary: bool) -> bool {
    near(x, 0.0) && near(y, 0.0)
}

/// Everything the time loop needs: mesh, mixed space, boundary conditions,
/// the discrete problem with its Newton solver, and the time grid.
#[derive(Debug)]
pub struct Simulation {
    pub(crate) config: CavityConfig,
    pub(crate) mesh: Rc<Mesh>,
    pub(crate) space: Rc<MixedSpace>,
    pub(crate) solver: NonlinearVariationalSolver<'static>,
    pub(crate) time: Grid,
}

impl Simulation {
    pub fn new(config: CavityConfig) -> Result<Self, SimError> {
        config.validate()?;

        let (nx, ny) = config.resolution;
        let mesh = Rc::new(Mesh::unit_square(nx, ny, config.diagonal));
        let space = Rc::new(MixedSpace::new(Rc::clone(&mesh)));

        let bcs = vec![
            DirichletBC::new(
                "lid",
                &space,
                SubSpace::Velocity,
                config.lid_velocity,
                on_lid,
            )?,
            DirichletBC::new("walls", &space, SubSpace::Velocity, [0.0, 0.0], on_walls)?,
        ];
        // velocity is prescribed on the whole boundary, so pressure needs a level
        let gauge =
            DirichletBC::new("pressure reference", &space, SubSpace::Pressure, 0.0, at_origin)?;

        let form = NavierStokes::new(config.viscosity, config.density, config.time_step);
        let problem = NonlinearVariationalProblem::new(form, Rc::clone(&space), bcs)
            .with_pressure_reference(gauge);
        let solver = NonlinearVariationalSolver::new(problem, config.newton.clone())?;

        let time = Grid::from_step_size(config.start_time, config.end_time, config.time_step);

        tracing::event!(
            tracing::Level::DEBUG,
            "built {} on {} cells, {} time steps",
            space,
            mesh.num_cells(),
            time.steps()
        );

        Ok(Self {
            config,
            mesh,
            space,
            solver,
            time,
        })
    }

    /// Replaces the zero initial velocity by `u0`. Boundary values still win
    /// once the first step is solved.
    pub fn with_initial_velocity(mut self, u0: impl Fn(Point) -> [Float; 2]) -> Self {
        self.solver
            .problem_mut()
            .solution_mut()
            .interpolate_velocity(u0);
        self
    }

    pub fn config(&self) -> &CavityConfig {
        &self.config
    }

    pub fn mesh(&self) -> &Rc<Mesh> {
        &self.mesh
    }

    pub fn space(&self) -> &Rc<MixedSpace> {
        &self.space
    }

    pub fn time(&self) -> &Grid {
        &self.time
    }

    pub fn solver(&self) -> &NonlinearVariationalSolver<'static> {
        &self.solver
    }

    pub fn solution(&self) -> &Function {
        self.solver.problem().solution()
    }

    pub fn previous(&self) -> &Function {
        self.solver.problem().previous()
    }
}

impl fmt::Display for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "simulation of `{}` problem:\n\t- {}\n\t- {} cells, h = {:e}\n\t- Δt = {:e} ({} steps)\n\t- linear solver {}",
            self.solver.problem().form().name(),
            self.space,
            self.mesh.num_cells(),
            self.mesh.hmin(),
            self.time.step_size(),
            self.time.steps(),
            self.solver.newton().linear_solver()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> CavityConfig {
        CavityConfig::default().with_resolution(4, 4)
    }

    #[test]
    fn default_horizon_takes_two_hundred_steps() {
        let sim = Simulation::new(small()).unwrap();
        assert_eq!(sim.time().steps(), 200);
        assert_eq!(sim.solver().problem().bcs().len(), 2);
    }

    #[test]
    fn lid_owns_the_top_corners() {
        let sim = Simulation::new(small()).unwrap();
        let space = sim.space();
        let bcs = sim.solver().problem().bcs();
        let lid = bcs.iter().find(|bc| bc.name() == "lid").unwrap();
        let walls = bcs.iter().find(|bc| bc.name() == "walls").unwrap();

        // vertex (1, 1) is the last one
        let corner = space.mesh().num_vertices() - 1;
        let [ux, uy] = space.velocity_dofs(corner);
        assert!(lid.dofs().contains(&(ux, 1.0)));
        assert!(lid.dofs().contains(&(uy, 0.0)));
        assert!(walls.dofs().iter().all(|&(dof, _)| dof != ux));

        // 4 cells per side give 9 P2 nodes per side and 32 on the boundary
        assert_eq!(lid.dofs().len(), 2 * 9);
        assert_eq!(walls.dofs().len(), 2 * (32 - 9));
    }

    #[test]
    fn lid_comes_before_the_walls() {
        let sim = Simulation::new(small()).unwrap();
        let names: Vec<_> = sim.solver().problem().bcs().iter().map(|bc| bc.name()).collect();
        assert_eq!(names, ["lid", "walls"]);
    }

    #[test]
    fn pressure_level_is_always_fixed() {
        for n in [1, 2, 4] {
            let sim = Simulation::new(CavityConfig::default().with_resolution(n, n)).unwrap();
            let gauge = sim.solver().problem().pressure_reference.as_ref().unwrap();
            assert_eq!(gauge.dofs(), &[(sim.space().pressure_dof(0), 0.0)]);
        }
    }

    #[test]
    fn coarsest_cavity_takes_a_step() {
        // 2x2 leaves only nine interior nodes against eight free pressures
        let mut sim = Simulation::new(CavityConfig::default().with_resolution(2, 2)).unwrap();
        sim.solver.problem_mut().advance();
        let result = sim.solver.solve().unwrap();
        assert!(result.converged);
        assert_eq!(sim.solution().pressure_at_vertex(0), 0.0);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(matches!(
            Simulation::new(small().with_time_step(-0.1)),
            Err(SimError::InvalidParameter {
                name: "time_step",
                ..
            })
        ));
        let newton = crate::non_linear::NewtonParams {
            linear_solver: "cg".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Simulation::new(small().with_newton(newton)),
            Err(SimError::UnknownLinearSolver(_))
        ));
    }
}
