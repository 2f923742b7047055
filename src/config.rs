use std::{fmt, path::PathBuf};

use crate::{mesh::Diagonal, non_linear::NewtonParams, Float, SimError};

pub const MESH_RESOLUTION: usize = 50;
pub const VISCOSITY: Float = 0.01;
pub const DENSITY: Float = 1.0;
pub const LID_VELOCITY: [Float; 2] = [1.0, 0.0];
pub const TIME_STEP: Float = 0.01;
pub const START_TIME: Float = 0.0;
pub const END_TIME: Float = 2.0;
pub const ABSOLUTE_TOLERANCE: Float = 1e-12;
pub const RELATIVE_TOLERANCE: Float = 1e-14;
pub const MAXIMUM_ITERATIONS: u32 = 5;
pub const LINEAR_SOLVER: &str = "mumps";
pub const VELOCITY_OUTPUT: &str = "velocity.pvd";
pub const PRESSURE_OUTPUT: &str = "pressure.pvd";

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub velocity: PathBuf,
    pub pressure: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            velocity: PathBuf::from(VELOCITY_OUTPUT),
            pressure: PathBuf::from(PRESSURE_OUTPUT),
        }
    }
}

/// Every parameter of the lid-driven cavity run.
#[derive(Debug, Clone, PartialEq)]
pub struct CavityConfig {
    pub(crate) resolution: (usize, usize),
    pub(crate) diagonal: Diagonal,
    pub(crate) viscosity: Float,
    pub(crate) density: Float,
    pub(crate) lid_velocity: [Float; 2],
    pub(crate) time_step: Float,
    pub(crate) start_time: Float,
    pub(crate) end_time: Float,
    pub(crate) newton: NewtonParams,
    pub(crate) output: OutputConfig,
}

impl Default for CavityConfig {
    fn default() -> Self {
        Self {
            resolution: (MESH_RESOLUTION, MESH_RESOLUTION),
            diagonal: Diagonal::Right,
            viscosity: VISCOSITY,
            density: DENSITY,
            lid_velocity: LID_VELOCITY,
            time_step: TIME_STEP,
            start_time: START_TIME,
            end_time: END_TIME,
            newton: NewtonParams {
                absolute_tolerance: ABSOLUTE_TOLERANCE,
                relative_tolerance: RELATIVE_TOLERANCE,
                maximum_iterations: MAXIMUM_ITERATIONS,
                linear_solver: LINEAR_SOLVER.to_string(),
                ..NewtonParams::default()
            },
            output: OutputConfig::default(),
        }
    }
}

impl CavityConfig {
    pub fn with_resolution(mut self, nx: usize, ny: usize) -> Self {
        self.resolution = (nx, ny);
        self
    }

    pub fn with_diagonal(mut self, diagonal: Diagonal) -> Self {
        self.diagonal = diagonal;
        self
    }

    pub fn with_viscosity(mut self, viscosity: Float) -> Self {
        self.viscosity = viscosity;
        self
    }

    pub fn with_density(mut self, density: Float) -> Self {
        self.density = density;
        self
    }

    pub fn with_lid_velocity(mut self, lid_velocity: [Float; 2]) -> Self {
        self.lid_velocity = lid_velocity;
        self
    }

    pub fn with_time_step(mut self, time_step: Float) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_time_interval(mut self, start: Float, end: Float) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_newton(mut self, newton: NewtonParams) -> Self {
        self.newton = newton;
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn resolution(&self) -> (usize, usize) {
        self.resolution
    }

    pub fn viscosity(&self) -> Float {
        self.viscosity
    }

    pub fn density(&self) -> Float {
        self.density
    }

    pub fn lid_velocity(&self) -> [Float; 2] {
        self.lid_velocity
    }

    pub fn time_step(&self) -> Float {
        self.time_step
    }

    pub fn start_time(&self) -> Float {
        self.start_time
    }

    pub fn end_time(&self) -> Float {
        self.end_time
    }

    pub fn newton(&self) -> &NewtonParams {
        &self.newton
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Reynolds number based on the lid speed and the cavity width.
    pub fn reynolds(&self) -> Float {
        let [ux, uy] = self.lid_velocity;
        self.density * ux.hypot(uy) / self.viscosity
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let (nx, ny) = self.resolution;
        if nx == 0 || ny == 0 {
            return Err(SimError::invalid(
                "resolution",
                format!("needs at least one cell per direction, got {nx}x{ny}"),
            ));
        }
        let positive = [
            ("viscosity", self.viscosity),
            ("density", self.density),
            ("time_step", self.time_step),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SimError::invalid(name, format!("must be positive, got {value}")));
            }
        }
        if !(self.end_time > self.start_time) {
            return Err(SimError::invalid(
                "end_time",
                format!(
                    "must come after the start time ({} <= {})",
                    self.end_time, self.start_time
                ),
            ));
        }
        let tolerances = [
            ("absolute_tolerance", self.newton.absolute_tolerance),
            ("relative_tolerance", self.newton.relative_tolerance),
        ];
        for (name, value) in tolerances {
            if !(value >= 0.0) {
                return Err(SimError::invalid(name, format!("must be non-negative, got {value}")));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CavityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lid-driven cavity:\n\t- mesh {}x{} ({:?} diagonal)\n\t- nu = {:e}, rho = {:e} (Re = {})\
             \n\t- lid velocity = ({}, {})\n\t- dt = {:e}, t in [{}, {}]\n\t- {}",
            self.resolution.0,
            self.resolution.1,
            self.diagonal,
            self.viscosity,
            self.density,
            self.reynolds(),
            self.lid_velocity[0],
            self.lid_velocity[1],
            self.time_step,
            self.start_time,
            self.end_time,
            self.newton
        )
    }
}
