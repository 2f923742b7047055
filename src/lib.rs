//! Lid-driven cavity flow: incompressible Navier-Stokes on the unit square,
//! discretised with Taylor-Hood (P2/P1) finite elements and implicit Euler in
//! time, each step solved with Newton's method.

pub mod bc;
pub mod config;
pub mod driver;
pub mod element;
pub mod error;
pub mod form;
pub mod function;
pub mod grid;
pub mod linear;
pub mod mesh;
pub mod non_linear;
pub mod problem;
pub mod quadrature;
pub mod sim;
pub mod space;
pub mod vtk;

pub type Float = f64;

pub use bc::{BoundaryValue, DirichletBC};
pub use config::{CavityConfig, OutputConfig};
pub use driver::{Driver, History, Logger, ObsCtx, Observer, Record, VtkWriter};
pub use error::SimError;
pub use form::{NavierStokes, WeakForm};
pub use function::{Function, VertexField};
pub use grid::Grid;
pub use mesh::{Diagonal, Mesh};
pub use non_linear::{NewtonParams, NewtonSolver, SolveResult};
pub use problem::{NonlinearVariationalProblem, NonlinearVariationalSolver};
pub use sim::{Resolution, Simulation};
pub use space::{MixedSpace, SubSpace};
pub use vtk::VtkFile;
