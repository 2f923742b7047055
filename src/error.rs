use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("output error")]
    Io(#[from] std::io::Error),

    #[error("VTK output failed: {0}")]
    Vtk(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unknown linear solver `{0}`")]
    UnknownLinearSolver(String),

    #[error("failed to build sparse matrix: {0}")]
    Assembly(String),

    #[error("sparse LU factorization failed: {0}")]
    Factorization(String),

    #[error("linear system is singular")]
    SingularSystem,

    #[error(
        "Newton solver did not converge after {iterations} iterations \
         (r (abs) = {residual:e}, r (rel) = {relative:e})"
    )]
    NonConvergence {
        iterations: u32,
        residual: f64,
        relative: f64,
    },
}

impl SimError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
