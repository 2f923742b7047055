use std::fmt;

use faer::{prelude::SpSolver, sparse::SparseColMat, Mat};

use crate::{Float, SimError};

/// Sparse direct backend used for the Newton corrections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearSolver {
    // name as requested by the caller, kept for reporting
    requested: String,
    kind: LinearSolverKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolverKind {
    /// Supernodal sparse LU with partial pivoting.
    SparseLu,
}

impl LinearSolver {
    /// Accepts the names of common direct solvers; all of them are served by
    /// the sparse LU factorization.
    pub fn from_name(name: &str) -> Result<Self, SimError> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "default" | "lu" | "mumps" | "umfpack" | "superlu" | "superlu_dist" | "pastix" => {
                LinearSolverKind::SparseLu
            }
            _ => return Err(SimError::UnknownLinearSolver(name.to_string())),
        };
        Ok(Self {
            requested: name.to_string(),
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.requested
    }

    pub fn kind(&self) -> LinearSolverKind {
        self.kind
    }

    /// Solves `a x = b`, overwriting `b` with `x`.
    pub fn solve_in_place(
        &self,
        a: &SparseColMat<usize, Float>,
        b: &mut Mat<Float>,
    ) -> Result<(), SimError> {
        // faer aborts on an exact zero pivot instead of reporting it
        if let Some(empty) = empty_line(a) {
            tracing::event!(tracing::Level::DEBUG, "matrix has an empty {empty}");
            return Err(SimError::SingularSystem);
        }

        match self.kind {
            LinearSolverKind::SparseLu => {
                let lu = a
                    .as_ref()
                    .sp_lu()
                    .map_err(|e| SimError::Factorization(format!("{e:?}")))?;
                lu.solve_in_place(b.as_mut());
            }
        }

        // a singular pivot shows up as inf/nan rather than as a factorization error
        if (0..b.nrows()).any(|i| !b[(i, 0)].is_finite()) {
            return Err(SimError::SingularSystem);
        }
        Ok(())
    }
}

// first row or column without a nonzero entry
fn empty_line(a: &SparseColMat<usize, Float>) -> Option<String> {
    let a = a.as_ref();
    let mut row_filled = vec![false; a.nrows()];
    for j in 0..a.ncols() {
        let mut col_filled = false;
        for (&i, &v) in a.row_indices_of_col_raw(j).iter().zip(a.values_of_col(j)) {
            if v != 0.0 {
                row_filled[i] = true;
                col_filled = true;
            }
        }
        if !col_filled {
            return Some(format!("column {j}"));
        }
    }
    row_filled
        .iter()
        .position(|&filled| !filled)
        .map(|i| format!("row {i}"))
}

impl Default for LinearSolver {
    fn default() -> Self {
        Self {
            requested: "default".to_string(),
            kind: LinearSolverKind::SparseLu,
        }
    }
}

impl fmt::Display for LinearSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LinearSolverKind::SparseLu => write!(f, "{} (sparse LU)", self.requested),
        }
    }
}
