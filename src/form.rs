//! Weak forms and their assembly over a [`MixedSpace`].

use std::fmt;

use faer::{sparse::SparseColMat, Mat};

use crate::{
    element::{AffineMap, P1, P2},
    quadrature,
    space::{MixedSpace, CELL_DOFS, CELL_VELOCITY_DOFS},
    Float, SimError,
};

const QUADRATURE_POINTS: usize = 7;

/// Local data handed to the cell kernels.
#[derive(Debug, Clone, Copy)]
pub struct CellData {
    pub map: AffineMap,
    /// Current coefficients, in [`MixedSpace::cell_dofs`] order.
    pub w: [Float; CELL_DOFS],
    /// Coefficients at the previous time level.
    pub w_prev: [Float; CELL_DOFS],
}

/// A residual `F(w; w_prev)` given cell by cell, together with its derivative
/// with respect to `w`.
pub trait WeakForm {
    fn name(&self) -> &str;

    fn cell_residual(&self, cell: &CellData, out: &mut [Float; CELL_DOFS]);

    fn cell_jacobian(&self, cell: &CellData, out: &mut [[Float; CELL_DOFS]; CELL_DOFS]);
}

// basis values and reference gradients at the quadrature points
#[derive(Debug, Clone)]
struct Tabulation {
    weights: [Float; QUADRATURE_POINTS],
    p2: [[Float; 6]; QUADRATURE_POINTS],
    dp2: [[[Float; 2]; 6]; QUADRATURE_POINTS],
    p1: [[Float; 3]; QUADRATURE_POINTS],
}

impl Tabulation {
    fn new() -> Self {
        let rule = quadrature::degree_5();
        Self {
            weights: rule.weights,
            p2: rule.points.map(P2::values),
            dp2: rule.points.map(P2::reference_gradients),
            p1: rule.points.map(P1::values),
        }
    }
}

/// Implicit Euler step of the incompressible Navier-Stokes equations with the
/// convecting velocity lagged at the previous time level:
///
/// `rho ((u - u_prev) / dt, v) + rho ((u_prev . grad) u, v) + nu (grad u, grad v)
///  - (p, div v) + (div u, q)`
#[derive(Debug, Clone)]
pub struct NavierStokes {
    viscosity: Float,
    density: Float,
    time_step: Float,
    tabulation: Tabulation,
}

// values at one quadrature point
struct PointData {
    dx: Float,
    phi: [Float; 6],
    dphi: [[Float; 2]; 6],
    psi: [Float; 3],
    u: [Float; 2],
    u_prev: [Float; 2],
    // grad_u[c][d] = d u_c / d x_d
    grad_u: [[Float; 2]; 2],
    p: Float,
}

impl NavierStokes {
    pub fn new(viscosity: Float, density: Float, time_step: Float) -> Self {
        Self {
            viscosity,
            density,
            time_step,
            tabulation: Tabulation::new(),
        }
    }

    pub fn viscosity(&self) -> Float {
        self.viscosity
    }

    pub fn density(&self) -> Float {
        self.density
    }

    pub fn time_step(&self) -> Float {
        self.time_step
    }

    fn points<'a>(&'a self, cell: &'a CellData) -> impl Iterator<Item = PointData> + 'a {
        let t = &self.tabulation;
        (0..QUADRATURE_POINTS).map(move |q| {
            let phi = t.p2[q];
            let dphi = t.dp2[q].map(|g| cell.map.push_gradient(g));
            let psi = t.p1[q];

            let mut u = [0.0; 2];
            let mut u_prev = [0.0; 2];
            let mut grad_u = [[0.0; 2]; 2];
            for a in 0..P2::DIM {
                for c in 0..2 {
                    let (coeff, coeff_prev) = (cell.w[2 * a + c], cell.w_prev[2 * a + c]);
                    u[c] += coeff * phi[a];
                    u_prev[c] += coeff_prev * phi[a];
                    grad_u[c][0] += coeff * dphi[a][0];
                    grad_u[c][1] += coeff * dphi[a][1];
                }
            }
            let p: Float = (0..P1::DIM)
                .map(|i| cell.w[CELL_VELOCITY_DOFS + i] * psi[i])
                .sum();

            PointData {
                dx: t.weights[q] * cell.map.det().abs(),
                phi,
                dphi,
                psi,
                u,
                u_prev,
                grad_u,
                p,
            }
        })
    }
}

impl WeakForm for NavierStokes {
    fn name(&self) -> &str {
        "Navier-Stokes (implicit Euler, lagged convection)"
    }

    fn cell_residual(&self, cell: &CellData, out: &mut [Float; CELL_DOFS]) {
        let (rho, nu, dt) = (self.density, self.viscosity, self.time_step);

        for pt in self.points(cell) {
            let PointData {
                dx,
                phi,
                dphi,
                psi,
                u,
                u_prev,
                grad_u,
                p,
            } = pt;

            for c in 0..2 {
                let convection = u_prev[0] * grad_u[c][0] + u_prev[1] * grad_u[c][1];
                let inertia = rho * ((u[c] - u_prev[c]) / dt + convection);
                for a in 0..P2::DIM {
                    let diffusion = nu * (grad_u[c][0] * dphi[a][0] + grad_u[c][1] * dphi[a][1]);
                    out[2 * a + c] += (inertia * phi[a] + diffusion - p * dphi[a][c]) * dx;
                }
            }

            let div = grad_u[0][0] + grad_u[1][1];
            for i in 0..P1::DIM {
                out[CELL_VELOCITY_DOFS + i] += div * psi[i] * dx;
            }
        }
    }

    fn cell_jacobian(&self, cell: &CellData, out: &mut [[Float; CELL_DOFS]; CELL_DOFS]) {
        let (rho, nu, dt) = (self.density, self.viscosity, self.time_step);

        for pt in self.points(cell) {
            let PointData {
                dx,
                phi,
                dphi,
                psi,
                u_prev,
                ..
            } = pt;

            for b in 0..P2::DIM {
                let advection = u_prev[0] * dphi[b][0] + u_prev[1] * dphi[b][1];
                let trial = rho * (phi[b] / dt + advection);
                for a in 0..P2::DIM {
                    let k = (trial * phi[a] + nu * (dphi[b][0] * dphi[a][0] + dphi[b][1] * dphi[a][1]))
                        * dx;
                    out[2 * a][2 * b] += k;
                    out[2 * a + 1][2 * b + 1] += k;
                }
            }

            for a in 0..P2::DIM {
                for c in 0..2 {
                    for j in 0..P1::DIM {
                        let b = psi[j] * dphi[a][c] * dx;
                        out[2 * a + c][CELL_VELOCITY_DOFS + j] -= b;
                        out[CELL_VELOCITY_DOFS + j][2 * a + c] += b;
                    }
                }
            }
        }
    }
}

impl fmt::Display for NavierStokes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (nu = {:e}, rho = {:e}, dt = {:e})",
            self.name(),
            self.viscosity,
            self.density,
            self.time_step
        )
    }
}

fn cell_data(space: &MixedSpace, cell: usize, w: &Mat<Float>, w_prev: &Mat<Float>) -> CellData {
    let dofs = space.cell_dofs(cell);
    CellData {
        map: AffineMap::new(space.mesh().cell_coordinates(cell)),
        w: dofs.map(|d| w[(d, 0)]),
        w_prev: dofs.map(|d| w_prev[(d, 0)]),
    }
}

/// Assembles the global residual into `out`.
///
/// Rows with a prescribed value `g` hold `w - g` instead.
pub fn assemble_residual(
    form: &dyn WeakForm,
    space: &MixedSpace,
    w: &Mat<Float>,
    w_prev: &Mat<Float>,
    constraints: &[Option<Float>],
    out: &mut Mat<Float>,
) {
    debug_assert_eq!(constraints.len(), space.dim());
    for i in 0..out.nrows() {
        out[(i, 0)] = 0.0;
    }

    let mut local = [0.0; CELL_DOFS];
    for cell in 0..space.mesh().num_cells() {
        local.fill(0.0);
        form.cell_residual(&cell_data(space, cell, w, w_prev), &mut local);
        for (&dof, value) in space.cell_dofs(cell).iter().zip(local) {
            out[(dof, 0)] += value;
        }
    }

    for (dof, g) in constraints.iter().enumerate() {
        if let Some(g) = g {
            out[(dof, 0)] = w[(dof, 0)] - g;
        }
    }
}

/// Assembles the global Jacobian as a sparse column matrix.
///
/// Rows with a prescribed value are replaced by identity rows.
pub fn assemble_jacobian(
    form: &dyn WeakForm,
    space: &MixedSpace,
    w: &Mat<Float>,
    w_prev: &Mat<Float>,
    constraints: &[Option<Float>],
) -> Result<SparseColMat<usize, Float>, SimError> {
    let n = space.dim();
    let cells = space.mesh().num_cells();
    let mut triplets = Vec::with_capacity(cells * CELL_DOFS * CELL_DOFS + n);

    let mut local = [[0.0; CELL_DOFS]; CELL_DOFS];
    for cell in 0..cells {
        local.iter_mut().for_each(|row| row.fill(0.0));
        form.cell_jacobian(&cell_data(space, cell, w, w_prev), &mut local);

        let dofs = space.cell_dofs(cell);
        for (i, &row) in dofs.iter().enumerate() {
            if constraints[row].is_some() {
                continue;
            }
            for (j, &col) in dofs.iter().enumerate() {
                triplets.push((row, col, local[i][j]));
            }
        }
    }
    triplets.extend(
        constraints
            .iter()
            .enumerate()
            .filter(|(_, g)| g.is_some())
            .map(|(dof, _)| (dof, dof, 1.0)),
    );

    // merge duplicates ourselves so the matrix holds one entry per position
    triplets.sort_unstable_by_key(|&(row, col, _)| (col, row));
    let mut merged: Vec<(usize, usize, Float)> = Vec::with_capacity(triplets.len() / 4);
    for (row, col, value) in triplets {
        match merged.last_mut() {
            Some(last) if last.0 == row && last.1 == col => last.2 += value,
            _ => merged.push((row, col, value)),
        }
    }

    SparseColMat::try_new_from_triplets(n, n, &merged)
        .map_err(|e| SimError::Assembly(format!("{e:?}")))
}
