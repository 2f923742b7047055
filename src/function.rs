use std::rc::Rc;

use faer::Mat;

use crate::{
    element::{AffineMap, P1, P2},
    mesh::{Mesh, Point},
    quadrature,
    space::MixedSpace,
    Float,
};

/// Discrete field over a [`MixedSpace`], stored as a single-column matrix of
/// coefficients.
#[derive(Debug, Clone)]
pub struct Function {
    space: Rc<MixedSpace>,
    coefficients: Mat<Float>,
}

/// Vertex values of one component of a split [`Function`].
#[derive(Debug, Clone, PartialEq)]
pub struct VertexField {
    name: &'static str,
    components: usize,
    values: Vec<Float>,
}

impl VertexField {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Flat values, `components` per vertex.
    pub fn values(&self) -> &[Float] {
        &self.values
    }

    pub fn at(&self, vertex: usize) -> &[Float] {
        &self.values[vertex * self.components..(vertex + 1) * self.components]
    }
}

impl Function {
    pub fn zeros(space: Rc<MixedSpace>) -> Self {
        let coefficients = Mat::zeros(space.dim(), 1);
        Self {
            space,
            coefficients,
        }
    }

    pub fn space(&self) -> &Rc<MixedSpace> {
        &self.space
    }

    pub fn coefficients(&self) -> &Mat<Float> {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut Mat<Float> {
        &mut self.coefficients
    }

    /// Copies the coefficients of `other`, which must live on the same space.
    pub fn assign(&mut self, other: &Function) {
        assert!(Rc::ptr_eq(&self.space, &other.space));
        self.coefficients.clone_from(&other.coefficients);
    }

    pub fn velocity_at_node(&self, node: usize) -> [Float; 2] {
        self.space
            .velocity_dofs(node)
            .map(|dof| self.coefficients[(dof, 0)])
    }

    pub fn pressure_at_vertex(&self, vertex: usize) -> Float {
        self.coefficients[(self.space.pressure_dof(vertex), 0)]
    }

    /// Sets the velocity coefficients to the nodal values of `f`.
    pub fn interpolate_velocity(&mut self, f: impl Fn(Point) -> [Float; 2]) {
        for node in 0..self.space.num_nodes() {
            let value = f(self.space.node_coordinates(node));
            for (dof, v) in self.space.velocity_dofs(node).into_iter().zip(value) {
                self.coefficients[(dof, 0)] = v;
            }
        }
    }

    /// Sets the pressure coefficients to the vertex values of `f`.
    pub fn interpolate_pressure(&mut self, f: impl Fn(Point) -> Float) {
        for (vertex, &x) in self.space.mesh().vertices().iter().enumerate() {
            self.coefficients[(self.space.pressure_dof(vertex), 0)] = f(x);
        }
    }

    /// Splits into vertex-valued velocity (three components, the last one zero)
    /// and pressure fields.
    pub fn split(&self) -> (VertexField, VertexField) {
        let vertices = self.space.mesh().num_vertices();

        let mut velocity = Vec::with_capacity(3 * vertices);
        for vertex in 0..vertices {
            let [ux, uy] = self.velocity_at_node(vertex);
            velocity.extend_from_slice(&[ux, uy, 0.0]);
        }
        let pressure = (0..vertices).map(|v| self.pressure_at_vertex(v)).collect();

        (
            VertexField {
                name: "velocity",
                components: 3,
                values: velocity,
            },
            VertexField {
                name: "pressure",
                components: 1,
                values: pressure,
            },
        )
    }

    /// `1/2 * int |u|^2`
    pub fn kinetic_energy(&self) -> Float {
        0.5 * self.integrate(|u, _| u[0] * u[0] + u[1] * u[1])
    }

    /// `|| div u ||_L2`
    pub fn divergence_l2(&self) -> Float {
        self.integrate(|_, grad| {
            let div = grad[0][0] + grad[1][1];
            div * div
        })
        .sqrt()
    }

    // integrates `f(u, grad u)` where grad[c][d] = d u_c / d x_d
    fn integrate(&self, f: impl Fn([Float; 2], [[Float; 2]; 2]) -> Float) -> Float {
        let mesh: &Mesh = self.space.mesh();
        let rule = quadrature::degree_5();
        let mut total = 0.0;

        for cell in 0..mesh.num_cells() {
            let map = AffineMap::new(mesh.cell_coordinates(cell));
            let nodal: Vec<[Float; 2]> = self
                .space
                .cell_nodes(cell)
                .iter()
                .map(|&node| self.velocity_at_node(node))
                .collect();

            for (xi, w) in rule.iter() {
                let phi = P2::values(xi);
                let dphi = P2::reference_gradients(xi).map(|g| map.push_gradient(g));

                let mut u = [0.0; 2];
                let mut grad = [[0.0; 2]; 2];
                for a in 0..P2::DIM {
                    for c in 0..2 {
                        u[c] += nodal[a][c] * phi[a];
                        grad[c][0] += nodal[a][c] * dphi[a][0];
                        grad[c][1] += nodal[a][c] * dphi[a][1];
                    }
                }
                total += w * map.det().abs() * f(u, grad);
            }
        }

        total
    }

    /// Pressure mean over the domain.
    pub fn pressure_mean(&self) -> Float {
        let mesh = self.space.mesh();
        let rule = quadrature::degree_5();
        let mut integral = 0.0;
        let mut area = 0.0;
        for (cell, vertices) in mesh.cells().iter().enumerate() {
            let map = AffineMap::new(mesh.cell_coordinates(cell));
            let nodal = vertices.map(|v| self.pressure_at_vertex(v));
            for (xi, w) in rule.iter() {
                let psi = P1::values(xi);
                let p: Float = psi.iter().zip(nodal).map(|(s, p)| s * p).sum();
                integral += w * map.det().abs() * p;
                area += w * map.det().abs();
            }
        }
        integral / area
    }
}
