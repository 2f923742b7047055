//! Mixed Taylor-Hood function space: P2 vector velocity and P1 pressure.
//!
//! Quadratic nodes are numbered as all mesh vertices followed by all edge
//! midpoints. The two velocity components of node `k` are the dofs `2k` and
//! `2k + 1`; the pressure dof of vertex `v` comes after every velocity dof, at
//! `2 * num_nodes + v`.

use std::{fmt, rc::Rc};

use crate::{
    element::{P1, P2},
    mesh::{Mesh, Point},
};

/// Number of velocity dofs on one cell.
pub const CELL_VELOCITY_DOFS: usize = 2 * P2::DIM;
/// Number of dofs (velocity then pressure) on one cell.
pub const CELL_DOFS: usize = CELL_VELOCITY_DOFS + P1::DIM;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubSpace {
    Velocity,
    Pressure,
}

impl SubSpace {
    /// Index of the sub-space inside the mixed space.
    pub fn index(self) -> usize {
        match self {
            SubSpace::Velocity => 0,
            SubSpace::Pressure => 1,
        }
    }
}

#[derive(Debug)]
pub struct MixedSpace {
    mesh: Rc<Mesh>,
    // cell -> quadratic node indices, in reference basis order
    cell_nodes: Vec<[usize; 6]>,
}

impl MixedSpace {
    pub fn new(mesh: Rc<Mesh>) -> Self {
        let offset = mesh.num_vertices();
        let cell_nodes = mesh
            .cells()
            .iter()
            .zip(mesh.cell_edges())
            .map(|(v, e)| [v[0], v[1], v[2], offset + e[0], offset + e[1], offset + e[2]])
            .collect();

        Self { mesh, cell_nodes }
    }

    pub fn mesh(&self) -> &Rc<Mesh> {
        &self.mesh
    }

    /// Number of quadratic nodes.
    pub fn num_nodes(&self) -> usize {
        self.mesh.num_vertices() + self.mesh.num_edges()
    }

    pub fn velocity_dim(&self) -> usize {
        2 * self.num_nodes()
    }

    pub fn pressure_dim(&self) -> usize {
        self.mesh.num_vertices()
    }

    /// Total number of dofs.
    pub fn dim(&self) -> usize {
        self.velocity_dim() + self.pressure_dim()
    }

    pub fn velocity_dofs(&self, node: usize) -> [usize; 2] {
        [2 * node, 2 * node + 1]
    }

    pub fn pressure_dof(&self, vertex: usize) -> usize {
        self.velocity_dim() + vertex
    }

    pub fn cell_nodes(&self, cell: usize) -> &[usize; 6] {
        &self.cell_nodes[cell]
    }

    /// Global dofs of a cell: 12 velocity dofs (`2a + c` for local node `a`
    /// and component `c`) followed by 3 pressure dofs.
    pub fn cell_dofs(&self, cell: usize) -> [usize; CELL_DOFS] {
        let mut dofs = [0; CELL_DOFS];
        for (a, &node) in self.cell_nodes[cell].iter().enumerate() {
            dofs[2 * a] = 2 * node;
            dofs[2 * a + 1] = 2 * node + 1;
        }
        for (i, &vertex) in self.mesh.cells()[cell].iter().enumerate() {
            dofs[CELL_VELOCITY_DOFS + i] = self.pressure_dof(vertex);
        }
        dofs
    }

    pub fn node_coordinates(&self, node: usize) -> Point {
        let vertices = self.mesh.num_vertices();
        if node < vertices {
            self.mesh.vertices()[node]
        } else {
            self.mesh.edge_midpoint(node - vertices)
        }
    }

    /// Whether a quadratic node lies on a boundary facet.
    pub fn is_boundary_node(&self, node: usize) -> bool {
        let vertices = self.mesh.num_vertices();
        if node < vertices {
            self.mesh.is_boundary_vertex(node)
        } else {
            self.mesh.is_boundary_edge(node - vertices)
        }
    }

    /// Dofs of a sub-space, each with its coordinate and boundary flag.
    pub fn tabulate_dofs(&self, sub: SubSpace) -> Vec<(usize, Point, bool)> {
        match sub {
            SubSpace::Velocity => (0..self.num_nodes())
                .flat_map(|node| {
                    let x = self.node_coordinates(node);
                    let on_boundary = self.is_boundary_node(node);
                    self.velocity_dofs(node)
                        .into_iter()
                        .map(move |dof| (dof, x, on_boundary))
                })
                .collect(),
            SubSpace::Pressure => (0..self.pressure_dim())
                .map(|v| {
                    (
                        self.pressure_dof(v),
                        self.mesh.vertices()[v],
                        self.mesh.is_boundary_vertex(v),
                    )
                })
                .collect(),
        }
    }
}

impl fmt::Display for MixedSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P2 x P1 on {} cells ({} velocity dofs, {} pressure dofs)",
            self.mesh.num_cells(),
            self.velocity_dim(),
            self.pressure_dim()
        )
    }
}
