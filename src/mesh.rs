use std::collections::HashMap;

use crate::Float;

/// Tolerance used by [`near`] when comparing coordinates.
pub const NEAR_EPS: Float = 3e-16;

pub type Point = [Float; 2];

/// Whether `x` and `x0` coincide up to [`NEAR_EPS`].
pub fn near(x: Float, x0: Float) -> bool {
    (x - x0).abs() <= NEAR_EPS
}

/// Direction of the diagonal splitting each square of a structured mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Diagonal {
    /// From the lower-left to the upper-right corner.
    #[default]
    Right,
    /// From the lower-right to the upper-left corner.
    Left,
}

/// Triangle mesh with the edge connectivity needed by P2 elements.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Point>,
    cells: Vec<[usize; 3]>,
    // edge k of a cell is opposite to its local vertex k
    cell_edges: Vec<[usize; 3]>,
    edges: Vec<[usize; 2]>,
    boundary_edges: Vec<bool>,
    boundary_vertices: Vec<bool>,
}

impl Mesh {
    /// Builds a mesh from counter-clockwise oriented triangles.
    pub fn new(vertices: Vec<Point>, cells: Vec<[usize; 3]>) -> Self {
        let mut edge_index = HashMap::<(usize, usize), usize>::new();
        let mut edges = Vec::new();
        let mut edge_cells = Vec::<usize>::new();
        let mut cell_edges = Vec::with_capacity(cells.len());

        for cell in &cells {
            let mut local = [0; 3];
            for (k, edge) in local.iter_mut().enumerate() {
                let (a, b) = (cell[(k + 1) % 3], cell[(k + 2) % 3]);
                let key = (a.min(b), a.max(b));
                *edge = *edge_index.entry(key).or_insert_with(|| {
                    edges.push([key.0, key.1]);
                    edge_cells.push(0);
                    edges.len() - 1
                });
                edge_cells[*edge] += 1;
            }
            cell_edges.push(local);
        }

        let boundary_edges: Vec<bool> = edge_cells.iter().map(|&count| count == 1).collect();
        let mut boundary_vertices = vec![false; vertices.len()];
        for (edge, &on_boundary) in edges.iter().zip(&boundary_edges) {
            if on_boundary {
                boundary_vertices[edge[0]] = true;
                boundary_vertices[edge[1]] = true;
            }
        }

        tracing::event!(
            tracing::Level::DEBUG,
            "mesh with {} vertices, {} cells, {} edges ({} on the boundary)",
            vertices.len(),
            cells.len(),
            edges.len(),
            boundary_edges.iter().filter(|&&b| b).count()
        );

        Self {
            vertices,
            cells,
            cell_edges,
            edges,
            boundary_edges,
            boundary_vertices,
        }
    }

    /// Uniform triangulation of `[0, 1] x [0, 1]` with `nx * ny` squares,
    /// each split in two triangles.
    pub fn unit_square(nx: usize, ny: usize, diagonal: Diagonal) -> Self {
        let row = nx + 1;
        let vertices = (0..=ny)
            .flat_map(|j| {
                (0..=nx).map(move |i| [i as Float / nx as Float, j as Float / ny as Float])
            })
            .collect();

        let mut cells = Vec::with_capacity(2 * nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let v0 = j * row + i;
                let v1 = v0 + 1;
                let v2 = v0 + row;
                let v3 = v1 + row;
                match diagonal {
                    Diagonal::Right => {
                        cells.push([v0, v1, v3]);
                        cells.push([v0, v3, v2]);
                    }
                    Diagonal::Left => {
                        cells.push([v0, v1, v2]);
                        cells.push([v1, v3, v2]);
                    }
                }
            }
        }

        Self::new(vertices, cells)
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn cells(&self) -> &[[usize; 3]] {
        &self.cells
    }

    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    pub fn cell_edges(&self) -> &[[usize; 3]] {
        &self.cell_edges
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn cell_coordinates(&self, cell: usize) -> [Point; 3] {
        self.cells[cell].map(|v| self.vertices[v])
    }

    pub fn edge_midpoint(&self, edge: usize) -> Point {
        let [a, b] = self.edges[edge].map(|v| self.vertices[v]);
        [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])]
    }

    pub fn is_boundary_edge(&self, edge: usize) -> bool {
        self.boundary_edges[edge]
    }

    pub fn is_boundary_vertex(&self, vertex: usize) -> bool {
        self.boundary_vertices[vertex]
    }

    /// Smallest edge length.
    pub fn hmin(&self) -> Float {
        self.edges
            .iter()
            .map(|&[a, b]| {
                let (a, b) = (self.vertices[a], self.vertices[b]);
                (a[0] - b[0]).hypot(a[1] - b[1])
            })
            .fold(Float::INFINITY, Float::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_area(mesh: &Mesh, cell: usize) -> Float {
        let [a, b, c] = mesh.cell_coordinates(cell);
        0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]))
    }

    #[test]
    fn unit_square_counts() {
        for diagonal in [Diagonal::Right, Diagonal::Left] {
            let mesh = Mesh::unit_square(4, 3, diagonal);
            assert_eq!(mesh.num_vertices(), 5 * 4);
            assert_eq!(mesh.num_cells(), 2 * 4 * 3);
            // horizontal + vertical + diagonal edges
            assert_eq!(mesh.num_edges(), 4 * 4 + 5 * 3 + 4 * 3);
            let boundary = (0..mesh.num_edges())
                .filter(|&e| mesh.is_boundary_edge(e))
                .count();
            assert_eq!(boundary, 2 * (4 + 3));
        }
    }

    #[test]
    fn cells_are_counter_clockwise_and_tile_the_square() {
        let mesh = Mesh::unit_square(5, 5, Diagonal::Right);
        let mut total = 0.0;
        for cell in 0..mesh.num_cells() {
            let area = signed_area(&mesh, cell);
            assert!(area > 0.0);
            total += area;
        }
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cell_edges_are_opposite_to_local_vertices() {
        let mesh = Mesh::unit_square(2, 2, Diagonal::Left);
        for (cell, edges) in mesh.cells().iter().zip(mesh.cell_edges()) {
            for k in 0..3 {
                let edge = mesh.edges()[edges[k]];
                assert!(!edge.contains(&cell[k]));
            }
        }
    }

    #[test]
    fn boundary_vertices_lie_on_the_square_boundary() {
        let mesh = Mesh::unit_square(3, 3, Diagonal::Right);
        for (v, x) in mesh.vertices().iter().enumerate() {
            let on_side =
                near(x[0], 0.0) || near(x[0], 1.0) || near(x[1], 0.0) || near(x[1], 1.0);
            assert_eq!(mesh.is_boundary_vertex(v), on_side);
        }
    }

    #[test]
    fn top_row_is_exactly_one() {
        let mesh = Mesh::unit_square(50, 50, Diagonal::Right);
        let top = mesh.vertices().iter().filter(|x| near(x[1], 1.0)).count();
        assert_eq!(top, 51);
        assert!((mesh.hmin() - 0.02).abs() < 1e-12);
    }
}
