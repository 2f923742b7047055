//! Lagrange elements on the reference triangle `(0, 0), (1, 0), (0, 1)`.
//!
//! Barycentric coordinates are `l0 = 1 - x - y`, `l1 = x`, `l2 = y`. Quadratic
//! basis functions are ordered as the three vertices followed by the edges
//! opposite to vertex 0, 1 and 2, i.e. `(1, 2)`, `(0, 2)`, `(0, 1)`.

use crate::{mesh::Point, Float};

const BARYCENTRIC_GRADIENTS: [[Float; 2]; 3] = [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]];
const EDGE_VERTICES: [(usize, usize); 3] = [(1, 2), (0, 2), (0, 1)];

fn barycentric([x, y]: [Float; 2]) -> [Float; 3] {
    [1.0 - x - y, x, y]
}

/// Continuous piecewise-linear element.
pub struct P1;

impl P1 {
    pub const DIM: usize = 3;

    pub fn values(xi: [Float; 2]) -> [Float; 3] {
        barycentric(xi)
    }

    pub fn reference_gradients() -> [[Float; 2]; 3] {
        BARYCENTRIC_GRADIENTS
    }
}

/// Continuous piecewise-quadratic element.
pub struct P2;

impl P2 {
    pub const DIM: usize = 6;

    pub fn values(xi: [Float; 2]) -> [Float; 6] {
        let l = barycentric(xi);
        let mut out = [0.0; 6];
        for i in 0..3 {
            out[i] = l[i] * (2.0 * l[i] - 1.0);
        }
        for (k, &(i, j)) in EDGE_VERTICES.iter().enumerate() {
            out[3 + k] = 4.0 * l[i] * l[j];
        }
        out
    }

    pub fn reference_gradients(xi: [Float; 2]) -> [[Float; 2]; 6] {
        let l = barycentric(xi);
        let g = BARYCENTRIC_GRADIENTS;
        let mut out = [[0.0; 2]; 6];
        for i in 0..3 {
            let s = 4.0 * l[i] - 1.0;
            out[i] = [s * g[i][0], s * g[i][1]];
        }
        for (k, &(i, j)) in EDGE_VERTICES.iter().enumerate() {
            out[3 + k] = [
                4.0 * (l[i] * g[j][0] + l[j] * g[i][0]),
                4.0 * (l[i] * g[j][1] + l[j] * g[i][1]),
            ];
        }
        out
    }
}

/// Affine map from the reference triangle onto a mesh cell.
#[derive(Debug, Clone, Copy)]
pub struct AffineMap {
    origin: Point,
    // columns are the images of the reference edge vectors
    jacobian: [[Float; 2]; 2],
    det: Float,
}

impl AffineMap {
    pub fn new([x0, x1, x2]: [Point; 3]) -> Self {
        let jacobian = [[x1[0] - x0[0], x2[0] - x0[0]], [x1[1] - x0[1], x2[1] - x0[1]]];
        let det = jacobian[0][0] * jacobian[1][1] - jacobian[0][1] * jacobian[1][0];
        Self {
            origin: x0,
            jacobian,
            det,
        }
    }

    pub fn det(&self) -> Float {
        self.det
    }

    pub fn map(&self, [xi, eta]: [Float; 2]) -> Point {
        let j = &self.jacobian;
        [
            self.origin[0] + j[0][0] * xi + j[0][1] * eta,
            self.origin[1] + j[1][0] * xi + j[1][1] * eta,
        ]
    }

    /// Pushes a reference gradient forward: `J^{-T} g`.
    pub fn push_gradient(&self, [gx, gy]: [Float; 2]) -> [Float; 2] {
        let [[a, b], [c, d]] = self.jacobian;
        [(d * gx - c * gy) / self.det, (a * gy - b * gx) / self.det]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const NODES: [[Float; 2]; 6] = [
        [0.0, 0.0],
        [1.0, 0.0],
        [0.0, 1.0],
        [0.5, 0.5],
        [0.0, 0.5],
        [0.5, 0.0],
    ];

    #[test]
    fn p2_is_nodal() {
        for (i, &node) in NODES.iter().enumerate() {
            let values = P2::values(node);
            for (j, v) in values.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(*v, expected, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn bases_are_partitions_of_unity() {
        let xi = [0.2, 0.3];
        assert_relative_eq!(P1::values(xi).iter().sum::<Float>(), 1.0);
        assert_relative_eq!(P2::values(xi).iter().sum::<Float>(), 1.0, epsilon = 1e-15);

        let grad_sum = P2::reference_gradients(xi)
            .iter()
            .fold([0.0, 0.0], |acc, g| [acc[0] + g[0], acc[1] + g[1]]);
        assert_relative_eq!(grad_sum[0], 0.0, epsilon = 1e-14);
        assert_relative_eq!(grad_sum[1], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn p2_gradients_match_finite_differences() {
        let xi = [0.15, 0.6];
        let h = 1e-6;
        let grads = P2::reference_gradients(xi);
        let plus_x = P2::values([xi[0] + h, xi[1]]);
        let minus_x = P2::values([xi[0] - h, xi[1]]);
        let plus_y = P2::values([xi[0], xi[1] + h]);
        let minus_y = P2::values([xi[0], xi[1] - h]);
        for i in 0..6 {
            assert_relative_eq!(grads[i][0], (plus_x[i] - minus_x[i]) / (2.0 * h), epsilon = 1e-8);
            assert_relative_eq!(grads[i][1], (plus_y[i] - minus_y[i]) / (2.0 * h), epsilon = 1e-8);
        }
    }

    #[test]
    fn affine_map_pushes_gradients_of_linear_functions() {
        let map = AffineMap::new([[0.5, 0.0], [1.0, 0.25], [0.25, 1.0]]);
        // f(x, y) = 2x - 3y pulled back onto the reference cell
        let f = |p: Point| 2.0 * p[0] - 3.0 * p[1];
        let f0 = f(map.map([0.0, 0.0]));
        let reference = [f(map.map([1.0, 0.0])) - f0, f(map.map([0.0, 1.0])) - f0];
        let grad = map.push_gradient(reference);
        assert_relative_eq!(grad[0], 2.0, epsilon = 1e-14);
        assert_relative_eq!(grad[1], -3.0, epsilon = 1e-14);
        assert!(map.det() > 0.0);
    }
}
