use crate::Float;

/// Quadrature rule on the reference triangle `(0, 0), (1, 0), (0, 1)`.
///
/// Weights already include the reference area, so they sum to `1/2`.
#[derive(Debug, Clone, Copy)]
pub struct QuadratureRule<const N: usize> {
    pub points: [[Float; 2]; N],
    pub weights: [Float; N],
}

impl<const N: usize> QuadratureRule<N> {
    pub fn iter(&self) -> impl Iterator<Item = ([Float; 2], Float)> + '_ {
        self.points.iter().copied().zip(self.weights.iter().copied())
    }
}

/// Seven-point rule, exact for polynomials of degree 5.
pub fn degree_5() -> QuadratureRule<7> {
    let s = Float::sqrt(15.0);
    let (a, b) = ((6.0 - s) / 21.0, (6.0 + s) / 21.0);
    let (wa, wb) = ((155.0 - s) / 1200.0, (155.0 + s) / 1200.0);
    let third = 1.0 / 3.0;

    QuadratureRule {
        points: [
            [third, third],
            [a, a],
            [1.0 - 2.0 * a, a],
            [a, 1.0 - 2.0 * a],
            [b, b],
            [1.0 - 2.0 * b, b],
            [b, 1.0 - 2.0 * b],
        ],
        weights: [9.0 / 40.0, wa, wa, wa, wb, wb, wb].map(|w| 0.5 * w),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn factorial(n: u32) -> Float {
        (1..=n).map(|k| k as Float).product()
    }

    #[test]
    fn integrates_monomials_up_to_degree_five() {
        let rule = degree_5();
        for a in 0..=5u32 {
            for b in 0..=(5 - a) {
                let approx: Float = rule
                    .iter()
                    .map(|([x, y], w)| w * x.powi(a as i32) * y.powi(b as i32))
                    .sum();
                // int_T x^a y^b = a! b! / (a + b + 2)!
                let exact = factorial(a) * factorial(b) / factorial(a + b + 2);
                assert_relative_eq!(approx, exact, epsilon = 1e-14);
            }
        }
    }
}
