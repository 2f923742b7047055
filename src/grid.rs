use crate::Float;

// Relative slack when counting steps, so that 2.0 / 0.01 gives 200 and not 201.
const STEP_COUNT_SLACK: Float = 1e-9;

// grid[0] <-> lower
// grid[n] <-> lower + n * step_size forall n
// grid[steps] >= upper, grid[steps - 1] < upper
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    lower: Float,
    upper: Float,
    steps: usize,
    step_size: Float,
}

impl Grid {
    pub fn from_steps(lower: Float, upper: Float, steps: usize) -> Self {
        let step_size = (upper - lower) / steps as Float;
        Grid {
            lower,
            upper,
            steps,
            step_size,
        }
    }

    /// Keeps `step_size` as given: the last step may end past `upper` when the
    /// interval is not a multiple of the step.
    pub fn from_step_size(lower: Float, upper: Float, step_size: Float) -> Self {
        let ratio = (upper - lower) / step_size;
        let steps = (ratio - STEP_COUNT_SLACK * ratio.abs().max(1.0)).ceil().max(0.0);
        Grid {
            lower,
            upper,
            steps: steps as usize,
            step_size,
        }
    }

    pub fn lower(&self) -> Float {
        self.lower
    }

    pub fn upper(&self) -> Float {
        self.upper
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn step_size(&self) -> Float {
        self.step_size
    }

    pub fn time_at(&self, n: usize) -> Float {
        self.lower + self.step_size * n as Float
    }

    pub fn iter(self) -> impl Iterator<Item = Float> {
        (0..(self.steps + 1)).map(move |n| self.time_at(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cavity_horizon_takes_two_hundred_steps() {
        let grid = Grid::from_step_size(0.0, 2.0, 0.01);
        assert_eq!(grid.steps(), 200);
        assert_eq!(grid.step_size(), 0.01);
    }

    #[test]
    fn time_is_an_exact_multiple_of_the_step() {
        let grid = Grid::from_step_size(0.0, 2.0, 0.01);
        for n in 0..=grid.steps() {
            assert_eq!(grid.time_at(n), n as Float * 0.01);
        }
        assert_relative_eq!(grid.time_at(grid.steps()), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn partial_last_step_overshoots_the_horizon() {
        let grid = Grid::from_step_size(0.0, 1.0, 0.3);
        assert_eq!(grid.steps(), 4);
        assert!(grid.time_at(3) < 1.0);
        assert!(grid.time_at(4) >= 1.0);
    }

    #[test]
    fn iter_yields_every_level() {
        let grid = Grid::from_steps(1.0, 2.0, 4);
        let levels: Vec<_> = grid.iter().collect();
        assert_eq!(levels, vec![1.0, 1.25, 1.5, 1.75, 2.0]);
    }

    #[test]
    fn empty_interval_has_no_steps() {
        let grid = Grid::from_step_size(1.0, 1.0, 0.1);
        assert_eq!(grid.steps(), 0);
    }
}
