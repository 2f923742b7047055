use crate::{
    config::{CavityConfig, OutputConfig},
    grid::Grid,
    mesh::Mesh,
    non_linear::SolveResult,
    sim::{Resolution, Simulation},
    space::MixedSpace,
    vtk::VtkFile,
    Float, Function, SimError,
};

pub struct ObsCtx<'ctx> {
    // Meta
    sim: &'ctx Simulation,
    time_sampling: usize,

    // Iteration info
    iter: usize,
    time: Float,
    last_solve: Option<&'ctx SolveResult>,
}

impl<'ctx> ObsCtx<'ctx> {
    pub fn config(&self) -> &'ctx CavityConfig {
        self.sim.config()
    }

    pub fn mesh(&self) -> &'ctx Mesh {
        self.sim.mesh()
    }

    pub fn space(&self) -> &'ctx MixedSpace {
        self.sim.space()
    }

    pub fn time_grid(&self) -> &'ctx Grid {
        self.sim.time()
    }

    pub fn iter(&self) -> usize {
        self.iter
    }

    pub fn time(&self) -> Float {
        self.time
    }

    /// Field at `time()`.
    pub fn solution(&self) -> &'ctx Function {
        self.sim.solution()
    }

    /// Field one step before `time()`.
    pub fn previous(&self) -> &'ctx Function {
        self.sim.previous()
    }

    /// Outcome of the Newton solve that produced `solution()`, if any.
    pub fn last_solve(&self) -> Option<&'ctx SolveResult> {
        self.last_solve
    }

    pub fn sampling_period(&self) -> usize {
        self.time_sampling
    }
}

#[allow(unused_variables)]
pub trait Observer {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        Ok(())
    }
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        (**self).at_startup(ctx)
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        (**self).at_each_iteration(ctx)
    }

    fn at_cleanup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        (**self).at_cleanup(ctx)
    }
}

pub struct Driver<'d> {
    pub(crate) sim: Simulation,
    pub(crate) observers: Vec<Box<dyn Observer + 'd>>,
    pub(crate) time_sampling: usize,
}

impl<'d> Driver<'d> {
    pub fn new(sim: Simulation) -> Self {
        Self {
            sim,
            observers: Vec::new(),
            time_sampling: 1,
        }
    }

    pub fn with_time_sampling(mut self, sampling_period: Resolution) -> Self {
        self.time_sampling = match sampling_period {
            Resolution::Delta(sampling_period) => {
                (sampling_period / self.sim.time.step_size()).ceil() as usize
            }
            Resolution::Steps(sampling_period) => sampling_period,
        }
        .max(1);
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'd) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Adds a [`VtkWriter`] for the paths in the simulation's output
    /// configuration. The collections are created here, after the
    /// configuration has been validated.
    pub fn with_vtk_output(self) -> Result<Self, SimError> {
        let writer = VtkWriter::create(self.sim.config().output())?;
        Ok(self.with_observer(writer))
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Advances the field from the start time to the horizon, one Newton
    /// solve per step. The first error stops the loop.
    pub fn run(&mut self) -> Result<(), SimError> {
        let Self {
            sim,
            observers,
            time_sampling,
        } = self;
        let time_sampling = *time_sampling;
        let time = sim.time;

        for o in observers.iter_mut() {
            o.at_startup(ObsCtx {
                sim,
                time_sampling,
                iter: 0,
                time: time.lower(),
                last_solve: None,
            })?;
        }

        let mut last_solve = None;
        for n in 1..=time.steps() {
            sim.solver.problem_mut().advance();
            let result = sim.solver.solve()?;
            let t = time.time_at(n);

            let result = &*last_solve.insert(result);
            if n % time_sampling == 0 {
                for o in observers.iter_mut() {
                    o.at_each_iteration(ObsCtx {
                        sim,
                        time_sampling,
                        iter: n,
                        time: t,
                        last_solve: Some(result),
                    })?;
                }
            }
        }

        for o in observers.iter_mut() {
            o.at_cleanup(ObsCtx {
                sim,
                time_sampling,
                iter: time.steps(),
                time: time.time_at(time.steps()),
                last_solve: last_solve.as_ref(),
            })?;
        }

        Ok(())
    }
}

pub struct Logger;

impl Observer for Logger {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        tracing::event!(tracing::Level::INFO, "{}", ctx.config());
        tracing::event!(
            tracing::Level::INFO,
            "start of simulation ({} dofs, Δt={:e} ({} steps))",
            ctx.space().dim(),
            ctx.time_grid().step_size(),
            ctx.time_grid().steps(),
        );
        Ok(())
    }

    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        tracing::event!(tracing::Level::INFO, "Time step t = {:.3}", ctx.time());
        tracing::event!(
            tracing::Level::DEBUG,
            "step {}: {} Newton iterations, kinetic energy {:.6e}, |div u| {:.3e}",
            ctx.iter(),
            ctx.last_solve().map_or(0, |r| r.iterations),
            ctx.solution().kinetic_energy(),
            ctx.solution().divergence_l2()
        );
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::INFO,
            "finished simulation at t = {:.3} after {} steps",
            ctx.time(),
            ctx.iter()
        );
        Ok(())
    }
}

/// Appends velocity and pressure snapshots to their `.pvd` collections.
pub struct VtkWriter {
    velocity: VtkFile,
    pressure: VtkFile,
}

impl VtkWriter {
    pub fn create(output: &OutputConfig) -> Result<Self, SimError> {
        Ok(Self {
            velocity: VtkFile::create(&output.velocity)?,
            pressure: VtkFile::create(&output.pressure)?,
        })
    }

    pub fn velocity(&self) -> &VtkFile {
        &self.velocity
    }

    pub fn pressure(&self) -> &VtkFile {
        &self.pressure
    }
}

impl Observer for VtkWriter {
    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        let (u, p) = ctx.solution().split();
        self.velocity.write(ctx.mesh(), &u, ctx.time())?;
        self.pressure.write(ctx.mesh(), &p, ctx.time())
    }

    fn at_cleanup(&mut self, _ctx: ObsCtx) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::DEBUG,
            "{} snapshots in {} and {}",
            self.velocity.snapshots(),
            self.velocity.path().display(),
            self.pressure.path().display()
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub step: usize,
    pub time: Float,
    pub newton_iterations: u32,
    pub kinetic_energy: Float,
}

/// Keeps a summary of every observed step in memory.
#[derive(Debug, Default, Clone)]
pub struct History {
    records: Vec<Record>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn times(&self) -> impl Iterator<Item = Float> + '_ {
        self.records.iter().map(|r| r.time)
    }
}

impl Observer for History {
    fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        self.records.push(Record {
            step: ctx.iter(),
            time: ctx.time(),
            newton_iterations: ctx.last_solve().map_or(0, |r| r.iterations),
            kinetic_energy: ctx.solution().kinetic_energy(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn short_run(steps: usize) -> Simulation {
        let config = CavityConfig::default()
            .with_resolution(3, 3)
            .with_time_interval(0.0, steps as Float * 0.01);
        Simulation::new(config).unwrap()
    }

    #[derive(Default)]
    struct Hooks {
        startup: usize,
        iterations: Vec<usize>,
        cleanup: Option<(usize, Float)>,
    }

    impl Observer for Hooks {
        fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
            assert_eq!(ctx.iter(), 0);
            assert!(ctx.last_solve().is_none());
            self.startup += 1;
            Ok(())
        }

        fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
            assert!(ctx.last_solve().is_some_and(|r| r.converged));
            self.iterations.push(ctx.iter());
            Ok(())
        }

        fn at_cleanup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
            self.cleanup = Some((ctx.iter(), ctx.time()));
            Ok(())
        }
    }

    #[test]
    fn observers_see_every_step() {
        let mut hooks = Hooks::default();
        Driver::new(short_run(3))
            .with_observer(&mut hooks)
            .run()
            .unwrap();

        assert_eq!(hooks.startup, 1);
        assert_eq!(hooks.iterations, vec![1, 2, 3]);
        let (iter, time) = hooks.cleanup.unwrap();
        assert_eq!(iter, 3);
        assert_relative_eq!(time, 0.03, epsilon = 1e-15);
    }

    #[test]
    fn sampling_skips_steps() {
        let mut hooks = Hooks::default();
        let mut history = History::new();
        Driver::new(short_run(4))
            .with_time_sampling(Resolution::Delta(0.02))
            .with_observer(&mut hooks)
            .with_observer(&mut history)
            .run()
            .unwrap();

        assert_eq!(hooks.iterations, vec![2, 4]);
        assert_eq!(history.records().len(), 2);
        assert_relative_eq!(history.records()[1].time, 0.04, epsilon = 1e-15);
    }

    #[test]
    fn observer_errors_stop_the_run() {
        struct Failing(usize);

        impl Observer for Failing {
            fn at_each_iteration(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
                self.0 = ctx.iter();
                Err(SimError::Io(std::io::Error::other("disk full")))
            }
        }

        let mut failing = Failing(0);
        let result = Driver::new(short_run(5))
            .with_observer(&mut failing)
            .run();
        assert!(matches!(result, Err(SimError::Io(_))));
        assert_eq!(failing.0, 1);
    }
}
