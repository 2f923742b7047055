use cavity::{CavityConfig, Driver, Logger, SimError, Simulation};

fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let sim = Simulation::new(CavityConfig::default())?;

    Driver::new(sim)
        .with_observer(Logger)
        .with_vtk_output()?
        .run()
}
