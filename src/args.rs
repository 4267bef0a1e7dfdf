use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = None,
    name = "contagion",
)]
pub struct Args {
    /// Path to settings.
    #[clap(long)]
    pub settings: String,

    /// Path to log file.
    #[clap(long, default_value = "contagion.log")]
    pub log_file: String,

    /// Increase log level (debug, trace).
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to output of the composed mixing matrix (csv file)
    #[clap(long)]
    pub matrix: Option<String>,

    /// Number of timesteps to simulate.
    #[clap(short, long, default_value_t = 0)]
    pub timesteps: usize,

    /// Number of hosts in each transmission group.
    #[clap(long, default_value_t = 100)]
    pub hosts_per_group: usize,

    /// Number of hosts infected at the start, spread over groups and strains.
    #[clap(long, default_value_t = 1)]
    pub initial_infections: usize,

    /// Mean number of timesteps a host stays infectious.
    #[clap(long, default_value_t = 5.0)]
    pub infectious_period: f64,

    /// Contagion shed by an infectious host per timestep.
    #[clap(long, default_value_t = 1.0)]
    pub infectiousness: f32,

    /// Length of a timestep.
    #[clap(long, default_value_t = 1.0)]
    pub dt: f32,

    /// Seed of the random number generator.
    #[clap(long)]
    pub seed: Option<u64>,

    /// Path to output of contagion per timestep (csv file)
    #[clap(long, short)]
    pub output: Option<String>,

    /// Disable progress bar.
    #[clap(long, default_value_t = false)]
    pub disable_progress_bar: bool,
}
