use clap::Parser;
use contagion::args::Args;
use contagion::runner::Runner;

fn main() {
    let args = Args::parse();
    Runner::setup_logger(&args);

    let mut runner = Runner::new(args).unwrap_or_else(|err| {
        eprintln!("Unable to set up transmission groups: {err}.");
        std::process::exit(1);
    });

    let records = runner.start().unwrap_or_else(|err| {
        eprintln!("Unable to run timesteps: {err}.");
        std::process::exit(1);
    });

    if let Some(last) = records.last() {
        println!(
            "Finished after {} timesteps: {} susceptible, {} infectious, {} recovered.",
            last.timestep + 1,
            last.susceptible,
            last.infectious,
            last.recovered
        );
    }
}
