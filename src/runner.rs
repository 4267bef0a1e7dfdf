//! Command line runner
//!
//! Builds the transmission groups described by a settings file, optionally writes the composed
//! mixing matrix, and drives a small population of hosts through the deposit, end update and
//! exposure cycle for a number of timesteps.

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rand::prelude::*;
use rand_distr::Poisson;

use crate::args::Args;
use crate::config::Settings;
use crate::core::{
    ContagionPopulation, GroupIndex, Infectable, StrainIdentity, TransmissionGroups,
    TransmissionRoute,
};

#[derive(Clone, Copy, Debug, PartialEq)]
enum HostState {
    Susceptible,
    Infectious {
        strain: StrainIdentity,
        remaining: u32,
    },
    Recovered,
}

#[derive(Clone, Debug)]
struct Host {
    group: GroupIndex,
    state: HostState,
}

/// Single exposure of a susceptible host.
struct Exposure<'a, R: Rng> {
    rng: &'a mut R,
    infection: Option<StrainIdentity>,
}

impl<R: Rng> Infectable for Exposure<'_, R> {
    fn expose(&mut self, contagion: &dyn ContagionPopulation, dt: f32, _route: TransmissionRoute) {
        if self.infection.is_some() {
            return;
        }
        let probability = 1.0 - (-contagion.total_contagion() * dt).exp();
        if self.rng.random::<f32>() < probability {
            self.infection = contagion.resolve_infecting_strain(&mut *self.rng);
        }
    }
}

/// Counts of hosts by state after one timestep.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimestepRecord {
    pub timestep: usize,
    pub susceptible: usize,
    pub infectious: usize,
    pub recovered: usize,
    pub total_contagion: f32,
}

pub struct Runner {
    args: Args,
    groups: TransmissionGroups<f32>,
    labels: Vec<String>,
    hosts: Vec<Host>,
    rng: StdRng,
    duration: Poisson<f64>,
}

impl Runner {
    pub fn new(args: Args) -> Result<Runner> {
        let settings = Self::load_settings(&args.settings)?;
        Self::from_settings(args, &settings)
    }

    pub fn from_settings(args: Args, settings: &Settings) -> Result<Runner> {
        let mut groups = settings.build::<f32>()?;
        log::info!(
            "Built {} transmission groups for {} antigens",
            groups.group_count(),
            groups.antigen_count()
        );

        let mut rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let duration = Poisson::new(args.infectious_period).map_err(|err| {
            anyhow!(
                "infectious period {} is invalid: {err}",
                args.infectious_period
            )
        })?;

        let labels = Self::create_labels(settings, &groups)?;
        let mut hosts = Vec::with_capacity(labels.len() * args.hosts_per_group);
        for group in 0..groups.group_count() {
            let group = GroupIndex::new(group);
            for _ in 0..args.hosts_per_group {
                groups.update_population_size(group, 1.0, 1.0)?;
                hosts.push(Host {
                    group,
                    state: HostState::Susceptible,
                });
            }
        }

        let n_hosts = hosts.len();
        let n_initial = args.initial_infections.min(n_hosts);
        for k in 0..n_initial {
            let strain = StrainIdentity::new(
                (k % groups.antigen_count()) as u32,
                (k % groups.substrain_count().max(1)) as u32,
            );
            let host = &mut hosts[k * n_hosts / n_initial];
            host.state = HostState::Infectious {
                strain,
                remaining: Self::sample_duration(&duration, &mut rng),
            };
        }
        log::info!("Created {} hosts, {} infectious", hosts.len(), n_initial);

        Ok(Self {
            args,
            groups,
            labels,
            hosts,
            rng,
            duration,
        })
    }

    pub fn start(&mut self) -> Result<Vec<TimestepRecord>> {
        self.write_matrix()?;
        let records = self.run()?;
        self.write_records(&records)?;
        Ok(records)
    }

    /// Setup logging level and file
    pub fn setup_logger(args: &Args) {
        let log_level = match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        simple_logging::log_to_file(args.log_file.as_str(), log_level).unwrap_or_else(|_| {
            eprintln!("Unable to open log file.");
            std::process::exit(1);
        });
    }

    /// Load settings from file
    fn load_settings(path: &str) -> Result<Settings> {
        let settings: Settings = Settings::read_from_file(path)
            .with_context(|| format!("unable to read settings from {path}"))?;
        log::info!("Loaded settings\n{}", settings);
        Ok(settings)
    }

    /// Label of every group, e.g. `Risk=High;Location=North`.
    fn create_labels(
        settings: &Settings,
        groups: &TransmissionGroups<f32>,
    ) -> Result<Vec<String>> {
        let mut labels = vec![String::new(); groups.group_count()];
        if settings.properties.is_empty() {
            return Ok(labels);
        }

        let names: Vec<&str> = settings.properties.iter().map(|p| p.name.as_str()).collect();
        for combination in settings
            .properties
            .iter()
            .map(|p| p.values.iter())
            .multi_cartesian_product()
        {
            let group = groups.group_for_properties(names.iter().zip(combination.iter()))?;
            labels[group.index()] = names
                .iter()
                .zip(combination.iter())
                .map(|(name, value)| format!("{name}={value}"))
                .join(";");
        }
        Ok(labels)
    }

    fn sample_duration(duration: &Poisson<f64>, rng: &mut StdRng) -> u32 {
        (duration.sample(rng) as u32).max(1)
    }

    fn write_matrix(&self) -> Result<()> {
        let matrix = self.groups.mixing_matrix();
        for (destination, label) in self.labels.iter().enumerate() {
            log::debug!(
                "Mixing into {} [{}]: {}",
                destination,
                label,
                matrix.row(destination).iter().join(", ")
            );
        }

        if let Some(path) = &self.args.matrix {
            log::info!("Writing mixing matrix to {}", path);
            let mut writer = csv::WriterBuilder::new()
                .from_path(path)
                .with_context(|| format!("unable to create {path}"))?;
            let header = std::iter::once("destination").chain(self.labels.iter().map(String::as_str));
            writer.write_record(header)?;
            for (destination, label) in self.labels.iter().enumerate() {
                writer.write_record(
                    std::iter::once(label.clone())
                        .chain(matrix.row(destination).iter().map(|w| w.to_string())),
                )?;
            }
            writer
                .flush()
                .with_context(|| format!("unable to write {path}"))?;
        }
        Ok(())
    }

    fn run(&mut self) -> Result<Vec<TimestepRecord>> {
        let bar = match self.args.disable_progress_bar || self.args.timesteps == 0 {
            true => None,
            false => {
                let bar = ProgressBar::new(self.args.timesteps as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "[{bar:40}] {pos:>7}/{len:7} [{elapsed_precise} / {duration_precise}] {msg}",
                        )
                        .context("invalid progress bar template")?
                        .progress_chars("=> "),
                );
                Some(bar)
            }
        };

        let mut records = Vec::with_capacity(self.args.timesteps);
        for timestep in 0..self.args.timesteps {
            let record = self.step(timestep)?;
            log::info!(
                "timestep={} susceptible={} infectious={} recovered={} contagion={}",
                record.timestep,
                record.susceptible,
                record.infectious,
                record.recovered,
                record.total_contagion
            );
            if let Some(bar) = bar.as_ref() {
                bar.set_position(timestep as u64 + 1);
                bar.set_message(format!("infectious={}", record.infectious));
            }
            records.push(record);

            if record.infectious == 0 {
                log::info!("No infectious hosts left after timestep {}", timestep);
                break;
            }
        }

        if let Some(bar) = bar {
            bar.finish();
        }
        Ok(records)
    }

    fn step(&mut self, timestep: usize) -> Result<TimestepRecord> {
        for host in self.hosts.iter() {
            if let HostState::Infectious { strain, .. } = host.state {
                self.groups
                    .deposit_contagion(&strain, self.args.infectiousness, host.group)?;
            }
        }
        self.groups.end_update(1.0, 0.0);
        let total_contagion = self.groups.get_total_contagion();

        for host in self.hosts.iter_mut() {
            match host.state {
                HostState::Infectious { strain, remaining } => {
                    host.state = match remaining {
                        0 | 1 => HostState::Recovered,
                        _ => HostState::Infectious {
                            strain,
                            remaining: remaining - 1,
                        },
                    };
                }
                HostState::Susceptible => {
                    let mut exposure = Exposure {
                        rng: &mut self.rng,
                        infection: None,
                    };
                    self.groups.expose_to_contagion(
                        &mut exposure,
                        host.group,
                        self.args.dt,
                        TransmissionRoute::Contact,
                    )?;
                    if let Some(strain) = exposure.infection {
                        log::debug!("Host in group {} infected by {}", host.group, strain);
                        host.state = HostState::Infectious {
                            strain,
                            remaining: Self::sample_duration(&self.duration, &mut self.rng),
                        };
                    }
                }
                HostState::Recovered => {}
            }
        }

        let counts = self.hosts.iter().counts_by(|host| match host.state {
            HostState::Susceptible => 0,
            HostState::Infectious { .. } => 1,
            HostState::Recovered => 2,
        });
        Ok(TimestepRecord {
            timestep,
            susceptible: counts.get(&0).copied().unwrap_or_default(),
            infectious: counts.get(&1).copied().unwrap_or_default(),
            recovered: counts.get(&2).copied().unwrap_or_default(),
            total_contagion,
        })
    }

    fn write_records(&self, records: &[TimestepRecord]) -> Result<()> {
        if let Some(path) = &self.args.output {
            log::info!("Writing {} timesteps to {}", records.len(), path);
            let mut writer = csv::WriterBuilder::new()
                .from_path(path)
                .with_context(|| format!("unable to create {path}"))?;
            writer.write_record([
                "timestep",
                "susceptible",
                "infectious",
                "recovered",
                "total_contagion",
            ])?;
            for record in records {
                writer.write_record(&[
                    record.timestep.to_string(),
                    record.susceptible.to_string(),
                    record.infectious.to_string(),
                    record.recovered.to_string(),
                    record.total_contagion.to_string(),
                ])?;
            }
            writer
                .flush()
                .with_context(|| format!("unable to write {path}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Normalization, PropertySettings};

    fn args(seed: u64) -> Args {
        Args {
            settings: String::new(),
            log_file: String::new(),
            verbose: 0,
            matrix: None,
            timesteps: 30,
            hosts_per_group: 50,
            initial_infections: 4,
            infectious_period: 4.0,
            infectiousness: 2.0,
            dt: 1.0,
            seed: Some(seed),
            output: None,
            disable_progress_bar: true,
        }
    }

    fn settings() -> Settings {
        Settings {
            tag: "contact".to_string(),
            decay_rate: 1.0,
            antigen_count: 1,
            substrain_count: 2,
            normalization: Normalization::GroupPopulation,
            properties: vec![PropertySettings {
                name: "Place".to_string(),
                values: vec!["North".to_string(), "South".to_string()],
                matrix: vec![vec![0.9, 0.1], vec![0.1, 0.9]],
            }],
        }
    }

    #[test]
    fn hosts_are_conserved() {
        let mut runner = Runner::from_settings(args(1), &settings()).unwrap();
        let records = runner.start().unwrap();
        assert!(!records.is_empty());
        for record in records.iter() {
            assert_eq!(record.susceptible + record.infectious + record.recovered, 100);
        }
    }

    #[test]
    fn seeded_runs_agree() {
        let first = Runner::from_settings(args(7), &settings())
            .unwrap()
            .start()
            .unwrap();
        let second = Runner::from_settings(args(7), &settings())
            .unwrap()
            .start()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn labels_follow_group_index() {
        let settings = settings();
        let groups = settings.build::<f32>().unwrap();
        let labels = Runner::create_labels(&settings, &groups).unwrap();
        assert_eq!(labels, vec!["Place=North", "Place=South"]);
    }

    #[test]
    fn missing_settings_file() {
        let error = Runner::load_settings("/nonexistent/contagion/settings.yaml")
            .err()
            .unwrap();
        assert!(error.to_string().contains("unable to read settings"));
    }

    #[test]
    fn invalid_infectious_period() {
        let mut args = args(1);
        args.infectious_period = -1.0;
        let error = Runner::from_settings(args, &settings()).err().unwrap();
        assert!(error.to_string().contains("infectious period"));
    }
}
