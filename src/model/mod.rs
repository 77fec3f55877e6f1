/*
Copyright 2021 Jakub Lewandowski

This file is part of Forcing Perturbation Generator (FPG).

Forcing Perturbation Generator (FPG) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Forcing Perturbation Generator (FPG) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Forcing Perturbation Generator (FPG). If not, see https://www.gnu.org/licenses/.
*/

//! Module containing the actual generator code.
//!
//! Variables are processed one after another. For each of them
//! the anomaly basis is built once from the reference window
//! and then every (year, member) pair of the requested target
//! years is synthesized as a separate job on the threadpool.
//! Jobs only share the read-only basis, so their order does not
//! affect the results.

pub mod basis;
pub mod configuration;
pub mod dataset;
pub mod manifest;
pub mod random;
pub mod synthesis;


use crate::{
    cli::Cli,
    errors::{ConfigError, ModelError, OutputError},
    model::{
        basis::AnomalyBasis,
        configuration::{Config, Variable},
        manifest::ManifestRecord,
        synthesis::SharedState,
    },
    ALLOCATOR,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{
    fs,
    ops::RangeInclusive,
    path::Path,
    sync::{mpsc, Arc},
};

/// Outcome of a successful run.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct RunSummary {
    pub variables: usize,
    pub files_written: usize,
}

/// Main generator function, responsible for all steps.
///
/// It reads the configuration, then builds the basis and
/// deploys member jobs for each variable in turn.
pub fn main(cli: &Cli) -> Result<RunSummary, ModelError> {
    info!("Preparing the generator core");

    let target_years = check_target_years(cli.begin_year, cli.end_year)?;
    let config = load_config(cli.config.as_deref())?;
    let model_core = Core::new(config)?;

    model_core.run(target_years)
}

/// Structure containing generator parameters.
#[derive(Debug)]
pub struct Core {
    pub config: Arc<Config>,
    pub threadpool: ThreadPool,
}

impl Core {
    /// Generator [`Core`] constructor.
    ///
    /// Sets the memory limit and spawns the threadpool
    /// requested in the configuration.
    pub fn new(config: Config) -> Result<Self, ModelError> {
        debug!("Setting memory limit");
        let limit = config.resources.memory.saturating_mul(1024 * 1024);
        ALLOCATOR
            .set_limit(limit)
            .map_err(|_| ConfigError::MemoryLimit)?;

        debug!("Setting up ThreadPool");
        let threadpool = ThreadPoolBuilder::new()
            .num_threads(config.resources.threads as usize)
            .stack_size(2 * 1024 * 1024)
            .build()?;

        Ok(Core {
            config: Arc::new(config),
            threadpool,
        })
    }

    /// Generates perturbations of all configured
    /// variables for years in `target_years`.
    pub fn run(&self, target_years: RangeInclusive<i32>) -> Result<RunSummary, ModelError> {
        let mut summary = RunSummary::default();
        let mut failures = vec![];

        for variable in &self.config.variables {
            info!("Processing variable {}", variable.name);

            match self.process_variable(variable, target_years.clone()) {
                Ok(files_written) => {
                    info!("Perturbations for {} complete", variable.name);
                    summary.variables += 1;
                    summary.files_written += files_written;
                }
                Err(err) if self.config.isolate_failures => {
                    error!(
                        "Perturbations for {} failed, continuing with remaining variables: {}",
                        variable.name, err
                    );
                    failures.push((variable.name.clone(), err));
                }
                Err(err) => return Err(err),
            }
        }

        if !failures.is_empty() {
            warn!(
                "{} of {} variables failed",
                failures.len(),
                self.config.variables.len()
            );
            for (name, err) in &failures {
                warn!("  {}: {}", name, err);
            }

            return Err(ModelError::VariablesFailed(failures));
        }

        info!("All perturbations complete");

        Ok(summary)
    }

    /// Builds the basis of one variable and synthesizes all its members.
    /// Returns the number of written files.
    ///
    /// Nothing is written when the basis cannot be built.
    fn process_variable(
        &self,
        variable: &Variable,
        target_years: RangeInclusive<i32>,
    ) -> Result<usize, ModelError> {
        let (basis, layout) = AnomalyBasis::from_reference_window(&self.config, variable)?;

        info!(
            "Anomaly basis of {} built from {} samples of {} gridpoints",
            variable.name,
            basis.sample_count(),
            basis.grid_size()
        );

        prepare_output_dir(&self.config.output.pert_dir)?;

        let shared = Arc::new(SharedState {
            config: Arc::clone(&self.config),
            variable: variable.clone(),
            basis,
            layout,
        });

        let members = self.config.ensemble.members;
        let jobs: Vec<(i32, u16)> = target_years
            .clone()
            .flat_map(|year| (1..=members).map(move |member| (year, member)))
            .collect();
        let jobs_count = jobs.len();

        // set progress bar for generated members
        let members_bar = ProgressBar::new(jobs_count as u64);
        members_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .progress_chars("#>-"),
        );
        members_bar.set_prefix(variable.name.clone());

        // deploy member jobs on to the threadpool
        let (tx, rx) = mpsc::channel();

        for (year, member) in jobs {
            let tx = tx.clone();
            let shared = Arc::clone(&shared);

            self.threadpool.spawn(move || {
                let result = synthesis::generate_member(&shared, year, member);
                // receiver lives until all jobs reported
                let _ = tx.send(result);
            });
        }

        drop(tx);

        // receive all results before reporting the first error,
        // so no job outlives this function
        let mut records: Vec<ManifestRecord> = Vec::with_capacity(jobs_count);
        let mut first_error: Option<OutputError> = None;

        for result in rx.iter().take(jobs_count) {
            match result {
                Ok(record) => records.push(record),
                Err(err) => {
                    error!("Member generation for {} failed: {}", variable.name, err);
                    first_error.get_or_insert(err);
                }
            }
            members_bar.inc(1);
        }

        if let Some(err) = first_error {
            members_bar.abandon_with_message("failed");
            return Err(err.into());
        }

        members_bar.finish_with_message("done");

        let files_written = records.len();

        if self.config.output.manifest {
            let manifest_path = self.config.manifest_file_path(
                variable,
                *target_years.start(),
                *target_years.end(),
            );
            debug!("Writing manifest to {}", manifest_path.display());
            manifest::save_manifest(&manifest_path, records)?;
        }

        Ok(files_written)
    }
}

/// Checks that target years form a non-empty range.
///
/// Target years do not need to lie in the reference window.
fn check_target_years(begin: i32, end: i32) -> Result<RangeInclusive<i32>, ModelError> {
    if begin > end {
        return Err(ModelError::TargetYears(
            "begin year cannot be later than end year",
        ));
    }

    Ok(begin..=end)
}

/// Reads configuration from `path` or uses
/// the defaults if no path is provided.
fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => {
            debug!("Reading configuration from {}", path.display());
            Config::new_from_file(path)
        }
        None => {
            debug!("No configuration file provided, using defaults");
            let config = Config::default();
            config.check_bounds()?;
            Ok(config)
        }
    }
}

/// Creates the output directory (with parents) if it does not exist.
///
/// Called once per variable before any member is written.
fn prepare_output_dir(out_path: &Path) -> Result<(), OutputError> {
    if out_path.is_dir() {
        debug!("Output directory {} exists", out_path.display());
        return Ok(());
    }

    debug!(
        "Output directory {} does not exist so creating a new one",
        out_path.display()
    );
    fs::create_dir_all(out_path)
        .map_err(|err| OutputError::CantCreateDir(out_path.to_path_buf(), err))
}
