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

//! Forcing Perturbation Generator (FPG) prepares stochastic
//! perturbations of JRA55 atmospheric forcing fields for
//! ensemble simulations of a downstream ocean/sea-ice model.
//!
//! For every forcing variable the generator builds an empirical
//! anomaly basis from historical year-over-year difference fields
//! and then synthesizes new perturbation fields as random linear
//! combinations of that basis. Each ensemble member is fully
//! determined by its target year and member index, so perturbations
//! can be regenerated at any time from the historical inputs alone.

mod cli;
mod constants;
mod errors;
mod model;

use cap::Cap;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::{alloc, process};

type Float = f64;

/// Global allocator used by the generator.
///
/// Use of static global allocator allows for capping the memory to the limit set by user
/// in configuration file and in effect provide better [OOM error](https://en.wikipedia.org/wiki/Out_of_memory) handling.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
/// Prepares the runtime environment and calls the [`model::main`].
///
/// The `env_logger` needs to be initiated before any log messages
/// are possible to occur. Errors are logged and then mapped onto
/// the process exit code.
fn main() {
    let cli = cli::Cli::parse();

    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("FPG_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("FPG_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    match model::main(&cli) {
        Ok(summary) => info!(
            "Generation finished: {} perturbation files written for {} variables. Check the output directory and log.",
            summary.files_written, summary.variables
        ),
        Err(err) => {
            error!("Generation failed with error: {}", err);
            process::exit(err.exit_code());
        }
    }
}
