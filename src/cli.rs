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

//! Command-line interface of the generator.

use clap::Parser;
use std::path::PathBuf;

/// Stochastic perturbations of JRA55 forcing fields.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fpg",
    version,
    about = "Generates reproducible ensemble perturbations of JRA55 forcing fields"
)]
pub struct Cli {
    /// First year for which perturbations are generated.
    #[arg(allow_negative_numbers = true)]
    pub begin_year: i32,

    /// Last year (inclusive) for which perturbations are generated.
    #[arg(allow_negative_numbers = true)]
    pub end_year: i32,

    /// Path to YAML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
