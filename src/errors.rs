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

use std::path::PathBuf;
use thiserror::Error;

/// Exit code when historical input is missing or inconsistent.
pub const EXIT_INPUT: i32 = 1;

/// Exit code of I/O and all remaining failures.
pub const EXIT_IO: i32 = 2;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Error while reading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Error while creating ThreadPool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Error while building anomaly basis: {0}")]
    Input(#[from] InputError),

    #[error("Error while writing perturbations: {0}")]
    Output(#[from] OutputError),

    #[error("Incorrect target years: {0}")]
    TargetYears(&'static str),

    #[error("Perturbations failed for {} variable(s): {}", .0.len(), failed_names(.0))]
    VariablesFailed(Vec<(String, ModelError)>),
}

impl ModelError {
    /// Process exit code corresponding to the error.
    ///
    /// When failures were isolated per variable
    /// the code of the first failure is used.
    pub fn exit_code(&self) -> i32 {
        match self {
            ModelError::Input(_) => EXIT_INPUT,
            ModelError::VariablesFailed(failures) => failures
                .first()
                .map_or(EXIT_IO, |(_, err)| err.exit_code()),
            _ => EXIT_IO,
        }
    }
}

fn failed_names(failures: &[(String, ModelError)]) -> String {
    failures
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<&str>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open configuration file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize configuration file: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds: {0}")]
    OutOfBounds(&'static str),

    #[error("Memory limit is lower than memory already in use")]
    MemoryLimit,
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Historical difference file {0} does not exist")]
    MissingInput(PathBuf),

    #[error("Field of year {year} has shape {found:?} but {expected:?} was established by the first year")]
    ShapeMismatch {
        year: i32,
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    #[error("Variable {name} not found in {path}")]
    MissingVariable { name: String, path: PathBuf },

    #[error("Variable {name} in {path} has {ndim} dimensions, 3 are required")]
    NotThreeDimensional {
        name: String,
        path: PathBuf,
        ndim: usize,
    },

    #[error("Reference window does not provide enough samples")]
    NotEnoughSamples,

    #[error("Error while reading NetCDF file: {0}")]
    NetCDF(#[from] netcdf::Error),

    #[error("Data in input file has unexpected shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Cannot create output directory {0}: {1}")]
    CantCreateDir(PathBuf, std::io::Error),

    #[error("Error while writing NetCDF file: {0}")]
    NetCDF(#[from] netcdf::Error),

    #[error("Error while writing manifest: {0}")]
    Manifest(#[from] csv::Error),

    #[error("Perturbation does not fit the grid: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Cannot derive member seed: {0}")]
    Seed(#[from] SeedError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedError {
    #[error("Member index {0} is outside 1..=999")]
    MemberOutOfRange(u16),

    #[error("Seed for year {0} does not fit an unsigned 32-bit integer")]
    YearOutOfRange(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let missing = ModelError::from(InputError::MissingInput(PathBuf::from("x.nc")));
        let mismatch = ModelError::from(InputError::ShapeMismatch {
            year: 2003,
            expected: (4, 3, 5),
            found: (4, 3, 6),
        });
        let output = ModelError::from(OutputError::CantCreateDir(
            PathBuf::from("out"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        ));

        assert_eq!(missing.exit_code(), EXIT_INPUT);
        assert_eq!(mismatch.exit_code(), EXIT_INPUT);
        assert_eq!(output.exit_code(), EXIT_IO);
        assert_eq!(ModelError::TargetYears("reversed").exit_code(), EXIT_IO);
        assert_ne!(missing.exit_code(), 0);
    }

    #[test]
    fn isolated_failures_report_first_code() {
        let err = ModelError::VariablesFailed(vec![
            (
                "q_10".to_string(),
                ModelError::from(InputError::MissingInput(PathBuf::from("q.nc"))),
            ),
            ("prec".to_string(), ModelError::TargetYears("reversed")),
        ]);

        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.to_string().contains("q_10, prec"));
    }
}
