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

//! Module responsible for parsing and checking the configuration file.
//!
//! The configuration file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing and automatic type checking.
//! Every field is optional and defaults to the values the JRA55
//! perturbations have always been produced with, so running the
//! generator without any configuration file is equivalent to
//! running it with an empty one.
//!
//! The structures and their fields in this module directly correspond to
//! the fields inside the configuration file so you can check this documentation
//! for more details how to set the config file.

use crate::constants::{
    DEFAULT_DIFF_DIR, DEFAULT_MEMBERS, DEFAULT_PERT_DIR, DEFAULT_PRODUCT,
    DEFAULT_REFERENCE_BEGIN, DEFAULT_REFERENCE_END, DEFAULT_VARIABLES, MAX_MEMBERS,
};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

/// Forcing variable to perturb.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Variable {
    /// Name of the variable used in input and output file names.
    pub name: String,

    /// _(Optional)_ Name of the field inside input files.
    ///
    /// Defaults to [`Variable::name`].
    #[serde(default)]
    pub field: Option<String>,
}

impl Variable {
    pub fn new(name: &str) -> Self {
        Variable {
            name: name.to_string(),
            field: None,
        }
    }

    /// Name of the field read from and written to NetCDF files.
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }
}

/// Historical period from which the anomaly basis is built.
///
/// Each year `y` in `begin+1..=end` contributes one sample:
/// the difference between years `y` and `y-1`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Reference {
    /// First year of the reference window. Defaults to `1990`.
    #[serde(default = "Reference::default_begin")]
    pub begin: i32,

    /// Last year of the reference window. Defaults to `2019`.
    ///
    /// Must be at least two years after `begin`.
    #[serde(default = "Reference::default_end")]
    pub end: i32,
}

impl Reference {
    fn default_begin() -> i32 {
        DEFAULT_REFERENCE_BEGIN
    }

    fn default_end() -> i32 {
        DEFAULT_REFERENCE_END
    }

    /// Number of samples (columns of the anomaly matrix).
    pub fn sample_count(&self) -> usize {
        usize::try_from(self.span()).unwrap_or(0)
    }

    fn span(&self) -> i64 {
        i64::from(self.end) - i64::from(self.begin)
    }

    /// Years whose differences to the previous year are read.
    pub fn sample_years(&self) -> std::ops::RangeInclusive<i32> {
        (self.begin + 1)..=self.end
    }

    /// Checks if the window provides enough samples to
    /// scale perturbations by `1/sqrt(nsample - 1)`.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.span() < 2 {
            return Err(ConfigError::OutOfBounds(
                "Reference window must span at least three years",
            ));
        }

        Ok(())
    }
}

impl Default for Reference {
    fn default() -> Self {
        Reference {
            begin: Reference::default_begin(),
            end: Reference::default_end(),
        }
    }
}

/// Fields describing the generated ensemble.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Ensemble {
    /// Number of members generated for each target year.
    ///
    /// Must be between `1` and `999`, so that seeds of
    /// different years never collide. Defaults to `30`.
    #[serde(default = "Ensemble::default_members")]
    pub members: u16,
}

impl Ensemble {
    fn default_members() -> u16 {
        DEFAULT_MEMBERS
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_MEMBERS).contains(&self.members) {
            return Err(ConfigError::OutOfBounds(
                "Ensemble size must be between 1 and 999",
            ));
        }

        Ok(())
    }
}

impl Default for Ensemble {
    fn default() -> Self {
        Ensemble {
            members: Ensemble::default_members(),
        }
    }
}

/// Fields with information about input data.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Input {
    /// Directory with annual difference files named
    /// `diff_<product>_<variable>_daily_<year>-<year-1>.nc`.
    #[serde(default = "Input::default_diff_dir")]
    pub diff_dir: PathBuf,

    /// Product tag used in input and output file names.
    /// Defaults to `JRA.v1.5`.
    #[serde(default = "Input::default_product")]
    pub product: String,
}

impl Input {
    fn default_diff_dir() -> PathBuf {
        PathBuf::from(DEFAULT_DIFF_DIR)
    }

    fn default_product() -> String {
        DEFAULT_PRODUCT.to_string()
    }
}

impl Default for Input {
    fn default() -> Self {
        Input {
            diff_dir: Input::default_diff_dir(),
            product: Input::default_product(),
        }
    }
}

/// Fields with information about generator output.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Output {
    /// Directory to which perturbations are written.
    /// It is created when it does not exist.
    #[serde(default = "Output::default_pert_dir")]
    pub pert_dir: PathBuf,

    /// _(Optional)_ Whether to write a CSV manifest with seeds
    /// of generated members for each variable. Defaults to `true`.
    #[serde(default = "Output::default_manifest")]
    pub manifest: bool,
}

impl Output {
    fn default_pert_dir() -> PathBuf {
        PathBuf::from(DEFAULT_PERT_DIR)
    }

    fn default_manifest() -> bool {
        true
    }
}

impl Default for Output {
    fn default() -> Self {
        Output {
            pert_dir: Output::default_pert_dir(),
            manifest: Output::default_manifest(),
        }
    }
}

/// _(Optional)_ Fields with information about
/// resources available for the generator.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Thread count used by the generator.
    /// Ensemble members of one variable are computed
    /// on a thread pool with up to this number of workers.
    ///
    /// Cannot be less than `1`. Defaults to `1`.
    #[serde(default = "Resources::default_threads")]
    pub threads: u16,

    /// _(Optional)_ Heap memory limit for the generator in MB.
    /// Useful for enabling meaningful Out-of-memory error messages.
    ///
    /// Cannot be less than `128`. Defaults to whole addressable-space
    /// (`2^32` or `2^64` bytes).
    ///
    /// The anomaly matrix of one variable holds all samples of the
    /// reference window at once, which for the full JRA55 grid
    /// is several gigabytes. When the allocator has a capped memory
    /// amount available it will abort the process with (somehow useful)
    /// OOM error message instead of being silently killed by the system.
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_threads() -> u16 {
        1
    }

    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    /// Checks if thread count and memory limit are
    /// above limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.threads < 1 {
            return Err(ConfigError::OutOfBounds(
                "Available threads cannot be less than 1",
            ));
        }

        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            threads: Resources::default_threads(),
            memory: Resources::default_memory(),
        }
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_variables")]
    pub variables: Vec<Variable>,

    #[serde(default)]
    pub reference: Reference,

    #[serde(default)]
    pub ensemble: Ensemble,

    #[serde(default)]
    pub input: Input,

    #[serde(default)]
    pub output: Output,

    /// _(Optional)_ When `true` a failure of one variable is
    /// logged and the remaining variables are still processed.
    /// The run is reported as failed at the end anyway.
    ///
    /// Defaults to `false`, the first failure stops the run.
    #[serde(default)]
    pub isolate_failures: bool,

    #[serde(default)]
    pub resources: Resources,
}

impl Config {
    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        let config: Config = serde_yaml::from_slice(data.as_slice())?;

        config.check_bounds()?;

        Ok(config)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.variables.is_empty() {
            return Err(ConfigError::OutOfBounds(
                "At least one variable must be listed",
            ));
        }

        let distinct_names: BTreeSet<&str> =
            self.variables.iter().map(|v| v.name.as_str()).collect();

        if distinct_names.len() != self.variables.len() {
            return Err(ConfigError::OutOfBounds("Variable names must be unique"));
        }

        self.reference.check_bounds()?;
        self.ensemble.check_bounds()?;
        self.resources.check_bounds()?;

        Ok(())
    }

    fn default_variables() -> Vec<Variable> {
        DEFAULT_VARIABLES.iter().map(|name| Variable::new(name)).collect()
    }

    /// Path of the difference field between `year` and `year - 1`.
    pub fn diff_file_path(&self, variable: &Variable, year: i32) -> PathBuf {
        self.input.diff_dir.join(format!(
            "diff_{}_{}_daily_{}-{}.nc",
            self.input.product,
            variable.name,
            year,
            year - 1
        ))
    }

    /// Path of the perturbation of `variable` for given `year` and `member`.
    pub fn member_file_path(&self, variable: &Variable, year: i32, member: u16) -> PathBuf {
        self.output.pert_dir.join(format!(
            "mem{:02}_{}_{}_{}.nc",
            member, self.input.product, variable.name, year
        ))
    }

    /// Path of the manifest of `variable` covering years `begin..=end`.
    pub fn manifest_file_path(&self, variable: &Variable, begin: i32, end: i32) -> PathBuf {
        self.output
            .pert_dir
            .join(format!("manifest_{}_{}-{}.csv", variable.name, begin, end))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            variables: Config::default_variables(),
            reference: Reference::default(),
            ensemble: Ensemble::default(),
            input: Input::default(),
            output: Output::default(),
            isolate_failures: false,
            resources: Resources::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Reference, Variable};
    use crate::errors::ConfigError;
    use std::path::{Path, PathBuf};

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.variables.len(), 7);
        assert_eq!(config.reference.begin, 1990);
        assert_eq!(config.reference.end, 2019);
        assert_eq!(config.reference.sample_count(), 29);
        assert_eq!(config.ensemble.members, 30);
        assert!(!config.isolate_failures);
        assert!(config.check_bounds().is_ok());
    }

    #[test]
    fn partial_file() {
        let yaml = r#"
variables:
  - name: t_10
  - name: prec
    field: precip
reference:
  begin: 2000
ensemble:
  members: 5
input:
  diff_dir: /data/diffs
isolate_failures: true
resources:
  threads: 4
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.variables[0].field_name(), "t_10");
        assert_eq!(config.variables[1].field_name(), "precip");
        assert_eq!(config.reference.begin, 2000);
        assert_eq!(config.reference.end, 2019);
        assert_eq!(config.ensemble.members, 5);
        assert_eq!(config.input.diff_dir, PathBuf::from("/data/diffs"));
        assert_eq!(config.input.product, "JRA.v1.5");
        assert!(config.output.manifest);
        assert!(config.isolate_failures);
        assert_eq!(config.resources.threads, 4);
    }

    #[test]
    fn file_templates() {
        let mut config = Config::default();
        config.input.diff_dir = PathBuf::from("diffs");
        config.output.pert_dir = PathBuf::from("perts");
        let t_10 = Variable::new("t_10");

        assert_eq!(
            config.diff_file_path(&t_10, 2003),
            Path::new("diffs/diff_JRA.v1.5_t_10_daily_2003-2002.nc")
        );
        assert_eq!(
            config.member_file_path(&t_10, 2005, 7),
            Path::new("perts/mem07_JRA.v1.5_t_10_2005.nc")
        );
        assert_eq!(
            config.member_file_path(&t_10, 2005, 30),
            Path::new("perts/mem30_JRA.v1.5_t_10_2005.nc")
        );
        assert_eq!(
            config.manifest_file_path(&t_10, 2000, 2001),
            Path::new("perts/manifest_t_10_2000-2001.csv")
        );
    }

    #[test]
    fn sample_years_skip_first_year() {
        let config = Config::default();
        let years: Vec<i32> = config.reference.sample_years().collect();

        assert_eq!(years.first(), Some(&1991));
        assert_eq!(years.last(), Some(&2019));
        assert_eq!(years.len(), config.reference.sample_count());
    }

    #[test]
    fn extreme_reference_years() {
        let reference = Reference {
            begin: i32::MIN,
            end: i32::MAX,
        };
        assert_eq!(reference.sample_count(), u32::MAX as usize);
        assert!(reference.check_bounds().is_ok());

        let reversed = Reference {
            begin: i32::MAX,
            end: i32::MIN,
        };
        assert_eq!(reversed.sample_count(), 0);
        assert!(matches!(
            reversed.check_bounds(),
            Err(ConfigError::OutOfBounds(_))
        ));
    }

    #[test]
    fn out_of_bounds() {
        let mut config = Config::default();
        config.ensemble.members = 1000;
        assert!(matches!(
            config.check_bounds(),
            Err(ConfigError::OutOfBounds(_))
        ));

        let mut config = Config::default();
        config.ensemble.members = 0;
        assert!(config.check_bounds().is_err());

        let mut config = Config::default();
        config.reference.end = config.reference.begin + 1;
        assert!(config.check_bounds().is_err());

        let mut config = Config::default();
        config.reference.begin = 2019;
        config.reference.end = 1990;
        assert!(config.check_bounds().is_err());

        let mut config = Config::default();
        config.variables.clear();
        assert!(config.check_bounds().is_err());

        let mut config = Config::default();
        config.variables.push(Variable::new("t_10"));
        assert!(config.check_bounds().is_err());

        let mut config = Config::default();
        config.resources.threads = 0;
        assert!(config.check_bounds().is_err());

        let mut config = Config::default();
        config.resources.memory = 64;
        assert!(config.check_bounds().is_err());
    }

    #[test]
    fn example_file_matches_defaults() {
        let config = Config::new_from_file(Path::new("./config.yaml")).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn missing_file() {
        let result = Config::new_from_file(Path::new("./does-not-exist.yaml"));

        assert!(matches!(result, Err(ConfigError::CantOpenFile(_))));
    }
}
