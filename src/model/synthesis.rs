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

//! Module responsible for synthesizing perturbation fields.
//!
//! Perturbation of member `p` in year `y` is computed as
//! `A z / sqrt(nsample - 1)`, where `A` is the centered anomaly
//! matrix and `z` is a vector of `nsample` uniform random
//! coefficients drawn from the generator seeded with `1000 y + p`.
//! Thus a member can be regenerated from its seed and the
//! historical inputs at any time without storing the field.

use super::{
    basis::AnomalyBasis,
    configuration::{Config, Variable},
    dataset::{self, GridLayout},
    manifest::ManifestRecord,
    random,
};
use crate::{
    constants::{MAX_MEMBERS, SEED_YEAR_STRIDE},
    errors::{OutputError, SeedError},
    Float,
};
use chrono::Utc;
use log::debug;
use ndarray::{Array1, Array3};
use std::sync::Arc;

/// Seed of the random generator for one ensemble member.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct MemberSeed(u32);

impl MemberSeed {
    /// Computes the seed as `1000 * year + member`.
    ///
    /// Member must be in `1..=999` so that seeds of
    /// distinct (year, member) pairs are distinct.
    pub fn new(year: i32, member: u16) -> Result<Self, SeedError> {
        if !(1..=MAX_MEMBERS).contains(&member) {
            return Err(SeedError::MemberOutOfRange(member));
        }

        let seed = SEED_YEAR_STRIDE * i64::from(year) + i64::from(member);

        u32::try_from(seed)
            .map(MemberSeed)
            .map_err(|_| SeedError::YearOutOfRange(year))
    }

    #[cfg(test)]
    pub fn from_raw(seed: u32) -> Self {
        MemberSeed(seed)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Perturbation field of one member.
#[derive(Clone, PartialEq, Debug)]
pub struct Perturbation {
    pub seed: MemberSeed,
    pub coefficients: Array1<Float>,
    pub field: Array3<Float>,
}

impl AnomalyBasis {
    /// Projects `coefficients` through the basis and reshapes
    /// the result to the grid of the historical fields.
    pub fn project(&self, coefficients: &Array1<Float>) -> Result<Array3<Float>, OutputError> {
        let scale = ((self.sample_count() - 1) as Float).sqrt();
        let flat = self.anomalies().dot(coefficients) / scale;

        Ok(flat.into_shape(self.shape())?)
    }

    /// Synthesizes the perturbation of member with given seed.
    pub fn perturb(&self, seed: MemberSeed) -> Result<Perturbation, OutputError> {
        let coefficients = random::draw_coefficients(seed, self.sample_count());
        let field = self.project(&coefficients)?;

        Ok(Perturbation {
            seed,
            coefficients,
            field,
        })
    }
}

/// Everything a member job needs, shared between
/// all jobs of one variable.
#[derive(Debug)]
pub struct SharedState {
    pub config: Arc<Config>,
    pub variable: Variable,
    pub basis: AnomalyBasis,
    pub layout: GridLayout,
}

/// Generates and writes the perturbation of one member,
/// overwriting an existing file.
///
/// Output directory must already exist.
pub fn generate_member(
    shared: &SharedState,
    year: i32,
    member: u16,
) -> Result<ManifestRecord, OutputError> {
    let perturbation = shared.basis.perturb(MemberSeed::new(year, member)?)?;
    let seed = perturbation.seed;

    debug!(
        "{} {} member {}: seed {}, first coefficient {}, last coefficient {}",
        shared.variable.name,
        year,
        member,
        seed.value(),
        first_or_nan(&perturbation.coefficients),
        last_or_nan(&perturbation.coefficients)
    );

    let out_path = shared.config.member_file_path(&shared.variable, year, member);

    let history = format!(
        "{}: perturbation of {} for {}, member {} (seed {}) from reference window {}-{}",
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        shared.variable.name,
        year,
        member,
        seed.value(),
        shared.config.reference.begin,
        shared.config.reference.end
    );

    dataset::write_field(&out_path, &shared.layout, &perturbation.field, &history)?;

    Ok(ManifestRecord {
        variable: shared.variable.name.clone(),
        year,
        member,
        seed: seed.value(),
        first_coefficient: first_or_nan(&perturbation.coefficients),
        last_coefficient: last_or_nan(&perturbation.coefficients),
        path: out_path.display().to_string(),
    })
}

fn first_or_nan(values: &Array1<Float>) -> Float {
    values.iter().next().copied().unwrap_or(Float::NAN)
}

fn last_or_nan(values: &Array1<Float>) -> Float {
    values.iter().next_back().copied().unwrap_or(Float::NAN)
}
