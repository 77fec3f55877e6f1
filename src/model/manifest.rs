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

//! Manifest of generated members: which file holds which
//! member and which seed it was generated with.

use crate::{errors::OutputError, Float};
use serde::Serialize;
use std::path::Path;

/// One row of the manifest.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRecord {
    pub variable: String,
    pub year: i32,
    pub member: u16,
    pub seed: u32,
    pub first_coefficient: Float,
    pub last_coefficient: Float,
    pub path: String,
}

/// Writes `records` sorted by year and member
/// to the CSV file at `out_path`.
pub fn save_manifest(out_path: &Path, mut records: Vec<ManifestRecord>) -> Result<(), OutputError> {
    records.sort_by_key(|r| (r.year, r.member));

    let mut out_file = csv::Writer::from_path(out_path)?;

    for record in records {
        out_file.serialize(record)?;
    }

    out_file.flush().map_err(csv::Error::from)?;

    Ok(())
}
