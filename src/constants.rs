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

//! Module containing constants used by the generator.
//!
//! Most of them are only defaults of the configuration,
//! see [`Config`](crate::model::configuration::Config).

///Forcing variables perturbed when configuration does not list any
pub const DEFAULT_VARIABLES: [&str; 7] = ["t_10", "q_10", "u_10", "v_10", "lwdn", "swdn", "prec"];

///First year of the historical reference window
pub const DEFAULT_REFERENCE_BEGIN: i32 = 1990;

///Last year of the historical reference window
pub const DEFAULT_REFERENCE_END: i32 = 2019;

///Number of ensemble members generated for each year
pub const DEFAULT_MEMBERS: u16 = 30;

///Directory with annual difference fields
pub const DEFAULT_DIFF_DIR: &str = "../../interim/JRA55/diffs";

///Directory to which perturbations are written
pub const DEFAULT_PERT_DIR: &str = "../../interim/JRA55/perturbations";

///Product tag present in input and output file names
pub const DEFAULT_PRODUCT: &str = "JRA.v1.5";

///Multiplier of the target year in the member seed
pub const SEED_YEAR_STRIDE: i64 = 1000;

///Largest member index for which seeds of distinct years cannot collide
pub const MAX_MEMBERS: u16 = (SEED_YEAR_STRIDE - 1) as u16;

///Variable attributes describing packing or missing data,
///not carried over to decoded output fields
pub const ENCODING_ATTRIBUTES: [&str; 4] =
    ["_FillValue", "missing_value", "scale_factor", "add_offset"];
