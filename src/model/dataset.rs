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

//! Module responsible for reading difference fields from
//! and writing perturbations to NetCDF files.
//!
//! Input values are decoded the way CF-aware tools do it:
//! fill and missing values become NaN and packed values are
//! unpacked with `scale_factor` and `add_offset`. Output files
//! repeat the grid (dimensions and coordinate variables) of
//! a template input file, so that perturbations can be added
//! directly to the forcing fields they were derived from.

use crate::{
    constants::ENCODING_ATTRIBUTES,
    errors::{InputError, OutputError},
    Float,
};
use log::debug;
use ndarray::Array3;
use netcdf::AttributeValue;
use std::path::Path;

/// 1-D variable describing one of the field dimensions.
#[derive(Clone, Debug)]
pub struct Coordinate {
    pub name: String,
    pub values: Vec<Float>,
    pub attributes: Vec<(String, AttributeValue)>,
}

/// Grid description of a field: everything
/// except the values needed to write a similar file.
#[derive(Clone, Debug)]
pub struct GridLayout {
    pub field_name: String,
    pub dimensions: Vec<(String, usize)>,
    pub coordinates: Vec<Coordinate>,
    pub attributes: Vec<(String, AttributeValue)>,
}

/// Decoded 3-D field with its grid.
#[derive(Clone, Debug)]
pub struct Field {
    pub data: Array3<Float>,
    pub layout: GridLayout,
}

/// Reads variable `field_name` from the NetCDF file at `path`.
///
/// Returns [`InputError::MissingInput`] if the file does not exist.
pub fn read_field(path: &Path, field_name: &str) -> Result<Field, InputError> {
    if !path.exists() {
        return Err(InputError::MissingInput(path.to_path_buf()));
    }

    let file = netcdf::open(path)?;

    let var = file
        .variable(field_name)
        .ok_or_else(|| InputError::MissingVariable {
            name: field_name.to_string(),
            path: path.to_path_buf(),
        })?;

    let dims = var.dimensions();

    if dims.len() != 3 {
        return Err(InputError::NotThreeDimensional {
            name: field_name.to_string(),
            path: path.to_path_buf(),
            ndim: dims.len(),
        });
    }

    let dimensions: Vec<(String, usize)> = dims.iter().map(|d| (d.name(), d.len())).collect();
    let shape = (dimensions[0].1, dimensions[1].1, dimensions[2].1);

    let attributes = collect_attributes(var.attributes());
    let raw_values = var.get_values::<Float, _>(..)?;
    let values = decode_values(raw_values, &attributes);
    let data = Array3::from_shape_vec(shape, values)?;

    let mut coordinates = vec![];

    for (dim_name, dim_len) in &dimensions {
        if let Some(coord_var) = file.variable(dim_name) {
            if coord_var.dimensions().len() != 1 {
                continue;
            }

            let values = coord_var.get_values::<Float, _>(..)?;

            if values.len() != *dim_len {
                continue;
            }

            coordinates.push(Coordinate {
                name: dim_name.clone(),
                values,
                attributes: collect_attributes(coord_var.attributes()),
            });
        }
    }

    debug!(
        "Read {} of shape {:?} from {}",
        field_name,
        shape,
        path.display()
    );

    Ok(Field {
        data,
        layout: GridLayout {
            field_name: field_name.to_string(),
            dimensions,
            coordinates,
            attributes,
        },
    })
}

/// Writes `field` on the grid described by `layout` to
/// a new NetCDF file at `path`, replacing any existing file.
pub fn write_field(
    path: &Path,
    layout: &GridLayout,
    field: &Array3<Float>,
    history: &str,
) -> Result<(), OutputError> {
    let mut file = netcdf::create(path)?;

    file.add_attribute("history", history)?;

    for (dim_name, dim_len) in &layout.dimensions {
        file.add_dimension(dim_name, *dim_len)?;
    }

    for coord in &layout.coordinates {
        let mut var = file.add_variable::<Float>(&coord.name, &[coord.name.as_str()])?;

        for (name, value) in without_encoding(&coord.attributes) {
            var.put_attribute(name, value.clone())?;
        }

        var.put_values(&coord.values, ..)?;
    }

    let dim_names: Vec<&str> = layout
        .dimensions
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();

    let values: Vec<Float> = field.iter().copied().collect();

    let mut var = file.add_variable::<Float>(&layout.field_name, &dim_names)?;

    for (name, value) in without_encoding(&layout.attributes) {
        var.put_attribute(name, value.clone())?;
    }

    var.put_values(&values, ..)?;

    Ok(())
}

fn collect_attributes<'f>(
    attributes: impl Iterator<Item = netcdf::Attribute<'f>>,
) -> Vec<(String, AttributeValue)> {
    attributes
        .filter_map(|attr| {
            attr.value()
                .ok()
                .map(|value| (attr.name().to_string(), value))
        })
        .collect()
}

fn without_encoding(
    attributes: &[(String, AttributeValue)],
) -> impl Iterator<Item = (&str, &AttributeValue)> {
    attributes
        .iter()
        .filter(|(name, _)| !ENCODING_ATTRIBUTES.contains(&name.as_str()))
        .map(|(name, value)| (name.as_str(), value))
}

/// Masks fill and missing values with NaN
/// and unpacks the remaining ones.
fn decode_values(mut values: Vec<Float>, attributes: &[(String, AttributeValue)]) -> Vec<Float> {
    let fill_value = numeric_attribute(attributes, "_FillValue");
    let missing_value = numeric_attribute(attributes, "missing_value");
    let scale_factor = numeric_attribute(attributes, "scale_factor");
    let add_offset = numeric_attribute(attributes, "add_offset");

    for v in values.iter_mut() {
        if Some(*v) == fill_value || Some(*v) == missing_value {
            *v = Float::NAN;
            continue;
        }

        if let Some(scale) = scale_factor {
            *v *= scale;
        }

        if let Some(offset) = add_offset {
            *v += offset;
        }
    }

    values
}

fn numeric_attribute(attributes: &[(String, AttributeValue)], name: &str) -> Option<Float> {
    attributes
        .iter()
        .find(|(attr_name, _)| attr_name == name)
        .and_then(|(_, value)| as_float(value))
}

fn as_float(value: &AttributeValue) -> Option<Float> {
    match value {
        AttributeValue::Double(v) => Some(*v),
        AttributeValue::Float(v) => Some(Float::from(*v)),
        AttributeValue::Int(v) => Some(Float::from(*v)),
        AttributeValue::Uint(v) => Some(Float::from(*v)),
        AttributeValue::Short(v) => Some(Float::from(*v)),
        AttributeValue::Ushort(v) => Some(Float::from(*v)),
        AttributeValue::Schar(v) => Some(Float::from(*v)),
        AttributeValue::Uchar(v) => Some(Float::from(*v)),
        AttributeValue::Longlong(v) => Some(*v as Float),
        AttributeValue::Ulonglong(v) => Some(*v as Float),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|x| Float::from(*x)),
        _ => None,
    }
}
