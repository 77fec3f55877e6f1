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

//! Module responsible for building the anomaly basis
//! of one forcing variable.
//!
//! Every year of the reference window provides one sample: the
//! difference field between that year and the previous one. Samples
//! are flattened (in row-major order) into columns of the anomaly
//! matrix, which is then centered by removing the mean of each row.
//! New perturbations are linear combinations of those columns
//! (see [`synthesis`](super::synthesis)).

use super::{
    configuration::{Config, Variable},
    dataset::{self, GridLayout},
};
use crate::{errors::InputError, Float};
use log::debug;
use ndarray::{Array1, Array2, Array3, Axis};

/// Centered anomaly matrix of one variable together
/// with the grid shape of the samples it was built from.
#[derive(Clone, PartialEq, Debug)]
pub struct AnomalyBasis {
    anomalies: Array2<Float>,
    shape: (usize, usize, usize),
}

impl AnomalyBasis {
    /// Reads all difference fields of the reference window
    /// and builds the basis from them.
    ///
    /// Grid layout of the last read file is returned alongside,
    /// as it is the template for the output files.
    pub fn from_reference_window(
        config: &Config,
        variable: &Variable,
    ) -> Result<(Self, GridLayout), InputError> {
        let mut builder = BasisBuilder::new(config.reference.sample_count());
        let mut layout = None;

        for year in config.reference.sample_years() {
            debug!("Reading {} data for {}-{}", variable.name, year, year - 1);

            let path = config.diff_file_path(variable, year);
            let diff = dataset::read_field(&path, variable.field_name())?;

            builder.push(year, diff.data)?;
            layout = Some(diff.layout);
        }

        let basis = builder.finish()?;
        let layout = layout.ok_or(InputError::NotEnoughSamples)?;

        Ok((basis, layout))
    }

    /// Number of samples (columns) in the basis.
    pub fn sample_count(&self) -> usize {
        self.anomalies.ncols()
    }

    /// Number of gridpoints of one sample (rows) in the basis.
    pub fn grid_size(&self) -> usize {
        self.anomalies.nrows()
    }

    /// Shape of the fields the basis was built from.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    pub fn anomalies(&self) -> &Array2<Float> {
        &self.anomalies
    }
}

/// Accumulates samples of the anomaly matrix year by year.
///
/// The first pushed field establishes the grid shape and
/// allocates the matrix, all following fields must have
/// exactly the same shape.
#[derive(Debug)]
pub struct BasisBuilder {
    nsample: usize,
    filled: usize,
    shape: Option<(usize, usize, usize)>,
    state: Option<Array2<Float>>,
}

impl BasisBuilder {
    pub fn new(nsample: usize) -> Self {
        BasisBuilder {
            nsample,
            filled: 0,
            shape: None,
            state: None,
        }
    }

    /// Stores `field` of given `year` as the next column.
    ///
    /// Missing values (NaN) are replaced with zeros.
    pub fn push(&mut self, year: i32, mut field: Array3<Float>) -> Result<(), InputError> {
        if self.filled >= self.nsample {
            return Err(InputError::NotEnoughSamples);
        }

        field.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });

        let grid_size = field.len();
        let expected = *self.shape.get_or_insert(field.dim());

        if field.dim() != expected {
            return Err(InputError::ShapeMismatch {
                year,
                expected,
                found: field.dim(),
            });
        }

        if self.state.is_none() {
            debug!(
                "Allocating anomaly matrix of {} gridpoints and {} samples",
                grid_size, self.nsample
            );
            self.state = Some(Array2::zeros((grid_size, self.nsample)));
        }

        let state = self.state.as_mut().ok_or(InputError::NotEnoughSamples)?;

        let vector: Array1<Float> = field.iter().copied().collect();
        state.column_mut(self.filled).assign(&vector);
        self.filled += 1;

        Ok(())
    }

    /// Centers the collected samples by removing
    /// the mean of every row.
    pub fn finish(self) -> Result<AnomalyBasis, InputError> {
        if self.filled != self.nsample || self.nsample < 2 {
            return Err(InputError::NotEnoughSamples);
        }

        let (mut state, shape) = match (self.state, self.shape) {
            (Some(state), Some(shape)) => (state, shape),
            _ => return Err(InputError::NotEnoughSamples),
        };

        debug!("Centering the data");
        let state_mean = state
            .mean_axis(Axis(1))
            .ok_or(InputError::NotEnoughSamples)?;
        state -= &state_mean.insert_axis(Axis(1));

        Ok(AnomalyBasis {
            anomalies: state,
            shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::BasisBuilder;
    use crate::errors::InputError;
    use float_cmp::approx_eq;
    use ndarray::{Array3, Axis};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_field(rng: &mut StdRng, shape: (usize, usize, usize)) -> Array3<f64> {
        Array3::from_shape_fn(shape, |_| rng.gen_range(-5.0..5.0))
    }

    #[test]
    fn rows_are_centered() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut builder = BasisBuilder::new(6);

        for year in 2001..=2006 {
            builder.push(year, random_field(&mut rng, (3, 4, 2))).unwrap();
        }

        let basis = builder.finish().unwrap();

        assert_eq!(basis.sample_count(), 6);
        assert_eq!(basis.grid_size(), 24);
        assert_eq!(basis.shape(), (3, 4, 2));

        for row_mean in basis.anomalies().mean_axis(Axis(1)).unwrap().iter() {
            assert!(approx_eq!(f64, *row_mean, 0.0, epsilon = 1e-12));
        }
    }

    #[test]
    fn columns_follow_row_major_order() {
        let mut builder = BasisBuilder::new(2);
        let first = Array3::from_shape_fn((2, 2, 2), |(i, j, k)| (i * 4 + j * 2 + k) as f64);
        let second = Array3::zeros((2, 2, 2));

        builder.push(1991, first).unwrap();
        builder.push(1992, second).unwrap();
        let basis = builder.finish().unwrap();

        // centered values of the first column are half of the raw values
        for (row, value) in basis.anomalies().column(0).iter().enumerate() {
            assert!(approx_eq!(f64, *value, row as f64 / 2.0, epsilon = 1e-12));
        }
    }

    #[test]
    fn nans_become_zeros() {
        let mut builder = BasisBuilder::new(2);
        let mut first = Array3::from_elem((1, 2, 2), 4.0);
        first[[0, 1, 1]] = f64::NAN;
        let second = Array3::from_elem((1, 2, 2), 2.0);

        builder.push(1991, first).unwrap();
        builder.push(1992, second).unwrap();
        let basis = builder.finish().unwrap();

        assert!(basis.anomalies().iter().all(|v| !v.is_nan()));
        // row with NaN: samples (0, 2) -> mean 1
        assert!(approx_eq!(f64, basis.anomalies()[[3, 0]], -1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, basis.anomalies()[[3, 1]], 1.0, epsilon = 1e-12));
    }

    #[test]
    fn shape_mismatch() {
        let mut builder = BasisBuilder::new(3);

        builder.push(1991, Array3::zeros((2, 3, 4))).unwrap();
        let result = builder.push(1992, Array3::zeros((2, 3, 5)));

        assert!(matches!(
            result,
            Err(InputError::ShapeMismatch {
                year: 1992,
                expected: (2, 3, 4),
                found: (2, 3, 5)
            })
        ));
    }

    #[test]
    fn same_size_other_shape_rejected() {
        let mut builder = BasisBuilder::new(2);

        builder.push(1991, Array3::ones((2, 3, 4))).unwrap();
        let result = builder.push(1992, Array3::ones((4, 3, 2)));

        assert!(matches!(
            result,
            Err(InputError::ShapeMismatch {
                year: 1992,
                expected: (2, 3, 4),
                found: (4, 3, 2)
            })
        ));
    }

    #[test]
    fn incomplete_window() {
        let mut builder = BasisBuilder::new(3);
        builder.push(1991, Array3::zeros((1, 1, 1))).unwrap();

        assert!(matches!(
            builder.finish(),
            Err(InputError::NotEnoughSamples)
        ));
    }

    #[test]
    fn too_many_samples() {
        let mut builder = BasisBuilder::new(2);
        builder.push(1991, Array3::zeros((1, 1, 1))).unwrap();
        builder.push(1992, Array3::zeros((1, 1, 1))).unwrap();

        assert!(builder.push(1993, Array3::zeros((1, 1, 1))).is_err());
    }
}
