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

//! Module with the random coefficients generation.
//!
//! Ensembles produced before this generator existed were drawn with
//! NumPy's legacy global generator, so the same stream is reproduced here:
//! 32-bit Mersenne Twister seeded with `init_genrand(seed)` and doubles
//! built from two consecutive outputs with 53-bit resolution, exactly as
//! `numpy.random.seed(seed); numpy.random.rand(n)` does.
//! Any change to this module changes every member ever generated.

use super::synthesis::MemberSeed;
use crate::Float;
use ndarray::Array1;
use rand::RngCore;
use rand_mt::Mt;

/// `2^26`
const TWO_POW_26: Float = 67_108_864.0;

/// `2^53`
const TWO_POW_53: Float = 9_007_199_254_740_992.0;

/// Draws one double uniformly distributed in `[0, 1)`
/// from two 32-bit outputs of `rng`.
pub fn uniform_53<R: RngCore>(rng: &mut R) -> Float {
    let a = rng.next_u32() >> 5;
    let b = rng.next_u32() >> 6;

    (Float::from(a) * TWO_POW_26 + Float::from(b)) / TWO_POW_53
}

/// Generator of the member with given seed.
pub fn member_rng(seed: MemberSeed) -> Mt {
    Mt::new(seed.value())
}

/// Draws `count` coefficients of the random linear
/// combination for the member with given seed.
pub fn draw_coefficients(seed: MemberSeed, count: usize) -> Array1<Float> {
    let mut rng = member_rng(seed);

    Array1::from_shape_fn(count, |_| uniform_53(&mut rng))
}
