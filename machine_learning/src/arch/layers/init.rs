use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::Result;

/// Samples `len` weights using Xavier (Glorot) uniform initialization.
///
/// # Arguments
/// * `rng` - The random number generator to sample with.
/// * `fan_in` - The number of input units in the weight tensor.
/// * `fan_out` - The number of output units in the weight tensor.
/// * `len` - The amount of weights to sample.
///
/// # Returns
/// The sampled weights or an error if the calculated range is invalid.
pub fn glorot_uniform<R: Rng + ?Sized>(
    rng: &mut R,
    fan_in: usize,
    fan_out: usize,
    len: usize,
) -> Result<Vec<f32>> {
    let range = (6. / (fan_in + fan_out) as f32).sqrt();
    let distribution = Uniform::new(-range, range)?;
    Ok((0..len).map(|_| distribution.sample(rng)).collect())
}
