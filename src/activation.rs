//! The squash nonlinearity shared by every evaluated neuron.
//!
//! A single function is used everywhere so that repeated evaluations, and
//! evaluations on different worker threads, agree bit for bit.

/// Activation of every bias neuron.
pub const BIAS_ACTIVATION: f64 = 1.0;

/// Hyperbolic tangent with explicit handling of non-finite inputs.
///
/// `squash(±inf) = ±1` and NaN propagates unchanged.
#[inline]
#[must_use]
pub fn squash(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x == f64::INFINITY {
        return 1.0;
    }
    if x == f64::NEG_INFINITY {
        return -1.0;
    }
    x.tanh()
}
