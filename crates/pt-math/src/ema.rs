//! Exponential moving average with an explicit smoothing factor.

/// An exponential moving average over `f64` samples.
///
/// `alpha` is the weight given to the new sample on each update; the
/// previous average carries weight `1 - alpha`. `alpha` closer to 1 tracks
/// the latest sample more closely; closer to 0 smooths harder.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    /// Create a new, empty EMA with the given smoothing factor.
    ///
    /// `alpha` is clamped to `[0.0, 1.0]`.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: None,
        }
    }

    /// Feed a new sample, updating and returning the current average.
    ///
    /// The first sample seeds the average directly.
    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
            None => sample,
        };
        self.value = Some(next);
        next
    }

    /// Current average, or `None` if no sample has been observed yet.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Current average, defaulting to `0.0` if empty.
    pub fn value_or_zero(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    /// Reset to the empty state.
    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_value() {
        let mut ema = Ema::new(0.3);
        assert_eq!(ema.update(10.0), 10.0);
    }

    #[test]
    fn converges_toward_constant_input() {
        let mut ema = Ema::new(0.3);
        ema.update(0.0);
        for _ in 0..200 {
            ema.update(100.0);
        }
        assert!((ema.value_or_zero() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn matches_hand_computed_step() {
        let mut ema = Ema::new(0.7);
        ema.update(1.0);
        let v = ema.update(2.0);
        assert!((v - (0.7 * 2.0 + 0.3 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn alpha_is_clamped() {
        let ema = Ema::new(5.0);
        assert_eq!(ema.alpha, 1.0);
        let ema = Ema::new(-1.0);
        assert_eq!(ema.alpha, 0.0);
    }
}
