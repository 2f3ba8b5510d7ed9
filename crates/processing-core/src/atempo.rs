//! Atempo chain composition.
//!
//! ffmpeg's `atempo` filter only accepts ratios in `[0.5, 2.0]`, so larger
//! speed changes are expressed as a chain of filters whose product is the
//! requested speed.
//!
//! # Algorithm
//!
//! 1. Halve the remaining ratio while it is above 2, emitting `2.0` each time.
//! 2. Double it while it is below 0.5, emitting `0.5` each time.
//! 3. Emit the remainder (rounded to 3 decimals, clamped) unless it is 1.

/// Smallest ratio a single atempo filter accepts.
pub const ATEMPO_MIN: f64 = 0.5;

/// Largest ratio a single atempo filter accepts.
pub const ATEMPO_MAX: f64 = 2.0;

/// Speeds this close to 1 are treated as identity.
pub const IDENTITY_TOLERANCE: f64 = 0.001;

/// An ordered list of atempo ratios.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtempoChain {
    factors: Vec<f64>,
}

impl AtempoChain {
    /// The chain that does nothing.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Decompose `speed` into bounded factors.
    ///
    /// Non-finite or non-positive speeds yield the identity chain.
    pub fn for_speed(speed: f64) -> Self {
        if !speed.is_finite() || speed <= 0.0 || (speed - 1.0).abs() < IDENTITY_TOLERANCE {
            return Self::identity();
        }

        let mut factors = Vec::new();
        let mut remaining = speed;
        while remaining > ATEMPO_MAX {
            factors.push(ATEMPO_MAX);
            remaining /= ATEMPO_MAX;
        }
        while remaining < ATEMPO_MIN {
            factors.push(ATEMPO_MIN);
            remaining /= ATEMPO_MIN;
        }
        if (remaining - 1.0).abs() > IDENTITY_TOLERANCE {
            let rounded = (remaining * 1000.0).round() / 1000.0;
            factors.push(rounded.clamp(ATEMPO_MIN, ATEMPO_MAX));
        }

        Self { factors }
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Overall speed the chain applies.
    pub fn product(&self) -> f64 {
        self.factors.iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_speed() {
        assert!(AtempoChain::for_speed(1.0).is_empty());
        assert!(AtempoChain::for_speed(1.0004).is_empty());
    }

    #[test]
    fn test_invalid_speed_is_identity() {
        assert!(AtempoChain::for_speed(0.0).is_empty());
        assert!(AtempoChain::for_speed(-2.0).is_empty());
        assert!(AtempoChain::for_speed(f64::NAN).is_empty());
        assert!(AtempoChain::for_speed(f64::INFINITY).is_empty());
    }

    #[test]
    fn test_in_range_speed_is_single_filter() {
        let chain = AtempoChain::for_speed(1.25);
        assert_eq!(chain.factors(), &[1.25]);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_large_speed_splits() {
        let chain = AtempoChain::for_speed(5.0);
        assert_eq!(chain.factors(), &[2.0, 2.0, 1.25]);
        assert!((chain.product() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_power_of_two() {
        assert_eq!(AtempoChain::for_speed(4.0).factors(), &[2.0, 2.0]);
        assert_eq!(AtempoChain::for_speed(0.25).factors(), &[0.5, 0.5]);
    }

    #[test]
    fn test_slow_speed_splits() {
        let chain = AtempoChain::for_speed(0.3);
        assert_eq!(chain.factors(), &[0.5, 0.6]);
    }

    mod prop {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn factors_are_bounded_and_compose(speed in 0.01f64..100.0) {
                let chain = AtempoChain::for_speed(speed);
                for f in chain.factors() {
                    prop_assert!((ATEMPO_MIN..=ATEMPO_MAX).contains(f));
                }
                let product = chain.product();
                prop_assert!((product - speed).abs() / speed < 0.01);
            }
        }
    }
}
