//! Randomness for optional segments

use rand::Rng;

/// Source of coin flips and picks
pub trait ChanceSource: Send + Sync {
    /// True with probability `p` (clamped to `0.0..=1.0`, NaN never rolls)
    fn roll(&self, p: f64) -> bool;

    /// Uniform index in `0..len`; `len` must be non-zero
    fn pick(&self, len: usize) -> usize;
}

/// Thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngChance;

impl ChanceSource for ThreadRngChance {
    fn roll(&self, p: f64) -> bool {
        if p.is_nan() {
            return false;
        }
        rand::thread_rng().gen_bool(p.clamp(0.0, 1.0))
    }

    fn pick(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_extremes() {
        let chance = ThreadRngChance;
        assert!((0..100).all(|_| chance.roll(1.0)));
        assert!((0..100).all(|_| !chance.roll(0.0)));
        assert!(chance.roll(7.5));
        assert!(!chance.roll(-1.0));
    }

    #[test]
    fn test_roll_nan_is_false() {
        let chance = ThreadRngChance;
        assert!(!chance.roll(f64::NAN));
    }

    #[test]
    fn test_pick_in_range() {
        let chance = ThreadRngChance;
        assert_eq!(chance.pick(0), 0);
        assert_eq!(chance.pick(1), 0);
        assert!((0..100).all(|_| chance.pick(8) < 8));
    }
}
