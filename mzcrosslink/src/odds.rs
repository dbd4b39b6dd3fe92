//! Probability based sub-scores.
use statrs::distribution::{Continuous, Normal};
use statrs::function::beta::beta_reg;

/// The probability that any single theoretical peak matches at random
pub const RANDOM_MATCH_PROBABILITY: f64 = 1e-3;

/// `-log10` of the chance of observing at least `matches` random hits among `n`
/// theoretical peaks, each matching with probability `p`.
///
/// Returns 0 when there are no theoretical peaks and saturates at
/// `-log10(f64::MIN_POSITIVE)` instead of reaching infinity.
pub fn match_odds(n: usize, matches: usize, p: f64) -> f64 {
    let ceiling = -f64::MIN_POSITIVE.log10();
    if n == 0 {
        return 0.0;
    }
    if matches >= n {
        return ceiling;
    }
    let pscore = beta_reg((matches + 1) as f64, (n - matches) as f64, p);
    if pscore <= f64::MIN_POSITIVE {
        ceiling
    } else {
        -pscore.log10()
    }
}

/// `ln(x!)`
pub fn log_factorial(x: usize) -> f64 {
    (2..=x).map(|y| (y as f64).ln()).sum()
}

/// Scores the precursor mass error in ppm by its density under a zero-centred
/// normal distribution relative to the density at zero.
#[derive(Debug, Clone, Copy)]
pub struct MassErrorScorer {
    distribution: Option<Normal>,
}

impl MassErrorScorer {
    /// The width of the distribution is the square root of the precursor tolerance
    pub fn new(precursor_tolerance: f64) -> Self {
        let distribution = Normal::new(0.0, precursor_tolerance.sqrt()).ok();
        Self { distribution }
    }

    pub fn score(&self, mass_error_ppm: f64) -> f64 {
        match self.distribution.as_ref() {
            Some(dist) => dist.pdf(mass_error_ppm) / dist.pdf(0.0),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_match_odds_monotone() {
        let n = 40;
        let mut last = 0.0;
        for m in 0..=n {
            let s = match_odds(n, m, RANDOM_MATCH_PROBABILITY);
            assert!(s.is_finite());
            assert!(s >= last, "{m}: {s} < {last}");
            last = s;
        }
        assert_eq!(match_odds(0, 0, RANDOM_MATCH_PROBABILITY), 0.0);
    }

    #[test]
    fn test_match_odds_values() {
        // P(X >= 1) for n = 10, p = 0.5 is 1 - 0.5^10
        let s = match_odds(10, 0, 0.5);
        let expected = -(1.0 - 0.5f64.powi(10)).log10();
        assert!((s - expected).abs() < 1e-9, "{s} {expected}");
        assert_eq!(match_odds(5, 5, 0.5), -f64::MIN_POSITIVE.log10());
    }

    #[test]
    fn test_log_factorial() {
        assert_eq!(log_factorial(0), 0.0);
        assert_eq!(log_factorial(1), 0.0);
        assert!((log_factorial(5) - 120f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_mass_error_score() {
        let scorer = MassErrorScorer::new(6.0);
        assert!((scorer.score(0.0) - 1.0).abs() < 1e-12);
        assert!(scorer.score(3.0) < 1.0);
        assert!((scorer.score(3.0) - scorer.score(-3.0)).abs() < 1e-12);
    }
}
