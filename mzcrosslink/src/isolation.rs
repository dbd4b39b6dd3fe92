//! Co-isolated precursor ions whose signal leaks into a tandem spectrum
use mzdata::spectrum::IsolationWindow;
use mzpeaks::coordinate::{SimpleInterval, Span1D};
use mzpeaks::{prelude::*, MZPeakSetType, Tolerance};

use crate::mass::C13C12_MASSDIFF;
use crate::spectrum::max_distance;

/// Finds the survey scan peaks inside an isolation window that are not part of the
/// selected precursor's isotopic envelope
#[derive(Debug, Clone, PartialEq)]
pub struct InterferenceEstimator {
    /// The width assumed on either side of the precursor when the isolation window
    /// is not annotated
    pub default_width: f64,
    /// How close a survey peak must be to an isotope of the precursor to belong to it
    pub tolerance: Tolerance,
}

impl Default for InterferenceEstimator {
    fn default() -> Self {
        Self {
            default_width: 1.5,
            tolerance: Tolerance::PPM(6.0),
        }
    }
}

impl InterferenceEstimator {
    pub fn new(default_width: f64, tolerance: Tolerance) -> Self {
        Self {
            default_width,
            tolerance,
        }
    }

    fn isolation_interval(
        &self,
        precursor_mz: f64,
        isolation_window: Option<&IsolationWindow>,
    ) -> SimpleInterval<f64> {
        match isolation_window {
            Some(window) if window.lower_bound > 0.0 && window.upper_bound > window.lower_bound => {
                SimpleInterval::new(window.lower_bound as f64, window.upper_bound as f64)
            }
            _ => SimpleInterval::new(
                precursor_mz - self.default_width,
                precursor_mz + self.default_width,
            ),
        }
    }

    /// Whether `mz` is the precursor or one of its heavier isotopes
    fn is_precursor_isotope(&self, mz: f64, precursor_mz: f64, charge: i32) -> bool {
        let spacing = C13C12_MASSDIFF / charge.max(1) as f64;
        let isotope = ((mz - precursor_mz) / spacing).round();
        if isotope < 0.0 {
            return false;
        }
        let expected = precursor_mz + isotope * spacing;
        (mz - expected).abs() < max_distance(expected, self.tolerance)
    }

    /// The m/z of every survey peak co-isolated with the precursor at `precursor_mz`
    pub fn interfering_peaks<C: CentroidLike>(
        &self,
        survey: &MZPeakSetType<C>,
        precursor_mz: f64,
        charge: i32,
        isolation_window: Option<&IsolationWindow>,
    ) -> Vec<f64> {
        let interval = self.isolation_interval(precursor_mz, isolation_window);
        survey
            .between(interval.start, interval.end, self.tolerance)
            .iter()
            .filter(|p| interval.contains(&p.mz()))
            .filter(|p| !self.is_precursor_isotope(p.mz(), precursor_mz, charge))
            .map(|p| p.mz())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use mzpeaks::CentroidPeak;

    fn survey() -> MZPeakSetType<CentroidPeak> {
        let precursor = 564.225572;
        MZPeakSetType::new(vec![
            CentroidPeak::new(precursor - 0.9, 50.0, 0),
            CentroidPeak::new(precursor, 1000.0, 0),
            CentroidPeak::new(precursor + C13C12_MASSDIFF / 2.0, 600.0, 0),
            CentroidPeak::new(precursor + C13C12_MASSDIFF, 200.0, 0),
            CentroidPeak::new(564.9, 300.0, 0),
            CentroidPeak::new(600.0, 900.0, 0),
        ])
    }

    #[test]
    fn test_interfering_peaks() {
        let estimator = InterferenceEstimator::default();
        let peaks = estimator.interfering_peaks(&survey(), 564.225572, 2, None);
        assert_eq!(peaks.len(), 2, "{peaks:?}");
        assert!((peaks[0] - (564.225572 - 0.9)).abs() < 1e-9);
        assert!((peaks[1] - 564.9).abs() < 1e-9);
    }

    #[test]
    fn test_annotated_window() {
        let estimator = InterferenceEstimator::default();
        let window = IsolationWindow {
            target: 564.225572,
            lower_bound: 564.0,
            upper_bound: 565.0,
            ..Default::default()
        };
        let peaks = estimator.interfering_peaks(&survey(), 564.225572, 2, Some(&window));
        assert_eq!(peaks.len(), 1, "{peaks:?}");
        assert!((peaks[0] - 564.9).abs() < 1e-9);

        // at charge 1 the half-spaced isotope is a contaminant
        let peaks = estimator.interfering_peaks(&survey(), 564.225572, 1, Some(&window));
        assert_eq!(peaks.len(), 2, "{peaks:?}");
    }
}
