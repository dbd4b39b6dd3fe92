//! A lightweight isotopic envelope collapser for centroided fragment spectra.
//!
//! Unlike a full deconvolution with averagine fitting, this only walks isotopic
//! spacings from each candidate monoisotopic peak and applies a decreasing
//! intensity heuristic, which is adequate for small fragment envelopes.
use tracing::trace;

use crate::mass::C13C12_MASSDIFF;
use crate::spectrum::FragmentPeak;

/// Parameters for [`Deisotoper::deisotope`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deisotoper {
    /// The absolute mass tolerance (in Da) used to find the next isotopic peak
    pub tolerance: f64,
    pub min_charge: i32,
    pub max_charge: i32,
    /// The minimum number of peaks, monoisotopic peak included, for an envelope
    pub min_isopeaks: usize,
    pub max_isopeaks: usize,
    /// Require each isotopic peak to be no more intense than its predecessor,
    /// starting from isotope number `decreasing_from`
    pub use_decreasing_model: bool,
    pub decreasing_from: usize,
    /// Sum the envelope's intensity into the monoisotopic peak
    pub add_up_intensity: bool,
    /// Keep peaks that were not assigned to any envelope
    pub keep_unassigned: bool,
}

impl Default for Deisotoper {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            min_charge: 1,
            max_charge: 3,
            min_isopeaks: 2,
            max_isopeaks: 10,
            use_decreasing_model: true,
            decreasing_from: 2,
            add_up_intensity: true,
            keep_unassigned: true,
        }
    }
}

impl Deisotoper {
    fn nearest(peaks: &[FragmentPeak], mz: f64) -> Option<usize> {
        if peaks.is_empty() {
            return None;
        }
        let i = peaks.partition_point(|p| p.mz < mz);
        if i == 0 {
            Some(0)
        } else if i == peaks.len() {
            Some(i - 1)
        } else if mz - peaks[i - 1].mz <= peaks[i].mz - mz {
            Some(i - 1)
        } else {
            Some(i)
        }
    }

    /// Collapse isotopic envelopes in an m/z sorted peak list.
    ///
    /// Only peaks without a charge annotation take part, so a list that has
    /// already been deisotoped and charge annotated passes through unchanged.
    pub fn deisotope(&self, peaks: Vec<FragmentPeak>) -> Vec<FragmentPeak> {
        let n = peaks.len();
        let mut consumed = vec![false; n];
        let mut assigned_charge = vec![0i32; n];
        let mut summed: Vec<f64> = peaks.iter().map(|p| p.intensity as f64).collect();
        let mut extension: Vec<usize> = Vec::with_capacity(self.max_isopeaks);

        for current in 0..n {
            if consumed[current] || peaks[current].charge != 0 {
                continue;
            }
            for charge in (self.min_charge..=self.max_charge).rev() {
                extension.clear();
                extension.push(current);
                let spacing = C13C12_MASSDIFF / charge as f64;
                for isotope in 1..self.max_isopeaks {
                    let expected = peaks[current].mz + isotope as f64 * spacing;
                    let Some(p) = Self::nearest(&peaks, expected) else {
                        break;
                    };
                    if (peaks[p].mz - expected).abs() > self.tolerance
                        || consumed[p]
                        || peaks[p].charge != 0
                        || p == current
                    {
                        break;
                    }
                    if self.use_decreasing_model && isotope >= self.decreasing_from {
                        let previous = *extension.last().unwrap_or(&current);
                        if peaks[p].intensity > peaks[previous].intensity {
                            break;
                        }
                    }
                    extension.push(p);
                }

                if extension.len() >= self.min_isopeaks {
                    trace!(
                        "Envelope at {:0.4} with charge {charge} spans {} peaks",
                        peaks[current].mz,
                        extension.len()
                    );
                    assigned_charge[current] = charge;
                    for &p in extension.iter().skip(1) {
                        consumed[p] = true;
                        if self.add_up_intensity {
                            summed[current] += peaks[p].intensity as f64;
                        }
                    }
                    break;
                }
            }
        }

        peaks
            .into_iter()
            .enumerate()
            .filter(|(i, p)| {
                !consumed[*i] && (self.keep_unassigned || p.charge != 0 || assigned_charge[*i] != 0)
            })
            .map(|(i, mut p)| {
                if assigned_charge[i] != 0 {
                    p.charge = assigned_charge[i];
                    p.intensity = summed[i] as f32;
                }
                p
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn envelope(mz: f64, z: i32, intensities: &[f32]) -> Vec<FragmentPeak> {
        intensities
            .iter()
            .enumerate()
            .map(|(i, inten)| FragmentPeak::new(mz + i as f64 * C13C12_MASSDIFF / z as f64, *inten, 0))
            .collect()
    }

    #[test]
    fn test_collapse_charge_two() {
        let mut peaks = envelope(500.0, 2, &[100.0, 60.0, 20.0]);
        peaks.push(FragmentPeak::new(700.0, 10.0, 0));
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        let result = Deisotoper::default().deisotope(peaks);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].charge, 2);
        assert!((result[0].intensity - 180.0).abs() < 1e-3);
        assert_eq!(result[1].charge, 0);
    }

    #[test]
    fn test_decreasing_model() {
        let peaks = envelope(500.0, 1, &[100.0, 60.0, 80.0]);
        let result = Deisotoper::default().deisotope(peaks);
        // the third peak rises again so the envelope stops after the second
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].charge, 1);
        assert!((result[0].intensity - 160.0).abs() < 1e-3);
        assert_eq!(result[1].charge, 0);
    }

    #[test]
    fn test_annotated_peaks_pass_through() {
        let peaks = envelope(500.0, 1, &[100.0, 60.0, 20.0]);
        let once = Deisotoper::default().deisotope(peaks);
        let twice = Deisotoper::default().deisotope(once.clone());
        assert_eq!(once, twice);
    }
}
