//! Spectrum preprocessing and the precursor mass index used to find the spectra
//! a candidate must be scored against.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use mzpeaks::Tolerance;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::adduct::AmbiguityIndex;
use crate::context::SearchParameters;
use crate::deisotope::Deisotoper;
use crate::spectrum::{max_distance, FragmentPeak, ScoringSpectrum};
use crate::tagger::Tagger;

/// Parameters for [`SpectrumPreprocessor`]
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingParams {
    /// The width of the m/z windows used for local peak picking
    pub window_size: f64,
    /// The number of peaks kept per window
    pub peak_count: usize,
    /// The number of peaks kept per spectrum
    pub max_peaks: usize,
    /// Take the square root of intensities before normalizing
    pub sqrt_intensity: bool,
    pub interference_tolerance: Tolerance,
    pub deisotoper: Deisotoper,
}

impl Default for PreprocessingParams {
    fn default() -> Self {
        Self {
            window_size: 75.0,
            peak_count: 20,
            max_peaks: 400,
            sqrt_intensity: false,
            interference_tolerance: Tolerance::PPM(20.0),
            deisotoper: Deisotoper::default(),
        }
    }
}

/// Turns raw MS2 peak lists into [`ScoringSpectrum`]s ready for scoring
#[derive(Debug, Clone)]
pub struct SpectrumPreprocessor {
    pub params: PreprocessingParams,
    tagger: Tagger,
    ambiguity_tagger: Tagger,
}

impl Default for SpectrumPreprocessor {
    fn default() -> Self {
        Self::new(PreprocessingParams::default())
    }
}

impl SpectrumPreprocessor {
    pub fn new(params: PreprocessingParams) -> Self {
        Self {
            params,
            tagger: Tagger::new(0.03, 3, usize::MAX),
            ambiguity_tagger: Tagger::new(0.03, 1, 2),
        }
    }

    /// Drop peaks matching co-isolated precursor m/z values, returning how many were removed
    fn remove_interference(&self, peaks: &mut Vec<FragmentPeak>, interference: &[f64]) -> usize {
        if interference.is_empty() {
            return 0;
        }
        let tol = self.params.interference_tolerance;
        let before = peaks.len();
        peaks.retain(|p| {
            !interference
                .iter()
                .any(|mz| (p.mz - mz).abs() < max_distance(*mz, tol))
        });
        before - peaks.len()
    }

    fn normalize(&self, peaks: &mut [FragmentPeak]) {
        if self.params.sqrt_intensity {
            peaks.iter_mut().for_each(|p| p.intensity = p.intensity.sqrt());
        }
        let max = peaks.iter().map(|p| p.intensity).fold(0.0f32, f32::max);
        if max > 0.0 {
            peaks.iter_mut().for_each(|p| p.intensity /= max);
        }
    }

    /// Keep the `peak_count` most intense peaks of every `window_size` wide m/z
    /// window. Windows are anchored at zero so repeated application is stable.
    fn window_mower(&self, peaks: Vec<FragmentPeak>) -> Vec<FragmentPeak> {
        let mut windows: BTreeMap<i64, Vec<FragmentPeak>> = BTreeMap::new();
        for p in peaks {
            let key = (p.mz / self.params.window_size).floor() as i64;
            windows.entry(key).or_default().push(p);
        }
        let mut kept = Vec::new();
        for (_, mut window) in windows {
            if window.len() > self.params.peak_count {
                window.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
                window.truncate(self.params.peak_count);
            }
            kept.extend(window);
        }
        kept
    }

    fn n_largest(&self, mut peaks: Vec<FragmentPeak>) -> Vec<FragmentPeak> {
        if peaks.len() > self.params.max_peaks {
            peaks.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
            peaks.truncate(self.params.max_peaks);
        }
        peaks
    }

    fn assign_ranks(spectrum: &mut ScoringSpectrum) {
        let mut order: Vec<usize> = (0..spectrum.len()).collect();
        order.sort_by(|a, b| {
            spectrum.peaks[*b]
                .intensity
                .total_cmp(&spectrum.peaks[*a].intensity)
        });
        for (rank, i) in order.into_iter().enumerate() {
            spectrum.peaks[i].rank = rank as u32;
        }
    }

    /// Clean the peak list of `spectrum` in place and annotate charges, ranks and TIC.
    ///
    /// Returns `false` if no peaks remain.
    pub fn process(&self, spectrum: &mut ScoringSpectrum) -> bool {
        self.process_counting_interference(spectrum).0
    }

    fn process_counting_interference(&self, spectrum: &mut ScoringSpectrum) -> (bool, usize) {
        let mut peaks = std::mem::take(&mut spectrum.peaks);
        peaks.retain(|p| p.intensity > 0.0);
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));

        let mut peaks = self.params.deisotoper.deisotope(peaks);
        let removed = self.remove_interference(&mut peaks, &spectrum.interference);
        if removed > 0 {
            trace!("Removed {removed} interfering peaks from {}", spectrum.native_id);
        }
        if peaks.is_empty() {
            spectrum.tic = 0.0;
            return (false, removed);
        }
        self.normalize(&mut peaks);
        for p in peaks.iter_mut() {
            if p.charge == 0 {
                p.charge = 1;
            }
        }

        let peaks = self.window_mower(peaks);
        let mut peaks = self.n_largest(peaks);
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));

        spectrum.peaks = peaks;
        spectrum.tic = spectrum.total_ion_current();
        Self::assign_ranks(spectrum);
        (!spectrum.is_empty(), removed)
    }

    /// Record the longest de novo tag and the fragment adducts mimicked by short tags
    pub fn annotate_tags(&self, spectrum: &mut ScoringSpectrum, ambiguity: &AmbiguityIndex) {
        let mzs: Vec<f64> = spectrum.peaks.iter().map(|p| p.mz).collect();
        spectrum.longest_tag = self.tagger.longest_tag_length(&mzs);
        let tags = self.ambiguity_tagger.tags(&mzs);
        spectrum.ambiguous_adducts = ambiguity.adducts_for_tags(tags.iter());
    }

    /// Preprocess every spectrum in parallel, dropping those left empty
    pub fn process_all(
        &self,
        spectra: Vec<ScoringSpectrum>,
        ambiguity: &AmbiguityIndex,
    ) -> Vec<ScoringSpectrum> {
        let n = spectra.len();
        let interfering = AtomicUsize::new(0);
        let kept: Vec<ScoringSpectrum> = spectra
            .into_par_iter()
            .filter_map(|mut s| {
                let (has_peaks, removed) = self.process_counting_interference(&mut s);
                interfering.fetch_add(removed, Ordering::Relaxed);
                if has_peaks {
                    self.annotate_tags(&mut s, ambiguity);
                    Some(s)
                } else {
                    debug!("{} has no peaks after preprocessing", s.native_id);
                    None
                }
            })
            .collect();
        info!(
            "Removed {} peaks matching co-isolated precursors",
            interfering.into_inner()
        );
        info!("{} of {n} spectra have peaks after preprocessing", kept.len());
        kept
    }
}

/// One searchable precursor: the neutral mass after isotope correction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecursorEntry {
    pub mass: f64,
    /// The position of the spectrum in the searched spectrum list
    pub slot: usize,
    pub isotope: i32,
}

/// Spectra sorted by neutral precursor mass, one entry per isotope error
#[derive(Debug, Clone, Default)]
pub struct PrecursorIndex {
    entries: Vec<PrecursorEntry>,
}

impl PrecursorIndex {
    pub fn build(spectra: &[ScoringSpectrum], parameters: &SearchParameters) -> Self {
        let mut entries = Vec::new();
        let mut skipped_charge = 0usize;
        let mut skipped_size = 0usize;
        let mut skipped_mass = 0usize;
        for (slot, spectrum) in spectra.iter().enumerate() {
            let z = spectrum.precursor_charge;
            if z < parameters.min_precursor_charge || z > parameters.max_precursor_charge {
                skipped_charge += 1;
                continue;
            }
            if spectrum.len() < parameters.peptide_min_size {
                skipped_size += 1;
                continue;
            }
            for isotope in parameters.isotopes.iter().copied() {
                let mass = spectrum.precursor_mass(isotope);
                if parameters.filter_fractional_mass && mass < 1750.0 && mass - mass.floor() < 0.2 {
                    skipped_mass += 1;
                    continue;
                }
                if mass < parameters.filter_small_peptide_mass {
                    skipped_mass += 1;
                    continue;
                }
                entries.push(PrecursorEntry {
                    mass,
                    slot,
                    isotope,
                });
            }
        }
        entries.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        debug!(
            "Indexed {} precursors, skipped {skipped_charge} by charge, {skipped_size} by peak count, {skipped_mass} by mass",
            entries.len()
        );
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PrecursorEntry> {
        self.entries.iter()
    }

    /// The entries with a mass within `low..=high`
    pub fn range(&self, low: f64, high: f64) -> &[PrecursorEntry] {
        let start = self.entries.partition_point(|e| e.mass < low);
        let end = self.entries.partition_point(|e| e.mass <= high);
        if start >= end {
            &[]
        } else {
            &self.entries[start..end]
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mass::{C13C12_MASSDIFF, PROTON};

    fn raw_spectrum() -> ScoringSpectrum {
        let mut peaks = Vec::new();
        for i in 0..60 {
            let mz = 150.0 + 13.7 * i as f64;
            peaks.push(FragmentPeak::new(mz, ((i * 37) % 101) as f32, 0));
        }
        // an isotopic envelope at charge 2
        peaks.push(FragmentPeak::new(520.25, 500.0, 0));
        peaks.push(FragmentPeak::new(520.25 + C13C12_MASSDIFF / 2.0, 300.0, 0));
        peaks.push(FragmentPeak::new(520.25 + C13C12_MASSDIFF, 100.0, 0));
        peaks.push(FragmentPeak::new(900.0, 0.0, 0));
        let mut s = ScoringSpectrum::new(0, "scan=1".into(), 10.0, 650.0, 2, peaks);
        s.interference = vec![150.0 + 13.7 * 3.0];
        s
    }

    #[test]
    fn test_process() {
        let pp = SpectrumPreprocessor::new(PreprocessingParams {
            peak_count: 4,
            ..Default::default()
        });
        let mut s = raw_spectrum();
        assert_eq!(pp.process_counting_interference(&mut s), (true, 1));
        assert!(s.peaks.windows(2).all(|w| w[0].mz <= w[1].mz));
        assert!(s.peaks.iter().all(|p| p.charge != 0 && p.intensity > 0.0));
        assert!((s.tic - s.total_ion_current()).abs() < 1e-9);
        assert!(s.peaks.iter().any(|p| p.charge == 2));
        assert!(!s.peaks.iter().any(|p| (p.mz - (150.0 + 13.7 * 3.0)).abs() < 1e-6));
        let max = s.peaks.iter().map(|p| p.intensity).fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert_eq!(s.peaks.iter().filter(|p| p.rank == 0).count(), 1);

        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for p in s.peaks.iter() {
            *counts.entry((p.mz / 75.0).floor() as i64).or_default() += 1;
        }
        assert!(counts.values().all(|c| *c <= 4));
    }

    #[test]
    fn test_idempotent() {
        let pp = SpectrumPreprocessor::default();
        let mut s = raw_spectrum();
        assert!(pp.process(&mut s));
        let first = s.clone();
        assert!(pp.process(&mut s));
        assert_eq!(first.peaks, s.peaks);
        assert_eq!(first.tic, s.tic);
    }

    #[test]
    fn test_empty_spectrum_dropped() {
        let pp = SpectrumPreprocessor::default();
        let s = ScoringSpectrum::new(0, "scan=2".into(), 1.0, 500.0, 2, vec![FragmentPeak::new(100.0, 0.0, 0)]);
        let kept = pp.process_all(vec![s, raw_spectrum()], &AmbiguityIndex::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].native_id, "scan=1");
    }

    #[test]
    fn test_precursor_index() {
        let mut spectra = Vec::new();
        for (i, (mz, z)) in [(700.0, 2), (500.0, 3), (400.0, 1), (650.0, 2)].into_iter().enumerate() {
            let peaks = (0..10).map(|k| FragmentPeak::new(200.0 + k as f64 * 50.0, 1.0, 1)).collect();
            spectra.push(ScoringSpectrum::new(i, format!("scan={i}"), 1.0, mz, z, peaks));
        }
        let params = SearchParameters {
            isotopes: vec![0, 1],
            ..Default::default()
        };
        let index = PrecursorIndex::build(&spectra, &params);
        // charge 1 is out of range
        assert_eq!(index.len(), 6);
        assert!(index.iter().all(|e| e.slot != 2));
        let m = 2.0 * 700.0 - 2.0 * PROTON;
        let hits = index.range(m - 0.01, m + 0.01);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].slot, 0);
        assert_eq!(hits[0].isotope, 0);
        let hits = index.range(m - C13C12_MASSDIFF - 0.01, m - C13C12_MASSDIFF + 0.01);
        assert_eq!(hits[0].isotope, 1);
        assert!(index.range(10.0, 20.0).is_empty());
    }
}
