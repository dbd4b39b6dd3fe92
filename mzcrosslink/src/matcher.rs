//! Peak matching and sub-score calculation for a single candidate against a
//! single preprocessed spectrum.
//!
//! A [`PeakMatcher`] owns the set of peaks already claimed while scoring one
//! candidate. Every ion type draws from the same set, so a peak contributes to
//! at most one theoretical ion. A fresh matcher is created for every candidate.
use std::cmp::Reverse;

use mzpeaks::Tolerance;

use crate::adduct::{AmbiguityIndex, FragmentAdduct};
use crate::fragments::{charged_mz, FragmentTemplate, A_ION_OFFSET};
use crate::mass::{CH4S, FRAGMENT_AMMONIA_LOSS, FRAGMENT_WATER_LOSS, PRECURSOR_LOSSES, PROTON};
use crate::odds::{log_factorial, match_odds, RANDOM_MATCH_PROBABILITY};
use crate::peptide::ImmoniumFlags;
use crate::spectrum::{max_distance, ScoringSpectrum};

/// The immonium ion m/z of a residue
pub fn immonium_ion(residue: u8) -> Option<f64> {
    let mz = match residue {
        // C8H10NO
        b'Y' => 136.0762389,
        // C10H11N2
        b'W' => 159.0922234,
        // C8H10N
        b'F' => 120.0813243,
        // C5H8N3
        b'H' => 110.0718223,
        // C2H6NS
        b'C' => 76.0220952,
        // C4H8N
        b'P' => 70.0656743,
        // C5H12N
        b'L' | b'I' => 86.0969744,
        // C5H13N2
        b'K' => 101.1078734,
        b'M' => 104.0534,
        b'Q' => 101.0715,
        b'E' => 102.0555,
        _ => return None,
    };
    Some(mz)
}

/// Lysine immonium ion after ammonia loss, C5H10N
const LYSINE_IMMONIUM_DEAMINATED: f64 = 84.0813243;
/// Methionine side chain fragment, CH5S
const METHIONINE_SIDE_CHAIN: f64 = 49.0111962;

/// The immonium and side chain ions of a residue that may carry a fragment adduct
pub(crate) fn adduct_immonium_ions(residue: u8) -> impl Iterator<Item = f64> {
    let extra = match residue {
        b'K' => Some(LYSINE_IMMONIUM_DEAMINATED),
        b'M' => Some(METHIONINE_SIDE_CHAIN),
        _ => None,
    };
    immonium_ion(residue).into_iter().chain(extra)
}

/// Sub-scores from matching the unshifted fragment, precursor and immonium ions
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PeptideIonScores {
    pub hyperscore: f64,
    /// Matched ladder intensity as a fraction of the total ion current
    pub mic: f64,
    /// Matched bonds counting y-ions twice, plus `mic`
    pub morph: f64,
    pub modds: f64,
    /// Mean absolute fragment error in ppm
    pub err: f64,
    /// Matched precursor ion count plus their intensity fraction
    pub pc_mic: f64,
    pub im_mic: f64,
    /// The TIC normalized intensity matched per bond
    pub intensity_sum: Vec<f64>,
    pub b_ions: Vec<f64>,
    pub y_ions: Vec<f64>,
    pub n_theoretical_peaks: usize,
    /// Experimental peaks claimed by any unshifted ion
    pub matched_peaks: usize,
}

impl PeptideIonScores {
    /// The total explained intensity fraction of the unshifted ions
    pub fn total_mic(&self) -> f64 {
        self.mic + self.im_mic + self.pc_mic.fract()
    }
}

/// Sub-scores from matching adduct-shifted ions
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShiftedIonScores {
    pub hyperscore: f64,
    pub mic: f64,
    /// Matched bonds plus `mic`
    pub morph: f64,
    pub err: f64,
    pub modds: f64,
    pub pc_mic: f64,
    pub im_mic: f64,
    pub intensity_sum: Vec<f64>,
    pub b_ions: Vec<f64>,
    pub y_ions: Vec<f64>,
    /// Theoretical shifted peaks considered
    pub n_theoretical_peaks: usize,
    pub matched_peaks: usize,
}

/// Summary statistics of the peaks a candidate explains
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankScores {
    /// The number of unexplained peaks more intense than the mean explained peak
    pub w_top50: f64,
    pub explained_peaks: usize,
    pub explained_peak_fraction: f64,
}

impl Default for RankScores {
    fn default() -> Self {
        Self {
            w_top50: 1e10,
            explained_peaks: 0,
            explained_peak_fraction: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct SeriesAccumulator {
    dot_product: f64,
    err_sum: f64,
    matches: usize,
}

struct SeriesCounts {
    b: usize,
    a: usize,
    y: usize,
}

/// Add each series into `intensity_sum` and count the matched bonds per series
fn collect_series(intensity_sum: &mut [f64], b: &[f64], a: &[f64], y: &[f64]) -> SeriesCounts {
    let mut counts = SeriesCounts { b: 0, a: 0, y: 0 };
    for (i, v) in b.iter().enumerate() {
        if *v > 0.0 {
            intensity_sum[i] += v;
            counts.b += 1;
        }
    }
    for (i, v) in y.iter().enumerate() {
        if *v > 0.0 {
            intensity_sum[i] += v;
            counts.y += 1;
        }
    }
    for (i, v) in a.iter().enumerate() {
        if *v > 0.0 {
            intensity_sum[i] += v;
            counts.a += 1;
        }
    }
    counts
}

/// Matches theoretical ions against one spectrum, tracking which peaks are taken
#[derive(Debug, Clone)]
pub struct PeakMatcher<'a> {
    spectrum: &'a ScoringSpectrum,
    tolerance: Tolerance,
    tolerance_value: f64,
    claimed: Vec<bool>,
}

impl<'a> PeakMatcher<'a> {
    /// Create a matcher with no claimed peaks.
    ///
    /// The spectrum must be preprocessed and non-empty.
    pub fn new(spectrum: &'a ScoringSpectrum, tolerance: Tolerance) -> Self {
        assert!(!spectrum.is_empty(), "Cannot match ions against an empty spectrum");
        let tolerance_value = match tolerance {
            Tolerance::PPM(v) => v,
            Tolerance::Da(v) => v,
        };
        Self {
            spectrum,
            tolerance,
            tolerance_value,
            claimed: vec![false; spectrum.len()],
        }
    }

    pub fn spectrum(&self) -> &ScoringSpectrum {
        self.spectrum
    }

    pub fn claimed(&self) -> &[bool] {
        &self.claimed
    }

    pub fn n_claimed(&self) -> usize {
        self.claimed.iter().filter(|c| **c).count()
    }

    /// The peak matching `mz` at `charge`, claimed or not
    #[inline]
    pub fn find(&self, mz: f64, charge: i32) -> Option<usize> {
        let i = self.spectrum.find_nearest(mz)?;
        let peak = &self.spectrum.peaks[i];
        if peak.charge == charge && (mz - peak.mz).abs() < max_distance(mz, self.tolerance) {
            Some(i)
        } else {
            None
        }
    }

    /// Claim the peak matching `mz` at `charge` if it is still free, returning its index
    #[inline]
    pub fn claim(&mut self, mz: f64, charge: i32) -> Option<usize> {
        let i = self.find(mz, charge)?;
        if self.claimed[i] {
            None
        } else {
            self.claimed[i] = true;
            Some(i)
        }
    }

    #[inline]
    fn count_free(&self, mz: f64, charge: i32) -> bool {
        self.find(mz, charge).is_some_and(|i| !self.claimed[i])
    }

    /// Mark the peak matching `mz` at `charge` as taken without scoring it
    #[inline]
    fn block(&mut self, mz: f64, charge: i32) {
        if let Some(i) = self.find(mz, charge) {
            self.claimed[i] = true;
        }
    }

    #[inline]
    fn ppm_abs(&self, i: usize, theoretical: f64) -> f64 {
        (self.spectrum.mz(i) - theoretical).abs() / theoretical * 1e6
    }

    fn max_fragment_charge(precursor_charge: i32) -> i32 {
        (precursor_charge - 1).min(2)
    }

    fn fallback_error(&self) -> f64 {
        2.0 * self.tolerance_value * 1e-6 * 1000.0
    }

    /// Score the unshifted b-, a- and y-ions, then the intact precursor and the
    /// immonium ions of the residues present.
    pub fn score_peptide_ions(
        &mut self,
        template: &FragmentTemplate,
        precursor_charge: i32,
        immonium: &ImmoniumFlags,
    ) -> PeptideIonScores {
        debug_assert_eq!(template.b_ions.len(), template.y_ions.len());
        debug_assert!(!template.is_empty());

        let n = template.len();
        let tic = self.spectrum.tic;
        let max_z = Self::max_fragment_charge(precursor_charge);

        let mut b_ions = vec![0.0; n];
        let mut a_ions = vec![0.0; n];
        let mut y_ions = vec![0.0; n];
        let mut n_theoretical_peaks = 0;
        let mut acc = SeriesAccumulator::default();

        for z in 1..=max_z {
            n_theoretical_peaks += n;
            for (i, b) in template.b_ions.iter().enumerate() {
                let theo = charged_mz(*b, z);
                if let Some(k) = self.claim(theo, z) {
                    let intensity = self.spectrum.intensity(k);
                    acc.dot_product += intensity;
                    acc.err_sum += self.ppm_abs(k, theo);
                    acc.matches += 1;
                    b_ions[i] += intensity;
                }
            }
        }

        for z in 1..=max_z {
            n_theoretical_peaks += n;
            for (i, b) in template.b_ions.iter().enumerate() {
                let theo = charged_mz(b + A_ION_OFFSET, z);
                if let Some(k) = self.claim(theo, z) {
                    let intensity = self.spectrum.intensity(k);
                    acc.dot_product += intensity;
                    acc.matches += 1;
                    a_ions[i] += intensity;
                }
            }
        }

        for z in 1..=max_z {
            n_theoretical_peaks += n;
            for (i, y) in template.y_ions.iter().enumerate() {
                let theo = charged_mz(*y, z);
                if let Some(k) = self.claim(theo, z) {
                    let intensity = self.spectrum.intensity(k);
                    acc.dot_product += intensity;
                    acc.err_sum += self.ppm_abs(k, theo);
                    acc.matches += 1;
                    y_ions[n - 1 - i] += intensity;
                }
            }
        }

        // Neutral losses of ordinary peptide chemistry
        for z in 1..=max_z {
            for b in template.b_ions.iter() {
                self.block(charged_mz(b - FRAGMENT_WATER_LOSS, z), z);
            }
        }
        for loss in [FRAGMENT_WATER_LOSS, FRAGMENT_AMMONIA_LOSS] {
            for z in 1..=max_z {
                for y in template.y_ions.iter() {
                    self.block(charged_mz(y - loss, z), z);
                }
            }
        }

        let mut intensity_sum = vec![0.0; n];
        let counts = collect_series(&mut intensity_sum, &b_ions, &a_ions, &y_ions);

        let (hyperscore, mic, morph, mut err);
        if counts.b == 0 && counts.y == 0 {
            hyperscore = 0.0;
            mic = 0.0;
            morph = 0.0;
            err = self.tolerance_value;
        } else {
            hyperscore = acc.dot_product.ln_1p()
                + log_factorial(counts.b)
                + log_factorial(counts.a)
                + log_factorial(counts.y);
            mic = intensity_sum.iter().sum::<f64>() / tic;
            intensity_sum.iter_mut().for_each(|v| *v /= tic);
            morph = (counts.b + 2 * counts.y) as f64 + mic;
            err = acc.err_sum / (counts.b + counts.y) as f64;
        }

        let mut pc_mic = 0.0;
        let mut pc_matches = 0usize;
        let methionine_loss = [-CH4S];
        let losses = PRECURSOR_LOSSES.iter().chain(
            methionine_loss
                .iter()
                .take(if immonium.m { 1 } else { 0 }),
        );
        for loss in losses {
            for z in 1..=precursor_charge {
                let theo = (template.peptide_mass + loss + z as f64 * PROTON) / z as f64;
                if let Some(k) = self.claim(theo, z) {
                    pc_mic += self.spectrum.intensity(k);
                    pc_matches += 1;
                    acc.matches += 1;
                }
                n_theoretical_peaks += 1;
            }
        }
        pc_mic = pc_mic / tic + pc_matches as f64;

        let mut im_mic = 0.0;
        for residue in immonium.residues() {
            if let Some(mz) = immonium_ion(residue) {
                if let Some(k) = self.claim(mz, 1) {
                    im_mic += self.spectrum.intensity(k);
                    acc.matches += 1;
                }
                n_theoretical_peaks += 1;
            }
        }
        im_mic /= tic;

        if morph <= 2.0 {
            err = self.fallback_error();
        }

        let modds = match_odds(n_theoretical_peaks, acc.matches, RANDOM_MATCH_PROBABILITY);

        PeptideIonScores {
            hyperscore,
            mic,
            morph,
            modds,
            err,
            pc_mic,
            im_mic,
            intensity_sum,
            b_ions,
            y_ions,
            n_theoretical_peaks,
            matched_peaks: acc.matches,
        }
    }

    /// A shifted precursor ion at `mz` is ambiguous when every mass of one of the
    /// adduct's blocked residue lists is observed below it
    fn is_ambiguous_precursor(&self, mz: f64, charge: i32, adduct: &str, ambiguity: &AmbiguityIndex) -> bool {
        let Some(lists) = ambiguity.blocked_masses.get(adduct) else {
            return false;
        };
        let max_dist = max_distance(mz, self.tolerance);
        lists.iter().any(|masses| {
            masses.iter().all(|m| {
                let target = mz - m * charge as f64;
                self.spectrum
                    .find_nearest(target)
                    .is_some_and(|k| (target - self.spectrum.mz(k)).abs() < max_dist)
            })
        })
    }

    /// Score ions carrying one of `adducts`. Call after [`PeakMatcher::score_peptide_ions`]
    /// so peaks explained without the adduct are already taken.
    ///
    /// Only the three (charge, adduct) pairs explaining the most peaks are scored
    /// on the ladders. All adducts are considered for the precursor and immonium ions.
    pub fn score_shifted_ions(
        &mut self,
        template: &FragmentTemplate,
        precursor_charge: i32,
        immonium: &ImmoniumFlags,
        adducts: &[FragmentAdduct],
        ambiguity: &AmbiguityIndex,
    ) -> ShiftedIonScores {
        debug_assert_eq!(template.b_ions.len(), template.y_ions.len());
        debug_assert!(!template.is_empty());

        let n = template.len();
        let tic = self.spectrum.tic;
        let max_z = Self::max_fragment_charge(precursor_charge);

        let mut candidates: Vec<(usize, i32, &FragmentAdduct)> = Vec::new();
        for offset in [0.0, A_ION_OFFSET] {
            for z in 1..=max_z {
                for fa in adducts {
                    let count = template
                        .b_ions
                        .iter()
                        .filter(|b| self.count_free(charged_mz(*b + fa.mass + offset, z), z))
                        .count();
                    if count != 0 {
                        candidates.push((count, z, fa));
                    }
                }
            }
        }
        for z in 1..=max_z {
            for fa in adducts {
                let count = template
                    .y_ions
                    .iter()
                    .skip(1)
                    .filter(|y| self.count_free(charged_mz(*y + fa.mass, z), z))
                    .count();
                if count != 0 {
                    candidates.push((count, z, fa));
                }
            }
        }
        candidates.sort_by_key(|(count, _, _)| Reverse(*count));
        candidates.truncate(3);

        let mut b_ions = vec![0.0; n];
        let mut a_ions = vec![0.0; n];
        let mut y_ions = vec![0.0; n];
        let mut n_theoretical_peaks = 0;
        let mut acc = SeriesAccumulator::default();

        for (_, z, fa) in candidates.iter() {
            n_theoretical_peaks += n;
            for (i, b) in template.b_ions.iter().enumerate() {
                let theo = charged_mz(b + fa.mass, *z);
                if let Some(k) = self.claim(theo, *z) {
                    let intensity = self.spectrum.intensity(k);
                    acc.err_sum += self.ppm_abs(k, theo);
                    acc.dot_product += intensity;
                    acc.matches += 1;
                    b_ions[i] += intensity;
                }
            }
        }

        for (_, z, fa) in candidates.iter() {
            n_theoretical_peaks += n;
            for (i, b) in template.b_ions.iter().enumerate() {
                let theo = charged_mz(b + fa.mass + A_ION_OFFSET, *z);
                if let Some(k) = self.claim(theo, *z) {
                    let intensity = self.spectrum.intensity(k);
                    acc.dot_product += intensity;
                    acc.matches += 1;
                    a_ions[i] += intensity;
                }
            }
        }

        // The protease does not cleave next to the cross-linked residue, so y1 never carries the adduct
        for (_, z, fa) in candidates.iter() {
            n_theoretical_peaks += n - 1;
            for (i, y) in template.y_ions.iter().enumerate().skip(1) {
                let theo = charged_mz(y + fa.mass, *z);
                if let Some(k) = self.claim(theo, *z) {
                    let intensity = self.spectrum.intensity(k);
                    acc.err_sum += self.ppm_abs(k, theo);
                    acc.dot_product += intensity;
                    acc.matches += 1;
                    y_ions[n - 1 - i] += intensity;
                }
            }
        }

        for z in 1..=max_z {
            for fa in adducts {
                for b in template.b_ions.iter() {
                    self.block(charged_mz(b + fa.mass - FRAGMENT_WATER_LOSS, z), z);
                }
            }
        }
        for loss in [FRAGMENT_WATER_LOSS, FRAGMENT_AMMONIA_LOSS] {
            for z in 1..=max_z {
                for fa in adducts {
                    for y in template.y_ions.iter().skip(1) {
                        self.block(charged_mz(y + fa.mass - loss, z), z);
                    }
                }
            }
        }

        let mut intensity_sum = vec![0.0; n];
        let counts = collect_series(&mut intensity_sum, &b_ions, &a_ions, &y_ions);

        let (hyperscore, mic, morph, err);
        if counts.b == 0 && counts.y == 0 {
            hyperscore = 0.0;
            mic = 0.0;
            morph = 0.0;
            err = self.tolerance_value;
        } else {
            hyperscore = acc.dot_product.ln_1p()
                + log_factorial(counts.b)
                + log_factorial(counts.a)
                + log_factorial(counts.y);
            mic = intensity_sum.iter().sum::<f64>() / tic;
            intensity_sum.iter_mut().for_each(|v| *v /= tic);
            morph = (counts.b + counts.y) as f64 + mic;
            err = acc.err_sum / (counts.b + counts.y) as f64;
        }

        let mut pc_mic = 0.0;
        let mut pc_matches = 0usize;
        for loss in PRECURSOR_LOSSES {
            let peptide_mass = template.peptide_mass + loss;
            for z in 1..=precursor_charge {
                for fa in adducts {
                    let theo = (peptide_mass + fa.mass + z as f64 * PROTON) / z as f64;
                    if self.spectrum.ambiguous_adducts.contains(&fa.name)
                        && self.is_ambiguous_precursor(theo, z, &fa.name, ambiguity)
                    {
                        continue;
                    }
                    if let Some(k) = self.claim(theo, z) {
                        pc_mic += self.spectrum.intensity(k);
                        pc_matches += 1;
                        acc.matches += 1;
                    }
                    n_theoretical_peaks += 1;
                }
            }
        }
        pc_mic = pc_mic / tic + pc_matches as f64;

        let mut im_mic = 0.0;
        let mut im_matches = 0usize;
        for fa in adducts {
            for residue in immonium.residues() {
                for mz in adduct_immonium_ions(residue) {
                    if let Some(k) = self.claim(mz + fa.mass, 1) {
                        im_mic += self.spectrum.intensity(k);
                        im_matches += 1;
                    }
                }
            }
        }
        im_mic /= tic;

        let modds = match_odds(n_theoretical_peaks, acc.matches, RANDOM_MATCH_PROBABILITY);

        ShiftedIonScores {
            hyperscore,
            mic,
            morph,
            err,
            modds,
            pc_mic,
            im_mic,
            intensity_sum,
            b_ions,
            y_ions,
            n_theoretical_peaks,
            matched_peaks: acc.matches + im_matches,
        }
    }

    /// Rank statistics of the peaks claimed so far
    pub fn rank_scores(&self) -> RankScores {
        let matched = self.n_claimed();
        if matched == 0 {
            return RankScores::default();
        }
        let mean_matched = self
            .spectrum
            .peaks
            .iter()
            .zip(self.claimed.iter())
            .filter(|(_, c)| **c)
            .map(|(p, _)| p.intensity as f64)
            .sum::<f64>()
            / matched as f64;
        let unexplained_above = self
            .spectrum
            .peaks
            .iter()
            .zip(self.claimed.iter())
            .filter(|(p, c)| !**c && p.intensity as f64 > mean_matched)
            .count();
        RankScores {
            w_top50: unexplained_above as f64,
            explained_peaks: matched,
            explained_peak_fraction: matched as f64 / self.spectrum.len() as f64,
        }
    }
}

/// The fraction of the total ion current explained by singly charged nucleotide
/// marker ions. Peaks are not claimed, each experimental peak counts once.
pub fn marker_ion_score(spectrum: &ScoringSpectrum, markers: &[FragmentAdduct], tolerance: Tolerance) -> f64 {
    if markers.is_empty() || spectrum.is_empty() || spectrum.tic <= 0.0 {
        return 0.0;
    }
    let mut seen = vec![false; spectrum.len()];
    let mut matched = 0.0;
    for marker in markers {
        let mz = marker.mass + PROTON;
        if let Some(k) = spectrum.find_nearest(mz) {
            let peak = &spectrum.peaks[k];
            if peak.charge == 1 && (peak.mz - mz).abs() < max_distance(mz, tolerance) && !seen[k] {
                seen[k] = true;
                matched += peak.intensity as f64;
            }
        }
    }
    matched / spectrum.tic
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adduct::{AdductTable, ChainOptions, Preset};
    use crate::peptide::ModificationSet;
    use crate::testing::{crosslinked_spectrum, finish, linear_spectrum};

    fn template(seq: &str) -> FragmentTemplate {
        FragmentTemplate::new(&ModificationSet::default().variants(seq).remove(0))
    }

    #[test]
    fn test_score_peptide_ions() {
        let t = template("SAMPLER");
        let spectrum = linear_spectrum(&t, 2);
        let mut matcher = PeakMatcher::new(&spectrum, Tolerance::PPM(20.0));
        let flags = ImmoniumFlags::from_sequence("SAMPLER");
        let scores = matcher.score_peptide_ions(&t, 2, &flags);
        assert_eq!(scores.b_ions.iter().filter(|v| **v > 0.0).count(), 6);
        assert_eq!(scores.y_ions.iter().filter(|v| **v > 0.0).count(), 6);
        assert!(scores.morph > 18.0 && scores.morph < 19.0, "{}", scores.morph);
        assert!(scores.hyperscore > 0.1);
        assert!(scores.mic > 0.5);
        assert!(scores.err < 1.0);
        assert!(scores.modds > 10.0);
        // b, y and a ladders, four precursor losses at two charges, one
        // immonium ion each for M, P, L and E
        assert_eq!(scores.n_theoretical_peaks, 3 * 6 + 4 * 2 + 4);
    }

    #[test]
    fn test_at_most_one_match_per_peak() {
        let t = FragmentTemplate {
            b_ions: vec![300.0, 300.0],
            y_ions: vec![700.0, 800.0],
            peptide_mass: 2000.0,
        };
        let spectrum = finish(vec![(300.0, 10.0), (1200.0, 30.0)], 1001.0, 2);
        let mut matcher = PeakMatcher::new(&spectrum, Tolerance::PPM(20.0));
        let scores = matcher.score_peptide_ions(&t, 2, &ImmoniumFlags::default());
        assert_eq!(scores.b_ions, vec![10.0, 0.0]);
        assert_eq!(matcher.n_claimed(), 1);
        assert!((scores.mic - 0.25).abs() < 1e-12);

        let ranks = matcher.rank_scores();
        assert_eq!(ranks.explained_peaks, 1);
        assert_eq!(ranks.w_top50, 1.0);
        assert!((ranks.explained_peak_fraction - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_no_matches() {
        let t = template("SAMPLER");
        let spectrum = finish(vec![(5000.0, 1.0)], 500.0, 2);
        let mut matcher = PeakMatcher::new(&spectrum, Tolerance::PPM(20.0));
        let scores = matcher.score_peptide_ions(&t, 2, &ImmoniumFlags::default());
        assert_eq!(scores.hyperscore, 0.0);
        assert_eq!(scores.morph, 0.0);
        assert!(scores.modds < 2.0);
        assert!((scores.err - 2.0 * 20.0 * 1e-6 * 1000.0).abs() < 1e-12);
        assert_eq!(matcher.rank_scores(), RankScores::default());
    }

    #[test]
    fn test_score_shifted_ions() {
        let chemistry = Preset::RnaUvU.chemistry().unwrap();
        let table = AdductTable::from_chemistry(&chemistry, &ChainOptions::default()).unwrap();
        let feasible = table.feasible("U").unwrap();
        let adducts = feasible.for_nucleotide('U').unwrap();
        let fa = adducts.iter().find(|a| a.name == "U").unwrap();

        let peptide = ModificationSet::default().variants("SAMPLER").remove(0);
        let t = FragmentTemplate::new(&peptide);
        let spectrum = crosslinked_spectrum(&t, 3, fa, 2);
        let flags = ImmoniumFlags::from_sequence("SAMPLER");

        let mut matcher = PeakMatcher::new(&spectrum, Tolerance::PPM(20.0));
        let linear = matcher.score_peptide_ions(&t, 2, &flags);
        let shifted = matcher.score_shifted_ions(&t, 2, &flags, adducts, &AmbiguityIndex::default());
        assert!(linear.morph >= 2.0);
        assert!(shifted.morph >= 4.0, "{}", shifted.morph);
        assert!(shifted.modds > 0.0);
        assert!(shifted.b_ions[3..].iter().all(|v| *v > 0.0));
        assert!(shifted.b_ions[..3].iter().all(|v| *v == 0.0));
        assert!(shifted.pc_mic >= 1.0);
    }

    #[test]
    fn test_marker_ions() {
        let chemistry = Preset::RnaUvU.chemistry().unwrap();
        let table = AdductTable::from_chemistry(&chemistry, &ChainOptions::default()).unwrap();
        let markers = &table.feasible("U").unwrap().marker_ions;
        let u_prime = markers.iter().find(|m| m.name == "U'").unwrap();
        let spectrum = finish(
            vec![(u_prime.mass + PROTON, 1.0), (500.0, 3.0)],
            500.0,
            2,
        );
        let score = marker_ion_score(&spectrum, markers, Tolerance::PPM(40.0));
        assert!((score - 0.25).abs() < 1e-6, "{score}");
    }
}
