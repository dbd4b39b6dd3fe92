//! Turning matcher sub-scores into [`AnnotatedHit`]s.
//!
//! Both scoring modes and the post-scoring of fast mode hits go through
//! [`HitScorer`], so a hit's numbers never depend on which path produced it.
use tracing::error;

use crate::adduct::{NucleotideFragmentAdducts, PrecursorAdduct};
use crate::context::SearchContext;
use crate::digest::PeptideRef;
use crate::fragments::FragmentTemplate;
use crate::hit::AnnotatedHit;
use crate::ladder::{ladder_score, longest_complete_ladder, longest_ladder_with_shift};
use crate::matcher::{marker_ion_score, PeakMatcher, PeptideIonScores, RankScores, ShiftedIonScores};
use crate::peptide::ImmoniumFlags;
use crate::preprocess::PrecursorEntry;
use crate::spectrum::ScoringSpectrum;

/// A candidate with an unshifted score this poor is noise
pub fn bad_total_loss(scores: &PeptideIonScores) -> bool {
    scores.hyperscore < 0.1 || scores.morph < 2.0 || scores.total_mic() < 0.01
}

/// A cross-link candidate whose adduct-shifted evidence is too weak
pub fn bad_partial_loss(linear: &PeptideIonScores, shifted: &ShiftedIonScores, marker_score: f64) -> bool {
    let pc = shifted.pc_mic.fract();
    shifted.morph + linear.morph < 5.03
        || shifted.mic + shifted.im_mic + pc + marker_score < 0.03
        || (shifted.morph < 1.0 && shifted.im_mic < 0.03)
}

/// One peptide variant paired with one precursor adduct
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub peptide: &'a PeptideRef,
    pub is_decoy: bool,
    pub peptide_mod_index: usize,
    pub na_mod_index: usize,
    pub adduct: &'a PrecursorAdduct,
    pub template: &'a FragmentTemplate,
    pub immonium: ImmoniumFlags,
}

impl Candidate<'_> {
    /// The neutral mass of the peptide variant with the adduct attached
    pub fn mass(&self) -> f64 {
        self.template.peptide_mass + self.adduct.mass
    }
}

/// The outcome of scoring the unshifted ions, kept so that every cross-linked
/// nucleotide can continue from the same claimed peaks
#[derive(Debug, Clone)]
pub struct TotalLossMatch<'a> {
    pub matcher: PeakMatcher<'a>,
    pub scores: PeptideIonScores,
}

#[derive(Debug, Clone, Copy)]
pub struct HitScorer<'a> {
    pub context: &'a SearchContext,
}

impl<'a> HitScorer<'a> {
    pub fn new(context: &'a SearchContext) -> Self {
        Self { context }
    }

    /// Score the unshifted ions of `candidate`, or `None` if the candidate is noise
    pub fn score_total_loss<'s>(
        &self,
        spectrum: &'s ScoringSpectrum,
        candidate: &Candidate<'_>,
    ) -> Option<TotalLossMatch<'s>> {
        let mut matcher = PeakMatcher::new(spectrum, self.context.parameters.fragment_tolerance);
        let scores = matcher.score_peptide_ions(
            candidate.template,
            spectrum.precursor_charge,
            &candidate.immonium,
        );
        if bad_total_loss(&scores) {
            None
        } else {
            Some(TotalLossMatch { matcher, scores })
        }
    }

    fn fill_rank_scores(hit: &mut AnnotatedHit, ranks: RankScores) {
        hit.explained_peak_fraction = ranks.explained_peak_fraction;
        hit.w_top50 = ranks.w_top50;
        if ranks.explained_peaks > 0 && hit.n_theoretical_peaks > 0 {
            hit.matched_theo_fraction = ranks.explained_peaks as f64 / hit.n_theoretical_peaks as f64;
        }
    }

    /// Build the hit carrying only the unshifted sub-scores, scored by its match odds
    pub fn total_loss_hit(
        &self,
        candidate: &Candidate<'_>,
        entry: &PrecursorEntry,
        total_loss: &TotalLossMatch<'_>,
    ) -> AnnotatedHit {
        let scores = &total_loss.scores;
        let mut hit = AnnotatedHit::new(
            candidate.peptide.clone(),
            candidate.is_decoy,
            candidate.peptide_mod_index,
            candidate.na_mod_index,
        );
        hit.isotope_error = entry.isotope;
        hit.total_loss_score = scores.hyperscore;
        hit.mic = scores.mic;
        hit.err = scores.err;
        hit.morph = scores.morph;
        hit.modds = scores.modds;
        hit.immonium_score = scores.im_mic;
        hit.precursor_score = scores.pc_mic;
        hit.total_mic = scores.total_mic();
        hit.n_theoretical_peaks = scores.n_theoretical_peaks;
        hit.matched_peaks = scores.matched_peaks;

        let n = scores.intensity_sum.len().max(1) as f64;
        hit.ladder_score = ladder_score(&scores.intensity_sum) / n;
        let complete = longest_complete_ladder(&scores.intensity_sum);
        if !complete.is_empty() {
            hit.sequence_score = ladder_score(&scores.intensity_sum[complete]) / n;
        }

        let ppm = (candidate.mass() - entry.mass) / entry.mass * 1e6;
        hit.mass_error_p = self.context.mass_error.score(ppm);
        hit.tags = longest_ladder_with_shift(&scores.b_ions, &scores.y_ions, &[], &[]);

        Self::fill_rank_scores(&mut hit, total_loss.matcher.rank_scores());
        hit.score = hit.modds;
        hit
    }

    /// Continue from `total_loss` with the fragment adducts of one cross-linked
    /// nucleotide and build the complete cross-link hit.
    ///
    /// Candidates failing the configured partial loss or cross-link tag
    /// requirements yield `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn cross_link_hit(
        &self,
        spectrum: &ScoringSpectrum,
        candidate: &Candidate<'_>,
        entry: &PrecursorEntry,
        total_loss: &TotalLossMatch<'_>,
        nucleotide: &NucleotideFragmentAdducts,
        amb_index: usize,
        marker_score: f64,
    ) -> Option<AnnotatedHit> {
        if nucleotide.adducts.is_empty() {
            error!(
                "No fragment adducts for cross-linkable nucleotide {} of {:?}",
                nucleotide.nucleotide, candidate.adduct.names
            );
            return None;
        }
        let params = &self.context.parameters;
        let mut matcher = total_loss.matcher.clone();
        let shifted = matcher.score_shifted_ions(
            candidate.template,
            spectrum.precursor_charge,
            &candidate.immonium,
            &nucleotide.adducts,
            &self.context.ambiguity,
        );
        if params.filter_bad_partial_loss && bad_partial_loss(&total_loss.scores, &shifted, marker_score) {
            return None;
        }
        let linear = &total_loss.scores;
        let tags = longest_ladder_with_shift(&linear.b_ions, &linear.y_ions, &shifted.b_ions, &shifted.y_ions);
        if params.require_xl_tag && tags.tag_xled == 0 {
            return None;
        }

        let mut hit = self.total_loss_hit(candidate, entry, total_loss);
        hit.na_adduct_amb_index = amb_index;
        hit.cross_linked_nucleotide = Some(nucleotide.nucleotide);
        hit.partial_loss_score = shifted.hyperscore;
        hit.pl_mic = shifted.mic;
        hit.pl_err = shifted.err;
        hit.pl_morph = shifted.morph;
        hit.pl_modds = shifted.modds;
        hit.pl_pc_mic = shifted.pc_mic;
        hit.pl_im_mic = shifted.im_mic;
        hit.marker_ions_score = marker_score;
        hit.total_mic += shifted.mic + shifted.pc_mic.fract() + shifted.im_mic + marker_score;
        hit.n_theoretical_peaks += shifted.n_theoretical_peaks;
        hit.matched_peaks += shifted.matched_peaks;
        hit.tags = tags;
        Self::fill_rank_scores(&mut hit, matcher.rank_scores());
        hit.score = hit.combined_score();
        Some(hit)
    }

    /// Score every ambiguous name and feasible cross-linked nucleotide of a
    /// cross-link candidate, starting from an accepted unshifted match
    pub fn cross_link_hits(
        &self,
        spectrum: &ScoringSpectrum,
        candidate: &Candidate<'_>,
        entry: &PrecursorEntry,
        total_loss: &TotalLossMatch<'_>,
        mut on_scored: impl FnMut(Option<AnnotatedHit>),
    ) {
        let marker_tolerance = self.context.parameters.marker_ion_tolerance();
        for (amb_index, name) in candidate.adduct.names.iter().enumerate() {
            let Some(feasible) = self.context.adducts.feasible(name) else {
                error!("Precursor adduct {name} has no feasibility entry");
                continue;
            };
            if feasible.per_nucleotide.is_empty() {
                continue;
            }
            let marker_score = marker_ion_score(spectrum, &feasible.marker_ions, marker_tolerance);
            for nucleotide in feasible.per_nucleotide.iter() {
                on_scored(self.cross_link_hit(
                    spectrum,
                    candidate,
                    entry,
                    total_loss,
                    nucleotide,
                    amb_index,
                    marker_score,
                ));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::adduct::Preset;
    use crate::context::SearchParameters;
    use crate::peptide::ModificationSet;
    use crate::testing::{crosslinked_spectrum, linear_spectrum};

    fn context() -> SearchContext {
        SearchContext::from_preset(SearchParameters::default(), Preset::RnaUvU, ModificationSet::default()).unwrap()
    }

    #[test]
    fn test_total_loss_hit() {
        let ctx = context();
        let scorer = HitScorer::new(&ctx);
        let peptide = PeptideRef::new(Arc::from("SAMPLER"), 0..7);
        let variant = ctx.modifications.variants(peptide.as_str()).remove(0);
        let template = FragmentTemplate::new(&variant);
        let spectrum = linear_spectrum(&template, 2);
        let none = &ctx.adducts.adducts[0];
        let candidate = Candidate {
            peptide: &peptide,
            is_decoy: false,
            peptide_mod_index: 0,
            na_mod_index: 0,
            adduct: none,
            template: &template,
            immonium: ImmoniumFlags::from_sequence(peptide.as_str()),
        };
        let entry = PrecursorEntry {
            mass: spectrum.precursor_mass(0),
            slot: 0,
            isotope: 0,
        };
        let tl = scorer.score_total_loss(&spectrum, &candidate).unwrap();
        let hit = scorer.total_loss_hit(&candidate, &entry, &tl);
        assert_eq!(hit.score, hit.modds);
        assert!(hit.mass_error_p > 0.99);
        assert_eq!(hit.tags.tag_unshifted, 6);
        assert!(hit.ladder_score > 1.0);
        assert_eq!(hit.sequence_score, hit.ladder_score);
        assert!(hit.matched_theo_fraction > 0.0);
        assert_eq!(hit.cross_linked_nucleotide, None);
    }

    #[test]
    fn test_cross_link_hit() {
        let ctx = context();
        let scorer = HitScorer::new(&ctx);
        let peptide = PeptideRef::new(Arc::from("SAMPLER"), 0..7);
        let variant = ctx.modifications.variants(peptide.as_str()).remove(0);
        let template = FragmentTemplate::new(&variant);
        let (na_index, adduct) = ctx
            .adducts
            .adducts
            .iter()
            .enumerate()
            .find(|(_, a)| a.names == vec!["U".to_string()])
            .unwrap();
        let feasible = ctx.adducts.feasible("U").unwrap();
        let fa = feasible.per_nucleotide[0]
            .adducts
            .iter()
            .find(|fa| fa.name == "U")
            .unwrap();
        let spectrum = crosslinked_spectrum(&template, 3, fa, 2);
        let candidate = Candidate {
            peptide: &peptide,
            is_decoy: false,
            peptide_mod_index: 0,
            na_mod_index: na_index,
            adduct,
            template: &template,
            immonium: ImmoniumFlags::from_sequence(peptide.as_str()),
        };
        let entry = PrecursorEntry {
            mass: spectrum.precursor_mass(0),
            slot: 0,
            isotope: 0,
        };
        let tl = scorer.score_total_loss(&spectrum, &candidate).unwrap();
        let mut hits = Vec::new();
        scorer.cross_link_hits(&spectrum, &candidate, &entry, &tl, |h| hits.extend(h));
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.cross_linked_nucleotide, Some('U'));
        assert!(hit.pl_modds > 0.0);
        assert!((hit.score - (hit.modds + hit.pl_modds)).abs() < 1e-12);
        assert!(hit.tags.tag_xled >= 4, "{:?}", hit.tags);
        assert!(hit.total_mic > 0.9);
    }

    #[test]
    fn test_filters() {
        let weak = PeptideIonScores {
            hyperscore: 0.05,
            morph: 3.0,
            mic: 0.5,
            ..Default::default()
        };
        assert!(bad_total_loss(&weak));
        let boundary = PeptideIonScores {
            hyperscore: 0.1,
            ..weak.clone()
        };
        assert!(!bad_total_loss(&boundary));
        let shifted = ShiftedIonScores {
            morph: 2.5,
            mic: 0.1,
            ..Default::default()
        };
        assert!(!bad_partial_loss(&boundary, &shifted, 0.0));
        let shifted = ShiftedIonScores {
            morph: 0.5,
            mic: 0.1,
            ..Default::default()
        };
        assert!(bad_partial_loss(&boundary, &shifted, 0.0));
    }
}
