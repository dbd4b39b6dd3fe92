//! Scored candidates and the bounded per-spectrum collections that hold them.
use std::cmp::Ordering;

use crate::digest::PeptideRef;
use crate::ladder::XLTags;

/// One scored (peptide variant, precursor adduct, cross-linked nucleotide) candidate
/// against one spectrum
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedHit {
    pub peptide: PeptideRef,
    pub is_decoy: bool,
    /// Index into the modified variants of `peptide`
    pub peptide_mod_index: usize,
    /// Index into the precursor adduct table
    pub na_mod_index: usize,
    /// Which of the names sharing the adduct's formula this hit was scored as
    pub na_adduct_amb_index: usize,
    pub cross_linked_nucleotide: Option<char>,
    pub isotope_error: i32,

    pub total_loss_score: f64,
    pub mic: f64,
    pub err: f64,
    pub morph: f64,
    pub modds: f64,
    pub immonium_score: f64,
    pub precursor_score: f64,

    pub partial_loss_score: f64,
    pub pl_mic: f64,
    pub pl_err: f64,
    pub pl_morph: f64,
    pub pl_modds: f64,
    pub pl_pc_mic: f64,
    pub pl_im_mic: f64,
    pub marker_ions_score: f64,
    pub total_mic: f64,

    pub ladder_score: f64,
    pub sequence_score: f64,
    pub mass_error_p: f64,
    pub explained_peak_fraction: f64,
    pub matched_theo_fraction: f64,
    pub w_top50: f64,
    pub tags: XLTags,
    pub n_theoretical_peaks: usize,
    /// Experimental peaks claimed by this candidate's ions
    pub matched_peaks: usize,

    pub best_localization: String,
    pub best_localization_score: f64,
    pub best_localization_position: Option<usize>,
    /// Per residue localization scores, comma separated
    pub localization_scores: String,

    pub score: f64,
}

impl AnnotatedHit {
    pub fn new(peptide: PeptideRef, is_decoy: bool, peptide_mod_index: usize, na_mod_index: usize) -> Self {
        let best_localization = peptide.as_str().to_string();
        Self {
            peptide,
            is_decoy,
            peptide_mod_index,
            na_mod_index,
            na_adduct_amb_index: 0,
            cross_linked_nucleotide: None,
            isotope_error: 0,
            total_loss_score: 0.0,
            mic: 0.0,
            err: 0.0,
            morph: 0.0,
            modds: 0.0,
            immonium_score: 0.0,
            precursor_score: 0.0,
            partial_loss_score: 0.0,
            pl_mic: 0.0,
            pl_err: 0.0,
            pl_morph: 0.0,
            pl_modds: 0.0,
            pl_pc_mic: 0.0,
            pl_im_mic: 0.0,
            marker_ions_score: 0.0,
            total_mic: 0.0,
            ladder_score: 0.0,
            sequence_score: 0.0,
            mass_error_p: 0.0,
            explained_peak_fraction: 0.0,
            matched_theo_fraction: 0.0,
            w_top50: 0.0,
            tags: XLTags::default(),
            n_theoretical_peaks: 0,
            matched_peaks: 0,
            best_localization,
            best_localization_score: 0.0,
            best_localization_position: None,
            localization_scores: String::new(),
            score: 0.0,
        }
    }

    /// The combined score: total-loss plus partial-loss match odds
    pub fn combined_score(&self) -> f64 {
        self.modds + self.pl_modds
    }

    pub fn sequence(&self) -> &str {
        self.peptide.as_str()
    }

    fn score_order(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score)
    }
}

/// Sort hits best first, keeping insertion order among equal scores
pub fn sort_hits(hits: &mut [AnnotatedHit]) {
    hits.sort_by(|a, b| a.score_order(b));
}

/// The candidates retained for a single spectrum
#[derive(Debug, Default, Clone)]
pub struct SpectrumHits {
    pub cross_links: Vec<AnnotatedHit>,
    pub peptides: Vec<AnnotatedHit>,
    /// The number of candidates scored against this spectrum
    pub candidates: usize,
    pub matched_peaks: usize,
}

impl SpectrumHits {
    fn push_bounded(hits: &mut Vec<AnnotatedHit>, hit: AnnotatedHit, top_k: usize) {
        hits.push(hit);
        if hits.len() >= 2 * top_k {
            sort_hits(hits);
            hits.truncate(top_k);
        }
    }

    pub fn push_cross_link(&mut self, hit: AnnotatedHit, top_k: usize) {
        Self::push_bounded(&mut self.cross_links, hit, top_k)
    }

    pub fn push_peptide(&mut self, hit: AnnotatedHit, top_k: usize) {
        Self::push_bounded(&mut self.peptides, hit, top_k)
    }

    /// Route a hit to the list matching whether it carries an adduct
    pub fn push(&mut self, hit: AnnotatedHit, is_cross_link: bool, top_k: usize) {
        if is_cross_link {
            self.push_cross_link(hit, top_k)
        } else {
            self.push_peptide(hit, top_k)
        }
    }

    /// Sort both lists and keep at most `top_k` entries each
    pub fn finalize(&mut self, top_k: usize) {
        sort_hits(&mut self.cross_links);
        self.cross_links.truncate(top_k);
        sort_hits(&mut self.peptides);
        self.peptides.truncate(top_k);
    }

    pub fn is_empty(&self) -> bool {
        self.cross_links.is_empty() && self.peptides.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cross_links.len() + self.peptides.len()
    }
}
