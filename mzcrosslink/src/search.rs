//! The parallel candidate search over a protein database.
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::context::{ScoringMode, SearchContext};
use crate::digest::{is_standard_sequence, PeptideRef, Protein};
use crate::fragments::FragmentTemplate;
use crate::hit::SpectrumHits;
use crate::peptide::ImmoniumFlags;
use crate::preprocess::{PrecursorEntry, PrecursorIndex};
use crate::score::{Candidate, HitScorer};
use crate::spectrum::ScoringSpectrum;

/// Counters describing a finished search
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchSummary {
    pub proteins: usize,
    pub peptides: usize,
    pub candidates: usize,
    pub spectra_with_hits: usize,
}

/// Scores every peptide of a protein database against the spectra whose
/// precursor mass it can explain.
///
/// Each spectrum slot has its own lock, so workers only contend when they score
/// candidates for the same spectrum.
pub struct CandidateSearch<'a> {
    context: &'a SearchContext,
    spectra: &'a [ScoringSpectrum],
    precursors: &'a PrecursorIndex,
    hits: Vec<Mutex<SpectrumHits>>,
    processed: Mutex<HashSet<String>>,
    peptide_counter: AtomicUsize,
}

impl<'a> CandidateSearch<'a> {
    pub fn new(context: &'a SearchContext, spectra: &'a [ScoringSpectrum], precursors: &'a PrecursorIndex) -> Self {
        let hits = (0..spectra.len()).map(|_| Mutex::new(SpectrumHits::default())).collect();
        Self {
            context,
            spectra,
            precursors,
            hits,
            processed: Mutex::new(HashSet::new()),
            peptide_counter: AtomicUsize::new(0),
        }
    }

    fn slot(&self, slot: usize) -> MutexGuard<'_, SpectrumHits> {
        match self.hits[slot].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns `true` the first time `sequence` is seen
    fn first_visit(&self, sequence: &str) -> bool {
        let mut processed = match self.processed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if processed.contains(sequence) {
            false
        } else {
            processed.insert(sequence.to_string());
            true
        }
    }

    /// Search all `proteins` in parallel on the current rayon pool
    pub fn search(&self, proteins: &[Protein]) -> SearchSummary {
        let start = Instant::now();
        proteins.par_iter().for_each(|protein| self.search_protein(protein));
        let peptides = self.peptide_counter.load(Ordering::Relaxed);
        let mut summary = SearchSummary {
            proteins: proteins.len(),
            peptides,
            ..Default::default()
        };
        for slot in 0..self.hits.len() {
            let hits = self.slot(slot);
            summary.candidates += hits.candidates;
            if !hits.is_empty() {
                summary.spectra_with_hits += 1;
            }
        }
        info!(
            "Searched {} proteins, {} peptides, {} candidates in {:0.3?}",
            summary.proteins,
            summary.peptides,
            summary.candidates,
            start.elapsed()
        );
        summary
    }

    pub fn search_protein(&self, protein: &Protein) {
        let params = &self.context.parameters;
        let is_decoy = protein.is_decoy();
        for range in params.enzyme.digest(
            &protein.sequence,
            params.missed_cleavages,
            params.peptide_length_range(),
        ) {
            let peptide = PeptideRef::new(protein.sequence.clone(), range);
            if !is_standard_sequence(peptide.as_str()) {
                continue;
            }
            if !self.first_visit(peptide.as_str()) {
                continue;
            }
            self.peptide_counter.fetch_add(1, Ordering::Relaxed);
            self.search_peptide(&peptide, is_decoy);
        }
    }

    pub fn search_peptide(&self, peptide: &PeptideRef, is_decoy: bool) {
        let immonium = ImmoniumFlags::from_sequence(peptide.as_str());
        let variants = self.context.modifications.variants(peptide.as_str());
        for (peptide_mod_index, variant) in variants.iter().enumerate() {
            let template = FragmentTemplate::new(variant);
            if template.is_empty() {
                continue;
            }
            for (na_mod_index, adduct) in self.context.adducts.adducts.iter().enumerate() {
                let candidate = Candidate {
                    peptide,
                    is_decoy,
                    peptide_mod_index,
                    na_mod_index,
                    adduct,
                    template: &template,
                    immonium,
                };
                let window = self.context.parameters.precursor_mass_window(candidate.mass());
                for entry in self.precursors.range(window.start, window.end) {
                    self.score_candidate(&candidate, entry);
                }
            }
        }
    }

    fn score_candidate(&self, candidate: &Candidate<'_>, entry: &PrecursorEntry) {
        let spectrum = &self.spectra[entry.slot];
        let scorer = HitScorer::new(self.context);
        let top_k = self.context.parameters.top_hits;
        let is_cross_link = candidate.adduct.is_cross_link();

        let exhaustive = is_cross_link && self.context.parameters.scoring == ScoringMode::Slow;
        if !exhaustive {
            self.slot(entry.slot).candidates += 1;
            let Some(total_loss) = scorer.score_total_loss(spectrum, candidate) else {
                return;
            };
            let hit = scorer.total_loss_hit(candidate, entry, &total_loss);
            let mut hits = self.slot(entry.slot);
            hits.matched_peaks += hit.matched_peaks;
            hits.push(hit, is_cross_link, top_k);
            return;
        }

        let Some(total_loss) = scorer.score_total_loss(spectrum, candidate) else {
            let n = candidate
                .adduct
                .names
                .iter()
                .filter_map(|name| self.context.adducts.feasible(name))
                .map(|f| f.per_nucleotide.len())
                .sum::<usize>();
            self.slot(entry.slot).candidates += n;
            return;
        };
        scorer.cross_link_hits(spectrum, candidate, entry, &total_loss, |scored| {
            let mut hits = self.slot(entry.slot);
            hits.candidates += 1;
            if let Some(hit) = scored {
                hits.matched_peaks += hit.matched_peaks;
                hits.push_cross_link(hit, top_k);
            }
        });
    }

    /// Finish the search, keeping the best `top_hits` of each list per spectrum
    pub fn into_hits(self) -> Vec<SpectrumHits> {
        let top_k = self.context.parameters.top_hits;
        let hits: Vec<SpectrumHits> = self
            .hits
            .into_iter()
            .map(|m| {
                let mut hits = match m.into_inner() {
                    Ok(hits) => hits,
                    Err(poisoned) => poisoned.into_inner(),
                };
                hits.finalize(top_k);
                hits
            })
            .collect();
        debug!(
            "{} spectra have at least one candidate",
            hits.iter().filter(|h| !h.is_empty()).count()
        );
        hits
    }
}
