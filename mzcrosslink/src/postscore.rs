//! Post-scoring of the retained hits: expanding fast mode hits per cross-linked
//! nucleotide and localizing the cross-link site.
use std::fmt::Write;

use mzpeaks::Tolerance;
use rayon::prelude::*;
use tracing::{debug, error};

use crate::adduct::FragmentAdduct;
use crate::context::{ScoringMode, SearchContext};
use crate::fragments::{charged_mz, FragmentTemplate, A_ION_OFFSET};
use crate::hit::{AnnotatedHit, SpectrumHits};
use crate::matcher::adduct_immonium_ions;
use crate::peptide::ImmoniumFlags;
use crate::preprocess::PrecursorEntry;
use crate::score::{Candidate, HitScorer};
use crate::spectrum::{max_distance, ScoringSpectrum};

/// The outcome of localizing an adduct on a peptide
#[derive(Debug, Clone, PartialEq)]
pub struct Localization {
    /// The sequence with the best scoring residues in lower case
    pub best_localization: String,
    pub best_score: f64,
    /// The last of the best scoring residues
    pub best_position: Option<usize>,
    /// Per residue scores, comma separated and scaled by 100
    pub scores: String,
}

/// Per residue intensity of shifted and unshifted prefix and suffix ions
#[derive(Debug, Default, Clone)]
struct SiteEvidence {
    n_shifts: Vec<f64>,
    c_shifts: Vec<f64>,
    n_noshifts: Vec<f64>,
    c_noshifts: Vec<f64>,
    immonium: Vec<f64>,
}

struct Annotator<'a> {
    spectrum: &'a ScoringSpectrum,
    tolerance: Tolerance,
    annotated: Vec<bool>,
}

impl Annotator<'_> {
    fn annotate(&mut self, mz: f64, charge: i32) -> f64 {
        let Some(i) = self.spectrum.find_nearest(mz) else {
            return 0.0;
        };
        let peak = &self.spectrum.peaks[i];
        if self.annotated[i] || peak.charge != charge || (peak.mz - mz).abs() >= max_distance(mz, self.tolerance) {
            return 0.0;
        }
        self.annotated[i] = true;
        peak.intensity as f64
    }
}

fn collect_site_evidence(
    spectrum: &ScoringSpectrum,
    template: &FragmentTemplate,
    sequence: &str,
    adducts: &[FragmentAdduct],
    tolerance: Tolerance,
) -> SiteEvidence {
    let residues = sequence.as_bytes();
    let len = residues.len();
    let max_z = (spectrum.precursor_charge - 1).clamp(1, 2);
    let mut annotator = Annotator {
        spectrum,
        tolerance,
        annotated: vec![false; spectrum.len()],
    };
    let mut evidence = SiteEvidence {
        n_shifts: vec![0.0; len],
        c_shifts: vec![0.0; len],
        n_noshifts: vec![0.0; len],
        c_noshifts: vec![0.0; len],
        immonium: vec![0.0; len],
    };

    // b and a ion i ends at residue i, y ion j starts at residue len - 1 - j
    for z in 1..=max_z {
        for (i, b) in template.b_ions.iter().enumerate() {
            evidence.n_noshifts[i] += annotator.annotate(charged_mz(*b, z), z);
            evidence.n_noshifts[i] += annotator.annotate(charged_mz(b + A_ION_OFFSET, z), z);
        }
        for (j, y) in template.y_ions.iter().enumerate() {
            evidence.c_noshifts[len - 1 - j] += annotator.annotate(charged_mz(*y, z), z);
        }
    }

    for fa in adducts {
        for z in 1..=max_z {
            for (i, b) in template.b_ions.iter().enumerate() {
                evidence.n_shifts[i] += annotator.annotate(charged_mz(b + fa.mass, z), z);
                evidence.n_shifts[i] += annotator.annotate(charged_mz(b + fa.mass + A_ION_OFFSET, z), z);
            }
            for (j, y) in template.y_ions.iter().enumerate() {
                evidence.c_shifts[len - 1 - j] += annotator.annotate(charged_mz(y + fa.mass, z), z);
            }
        }
        let mut seen: Vec<u8> = Vec::new();
        for residue in residues.iter().copied() {
            if seen.contains(&residue) {
                continue;
            }
            seen.push(residue);
            for mz in adduct_immonium_ions(residue) {
                let intensity = annotator.annotate(mz + fa.mass, 1);
                if intensity == 0.0 {
                    continue;
                }
                for (pos, other) in residues.iter().enumerate() {
                    if *other == residue {
                        evidence.immonium[pos] += intensity;
                    }
                }
            }
        }
    }
    evidence
}

/// Score every residue as the cross-link site.
///
/// A residue scores the summed intensity of the shifted prefix ions from it onwards
/// and of the shifted suffix ions up to it. A site is passed over when its neighbour
/// towards the terminus carries a stronger shift or lacks an unshifted ion, for ions
/// past the second residue from the terminus. Shifted immonium ions add to every
/// residue of their type.
fn site_scores(evidence: &SiteEvidence) -> Vec<f64> {
    let len = evidence.n_shifts.len();
    let mut scores = vec![0.0; len];
    for i in 0..len {
        let n_shift = evidence.n_shifts[i];
        let c_shift = evidence.c_shifts[i];
        if n_shift == 0.0 && c_shift == 0.0 {
            continue;
        }
        if n_shift > 0.0 {
            if i >= 2 && (evidence.n_shifts[i - 1] > n_shift || evidence.n_noshifts[i - 1] == 0.0) {
                continue;
            }
            scores[i] += evidence.n_shifts[i..].iter().sum::<f64>();
        }
        if c_shift > 0.0 {
            if i + 2 < len && (evidence.c_shifts[i + 1] > c_shift || evidence.c_noshifts[i + 1] == 0.0) {
                continue;
            }
            scores[i] += evidence.c_shifts[..=i].iter().sum::<f64>();
        }
    }
    for (s, im) in scores.iter_mut().zip(evidence.immonium.iter()) {
        *s += im;
    }
    scores
}

fn summarize(sequence: &str, scores: &[f64]) -> Localization {
    let best_score = scores.iter().copied().fold(0.0, f64::max);
    let mut best_localization = String::with_capacity(sequence.len());
    let mut best_position = None;
    let mut formatted = String::new();
    for (i, (c, score)) in sequence.chars().zip(scores.iter()).enumerate() {
        if i != 0 {
            formatted.push(',');
        }
        if *score > 0.0 {
            let _ = write!(formatted, "{:.2}", 100.0 * score);
        } else {
            formatted.push('0');
        }
        if best_score > 0.0 && *score >= best_score - 1e-6 {
            best_localization.push(c.to_ascii_lowercase());
            best_position = Some(i);
        } else {
            best_localization.push(c);
        }
    }
    Localization {
        best_localization,
        best_score,
        best_position,
        scores: formatted,
    }
}

/// Localize `adducts` on the peptide described by `template` and `sequence`
pub fn localize(
    spectrum: &ScoringSpectrum,
    template: &FragmentTemplate,
    sequence: &str,
    adducts: &[FragmentAdduct],
    tolerance: Tolerance,
) -> Localization {
    let evidence = collect_site_evidence(spectrum, template, sequence, adducts, tolerance);
    let scores = site_scores(&evidence);
    summarize(sequence, &scores)
}

/// Re-creates the scoring inputs of retained hits
struct PostScorer<'a> {
    context: &'a SearchContext,
}

impl PostScorer<'_> {
    fn template_for(&self, hit: &AnnotatedHit) -> Option<FragmentTemplate> {
        let mut variants = self.context.modifications.variants(hit.sequence());
        if hit.peptide_mod_index >= variants.len() {
            error!(
                "Modification index {} is out of range for {}",
                hit.peptide_mod_index,
                hit.sequence()
            );
            return None;
        }
        Some(FragmentTemplate::new(&variants.swap_remove(hit.peptide_mod_index)))
    }

    /// Expand a fast mode hit into one fully scored hit per ambiguous adduct name
    /// and feasible cross-linked nucleotide
    fn expand(&self, spectrum: &ScoringSpectrum, slot: usize, hit: AnnotatedHit, into: &mut Vec<AnnotatedHit>) {
        let Some(adduct) = self.context.adducts.get(hit.na_mod_index) else {
            error!("Adduct index {} is out of range", hit.na_mod_index);
            return;
        };
        if !adduct.is_cross_link() {
            let mut hit = hit;
            hit.score = hit.combined_score();
            into.push(hit);
            return;
        }
        let Some(template) = self.template_for(&hit) else {
            return;
        };
        let candidate = Candidate {
            peptide: &hit.peptide,
            is_decoy: hit.is_decoy,
            peptide_mod_index: hit.peptide_mod_index,
            na_mod_index: hit.na_mod_index,
            adduct,
            template: &template,
            immonium: ImmoniumFlags::from_sequence(hit.sequence()),
        };
        let entry = PrecursorEntry {
            mass: spectrum.precursor_mass(hit.isotope_error),
            slot,
            isotope: hit.isotope_error,
        };
        let scorer = HitScorer::new(self.context);
        let Some(total_loss) = scorer.score_total_loss(spectrum, &candidate) else {
            debug!("{} no longer passes the total loss filter", hit.sequence());
            return;
        };
        scorer.cross_link_hits(spectrum, &candidate, &entry, &total_loss, |scored| {
            into.extend(scored)
        });
    }

    fn localize_hit(&self, spectrum: &ScoringSpectrum, hit: &mut AnnotatedHit) {
        hit.best_localization = hit.sequence().to_string();
        hit.best_localization_score = 0.0;
        hit.best_localization_position = None;
        let Some(nucleotide) = hit.cross_linked_nucleotide else {
            return;
        };
        let Some(name) = self.context.adducts.name(hit.na_mod_index, hit.na_adduct_amb_index) else {
            error!(
                "Adduct ambiguity index {} is out of range for adduct {}",
                hit.na_adduct_amb_index, hit.na_mod_index
            );
            return;
        };
        let Some(adducts) = self
            .context
            .adducts
            .feasible(name)
            .and_then(|f| f.for_nucleotide(nucleotide))
        else {
            error!("Nucleotide {nucleotide} is not feasible for {name}");
            return;
        };
        let Some(template) = self.template_for(hit) else {
            return;
        };
        let localization = localize(
            spectrum,
            &template,
            hit.sequence(),
            adducts,
            self.context.parameters.fragment_tolerance,
        );
        hit.best_localization = localization.best_localization;
        hit.best_localization_score = localization.best_score;
        hit.best_localization_position = localization.best_position;
        hit.localization_scores = localization.scores;
    }

    fn process(&self, spectrum: &ScoringSpectrum, slot: usize, hits: &mut SpectrumHits) {
        if self.context.parameters.scoring == ScoringMode::Fast {
            for list in [&mut hits.cross_links, &mut hits.peptides] {
                let retained = std::mem::take(&mut *list);
                for hit in retained {
                    self.expand(spectrum, slot, hit, &mut *list);
                }
            }
        }
        for hit in hits.cross_links.iter_mut().chain(hits.peptides.iter_mut()) {
            self.localize_hit(spectrum, hit);
        }
        hits.finalize(self.context.parameters.top_hits);
    }
}

/// Complete the retained hits of every spectrum. `hits` must be indexed like `spectra`.
pub fn post_score(context: &SearchContext, spectra: &[ScoringSpectrum], hits: &mut [SpectrumHits]) {
    assert_eq!(spectra.len(), hits.len());
    let scorer = PostScorer { context };
    hits.par_iter_mut()
        .zip(spectra.par_iter())
        .enumerate()
        .for_each(|(slot, (hits, spectrum))| {
            if !hits.is_empty() {
                scorer.process(spectrum, slot, hits);
            }
        });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adduct::Preset;
    use crate::context::SearchParameters;
    use crate::digest::Protein;
    use crate::peptide::ModificationSet;
    use crate::preprocess::PrecursorIndex;
    use crate::search::CandidateSearch;
    use crate::mass::mass_charge_ratio;
    use crate::testing::{crosslinked_spectrum, linear_spectrum};

    fn u_adducts(ctx: &SearchContext) -> Vec<FragmentAdduct> {
        ctx.adducts.feasible("U").unwrap().for_nucleotide('U').unwrap().to_vec()
    }

    fn context(scoring: ScoringMode) -> SearchContext {
        let params = SearchParameters {
            scoring,
            ..Default::default()
        };
        SearchContext::from_preset(params, Preset::RnaUvU, ModificationSet::default()).unwrap()
    }

    #[test]
    fn test_localize() {
        let ctx = context(ScoringMode::Slow);
        let variant = ctx.modifications.variants("SAMPLER").remove(0);
        let template = FragmentTemplate::new(&variant);
        let adducts = u_adducts(&ctx);
        let fa = adducts.iter().find(|fa| fa.name == "U").unwrap();
        let spectrum = crosslinked_spectrum(&template, 3, fa, 2);
        let loc = localize(&spectrum, &template, "SAMPLER", &adducts, Tolerance::PPM(20.0));
        assert_eq!(loc.best_localization, "SAMpLER");
        assert_eq!(loc.best_position, Some(3));
        assert!(loc.best_score > 0.0);
        assert_eq!(loc.scores.split(',').count(), 7);
        assert!(loc.scores.starts_with("0,0,0,"));
    }

    #[test]
    fn test_summarize_without_evidence() {
        let loc = summarize("PEPTIDE", &[0.0; 7]);
        assert_eq!(loc.best_localization, "PEPTIDE");
        assert_eq!(loc.best_position, None);
        assert_eq!(loc.scores, "0,0,0,0,0,0,0");
    }

    #[test_log::test]
    fn test_fast_and_slow_agree() {
        let proteins = vec![Protein::new("sp|P1|TEST".into(), "MKSAMPLERGGHHWK")];
        let mut results = Vec::new();
        for scoring in [ScoringMode::Fast, ScoringMode::Slow] {
            let ctx = context(scoring);
            let variant = ctx.modifications.variants("SAMPLER").remove(0);
            let template = FragmentTemplate::new(&variant);
            let adducts = u_adducts(&ctx);
            let fa = adducts.iter().find(|fa| fa.name == "U").unwrap();
            let spectra = vec![crosslinked_spectrum(&template, 3, fa, 2)];
            let index = PrecursorIndex::build(&spectra, &ctx.parameters);
            let search = CandidateSearch::new(&ctx, &spectra, &index);
            search.search(&proteins);
            let mut hits = search.into_hits();
            post_score(&ctx, &spectra, &mut hits);
            let best = hits[0].cross_links[0].clone();
            assert_eq!(best.cross_linked_nucleotide, Some('U'));
            assert_eq!(best.best_localization, "SAMpLER");
            results.push(best);
        }
        assert!((results[0].score - results[1].score).abs() < 1e-9);
        assert_eq!(results[0].tags, results[1].tags);
    }

    #[test_log::test]
    fn test_partial_loss_filter_in_both_modes() {
        let proteins = vec![Protein::new("sp|P1|TEST".into(), "MKSAMPLERGGHHWK")];
        for filter_bad_partial_loss in [false, true] {
            for scoring in [ScoringMode::Fast, ScoringMode::Slow] {
                let params = SearchParameters {
                    scoring,
                    filter_bad_partial_loss,
                    ..Default::default()
                };
                let ctx = SearchContext::from_preset(params, Preset::RnaUvU, ModificationSet::default())
                    .unwrap();
                let variant = ctx.modifications.variants("SAMPLER").remove(0);
                let template = FragmentTemplate::new(&variant);
                let u = ctx
                    .adducts
                    .adducts
                    .iter()
                    .find(|a| a.names == vec!["U".to_string()])
                    .unwrap();
                // only unshifted ions support the cross-link
                let mut spectrum = linear_spectrum(&template, 2);
                spectrum.precursor_mz = mass_charge_ratio(template.peptide_mass + u.mass, 2);
                let spectra = vec![spectrum];

                let index = PrecursorIndex::build(&spectra, &ctx.parameters);
                let search = CandidateSearch::new(&ctx, &spectra, &index);
                search.search(&proteins);
                let mut hits = search.into_hits();
                post_score(&ctx, &spectra, &mut hits);
                assert_eq!(
                    hits[0].cross_links.is_empty(),
                    filter_bad_partial_loss,
                    "{scoring} with filter {filter_bad_partial_loss}: {:?}",
                    hits[0].cross_links
                );
            }
        }
    }
}
