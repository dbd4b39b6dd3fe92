//! Scoring and searching of peptide-nucleic acid cross-link tandem mass spectra.
//!
//! Spectra are preprocessed into [`ScoringSpectrum`]s and indexed by precursor mass,
//! every peptide of a digested protein database is scored against the spectra its
//! mass (plus each nucleotide adduct) can explain with [`CandidateSearch`], and the
//! surviving hits are completed and localized by [`post_score`].
pub mod adduct;
pub mod context;
pub mod deisotope;
pub mod digest;
pub mod error;
pub mod fragments;
pub mod hit;
pub mod isolation;
pub mod ladder;
pub mod mass;
pub mod matcher;
pub mod odds;
pub mod peptide;
pub mod postscore;
pub mod preprocess;
pub mod score;
pub mod search;
pub mod spectrum;
pub mod tagger;

#[cfg(test)]
pub(crate) mod testing;

pub use adduct::{AdductTable, ChainOptions, NucleotideChemistry, Preset};
pub use context::{ScoringMode, SearchContext, SearchParameters};
pub use digest::{add_decoys, read_fasta, Protease, Protein};
pub use error::CrossLinkError;
pub use hit::{AnnotatedHit, SpectrumHits};
pub use isolation::InterferenceEstimator;
pub use peptide::ModificationSet;
pub use postscore::post_score;
pub use preprocess::{PrecursorIndex, PreprocessingParams, SpectrumPreprocessor};
pub use search::{CandidateSearch, SearchSummary};
pub use spectrum::ScoringSpectrum;

#[cfg(test)]
mod test {
    use super::*;
    use crate::fragments::FragmentTemplate;
    use crate::testing::crosslinked_spectrum;

    #[test_log::test]
    fn test_end_to_end() {
        let params = SearchParameters::default();
        let ctx = SearchContext::from_preset(params, Preset::RnaUvU, ModificationSet::default()).unwrap();
        let mut proteins = vec![Protein::new("sp|P1|TEST".into(), "MKSAMPLERGGHHWK")];
        add_decoys(&mut proteins, ctx.parameters.enzyme, 1);

        let variant = ctx.modifications.variants("SAMPLER").remove(0);
        let template = FragmentTemplate::new(&variant);
        let fa = ctx.adducts.feasible("U").unwrap().for_nucleotide('U').unwrap()
            .iter()
            .find(|fa| fa.name == "U")
            .unwrap()
            .clone();
        let spectra = vec![crosslinked_spectrum(&template, 3, &fa, 2)];

        let preprocessor = SpectrumPreprocessor::default();
        let spectra = preprocessor.process_all(spectra, &ctx.ambiguity);
        assert_eq!(spectra.len(), 1);

        let index = PrecursorIndex::build(&spectra, &ctx.parameters);
        let search = CandidateSearch::new(&ctx, &spectra, &index);
        search.search(&proteins);
        let mut hits = search.into_hits();
        post_score(&ctx, &spectra, &mut hits);

        let best = &hits[0].cross_links[0];
        assert_eq!(best.sequence(), "SAMPLER");
        assert_eq!(best.cross_linked_nucleotide, Some('U'));
        assert!(best.score > 0.0);
        assert!(hits[0].cross_links.len() <= ctx.parameters.top_hits);
        assert!(hits[0].peptides.len() <= ctx.parameters.top_hits);
    }
}
