//! The immutable state shared by every worker during a search.
use std::fmt::Display;
use std::ops::Range;
use std::str::FromStr;

use mzpeaks::Tolerance;
use tracing::{debug, info};

use crate::adduct::{AdductTable, AmbiguityIndex, ChainOptions, NucleotideChemistry, Preset};
use crate::digest::Protease;
use crate::error::CrossLinkError;
use crate::odds::MassErrorScorer;
use crate::peptide::ModificationSet;
use crate::spectrum::max_distance;

/// How adduct-shifted ions are handled during the candidate search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScoringMode {
    /// Score only unshifted ions while searching and expand the retained hits
    /// per cross-linked nucleotide afterwards
    Fast,
    /// Score every feasible cross-linked nucleotide while searching
    #[default]
    Slow,
}

impl FromStr for ScoringMode {
    type Err = CrossLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "slow" | "all" => Ok(Self::Slow),
            _ => Err(CrossLinkError::InvalidParameter(
                "scoring".into(),
                format!("unknown scoring mode {s:?}"),
            )),
        }
    }
}

impl Display for ScoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringMode::Fast => write!(f, "fast"),
            ScoringMode::Slow => write!(f, "slow"),
        }
    }
}

/// Search and scoring parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParameters {
    pub precursor_tolerance: Tolerance,
    pub fragment_tolerance: Tolerance,
    pub min_precursor_charge: i32,
    pub max_precursor_charge: i32,
    /// Precursor isotope errors to consider, e.g. `[0, -1]`
    pub isotopes: Vec<i32>,
    pub top_hits: usize,
    pub scoring: ScoringMode,
    pub marker_ion_tolerance_factor: f64,
    /// Discard cross-link candidates without a ladder spanning the cross-link site
    pub require_xl_tag: bool,
    pub filter_bad_partial_loss: bool,
    pub filter_fractional_mass: bool,
    /// Spectra with a smaller neutral precursor mass are not searched
    pub filter_small_peptide_mass: f64,
    pub enzyme: Protease,
    pub missed_cleavages: usize,
    pub peptide_min_size: usize,
    pub peptide_max_size: usize,
    /// The longest nucleotide chain searched as a precursor adduct
    pub nucleotide_length: usize,
    /// Restrict nucleotide chains to those occurring in this sequence
    pub restrict_sequence: Option<String>,
    /// Replaces the cross-linkable nucleotides of the chemistry
    pub can_cross_link: Option<String>,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            precursor_tolerance: Tolerance::PPM(6.0),
            fragment_tolerance: Tolerance::PPM(20.0),
            min_precursor_charge: 2,
            max_precursor_charge: 5,
            isotopes: vec![0],
            top_hits: 1,
            scoring: ScoringMode::Slow,
            marker_ion_tolerance_factor: 2.0,
            require_xl_tag: false,
            filter_bad_partial_loss: false,
            filter_fractional_mass: false,
            filter_small_peptide_mass: 600.0,
            enzyme: Protease::TrypsinP,
            missed_cleavages: 2,
            peptide_min_size: 6,
            peptide_max_size: 30,
            nucleotide_length: 2,
            restrict_sequence: None,
            can_cross_link: None,
        }
    }
}

fn tolerance_value(tolerance: Tolerance) -> f64 {
    match tolerance {
        Tolerance::PPM(v) | Tolerance::Da(v) => v,
    }
}

fn scale_tolerance(tolerance: Tolerance, factor: f64) -> Tolerance {
    match tolerance {
        Tolerance::PPM(v) => Tolerance::PPM(v * factor),
        Tolerance::Da(v) => Tolerance::Da(v * factor),
    }
}

impl SearchParameters {
    /// Reject inconsistent settings before any work starts
    pub fn validate(&self) -> Result<(), CrossLinkError> {
        if self.min_precursor_charge < 1 || self.min_precursor_charge > self.max_precursor_charge {
            return Err(CrossLinkError::InvalidParameter(
                "precursor charge".into(),
                format!(
                    "the charge range {}..={} is empty",
                    self.min_precursor_charge, self.max_precursor_charge
                ),
            ));
        }
        if self.top_hits == 0 {
            return Err(CrossLinkError::InvalidParameter(
                "top_hits".into(),
                "at least one hit per spectrum must be reported".into(),
            ));
        }
        if self.peptide_min_size < 2 || self.peptide_min_size > self.peptide_max_size {
            return Err(CrossLinkError::InvalidParameter(
                "peptide size".into(),
                format!(
                    "the length range {}..={} is not usable",
                    self.peptide_min_size, self.peptide_max_size
                ),
            ));
        }
        if self.isotopes.is_empty() {
            return Err(CrossLinkError::InvalidParameter(
                "isotopes".into(),
                "at least one isotope must be given".into(),
            ));
        }
        for (name, tol) in [
            ("precursor_tolerance", self.precursor_tolerance),
            ("fragment_tolerance", self.fragment_tolerance),
        ] {
            let v = tolerance_value(tol);
            if !(v.is_finite() && v > 0.0) {
                return Err(CrossLinkError::InvalidParameter(
                    name.into(),
                    format!("{v} must be positive"),
                ));
            }
        }
        Ok(())
    }

    pub fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            max_length: self.nucleotide_length,
            sequence: self
                .restrict_sequence
                .as_ref()
                .filter(|s| !s.is_empty())
                .cloned(),
        }
    }

    pub fn peptide_length_range(&self) -> Range<usize> {
        self.peptide_min_size..(self.peptide_max_size + 1)
    }

    /// The neutral mass window that matches a candidate of `mass`
    pub fn precursor_mass_window(&self, mass: f64) -> Range<f64> {
        let d = max_distance(mass, self.precursor_tolerance);
        (mass - d)..(mass + d)
    }

    pub fn marker_ion_tolerance(&self) -> Tolerance {
        scale_tolerance(self.fragment_tolerance, self.marker_ion_tolerance_factor)
    }

    /// The precursor tolerance in ppm for the mass error score. Da tolerances are
    /// converted at 1000 Da.
    pub fn precursor_tolerance_ppm(&self) -> f64 {
        match self.precursor_tolerance {
            Tolerance::PPM(v) => v,
            Tolerance::Da(v) => v / 1000.0 * 1e6,
        }
    }
}

/// Everything a search needs that does not change per spectrum or per peptide
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub parameters: SearchParameters,
    pub chemistry: NucleotideChemistry,
    pub adducts: AdductTable,
    pub ambiguity: AmbiguityIndex,
    pub modifications: ModificationSet,
    pub mass_error: MassErrorScorer,
}

impl SearchContext {
    pub fn new(
        parameters: SearchParameters,
        mut chemistry: NucleotideChemistry,
        modifications: ModificationSet,
    ) -> Result<Self, CrossLinkError> {
        parameters.validate()?;
        if let Some(can_cross_link) = parameters.can_cross_link.as_deref() {
            if let Some(c) = can_cross_link
                .chars()
                .find(|c| !chemistry.nucleotides.contains_key(c))
            {
                return Err(CrossLinkError::UnknownNucleotide(c, can_cross_link.to_string()));
            }
            chemistry.can_cross_link = can_cross_link.chars().collect();
        }
        let adducts = AdductTable::from_chemistry(&chemistry, &parameters.chain_options())?;
        let fragment_tolerance = parameters.fragment_tolerance;
        let ambiguity = AmbiguityIndex::new(&chemistry, |m| max_distance(m, fragment_tolerance));
        let mass_error = MassErrorScorer::new(parameters.precursor_tolerance_ppm());
        info!(
            "{} precursor adducts from {} modification definitions, {} ambiguous fragment adducts",
            adducts.len(),
            chemistry.modifications.len(),
            ambiguity.blocked_masses.len()
        );
        for adduct in adducts.adducts.iter() {
            debug!("{} {:0.4} {:?}", adduct.key, adduct.mass, adduct.names);
        }
        Ok(Self {
            parameters,
            chemistry,
            adducts,
            ambiguity,
            modifications,
            mass_error,
        })
    }

    pub fn from_preset(
        parameters: SearchParameters,
        preset: Preset,
        modifications: ModificationSet,
    ) -> Result<Self, CrossLinkError> {
        Self::new(parameters, preset.chemistry()?, modifications)
    }

    pub fn fragment_tolerance_value(&self) -> f64 {
        tolerance_value(self.parameters.fragment_tolerance)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        let mut params = SearchParameters::default();
        assert!(params.validate().is_ok());
        params.min_precursor_charge = 6;
        assert!(params.validate().is_err());
        let params = SearchParameters {
            top_hits: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_windows() {
        let params = SearchParameters::default();
        let w = params.precursor_mass_window(1000.0);
        assert!((w.start - 999.994).abs() < 1e-9);
        assert!((w.end - 1000.006).abs() < 1e-9);
        assert!(matches!(params.marker_ion_tolerance(), Tolerance::PPM(v) if (v - 40.0).abs() < 1e-9));
        assert_eq!(params.peptide_length_range(), 6..31);
    }

    #[test_log::test]
    fn test_context() {
        let ctx = SearchContext::from_preset(
            SearchParameters::default(),
            Preset::RnaUvU,
            ModificationSet::default(),
        )
        .unwrap();
        assert!(ctx.adducts.len() > 1);
        assert!(!ctx.ambiguity.tag_to_adducts.is_empty());
        assert!(ctx.adducts.feasible("UU-H2O").is_some());
        assert_eq!("fast".parse::<ScoringMode>().unwrap(), ScoringMode::Fast);
    }

    #[test]
    fn test_can_cross_link_override() {
        let params = SearchParameters {
            can_cross_link: Some("UC".to_string()),
            nucleotide_length: 1,
            ..Default::default()
        };
        let ctx = SearchContext::from_preset(params, Preset::RnaUvU, ModificationSet::default())
            .unwrap();
        assert_eq!(ctx.chemistry.can_cross_link, std::collections::BTreeSet::from(['C', 'U']));
        let c = ctx.adducts.feasible("C").unwrap();
        assert_eq!(c.per_nucleotide[0].nucleotide, 'C');

        let params = SearchParameters {
            can_cross_link: Some("UX".to_string()),
            ..Default::default()
        };
        assert!(SearchContext::from_preset(params, Preset::RnaUvU, ModificationSet::default())
            .is_err());
    }
}
