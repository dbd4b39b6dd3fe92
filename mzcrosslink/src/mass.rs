//! Mass constants, residue masses and elemental formula helpers.
//!
//! Residue masses are stored as monoisotopic *internal* masses, the mass a residue
//! contributes when embedded in a peptide chain.
use chemical_elements::{ChemicalComposition, PROTON as _PROTON};

use crate::error::CrossLinkError;

pub const PROTON: f64 = _PROTON;
pub const H2O: f64 = 18.010564684;
pub const NH3: f64 = 17.026549101;
pub const CO: f64 = 27.994914620;
pub const CH4S: f64 = 48.003371;
pub const C13C12_MASSDIFF: f64 = 1.0033548378;

/// The water loss tracked when blocking neutral loss peaks on fragment ladders
pub(crate) const FRAGMENT_WATER_LOSS: f64 = 18.010565;
/// The ammonia loss tracked when blocking neutral loss peaks on fragment ladders
pub(crate) const FRAGMENT_AMMONIA_LOSS: f64 = 17.026549;

pub(crate) const PRECURSOR_LOSSES: [f64; 3] = [0.0, -18.010565, -17.026548];

const RESIDUE_MASSES: [(u8, f64); 22] = [
    (b'G', 57.021463721),
    (b'A', 71.037113805),
    (b'S', 87.032028435),
    (b'P', 97.052763875),
    (b'V', 99.068413945),
    (b'T', 101.047678505),
    (b'C', 103.009184505),
    (b'L', 113.084064015),
    (b'I', 113.084064015),
    (b'N', 114.042927470),
    (b'D', 115.026943065),
    (b'Q', 128.058577540),
    (b'K', 128.094963050),
    (b'E', 129.042593135),
    (b'M', 131.040484645),
    (b'H', 137.058911875),
    (b'F', 147.068413945),
    (b'U', 150.953633405),
    (b'R', 156.101111050),
    (b'Y', 163.063328575),
    (b'W', 186.079312980),
    (b'O', 237.147726925),
];

/// The monoisotopic internal mass of a residue, if it is known
pub fn residue_mass(residue: u8) -> Option<f64> {
    RESIDUE_MASSES
        .iter()
        .find(|(r, _)| *r == residue)
        .map(|(_, m)| *m)
}

/// The nineteen canonical residues used for de novo tagging, leaving out `I`
/// which cannot be told apart from `L` by mass.
pub fn natural19_without_isoleucine() -> Vec<(char, f64)> {
    RESIDUE_MASSES
        .iter()
        .filter(|(r, _)| !matches!(*r, b'I' | b'U' | b'O'))
        .map(|(r, m)| (*r as char, *m))
        .collect()
}

/// The neutral monoisotopic mass of an unmodified peptide sequence
pub fn peptide_mass(sequence: &str) -> Option<f64> {
    sequence
        .bytes()
        .map(residue_mass)
        .sum::<Option<f64>>()
        .map(|m| m + H2O)
}

#[inline]
pub fn mass_charge_ratio(neutral_mass: f64, charge: i32) -> f64 {
    (neutral_mass + charge as f64 * PROTON) / charge as f64
}

#[inline]
pub fn ppm_error(theoretical: f64, observed: f64) -> f64 {
    (observed - theoretical) / theoretical * 1e6
}

/// An elemental formula. Counts may go negative while composing adducts and losses.
pub type Formula = ChemicalComposition<'static>;

/// Parse a formula like `C9H13N2O9P`, or a sum of signed terms like
/// `C9H13N2O9P-H2O+NH3`. An empty string is the empty formula.
pub fn parse_formula(text: &str) -> Result<Formula, CrossLinkError> {
    let invalid = || CrossLinkError::FormulaParse(text.to_string());
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    let mut terms: Vec<(i32, &str)> = Vec::new();
    let mut sign = 1;
    let mut start = 0;
    for (i, c) in compact.char_indices() {
        if c == '+' || c == '-' {
            terms.push((sign, &compact[start..i]));
            sign = if c == '+' { 1 } else { -1 };
            start = i + 1;
        }
    }
    terms.push((sign, &compact[start..]));

    let mut formula = Formula::new();
    for (sign, term) in terms {
        if term.is_empty() {
            continue;
        }
        if !term.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        let part: Formula = term.parse().map_err(|_| invalid())?;
        formula = if sign > 0 {
            &formula + &part
        } else {
            &formula - &part
        };
    }
    Ok(formula)
}

/// Formula bookkeeping used to build adduct tables
pub trait FormulaExt {
    /// No element has a negative count
    fn is_valid(&self) -> bool;

    /// Every element count is zero
    fn has_no_atoms(&self) -> bool;

    /// Every element count of `self` is at most the count in `other`
    fn is_subset_of(&self, other: &Self) -> bool;

    /// The formula in Hill order, carbon and hydrogen first and then alphabetically,
    /// leaving out elements with a zero count
    fn hill_formula(&self) -> String;
}

impl FormulaExt for ChemicalComposition<'_> {
    fn is_valid(&self) -> bool {
        self.iter().all(|(_, count)| *count >= 0)
    }

    fn has_no_atoms(&self) -> bool {
        self.iter().all(|(_, count)| *count == 0)
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        (other - self).is_valid()
    }

    fn hill_formula(&self) -> String {
        let mut counts: Vec<(String, i32)> = self
            .iter()
            .filter(|(_, count)| **count != 0)
            .map(|(element, count)| (element.to_string(), *count))
            .collect();
        let has_carbon = counts.iter().any(|(symbol, _)| symbol == "C");
        let hill_rank = |symbol: &str| match symbol {
            "C" if has_carbon => 0,
            "H" if has_carbon => 1,
            _ => 2,
        };
        counts.sort_by(|(a, _), (b, _)| hill_rank(a).cmp(&hill_rank(b)).then_with(|| a.cmp(b)));
        counts
            .into_iter()
            .map(|(symbol, count)| {
                if count == 1 {
                    symbol
                } else {
                    format!("{symbol}{count}")
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_formula() {
        let f = parse_formula("C9H13N2O9P").unwrap();
        assert_eq!(f.hill_formula(), "C9H13N2O9P");

        let g = parse_formula("C9H13N2O9P-H2O").unwrap();
        assert_eq!(g.hill_formula(), "C9H11N2O8P");
        assert!(g.is_subset_of(&f));
        assert!(!f.is_subset_of(&g));

        let h = parse_formula("-H2O").unwrap();
        assert!(!h.is_valid());
        assert!(parse_formula("").unwrap().has_no_atoms());
        assert!(parse_formula("H2O-H2O").unwrap().has_no_atoms());

        assert!(parse_formula("C9H1!").is_err());
    }

    #[test]
    fn test_formula_mass() {
        let water = parse_formula("H2O").unwrap();
        let mass = water.mass();
        assert!((mass - H2O).abs() < 1e-5, "{mass}");
        let uracil_mp = parse_formula("C9H13N2O9P").unwrap();
        let mass = uracil_mp.mass();
        assert!((mass - 324.035867).abs() < 1e-4, "{mass}");
    }

    #[test]
    fn test_ambiguous_formulae() {
        let u_h2o = parse_formula("C9H13N2O9P-H2O").unwrap();
        let c_nh3 = parse_formula("C9H14N3O8P-NH3").unwrap();
        assert_eq!(u_h2o.hill_formula(), c_nh3.hill_formula());
    }

    #[test]
    fn test_peptide_mass() {
        let mass = peptide_mass("PEPTIDE").unwrap();
        assert!((mass - 799.359964).abs() < 1e-4, "{mass}");
        assert!(peptide_mass("PEPXIDE").is_none());
    }
}
