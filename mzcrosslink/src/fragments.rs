//! Theoretical fragment ion ladders.
//!
//! Every ladder has one entry per backbone bond, `peptide.len() - 1` entries,
//! holding the singly protonated ion mass.
use crate::mass::{H2O, PROTON};
use crate::peptide::ModifiedPeptide;

/// The mass offset from a b-ion to the corresponding a-ion
pub const A_ION_OFFSET: f64 = -27.994915;

/// The singly protonated b-ion ladder. Entry `i` covers residues `0..=i`.
pub fn b_ion_ladder(peptide: &ModifiedPeptide) -> Vec<f64> {
    let n = peptide.len();
    let mut ladder = Vec::with_capacity(n.saturating_sub(1));
    let mut mass = PROTON + peptide.n_term_mass;
    for r in peptide.residue_masses.iter().take(n.saturating_sub(1)) {
        mass += r;
        ladder.push(mass);
    }
    ladder
}

/// The singly protonated y-ion ladder. Entry `i` covers the last `i + 1` residues,
/// so the ion breaking bond `k` is found at `n - 2 - k`.
pub fn y_ion_ladder(peptide: &ModifiedPeptide) -> Vec<f64> {
    let n = peptide.len();
    let mut ladder = Vec::with_capacity(n.saturating_sub(1));
    let mut mass = PROTON + H2O;
    for r in peptide.residue_masses.iter().skip(1).rev() {
        mass += r;
        ladder.push(mass);
    }
    ladder
}

/// The singly protonated a-ion ladder
pub fn a_ion_ladder(peptide: &ModifiedPeptide) -> Vec<f64> {
    b_ion_ladder(peptide).into_iter().map(|m| m + A_ION_OFFSET).collect()
}

/// The m/z of a singly protonated ion mass carrying `charge` protons
#[inline]
pub fn charged_mz(singly_protonated: f64, charge: i32) -> f64 {
    (singly_protonated + (charge - 1) as f64 * PROTON) / charge as f64
}

/// The b- and y-ion ladders of one peptide, computed once and reused for
/// every spectrum and adduct the peptide is scored against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentTemplate {
    pub b_ions: Vec<f64>,
    pub y_ions: Vec<f64>,
    /// The neutral peptide mass without any nucleotide adduct
    pub peptide_mass: f64,
}

impl FragmentTemplate {
    pub fn new(peptide: &ModifiedPeptide) -> Self {
        let b_ions = b_ion_ladder(peptide);
        let y_ions = y_ion_ladder(peptide);
        debug_assert_eq!(b_ions.len(), y_ions.len());
        Self {
            b_ions,
            y_ions,
            peptide_mass: peptide.mass,
        }
    }

    /// The number of backbone bonds
    pub fn len(&self) -> usize {
        self.b_ions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.b_ions.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peptide::ModificationSet;

    fn peptide(seq: &str) -> ModifiedPeptide {
        ModificationSet::default().variants(seq).remove(0)
    }

    #[test]
    fn test_ladders() {
        let pep = peptide("PEPTIDE");
        let b = b_ion_ladder(&pep);
        let y = y_ion_ladder(&pep);
        assert_eq!(b.len(), 6);
        assert_eq!(y.len(), 6);
        // b2 of PEPTIDE
        assert!((b[1] - 227.102635).abs() < 1e-4, "{}", b[1]);
        // y1 of PEPTIDE
        assert!((y[0] - 148.060434).abs() < 1e-4, "{}", y[0]);
        // complementary ions sum to the precursor plus two protons
        for k in 0..b.len() {
            let total = b[k] + y[b.len() - 1 - k];
            assert!((total - (pep.mass + 2.0 * PROTON)).abs() < 1e-6);
        }
        let a = a_ion_ladder(&pep);
        assert!((b[0] - a[0] - 27.994915).abs() < 1e-5);
    }

    #[test]
    fn test_charged_mz() {
        assert!((charged_mz(1001.0, 1) - 1001.0).abs() < 1e-12);
        assert!((charged_mz(1001.0, 2) - (1001.0 + PROTON) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_n_terminal_modification() {
        let mods = ModificationSet::from_names(&["Acetyl (N-term)"], &[] as &[&str], 0).unwrap();
        let pep = mods.variants("PEPTIDE").remove(0);
        let plain = peptide("PEPTIDE");
        let b = b_ion_ladder(&pep);
        let b0 = b_ion_ladder(&plain);
        assert!((b[0] - b0[0] - 42.010565).abs() < 1e-6);
        assert_eq!(y_ion_ladder(&pep), y_ion_ladder(&plain));
    }
}
