//! Peptide modifications and the modified variants of a peptide sequence.
use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

use itertools::Itertools;

use crate::error::CrossLinkError;
use crate::mass::{residue_mass, H2O};

/// Where a modification may be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModificationTarget {
    Residue(u8),
    PeptideNTerm,
}

/// A named mass shift with a single placement rule
#[derive(Debug, Clone, PartialEq)]
pub struct Modification {
    pub name: String,
    pub mass_shift: f64,
    pub target: ModificationTarget,
}

const KNOWN_MODIFICATIONS: &[(&str, f64, ModificationTarget)] = &[
    ("Oxidation (M)", 15.994915, ModificationTarget::Residue(b'M')),
    ("Carbamidomethyl (C)", 57.021464, ModificationTarget::Residue(b'C')),
    ("Phospho (S)", 79.966331, ModificationTarget::Residue(b'S')),
    ("Phospho (T)", 79.966331, ModificationTarget::Residue(b'T')),
    ("Phospho (Y)", 79.966331, ModificationTarget::Residue(b'Y')),
    ("Deamidated (N)", 0.984016, ModificationTarget::Residue(b'N')),
    ("Deamidated (Q)", 0.984016, ModificationTarget::Residue(b'Q')),
    ("Acetyl (N-term)", 42.010565, ModificationTarget::PeptideNTerm),
];

impl Modification {
    /// The short name used when writing modified sequences
    pub fn short_name(&self) -> &str {
        self.name
            .split_once(' ')
            .map(|(head, _)| head)
            .unwrap_or(&self.name)
    }
}

impl FromStr for Modification {
    type Err = CrossLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KNOWN_MODIFICATIONS
            .iter()
            .find(|(name, _, _)| *name == s.trim())
            .map(|(name, shift, target)| Modification {
                name: name.to_string(),
                mass_shift: *shift,
                target: *target,
            })
            .ok_or_else(|| CrossLinkError::UnknownModification(s.to_string()))
    }
}

/// A fully modified peptide, expressed as per-residue internal masses
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedPeptide {
    /// The unmodified one-letter sequence
    pub sequence: String,
    /// Internal residue masses with any residue modifications folded in
    pub residue_masses: Vec<f64>,
    /// The N-terminal modification mass, if any
    pub n_term_mass: f64,
    /// The neutral monoisotopic mass of the peptide
    pub mass: f64,
    /// Modification name for each residue, `None` where unmodified
    pub residue_modifications: Vec<Option<String>>,
    pub n_term_modification: Option<String>,
}

impl ModifiedPeptide {
    pub fn len(&self) -> usize {
        self.residue_masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residue_masses.is_empty()
    }

    pub fn has_residue(&self, residue: u8) -> bool {
        self.sequence.as_bytes().contains(&residue)
    }
}

impl Display for ModifiedPeptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(m) = self.n_term_modification.as_ref() {
            write!(f, ".({m})")?;
        }
        for (aa, m) in self.sequence.chars().zip(self.residue_modifications.iter()) {
            write!(f, "{aa}")?;
            if let Some(m) = m {
                write!(f, "({m})")?;
            }
        }
        Ok(())
    }
}

/// The configured fixed and variable modifications.
///
/// Enumerating the variants of a sequence is deterministic so an index into
/// [`ModificationSet::variants`] identifies the same variant on every call.
#[derive(Debug, Clone, Default)]
pub struct ModificationSet {
    pub fixed: Vec<Modification>,
    pub variable: Vec<Modification>,
    pub max_variable_mods: usize,
}

impl ModificationSet {
    pub fn new(
        fixed: Vec<Modification>,
        variable: Vec<Modification>,
        max_variable_mods: usize,
    ) -> Result<Self, CrossLinkError> {
        let mut seen = HashSet::new();
        for m in fixed.iter() {
            if !seen.insert(m.name.clone()) {
                return Err(CrossLinkError::DuplicateModification(m.name.clone()));
            }
        }
        let mut seen_variable = HashSet::new();
        for m in variable.iter() {
            if !seen_variable.insert(m.name.clone()) {
                return Err(CrossLinkError::DuplicateModification(m.name.clone()));
            }
            if seen.contains(&m.name) {
                return Err(CrossLinkError::FixedAndVariableModification(m.name.clone()));
            }
        }
        Ok(Self {
            fixed,
            variable,
            max_variable_mods,
        })
    }

    /// Parse modification names, rejecting unknown or repeated names
    pub fn from_names<S: AsRef<str>>(
        fixed: &[S],
        variable: &[S],
        max_variable_mods: usize,
    ) -> Result<Self, CrossLinkError> {
        let fixed = fixed
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<Modification>, _>>()?;
        let variable = variable
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<Modification>, _>>()?;
        Self::new(fixed, variable, max_variable_mods)
    }

    fn apply_fixed(&self, sequence: &str) -> Option<ModifiedPeptide> {
        let mut residue_masses = Vec::with_capacity(sequence.len());
        let mut residue_modifications = vec![None; sequence.len()];
        for aa in sequence.bytes() {
            residue_masses.push(residue_mass(aa)?);
        }
        let mut n_term_mass = 0.0;
        let mut n_term_modification = None;
        for m in self.fixed.iter() {
            match m.target {
                ModificationTarget::Residue(r) => {
                    for (i, aa) in sequence.bytes().enumerate() {
                        if aa == r && residue_modifications[i].is_none() {
                            residue_masses[i] += m.mass_shift;
                            residue_modifications[i] = Some(m.short_name().to_string());
                        }
                    }
                }
                ModificationTarget::PeptideNTerm => {
                    if n_term_modification.is_none() {
                        n_term_mass += m.mass_shift;
                        n_term_modification = Some(m.short_name().to_string());
                    }
                }
            }
        }
        let mass = residue_masses.iter().sum::<f64>() + n_term_mass + H2O;
        Some(ModifiedPeptide {
            sequence: sequence.to_string(),
            residue_masses,
            n_term_mass,
            mass,
            residue_modifications,
            n_term_modification,
        })
    }

    /// Enumerate every modified variant of `sequence`, the variant without
    /// variable modifications first.
    ///
    /// Returns an empty list if the sequence contains an unknown residue.
    pub fn variants(&self, sequence: &str) -> Vec<ModifiedPeptide> {
        let Some(base) = self.apply_fixed(sequence) else {
            return Vec::new();
        };

        let mut sites: Vec<(Option<usize>, &Modification)> = Vec::new();
        for m in self.variable.iter() {
            match m.target {
                ModificationTarget::Residue(r) => {
                    for (i, aa) in sequence.bytes().enumerate() {
                        if aa == r && base.residue_modifications[i].is_none() {
                            sites.push((Some(i), m));
                        }
                    }
                }
                ModificationTarget::PeptideNTerm => {
                    if base.n_term_modification.is_none() {
                        sites.push((None, m));
                    }
                }
            }
        }

        let mut variants = vec![base.clone()];
        for n_mods in 1..=self.max_variable_mods.min(sites.len()) {
            for chosen in (0..sites.len()).combinations(n_mods) {
                let positions: HashSet<Option<usize>> = chosen.iter().map(|c| sites[*c].0).collect();
                if positions.len() != chosen.len() {
                    continue;
                }
                let mut variant = base.clone();
                for c in chosen {
                    let (position, m) = sites[c];
                    match position {
                        Some(i) => {
                            variant.residue_masses[i] += m.mass_shift;
                            variant.residue_modifications[i] = Some(m.short_name().to_string());
                        }
                        None => {
                            variant.n_term_mass += m.mass_shift;
                            variant.n_term_modification = Some(m.short_name().to_string());
                        }
                    }
                    variant.mass += m.mass_shift;
                }
                variants.push(variant);
            }
        }
        variants
    }
}

/// Which immonium ions a sequence can produce
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImmoniumFlags {
    pub y: bool,
    pub w: bool,
    pub f: bool,
    pub h: bool,
    pub c: bool,
    pub p: bool,
    pub l: bool,
    pub k: bool,
    pub m: bool,
    pub q: bool,
    pub e: bool,
}

impl ImmoniumFlags {
    pub fn from_sequence(sequence: &str) -> Self {
        let mut flags = Self::default();
        for aa in sequence.bytes() {
            match aa {
                b'Y' => flags.y = true,
                b'W' => flags.w = true,
                b'F' => flags.f = true,
                b'H' => flags.h = true,
                b'C' => flags.c = true,
                b'P' => flags.p = true,
                b'L' | b'I' => flags.l = true,
                b'K' => flags.k = true,
                b'M' => flags.m = true,
                b'Q' => flags.q = true,
                b'E' => flags.e = true,
                _ => {}
            }
        }
        flags
    }

    /// The residues with a possible immonium ion, in scoring order
    pub fn residues(&self) -> impl Iterator<Item = u8> {
        [
            (self.y, b'Y'),
            (self.w, b'W'),
            (self.f, b'F'),
            (self.h, b'H'),
            (self.c, b'C'),
            (self.p, b'P'),
            (self.l, b'L'),
            (self.k, b'K'),
            (self.m, b'M'),
            (self.q, b'Q'),
            (self.e, b'E'),
        ]
        .into_iter()
        .filter(|(flag, _)| *flag)
        .map(|(_, aa)| aa)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mass::peptide_mass;

    #[test]
    fn test_variants() {
        let mods = ModificationSet::from_names(&["Carbamidomethyl (C)"], &["Oxidation (M)"], 2).unwrap();
        let variants = mods.variants("MCMK");
        assert_eq!(variants.len(), 4);
        let base = peptide_mass("MCMK").unwrap() + 57.021464;
        assert!((variants[0].mass - base).abs() < 1e-6);
        assert!((variants[2].mass - (base + 15.994915)).abs() < 1e-6);
        assert!((variants[3].mass - (base + 2.0 * 15.994915)).abs() < 1e-6);
        assert_eq!(variants[0].to_string(), "MC(Carbamidomethyl)MK");
        assert_eq!(variants[1].to_string(), "M(Oxidation)C(Carbamidomethyl)MK");

        let again = mods.variants("MCMK");
        assert_eq!(variants, again);
    }

    #[test]
    fn test_max_variable() {
        let mods = ModificationSet::from_names::<&str>(&[], &["Oxidation (M)"], 1).unwrap();
        assert_eq!(mods.variants("MMM").len(), 4);
        assert!(mods.variants("PEPXK").is_empty());
    }

    #[test]
    fn test_duplicate_modifications() {
        let err = ModificationSet::from_names(&["Oxidation (M)"], &["Oxidation (M)"], 2);
        assert!(matches!(err, Err(CrossLinkError::FixedAndVariableModification(_))));
        let err = ModificationSet::from_names::<&str>(&[], &["Oxidation (M)", "Oxidation (M)"], 2);
        assert!(matches!(err, Err(CrossLinkError::DuplicateModification(_))));
        let err = ModificationSet::from_names::<&str>(&[], &["Frobnicate (X)"], 2);
        assert!(matches!(err, Err(CrossLinkError::UnknownModification(_))));
    }

    #[test]
    fn test_immonium_flags() {
        let flags = ImmoniumFlags::from_sequence("PEPTIDEK");
        let residues: Vec<u8> = flags.residues().collect();
        assert_eq!(residues, vec![b'P', b'L', b'K', b'E']);
    }
}
