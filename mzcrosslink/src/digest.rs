//! Protein sequences, enzymatic digestion and decoy generation.
use std::fmt::Display;
use std::io::{self, prelude::*};
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::debug;

use crate::error::CrossLinkError;
use crate::mass::residue_mass;

pub const DECOY_PREFIX: &str = "DECOY_";
pub const DECOY_SEED: u64 = 4711;

/// A named protein sequence. The sequence is shared by every peptide view
/// derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Protein {
    pub identifier: String,
    pub sequence: Arc<str>,
}

impl Protein {
    pub fn new(identifier: String, sequence: &str) -> Self {
        Self {
            identifier,
            sequence: Arc::from(sequence),
        }
    }

    pub fn is_decoy(&self) -> bool {
        self.identifier.starts_with(DECOY_PREFIX)
    }
}

/// Read proteins from a FASTA formatted stream.
///
/// The identifier is the first whitespace delimited token of the header line.
pub fn read_fasta<R: BufRead>(reader: R) -> io::Result<Vec<Protein>> {
    let mut proteins = Vec::new();
    let mut identifier: Option<String> = None;
    let mut sequence = String::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if let Some(header) = line.strip_prefix('>') {
            if let Some(id) = identifier.take() {
                proteins.push(Protein::new(id, &sequence));
            }
            identifier = Some(
                header
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            );
            sequence.clear();
        } else if !line.is_empty() {
            sequence.extend(line.chars().filter(|c| !c.is_whitespace() && *c != '*'));
        }
    }
    if let Some(id) = identifier.take() {
        proteins.push(Protein::new(id, &sequence));
    }
    Ok(proteins)
}

/// The proteolytic enzyme used to produce candidate peptides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Protease {
    /// Cleaves after K or R unless followed by P
    Trypsin,
    /// Cleaves after K or R
    #[default]
    TrypsinP,
}

impl FromStr for Protease {
    type Err = CrossLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trypsin" => Ok(Self::Trypsin),
            "trypsin/p" | "trypsinp" => Ok(Self::TrypsinP),
            _ => Err(CrossLinkError::InvalidParameter(
                "enzyme".into(),
                format!("unknown protease {s:?}"),
            )),
        }
    }
}

impl Display for Protease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protease::Trypsin => write!(f, "Trypsin"),
            Protease::TrypsinP => write!(f, "Trypsin/P"),
        }
    }
}

impl Protease {
    /// The positions after which the sequence is cut, always including the end
    pub fn cleavage_sites(&self, sequence: &[u8]) -> Vec<usize> {
        let mut sites = Vec::new();
        for i in 0..sequence.len() {
            let cut = match sequence[i] {
                b'K' | b'R' => match self {
                    Protease::TrypsinP => true,
                    Protease::Trypsin => sequence.get(i + 1) != Some(&b'P'),
                },
                _ => false,
            };
            if cut && i + 1 < sequence.len() {
                sites.push(i + 1);
            }
        }
        sites.push(sequence.len());
        sites
    }

    /// Digest `sequence` into peptide ranges with up to `missed_cleavages`
    /// missed cleavages and a length within `length_range`
    pub fn digest(
        &self,
        sequence: &str,
        missed_cleavages: usize,
        length_range: Range<usize>,
    ) -> Vec<Range<usize>> {
        let sites = self.cleavage_sites(sequence.as_bytes());
        let mut starts = vec![0];
        starts.extend(sites.iter().copied().take(sites.len() - 1));
        let mut peptides = Vec::new();
        for (i, start) in starts.iter().enumerate() {
            for end in sites.iter().skip(i).take(missed_cleavages + 1) {
                let len = end - start;
                if length_range.contains(&len) {
                    peptides.push(*start..*end);
                }
            }
        }
        peptides
    }
}

/// A peptide as a view into its parent protein's sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeptideRef {
    pub protein: Arc<str>,
    pub range: Range<u32>,
}

impl PeptideRef {
    pub fn new(protein: Arc<str>, range: Range<usize>) -> Self {
        Self {
            protein,
            range: range.start as u32..range.end as u32,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.protein[self.range.start as usize..self.range.end as usize]
    }

    pub fn len(&self) -> usize {
        (self.range.end - self.range.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

impl Display for PeptideRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces decoy proteins by shuffling each fully cleaved peptide
/// while keeping its C-terminal residue in place.
#[derive(Debug, Clone)]
pub struct DecoyGenerator {
    pub protease: Protease,
    pub max_attempts: usize,
    rng: StdRng,
}

impl DecoyGenerator {
    pub fn new(protease: Protease, seed: u64) -> Self {
        Self {
            protease,
            max_attempts: 100,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Shuffle all but the last residue, preferring the permutation that
    /// shares the fewest positions with the input
    pub fn shuffle_peptide(&mut self, peptide: &str) -> String {
        let residues = peptide.as_bytes();
        if residues.len() <= 2 {
            return peptide.to_string();
        }
        let last = residues.len() - 1;
        let mut best: Vec<u8> = residues.to_vec();
        let mut best_identity = usize::MAX;
        let mut trial = residues.to_vec();
        for _ in 0..self.max_attempts {
            trial[..last].shuffle(&mut self.rng);
            let identity = trial
                .iter()
                .zip(residues.iter())
                .filter(|(a, b)| a == b)
                .count();
            if identity < best_identity {
                best_identity = identity;
                best.copy_from_slice(&trial);
                if identity <= 1 {
                    break;
                }
            }
        }
        String::from_utf8(best).unwrap_or_else(|_| peptide.to_string())
    }

    /// Build a decoy protein by shuffling every cleavage product of `protein`
    pub fn decoy_protein(&mut self, protein: &Protein, copy: usize) -> Protein {
        let sequence = protein.sequence.as_ref();
        let mut decoy = String::with_capacity(sequence.len());
        for range in self.protease.digest(sequence, 0, 0..usize::MAX) {
            decoy.push_str(&self.shuffle_peptide(&sequence[range]));
        }
        let identifier = if copy == 0 {
            format!("{DECOY_PREFIX}{}", protein.identifier)
        } else {
            format!("{DECOY_PREFIX}{}_{copy}", protein.identifier)
        };
        Protein::new(identifier, &decoy)
    }
}

/// Append `decoy_factor` decoy copies of every target protein to the database,
/// then shuffle the protein order to spread work evenly.
pub fn add_decoys(proteins: &mut Vec<Protein>, protease: Protease, decoy_factor: usize) {
    let mut generator = DecoyGenerator::new(protease, DECOY_SEED);
    let n_targets = proteins.len();
    for copy in 0..decoy_factor {
        for i in 0..n_targets {
            let decoy = generator.decoy_protein(&proteins[i], copy);
            proteins.push(decoy);
        }
    }
    debug!(
        "Added {} decoy proteins to {} targets",
        proteins.len() - n_targets,
        n_targets
    );
    let mut rng = StdRng::seed_from_u64(DECOY_SEED);
    proteins.shuffle(&mut rng);
}

/// All residues of `peptide` have a known mass
pub fn is_standard_sequence(peptide: &str) -> bool {
    peptide.bytes().all(|aa| residue_mass(aa).is_some())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mass::peptide_mass;

    #[test]
    fn test_read_fasta() {
        let text = b">sp|P1|PROT1 Some protein\nMPEPTIDEK\nRSAMPLER\n>sp|P2|PROT2\nAAAK*\n";
        let proteins = read_fasta(io::Cursor::new(&text[..])).unwrap();
        assert_eq!(proteins.len(), 2);
        assert_eq!(proteins[0].identifier, "sp|P1|PROT1");
        assert_eq!(proteins[0].sequence.as_ref(), "MPEPTIDEKRSAMPLER");
        assert_eq!(proteins[1].sequence.as_ref(), "AAAK");
    }

    #[test]
    fn test_digest() {
        let seq = "MPEPTIDEKPSAMPLERAAK";
        let full = Protease::TrypsinP.digest(seq, 0, 0..usize::MAX);
        let peptides: Vec<&str> = full.iter().map(|r| &seq[r.clone()]).collect();
        assert_eq!(peptides, vec!["MPEPTIDEK", "PSAMPLER", "AAK"]);

        let strict = Protease::Trypsin.digest(seq, 0, 0..usize::MAX);
        let peptides: Vec<&str> = strict.iter().map(|r| &seq[r.clone()]).collect();
        assert_eq!(peptides, vec!["MPEPTIDEKPSAMPLER", "AAK"]);

        let missed = Protease::TrypsinP.digest(seq, 1, 6..31);
        let peptides: Vec<&str> = missed.iter().map(|r| &seq[r.clone()]).collect();
        assert_eq!(
            peptides,
            vec!["MPEPTIDEK", "MPEPTIDEKPSAMPLER", "PSAMPLER", "PSAMPLERAAK"]
        );
    }

    #[test]
    fn test_decoy_symmetry() {
        let mut generator = DecoyGenerator::new(Protease::TrypsinP, DECOY_SEED);
        for target in ["PEPTIDEK", "SAMPLER", "LGEYGFQNALIVR", "ACK"] {
            let decoy = generator.shuffle_peptide(target);
            assert_ne!(decoy, target);
            assert_eq!(decoy.as_bytes().last(), target.as_bytes().last());
            let delta = peptide_mass(&decoy).unwrap() - peptide_mass(target).unwrap();
            assert!(delta.abs() < 1e-9, "{target} -> {decoy}: {delta}");
        }
    }

    #[test]
    fn test_add_decoys() {
        let mut proteins = vec![Protein::new("P1".into(), "MPEPTIDEKPSAMPLERAAK")];
        add_decoys(&mut proteins, Protease::TrypsinP, 1);
        assert_eq!(proteins.len(), 2);
        let decoy = proteins.iter().find(|p| p.is_decoy()).unwrap();
        assert_eq!(decoy.identifier, "DECOY_P1");
        assert_eq!(decoy.sequence.len(), 20);
        assert_ne!(decoy.sequence.as_ref(), "MPEPTIDEKPSAMPLERAAK");
    }

    #[test]
    fn test_peptide_ref() {
        let protein = Protein::new("P1".into(), "MPEPTIDEK");
        let peptide = PeptideRef::new(protein.sequence.clone(), 1..9);
        assert_eq!(peptide.as_str(), "PEPTIDEK");
        assert_eq!(peptide.len(), 8);
    }
}
