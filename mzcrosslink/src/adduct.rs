//! Nucleotide adducts: the chemistry presets, the table of precursor adducts and
//! the fragment adducts and marker ions each of them makes feasible.
//!
//! A precursor adduct is keyed by its elemental formula. Several chemically distinct
//! adducts can share a formula (e.g. `U-H2O` and `C-NH3`), so each formula maps to a
//! sorted list of names and hits refer to a name by its *ambiguity index* in that list.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use std::str::FromStr;

use itertools::Itertools;
use tracing::debug;

use crate::error::CrossLinkError;
use crate::mass::{natural19_without_isoleucine, parse_formula, Formula, FormulaExt};

/// The name of the precursor adduct with an empty formula
pub const NO_ADDUCT: &str = "none";

/// A mass shift carried by fragment ions that retain part of the nucleotide
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentAdduct {
    pub name: String,
    pub formula: Formula,
    pub mass: f64,
}

impl FragmentAdduct {
    pub fn new(name: String, formula: Formula) -> Self {
        let mass = formula.mass();
        Self {
            name,
            formula,
            mass,
        }
    }

    /// Parse a `formula;name` definition
    pub fn parse_definition(definition: &str) -> Result<Self, CrossLinkError> {
        let (formula, name) = definition
            .split_once(';')
            .ok_or_else(|| CrossLinkError::MalformedAdductDefinition(definition.to_string()))?;
        Ok(Self::new(name.trim().to_string(), parse_formula(formula)?))
    }
}

/// The nucleotide chemistry a search is configured for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NucleotideChemistry {
    /// The formula of each nucleotide monophosphate
    pub nucleotides: BTreeMap<char, Formula>,
    /// Precursor adduct definitions, `nucleotides:formula-delta`, e.g. `U:-H2O`
    pub modifications: Vec<String>,
    pub can_cross_link: BTreeSet<char>,
    pub fragment_adducts: BTreeMap<char, Vec<FragmentAdduct>>,
}

const RNA_NUCLEOTIDES: &[(char, &str)] = &[
    ('A', "C10H14N5O7P"),
    ('C', "C9H14N3O8P"),
    ('G', "C10H14N5O8P"),
    ('U', "C9H13N2O9P"),
];

const DNA_NUCLEOTIDES: &[(char, &str)] = &[
    ('A', "C10H14N5O6P"),
    ('C', "C9H14N3O7P"),
    ('G', "C10H14N5O7P"),
    ('T', "C10H15N2O8P"),
    ('d', "C5H9O6P"),
];

const RNA_UV_MODIFICATIONS: &[&str] = &[
    "U:", "U:-H2O", "C:", "C:-H2O", "C:-NH3", "G:", "G:-H2O", "G:-NH3", "A:", "A:-NH3",
];

const DNA_UV_MODIFICATIONS: &[&str] = &[
    "T:", "T:-H2O", "G:", "G:-H2O", "G:-NH3", "A:", "A:-NH3", "C:", "C:-H2O", "C:-NH3", "d:",
    "d:-H2O",
];

const RNA_UV_FRAGMENTS: &[(char, &[&str])] = &[
    (
        'U',
        &[
            "C3O;C3O",
            "C4H4N2O2;U'",
            "C4H2N2O1;U'-H2O",
            "C9H13N2O9P1;U",
            "C9H11N2O8P1;U-H2O",
            "C9H12N2O6;U-HPO3",
            "C9H10N2O5;U-H3PO4",
        ],
    ),
    (
        'C',
        &[
            "C4H5N3O;C'",
            "C4H3N3;C'-H2O",
            "C4H2N2O;C'-NH3",
            "C9H14N3O8P;C",
            "C9H11N2O8P;C-NH3",
            "C9H12N3O7P;C-H2O",
            "C9H9N2O7P;C-NH3-H2O",
            "C9H13N3O5;C-HPO3",
            "C9H11N3O4;C-H3PO4",
            "C9H10N2O5;C-NH3-HPO3",
            "C9H8N2O4;C-NH3-H3PO4",
        ],
    ),
    (
        'G',
        &[
            "C5H5N5O;G'",
            "C5H3N5;G'-H2O",
            "C5H2N4O;G'-NH3",
            "C10H14N5O8P;G",
            "C10H12N5O7P;G-H2O",
            "C10H11N4O8P;G-NH3",
            "C10H9N4O7P;G-NH3-H2O",
            "C10H13N5O5;G-HPO3",
            "C10H11N5O4;G-H3PO4",
            "C10H10N4O5;G-NH3-HPO3",
            "C10H8N4O4;G-NH3-H3PO4",
        ],
    ),
    (
        'A',
        &[
            "C5H5N5;A'",
            "C5H2N4;A'-NH3",
            "C10H14N5O7P;A",
            "C10H12N5O6P;A-H2O",
            "C10H11N4O7P;A-NH3",
            "C10H9N4O6P;A-NH3-H2O",
            "C10H13N5O4;A-HPO3",
            "C10H11N5O3;A-H3PO4",
            "C10H10N5O4;A-NH3-HPO3",
            "C10H8N5O3;A-NH3-H3PO4",
        ],
    ),
];

const DNA_UV_FRAGMENTS: &[(char, &[&str])] = &[
    (
        'T',
        &[
            "C5H6N2O2;T'",
            "C5H4N2O;T'-H2O",
            "C10H15N2O8P;T",
            "C10H13N2O7P;T-H2O",
            "C10H14N2O5;T-HPO3",
            "C10H12N2O4;T-H3PO4",
        ],
    ),
    (
        'C',
        &[
            "C9H14N3O7P;C",
            "C9H11N2O7P;C-NH3",
            "C9H12N3O6P;C-H2O",
            "C9H9N2O6P;C-NH3-H2O",
            "C9H13N3O4;C-HPO3",
            "C9H11N3O3;C-H3PO4",
            "C9H10N2O4;C-NH3-HPO3",
            "C9H8N2O3;C-NH3-H3PO4",
            "C4H5N3O;C'",
            "C4H3N3;C'-H2O",
            "C4H2N2O;C'-NH3",
        ],
    ),
    (
        'G',
        &[
            "C10H14N5O7P;G",
            "C10H12N5O6P;G-H2O",
            "C10H11N4O7P;G-NH3",
            "C10H9N4O6P;G-NH3-H2O",
            "C10H13N5O4;G-HPO3",
            "C10H10N4O4;G-NH3-HPO3",
            "C10H11N5O3;G-H3PO4",
            "C10H8N4O3;G-NH3-H3PO4",
            "C5H5N5O;G'",
            "C5H3N5;G'-H2O",
            "C5H2N4O;G'-NH3",
        ],
    ),
    (
        'A',
        &[
            "C10H14N5O6P;A",
            "C10H12N5O5P;A-H2O",
            "C10H11N4O6P;A-NH3",
            "C10H9N4O5P;A-NH3-H2O",
            "C10H13N5O3;A-HPO3",
            "C10H11N5O2;A-H3PO4",
            "C10H10N5O3;A-NH3-HPO3",
            "C10H8N5O2;A-NH3-H3PO4",
            "C5H5N5;A'",
            "C5H2N4;A'-NH3",
        ],
    ),
    (
        'd',
        &[
            "C5H9O6P;C5H9O6P",
            "C5H7O5P;C5H9O6P-H2O",
            "C5H8O3;C5H9O6P-HPO3",
            "C5H6O2;C5H9O6P-H3PO4",
        ],
    ),
];

/// Predefined nucleotide chemistries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Preset {
    /// UV cross-linking of RNA through uracil only
    #[default]
    RnaUvU,
    /// UV cross-linking of RNA through any nucleotide
    RnaUvUcga,
    /// UV cross-linking of DNA
    DnaUv,
}

impl Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preset::RnaUvU => write!(f, "RNA-UV (U)"),
            Preset::RnaUvUcga => write!(f, "RNA-UV (UCGA)"),
            Preset::DnaUv => write!(f, "DNA-UV"),
        }
    }
}

impl FromStr for Preset {
    type Err = CrossLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RNA-UV (U)" => Ok(Self::RnaUvU),
            "RNA-UV (UCGA)" => Ok(Self::RnaUvUcga),
            "DNA-UV" => Ok(Self::DnaUv),
            _ => Err(CrossLinkError::InvalidParameter(
                "preset".into(),
                format!("unknown preset {s:?}"),
            )),
        }
    }
}

impl Preset {
    pub fn chemistry(&self) -> Result<NucleotideChemistry, CrossLinkError> {
        let (nucleotides, modifications, can_cross_link, fragments) = match self {
            Preset::RnaUvU => (RNA_NUCLEOTIDES, RNA_UV_MODIFICATIONS, "U", RNA_UV_FRAGMENTS),
            Preset::RnaUvUcga => (
                RNA_NUCLEOTIDES,
                RNA_UV_MODIFICATIONS,
                "UCGA",
                RNA_UV_FRAGMENTS,
            ),
            Preset::DnaUv => (DNA_NUCLEOTIDES, DNA_UV_MODIFICATIONS, "TCGAd", DNA_UV_FRAGMENTS),
        };
        let nucleotides = nucleotides
            .iter()
            .map(|(c, f)| Ok((*c, parse_formula(f)?)))
            .collect::<Result<BTreeMap<char, Formula>, CrossLinkError>>()?;
        let mut fragment_adducts = BTreeMap::new();
        for (c, defs) in fragments.iter() {
            let adducts = defs
                .iter()
                .map(|d| FragmentAdduct::parse_definition(d))
                .collect::<Result<Vec<_>, _>>()?;
            fragment_adducts.insert(*c, adducts);
        }
        Ok(NucleotideChemistry {
            nucleotides,
            modifications: modifications.iter().map(|s| s.to_string()).collect(),
            can_cross_link: can_cross_link.chars().collect(),
            fragment_adducts,
        })
    }
}

/// The nucleotide letters of an adduct name, everything before the first
/// `-` or `+`
pub fn nucleotide_part(name: &str) -> &str {
    match name.find(['-', '+']) {
        Some(i) => &name[..i],
        None => name,
    }
}

/// The fragment adducts a cross-linked nucleotide can leave on fragment ions
#[derive(Debug, Clone, PartialEq)]
pub struct NucleotideFragmentAdducts {
    pub nucleotide: char,
    pub adducts: Vec<FragmentAdduct>,
}

/// Everything a precursor adduct implies for fragment spectra
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeasibleAdducts {
    pub per_nucleotide: Vec<NucleotideFragmentAdducts>,
    pub marker_ions: Vec<FragmentAdduct>,
}

impl FeasibleAdducts {
    pub fn for_nucleotide(&self, nucleotide: char) -> Option<&[FragmentAdduct]> {
        self.per_nucleotide
            .iter()
            .find(|n| n.nucleotide == nucleotide)
            .map(|n| n.adducts.as_slice())
    }
}

/// A precursor adduct formula and every name that shares it
#[derive(Debug, Clone, PartialEq)]
pub struct PrecursorAdduct {
    pub formula: Formula,
    pub key: String,
    pub mass: f64,
    pub names: Vec<String>,
}

impl PrecursorAdduct {
    pub fn is_cross_link(&self) -> bool {
        !self.formula.has_no_atoms()
    }
}

/// Limits on the nucleotide chains searched as precursor adducts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOptions {
    /// The longest chain of nucleotides, `0` searches unmodified peptides only
    pub max_length: usize,
    /// Only chains whose nucleotides occur consecutively in this sequence are searched
    pub sequence: Option<String>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            max_length: 2,
            sequence: None,
        }
    }
}

impl ChainOptions {
    /// Whether some window of the restriction sequence holds exactly the nucleotides of `chain`
    fn permits(&self, chain: &[char]) -> bool {
        let Some(sequence) = self.sequence.as_deref() else {
            return true;
        };
        let sequence: Vec<char> = sequence.chars().collect();
        if chain.len() > sequence.len() {
            return false;
        }
        let mut wanted = chain.to_vec();
        wanted.sort_unstable();
        sequence.windows(chain.len()).any(|w| {
            let mut window = w.to_vec();
            window.sort_unstable();
            window == wanted
        })
    }
}

/// Whether every nucleotide of `part` is present in `chain`, counting repeats
fn contains_all(chain: &[char], part: &str) -> bool {
    let counts = chain.iter().counts();
    part.chars()
        .counts()
        .into_iter()
        .all(|(c, n)| counts.get(&c).copied().unwrap_or_default() >= n)
}

/// The lookup table from precursor adducts to their feasible fragment adducts
#[derive(Debug, Clone, Default)]
pub struct AdductTable {
    pub adducts: Vec<PrecursorAdduct>,
    feasibility: HashMap<String, FeasibleAdducts>,
    pub can_cross_link: BTreeSet<char>,
}

impl AdductTable {
    /// Build the table from a chemistry, including the adduct-free `none` entry.
    ///
    /// Every modification definition `X:delta` is applied to each nucleotide chain of up
    /// to [`ChainOptions::max_length`] nucleotides that contains the nucleotides of `X`.
    /// Chains of two or more nucleotides must contain a cross-linkable nucleotide. Chains
    /// are named by their nucleotides in alphabetical order followed by the delta, e.g.
    /// `UU-H2O`.
    pub fn from_chemistry(
        chemistry: &NucleotideChemistry,
        options: &ChainOptions,
    ) -> Result<Self, CrossLinkError> {
        let mut by_formula: BTreeMap<String, (Formula, BTreeSet<String>)> = BTreeMap::new();
        by_formula.insert(
            String::new(),
            (Formula::new(), BTreeSet::from([NO_ADDUCT.to_string()])),
        );

        let mut definitions = Vec::with_capacity(chemistry.modifications.len());
        for definition in chemistry.modifications.iter() {
            let (prefix, delta) = definition
                .split_once(':')
                .ok_or_else(|| CrossLinkError::MalformedAdductDefinition(definition.clone()))?;
            if prefix.is_empty() {
                return Err(CrossLinkError::MalformedAdductDefinition(definition.clone()));
            }
            if let Some(c) = prefix.chars().find(|c| !chemistry.nucleotides.contains_key(c)) {
                return Err(CrossLinkError::UnknownNucleotide(c, definition.clone()));
            }
            definitions.push((definition, prefix, delta.trim(), parse_formula(delta)?));
        }

        let letters: Vec<char> = chemistry.nucleotides.keys().copied().collect();
        for length in 1..=options.max_length {
            for chain in letters.iter().copied().combinations_with_replacement(length) {
                if length > 1 && !chain.iter().any(|c| chemistry.can_cross_link.contains(c)) {
                    continue;
                }
                if !options.permits(&chain) {
                    continue;
                }
                let chain_name: String = chain.iter().collect();
                let Some(base) = oligo_formula(chemistry, &chain_name) else {
                    continue;
                };
                for (definition, prefix, delta, delta_formula) in definitions.iter() {
                    if prefix.chars().count() > length || !contains_all(&chain, prefix) {
                        continue;
                    }
                    let formula = &base + delta_formula;
                    if !formula.is_valid() {
                        return Err(CrossLinkError::InvalidAdductFormula((*definition).clone()));
                    }
                    let name = format!("{chain_name}{delta}");
                    let key = formula.hill_formula();
                    by_formula
                        .entry(key)
                        .or_insert_with(|| (formula, BTreeSet::new()))
                        .1
                        .insert(name);
                }
            }
        }

        let mut adducts = Vec::with_capacity(by_formula.len());
        let mut feasibility = HashMap::new();
        for (key, (formula, names)) in by_formula {
            let mass = formula.mass();
            for name in names.iter() {
                let feasible = Self::feasible_for(chemistry, name, &formula);
                debug!(
                    "Precursor adduct {name} ({key}, {mass:0.4}): {} cross-linkable nucleotides, {} marker ions",
                    feasible.per_nucleotide.len(),
                    feasible.marker_ions.len()
                );
                feasibility.insert(name.clone(), feasible);
            }
            adducts.push(PrecursorAdduct {
                formula,
                key,
                mass,
                names: names.into_iter().collect(),
            });
        }

        Ok(Self {
            adducts,
            feasibility,
            can_cross_link: chemistry.can_cross_link.clone(),
        })
    }

    fn feasible_for(chemistry: &NucleotideChemistry, name: &str, formula: &Formula) -> FeasibleAdducts {
        if name == NO_ADDUCT {
            return FeasibleAdducts::default();
        }
        let nucleotides: BTreeSet<char> = nucleotide_part(name).chars().collect();
        let mut per_nucleotide = Vec::new();
        let mut marker_ions: Vec<FragmentAdduct> = Vec::new();
        // Keep the letter order of the name stable for reproducible expansion order
        let mut ordered: Vec<char> = Vec::new();
        for c in nucleotide_part(name).chars() {
            if !ordered.contains(&c) {
                ordered.push(c);
            }
        }
        for c in ordered {
            let candidates = chemistry
                .fragment_adducts
                .get(&c)
                .map(|v| v.as_slice())
                .unwrap_or_default();
            let feasible: Vec<FragmentAdduct> = candidates
                .iter()
                .filter(|fa| fa.formula.is_subset_of(formula))
                .cloned()
                .collect();
            for fa in feasible.iter() {
                if !marker_ions.iter().any(|m| m.name == fa.name) {
                    marker_ions.push(fa.clone());
                }
            }
            if chemistry.can_cross_link.contains(&c) && nucleotides.contains(&c) {
                per_nucleotide.push(NucleotideFragmentAdducts {
                    nucleotide: c,
                    adducts: feasible,
                });
            }
        }
        FeasibleAdducts {
            per_nucleotide,
            marker_ions,
        }
    }

    pub fn len(&self) -> usize {
        self.adducts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adducts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PrecursorAdduct> {
        self.adducts.get(index)
    }

    /// The name of the adduct at `index` with ambiguity index `ambiguity`
    pub fn name(&self, index: usize, ambiguity: usize) -> Option<&str> {
        self.adducts
            .get(index)
            .and_then(|a| a.names.get(ambiguity))
            .map(|s| s.as_str())
    }

    pub fn feasible(&self, name: &str) -> Option<&FeasibleAdducts> {
        self.feasibility.get(name)
    }
}

/// Residue tags that can mimic a fragment adduct shift, and the residue mass
/// lists whose presence makes a shifted ion ambiguous.
#[derive(Debug, Clone, Default)]
pub struct AmbiguityIndex {
    /// Sorted residue tags to the names of fragment adducts they mimic
    pub tag_to_adducts: BTreeMap<String, BTreeSet<String>>,
    /// Fragment adduct names to lists of residue masses; if a peak exists for
    /// every mass in any list the shifted ion is considered ambiguous
    pub blocked_masses: HashMap<String, Vec<Vec<f64>>>,
}

impl AmbiguityIndex {
    /// Build the index from every fragment adduct of `chemistry`.
    ///
    /// `tolerance_at` maps a reference mass to the absolute tolerance in Da.
    pub fn new<F: Fn(f64) -> f64>(chemistry: &NucleotideChemistry, tolerance_at: F) -> Self {
        let residues = natural19_without_isoleucine();
        let mut adducts: Vec<(f64, &str)> = Vec::new();
        for fas in chemistry.fragment_adducts.values() {
            for fa in fas {
                adducts.push((fa.mass, fa.name.as_str()));
            }
        }
        let mut residue_plus_adduct: Vec<(f64, &str)> = Vec::new();
        for (mass, name) in adducts.iter() {
            for (_, rm) in residues.iter() {
                residue_plus_adduct.push((mass + rm, name));
            }
        }

        let mut index = Self::default();
        let mut add = |tag: String, name: &str, masses: Vec<f64>| {
            index
                .tag_to_adducts
                .entry(tag)
                .or_default()
                .insert(name.to_string());
            let lists = index.blocked_masses.entry(name.to_string()).or_default();
            if !lists.contains(&masses) {
                lists.push(masses);
            }
        };

        for (a, am) in residues.iter() {
            for (b, bm) in residues.iter() {
                let ab = am + bm;
                let tolerance = tolerance_at(ab + 1000.0);
                let mut tag: Vec<char> = vec![*a, *b];
                tag.sort();
                let tag: String = tag.into_iter().collect();
                for (m, name) in residue_plus_adduct.iter().chain(adducts.iter()) {
                    if (m - ab).abs() <= tolerance {
                        add(tag.clone(), name, vec![*am, *bm]);
                    }
                }
            }
        }
        for (a, am) in residues.iter() {
            let tolerance = tolerance_at(am + 1000.0);
            for (m, name) in residue_plus_adduct.iter().chain(adducts.iter()) {
                if (m - am).abs() <= tolerance {
                    add(a.to_string(), name, vec![*am]);
                }
            }
        }
        index
    }

    /// The adduct names mimicked by any of `tags`
    pub fn adducts_for_tags<'a, I: IntoIterator<Item = &'a String>>(&self, tags: I) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for tag in tags {
            let mut sorted: Vec<char> = tag.chars().collect();
            sorted.sort();
            let sorted: String = sorted.into_iter().collect();
            if let Some(hits) = self.tag_to_adducts.get(&sorted) {
                names.extend(hits.iter().cloned());
            }
        }
        names
    }
}

/// The formula of a chain of nucleotides joined by phosphodiester bonds
pub fn oligo_formula(chemistry: &NucleotideChemistry, nucleotides: &str) -> Option<Formula> {
    let water = parse_formula("H2O").ok()?;
    let mut formula = Formula::new();
    for (i, c) in nucleotides.chars().enumerate() {
        formula = &formula + chemistry.nucleotides.get(&c)?;
        if i > 0 {
            formula = &formula - &water;
        }
    }
    Some(formula)
}
