use std::io;

use thiserror::Error;

/// The errors that can arise while configuring or preparing a cross-link search.
///
/// Everything here is raised before scoring begins. Problems discovered while scoring
/// individual candidates are logged and the candidate skipped instead.
#[derive(Debug, Error)]
pub enum CrossLinkError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to parse formula {0:?}")]
    FormulaParse(String),
    #[error("Unknown modification {0:?}")]
    UnknownModification(String),
    #[error("Modification {0:?} was specified more than once")]
    DuplicateModification(String),
    #[error("Modification {0:?} was specified as both fixed and variable")]
    FixedAndVariableModification(String),
    #[error("Unknown nucleotide {0:?} referenced in {1:?}")]
    UnknownNucleotide(char, String),
    #[error("Malformed nucleotide adduct definition {0:?}")]
    MalformedAdductDefinition(String),
    #[error("Nucleotide adduct {0:?} has a negative element count")]
    InvalidAdductFormula(String),
    #[error("Failed to read spectrum {0}: {1}")]
    SpectrumConversion(String, String),
    #[error("Invalid parameter {0}: {1}")]
    InvalidParameter(String, String),
}
