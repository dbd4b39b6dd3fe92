use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzcrosslink::{Preset, Protease, ScoringMode};
use mzpeaks::Tolerance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToleranceUnit {
    #[default]
    /// Parts per million of the theoretical mass
    Ppm,
    /// An absolute mass difference in Daltons
    Da,
}

impl ToleranceUnit {
    pub fn tolerance(&self, value: f64) -> Tolerance {
        match self {
            ToleranceUnit::Ppm => Tolerance::PPM(value),
            ToleranceUnit::Da => Tolerance::Da(value),
        }
    }
}

impl Display for ToleranceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToleranceUnit::Ppm => write!(f, "ppm"),
            ToleranceUnit::Da => write!(f, "Da"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgScoringMode {
    /// Score unshifted ions while searching and expand the best hits afterwards
    Fast,
    #[default]
    /// Score every feasible cross-linked nucleotide while searching
    Slow,
}

impl From<ArgScoringMode> for ScoringMode {
    fn from(value: ArgScoringMode) -> Self {
        match value {
            ArgScoringMode::Fast => ScoringMode::Fast,
            ArgScoringMode::Slow => ScoringMode::Slow,
        }
    }
}

impl Display for ArgScoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        ScoringMode::from(*self).fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgPreset {
    #[default]
    /// RNA-UV (U)
    RnaUvU,
    /// RNA-UV (UCGA)
    RnaUvUcga,
    /// DNA-UV
    DnaUv,
}

impl From<ArgPreset> for Preset {
    fn from(value: ArgPreset) -> Self {
        match value {
            ArgPreset::RnaUvU => Preset::RnaUvU,
            ArgPreset::RnaUvUcga => Preset::RnaUvUcga,
            ArgPreset::DnaUv => Preset::DnaUv,
        }
    }
}

impl Display for ArgPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Preset::from(*self).fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgEnzyme {
    Trypsin,
    #[default]
    TrypsinP,
}

impl From<ArgEnzyme> for Protease {
    fn from(value: ArgEnzyme) -> Self {
        match value {
            ArgEnzyme::Trypsin => Protease::Trypsin,
            ArgEnzyme::TrypsinP => Protease::TrypsinP,
        }
    }
}

impl Display for ArgEnzyme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Protease::from(*self).fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    /// Tab separated values with a header line
    Tsv,
    /// One JSON object per line
    Json,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub(crate) fn non_negative_float(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conversions() {
        assert!(matches!(ToleranceUnit::Da.tolerance(0.02), Tolerance::Da(v) if v == 0.02));
        assert_eq!(Preset::from(ArgPreset::DnaUv), Preset::DnaUv);
        assert_eq!(ArgScoringMode::Fast.to_string(), "fast");
        assert!(non_negative_float("-1.0").is_err());
        assert_eq!(non_negative_float("2.5"), Ok(2.5));
    }
}
