//! The spectrum representation the scoring routines consume.
use std::collections::BTreeSet;

use mzdata::prelude::*;
use mzdata::spectrum::bindata::ArrayRetrievalError;
use mzdata::spectrum::MultiLayerSpectrum;
use mzpeaks::Tolerance;

use crate::error::CrossLinkError;
use crate::mass::{PROTON, C13C12_MASSDIFF};

/// A single fragment peak with its annotated charge and intensity rank.
///
/// A charge of zero means the charge has not been determined yet.
/// A rank of zero is the most intense peak of the spectrum.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentPeak {
    pub mz: f64,
    pub intensity: f32,
    pub charge: i32,
    pub rank: u32,
}

impl FragmentPeak {
    pub fn new(mz: f64, intensity: f32, charge: i32) -> Self {
        Self {
            mz,
            intensity,
            charge,
            rank: 0,
        }
    }
}

/// The largest absolute mass distance from `theoretical` that still counts as a match.
///
/// Matches must lie strictly closer than this distance.
#[inline]
pub fn max_distance(theoretical: f64, tolerance: Tolerance) -> f64 {
    match tolerance {
        Tolerance::PPM(ppm) => theoretical * ppm * 1e-6,
        Tolerance::Da(da) => da,
    }
}

/// An MS2 spectrum prepared for scoring.
///
/// Once preprocessed the peaks are sorted by m/z, carry a non-zero charge, and
/// `tic` is the sum of the retained intensities.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoringSpectrum {
    pub index: usize,
    pub native_id: String,
    pub rt: f64,
    pub precursor_mz: f64,
    pub precursor_charge: i32,
    pub peaks: Vec<FragmentPeak>,
    pub tic: f64,
    /// The length of the longest de novo amino acid tag found among the peaks
    pub longest_tag: usize,
    /// Names of the fragment adducts whose mass could also be explained by
    /// residue tags observed in this spectrum
    pub ambiguous_adducts: BTreeSet<String>,
    /// Co-isolated contaminant m/z values to remove while preprocessing
    pub interference: Vec<f64>,
}

impl ScoringSpectrum {
    pub fn new(
        index: usize,
        native_id: String,
        rt: f64,
        precursor_mz: f64,
        precursor_charge: i32,
        peaks: Vec<FragmentPeak>,
    ) -> Self {
        Self {
            index,
            native_id,
            rt,
            precursor_mz,
            precursor_charge,
            peaks,
            ..Default::default()
        }
    }

    /// Convert an `mzdata` spectrum, skipping anything that is not a tandem
    /// spectrum with a precursor.
    pub fn from_spectrum(spectrum: &MultiLayerSpectrum) -> Result<Option<Self>, CrossLinkError> {
        if spectrum.ms_level() < 2 {
            return Ok(None);
        }
        let Some(precursor) = spectrum.precursor() else {
            return Ok(None);
        };
        let precursor_mz = precursor.ion().mz;
        let precursor_charge = precursor.ion().charge().unwrap_or_default();

        let peaks: Vec<FragmentPeak> = if let Some(peaks) = spectrum.peaks.as_ref() {
            peaks
                .iter()
                .map(|p| FragmentPeak::new(p.mz, p.intensity, 0))
                .collect()
        } else if let Some(arrays) = spectrum.arrays.as_ref() {
            let conversion_error = |e: ArrayRetrievalError| {
                CrossLinkError::SpectrumConversion(spectrum.id().to_string(), format!("{e:?}"))
            };
            let mzs = arrays.mzs().map_err(conversion_error)?;
            let intensities = arrays.intensities().map_err(conversion_error)?;
            match arrays.charges() {
                Ok(charges) => mzs
                    .iter()
                    .zip(intensities.iter())
                    .zip(charges.iter())
                    .map(|((mz, inten), z)| FragmentPeak::new(*mz, *inten, *z))
                    .collect(),
                Err(_) => mzs
                    .iter()
                    .zip(intensities.iter())
                    .map(|(mz, inten)| FragmentPeak::new(*mz, *inten, 0))
                    .collect(),
            }
        } else {
            Vec::new()
        };

        Ok(Some(Self::new(
            spectrum.index(),
            spectrum.id().to_string(),
            spectrum.start_time(),
            precursor_mz,
            precursor_charge,
            peaks,
        )))
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// The neutral precursor mass, corrected for `isotope` mis-assigned
    /// monoisotopic peaks.
    pub fn precursor_mass(&self, isotope: i32) -> f64 {
        let z = self.precursor_charge as f64;
        z * self.precursor_mz - z * PROTON - isotope as f64 * C13C12_MASSDIFF
    }

    pub fn mz(&self, i: usize) -> f64 {
        self.peaks[i].mz
    }

    pub fn intensity(&self, i: usize) -> f64 {
        self.peaks[i].intensity as f64
    }

    pub fn charge(&self, i: usize) -> i32 {
        self.peaks[i].charge
    }

    /// Find the index of the peak closest to `mz`, or `None` if the spectrum is empty.
    ///
    /// The peak list must be sorted by m/z.
    pub fn find_nearest(&self, mz: f64) -> Option<usize> {
        if self.peaks.is_empty() {
            return None;
        }
        let i = self.peaks.partition_point(|p| p.mz < mz);
        if i == 0 {
            return Some(0);
        }
        if i == self.peaks.len() {
            return Some(i - 1);
        }
        let below = mz - self.peaks[i - 1].mz;
        let above = self.peaks[i].mz - mz;
        if below <= above {
            Some(i - 1)
        } else {
            Some(i)
        }
    }

    /// Find the closest peak strictly within `tolerance` of `mz`
    pub fn has_peak(&self, mz: f64, tolerance: Tolerance) -> Option<usize> {
        let i = self.find_nearest(mz)?;
        if (self.peaks[i].mz - mz).abs() < max_distance(mz, tolerance) {
            Some(i)
        } else {
            None
        }
    }

    pub fn total_ion_current(&self) -> f64 {
        self.peaks.iter().map(|p| p.intensity as f64).sum()
    }

    pub fn sort_by_mz(&mut self) {
        self.peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
    }
}
