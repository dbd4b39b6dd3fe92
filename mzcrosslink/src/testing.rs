//! Synthetic spectra shared by unit tests.
use crate::adduct::FragmentAdduct;
use crate::fragments::FragmentTemplate;
use crate::mass::PROTON;
use crate::spectrum::{FragmentPeak, ScoringSpectrum};

/// Build a preprocessed spectrum of singly charged peaks
pub(crate) fn finish(peaks: Vec<(f64, f32)>, precursor_mz: f64, precursor_charge: i32) -> ScoringSpectrum {
    let peaks = peaks
        .into_iter()
        .map(|(mz, intensity)| FragmentPeak::new(mz, intensity, 1))
        .collect();
    let mut spectrum = ScoringSpectrum::new(0, "index=0".to_string(), 60.0, precursor_mz, precursor_charge, peaks);
    spectrum.sort_by_mz();
    spectrum.tic = spectrum.total_ion_current();
    let mut order: Vec<usize> = (0..spectrum.len()).collect();
    order.sort_by(|a, b| spectrum.peaks[*b].intensity.total_cmp(&spectrum.peaks[*a].intensity));
    for (rank, i) in order.into_iter().enumerate() {
        spectrum.peaks[i].rank = rank as u32;
    }
    spectrum
}

/// A spectrum holding every singly charged b- and y-ion of the template and one noise peak
pub(crate) fn linear_spectrum(template: &FragmentTemplate, precursor_charge: i32) -> ScoringSpectrum {
    let mut peaks = Vec::new();
    for (i, (b, y)) in template.b_ions.iter().zip(template.y_ions.iter()).enumerate() {
        peaks.push((*b, 100.0 + 10.0 * i as f32));
        peaks.push((*y, 105.0 + 10.0 * i as f32));
    }
    peaks.push((1333.3333, 20.0));
    let precursor_mz = (template.peptide_mass + precursor_charge as f64 * PROTON) / precursor_charge as f64;
    finish(peaks, precursor_mz, precursor_charge)
}

/// A spectrum of a peptide carrying `adduct` on residue `site`. Ions containing
/// the site are shifted by the adduct mass, and the shifted singly charged
/// precursor is present.
pub(crate) fn crosslinked_spectrum(
    template: &FragmentTemplate,
    site: usize,
    adduct: &FragmentAdduct,
    precursor_charge: i32,
) -> ScoringSpectrum {
    let n = template.len();
    let mut peaks = Vec::new();
    for (i, b) in template.b_ions.iter().enumerate() {
        let mz = if i >= site { b + adduct.mass } else { *b };
        peaks.push((mz, 100.0 + 10.0 * i as f32));
    }
    for (j, y) in template.y_ions.iter().enumerate() {
        let mz = if j >= n - site { y + adduct.mass } else { *y };
        peaks.push((mz, 105.0 + 10.0 * j as f32));
    }
    let mass = template.peptide_mass + adduct.mass;
    peaks.push((mass + PROTON, 50.0));
    peaks.push((1333.3333, 20.0));
    let precursor_mz = (mass + precursor_charge as f64 * PROTON) / precursor_charge as f64;
    finish(peaks, precursor_mz, precursor_charge)
}
