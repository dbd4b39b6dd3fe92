use std::io;

use crossbeam_channel::Receiver;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

use mzcrosslink::adduct::NO_ADDUCT;
use mzcrosslink::{AnnotatedHit, ScoringSpectrum, SearchContext, SpectrumHits};

use crate::args::OutputFormat;

/// One reported peptide-spectrum match
#[derive(Debug, Clone, Serialize)]
pub struct PsmRecord {
    pub spectrum_index: usize,
    pub native_id: String,
    pub rt: f64,
    pub precursor_mz: f64,
    pub precursor_charge: i32,
    pub rank: usize,
    pub cross_link: bool,
    pub peptide: String,
    pub modified_peptide: String,
    pub label: &'static str,
    pub adduct: String,
    pub adduct_formula: String,
    pub adduct_mass: f64,
    pub cross_linked_nucleotide: Option<char>,
    pub isotope_error: i32,
    pub score: f64,
    pub total_loss_score: f64,
    pub partial_loss_score: f64,
    pub mic: f64,
    pub err: f64,
    pub morph: f64,
    pub modds: f64,
    pub immonium_score: f64,
    pub precursor_score: f64,
    pub pl_mic: f64,
    pub pl_err: f64,
    pub pl_morph: f64,
    pub pl_modds: f64,
    pub pl_pc_mic: f64,
    pub pl_im_mic: f64,
    pub marker_ions_score: f64,
    pub total_mic: f64,
    pub ladder_score: f64,
    pub sequence_score: f64,
    pub mass_error_p: f64,
    pub explained_peak_fraction: f64,
    pub matched_theo_fraction: f64,
    pub w_top50: f64,
    pub tag_unshifted: usize,
    pub tag_shifted: usize,
    pub tag_xled: usize,
    pub best_localization: String,
    pub best_localization_score: f64,
    pub best_localization_position: Option<usize>,
    pub localization_scores: String,
}

const COLUMNS: &[&str] = &[
    "spectrum_index",
    "native_id",
    "rt",
    "precursor_mz",
    "precursor_charge",
    "rank",
    "cross_link",
    "peptide",
    "modified_peptide",
    "label",
    "adduct",
    "adduct_formula",
    "adduct_mass",
    "cross_linked_nucleotide",
    "isotope_error",
    "score",
    "total_loss_score",
    "partial_loss_score",
    "mic",
    "err",
    "morph",
    "modds",
    "immonium_score",
    "precursor_score",
    "pl_mic",
    "pl_err",
    "pl_morph",
    "pl_modds",
    "pl_pc_mic",
    "pl_im_mic",
    "marker_ions_score",
    "total_mic",
    "ladder_score",
    "sequence_score",
    "mass_error_p",
    "explained_peak_fraction",
    "matched_theo_fraction",
    "w_top50",
    "tag_unshifted",
    "tag_shifted",
    "tag_xled",
    "best_localization",
    "best_localization_score",
    "best_localization_position",
    "localization_scores",
];

impl PsmRecord {
    pub fn new(
        context: &SearchContext,
        spectrum: &ScoringSpectrum,
        hit: &AnnotatedHit,
        rank: usize,
        cross_link: bool,
    ) -> Self {
        let (adduct, adduct_formula, adduct_mass) = match context.adducts.get(hit.na_mod_index) {
            Some(a) => (
                context
                    .adducts
                    .name(hit.na_mod_index, hit.na_adduct_amb_index)
                    .unwrap_or(NO_ADDUCT)
                    .to_string(),
                a.key.clone(),
                a.mass,
            ),
            None => {
                warn!(
                    "Adduct index {} of {} is out of range",
                    hit.na_mod_index,
                    hit.sequence()
                );
                (NO_ADDUCT.to_string(), String::new(), 0.0)
            }
        };
        let modified_peptide = context
            .modifications
            .variants(hit.sequence())
            .get(hit.peptide_mod_index)
            .map(|v| v.to_string())
            .unwrap_or_else(|| hit.sequence().to_string());

        Self {
            spectrum_index: spectrum.index,
            native_id: spectrum.native_id.clone(),
            rt: spectrum.rt,
            precursor_mz: spectrum.precursor_mz,
            precursor_charge: spectrum.precursor_charge,
            rank,
            cross_link,
            peptide: hit.sequence().to_string(),
            modified_peptide,
            label: if hit.is_decoy { "decoy" } else { "target" },
            adduct,
            adduct_formula,
            adduct_mass,
            cross_linked_nucleotide: hit.cross_linked_nucleotide,
            isotope_error: hit.isotope_error,
            score: hit.score,
            total_loss_score: hit.total_loss_score,
            partial_loss_score: hit.partial_loss_score,
            mic: hit.mic,
            err: hit.err,
            morph: hit.morph,
            modds: hit.modds,
            immonium_score: hit.immonium_score,
            precursor_score: hit.precursor_score,
            pl_mic: hit.pl_mic,
            pl_err: hit.pl_err,
            pl_morph: hit.pl_morph,
            pl_modds: hit.pl_modds,
            pl_pc_mic: hit.pl_pc_mic,
            pl_im_mic: hit.pl_im_mic,
            marker_ions_score: hit.marker_ions_score,
            total_mic: hit.total_mic,
            ladder_score: hit.ladder_score,
            sequence_score: hit.sequence_score,
            mass_error_p: hit.mass_error_p,
            explained_peak_fraction: hit.explained_peak_fraction,
            matched_theo_fraction: hit.matched_theo_fraction,
            w_top50: hit.w_top50,
            tag_unshifted: hit.tags.tag_unshifted,
            tag_shifted: hit.tags.tag_shifted,
            tag_xled: hit.tags.tag_xled,
            best_localization: hit.best_localization.clone(),
            best_localization_score: hit.best_localization_score,
            best_localization_position: hit.best_localization_position,
            localization_scores: hit.localization_scores.clone(),
        }
    }

    fn tsv_fields(&self) -> Vec<String> {
        let opt = |v: Option<String>| v.unwrap_or_default();
        vec![
            self.spectrum_index.to_string(),
            self.native_id.clone(),
            self.rt.to_string(),
            self.precursor_mz.to_string(),
            self.precursor_charge.to_string(),
            self.rank.to_string(),
            self.cross_link.to_string(),
            self.peptide.clone(),
            self.modified_peptide.clone(),
            self.label.to_string(),
            self.adduct.clone(),
            self.adduct_formula.clone(),
            self.adduct_mass.to_string(),
            opt(self.cross_linked_nucleotide.map(|c| c.to_string())),
            self.isotope_error.to_string(),
            self.score.to_string(),
            self.total_loss_score.to_string(),
            self.partial_loss_score.to_string(),
            self.mic.to_string(),
            self.err.to_string(),
            self.morph.to_string(),
            self.modds.to_string(),
            self.immonium_score.to_string(),
            self.precursor_score.to_string(),
            self.pl_mic.to_string(),
            self.pl_err.to_string(),
            self.pl_morph.to_string(),
            self.pl_modds.to_string(),
            self.pl_pc_mic.to_string(),
            self.pl_im_mic.to_string(),
            self.marker_ions_score.to_string(),
            self.total_mic.to_string(),
            self.ladder_score.to_string(),
            self.sequence_score.to_string(),
            self.mass_error_p.to_string(),
            self.explained_peak_fraction.to_string(),
            self.matched_theo_fraction.to_string(),
            self.w_top50.to_string(),
            self.tag_unshifted.to_string(),
            self.tag_shifted.to_string(),
            self.tag_xled.to_string(),
            self.best_localization.clone(),
            self.best_localization_score.to_string(),
            opt(self.best_localization_position.map(|p| p.to_string())),
            self.localization_scores.clone(),
        ]
    }
}

/// Build the records of one spectrum, cross-links first, each list best first
pub(crate) fn collate_records(
    context: &SearchContext,
    spectrum: &ScoringSpectrum,
    hits: &SpectrumHits,
) -> Vec<PsmRecord> {
    let cross_links = hits
        .cross_links
        .iter()
        .enumerate()
        .map(|(i, hit)| PsmRecord::new(context, spectrum, hit, i + 1, true));
    let peptides = hits
        .peptides
        .iter()
        .enumerate()
        .map(|(i, hit)| PsmRecord::new(context, spectrum, hit, i + 1, false));
    cross_links.chain(peptides).collect()
}

/// Write records as they arrive until the sender hangs up, returning the number written
pub(crate) fn write_output<W: io::Write>(
    mut writer: W,
    format: OutputFormat,
    receiver: Receiver<Vec<PsmRecord>>,
) -> io::Result<usize> {
    let mut written = 0;
    if format == OutputFormat::Tsv {
        writeln!(writer, "{}", COLUMNS.iter().join("\t"))?;
    }
    for records in receiver.iter() {
        for record in records {
            match format {
                OutputFormat::Tsv => {
                    writeln!(writer, "{}", record.tsv_fields().iter().join("\t"))?;
                }
                OutputFormat::Json => {
                    serde_json::to_writer(&mut writer, &record)?;
                    writeln!(writer)?;
                }
            }
            written += 1;
        }
    }
    writer.flush()?;
    debug!("Wrote {written} PSMs");
    Ok(written)
}

#[cfg(test)]
mod test {
    use super::*;
    use crossbeam_channel::bounded;
    use mzcrosslink::digest::PeptideRef;
    use mzcrosslink::{ModificationSet, Preset, SearchParameters};
    use std::sync::Arc;

    fn record(format: OutputFormat) -> String {
        let ctx = SearchContext::from_preset(
            SearchParameters::default(),
            Preset::RnaUvU,
            ModificationSet::default(),
        )
        .unwrap();
        let spectrum = ScoringSpectrum::new(3, "scan=4".into(), 12.5, 500.25, 2, Vec::new());
        let peptide = PeptideRef::new(Arc::from("KSAMPLER"), 1..8);
        let mut hit = AnnotatedHit::new(peptide, true, 0, 0);
        hit.score = 4.5;
        let mut hits = SpectrumHits::default();
        hits.push_peptide(hit, 1);

        let (send, recv) = bounded(1);
        send.send(collate_records(&ctx, &spectrum, &hits)).unwrap();
        drop(send);
        let mut buf = Vec::new();
        assert_eq!(write_output(&mut buf, format, recv).unwrap(), 1);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_write_tsv() {
        let text = record(OutputFormat::Tsv);
        let mut lines = text.lines();
        let header: Vec<_> = lines.next().unwrap().split('\t').collect();
        let row: Vec<_> = lines.next().unwrap().split('\t').collect();
        assert_eq!(header.len(), COLUMNS.len());
        assert_eq!(row.len(), COLUMNS.len());
        assert_eq!(row[1], "scan=4");
        assert_eq!(row[7], "SAMPLER");
        assert_eq!(row[9], "decoy");
        assert_eq!(row[10], NO_ADDUCT);
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_json() {
        let text = record(OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["peptide"], "SAMPLER");
        assert_eq!(value["score"], 4.5);
        assert_eq!(value["cross_linked_nucleotide"], serde_json::Value::Null);
    }
}
