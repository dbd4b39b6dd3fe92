use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use clap::Parser;
use crossbeam_channel::{bounded, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracing::{debug, info, warn};

use mzdata::prelude::*;
use mzdata::spectrum::SignalContinuity;
use mzdata::MZReader;
use mzpeaks::MZPeakSetType;

use mzcrosslink::{
    add_decoys, post_score, read_fasta, CandidateSearch, CrossLinkError, InterferenceEstimator,
    ModificationSet, PrecursorIndex, PreprocessingParams, Protein, ScoringSpectrum,
    SearchContext, SearchParameters, SpectrumPreprocessor,
};

use crate::args::{non_negative_float, ArgEnzyme, ArgPreset, ArgScoringMode, OutputFormat, ToleranceUnit};
use crate::progress::ProgressRecord;
use crate::types::{CPeak, SpectrumType, BUFFER_SIZE};
use crate::write::{collate_records, write_output, PsmRecord};

#[derive(Debug, Error)]
pub enum MZCrossLinkerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The search could not be configured: {0}")]
    SearchError(
        #[source]
        #[from]
        CrossLinkError,
    ),
    #[error("Failed to read the configuration: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("The {0} task failed")]
    TaskFailed(&'static str),
}

/// Identification of peptide-nucleic acid cross-links.
///
/// Read tandem mass spectra and a protein database, search every peptide with and
/// without nucleotide adducts, and write the best scoring matches per spectrum.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZCrossLinker {
    /// The path to read the input spectra from
    #[arg()]
    pub input_file: String,

    /// The FASTA protein database to search
    #[arg()]
    pub database: PathBuf,

    /// The path to write the PSM report to, or if '-' is passed, write to STDOUT.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The format of the PSM report
    #[arg(short = 'f', long = "output-format", default_value = "tsv")]
    pub output_format: OutputFormat,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzcrosslinker.toml` in the working directory.
    /// Environment variables prefixed with `MZCROSSLINKER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The size of the buffers queueing spectra and results between tasks
    #[arg(short = 'w', long = "write-buffer-size", default_value_t = BUFFER_SIZE)]
    pub write_buffer_size: usize,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The precursor mass tolerance
    #[arg(long = "precursor-tolerance", default_value_t = 6.0, value_parser = non_negative_float)]
    pub precursor_tolerance: f64,

    #[arg(long = "precursor-tolerance-unit", default_value = "ppm")]
    pub precursor_tolerance_unit: ToleranceUnit,

    /// The fragment mass tolerance
    #[arg(long = "fragment-tolerance", default_value_t = 20.0, value_parser = non_negative_float)]
    pub fragment_tolerance: f64,

    #[arg(long = "fragment-tolerance-unit", default_value = "ppm")]
    pub fragment_tolerance_unit: ToleranceUnit,

    #[arg(long = "min-precursor-charge", default_value_t = 2)]
    pub min_precursor_charge: i32,

    #[arg(long = "max-precursor-charge", default_value_t = 5)]
    pub max_precursor_charge: i32,

    /// The precursor isotope errors to consider, e.g. `0,-1`
    #[arg(long = "isotopes", value_delimiter = ',', default_value = "0", allow_hyphen_values = true)]
    pub isotopes: Vec<i32>,

    /// The number of cross-link and peptide matches to report per spectrum
    #[arg(short = 'k', long = "top-hits", default_value_t = 1)]
    pub top_hits: usize,

    /// How to score adduct-shifted fragment ions
    #[arg(short = 's', long = "scoring", default_value = "slow")]
    pub scoring: ArgScoringMode,

    /// The width of the m/z windows used to pick peaks
    #[arg(long = "window-size", default_value_t = 75.0, value_parser = non_negative_float)]
    pub window_size: f64,

    /// The number of peaks kept per m/z window
    #[arg(long = "peak-count", default_value_t = 20)]
    pub peak_count: usize,

    /// The number of peaks kept per spectrum
    #[arg(long = "max-peaks", default_value_t = 400)]
    pub max_peaks: usize,

    /// The isolation half-width assumed around precursors without an annotated
    /// isolation window, used to find co-isolated precursor peaks
    #[arg(long = "isolation-width", default_value_t = 1.5, value_parser = non_negative_float)]
    pub isolation_width: f64,

    /// Take the square root of peak intensities before scoring
    #[arg(long = "sqrt-intensity")]
    pub sqrt_intensity: bool,

    /// Search shuffled decoy proteins alongside the database
    #[arg(long = "decoys", default_value_t = true, action = clap::ArgAction::Set)]
    pub decoys: bool,

    /// The number of decoy copies of every protein
    #[arg(long = "decoy-factor", default_value_t = 1)]
    pub decoy_factor: usize,

    #[arg(long = "peptide-min-size", default_value_t = 6)]
    pub peptide_min_size: usize,

    #[arg(long = "peptide-max-size", default_value_t = 30)]
    pub peptide_max_size: usize,

    #[arg(long = "missed-cleavages", default_value_t = 2)]
    pub missed_cleavages: usize,

    #[arg(short = 'e', long = "enzyme", default_value = "trypsin-p")]
    pub enzyme: ArgEnzyme,

    /// Modifications applied to every peptide, e.g. "Carbamidomethyl (C)"
    #[arg(long = "fixed-modification")]
    pub fixed_modifications: Vec<String>,

    /// Modifications that may be present on a peptide
    #[arg(long = "variable-modification", default_values_t = vec!["Oxidation (M)".to_string()])]
    pub variable_modifications: Vec<String>,

    #[arg(long = "max-variable-mods-per-peptide", default_value_t = 2)]
    pub max_variable_mods_per_peptide: usize,

    /// The nucleotide chemistry to search for
    #[arg(short = 'p', long = "preset", default_value = "rna-uv-u")]
    pub preset: ArgPreset,

    /// The longest nucleotide chain to consider as a precursor adduct, 0 to search
    /// unmodified peptides only
    #[arg(long = "nucleotide-length", default_value_t = 2)]
    pub nucleotide_length: usize,

    /// Only consider nucleotide chains that occur in this sequence
    #[arg(long = "restrict-sequence")]
    pub restrict_sequence: Option<String>,

    /// The nucleotides that can cross-link, overriding the preset, e.g. "UC"
    #[arg(long = "can-cross-link")]
    pub can_cross_link: Option<String>,

    /// Skip spectra whose precursor mass has an implausible fractional part
    #[arg(long = "filter-fractional-mass")]
    pub filter_fractional_mass: bool,

    /// Skip spectra with a smaller neutral precursor mass
    #[arg(long = "filter-small-peptide-mass", default_value_t = 600.0, value_parser = non_negative_float)]
    pub filter_small_peptide_mass: f64,

    /// The factor to widen the fragment tolerance by when matching marker ions
    #[arg(long = "marker-ion-tolerance-factor", default_value_t = 2.0, value_parser = non_negative_float)]
    pub marker_ion_tolerance_factor: f64,

    /// Discard cross-links without a fragment ladder spanning the cross-link site
    #[arg(long = "require-xl-tag")]
    pub require_xl_tag: bool,

    /// Discard cross-links whose shifted ions are not supported by the linear ions
    #[arg(long = "filter-bad-partial-loss")]
    pub filter_bad_partial_loss: bool,
}

impl MZCrossLinker {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZCrossLinkerError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e).into())
    }

    pub fn search_parameters(&self) -> SearchParameters {
        SearchParameters {
            precursor_tolerance: self.precursor_tolerance_unit.tolerance(self.precursor_tolerance),
            fragment_tolerance: self.fragment_tolerance_unit.tolerance(self.fragment_tolerance),
            min_precursor_charge: self.min_precursor_charge,
            max_precursor_charge: self.max_precursor_charge,
            isotopes: self.isotopes.clone(),
            top_hits: self.top_hits,
            scoring: self.scoring.into(),
            marker_ion_tolerance_factor: self.marker_ion_tolerance_factor,
            require_xl_tag: self.require_xl_tag,
            filter_bad_partial_loss: self.filter_bad_partial_loss,
            filter_fractional_mass: self.filter_fractional_mass,
            filter_small_peptide_mass: self.filter_small_peptide_mass,
            enzyme: self.enzyme.into(),
            missed_cleavages: self.missed_cleavages,
            peptide_min_size: self.peptide_min_size,
            peptide_max_size: self.peptide_max_size,
            nucleotide_length: self.nucleotide_length,
            restrict_sequence: self.restrict_sequence.clone(),
            can_cross_link: self.can_cross_link.clone(),
        }
    }

    pub fn preprocessing_parameters(&self) -> PreprocessingParams {
        PreprocessingParams {
            window_size: self.window_size,
            peak_count: self.peak_count,
            max_peaks: self.max_peaks,
            sqrt_intensity: self.sqrt_intensity,
            interference_tolerance: self.fragment_tolerance_unit.tolerance(self.fragment_tolerance),
            ..Default::default()
        }
    }

    /// Validate the configuration and build the shared search state
    pub fn build_context(&self) -> Result<SearchContext, MZCrossLinkerError> {
        let modifications = ModificationSet::from_names(
            &self.fixed_modifications,
            &self.variable_modifications,
            self.max_variable_mods_per_peptide,
        )?;
        let context = SearchContext::from_preset(
            self.search_parameters(),
            self.preset.into(),
            modifications,
        )?;
        Ok(context)
    }

    fn load_database(&self) -> Result<Vec<Protein>, MZCrossLinkerError> {
        let handle = io::BufReader::new(fs::File::open(&self.database)?);
        let mut proteins = read_fasta(handle)?;
        info!("Read {} proteins from {}", proteins.len(), self.database.display());
        if self.decoys {
            add_decoys(&mut proteins, self.enzyme.into(), self.decoy_factor);
            debug!("{} proteins including decoys", proteins.len());
        }
        Ok(proteins)
    }

    fn open_output(&self) -> Result<Box<dyn io::Write + Send>, MZCrossLinkerError> {
        if self.output_file == PathBuf::from("-") {
            Ok(Box::new(io::BufWriter::new(io::stdout())))
        } else {
            Ok(Box::new(io::BufWriter::new(fs::File::create(
                &self.output_file,
            )?)))
        }
    }

    pub fn main(&self) -> Result<(), MZCrossLinkerError> {
        info!(
            "mzcrosslinker v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        info!("Database: {}", self.database.display());
        info!("Output: {}", self.output_file.display());
        match toml::to_string_pretty(self) {
            Ok(config) => debug!("Configuration:\n{config}"),
            Err(e) => warn!("Failed to render the configuration: {e}"),
        }
        let context = self.build_context()?;
        self.create_threadpool()?.install(|| self.run_workflow(&context))
    }

    fn run_workflow(&self, context: &SearchContext) -> Result<(), MZCrossLinkerError> {
        let start = Instant::now();
        let (send_spectra, recv_spectra) = bounded(self.write_buffer_size);
        let input_file = self.input_file.clone();
        let estimator = InterferenceEstimator::new(
            self.isolation_width,
            self.precursor_tolerance_unit.tolerance(self.precursor_tolerance),
        );
        let read_task =
            thread::spawn(move || read_spectra(input_file, estimator, send_spectra));

        let proteins = self.load_database()?;
        let raw_spectra: Vec<ScoringSpectrum> = recv_spectra.iter().collect();
        let mut prog = match read_task.join() {
            Ok(o) => o?,
            Err(e) => {
                warn!("Failed to join reader task: {e:?}");
                return Err(MZCrossLinkerError::TaskFailed("reader"));
            }
        };

        let preprocessor = SpectrumPreprocessor::new(self.preprocessing_parameters());
        let spectra = preprocessor.process_all(raw_spectra, &context.ambiguity);
        let index = PrecursorIndex::build(&spectra, &context.parameters);
        prog.spectra_searched = spectra.len();

        let search = CandidateSearch::new(context, &spectra, &index);
        let summary = search.search(&proteins);
        let mut hits = search.into_hits();
        post_score(context, &spectra, &mut hits);
        prog.proteins = summary.proteins;
        prog.peptides = summary.peptides;
        prog.candidates = summary.candidates;

        let (send_psms, recv_psms) = bounded::<Vec<PsmRecord>>(self.write_buffer_size);
        let writer = self.open_output()?;
        let output_format = self.output_format;
        let write_task = thread::spawn(move || write_output(writer, output_format, recv_psms));

        for (spectrum, spectrum_hits) in spectra.iter().zip(hits.iter()) {
            if spectrum_hits.is_empty() {
                continue;
            }
            prog.spectra_with_hits += 1;
            if let Err(e) = send_psms.send(collate_records(context, spectrum, spectrum_hits)) {
                warn!("Failed to send PSMs for {}: {}", spectrum.native_id, e);
                break;
            }
        }
        drop(send_psms);

        match write_task.join() {
            Ok(o) => prog.psms_written = o?,
            Err(e) => {
                warn!("Failed to join writer task: {e:?}");
                return Err(MZCrossLinkerError::TaskFailed("writer"));
            }
        }

        info!("MSn Spectra: {} of {} read", prog.msn_spectra, prog.spectra_read);
        info!("Spectra Searched: {}", prog.spectra_searched);
        info!(
            "Proteins: {} | Peptides: {} | Candidates: {}",
            prog.proteins, prog.peptides, prog.candidates
        );
        info!("Spectra With Hits: {}", prog.spectra_with_hits);
        info!("PSMs Written: {}", prog.psms_written);
        info!("Total Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }
}

/// Centroid the peaks of a survey scan
fn survey_peaks(spectrum: &mut SpectrumType) -> Option<MZPeakSetType<CPeak>> {
    let picked = match spectrum.signal_continuity() {
        SignalContinuity::Profile => spectrum
            .pick_peaks(1.0)
            .map(|_| ())
            .map_err(|e| format!("{e:?}")),
        _ => spectrum
            .try_build_centroids()
            .map(|_| ())
            .map_err(|e| format!("{e:?}")),
    };
    if let Err(e) = picked {
        warn!("Failed to centroid survey scan {}: {e}", spectrum.id());
        return None;
    }
    spectrum.peaks.clone()
}

fn read_spectra(
    path: String,
    estimator: InterferenceEstimator,
    sender: Sender<ScoringSpectrum>,
) -> Result<ProgressRecord, MZCrossLinkerError> {
    let reader = MZReader::open_path(&path)?;
    let mut prog = ProgressRecord::default();
    let mut survey: Option<MZPeakSetType<CPeak>> = None;
    for spectrum in reader {
        let mut spectrum: SpectrumType = spectrum;
        prog.spectra_read += 1;
        if spectrum.ms_level() == 1 {
            survey = survey_peaks(&mut spectrum);
            continue;
        }
        match ScoringSpectrum::from_spectrum(&spectrum) {
            Ok(Some(mut converted)) => {
                prog.msn_spectra += 1;
                if let (Some(peaks), Some(precursor)) = (survey.as_ref(), spectrum.precursor()) {
                    converted.interference = estimator.interfering_peaks(
                        peaks,
                        converted.precursor_mz,
                        converted.precursor_charge,
                        Some(&precursor.isolation_window),
                    );
                }
                if let Err(e) = sender.send(converted) {
                    warn!("Failed to send spectrum: {}", e);
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping spectrum: {e}"),
        }
    }
    debug!("Read {} spectra from {path}", prog.spectra_read);
    Ok(prog)
}
