use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzcrosslinker")?;

    cmd.arg("not_real.mgf")
        .arg("./tests/data/test_proteins.fasta")
        .arg("-o")
        .arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("An IO error occurred"));
    Ok(())
}

#[test]
fn test_unknown_modification() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzcrosslinker")?;

    cmd.arg("./tests/data/crosslink_test.mgf")
        .arg("./tests/data/test_proteins.fasta")
        .args(["--fixed-modification", "Bogus (X)"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown modification"));
    Ok(())
}

#[test]
fn test_run_search() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzcrosslinker")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/crosslink_test.mgf")
        .arg("./tests/data/test_proteins.fasta")
        .args(["-o", "-", "-t", "2"]);
    let result = cmd.assert().success();
    result
        .stdout(predicate::str::starts_with("spectrum_index\tnative_id"))
        .stdout(predicate::str::contains("SAMPLER"))
        .stdout(predicate::str::contains("target"))
        .stderr(predicate::str::contains("MSn Spectra: 2 of 2 read"))
        .stderr(predicate::str::contains("PSMs Written:"));

    Ok(())
}

#[test]
fn test_run_search_json() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzcrosslinker")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/crosslink_test.mgf")
        .arg("./tests/data/test_proteins.fasta")
        .args(["-o", "-", "-f", "json", "-s", "fast"]);
    let result = cmd.assert().success();
    result
        .stdout(predicate::str::contains("\"peptide\":\"SAMPLER\""))
        .stdout(predicate::str::contains("\"cross_linked_nucleotide\":\"U\""));

    Ok(())
}

#[test]
fn test_precursor_interference_removed() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzcrosslinker")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/crosslink_test.mzML")
        .arg("./tests/data/test_proteins.fasta")
        .args(["-o", "-", "-t", "2"]);
    let result = cmd.assert().success();
    result
        .stdout(predicate::str::contains("SAMPLER"))
        .stderr(predicate::str::contains("MSn Spectra: 1 of 2 read"))
        .stderr(predicate::str::contains(
            "Removed 1 peaks matching co-isolated precursors",
        ));

    Ok(())
}
