use std::fs;

use figment::{
    providers::{Format, Toml},
    Figment,
};

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_configured_search() {
    let mut config = Figment::new();
    config = config.merge(Toml::file_exact("./tests/data/crosslink_test.toml"));
    let mut driver: mzcrosslinker::MZCrossLinker = config.extract().unwrap();
    let output = std::env::temp_dir().join("mzcrosslinker_configured_test.tsv");
    driver.output_file = output.clone();
    driver.main().unwrap();

    let report = fs::read_to_string(&output).unwrap();
    let mut lines = report.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let peptide_col = header.iter().position(|c| *c == "peptide").unwrap();
    let nucleotide_col = header
        .iter()
        .position(|c| *c == "cross_linked_nucleotide")
        .unwrap();
    let localization_col = header
        .iter()
        .position(|c| *c == "best_localization")
        .unwrap();
    let best = lines
        .map(|line| line.split('\t').collect::<Vec<_>>())
        .find(|row| row[peptide_col] == "SAMPLER")
        .unwrap();
    assert_eq!(best[nucleotide_col], "U");
    assert_eq!(best[localization_col], "SAMpLER");
    fs::remove_file(output).ok();
}
