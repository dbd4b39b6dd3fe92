use std::ops::{Add, AddAssign};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub spectra_read: usize,
    pub msn_spectra: usize,
    pub spectra_searched: usize,
    pub proteins: usize,
    pub peptides: usize,
    pub candidates: usize,
    pub spectra_with_hits: usize,
    pub psms_written: usize,
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.spectra_read += rhs.spectra_read;
        self.msn_spectra += rhs.msn_spectra;
        self.spectra_searched += rhs.spectra_searched;
        self.proteins += rhs.proteins;
        self.peptides += rhs.peptides;
        self.candidates += rhs.candidates;
        self.spectra_with_hits += rhs.spectra_with_hits;
        self.psms_written += rhs.psms_written;
    }
}
