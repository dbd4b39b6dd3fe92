//! De novo amino acid tags from the mass differences between fragment peaks.
use std::collections::BTreeSet;

use crate::mass::natural19_without_isoleucine;

/// Reads residue tags off a peak list by walking mass gaps that match a residue.
#[derive(Debug, Clone)]
pub struct Tagger {
    pub tolerance: f64,
    pub min_tag_length: usize,
    pub max_tag_length: usize,
    residues: Vec<(f64, char)>,
    min_gap: f64,
    max_gap: f64,
}

impl Tagger {
    pub fn new(tolerance: f64, min_tag_length: usize, max_tag_length: usize) -> Self {
        let mut residues: Vec<(f64, char)> = natural19_without_isoleucine()
            .into_iter()
            .map(|(c, m)| (m, c))
            .collect();
        residues.sort_by(|a, b| a.0.total_cmp(&b.0));
        let min_gap = residues.first().map(|r| r.0).unwrap_or_default() - tolerance;
        let max_gap = residues.last().map(|r| r.0).unwrap_or_default() + tolerance;
        Self {
            tolerance,
            min_tag_length,
            max_tag_length,
            residues,
            min_gap,
            max_gap,
        }
    }

    /// The first residue whose mass lies within tolerance of `gap`
    pub fn residue_for_gap(&self, gap: f64) -> Option<char> {
        let i = self
            .residues
            .partition_point(|(m, _)| *m < gap - self.tolerance);
        self.residues
            .get(i)
            .filter(|(m, _)| *m <= gap + self.tolerance)
            .map(|(_, c)| *c)
    }

    fn extend_tag(&self, mzs: &[f64], i: usize, tag: &mut String, tags: &mut BTreeSet<String>) {
        if tag.len() >= self.max_tag_length {
            return;
        }
        for j in (i + 1)..mzs.len() {
            let gap = mzs[j] - mzs[i];
            if gap > self.max_gap {
                return;
            }
            if gap < self.min_gap {
                continue;
            }
            let Some(aa) = self.residue_for_gap(gap) else {
                continue;
            };
            tag.push(aa);
            if tag.len() >= self.min_tag_length {
                tags.insert(tag.clone());
            }
            self.extend_tag(mzs, j, tag, tags);
            tag.pop();
        }
    }

    /// Enumerate every distinct tag between the minimum and maximum tag length.
    ///
    /// `mzs` must be sorted in ascending order.
    pub fn tags(&self, mzs: &[f64]) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        if mzs.len() < self.min_tag_length + 1 {
            return tags;
        }
        let mut tag = String::with_capacity(self.max_tag_length.min(64));
        for i in 0..(mzs.len() - self.min_tag_length) {
            self.extend_tag(mzs, i, &mut tag, &mut tags);
        }
        tags
    }

    /// The length of the longest tag that can be read from the peak list,
    /// or zero if it is shorter than the minimum tag length.
    ///
    /// This computes the longest path through the gap graph directly instead of
    /// enumerating tags.
    pub fn longest_tag_length(&self, mzs: &[f64]) -> usize {
        let n = mzs.len();
        let mut longest_from = vec![0usize; n];
        let mut best = 0;
        for i in (0..n).rev() {
            let mut local = 0;
            for j in (i + 1)..n {
                let gap = mzs[j] - mzs[i];
                if gap > self.max_gap {
                    break;
                }
                if gap < self.min_gap || self.residue_for_gap(gap).is_none() {
                    continue;
                }
                local = local.max(1 + longest_from[j]);
            }
            longest_from[i] = local.min(self.max_tag_length);
            best = best.max(longest_from[i]);
        }
        if best >= self.min_tag_length {
            best
        } else {
            0
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mass::residue_mass;

    fn ladder(seq: &str, start: f64) -> Vec<f64> {
        let mut mzs = vec![start];
        let mut acc = start;
        for aa in seq.bytes() {
            acc += residue_mass(aa).unwrap();
            mzs.push(acc);
        }
        mzs
    }

    #[test]
    fn test_tags() {
        let mzs = ladder("PEW", 200.0);
        let tagger = Tagger::new(0.03, 1, 2);
        let tags = tagger.tags(&mzs);
        assert!(tags.contains("P"));
        assert!(tags.contains("PE"));
        assert!(tags.contains("EW"));
        assert!(!tags.contains("PEW"));
    }

    #[test]
    fn test_longest_tag() {
        let mut mzs = ladder("SAMPLER", 300.0);
        mzs.push(150.0);
        mzs.sort_by(|a, b| a.total_cmp(b));
        let tagger = Tagger::new(0.03, 3, usize::MAX);
        assert_eq!(tagger.longest_tag_length(&mzs), 7);
        assert_eq!(tagger.longest_tag_length(&mzs[..3]), 0);
    }
}
