//! Ladder and tag analysis over per-bond matched intensities.
use std::ops::Range;

/// The longest runs of consecutive matched bonds found for a candidate
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XLTags {
    pub tag_unshifted: usize,
    pub tag_shifted: usize,
    /// The longest run that crosses from unshifted into adduct-shifted bonds
    pub tag_xled: usize,
}

/// The Morpheus style score of a ladder: the number of matched bonds plus
/// their summed intensity
pub fn ladder_score(intensities: &[f64]) -> f64 {
    intensities
        .iter()
        .filter(|i| **i > 0.0)
        .fold(0.0, |acc, i| acc + 1.0 + i)
}

/// The range of the longest run of non-zero values, empty if there is none.
/// The first of several equally long runs wins.
pub fn longest_complete_ladder(intensities: &[f64]) -> Range<usize> {
    let mut best = 0..0;
    let mut start = 0;
    let mut in_run = false;
    for (i, v) in intensities.iter().enumerate() {
        if *v > 0.0 {
            if !in_run {
                start = i;
                in_run = true;
            }
            if i + 1 - start > best.len() {
                best = start..(i + 1);
            }
        } else {
            in_run = false;
        }
    }
    best
}

fn forward_runs(values: &[f64]) -> (Vec<usize>, usize) {
    let mut runs = vec![0; values.len()];
    let mut run = 0;
    let mut longest = 0;
    for (i, v) in values.iter().enumerate() {
        if *v == 0.0 {
            run = 0;
            continue;
        }
        run += 1;
        runs[i] = run;
        longest = longest.max(run);
    }
    (runs, longest)
}

fn backward_runs(values: &[f64]) -> (Vec<usize>, usize) {
    let mut runs = vec![0; values.len()];
    let mut run = 0;
    let mut longest = 0;
    for (i, v) in values.iter().enumerate().rev() {
        if *v == 0.0 {
            run = 0;
            continue;
        }
        run += 1;
        runs[i] = run;
        longest = longest.max(run);
    }
    (runs, longest)
}

/// The longest junction from `left` ending at bond `i` into `right` starting at
/// bond `i + 1`. A single bond without evidence in either series may separate the two.
fn longest_junction(left: &[usize], right: &[usize], gap_free: impl Fn(usize) -> bool) -> usize {
    let n = left.len();
    let mut best = 0;
    for i in 0..n.saturating_sub(1) {
        if left[i] == 0 {
            continue;
        }
        if right[i + 1] != 0 {
            best = best.max(left[i] + right[i + 1]);
        } else if i + 2 < n && right[i + 2] != 0 && gap_free(i + 1) {
            best = best.max(left[i] + right[i + 2]);
        }
    }
    best
}

/// Find the longest unshifted, shifted and cross-link spanning ladders.
///
/// `ab` and `y` hold the unshifted N- and C-terminal evidence per bond, `ab_xl`
/// and `y_xl` the adduct-shifted evidence. The shifted arrays may be empty for
/// candidates without an adduct.
pub fn longest_ladder_with_shift(ab: &[f64], y: &[f64], ab_xl: &[f64], y_xl: &[f64]) -> XLTags {
    debug_assert_eq!(ab.len(), y.len());
    debug_assert_eq!(ab_xl.len(), y_xl.len());

    let (run_ab, max_ab) = forward_runs(ab);
    let (run_y, max_y) = backward_runs(y);
    let mut tags = XLTags {
        tag_unshifted: max_ab.max(max_y),
        ..Default::default()
    };

    if ab_xl.is_empty() {
        return tags;
    }
    debug_assert_eq!(ab_xl.len(), ab.len());

    let (run_ab_xl, max_ab_xl) = backward_runs(ab_xl);
    let (run_y_xl, max_y_xl) = forward_runs(y_xl);
    tags.tag_shifted = max_ab_xl.max(max_y_xl);

    // N-terminal ions run unshifted up to the cross-link, then shifted
    let prefix = longest_junction(&run_ab, &run_ab_xl, |k| ab[k] == 0.0 && ab_xl[k] == 0.0);
    // C-terminal ions run shifted up to the cross-link, then unshifted
    let suffix = longest_junction(&run_y_xl, &run_y, |k| y[k] == 0.0 && y_xl[k] == 0.0);
    tags.tag_xled = prefix.max(suffix);
    tags
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_longest_unshifted() {
        let ab = [0.0, 1.0, 2.0, 0.0, 3.0, 4.0, 5.0, 0.0];
        let zeros = [0.0; 8];
        let tags = longest_ladder_with_shift(&ab, &zeros, &[], &[]);
        assert_eq!(tags.tag_unshifted, 3);
        assert_eq!(tags.tag_shifted, 0);
        assert_eq!(tags.tag_xled, 0);
    }

    #[test]
    fn test_junction_adjacent() {
        let ab = [1.0, 2.0, 0.0, 0.0, 0.0];
        let ab_xl = [0.0, 0.0, 3.0, 4.0, 0.0];
        let zeros = [0.0; 5];
        let tags = longest_ladder_with_shift(&ab, &zeros, &ab_xl, &zeros);
        assert_eq!(tags.tag_unshifted, 2);
        assert_eq!(tags.tag_shifted, 2);
        assert_eq!(tags.tag_xled, 4);
    }

    #[test]
    fn test_junction_one_gap() {
        let ab = [1.0, 2.0, 0.0, 0.0, 0.0];
        let ab_xl = [0.0, 0.0, 0.0, 3.0, 4.0];
        let zeros = [0.0; 5];
        let tags = longest_ladder_with_shift(&ab, &zeros, &ab_xl, &zeros);
        assert_eq!(tags.tag_xled, 4);

        // two missing bonds break the ladder
        let ab_xl = [0.0, 0.0, 0.0, 0.0, 4.0];
        let tags = longest_ladder_with_shift(&ab, &zeros, &ab_xl, &zeros);
        assert_eq!(tags.tag_xled, 0);
    }

    #[test]
    fn test_suffix_junction() {
        let y = [0.0, 0.0, 0.0, 5.0, 6.0];
        let y_xl = [1.0, 1.0, 1.0, 0.0, 0.0];
        let zeros = [0.0; 5];
        let tags = longest_ladder_with_shift(&zeros, &y, &zeros, &y_xl);
        assert_eq!(tags.tag_xled, 5);
    }

    #[test]
    fn test_ladder_scores() {
        let v = [0.0, 0.1, 0.2, 0.0, 0.3, 0.3, 0.3, 0.0];
        assert!((ladder_score(&v) - (5.0 + 1.2)).abs() < 1e-12);
        assert_eq!(longest_complete_ladder(&v), 4..7);
        assert_eq!(longest_complete_ladder(&[0.0, 0.0]), 0..0);
        assert_eq!(longest_complete_ladder(&[1.0, 0.0, 1.0]), 0..1);
    }
}
