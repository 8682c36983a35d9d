//! Greedy best-path decoding: per-frame arg-max, then collapse.
//!
//! A convenience pass over raw network output, independent of the lattice
//! machinery: it keeps the frame-wise arg-max predictions as-is and derives
//! the label sequence by dropping blanks and merging consecutive repeats.

use crate::buffers::{Activations, BLANK};

/// Decoded output for one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Collapsed label sequence: blanks removed, consecutive raw repeats
    /// merged to their first occurrence.
    pub labels: Vec<usize>,
    /// Raw per-frame arg-max predictions, unmodified.
    pub raw: Vec<usize>,
}

/// Collapse raw per-frame predictions into a label sequence.
///
/// A frame survives iff it is non-blank and differs from the previous raw
/// frame, so repeated emissions merge and blank-separated repeats stay
/// distinct.
pub fn collapse(raw: &[usize]) -> Vec<usize> {
    let mut labels = Vec::new();
    let mut prev = None;
    for &c in raw {
        if c != BLANK && prev != Some(c) {
            labels.push(c);
        }
        prev = Some(c);
    }
    labels
}

/// Greedy-decode every sequence in a batch of activations.
///
/// Ties in the arg-max resolve to the lowest class index.
pub fn greedy_decode(activations: &Activations) -> Vec<Decoded> {
    (0..activations.batch())
        .map(|i| {
            let scores = activations.sequence(i);
            let raw: Vec<usize> = (0..scores.time())
                .map(|t| argmax(scores.frame(t)))
                .collect();
            Decoded {
                labels: collapse(&raw),
                raw,
            }
        })
        .collect()
}

#[inline]
fn argmax(frame: &[f64]) -> usize {
    let mut best = 0;
    for (k, &v) in frame.iter().enumerate().skip(1) {
        if v > frame[best] {
            best = k;
        }
    }
    best
}
