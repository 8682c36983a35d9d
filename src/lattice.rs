//! Forward and backward lattices over the expanded target sequence.
//!
//! A target of effective length L expands into `S = 2L + 1` segments
//! alternating blank/label/blank/…/blank: even segments are blank slots,
//! odd segment `s` carries label `target[s/2]`. The forward variable
//! `f[t][s]` is the log-mass of all alignments of frames `0..=t` ending in
//! segment `s`; the backward variable `b[t][s]` is the log-mass of all
//! alignments of frames `t..T` starting in segment `s`.
//!
//! Both passes are confined to the reachable band (see [`band`]); everything
//! outside it keeps the exact [`LOG_ZERO`] sentinel, which the recurrences
//! rely on.

use crate::buffers::{SequenceScores, BLANK};
use crate::logmath::{log_add, log_mul, LOG_ONE, LOG_ZERO};

/// Dense `[time][segment]` scratch lattice, initialized to [`LOG_ZERO`].
///
/// Allocated fresh per sequence per evaluation and discarded afterwards;
/// never shared across sequences or calls.
#[derive(Debug, Clone)]
pub(crate) struct Lattice {
    data: Vec<f64>,
    segments: usize,
}

impl Lattice {
    pub(crate) fn new(time: usize, segments: usize) -> Self {
        Self {
            data: vec![LOG_ZERO; time * segments],
            segments,
        }
    }

    #[inline]
    pub(crate) fn segments(&self) -> usize {
        self.segments
    }

    #[inline]
    pub(crate) fn at(&self, t: usize, s: usize) -> f64 {
        self.data[t * self.segments + s]
    }

    #[inline]
    fn set(&mut self, t: usize, s: usize, v: f64) {
        self.data[t * self.segments + s] = v;
    }
}

/// Half-open segment range reachable at timestep `t` of a `time`-frame
/// sequence with `segments = 2L + 1`.
///
/// Upper bound: an alignment of the first `t + 1` frames starts in segment
/// 0 or 1 and advances at most two segments per frame, so it ends no later
/// than segment `1 + 2t`; the exclusive bound is `2(t + 1)`. Lower bound:
/// the remaining `time - 1 - t` transitions advance at most two segments
/// and must still reach segment `S − 2` or `S − 1`, so
/// `s ≥ S − 2(time − t)`.
#[inline]
pub(crate) fn band(t: usize, time: usize, segments: usize) -> (usize, usize) {
    let begin = segments.saturating_sub(2 * (time - t));
    let end = segments.min(2 * (t + 1));
    (begin, end)
}

/// Forward pass: fill `f[t][s]` for one sequence.
///
/// `labels` is the effective (non-padded) target; the lattice has
/// `2 * labels.len() + 1` segments.
pub(crate) fn forward(scores: &SequenceScores<'_>, labels: &[usize]) -> Lattice {
    let time = scores.time();
    let segments = 2 * labels.len() + 1;
    let mut fvars = Lattice::new(time, segments);

    fvars.set(0, 0, scores.score(0, BLANK));
    if segments > 1 {
        fvars.set(0, 1, scores.score(0, labels[0]));
    }

    for t in 1..time {
        let (s_begin, s_end) = band(t, time, segments);
        for s in s_begin..s_end {
            let fv = if s % 2 == 1 {
                let label = labels[s / 2];
                let mut fv = log_add(fvars.at(t - 1, s), fvars.at(t - 1, s - 1));
                // Identical consecutive labels must be separated by a blank,
                // so the two-segment skip only exists when they differ.
                if s > 1 && label != labels[s / 2 - 1] {
                    fv = log_add(fv, fvars.at(t - 1, s - 2));
                }
                log_mul(fv, scores.score(t, label))
            } else {
                let mut fv = fvars.at(t - 1, s);
                if s > 0 {
                    fv = log_add(fv, fvars.at(t - 1, s - 1));
                }
                log_mul(fv, scores.score(t, BLANK))
            };
            fvars.set(t, s, fv);
        }
    }

    fvars
}

/// Total log-likelihood of the sequence: mass of alignments ending in the
/// final blank or, when a target exists, the final label.
pub(crate) fn log_likelihood(fvars: &Lattice, time: usize) -> f64 {
    let segments = fvars.segments();
    let mut log_prob = fvars.at(time - 1, segments - 1);
    if segments > 1 {
        log_prob = log_add(log_prob, fvars.at(time - 1, segments - 2));
    }
    log_prob
}

/// Backward pass: fill `b[t][s]` for one sequence, mirroring [`forward`]
/// from the last frame inward using the activations at `t + 1`.
pub(crate) fn backward(scores: &SequenceScores<'_>, labels: &[usize]) -> Lattice {
    let time = scores.time();
    let segments = 2 * labels.len() + 1;
    let mut bvars = Lattice::new(time, segments);

    bvars.set(time - 1, segments - 1, LOG_ONE);
    if segments > 1 {
        bvars.set(time - 1, segments - 2, LOG_ONE);
    }

    for t in (0..time.saturating_sub(1)).rev() {
        let (s_begin, s_end) = band(t, time, segments);
        for s in s_begin..s_end {
            let bv = if s % 2 == 1 {
                let label = labels[s / 2];
                let mut bv = log_add(
                    log_mul(bvars.at(t + 1, s), scores.score(t + 1, label)),
                    log_mul(bvars.at(t + 1, s + 1), scores.score(t + 1, BLANK)),
                );
                if s < segments - 2 {
                    let next_label = labels[s / 2 + 1];
                    if label != next_label {
                        bv = log_add(
                            bv,
                            log_mul(bvars.at(t + 1, s + 2), scores.score(t + 1, next_label)),
                        );
                    }
                }
                bv
            } else {
                let mut bv = log_mul(bvars.at(t + 1, s), scores.score(t + 1, BLANK));
                if s < segments - 1 {
                    bv = log_add(
                        bv,
                        log_mul(bvars.at(t + 1, s + 1), scores.score(t + 1, labels[s / 2])),
                    );
                }
                bv
            };
            bvars.set(t, s, bv);
        }
    }

    bvars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::Activations;

    fn uniform(batch: usize, time: usize, classes: usize) -> Activations {
        let p = (1.0 / classes as f64).ln();
        Activations::from_vec(vec![p; batch * time * classes], batch, time, classes).unwrap()
    }

    #[test]
    fn band_covers_base_case() {
        // time = 4, L = 2, S = 5
        assert_eq!(band(0, 4, 5), (0, 2));
        assert_eq!(band(1, 4, 5), (0, 4));
        assert_eq!(band(2, 4, 5), (1, 5));
        assert_eq!(band(3, 4, 5), (3, 5));
    }

    #[test]
    fn band_empty_when_infeasible() {
        // time = 2, L = 3, S = 7: no segment is both reachable from the
        // start and able to reach the end.
        let (b0, e0) = band(0, 2, 7);
        assert!(b0 >= e0);
    }

    #[test]
    fn off_band_stays_log_zero() {
        let acts = uniform(1, 4, 3);
        let scores = acts.sequence(0);
        let fvars = forward(&scores, &[1, 2]);
        for t in 0..4 {
            let (s_begin, s_end) = band(t, 4, 5);
            for s in 0..5 {
                if s < s_begin || s >= s_end {
                    assert_eq!(fvars.at(t, s), LOG_ZERO, "t={t} s={s}");
                }
            }
        }
    }

    #[test]
    fn empty_target_likelihood_is_all_blank_path() {
        let acts = uniform(1, 3, 2);
        let scores = acts.sequence(0);
        let fvars = forward(&scores, &[]);
        let expect = 3.0 * (0.5f64).ln();
        assert!((log_likelihood(&fvars, 3) - expect).abs() < 1e-12);
    }

    #[test]
    fn single_frame_single_label() {
        let acts =
            Activations::from_vec(vec![(0.3f64).ln(), (0.7f64).ln()], 1, 1, 2).unwrap();
        let scores = acts.sequence(0);
        let fvars = forward(&scores, &[1]);
        // Only alignment is [label]; the final blank segment is unreachable.
        assert!((log_likelihood(&fvars, 1) - (0.7f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn forward_backward_agree_on_total_mass() {
        // Σ_s f[t][s]·b[t][s] equals the total likelihood at every t.
        let data = vec![
            -0.2, -1.7, -2.1, //
            -1.1, -0.4, -2.3, //
            -2.0, -0.9, -0.8, //
            -0.5, -1.2, -1.6, //
        ];
        let acts = Activations::from_vec(data, 1, 4, 3).unwrap();
        let scores = acts.sequence(0);
        let labels = [1, 2];
        let fvars = forward(&scores, &labels);
        let bvars = backward(&scores, &labels);
        let total = log_likelihood(&fvars, 4);
        for t in 0..4 {
            let mut acc = LOG_ZERO;
            for s in 0..fvars.segments() {
                acc = log_add(acc, log_mul(fvars.at(t, s), bvars.at(t, s)));
            }
            assert!((acc - total).abs() < 1e-10, "t={t}: {acc} vs {total}");
        }
    }

    #[test]
    fn repeated_label_requires_separating_blank() {
        // Two frames cannot realize the target [1, 1]: the skip transition
        // is disabled for repeats, so the lattice carries no mass.
        let acts = uniform(1, 2, 2);
        let scores = acts.sequence(0);
        let fvars = forward(&scores, &[1, 1]);
        assert_eq!(log_likelihood(&fvars, 2), LOG_ZERO);
        // Three frames admit exactly [1, blank, 1].
        let acts3 = uniform(1, 3, 2);
        let scores3 = acts3.sequence(0);
        let fvars3 = forward(&scores3, &[1, 1]);
        let expect = 3.0 * (0.5f64).ln();
        assert!((log_likelihood(&fvars3, 3) - expect).abs() < 1e-12);
    }
}
