//! Per-timestep gradient accumulation and single-sequence evaluation.

use crate::buffers::{SequenceScores, BLANK};
use crate::lattice::{backward, forward, log_likelihood, Lattice};
use crate::logmath::{log_add, log_div, log_mul, safe_exp, LOG_ZERO};

/// Accumulate the gradient of the negative log-likelihood into `grad_out`
/// (one sequence's `[time][class]` chunk, fully overwritten).
///
/// For each timestep the per-class occupancy is the log-sum of
/// `f[t][s] · b[t][s]` over every segment mapping to that class; divided by
/// the total likelihood it is the posterior of emitting the class at that
/// time, and the gradient w.r.t. the log-domain input score is its
/// negation. Both lattices must be fully populated.
pub(crate) fn accumulate(
    scores: &SequenceScores<'_>,
    labels: &[usize],
    fvars: &Lattice,
    bvars: &Lattice,
    log_prob: f64,
    grad_out: &mut [f64],
) {
    let time = scores.time();
    let classes = scores.classes();
    let segments = fvars.segments();
    debug_assert_eq!(grad_out.len(), time * classes);

    let mut occupancy = vec![LOG_ZERO; classes];
    for t in 0..time {
        occupancy.fill(LOG_ZERO);
        for s in 0..segments {
            let k = if s % 2 == 1 { labels[s / 2] } else { BLANK };
            occupancy[k] = log_add(occupancy[k], log_mul(fvars.at(t, s), bvars.at(t, s)));
        }
        let frame = &mut grad_out[t * classes..(t + 1) * classes];
        for (k, out) in frame.iter_mut().enumerate() {
            *out = -safe_exp(log_div(occupancy[k], log_prob));
        }
    }
}

/// Minimum number of frames admitting any valid alignment: one per label
/// plus one separating blank per adjacent repeat.
#[inline]
pub(crate) fn min_frames(labels: &[usize]) -> usize {
    let repeats = labels.windows(2).filter(|w| w[0] == w[1]).count();
    labels.len() + repeats
}

/// Evaluate one sequence: negative log-likelihood, plus the gradient chunk
/// when `grad_out` is supplied.
///
/// A target too long for the available frames has no valid alignment; the
/// loss is `+inf` and the gradient chunk is zeroed without touching the
/// lattice machinery. (The lattice would reach the same answer — every
/// band entry stays at the log-zero sentinel — this is just the cheap
/// screen.)
pub(crate) fn evaluate_sequence(
    scores: &SequenceScores<'_>,
    labels: &[usize],
    grad_out: Option<&mut [f64]>,
) -> f64 {
    #[cfg(feature = "tracing")]
    let span = tracing::trace_span!(
        "ctc_sequence",
        time = scores.time(),
        target_len = labels.len()
    );
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    if scores.time() < min_frames(labels) {
        if let Some(grad_out) = grad_out {
            grad_out.fill(0.0);
        }
        return f64::INFINITY;
    }

    let fvars = forward(scores, labels);
    let log_prob = log_likelihood(&fvars, scores.time());

    if let Some(grad_out) = grad_out {
        let bvars = backward(scores, labels);
        accumulate(scores, labels, &fvars, &bvars, log_prob, grad_out);
    }

    -log_prob
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::Activations;

    #[test]
    fn min_frames_counts_repeats() {
        assert_eq!(min_frames(&[]), 0);
        assert_eq!(min_frames(&[1, 2, 3]), 3);
        assert_eq!(min_frames(&[1, 1]), 3);
        assert_eq!(min_frames(&[2, 2, 2, 5]), 6);
    }

    #[test]
    fn toy_gradient_exact() {
        // One frame, blank + one label, target [1]: the only alignment
        // emits the label, so the blank posterior is 0 and the label
        // posterior is 1.
        let acts =
            Activations::from_vec(vec![(0.3f64).ln(), (0.7f64).ln()], 1, 1, 2).unwrap();
        let scores = acts.sequence(0);
        let mut grad = vec![f64::NAN; 2];
        let loss = evaluate_sequence(&scores, &[1], Some(&mut grad));
        assert!((loss + (0.7f64).ln()).abs() < 1e-12);
        assert_eq!(grad[0], 0.0);
        assert_eq!(grad[1], -1.0);
    }

    #[test]
    fn infeasible_target_zeroes_gradient() {
        let acts = Activations::from_vec(vec![-1.0; 2 * 3], 1, 2, 3).unwrap();
        let scores = acts.sequence(0);
        let mut grad = vec![f64::NAN; 2 * 3];
        let loss = evaluate_sequence(&scores, &[1, 2, 1], Some(&mut grad));
        assert_eq!(loss, f64::INFINITY);
        assert!(grad.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn forward_only_leaves_no_gradient() {
        let acts = Activations::from_vec(vec![-0.5; 4 * 2], 1, 4, 2).unwrap();
        let scores = acts.sequence(0);
        let loss = evaluate_sequence(&scores, &[1], None);
        assert!(loss.is_finite());
    }

    #[test]
    fn gradient_sums_to_negative_posterior_mass() {
        // Per timestep the posteriors over emitted classes sum to 1, so the
        // gradient entries at each t sum to -1.
        let data = vec![
            -0.2, -1.7, -2.1, //
            -1.1, -0.4, -2.3, //
            -2.0, -0.9, -0.8, //
            -0.5, -1.2, -1.6, //
        ];
        let acts = Activations::from_vec(data, 1, 4, 3).unwrap();
        let scores = acts.sequence(0);
        let mut grad = vec![f64::NAN; 4 * 3];
        let loss = evaluate_sequence(&scores, &[1, 2], Some(&mut grad));
        assert!(loss.is_finite());
        for t in 0..4 {
            let row_sum: f64 = grad[t * 3..(t + 1) * 3].iter().sum();
            assert!((row_sum + 1.0).abs() < 1e-10, "t={t}: {row_sum}");
        }
    }
}
