#![cfg(feature = "parallel")]

//! The rayon dispatch must agree with a plain probability-domain reference
//! DP computed serially in this test, for every sequence of a batch.

use ctc_lattice::{evaluate_batch, Activations, Targets};
use proptest::prelude::*;

/// Textbook alpha recursion in probability space (safe for short inputs).
fn reference_loss(scores: &[f64], time: usize, classes: usize, target: &[usize]) -> f64 {
    let segments = 2 * target.len() + 1;
    let act = |t: usize, k: usize| scores[t * classes + k].exp();

    let mut alpha = vec![0.0f64; segments];
    alpha[0] = act(0, 0);
    if segments > 1 {
        alpha[1] = act(0, target[0]);
    }
    for t in 1..time {
        let prev = alpha.clone();
        for s in 0..segments {
            let mut v = prev[s];
            if s > 0 {
                v += prev[s - 1];
            }
            if s % 2 == 1 {
                if s > 1 && target[s / 2] != target[s / 2 - 1] {
                    v += prev[s - 2];
                }
                alpha[s] = v * act(t, target[s / 2]);
            } else {
                alpha[s] = v * act(t, 0);
            }
        }
    }
    let mut p = alpha[segments - 1];
    if segments > 1 {
        p += alpha[segments - 2];
    }
    -p.ln()
}

fn batch_case() -> impl Strategy<Value = (usize, usize, usize, Vec<f64>, Vec<Vec<usize>>)> {
    (1usize..=4, 2usize..=8, 2usize..=4).prop_flat_map(|(batch, time, classes)| {
        (
            Just(batch),
            Just(time),
            Just(classes),
            prop::collection::vec(-3.0f64..0.0, batch * time * classes),
            prop::collection::vec(prop::collection::vec(1usize..classes, 0..=3), batch),
        )
    })
}

proptest! {
    #[test]
    fn parallel_batch_matches_serial_reference(
        (batch, time, classes, scores, target_rows) in batch_case()
    ) {
        let acts = Activations::from_vec(scores.clone(), batch, time, classes).unwrap();
        let max_len = target_rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let mut padded = Vec::with_capacity(batch * max_len);
        for row in &target_rows {
            let mut r = row.clone();
            r.resize(max_len, 0);
            padded.extend(r);
        }
        let targets = Targets::from_vec(padded, batch, max_len).unwrap();

        let losses = evaluate_batch(&acts, &targets, None).unwrap();
        for i in 0..batch {
            let seq = &scores[i * time * classes..(i + 1) * time * classes];
            let expect = reference_loss(seq, time, classes, &target_rows[i]);
            if expect.is_infinite() {
                prop_assert_eq!(losses[i], f64::INFINITY);
            } else {
                prop_assert!(
                    (losses[i] - expect).abs() < 1e-9,
                    "sequence {}: {} vs reference {}", i, losses[i], expect
                );
            }
        }
    }
}
