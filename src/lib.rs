//! Connectionist Temporal Classification (CTC) loss and gradients.
//!
//! This crate scores a batch of per-timestep class score sequences against
//! variable-length label targets without an explicit frame-to-label
//! alignment, by marginalizing over all valid alignments with a log-domain
//! forward-backward dynamic program.
//!
//! ## Core idea
//! 1. Expand each target of length L into `2L + 1` interleaved
//!    blank/label segments.
//! 2. Fill banded forward and backward lattices over (timestep, segment)
//!    with stable log-sum-exp arithmetic.
//! 3. Combine the two lattices into per-timestep class posteriors, which
//!    are exactly the loss gradients w.r.t. the log-domain input scores.
//!
//! Sequences in a batch are independent; with the `parallel` feature
//! (default) they are evaluated concurrently through rayon.
//!
//! ## Quick start
//! ```
//! use ctc_lattice::{evaluate_batch, Activations, Gradients, Targets};
//!
//! // 1 sequence, 4 timesteps, 3 classes (class 0 is the blank).
//! let p = (1.0f64 / 3.0).ln();
//! let acts = Activations::from_vec(vec![p; 4 * 3], 1, 4, 3)?;
//! // Labels are 1-based; 0 pads the row.
//! let targets = Targets::from_vec(vec![1, 2, 0, 0], 1, 4)?;
//!
//! let mut grad = Gradients::zeros_like(&acts);
//! let losses = evaluate_batch(&acts, &targets, Some(&mut grad))?;
//! assert!(losses[0].is_finite());
//! # Ok::<(), ctc_lattice::CtcError>(())
//! ```
//!
//! ## Decoding
//! [`greedy_decode`] is a standalone best-path utility (arg-max per frame,
//! drop blanks, merge consecutive repeats); it never touches the lattices.

pub mod batch;
pub mod buffers;
pub mod decode;
pub mod error;
pub mod grad;
pub mod lattice;
pub mod logmath;

pub use crate::batch::evaluate_batch;
pub use crate::buffers::{Activations, Gradients, SequenceScores, Targets, BLANK};
pub use crate::decode::{collapse, greedy_decode, Decoded};
pub use crate::error::CtcError;
