//! Contract-violation errors reported before any lattice work starts.

use thiserror::Error;

/// Errors raised by batch construction and evaluation.
///
/// All variants are shape/contract violations and abort the whole call;
/// per-sequence numerical edge cases (no feasible alignment) are *not*
/// errors — they surface as an infinite loss for that sequence only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CtcError {
    /// Flat buffer length disagrees with the declared shape.
    #[error("buffer of length {len} does not match declared shape {shape}")]
    BufferSize { len: usize, shape: String },

    /// Activations and targets disagree on the batch dimension.
    #[error("activation batch {activations} does not match target batch {targets}")]
    BatchMismatch { activations: usize, targets: usize },

    /// Gradient buffer shaped differently from the activations.
    #[error("gradient shape {gradient} does not match activation shape {activations}")]
    GradientShape {
        gradient: String,
        activations: String,
    },

    /// A non-padding target label has no column in the activation class axis.
    #[error(
        "label {label} at sequence {sequence} position {position} \
         is outside the class range 1..{classes}"
    )]
    LabelOutOfRange {
        sequence: usize,
        position: usize,
        label: usize,
        classes: usize,
    },

    /// Activations with zero timesteps or zero classes cannot be scored.
    #[error("activations must have at least one timestep and one class")]
    EmptyShape,
}
