//! Batch evaluation: independent per-sequence work, parallel dispatch.
//!
//! Sequences share no mutable state: each owns its scratch lattices, its
//! loss slot, and (in gradient mode) a disjoint chunk of the gradient
//! buffer. With the `parallel` feature the batch is dispatched through
//! rayon; otherwise a plain loop produces bit-identical results.

use crate::buffers::{Activations, Gradients, Targets};
use crate::error::CtcError;
use crate::grad::evaluate_sequence;

/// Score a batch of sequences, returning one negative log-likelihood per
/// sequence.
///
/// `grad` selects the mode: `None` runs the forward pass only and touches
/// no gradient storage; `Some` additionally runs the backward pass and
/// fully overwrites the buffer with ∂loss/∂score for every sequence.
///
/// Shape and label-range violations are detected up front and fail the
/// whole call; a sequence whose target cannot be aligned within its frames
/// is not an error — it yields an infinite loss and a zero gradient without
/// affecting its neighbors.
///
/// # Example
/// ```
/// use ctc_lattice::{evaluate_batch, Activations, Gradients, Targets};
///
/// let p = (0.5f64).ln();
/// let acts = Activations::from_vec(vec![p; 3 * 2], 1, 3, 2)?;
/// let targets = Targets::from_vec(vec![1, 0], 1, 2)?;
/// let mut grad = Gradients::zeros_like(&acts);
/// let losses = evaluate_batch(&acts, &targets, Some(&mut grad))?;
/// assert!(losses[0].is_finite());
/// # Ok::<(), ctc_lattice::CtcError>(())
/// ```
pub fn evaluate_batch(
    activations: &Activations,
    targets: &Targets,
    grad: Option<&mut Gradients>,
) -> Result<Vec<f64>, CtcError> {
    validate(activations, targets, grad.as_deref())?;

    #[cfg(feature = "tracing")]
    let span = tracing::info_span!(
        "ctc_evaluate_batch",
        batch = activations.batch(),
        time = activations.time(),
        classes = activations.classes(),
        forward_only = grad.is_none()
    );
    #[cfg(feature = "tracing")]
    let _enter = span.enter();

    let mut losses = vec![0.0; activations.batch()];
    match grad {
        Some(grad) => run_with_grad(activations, targets, grad, &mut losses),
        None => run_loss_only(activations, targets, &mut losses),
    }
    Ok(losses)
}

fn validate(
    activations: &Activations,
    targets: &Targets,
    grad: Option<&Gradients>,
) -> Result<(), CtcError> {
    if activations.batch() != targets.batch() {
        return Err(CtcError::BatchMismatch {
            activations: activations.batch(),
            targets: targets.batch(),
        });
    }
    if let Some(grad) = grad {
        let same = grad.batch() == activations.batch()
            && grad.time() == activations.time()
            && grad.classes() == activations.classes();
        if !same {
            return Err(CtcError::GradientShape {
                gradient: format!("{}x{}x{}", grad.batch(), grad.time(), grad.classes()),
                activations: format!(
                    "{}x{}x{}",
                    activations.batch(),
                    activations.time(),
                    activations.classes()
                ),
            });
        }
    }
    let classes = activations.classes();
    for i in 0..targets.batch() {
        for (position, &label) in targets.effective(i).iter().enumerate() {
            if label >= classes {
                return Err(CtcError::LabelOutOfRange {
                    sequence: i,
                    position,
                    label,
                    classes,
                });
            }
        }
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn run_with_grad(
    activations: &Activations,
    targets: &Targets,
    grad: &mut Gradients,
    losses: &mut [f64],
) {
    use rayon::prelude::*;

    let stride = grad.seq_stride();
    losses
        .par_iter_mut()
        .zip(grad.as_mut_slice().par_chunks_mut(stride))
        .enumerate()
        .for_each(|(i, (loss, chunk))| {
            *loss = evaluate_sequence(&activations.sequence(i), targets.effective(i), Some(chunk));
        });
}

#[cfg(feature = "parallel")]
fn run_loss_only(activations: &Activations, targets: &Targets, losses: &mut [f64]) {
    use rayon::prelude::*;

    losses.par_iter_mut().enumerate().for_each(|(i, loss)| {
        *loss = evaluate_sequence(&activations.sequence(i), targets.effective(i), None);
    });
}

#[cfg(not(feature = "parallel"))]
fn run_with_grad(
    activations: &Activations,
    targets: &Targets,
    grad: &mut Gradients,
    losses: &mut [f64],
) {
    let stride = grad.seq_stride();
    for (i, (loss, chunk)) in losses
        .iter_mut()
        .zip(grad.as_mut_slice().chunks_mut(stride))
        .enumerate()
    {
        *loss = evaluate_sequence(&activations.sequence(i), targets.effective(i), Some(chunk));
    }
}

#[cfg(not(feature = "parallel"))]
fn run_loss_only(activations: &Activations, targets: &Targets, losses: &mut [f64]) {
    for (i, loss) in losses.iter_mut().enumerate() {
        *loss = evaluate_sequence(&activations.sequence(i), targets.effective(i), None);
    }
}
