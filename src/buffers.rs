//! Owned batch buffers with explicit stride bookkeeping.
//!
//! Everything is a contiguous row-major `Vec<f64>` (or `Vec<usize>` for
//! labels) plus its declared shape, validated once at construction. The
//! per-sequence [`SequenceScores`] view is what the lattice code reads;
//! gradient output is partitioned into disjoint per-sequence chunks so
//! parallel writers never alias.

use crate::error::CtcError;

/// Reserved class index emitted between and around real labels.
pub const BLANK: usize = 0;

/// Read-only `[batch][time][class]` log-domain scores.
///
/// Scores are assumed to already be usable as per-class log-likelihoods at
/// each timestep (e.g. log-softmax output); this crate does not normalize.
#[derive(Debug, Clone, PartialEq)]
pub struct Activations {
    data: Vec<f64>,
    batch: usize,
    time: usize,
    classes: usize,
}

impl Activations {
    /// Wrap a row-major flat buffer. Fails if the length does not equal
    /// `batch * time * classes` or if the time/class axes are empty.
    pub fn from_vec(
        data: Vec<f64>,
        batch: usize,
        time: usize,
        classes: usize,
    ) -> Result<Self, CtcError> {
        if time == 0 || classes == 0 {
            return Err(CtcError::EmptyShape);
        }
        if data.len() != batch * time * classes {
            return Err(CtcError::BufferSize {
                len: data.len(),
                shape: format!("{batch}x{time}x{classes}"),
            });
        }
        Ok(Self {
            data,
            batch,
            time,
            classes,
        })
    }

    #[inline]
    pub fn batch(&self) -> usize {
        self.batch
    }

    #[inline]
    pub fn time(&self) -> usize {
        self.time
    }

    #[inline]
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// View over one sequence's `[time][class]` scores.
    #[inline]
    pub fn sequence(&self, i: usize) -> SequenceScores<'_> {
        let stride = self.time * self.classes;
        SequenceScores {
            data: &self.data[i * stride..(i + 1) * stride],
            time: self.time,
            classes: self.classes,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Borrowed `[time][class]` scores for a single sequence.
#[derive(Debug, Clone, Copy)]
pub struct SequenceScores<'a> {
    data: &'a [f64],
    time: usize,
    classes: usize,
}

impl SequenceScores<'_> {
    #[inline]
    pub fn time(&self) -> usize {
        self.time
    }

    #[inline]
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Log-domain score of class `k` at timestep `t`.
    #[inline]
    pub fn score(&self, t: usize, k: usize) -> f64 {
        self.data[t * self.classes + k]
    }

    /// All class scores at timestep `t`.
    #[inline]
    pub fn frame(&self, t: usize) -> &[f64] {
        &self.data[t * self.classes..(t + 1) * self.classes]
    }
}

/// Read-only `[batch][max_len]` label rows, 1-based IDs, zero-padded.
///
/// A 0 entry is the padding sentinel for the rest of its row; it is a
/// different zero from the blank class on the activation axis and never
/// names a real label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    data: Vec<usize>,
    batch: usize,
    max_len: usize,
}

impl Targets {
    /// Wrap a row-major flat buffer. Fails if the length does not equal
    /// `batch * max_len`.
    pub fn from_vec(data: Vec<usize>, batch: usize, max_len: usize) -> Result<Self, CtcError> {
        if data.len() != batch * max_len {
            return Err(CtcError::BufferSize {
                len: data.len(),
                shape: format!("{batch}x{max_len}"),
            });
        }
        Ok(Self {
            data,
            batch,
            max_len,
        })
    }

    #[inline]
    pub fn batch(&self) -> usize {
        self.batch
    }

    #[inline]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Full padded row for sequence `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[usize] {
        &self.data[i * self.max_len..(i + 1) * self.max_len]
    }

    /// Effective (non-padded) labels of sequence `i`: the leading run of
    /// non-zero entries.
    #[inline]
    pub fn effective(&self, i: usize) -> &[usize] {
        let row = self.row(i);
        let len = row.iter().position(|&l| l == 0).unwrap_or(self.max_len);
        &row[..len]
    }
}

/// Writable gradient buffer shaped like a set of activations.
///
/// Entry `[i][t][k]` holds ∂(−log-likelihood of sequence i)/∂score(i,t,k)
/// after a full evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    data: Vec<f64>,
    batch: usize,
    time: usize,
    classes: usize,
}

impl Gradients {
    /// Zero-filled buffer with the same shape as `acts`.
    pub fn zeros_like(acts: &Activations) -> Self {
        Self {
            data: vec![0.0; acts.batch * acts.time * acts.classes],
            batch: acts.batch,
            time: acts.time,
            classes: acts.classes,
        }
    }

    #[inline]
    pub fn batch(&self) -> usize {
        self.batch
    }

    #[inline]
    pub fn time(&self) -> usize {
        self.time
    }

    #[inline]
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Gradient entry for sequence `i`, timestep `t`, class `k`.
    #[inline]
    pub fn at(&self, i: usize, t: usize, k: usize) -> f64 {
        self.data[(i * self.time + t) * self.classes + k]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Length of one sequence's gradient chunk.
    #[inline]
    pub(crate) fn seq_stride(&self) -> usize {
        self.time * self.classes
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}
