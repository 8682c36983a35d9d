//! Stable log-domain arithmetic primitives.
//!
//! Probabilities are represented by their natural logarithm so that products
//! over long sequences never underflow. Exact zero is carried as the
//! [`LOG_ZERO`] sentinel, and every operation below treats it specially
//! instead of relying on IEEE `-inf` arithmetic (which can turn
//! `-inf + inf` orderings into NaN).
//!
//! All forward/backward/gradient code in this crate goes through these four
//! functions; nothing else calls `exp`/`ln` on probability mass directly.

/// log(0): no probability mass.
pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

/// log(1): certain event, multiplicative identity.
pub const LOG_ONE: f64 = 0.0;

/// Sentinel returned by [`log_div`] when dividing nonzero mass by zero.
pub const LOG_INFINITY: f64 = f64::INFINITY;

/// Largest finite value [`safe_exp`] will return.
pub const EXP_MAX: f64 = f64::MAX;

/// ln(f64::MAX); inputs at or above this saturate in [`safe_exp`].
pub const EXP_LIMIT: f64 = 709.782712893384;

/// Saturating exponential: exact 0 for [`LOG_ZERO`], clamped to [`EXP_MAX`]
/// at or beyond [`EXP_LIMIT`], plain `exp` otherwise. Never overflows to
/// infinity and never produces NaN for non-NaN input.
#[inline]
pub fn safe_exp(x: f64) -> f64 {
    if x == LOG_ZERO {
        0.0
    } else if x >= EXP_LIMIT {
        EXP_MAX
    } else {
        x.exp()
    }
}

/// Stable log(exp(a) + exp(b)).
///
/// Either operand equal to [`LOG_ZERO`] acts as the additive identity. The
/// general case factors out the larger operand so the exponential argument
/// is always ≤ 0.
#[inline]
pub fn log_add(a: f64, b: f64) -> f64 {
    if a == LOG_ZERO {
        return b;
    }
    if b == LOG_ZERO {
        return a;
    }
    let (hi, lo) = if a < b { (b, a) } else { (a, b) };
    hi + (1.0 + safe_exp(lo - hi)).ln()
}

/// log(exp(a) · exp(b)): `a + b`, except that multiplying by zero mass
/// yields exactly [`LOG_ZERO`].
#[inline]
pub fn log_mul(a: f64, b: f64) -> f64 {
    if a == LOG_ZERO || b == LOG_ZERO {
        LOG_ZERO
    } else {
        a + b
    }
}

/// log(exp(a) / exp(b)): `a - b`; zero numerator stays [`LOG_ZERO`], a zero
/// denominator under nonzero mass yields the [`LOG_INFINITY`] sentinel.
#[inline]
pub fn log_div(a: f64, b: f64) -> f64 {
    if a == LOG_ZERO {
        LOG_ZERO
    } else if b == LOG_ZERO {
        LOG_INFINITY
    } else {
        a - b
    }
}
