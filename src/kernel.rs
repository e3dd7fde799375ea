//! Numeric kernel: dot product, L2 norm, and cosine similarity over
//! fixed-length `f32` slices.
//!
//! A scalar baseline is always available. Where the target exposes
//! 128-bit packed float arithmetic, a widened variant processes four
//! lanes per step (via the portable [`wide`] crate, which selects SSE2/
//! AVX/NEON/WASM SIMD128 under the hood with no per-target code) and
//! falls back to the scalar loop for the `D mod 4` tail. Dispatch between
//! scalar and widened path is resolved once and cached, mirroring the
//! teacher's `OnceLock`-based dispatch tables.
//!
//! Summation order differs between the two paths, so callers comparing
//! scalar and widened results should tolerate a small absolute error
//! (see the module tests for the `1e-4` bound used throughout this
//! crate).

use std::sync::OnceLock;
use wide::f32x4;

type KernelFn1 = fn(&[f32]) -> f32;
type KernelFn2 = fn(&[f32], &[f32]) -> f32;

static DOT_FN: OnceLock<KernelFn2> = OnceLock::new();
static NORM_FN: OnceLock<KernelFn1> = OnceLock::new();

/// Whether the current build prefers the widened (SIMD) kernel path.
///
/// `wide` provides a scalar fallback on every target, so this is really
/// a choice of "use the crate's vectorized path" vs. "use our own plain
/// loop" rather than a hard platform requirement.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "wasm32"))]
const fn prefers_widened() -> bool {
    true
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "wasm32")))]
const fn prefers_widened() -> bool {
    false
}

fn select_dot() -> KernelFn2 {
    if prefers_widened() {
        dot_widened
    } else {
        dot_scalar
    }
}

fn select_norm() -> KernelFn1 {
    if prefers_widened() {
        norm_widened
    } else {
        norm_scalar
    }
}

/// Scalar dot product: `sum(a[i] * b[i])`.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[inline]
#[must_use]
pub fn dot_scalar(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "dot: dimension mismatch");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scalar L2 norm: `sqrt(sum(a[i]^2))`.
#[inline]
#[must_use]
pub fn norm_scalar(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Widened dot product: four lanes per step with a scalar tail.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[inline]
#[must_use]
pub fn dot_widened(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "dot: dimension mismatch");

    let len = a.len();
    let lanes = len / 4;
    let mut acc = f32x4::ZERO;
    for i in 0..lanes {
        let off = i * 4;
        let va = f32x4::from(&a[off..off + 4]);
        let vb = f32x4::from(&b[off..off + 4]);
        acc = va.mul_add(vb, acc);
    }
    let mut result = acc.reduce_add();

    let base = lanes * 4;
    for i in base..len {
        result += a[i] * b[i];
    }
    result
}

/// Widened L2 norm: four lanes per step with a scalar tail.
#[inline]
#[must_use]
pub fn norm_widened(a: &[f32]) -> f32 {
    let len = a.len();
    let lanes = len / 4;
    let mut acc = f32x4::ZERO;
    for i in 0..lanes {
        let off = i * 4;
        let va = f32x4::from(&a[off..off + 4]);
        acc = va.mul_add(va, acc);
    }
    let mut result = acc.reduce_add();

    let base = lanes * 4;
    for i in base..len {
        result += a[i] * a[i];
    }
    result.sqrt()
}

/// Computes the dot product using the best available kernel path.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[inline]
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let f = DOT_FN.get_or_init(select_dot);
    f(a, b)
}

/// Computes the L2 norm using the best available kernel path.
#[inline]
#[must_use]
pub fn norm(a: &[f32]) -> f32 {
    let f = NORM_FN.get_or_init(select_norm);
    f(a)
}

/// Computes cosine similarity between `a` and `b`.
///
/// Returns `0.0` (not `NaN`) when either operand's norm is below
/// [`f32::EPSILON`], which also covers the all-zero tombstone case.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[inline]
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let na = norm(a);
    let nb = norm(b);
    if na < f32::EPSILON || nb < f32::EPSILON {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}
