//! Small numeric helpers shared by the filter and oscillators.

/// Flush denormal-range values to zero.
///
/// Filter integrators decaying towards silence otherwise drift into the
/// subnormal range, which is very slow on most CPUs.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Padé approximation of `tan(x)`.
///
/// Accurate to better than 0.1% for `x` in `[0, π/3]`, which covers filter
/// cutoffs up to roughly a sixth of the sample rate. Callers needing higher
/// cutoffs should fall back to [`libm::tanf`].
///
/// ```
/// use synthualizer_core::fast_tan;
///
/// let x = core::f32::consts::PI * 2000.0 / 48000.0;
/// let exact = libm::tanf(x);
/// assert!((fast_tan(x) - exact).abs() / exact < 0.001);
/// ```
#[inline]
pub fn fast_tan(x: f32) -> f32 {
    let x2 = x * x;
    x * (15.0 - x2) / (15.0 - 6.0 * x2)
}
