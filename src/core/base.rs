/// Extension trait for [`nalgebra::RealField`] carrying numeric constants
/// used throughout the crate.
pub trait RealField: nalgebra::RealField {
    /// Square root of machine epsilon. A standard constant for epsilons in
    /// first-order finite-difference concepts.
    const EPSILON_SQRT: Self;

    /// Cubic root of machine epsilon. A standard constant for epsilons in
    /// second-order finite-difference concepts.
    const EPSILON_CBRT: Self;

    /// Relative step used for finite-difference gradients (2^-25).
    const EPSILON_FD: Self;

    /// Number of mantissa bits. Used for the sweep safety cap: after this
    /// many halvings, a step size has lost all of its significant digits.
    const MANTISSA_DIGITS: u32;
}

impl RealField for f32 {
    const EPSILON_SQRT: Self = 0.00034526698;
    const EPSILON_CBRT: Self = 0.0049215667;
    // 2^-25 is below the useful range for f32, so the first-order epsilon
    // is reused instead.
    const EPSILON_FD: Self = 0.00034526698;
    const MANTISSA_DIGITS: u32 = f32::MANTISSA_DIGITS;
}

impl RealField for f64 {
    const EPSILON_SQRT: Self = 0.000000014901161193847656;
    const EPSILON_CBRT: Self = 0.0000060554544523933395;
    const EPSILON_FD: Self = 2.9802322387695312e-8;
    const MANTISSA_DIGITS: u32 = f64::MANTISSA_DIGITS;
}
