//! Mathematical utilities and nalgebra extensions for the Madgwick AHRS library

use nalgebra::{ComplexField, Quaternion, RealField, UnitQuaternion, Vector3};

use crate::types::EulerAngles;

/// Mathematical constants
pub const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / core::f64::consts::PI;

/// Degrees per second to radians per second factor used by the filter.
///
/// This is the rounded value of the reference algorithm rather than
/// [`DEG_TO_RAD`]; reference outputs depend on it.
pub const GYROSCOPE_DEG_TO_RAD: f64 = 0.0174533;

/// Magic constant for the 64-bit inverse square root seed.
const INVERSE_SQRT_MAGIC: u64 = 0x5FE6_EB50_C7B5_37A9;

/// Fast inverse square root for `f64`
///
/// Seeds `1/sqrt(n)` from the IEEE-754 bit pattern and refines it with a
/// single Newton-Raphson iteration. The result is a bounded approximation
/// (relative error below 2e-3), and the filter's convergence behaviour and
/// reference outputs depend on exactly this approximation. Do not replace it
/// with `1.0 / n.sqrt()`.
///
/// A negative or NaN `n` yields NaN and `+inf` yields a non-finite result.
/// Zero yields a large finite value, so scaling a zero vector by the result
/// stays zero.
///
/// # Example
/// ```
/// use madgwick_ahrs::fast_inverse_sqrt;
///
/// let approx = fast_inverse_sqrt(4.0);
/// assert!((approx - 0.5).abs() < 1e-3);
/// assert!(fast_inverse_sqrt(-1.0).is_nan());
/// ```
pub fn fast_inverse_sqrt(n: f64) -> f64 {
    if n < 0.0 || n.is_nan() {
        return f64::NAN;
    }

    let half_n = n * 0.5;
    let bits = INVERSE_SQRT_MAGIC.wrapping_sub(n.to_bits() >> 1);
    let mut y = f64::from_bits(bits);

    // One Newton-Raphson step
    y *= 1.5 - (half_n * y * y);

    y
}

/// Extension trait for Vector3 sensor readings
pub trait Vector3Ext {
    /// True when every component is exactly zero
    ///
    /// A real magnetic field or gravity reading is never exactly zero, so the
    /// all-zero vector marks "no reading this tick".
    fn is_empty_reading(&self) -> bool;

    /// Map the all-zero sentinel to `None`
    fn into_reading(self) -> Option<Vector3<f64>>;

    /// Sum of squared components, `x² + y² + z²`
    fn square_sum(&self) -> f64;

    /// Normalize using [`fast_inverse_sqrt`]
    fn fast_normalize(&self) -> Vector3<f64>;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f64>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f64>;
}

impl Vector3Ext for Vector3<f64> {
    fn is_empty_reading(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    fn into_reading(self) -> Option<Vector3<f64>> {
        if self.is_empty_reading() { None } else { Some(self) }
    }

    fn square_sum(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    fn fast_normalize(&self) -> Vector3<f64> {
        *self * fast_inverse_sqrt(self.square_sum())
    }

    fn deg_to_rad(&self) -> Vector3<f64> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f64> {
        *self * RAD_TO_DEG
    }
}

/// Extension trait for orientation quaternions
///
/// The filter state is a plain `Quaternion<f64>` rather than a
/// `UnitQuaternion` since its norm is only held at one to within the
/// [`fast_inverse_sqrt`] tolerance.
pub trait QuaternionExt {
    /// Sum of squared components, `w² + i² + j² + k²`
    fn square_sum(&self) -> f64;

    /// Convert to roll, pitch and yaw (ZYX convention) in radians
    ///
    /// The arcsine argument for pitch is clamped to `[-1, 1]` so rounding on
    /// a nearly-unit quaternion cannot produce NaN. Roll and yaw are not
    /// separable at ±90° pitch (gimbal lock).
    fn to_euler(&self) -> EulerAngles;

    /// Create a unit quaternion from roll, pitch and yaw in radians
    fn from_euler(angles: EulerAngles) -> Quaternion<f64>;
}

impl QuaternionExt for Quaternion<f64> {
    fn square_sum(&self) -> f64 {
        self.w * self.w + self.i * self.i + self.j * self.j + self.k * self.k
    }

    fn to_euler(&self) -> EulerAngles {
        let (q0, q1, q2, q3) = (self.w, self.i, self.j, self.k);

        let roll = RealField::atan2(
            2.0 * (q0 * q1 + q2 * q3),
            1.0 - 2.0 * (q1 * q1 + q2 * q2),
        );
        let sin_pitch = (2.0 * (q0 * q2 - q3 * q1)).clamp(-1.0, 1.0);
        let pitch = ComplexField::asin(sin_pitch);
        let yaw = RealField::atan2(
            2.0 * (q1 * q2 + q0 * q3),
            1.0 - 2.0 * (q2 * q2 + q3 * q3),
        );

        EulerAngles { roll, pitch, yaw }
    }

    fn from_euler(angles: EulerAngles) -> Quaternion<f64> {
        UnitQuaternion::from_euler_angles(angles.roll, angles.pitch, angles.yaw).into_inner()
    }
}
