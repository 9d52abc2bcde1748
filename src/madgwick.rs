//! Madgwick gradient-descent orientation filter

use log::{debug, trace, warn};
use nalgebra::{ComplexField, Quaternion, UnitQuaternion, Vector3};

use crate::math::{GYROSCOPE_DEG_TO_RAD, QuaternionExt, Vector3Ext, fast_inverse_sqrt};
use crate::types::{EulerAngles, MadgwickSettings, SettingsError};

/// Madgwick AHRS filter
///
/// Fuses gyroscope, accelerometer and (optionally) magnetometer samples into
/// an orientation quaternion describing the rotation from the body frame to
/// the earth frame. Each tick integrates the gyroscope rate and, when the
/// accelerometer reading is usable, subtracts a normalized gradient-descent
/// step scaled by `beta`.
///
/// The quaternion is the only evolving state. The filter starts at identity
/// and is never reset: build a new one to re-seed.
///
/// Ticks must be applied in chronological order. Mutation takes `&mut self`,
/// so a single instance cannot be stepped from two places at once; separate
/// instances share nothing.
#[derive(Debug, Clone)]
pub struct Madgwick {
    /// Sample frequency and gain
    settings: MadgwickSettings,
    /// Current orientation, `w` is the scalar part
    quaternion: Quaternion<f64>,
}

impl Madgwick {
    /// Create a filter for the given sample frequency (Hz) and gain
    ///
    /// # Example
    /// ```
    /// use madgwick_ahrs::{Madgwick, SettingsError};
    ///
    /// let filter = Madgwick::new(100.0, 0.1).unwrap();
    /// assert_eq!(filter.sample_period(), 0.01);
    ///
    /// assert!(matches!(
    ///     Madgwick::new(0.0, 0.1),
    ///     Err(SettingsError::InvalidSampleFrequency(_))
    /// ));
    /// ```
    pub fn new(sample_frequency: f64, beta: f64) -> Result<Self, SettingsError> {
        Self::with_settings(MadgwickSettings {
            sample_frequency,
            beta,
        })
    }

    /// Create a filter with the given settings
    pub fn with_settings(settings: MadgwickSettings) -> Result<Self, SettingsError> {
        if let Err(err) = settings.validate() {
            warn!("rejecting Madgwick settings: {}", err);
            return Err(err);
        }

        Ok(Self::seeded(settings))
    }

    /// Filter at identity for settings already known to be valid
    fn seeded(settings: MadgwickSettings) -> Self {
        debug!(
            "Madgwick filter at {} Hz, beta {}",
            settings.sample_frequency, settings.beta
        );

        Madgwick {
            settings,
            quaternion: Quaternion::identity(),
        }
    }

    /// Update with gyroscope, accelerometer and magnetometer readings
    ///
    /// Without a magnetometer reading (`None`, or the all-zero sentinel) this
    /// is exactly [`Madgwick::update_imu`]. An all-zero accelerometer reading
    /// skips the correction and integrates the gyroscope alone.
    ///
    /// Non-finite readings are not filtered out; they corrupt the state from
    /// that tick on.
    ///
    /// # Arguments
    /// * `gyroscope` - Angular rate in degrees per second
    /// * `accelerometer` - Acceleration in any consistent unit
    /// * `magnetometer` - Magnetic field in any consistent unit, if available
    pub fn update(
        &mut self,
        gyroscope: Vector3<f64>,
        accelerometer: Vector3<f64>,
        magnetometer: Option<Vector3<f64>>,
    ) {
        let Some(magnetometer) = magnetometer.and_then(Vector3Ext::into_reading) else {
            trace!("no magnetometer reading, falling back to IMU update");
            self.update_imu(gyroscope, accelerometer);
            return;
        };

        let gyroscope = gyroscope * GYROSCOPE_DEG_TO_RAD;
        let mut q_dot = self.rate_of_change(gyroscope);

        if accelerometer.is_empty_reading() {
            trace!("no accelerometer reading, skipping correction");
        } else {
            let accelerometer = accelerometer.fast_normalize();
            let magnetometer = magnetometer.fast_normalize();

            let (ax, ay, az) = (accelerometer.x, accelerometer.y, accelerometer.z);
            let (mx, my, mz) = (magnetometer.x, magnetometer.y, magnetometer.z);
            let (q0, q1, q2, q3) = self.components();

            // Auxiliary variables to avoid repeated arithmetic
            let two_q0mx = 2.0 * q0 * mx;
            let two_q0my = 2.0 * q0 * my;
            let two_q0mz = 2.0 * q0 * mz;
            let two_q1mx = 2.0 * q1 * mx;
            let two_q0 = 2.0 * q0;
            let two_q1 = 2.0 * q1;
            let two_q2 = 2.0 * q2;
            let two_q3 = 2.0 * q3;
            let two_q0q2 = 2.0 * q0 * q2;
            let two_q2q3 = 2.0 * q2 * q3;
            let q0q0 = q0 * q0;
            let q0q1 = q0 * q1;
            let q0q2 = q0 * q2;
            let q0q3 = q0 * q3;
            let q1q1 = q1 * q1;
            let q1q2 = q1 * q2;
            let q1q3 = q1 * q3;
            let q2q2 = q2 * q2;
            let q2q3 = q2 * q3;
            let q3q3 = q3 * q3;

            // Reference direction of the earth's magnetic field
            let hx = mx * q0q0 - two_q0my * q3 + two_q0mz * q2 + mx * q1q1
                + two_q1 * my * q2
                + two_q1 * mz * q3
                - mx * q2q2
                - mx * q3q3;
            let hy = two_q0mx * q3 + my * q0q0 - two_q0mz * q1 + two_q1mx * q2 - my * q1q1
                + my * q2q2
                + two_q2 * mz * q3
                - my * q3q3;
            let two_bx = ComplexField::sqrt(hx * hx + hy * hy);
            let two_bz = -two_q0mx * q2 + two_q0my * q1 + mz * q0q0 + two_q1mx * q3
                - mz * q1q1
                + two_q2 * my * q3
                - mz * q2q2
                + mz * q3q3;
            let four_bx = 2.0 * two_bx;
            let four_bz = 2.0 * two_bz;

            // Objective function residuals: gravity then magnetic field
            let f_gx = 2.0 * q1q3 - two_q0q2 - ax;
            let f_gy = 2.0 * q0q1 + two_q2q3 - ay;
            let f_gz = 1.0 - 2.0 * q1q1 - 2.0 * q2q2 - az;
            let f_bx = two_bx * (0.5 - q2q2 - q3q3) + two_bz * (q1q3 - q0q2) - mx;
            let f_by = two_bx * (q1q2 - q0q3) + two_bz * (q0q1 + q2q3) - my;
            let f_bz = two_bx * (q0q2 + q1q3) + two_bz * (0.5 - q1q1 - q2q2) - mz;

            // Gradient descent corrective step
            let s0 = -two_q2 * f_gx + two_q1 * f_gy - two_bz * q2 * f_bx
                + (-two_bx * q3 + two_bz * q1) * f_by
                + two_bx * q2 * f_bz;
            let s1 = two_q3 * f_gx + two_q0 * f_gy - 4.0 * q1 * f_gz
                + two_bz * q3 * f_bx
                + (two_bx * q2 + two_bz * q0) * f_by
                + (two_bx * q3 - four_bz * q1) * f_bz;
            let s2 = -two_q0 * f_gx + two_q3 * f_gy - 4.0 * q2 * f_gz
                + (-four_bx * q2 - two_bz * q0) * f_bx
                + (two_bx * q1 + two_bz * q3) * f_by
                + (two_bx * q0 - four_bz * q2) * f_bz;
            let s3 = two_q1 * f_gx
                + two_q2 * f_gy
                + (-four_bx * q3 + two_bz * q1) * f_bx
                + (-two_bx * q0 + two_bz * q2) * f_by
                + two_bx * q1 * f_bz;

            self.apply_feedback(&mut q_dot, Quaternion::new(s0, s1, s2, s3));
        }

        self.integrate(q_dot);
    }

    /// Update with gyroscope and accelerometer readings only
    ///
    /// The gradient only measures disagreement with the gravity direction, so
    /// heading is left to gyroscope integration.
    ///
    /// # Arguments
    /// * `gyroscope` - Angular rate in degrees per second
    /// * `accelerometer` - Acceleration in any consistent unit
    pub fn update_imu(&mut self, gyroscope: Vector3<f64>, accelerometer: Vector3<f64>) {
        let gyroscope = gyroscope * GYROSCOPE_DEG_TO_RAD;
        let mut q_dot = self.rate_of_change(gyroscope);

        if accelerometer.is_empty_reading() {
            trace!("no accelerometer reading, skipping correction");
        } else {
            let accelerometer = accelerometer.fast_normalize();

            let (ax, ay, az) = (accelerometer.x, accelerometer.y, accelerometer.z);
            let (q0, q1, q2, q3) = self.components();

            // Auxiliary variables to avoid repeated arithmetic
            let two_q0 = 2.0 * q0;
            let two_q1 = 2.0 * q1;
            let two_q2 = 2.0 * q2;
            let two_q3 = 2.0 * q3;
            let four_q0 = 4.0 * q0;
            let four_q1 = 4.0 * q1;
            let four_q2 = 4.0 * q2;
            let eight_q1 = 8.0 * q1;
            let eight_q2 = 8.0 * q2;
            let q0q0 = q0 * q0;
            let q1q1 = q1 * q1;
            let q2q2 = q2 * q2;
            let q3q3 = q3 * q3;

            // Gradient descent corrective step
            let s0 = four_q0 * q2q2 + two_q2 * ax + four_q0 * q1q1 - two_q1 * ay;
            let s1 = four_q1 * q3q3 - two_q3 * ax + 4.0 * q0q0 * q1 - two_q0 * ay - four_q1
                + eight_q1 * q1q1
                + eight_q1 * q2q2
                + four_q1 * az;
            let s2 = 4.0 * q0q0 * q2 + two_q0 * ax + four_q2 * q3q3 - two_q3 * ay - four_q2
                + eight_q2 * q1q1
                + eight_q2 * q2q2
                + four_q2 * az;
            let s3 = 4.0 * q1q1 * q3 - two_q1 * ax + 4.0 * q2q2 * q3 - two_q2 * ay;

            self.apply_feedback(&mut q_dot, Quaternion::new(s0, s1, s2, s3));
        }

        self.integrate(q_dot);
    }

    /// Apply one tick and return the resulting orientation
    ///
    /// # Example
    /// ```
    /// use madgwick_ahrs::Madgwick;
    /// use nalgebra::Vector3;
    ///
    /// let mut filter = Madgwick::new(100.0, 0.1).unwrap();
    /// let q = filter.step(
    ///     Vector3::zeros(),
    ///     Vector3::new(0.0, 0.0, 1.0),
    ///     Some(Vector3::new(0.5, 0.0, 0.85)),
    /// );
    /// assert!((q.w - 1.0).abs() < 2e-3);
    /// ```
    pub fn step(
        &mut self,
        gyroscope: Vector3<f64>,
        accelerometer: Vector3<f64>,
        magnetometer: Option<Vector3<f64>>,
    ) -> Quaternion<f64> {
        self.update(gyroscope, accelerometer, magnetometer);
        self.quaternion
    }

    /// Current orientation quaternion (body to earth), `w` is the scalar part
    pub fn quaternion(&self) -> Quaternion<f64> {
        self.quaternion
    }

    /// Current orientation as roll, pitch and yaw in radians
    pub fn euler_angles(&self) -> EulerAngles {
        self.quaternion.to_euler()
    }

    /// Filter settings
    pub fn settings(&self) -> MadgwickSettings {
        self.settings
    }

    /// Integration step in seconds
    pub fn sample_period(&self) -> f64 {
        1.0 / self.settings.sample_frequency
    }

    /// Rotate a body-frame vector into the earth frame using the current
    /// orientation
    pub fn earth_frame(&self, vector: Vector3<f64>) -> Vector3<f64> {
        UnitQuaternion::new_normalize(self.quaternion) * vector
    }

    fn components(&self) -> (f64, f64, f64, f64) {
        let q = &self.quaternion;
        (q.w, q.i, q.j, q.k)
    }

    /// Quaternion derivative from angular rate alone, `½ q ⊗ (0, ω)`
    fn rate_of_change(&self, gyroscope: Vector3<f64>) -> Quaternion<f64> {
        let (q0, q1, q2, q3) = self.components();
        let (gx, gy, gz) = (gyroscope.x, gyroscope.y, gyroscope.z);

        Quaternion::new(
            0.5 * (-q1 * gx - q2 * gy - q3 * gz),
            0.5 * (q0 * gx + q2 * gz - q3 * gy),
            0.5 * (q0 * gy - q1 * gz + q3 * gx),
            0.5 * (q0 * gz + q1 * gy - q2 * gx),
        )
    }

    /// Normalize the gradient and subtract `beta` times it from `q_dot`
    fn apply_feedback(&self, q_dot: &mut Quaternion<f64>, mut gradient: Quaternion<f64>) {
        gradient *= fast_inverse_sqrt(gradient.square_sum());
        *q_dot -= gradient * self.settings.beta;
    }

    /// Explicit Euler integration followed by renormalization
    fn integrate(&mut self, q_dot: Quaternion<f64>) {
        self.quaternion += q_dot * (1.0 / self.settings.sample_frequency);
        self.quaternion *= fast_inverse_sqrt(self.quaternion.square_sum());
    }
}

impl Default for Madgwick {
    fn default() -> Self {
        Self::seeded(MadgwickSettings::default())
    }
}
