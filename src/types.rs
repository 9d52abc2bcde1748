//! Core types and settings for the Madgwick AHRS library

use core::fmt;

use nalgebra::{Rotation3, Vector3};

use crate::math::{DEG_TO_RAD, RAD_TO_DEG};

/// Roll, pitch and yaw in radians
///
/// Always derived from an orientation quaternion (ZYX convention: roll about
/// X, then pitch about Y, then yaw about Z). Never stored as filter state.
///
/// # Example
/// ```
/// use madgwick_ahrs::EulerAngles;
///
/// let angles = EulerAngles::from_degrees(10.0, -5.0, 90.0);
/// let (roll, pitch, yaw) = angles.to_degrees();
/// assert!((yaw - 90.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    /// Rotation about the X axis
    pub roll: f64,
    /// Rotation about the Y axis, within `[-π/2, π/2]`
    pub pitch: f64,
    /// Rotation about the Z axis
    pub yaw: f64,
}

impl EulerAngles {
    /// Create from angles in radians
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Create from angles in degrees
    pub fn from_degrees(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(roll * DEG_TO_RAD, pitch * DEG_TO_RAD, yaw * DEG_TO_RAD)
    }

    /// Angles in degrees as `(roll, pitch, yaw)`
    pub fn to_degrees(&self) -> (f64, f64, f64) {
        (
            self.roll * RAD_TO_DEG,
            self.pitch * RAD_TO_DEG,
            self.yaw * RAD_TO_DEG,
        )
    }

    /// Rotate a body-frame vector into the earth frame
    ///
    /// Applies roll about X, then pitch about Y, then yaw about Z. Used to
    /// bring magnetometer readings into a heading-aligned frame.
    pub fn rotate(&self, vector: Vector3<f64>) -> Vector3<f64> {
        Rotation3::from_euler_angles(self.roll, self.pitch, self.yaw) * vector
    }
}

/// Madgwick filter settings
///
/// Both values are fixed for the lifetime of a filter.
///
/// # Example
/// ```
/// use madgwick_ahrs::{Madgwick, MadgwickSettings};
///
/// let settings = MadgwickSettings {
///     sample_frequency: 256.0,
///     beta: 0.041,
/// };
/// let filter = Madgwick::with_settings(settings).unwrap();
/// assert_eq!(filter.settings().beta, 0.041);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MadgwickSettings {
    /// Rate at which samples arrive, in Hz
    ///
    /// Samples are assumed to be uniformly spaced; the filter integrates over
    /// `1 / sample_frequency` seconds per tick.
    pub sample_frequency: f64,
    /// Gradient-descent gain
    ///
    /// Higher values trust the accelerometer and magnetometer more, lower
    /// values trust gyroscope integration more. Zero disables correction.
    pub beta: f64,
}

impl Default for MadgwickSettings {
    fn default() -> Self {
        Self {
            sample_frequency: 100.0,
            beta: 0.1,
        }
    }
}

impl MadgwickSettings {
    /// Check that the sample frequency is positive and beta non-negative
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.sample_frequency.is_finite() || self.sample_frequency <= 0.0 {
            return Err(SettingsError::InvalidSampleFrequency(self.sample_frequency));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(SettingsError::InvalidBeta(self.beta));
        }
        Ok(())
    }
}

/// Rejected filter settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsError {
    /// Sample frequency is not a finite, strictly positive number
    InvalidSampleFrequency(f64),
    /// Beta is not a finite, non-negative number
    InvalidBeta(f64),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::InvalidSampleFrequency(value) => {
                write!(f, "sample frequency must be finite and > 0 Hz, got {}", value)
            }
            SettingsError::InvalidBeta(value) => {
                write!(f, "beta must be finite and >= 0, got {}", value)
            }
        }
    }
}

impl core::error::Error for SettingsError {}
