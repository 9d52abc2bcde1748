#![no_std]

//! Madgwick AHRS - gradient-descent orientation filter for inertial and
//! magnetic sensor streams
//!
//! This library estimates the orientation of a rigid body from gyroscope,
//! accelerometer and (optionally) magnetometer samples using Sebastian
//! Madgwick's gradient-descent algorithm. The estimate is a quaternion
//! describing the rotation from the body frame to the earth frame.
//!
//! # Features
//!
//! - 9-axis MARG update (gyroscope + accelerometer + magnetometer)
//! - 6-axis IMU update (gyroscope + accelerometer)
//! - Per-tick fallback to the IMU update when the magnetometer drops out
//! - Gyroscope-only propagation when the accelerometer reading is empty
//! - Fast inverse square root normalization matching the reference algorithm
//! - Quaternion to roll/pitch/yaw conversion
//! - `#![no_std]` compatible for embedded systems
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use madgwick_ahrs::{Madgwick, QuaternionExt};
//!
//! let mut filter = Madgwick::new(100.0, 0.1).unwrap(); // 100 Hz, beta 0.1
//!
//! // Sensor readings
//! let gyroscope = Vector3::new(0.1, 0.2, 0.3);      // deg/s
//! let accelerometer = Vector3::new(0.0, 0.0, 1.0);  // g
//! let magnetometer = Vector3::new(0.5, 0.0, 0.85);  // any unit
//!
//! filter.update(gyroscope, accelerometer, Some(magnetometer));
//!
//! // Drop-out of the magnetometer: IMU update for this tick
//! filter.update(gyroscope, accelerometer, None);
//!
//! let quaternion = filter.quaternion();
//! let angles = quaternion.to_euler();
//! println!("roll {} pitch {} yaw {}", angles.roll, angles.pitch, angles.yaw);
//! ```

mod madgwick;
mod math;
mod types;

// Re-export all public types and functions
pub use madgwick::Madgwick;
pub use math::{
    DEG_TO_RAD, GYROSCOPE_DEG_TO_RAD, QuaternionExt, RAD_TO_DEG, Vector3Ext, fast_inverse_sqrt,
};
pub use types::*;
