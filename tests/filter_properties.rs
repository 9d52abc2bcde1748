//! Behavioural properties of the Madgwick filter

use madgwick_ahrs::{
    EulerAngles, GYROSCOPE_DEG_TO_RAD, Madgwick, QuaternionExt, Vector3Ext, fast_inverse_sqrt,
};
use nalgebra::{Quaternion, Vector3};
use rand::prelude::*;
use rand_pcg::Pcg64;

/// Largest relative error of the inverse square root approximation
const NORM_TOLERANCE: f64 = 2e-3;

fn random_vector(rng: &mut Pcg64, range: f64) -> Vector3<f64> {
    Vector3::new(
        rng.random_range(-range..range),
        rng.random_range(-range..range),
        rng.random_range(-range..range),
    )
}

/// Quaternion norm stays within tolerance of one after every tick
#[test]
fn test_normalization_invariant() {
    let mut rng = Pcg64::seed_from_u64(7);
    let mut filter = Madgwick::new(200.0, 0.3).unwrap();

    for i in 0..5000 {
        let gyroscope = random_vector(&mut rng, 500.0);
        let accelerometer = random_vector(&mut rng, 2.0) + Vector3::new(0.0, 0.0, 1.0);
        let magnetometer = random_vector(&mut rng, 50.0);

        match i % 3 {
            0 => filter.update(gyroscope, accelerometer, Some(magnetometer)),
            1 => filter.update(gyroscope, accelerometer, None),
            _ => filter.update_imu(gyroscope, accelerometer),
        }

        let norm = filter.quaternion().square_sum().sqrt();
        assert!(
            (norm - 1.0).abs() < NORM_TOLERANCE,
            "tick {}: |q| = {}",
            i,
            norm
        );
    }
}

/// Level, stationary IMU input is an exact fixed point
#[test]
fn test_identity_stability_imu() {
    let mut filter = Madgwick::new(100.0, 0.1).unwrap();
    let gyroscope = Vector3::zeros();
    let accelerometer = Vector3::new(0.0, 0.0, 1.0);

    for _ in 0..200 {
        filter.update_imu(gyroscope, accelerometer);
    }
    let settled = filter.quaternion();

    for _ in 0..1000 {
        filter.update_imu(gyroscope, accelerometer);
        assert_eq!(filter.quaternion(), settled);
    }

    assert!((settled.w - 1.0).abs() < NORM_TOLERANCE);
    assert_eq!((settled.i, settled.j, settled.k), (0.0, 0.0, 0.0));
}

/// Level, stationary input with a horizontal field is an exact fixed point
#[test]
fn test_identity_stability_marg() {
    let mut filter = Madgwick::new(100.0, 0.1).unwrap();
    let gyroscope = Vector3::zeros();
    let accelerometer = Vector3::new(0.0, 0.0, 1.0);
    let magnetometer = Some(Vector3::new(1.0, 0.0, 0.0));

    for _ in 0..200 {
        filter.update(gyroscope, accelerometer, magnetometer);
    }
    let settled = filter.quaternion();

    for _ in 0..1000 {
        filter.update(gyroscope, accelerometer, magnetometer);
        assert_eq!(filter.quaternion(), settled);
    }
}

/// With an inclined field the estimate stays bounded around identity
///
/// Near convergence the gradient is rounding noise that normalization scales
/// up to a full step, so the estimate chatters by at most about
/// `2 * beta / sample_frequency` radians.
#[test]
fn test_inclined_field_stays_near_identity() {
    let mut filter = Madgwick::new(100.0, 0.1).unwrap();
    let gyroscope = Vector3::zeros();
    let accelerometer = Vector3::new(0.0, 0.0, 1.0);
    let magnetometer = Some(Vector3::new(0.5, 0.0, 0.85));

    for i in 0..2000 {
        filter.update(gyroscope, accelerometer, magnetometer);
        let euler = filter.euler_angles();

        for angle in [euler.roll, euler.pitch, euler.yaw] {
            assert!(angle.abs() < 5e-3, "tick {}: {:?}", i, euler);
        }
    }
}

/// A missing magnetometer gives bit-identical results to the IMU update
#[test]
fn test_mode_fallback_equivalence() {
    let mut rng = Pcg64::seed_from_u64(42);
    let mut marg = Madgwick::new(100.0, 0.1).unwrap();
    let mut sentinel = marg.clone();
    let mut imu = marg.clone();

    for _ in 0..1000 {
        let gyroscope = random_vector(&mut rng, 100.0);
        let accelerometer = random_vector(&mut rng, 1.0);

        marg.update(gyroscope, accelerometer, None);
        sentinel.update(gyroscope, accelerometer, Some(Vector3::zeros()));
        imu.update_imu(gyroscope, accelerometer);

        assert_eq!(marg.quaternion(), imu.quaternion());
        assert_eq!(sentinel.quaternion(), imu.quaternion());
    }
}

/// Raw streams with the all-zero sentinel map onto the optional reading
#[test]
fn test_sentinel_stream_interleaves_modes() {
    let readings = [
        Vector3::new(0.5, 0.0, 0.85),
        Vector3::zeros(),
        Vector3::new(0.5, 0.0, 0.85),
    ];

    let mut from_sentinel = Madgwick::default();
    let mut from_option = Madgwick::default();
    let gyroscope = Vector3::new(0.0, 0.0, 20.0);
    let accelerometer = Vector3::new(0.0, 0.1, 1.0);

    for (i, raw) in readings.iter().enumerate() {
        from_sentinel.update(gyroscope, accelerometer, raw.into_reading());

        if i == 1 {
            from_option.update_imu(gyroscope, accelerometer);
        } else {
            from_option.update(gyroscope, accelerometer, Some(*raw));
        }
    }

    assert_eq!(from_sentinel.quaternion(), from_option.quaternion());
}

/// An empty accelerometer reading integrates the gyroscope alone
#[test]
fn test_gyro_only_free_integration() {
    let mut filter = Madgwick::new(100.0, 0.1).unwrap();
    filter.update(
        Vector3::new(10.0, 0.0, 0.0),
        Vector3::zeros(),
        Some(Vector3::new(0.5, 0.0, 0.85)),
    );

    // q̇ = ½ (1,0,0,0) ⊗ (0, ωx, 0, 0) = (0, ωx/2, 0, 0)
    let omega_x = 10.0 * GYROSCOPE_DEG_TO_RAD;
    let q1 = 0.5 * omega_x * (1.0 / 100.0);
    let scale = fast_inverse_sqrt(1.0 + q1 * q1);
    let expected = Quaternion::new(scale, q1 * scale, 0.0, 0.0);

    let q = filter.quaternion();
    assert!((q - expected).norm() < 1e-15, "{:?} != {:?}", q, expected);

    // Same result whatever the magnetometer says
    let mut imu = Madgwick::new(100.0, 0.1).unwrap();
    imu.update_imu(Vector3::new(10.0, 0.0, 0.0), Vector3::zeros());
    assert_eq!(imu.quaternion(), q);
}

/// Constant rotation without correction accumulates the expected angle
#[test]
fn test_gyro_integration_over_one_second() {
    let mut filter = Madgwick::new(100.0, 0.0).unwrap();

    for _ in 0..100 {
        filter.update_imu(Vector3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, 1.0));
    }

    let euler = filter.euler_angles();
    // Norm held at 1 - 1.7e-3 biases the decomposition by a few hundredths of a degree
    assert!((euler.yaw.to_degrees() - 10.0).abs() < 0.1, "{:?}", euler);
    assert!(euler.roll.abs() < 1e-12);
    assert!(euler.pitch.abs() < 1e-12);
}

/// Quaternion → Euler recovers the composed angles away from gimbal lock
#[test]
fn test_euler_round_trip() {
    for roll in (-170..=170).step_by(34) {
        for pitch in (-80..=80).step_by(20) {
            for yaw in (-170..=170).step_by(34) {
                let angles = EulerAngles::from_degrees(roll as f64, pitch as f64, yaw as f64);
                let recovered = Quaternion::from_euler(angles).to_euler();

                assert!((angles.roll - recovered.roll).abs() < 1e-9, "{:?}", angles);
                assert!((angles.pitch - recovered.pitch).abs() < 1e-9, "{:?}", angles);
                assert!((angles.yaw - recovered.yaw).abs() < 1e-9, "{:?}", angles);
            }
        }
    }
}

/// At gimbal lock pitch is still exact, roll and yaw collapse into one angle
#[test]
fn test_euler_at_gimbal_lock() {
    let angles = EulerAngles::from_degrees(20.0, 90.0, 50.0);
    let recovered = Quaternion::from_euler(angles).to_euler();

    assert!(!recovered.pitch.is_nan());
    assert!((recovered.pitch - core::f64::consts::FRAC_PI_2).abs() < 1e-6);
}

/// Euler rotation and the filter's quaternion rotation agree
#[test]
fn test_earth_frame_matches_euler_rotation() {
    let mut filter = Madgwick::new(100.0, 0.0).unwrap();
    for _ in 0..50 {
        filter.update_imu(Vector3::new(30.0, -20.0, 45.0), Vector3::zeros());
    }

    let reading = Vector3::new(0.2, -0.4, 0.9);
    let from_quaternion = filter.earth_frame(reading);
    let from_euler = filter.euler_angles().rotate(reading);

    assert!(
        (from_quaternion - from_euler).magnitude() < 5e-3,
        "{} vs {}",
        from_quaternion,
        from_euler
    );
}

/// Non-finite input is not masked and poisons all later ticks
#[test]
fn test_non_finite_input_propagates() {
    let mut filter = Madgwick::default();
    filter.update(
        Vector3::new(f64::NAN, 0.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
        Some(Vector3::new(0.5, 0.0, 0.85)),
    );
    assert!(filter.quaternion().w.is_nan());

    for _ in 0..10 {
        filter.update(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, 1.0),
            Some(Vector3::new(0.5, 0.0, 0.85)),
        );
    }
    assert!(filter.quaternion().square_sum().is_nan());
}

/// Non-finite accelerometer or magnetometer readings propagate in both modes
#[test]
fn test_non_finite_readings_propagate() {
    let level = Vector3::new(0.0, 0.0, 1.0);
    let field = Vector3::new(0.5, 0.0, 0.85);

    // 0 * inf yields a NaN with the sign bit set
    let negative_nan = 0.0 * f64::INFINITY;
    let cases = [
        (Vector3::new(f64::INFINITY, 0.0, 1.0), None),
        (Vector3::new(f64::NAN, 0.0, 1.0), None),
        (Vector3::new(negative_nan, 0.0, 1.0), None),
        (Vector3::new(f64::NAN, 0.0, 1.0), Some(field)),
        (Vector3::new(f64::NEG_INFINITY, 0.0, 1.0), Some(field)),
        (level, Some(Vector3::new(f64::INFINITY, 0.0, 0.0))),
        (level, Some(Vector3::new(0.5, negative_nan, 0.85))),
    ];

    for (accelerometer, magnetometer) in cases {
        let mut filter = Madgwick::default();
        filter.update(Vector3::zeros(), accelerometer, magnetometer);

        let q = filter.quaternion();
        assert!(
            q.w.is_nan() && q.i.is_nan() && q.j.is_nan() && q.k.is_nan(),
            "accelerometer {:?} magnetometer {:?}: {:?}",
            accelerometer,
            magnetometer,
            q
        );

        filter.update(Vector3::zeros(), level, Some(field));
        assert!(filter.quaternion().square_sum().is_nan());
    }

    let mut imu = Madgwick::default();
    imu.update_imu(Vector3::zeros(), Vector3::new(f64::INFINITY, 0.0, 1.0));
    assert!(imu.quaternion().w.is_nan());
}

/// Independent filters evolve independently on separate threads
#[test]
fn test_independent_instances_in_parallel() {
    let handles: Vec<_> = [10.0, -10.0]
        .into_iter()
        .map(|rate| {
            std::thread::spawn(move || {
                let mut filter = Madgwick::new(100.0, 0.0).unwrap();
                for _ in 0..100 {
                    filter.update_imu(Vector3::new(0.0, 0.0, rate), Vector3::zeros());
                }
                filter.euler_angles().yaw
            })
        })
        .collect();

    let yaws: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(yaws[0] > 0.0);
    assert!((yaws[0] + yaws[1]).abs() < 1e-12);
}
