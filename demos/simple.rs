use madgwick_ahrs::Madgwick;
use nalgebra::Vector3;

const SAMPLE_FREQUENCY: f64 = 100.0; // 100 Hz
const BETA: f64 = 0.1;

fn main() {
    let mut filter = Madgwick::new(SAMPLE_FREQUENCY, BETA).expect("valid filter settings");

    for _ in 0..10 {
        // this loop should repeat each time new sensor data is available
        let gyroscope = Vector3::new(0.0, 0.0, 0.0); // replace this with actual gyroscope data in degrees/s
        let accelerometer = Vector3::new(0.0, 0.0, 1.0); // replace this with actual accelerometer data in g
        let magnetometer = Some(Vector3::new(0.5, 0.0, 0.85)); // None when no magnetometer sample is available

        filter.update(gyroscope, accelerometer, magnetometer);

        let (roll, pitch, yaw) = filter.euler_angles().to_degrees();

        println!("Roll: {:.2}, Pitch: {:.2}, Yaw: {:.2}", roll, pitch, yaw);
    }
}
