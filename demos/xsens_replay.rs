//! Replay an XSens MT Manager log through the Madgwick filter
//!
//! Reads a tab-delimited export, locates the accelerometer, gyroscope,
//! magnetometer and Euler columns by their header names, runs every sample
//! through the filter and compares the result with the orientation the
//! device computed itself.
//!
//! Two images are written to the output directory:
//! - `euler.png`: roll (red), pitch (green) and yaw (blue) from the filter,
//!   with the device's own angles as faint lines of the same colours
//! - `magnetometer.png`: raw magnetometer X/Y/Z (faint) and the same
//!   readings rotated into the earth frame by the device orientation
//!
//! The gyroscope columns must be in degrees per second and the Euler columns
//! in degrees. Rows with empty magnetometer cells are fed as drop-outs.
//!
//! Run with: `cargo run --example xsens_replay -- <log.txt> [sample_rate_hz] [beta] [output_dir]`

use std::error::Error;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use log::{LevelFilter, debug, info, warn};
use madgwick_ahrs::{EulerAngles, Madgwick, MadgwickSettings};
use nalgebra::Vector3;
use plotters::prelude::*;
use serde::Deserialize;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

#[derive(Debug, Deserialize)]
struct XsensRecord {
    #[serde(rename = "Acc_X")]
    acc_x: f64,
    #[serde(rename = "Acc_Y")]
    acc_y: f64,
    #[serde(rename = "Acc_Z")]
    acc_z: f64,
    #[serde(rename = "Gyr_X")]
    gyr_x: f64,
    #[serde(rename = "Gyr_Y")]
    gyr_y: f64,
    #[serde(rename = "Gyr_Z")]
    gyr_z: f64,
    #[serde(rename = "Mag_X")]
    mag_x: Option<f64>,
    #[serde(rename = "Mag_Y")]
    mag_y: Option<f64>,
    #[serde(rename = "Mag_Z")]
    mag_z: Option<f64>,
    #[serde(rename = "Roll")]
    roll: f64,
    #[serde(rename = "Pitch")]
    pitch: f64,
    #[serde(rename = "Yaw")]
    yaw: f64,
}

impl XsensRecord {
    fn gyroscope(&self) -> Vector3<f64> {
        Vector3::new(self.gyr_x, self.gyr_y, self.gyr_z)
    }

    fn accelerometer(&self) -> Vector3<f64> {
        Vector3::new(self.acc_x, self.acc_y, self.acc_z)
    }

    fn magnetometer(&self) -> Option<Vector3<f64>> {
        match (self.mag_x, self.mag_y, self.mag_z) {
            (Some(x), Some(y), Some(z)) => Some(Vector3::new(x, y, z)),
            _ => None,
        }
    }

    fn device_orientation(&self) -> EulerAngles {
        EulerAngles::from_degrees(self.roll, self.pitch, self.yaw)
    }
}

struct Options {
    input: PathBuf,
    settings: MadgwickSettings,
    output_dir: PathBuf,
}

fn parse_args() -> Result<Options, Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .ok_or("usage: xsens_replay <log.txt> [sample_rate_hz] [beta] [output_dir]")?;

    let mut settings = MadgwickSettings::default();
    if let Some(rate) = args.next() {
        settings.sample_frequency = rate.parse()?;
    }
    if let Some(beta) = args.next() {
        settings.beta = beta.parse()?;
    }
    let output_dir = args.next().unwrap_or_else(|| "output".to_string());

    Ok(Options {
        input: PathBuf::from(input),
        settings,
        output_dir: PathBuf::from(output_dir),
    })
}

fn read_log(path: &Path) -> Result<Vec<XsensRecord>, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'/'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: XsensRecord = result?;
        records.push(record);
    }
    Ok(records)
}

/// Difference between two angles wrapped into `[-π, π)`
fn angle_difference(a: f64, b: f64) -> f64 {
    (a - b + PI).rem_euclid(2.0 * PI) - PI
}

fn rms(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v * v, count + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let options = parse_args()?;
    let records = read_log(&options.input)?;
    if records.is_empty() {
        return Err(format!("no samples in {}", options.input.display()).into());
    }
    info!(
        "Processing {} measurements from {}",
        records.len(),
        options.input.display()
    );

    let mut filter = Madgwick::with_settings(options.settings)?;

    let mut filter_angles = Vec::with_capacity(records.len());
    let mut device_angles = Vec::with_capacity(records.len());
    let mut magnetometer = Vec::with_capacity(records.len());
    let mut rotated_magnetometer = Vec::with_capacity(records.len());
    let mut dropouts = 0usize;

    for record in &records {
        let mag = record.magnetometer();
        if mag.is_none() {
            dropouts += 1;
        }

        filter.update(record.gyroscope(), record.accelerometer(), mag);

        let device = record.device_orientation();
        filter_angles.push(filter.euler_angles());
        device_angles.push(device);

        if let Some(m) = mag {
            magnetometer.push(m);
            rotated_magnetometer.push(device.rotate(m));
        }
    }

    if dropouts > 0 {
        warn!("{} samples without a magnetometer reading", dropouts);
    }

    let pairs = || filter_angles.iter().zip(device_angles.iter());
    let roll_rms = rms(pairs().map(|(f, d)| angle_difference(f.roll, d.roll)));
    let pitch_rms = rms(pairs().map(|(f, d)| angle_difference(f.pitch, d.pitch)));
    let yaw_rms = rms(pairs().map(|(f, d)| angle_difference(f.yaw, d.yaw)));
    info!(
        "RMS difference to device orientation: roll {:.2}°, pitch {:.2}°, yaw {:.2}°",
        roll_rms.to_degrees(),
        pitch_rms.to_degrees(),
        yaw_rms.to_degrees()
    );

    let (roll, pitch, yaw) = filter.euler_angles().to_degrees();
    info!(
        "Final orientation: roll {:.1}°, pitch {:.1}°, yaw {:.1}°",
        roll, pitch, yaw
    );

    fs::create_dir_all(&options.output_dir)?;

    let euler_path = options.output_dir.join("euler.png");
    plot_angles(&euler_path, &filter_angles, &device_angles)?;
    debug!("wrote {}", euler_path.display());

    let magnetometer_path = options.output_dir.join("magnetometer.png");
    plot_magnetometer(&magnetometer_path, &magnetometer, &rotated_magnetometer)?;
    debug!("wrote {}", magnetometer_path.display());

    Ok(())
}

fn plot_angles(
    path: &Path,
    filter_angles: &[EulerAngles],
    device_angles: &[EulerAngles],
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(0f64..filter_angles.len() as f64, -PI..PI)?;

    let series: [(fn(&EulerAngles) -> f64, RGBColor); 3] = [
        (|e| e.roll, RED),
        (|e| e.pitch, GREEN),
        (|e| e.yaw, BLUE),
    ];

    for (angle, colour) in series {
        chart.draw_series(LineSeries::new(
            device_angles
                .iter()
                .enumerate()
                .map(|(i, e)| (i as f64, angle(e))),
            colour.mix(0.3).stroke_width(1),
        ))?;
        chart.draw_series(LineSeries::new(
            filter_angles
                .iter()
                .enumerate()
                .map(|(i, e)| (i as f64, angle(e))),
            colour.stroke_width(2),
        ))?;
    }

    root.present()?;
    Ok(())
}

fn plot_magnetometer(
    path: &Path,
    raw: &[Vector3<f64>],
    rotated: &[Vector3<f64>],
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let limit = raw
        .iter()
        .chain(rotated.iter())
        .map(|m| m.amax())
        .fold(1e-9, f64::max);

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(0f64..raw.len().max(1) as f64, -limit..limit)?;

    for (axis, colour) in [(0, RED), (1, GREEN), (2, BLUE)] {
        chart.draw_series(LineSeries::new(
            raw.iter().enumerate().map(|(i, m)| (i as f64, m[axis])),
            colour.mix(0.3).stroke_width(1),
        ))?;
        chart.draw_series(LineSeries::new(
            rotated.iter().enumerate().map(|(i, m)| (i as f64, m[axis])),
            colour.stroke_width(2),
        ))?;
    }

    root.present()?;
    Ok(())
}
