//! Motion sensor seam.
//!
//! Register programming and fusion live behind [`Imu`]; the device only
//! needs readings, a way to apply [`Settings`] and a blocking calibration.

use std::time::Duration;

use acceldrum_frame::{AccelPacket, RawSample, Settings};

use crate::error::{DeviceError, Result};

/// One fused reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuReading {
    /// World-frame acceleration, gravity removed, in g.
    pub accel: [f32; 3],
    /// Angular rate in degrees per second.
    pub gyro: [f32; 3],
    /// Orientation quaternion `[x, y, z, w]`.
    pub quat: [f32; 4],
    /// Euler angles in radians.
    pub euler: [f32; 3],
}

impl ImuReading {
    pub fn to_accel(&self, delta_micros: u64) -> AccelPacket {
        let [ax, ay, az] = self.accel;
        let [gx, gy, gz, gw] = self.quat;
        let [ex, ey, ez] = self.euler;
        AccelPacket {
            delta_micros,
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
            gw,
            ex,
            ey,
            ez,
        }
    }

    pub fn to_raw(&self, delta_micros: u32) -> RawSample {
        let [ax, ay, az] = self.accel;
        let [gx, gy, gz] = self.gyro;
        RawSample {
            delta_micros,
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
        }
    }
}

/// Offsets produced by a calibration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub accel_offset: [i16; 3],
    pub gyro_offset: [i16; 3],
}

pub trait Imu: Send {
    /// Latest reading, or `None` when no new sample is ready.
    fn read(&mut self) -> Result<Option<ImuReading>>;

    fn configure(&mut self, settings: &Settings) -> Result<()>;

    /// Blocking calibration; run off the scheduler thread.
    fn calibrate(&mut self, loops: u32) -> Result<Calibration>;
}

impl<I: Imu + ?Sized> Imu for Box<I> {
    fn read(&mut self) -> Result<Option<ImuReading>> {
        (**self).read()
    }

    fn configure(&mut self, settings: &Settings) -> Result<()> {
        (**self).configure(settings)
    }

    fn calibrate(&mut self, loops: u32) -> Result<Calibration> {
        (**self).calibrate(loops)
    }
}

/// Deterministic synthetic sensor: slow rotation about z with a sinusoidal
/// acceleration, clipped to the configured full-scale range.
#[derive(Debug, Clone)]
pub struct SimulatedImu {
    step: u64,
    settings: Settings,
    calibration_step: Duration,
    fail_calibration: bool,
}

impl SimulatedImu {
    pub fn new() -> Self {
        Self {
            step: 0,
            settings: Settings::default(),
            calibration_step: Duration::from_millis(2),
            fail_calibration: false,
        }
    }

    /// Time spent per calibration loop.
    pub fn with_calibration_step(mut self, step: Duration) -> Self {
        self.calibration_step = step;
        self
    }

    /// Make every calibration fail.
    pub fn failing_calibration(mut self) -> Self {
        self.fail_calibration = true;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn samples_taken(&self) -> u64 {
        self.step
    }
}

impl Default for SimulatedImu {
    fn default() -> Self {
        Self::new()
    }
}

impl Imu for SimulatedImu {
    fn read(&mut self) -> Result<Option<ImuReading>> {
        let t = self.step as f32 * 0.01;
        self.step += 1;

        let limit = self.settings.accel_range.full_scale_g();
        let rate_limit = self.settings.gyro_range.full_scale_dps();
        let yaw = t * 0.5;
        let (half_sin, half_cos) = (yaw / 2.0).sin_cos();

        Ok(Some(ImuReading {
            accel: [
                (t * 6.0).sin().clamp(-limit, limit),
                (t * 3.0).cos().clamp(-limit, limit) * 0.5,
                0.0,
            ],
            gyro: [0.0, 0.0, 0.5f32.to_degrees().clamp(-rate_limit, rate_limit)],
            quat: [0.0, 0.0, half_sin, half_cos],
            euler: [yaw, 0.0, 0.0],
        }))
    }

    fn configure(&mut self, settings: &Settings) -> Result<()> {
        self.settings = *settings;
        Ok(())
    }

    fn calibrate(&mut self, loops: u32) -> Result<Calibration> {
        for _ in 0..loops {
            std::thread::sleep(self.calibration_step);
        }
        if self.fail_calibration {
            return Err(DeviceError::Calibration("sensor did not settle".into()));
        }
        let calibration = Calibration {
            accel_offset: [-12, 40, 1788],
            gyro_offset: [220, 76, -85],
        };
        self.settings.accel_offset = calibration.accel_offset;
        self.settings.gyro_offset = calibration.gyro_offset;
        Ok(calibration)
    }
}

#[cfg(test)]
mod tests {
    use acceldrum_frame::AccelRange;

    use super::*;

    #[test]
    fn readings_respect_accel_range() {
        let mut imu = SimulatedImu::new();
        imu.configure(&Settings {
            accel_range: AccelRange::G2,
            ..Settings::default()
        })
        .expect("configure");
        for _ in 0..500 {
            let reading = imu.read().expect("read").expect("sample");
            assert!(reading.accel.iter().all(|a| a.abs() <= 2.0));
        }
        assert_eq!(imu.samples_taken(), 500);
    }

    #[test]
    fn calibration_stores_offsets() {
        let mut imu = SimulatedImu::new().with_calibration_step(Duration::ZERO);
        let calibration = imu.calibrate(6).expect("calibrate");
        assert_eq!(imu.settings().gyro_offset, calibration.gyro_offset);
    }

    #[test]
    fn failing_calibration_reports_error() {
        let mut imu = SimulatedImu::new()
            .with_calibration_step(Duration::ZERO)
            .failing_calibration();
        assert!(matches!(imu.calibrate(1), Err(DeviceError::Calibration(_))));
    }

    #[test]
    fn reading_maps_to_wire_records() {
        let reading = ImuReading {
            accel: [1.0, 2.0, 3.0],
            gyro: [4.0, 5.0, 6.0],
            quat: [0.1, 0.2, 0.3, 0.4],
            euler: [7.0, 8.0, 9.0],
        };
        let accel = reading.to_accel(100);
        assert_eq!((accel.ax, accel.gw, accel.ez), (1.0, 0.4, 9.0));
        let raw = reading.to_raw(50);
        assert_eq!((raw.delta_micros, raw.gz), (50, 6.0));
    }
}
