use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use acceldrum_frame::{
    ConfigureKind, ConfigurePacket, ConfigureValue, RawAccelPacket, Settings,
    RAW_SAMPLES_PER_PACKET,
};
use acceldrum_transport::ByteLink;

use crate::config::DeviceConfig;
use crate::control::Controls;
use crate::dispatch::Dispatcher;
use crate::display::Display;
use crate::error::{DeviceError, Result};
use crate::lock::Shared;
use crate::scheduler::{Schedule, Scheduler, Tick};
use crate::sensor::{Calibration, Imu};
use crate::serial::SerialManager;

const OVERLAY_TIMEOUT: Duration = Duration::from_secs(1);
const CALIBRATION_POLL: Duration = Duration::from_millis(10);
/// Back-off for the serial and dispatch tasks when they found no work.
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Sensor, display and the control-visible device state.
///
/// The IMU and display are shared with the calibration worker thread.
pub struct Peripherals<I, D> {
    imu: Shared<I>,
    display: Shared<D>,
    settings: Settings,
    poll_mode: bool,
    defaults: (Settings, bool),
    calibration_loops: u32,
    calibration: Option<JoinHandle<Result<Calibration>>>,
}

impl<I, D> Peripherals<I, D>
where
    I: Imu + 'static,
    D: Display + 'static,
{
    pub fn imu(&self) -> &Shared<I> {
        &self.imu
    }

    pub fn display(&self) -> &Shared<D> {
        &self.display
    }

    pub fn calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    fn notify(&self, text: &str) {
        self.display.with(|d| {
            d.overlay_clear();
            d.overlay(0, 0, text, OVERLAY_TIMEOUT);
        });
    }

    /// Collect a finished calibration, if any.
    fn take_finished_calibration(&mut self) -> Option<Result<Calibration>> {
        if !self.calibration.as_ref()?.is_finished() {
            return None;
        }
        let handle = self.calibration.take()?;
        Some(handle.join().unwrap_or_else(|_| {
            Err(DeviceError::Calibration("calibration worker panicked".into()))
        }))
    }
}

impl<I, D> Controls for Peripherals<I, D>
where
    I: Imu + 'static,
    D: Display + 'static,
{
    fn backlight(&self) -> bool {
        self.display.lock().backlight()
    }

    fn set_backlight(&mut self, on: bool) {
        self.display.lock().set_backlight(on);
        self.notify(if on { "Backlight on" } else { "Backlight off" });
    }

    fn poll_mode(&self) -> bool {
        self.poll_mode
    }

    fn set_poll_mode(&mut self, on: bool) {
        self.poll_mode = on;
    }

    fn settings(&self) -> Settings {
        self.settings
    }

    fn apply_settings(&mut self, settings: Settings) -> Result<()> {
        if self.calibrating() {
            return Err(DeviceError::Calibration(
                "settings locked while calibrating".into(),
            ));
        }
        self.imu.lock().configure(&settings)?;
        self.settings = settings;
        Ok(())
    }

    fn start_calibration(&mut self) -> Result<()> {
        if self.calibrating() {
            tracing::debug!("calibration already running");
            return Ok(());
        }
        let imu = self.imu.clone();
        let display = self.display.clone();
        let loops = self.calibration_loops;
        let handle = std::thread::Builder::new()
            .name("calibration".into())
            .spawn(move || {
                display.with(|d| {
                    d.overlay_clear();
                    d.overlay(0, 0, "Calibrating", Duration::from_secs(3600));
                });
                let result = imu.lock().calibrate(loops);
                display.with(|d| d.overlay_clear());
                result
            })
            .map_err(|err| DeviceError::Calibration(err.to_string()))?;
        tracing::info!(loops, "calibration started");
        self.calibration = Some(handle);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let (settings, poll_mode) = self.defaults;
        if !self.calibrating() {
            self.imu.lock().configure(&settings)?;
        }
        self.settings = settings;
        self.poll_mode = poll_mode;
        self.display.with(|d| {
            d.clear();
            d.overlay_clear();
            d.set_backlight(true);
        });
        tracing::info!("device reset");
        Ok(())
    }
}

/// Counters for traffic the device originated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub samples_sent: u64,
    pub calibrations: u64,
}

/// Everything the scheduled tasks operate on.
pub struct DeviceState<L, I, D> {
    serial: SerialManager<L>,
    dispatcher: Dispatcher,
    peripherals: Peripherals<I, D>,
    sample_interval: Duration,
    display_refresh: Duration,
    last_sample: Instant,
    raw_batch: RawAccelPacket,
    raw_len: usize,
    stats: DeviceStats,
}

impl<L, I, D> DeviceState<L, I, D>
where
    L: ByteLink + 'static,
    I: Imu + 'static,
    D: Display + 'static,
{
    pub fn serial(&self) -> &SerialManager<L> {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut SerialManager<L> {
        &mut self.serial
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn peripherals(&self) -> &Peripherals<I, D> {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals<I, D> {
        &mut self.peripherals
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    fn receive(&mut self) -> Schedule {
        match self.serial.poll() {
            Ok(summary) if summary.bytes > 0 => Schedule::Immediate,
            Ok(_) => Schedule::After(IDLE_POLL),
            Err(err) => Schedule::Halt(format!("link failed: {err}")),
        }
    }

    fn dispatch(&mut self) -> Schedule {
        match self
            .dispatcher
            .dispatch_one(&mut self.serial, &mut self.peripherals)
        {
            Ok(Some(_)) => Schedule::Immediate,
            Ok(None) => Schedule::After(IDLE_POLL),
            Err(DeviceError::Calibration(reason)) => {
                tracing::warn!(%reason, "control request refused");
                Schedule::Immediate
            }
            Err(err) => Schedule::Halt(format!("dispatch failed: {err}")),
        }
    }

    fn sample(&mut self) -> Schedule {
        let interval = self.sample_interval;
        if !self.peripherals.poll_mode || self.peripherals.calibrating() {
            return Schedule::After(interval);
        }

        let reading = match self.peripherals.imu.lock().read() {
            Ok(Some(reading)) => reading,
            Ok(None) => return Schedule::After(interval),
            Err(err) => {
                tracing::warn!(error = %err, "imu read failed");
                return Schedule::After(interval);
            }
        };

        let now = Instant::now();
        let delta = now.duration_since(self.last_sample);
        let sent = if self.peripherals.settings.raw_samples {
            let delta_micros = u32::try_from(delta.as_micros()).unwrap_or(u32::MAX);
            self.raw_batch.samples[self.raw_len] = reading.to_raw(delta_micros);
            self.raw_len += 1;
            if self.raw_len < RAW_SAMPLES_PER_PACKET {
                self.last_sample = now;
                return Schedule::After(interval);
            }
            self.raw_len = 0;
            let batch = self.raw_batch;
            self.serial.send_typed(&batch)
        } else {
            let delta_micros = u64::try_from(delta.as_micros()).unwrap_or(u64::MAX);
            self.serial.send_typed(&reading.to_accel(delta_micros))
        };
        self.last_sample = now;

        match sent {
            Ok(()) => {
                self.stats.samples_sent += 1;
                Schedule::After(interval)
            }
            Err(err) => Schedule::Halt(format!("link failed: {err}")),
        }
    }

    fn refresh_display(&mut self) -> Schedule {
        let stats = self.serial.stats();
        let intact = self.peripherals.display.with(|d| {
            d.print(0, 1, &format!("{}/{}", stats.received, stats.corrupted));
            if !d.check_integrity() {
                return false;
            }
            d.refresh();
            true
        });
        if intact {
            Schedule::After(self.display_refresh)
        } else {
            Schedule::Halt("display buffer corrupt".into())
        }
    }

    fn collect_calibration(&mut self) -> Schedule {
        let Some(result) = self.peripherals.take_finished_calibration() else {
            return Schedule::After(CALIBRATION_POLL);
        };

        let sent = match result {
            Ok(calibration) => {
                self.stats.calibrations += 1;
                self.peripherals.settings.accel_offset = calibration.accel_offset;
                self.peripherals.settings.gyro_offset = calibration.gyro_offset;
                tracing::info!(?calibration, "calibration finished");
                self.peripherals.notify("Calibrated");
                let report = ConfigurePacket::new(ConfigureKind::Settings, ConfigureValue::Set)
                    .with_settings(&self.peripherals.settings);
                self.serial.send_typed(&report)
            }
            Err(err) => {
                tracing::warn!(error = %err, "calibration failed");
                self.peripherals.notify("Calib. failed");
                self.serial
                    .send_typed(&ConfigurePacket::new(
                        ConfigureKind::Calibrate,
                        ConfigureValue::Nack,
                    ))
                    .and_then(|()| self.serial.send_line(&err.to_string()))
            }
        };

        match sent {
            Ok(()) => Schedule::After(CALIBRATION_POLL),
            Err(err) => Schedule::Halt(format!("link failed: {err}")),
        }
    }
}

/// A device: serial manager, peripherals and the cooperative run loop.
///
/// Tasks, in registration order: `serial` (receiver), `dispatch`,
/// `sample`, `display`, `calibration`.
pub struct Device<L, I, D> {
    state: DeviceState<L, I, D>,
    scheduler: Scheduler<DeviceState<L, I, D>>,
}

impl<L, I, D> Device<L, I, D>
where
    L: ByteLink + 'static,
    I: Imu + 'static,
    D: Display + 'static,
{
    pub fn new(link: L, imu: I, display: D, config: DeviceConfig) -> Self {
        Self::with_shared(link, Shared::new(imu), Shared::new(display), config)
    }

    /// Build around peripherals the caller keeps handles to.
    pub fn with_shared(link: L, imu: Shared<I>, display: Shared<D>, config: DeviceConfig) -> Self {
        let state = DeviceState {
            serial: SerialManager::with_config(link, &config.frame),
            dispatcher: Dispatcher::new(),
            peripherals: Peripherals {
                imu,
                display,
                settings: config.settings,
                poll_mode: config.poll_mode,
                defaults: (config.settings, config.poll_mode),
                calibration_loops: config.calibration_loops,
                calibration: None,
            },
            sample_interval: config.sample_interval,
            display_refresh: config.display_refresh,
            last_sample: Instant::now(),
            raw_batch: RawAccelPacket::default(),
            raw_len: 0,
            stats: DeviceStats::default(),
        };

        let mut scheduler = Scheduler::new(config.task_timeout);
        scheduler.schedule("serial", DeviceState::receive);
        scheduler.schedule("dispatch", DeviceState::dispatch);
        scheduler.schedule("sample", DeviceState::sample);
        scheduler.schedule("display", DeviceState::refresh_display);
        scheduler.schedule("calibration", DeviceState::collect_calibration);

        Self { state, scheduler }
    }

    /// Flush boot-time input and bring the peripherals up.
    pub fn init(&mut self) -> Result<()> {
        let peripherals = &mut self.state.peripherals;
        peripherals.imu.lock().configure(&peripherals.settings)?;
        peripherals.display.with(|d| d.set_backlight(true));
        self.state.serial.init()?;
        tracing::info!(
            poll_mode = peripherals.poll_mode,
            tasks = self.scheduler.len(),
            "device initialised"
        );
        Ok(())
    }

    /// Restore start-up settings and re-initialise the serial state.
    pub fn reset(&mut self) -> Result<()> {
        self.state.peripherals.reset()?;
        self.state.serial.init()?;
        self.state.raw_len = 0;
        Ok(())
    }

    pub fn run_once(&mut self) -> Result<Tick> {
        self.scheduler.run_once(&mut self.state)
    }

    pub fn run_until(&mut self, stop: impl FnMut(&DeviceState<L, I, D>) -> bool) -> Result<()> {
        self.scheduler.run_until(&mut self.state, stop)
    }

    pub fn run_for(&mut self, duration: Duration) -> Result<()> {
        self.scheduler.run_for(&mut self.state, duration)
    }

    pub fn state(&self) -> &DeviceState<L, I, D> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DeviceState<L, I, D> {
        &mut self.state
    }

    pub fn scheduler(&self) -> &Scheduler<DeviceState<L, I, D>> {
        &self.scheduler
    }
}
