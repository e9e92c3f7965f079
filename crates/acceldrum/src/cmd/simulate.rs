use std::time::{Duration, Instant};

use acceldrum_device::{
    Device, DeviceConfig, DeviceStats, SerialManager, Shared, SimulatedImu, TextDisplay,
};
use acceldrum_frame::{LinkStats, Packet, Payload, Settings, TextAssembler};
use acceldrum_transport::{ByteLink, MemoryLink, Result as LinkResult};

use crate::cmd::inject::corrupt_frame;
use crate::cmd::{parse_duration, SimulateArgs};
use crate::exit::{device_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packet, print_stats, print_text, OutputFormat};

/// Device-side link that damages a share of outgoing writes.
///
/// A damaged write has one bit flipped and a burst of junk bytes appended,
/// the way a marginal cable or a bootloader banner would.
pub struct NoisyLink<L> {
    inner: L,
    percent: u8,
    state: u64,
    damaged: u64,
}

impl<L: ByteLink> NoisyLink<L> {
    pub fn new(inner: L, percent: u8, seed: u64) -> Self {
        Self {
            inner,
            percent: percent.min(100),
            state: seed | 1,
            damaged: 0,
        }
    }

    pub fn damaged(&self) -> u64 {
        self.damaged
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state >> 33
    }
}

impl<L: ByteLink> ByteLink for NoisyLink<L> {
    fn read_available(&mut self, buf: &mut [u8]) -> LinkResult<usize> {
        self.inner.read_available(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        if bytes.is_empty() || self.next() % 100 >= u64::from(self.percent) {
            return self.inner.write_all(bytes);
        }
        self.damaged += 1;
        let mut noisy = bytes.to_vec();
        let bit = (self.next() as usize) % (noisy.len() * 8);
        noisy[bit / 8] ^= 1 << (bit % 8);
        let junk = (self.next() % 8) as usize;
        for _ in 0..junk {
            noisy.push(self.next() as u8);
        }
        self.inner.write_all(&noisy)
    }

    fn flush(&mut self) -> LinkResult<()> {
        self.inner.flush()
    }

    fn discard_input(&mut self) -> LinkResult<usize> {
        self.inner.discard_input()
    }
}

/// Totals from one simulation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationReport {
    pub host: LinkStats,
    pub device: LinkStats,
    pub device_stats: DeviceStats,
    pub damaged_writes: u64,
    pub injected: u64,
    pub samples_seen: u64,
    pub texts_seen: u64,
}

impl SimulationReport {
    fn rows(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("samples_sent", self.device_stats.samples_sent),
            ("samples_seen", self.samples_seen),
            ("texts_seen", self.texts_seen),
            ("damaged_writes", self.damaged_writes),
            ("host_received", self.host.received),
            ("host_corrupted", self.host.corrupted),
            ("host_dropped", self.host.dropped),
            ("host_bytes_read", self.host.bytes_read),
            ("injected", self.injected),
            ("device_received", self.device.received),
            ("device_corrupted", self.device.corrupted),
        ]
    }
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    if args.interval_ms == 0 {
        return Err(CliError::new(USAGE, "--interval-ms must be greater than zero"));
    }
    let report = simulate(&args, duration, |packet| {
        if args.verbose {
            match packet {
                Seen::Packet(packet) => print_packet(packet, format),
                Seen::Text(text) => print_text(text, format),
            }
        }
    })?;
    print_stats(&report.rows(), format);
    Ok(SUCCESS)
}

/// Something the simulated host received.
pub enum Seen<'a> {
    Packet(&'a Packet),
    Text(&'a str),
}

/// Run a simulated device and a host over an in-memory link pair.
pub fn simulate(
    args: &SimulateArgs,
    duration: Duration,
    mut on_seen: impl FnMut(Seen<'_>),
) -> CliResult<SimulationReport> {
    let (host_end, device_end) = MemoryLink::pair();
    let config = DeviceConfig {
        sample_interval: Duration::from_millis(args.interval_ms),
        settings: Settings {
            raw_samples: args.raw,
            ..Settings::default()
        },
        ..DeviceConfig::default()
    };
    let mut device = Device::with_shared(
        NoisyLink::new(device_end, args.noise, args.seed),
        Shared::new(SimulatedImu::new()),
        Shared::new(TextDisplay::new()),
        config,
    );
    device.init().map_err(|err| device_error("device init failed", err))?;

    let mut host = SerialManager::new(host_end);
    let mut report = SimulationReport::default();
    let mut text = TextAssembler::new();
    let mut polls = 0u64;
    let deadline = Instant::now() + duration;

    tracing::info!(?duration, noise = args.noise, raw = args.raw, "simulation started");
    while Instant::now() < deadline {
        let tick = device
            .run_once()
            .map_err(|err| device_error("device stopped", err))?;

        host.poll().map_err(|err| device_error("host receive failed", err))?;
        polls += 1;
        while let Some(packet) = host.try_dequeue() {
            match Payload::from_packet(&packet) {
                Ok(Payload::Text(chunk)) => {
                    if let Some(message) = text.push(&chunk) {
                        report.texts_seen += 1;
                        on_seen(Seen::Text(&message));
                    }
                    continue;
                }
                Ok(Payload::Accel(_) | Payload::RawAccel(_)) => report.samples_seen += 1,
                _ => {}
            }
            on_seen(Seen::Packet(&packet));
        }

        if args.corrupt_every > 0 && polls % args.corrupt_every == 0 {
            host.send_raw(&corrupt_frame(0x6969))
                .map_err(|err| device_error("inject failed", err))?;
            report.injected += 1;
        }

        if tick.ran == 0 {
            if let Some(due) = tick.next_due {
                let wait = due.saturating_duration_since(Instant::now());
                std::thread::sleep(wait.min(Duration::from_millis(1)));
            }
        }
    }

    let state = device.state();
    report.host = host.stats();
    report.device = state.serial().stats();
    report.device_stats = state.stats();
    report.damaged_writes = state.serial().link().damaged();
    tracing::info!(
        samples = report.samples_seen,
        corrupted = report.host.corrupted,
        "simulation finished"
    );
    Ok(report)
}
