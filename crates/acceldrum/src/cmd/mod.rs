use std::path::PathBuf;
use std::time::Duration;

use acceldrum_frame::{AccelRange, ConfigureKind, ConfigureValue, GyroRange, PacketType};
use acceldrum_transport::DEFAULT_BAUD;
use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod inject;
pub mod listen;
pub mod send;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive packets from a serial device and print them.
    Listen(ListenArgs),
    /// Send a control or text packet.
    Send(SendArgs),
    /// Send deliberately corrupt frames.
    Inject(InjectArgs),
    /// Run a simulated device against an in-memory host.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Inject(args) => inject::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone)]
pub struct PortArgs {
    /// Serial device path (e.g. /dev/ttyACM0).
    pub port: PathBuf,
    /// Line rate in bits per second.
    #[arg(long, default_value_t = DEFAULT_BAUD, env = "ACCELDRUM_BAUD")]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Only print these packet types (comma-separated, e.g. accel,text).
    #[arg(long, value_delimiter = ',', value_parser = parse_packet_type)]
    pub types: Option<Vec<PacketType>>,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// Stop after this long without a packet (e.g. 5s, 500ms).
    #[arg(long)]
    pub idle_timeout: Option<String>,
    /// Print link statistics on exit.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    #[command(subcommand)]
    pub message: SendMessage,
    /// Wait for the device's Configure response and print it.
    #[arg(long, global = true)]
    pub wait: bool,
    /// Maximum time to wait for a response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    pub wait_timeout: String,
}

#[derive(Subcommand, Debug)]
pub enum SendMessage {
    /// A Configure request.
    Configure(ConfigureArgs),
    /// A text message, split into as many Text packets as needed.
    Text(TextArgs),
}

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    /// What to configure.
    #[arg(long)]
    pub kind: KindArg,
    /// Request value.
    #[arg(long)]
    pub value: ValueArg,
    /// Accelerometer full-scale range in g (settings set).
    #[arg(long, value_parser = parse_accel_range)]
    pub accel_range: Option<AccelRange>,
    /// Gyroscope full-scale range in degrees per second (settings set).
    #[arg(long, value_parser = parse_gyro_range)]
    pub gyro_range: Option<GyroRange>,
    /// Stream RawAccel batches instead of fused samples (settings set).
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct TextArgs {
    /// Message to send.
    pub message: String,
    /// Append a newline chunk.
    #[arg(long)]
    pub line: bool,
}

#[derive(Args, Debug)]
pub struct InjectArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Number of corrupt frames to send.
    #[arg(long, default_value_t = 1)]
    pub count: usize,
    /// Checksum written into the frames.
    #[arg(long, default_value = "0x6969", value_parser = parse_u32)]
    pub crc: u32,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// How long to run (e.g. 2s, 500ms).
    #[arg(long, default_value = "1s")]
    pub duration: String,
    /// Sample interval in milliseconds.
    #[arg(long, default_value_t = 10)]
    pub interval_ms: u64,
    /// Stream RawAccel batches.
    #[arg(long)]
    pub raw: bool,
    /// Chance in percent that a device write picks up line noise.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub noise: u8,
    /// Send a corrupt frame to the device every N host polls (0 = never).
    #[arg(long, default_value_t = 0)]
    pub corrupt_every: u64,
    /// Seed for the noise generator.
    #[arg(long, default_value_t = 0x5EED)]
    pub seed: u64,
    /// Print every received packet, not just the totals.
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Backlight,
    PollMode,
    Settings,
    Calibrate,
    Reset,
}

impl From<KindArg> for ConfigureKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Backlight => ConfigureKind::Backlight,
            KindArg::PollMode => ConfigureKind::PollMode,
            KindArg::Settings => ConfigureKind::Settings,
            KindArg::Calibrate => ConfigureKind::Calibrate,
            KindArg::Reset => ConfigureKind::Reset,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ValueArg {
    Get,
    On,
    Off,
    Toggle,
    Set,
}

impl From<ValueArg> for ConfigureValue {
    fn from(value: ValueArg) -> Self {
        match value {
            ValueArg::Get => ConfigureValue::Get,
            ValueArg::On => ConfigureValue::On,
            ValueArg::Off => ConfigureValue::Off,
            ValueArg::Toggle => ConfigureValue::Toggle,
            ValueArg::Set => ConfigureValue::Set,
        }
    }
}

fn parse_packet_type(input: &str) -> Result<PacketType, String> {
    PacketType::from_name(input).ok_or_else(|| {
        let names: Vec<String> = PacketType::ALL
            .iter()
            .map(|t| t.name().to_ascii_lowercase())
            .collect();
        format!("unknown packet type '{input}' (expected one of {})", names.join(", "))
    })
}

fn parse_accel_range(input: &str) -> Result<AccelRange, String> {
    match input.trim_end_matches('g') {
        "2" => Ok(AccelRange::G2),
        "4" => Ok(AccelRange::G4),
        "8" => Ok(AccelRange::G8),
        "16" => Ok(AccelRange::G16),
        _ => Err(format!("unsupported accel range '{input}' (2, 4, 8 or 16)")),
    }
}

fn parse_gyro_range(input: &str) -> Result<GyroRange, String> {
    match input.trim_end_matches("dps") {
        "250" => Ok(GyroRange::Dps250),
        "500" => Ok(GyroRange::Dps500),
        "1000" => Ok(GyroRange::Dps1000),
        "2000" => Ok(GyroRange::Dps2000),
        _ => Err(format!("unsupported gyro range '{input}' (250, 500, 1000 or 2000)")),
    }
}

fn parse_u32(input: &str) -> Result<u32, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid number '{input}': {err}"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn open_port(port: &PortArgs) -> CliResult<acceldrum_transport::SerialLink> {
    let config = acceldrum_transport::SerialConfig { baud: port.baud };
    acceldrum_transport::open_serial(&port.port, &config)
        .map_err(|err| crate::exit::transport_error("serial port", err))
}
