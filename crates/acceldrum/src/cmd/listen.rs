use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use acceldrum_device::SerialManager;
use acceldrum_frame::{LinkStats, PacketType, Payload, TextAssembler};

use crate::cmd::{open_port, parse_duration, ListenArgs};
use crate::exit::{device_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_packet, print_stats, print_text, OutputFormat};

const IDLE_SLEEP: Duration = Duration::from_millis(1);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = args
        .idle_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let mut serial = SerialManager::new(open_port(&args.port)?);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut text = TextAssembler::new();
    let mut printed = 0usize;
    let mut last_packet = Instant::now();
    let mut timed_out = false;

    'outer: while running.load(Ordering::SeqCst) {
        let summary = serial
            .poll()
            .map_err(|err| device_error("receive failed", err))?;

        while let Some(packet) = serial.try_dequeue() {
            last_packet = Instant::now();
            let packet_type = packet.packet_type();
            if let (Some(types), Some(packet_type)) = (&args.types, packet_type) {
                if !types.contains(&packet_type) {
                    continue;
                }
            }

            if packet_type == Some(PacketType::Text) {
                let Ok(Payload::Text(chunk)) = Payload::from_packet(&packet) else {
                    continue;
                };
                match text.push(&chunk) {
                    Some(message) => print_text(&message, format),
                    None => continue,
                }
            } else {
                print_packet(&packet, format);
            }
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                break 'outer;
            }
        }

        if summary.bytes == 0 {
            if idle_timeout.is_some_and(|idle| last_packet.elapsed() >= idle) {
                timed_out = true;
                break;
            }
            std::thread::sleep(IDLE_SLEEP);
        }
    }

    let stats = serial.stats();
    tracing::debug!(
        received = stats.received,
        corrupted = stats.corrupted,
        dropped = stats.dropped,
        printed,
        "listen finished"
    );
    if args.stats {
        print_stats(&stats_rows(&stats, printed), format);
    }

    if timed_out && args.count.is_some() {
        return Err(CliError::new(
            TIMEOUT,
            format!("no packet within {:?} ({printed} printed)", idle_timeout.unwrap_or_default()),
        ));
    }
    Ok(SUCCESS)
}

fn stats_rows(stats: &LinkStats, printed: usize) -> [(&'static str, u64); 5] {
    [
        ("received", stats.received),
        ("corrupted", stats.corrupted),
        ("dropped", stats.dropped),
        ("bytes_read", stats.bytes_read),
        ("printed", printed as u64),
    ]
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
