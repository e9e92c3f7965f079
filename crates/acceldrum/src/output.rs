use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use acceldrum_frame::{ConfigureKind, ConfigurePacket, Packet, Payload, RawSample, Settings};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    packet_type: &'a str,
    raw_type: u32,
    crc32: String,
    payload: Value,
    timestamp: String,
}

#[derive(Serialize)]
struct TextOutput<'a> {
    packet_type: &'a str,
    text: &'a str,
    timestamp: String,
}

pub fn print_packet(packet: &Packet, format: OutputFormat) {
    let name = type_name(packet);
    let payload = Payload::from_packet(packet).ok();
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                packet_type: name,
                raw_type: packet.raw_type,
                crc32: format!("{:08x}", packet.crc32),
                payload: payload.as_ref().map(payload_json).unwrap_or(Value::Null),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "CRC32", "PAYLOAD"])
                .add_row(vec![
                    name.to_string(),
                    format!("{:08x}", packet.crc32),
                    payload.as_ref().map(payload_summary).unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} ({}) crc32={:08x} {}",
                packet.raw_type,
                name,
                packet.crc32,
                payload.as_ref().map(payload_summary).unwrap_or_default()
            );
        }
        OutputFormat::Raw => {
            println!("{}", packet.hex_dump(4, 8));
        }
    }
}

/// Print one reassembled text message.
pub fn print_text(text: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = TextOutput {
                packet_type: "TEXT",
                text,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("text: {}", text.trim_end()),
        OutputFormat::Raw => print_raw(text.as_bytes()),
    }
}

/// Print named counters, e.g. link statistics.
pub fn print_stats(rows: &[(&str, u64)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, Value> = rows
                .iter()
                .map(|(name, value)| ((*name).to_string(), json!(value)))
                .collect();
            println!("{}", Value::Object(map));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in rows {
                table.add_row(vec![(*name).to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            let line: Vec<String> = rows
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{}", line.join(" "));
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn type_name(packet: &Packet) -> &'static str {
    packet.packet_type().map(|t| t.name()).unwrap_or("UNKNOWN")
}

fn payload_json(payload: &Payload) -> Value {
    match payload {
        Payload::Accel(a) => json!({
            "delta_micros": a.delta_micros,
            "accel": [a.ax, a.ay, a.az],
            "quat": [a.gx, a.gy, a.gz, a.gw],
            "euler": [a.ex, a.ey, a.ez],
        }),
        Payload::RawAccel(r) => Value::Array(r.samples.iter().map(raw_sample_json).collect()),
        Payload::Text(t) => json!({
            "text": String::from_utf8_lossy(t.text()),
            "has_next": t.has_next,
        }),
        Payload::Configure(c) => configure_json(c),
    }
}

fn raw_sample_json(s: &RawSample) -> Value {
    json!({
        "delta_micros": s.delta_micros,
        "accel": [s.ax, s.ay, s.az],
        "gyro": [s.gx, s.gy, s.gz],
    })
}

fn configure_json(c: &ConfigurePacket) -> Value {
    let mut out = json!({
        "kind": c.kind().map(|k| k.name()).unwrap_or("unknown"),
        "value": c.value().map(|v| v.name()).unwrap_or("unknown"),
    });
    if let Some(settings) = configure_settings(c) {
        out["settings"] = settings_json(&settings);
    }
    out
}

fn settings_json(s: &Settings) -> Value {
    json!({
        "accel_range_g": s.accel_range.full_scale_g(),
        "gyro_range_dps": s.gyro_range.full_scale_dps(),
        "raw_samples": s.raw_samples,
        "accel_offset": s.accel_offset,
        "gyro_offset": s.gyro_offset,
    })
}

fn configure_settings(c: &ConfigurePacket) -> Option<Settings> {
    (c.kind() == Some(ConfigureKind::Settings))
        .then(|| c.settings())
        .flatten()
}

fn payload_summary(payload: &Payload) -> String {
    match payload {
        Payload::Accel(a) => format!(
            "dt={}us accel=[{:.3}, {:.3}, {:.3}]",
            a.delta_micros, a.ax, a.ay, a.az
        ),
        Payload::RawAccel(r) => r
            .samples
            .iter()
            .map(|s| {
                format!(
                    "dt={}us accel=[{:.3}, {:.3}, {:.3}] gyro=[{:.1}, {:.1}, {:.1}]",
                    s.delta_micros, s.ax, s.ay, s.az, s.gx, s.gy, s.gz
                )
            })
            .collect::<Vec<_>>()
            .join("; "),
        Payload::Text(t) => format!(
            "{:?}{}",
            String::from_utf8_lossy(t.text()),
            if t.has_next { " (more)" } else { "" }
        ),
        Payload::Configure(c) => {
            let mut out = format!(
                "{} {}",
                c.kind().map(|k| k.name()).unwrap_or("unknown"),
                c.value().map(|v| v.name()).unwrap_or("unknown")
            );
            if let Some(s) = configure_settings(c) {
                out.push_str(&format!(
                    " accel=±{}g gyro=±{}dps raw={}",
                    s.accel_range.full_scale_g(),
                    s.gyro_range.full_scale_dps(),
                    s.raw_samples
                ));
            }
            out
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use acceldrum_frame::{AccelRange, ConfigureValue, TextPacket};

    use super::*;

    #[test]
    fn configure_json_includes_settings_only_for_settings_kind() {
        let settings = Settings {
            accel_range: AccelRange::G4,
            ..Settings::default()
        };
        let with = ConfigurePacket::ack(ConfigureKind::Settings).with_settings(&settings);
        let out = configure_json(&with);
        assert_eq!(out["kind"], "settings");
        assert_eq!(out["settings"]["accel_range_g"], 4.0);

        let without = ConfigurePacket::new(ConfigureKind::Backlight, ConfigureValue::On);
        assert!(configure_json(&without).get("settings").is_none());
    }

    #[test]
    fn text_summary_marks_continuation() {
        let summary = payload_summary(&Payload::Text(TextPacket::new(b"hi", true)));
        assert_eq!(summary, "\"hi\" (more)");
    }
}
