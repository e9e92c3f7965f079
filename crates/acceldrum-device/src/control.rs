//! Flat request/response table for `Configure` packets.
//!
//! Every known `(kind, request value)` pair maps to exactly one reply and one
//! side effect. Anything else is ignored.

use acceldrum_frame::{ConfigureKind, ConfigurePacket, ConfigureValue, Settings};

use crate::error::Result;

/// Device-side effects reachable from the control channel.
pub trait Controls {
    fn backlight(&self) -> bool;

    fn set_backlight(&mut self, on: bool);

    fn poll_mode(&self) -> bool;

    fn set_poll_mode(&mut self, on: bool);

    fn settings(&self) -> Settings;

    fn apply_settings(&mut self, settings: Settings) -> Result<()>;

    /// Start calibration; completion is reported separately.
    fn start_calibration(&mut self) -> Result<()>;

    /// Return peripherals to their start-up state.
    fn reset(&mut self) -> Result<()>;
}

/// Side effect of a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReadBacklight,
    SetBacklight(bool),
    ToggleBacklight,
    ReadPollMode,
    SetPollMode(bool),
    ReadSettings,
    WriteSettings,
    Calibrate,
    Reset,
}

/// Reply sent once the action has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ack,
    /// `On`/`Off` for the state after the action.
    State,
    /// `Ack` carrying the settings after the action.
    Settings,
}

/// Look up the table entry for a request.
pub fn lookup(kind: ConfigureKind, value: ConfigureValue) -> Option<(Action, Reply)> {
    use ConfigureKind as K;
    use ConfigureValue as V;

    let entry = match (kind, value) {
        (K::Backlight, V::Get) => (Action::ReadBacklight, Reply::State),
        (K::Backlight, V::On) => (Action::SetBacklight(true), Reply::Ack),
        (K::Backlight, V::Off) => (Action::SetBacklight(false), Reply::Ack),
        (K::Backlight, V::Toggle) => (Action::ToggleBacklight, Reply::State),
        (K::PollMode, V::Get) => (Action::ReadPollMode, Reply::State),
        (K::PollMode, V::On) => (Action::SetPollMode(true), Reply::Ack),
        (K::PollMode, V::Off) => (Action::SetPollMode(false), Reply::Ack),
        (K::Settings, V::Get) => (Action::ReadSettings, Reply::Settings),
        (K::Settings, V::Set) => (Action::WriteSettings, Reply::Settings),
        (K::Calibrate, V::Set) => (Action::Calibrate, Reply::Ack),
        (K::Reset, V::Set) => (Action::Reset, Reply::Ack),
        _ => return None,
    };
    Some(entry)
}

/// Apply a request and build its reply.
///
/// Unknown requests return `Ok(None)` and touch nothing. A `Settings`/`Set`
/// request with an unreadable data region is answered with `Nack`.
pub fn respond<C: Controls + ?Sized>(
    controls: &mut C,
    request: &ConfigurePacket,
) -> Result<Option<ConfigurePacket>> {
    let (Some(kind), Some(value)) = (request.kind(), request.value()) else {
        tracing::debug!(
            kind = request.kind,
            value = request.value,
            "unknown configure request ignored"
        );
        return Ok(None);
    };
    let Some((action, reply)) = lookup(kind, value) else {
        tracing::debug!(
            kind = kind.name(),
            value = value.name(),
            "unsupported configure request ignored"
        );
        return Ok(None);
    };

    let state = match action {
        Action::ReadBacklight => controls.backlight(),
        Action::SetBacklight(on) => {
            controls.set_backlight(on);
            on
        }
        Action::ToggleBacklight => {
            let on = !controls.backlight();
            controls.set_backlight(on);
            on
        }
        Action::ReadPollMode => controls.poll_mode(),
        Action::SetPollMode(on) => {
            controls.set_poll_mode(on);
            on
        }
        Action::ReadSettings => false,
        Action::WriteSettings => {
            let Some(settings) = request.settings() else {
                tracing::debug!("configure settings rejected, bad data");
                return Ok(Some(ConfigurePacket::new(kind, ConfigureValue::Nack)));
            };
            controls.apply_settings(settings)?;
            false
        }
        Action::Calibrate => {
            controls.start_calibration()?;
            false
        }
        Action::Reset => {
            controls.reset()?;
            false
        }
    };

    tracing::debug!(
        kind = kind.name(),
        value = value.name(),
        ?action,
        "configure request handled"
    );

    let response = match reply {
        Reply::Ack => ConfigurePacket::ack(kind),
        Reply::State => ConfigurePacket::new(kind, ConfigureValue::from_state(state)),
        Reply::Settings => ConfigurePacket::ack(kind).with_settings(&controls.settings()),
    };
    Ok(Some(response))
}
