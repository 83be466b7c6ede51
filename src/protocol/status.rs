//! Status/command messages exchanged with remote-control transports.
//!
//! Output is always a full snapshot. Input is a partial update that is
//! validated as a whole before any field is applied.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::patterns::{MAX_CELSIUS, MAX_SPEED, MIN_CELSIUS, MIN_SPEED};
use super::state::{Airflow, CoverState, FanState, Mode};


#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("malformed command message")]
    Malformed,
    #[error("invalid mode")]
    InvalidMode,
    #[error("invalid cover")]
    InvalidCover,
    #[error("invalid airflow")]
    InvalidAirflow,
    #[error("invalid speed")]
    InvalidSpeed,
    #[error("invalid temperature")]
    InvalidTemperature,
}

impl CommandError {
    /// Stable numeric code shown on the display.
    pub fn code(&self) -> u8 {
        match self {
            CommandError::Malformed => 10,
            CommandError::InvalidMode => 11,
            CommandError::InvalidCover => 12,
            CommandError::InvalidAirflow => 13,
            CommandError::InvalidSpeed => 14,
            CommandError::InvalidTemperature => 15,
        }
    }

    /// Short text for the display
    pub fn text(&self) -> &'static str {
        match self {
            CommandError::Malformed => "JSON Format Err",
            CommandError::InvalidMode => "Invalid Mode",
            CommandError::InvalidCover => "Invalid Cover",
            CommandError::InvalidAirflow => "Invalid Airflow",
            CommandError::InvalidSpeed => "Invalid Speed",
            CommandError::InvalidTemperature => "Invalid Temp",
        }
    }

    pub fn caption(&self) -> &'static str {
        "JSON Error"
    }
}


/// Full snapshot of a [`FanState`] as sent to transports.
///
/// Only the named fields are carried. The `special` flag outside AUTO and the
/// unnamed control bits 5 and 6 have no field, so applying a snapshot does not
/// restore them: setting the mode rewrites `special`, bits 5 and 6 are left
/// as they were on the target.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub mode: String,
    pub cover: String,
    pub airflow: String,
    pub speed: u8,
    pub temperature: i32,
}

impl From<&FanState> for StatusMessage {
    fn from(state: &FanState) -> Self {
        Self {
            mode: state.mode().to_string(),
            cover: state.cover().to_string(),
            airflow: state.airflow().to_string(),
            speed: state.speed(),
            temperature: state.temperature_celsius(),
        }
    }
}

impl FanState {
    pub fn to_status(&self) -> StatusMessage {
        self.into()
    }

    pub fn to_json(&self) -> String {
        // a struct of strings and integers always serializes
        serde_json::to_string(&self.to_status()).unwrap_or_default()
    }

    /// Apply a (partial) command message.
    ///
    /// Every present field is validated first. On the first invalid field
    /// the matching error is returned and `self` is left untouched.
    pub fn apply_json(&mut self, json: &str) -> Result<(), CommandError> {
        let value: Value = serde_json::from_str(json).map_err(|_| CommandError::Malformed)?;
        let object = value.as_object().ok_or(CommandError::Malformed)?;

        let update = StatusUpdate::validate(object)?;
        update.apply(self);

        Ok(())
    }
}


/// A validated partial update
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub mode: Option<Mode>,
    pub cover: Option<CoverState>,
    pub airflow: Option<Airflow>,
    pub speed: Option<u8>,
    pub temperature: Option<i32>,
}

impl StatusUpdate {
    pub fn validate(object: &Map<String, Value>) -> Result<Self, CommandError> {
        fn parse_str<T: std::str::FromStr>(value: Option<&Value>, err: CommandError) -> Result<Option<T>, CommandError> {
            match value {
                None => Ok(None),
                Some(value) => value
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .map(Some)
                    .ok_or(err),
            }
        }

        let mode = parse_str::<Mode>(object.get("mode"), CommandError::InvalidMode)?;
        let cover = parse_str::<CoverState>(object.get("cover"), CommandError::InvalidCover)?;
        let airflow = parse_str::<Airflow>(object.get("airflow"), CommandError::InvalidAirflow)?;

        let speed = match object.get("speed") {
            None => None,
            Some(value) => {
                let speed = value.as_i64().ok_or(CommandError::InvalidSpeed)?;
                if speed % 10 != 0 || !(MIN_SPEED as i64..=MAX_SPEED as i64).contains(&speed) {
                    return Err(CommandError::InvalidSpeed);
                }
                Some(speed as u8)
            }
        };

        let temperature = match object.get("temperature") {
            None => None,
            Some(value) => {
                let temperature = value.as_i64().ok_or(CommandError::InvalidTemperature)?;
                if !(MIN_CELSIUS as i64..=MAX_CELSIUS as i64).contains(&temperature) {
                    return Err(CommandError::InvalidTemperature);
                }
                Some(temperature as i32)
            }
        };

        Ok(Self { mode, cover, airflow, speed, temperature })
    }

    /// Mode goes first, since changing it rewrites the cover flag.
    pub fn apply(&self, state: &mut FanState) {
        if let Some(mode) = self.mode {
            state.set_mode(mode);
        }
        if let Some(cover) = self.cover {
            state.set_cover(cover);
        }
        if let Some(airflow) = self.airflow {
            state.set_airflow(airflow);
        }
        if let Some(speed) = self.speed {
            state.set_speed(speed as i32);
        }
        if let Some(temperature) = self.temperature {
            state.set_temperature_celsius(temperature);
        }
    }

    pub fn to_json(&self) -> String {
        let mut object = Map::new();
        if let Some(mode) = self.mode {
            object.insert("mode".into(), mode.to_string().into());
        }
        if let Some(cover) = self.cover {
            object.insert("cover".into(), cover.to_string().into());
        }
        if let Some(airflow) = self.airflow {
            object.insert("airflow".into(), airflow.to_string().into());
        }
        if let Some(speed) = self.speed {
            object.insert("speed".into(), speed.into());
        }
        if let Some(temperature) = self.temperature {
            object.insert("temperature".into(), temperature.into());
        }
        Value::Object(object).to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::patterns::speed_pattern;

    #[test]
    fn test_status_round_trip() {
        for mode in [Mode::Off, Mode::Auto, Mode::Manual] {
            for cover in [CoverState::Open, CoverState::Closed] {
                for airflow in [Airflow::In, Airflow::Out] {
                    for speed in (10..=100).step_by(10) {
                        for celsius in MIN_CELSIUS..=MAX_CELSIUS {
                            let mut state = FanState::new();
                            state.set_mode(mode);
                            state.set_cover(cover);
                            state.set_airflow(airflow);
                            state.set_speed(speed);
                            state.set_temperature_celsius(celsius);

                            let mut decoded = FanState::new();
                            decoded.apply_json(&state.to_json()).expect("apply");

                            assert_eq!(decoded, state, "{state}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_round_trip_through_wire_bytes() {
        let mut state = FanState::new();
        state.set_mode(Mode::Auto);
        state.set_speed(90);
        state.set_temperature_celsius(31);

        let mut received = FanState::new();
        received.set_bytes(state.control_byte(), state.speed_pattern(), state.temperature_pattern());
        assert_eq!(received, state);

        let mut decoded = FanState::new();
        decoded.apply_json(&received.to_json()).expect("apply");
        assert_eq!(decoded, state);
        assert_eq!(speed_pattern(90), Some(decoded.speed_pattern()));
    }

    #[test]
    fn test_snapshot_drops_unnamed_control_bits() {
        // fan on, special and bit 5, as a third-party remote may send it
        let mut received = FanState::new();
        received.set_bytes(0x23, speed_pattern(40).unwrap(), 70);
        assert_eq!(received.mode(), Mode::Manual);
        assert_eq!(received.cover(), CoverState::Closed);

        let snapshot = received.to_json();

        let mut fresh = FanState::new();
        fresh.apply_json(&snapshot).expect("apply");
        assert_eq!(fresh.control_byte(), 0x01);
        assert_ne!(fresh, received);

        // re-applied on itself, special is cleared and bit 5 survives
        let mut same = received;
        same.apply_json(&snapshot).expect("apply");
        assert_eq!(same.control_byte(), 0x21);
        assert_eq!(same.speed(), received.speed());
        assert_eq!(same.temperature_fahrenheit(), received.temperature_fahrenheit());
    }

    #[test]
    fn test_snapshot_has_all_fields() {
        let json: Value = serde_json::from_str(&FanState::new().to_json()).unwrap();
        assert_eq!(json["mode"], "OFF");
        assert_eq!(json["cover"], "CLOSED");
        assert_eq!(json["airflow"], "IN");
        assert_eq!(json["speed"], 20);
        assert_eq!(json["temperature"], 26);
    }

    #[test]
    fn test_partial_update() {
        let mut state = FanState::new();
        state.apply_json(r#"{"mode":"MANUAL","speed":50}"#).expect("apply");

        assert_eq!(state.mode(), Mode::Manual);
        assert_eq!(state.speed(), 50);
        assert_eq!(state.temperature_celsius(), 26);
    }

    #[test]
    fn test_invalid_field_leaves_state_unchanged() {
        let mut state = FanState::new();
        let before = state;

        assert_eq!(state.apply_json(r#"{"mode":"MANUAL","speed":37}"#), Err(CommandError::InvalidSpeed));
        assert_eq!(state, before);

        assert_eq!(state.apply_json(r#"{"mode":"FAST"}"#), Err(CommandError::InvalidMode));
        assert_eq!(state.apply_json(r#"{"cover":"HALF"}"#), Err(CommandError::InvalidCover));
        assert_eq!(state.apply_json(r#"{"airflow":1}"#), Err(CommandError::InvalidAirflow));
        assert_eq!(state.apply_json(r#"{"speed":"50"}"#), Err(CommandError::InvalidSpeed));
        assert_eq!(state.apply_json(r#"{"speed":110}"#), Err(CommandError::InvalidSpeed));
        assert_eq!(state.apply_json(r#"{"temperature":38}"#), Err(CommandError::InvalidTemperature));
        assert_eq!(state.apply_json(r#"{"temperature":20.5}"#), Err(CommandError::InvalidTemperature));
        assert_eq!(state.apply_json("not json"), Err(CommandError::Malformed));
        assert_eq!(state.apply_json("[1,2]"), Err(CommandError::Malformed));
        assert_eq!(state, before);
    }

    #[test]
    fn test_mode_applied_before_cover() {
        let mut state = FanState::new();
        state.apply_json(r#"{"cover":"CLOSED","mode":"MANUAL"}"#).expect("apply");
        assert_eq!(state.mode(), Mode::Manual);
        assert_eq!(state.cover(), CoverState::Closed);
    }

    #[test]
    fn test_update_to_json() {
        let update = StatusUpdate {
            mode: Some(Mode::Manual),
            speed: Some(60),
            ..Default::default()
        };

        let mut state = FanState::new();
        state.apply_json(&update.to_json()).expect("apply");
        assert_eq!(state.mode(), Mode::Manual);
        assert_eq!(state.speed(), 60);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CommandError::Malformed.code(), 10);
        assert_eq!(CommandError::InvalidTemperature.code(), 15);
        assert_eq!(CommandError::InvalidSpeed.text(), "Invalid Speed");
    }
}
