use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use const_format::concatcp;
use log::info;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::protocol::patterns::{MAX_SPEED, MIN_SPEED};
use crate::protocol::state::Airflow;


pub const CONFIG_FILENAME: &str = "maxfanbridge.toml";

const DEFAULT_DEVICE_NAME: &str = "maxfan";
const DEFAULT_DISPLAY_TIMEOUT_SECONDS: u32 = 20;

const DEFAULT_TIMER_RUN_FOR: Duration = Duration::from_secs(15 * 60);
const DEFAULT_TIMER_PAUSE_FOR: Duration = Duration::from_secs(45 * 60);
const DEFAULT_TIMER_PERCENT: u8 = 30;

const DEFAULT_MQTT_HOST: &str = "localhost";
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_TOPIC_PREFIX: &str = "maxfan";
const DEFAULT_COMMAND_TOPIC: &str = concatcp!(DEFAULT_TOPIC_PREFIX, "/command");
const DEFAULT_STATE_TOPIC: &str = concatcp!(DEFAULT_TOPIC_PREFIX, "/state");

/// Choices offered for the display timeout; `0` keeps the display on.
pub const DISPLAY_TIMEOUT_CHOICES: [u32; 6] = [0, 10, 20, 30, 60, 300];


#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: io::Error
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        source: io::Error
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serializing config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String
    },
}


#[derive(EnumString, Display, EnumIter, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Connection {
    #[default]
    None,
    Timer,
    Mqtt,
    Ble,
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device_name: String,

    /// Seconds without input before the display goes dark, `0` for never
    pub display_timeout_seconds: u32,

    pub connection: Connection,

    pub timer: TimerConfig,

    pub mqtt: MqttConfig,

    pub ble: BleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_owned(),
            display_timeout_seconds: DEFAULT_DISPLAY_TIMEOUT_SECONDS,
            connection: Connection::default(),
            timer: TimerConfig::default(),
            mqtt: MqttConfig::default(),
            ble: BleConfig::default(),
        }
    }
}

impl Config {
    /// Read `path`, falling back to the defaults if it doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("{} not found, using defaults", path.display());
                return Ok(Self::default());
            },
            Err(source) => return Err(ConfigError::Read { path: path.to_owned(), source }),
        };

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Write { path: path.to_owned(), source })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let percent = self.timer.percent;
        if percent % 10 != 0 || !(MIN_SPEED..=MAX_SPEED).contains(&percent) {
            return Err(ConfigError::Invalid {
                field: "timer.percent",
                reason: format!("{percent} is not one of 10, 20, ..., 100"),
            });
        }

        Ok(())
    }

    pub fn display_timeout(&self) -> Option<Duration> {
        match self.display_timeout_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds as u64)),
        }
    }
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimerConfig {
    #[serde(with = "duration_seconds", rename = "run_for_seconds")]
    pub run_for: Duration,

    #[serde(with = "duration_seconds", rename = "pause_for_seconds")]
    pub pause_for: Duration,

    pub percent: u8,

    pub airflow: Airflow,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            run_for: DEFAULT_TIMER_RUN_FOR,
            pause_for: DEFAULT_TIMER_PAUSE_FOR,
            percent: DEFAULT_TIMER_PERCENT,
            airflow: Airflow::Out,
        }
    }
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,

    /// Defaults to the device name when empty
    pub client_id: String,

    pub username: Option<String>,
    pub password: Option<String>,

    pub command_topic: String,
    pub state_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MQTT_HOST.to_owned(),
            port: DEFAULT_MQTT_PORT,
            client_id: String::new(),
            username: None,
            password: None,
            command_topic: DEFAULT_COMMAND_TOPIC.to_owned(),
            state_topic: DEFAULT_STATE_TOPIC.to_owned(),
        }
    }
}


#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BleConfig {
    /// Advertised name, defaults to the device name when empty
    pub local_name: String,
}


/// (De)serialize a `Duration` as an integer number of seconds.
mod duration_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let seconds = u64::deserialize(d)?;
        Ok(Duration::from_secs(seconds))
    }
}
