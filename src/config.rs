use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{MessengerError, MessengerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Applied when a send does not name its own timeout.
    #[serde(default = "default_timeout", with = "duration_ms")]
    pub default_timeout: Duration,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Reason attached to requests rejected by cancel and teardown.
    #[serde(default = "default_cancel_reason")]
    pub cancel_reason: String,

    #[serde(default)]
    pub demo: DemoConfig,
}

/// Settings for the demo host that answers `generate_image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    #[serde(default = "default_image_size")]
    pub image_width: u32,

    #[serde(default = "default_image_size")]
    pub image_height: u32,

    /// Simulated processing time before the host answers.
    #[serde(default = "default_host_delay", with = "duration_ms")]
    pub host_delay: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            image_base_url: default_image_base_url(),
            image_width: default_image_size(),
            image_height: default_image_size(),
            host_delay: default_host_delay(),
        }
    }
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            channel_capacity: default_channel_capacity(),
            cancel_reason: default_cancel_reason(),
            demo: DemoConfig::default(),
        }
    }
}

impl MessengerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> MessengerResult<Self> {
        from_file::<Self, _>(path)?.validated()
    }

    pub fn from_str(s: &str) -> MessengerResult<Self> {
        from_str::<Self>(s)?.validated()
    }

    /// Rejects values the messenger cannot run with.
    pub fn validated(self) -> MessengerResult<Self> {
        if self.channel_capacity == 0 {
            return Err(MessengerError::Config(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> MessengerResult<T> {
    let file = File::open(path)
        .map_err(|e| MessengerError::Config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| MessengerError::Config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> MessengerResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| MessengerError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_channel_capacity() -> usize {
    64
}

fn default_cancel_reason() -> String {
    "cancelled".to_string()
}

fn default_image_base_url() -> String {
    "https://placehold.co".to_string()
}

fn default_image_size() -> u32 {
    512
}

fn default_host_delay() -> Duration {
    Duration::from_millis(300)
}

// Durations are written as integer milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
