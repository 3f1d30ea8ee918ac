use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        // Skip empty lines and comments
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            // Find the first '=' and split there
            let (key, value) = line.split_once('=')?;
            let mut value = value.trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            Some((key.trim(), value))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub sensor: SensorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Friendly name in zigbee2mqtt (e.g., "Hallway-Motion")
    pub friendly_name: String,
    /// zigbee2mqtt base topic
    pub base_topic: String,
    /// Topic the reconciled occupancy is published to
    pub occupancy_topic: String,
}

impl SensorConfig {
    pub fn new(friendly_name: impl Into<String>, base_topic: impl Into<String>) -> Self {
        let friendly_name = friendly_name.into();
        let base_topic = base_topic.into();
        Self {
            occupancy_topic: format!("{}/{}/reconciled", base_topic, friendly_name),
            friendly_name,
            base_topic,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "motion-occupancy-bridge".to_string(),
                username: None,
                password: None,
            },
            sensor: SensorConfig::new("RFDL-ZB-MS", "zigbee2mqtt"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        // Sensor configuration
        let name = std::env::var("SENSOR_NAME").unwrap_or(config.sensor.friendly_name.clone());
        let base = std::env::var("Z2M_BASE_TOPIC").unwrap_or(config.sensor.base_topic.clone());
        config.sensor = SensorConfig::new(name, base);
        if let Ok(topic) = std::env::var("OCCUPANCY_TOPIC") {
            config.sensor.occupancy_topic = topic;
        }

        config
    }

    /// Rename the sensor, keeping the output topic derived unless it was set
    /// explicitly.
    pub fn with_sensor_name(mut self, name: impl Into<String>) -> Self {
        let derived = SensorConfig::new(
            self.sensor.friendly_name.clone(),
            self.sensor.base_topic.clone(),
        );
        let custom_topic = (self.sensor.occupancy_topic != derived.occupancy_topic)
            .then(|| self.sensor.occupancy_topic.clone());

        self.sensor = SensorConfig::new(name, self.sensor.base_topic.clone());
        if let Some(topic) = custom_topic {
            self.sensor.occupancy_topic = topic;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv() {
        let content = "# comment\n\nMQTT_BROKER_HOST = 10.0.0.2\nSENSOR_NAME=\"Hall Motion\"\nBAD LINE\nMQTT_PASSWORD='x=y'\n";
        assert_eq!(
            parse_dotenv(content),
            vec![
                ("MQTT_BROKER_HOST", "10.0.0.2"),
                ("SENSOR_NAME", "Hall Motion"),
                ("MQTT_PASSWORD", "x=y"),
            ]
        );
    }

    #[test]
    fn test_default_topics() {
        let config = Config::default();
        assert_eq!(config.sensor.base_topic, "zigbee2mqtt");
        assert_eq!(
            config.sensor.occupancy_topic,
            "zigbee2mqtt/RFDL-ZB-MS/reconciled"
        );
    }

    #[test]
    fn test_with_sensor_name_rederives_topic() {
        let config = Config::default().with_sensor_name("Hallway");
        assert_eq!(config.sensor.friendly_name, "Hallway");
        assert_eq!(config.sensor.occupancy_topic, "zigbee2mqtt/Hallway/reconciled");

        let mut config = Config::default();
        config.sensor.occupancy_topic = "home/hallway/occupancy".to_string();
        let config = config.with_sensor_name("Hallway");
        assert_eq!(config.sensor.occupancy_topic, "home/hallway/occupancy");
    }
}
