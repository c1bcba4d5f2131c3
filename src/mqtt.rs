use anyhow::{Context, Result};
use canbms_lib::publish::{Path, StateSink, Value};
use canbms_lib::telemetry::TelemetrySink;
use rumqttc::{Client, MqttOptions, QoS};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::commandline::MqttFormat;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MqttConfig {
    host: String,
    #[serde(default = "MqttConfig::default_port")]
    port: u16,
    username: Option<String>,
    password: Option<String>,
    #[serde(default = "MqttConfig::default_topic")]
    topic: String,
    #[serde(default = "MqttConfig::default_qos")]
    qos: u8,
    #[serde(default = "MqttConfig::default_client_id")]
    client_id: String,
    #[serde(
        default = "MqttConfig::default_keep_alive_interval",
        with = "humantime_serde"
    )]
    keep_alive_interval: Duration,
    #[serde(default = "MqttConfig::default_capacity")]
    capacity: usize,
}

impl MqttConfig {
    fn default_port() -> u16 {
        1883
    }

    fn default_topic() -> String {
        "canbms".into()
    }

    fn default_qos() -> u8 {
        0
    }

    fn generate_random_string(len: usize) -> String {
        use rand::distributions::Alphanumeric;
        use rand::Rng;

        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    fn default_client_id() -> String {
        format!("canbms-{}", Self::generate_random_string(8))
    }

    fn default_keep_alive_interval() -> Duration {
        Duration::from_secs(30)
    }

    fn default_capacity() -> usize {
        64
    }

    pub const DEFAULT_CONFIG_FILE: &str = "mqtt.yaml";

    pub fn load(config_file_path: &str) -> Result<Self> {
        log::debug!("Loading config file from {config_file_path:?}");
        let config_file = std::fs::File::open(config_file_path)
            .with_context(|| format!("Cannot open MQTT config file {config_file_path:?}"))?;
        let config: Self = serde_yaml::from_reader(&config_file)
            .with_context(|| format!("Cannot read MQTT config from file: {config_file_path:?}"))?;
        Ok(config)
    }

    fn qos(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }

    /// Creates the client and spawns the thread driving its event loop.
    pub fn create_client(&self) -> Result<Client> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options
            .set_keep_alive(self.keep_alive_interval)
            .set_clean_session(true);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }

        log::info!(
            "Connecting to MQTT broker: {}:{} with client_id: {}",
            self.host,
            self.port,
            self.client_id
        );
        let (client, mut connection) = Client::new(options, self.capacity);

        // rumqttc reconnects on the next iteration after an error
        std::thread::Builder::new()
            .name("mqtt".into())
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(event) => log::trace!("MQTT event: {event:?}"),
                        Err(err) => {
                            log::warn!("MQTT connection error: {err}");
                            std::thread::sleep(Duration::from_secs(1));
                        }
                    }
                }
            })
            .with_context(|| "Cannot spawn MQTT event loop")?;
        Ok(client)
    }
}

pub struct MqttPublisher {
    client: Client,
    config: MqttConfig,
    format: MqttFormat,
    /// Latest value of every path, sent as one object in json format.
    document: serde_json::Map<String, serde_json::Value>,
    /// Set when `document` holds values the broker has not seen yet.
    dirty: bool,
}

impl MqttPublisher {
    pub fn new(config: MqttConfig, format: MqttFormat) -> Result<Self> {
        let client = config.create_client()?;
        Ok(Self::with_client(client, config, format))
    }

    fn with_client(client: Client, config: MqttConfig, format: MqttFormat) -> Self {
        Self {
            client,
            config,
            format,
            document: serde_json::Map::new(),
            dirty: false,
        }
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Queues the message without blocking; fails when the request queue is full.
    pub fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        log::debug!(
            "Publishing to MQTT: Topic='{}', Payload='{payload}', QoS={}",
            topic,
            self.config.qos
        );

        self.client
            .try_publish(topic, self.config.qos(), false, payload)
            .with_context(|| format!("Failed to publish message to MQTT topic: {}", topic))?;

        Ok(())
    }
}

fn publish_error(topic: &str, err: anyhow::Error) -> canbms_lib::Error {
    canbms_lib::Error::Publish {
        topic: topic.to_string(),
        reason: format!("{err:#}"),
    }
}

impl StateSink for MqttPublisher {
    fn write(&mut self, path: Path, value: &Value) -> canbms_lib::Result<()> {
        match self.format {
            MqttFormat::Simple => {
                // Do not publish empty values
                if *value == Value::Empty {
                    return Ok(());
                }
                let topic = format!("{}{}", self.topic(), path.as_str());
                self.publish(&topic, &value.to_string())
                    .map_err(|err| publish_error(&topic, err))
            }
            MqttFormat::Json => {
                let value = serde_json::to_value(value).map_err(|err| canbms_lib::Error::Publish {
                    topic: path.to_string(),
                    reason: err.to_string(),
                })?;
                self.document.insert(path.as_str().to_string(), value);
                self.dirty = true;
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> canbms_lib::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut data = self.document.clone();
        data.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        let payload = serde_json::Value::Object(data).to_string();
        let topic = self.topic().to_string();
        self.publish(&topic, &payload)
            .map_err(|err| publish_error(&topic, err))?;
        self.dirty = false;
        Ok(())
    }
}

impl TelemetrySink for MqttPublisher {
    fn push(&mut self, topic: &str, payload: &str) -> canbms_lib::Result<()> {
        self.publish(topic, payload)
            .map_err(|err| publish_error(topic, err))
    }
}
