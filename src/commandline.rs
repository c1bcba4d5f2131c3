use crate::mqtt;
use canbms_lib::Config;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::time::Duration;

#[derive(clap::ValueEnum, Debug, Clone, PartialEq)]
pub enum MqttFormat {
    Simple,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Output {
    /// Print every changed value to the standard output (console).
    Console,
    /// Publish every changed value to an MQTT broker.
    Mqtt {
        /// The configuration file for the MQTT broker
        #[arg(long, default_value_t = mqtt::MqttConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
        /// Output format for MQTT messages
        #[arg(long, value_enum, default_value_t = MqttFormat::Simple)]
        format: MqttFormat,
    },
}

const fn about_text() -> &'static str {
    "CAN bus battery pack bridge"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// SocketCAN interface the pack controller is attached to (e.g., can0)
    #[arg(short, long, default_value = "can0")]
    pub interface: String,

    /// Watchdog and publish period (e.g., "1s", "500ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "1s")]
    pub interval: Duration,

    /// Nominal capacity of the battery in Ah
    #[arg(long, default_value_t = Config::DEFAULT_INSTALLED_CAPACITY_AH)]
    pub installed_capacity: f64,

    /// Number of cells in series
    #[arg(long, default_value_t = Config::DEFAULT_CELLS_PER_BATTERY)]
    pub cells_per_battery: u8,

    /// Periods without request flags before the battery is considered offline
    #[arg(long, default_value_t = canbms_lib::watchdog::DEFAULT_THRESHOLD)]
    pub watchdog_threshold: u32,

    /// Product name reported by the identification paths
    #[arg(long, default_value_t = Config::DEFAULT_PRODUCT_NAME.to_string())]
    pub product_name: String,

    /// Device instance reported by the identification paths
    #[arg(long, default_value_t = Config::DEFAULT_DEVICE_INSTANCE)]
    pub device_instance: u32,

    /// MQTT configuration file for cell voltage telemetry (disabled when absent)
    #[arg(long)]
    pub telemetry_config: Option<String>,

    #[command(subcommand)]
    pub output: Output,
}

impl CliArgs {
    pub fn controller_config(&self) -> Config {
        Config {
            installed_capacity_ah: self.installed_capacity,
            cells_per_battery: self.cells_per_battery,
            watchdog_threshold: self.watchdog_threshold,
            product_name: self.product_name.clone(),
            device_instance: self.device_instance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["canbms", "console"]).unwrap();
        assert_eq!(args.interface, "can0");
        assert_eq!(args.interval, Duration::from_secs(1));
        assert_eq!(args.output, Output::Console);
        assert_eq!(args.controller_config(), Config::default());
    }

    #[test]
    fn mqtt_output() {
        let args = CliArgs::try_parse_from([
            "canbms",
            "--interface",
            "can8",
            "--interval",
            "500ms",
            "--installed-capacity",
            "280",
            "--product-name",
            "Garage",
            "mqtt",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.interface, "can8");
        assert_eq!(args.interval, Duration::from_millis(500));
        assert_eq!(args.controller_config().installed_capacity_ah, 280.0);
        assert_eq!(args.controller_config().product_name, "Garage");
        assert_eq!(args.controller_config().device_instance, 40);
        assert_eq!(
            args.output,
            Output::Mqtt {
                config_file: "mqtt.yaml".to_string(),
                format: MqttFormat::Json
            }
        );
    }
}
