use anyhow::{Context, Result};
use canbms_lib::publish::Publisher;
use canbms_lib::telemetry::Telemetry;
use canbms_lib::Controller;
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::{ops::Deref, panic, sync::mpsc};

mod commandline;
mod daemon;
mod mqtt;

use commandline::{CliArgs, MqttFormat, Output};

/// Frames buffered between the CAN reader and the event loop.
const EVENT_QUEUE_CAPACITY: usize = 256;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let controller = Controller::new(args.controller_config());

    let telemetry = match &args.telemetry_config {
        Some(config_file) => {
            let config = mqtt::MqttConfig::load(config_file)
                .with_context(|| format!("Failed to open telemetry config file at '{config_file}'"))?;
            let publisher = mqtt::MqttPublisher::new(config, MqttFormat::Simple)
                .with_context(|| "Failed to create telemetry publisher")?;
            let topic = publisher.topic().to_string();
            info!("Telemetry publisher created for topic {topic}");
            Some(Telemetry::new(publisher, &topic))
        }
        None => None,
    };

    let (tx, rx) = mpsc::sync_channel(EVENT_QUEUE_CAPACITY);
    let _reader = canbms_lib::bus::spawn_reader(&args.interface, tx)
        .with_context(|| format!("Cannot open CAN interface '{}'", args.interface))?;

    match &args.output {
        Output::Console => daemon::run(
            controller,
            rx,
            Publisher::new(daemon::ConsoleSink),
            telemetry,
            args.interval,
        ),
        Output::Mqtt {
            config_file,
            format,
        } => {
            let config = mqtt::MqttConfig::load(config_file)
                .with_context(|| format!("Failed to open MQTT config file at '{config_file}'"))?;
            info!("Successfully loaded MQTT config from {config_file}: {config:?}");
            let publisher = mqtt::MqttPublisher::new(config, format.clone())
                .with_context(|| "Failed to create MQTT publisher")?;
            info!("MQTT Publisher created successfully.");
            daemon::run(
                controller,
                rx,
                Publisher::new(publisher),
                telemetry,
                args.interval,
            )
        }
    }
}
