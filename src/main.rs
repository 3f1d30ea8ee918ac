use clap::Parser;
use log::{error, info};
use motion_occupancy_bridge::bus::EventBus;
use motion_occupancy_bridge::clusters::OccupancyCluster;
use motion_occupancy_bridge::config::{self, Config};
use motion_occupancy_bridge::input::ias_zone::HardwareEventAdapter;
use motion_occupancy_bridge::input::mqtt::MotionSensorIntegration;
use motion_occupancy_bridge::instance_lock::InstanceLock;
use motion_occupancy_bridge::occupancy::{OccupancySubsystem, Timings};
use motion_occupancy_bridge::sensors::OccupancySensor;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser)]
#[command(name = "motion-occupancy-bridge")]
#[command(about = "Reconciles unreliable motion sensor clears into clean occupancy")]
struct Cli {
    /// zigbee2mqtt friendly name of the motion sensor
    #[arg(long, env = "SENSOR_NAME")]
    sensor: Option<String>,

    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER_HOST")]
    broker: Option<String>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Load .env file before the runtime starts any threads
    config::load_dotenv();
    init_logger();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(cli));
}

async fn run(cli: Cli) {
    let mut config = Config::from_env();
    if let Some(sensor) = cli.sensor {
        config = config.with_sensor_name(sensor);
    }
    if let Some(broker) = cli.broker {
        config.mqtt.broker_host = broker;
    }

    info!("Starting Motion Occupancy Bridge");
    info!("  Sensor: {}", config.sensor.friendly_name);
    info!(
        "  Broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    info!("  Output topic: {}", config.sensor.occupancy_topic);

    let _lock = match InstanceLock::acquire(&config.sensor.friendly_name) {
        Ok(lock) => lock,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let bus = Arc::new(EventBus::new());
    let occupancy = Arc::new(OccupancySensor::new(false));

    let subsystem = OccupancySubsystem::activate(
        &bus,
        OccupancyCluster::new(occupancy.clone()),
        Timings::default(),
    )
    .start();

    let integration = MotionSensorIntegration::new(
        config.mqtt.clone(),
        config.sensor.clone(),
        HardwareEventAdapter::new(bus.clone()),
        occupancy,
    )
    .start();

    info!("Motion Occupancy Bridge is running, press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    integration.abort();
    match subsystem.shutdown().await {
        Ok(snapshot) => match serde_json::to_string(&snapshot) {
            Ok(json) => info!("Final occupancy diagnostics: {}", json),
            Err(e) => error!("Failed to serialize diagnostics: {}", e),
        },
        Err(e) => error!("Error during shutdown: {}", e),
    }

    info!("Motion Occupancy Bridge stopped");
}
