use std::sync::Arc;

use mqtt_motion_sensor::accessory::MotionSensorAccessory;
use mqtt_motion_sensor::config::Config;
use mqtt_motion_sensor::engine::SyncEngine;
use mqtt_motion_sensor::mqtt::client::MqttSession;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let binding = &config.binding;
    info!(
        "Starting mqtt-motion-sensor (mqtt={}:{}, accessory={})",
        config.mqtt.broker.host, config.mqtt.broker.port, binding.info.name,
    );
    info!("  Status topic: {}", binding.status_topic);
    if let Some(topic) = &binding.state_topic {
        info!("  State topic: {} (field {})", topic, binding.power_field);
    }
    if let Some(activity) = &binding.activity {
        info!("  Activity topic: {} (reachable on {})", activity.topic, activity.token);
    }
    if let Some(startup) = &binding.startup {
        info!("  Startup command: {} {}", startup.topic, startup.payload);
    }

    let (bus, session) = MqttSession::new(&config.mqtt);
    let engine = match SyncEngine::new(
        config.binding.clone(),
        config.mqtt.publish_qos,
        Arc::new(bus.clone()),
    ) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let session_handle = tokio::spawn(session.run(engine.clone()));

    let accessory = MotionSensorAccessory::new(engine.clone());
    for service in accessory.services() {
        info!(
            "  Service {:?} \"{}\": {:?}",
            service.kind, service.name, service.characteristics
        );
    }
    let mut changes = accessory.watch();

    // Main loop: report state changes until asked to stop
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    warn!("State channel closed");
                    break;
                }
                let snapshot = *changes.borrow_and_update();
                info!(
                    "Motion detected: {}, reachable: {}",
                    snapshot.detected, snapshot.reachable
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = async {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).expect("Failed to register SIGTERM handler");
                sigterm.recv().await;
            } => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    // Cleanup
    engine.shutdown();
    if let Err(e) = bus.disconnect().await {
        warn!("Failed to disconnect cleanly: {}", e);
    }
    // Give the event loop a moment to flush the DISCONNECT
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    session_handle.abort();
    info!("mqtt-motion-sensor stopped");
}
