//! zigbee2mqtt integration for one motion sensor.
//!
//! Inbound: the sensor's state topic is folded into an IAS zone status and fed
//! to the [`HardwareEventAdapter`]. Outbound: every change of the reconciled
//! occupancy is published retained to the configured output topic.

use super::client::{MqttClient, MqttMessage};
use crate::clusters::occupancy_sensing::CLUSTER_ID;
use crate::config::{MqttConfig, SensorConfig};
use crate::error::{BridgeError, Result};
use crate::input::ias_zone::{HardwareEventAdapter, ZoneStatus};
use crate::sensors::{ClusterNotifier, NotifiableSensor, OccupancySensor};
use log::{info, warn};
use rumqttc::{AsyncClient, QoS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Fields of a zigbee2mqtt state message relevant to motion.
#[derive(Debug, Default, Deserialize)]
struct MotionSensorPayload {
    #[serde(default)]
    zone_status: Option<u16>,
    #[serde(default)]
    occupancy: Option<bool>,
    #[serde(default)]
    tamper: Option<bool>,
    #[serde(default)]
    battery_low: Option<bool>,
}

/// Payload published to the output topic.
#[derive(Debug, Serialize)]
struct OccupancyMessage {
    occupancy: bool,
}

/// Extract a zone status from a zigbee2mqtt state message.
///
/// A raw `zone_status` wins. Otherwise `occupancy` (plus `tamper` and
/// `battery_low`) is folded into the bitmap. `Ok(None)` means the message
/// carried no motion information at all.
pub fn zone_status_from_payload(payload: &str) -> Result<Option<ZoneStatus>> {
    let parsed: MotionSensorPayload = serde_json::from_str(payload)
        .map_err(|e| BridgeError::InvalidPayload(e.to_string()))?;

    if let Some(bits) = parsed.zone_status {
        return Ok(Some(ZoneStatus::from_bits(bits)));
    }
    let Some(occupancy) = parsed.occupancy else {
        return Ok(None);
    };

    let mut bits = 0;
    if occupancy {
        bits |= ZoneStatus::ALARM1;
    }
    if parsed.tamper == Some(true) {
        bits |= ZoneStatus::TAMPER;
    }
    if parsed.battery_low == Some(true) {
        bits |= ZoneStatus::BATTERY;
    }
    Ok(Some(ZoneStatus::from_bits(bits)))
}

/// MQTT integration for a single reconciled motion sensor.
pub struct MotionSensorIntegration {
    mqtt: MqttConfig,
    sensor: SensorConfig,
    adapter: HardwareEventAdapter,
    occupancy: Arc<OccupancySensor>,
}

impl MotionSensorIntegration {
    pub fn new(
        mqtt: MqttConfig,
        sensor: SensorConfig,
        adapter: HardwareEventAdapter,
        occupancy: Arc<OccupancySensor>,
    ) -> Self {
        Self {
            mqtt,
            sensor,
            adapter,
            occupancy,
        }
    }

    fn state_topic(&self) -> String {
        format!("{}/{}", self.sensor.base_topic, self.sensor.friendly_name)
    }

    /// Spawn the integration. Abort the returned handle on shutdown.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        info!(
            "[MQTT] Connecting to {}:{}",
            self.mqtt.broker_host, self.mqtt.broker_port
        );

        let state_topic = self.state_topic();
        let mqtt_client = MqttClient::new(&self.mqtt, vec![state_topic.clone()]);
        let client = mqtt_client.client();

        let (msg_tx, mut msg_rx) = mpsc::channel::<MqttMessage>(64);
        let (connected_tx, connected_rx) = oneshot::channel();

        // Start MQTT event loop FIRST (it subscribes once connected)
        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(msg_tx, Some(connected_tx)).await;
        });

        match tokio::time::timeout(Duration::from_secs(10), connected_rx).await {
            Ok(Ok(())) => info!("[MQTT] Connection established"),
            Ok(Err(_)) => {
                warn!("[MQTT] Connection signal channel dropped");
                return;
            }
            Err(_) => {
                warn!("[MQTT] Connection timeout after 10 seconds");
                mqtt_loop.abort();
                return;
            }
        }

        let publisher = spawn_publisher(
            client,
            self.sensor.occupancy_topic.clone(),
            self.occupancy.clone(),
        );

        info!(
            "[MQTT] Integration started for {}",
            self.sensor.friendly_name
        );

        while let Some(msg) = msg_rx.recv().await {
            if msg.topic == state_topic {
                self.process_state_message(&msg.payload);
            }
        }

        publisher.abort();
        mqtt_loop.abort();
    }

    fn process_state_message(&self, payload: &str) {
        match zone_status_from_payload(payload) {
            Ok(Some(status)) => {
                self.adapter.handle_zone_status(status);
            }
            Ok(None) => self.adapter.handle_communication(),
            Err(e) => warn!(
                "[MQTT] Failed to parse {} state: {}",
                self.sensor.friendly_name, e
            ),
        }
    }
}

/// Publish the occupancy value now and after every change.
fn spawn_publisher(
    client: AsyncClient,
    topic: String,
    occupancy: Arc<OccupancySensor>,
) -> JoinHandle<()> {
    let notifier = ClusterNotifier::new(CLUSTER_ID);
    occupancy.set_notifier(notifier.clone());

    tokio::spawn(async move {
        loop {
            if let Err(e) = publish_occupancy(&client, &topic, occupancy.get()).await {
                warn!("[MQTT] Failed to publish occupancy to {}: {}", topic, e);
            }
            notifier.notified().await;
        }
    })
}

async fn publish_occupancy(client: &AsyncClient, topic: &str, occupied: bool) -> Result<()> {
    let payload = serde_json::to_string(&OccupancyMessage {
        occupancy: occupied,
    })?;
    client
        .publish(topic, QoS::AtLeastOnce, true, payload.into_bytes())
        .await?;
    info!("[MQTT] Published occupancy={} to {}", occupied, topic);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_zone_status_wins() {
        let status = zone_status_from_payload(r#"{"zone_status": 5, "occupancy": false}"#)
            .unwrap()
            .unwrap();
        assert!(status.alarm1());
        assert!(status.tamper());
    }

    #[test]
    fn test_occupancy_fields_fold_into_bitmap() {
        let status = zone_status_from_payload(
            r#"{"occupancy": true, "tamper": false, "battery_low": true, "linkquality": 87}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(status.bits(), ZoneStatus::ALARM1 | ZoneStatus::BATTERY);

        let status = zone_status_from_payload(r#"{"occupancy": false}"#)
            .unwrap()
            .unwrap();
        assert!(!status.alarm1());
    }

    #[test]
    fn test_message_without_motion_fields() {
        let status = zone_status_from_payload(r#"{"battery": 80, "voltage": 2900}"#).unwrap();
        assert!(status.is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            zone_status_from_payload("not json"),
            Err(BridgeError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_occupancy_message_shape() {
        let json = serde_json::to_string(&OccupancyMessage { occupancy: true }).unwrap();
        assert_eq!(json, r#"{"occupancy":true}"#);
    }
}
