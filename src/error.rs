use crate::instance_lock::InstanceLockError;
use crate::timer::TimerKind;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("No active runtime to arm the {0} timer")]
    NoScheduler(TimerKind),

    #[error("Occupancy subsystem has been torn down")]
    TornDown,

    #[error("Monotonic clock went backwards while measuring {0}")]
    ClockWentBackwards(&'static str),

    #[error("Unsupported attribute: 0x{0:04X}")]
    UnsupportedAttribute(u16),

    #[error("Invalid sensor payload: {0}")]
    InvalidPayload(String),

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Occupancy task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error(transparent)]
    InstanceLock(#[from] InstanceLockError),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
