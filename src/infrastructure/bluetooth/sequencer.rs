//! Sensor activation sequencer.
//!
//! Walks the fixed channel table one GATT operation at a time: write the
//! channel's enable byte, arm notifications on its data characteristic,
//! read the initial value, then move to the next channel. Each step is
//! taken only in response to the previous operation's completion, which is
//! what keeps a single operation outstanding on the radio without any
//! locking.
//!
//! The sequencer is pure: it emits [`GattOp`] values for the session to put
//! on the wire and never touches the transport itself.

use crate::infrastructure::bluetooth::protocol::{
    SensorChannel, ACTIVATION_SEQUENCE, CLIENT_CONFIG_DESCRIPTOR, ENABLE_NOTIFICATION_VALUE,
};
use crate::infrastructure::bluetooth::transport::ServiceCatalog;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Stage of the per-channel activation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    EnableConfig,
    AwaitConfigAck,
    EnableNotification,
    AwaitDescriptorAck,
    IssueRead,
    AwaitReadAck,
    /// Terminal for this connection; not an error.
    Idle,
}

/// Cursor into the fixed channel table plus the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceState {
    pub index: usize,
    pub stage: Stage,
}

/// One GATT operation for the session to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattOp {
    /// Write the enable byte to a channel's config characteristic.
    WriteConfig {
        service: Uuid,
        characteristic: Uuid,
        value: u8,
    },
    /// Arm local notification delivery and write the CCCD.
    ArmNotifications {
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: [u8; 2],
    },
    /// Read the channel's data (or calibration) characteristic.
    ReadValue { service: Uuid, characteristic: Uuid },
}

/// Completion callbacks the sequencer advances on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    ConfigWritten(Uuid),
    DescriptorWritten(Uuid),
    ValueRead(Uuid),
}

/// Finite-state driver over [`ACTIVATION_SEQUENCE`].
#[derive(Debug)]
pub struct SensorSequencer {
    state: SequenceState,
}

impl Default for SensorSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSequencer {
    pub fn new() -> Self {
        Self {
            state: SequenceState {
                index: 0,
                stage: Stage::Idle,
            },
        }
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state.stage == Stage::Idle
    }

    /// Abort the walk. Any completion that still arrives is ignored.
    pub fn reset(&mut self) {
        self.state = SequenceState {
            index: 0,
            stage: Stage::Idle,
        };
    }

    /// Begin the activation walk after discovery. Returns the first
    /// operation to issue, or `None` if the peripheral exposes none of the
    /// listed channels.
    pub fn start(&mut self, catalog: &ServiceCatalog) -> Option<GattOp> {
        self.state = SequenceState {
            index: 0,
            stage: Stage::EnableConfig,
        };
        self.enable_current(catalog)
    }

    /// Advance on a completion callback. Completions that do not match the
    /// operation currently awaited (a stray ack from a collaborator's
    /// write, or anything after a teardown) are ignored.
    pub fn handle_completion(
        &mut self,
        catalog: &ServiceCatalog,
        completion: Completion,
    ) -> Option<GattOp> {
        let Some(channel) = ACTIVATION_SEQUENCE.get(self.state.index) else {
            trace!(?completion, "completion with no channel pending, ignoring");
            return None;
        };

        match (self.state.stage, completion) {
            (Stage::AwaitConfigAck, Completion::ConfigWritten(c)) if c == channel.config_char => {
                self.state.stage = Stage::EnableNotification;
                self.arm_current(channel)
            }
            (Stage::AwaitDescriptorAck, Completion::DescriptorWritten(c))
                if c == channel.data_char =>
            {
                self.state.stage = Stage::IssueRead;
                self.read_current(channel)
            }
            (Stage::AwaitReadAck, Completion::ValueRead(c)) if c == channel.data_char => {
                self.state.index += 1;
                self.state.stage = Stage::EnableConfig;
                self.enable_current(catalog)
            }
            _ => {
                trace!(
                    stage = ?self.state.stage,
                    ?completion,
                    "stray completion, ignoring"
                );
                None
            }
        }
    }

    /// Emit the enable write for the current channel, skipping channels the
    /// peripheral does not expose. Past the end of the table the sequencer
    /// parks in `Idle`.
    fn enable_current(&mut self, catalog: &ServiceCatalog) -> Option<GattOp> {
        while let Some(channel) = ACTIVATION_SEQUENCE.get(self.state.index) {
            if channel_available(catalog, channel) {
                self.state.stage = Stage::AwaitConfigAck;
                return Some(GattOp::WriteConfig {
                    service: channel.service,
                    characteristic: channel.config_char,
                    value: channel.enable,
                });
            }

            debug!(channel = channel.name, "channel not exposed, skipping");
            self.state.index += 1;
        }

        info!("all sensor channels activated");
        self.state.stage = Stage::Idle;
        None
    }

    fn arm_current(&mut self, channel: &SensorChannel) -> Option<GattOp> {
        self.state.stage = Stage::AwaitDescriptorAck;
        Some(GattOp::ArmNotifications {
            service: channel.service,
            characteristic: channel.data_char,
            descriptor: CLIENT_CONFIG_DESCRIPTOR,
            value: ENABLE_NOTIFICATION_VALUE,
        })
    }

    fn read_current(&mut self, channel: &SensorChannel) -> Option<GattOp> {
        self.state.stage = Stage::AwaitReadAck;
        Some(GattOp::ReadValue {
            service: channel.service,
            characteristic: channel.data_char,
        })
    }
}

fn channel_available(catalog: &ServiceCatalog, channel: &SensorChannel) -> bool {
    catalog.has_characteristic(channel.service, channel.config_char)
        && catalog.has_characteristic(channel.service, channel.data_char)
}
