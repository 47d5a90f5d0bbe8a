//! Browser joystick → robot control channel.
//!
//! Each `/ws` connection parses `{"x": .., "y": ..}` text messages and
//! overwrites a single-slot command buffer. The camera ingest loop drains that
//! buffer once per cycle through [`CommandEgress`], so only the newest
//! unconsumed command ever reaches the robot. A connection that closes leaves
//! a `{0, 0}` stop command behind, and the egress writes a zero twist when the
//! ingest loop exits.

use std::{sync::Arc, time::Duration};

use actix_ws::{CloseCode, Message, MessageStream, Session};
use futures_util::StreamExt;
use sensor_ingest::{ControlSink, CycleTask, FreshnessBuffer, StopToken, Twist};
use serde::Deserialize;
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::bridge::transport::ConnectionGuard;

/// How often an idle teleop session re-checks the stop token.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Normalized joystick deflection, both axes in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CommandRecord {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command is not a JSON object with numeric x and y: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("command component {axis} is not finite")]
    NonFinite { axis: &'static str },
}

#[derive(Deserialize)]
struct RawCommand {
    x: f64,
    y: f64,
}

impl CommandRecord {
    pub const STOP: CommandRecord = CommandRecord { x: 0.0, y: 0.0 };

    /// Parse one inbound text message; components are clamped to [-1, 1].
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let raw: RawCommand = serde_json::from_str(text)?;
        let axis = |value: f64, axis: &'static str| {
            if value.is_finite() {
                Ok(value.clamp(-1.0, 1.0) as f32)
            } else {
                Err(CommandError::NonFinite { axis })
            }
        };
        Ok(Self {
            x: axis(raw.x, "x")?,
            y: axis(raw.y, "y")?,
        })
    }

    /// Forward deflection drives linear speed, sideways deflection yaw.
    pub fn to_twist(self, linear_speed: f32, angular_speed: f32) -> Twist {
        Twist {
            linear: self.y * linear_speed,
            angular: self.x * angular_speed,
        }
    }
}

pub type CommandBuffer = FreshnessBuffer<CommandRecord>;

/// Ingress side of one teleop connection.
///
/// Dropping the session publishes [`CommandRecord::STOP`], so every closed
/// connection yields exactly one stop command however it ended.
pub struct RelaySession {
    commands: Arc<CommandBuffer>,
}

impl RelaySession {
    pub fn open(commands: Arc<CommandBuffer>) -> Self {
        Self { commands }
    }

    /// Parse and stage a command. Malformed messages leave the buffer untouched.
    pub fn accept(&self, text: &str) -> Result<CommandRecord, CommandError> {
        match CommandRecord::parse(text) {
            Ok(command) => {
                self.commands.publish(command);
                metrics::counter!("bridge_commands_total", "result" => "accepted").increment(1);
                Ok(command)
            }
            Err(err) => {
                metrics::counter!("bridge_commands_total", "result" => "rejected").increment(1);
                Err(err)
            }
        }
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.commands.publish(CommandRecord::STOP);
        debug!("teleop connection closed; stop command staged");
    }
}

/// Receive joystick commands from one `/ws` client until it disconnects.
///
/// Nothing is ever sent back apart from pongs and the closing handshake.
pub async fn teleop_session(
    mut session: Session,
    mut messages: MessageStream,
    relay: RelaySession,
    stop: StopToken,
) {
    let _guard = ConnectionGuard::open("/ws");

    async move {
        loop {
            if stop.is_cancelled() {
                let _ = session.close(Some(CloseCode::Normal.into())).await;
                break;
            }

            let inbound = match tokio::time::timeout(STOP_POLL, messages.next()).await {
                Ok(inbound) => inbound,
                Err(_) => continue,
            };
            match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Err(err) = relay.accept(&text) {
                        debug!(error = %err, "discarding malformed command");
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if session.pong(&payload).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(reason))) => {
                    let _ = session.close(reason).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(error = %err, "websocket protocol error");
                    break;
                }
                None => break,
            }
        }
        drop(relay);
    }
    .instrument(info_span!("relay.session"))
    .await
}

/// Command egress run on the ingest thread once per cycle.
pub struct CommandEgress<C> {
    commands: Arc<CommandBuffer>,
    sink: C,
    linear_speed: f32,
    angular_speed: f32,
}

impl<C: ControlSink> CommandEgress<C> {
    pub fn new(
        commands: Arc<CommandBuffer>,
        sink: C,
        linear_speed: f32,
        angular_speed: f32,
    ) -> Self {
        Self {
            commands,
            sink,
            linear_speed,
            angular_speed,
        }
    }

    /// Write the pending command, if any. Returns the twist that was written.
    pub fn drain(&mut self) -> Option<Twist> {
        let command = self.commands.take_now()?;
        let twist = command.to_twist(self.linear_speed, self.angular_speed);
        self.write(twist).then_some(twist)
    }

    fn write(&mut self, twist: Twist) -> bool {
        match self.sink.write_twist(twist) {
            Ok(()) => {
                metrics::counter!("bridge_control_writes_total").increment(1);
                true
            }
            Err(err) => {
                warn!(error = %err, "control write failed");
                metrics::counter!("bridge_control_write_failures_total").increment(1);
                false
            }
        }
    }
}

impl<C: ControlSink> CycleTask for CommandEgress<C> {
    fn run_cycle(&mut self) {
        self.drain();
    }

    /// The robot must not keep its last twist once nothing is draining commands.
    fn finish(&mut self) {
        if self.write(Twist::default()) {
            info!("robot stopped on shutdown");
        }
    }
}
