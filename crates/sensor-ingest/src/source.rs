//! Contracts for the robot's shared sensor/control channels.

use crate::types::{IngestError, Twist};

/// Blocking, pollable reader for one sensor stream.
///
/// `ready` must not block; `read` returns the latest snapshot and may block
/// briefly while the underlying channel copies it out.
pub trait SensorSource: Send {
    type Sample: Send;

    /// True when a sample newer than the last `read` is available.
    fn ready(&mut self) -> bool;

    fn read(&mut self) -> Result<Self::Sample, IngestError>;
}

/// Write handle for a robot control channel.
///
/// Writes are fire-and-forget: the controller consumes the latest value at its
/// own cadence and never acknowledges.
pub trait ControlSink: Send {
    fn write_twist(&mut self, twist: Twist) -> Result<(), IngestError>;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    type Sample = S::Sample;

    fn ready(&mut self) -> bool {
        (**self).ready()
    }

    fn read(&mut self) -> Result<Self::Sample, IngestError> {
        (**self).read()
    }
}

impl<C: ControlSink + ?Sized> ControlSink for Box<C> {
    fn write_twist(&mut self, twist: Twist) -> Result<(), IngestError> {
        (**self).write_twist(twist)
    }
}
