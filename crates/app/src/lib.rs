//! Streaming bridges between the robot's sensor channels and browser clients.

pub mod bridge;
pub mod cli;
pub mod html;
