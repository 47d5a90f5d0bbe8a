//! Embedded static HTML viewers served by the bridges.
//!
//! The pages are kept as `&'static str` so they can be bundled directly inside
//! the binary without filesystem lookups.

mod camera;
mod points;
mod teleop;

pub use camera::CAMERA_HTML;
pub use points::POINTS_HTML;
pub use teleop::TELEOP_HTML;
