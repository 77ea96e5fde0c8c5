pub mod capture_commands;
pub mod commands;
pub mod formatting;

pub use capture_commands::{CaptureCommandHandler, handle_devices_command};
pub use commands::Cli;
