//! CLI commands.

pub mod consume;
pub mod offsets;

pub use consume::ConsumeCommand;
pub use offsets::OffsetsCommand;
