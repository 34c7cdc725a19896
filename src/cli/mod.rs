//! Command-line surface.

mod commands;
mod display;

pub use commands::{
    CategoryArg, Cli, Commands, ConfigAction, OutputFormat, PriorityArg, StatusArg,
    StatusFilterArg,
};
pub use display::Display;
