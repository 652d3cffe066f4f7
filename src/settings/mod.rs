//! The `settings` module is a simple utility that requires manual verification.
//! `settings/dev.toml` is covered by a unit test; see `bin/settings_demo.rs` for the rest.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
