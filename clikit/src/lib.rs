pub mod args;
pub mod commands;
pub mod config;
pub mod diagnostics_trace;
pub mod error;
pub mod format;
pub mod process;
pub mod tools;


pub fn clikit_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
