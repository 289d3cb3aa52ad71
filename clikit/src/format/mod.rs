pub mod ansi;
pub mod command_line;
pub mod echo;
