pub mod guards;
pub mod support;
