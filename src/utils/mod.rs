//! Shared utilities: paths, atomic writes, external commands, dates.

pub mod date;
pub mod exec;
pub mod fs;
pub mod path;
