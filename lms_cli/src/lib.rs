//! Internal modules for the LMS command-line client.
//!
//! This library provides command parsing and logging setup used by the
//! lms_cli binary.

pub mod commands;
pub mod logging;
