//! CLI subcommand implementations for the litterbox binary.

pub mod audit_cmd;
pub mod doctor;
pub mod serve;
