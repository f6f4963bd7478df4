// ABOUTME: Library module for tablehop
// ABOUTME: Exports tool discovery, client drivers and the interchange format

pub mod commands;
pub mod config;
pub mod encoding;
pub mod filters;
pub mod firebird;
pub mod interactive;
pub mod interchange;
pub mod postgres;
pub mod sqlite;
pub mod tools;
pub mod utils;
