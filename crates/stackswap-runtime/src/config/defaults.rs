//! Compile-time defaults
//!
//! Generated by `build.rs` from the library defaults, merged with the file
//! named by `SSW_CONFIG_RS` when that variable is set at build time.

include!(concat!(env!("OUT_DIR"), "/ssw_merged_config.rs"));
