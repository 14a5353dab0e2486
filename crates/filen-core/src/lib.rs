//! Filen Core - Domain types and ports for the local filesystem layer
//!
//! This crate contains the pieces shared by every other crate:
//! - **Domain types** - `NormalizedPath`, `StatResult`, `DirectoryTree`, `SyncLocation`, `Issue`
//! - **Configuration** - typed YAML configuration with validation and a builder
//! - **Port definitions** - `IKeyValueStore` for persistence, `IIssueSink` for issue reporting
//!
//! # Architecture
//!
//! Same ports & adapters split as the rest of the workspace: the domain
//! module is pure data, ports are traits implemented by adapter crates
//! (`filen-cache` for persistence, `filen-fs` for issue sinks).

pub mod config;
pub mod domain;
pub mod ports;
