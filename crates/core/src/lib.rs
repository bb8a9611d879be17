//! Domain logic for the dashboard's model download tracker.
//!
//! This crate has no HTTP or hub dependencies; the transfer itself is
//! abstracted behind [`downloads::DownloadExecutor`].

pub mod download_manager;
pub mod downloads;
pub mod error;
pub mod types;
