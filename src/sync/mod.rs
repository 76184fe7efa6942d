//! Viewer-side synchronization.
//!
//! A viewer keeps a local cache of hydrated files consistent with the
//! server by polling the metadata listing and reconciling against it.
//! `ApiClient` talks HTTP; `viewer::start` runs the polling loop.

pub mod cache;
pub mod client;
pub mod error;
pub mod reconcile;
pub mod source;
pub mod viewer;
