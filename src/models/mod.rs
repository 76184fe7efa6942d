//! Core data models for the ephemeral file-sharing service.
//!
//! `FileRecord` is the in-memory entity owned by the store; `FileMetadata`
//! and `FilePayload` are its JSON projections. `api` holds the request and
//! response envelopes shared by the HTTP handlers and the viewer client.

pub mod api;
pub mod file;
