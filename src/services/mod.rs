//! Server-side services: the in-memory store, the facade handlers use, and
//! the data-URL transfer codec.

pub mod data_url;
pub mod file_store;
pub mod id_gen;
pub mod share_service;
