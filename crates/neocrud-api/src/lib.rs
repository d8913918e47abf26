//! neocrud-api: resolver-facing surface of the CRUD layer.
//!
//! Maps named operations with JSON arguments onto [`neocrud_store::CrudService`]
//! and serves them one-shot or over a JSON-lines stdio loop.

pub mod config;
pub mod error;
pub mod resolver;
pub mod server;
