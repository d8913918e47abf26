//! neocrud-core: Shared types, configuration, and error handling for neocrud.
//!
//! This crate provides the foundational types used across the workspace:
//! - Graph entities (Node, Relationship) and their closed property values
//! - Predefined query shapes (Movie) and bulk listings
//! - Store and CRUD error taxonomy with retry classification
//! - Store connection configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::StoreConfig;
pub use error::{CrudError, ErrorClass, StoreError};
pub use types::{
    EntityKind, Identity, Movie, Node, NodesAndRelationships, Properties, PropertyValue,
    Relationship,
};
