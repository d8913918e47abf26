//! neocrud store: CRUD over a Neo4j property graph.
//!
//! This crate is the single path from a CRUD intent to the store. Labels and
//! relationship types are validated before they reach query text, every
//! value travels as a bound parameter, and every leased session is released
//! on every exit path.

pub mod builder;
pub mod client;
pub mod mapper;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod record;
pub mod sanitize;
pub mod service;
pub mod session;

pub use builder::{QueryBuilder, Statement, StatementKind};
pub use client::GraphClient;
pub use mapper::ResultMapper;
pub use memory::MemoryStore;
pub use record::{Field, Record};
pub use sanitize::{Identifier, LabelSet};
pub use service::CrudService;
pub use session::{Release, Session, SessionScope, SessionSource};
