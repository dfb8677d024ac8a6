//! Indexing pipeline that turns a source tree into a typed knowledge graph,
//! plus a read-only query engine for a restricted Cypher dialect.
//!
//! The usual flow is [`walker::collect_inventory`] to read a project,
//! [`pipeline::Pipeline::process`] to build a [`graph::KnowledgeGraph`], and
//! [`query::QueryEngine`] to ask questions of it.

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod language;
pub mod parser;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod walker;
