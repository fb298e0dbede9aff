//! CampusConnect API library.
//!
//! This crate primarily ships a `campus-api` binary, but we expose a library
//! surface to enable integration testing and reuse.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod discovery;
pub mod media;
pub mod model;
pub mod notify;
pub mod retention;
pub mod side_effects;
pub mod state;
pub mod workflow;
