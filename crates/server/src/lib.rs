//! HTTP front end for the PostgreSQL tuning engine

pub mod api;
pub mod config;
