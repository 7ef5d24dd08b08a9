//! PostgreSQL persistence for goals, generated tasks, dependency edges and
//! plan-generation jobs.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
