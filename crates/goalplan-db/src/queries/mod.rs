//! Query functions, one module per table family.

pub mod goals;
pub mod jobs;
pub mod tasks;
