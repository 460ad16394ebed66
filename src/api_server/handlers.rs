//! HTTP request handlers, one module per resource.

pub mod audit;
pub mod backup;
pub mod entries;
pub mod health;
pub mod internal;
pub mod settings;
pub mod vault;
