pub mod acl;
pub mod api;
pub mod config;
pub mod errors;
pub mod executor;
pub mod models;
pub mod persistence;
pub mod processor;
pub mod services;

pub mod test;
