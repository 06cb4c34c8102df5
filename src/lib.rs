// Library exports for Wordsmith
// This allows integration tests and external code to use Wordsmith modules

pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod mail;
pub mod routes;
pub mod state;
pub mod store;
pub mod uploads;
pub mod validation;
