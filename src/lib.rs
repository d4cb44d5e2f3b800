pub mod api;
pub mod auth;
pub mod config;
pub mod continuation;
pub mod db;
pub mod error;
pub mod generation;
pub mod listing;
pub mod metrics;
