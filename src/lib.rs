// Library exports for wey
// This allows integration tests and the binary to share modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod mbti;
pub mod media;
pub mod notifications;
pub mod posts;
pub mod routes;
pub mod social;
pub mod state;
