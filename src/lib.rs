// Library exports for the daycare-reports crate
// This allows tests and the binary to use the modules

pub mod config;
pub mod database;
pub mod gmail_client;
pub mod slack_notifier;
pub mod email;

// Report model, DOM helpers and normalization
pub mod report;

// Template strategies and sender resolution
pub mod providers;

pub mod children;

// Per-message pipeline
pub mod ingest;
