// Apache+PHP Development Server manager
// Thin orchestration layer over a Docker-compatible container runtime CLI

pub mod config;
pub mod exec;
pub mod runtime;
pub mod server;
