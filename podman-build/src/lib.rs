pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod image;
pub mod orchestrator;
pub mod process;
pub mod runner;
pub mod services;

pub use config::BuildConfig;
pub use error::Error;
pub use orchestrator::{execute, Outcome};
pub use services::ServiceHub;

pub type Result<T, E = Error> = std::result::Result<T, E>;
