//! # configs
//!
//! Settings for office-chat, layered as:
//! built-in defaults → `config/office-chat.toml` (optional) → `.env` →
//! `OFFICE_CHAT__SECTION__KEY` environment variables.

mod backend;
mod settings;

pub use backend::{select_backend, BackendChoice};
pub use settings::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
