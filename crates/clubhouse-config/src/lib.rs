//! # Clubhouse Configuration Library
//!
//! Typed configuration for the clubhouse data-access core: which table the
//! storage client talks to, page-size limits for queries, and the bounds the
//! self-assignment engine works within.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clubhouse_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load_from_file("clubhouse.toml").await?;
//!     println!("table = {}", config.table.name);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod loader;

pub use config::*;
pub use loader::*;
