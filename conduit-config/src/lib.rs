//! Configuration types and loading for conduit components.
//!
//! [`shared`] holds the serde structs consumed by the `conduit` crate, each with documented
//! defaults and a `validate` method. [`load_config`] assembles a configuration from files in
//! the `configuration` directory and `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{LoadConfigError, load_config, load_config_from_directory};
