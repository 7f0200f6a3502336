//! Configuration system
//!
//! - `macros`: `config_struct!` for structs with embedded defaults
//! - `schemas`: the configuration tree
//! - `utils`: loading, CLI overrides, validation and global access

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{Config, RelayConfig, TopicConfig, WebserverConfig};
pub use utils::{
    apply_cli_overrides, get_config_clone, load_config, read_config_file, validate_config,
    with_config, CONFIG_FILE_PATH, MAX_RECONNECT_DELAY_SECS,
};
