pub mod layers;

mod builder;
mod manager;


pub use builder::ConfigBuilder;
pub use manager::{CONFIG_FILE_NAME, CONFIG_PATH_ENV, ConfigManager, DRY_RUN_ENV};
