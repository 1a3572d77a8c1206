mod file;
mod plan;

pub use file::{LoadedConfig, TEMPLATE, config_path, log_dir};
