pub mod assets;
pub mod canonical;
pub mod cli_arguments;
pub mod config;
pub mod fetch;
pub mod helpers;
pub mod progress;
pub mod texture;
pub mod validate;
