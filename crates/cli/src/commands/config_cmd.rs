//! `agentweave config`: print the default configuration.

use agentweave_config::AppConfig;

pub fn print_default() {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", AppConfig::default_toml());
}
