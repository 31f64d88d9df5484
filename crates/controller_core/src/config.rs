use std::{collections::HashMap, env, fs};

use tracing::warn;

use shared::domain::Address;

const SETTINGS_FILE: &str = "controller.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub node_url: String,
    pub package_id: String,
    pub account_address: Option<Address>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_url: "http://127.0.0.1:9000".into(),
            package_id: String::new(),
            account_address: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => merge_file_config(&mut settings, &file_cfg),
            Err(err) => warn!(%err, "ignoring unreadable settings file"),
        }
    }

    if let Ok(v) = env::var("NODE_URL") {
        settings.node_url = v;
    }
    if let Ok(v) = env::var("PACKAGE_ID") {
        settings.package_id = v;
    }
    if let Ok(v) = env::var("ACCOUNT_ADDRESS") {
        settings.account_address = Some(Address(v));
    }

    settings
}

fn merge_file_config(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("node_url") {
        settings.node_url = v.clone();
    }
    if let Some(v) = file_cfg.get("package_id") {
        settings.package_id = v.clone();
    }
    if let Some(v) = file_cfg.get("account_address") {
        settings.account_address = Some(Address(v.clone()));
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
