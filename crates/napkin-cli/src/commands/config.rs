//! Config command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use napkin_core::config::{parse_duration, CallbackFailurePolicy, Config};

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    let mut config = Config::load()?;

    match args.action {
        ConfigAction::Get { key } => match get_config_value(&config, &key) {
            Some(v) => println!("{}: {}", key, v),
            None => println!("Unknown configuration key: {}", key),
        },

        ConfigAction::Set { key, value } => {
            if set_config_value(&mut config, &key, &value)? {
                config.validate()?;
                config.save()?;
                println!("Set {} = {}", key, value);
            } else {
                println!("Unknown configuration key: {}", key);
            }
        }

        ConfigAction::Show => {
            println!();
            println!("Napkin Configuration");
            println!("{}", "─".repeat(50));
            println!();
            println!("[server]");
            for key in SERVER_KEYS {
                show_value(&config, key);
            }
            println!();
            println!("[storage]");
            for key in STORAGE_KEYS {
                show_value(&config, key);
            }
            println!();
        }

        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Reset => {
            Config::default().save()?;
            println!("Configuration reset to defaults.");
        }
    }

    Ok(())
}

const SERVER_KEYS: [&str; 6] = [
    "port_range",
    "max_upload_size",
    "shutdown_grace",
    "session_timeout",
    "callback_failure",
    "advertise_host",
];

const STORAGE_KEYS: [&str; 2] = ["output_dir", "file_prefix"];

fn show_value(config: &Config, key: &str) {
    if let Some(value) = get_config_value(config, key) {
        println!("  {} = {}", key, value);
    }
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    let server = &config.server;
    let storage = &config.storage;
    match key {
        "port_range" => Some(server.port_range.to_string()),
        "max_upload_size" => Some(server.max_upload_size.to_string()),
        "shutdown_grace" => Some(format!("{}s", server.shutdown_grace.as_secs())),
        "session_timeout" => Some(format!("{}s", server.session_timeout.as_secs())),
        "callback_failure" => Some(
            match server.callback_failure {
                CallbackFailurePolicy::Ignore => "ignore",
                CallbackFailurePolicy::Report => "report",
            }
            .to_string(),
        ),
        "advertise_host" => Some(server.advertise_host.clone().unwrap_or_default()),
        "output_dir" => Some(
            storage
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        ),
        "file_prefix" => Some(storage.file_prefix.clone()),
        _ => None,
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<bool> {
    let server = &mut config.server;
    let storage = &mut config.storage;
    match key {
        "port_range" => {
            server.port_range = value.parse()?;
        }
        "max_upload_size" => {
            server.max_upload_size = value
                .parse()
                .with_context(|| format!("Invalid byte count '{}'", value))?;
        }
        "shutdown_grace" => {
            server.shutdown_grace =
                parse_duration(value).with_context(|| format!("Invalid duration '{}'", value))?;
        }
        "session_timeout" => {
            server.session_timeout =
                parse_duration(value).with_context(|| format!("Invalid duration '{}'", value))?;
        }
        "callback_failure" => {
            server.callback_failure = match value {
                "ignore" => CallbackFailurePolicy::Ignore,
                "report" => CallbackFailurePolicy::Report,
                other => bail!("Invalid policy '{}' (expected ignore or report)", other),
            };
        }
        "advertise_host" => {
            server.advertise_host = non_empty(value);
        }
        "output_dir" => {
            storage.output_dir = non_empty(value).map(PathBuf::from);
        }
        "file_prefix" => {
            storage.file_prefix = value.to_string();
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use napkin_core::port::PortRange;
    use std::time::Duration;

    #[test]
    fn test_every_listed_key_is_readable() {
        let config = Config::default();
        for key in SERVER_KEYS.iter().chain(STORAGE_KEYS.iter()) {
            assert!(get_config_value(&config, key).is_some(), "{key}");
        }
        assert!(get_config_value(&config, "nope").is_none());
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let mut config = Config::default();

        assert!(set_config_value(&mut config, "port_range", "9000-9010").unwrap());
        assert!(set_config_value(&mut config, "session_timeout", "10m").unwrap());
        assert!(set_config_value(&mut config, "callback_failure", "report").unwrap());
        assert!(set_config_value(&mut config, "advertise_host", "notes.local").unwrap());
        assert!(set_config_value(&mut config, "file_prefix", "scan").unwrap());

        assert_eq!(config.server.port_range, PortRange::new(9000, 9010).unwrap());
        assert_eq!(config.server.session_timeout, Duration::from_secs(600));
        assert_eq!(config.server.callback_failure, CallbackFailurePolicy::Report);
        assert_eq!(
            get_config_value(&config, "port_range").as_deref(),
            Some("9000-9010")
        );
        assert_eq!(
            get_config_value(&config, "advertise_host").as_deref(),
            Some("notes.local")
        );
        assert_eq!(get_config_value(&config, "file_prefix").as_deref(), Some("scan"));
    }

    #[test]
    fn test_set_empty_clears_optional_values() {
        let mut config = Config::default();
        set_config_value(&mut config, "output_dir", "/tmp/notes").unwrap();
        assert_eq!(config.storage.output_dir, Some(PathBuf::from("/tmp/notes")));

        set_config_value(&mut config, "output_dir", "").unwrap();
        assert!(config.storage.output_dir.is_none());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(set_config_value(&mut config, "port_range", "9000-8000").is_err());
        assert!(set_config_value(&mut config, "session_timeout", "soon").is_err());
        assert!(set_config_value(&mut config, "callback_failure", "maybe").is_err());
        assert!(set_config_value(&mut config, "max_upload_size", "-1").is_err());
    }

    #[test]
    fn test_set_unknown_key() {
        let mut config = Config::default();
        assert!(!set_config_value(&mut config, "nope", "1").unwrap());
    }
}
