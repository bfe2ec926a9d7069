//! `lfa config` command - Configuration management
//!
//! Provides commands to view and modify the admin console configuration.

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::{ConfigError, DEFAULT_DATABASE};
use crate::core::{Config, Session};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration values
    Show(ShowArgs),

    /// Set a configuration value
    Set(SetArgs),

    /// Unset (remove) a configuration value
    Unset(UnsetArgs),

    /// Show paths to the configuration and session files
    Path,

    /// List all available configuration keys
    Keys,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Show only this key's value
    pub key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Configuration key (e.g., project_id, api_key)
    pub key: String,

    /// Value to set
    pub value: String,
}

#[derive(clap::Args, Debug)]
pub struct UnsetArgs {
    /// Configuration key to remove
    pub key: String,
}

/// Valid configuration keys
const VALID_KEYS: &[(&str, &str)] = &[
    ("project_id", "Firebase project id (LFA_PROJECT_ID)"),
    ("api_key", "Web API key used for sign-in (LFA_API_KEY)"),
    ("database", "Firestore database id, default \"(default)\" (LFA_DATABASE)"),
    ("default_format", "Output format used for --format auto"),
    ("timeout_secs", "Per-request timeout in seconds (LFA_TIMEOUT_SECS)"),
];

/// Run a config subcommand
pub fn run(cmd: ConfigCommands, _global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => run_show(args),
        ConfigCommands::Set(args) => run_set(args),
        ConfigCommands::Unset(args) => run_unset(args),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Keys => run_keys(),
    }
}

fn run_show(args: ShowArgs) -> Result<()> {
    let config = Config::load();

    if let Some(key) = &args.key {
        ensure_known_key(key)?;
        return match get_config_value(&config, key) {
            Some(v) => {
                println!("{}", v);
                Ok(())
            }
            None => Err(miette::miette!("Key '{}' is not set", key)),
        };
    }

    println!("{}", style("Effective Configuration").bold().underlined());
    println!();

    print_config_value("project_id", config.project_id.as_deref());
    print_config_value("api_key", config.api_key.as_deref().map(mask_secret).as_deref());
    print_config_value("database", Some(config.database()));
    print_config_value("default_format", config.default_format.as_deref());
    print_config_value(
        "timeout_secs",
        config.timeout_secs.map(|t| t.to_string()).as_deref(),
    );

    println!();
    println!("{}", style("Config Sources (in priority order):").dim());
    println!("  1. Environment variables (LFA_PROJECT_ID, LFA_API_KEY, LFA_DATABASE, LFA_TIMEOUT_SECS)");
    println!("  2. Config file ({})", display_path(Config::config_path()));

    Ok(())
}

fn run_set(args: SetArgs) -> Result<()> {
    let config_path = config_file_path()?;
    let value = parse_value(&args.key, &args.value).into_diagnostic()?;

    let mut config_map = read_mapping(&config_path)?;
    if let serde_yml::Value::Mapping(map) = &mut config_map {
        map.insert(serde_yml::Value::String(args.key.clone()), value);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).into_diagnostic()?;
    }
    let yaml = serde_yml::to_string(&config_map).into_diagnostic()?;
    fs::write(&config_path, yaml).into_diagnostic()?;

    println!(
        "{} Set {} {} {}",
        style("✓").green(),
        style(&args.key).cyan(),
        style("→").dim(),
        style(&args.value).yellow(),
    );
    Ok(())
}

fn run_unset(args: UnsetArgs) -> Result<()> {
    ensure_known_key(&args.key)?;
    let config_path = config_file_path()?;

    if !config_path.exists() {
        return Err(miette::miette!(
            "Config file does not exist: {}",
            config_path.display()
        ));
    }

    let mut config_map = read_mapping(&config_path)?;
    let removed = match &mut config_map {
        serde_yml::Value::Mapping(map) => map
            .remove(&serde_yml::Value::String(args.key.clone()))
            .is_some(),
        _ => false,
    };
    if !removed {
        return Err(miette::miette!("Key '{}' not found in config", args.key));
    }

    let yaml = serde_yml::to_string(&config_map).into_diagnostic()?;
    fs::write(&config_path, yaml).into_diagnostic()?;

    println!("{} Removed {}", style("✓").green(), style(&args.key).cyan());
    Ok(())
}

fn run_path() -> Result<()> {
    let config_path = config_file_path()?;
    let session_path = Session::default_path();

    println!("{}", style("File paths:").bold());
    println!();
    print_path("Config:", Some(config_path));
    print_path("Session:", session_path);
    Ok(())
}

fn run_keys() -> Result<()> {
    println!("{}", style("Available configuration keys:").bold());
    println!();

    for (key, description) in VALID_KEYS {
        println!("  {:<16} {}", style(key).cyan(), style(description).dim());
    }

    println!();
    println!(
        "{}",
        style("Use 'lfa config set <key> <value>' to set a value.").dim()
    );
    Ok(())
}

// Helper functions

fn config_file_path() -> Result<PathBuf> {
    Config::config_path().ok_or(ConfigError::NoConfigDir).into_diagnostic()
}

fn ensure_known_key(key: &str) -> Result<()> {
    if VALID_KEYS.iter().any(|(k, _)| *k == key) {
        Ok(())
    } else {
        Err(miette::miette!(
            "Unknown key '{}'. Run 'lfa config keys' to list valid keys",
            key
        ))
    }
}

/// Validate a value for `key` and convert it to its YAML form
fn parse_value(key: &str, raw: &str) -> Result<serde_yml::Value, ConfigError> {
    let invalid = |message: &str| ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    };
    match key {
        "timeout_secs" => raw
            .parse::<u64>()
            .map(|n| serde_yml::Value::Number(n.into()))
            .map_err(|_| invalid("expected a whole number of seconds")),
        "default_format" => OutputFormat::from_str(raw, true)
            .map(|_| serde_yml::Value::String(raw.to_lowercase()))
            .map_err(|_| invalid("expected one of auto, table, json, csv, md, id")),
        "project_id" | "api_key" | "database" => {
            if raw.trim().is_empty() {
                Err(invalid("value must not be empty"))
            } else {
                Ok(serde_yml::Value::String(raw.to_string()))
            }
        }
        _ => Err(invalid("unknown key; run 'lfa config keys'")),
    }
}

fn read_mapping(path: &Path) -> Result<serde_yml::Value> {
    if !path.exists() {
        return Ok(serde_yml::Value::Mapping(Default::default()));
    }
    let content = fs::read_to_string(path).into_diagnostic()?;
    let parsed: serde_yml::Value =
        serde_yml::from_str(&content).unwrap_or(serde_yml::Value::Mapping(Default::default()));
    // An empty file parses as null
    if parsed.is_null() {
        Ok(serde_yml::Value::Mapping(Default::default()))
    } else {
        Ok(parsed)
    }
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    match key {
        "project_id" => config.project_id.clone(),
        "api_key" => config.api_key.clone(),
        "database" => Some(config.database.clone().unwrap_or_else(|| DEFAULT_DATABASE.to_string())),
        "default_format" => config.default_format.clone(),
        "timeout_secs" => config.timeout_secs.map(|t| t.to_string()),
        _ => None,
    }
}

/// Keep only the last four characters of a secret
fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

fn print_config_value(key: &str, value: Option<&str>) {
    if let Some(v) = value {
        println!("  {}: {}", style(key).cyan(), style(v).yellow());
    } else {
        println!("  {}: {}", style(key).cyan(), style("(not set)").dim());
    }
}

fn print_path(label: &str, path: Option<PathBuf>) {
    match path {
        Some(path) => {
            let state = if path.exists() {
                style("(exists)").green()
            } else {
                style("(not created)").dim()
            };
            println!("  {:<9} {} {}", style(label).cyan(), path.display(), state);
        }
        None => println!("  {:<9} {}", style(label).cyan(), style("(unknown)").dim()),
    }
}

fn display_path(path: Option<PathBuf>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
