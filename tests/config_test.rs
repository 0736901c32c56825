use clap::Parser;
use hydra::cli::Cli;
use hydra::config::Settings;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_settings_from_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("hydra.toml");

    let hydra_toml = r#"
[pool]
poll_interval_seconds = 5
max_concurrent_agents = 10

[gateway]
driver = "loopback"
max_message_length = 1500

[memory]
max_history = 12

[database]
url = "sqlite://pool.db"

[secrets]
openai_api_key = "sk-test"
"#;
    fs::write(&config_path, hydra_toml)?;

    let cli = Cli::parse_from(["hydra", "--config", config_path.to_str().unwrap()]);
    let settings = Settings::new_with_cli(&cli)?;

    assert_eq!(settings.pool.poll_interval_seconds, 5);
    assert_eq!(settings.pool.max_concurrent_agents, 10);
    // unspecified values keep their defaults
    assert_eq!(settings.pool.stop_timeout_seconds, 10);
    assert_eq!(settings.pool.backoff_cap_ms, 60_000);
    assert_eq!(settings.gateway.max_message_length, 1_500);
    assert_eq!(settings.gateway.connect_timeout_seconds, 30);
    assert_eq!(settings.memory.max_history, 12);
    assert_eq!(settings.database.url, "sqlite://pool.db");
    assert_eq!(settings.secrets.openai_api_key(), Some("sk-test".to_string()));

    Ok(())
}

#[test]
fn test_missing_file_falls_back_to_defaults() -> anyhow::Result<()> {
    let cli = Cli::parse_from(["hydra", "--config", "/nonexistent/hydra.toml"]);
    let settings = Settings::new_with_cli(&cli)?;

    assert_eq!(settings.pool.poll_interval_seconds, 30);
    assert_eq!(settings.pool.max_concurrent_agents, 50);
    assert_eq!(settings.gateway.driver, "loopback");
    assert_eq!(settings.database.url, "sqlite://hydra.db");

    Ok(())
}

#[test]
fn test_cli_overrides_file_values() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("hydra.toml");
    fs::write(
        &config_path,
        "[pool]\npoll_interval_seconds = 60\n\n[database]\nurl = \"sqlite://file.db\"\n",
    )?;

    let cli = Cli::parse_from([
        "hydra",
        "--config",
        config_path.to_str().unwrap(),
        "--poll-interval",
        "7",
        "--database-url",
        "sqlite://cli.db",
        "--max-agents",
        "3",
    ]);
    let settings = Settings::new_with_cli(&cli)?;

    assert_eq!(settings.pool.poll_interval_seconds, 7);
    assert_eq!(settings.pool.max_concurrent_agents, 3);
    assert_eq!(settings.database.url, "sqlite://cli.db");

    Ok(())
}

#[test]
fn test_invalid_settings_are_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("hydra.toml");
    fs::write(&config_path, "[pool]\npoll_interval_seconds = 0\n")?;

    let cli = Cli::parse_from(["hydra", "--config", config_path.to_str().unwrap()]);
    assert!(Settings::new_with_cli(&cli).is_err());

    Ok(())
}
