//! Integration tests for CLI argument handling
//!
//! Tests city selection, the city list, and argument errors from the command line.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_meteo"))
        .args(args)
        .env_remove("OPENWEATHER_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute meteo")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("meteo"), "Help should mention meteo");
    assert!(stdout.contains("--city"), "Help should mention --city flag");
    assert!(stdout.contains("--offline"), "Help should mention --offline flag");
}

#[test]
fn test_list_cities_needs_no_api_key() {
    let output = run_cli(&["--list-cities"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().next() == Some("Amsterdam"));
    assert!(stdout.contains("Sint-Pieters-Leeuw, BE"));
}

#[test]
fn test_unknown_city_prints_error_and_exits() {
    let output = run_cli(&["--city", "Atlantis", "--api-key", "k"]);
    assert!(!output.status.success(), "Expected unknown city to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unknown city") && stderr.contains("Atlantis"),
        "Should print error message about the unknown city: {}",
        stderr
    );
}

#[test]
fn test_missing_api_key_prints_error_and_exits() {
    let output = run_cli(&["--city", "Paris"]);
    assert!(!output.status.success(), "Expected missing API key to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("API key"), "Should mention the API key: {}", stderr);
}

#[test]
fn test_offline_run_with_empty_cache_shows_placeholders() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let cache_dir = temp_dir.path().to_string_lossy().to_string();

    let output = run_cli(&[
        "--city",
        "Paris",
        "--api-key",
        "k",
        "--offline",
        "--cache-dir",
        &cache_dir,
    ]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Paris\n"));
    assert!(stdout.contains("Temperature:   -- °C"));
    assert!(stdout.contains("No weather data available offline"));
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use meteo::cli::{parse_city_arg, Cli, StartupConfig};

    #[test]
    fn test_cli_city_flag() {
        let cli = Cli::parse_from(["meteo", "-c", "Rome", "--api-key", "k"]);
        assert_eq!(cli.city.as_deref(), Some("Rome"));
    }

    #[test]
    fn test_parse_city_arg_valid() {
        assert_eq!(parse_city_arg("vienna").unwrap(), "Vienna");
    }

    #[test]
    fn test_startup_config_carries_flags() {
        let cli = Cli::parse_from(["meteo", "--city", "oslo", "--api-key", "k", "--clean"]);
        match StartupConfig::from_cli(&cli).unwrap() {
            StartupConfig::Dashboard(options) => {
                assert_eq!(options.city, "Oslo");
                assert!(options.clean);
                assert!(!options.offline);
            }
            other => panic!("unexpected startup config: {:?}", other),
        }
    }
}
