//! CLI argument parsing with clap

use autoretry_core::types::BackoffStrategy;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// autoretry - HTTP requests with automatic retries
#[derive(Parser, Debug)]
#[command(name = "autoretry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Runtime config file layered over ~/.autoretry/runtime.yaml
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a GET request
    Get(RequestArgs),

    /// Send a HEAD request
    Head(RequestArgs),

    /// Send a POST request with form-encoded parameters
    Post(RequestArgs),

    /// Send a PUT request with form-encoded parameters
    Put(RequestArgs),

    /// Send a PATCH request with form-encoded parameters
    Patch(RequestArgs),

    /// Send a DELETE request
    Delete(RequestArgs),

    /// POST files as a multipart form
    Upload(UploadArgs),

    /// Runtime configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Target URL
    pub url: String,

    /// Request parameter, repeatable
    #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Retries after the first attempt [default: from config]
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Seconds between attempts [default: from config]
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Backoff strategy (fixed, linear, exponential)
    #[arg(long)]
    pub strategy: Option<BackoffStrategy>,

    /// Only retry timeouts, connection failures and 408/425/429/5xx responses
    #[arg(long)]
    pub status_aware: bool,

    /// Name the request in logs instead of its first task id
    #[arg(long)]
    pub key: Option<String>,

    /// Print the status line and response headers
    #[arg(long)]
    pub include: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// File part, repeatable
    #[arg(short, long = "file", value_name = "NAME=PATH", value_parser = parse_file_part, required = true)]
    pub files: Vec<(String, Utf8PathBuf)>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective runtime configuration
    Show,

    /// Print the user config directory
    Path,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    if name.is_empty() {
        return Err(format!("missing parameter name in '{}'", s));
    }
    Ok((name.to_string(), value.to_string()))
}

fn parse_file_part(s: &str) -> Result<(String, Utf8PathBuf), String> {
    let (name, path) = parse_key_val(s)?;
    if path.is_empty() {
        return Err(format!("missing file path in '{}'", s));
    }
    Ok((name, Utf8PathBuf::from(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_with_retry_flags() {
        let cli = Cli::try_parse_from([
            "autoretry",
            "-v",
            "get",
            "https://example.com/items",
            "-p",
            "q=rust",
            "--param",
            "page=2",
            "-r",
            "3",
            "-i",
            "2",
            "--strategy",
            "exponential",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Get(args) => {
                assert_eq!(args.url, "https://example.com/items");
                assert_eq!(
                    args.params,
                    vec![
                        ("q".to_string(), "rust".to_string()),
                        ("page".to_string(), "2".to_string())
                    ]
                );
                assert_eq!(args.retries, Some(3));
                assert_eq!(args.interval, Some(2));
                assert_eq!(args.strategy, Some(BackoffStrategy::Exponential));
                assert!(!args.status_aware);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_short_form_leaves_interval_unset() {
        let cli = Cli::try_parse_from(["autoretry", "delete", "https://example.com/a", "-r", "1"])
            .unwrap();
        match cli.command {
            Commands::Delete(args) => {
                assert_eq!(args.retries, Some(1));
                assert_eq!(args.interval, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_param_value_may_contain_equals() {
        assert_eq!(
            parse_key_val("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_upload_requires_file() {
        assert!(Cli::try_parse_from(["autoretry", "upload", "https://example.com/u"]).is_err());

        let cli = Cli::try_parse_from([
            "autoretry",
            "upload",
            "https://example.com/u",
            "-f",
            "report=out/report.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Upload(args) => {
                assert_eq!(args.files[0].0, "report");
                assert_eq!(args.files[0].1, Utf8PathBuf::from("out/report.csv"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from([
            "autoretry",
            "get",
            "https://example.com",
            "--strategy",
            "random"
        ])
        .is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from([
            "autoretry",
            "config",
            "show",
            "--config",
            "ci.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(Utf8PathBuf::from("ci.yaml")));
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));
    }
}
