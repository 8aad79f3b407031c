//! Command-line client for the monitor API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::path::PathBuf;

/// Command-line arguments of the `lfsmon` binary.
#[derive(Parser)]
#[command(name = "lfsmon")]
#[command(about = "Lustre filesystem monitor", long_about = None)]
pub struct Cli {
    /// API base URL.
    #[arg(short, long, default_value = "http://localhost:8443")]
    pub server: String,

    /// Admin bearer token.
    #[arg(short, long, env = "LFSMON_ADMIN_TOKEN")]
    pub token: Option<String>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Client subcommands plus `serve`.
#[derive(Subcommand)]
pub enum Command {
    /// List management targets and the filesystems they serve
    Mgts,
    /// List targets with details and available transitions
    Targets {
        /// Only targets of this filesystem
        #[arg(short, long)]
        filesystem_id: Option<u64>,
    },
    /// Page through events, newest first
    Events {
        /// Only events about this host
        #[arg(long)]
        host_id: Option<u64>,
        /// INFO, WARNING or ERROR
        #[arg(long)]
        severity: Option<String>,
        /// AlertEvent, SyslogEvent, LearnEvent or ClientConnectEvent
        #[arg(long)]
        event_type: Option<String>,
        /// First row
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Rows per page
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Page through alerts
    Alerts {
        /// Active alerts instead of the cleared history
        #[arg(long)]
        active: bool,
        /// First row
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Rows per page
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Page through annotated syslog, newest first
    Logs {
        /// Only lines from this host
        #[arg(long)]
        host_id: Option<u64>,
        /// MM/DD/YYYY HH:MM
        #[arg(long)]
        start: Option<String>,
        /// MM/DD/YYYY HH:MM
        #[arg(long)]
        end: Option<String>,
        /// Only Lustre kernel messages
        #[arg(long)]
        lustre_only: bool,
        /// Case-insensitive substring
        #[arg(long)]
        search: Option<String>,
        /// First row
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Rows per page
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// List incomplete and recently finished jobs
    Jobs,
    /// Show the transitions available to one resource
    Transitions {
        /// host, filesystem or target
        kind: String,
        /// Resource id
        id: u64,
    },
    /// Run the API server
    Serve {
        /// Config file, TOML or JSON
        #[arg(short, long, default_value = "/etc/lfsmon/lfsmon.toml")]
        config: PathBuf,
    },
}

type Params = Vec<(&'static str, String)>;

fn push_opt<T: ToString>(params: &mut Params, key: &'static str, value: &Option<T>) {
    if let Some(v) = value {
        params.push((key, v.to_string()));
    }
}

impl Cli {
    /// Sends the request for the chosen subcommand and prints the reply.
    pub async fn run(self) -> Result<()> {
        let (path, params) = self.request()?;
        self.fetch(&path, &params).await
    }

    /// The API path and query string a client subcommand maps to.
    fn request(&self) -> Result<(String, Params)> {
        let mut params = Params::new();
        let path = match &self.command {
            Command::Mgts => "/api/v1/mgts".to_string(),
            Command::Targets { filesystem_id } => {
                push_opt(&mut params, "filesystem_id", filesystem_id);
                "/api/v1/targets".to_string()
            }
            Command::Events {
                host_id,
                severity,
                event_type,
                offset,
                limit,
            } => {
                push_opt(&mut params, "host_id", host_id);
                push_opt(&mut params, "severity", severity);
                push_opt(&mut params, "event_type", event_type);
                params.push(("offset", offset.to_string()));
                params.push(("limit", limit.to_string()));
                "/api/v1/events".to_string()
            }
            Command::Alerts {
                active,
                offset,
                limit,
            } => {
                params.push(("active", active.to_string()));
                params.push(("offset", offset.to_string()));
                params.push(("limit", limit.to_string()));
                "/api/v1/alerts".to_string()
            }
            Command::Logs {
                host_id,
                start,
                end,
                lustre_only,
                search,
                offset,
                limit,
            } => {
                push_opt(&mut params, "host_id", host_id);
                push_opt(&mut params, "start_time", start);
                push_opt(&mut params, "end_time", end);
                push_opt(&mut params, "search", search);
                params.push(("lustre_only", lustre_only.to_string()));
                params.push(("offset", offset.to_string()));
                params.push(("limit", limit.to_string()));
                "/api/v1/logs".to_string()
            }
            Command::Jobs => "/api/v1/jobs".to_string(),
            Command::Transitions { kind, id } => format!("/api/v1/transitions/{}/{}", kind, id),
            Command::Serve { .. } => anyhow::bail!("serve is handled by the binary entry point"),
        };
        Ok((path, params))
    }

    async fn fetch(&self, path: &str, params: &Params) -> Result<()> {
        let client = Client::new();
        let url = format!("{}{}", self.server.trim_end_matches('/'), path);

        let mut request = client.get(&url).query(params);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Request failed: {} {}", status, body);
        }

        let body: serde_json::Value = response.json().await?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_mgts_subcommand() {
        let cli = Cli::parse_from(["lfsmon", "mgts"]);
        assert!(matches!(cli.command, Command::Mgts));
        assert_eq!(cli.request().unwrap().0, "/api/v1/mgts");
    }

    #[test]
    fn test_cli_events_query() {
        let cli = Cli::parse_from(["lfsmon", "events", "--severity", "ERROR", "--limit", "10"]);
        let (path, params) = cli.request().unwrap();
        assert_eq!(path, "/api/v1/events");
        assert!(params.contains(&("severity", "ERROR".to_string())));
        assert!(params.contains(&("limit", "10".to_string())));
        assert!(params.contains(&("offset", "0".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "host_id"));
    }

    #[test]
    fn test_cli_logs_query() {
        let cli = Cli::parse_from([
            "lfsmon",
            "logs",
            "--host-id",
            "3",
            "--start",
            "03/01/2024 10:00",
            "--lustre-only",
        ]);
        let (path, params) = cli.request().unwrap();
        assert_eq!(path, "/api/v1/logs");
        assert!(params.contains(&("host_id", "3".to_string())));
        assert!(params.contains(&("start_time", "03/01/2024 10:00".to_string())));
        assert!(params.contains(&("lustre_only", "true".to_string())));
    }

    #[test]
    fn test_cli_transitions_path() {
        let cli = Cli::parse_from(["lfsmon", "transitions", "target", "12"]);
        assert_eq!(cli.request().unwrap().0, "/api/v1/transitions/target/12");
    }

    #[test]
    fn test_cli_serve_default_config() {
        let cli = Cli::parse_from(["lfsmon", "serve"]);
        match &cli.command {
            Command::Serve { config } => assert_eq!(config, &PathBuf::from("/etc/lfsmon/lfsmon.toml")),
            _ => panic!("Expected Serve command"),
        }
        assert!(cli.request().is_err());
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::parse_from(["lfsmon", "--server", "http://mon:9000", "--token", "t", "jobs"]);
        assert_eq!(cli.server, "http://mon:9000");
        assert_eq!(cli.token.as_deref(), Some("t"));
    }
}
