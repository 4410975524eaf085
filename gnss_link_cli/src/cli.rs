use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use gnss_link::{RetryPolicy, SerialConfig};

/// Send one command to a GNSS receiver and wait for its acknowledgement.
#[derive(Debug, Parser)]
#[command(name = "gnss-link", author, version, about)]
pub struct Cli {
    /// Serial port the receiver is attached to
    #[arg(short = 'p', long)]
    pub port: Option<String>,

    /// Baud rate for the selected port
    #[arg(short = 's', long)]
    pub baud: Option<u32>,

    /// JSON file with a base serial configuration; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// How long to wait for a reply, per attempt
    #[arg(long, value_name = "MS")]
    pub read_timeout_ms: Option<u64>,

    /// Settling time after every command sent
    #[arg(long, value_name = "MS")]
    pub cmd_delay_ms: Option<u64>,

    /// Attempts per command before giving up
    #[arg(short = 'r', long, default_value_t = 3)]
    pub retries: u32,

    /// Pause between attempts
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Grow the pause between attempts linearly
    #[arg(long)]
    pub linear_backoff: bool,

    /// Store the configuration permanently (SAVECONFIG) once the command succeeded
    #[arg(long)]
    pub store: bool,

    /// Poll the receiver's UTC time (UBX NAV-TIMEUTC) instead of sending a command
    #[arg(long, conflicts_with = "command")]
    pub time: bool,

    /// Log protocol traffic
    #[arg(short, long)]
    pub debug: bool,

    /// Command to send, e.g. VERSIONA, FRESET, MODE, CONFIG, GPGGA
    #[arg(required_unless_present = "time")]
    pub command: Option<String>,

    /// Command arguments, e.g. `MODE BASE TIME 60`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    pub fn serial_config(&self) -> Result<SerialConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("invalid serial config in {}", path.display()))?
            },
            None => SerialConfig::default(),
        };
        if let Some(port) = &self.port {
            config.path.clone_from(port);
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.cmd_delay_ms {
            config.cmd_delay = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// A fresh policy; one is consumed per command.
    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry_delay_ms);
        if self.linear_backoff {
            RetryPolicy::linear(self.retries, delay)
        } else {
            RetryPolicy::fixed(self.retries, delay)
        }
    }
}
