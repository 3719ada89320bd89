//! Quick Access console client: entry point.
//!
//! Opens a remote terminal or remote desktop session from an access link.
//! The link carries a base64-JSON connection descriptor in its `payload`
//! parameter; the client exchanges it for an ephemeral session at the
//! gateway and then hosts the session in the current console.
//!
//! # Usage
//!
//! ```text
//! quick-client [OPTIONS] [ACCESS_URL]
//!
//! Arguments:
//!   [ACCESS_URL]            Access link, e.g. https://gw/#/term?payload=...
//!
//! Options:
//!   --payload <PAYLOAD>     Connection descriptor, overrides the link
//!   --width <PX>            Fixed remote display width
//!   --height <PX>           Fixed remote display height
//!   --route <ROUTE>         access | term [default: by protocol]
//!   --server-url <URL>      Gateway base URL [default: http://127.0.0.1:8088]
//!   --config <PATH>         TOML configuration file
//!   --log-level <FILTER>    Log filter when RUST_LOG is unset [default: warn]
//! ```
//!
//! Once connected, `Ctrl+]` followed by a key reaches the client itself:
//! `q` quits, `1`-`8` send a predefined key combination, `c` copies the last
//! terminal line, `v` pastes the local clipboard, `?` lists the bindings.
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable           | Default                 | Description              |
//! |--------------------|-------------------------|--------------------------|
//! | `QUICK_SERVER_URL` | `http://127.0.0.1:8088` | Gateway base URL         |
//! | `QUICK_CONFIG`     | unset                   | TOML configuration file  |
//! | `QUICK_LOG`        | `warn`                  | Fallback log filter      |
//! | `RUST_LOG`         | unset                   | Log filter (wins)        |
//!
//! Logs go to stderr so they never mix with the session on stdout.
//!
//! # Exit codes
//!
//! | Code | Meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0    | Session ended                                       |
//! | 1    | Setup failure (bad flags, config, console)          |
//! | 2    | Missing or undecodable `payload` (page not found)   |

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quick_client::application::Presenter;
use quick_client::domain::{ClientConfig, LaunchError, LaunchParams, Route};
use quick_client::infrastructure::console::ConsolePresenter;
use quick_client::infrastructure::{run, SessionOutcome};
use quick_core::{decode_payload, Notice};

/// Exit status for a link without a usable payload.
const EXIT_NOT_FOUND: i32 = 2;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Quick Access console client.
#[derive(Debug, Parser)]
#[command(
    name = "quick-client",
    about = "Opens Quick Access terminal and remote desktop sessions in the console",
    version
)]
struct Cli {
    /// Access link as handed out by the gateway.
    ///
    /// The route (`access` or `term`) and the `payload`, `width` and
    /// `height` parameters are read from its path, query or hash route.
    #[arg(value_name = "ACCESS_URL")]
    url: Option<String>,

    /// Base64-JSON connection descriptor.  Overrides the link's `payload`.
    #[arg(long)]
    payload: Option<String>,

    /// Fixed remote display width in pixels.  Needs `--height` as well.
    #[arg(long)]
    width: Option<String>,

    /// Fixed remote display height in pixels.  Needs `--width` as well.
    #[arg(long)]
    height: Option<String>,

    /// `access` (graphical tunnel) or `term` (terminal).
    ///
    /// Without it, `ssh` targets open a terminal and everything else the
    /// graphical tunnel.
    #[arg(long)]
    route: Option<String>,

    /// HTTP base URL of the access gateway.
    #[arg(long, env = "QUICK_SERVER_URL")]
    server_url: Option<String>,

    /// TOML configuration file layered under the flags.
    #[arg(long, env = "QUICK_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "QUICK_LOG")]
    log_level: Option<String>,
}

impl Cli {
    /// Builds the runtime configuration: defaults, then the TOML file, then
    /// flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the server URL
    /// is not an absolute http(s) URL.
    fn to_client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.server_url {
            config.set_server_url(url)?;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }

    /// Reads the access link, then applies the individual flags on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is not a URL or names an unknown route,
    /// or if `--route` is neither `access` nor `term`.
    fn to_launch_params(&self) -> anyhow::Result<LaunchParams> {
        let mut params = match &self.url {
            Some(url) => LaunchParams::from_access_url(url)?,
            None => LaunchParams::default(),
        };
        if let Some(route) = &self.route {
            params.route = Some(match route.as_str() {
                "access" => Route::Access,
                "term" => Route::Term,
                other => return Err(LaunchError::UnknownRoute(other.to_string()).into()),
            });
        }
        if let Some(payload) = &self.payload {
            params.payload = Some(payload.clone());
        }
        if let Some(width) = &self.width {
            params.width = Some(width.clone());
        }
        if let Some(height) = &self.height {
            params.height = Some(height.clone());
        }
        Ok(params)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.to_client_config()?;
    let launch = cli.to_launch_params()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    // A link without a usable payload never reaches the network.
    let decoded = match launch.payload.as_deref().map(decode_payload) {
        Some(Ok(decoded)) => decoded,
        Some(Err(e)) => {
            warn!("rejecting payload: {e}");
            not_found();
        }
        None => {
            warn!("no payload given");
            not_found();
        }
    };

    info!(
        "Quick Access client starting: target={}, server={}",
        decoded.display_name(),
        config.server_url
    );

    // ── Session loop ──────────────────────────────────────────────────────────
    while run(&config, decoded.clone(), &launch).await? == SessionOutcome::Reload {
        info!("reloading session");
    }

    info!("Quick Access client stopped");
    Ok(())
}

fn not_found() -> ! {
    ConsolePresenter::new("quick-client", false).present(&Notice::NotFound);
    std::process::exit(EXIT_NOT_FOUND);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
