use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use config_sync::config::ClientEndpointConfig;
use config_sync::model::{DataGroup, ListenOutcome, ListenRequest, VersionToken};
use config_sync::transport::{HttpTransport, SyncTransport};

#[derive(Parser)]
#[command(name = "sync-cli")]
#[command(about = "Inspect the config authority the way the sync agent sees it", long_about = None)]
struct Cli {
    /// Base URL(s) of the config authority, comma-delimited.
    #[arg(short, long, default_value = "http://localhost:9095")]
    url: String,

    /// Fetch timeout in seconds.
    #[arg(long, default_value_t = 10)]
    connection_timeout: u64,

    /// Long-poll timeout in seconds.
    #[arg(long, default_value_t = 90)]
    listen_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the current snapshot of some or all groups
    Fetch {
        /// Group to fetch (repeatable); all groups when omitted.
        #[arg(short, long)]
        group: Vec<DataGroup>,
    },
    /// Issue one long-poll and print the changed groups
    Listen {
        /// Known version of a group, as GROUP=VERSION (repeatable).
        #[arg(short, long, value_parser = parse_version)]
        version: Vec<(DataGroup, String)>,
    },
}

fn parse_version(s: &str) -> Result<(DataGroup, String), String> {
    let (group, version) = s
        .split_once('=')
        .ok_or_else(|| format!("expected GROUP=VERSION, got '{}'", s))?;
    let group = group.parse::<DataGroup>().map_err(|e| e.to_string())?;
    Ok((group, version.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ClientEndpointConfig::new(&cli.url);
    config.connection_timeout = cli.connection_timeout;
    config.listen_timeout = cli.listen_timeout;
    let transport = HttpTransport::new(&config)?;

    match cli.command {
        Commands::Fetch { group } => {
            let groups = if group.is_empty() { DataGroup::ALL.to_vec() } else { group };
            let snapshot = transport.fetch(&groups).await?;

            let mut out = Map::new();
            for (group, data) in snapshot {
                out.insert(group.to_string(), serde_json::to_value(data)?);
            }
            println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
        }
        Commands::Listen { version } => {
            let mut request = ListenRequest::new();
            for group in DataGroup::ALL {
                request.insert(group, None);
            }
            for (group, token) in version {
                request.insert(group, Some(VersionToken::new(token)));
            }

            let out = match transport.listen(&request).await? {
                ListenOutcome::Changed(notification) => json!({
                    "changed": notification.groups().iter().map(|g| g.as_str()).collect::<Vec<_>>(),
                }),
                ListenOutcome::Timeout => json!({ "changed": [] }),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}
