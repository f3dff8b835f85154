//! Huddle CLI: network detection and audio-level diagnostics.

#![forbid(unsafe_code)]

use std::time::Duration;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use huddle_audio::TrackerConfig;
use huddle_client::{parse_tone, rank_tones};
use huddle_net::{generate_group_name, get_network_prefix, LocatorConfig, NetworkLocator};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(about = "Huddle network grouping and speaker diagnostics")]
struct Args {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    locator: LocatorArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct LocatorArgs {
    /// STUN servers used to gather candidates (host:port, comma separated)
    #[arg(
        long = "stun-server",
        global = true,
        env = "HUDDLE_STUN_SERVERS",
        value_delimiter = ','
    )]
    stun_servers: Vec<String>,

    /// Endpoint returning {"ip": "..."} for the caller
    #[arg(long, global = true, env = "HUDDLE_IP_ECHO_URL")]
    echo_url: Option<String>,

    /// Bound on candidate gathering in milliseconds
    #[arg(long, global = true, env = "HUDDLE_CANDIDATE_TIMEOUT_MS")]
    candidate_timeout_ms: Option<u64>,

    /// Bound on the IP echo lookup in milliseconds
    #[arg(long, global = true, env = "HUDDLE_ECHO_TIMEOUT_MS")]
    echo_timeout_ms: Option<u64>,

    /// Bound on the IP echo lookup on mobile devices in milliseconds
    #[arg(long, global = true, env = "HUDDLE_MOBILE_ECHO_TIMEOUT_MS")]
    mobile_echo_timeout_ms: Option<u64>,

    /// User agent consulted by the mobile heuristic
    #[arg(long, global = true, env = "HUDDLE_USER_AGENT")]
    user_agent: Option<String>,

    /// Treat this device as mobile regardless of user agent
    #[arg(long, global = true)]
    force_mobile: bool,
}

impl LocatorArgs {
    fn into_config(self) -> LocatorConfig {
        let mut config = LocatorConfig::from_env();
        if !self.stun_servers.is_empty() {
            config.stun_servers = self.stun_servers;
        }
        if let Some(url) = self.echo_url {
            config.echo_url = url;
        }
        if let Some(ms) = self.candidate_timeout_ms {
            config.candidate_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.echo_timeout_ms {
            config.echo_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.mobile_echo_timeout_ms {
            config.mobile_echo_timeout = Duration::from_millis(ms);
        }
        if self.user_agent.is_some() {
            config.user_agent = self.user_agent;
        }
        config.force_mobile |= self.force_mobile;
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect this device's network identity
    Network {
        /// Print the detection as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reduce an IP address to its network identity
    Prefix {
        ip: String,
    },

    /// Human-readable name for a network identity
    Label {
        identity: String,
    },

    /// Rank synthetic tones the way live streams are ranked
    Speakers {
        /// Stream to simulate as <id>:<amplitude>
        #[arg(long = "tone", required = true)]
        tones: Vec<String>,

        /// Smoothing ticks to run before printing
        #[arg(long, default_value_t = 5)]
        ticks: usize,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();
    huddle_common::init_tracing_with_default(&args.log_level);

    match args.command {
        Command::Network { json } => {
            let config = args.locator.into_config();
            debug!("locator config: {:?}", config);

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let detection = rt.block_on(NetworkLocator::new(config).detect_detailed());

            if json {
                println!("{}", serde_json::to_string_pretty(&detection)?);
            } else {
                println!("Identity: {}", detection.identity);
                println!("Label:    {}", detection.label);
                println!("Source:   {:?}", detection.source);
            }
        }
        Command::Prefix { ip } => {
            println!("{}", get_network_prefix(&ip));
        }
        Command::Label { identity } => {
            println!("{}", generate_group_name(&identity));
        }
        Command::Speakers { tones, ticks } => {
            let tones = tones
                .iter()
                .map(|t| parse_tone(t))
                .collect::<huddle_common::Result<Vec<_>>>()?;
            let config = TrackerConfig::default();
            let threshold = config.threshold;

            println!("{:<16} {:>8} {:>8}  SPEAKING", "STREAM", "VOLUME", "SMOOTHED");
            for sample in rank_tones(&tones, ticks, config) {
                println!(
                    "{:<16} {:>8.4} {:>8.4}  {}",
                    sample.stream_id,
                    sample.volume,
                    sample.smoothed_volume,
                    if sample.smoothed_volume > threshold { "yes" } else { "no" }
                );
            }
        }
        Command::Version => {
            println!("huddle {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
