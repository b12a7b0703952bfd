use anyhow::Context;
use clap::Parser;
use resolv_send_domain::{parse_server_addr, CliOverrides};
use resolv_send_infrastructure::Session;
use std::net::SocketAddr;
use tracing::{debug, info};

mod bootstrap;
mod query;

#[derive(Parser)]
#[command(name = "resolv-send")]
#[command(version = "0.1.0")]
#[command(about = "Send one DNS query to the configured name servers and print the reply")]
struct Cli {
    /// Domain name to query
    name: String,

    /// Record type (A, AAAA, MX, TXT, ...)
    #[arg(default_value = "A")]
    record_type: String,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Name server, "ip" or "ip:port" (repeatable)
    #[arg(short = 's', long = "server", value_name = "ADDR", value_parser = parse_server_addr)]
    servers: Vec<SocketAddr>,

    /// Number of retries after the first pass over all servers
    #[arg(short = 'r', long)]
    retry: Option<u32>,

    /// Base per-attempt timeout in milliseconds
    #[arg(short = 't', long)]
    timeout_ms: Option<u64>,

    /// Use TCP for every query
    #[arg(long)]
    vc: bool,

    /// Accept truncated UDP replies
    #[arg(long)]
    ignore_tc: bool,

    /// Keep the socket open between queries
    #[arg(long)]
    stay_open: bool,

    /// Log every attempt at debug level
    #[arg(long)]
    debug: bool,

    /// Send the query this many times over one session
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

/// Large enough for any DNS message a virtual circuit can carry.
const ANSWER_BUFFER_SIZE: usize = 65535;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        servers: cli.servers.clone(),
        retry: cli.retry,
        timeout_ms: cli.timeout_ms,
        use_vc: cli.vc,
        ignore_tc: cli.ignore_tc,
        stay_open: cli.stay_open,
        debug: cli.debug,
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;
    bootstrap::init_logging(&config);

    debug!(
        servers = config.resolver.servers.len(),
        retry = config.resolver.retry,
        timeout_ms = config.resolver.timeout_ms,
        "Configuration loaded"
    );

    let record_type = query::parse_record_type(&cli.record_type)?;
    let mut session = Session::new();
    let mut answer = vec![0u8; ANSWER_BUFFER_SIZE];

    for round in 0..cli.count.max(1) {
        let request = query::build_query(&cli.name, record_type)?;
        info!(round, name = %cli.name, record_type = %record_type, "Sending query");

        let result = session.send(&config.resolver, &request, &mut answer);
        for attempt in session.attempts() {
            println!("{}", query::describe_attempt(attempt));
        }

        let len = result.with_context(|| format!("Query for {} {} failed", cli.name, record_type))?;
        println!("{}", query::render_reply(&answer[..len])?);
    }

    session.close();
    Ok(())
}
