use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use twentyone::prelude::*;

const DEFAULT_WS_ADDR: &str = "0.0.0.0:9001";

#[derive(Debug, Parser)]
#[command(name = "twentyone-server")]
#[command(about = "Run the multi-room blackjack server", long_about = None)]
struct Args {
    /// Address for WebSocket clients (host:port)
    #[arg(long, env = "WS_ADDR", default_value = DEFAULT_WS_ADDR)]
    ws_addr: String,

    /// Address for the HTTP room API; overrides --port when set
    #[arg(long, env = "HTTP_ADDR")]
    http_addr: Option<String>,

    /// HTTP port, bound on all interfaces
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Frames buffered per connection before a slow client is dropped
    #[arg(long, env = "OUTBOX_CAPACITY", default_value_t = DEFAULT_OUTBOX_CAPACITY)]
    outbox_capacity: usize,

    /// Seats per room
    #[arg(long, env = "MAX_PLAYERS", default_value_t = 6)]
    max_players: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    let http_addr = args
        .http_addr
        .unwrap_or_else(|| format!("0.0.0.0:{}", args.port));
    let table = TableConfig {
        max_players: args.max_players,
        ..TableConfig::default()
    };

    let server = TwentyOneServer::builder()
        .ws_bind(&args.ws_addr)
        .http_bind(&http_addr)
        .outbox_capacity(args.outbox_capacity)
        .table_config(table)
        .build()
        .await?;
    tracing::info!(
        ws = %server.local_addr()?,
        http = %server.http_addr()?,
        "listening"
    );

    server.run().await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();
}
