use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Debug, Parser)]
#[command(
    name = "fsmock-testserver",
    version,
    about = "Mock framed-TCP server with an HTTP control API",
    after_help = "Prints TCP_ADDR=<host:port> and CONTROL_URL=<url> to stdout once ready."
)]
struct Cli {
    /// Address clients connect to.
    #[arg(long, env = "FSMOCK_TCP_BIND", default_value = "127.0.0.1:0")]
    tcp_bind: SocketAddr,

    /// Address of the HTTP control API.
    #[arg(long, env = "FSMOCK_CONTROL_BIND", default_value = "127.0.0.1:0")]
    control_bind: SocketAddr,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let server = fsmock_testserver::MockServer::start_on(cli.tcp_bind, cli.control_bind).await?;

    println!("TCP_ADDR={}", server.tcp_addr());
    println!("CONTROL_URL={}", server.control_url());
    tracing::info!(tcp = %server.tcp_addr(), control = %server.control_url(), "mock server ready");

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}
