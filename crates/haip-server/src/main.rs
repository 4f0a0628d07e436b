//! CLI entry point (§10 A4): wires config, the tool catalog, the
//! authenticator, and the HTTP surface together, then serves until a
//! shutdown signal arrives, closing live sessions with a bounded grace
//! period (§4.8).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use haip_auth::{ChannelGrant, Principal, StaticTokenAuthenticator};
use haip_server::{router, AppState, ServerConfig};
use haip_tools::{Dispatcher, EchoTool, SleepTool, ToolRegistry};
use haip_wire::CoreEventType;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "haip-server", about = "Reference HAIP protocol server")]
struct Cli {
    #[arg(long, env = "HAIP_HOST")]
    host: Option<String>,

    #[arg(long, env = "HAIP_PORT")]
    port: Option<u16>,

    #[arg(long, env = "HAIP_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Bearer token accepted by the bundled `StaticTokenAuthenticator`.
    #[arg(long, env = "HAIP_AUTH_TOKEN", default_value = "dev-token")]
    auth_token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(max_connections) = cli.max_connections {
        config.max_connections = max_connections;
    }

    let principal = CoreEventType::ALL
        .iter()
        .fold(Principal::new("dev", config.engine.flow_control.max_credits), |p, event| {
            p.with_permission(event.as_str(), ChannelGrant::Wildcard)
        });
    let authenticator = Arc::new(StaticTokenAuthenticator::new().with_token(cli.auth_token, principal));

    let tool_registry = ToolRegistry::new();
    tool_registry.register(Arc::new(EchoTool));
    tool_registry.register(Arc::new(SleepTool));
    let dispatcher = Arc::new(Dispatcher::new(tool_registry.clone()));

    let bind_addr = config.bind_addr();
    let state = AppState::new(config, authenticator, Arc::new(tool_registry), dispatcher);
    let app = router(state.clone());

    tracing::info!(addr = %bind_addr, "starting haip-server");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, closing sessions");
    for session in state.registry.list_sessions() {
        let _ = state.registry.close_session(&session.session_id);
    }
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
