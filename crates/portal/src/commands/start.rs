//! Start command - launches the gateway server.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::{info, warn};

use portal_invoke::RemoteInvoker;
use portal_server::{
    AppState, HttpAuthenticator, HttpFunctionConnector, HttpSessionConnector, Server,
    ServerConfig, Surface, SurfaceFacade,
};
use portal_session::{CacheConfig, SessionCache};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    config.validate()?;

    if ctx.verbose {
        let sources = ctx.loaded.loaded_from();
        if sources.is_empty() {
            println!("No config files found, using defaults + CLI args");
        } else {
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
        }
    }

    let addr = bind_address(config, &args)?;

    // ── Sessions ────────────────────────────────────────────────────────

    let session = config.session();
    let cache_config = CacheConfig::from_provider(&session);
    let portal = config.portal();
    let invoke = config.invoke();

    let invoker = RemoteInvoker::from_config(
        HttpFunctionConnector::new(&invoke.endpoint, Duration::from_secs(invoke.timeout_secs)),
        &invoke,
    );

    let server_config = ServerConfig::new()
        .with_bind_address(addr)
        .with_invoke_function(&invoke.function);
    let mut state = AppState::new(server_config, Arc::new(invoker));

    for surface in Surface::ALL {
        let cache = SessionCache::new(
            HttpSessionConnector::new(cache_config.request_timeout),
            cache_config.clone(),
        );
        let authenticator = HttpAuthenticator::new(&portal.base_url, surface);
        state = state.with_surface(SurfaceFacade::new(surface, cache, authenticator));
    }

    if ctx.verbose {
        println!("Portal: {}", portal.base_url);
        println!(
            "Invocation: {}/{} (pool {})",
            invoke.endpoint, invoke.function, invoke.pool_capacity
        );
        println!(
            "Sessions: sweep every {}s, idle after {}s",
            session.sweep_interval_secs, session.idle_timeout_secs
        );
    }

    // ── Start server ────────────────────────────────────────────────────

    let eviction = state.start_eviction();
    let server = Server::from_state(state.clone());

    println!("Portal gateway starting on http://{}", addr);
    println!("Press Ctrl+C to stop");

    let served = server.run_with_shutdown(shutdown_signal()).await;

    // ── Graceful shutdown ──────────────────────────────────────────────

    drop(eviction);
    state.shutdown().await;
    info!("Shutdown complete");

    served?;
    Ok(())
}

/// `--bind`/`--port` over `[server]`.
fn bind_address(config: &portal_config::PortalConfig, args: &StartArgs) -> Result<SocketAddr> {
    let server = config.server();
    let bind = args.bind.as_deref().unwrap_or(&server.bind);
    let ip: IpAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", bind))?;
    Ok(SocketAddr::new(ip, args.port.unwrap_or(server.port)))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
