//! Socket Gateway Server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p socket-gateway [config.json]
//! ```
//!
//! Configuration is loaded from the given file (with `SOCKET__*` overrides) or, without an
//! argument, from environment variables.

use socket_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use socket_gateway::handlers::DirectMessageHandler;
use socket_gateway::hooks::HookType;
use socket_gateway::pipeline::{BroadcastAction, NotifyAllTrigger};
use socket_gateway::{App, Pipeline};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(
        config.app.env,
        config.app.debug,
    )) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        address = %config.server.address(),
        attempts_allowed = config.session.attempts_allowed,
        jwt = config.jwt.secret.is_some(),
        "Configuration loaded"
    );

    let app = App::builder(config)
        .handler("SEND_MESSAGE", DirectMessageHandler::default())
        .pipeline(
            Pipeline::new()
                .on_action(BroadcastAction::ACTION, BroadcastAction)
                .on_trigger(BroadcastAction::TRIGGER, NotifyAllTrigger::default()),
        )
        .build();

    let mut hooks = app.hooks().subscribe();
    tokio::spawn(async move {
        while let Some(hook) = hooks.recv().await {
            match hook.hook_type {
                HookType::Error => warn!(hook = %hook.hook_type, data = %hook.data, "Hook"),
                _ => info!(hook = %hook.hook_type, data = %hook.data, "Hook"),
            }
        }
    });

    socket_gateway::run(app).await?;

    info!("Gateway stopped");
    Ok(())
}
