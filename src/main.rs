use actix_web::{web, App, HttpServer};
use clap::Parser;

use docstore::server::config_routes;
use docstore::util::{self, AppState, StorageBackend};

/// Minimal authenticated text document store.
#[derive(Debug, Parser)]
#[command(name = "docstore", version, about)]
struct Cli {
    /// Address to bind, e.g. 0.0.0.0:8090 (falls back to BIND_ADDR).
    #[arg(long)]
    bind: Option<String>,

    /// Storage backend: "sled:<path>" or "memory".
    #[arg(long, env = "DOCSTORE_BACKEND")]
    backend: Option<String>,

    /// Shared TOTP secret gating API key issuance.
    #[arg(long, env = "DOCSTORE_OTP_SECRET", hide_env_values = true)]
    otp_secret: String,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    util::init_tracing();
    let cli = Cli::parse();

    let backend = match cli.backend.as_deref() {
        Some(spec) => StorageBackend::from_spec(spec)
            .ok_or_else(|| anyhow::anyhow!("unrecognized backend spec: {spec}"))?,
        None => StorageBackend::default_from_env(),
    };
    let state = web::Data::new(AppState::from_backend(&backend, cli.otp_secret)?);

    let bind = cli.bind.unwrap_or_else(util::env_bind_addr);
    tracing::info!(%bind, backend = ?backend, "starting docstore");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(util::cors_config_from_env())
            .configure(config_routes)
    })
    .bind(&bind)?
    .run()
    .await?;

    Ok(())
}
