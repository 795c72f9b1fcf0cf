/*
 * 5D Labs Agent Platform - Agent Injector Webhook
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Agent Injector Service - Mutating admission webhook for pods
//!
//! Serves `/mutate` and `/live` over HTTPS using the configured certificate
//! and key, injecting the Contrast agent into opted-in pods.

use agent_injector::{
    webhook_router, AgentInjector, InjectorConfig, LogFormat, ProfileRegistry, WebhookState,
};
use anyhow::Context;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = InjectorConfig::parse();
    init_tracing(config.log_format);
    config.validate()?;

    info!(
        "Starting 5D Labs Agent Injector v{}",
        env!("CARGO_PKG_VERSION")
    );

    let tls_config = RustlsConfig::from_pem_file(&config.tls_cert_file, &config.tls_key_file)
        .await
        .with_context(|| {
            format!(
                "Failed to load key pair from {} and {}",
                config.tls_cert_file.display(),
                config.tls_key_file.display()
            )
        })?;

    let registry = ProfileRegistry::with_default_profiles();
    info!(
        languages = ?registry.languages(),
        secret = %config.secret_name,
        "Registered agent profiles"
    );

    let state = Arc::new(WebhookState::new(AgentInjector::new(
        registry,
        config.secret_name.clone(),
    )));
    let app = webhook_router(state);

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    let addr = config.bind_addr();
    info!("Webhook server listening on {}", addr);
    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("Webhook server failed")?;

    info!("Agent injector stopped");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
