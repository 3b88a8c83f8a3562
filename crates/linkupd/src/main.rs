//! linkupd — LinkUp peer node daemon.
//!
//! Hosts one authenticated session: local store, directory client over the
//! configured registry/feed endpoints, transport via the relay, presence
//! pulse, discovery refresh, and the HTTP API for UI consumers.
//!
//! Usage: linkupd <email> <password> [--register <name>]

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use linkup_core::config::LinkupConfig;
use linkup_core::types::{now_ms, User};
use linkup_services::{
    HttpDocumentStore, LocalStore, MemoryDocumentStore, RelaySwitchboard, SessionController,
    StaticAssistant,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = LinkupConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = LinkupConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LinkupConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (email, password, register_name) = parse_args(&args)?;

    // Local store
    let store = LocalStore::open(&config.storage.data_dir)
        .with_context(|| format!("failed to open store at {}", config.storage.data_dir.display()))?;
    tracing::info!(dir = %config.storage.data_dir.display(), "local store open");

    // Authenticate (or register a fresh account)
    let user = match store.authenticate(&email, &password) {
        Some(user) => user,
        None => match register_name {
            Some(name) => {
                let user = User {
                    id: derive_account_id(&email),
                    name,
                    age: 0,
                    bio: String::new(),
                    media: Vec::new(),
                    is_video: Vec::new(),
                    location: None,
                };
                store
                    .register_user(&email, &password, user.clone())
                    .context("registration failed")?;
                tracing::info!(user = %user.id, "account registered");
                user
            }
            None => bail!("unknown account or wrong password (use --register <name> to create one)"),
        },
    };

    // Shared documents: HTTP endpoints when configured, in-memory otherwise
    // (a single-node playground still works without a document host).
    let docs: Arc<dyn linkup_services::DocumentStore> = if config.directory.registry_url.is_empty() {
        tracing::warn!("no registry endpoint configured; using in-memory documents");
        Arc::new(MemoryDocumentStore::new())
    } else {
        Arc::new(
            HttpDocumentStore::new(std::time::Duration::from_secs(
                config.directory.request_timeout_secs,
            ))
            .with_document("registry", &config.directory.registry_url)
            .with_document("feed", &config.directory.feed_url),
        )
    };

    // Transport via the relay
    let switchboard = Arc::new(RelaySwitchboard::new(
        &config.transport.relay_addr,
        config.transport.dial_timeout(),
    ));
    tracing::info!(relay = %config.transport.relay_addr, "using relay switchboard");

    // Session up
    let session = SessionController::login(
        user,
        store,
        docs,
        switchboard,
        Arc::new(StaticAssistant),
        &config,
    )
    .await
    .context("failed to start session")?;

    if session.is_degraded() {
        tracing::warn!(
            address = session.address(),
            "another session holds the canonical address; peers cannot dial this one"
        );
    }

    // API for UI consumers
    let api = tokio::spawn(linkup_api::serve(
        linkup_api::ApiState {
            session: session.clone(),
        },
        config.api.port,
    ));

    tokio::signal::ctrl_c().await.context("signal handler failed")?;
    tracing::info!("shutting down");
    session.logout();
    api.abort();
    Ok(())
}

fn parse_args(args: &[String]) -> Result<(String, String, Option<String>)> {
    let mut positional = Vec::new();
    let mut register_name = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--register" {
            i += 1;
            register_name = Some(
                args.get(i)
                    .context("--register requires a display name")?
                    .clone(),
            );
        } else {
            positional.push(args[i].clone());
        }
        i += 1;
    }
    match positional.as_slice() {
        [email, password] => Ok((email.clone(), password.clone(), register_name)),
        _ => bail!("usage: linkupd <email> <password> [--register <name>]"),
    }
}

/// Stable account id from the email local part plus a short content hash,
/// so two "alex"es do not collide.
fn derive_account_id(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let sanitized: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    format!("{}-{}", sanitized, &linkup_core::types::content_id(email, now_ms(), b"account")[..6])
}
