//! Arena HTTP 服务
//!
//! 启动: cargo run（默认 feature web）
//! 配置: config/default.toml，环境变量 ARENA__* 覆盖；GROQ_KEY / GROQ_API_KEY / OPENAI_API_KEY 选择真实后端

use std::sync::Arc;

use anyhow::Context;
use arena::{
    config::load_config,
    core::ShutdownManager,
    delivery::RoundService,
    llm::create_generation_client,
    observability,
    server::router,
    store::create_game_store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config ({}), using defaults", e);
        Default::default()
    });

    let app_name = cfg.app.name.clone().unwrap_or_else(|| "arena".to_string());

    let shutdown = Arc::new(ShutdownManager::new());
    let mut reasons = shutdown.subscribe();
    shutdown.install_signal_handlers();

    let service = RoundService::from_config(&cfg, create_game_store(), create_generation_client(&cfg))
        .with_shutdown(shutdown.token());
    tracing::info!(
        debate_turns = cfg.game.debate_turns,
        tie_break = ?cfg.game.tie_break,
        "round engine ready"
    );

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("{} listening on http://{}", app_name, addr);

    let graceful = Arc::clone(&shutdown);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { graceful.wait_for_shutdown().await })
        .await
        .context("HTTP server failed")?;

    match reasons.try_recv() {
        Ok(reason) => tracing::info!(?reason, "{} stopped", app_name),
        Err(_) => tracing::info!("{} stopped", app_name),
    }
    Ok(())
}
