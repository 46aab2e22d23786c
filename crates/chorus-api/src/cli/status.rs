//! Service status dashboard command.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Display service status.
///
/// Shows persona/session/turn row counts, queue depth, and config summary.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let personas = count(state, "personas").await?;
    let sessions = count(state, "room_sessions").await?;
    let onboarded: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM room_sessions WHERE onboarding_done = 1")
            .fetch_one(&state.db_pool.reader)
            .await?;
    let turns = count(state, "conversation_turns").await?;
    let usage_rows = count(state, "usage_telemetry").await?;
    let pending_jobs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM completion_jobs WHERE status = 'pending'")
            .fetch_one(&state.db_pool.reader)
            .await?;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "personas": personas,
            "rooms": {
                "total": sessions,
                "onboarded": onboarded,
            },
            "turns": turns,
            "usage_rows": usage_rows,
            "pending_jobs": pending_jobs,
            "embedding_dimension": state.config.embedding.dimension,
            "history_limit": state.config.rag.history_limit,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Chorus v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("  {}", style("── Rooms ──").dim());
    println!("  Total:     {}", style(sessions).bold());
    println!("  Onboarded: {}", style(onboarded).green());
    println!();
    println!("  {}", style("── Data ──").dim());
    println!("  Personas:  {}", style(personas).bold());
    println!("  Turns:     {}", style(turns).bold());
    println!("  Usage:     {}", style(usage_rows).bold());
    if pending_jobs > 0 {
        println!("  Pending:   {}", style(pending_jobs).yellow());
    }
    println!();
    println!("  {}", style("── Config ──").dim());
    println!("  Data dir:  {}", state.data_dir.display());
    println!(
        "  Embedding: {} dims",
        style(state.config.embedding.dimension).bold()
    );
    println!(
        "  History:   {} turns",
        style(state.config.rag.history_limit).bold()
    );
    println!();

    Ok(())
}

async fn count(state: &AppState, table: &str) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&state.db_pool.reader)
        .await?;
    Ok(n)
}
