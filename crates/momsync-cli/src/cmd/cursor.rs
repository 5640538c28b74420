use crate::output::print_json;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use momsync_core::config::Config;
use momsync_core::cursor::{CursorStore, TimeWindow};
use std::path::Path;

#[derive(Subcommand)]
pub enum CursorSubcommand {
    /// Show where the next poll window starts
    Show,

    /// Move the cursor; the next poll re-reads every change since then
    Reset {
        /// New window start (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

pub fn run(config_path: &Path, subcmd: CursorSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("failed to load config")?;
    let store = CursorStore::new(&config.poll.cursor_path);
    match subcmd {
        CursorSubcommand::Show => show(&store, json),
        CursorSubcommand::Reset { at } => reset(&store, at.unwrap_or_else(Utc::now), json),
    }
}

fn show(store: &CursorStore, json: bool) -> anyhow::Result<()> {
    let window = store.load().context("failed to read cursor")?;
    if json {
        return print_json(&serde_json::json!({
            "path": store.path(),
            "last_end": window.map(|w| w.last_end),
        }));
    }
    match window {
        Some(w) => println!("{}", w.last_end.to_rfc3339()),
        None => println!("no cursor at {} (first poll starts from now)", store.path().display()),
    }
    Ok(())
}

fn reset(store: &CursorStore, at: DateTime<Utc>, json: bool) -> anyhow::Result<()> {
    let window = TimeWindow { last_end: at };
    store.save(&window).context("failed to write cursor")?;
    if json {
        print_json(&window)
    } else {
        println!("cursor set to {}", at.to_rfc3339());
        Ok(())
    }
}
