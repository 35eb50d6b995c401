use std::io::{self, Write};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::board::{Board, Outcome};
use crate::cli::{Command, ListArgs, ThemeAction};
use crate::config::Config;
use crate::datetime::{display_today, parse_due_date};
use crate::kv::KeyValueStore;
use crate::prompt::{AlwaysConfirm, Confirm, FixedText, Terminal, TextPrompt};
use crate::query::{Query, SortOrder};
use crate::render::Renderer;
use crate::store::TaskStore;
use crate::theme::Theme;

type CliBoard<K> = Board<K, Box<dyn Confirm>, Box<dyn TextPrompt>>;

/// Runs one CLI command against `kv`, writing user-facing output to `out`.
#[instrument(skip(kv, cfg, renderer, out))]
pub fn dispatch<K: KeyValueStore>(
    kv: K,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    now: DateTime<Utc>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Theme { action } => cmd_theme(kv, action, out),
        Command::Show => cmd_show(cfg, out),
        Command::Add {
            text,
            due,
            priority,
        } => {
            let priority = match priority {
                Some(p) => p,
                None => cfg.default_priority()?,
            };
            let due_date = due
                .map(|expr| parse_due_date(&expr, display_today(now, renderer.timezone())))
                .transpose()?;
            let mut board = quiet_board(kv);
            match board.add(&text.join(" "), due_date, priority, now)? {
                Some(task) => writeln!(out, "Created task {}.", task.id)?,
                None => writeln!(out, "Nothing to add: task text is empty.")?,
            }
            Ok(())
        }
        Command::List(args) => cmd_list(kv, cfg, renderer, args, out),
        Command::Toggle { id } => {
            let mut board = quiet_board(kv);
            match board.toggle(id)? {
                Outcome::Applied => {
                    let completed = board.store().get(id).is_some_and(|t| t.completed);
                    let state = if completed { "completed" } else { "pending" };
                    writeln!(out, "Task {id} is now {state}.")?;
                }
                _ => writeln!(out, "No task {id}.")?,
            }
            Ok(())
        }
        Command::Edit { id, text } => {
            let prompt: Box<dyn TextPrompt> = match text {
                Some(text) => Box::new(FixedText(Some(text))),
                None => Box::new(Terminal::new(io::stdin().lock(), io::stderr())),
            };
            let mut board = Board::new(TaskStore::open(kv), never_asked(), prompt);
            let message = match board.edit(id, now)? {
                Outcome::Applied => format!("Edited task {id}."),
                Outcome::Declined => "Edit cancelled.".to_string(),
                Outcome::Unchanged if board.store().get(id).is_none() => format!("No task {id}."),
                Outcome::Unchanged => "Task text cannot be empty; nothing changed.".to_string(),
            };
            writeln!(out, "{message}")?;
            Ok(())
        }
        Command::Delete { id, yes } => {
            let mut board = confirming_board(kv, cfg, yes)?;
            if board.store().get(id).is_none() {
                writeln!(out, "No task {id}.")?;
                return Ok(());
            }
            report(out, board.delete(id)?, &format!("Deleted task {id}."))
        }
        Command::ClearCompleted { yes } => {
            let mut board = confirming_board(kv, cfg, yes)?;
            let before = board.stats().completed;
            let outcome = board.clear_completed()?;
            report(out, outcome, &format!("Removed {before} completed task(s)."))
        }
        Command::ClearAll { yes } => {
            let mut board = confirming_board(kv, cfg, yes)?;
            let before = board.stats().total;
            let outcome = board.clear_all()?;
            report(out, outcome, &format!("Removed {before} task(s)."))
        }
        Command::Stats => {
            let store = TaskStore::open(kv);
            renderer.write_stats(&mut *out, store.stats())
        }
        Command::Export => {
            let store = TaskStore::open(kv);
            let json = serde_json::to_string_pretty(store.tasks())
                .context("failed to serialize tasks for export")?;
            writeln!(out, "{json}")?;
            Ok(())
        }
    }
}

#[instrument(skip(kv, cfg, renderer, out))]
fn cmd_list<K: KeyValueStore>(
    kv: K,
    cfg: &Config,
    renderer: &Renderer,
    args: ListArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let sort = if args.asc {
        SortOrder { ascending: true }
    } else if args.desc {
        SortOrder { ascending: false }
    } else {
        cfg.default_sort()?
    };

    let mut board = quiet_board(kv);
    board.set_query(Query {
        search: args.search,
        priority: args.priority,
        status: args.status,
        sort,
    });

    let visible = board.visible();
    info!(visible = visible.len(), "listing tasks");
    renderer.write_task_table(&mut *out, &visible)?;
    writeln!(out)?;
    renderer.write_stats(&mut *out, board.stats())
}

#[instrument(skip(kv, out))]
fn cmd_theme<K: KeyValueStore>(
    mut kv: K,
    action: Option<ThemeAction>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let current = Theme::load(&kv);
    let next = match action {
        None => current,
        Some(ThemeAction::Light) => Theme::Light,
        Some(ThemeAction::Dark) => Theme::Dark,
        Some(ThemeAction::Toggle) => current.toggled(),
    };

    if action.is_some() {
        next.save(&mut kv)?;
    }
    writeln!(out, "{next}")?;
    Ok(())
}

fn cmd_show(cfg: &Config, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut entries: Vec<(&String, &String)> = cfg.iter().collect();
    entries.sort();
    for (k, v) in entries {
        writeln!(out, "{k} = {v}")?;
    }
    for file in &cfg.loaded_files {
        writeln!(out, "# loaded {}", file.display())?;
    }
    Ok(())
}

fn report(out: &mut dyn Write, outcome: Outcome, applied: &str) -> anyhow::Result<()> {
    match outcome {
        Outcome::Applied => writeln!(out, "{applied}")?,
        Outcome::Declined => writeln!(out, "Cancelled.")?,
        Outcome::Unchanged => writeln!(out, "Nothing to remove.")?,
    }
    Ok(())
}

fn never_asked() -> Box<dyn Confirm> {
    Box::new(AlwaysConfirm(false))
}

fn quiet_board<K: KeyValueStore>(kv: K) -> CliBoard<K> {
    Board::new(TaskStore::open(kv), never_asked(), Box::new(FixedText(None)))
}

fn confirming_board<K: KeyValueStore>(
    kv: K,
    cfg: &Config,
    yes: bool,
) -> anyhow::Result<CliBoard<K>> {
    let confirm: Box<dyn Confirm> = if yes || !cfg.confirm_enabled()? {
        Box::new(AlwaysConfirm(true))
    } else {
        Box::new(Terminal::new(io::stdin().lock(), io::stderr()))
    };
    Ok(Board::new(TaskStore::open(kv), confirm, Box::new(FixedText(None))))
}
