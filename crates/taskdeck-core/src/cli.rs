use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::query::{PriorityFilter, StatusFilter};
use crate::task::Priority;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "taskdeck: a small local task list",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    /// rc file to read instead of $TASKDECKRC or ~/.taskdeckrc.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the stored tasks.
    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task.
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// YYYY-MM-DD, today, tomorrow, +3d, +1w, or a weekday name.
        #[arg(long, short = 'd')]
        due: Option<String>,

        #[arg(long, short = 'p', value_parser = parse_priority)]
        priority: Option<Priority>,
    },
    /// Show tasks, filtered and sorted.
    List(ListArgs),
    /// Flip a task between pending and completed.
    #[command(alias = "done")]
    Toggle { id: u64 },
    /// Replace a task's text; prompts when --text is not given.
    Edit {
        id: u64,

        #[arg(long, short = 't')]
        text: Option<String>,
    },
    /// Delete one task.
    #[command(alias = "rm")]
    Delete {
        id: u64,

        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Delete every completed task.
    ClearCompleted {
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Delete every task.
    ClearAll {
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print total, completed and pending counts.
    Stats,
    /// Print the stored snapshot as JSON.
    Export,
    /// Show or change the colour theme.
    Theme {
        #[arg(value_enum)]
        action: Option<ThemeAction>,
    },
    /// Print the effective configuration.
    Show,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long, short = 's', default_value = "")]
    pub search: String,

    #[arg(long, short = 'p', default_value = "all", value_parser = parse_priority_filter)]
    pub priority: PriorityFilter,

    #[arg(long, default_value = "all", value_parser = parse_status_filter)]
    pub status: StatusFilter,

    /// Lowest priority and oldest first.
    #[arg(long, conflicts_with = "desc")]
    pub asc: bool,

    /// Highest priority and newest first.
    #[arg(long)]
    pub desc: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
    Light,
    Dark,
    Toggle,
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn parse_priority_filter(s: &str) -> Result<PriorityFilter, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn parse_status_filter(s: &str) -> Result<StatusFilter, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` tokens out of the
/// argument list before clap sees them.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, ThemeAction, preprocess_args};
    use crate::query::{PriorityFilter, StatusFilter};
    use crate::task::Priority;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&["taskdeck", "rc.confirm:off", "list", "rc.color=on"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["taskdeck", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.confirm".to_string(), "off".to_string()),
                ("rc.color".to_string(), "on".to_string()),
            ]
        );
    }

    #[test]
    fn add_collects_words_and_options() {
        let cli = GlobalCli::try_parse_from([
            "taskdeck", "add", "buy", "milk", "--due", "tomorrow", "-p", "high",
        ])
        .expect("parse");
        let Some(Command::Add {
            text,
            due,
            priority,
        }) = cli.command
        else {
            panic!("expected add");
        };
        assert_eq!(text, vec!["buy", "milk"]);
        assert_eq!(due.as_deref(), Some("tomorrow"));
        assert_eq!(priority, Some(Priority::High));
    }

    #[test]
    fn list_parses_filters() {
        let cli = GlobalCli::try_parse_from([
            "taskdeck", "-v", "list", "--priority", "medium", "--status", "pending", "--asc",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 1);
        let Some(Command::List(args)) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.priority, PriorityFilter::Only(Priority::Medium));
        assert_eq!(args.status, StatusFilter::Pending);
        assert!(args.asc);
    }

    #[test]
    fn rejects_bad_filters_and_conflicting_sort() {
        assert!(GlobalCli::try_parse_from(["taskdeck", "list", "--status", "open"]).is_err());
        assert!(GlobalCli::try_parse_from(["taskdeck", "list", "--asc", "--desc"]).is_err());
        assert!(GlobalCli::try_parse_from(["taskdeck", "add"]).is_err());
    }

    #[test]
    fn done_is_an_alias_for_toggle() {
        let cli = GlobalCli::try_parse_from(["taskdeck", "done", "17"]).expect("parse");
        assert!(matches!(cli.command, Some(Command::Toggle { id: 17 })));

        let cli = GlobalCli::try_parse_from(["taskdeck", "theme", "toggle"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Command::Theme {
                action: Some(ThemeAction::Toggle)
            })
        ));
    }
}
