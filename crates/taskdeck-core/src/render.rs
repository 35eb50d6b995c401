use std::io::{self, IsTerminal, Write};

use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{DUE_DATE_FORMAT, format_display_date, parse_timezone};
use crate::query::Stats;
use crate::task::{Priority, Task};
use crate::theme::Theme;

/// ANSI codes for one theme.
#[derive(Debug, Clone, Copy)]
struct Palette {
    id: &'static str,
    high: &'static str,
    medium: &'static str,
    low: &'static str,
    done: &'static str,
}

const LIGHT: Palette = Palette {
    id: "34",
    high: "31",
    medium: "33",
    low: "32",
    done: "90",
};

const DARK: Palette = Palette {
    id: "96",
    high: "91",
    medium: "93",
    low: "92",
    done: "37",
};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    palette: Palette,
    timezone: Option<Tz>,
}

impl Renderer {
    pub fn new(cfg: &Config, theme: Theme) -> anyhow::Result<Self> {
        let color = cfg.color_enabled()? && io::stdout().is_terminal();
        let timezone = parse_timezone(cfg.get("timezone").as_deref());
        Ok(Self::plain(timezone).with_color(color, theme))
    }

    /// Colourless renderer; what tests and pipes get.
    pub fn plain(timezone: Option<Tz>) -> Self {
        Self {
            color: false,
            palette: LIGHT,
            timezone,
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: bool, theme: Theme) -> Self {
        self.color = color;
        self.palette = match theme {
            Theme::Light => LIGHT,
            Theme::Dark => DARK,
        };
        self
    }

    #[tracing::instrument(skip(self, out, tasks), fields(count = tasks.len()))]
    pub fn write_task_table<W: Write>(&self, mut out: W, tasks: &[Task]) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "Done", "Priority", "Due", "Created", "Edited", "Task"]
            .map(str::to_string)
            .to_vec();

        let rows = tasks
            .iter()
            .map(|task| {
                let done = if task.completed { "x" } else { "" };
                let due = task
                    .due_date
                    .map(|d| d.format(DUE_DATE_FORMAT).to_string())
                    .unwrap_or_else(|| "No due date".to_string());
                let created = format_display_date(task.created_at, self.timezone.as_ref());
                let edited = task
                    .last_edited_at
                    .map(|dt| format_display_date(dt, self.timezone.as_ref()))
                    .unwrap_or_default();
                let text = if task.completed {
                    self.paint(&task.text, self.palette.done)
                } else {
                    task.text.clone()
                };

                vec![
                    self.paint(&task.id.to_string(), self.palette.id),
                    done.to_string(),
                    self.paint(task.priority.as_str(), self.priority_color(task.priority)),
                    due,
                    created,
                    edited,
                    text,
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: Stats) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} total, {} completed, {} pending",
            stats.total, stats.completed, stats.pending
        )?;
        Ok(())
    }

    pub fn timezone(&self) -> Option<&Tz> {
        self.timezone.as_ref()
    }

    fn priority_color(&self, priority: Priority) -> &'static str {
        match priority {
            Priority::High => self.palette.high,
            Priority::Medium => self.palette.medium,
            Priority::Low => self.palette.low,
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| visible_width(h)).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(visible_width(cell));
        }
    }

    let last = widths.len().saturating_sub(1);
    let write_row = |writer: &mut W, cells: &[String]| -> anyhow::Result<()> {
        for (idx, (cell, width)) in cells.iter().zip(&widths).enumerate() {
            if idx == last {
                write!(writer, "{cell}")?;
            } else {
                let padding = width.saturating_sub(visible_width(cell));
                write!(writer, "{cell}{}  ", " ".repeat(padding))?;
            }
        }
        writeln!(writer)?;
        Ok(())
    };

    write_row(&mut *writer, &headers)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(&mut *writer, &rule)?;
    for row in &rows {
        write_row(&mut *writer, row)?;
    }

    Ok(())
}

fn visible_width(cell: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(cell).as_str())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Renderer, strip_ansi};
    use crate::query::Stats;
    use crate::task::{Priority, Task};
    use crate::theme::Theme;

    fn render(renderer: &Renderer, tasks: &[Task]) -> String {
        let mut buf = Vec::<u8>::new();
        renderer.write_task_table(&mut buf, tasks).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn table_lists_tasks_in_given_order() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 16, 12, 0, 0)
            .single()
            .expect("valid now");
        let mut first = Task::new(
            2,
            "Ship release".to_string(),
            NaiveDate::from_ymd_opt(2026, 3, 1),
            Priority::High,
            now,
        );
        first.completed = true;
        let second = Task::new(1, "Write notes".to_string(), None, Priority::Low, now);

        let out = render(&Renderer::plain(Some(chrono_tz::UTC)), &[first, second]);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[0].ends_with("Task"));
        assert!(lines[2].starts_with("2 "));
        assert!(lines[2].contains("high"));
        assert!(lines[2].contains("2026-03-01"));
        assert!(lines[2].contains("2026-02-16"));
        assert!(lines[2].ends_with("Ship release"));
        assert!(lines[3].contains("No due date"));
        assert!(lines[3].ends_with("Write notes"));
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(render(&Renderer::plain(None), &[]), "No tasks.\n");
    }

    #[test]
    fn colour_does_not_break_alignment() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 16, 12, 0, 0)
            .single()
            .expect("valid now");
        let tasks = vec![
            Task::new(10, "a".to_string(), None, Priority::Medium, now),
            Task::new(2, "b".to_string(), None, Priority::High, now),
        ];
        let plain = render(&Renderer::plain(Some(chrono_tz::UTC)), &tasks);
        let painted = render(
            &Renderer::plain(Some(chrono_tz::UTC)).with_color(true, Theme::Dark),
            &tasks,
        );
        assert_ne!(plain, painted);
        assert_eq!(strip_ansi(&painted), plain);
    }

    #[test]
    fn stats_line() {
        let mut buf = Vec::<u8>::new();
        Renderer::plain(None)
            .write_stats(
                &mut buf,
                Stats {
                    total: 3,
                    completed: 1,
                    pending: 2,
                },
            )
            .expect("render");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "3 total, 1 completed, 2 pending\n"
        );
    }
}
