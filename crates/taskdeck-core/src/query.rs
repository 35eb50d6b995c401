use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::{
  Priority,
  Task
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Only(Priority)
}

impl PriorityFilter {
  fn accepts(
    self,
    task: &Task
  ) -> bool {
    match self {
      | PriorityFilter::All => true,
      | PriorityFilter::Only(p) => {
        task.priority == p
      }
    }
  }
}

impl FromStr for PriorityFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case("all")
    {
      return Ok(PriorityFilter::All);
    }
    s.parse::<Priority>()
      .map(PriorityFilter::Only)
  }
}

impl fmt::Display for PriorityFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | PriorityFilter::All => {
        f.write_str("all")
      }
      | PriorityFilter::Only(p) => {
        write!(f, "{p}")
      }
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum StatusFilter {
  #[default]
  All,
  Completed,
  Pending
}

impl StatusFilter {
  fn accepts(
    self,
    task: &Task
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Completed => {
        task.completed
      }
      | StatusFilter::Pending => {
        !task.completed
      }
    }
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(StatusFilter::All),
      | "completed" | "done" => {
        Ok(StatusFilter::Completed)
      }
      | "pending" => {
        Ok(StatusFilter::Pending)
      }
      | other => {
        Err(anyhow!(
          "invalid status filter: \
           {other} (expected all, \
           completed or pending)"
        ))
      }
    }
  }
}

impl fmt::Display for StatusFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | StatusFilter::All => "all",
      | StatusFilter::Completed => {
        "completed"
      }
      | StatusFilter::Pending => {
        "pending"
      }
    })
  }
}

/// Display order. The default (not
/// ascending) puts high priority first
/// and, within a priority, the newest
/// task first.
///
/// `ascending` reverses the whole
/// comparison, priority included.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub struct SortOrder {
  pub ascending: bool
}

impl SortOrder {
  pub fn compare(
    self,
    a: &Task,
    b: &Task
  ) -> Ordering {
    let ordering = b
      .priority
      .rank()
      .cmp(&a.priority.rank())
      .then_with(|| {
        b.created_at.cmp(&a.created_at)
      });

    if self.ascending {
      ordering.reverse()
    } else {
      ordering
    }
  }

  #[must_use]
  pub fn flipped(self) -> Self {
    Self {
      ascending: !self.ascending
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub struct Query {
  pub search:   String,
  pub priority: PriorityFilter,
  pub status:   StatusFilter,
  pub sort:     SortOrder
}

impl Query {
  fn matches_with_needle(
    &self,
    task: &Task,
    needle_lower: &str
  ) -> bool {
    task.matches_text(needle_lower)
      && self.priority.accepts(task)
      && self.status.accepts(task)
  }
}

/// Filters and orders `tasks` for
/// display. The input is left untouched;
/// the result is a fresh copy.
#[tracing::instrument(skip(
  tasks, query
), fields(
  total = tasks.len(),
  search = %query.search,
  priority = %query.priority,
  status = %query.status,
  ascending = query.sort.ascending
))]
pub fn query(
  tasks: &[Task],
  query: &Query
) -> Vec<Task> {
  let needle =
    query.search.to_lowercase();

  let mut out: Vec<Task> = tasks
    .iter()
    .filter(|task| {
      query.matches_with_needle(
        task, &needle
      )
    })
    .cloned()
    .collect();

  out.sort_by(|a, b| {
    query.sort.compare(a, b)
  });

  trace!(
    visible = out.len(),
    "query evaluated"
  );
  out
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub struct Stats {
  pub total:     usize,
  pub completed: usize,
  pub pending:   usize
}

impl Stats {
  pub fn of(tasks: &[Task]) -> Self {
    let total = tasks.len();
    let completed = tasks
      .iter()
      .filter(|t| t.completed)
      .count();
    Self {
      total,
      completed,
      pending: total - completed
    }
  }
}
