use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::codec;
use crate::datetime::stamp;
use crate::kv::{KeyValueStore, TASKS_KEY};
use crate::query::Stats;
use crate::task::{Priority, Task};

/// Owns the task collection and mirrors it to a [`KeyValueStore`].
///
/// Every mutation writes the full snapshot before returning.
#[derive(Debug)]
pub struct TaskStore<K> {
    kv: K,
    tasks: Vec<Task>,
}

impl<K: KeyValueStore> TaskStore<K> {
    #[tracing::instrument(skip(kv))]
    pub fn open(kv: K) -> Self {
        let mut store = Self { kv, tasks: vec![] };
        store.load();
        store
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn stats(&self) -> Stats {
        Stats::of(&self.tasks)
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Replaces the in-memory collection with the stored snapshot.
    ///
    /// Missing or unreadable data leaves an empty collection.
    #[tracing::instrument(skip(self))]
    pub fn load(&mut self) {
        self.tasks = match self.kv.get(TASKS_KEY) {
            Ok(Some(raw)) => match codec::decode(&raw) {
                Ok(tasks) => tasks,
                Err(err) => {
                    warn!(error = %err, "stored tasks unreadable; starting empty");
                    vec![]
                }
            },
            Ok(None) => {
                debug!("no stored tasks");
                vec![]
            }
            Err(err) => {
                warn!(error = %err, "failed to read stored tasks; starting empty");
                vec![]
            }
        };
        info!(count = self.tasks.len(), "loaded tasks");
    }

    #[tracing::instrument(skip(self), fields(count = self.tasks.len()))]
    pub fn persist(&mut self) -> anyhow::Result<()> {
        let current = self.tasks.clone();
        self.commit(current)
    }

    /// Stores `next` and only then makes it the in-memory collection, so a
    /// failed write leaves both sides as they were.
    fn commit(&mut self, next: Vec<Task>) -> anyhow::Result<()> {
        let raw = codec::encode(&next)?;
        self.kv
            .set(TASKS_KEY, &raw)
            .context("failed to persist tasks")?;
        self.tasks = next;
        Ok(())
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Ids follow the creation time in epoch millis, bumped past every id
    /// already in use.
    fn next_id(&self, now: DateTime<Utc>) -> u64 {
        let from_clock = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let floor = self
            .tasks
            .iter()
            .map(|t| t.id)
            .max()
            .map_or(0, |max| max.saturating_add(1));
        from_clock.max(floor)
    }

    #[tracing::instrument(skip(self, text, now))]
    pub fn create(
        &mut self,
        text: &str,
        due_date: Option<NaiveDate>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Task>> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring task with empty text");
            return Ok(None);
        }

        let now = stamp(now);
        let task = Task::new(self.next_id(now), text.to_string(), due_date, priority, now);
        let mut next = self.tasks.clone();
        next.push(task.clone());
        self.commit(next)?;

        info!(id = task.id, "task created");
        Ok(Some(task))
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle(&mut self, id: u64) -> anyhow::Result<bool> {
        let Some(idx) = self.position(id) else {
            debug!("toggle: no such task");
            return Ok(false);
        };
        let mut next = self.tasks.clone();
        next[idx].completed = !next[idx].completed;
        let completed = next[idx].completed;
        self.commit(next)?;

        info!(completed, "task toggled");
        Ok(true)
    }

    #[tracing::instrument(skip(self, new_text, now))]
    pub fn edit(&mut self, id: u64, new_text: &str, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let new_text = new_text.trim();
        if new_text.is_empty() {
            debug!("edit: empty text ignored");
            return Ok(false);
        }
        let Some(idx) = self.position(id) else {
            debug!("edit: no such task");
            return Ok(false);
        };

        let mut next = self.tasks.clone();
        next[idx].text = new_text.to_string();
        next[idx].last_edited_at = Some(stamp(now));
        self.commit(next)?;

        info!("task edited");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: u64) -> anyhow::Result<bool> {
        let next: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        let removed = next.len() != self.tasks.len();
        self.commit(next)?;

        info!(removed, "task delete");
        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> anyhow::Result<usize> {
        let next: Vec<Task> = self.tasks.iter().filter(|t| !t.completed).cloned().collect();
        let removed = self.tasks.len() - next.len();
        self.commit(next)?;

        info!(removed, remaining = self.tasks.len(), "cleared completed tasks");
        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_all(&mut self) -> anyhow::Result<usize> {
        let removed = self.tasks.len();
        self.commit(vec![])?;

        info!(removed, "cleared all tasks");
        Ok(removed)
    }
}
