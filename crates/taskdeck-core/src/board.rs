use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::kv::KeyValueStore;
use crate::prompt::{
    CLEAR_ALL_MESSAGE, CLEAR_COMPLETED_MESSAGE, Confirm, DELETE_MESSAGE, EDIT_LABEL, TextPrompt,
};
use crate::query::{PriorityFilter, Query, Stats, StatusFilter, query};
use crate::store::TaskStore;
use crate::task::{Priority, Task};

/// What a user-facing operation ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The user said no, or cancelled the prompt.
    Declined,
    /// Nothing to do: unknown id, blank text, or nothing matched.
    Unchanged,
}

/// One interactive session: the store, the active view and the dialogs that
/// guard destructive actions.
pub struct Board<K, C, P> {
    store: TaskStore<K>,
    confirm: C,
    prompt: P,
    query: Query,
}

impl<K, C, P> Board<K, C, P>
where
    K: KeyValueStore,
    C: Confirm,
    P: TextPrompt,
{
    pub fn new(store: TaskStore<K>, confirm: C, prompt: P) -> Self {
        Self {
            store,
            confirm,
            prompt,
            query: Query::default(),
        }
    }

    pub fn store(&self) -> &TaskStore<K> {
        &self.store
    }

    pub fn into_store(self) -> TaskStore<K> {
        self.store
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn set_query(&mut self, query: Query) {
        self.query = query;
    }

    pub fn set_search(&mut self, search: &str) {
        self.query.search = search.to_string();
    }

    pub fn set_priority_filter(&mut self, filter: PriorityFilter) {
        self.query.priority = filter;
    }

    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.query.status = filter;
    }

    pub fn toggle_sort_direction(&mut self) {
        self.query.sort = self.query.sort.flipped();
        debug!(ascending = self.query.sort.ascending, "sort direction flipped");
    }

    /// Tasks to show, in display order, under the current view.
    pub fn visible(&self) -> Vec<Task> {
        query(self.store.tasks(), &self.query)
    }

    pub fn stats(&self) -> Stats {
        self.store.stats()
    }

    #[instrument(skip(self, text, now))]
    pub fn add(
        &mut self,
        text: &str,
        due_date: Option<NaiveDate>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Task>> {
        self.store.create(text, due_date, priority, now)
    }

    #[instrument(skip(self))]
    pub fn toggle(&mut self, id: u64) -> anyhow::Result<Outcome> {
        Ok(applied_if(self.store.toggle(id)?))
    }

    #[instrument(skip(self, now))]
    pub fn edit(&mut self, id: u64, now: DateTime<Utc>) -> anyhow::Result<Outcome> {
        let Some(current) = self.store.get(id).map(|t| t.text.clone()) else {
            return Ok(Outcome::Unchanged);
        };

        let Some(new_text) = self.prompt.prompt_text(EDIT_LABEL, &current) else {
            info!("edit cancelled");
            return Ok(Outcome::Declined);
        };

        Ok(applied_if(self.store.edit(id, &new_text, now)?))
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, id: u64) -> anyhow::Result<Outcome> {
        if !self.confirm.confirm(DELETE_MESSAGE) {
            info!("delete declined");
            return Ok(Outcome::Declined);
        }
        Ok(applied_if(self.store.delete(id)?))
    }

    #[instrument(skip(self))]
    pub fn clear_completed(&mut self) -> anyhow::Result<Outcome> {
        if !self.confirm.confirm(CLEAR_COMPLETED_MESSAGE) {
            info!("clear completed declined");
            return Ok(Outcome::Declined);
        }
        Ok(applied_if(self.store.clear_completed()? > 0))
    }

    #[instrument(skip(self))]
    pub fn clear_all(&mut self) -> anyhow::Result<Outcome> {
        if !self.confirm.confirm(CLEAR_ALL_MESSAGE) {
            info!("clear all declined");
            return Ok(Outcome::Declined);
        }
        Ok(applied_if(self.store.clear_all()? > 0))
    }
}

fn applied_if(changed: bool) -> Outcome {
    if changed {
        Outcome::Applied
    } else {
        Outcome::Unchanged
    }
}
