//! In-memory list state and the filtered views shown over it.
//!
//! The board keeps the records fetched from the CMS and applies local edits
//! (create, update, delete) without refetching. Views are computed on demand
//! for a given day so overdue checks stay deterministic.

use std::str::FromStr;

use chrono::NaiveDate;

use crate::types::{priority_rank, Todo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Completed,
    Overdue,
}

impl FilterMode {
    fn accepts(self, todo: &Todo, today: NaiveDate) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !todo.is_completed,
            FilterMode::Completed => todo.is_completed,
            FilterMode::Overdue => todo.is_overdue(today),
        }
    }

    pub fn empty_message(self) -> &'static str {
        match self {
            FilterMode::All => "No todos yet. Create your first todo!",
            FilterMode::Active => "No active todos",
            FilterMode::Completed => "No completed todos",
            FilterMode::Overdue => "No overdue todos",
        }
    }

    /// Whether overdue items are pulled out above the main list.
    fn highlights_overdue(self) -> bool {
        matches!(self, FilterMode::All | FilterMode::Active)
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(FilterMode::All),
            "active" => Ok(FilterMode::Active),
            "completed" => Ok(FilterMode::Completed),
            "overdue" => Ok(FilterMode::Overdue),
            other => Err(format!("unknown filter mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone)]
pub struct BoardView<'a> {
    pub mode: FilterMode,
    pub highlighted_overdue: Vec<&'a Todo>,
    pub items: Vec<&'a Todo>,
    pub counts: Counts,
}

impl BoardView<'_> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn empty_message(&self) -> &'static str {
        self.mode.empty_message()
    }
}

/// Todos fetched for the signed-in user, newest first.
#[derive(Debug, Clone, Default)]
pub struct TodoBoard {
    todos: Vec<Todo>,
}

impl TodoBoard {
    pub fn new(todos: Vec<Todo>) -> Self {
        Self { todos }
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    /// A freshly created todo goes to the top.
    pub fn prepend(&mut self, todo: Todo) {
        self.todos.insert(0, todo);
    }

    /// Replace the record with the same document id. Returns false when no
    /// such record is on the board.
    pub fn replace(&mut self, todo: Todo) -> bool {
        match self
            .todos
            .iter_mut()
            .find(|existing| existing.document_id == todo.document_id)
        {
            Some(slot) => {
                *slot = todo;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, document_id: &str) -> bool {
        let before = self.todos.len();
        self.todos.retain(|todo| todo.document_id != document_id);
        self.todos.len() != before
    }

    pub fn counts(&self, today: NaiveDate) -> Counts {
        let mut counts = Counts {
            all: self.todos.len(),
            ..Counts::default()
        };
        for todo in &self.todos {
            if todo.is_completed {
                counts.completed += 1;
            } else {
                counts.active += 1;
                if todo.is_overdue(today) {
                    counts.overdue += 1;
                }
            }
        }
        counts
    }

    pub fn view(&self, mode: FilterMode, today: NaiveDate) -> BoardView<'_> {
        let highlighted_overdue = if mode.highlights_overdue() {
            self.todos.iter().filter(|t| t.is_overdue(today)).collect()
        } else {
            Vec::new()
        };

        let mut items: Vec<&Todo> = self
            .todos
            .iter()
            .filter(|t| mode.accepts(t, today))
            .collect();
        // Stable sorts, so equal keys keep board order.
        if mode == FilterMode::Overdue {
            items.sort_by_key(|t| t.due_date);
        } else {
            items.sort_by_key(|t| std::cmp::Reverse(priority_rank(t.priority)));
        }

        BoardView {
            mode,
            highlighted_overdue,
            items,
            counts: self.counts(today),
        }
    }
}
