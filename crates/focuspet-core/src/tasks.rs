//! Personal task list.
//!
//! Tasks are plain to-dos with a priority and a category. They earn no
//! currency; completion counts feed the focus score in [`crate::progress`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::error::{Result, StateConflictError, ValidationError};
use crate::events::Event;

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Work,
    Study,
    Personal,
    Health,
}

/// Which tasks a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    All,
    Pending,
    Completed,
    HighPriority,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Pending => !task.completed,
            TaskFilter::Completed => task.completed,
            TaskFilter::HighPriority => task.priority == TaskPriority::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub priority: TaskPriority,
    pub category: TaskCategory,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    /// Rounded percentage, 0 for an empty list.
    pub completion_rate: u32,
}

/// One user's tasks in creation order. Ids are never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    next_id: TaskId,
    #[serde(default)]
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn filter(&self, filter: TaskFilter) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| filter.matches(t))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn stats(&self) -> TaskStats {
        let total = self.tasks.len();
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        let completion_rate = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        };
        TaskStats {
            total,
            completed,
            completion_rate,
        }
    }

    /// # Errors
    /// [`ValidationError::InvalidValue`] if the title is blank.
    pub fn add(
        &mut self,
        title: &str,
        priority: TaskPriority,
        category: TaskCategory,
        clock: &dyn Clock,
    ) -> Result<Event> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::invalid("title", "task title is empty").into());
        }
        let at = clock.now();
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push(Task {
            id,
            title: title.to_string(),
            priority,
            category,
            completed: false,
            created_at: at,
            completed_at: None,
        });
        debug!(task_id = id, ?priority, ?category, "task added");
        Ok(Event::TaskAdded {
            task_id: id,
            title: title.to_string(),
            at,
        })
    }

    /// Flip a task between pending and completed.
    pub fn toggle(&mut self, id: TaskId, clock: &dyn Clock) -> Result<Event> {
        let at = clock.now();
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StateConflictError::TaskNotFound { task_id: id })?;
        task.completed = !task.completed;
        task.completed_at = task.completed.then_some(at);
        Ok(Event::TaskToggled {
            task_id: id,
            completed: task.completed,
            at,
        })
    }

    pub fn delete(&mut self, id: TaskId, clock: &dyn Clock) -> Result<Event> {
        let position = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StateConflictError::TaskNotFound { task_id: id })?;
        self.tasks.remove(position);
        Ok(Event::TaskDeleted {
            task_id: id,
            at: clock.now(),
        })
    }

    /// Check a restored list: ids are unique and below the id cursor, and
    /// `completed_at` is set exactly for completed tasks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = std::collections::BTreeSet::new();
        for task in &self.tasks {
            if task.id >= self.next_id || !seen.insert(task.id) {
                return Err(ValidationError::invalid(
                    "tasks.id",
                    format!("task id {} is duplicated or ahead of {}", task.id, self.next_id),
                ));
            }
            if task.completed != task.completed_at.is_some() {
                return Err(ValidationError::invalid(
                    "tasks.completed_at",
                    format!("task {} completion stamp disagrees with its flag", task.id),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CoreError;

    fn list_with_three(clock: &ManualClock) -> TaskList {
        let mut list = TaskList::new();
        list.add("Read chapter 3", TaskPriority::High, TaskCategory::Study, clock)
            .unwrap();
        list.add("Stretch", TaskPriority::Low, TaskCategory::Health, clock)
            .unwrap();
        list.add("Reply to email", TaskPriority::Medium, TaskCategory::Work, clock)
            .unwrap();
        list
    }

    #[test]
    fn add_trims_and_rejects_blank_titles() {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let mut list = TaskList::new();
        let err = list
            .add("   ", TaskPriority::Low, TaskCategory::Personal, &clock)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(list.is_empty());

        list.add("  water plants ", TaskPriority::Low, TaskCategory::Personal, &clock)
            .unwrap();
        assert_eq!(list.get(0).unwrap().title, "water plants");
    }

    #[test]
    fn toggle_stamps_and_clears_completion() {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let mut list = list_with_three(&clock);
        clock.advance_secs(600);
        list.toggle(1, &clock).unwrap();
        let task = list.get(1).unwrap();
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(clock.now()));

        list.toggle(1, &clock).unwrap();
        assert_eq!(list.get(1).unwrap().completed_at, None);
    }

    #[test]
    fn missing_task_is_a_conflict() {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let mut list = list_with_three(&clock);
        list.delete(0, &clock).unwrap();
        for result in [list.toggle(0, &clock), list.delete(0, &clock)] {
            assert!(matches!(
                result,
                Err(CoreError::StateConflict(StateConflictError::TaskNotFound { task_id: 0 }))
            ));
        }
        // Ids are not reused after a delete.
        list.add("new", TaskPriority::Low, TaskCategory::Work, &clock)
            .unwrap();
        assert!(list.get(3).is_some());
    }

    #[test]
    fn filters_and_completion_rate() {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let mut list = list_with_three(&clock);
        assert_eq!(list.stats().completion_rate, 0);
        list.toggle(2, &clock).unwrap();

        let ids = |f| list.filter(f).map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids(TaskFilter::All), vec![0, 1, 2]);
        assert_eq!(ids(TaskFilter::Pending), vec![0, 1]);
        assert_eq!(ids(TaskFilter::Completed), vec![2]);
        assert_eq!(ids(TaskFilter::HighPriority), vec![0]);

        let stats = list.stats();
        assert_eq!((stats.total, stats.completed), (3, 1));
        assert_eq!(stats.completion_rate, 33);
        assert_eq!(TaskList::new().stats(), TaskStats::default());
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let list = list_with_three(&clock);
        assert!(list.validate().is_ok());

        let mut json = serde_json::to_value(&list).unwrap();
        json["tasks"][1]["id"] = 0.into();
        let tampered: TaskList = serde_json::from_value(json).unwrap();
        assert!(tampered.validate().is_err());
    }
}
