use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Status, Task};

/// Ordered sequence of tasks with a cursor marking the one currently due.
/// `task_names` mirrors `tasks` for O(1) membership checks and is kept in
/// sync on construction; steps themselves are immutable after creation,
/// only their statuses and cursor move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub tasks: Vec<Task>,
    pub status: Status,
    pub current_task_index: usize,
    pub task_names: HashSet<String>,
}

impl Step {
    /// A step is never empty: given no tasks it holds a single task named
    /// after the step itself.
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        let name = name.into();
        let tasks = if tasks.is_empty() {
            vec![Task::new(name.clone())]
        } else {
            tasks
        };
        let task_names = tasks.iter().map(|t| t.name.clone()).collect();
        Self {
            name,
            tasks,
            status: Status::NotCompleted,
            current_task_index: 0,
            task_names,
        }
    }

    pub fn current_task(&self) -> &Task {
        &self.tasks[self.current_task_index]
    }

    pub fn current_task_mut(&mut self) -> &mut Task {
        &mut self.tasks[self.current_task_index]
    }

    pub fn has_task(&self, task_name: &str) -> bool {
        self.task_names.contains(task_name)
    }
}
