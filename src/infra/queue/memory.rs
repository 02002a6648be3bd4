//! In-memory pending queue.

use std::collections::VecDeque;

use crate::core::task::{Task, TaskMetadata};

/// Ordered pending queue backed by a deque.
///
/// The initial order comes from the admission scorer and is otherwise
/// preserved; retried tasks re-enter at the front. Admission removes by
/// position because the first *runnable* task need not be the head.
pub struct PendingQueue<C, R> {
    tasks: VecDeque<Task<C, R>>,
}

impl<C, R> PendingQueue<C, R> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Create a queue from tasks already in admission order.
    #[must_use]
    pub fn from_ordered(tasks: Vec<Task<C, R>>) -> Self {
        Self {
            tasks: tasks.into(),
        }
    }

    /// Put a task at the head of the queue. O(1).
    pub fn push_front(&mut self, task: Task<C, R>) {
        self.tasks.push_front(task);
    }

    /// Append a task at the tail. O(1).
    pub fn push_back(&mut self, task: Task<C, R>) {
        self.tasks.push_back(task);
    }

    /// Remove the task at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Task<C, R>> {
        self.tasks.remove(index)
    }

    /// Remove the tasks at `indices` (any order), returning them in queue order.
    pub fn remove_many(&mut self, indices: &[usize]) -> Vec<Task<C, R>> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let mut removed: Vec<Task<C, R>> = sorted
            .iter()
            .rev()
            .filter_map(|&idx| self.tasks.remove(idx))
            .collect();
        removed.reverse();
        removed
    }

    /// Remove every task, in queue order.
    pub fn drain_all(&mut self) -> Vec<Task<C, R>> {
        self.tasks.drain(..).collect()
    }

    /// Metadata of queued tasks, head first.
    pub fn metas(&self) -> impl Iterator<Item = &TaskMetadata> {
        self.tasks.iter().map(|t| &t.meta)
    }

    /// Queued tasks, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Task<C, R>> {
        self.tasks.iter()
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<C, R> Default for PendingQueue<C, R> {
    fn default() -> Self {
        Self::new()
    }
}
