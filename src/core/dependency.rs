//! Dependency readiness checks.

use super::task::{TaskId, TaskMetadata, TaskStatus};

/// Dependency state of a pending task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Every dependency completed.
    Ready,
    /// Waiting on dependencies that have not terminated yet.
    Waiting(Vec<TaskId>),
    /// At least one dependency terminated without completing.
    Doomed(Vec<TaskId>),
}

/// Classify a task against the statuses of terminated tasks.
///
/// `terminal` returns the status of a terminated task, or `None` if the task
/// is still pending or running.
pub fn readiness<F>(meta: &TaskMetadata, terminal: F) -> Readiness
where
    F: Fn(&str) -> Option<TaskStatus>,
{
    let mut waiting = Vec::new();
    let mut doomed = Vec::new();

    for dep in &meta.dependencies {
        match terminal(dep.as_str()) {
            Some(TaskStatus::Completed) => {}
            Some(TaskStatus::Failed | TaskStatus::Cancelled) => doomed.push(dep.clone()),
            _ => waiting.push(dep.clone()),
        }
    }

    if !doomed.is_empty() {
        Readiness::Doomed(doomed)
    } else if !waiting.is_empty() {
        Readiness::Waiting(waiting)
    } else {
        Readiness::Ready
    }
}

/// Position of the first task in `pending` whose dependencies all completed.
///
/// Returns `None` when nothing qualifies, even if `pending` is non-empty; the
/// caller should then wait for in-flight work instead of spinning.
pub fn next_runnable<'a, I, F>(pending: I, terminal: F) -> Option<usize>
where
    I: IntoIterator<Item = &'a TaskMetadata>,
    F: Fn(&str) -> Option<TaskStatus>,
{
    pending
        .into_iter()
        .position(|meta| readiness(meta, &terminal) == Readiness::Ready)
}

/// Positions of pending tasks that can never become ready.
pub fn doomed<'a, I, F>(pending: I, terminal: F) -> Vec<usize>
where
    I: IntoIterator<Item = &'a TaskMetadata>,
    F: Fn(&str) -> Option<TaskStatus>,
{
    pending
        .into_iter()
        .enumerate()
        .filter(|(_, meta)| matches!(readiness(meta, &terminal), Readiness::Doomed(_)))
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::TaskProfile;
    use std::collections::HashMap;

    fn meta(id: &str, deps: &[&str]) -> TaskMetadata {
        TaskMetadata::new(id, TaskProfile::default(), 0)
            .with_dependencies(deps.iter().map(|d| (*d).to_string()).collect())
    }

    fn lookup(map: &HashMap<String, TaskStatus>) -> impl Fn(&str) -> Option<TaskStatus> + '_ {
        move |id: &str| map.get(id).copied()
    }

    #[test]
    fn test_no_dependencies_is_ready() {
        let terminal = HashMap::new();
        assert_eq!(readiness(&meta("a", &[]), lookup(&terminal)), Readiness::Ready);
    }

    #[test]
    fn test_skips_blocked_head_of_queue() {
        let pending = vec![meta("b", &["a"]), meta("c", &[])];
        let terminal = HashMap::new();
        assert_eq!(next_runnable(&pending, lookup(&terminal)), Some(1));
    }

    #[test]
    fn test_completed_dependency_unblocks() {
        let pending = vec![meta("b", &["a"])];
        let mut terminal = HashMap::new();
        terminal.insert("a".to_string(), TaskStatus::Completed);
        assert_eq!(next_runnable(&pending, lookup(&terminal)), Some(0));
    }

    #[test]
    fn test_failed_dependency_never_unblocks() {
        let pending = vec![meta("b", &["a"])];
        let mut terminal = HashMap::new();
        terminal.insert("a".to_string(), TaskStatus::Failed);
        assert_eq!(next_runnable(&pending, lookup(&terminal)), None);
        assert_eq!(
            readiness(&pending[0], lookup(&terminal)),
            Readiness::Doomed(vec!["a".to_string()])
        );
        assert_eq!(doomed(&pending, lookup(&terminal)), vec![0]);
    }

    #[test]
    fn test_partial_dependencies_wait() {
        let m = meta("c", &["a", "b"]);
        let mut terminal = HashMap::new();
        terminal.insert("a".to_string(), TaskStatus::Completed);
        assert_eq!(
            readiness(&m, lookup(&terminal)),
            Readiness::Waiting(vec!["b".to_string()])
        );
    }

    #[test]
    fn test_empty_queue() {
        let pending: Vec<TaskMetadata> = Vec::new();
        assert_eq!(next_runnable(&pending, |_: &str| None), None);
    }
}
