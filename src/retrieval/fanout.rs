//! Index-addressed task group with first-error-wins semantics.

use std::future::Future;
use tokio::task::JoinSet;

/// Why a [`TaskGroup`] failed.
#[derive(Debug)]
pub enum GroupError<E> {
    /// Task `index` returned an error
    Failed { index: usize, error: E },
    /// A task panicked
    Panicked { message: String },
    /// Task `index` finished without producing a value
    MissingResult { index: usize },
}

/// Runs independent tasks concurrently and collects their outputs by spawn
/// position.
///
/// Slot `i` of the joined output always holds the value of the `i`-th spawned
/// task, whatever order the tasks complete in. The first failure aborts every
/// sibling still running; `join` returns once all tasks have finished or been
/// aborted. Dropping the group aborts all of its tasks.
pub struct TaskGroup<T, E> {
    set: JoinSet<(usize, Result<T, E>)>,
    len: usize,
}

impl<T, E> TaskGroup<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            set: JoinSet::new(),
            len: 0,
        }
    }

    /// Spawns `task` into the next slot and returns that slot's index.
    pub fn spawn<F>(&mut self, task: F) -> usize
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let index = self.len;
        self.len += 1;
        self.set.spawn(async move { (index, task.await) });
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub async fn join(mut self) -> Result<Vec<T>, GroupError<E>> {
        let mut slots: Vec<Option<T>> = (0..self.len).map(|_| None).collect();
        let mut failure: Option<GroupError<E>> = None;

        while let Some(joined) = self.set.join_next().await {
            let error = match joined {
                Ok((index, Ok(value))) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(value);
                    }
                    continue;
                }
                Ok((index, Err(error))) => GroupError::Failed { index, error },
                Err(e) if e.is_cancelled() => continue,
                Err(e) => GroupError::Panicked {
                    message: e.to_string(),
                },
            };

            if failure.is_none() {
                failure = Some(error);
                self.set.abort_all();
            }
        }

        if let Some(error) = failure {
            return Err(error);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(GroupError::MissingResult { index }))
            .collect()
    }
}

impl<T, E> Default for TaskGroup<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_spawn_order() {
        let mut group: TaskGroup<usize, String> = TaskGroup::new();
        for (i, delay) in [30u64, 0, 15].into_iter().enumerate() {
            group.spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(i * 10)
            });
        }
        assert_eq!(group.len(), 3);
        assert_eq!(group.join().await.unwrap(), vec![0, 10, 20]);
    }

    #[tokio::test]
    async fn test_empty_group() {
        let group: TaskGroup<(), ()> = TaskGroup::default();
        assert!(group.is_empty());
        assert!(group.join().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_error_aborts_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group: TaskGroup<(), &'static str> = TaskGroup::new();

        for _ in 0..2 {
            let finished = finished.clone();
            group.spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        group.spawn(async { Err("boom") });

        let started = std::time::Instant::now();
        match group.join().await {
            Err(GroupError::Failed { index, error }) => {
                assert_eq!(index, 2);
                assert_eq!(error, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_earliest_failure_is_reported() {
        let mut group: TaskGroup<(), usize> = TaskGroup::new();
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err(0)
        });
        group.spawn(async { Err(1) });

        assert!(matches!(
            group.join().await,
            Err(GroupError::Failed { index: 1, error: 1 })
        ));
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let mut group: TaskGroup<(), ()> = TaskGroup::new();
        group.spawn(async {
            if true {
                panic!("task blew up");
            }
            Ok(())
        });
        assert!(matches!(
            group.join().await,
            Err(GroupError::Panicked { .. })
        ));
    }
}
