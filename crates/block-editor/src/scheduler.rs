use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::BlockId;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

/// Work a block editor defers to a later tick of the host loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredTask {
    /// Read the settled selection and derive the toolbar snapshot.
    SettleSelection { block: BlockId },
    /// End of the blur grace window. `format_epoch` is the dispatcher's
    /// format epoch when the blur happened.
    BlurGrace { block: BlockId, format_epoch: u64 },
    /// Give up the focused-block pointer.
    ReleaseFocus { block: BlockId },
}

impl DeferredTask {
    pub fn block(&self) -> &BlockId {
        match self {
            DeferredTask::SettleSelection { block }
            | DeferredTask::BlurGrace { block, .. }
            | DeferredTask::ReleaseFocus { block } => block,
        }
    }
}

#[derive(Debug)]
struct Scheduled {
    id: TaskId,
    due: Instant,
    token: CancellationToken,
    task: DeferredTask,
}

/// Timer queue driven by the host loop: nothing runs until [`Scheduler::run_due`].
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    tasks: Vec<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(
        &mut self,
        now: Instant,
        delay: Duration,
        token: &CancellationToken,
        task: DeferredTask,
    ) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        trace!(?task, delay_ms = delay.as_millis() as u64, "task scheduled");
        self.tasks.push(Scheduled {
            id,
            due: now + delay,
            token: token.clone(),
            task,
        });
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|scheduled| scheduled.id != id);
        self.tasks.len() != before
    }

    /// Removes every task due at `now`, returning the live ones in due order.
    /// Tasks whose token was cancelled are dropped.
    pub fn run_due(&mut self, now: Instant) -> Vec<DeferredTask> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.tasks).into_iter().partition(|s| s.due <= now);
        self.tasks = pending;
        due.sort_by_key(|s| (s.due, s.id));

        due.into_iter()
            .filter_map(|scheduled| {
                if scheduled.token.is_cancelled() {
                    trace!(task = ?scheduled.task, "dropping cancelled task");
                    return None;
                }
                Some(scheduled.task)
            })
            .collect()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.tasks.iter().map(|s| s.due).min()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(block: &str) -> DeferredTask {
        DeferredTask::SettleSelection {
            block: BlockId::from(block),
        }
    }

    #[test]
    fn runs_only_due_tasks_in_due_order() {
        let start = Instant::now();
        let token = CancellationToken::new();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(start, Duration::from_millis(150), &token, settle("late"));
        scheduler.schedule(start, Duration::from_millis(10), &token, settle("early"));

        assert!(scheduler.run_due(start + Duration::from_millis(5)).is_empty());
        assert_eq!(
            scheduler.run_due(start + Duration::from_millis(10)),
            vec![settle("early")]
        );
        assert_eq!(scheduler.next_due(), Some(start + Duration::from_millis(150)));
        assert_eq!(
            scheduler.run_due(start + Duration::from_secs(1)),
            vec![settle("late")]
        );
        assert!(scheduler.is_empty());
    }

    #[test]
    fn cancelled_tokens_drop_their_tasks() {
        let start = Instant::now();
        let alive = CancellationToken::new();
        let dead = CancellationToken::new();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(start, Duration::ZERO, &dead, settle("a"));
        scheduler.schedule(start, Duration::ZERO, &alive, settle("b"));

        dead.clone().cancel();

        assert_eq!(scheduler.run_due(start), vec![settle("b")]);
    }

    #[test]
    fn cancel_by_id() {
        let start = Instant::now();
        let token = CancellationToken::new();
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(start, Duration::ZERO, &token, settle("a"));

        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(scheduler.run_due(start).is_empty());
    }
}
