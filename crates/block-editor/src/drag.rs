use std::time::{Duration, Instant};

use tracing::debug;

use crate::BlockId;

/// A drag that left its origin block for another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossBlockDrag {
    pub origin: BlockId,
    pub target: BlockId,
}

#[derive(Debug)]
struct ActiveDrag {
    origin: BlockId,
    last_sample: Option<Instant>,
    last_seen: Option<BlockId>,
    notified: Option<BlockId>,
}

/// Samples the block under the pointer during a primary-button drag.
///
/// Samples over the same block are throttled; a sample over a different block
/// than the previous one is taken at once. Each distinct target is reported
/// once.
#[derive(Debug)]
pub struct DragDetector {
    throttle: Duration,
    active: Option<ActiveDrag>,
}

impl DragDetector {
    pub fn new(throttle: Duration) -> Self {
        Self {
            throttle,
            active: None,
        }
    }

    pub fn begin(&mut self, origin: BlockId) {
        self.active = Some(ActiveDrag {
            origin,
            last_sample: None,
            last_seen: None,
            notified: None,
        });
    }

    pub fn origin(&self) -> Option<&BlockId> {
        self.active.as_ref().map(|drag| &drag.origin)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Feeds one pointer-move sample; `hovered` is the block under the pointer.
    pub fn sample(&mut self, now: Instant, hovered: Option<&BlockId>) -> Option<CrossBlockDrag> {
        let throttle = self.throttle;
        let drag = self.active.as_mut()?;

        let block_changed = hovered != drag.last_seen.as_ref();
        let throttled = drag
            .last_sample
            .is_some_and(|last| now.saturating_duration_since(last) < throttle);
        if throttled && !block_changed {
            return None;
        }
        drag.last_sample = Some(now);
        drag.last_seen = hovered.cloned();

        let target = hovered?;
        if *target == drag.origin || drag.notified.as_ref() == Some(target) {
            return None;
        }
        drag.notified = Some(target.clone());
        debug!(origin = %drag.origin, target = %target, "drag crossed into another block");
        Some(CrossBlockDrag {
            origin: drag.origin.clone(),
            target: target.clone(),
        })
    }

    /// Ends the drag, returning its origin.
    pub fn end(&mut self) -> Option<BlockId> {
        self.active.take().map(|drag| drag.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn throttles_samples_over_the_same_block() {
        let start = Instant::now();
        let a = BlockId::from("a");
        let b = BlockId::from("b");
        let mut detector = DragDetector::new(ms(100));
        detector.begin(a.clone());

        assert_eq!(detector.sample(start, Some(&a)), None);
        // Entering `b` bypasses the throttle.
        assert_eq!(
            detector.sample(start + ms(5), Some(&b)),
            Some(CrossBlockDrag {
                origin: a.clone(),
                target: b.clone()
            })
        );
        assert_eq!(detector.sample(start + ms(10), Some(&b)), None);
    }

    #[test]
    fn inactive_detector_ignores_samples() {
        let mut detector = DragDetector::new(ms(100));
        assert_eq!(detector.sample(Instant::now(), Some(&BlockId::from("b"))), None);
        assert_eq!(detector.end(), None);
    }
}
