use core::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{Instant, sleep_until};

/// Source of frame boundaries for the mutation watch.
///
/// Every mutation observed before `next_frame` resolves is folded into the
/// pass that runs right after it.
pub trait FrameClock: Send {
    fn next_frame(&mut self) -> BoxFuture<'_, ()>;
}

/// Fixed frame grid with a given time budget, anchored at construction.
///
/// Boundaries sit at `origin + n * budget`; waiting always lands on the next
/// boundary strictly after now, so a burst of mutations within one frame
/// shares a single boundary.
#[derive(Debug)]
pub struct FrameScheduler {
    budget: Duration,
    origin: Instant,
    /// Number of frame boundaries waited for.
    frames: u64,
}

impl FrameScheduler {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget: budget.max(Duration::from_millis(1)),
            origin: Instant::now(),
            frames: 0,
        }
    }

    /// Return the configured frame budget duration.
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// The first frame boundary strictly after `now`.
    pub fn boundary_after(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.origin).as_nanos();
        let budget = self.budget.as_nanos().max(1);
        let next = (elapsed / budget).saturating_add(1).saturating_mul(budget);
        let offset = u64::try_from(next).unwrap_or(u64::MAX);
        self.origin + Duration::from_nanos(offset)
    }
}

impl FrameClock for FrameScheduler {
    fn next_frame(&mut self) -> BoxFuture<'_, ()> {
        let deadline = self.boundary_after(Instant::now());
        self.frames = self.frames.saturating_add(1);
        Box::pin(sleep_until(deadline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn boundaries_follow_the_grid() {
        let scheduler = FrameScheduler::new(Duration::from_millis(16));
        let origin = Instant::now();
        assert_eq!(scheduler.boundary_after(origin), origin + Duration::from_millis(16));
        assert_eq!(
            scheduler.boundary_after(origin + Duration::from_millis(5)),
            origin + Duration::from_millis(16)
        );
        assert_eq!(
            scheduler.boundary_after(origin + Duration::from_millis(16)),
            origin + Duration::from_millis(32)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn next_frame_waits_for_the_boundary() {
        let mut scheduler = FrameScheduler::new(Duration::from_millis(10));
        let origin = Instant::now();
        tokio::time::sleep(Duration::from_millis(3)).await;
        scheduler.next_frame().await;
        let waited = Instant::now() - origin;
        assert!(waited >= Duration::from_millis(10), "{waited:?}");
        assert!(waited < Duration::from_millis(12), "{waited:?}");
        assert_eq!(scheduler.frames(), 1);
    }
}
