//! Strategy arbiter
//!
//! Holds the strategies in priority order and resolves each frame to at most
//! one result: the first strategy that is `Ready` and reports a code wins.
//! Later strategies are not consulted once one succeeds.
use crate::camera::FrameHandle;
use crate::error::StrategyInitError;
use crate::strategy::{DecodeStrategy, InitProgress};
use crate::types::{DecodeResult, StrategyKind, StrategyState};

struct Slot {
    strategy: Box<dyn DecodeStrategy>,
    state: StrategyState,
}

impl Slot {
    fn apply(&mut self, outcome: Result<InitProgress, StrategyInitError>) -> StrategyState {
        self.state = match outcome {
            Ok(InitProgress::Ready) => StrategyState::Ready,
            Ok(InitProgress::Pending) => StrategyState::Initializing,
            Err(StrategyInitError::Unavailable(reason)) => {
                tracing::info!("Strategy '{}' unavailable: {}", self.strategy.name(), reason);
                StrategyState::Unavailable
            }
            Err(StrategyInitError::Failed(reason)) => {
                tracing::warn!("Strategy '{}' failed to initialize: {}", self.strategy.name(), reason);
                StrategyState::Failed
            }
        };
        self.state
    }
}

pub struct StrategyArbiter {
    slots: Vec<Slot>,
    /// State changes not yet collected by `drain_changes`
    changes: Vec<(&'static str, StrategyState)>,
}

impl StrategyArbiter {
    /// Order `strategies` by `order`. Kinds missing from `order` keep their
    /// relative position after the listed ones.
    pub fn new(strategies: Vec<Box<dyn DecodeStrategy>>, order: &[StrategyKind]) -> Self {
        let mut slots: Vec<Slot> = strategies
            .into_iter()
            .map(|strategy| Slot {
                strategy,
                state: StrategyState::Uninitialized,
            })
            .collect();

        slots.sort_by_key(|slot| {
            order
                .iter()
                .position(|kind| *kind == slot.strategy.kind())
                .unwrap_or(order.len())
        });

        let names: Vec<_> = slots.iter().map(|s| s.strategy.name()).collect();
        tracing::debug!("Strategy order: {}", names.join(" → "));

        Self {
            slots,
            changes: Vec::new(),
        }
    }

    /// Initialize every strategy that has not been tried yet.
    ///
    /// Memoized: a strategy is initialized at most once for the arbiter's
    /// lifetime, so `Failed` and `Unavailable` are permanent.
    pub fn initialize(&mut self) {
        for slot in &mut self.slots {
            if slot.state != StrategyState::Uninitialized {
                continue;
            }
            let outcome = slot.strategy.initialize();
            let state = slot.apply(outcome);
            self.changes.push((slot.strategy.name(), state));
        }
    }

    /// First-match-wins decode of one frame.
    ///
    /// Strategies still loading are polled without blocking and skipped until
    /// ready. Per-frame errors are logged and count as "nothing found".
    pub fn arbitrate(&mut self, frame: &FrameHandle) -> Option<DecodeResult> {
        for slot in &mut self.slots {
            if slot.state == StrategyState::Initializing {
                let outcome = slot.strategy.poll_initialized();
                let state = slot.apply(outcome);
                if state != StrategyState::Initializing {
                    self.changes.push((slot.strategy.name(), state));
                }
            }

            if slot.state != StrategyState::Ready {
                continue;
            }

            match slot.strategy.detect(frame) {
                Ok(Some(result)) => return Some(result),
                Ok(None) => {}
                Err(e) => tracing::warn!("Strategy '{}': {}", slot.strategy.name(), e),
            }
        }
        None
    }

    pub fn has_ready(&self) -> bool {
        self.slots.iter().any(|s| s.state == StrategyState::Ready)
    }

    /// Every strategy is `Unavailable` or `Failed`
    pub fn all_exhausted(&self) -> bool {
        self.slots.iter().all(|s| s.state.is_terminal())
    }

    /// Current state of every strategy, in priority order
    pub fn states(&self) -> Vec<(&'static str, StrategyState)> {
        self.slots
            .iter()
            .map(|s| (s.strategy.name(), s.state))
            .collect()
    }

    /// State transitions since the last call
    pub fn drain_changes(&mut self) -> Vec<(&'static str, StrategyState)> {
        std::mem::take(&mut self.changes)
    }
}
