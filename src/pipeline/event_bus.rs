// src/pipeline/event_bus.rs
//
// Bounded outbox of fusion events. The monitor publishes, whoever drives
// it (runtime task, replay loop, UI poller) drains. Oldest events go
// first when nobody drains fast enough.

use crate::fusion::FusionEvent;
use std::collections::VecDeque;
use tracing::warn;

pub struct EventBus {
    events: VecDeque<FusionEvent>,
    max_pending: usize,
    dropped: u64,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: FusionEvent) {
        if self.events.len() >= self.max_pending {
            if self.dropped == 0 {
                warn!(
                    "Event bus full ({} events), dropping oldest",
                    self.max_pending
                );
            }
            self.dropped += 1;
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<FusionEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertSource;

    fn recovered(source: AlertSource) -> FusionEvent {
        FusionEvent::SourceRecovered { source }
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let mut bus = EventBus::new(2);
        bus.publish(recovered(AlertSource::Front));
        bus.publish(recovered(AlertSource::Rear));
        bus.publish(recovered(AlertSource::Audio));

        assert_eq!(bus.pending_count(), 2);
        assert_eq!(bus.dropped_count(), 1);
        let drained = bus.drain();
        assert_eq!(
            drained,
            vec![recovered(AlertSource::Rear), recovered(AlertSource::Audio)]
        );
        assert_eq!(bus.pending_count(), 0);
    }
}
