//! One-shot overlay trigger
//!
//! Every registered target owns a [`TriggerState`] that moves from `Idle` to
//! `Fired` exactly once per session. The transition is an atomic
//! compare-and-set, so the guarantee holds even if frames were ever
//! delivered from more than one thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::session::ConfiguredSession;
use crate::tracking::{FrameError, Pose, TargetIndex, TrackingEvent, TrackingState};

const IDLE: u8 = 0;
const FIRED: u8 = 1;

/// Per-target trigger state; `Fired` is terminal for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Fired,
}

/// Trigger states for a fixed set of targets
///
/// The key set is fixed at construction, so lookups need no lock.
#[derive(Debug, Default)]
pub struct TriggerTable {
    states: HashMap<TargetIndex, AtomicU8>,
}

impl TriggerTable {
    pub fn new(indices: impl IntoIterator<Item = TargetIndex>) -> Self {
        Self {
            states: indices
                .into_iter()
                .map(|index| (index, AtomicU8::new(IDLE)))
                .collect(),
        }
    }

    pub fn contains(&self, index: TargetIndex) -> bool {
        self.states.contains_key(&index)
    }

    pub fn state(&self, index: TargetIndex) -> Option<TriggerState> {
        self.states.get(&index).map(|s| match s.load(Ordering::Acquire) {
            IDLE => TriggerState::Idle,
            _ => TriggerState::Fired,
        })
    }

    /// Move `index` from `Idle` to `Fired`; true only for the call that did it
    pub fn try_fire(&self, index: TargetIndex) -> bool {
        self.states.get(&index).is_some_and(|s| {
            s.compare_exchange(IDLE, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    pub fn fired_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| s.load(Ordering::Acquire) == FIRED)
            .count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Request to create the overlay for a freshly triggered target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub index: TargetIndex,
    pub pose: Pose,
    /// Frame number that produced the trigger
    pub frame: u64,
}

/// Most recent observation of a registered target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetObservation {
    pub state: TrackingState,
    pub frame: u64,
}

/// Runs the trigger state machine over each frame's tracking events
#[derive(Debug)]
pub struct TrackingUpdateProcessor {
    triggers: Arc<TriggerTable>,
    observations: HashMap<TargetIndex, TargetObservation>,
    frame: u64,
}

impl TrackingUpdateProcessor {
    pub fn new(triggers: Arc<TriggerTable>) -> Self {
        Self {
            triggers,
            observations: HashMap::new(),
            frame: 0,
        }
    }

    /// Processor watching every target registered for the session
    pub fn for_session(session: &ConfiguredSession) -> Self {
        Self::new(Arc::new(TriggerTable::new(session.registry().indices())))
    }

    pub fn triggers(&self) -> &Arc<TriggerTable> {
        &self.triggers
    }

    pub fn observation(&self, index: TargetIndex) -> Option<&TargetObservation> {
        self.observations.get(&index)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame
    }

    /// Process one frame's updated targets
    ///
    /// Returns at most one request per registered target for the whole
    /// session. Malformed events are logged and skipped; nothing here fails
    /// the frame.
    pub fn on_frame(&mut self, events: &[TrackingEvent]) -> Vec<SpawnRequest> {
        self.frame += 1;
        let mut requests = Vec::new();

        for event in events {
            match self.process_event(event) {
                Ok(Some(request)) => requests.push(request),
                Ok(None) => {}
                Err(e) => {
                    warn!(frame = self.frame, error = %e, "Error processing tracking event");
                }
            }
        }

        requests
    }

    fn process_event(&mut self, event: &TrackingEvent) -> Result<Option<SpawnRequest>, FrameError> {
        if !self.triggers.contains(event.index) {
            trace!(index = %event.index, "Ignoring event for unregistered target");
            return Ok(None);
        }

        self.observations.insert(
            event.index,
            TargetObservation {
                state: event.state,
                frame: self.frame,
            },
        );

        match event.state {
            TrackingState::NotTracking => {
                debug!(index = %event.index, "Not tracking");
                Ok(None)
            }
            // Extrapolated poses never satisfy the trigger
            TrackingState::LastKnownPose => {
                debug!(index = %event.index, "Last known pose");
                Ok(None)
            }
            TrackingState::FullTracking => {
                event.validate()?;
                if !self.triggers.try_fire(event.index) {
                    trace!(index = %event.index, "Full tracking, already fired");
                    return Ok(None);
                }
                info!(
                    index = %event.index,
                    frame = self.frame,
                    "Target detected and fully tracked"
                );
                Ok(Some(SpawnRequest {
                    index: event.index,
                    pose: event.center_pose,
                    frame: self.frame,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(indices: &[u32]) -> TrackingUpdateProcessor {
        TrackingUpdateProcessor::new(Arc::new(TriggerTable::new(
            indices.iter().map(|&i| TargetIndex(i)),
        )))
    }

    fn event(index: u32, state: TrackingState, pose: Pose) -> TrackingEvent {
        TrackingEvent::new(TargetIndex(index), state, pose)
    }

    #[test]
    fn test_card_scenario() {
        let mut processor = processor(&[0]);
        let p = Pose::from_translation(0.0, 0.0, -0.4);
        let p2 = Pose::from_translation(0.05, 0.0, -0.4);

        assert!(processor.on_frame(&[event(0, TrackingState::NotTracking, p)]).is_empty());
        assert!(processor.on_frame(&[event(0, TrackingState::LastKnownPose, p)]).is_empty());
        assert_eq!(
            processor.triggers().state(TargetIndex(0)),
            Some(TriggerState::Idle)
        );

        let requests = processor.on_frame(&[event(0, TrackingState::FullTracking, p)]);
        assert_eq!(
            requests,
            vec![SpawnRequest {
                index: TargetIndex(0),
                pose: p,
                frame: 3
            }]
        );
        assert_eq!(
            processor.triggers().state(TargetIndex(0)),
            Some(TriggerState::Fired)
        );

        assert!(processor.on_frame(&[event(0, TrackingState::FullTracking, p2)]).is_empty());
        assert_eq!(processor.frames_processed(), 4);
    }

    #[test]
    fn test_one_shot_across_many_frames() {
        let mut processor = processor(&[0]);
        let mut spawned = 0;
        for _ in 0..500 {
            let frame = [
                event(0, TrackingState::FullTracking, Pose::IDENTITY),
                event(0, TrackingState::FullTracking, Pose::IDENTITY),
            ];
            spawned += processor.on_frame(&frame).len();
        }
        assert_eq!(spawned, 1);
        assert_eq!(processor.triggers().fired_count(), 1);
    }

    #[test]
    fn test_stale_states_never_trigger() {
        let mut processor = processor(&[0]);
        for _ in 0..10 {
            let frame = [
                event(0, TrackingState::LastKnownPose, Pose::IDENTITY),
                event(0, TrackingState::NotTracking, Pose::IDENTITY),
            ];
            assert!(processor.on_frame(&frame).is_empty());
        }
        let obs = processor.observation(TargetIndex(0)).unwrap();
        assert_eq!(obs.state, TrackingState::NotTracking);
        assert_eq!(obs.frame, 10);
        assert_eq!(
            processor.triggers().state(TargetIndex(0)),
            Some(TriggerState::Idle)
        );
    }

    #[test]
    fn test_targets_fire_independently() {
        let mut processor = processor(&[0, 1]);

        let first = processor.on_frame(&[
            event(0, TrackingState::FullTracking, Pose::IDENTITY),
            event(1, TrackingState::LastKnownPose, Pose::IDENTITY),
        ]);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].index, TargetIndex(0));

        let second = processor.on_frame(&[
            event(0, TrackingState::FullTracking, Pose::IDENTITY),
            event(1, TrackingState::FullTracking, Pose::IDENTITY),
        ]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].index, TargetIndex(1));
    }

    #[test]
    fn test_unregistered_and_malformed_events() {
        let mut processor = processor(&[0]);

        let requests = processor.on_frame(&[
            event(7, TrackingState::FullTracking, Pose::IDENTITY),
            event(0, TrackingState::FullTracking, Pose::from_translation(f32::INFINITY, 0.0, 0.0)),
        ]);
        assert!(requests.is_empty());
        assert!(processor.observation(TargetIndex(7)).is_none());
        // A malformed event does not consume the trigger
        assert_eq!(
            processor.triggers().state(TargetIndex(0)),
            Some(TriggerState::Idle)
        );

        let requests = processor.on_frame(&[event(0, TrackingState::FullTracking, Pose::IDENTITY)]);
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_try_fire_is_exclusive_across_threads() {
        let table = Arc::new(TriggerTable::new([TargetIndex(0)]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || (0..100).filter(|_| table.try_fire(TargetIndex(0))).count())
            })
            .collect();
        let fired: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(fired, 1);
        assert!(!table.try_fire(TargetIndex(3)));
    }
}
