//! Client-side interpolation buffer for remote entities (§4.H, tail).
//!
//! The local player's ship is never interpolated — it uses the predictor's
//! replayed position directly (see [`crate::prediction`]). Every other
//! entity is rendered one snapshot interval behind the latest authoritative
//! state, linearly blended between the two most recent snapshots. There is
//! no extrapolation past `current`.

use std::collections::HashMap;

use crate::protocol::EntityState;

/// Previous and current authoritative state for one remote entity, plus the
/// local-clock timestamp `current` arrived at.
#[derive(Clone, Copy, Debug)]
struct EntityBuffer {
    previous: EntityState,
    current: EntityState,
    current_arrival: f64,
}

impl EntityBuffer {
    fn position_at(&self, local_clock: f64, snapshot_interval: f64) -> (f32, f32) {
        let t = if snapshot_interval > 0.0 {
            ((local_clock - self.current_arrival) / snapshot_interval).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };
        let x = self.previous.x + (self.current.x - self.previous.x) * t;
        let y = self.previous.y + (self.current.y - self.previous.y) * t;
        (x, y)
    }
}

/// Owns one [`EntityBuffer`] per remote entity id seen in a snapshot.
#[derive(Debug, Default)]
pub struct RemoteEntityInterpolator {
    buffers: HashMap<u32, EntityBuffer>,
}

impl RemoteEntityInterpolator {
    /// Creates an interpolator with no entities tracked yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one freshly arrived [`EntityState`] into its buffer.
    ///
    /// `arrival` is the receiver's local clock at the moment this snapshot
    /// was applied, in the same units passed later to
    /// [`Self::interpolated_position`].
    pub fn observe(&mut self, state: EntityState, arrival: f64) {
        self.buffers
            .entry(state.id)
            .and_modify(|buf| {
                buf.previous = buf.current;
                buf.current = state;
                buf.current_arrival = arrival;
            })
            .or_insert(EntityBuffer {
                previous: state,
                current: state,
                current_arrival: arrival,
            });
    }

    /// Stops tracking an entity (on `ENTITY_DESTROY`).
    pub fn forget(&mut self, id: u32) {
        self.buffers.remove(&id);
    }

    /// The entity's interpolated render position, or `None` if it has never
    /// been observed.
    #[must_use]
    pub fn interpolated_position(&self, id: u32, local_clock: f64, snapshot_interval: f64) -> Option<(f32, f32)> {
        self.buffers.get(&id).map(|buf| buf.position_at(local_clock, snapshot_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(id: u32, x: f32, y: f32) -> EntityState {
        EntityState { id, x, y, ..Default::default() }
    }

    #[test]
    fn first_observation_has_no_motion_to_blend() {
        let mut interp = RemoteEntityInterpolator::new();
        interp.observe(state_at(1, 10.0, 20.0), 0.0);
        assert_eq!(interp.interpolated_position(1, 0.0, 1.0 / 30.0), Some((10.0, 20.0)));
    }

    #[test]
    fn blends_linearly_between_previous_and_current() {
        let mut interp = RemoteEntityInterpolator::new();
        let interval = 1.0 / 30.0;
        interp.observe(state_at(1, 0.0, 0.0), 0.0);
        interp.observe(state_at(1, 30.0, 0.0), interval);

        let (x, _) = interp.interpolated_position(1, interval, interval).unwrap();
        assert_eq!(x, 0.0);

        let (x_mid, _) = interp.interpolated_position(1, interval + interval / 2.0, interval).unwrap();
        assert!((x_mid - 15.0).abs() < 0.001);
    }

    #[test]
    fn never_extrapolates_past_current() {
        let mut interp = RemoteEntityInterpolator::new();
        let interval = 1.0 / 30.0;
        interp.observe(state_at(1, 0.0, 0.0), 0.0);
        interp.observe(state_at(1, 30.0, 0.0), interval);

        let (x, _) = interp.interpolated_position(1, interval * 10.0, interval).unwrap();
        assert_eq!(x, 30.0);
    }

    #[test]
    fn forgotten_entity_yields_no_position() {
        let mut interp = RemoteEntityInterpolator::new();
        interp.observe(state_at(1, 0.0, 0.0), 0.0);
        interp.forget(1);
        assert!(interp.interpolated_position(1, 0.0, 1.0 / 30.0).is_none());
    }
}
