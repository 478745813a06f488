//! Client-side input prediction and server reconciliation (§4.H).
//!
//! The local ship is moved immediately on input, before any round trip, so
//! movement feels instant. Every applied input is kept in a bounded FIFO
//! until the server acknowledges it; on each snapshot the client rewinds to
//! the authoritative position and replays whatever is still unacknowledged.

use std::collections::VecDeque;

use crate::config::PlayerConfig;
use crate::protocol::ClientInputPayload;

/// Bound on [`Predictor`]'s pending-input FIFO (§3, "bounded, e.g. 120").
pub const PENDING_INPUT_CAPACITY: usize = 120;

/// Squared-distance snap threshold: replay error past this many world units
/// snaps the predicted position outright rather than being absorbed
/// silently (§9, "the 2-px snap threshold is a heuristic").
pub const SNAP_THRESHOLD: f32 = 2.0;

/// Position and velocity of the locally predicted ship.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PredictedState {
    /// Predicted X.
    pub x: f32,
    /// Predicted Y.
    pub y: f32,
    /// Velocity carried into the next step's integration.
    pub vx: f32,
    /// Velocity carried into the next step's integration.
    pub vy: f32,
}

/// One input the predictor applied, kept until the server acks it.
#[derive(Clone, Copy, Debug)]
struct StoredInput {
    seq: u32,
    input_mask: u8,
    dt: f32,
}

/// Advances `state` by one step under the same movement model the server's
/// tick uses: position integrates with the velocity left over from the
/// previous step, then velocity is recomputed from this step's input mask
/// and the position is clamped (see `simulation::RoomWorld::tick`'s
/// `integrate_and_age` then `apply_type_rules` ordering, which this
/// mirrors exactly — replaying out of that order would desync the client
/// from the server on every reconciliation).
pub fn step(state: &mut PredictedState, input_mask: u8, dt: f32, cfg: &PlayerConfig) {
    state.x += state.vx * dt;
    state.y += state.vy * dt;
    state.x = state.x.clamp(cfg.boundary_min_x, cfg.boundary_max_x);
    state.y = state.y.clamp(cfg.boundary_min_y, cfg.boundary_max_y);

    let mut vx = 0.0;
    let mut vy = 0.0;
    if input_mask & ClientInputPayload::LEFT != 0 {
        vx -= cfg.speed;
    }
    if input_mask & ClientInputPayload::RIGHT != 0 {
        vx += cfg.speed;
    }
    if input_mask & ClientInputPayload::UP != 0 {
        vy -= cfg.speed;
    }
    if input_mask & ClientInputPayload::DOWN != 0 {
        vy += cfg.speed;
    }
    state.vx = vx;
    state.vy = vy;
}

/// Local-ship predictor and reconciler.
pub struct Predictor {
    state: PredictedState,
    pending: VecDeque<StoredInput>,
    next_input_seq: u32,
}

impl Predictor {
    /// Creates a predictor starting at the ship's spawn position.
    #[must_use]
    pub fn new(spawn_x: f32, spawn_y: f32) -> Self {
        Self {
            state: PredictedState { x: spawn_x, y: spawn_y, vx: 0.0, vy: 0.0 },
            pending: VecDeque::new(),
            next_input_seq: 0,
        }
    }

    /// The ship's current predicted position, rendered directly (§4.H step 4).
    #[must_use]
    pub const fn predicted_position(&self) -> (f32, f32) {
        (self.state.x, self.state.y)
    }

    /// Applies one locally sampled input immediately, records it in the
    /// pending FIFO, and returns the `inputSeq` to send on the wire.
    pub fn apply_input(&mut self, input_mask: u8, dt: f32, cfg: &PlayerConfig) -> u32 {
        self.next_input_seq += 1;
        let seq = self.next_input_seq;

        step(&mut self.state, input_mask, dt, cfg);

        if self.pending.len() >= PENDING_INPUT_CAPACITY {
            self.pending.pop_front();
        }
        self.pending.push_back(StoredInput { seq, input_mask, dt });
        seq
    }

    /// Reconciles against a freshly received snapshot ack.
    ///
    /// Drops every pending input with `seq ≤ acked_seq`, replays the rest on
    /// top of `(authoritative_x, authoritative_y)`, and either snaps the
    /// predicted position to the replay (error past [`SNAP_THRESHOLD`]) or
    /// keeps the current prediction (small divergence, avoids shivering).
    /// Returns `true` if a snap occurred.
    pub fn reconcile(&mut self, authoritative_x: f32, authoritative_y: f32, acked_seq: u32, cfg: &PlayerConfig) -> bool {
        while self.pending.front().is_some_and(|input| input.seq <= acked_seq) {
            self.pending.pop_front();
        }

        let mut replayed = PredictedState { x: authoritative_x, y: authoritative_y, vx: 0.0, vy: 0.0 };
        for input in &self.pending {
            step(&mut replayed, input.input_mask, input.dt, cfg);
        }

        let dx = replayed.x - self.state.x;
        let dy = replayed.y - self.state.y;
        let snapped = dx * dx + dy * dy > SNAP_THRESHOLD * SNAP_THRESHOLD;
        if snapped {
            self.state = replayed;
        } else {
            self.state.vx = replayed.vx;
            self.state.vy = replayed.vy;
        }
        snapped
    }

    /// Number of pending, unacknowledged inputs.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PlayerConfig {
        PlayerConfig::default()
    }

    #[test]
    fn replay_after_matching_ack_reproduces_the_existing_prediction_with_no_snap() {
        let cfg = cfg();
        let mut predictor = Predictor::new(cfg.spawn_x, cfg.spawn_y_start);
        let mut authoritative = PredictedState { x: cfg.spawn_x, y: cfg.spawn_y_start, vx: 0.0, vy: 0.0 };

        for _ in 0..10 {
            predictor.apply_input(ClientInputPayload::RIGHT, 1.0 / 60.0, &cfg);
            step(&mut authoritative, ClientInputPayload::RIGHT, 1.0 / 60.0, &cfg);
        }
        // server has processed exactly the same 7 of 10 inputs
        let mut server_pos = PredictedState { x: cfg.spawn_x, y: cfg.spawn_y_start, vx: 0.0, vy: 0.0 };
        for _ in 0..7 {
            step(&mut server_pos, ClientInputPayload::RIGHT, 1.0 / 60.0, &cfg);
        }

        let snapped = predictor.reconcile(server_pos.x, server_pos.y, 7, &cfg);
        assert!(!snapped);
        assert_eq!(predictor.predicted_position(), (authoritative.x, authoritative.y));
        assert_eq!(predictor.pending_len(), 3);
    }

    #[test]
    fn large_divergence_snaps_to_the_replayed_position() {
        let cfg = cfg();
        let mut predictor = Predictor::new(cfg.spawn_x, cfg.spawn_y_start);
        predictor.apply_input(ClientInputPayload::RIGHT, 1.0 / 60.0, &cfg);

        let snapped = predictor.reconcile(cfg.spawn_x - 500.0, cfg.spawn_y_start, 0, &cfg);
        assert!(snapped);
        assert_eq!(predictor.predicted_position().0, cfg.spawn_x - 500.0);
    }

    #[test]
    fn acked_inputs_are_dropped_from_the_pending_fifo() {
        let cfg = cfg();
        let mut predictor = Predictor::new(cfg.spawn_x, cfg.spawn_y_start);
        for _ in 0..5 {
            predictor.apply_input(ClientInputPayload::RIGHT, 1.0 / 60.0, &cfg);
        }
        predictor.reconcile(cfg.spawn_x, cfg.spawn_y_start, 3, &cfg);
        assert_eq!(predictor.pending_len(), 2);
    }

    #[test]
    fn pending_fifo_is_bounded() {
        let cfg = cfg();
        let mut predictor = Predictor::new(cfg.spawn_x, cfg.spawn_y_start);
        for _ in 0..(PENDING_INPUT_CAPACITY + 10) {
            predictor.apply_input(ClientInputPayload::RIGHT, 1.0 / 60.0, &cfg);
        }
        assert_eq!(predictor.pending_len(), PENDING_INPUT_CAPACITY);
    }
}
