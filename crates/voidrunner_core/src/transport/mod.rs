//! UDP transport and the per-endpoint session table.
//!
//! A single non-blocking socket drives both directions. [`UdpTransport`]
//! is the thin I/O wrapper; [`SessionTable`] is the mutex-guarded map from
//! endpoint to [`Session`], with a timeout sweep for dead connections.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::protocol::MAX_DATAGRAM_SIZE;

/// A session is reaped after this long without a valid frame.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Thin wrapper around a non-blocking UDP socket.
///
/// No reliability layer: per the framing contract, no packet is ever
/// retried by the transport. Lobby reliability instead comes from clients
/// re-issuing idempotent requests (a repeated `ROOM_LIST_REQ` is harmless).
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    recv_buffer: Box<[u8]>,
    stats: TransportStats,
}

/// Packet and byte counters for one [`UdpTransport`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TransportStats {
    /// Datagrams sent.
    pub packets_sent: u64,
    /// Datagrams received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send calls that returned an OS error.
    pub send_errors: u64,
}

impl UdpTransport {
    /// Binds a non-blocking UDP socket to `addr`.
    ///
    /// # Errors
    ///
    /// Returns any [`io::Error`] from `bind`, `set_nonblocking`, or
    /// `local_addr`.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        tracing::info!(%local_addr, "transport bound");
        Ok(Self {
            socket,
            local_addr,
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE].into_boxed_slice(),
            stats: TransportStats::default(),
        })
    }

    /// The address this transport is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends `data` to `addr`, fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`io::Error`] on send failure; `WouldBlock`
    /// is possible under backpressure and is not treated specially here.
    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        match self.socket.send_to(data, addr) {
            Ok(n) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(e)
            }
        }
    }

    /// Polls for one datagram without blocking.
    ///
    /// Returns `None` on `WouldBlock` (nothing available this tick). Any
    /// other OS error is fatal to the transport and propagates to the
    /// caller, matching [`crate::error::CoreError::FatalTransport`].
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] for any receive failure other than
    /// `WouldBlock`.
    pub fn recv(&mut self) -> io::Result<Option<(&[u8], SocketAddr)>> {
        match self.socket.recv_from(&mut self.recv_buffer) {
            Ok((len, addr)) => {
                self.stats.packets_received += 1;
                self.stats.bytes_received += len as u64;
                Ok(Some((&self.recv_buffer[..len], addr)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Current send/receive counters.
    #[must_use]
    pub const fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

/// Per-endpoint connection state.
#[derive(Clone, Copy, Debug)]
pub struct Session {
    /// The endpoint this session was created for.
    pub endpoint: SocketAddr,
    /// Assigned on first contact; allocated monotonically from 1.
    pub player_id: u8,
    /// Updated on every valid frame; drives the timeout sweep.
    pub last_packet_time: Instant,
    /// The room this player currently belongs to, or 0 for none.
    pub room_id: u32,
    /// Most recently observed client-sent sequence number.
    ///
    /// Kept for duplicate hints only; the protocol makes no ordering
    /// guarantee on top of this.
    pub last_client_sequence: u32,
}

/// Endpoint→[`Session`] map guarded by a single lock, plus the monotonic
/// player-id allocator.
///
/// Callers that need read-then-modify semantics (e.g. "touch this session,
/// or create it if absent") must do so under one `lock()` call; see
/// [`Self::touch_or_create`].
pub struct SessionTable {
    sessions: Mutex<HashMap<SocketAddr, Session>>,
    next_player_id: Mutex<u8>,
}

impl SessionTable {
    /// Creates an empty table; player ids are allocated starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_player_id: Mutex::new(1),
        }
    }

    /// Updates `lastPacketTime`/`lastClientSequence` for a known endpoint,
    /// or creates a new session with a freshly allocated player id.
    ///
    /// Returns the session's player id either way.
    pub fn touch_or_create(&self, endpoint: SocketAddr, client_sequence: u32, now: Instant) -> u8 {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(&endpoint) {
            session.last_packet_time = now;
            session.last_client_sequence = client_sequence;
            return session.player_id;
        }
        let mut next_id = self.next_player_id.lock();
        let player_id = *next_id;
        *next_id = next_id.wrapping_add(1);
        drop(next_id);

        sessions.insert(
            endpoint,
            Session {
                endpoint,
                player_id,
                last_packet_time: now,
                room_id: 0,
                last_client_sequence: client_sequence,
            },
        );
        tracing::info!(%endpoint, player_id, "session created");
        player_id
    }

    /// Records which room a session belongs to (0 clears it).
    pub fn set_room(&self, endpoint: SocketAddr, room_id: u32) {
        if let Some(session) = self.sessions.lock().get_mut(&endpoint) {
            session.room_id = room_id;
        }
    }

    /// A value copy of one session.
    #[must_use]
    pub fn get(&self, endpoint: SocketAddr) -> Option<Session> {
        self.sessions.lock().get(&endpoint).copied()
    }

    /// Removes a session outright (`CLIENT_DISCONNECT` or a reaped timeout).
    pub fn remove(&self, endpoint: SocketAddr) -> Option<Session> {
        let removed = self.sessions.lock().remove(&endpoint);
        if let Some(session) = removed {
            tracing::info!(%endpoint, player_id = session.player_id, "session removed");
        }
        removed
    }

    /// Removes and returns every session that has been silent for longer
    /// than [`SESSION_TIMEOUT`], relative to `now`.
    pub fn sweep_timeouts(&self, now: Instant) -> Vec<Session> {
        let mut sessions = self.sessions.lock();
        let (expired, alive): (Vec<_>, Vec<_>) = sessions
            .drain()
            .partition(|(_, s)| now.duration_since(s.last_packet_time) >= SESSION_TIMEOUT);
        *sessions = alive.into_iter().collect();
        for (endpoint, session) in &expired {
            tracing::warn!(%endpoint, player_id = session.player_id, "session timed out");
        }
        expired.into_iter().map(|(_, s)| s).collect()
    }

    /// Number of currently tracked sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// True if no sessions are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}
