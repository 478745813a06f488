//! The authoritative Voidrunner game server (§4, §5).
//!
//! One thread owns the UDP socket: it decodes inbound datagrams and writes
//! outbound ones, with no game-state access of its own. A second thread
//! owns the fixed-rate simulation tick and the [`ServerState`] dispatch it
//! drives. The two communicate only through bounded `crossbeam_channel`
//! queues — decoded packets one way, encoded datagrams the other — so
//! neither thread ever locks the other's data directly.

mod state;
mod tick;

pub use state::{Outbound, ServerState};
pub use tick::TickLoop;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::{CoreConfig, GameplayConfig};
use crate::error::CoreError;
use crate::protocol::{self, Packet};
use crate::transport::UdpTransport;

const EVENT_QUEUE_CAPACITY: usize = 4096;
const COMMAND_QUEUE_CAPACITY: usize = 4096;

/// One packet the I/O thread decoded, bound for dispatch on the sim thread.
struct InboundPacket {
    addr: SocketAddr,
    packet: Packet,
}

/// One encoded datagram the sim thread wants the I/O thread to write.
enum OutboundCommand {
    /// To one endpoint.
    Unicast(SocketAddr, Vec<u8>),
    /// The same bytes, to every listed endpoint.
    Multicast(Vec<SocketAddr>, Vec<u8>),
}

impl From<Outbound> for OutboundCommand {
    fn from(value: Outbound) -> Self {
        match value {
            Outbound::Unicast(addr, bytes) => Self::Unicast(addr, bytes),
            Outbound::Multicast(addrs, bytes) => Self::Multicast(addrs, bytes),
        }
    }
}

/// The dedicated server: binds a socket, then drives the fixed-rate
/// simulation loop until asked to stop.
pub struct Server {
    core: CoreConfig,
    gameplay: GameplayConfig,
    running: Arc<AtomicBool>,
    tick_count: Arc<AtomicU64>,
}

impl Server {
    /// Creates a server that has not yet bound a socket or started ticking.
    #[must_use]
    pub fn new(core: CoreConfig, gameplay: GameplayConfig) -> Self {
        Self {
            core,
            gameplay,
            running: Arc::new(AtomicBool::new(false)),
            tick_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The fixed-rate tick counter, shareable with another thread for
    /// health/metrics reporting.
    #[must_use]
    pub fn tick_count(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.tick_count)
    }

    /// A handle that, when cleared, asks [`Self::run`] to return after its
    /// current tick.
    #[must_use]
    pub fn running_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Binds `bind_addr` and runs the server until [`Self::running_handle`]
    /// is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FatalTransport`] if the socket cannot be bound
    /// or a live socket errors outside `WouldBlock`; the binary crate maps
    /// this to a non-zero exit status (§6).
    pub fn run(&self, bind_addr: SocketAddr) -> Result<(), CoreError> {
        let transport = UdpTransport::bind(bind_addr)?;
        self.running.store(true, Ordering::Relaxed);

        let (event_tx, event_rx) = bounded::<InboundPacket>(EVENT_QUEUE_CAPACITY);
        let (command_tx, command_rx) = bounded::<OutboundCommand>(COMMAND_QUEUE_CAPACITY);

        let io_running = Arc::clone(&self.running);
        let io_thread = thread::spawn(move || io_loop(transport, &io_running, &event_tx, &command_rx));

        self.simulation_loop(&event_rx, &command_tx);
        self.running.store(false, Ordering::Relaxed);

        match io_thread.join() {
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }

    fn simulation_loop(&self, event_rx: &Receiver<InboundPacket>, command_tx: &Sender<OutboundCommand>) {
        let mut state = ServerState::new(self.core, self.gameplay.clone());
        let mut tick_loop = TickLoop::new(self.core.tick_rate);
        let dt = 1.0 / self.core.tick_rate as f32;
        let snapshot_every = (self.core.tick_rate / self.core.snapshot_rate).max(1);
        let mut ticks_since_snapshot: u32 = 0;
        let mut last_sweep = Instant::now();
        let sweep_interval = Duration::from_secs(1);

        while self.running.load(Ordering::Relaxed) {
            if !tick_loop.should_tick() {
                tick_loop.wait_for_next_tick();
                continue;
            }
            let tick_start = tick_loop.begin_tick();
            let now = Instant::now();

            while let Ok(inbound) = event_rx.try_recv() {
                for outbound in state.handle_packet(inbound.addr, inbound.packet, now) {
                    send(command_tx, outbound);
                }
            }

            for outbound in state.tick(dt) {
                send(command_tx, outbound);
            }

            ticks_since_snapshot += 1;
            if ticks_since_snapshot >= snapshot_every {
                ticks_since_snapshot = 0;
                for outbound in state.emit_snapshots(false) {
                    send(command_tx, outbound);
                }
            }

            if now.duration_since(last_sweep) >= sweep_interval {
                last_sweep = now;
                for outbound in state.sweep_timeouts(now) {
                    send(command_tx, outbound);
                }
            }

            self.tick_count.fetch_add(1, Ordering::Relaxed);
            tick_loop.end_tick(tick_start);
        }
    }
}

fn send(command_tx: &Sender<OutboundCommand>, outbound: Outbound) {
    if command_tx.try_send(outbound.into()).is_err() {
        tracing::warn!("outbound queue full, dropping datagram");
    }
}

fn io_loop(
    mut transport: UdpTransport,
    running: &AtomicBool,
    event_tx: &Sender<InboundPacket>,
    command_rx: &Receiver<OutboundCommand>,
) -> Result<(), CoreError> {
    while running.load(Ordering::Relaxed) {
        loop {
            match transport.recv() {
                Ok(Some((data, addr))) => match protocol::decode(data) {
                    Ok(packet) => {
                        if event_tx.try_send(InboundPacket { addr, packet }).is_err() {
                            tracing::warn!(%addr, "inbound queue full, dropping packet");
                        }
                    }
                    Err(err) => {
                        tracing::debug!(%addr, %err, "dropping malformed packet");
                    }
                },
                Ok(None) => break,
                Err(err) => return Err(CoreError::FatalTransport(err)),
            }
        }

        while let Ok(command) = command_rx.try_recv() {
            match command {
                OutboundCommand::Unicast(addr, bytes) => {
                    if let Err(err) = transport.send_to(&bytes, addr) {
                        tracing::debug!(%addr, %err, "send failed");
                    }
                }
                OutboundCommand::Multicast(addrs, bytes) => {
                    for addr in addrs {
                        if let Err(err) = transport.send_to(&bytes, addr) {
                            tracing::debug!(%addr, %err, "send failed");
                        }
                    }
                }
            }
        }

        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}
