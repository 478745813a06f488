//! # Bot Client
//!
//! Scriptable, deterministic load/soak client. Spawns `--bots` instances
//! of [`voidrunner_core::client::GameClient`], each on its own UDP socket,
//! joins them all into one room, starts the match, and drives a fixed,
//! seeded input script against the real wire protocol for `--duration`
//! seconds.
//!
//! ## Usage
//!
//! ```text
//! bot_client [--addr <host:port>] [--bots <n>] [--duration <secs>]
//! ```

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use voidrunner::core::client::GameClient;
use voidrunner::core::config::PlayerConfig;
use voidrunner::core::protocol::{self, ClientInputPayload};

struct Args {
    addr: SocketAddr,
    bots: usize,
    duration: Duration,
}

fn parse_args() -> Args {
    let mut addr: SocketAddr = "127.0.0.1:7777".parse().unwrap();
    let mut bots = 8usize;
    let mut duration = Duration::from_secs(30);

    let raw: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "--addr" => {
                if let Some(value) = raw.get(i + 1) {
                    if let Ok(parsed) = value.parse() {
                        addr = parsed;
                    }
                    i += 1;
                }
            }
            "--bots" => {
                if let Some(value) = raw.get(i + 1) {
                    bots = value.parse().unwrap_or(bots);
                    i += 1;
                }
            }
            "--duration" => {
                if let Some(value) = raw.get(i + 1) {
                    duration = Duration::from_secs(value.parse().unwrap_or(30));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: bot_client [--addr <host:port>] [--bots <n>] [--duration <secs>]");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    Args { addr, bots, duration }
}

/// One bot's socket, client-side protocol state, and a deterministic input
/// script keyed off its index so a given bot count always drives the same
/// sequence of inputs.
struct Bot {
    socket: UdpSocket,
    client: GameClient,
    script_phase: u8,
}

impl Bot {
    fn new(index: usize) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            client: GameClient::new(),
            script_phase: (index % 4) as u8,
        })
    }

    fn send(&self, addr: SocketAddr, bytes: &[u8]) {
        if let Err(err) = self.socket.send_to(bytes, addr) {
            tracing::debug!(%err, "bot send failed");
        }
    }

    /// One deterministic input mask per bot, cycling through a fixed
    /// movement/fire pattern so two runs with the same bot count produce
    /// the same traffic.
    fn next_input_mask(&mut self, tick: u64) -> u8 {
        self.script_phase = ((tick / 30) % 4) as u8;
        match self.script_phase {
            0 => ClientInputPayload::RIGHT | ClientInputPayload::FIRE,
            1 => ClientInputPayload::UP,
            2 => ClientInputPayload::LEFT | ClientInputPayload::FIRE,
            _ => ClientInputPayload::DOWN,
        }
    }

    fn drain_inbound(&mut self, local_clock: f64, cfg: &PlayerConfig) {
        let mut buf = vec![0u8; protocol::MAX_DATAGRAM_SIZE].into_boxed_slice();
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => {
                    if let Ok(packet) = protocol::decode(&buf[..len]) {
                        self.client.handle_packet(packet, local_clock, cfg);
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    tracing::debug!(%err, "bot recv failed");
                    break;
                }
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = parse_args();

    println!("+---------------------------------------------------------+");
    println!("|               VOIDRUNNER BOT CLIENT                     |");
    println!("+---------------------------------------------------------+");
    println!("| Server:    {:<46}|", args.addr);
    println!("| Bots:      {:<46}|", args.bots);
    println!("| Duration:  {:<43}s |", args.duration.as_secs());
    println!("+---------------------------------------------------------+");

    let cfg = PlayerConfig::default();
    let mut bots = Vec::with_capacity(args.bots);
    for i in 0..args.bots {
        match Bot::new(i) {
            Ok(bot) => bots.push(bot),
            Err(err) => {
                eprintln!("failed to bind bot {i}: {err}");
                std::process::exit(1);
            }
        }
    }

    for bot in &mut bots {
        let hello = bot.client.connect_packet();
        bot.send(args.addr, &hello);
    }

    let start = Instant::now();
    let tick_interval = Duration::from_millis(1000 / 60);
    let mut tick: u64 = 0;
    let mut room_id = 0u32;
    let mut sent_create = false;
    let mut sent_start = false;

    while start.elapsed() < args.duration {
        let local_clock = start.elapsed().as_secs_f64();

        for bot in &mut bots {
            bot.drain_inbound(local_clock, &cfg);
        }

        // Host (bot 0) creates the room once every bot has a player id.
        if !sent_create && bots.iter().all(|b| b.client.player_id().is_some()) {
            if let Some(host) = bots.first_mut() {
                let packet = host.client.create_room_packet("Bot Match".to_string(), bots.len().max(1) as u8);
                host.send(args.addr, &packet);
            }
            sent_create = true;
        }

        if room_id == 0 {
            if let Some(host) = bots.first() {
                if host.client.room_id() != 0 {
                    room_id = host.client.room_id();
                }
            }
        } else {
            for (i, bot) in bots.iter_mut().enumerate().skip(1) {
                if bot.client.room_id() == 0 {
                    let packet = bot.client.join_room_packet(room_id);
                    bot.send(args.addr, &packet);
                    tracing::debug!(bot = i, room_id, "joining room");
                }
            }
        }

        if room_id != 0 && !sent_start && bots.iter().all(|b| b.client.room_id() == room_id) {
            for bot in &mut bots {
                let ready = bot.client.ready_packet(true);
                bot.send(args.addr, &ready);
            }
            if let Some(host) = bots.first_mut() {
                let start_packet = host.client.start_game_packet();
                host.send(args.addr, &start_packet);
            }
            sent_start = true;
        }

        if sent_start {
            for bot in &mut bots {
                if !bot.client.in_game() || bot.client.paused() {
                    continue;
                }
                let mask = bot.next_input_mask(tick);
                if let Some(packet) = bot.client.input_packet(mask, 0, 1.0 / 60.0, &cfg) {
                    bot.send(args.addr, &packet);
                }
            }
        }

        tick += 1;
        std::thread::sleep(tick_interval);
    }

    let finished = bots.iter().filter(|b| b.client.in_game() || b.client.result().is_some()).count();
    println!();
    println!("+---------------------------------------------------------+");
    println!("|                        SUMMARY                          |");
    println!("+---------------------------------------------------------+");
    println!("| Ticks driven:        {:<36}|", tick);
    println!("| Bots that reached room_id != 0: {:<25}|", bots.iter().filter(|b| b.client.room_id() != 0).count());
    println!("| Bots that entered/finished a match: {:<21}|", finished);
    println!("+---------------------------------------------------------+");
}
