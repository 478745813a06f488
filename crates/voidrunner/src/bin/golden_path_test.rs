//! # Golden Path Smoke Test
//!
//! Single-process integration smoke test: boots a real [`Server`] on
//! loopback, drives two real `UdpSocket` clients through hello, room
//! create/join, ready, game start, the first forceFull snapshot, and an
//! acknowledged `CLIENT_INPUT` run. Exits `0` if every step completes
//! before its deadline, `1` otherwise.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use voidrunner::core::config::{CoreConfig, GameplayConfig};
use voidrunner::core::protocol::{self, ClientInputPayload, Packet, PacketHeader, PacketType};
use voidrunner::core::server::Server;

const DEADLINE: Duration = Duration::from_secs(5);

struct Step {
    name: &'static str,
    passed: bool,
}

fn client_socket() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind client socket");
    socket.set_read_timeout(Some(DEADLINE)).expect("set read timeout");
    socket
}

fn send(socket: &UdpSocket, server_addr: SocketAddr, packet: &Packet) {
    let bytes = protocol::encode(packet);
    socket.send_to(&bytes, server_addr).expect("send to server");
}

fn recv_until(socket: &UdpSocket, deadline: Instant, pred: impl Fn(&Packet) -> bool) -> Option<Packet> {
    let mut buf = vec![0u8; protocol::MAX_DATAGRAM_SIZE].into_boxed_slice();
    loop {
        if Instant::now() >= deadline {
            return None;
        }
        match socket.recv_from(&mut buf) {
            Ok((len, _)) => {
                if let Ok(packet) = protocol::decode(&buf[..len]) {
                    if pred(&packet) {
                        return Some(packet);
                    }
                }
            }
            Err(_) => return None,
        }
    }
}

fn run() -> Vec<Step> {
    let mut steps = Vec::new();
    let server_addr: SocketAddr = "127.0.0.1:47999".parse().unwrap();

    let core = CoreConfig { min_players_to_start: 2, session_timeout_secs: 5, ..CoreConfig::default() };
    let server = Server::new(core, GameplayConfig::default());
    let running = server.running_handle();
    let server_thread = thread::spawn(move || server.run(server_addr));
    thread::sleep(Duration::from_millis(100));

    let deadline = Instant::now() + DEADLINE;

    let host = client_socket();
    send(&host, server_addr, &Packet::ClientHello(PacketHeader::new(PacketType::ClientHello, 0, 0)));
    let welcome = recv_until(&host, deadline, |p| matches!(p, Packet::ServerWelcome(..)));
    let host_id = match welcome {
        Some(Packet::ServerWelcome(_, id)) => Some(id),
        _ => None,
    };
    steps.push(Step { name: "CLIENT_HELLO -> SERVER_WELCOME", passed: host_id.is_some() });
    let host_id = host_id.unwrap_or(0);

    send(
        &host,
        server_addr,
        &Packet::RoomCreate(PacketHeader::new(PacketType::RoomCreate, 1, 0), "Golden Path".to_string(), 2),
    );
    let created = recv_until(&host, deadline, |p| matches!(p, Packet::RoomCreated(..)));
    let room_id = match created {
        Some(Packet::RoomCreated(_, id)) => Some(id),
        _ => None,
    };
    steps.push(Step { name: "ROOM_CREATE -> ROOM_CREATED", passed: room_id.is_some() });
    let room_id = room_id.unwrap_or(0);

    let joined = recv_until(&host, deadline, |p| matches!(p, Packet::RoomJoined(..)));
    steps.push(Step { name: "host auto-joins its own room", passed: joined.is_some() });

    let guest = client_socket();
    send(&guest, server_addr, &Packet::ClientHello(PacketHeader::new(PacketType::ClientHello, 0, 0)));
    let guest_welcome = recv_until(&guest, deadline, |p| matches!(p, Packet::ServerWelcome(..)));
    steps.push(Step { name: "second client connects", passed: guest_welcome.is_some() });

    send(&guest, server_addr, &Packet::RoomJoin(PacketHeader::new(PacketType::RoomJoin, 1, 0), room_id));
    let guest_joined = recv_until(&guest, deadline, |p| matches!(p, Packet::RoomJoined(_, id, ..) if *id == room_id));
    steps.push(Step { name: "guest joins the room", passed: guest_joined.is_some() });

    let roster = recv_until(&host, deadline, |p| matches!(p, Packet::RoomUpdate(_, id, members) if *id == room_id && members.len() == 2));
    steps.push(Step { name: "both members see a two-player roster", passed: roster.is_some() });

    send(&host, server_addr, &Packet::PlayerReady(PacketHeader::new(PacketType::PlayerReady, 2, 0), true));
    send(&guest, server_addr, &Packet::PlayerReady(PacketHeader::new(PacketType::PlayerReady, 2, 0), true));
    send(&host, server_addr, &Packet::GameStart(PacketHeader::new(PacketType::GameStart, 3, 0), room_id));

    let start_broadcast = recv_until(&host, deadline, |p| matches!(p, Packet::GameStart(_, id) if *id == room_id));
    steps.push(Step { name: "GAME_START is broadcast to the room", passed: start_broadcast.is_some() });

    let first_snapshot = recv_until(&host, deadline, |p| matches!(p, Packet::EntityUpdate(..)));
    let first_snapshot_ok = matches!(
        &first_snapshot,
        Some(Packet::EntityUpdate(_, snapshot)) if snapshot.snapshot_seq == 1 && snapshot.entities.len() == 2
    );
    steps.push(Step { name: "first forceFull snapshot carries both ships", passed: first_snapshot_ok });

    for seq in 1..=5u32 {
        send(
            &host,
            server_addr,
            &Packet::ClientInput(
                PacketHeader::new(PacketType::ClientInput, seq, 0),
                ClientInputPayload { player_id: host_id, input_mask: ClientInputPayload::RIGHT, charge_level: 0, input_seq: seq },
            ),
        );
    }
    let acked = recv_until(&host, deadline, |p| {
        matches!(p, Packet::EntityUpdate(_, snap) if snap.acks.iter().any(|a| a.player_id == host_id && a.last_processed_input_seq > 0))
    });
    steps.push(Step { name: "CLIENT_INPUT is acknowledged in a snapshot", passed: acked.is_some() });

    running.store(false, Ordering::Relaxed);
    let _ = server_thread.join();

    steps
}

fn main() {
    println!("+---------------------------------------------------------+");
    println!("|              VOIDRUNNER GOLDEN PATH TEST                |");
    println!("+---------------------------------------------------------+");

    let steps = run();
    for step in &steps {
        let mark = if step.passed { "PASS" } else { "FAIL" };
        println!("| [{mark}] {:<50}|", step.name);
    }

    let all_passed = steps.iter().all(|s| s.passed);
    println!("+---------------------------------------------------------+");
    if all_passed {
        println!("| RESULT: all {} steps passed                          ", steps.len());
        std::process::exit(0);
    } else {
        let failed = steps.iter().filter(|s| !s.passed).count();
        println!("| RESULT: {failed} of {} steps failed                 ", steps.len());
        std::process::exit(1);
    }
}
