//! Full client <-> server handshake over real UDP sockets on localhost:
//! hello, room create/join, ready, game start, and the first snapshot.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use voidrunner_core::config::{CoreConfig, GameplayConfig};
use voidrunner_core::protocol::{self, ClientInputPayload, Packet, PacketHeader, PacketType};
use voidrunner_core::server::Server;

/// Binds a client-side UDP socket on an OS-assigned loopback port.
fn client_socket() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind client socket");
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("set read timeout");
    socket
}

fn send(socket: &UdpSocket, server_addr: SocketAddr, packet: &Packet) {
    let bytes = protocol::encode(packet);
    socket.send_to(&bytes, server_addr).expect("send to server");
}

fn recv(socket: &UdpSocket) -> Packet {
    let mut buf = vec![0u8; protocol::MAX_DATAGRAM_SIZE].into_boxed_slice();
    let (len, _) = socket.recv_from(&mut buf).expect("recv from server");
    protocol::decode(&buf[..len]).expect("decode server reply")
}

/// Keeps retrying `recv` until `pred` matches or the deadline passes,
/// discarding any packets that don't match along the way (snapshots and
/// room updates can interleave with the reply a test is waiting for).
fn recv_until(socket: &UdpSocket, deadline: Instant, pred: impl Fn(&Packet) -> bool) -> Packet {
    loop {
        assert!(Instant::now() < deadline, "timed out waiting for expected packet");
        let packet = recv(socket);
        if pred(&packet) {
            return packet;
        }
    }
}

#[test]
fn two_clients_reach_an_initial_snapshot() {
    // A fixed high port keeps this test independent of `Server`'s lack of a
    // "bound, tell me the port" signal; 0.0.0.0 ephemeral ranges don't reach
    // this low, so collisions with another test run are unlikely.
    let server_addr: SocketAddr = "127.0.0.1:47998".parse().unwrap();

    let core = CoreConfig {
        min_players_to_start: 2,
        session_timeout_secs: 5,
        ..CoreConfig::default()
    };
    let server = Server::new(core, GameplayConfig::default());
    let running = server.running_handle();

    let server_thread = thread::spawn(move || server.run(server_addr));
    // Give the I/O thread a moment to bind before clients start sending.
    thread::sleep(Duration::from_millis(100));

    let deadline = Instant::now() + Duration::from_secs(5);

    let host = client_socket();
    send(&host, server_addr, &Packet::ClientHello(PacketHeader::new(PacketType::ClientHello, 0, 0)));
    let welcome = recv_until(&host, deadline, |p| matches!(p, Packet::ServerWelcome(..)));
    let host_id = match welcome {
        Packet::ServerWelcome(_, id) => id,
        _ => unreachable!(),
    };
    assert_eq!(host_id, 1, "first session is assigned player id 1");

    send(
        &host,
        server_addr,
        &Packet::RoomCreate(PacketHeader::new(PacketType::RoomCreate, 1, 0), "Alpha".to_string(), 2),
    );
    let created = recv_until(&host, deadline, |p| matches!(p, Packet::RoomCreated(..)));
    let room_id = match created {
        Packet::RoomCreated(_, id) => id,
        _ => unreachable!(),
    };
    assert_eq!(room_id, 1);

    let joined = recv_until(&host, deadline, |p| matches!(p, Packet::RoomJoined(..)));
    match joined {
        Packet::RoomJoined(_, id, name, max_players, host_player_id) => {
            assert_eq!(id, room_id);
            assert_eq!(name, "Alpha");
            assert_eq!(max_players, 2);
            assert_eq!(host_player_id, u32::from(host_id));
        }
        _ => unreachable!(),
    }

    let guest = client_socket();
    send(&guest, server_addr, &Packet::ClientHello(PacketHeader::new(PacketType::ClientHello, 0, 0)));
    let guest_welcome = recv_until(&guest, deadline, |p| matches!(p, Packet::ServerWelcome(..)));
    let guest_id = match guest_welcome {
        Packet::ServerWelcome(_, id) => id,
        _ => unreachable!(),
    };
    assert_eq!(guest_id, 2, "second session is assigned player id 2");

    send(&guest, server_addr, &Packet::RoomJoin(PacketHeader::new(PacketType::RoomJoin, 1, 0), room_id));
    let guest_joined = recv_until(&guest, deadline, |p| matches!(p, Packet::RoomJoined(..)));
    assert!(matches!(guest_joined, Packet::RoomJoined(_, id, ..) if id == room_id));

    // Both members see the two-player roster.
    let host_roster = recv_until(&host, deadline, |p| matches!(p, Packet::RoomUpdate(_, id, members) if *id == room_id && members.len() == 2));
    assert!(matches!(host_roster, Packet::RoomUpdate(..)));

    send(&host, server_addr, &Packet::PlayerReady(PacketHeader::new(PacketType::PlayerReady, 2, 0), true));
    send(&guest, server_addr, &Packet::PlayerReady(PacketHeader::new(PacketType::PlayerReady, 2, 0), true));

    send(&host, server_addr, &Packet::GameStart(PacketHeader::new(PacketType::GameStart, 3, 0), room_id));

    let start_broadcast = recv_until(&host, deadline, |p| matches!(p, Packet::GameStart(..)));
    assert!(matches!(start_broadcast, Packet::GameStart(_, id) if id == room_id));

    let first_snapshot = recv_until(&host, deadline, |p| matches!(p, Packet::EntityUpdate(..)));
    match first_snapshot {
        Packet::EntityUpdate(_, snapshot) => {
            assert_eq!(snapshot.snapshot_seq, 1, "first snapshot after GAME_START is forceFull seq 1");
            assert_eq!(snapshot.entities.len(), 2, "one PLAYER entity per room member");
        }
        _ => unreachable!(),
    }

    // Drive a few ticks of input from the host and confirm the server
    // eventually acks an inputSeq for that player.
    for seq in 1..=5u32 {
        send(
            &host,
            server_addr,
            &Packet::ClientInput(
                PacketHeader::new(PacketType::ClientInput, seq, 0),
                ClientInputPayload {
                    player_id: host_id,
                    input_mask: ClientInputPayload::RIGHT,
                    charge_level: 0,
                    input_seq: seq,
                },
            ),
        );
    }

    let acked = recv_until(&host, deadline, |p| {
        matches!(p, Packet::EntityUpdate(_, snap) if snap.acks.iter().any(|a| a.player_id == host_id && a.last_processed_input_seq > 0))
    });
    assert!(matches!(acked, Packet::EntityUpdate(..)));

    running.store(false, Ordering::Relaxed);
    server_thread.join().expect("server thread panicked").expect("server exited with error");
}
