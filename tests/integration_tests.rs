//! Integration tests that run a real server and real clients over the
//! loopback interface: lobby bookkeeping over the control channel, the
//! match bootstrap, state-channel relaying, hits and the match end.

use std::collections::VecDeque;
use std::time::Duration;

use assert_approx_eq::assert_approx_eq;
use tokio::time::{sleep, Instant};

use client::network::{Connection, ControlEvent};
use server::network::{Server, ServerConfig};
use shared::{Player, StatePacket, Vec2, WORLD_HEIGHT, WORLD_WIDTH};

/// A [`Connection`] plus per-channel buffers for events and packets that
/// were decoded in one poll batch but not yet consumed by a wait helper,
/// so nothing batched behind a match is lost between waits.
struct TestConn {
    inner: Connection,
    events: VecDeque<ControlEvent>,
    packets: VecDeque<StatePacket>,
}

impl TestConn {
    fn index(&self) -> i8 {
        self.inner.index()
    }

    async fn close(self) -> std::io::Result<()> {
        self.inner.close().await
    }

    async fn send_position(&mut self, player: &Player, moved: bool) -> std::io::Result<()> {
        self.inner.send_position(player, moved).await
    }

    async fn send_bullet(&self, pos: Vec2, direction: f32) -> std::io::Result<()> {
        self.inner.send_bullet(pos, direction).await
    }
}

/// Binds a server on ephemeral loopback ports, spawns it to run one match
/// for `expected` players and returns the two ports to connect to.
async fn spawn_server(expected: usize, game_time: u32) -> (u16, u16) {
    let server = Server::bind(ServerConfig {
        host: "127.0.0.1".to_string(),
        tcp_port: 0,
        udp_port: 0,
        game_time,
        countdown: Duration::ZERO,
    })
    .await
    .expect("failed to bind server");

    let tcp_port = server.tcp_addr().expect("no tcp addr").port();
    let udp_port = server.udp_addr().expect("no udp addr").port();
    tokio::spawn(server.run(expected));
    (tcp_port, udp_port)
}

async fn connect(ports: (u16, u16), name: &str) -> TestConn {
    let inner = Connection::connect("127.0.0.1", ports.0, ports.1, name)
        .await
        .expect("failed to connect");
    TestConn {
        inner,
        events: VecDeque::new(),
        packets: VecDeque::new(),
    }
}

/// Polls the control channel until an event matching the predicate shows
/// up. Non-matching events are discarded; events batched behind the match
/// stay buffered for the next wait.
async fn wait_for_event<F>(conn: &mut TestConn, mut matches: F) -> ControlEvent
where
    F: FnMut(&ControlEvent) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        conn.events
            .extend(conn.inner.poll_control().expect("control channel failed"));
        while let Some(event) = conn.events.pop_front() {
            if matches(&event) {
                return event;
            }
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for control event"
        );
        sleep(Duration::from_millis(10)).await;
    }
}

/// Drains the state channel until a packet matching the predicate shows up.
/// Packets batched behind the match stay buffered for the next wait.
async fn wait_for_state<F>(conn: &mut TestConn, mut matches: F) -> StatePacket
where
    F: FnMut(&StatePacket) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        conn.packets.extend(conn.inner.drain_state());
        while let Some(packet) = conn.packets.pop_front() {
            if matches(&packet) {
                return packet;
            }
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for state packet"
        );
        sleep(Duration::from_millis(10)).await;
    }
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    /// Join order decides slot indices, starting from zero.
    #[tokio::test]
    async fn players_get_sequential_indices() {
        let ports = spawn_server(2, 120).await;

        let alice = connect(ports, "alice").await;
        let bob = connect(ports, "bob").await;

        assert_eq!(alice.index(), 0);
        assert_eq!(bob.index(), 1);
    }

    /// A late joiner is told about everyone already in the lobby before
    /// anything else happens on its control channel.
    #[tokio::test]
    async fn roster_replayed_to_late_joiner() {
        let ports = spawn_server(2, 120).await;

        let _alice = connect(ports, "alice").await;
        let mut bob = connect(ports, "bob").await;

        let event = wait_for_event(&mut bob, |e| matches!(e, ControlEvent::Roster(_))).await;
        assert_eq!(event, ControlEvent::Roster("alice".to_string()));
    }

    /// A departing player's slot is announced to everyone left behind.
    #[tokio::test]
    async fn disconnect_is_broadcast() {
        let ports = spawn_server(2, 120).await;

        let alice = connect(ports, "alice").await;
        let mut bob = connect(ports, "bob").await;

        alice.close().await.expect("close failed");

        let event = wait_for_event(&mut bob, |e| matches!(e, ControlEvent::PlayerLeft(_))).await;
        assert_eq!(event, ControlEvent::PlayerLeft(0));
    }
}

/// MATCH LIFECYCLE TESTS
mod match_tests {
    use super::*;

    /// Once the expected number of players has joined, everyone receives
    /// the start marker, the same full-size maze and the initial timer.
    #[tokio::test]
    async fn bootstrap_delivers_maze_and_timer() {
        let ports = spawn_server(2, 120).await;

        let mut alice = connect(ports, "alice").await;
        let _bob = connect(ports, "bob").await;

        let event = wait_for_event(&mut alice, |e| matches!(e, ControlEvent::Start(_))).await;
        let ControlEvent::Start(maze) = event else {
            unreachable!()
        };
        assert_eq!(maze.width(), WORLD_WIDTH);
        assert_eq!(maze.height(), WORLD_HEIGHT);

        let event = wait_for_event(&mut alice, |e| matches!(e, ControlEvent::Timer(_))).await;
        assert_eq!(event, ControlEvent::Timer(120));
    }

    /// Every player gets a spawn record for every slot at match start.
    #[tokio::test]
    async fn bootstrap_spawns_all_players() {
        let ports = spawn_server(2, 120).await;

        let mut alice = connect(ports, "alice").await;
        let _bob = connect(ports, "bob").await;

        for expected in [0i8, 1i8] {
            let packet = wait_for_state(&mut alice, |p| {
                matches!(p, StatePacket::InitPlayer { index, .. } if *index == expected)
            })
            .await;
            let StatePacket::InitPlayer { pos, .. } = packet else {
                unreachable!()
            };
            // Spawns sit at cell centers inside the grid.
            assert!(pos.x > 0.0 && pos.x < WORLD_WIDTH as f32);
            assert!(pos.y > 0.0 && pos.y < WORLD_HEIGHT as f32);
        }
    }

    /// A position report from one client reaches the other unchanged.
    #[tokio::test]
    async fn position_reports_are_relayed() {
        let ports = spawn_server(2, 120).await;

        let mut alice = connect(ports, "alice").await;
        let mut bob = connect(ports, "bob").await;

        wait_for_event(&mut bob, |e| matches!(e, ControlEvent::Start(_))).await;

        let mut reporter = Player::new(alice.index(), Vec2::new(1.5, 1.5), "alice".to_string());
        reporter.direction = 0.25;
        alice
            .send_position(&reporter, true)
            .await
            .expect("send failed");

        let packet = wait_for_state(&mut bob, |p| {
            matches!(p, StatePacket::UpdatePlayer { index, .. } if *index == 0)
        })
        .await;
        let StatePacket::UpdatePlayer { pos, direction, .. } = packet else {
            unreachable!()
        };
        assert_approx_eq!(pos.x, 1.5);
        assert_approx_eq!(pos.y, 1.5);
        assert_approx_eq!(direction, 0.25);
    }

    /// Each point-blank bullet costs the victim a life; the one that takes
    /// the last life rewards the shooter and respawns the victim.
    #[tokio::test]
    async fn point_blank_bullets_wear_down_and_down_a_player() {
        let ports = spawn_server(2, 120).await;

        let mut alice = connect(ports, "alice").await;
        let mut bob = connect(ports, "bob").await;

        let bob_index = bob.index();
        let packet = wait_for_state(&mut bob, |p| {
            matches!(p, StatePacket::InitPlayer { index, .. } if *index == bob_index)
        })
        .await;
        let StatePacket::InitPlayer { pos: bob_pos, .. } = packet else {
            unreachable!()
        };

        // The first MAX_LIVES - 1 bullets only cost a life each.
        for _ in 1..shared::MAX_LIVES {
            alice.send_bullet(bob_pos, 0.0).await.expect("send failed");
            wait_for_event(&mut bob, |e| matches!(e, ControlEvent::Hit)).await;
        }

        // The last one downs bob: alice scores and bob respawns.
        alice.send_bullet(bob_pos, 0.0).await.expect("send failed");

        let event = wait_for_event(&mut alice, |e| matches!(e, ControlEvent::Score(_))).await;
        assert_eq!(event, ControlEvent::Score(100));

        wait_for_state(&mut bob, |p| {
            matches!(p, StatePacket::InitPlayer { index, .. } if *index == bob_index)
        })
        .await;
    }

    /// The match counts down to zero and announces the winner.
    #[tokio::test]
    async fn match_runs_to_completion() {
        let ports = spawn_server(2, 1).await;

        let mut alice = connect(ports, "alice").await;
        let _bob = connect(ports, "bob").await;

        let event = wait_for_event(&mut alice, |e| e == &ControlEvent::Timer(0)).await;
        assert_eq!(event, ControlEvent::Timer(0));

        let event = wait_for_event(&mut alice, |e| matches!(e, ControlEvent::End(_))).await;
        let ControlEvent::End(text) = event else {
            unreachable!()
        };
        assert!(text.ends_with("won!"), "unexpected end message: {}", text);
    }
}
