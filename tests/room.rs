use serde_json::json;
use tetris_room::scores::Leaderboard;
use tetris_room::session::{JoinOutcome, SessionCoordinator, SessionPhase};
use tetris_room::settings::SessionSettings;
use tetris_room::store::{MemoryClient, MemoryStore, SharedStore};
use tetris_room::timer::ManualTicks;

type Client = SessionCoordinator<MemoryClient, Leaderboard>;

fn connect(store: &MemoryStore, scores: &Leaderboard) -> (Client, MemoryClient) {
    let handle = store.connect();
    let client = SessionCoordinator::new(
        handle.clone(),
        scores.clone(),
        SessionSettings::default(),
        Box::new(ManualTicks),
    )
    .unwrap();
    (client, handle)
}

fn pump_all(clients: &mut [&mut Client]) {
    // two passes so writes made while handling reach everyone
    for _ in 0..2 {
        for c in clients.iter_mut() {
            c.pump();
        }
    }
}

fn holes_in_row(client: &Client, y: usize) -> usize {
    let board = client.controller().unwrap().board();
    board.row(y).iter().filter(|c| c.is_empty()).count()
}

#[test]
fn cleared_lines_arrive_as_garbage_for_the_opponent() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (mut a, _) = connect(&store, &scores);
    let (mut b, _) = connect(&store, &scores);
    a.join("ann", false).unwrap();
    b.join("bob", false).unwrap();
    pump_all(&mut [&mut a, &mut b]);
    assert_eq!(a.roster().len(), 2);

    a.start_round().unwrap();
    pump_all(&mut [&mut a, &mut b]);
    assert_eq!(a.phase(), SessionPhase::Playing);
    assert_eq!(b.phase(), SessionPhase::Playing);

    a.on_lines_cleared(2);
    let queue = format!("rooms/global/attacks/{}", b.player_id().unwrap());
    assert!(store.snapshot(&queue).is_some());
    b.pump();

    assert_eq!(b.garbage_received(), 2);
    assert_eq!(b.pending_garbage(), 0);
    let rows = b.controller().unwrap().board().rows();
    assert_eq!(holes_in_row(&b, rows - 1), 2);
    assert_eq!(holes_in_row(&b, rows - 2), 2);
    assert_eq!(holes_in_row(&b, rows - 3), b.controller().unwrap().board().cols());
    assert_eq!(store.snapshot(&queue), None);
    // the attacker never hits itself
    assert_eq!(a.garbage_received(), 0);
}

#[test]
fn every_other_player_receives_each_attack() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (mut a, _) = connect(&store, &scores);
    let (mut b, _) = connect(&store, &scores);
    let (mut c, _) = connect(&store, &scores);
    a.join("ann", false).unwrap();
    b.join("bob", false).unwrap();
    c.join("cid", false).unwrap();
    pump_all(&mut [&mut a, &mut b, &mut c]);
    b.start_round().unwrap();
    pump_all(&mut [&mut a, &mut b, &mut c]);

    a.on_lines_cleared(1);
    a.on_lines_cleared(3);
    a.on_lines_cleared(0);
    pump_all(&mut [&mut a, &mut b, &mut c]);

    assert_eq!(b.garbage_received(), 4);
    assert_eq!(c.garbage_received(), 4);
    assert_eq!(a.garbage_received(), 0);
    assert_eq!(a.total_lines(), 4);
    assert_eq!(store.snapshot("rooms/global/attacks"), None);
}

#[test]
fn joining_a_stale_running_room_resets_it() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let seed = store.connect();
    seed.write("rooms/global/status", json!("playing")).unwrap();
    seed.push("rooms/global/attacks/ghost", json!({"lineCount": 4})).unwrap();

    let (mut a, _) = connect(&store, &scores);
    assert_eq!(a.join("ann", false).unwrap(), JoinOutcome::Lobby);
    a.pump();
    assert_eq!(a.phase(), SessionPhase::Lobby);
    assert!(a.controller().is_none());
    assert_eq!(store.snapshot("rooms/global/status"), Some(json!("lobby")));
    assert_eq!(store.snapshot("rooms/global/attacks"), None);
}

#[test]
fn late_joiner_waits_and_skips_the_running_round() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (mut a, _) = connect(&store, &scores);
    a.join("ann", false).unwrap();
    a.start_round().unwrap();
    a.pump();
    assert_eq!(a.phase(), SessionPhase::Playing);

    let (mut late, _) = connect(&store, &scores);
    assert_eq!(late.join("lou", false).unwrap(), JoinOutcome::Waiting);
    pump_all(&mut [&mut a, &mut late]);
    assert_eq!(late.phase(), SessionPhase::Waiting);
    assert!(late.controller().is_none());

    a.on_game_over();
    pump_all(&mut [&mut a, &mut late]);
    assert_eq!(late.phase(), SessionPhase::Lobby);
    assert!(!late.score_submitted());
    let submitted = scores.submissions();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].display_name, "ann");

    // next round includes the late joiner
    late.start_round().unwrap();
    pump_all(&mut [&mut a, &mut late]);
    assert_eq!(late.phase(), SessionPhase::Playing);
}

#[test]
fn remote_game_over_scores_every_player_once() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (mut a, _) = connect(&store, &scores);
    let (mut b, _) = connect(&store, &scores);
    a.join("ann", false).unwrap();
    b.join("bob", false).unwrap();
    a.start_round().unwrap();
    pump_all(&mut [&mut a, &mut b]);
    b.on_lines_cleared(5);

    a.on_game_over();
    pump_all(&mut [&mut a, &mut b]);
    assert_eq!(a.phase(), SessionPhase::GameOver);
    assert_eq!(b.phase(), SessionPhase::GameOver);
    let mut names: Vec<(String, u32)> = scores
        .submissions()
        .into_iter()
        .map(|s| (s.display_name, s.total_lines))
        .collect();
    names.sort();
    assert_eq!(names, vec![("ann".to_string(), 0), ("bob".to_string(), 5)]);
}

#[test]
fn disconnect_removes_the_roster_entry() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (mut a, _) = connect(&store, &scores);
    let (mut b, b_handle) = connect(&store, &scores);
    a.join("ann", false).unwrap();
    b.join("bob", false).unwrap();
    pump_all(&mut [&mut a, &mut b]);
    assert_eq!(a.roster().len(), 2);

    b_handle.disconnect();
    a.pump();
    assert_eq!(a.roster().len(), 1);
    assert_eq!(a.roster()[0].player.display_name, "ann");
}

#[test]
fn lobby_status_brings_everyone_back() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (mut a, handle) = connect(&store, &scores);
    a.join("ann", false).unwrap();
    a.start_round().unwrap();
    a.pump();
    assert_eq!(a.phase(), SessionPhase::Playing);
    handle.write("rooms/global/status", json!("lobby")).unwrap();
    a.pump();
    assert_eq!(a.phase(), SessionPhase::Lobby);
    assert!(a.controller().is_none());
}

#[test]
fn only_players_in_the_round_can_pause_it() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (mut a, _) = connect(&store, &scores);
    let (mut b, _) = connect(&store, &scores);
    a.join("ann", false).unwrap();
    a.pump();
    a.toggle_pause().unwrap();
    a.toggle_pause().unwrap();
    assert_eq!(store.snapshot("rooms/global/status"), None);
    assert_eq!(b.join("bob", false).unwrap(), JoinOutcome::Lobby);

    a.start_round().unwrap();
    pump_all(&mut [&mut a, &mut b]);
    let (mut late, _) = connect(&store, &scores);
    assert_eq!(late.join("lou", false).unwrap(), JoinOutcome::Waiting);
    late.toggle_pause().unwrap();
    late.toggle_pause().unwrap();
    pump_all(&mut [&mut a, &mut b, &mut late]);
    assert_eq!(store.snapshot("rooms/global/status"), Some(json!("playing")));
    assert!(!a.is_paused());
    assert!(!b.is_paused());

    b.toggle_pause().unwrap();
    pump_all(&mut [&mut a, &mut b, &mut late]);
    assert_eq!(store.snapshot("rooms/global/status"), Some(json!("paused")));
    assert!(a.is_paused());
    assert_eq!(late.phase(), SessionPhase::Waiting);
}

#[test]
fn topping_out_by_hard_drops_ends_the_round_for_everyone() {
    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (mut a, _) = connect(&store, &scores);
    let (mut b, _) = connect(&store, &scores);
    a.join("ann", false).unwrap();
    b.join("bob", false).unwrap();
    a.start_round().unwrap();
    pump_all(&mut [&mut a, &mut b]);

    let mut drops = 0;
    while a.phase() == SessionPhase::Playing {
        a.hard_drop();
        drops += 1;
        assert!(drops < 200, "stack never reached the spawn row");
    }
    assert_eq!(a.phase(), SessionPhase::GameOver);
    assert!(a.controller().unwrap().is_game_over());
    assert_eq!(store.snapshot("rooms/global/status"), Some(json!("gameover")));

    pump_all(&mut [&mut a, &mut b]);
    assert_eq!(b.phase(), SessionPhase::GameOver);
    let mut names: Vec<String> = scores
        .submissions()
        .into_iter()
        .map(|s| s.display_name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["ann".to_string(), "bob".to_string()]);
}
