use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::controller::{ControllerEvent, ControllerView, GameController, RotateDirection};
use crate::error::{SessionError, StoreError};
use crate::scores::{ScoreEndpoint, ScoreSubmission};
use crate::settings::SessionSettings;
use crate::store::{SharedStore, Subscription};
use crate::timer::{TickSource, TimerFired};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Lobby,
    Playing,
    Paused,
    #[serde(rename = "gameover")]
    GameOver,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Waiting,
    Playing,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub display_name: String,
    pub color: String,
    pub status: PlayerStatus,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttackEntry {
    pub line_count: u32,
}

#[derive(Clone, Serialize, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: String,
    pub player: PlayerRecord,
}

#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Lobby,
    Waiting,
    Playing,
    GameOver,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Identity {
    None,
    Practice(String),
    Room(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Practice,
    Lobby,
    Waiting,
    AlreadyJoined,
}

#[derive(Serialize)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub display_name: String,
    pub practice: bool,
    pub paused: bool,
    pub total_lines: u32,
    pub level: u32,
    pub players: usize,
    pub board: Option<ControllerView>,
}

pub fn level_for_lines(total_lines: u32) -> u32 {
    total_lines / 10 + 1
}

fn random_color() -> String {
    format!("#{:06x}", thread_rng().gen_range(0..=0xff_ffffu32))
}

fn encode<T: Serialize>(path: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Malformed {
        path: path.to_string(),
        source,
    })
}

fn decode<T: for<'de> Deserialize<'de>>(path: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Malformed {
        path: path.to_string(),
        source,
    })
}

/// Binds one client's game to the shared room.
///
/// Every handler reads the coordinator's own identity/phase fields at the top instead of
/// trusting what was true when a notification was queued. Store snapshots may be stale by
/// the time they are handled; anything consumed (attack entries) is re-read first.
pub struct SessionCoordinator<S: SharedStore, E: ScoreEndpoint> {
    store: S,
    scores: E,
    settings: SessionSettings,
    ticks: Box<dyn TickSource>,
    identity: Identity,
    display_name: String,
    phase: SessionPhase,
    paused: bool,
    score_submitted: bool,
    total_lines: u32,
    level: u32,
    pending_garbage: u32,
    garbage_received: u32,
    session_id: Option<String>,
    roster: Vec<RosterEntry>,
    controller: Option<GameController>,
    roster_sub: Subscription,
    status_sub: Option<Subscription>,
    attack_sub: Option<Subscription>,
}

impl<S: SharedStore, E: ScoreEndpoint> SessionCoordinator<S, E> {
    pub fn new(
        store: S,
        scores: E,
        settings: SessionSettings,
        ticks: Box<dyn TickSource>,
    ) -> Result<Self, SessionError> {
        let roster_sub = store.subscribe(&settings.players_path())?;
        Ok(Self {
            store,
            scores,
            display_name: settings.guest_name.clone(),
            settings,
            ticks,
            identity: Identity::None,
            phase: SessionPhase::Lobby,
            paused: false,
            score_submitted: false,
            total_lines: 0,
            level: 1,
            pending_garbage: 0,
            garbage_received: 0,
            session_id: None,
            roster: Vec::new(),
            controller: None,
            roster_sub,
            status_sub: None,
            attack_sub: None,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn player_id(&self) -> Option<&str> {
        match &self.identity {
            Identity::None => None,
            Identity::Practice(id) | Identity::Room(id) => Some(id),
        }
    }

    fn room_id(&self) -> Option<&str> {
        match &self.identity {
            Identity::Room(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.room_id().is_some()
    }

    pub fn is_practice(&self) -> bool {
        matches!(self.identity, Identity::Practice(_))
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn total_lines(&self) -> u32 {
        self.total_lines
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn pending_garbage(&self) -> u32 {
        self.pending_garbage
    }

    /// Garbage rows received from opponents since this client started.
    pub fn garbage_received(&self) -> u32 {
        self.garbage_received
    }

    pub fn score_submitted(&self) -> bool {
        self.score_submitted
    }

    pub fn controller(&self) -> Option<&GameController> {
        self.controller.as_ref()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn join(&mut self, name: &str, practice: bool) -> Result<JoinOutcome, SessionError> {
        match self.identity {
            Identity::Room(_) => return Ok(JoinOutcome::AlreadyJoined),
            Identity::Practice(_) if self.phase != SessionPhase::Lobby => {
                return Ok(JoinOutcome::AlreadyJoined);
            }
            _ => {}
        }
        let name = name.trim();
        self.display_name = if name.is_empty() {
            self.settings.guest_name.clone()
        } else {
            name.to_string()
        };

        if practice {
            let id = format!("practice-{}", Uuid::new_v4().simple());
            info!(player = %id, name = %self.display_name, "starting practice");
            self.identity = Identity::Practice(id);
            self.start_local_game();
            return Ok(JoinOutcome::Practice);
        }

        // Two independent reads, not a transaction: a concurrent join can slip between.
        let status_path = self.settings.status_path();
        let mut status = match self.store.read(&status_path)? {
            Some(v) => Some(decode::<RoomStatus>(&status_path, v)?),
            None => None,
        };
        let roster_size = self
            .store
            .read(&self.settings.players_path())?
            .and_then(|v| v.as_object().map(|m| m.len()))
            .unwrap_or(0);

        let in_progress = matches!(status, Some(RoomStatus::Playing | RoomStatus::Paused));
        if in_progress && roster_size == 0 {
            warn!(?status, "room claims a running game with nobody in it, resetting");
            self.store.write(&status_path, encode(&status_path, &RoomStatus::Lobby)?)?;
            self.store.delete(&self.settings.attacks_path())?;
            status = Some(RoomStatus::Lobby);
        }
        let phase = if matches!(status, Some(RoomStatus::Playing | RoomStatus::Paused)) {
            SessionPhase::Waiting
        } else {
            SessionPhase::Lobby
        };

        let players_path = self.settings.players_path();
        let record = PlayerRecord {
            display_name: self.display_name.clone(),
            color: random_color(),
            status: PlayerStatus::Waiting,
        };
        let id = self.store.push(&players_path, encode(&players_path, &record)?)?;
        let player_path = self.settings.player_path(&id);
        let subscribed = self
            .store
            .remove_on_disconnect(&player_path)
            .and_then(|()| self.store.subscribe(&status_path))
            .and_then(|status| {
                let attacks = self.store.subscribe(&self.settings.attack_queue_path(&id))?;
                Ok((status, attacks))
            });
        let (status_sub, attack_sub) = match subscribed {
            Ok(subs) => subs,
            Err(e) => {
                // not joined: take the roster entry back so a retry starts clean
                if let Err(cleanup) = self.store.delete(&player_path) {
                    warn!(error = %cleanup, player = %id, "could not remove roster entry");
                }
                return Err(e.into());
            }
        };
        self.status_sub = Some(status_sub);
        self.attack_sub = Some(attack_sub);
        info!(player = %id, name = %self.display_name, ?phase, "joined room");
        self.identity = Identity::Room(id);
        self.phase = phase;
        Ok(match phase {
            SessionPhase::Waiting => JoinOutcome::Waiting,
            _ => JoinOutcome::Lobby,
        })
    }

    /// Handles every queued store notification, one at a time.
    pub fn pump(&mut self) {
        while let Some(snapshot) = self.roster_sub.try_next() {
            self.handle_roster(snapshot);
        }
        while let Some(snapshot) = self.status_sub.as_mut().and_then(|s| s.try_next()) {
            let path = self.settings.status_path();
            match snapshot.map(|v| decode::<RoomStatus>(&path, v)).transpose() {
                Ok(Some(status)) => self.handle_status(status),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "ignoring unreadable room status"),
            }
        }
        while let Some(snapshot) = self.attack_sub.as_mut().and_then(|s| s.try_next()) {
            self.handle_attacks(snapshot);
        }
    }

    fn handle_roster(&mut self, snapshot: Option<Value>) {
        let players_path = self.settings.players_path();
        let Some(Value::Object(entries)) = snapshot else {
            self.roster.clear();
            return;
        };
        self.roster = entries
            .into_iter()
            .filter_map(|(id, value)| match decode::<PlayerRecord>(&players_path, value) {
                Ok(player) => Some(RosterEntry { id, player }),
                Err(e) => {
                    warn!(player = %id, error = %e, "skipping malformed roster entry");
                    None
                }
            })
            .collect();
    }

    pub fn handle_status(&mut self, status: RoomStatus) {
        if self.is_practice() {
            return;
        }
        debug!(?status, phase = ?self.phase, "room status");
        match status {
            RoomStatus::Playing => match self.phase {
                SessionPhase::Lobby if self.is_joined() => self.start_local_game(),
                SessionPhase::Playing => self.set_paused(false),
                _ => {}
            },
            RoomStatus::Paused => {
                if self.phase == SessionPhase::Playing {
                    self.set_paused(true);
                }
            }
            RoomStatus::GameOver => {
                // A late joiner has nothing to score for the round that just ended.
                if self.phase == SessionPhase::Waiting {
                    self.phase = SessionPhase::Lobby;
                    return;
                }
                if self.phase == SessionPhase::Playing {
                    if !self.score_submitted {
                        self.submit_score();
                    }
                    self.mark_game_over();
                }
            }
            RoomStatus::Lobby => {
                if self.phase != SessionPhase::Lobby && self.is_joined() {
                    self.enter_lobby();
                }
            }
        }
    }

    pub fn handle_attacks(&mut self, snapshot: Option<Value>) {
        let Some(id) = self.room_id().map(str::to_string) else {
            return;
        };
        let Some(Value::Object(entries)) = snapshot else {
            return;
        };
        let queue = self.settings.attack_queue_path(&id);
        let mut total = 0;
        for key in entries.keys() {
            let path = format!("{}/{}", queue, key);
            // Only what is still in the store counts; stale snapshots repeat entries.
            let value = match self.store.read(&path) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, %path, "could not read attack");
                    continue;
                }
            };
            if let Err(e) = self.store.delete(&path) {
                warn!(error = %e, %path, "could not consume attack");
                continue;
            }
            match decode::<AttackEntry>(&path, value) {
                Ok(entry) => total += entry.line_count,
                Err(e) => warn!(error = %e, "dropped malformed attack"),
            }
        }
        if total > 0 {
            debug!(lines = total, "incoming garbage");
            self.pending_garbage += total;
            self.garbage_received += total;
            self.fold_pending_garbage();
        }
    }

    fn fold_pending_garbage(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.apply_garbage(self.pending_garbage);
            self.pending_garbage = 0;
        }
    }

    pub fn on_lines_cleared(&mut self, count: u32) {
        self.total_lines += count;
        self.level = level_for_lines(self.total_lines);
        if count == 0 || self.roster.len() < 2 {
            return;
        }
        let Some(me) = self.room_id() else {
            return;
        };
        let attack = AttackEntry { line_count: count };
        for entry in self.roster.iter().filter(|e| e.id != me) {
            let queue = self.settings.attack_queue_path(&entry.id);
            let sent = encode(&queue, &attack).and_then(|v| self.store.push(&queue, v));
            if let Err(e) = sent {
                warn!(error = %e, target = %entry.id, "could not send attack");
            }
        }
        debug!(lines = count, targets = self.roster.len() - 1, "attack sent");
    }

    pub fn on_game_over(&mut self) {
        self.mark_game_over();
        if self.is_practice() {
            return;
        }
        self.submit_score();
        let path = self.settings.status_path();
        let written = encode(&path, &RoomStatus::GameOver).and_then(|v| self.store.write(&path, v));
        if let Err(e) = written {
            warn!(error = %e, "could not announce game over");
        }
    }

    fn submit_score(&mut self) {
        if self.score_submitted || self.is_practice() {
            return;
        }
        self.score_submitted = true;
        let score = ScoreSubmission {
            display_name: self.display_name.clone(),
            total_lines: self.total_lines,
            level: self.level,
            session_id: self.session_id.clone().unwrap_or_default(),
        };
        match self.scores.submit(&score) {
            Ok(()) => info!(
                name = %score.display_name,
                lines = score.total_lines,
                "score submitted"
            ),
            Err(e) => warn!(error = %e, "score submission failed"),
        }
    }

    pub fn start_round(&mut self) -> Result<bool, SessionError> {
        if !self.is_joined() {
            return Ok(false);
        }
        let path = self.settings.status_path();
        self.store.write(&path, encode(&path, &RoomStatus::Playing)?)?;
        self.store.delete(&self.settings.attacks_path())?;
        info!("round started");
        Ok(true)
    }

    /// Only a player in a running round can pause or resume it.
    pub fn toggle_pause(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Playing {
            return Ok(());
        }
        if self.is_practice() {
            self.set_paused(!self.paused);
            return Ok(());
        }
        if !self.is_joined() {
            return Ok(());
        }
        let next = if self.paused {
            RoomStatus::Playing
        } else {
            RoomStatus::Paused
        };
        let path = self.settings.status_path();
        self.store.write(&path, encode(&path, &next)?)?;
        Ok(())
    }

    pub fn return_to_lobby(&mut self) {
        if self.phase == SessionPhase::GameOver {
            self.enter_lobby();
        }
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if let Some(controller) = self.controller.as_mut() {
            controller.set_paused(paused);
        }
    }

    fn start_local_game(&mut self) {
        self.phase = SessionPhase::Playing;
        self.paused = false;
        self.total_lines = 0;
        self.level = 1;
        self.pending_garbage = 0;
        self.score_submitted = false;
        self.session_id = Some(Uuid::new_v4().to_string());
        self.controller = Some(GameController::new(
            self.settings.game.clone(),
            self.ticks.scheduler(),
        ));
        self.write_own_status(PlayerStatus::Playing);
        info!(name = %self.display_name, "local game started");
    }

    fn mark_game_over(&mut self) {
        self.phase = SessionPhase::GameOver;
        if let Some(controller) = self.controller.as_mut() {
            controller.halt();
        }
        info!(name = %self.display_name, lines = self.total_lines, "game over");
    }

    fn enter_lobby(&mut self) {
        self.phase = SessionPhase::Lobby;
        self.paused = false;
        self.controller = None;
        self.write_own_status(PlayerStatus::Waiting);
    }

    fn write_own_status(&self, status: PlayerStatus) {
        let Some(id) = self.room_id() else {
            return;
        };
        let path = format!("{}/status", self.settings.player_path(id));
        if let Err(e) = encode(&path, &status).and_then(|v| self.store.write(&path, v)) {
            warn!(error = %e, "could not update player status");
        }
    }

    fn dispatch(&mut self, events: Vec<ControllerEvent>) {
        for event in events {
            match event {
                ControllerEvent::LinesCleared(count) => self.on_lines_cleared(count),
                ControllerEvent::GameOver => self.on_game_over(),
            }
        }
    }

    fn active_controller(&mut self) -> Option<&mut GameController> {
        if self.phase != SessionPhase::Playing {
            return None;
        }
        self.controller.as_mut()
    }

    pub fn on_timer(&mut self, fired: TimerFired) {
        if let Some(events) = self.active_controller().map(|c| c.on_timer(fired)) {
            self.dispatch(events);
        }
    }

    pub fn tick(&mut self) {
        if let Some(events) = self.active_controller().map(|c| c.tick()) {
            self.dispatch(events);
        }
    }

    pub fn soft_drop(&mut self) {
        if let Some(events) = self.active_controller().map(|c| c.soft_drop()) {
            self.dispatch(events);
        }
    }

    pub fn hard_drop(&mut self) {
        if let Some(events) = self.active_controller().map(|c| c.hard_drop()) {
            self.dispatch(events);
        }
    }

    pub fn move_piece(&mut self, dx: i32) -> bool {
        self.active_controller().map(|c| c.move_by(dx)).unwrap_or(false)
    }

    pub fn rotate(&mut self, dir: RotateDirection) -> bool {
        self.active_controller().map(|c| c.rotate(dir)).unwrap_or(false)
    }

    pub fn snapshot(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            display_name: self.display_name.clone(),
            practice: self.is_practice(),
            paused: self.paused,
            total_lines: self.total_lines,
            level: self.level,
            players: if self.is_practice() { 1 } else { self.roster.len() },
            board: self.controller.as_ref().map(|c| c.snapshot()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use crate::error::ScoreError;
    use crate::scores::{Leaderboard, RankingEntry};
    use crate::store::{MemoryClient, MemoryStore};
    use crate::timer::ManualTicks;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    type Client = SessionCoordinator<MemoryClient, Leaderboard>;

    fn client(store: &MemoryStore, scores: &Leaderboard) -> Client {
        SessionCoordinator::new(
            store.connect(),
            scores.clone(),
            SessionSettings::default(),
            Box::new(ManualTicks),
        )
        .unwrap()
    }

    #[derive(Clone, Default)]
    struct FlakyEndpoint {
        calls: Arc<AtomicU32>,
    }

    impl ScoreEndpoint for FlakyEndpoint {
        fn submit(&self, _score: &ScoreSubmission) -> Result<(), ScoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ScoreError::Unavailable("connection refused".into()))
        }

        fn rankings(&self) -> Result<Vec<RankingEntry>, ScoreError> {
            Err(ScoreError::Unavailable("connection refused".into()))
        }
    }

    /// Refuses attack-queue subscriptions, everything else goes through.
    #[derive(Clone)]
    struct NoAttackFeed(MemoryClient);

    impl SharedStore for NoAttackFeed {
        fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
            self.0.read(path)
        }

        fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
            self.0.write(path, value)
        }

        fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
            self.0.push(path, value)
        }

        fn delete(&self, path: &str) -> Result<(), StoreError> {
            self.0.delete(path)
        }

        fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
            if path.contains("/attacks/") {
                return Err(StoreError::Disconnected);
            }
            self.0.subscribe(path)
        }

        fn remove_on_disconnect(&self, path: &str) -> Result<(), StoreError> {
            self.0.remove_on_disconnect(path)
        }
    }

    #[test]
    fn practice_never_touches_the_room() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut c = client(&store, &scores);
        assert_eq!(c.join("solo", true).unwrap(), JoinOutcome::Practice);
        assert_eq!(c.phase(), SessionPhase::Playing);
        assert!(c.is_practice());
        c.on_lines_cleared(4);
        c.toggle_pause().unwrap();
        assert!(c.is_paused());
        c.on_game_over();
        c.handle_status(RoomStatus::Playing);
        assert_eq!(c.phase(), SessionPhase::GameOver);
        assert_eq!(store.snapshot("rooms"), None);
        assert!(scores.submissions().is_empty());
        assert!(!c.start_round().unwrap());
    }

    #[test]
    fn joining_twice_is_a_no_op() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut c = client(&store, &scores);
        assert_eq!(c.join("ann", false).unwrap(), JoinOutcome::Lobby);
        let id = c.player_id().unwrap().to_string();
        assert_eq!(c.join("ann", false).unwrap(), JoinOutcome::AlreadyJoined);
        assert_eq!(c.join("ann", true).unwrap(), JoinOutcome::AlreadyJoined);
        let players = store.snapshot("rooms/global/players").unwrap();
        assert_eq!(players.as_object().unwrap().len(), 1);
        assert_eq!(players[&id]["displayName"], "ann");
        assert_eq!(players[&id]["status"], "waiting");
    }

    #[test]
    fn blank_names_become_guest() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut c = client(&store, &scores);
        c.join("   ", false).unwrap();
        assert_eq!(c.display_name(), "Guest");
    }

    #[test]
    fn score_is_submitted_once_across_both_game_over_paths() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut c = client(&store, &scores);
        c.join("ann", false).unwrap();
        c.pump();
        c.start_round().unwrap();
        c.pump();
        assert_eq!(c.phase(), SessionPhase::Playing);
        c.on_lines_cleared(3);
        c.on_game_over();
        assert_eq!(store.snapshot("rooms/global/status"), Some(json!("gameover")));
        // our own write comes back through the subscription
        c.pump();
        c.handle_status(RoomStatus::GameOver);
        let submitted = scores.submissions();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].total_lines, 3);
        assert_eq!(submitted[0].level, 1);
        assert!(!submitted[0].session_id.is_empty());
    }

    #[test]
    fn failed_submission_is_swallowed_and_not_retried() {
        let store = MemoryStore::new();
        let endpoint = FlakyEndpoint::default();
        let mut c = SessionCoordinator::new(
            store.connect(),
            endpoint.clone(),
            SessionSettings::default(),
            Box::new(ManualTicks),
        )
        .unwrap();
        c.join("ann", false).unwrap();
        c.start_round().unwrap();
        c.pump();
        c.on_game_over();
        c.pump();
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert!(c.score_submitted());
        assert_eq!(c.phase(), SessionPhase::GameOver);
    }

    #[test]
    fn stale_attack_snapshots_do_not_double_count() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut c = client(&store, &scores);
        c.join("ann", false).unwrap();
        c.start_round().unwrap();
        c.pump();
        let queue = format!("rooms/global/attacks/{}", c.player_id().unwrap());
        let attacker = store.connect();
        attacker.push(&queue, json!({"lineCount": 2})).unwrap();
        let stale = store.snapshot(&queue);
        c.pump();
        assert_eq!(c.garbage_received(), 2);
        c.handle_attacks(stale);
        assert_eq!(c.garbage_received(), 2);
        assert_eq!(store.snapshot(&queue), None);
    }

    #[test]
    fn pause_follows_the_room() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut c = client(&store, &scores);
        c.join("ann", false).unwrap();
        c.start_round().unwrap();
        c.pump();
        c.toggle_pause().unwrap();
        c.pump();
        assert!(c.is_paused());
        assert!(c.controller().unwrap().is_paused());
        c.toggle_pause().unwrap();
        c.pump();
        assert!(!c.is_paused());
    }

    #[test]
    fn input_is_ignored_outside_a_running_game() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut c = client(&store, &scores);
        c.join("ann", false).unwrap();
        c.pump();
        assert!(!c.move_piece(1));
        c.hard_drop();
        assert!(c.controller().is_none());
        assert!(c.start_round().unwrap());
        c.pump();
        c.tick();
        assert_eq!(c.controller().unwrap().current().y, 1);
    }

    #[test]
    fn game_over_then_back_to_lobby_drops_the_board() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut c = client(&store, &scores);
        c.join("ann", false).unwrap();
        c.start_round().unwrap();
        c.pump();
        c.on_game_over();
        c.pump();
        assert_eq!(c.phase(), SessionPhase::GameOver);
        assert!(c.controller().unwrap().is_game_over());
        c.return_to_lobby();
        assert_eq!(c.phase(), SessionPhase::Lobby);
        assert!(c.controller().is_none());
        let id = c.player_id().unwrap().to_string();
        assert_eq!(
            store.snapshot(&format!("rooms/global/players/{}/status", id)),
            Some(json!("waiting"))
        );
    }

    #[test]
    fn level_grows_every_ten_lines() {
        assert_eq!(level_for_lines(0), 1);
        assert_eq!(level_for_lines(9), 1);
        assert_eq!(level_for_lines(10), 2);
        assert_eq!(level_for_lines(35), 4);
    }

    #[test]
    fn failed_join_leaves_no_roster_entry_behind() {
        let store = MemoryStore::new();
        let mut c = SessionCoordinator::new(
            NoAttackFeed(store.connect()),
            Leaderboard::new(),
            SessionSettings::default(),
            Box::new(ManualTicks),
        )
        .unwrap();
        assert!(matches!(
            c.join("ann", false),
            Err(SessionError::Store(StoreError::Disconnected))
        ));
        assert!(!c.is_joined());
        assert_eq!(store.snapshot("rooms/global/players"), None);
        assert!(c.join("ann", false).is_err());
        assert_eq!(store.snapshot("rooms/global/players"), None);
    }

    #[test]
    fn clearing_a_row_with_a_hard_drop_attacks_the_opponent() {
        let store = MemoryStore::new();
        let scores = Leaderboard::new();
        let mut a = client(&store, &scores);
        let mut b = client(&store, &scores);
        a.join("ann", false).unwrap();
        b.join("bob", false).unwrap();
        a.start_round().unwrap();
        for _ in 0..2 {
            a.pump();
            b.pump();
        }
        assert_eq!(a.roster().len(), 2);
        assert_eq!(b.phase(), SessionPhase::Playing);

        // fill the bottom row everywhere the falling piece will not land
        let controller = a.controller.as_mut().unwrap();
        let mut board = controller.board().clone();
        let piece = *controller.current();
        let landed = piece.shifted(0, board.drop_distance(&piece));
        let bottom = board.rows() as i32 - 1;
        let gaps: Vec<i32> = landed
            .cells()
            .filter(|&(_, y)| y == bottom)
            .map(|(x, _)| x)
            .collect();
        for x in 0..board.cols() as i32 {
            if !gaps.contains(&x) {
                board.set(x as usize, bottom as usize, Cell::Garbage);
            }
        }
        controller.load_board(board);

        a.hard_drop();
        assert_eq!(a.total_lines(), 1);
        b.pump();
        assert_eq!(b.garbage_received(), 1);
        assert_eq!(a.garbage_received(), 0);
        let bottom_row = b.controller().unwrap().board().row(bottom as usize);
        assert_eq!(bottom_row.iter().filter(|c| c.is_empty()).count(), 2);
    }
}
