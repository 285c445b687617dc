//! Client driver.
//!
//! The client maintains:
//! - The reconciliation engine and the scene it draws into
//! - Snapshot and roster fetches, each with at most one request in flight
//! - An ordered outbound action queue fed by key presses
//! - A fixed-rate tick that applies completed fetches and advances motion
//!
//! Fetches run as spawned tokio tasks. Their results come back over a channel
//! and are applied at the start of the next tick, so the engine is only ever
//! touched from the tick caller.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dogstory_shared::{
    config::ClientConfig,
    error::FetchError,
    net::{MoveCommand, PlayerId, Roster, Snapshot, StateResponse},
    render::SceneAdapter,
};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::{input::KeyState, state::GameState};

/// Server calls the driver needs.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// `GET /api/v1/game/state`
    async fn fetch_snapshot(&self) -> Result<StateResponse, FetchError>;
    /// `GET /api/v1/game/players`
    async fn fetch_roster(&self) -> Result<Roster, FetchError>;
    /// `POST /api/v1/game/player/action`
    async fn send_action(&self, movement: MoveCommand) -> Result<(), FetchError>;
}

/// Client session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Waiting for the first snapshot and roster.
    Initializing,
    /// Engine running.
    Running,
    /// The server rejected the session; nothing more is fetched.
    Retired,
}

enum Completion {
    Snapshot(Result<StateResponse, FetchError>),
    Roster {
        requested_at: f64,
        result: Result<Roster, FetchError>,
    },
    Action(Result<(), FetchError>),
}

/// High-level game client.
pub struct GameClient<B: Backend, S: SceneAdapter> {
    pub state: ClientState,

    backend: Arc<B>,
    scene: S,
    engine: GameState,
    keys: KeyState,
    epoch: Instant,
    tick: u64,

    snapshot_every: u64,
    roster_every: u64,
    snapshot_gate: Arc<Semaphore>,
    roster_gate: Arc<Semaphore>,
    /// Set by an acknowledged action; the next tick fetches a snapshot.
    instant_refresh: bool,

    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    actions_tx: mpsc::UnboundedSender<MoveCommand>,
    actions_sent: u64,
}

impl<B: Backend, S: SceneAdapter> GameClient<B, S> {
    /// Builds the client and issues the initial snapshot and roster fetches.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(backend: B, scene: S, cfg: &ClientConfig) -> Self {
        let backend = Arc::new(backend);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        spawn_action_worker(backend.clone(), actions_rx, completions_tx.clone());

        let mut client = Self {
            state: ClientState::Initializing,
            backend,
            scene,
            engine: GameState::new(cfg.tuning, cfg.player_id),
            keys: KeyState::new(),
            epoch: Instant::now(),
            tick: 0,
            snapshot_every: cfg.snapshot_every_ticks.max(1),
            roster_every: cfg.roster_every_ticks.max(1),
            snapshot_gate: Arc::new(Semaphore::new(1)),
            roster_gate: Arc::new(Semaphore::new(1)),
            instant_refresh: false,
            completions_tx,
            completions_rx,
            actions_tx,
            actions_sent: 0,
        };
        client.request_initial(0.0);
        client
    }

    /// Milliseconds since the client was created.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    /// Runs one tick at the wall clock.
    pub fn tick(&mut self) {
        let now = self.now();
        self.tick_at(now);
    }

    /// Runs one tick at clock time `now` (ms).
    pub fn tick_at(&mut self, now: f64) {
        if self.state == ClientState::Retired {
            return;
        }
        self.tick += 1;
        self.drain_completions(now);

        if self.state == ClientState::Initializing && self.engine.is_running() {
            info!(tick = self.tick, "Client running");
            self.state = ClientState::Running;
        }

        match self.state {
            ClientState::Initializing => self.request_initial(now),
            ClientState::Running => {
                if (self.instant_refresh || self.tick % self.snapshot_every == 0)
                    && self.request_snapshot()
                {
                    self.instant_refresh = false;
                }
                if self.tick % self.roster_every == 0 {
                    self.request_roster(now);
                }
                self.engine.advance(now, &mut self.scene);
            }
            ClientState::Retired => {}
        }
    }

    fn drain_completions(&mut self, now: f64) {
        while let Ok(done) = self.completions_rx.try_recv() {
            match done {
                Completion::Snapshot(Ok(response)) => {
                    let snapshot = Snapshot::received(now, response);
                    self.engine.accept_snapshot(snapshot, &mut self.scene);
                }
                Completion::Snapshot(Err(err)) => {
                    warn!(error = %err, "Snapshot fetch failed");
                }
                Completion::Roster {
                    requested_at,
                    result: Ok(roster),
                } => {
                    self.engine
                        .accept_roster(&roster, requested_at, now, &mut self.scene);
                }
                Completion::Roster {
                    result: Err(err), ..
                } if err.is_unauthorized() => {
                    warn!("Session rejected, retiring client");
                    self.state = ClientState::Retired;
                    return;
                }
                Completion::Roster {
                    result: Err(err), ..
                } => {
                    warn!(error = %err, "Roster fetch failed");
                }
                Completion::Action(Ok(())) => {
                    self.instant_refresh = true;
                }
                Completion::Action(Err(err)) => {
                    warn!(error = %err, "Action rejected");
                }
            }
        }
    }

    fn request_initial(&mut self, now: f64) {
        if !self.engine.has_snapshot() {
            self.request_snapshot();
        }
        if !self.engine.has_roster() {
            self.request_roster(now);
        }
    }

    /// Spawns a snapshot fetch unless one is already in flight.
    fn request_snapshot(&mut self) -> bool {
        let Ok(permit) = self.snapshot_gate.clone().try_acquire_owned() else {
            return false;
        };
        let backend = self.backend.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = backend.fetch_snapshot().await;
            let _ = tx.send(Completion::Snapshot(result));
            drop(permit);
        });
        true
    }

    /// Spawns a roster fetch unless one is already in flight.
    fn request_roster(&mut self, now: f64) -> bool {
        let Ok(permit) = self.roster_gate.clone().try_acquire_owned() else {
            return false;
        };
        let backend = self.backend.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = backend.fetch_roster().await;
            let _ = tx.send(Completion::Roster {
                requested_at: now,
                result,
            });
            drop(permit);
        });
        true
    }

    /// Records a key press and, if it changed the held set, sends the
    /// resulting movement command.
    pub fn key_down(&mut self, key: MoveCommand) -> bool {
        if !self.keys.key_down(key) {
            return false;
        }
        self.queue_action();
        true
    }

    pub fn key_up(&mut self, key: MoveCommand) -> bool {
        if !self.keys.key_up(key) {
            return false;
        }
        self.queue_action();
        true
    }

    fn queue_action(&mut self) {
        let movement = self.keys.last_key();
        debug!(keys = %self.keys.key_mask(), movement = movement.symbol(), "Movement changed");
        if self.state == ClientState::Retired {
            return;
        }
        if self.actions_tx.send(movement).is_err() {
            warn!("Action worker stopped");
            return;
        }
        self.actions_sent += 1;
    }

    pub fn engine(&self) -> &GameState {
        &self.engine
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn keys(&self) -> &KeyState {
        &self.keys
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn local_player(&self) -> Option<PlayerId> {
        self.engine.local_player()
    }

    /// Human-readable summary for the console `status` command.
    pub fn status_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("State: {:?}", self.state));
        out.push(format!("Tick: {}", self.tick));
        out.push(format!("Keys held: {}", self.keys.key_mask()));
        out.push(format!("Actions sent: {}", self.actions_sent));
        out.push(format!("Players tracked: {}", self.engine.current().players.len()));
        out.push(format!("Roster size: {}", self.engine.roster_len()));
        out.push(format!("Loot tracked: {}", self.engine.known_loot().len()));
        if let Some(id) = self.engine.local_player() {
            if let Some(me) = self.engine.player(id) {
                out.push(format!(
                    "You: pos=({:.2}, {:.2}) score={} bag={}",
                    me.pos.x,
                    me.pos.y,
                    me.score,
                    me.bag.len()
                ));
            }
        }
        out
    }
}

/// Sends queued actions one at a time, in queue order.
fn spawn_action_worker<B: Backend>(
    backend: Arc<B>,
    mut actions: mpsc::UnboundedReceiver<MoveCommand>,
    completions: mpsc::UnboundedSender<Completion>,
) {
    tokio::spawn(async move {
        while let Some(movement) = actions.recv().await {
            let result = backend.send_action(movement).await;
            if completions.send(Completion::Action(result)).is_err() {
                break;
            }
        }
    });
}
