//! Shared fixtures for the integration tests: a scripted backend and
//! builders for snapshots and rosters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dogstory_client::client::Backend;
use dogstory_shared::{
    error::FetchError,
    math::Vec2,
    net::{
        BagItem, Direction, LootId, LostObject, MoveCommand, PlayerId, PlayerSnapshot, Roster,
        RosterEntry, Snapshot, StateResponse,
    },
};
use tokio::sync::Semaphore;

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Lets spawned tasks on the current-thread runtime run to completion.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

struct Script {
    snapshots: Mutex<VecDeque<Result<StateResponse, FetchError>>>,
    last_snapshot: Mutex<Option<StateResponse>>,
    rosters: Mutex<VecDeque<Result<Roster, FetchError>>>,
    last_roster: Mutex<Option<Roster>>,
    actions: Mutex<Vec<MoveCommand>>,

    snapshot_calls: AtomicUsize,
    roster_calls: AtomicUsize,
    snapshots_in_flight: AtomicUsize,
    max_snapshots_in_flight: AtomicUsize,

    hold_snapshots: AtomicBool,
    snapshot_gate: Semaphore,
    reject_actions: AtomicBool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            snapshots: Mutex::default(),
            last_snapshot: Mutex::default(),
            rosters: Mutex::default(),
            last_roster: Mutex::default(),
            actions: Mutex::default(),
            snapshot_calls: AtomicUsize::new(0),
            roster_calls: AtomicUsize::new(0),
            snapshots_in_flight: AtomicUsize::new(0),
            max_snapshots_in_flight: AtomicUsize::new(0),
            hold_snapshots: AtomicBool::new(false),
            snapshot_gate: Semaphore::new(0),
            reject_actions: AtomicBool::new(false),
        }
    }
}

/// Backend that serves queued responses and records what it was asked.
///
/// When a queue runs dry the last successful response is served again.
/// Clones share the same script, so a test can keep one for inspection.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_snapshot(&self, response: Result<StateResponse, FetchError>) {
        self.lock_snapshots().push_back(response);
    }

    pub fn push_roster(&self, response: Result<Roster, FetchError>) {
        self.lock_rosters().push_back(response);
    }

    /// Snapshot fetches started from now on wait until released.
    pub fn hold_snapshots(&self) {
        self.script.hold_snapshots.store(true, Ordering::SeqCst);
    }

    /// Lets one held snapshot fetch finish and stops holding new ones.
    pub fn release_snapshots(&self) {
        self.script.hold_snapshots.store(false, Ordering::SeqCst);
        self.script.snapshot_gate.add_permits(1);
    }

    /// Records every later action but answers it with a transport error.
    pub fn reject_actions(&self) {
        self.script.reject_actions.store(true, Ordering::SeqCst);
    }

    pub fn snapshot_calls(&self) -> usize {
        self.script.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn roster_calls(&self) -> usize {
        self.script.roster_calls.load(Ordering::SeqCst)
    }

    pub fn max_snapshots_in_flight(&self) -> usize {
        self.script.max_snapshots_in_flight.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<MoveCommand> {
        match self.script.actions.lock() {
            Ok(actions) => actions.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_snapshots(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<StateResponse, FetchError>>> {
        self.script
            .snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_rosters(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Roster, FetchError>>> {
        self.script
            .rosters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn serve<T: Clone>(
    queue: &mut VecDeque<Result<T, FetchError>>,
    last: &Mutex<Option<T>>,
) -> Result<T, FetchError> {
    let mut last = last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match queue.pop_front() {
        Some(Ok(value)) => {
            *last = Some(value.clone());
            Ok(value)
        }
        Some(Err(err)) => Err(err),
        None => last
            .clone()
            .ok_or_else(|| FetchError::transport("no scripted response")),
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn fetch_snapshot(&self) -> Result<StateResponse, FetchError> {
        let script = &self.script;
        script.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = script.snapshots_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        script
            .max_snapshots_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        if script.hold_snapshots.load(Ordering::SeqCst) {
            if let Ok(permit) = script.snapshot_gate.acquire().await {
                permit.forget();
            }
        }

        let result = serve(&mut self.lock_snapshots(), &script.last_snapshot);
        script.snapshots_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn fetch_roster(&self) -> Result<Roster, FetchError> {
        self.script.roster_calls.fetch_add(1, Ordering::SeqCst);
        serve(&mut self.lock_rosters(), &self.script.last_roster)
    }

    async fn send_action(&self, movement: MoveCommand) -> Result<(), FetchError> {
        match self.script.actions.lock() {
            Ok(mut actions) => actions.push(movement),
            Err(poisoned) => poisoned.into_inner().push(movement),
        }
        if self.script.reject_actions.load(Ordering::SeqCst) {
            return Err(FetchError::transport("action rejected"));
        }
        Ok(())
    }
}

/// A player entry with default-typed bag items.
pub fn player(pos: (f64, f64), speed: (f64, f64), dir: Direction, bag: &[u64]) -> PlayerSnapshot {
    PlayerSnapshot {
        pos: Vec2::new(pos.0, pos.1),
        speed: Vec2::new(speed.0, speed.1),
        dir,
        score: 0,
        bag: bag
            .iter()
            .map(|id| BagItem {
                id: LootId(*id),
                kind: 0,
            })
            .collect(),
    }
}

/// A state response; world loot `id` lies at `(id, 0)`.
pub fn state(players: Vec<(u64, PlayerSnapshot)>, loot: &[u64]) -> StateResponse {
    StateResponse {
        players: players
            .into_iter()
            .map(|(id, p)| (PlayerId(id), p))
            .collect(),
        lost_objects: loot
            .iter()
            .map(|id| {
                (
                    LootId(*id),
                    LostObject {
                        kind: 1,
                        pos: Vec2::new(*id as f64, 0.0),
                    },
                )
            })
            .collect(),
    }
}

pub fn snapshot_at(at: f64, players: Vec<(u64, PlayerSnapshot)>, loot: &[u64]) -> Snapshot {
    Snapshot::received(at, state(players, loot))
}

pub fn roster(ids: &[u64]) -> Roster {
    ids.iter()
        .map(|id| {
            (
                PlayerId(*id),
                RosterEntry {
                    name: format!("dog{id}"),
                },
            )
        })
        .collect()
}
