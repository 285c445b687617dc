//! Fetch scheduling and action flow of the client driver against a scripted
//! backend.

use dogstory_client::{
    client::{ClientState, GameClient},
    headless::HeadlessScene,
};
use dogstory_shared::{
    config::ClientConfig,
    error::FetchError,
    net::{Direction, MoveCommand, PlayerId},
};
use dogstory_tests::{init_tracing, player, roster, settle, state, ScriptedBackend};

const FRAME_MS: f64 = 16.0;

fn config(snapshot_every: u64, roster_every: u64) -> ClientConfig {
    ClientConfig {
        player_id: Some(PlayerId(1)),
        snapshot_every_ticks: snapshot_every,
        roster_every_ticks: roster_every,
        ..ClientConfig::default()
    }
}

fn scripted() -> ScriptedBackend {
    let backend = ScriptedBackend::new();
    backend.push_snapshot(Ok(state(
        vec![(1, player((1.0, 1.0), (0.0, 0.0), Direction::Down, &[]))],
        &[],
    )));
    backend.push_roster(Ok(roster(&[1])));
    backend
}

/// Builds a client and ticks it once, which applies the initial fetches.
async fn running_client(
    backend: &ScriptedBackend,
    cfg: &ClientConfig,
) -> anyhow::Result<GameClient<ScriptedBackend, HeadlessScene>> {
    init_tracing();
    let mut client = GameClient::new(backend.clone(), HeadlessScene::new(), cfg);
    settle().await;
    client.tick_at(FRAME_MS);
    anyhow::ensure!(
        client.state == ClientState::Running,
        "client did not start: {:?}",
        client.state
    );
    Ok(client)
}

async fn run_ticks(client: &mut GameClient<ScriptedBackend, HeadlessScene>, ticks: std::ops::RangeInclusive<u64>) {
    for tick in ticks {
        client.tick_at(tick as f64 * FRAME_MS);
        settle().await;
    }
}

#[tokio::test]
async fn starts_after_initial_fetches_and_polls_on_cadence() -> anyhow::Result<()> {
    let backend = scripted();
    let mut client = running_client(&backend, &config(5, 50)).await?;
    assert_eq!(backend.snapshot_calls(), 1);
    assert_eq!(backend.roster_calls(), 1);
    assert_eq!(client.scene().camera().map(|c| c.x), Some(1.0));

    run_ticks(&mut client, 2..=10).await;
    assert_eq!(backend.snapshot_calls(), 3);
    assert_eq!(backend.roster_calls(), 1);

    run_ticks(&mut client, 11..=50).await;
    assert_eq!(backend.roster_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn at_most_one_snapshot_fetch_in_flight() -> anyhow::Result<()> {
    let backend = scripted();
    let mut client = running_client(&backend, &config(1, 1000)).await?;

    backend.hold_snapshots();
    run_ticks(&mut client, 2..=30).await;
    assert_eq!(backend.snapshot_calls(), 2);
    assert_eq!(backend.max_snapshots_in_flight(), 1);

    backend.release_snapshots();
    settle().await;
    run_ticks(&mut client, 31..=32).await;
    assert!(backend.snapshot_calls() >= 3);
    assert_eq!(backend.max_snapshots_in_flight(), 1);
    Ok(())
}

#[tokio::test]
async fn accepted_action_refreshes_on_next_tick() -> anyhow::Result<()> {
    let backend = scripted();
    let mut client = running_client(&backend, &config(1000, 1000)).await?;

    assert!(client.key_down(MoveCommand::Up));
    settle().await;
    assert_eq!(backend.actions(), vec![MoveCommand::Up]);
    assert_eq!(backend.snapshot_calls(), 1);

    client.tick_at(2.0 * FRAME_MS);
    settle().await;
    assert_eq!(backend.snapshot_calls(), 2);

    // The refresh is one-shot.
    run_ticks(&mut client, 3..=10).await;
    assert_eq!(backend.snapshot_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn actions_follow_press_order() -> anyhow::Result<()> {
    let backend = scripted();
    let mut client = running_client(&backend, &config(1000, 1000)).await?;

    assert!(client.key_down(MoveCommand::Up));
    assert!(client.key_down(MoveCommand::Left));
    assert!(!client.key_down(MoveCommand::Left));
    assert!(client.key_up(MoveCommand::Left));
    assert!(client.key_up(MoveCommand::Up));
    assert!(!client.key_up(MoveCommand::Right));
    settle().await;

    assert_eq!(
        backend.actions(),
        vec![
            MoveCommand::Up,
            MoveCommand::Left,
            MoveCommand::Up,
            MoveCommand::Stop
        ]
    );
    assert!(client.keys().is_idle());
    Ok(())
}

#[tokio::test]
async fn unauthorized_roster_retires_the_session() -> anyhow::Result<()> {
    let backend = scripted();
    backend.push_roster(Err(FetchError::Unauthorized));
    let mut client = running_client(&backend, &config(1000, 3)).await?;

    run_ticks(&mut client, 2..=4).await;
    assert_eq!(client.state, ClientState::Retired);

    let ticks = client.tick_count();
    let calls = backend.roster_calls();
    run_ticks(&mut client, 5..=20).await;
    assert_eq!(client.tick_count(), ticks);
    assert_eq!(backend.roster_calls(), calls);
    Ok(())
}

#[tokio::test]
async fn unauthorized_snapshot_keeps_the_session() -> anyhow::Result<()> {
    let backend = scripted();
    backend.push_snapshot(Err(FetchError::Unauthorized));
    let mut client = running_client(&backend, &config(2, 1000)).await?;

    run_ticks(&mut client, 2..=3).await;
    assert_eq!(client.state, ClientState::Running);
    assert_eq!(backend.snapshot_calls(), 2);

    run_ticks(&mut client, 4..=5).await;
    assert_eq!(client.state, ClientState::Running);
    let applied = client.engine().latest_snapshot().map(|s| s.update_time);
    assert_eq!(applied, Some(5.0 * FRAME_MS));
    Ok(())
}

#[tokio::test]
async fn rejected_action_does_not_refresh() -> anyhow::Result<()> {
    let backend = scripted();
    backend.reject_actions();
    let mut client = running_client(&backend, &config(1000, 1000)).await?;

    assert!(client.key_down(MoveCommand::Up));
    settle().await;
    assert_eq!(backend.actions(), vec![MoveCommand::Up]);

    run_ticks(&mut client, 2..=5).await;
    assert_eq!(backend.snapshot_calls(), 1);
    assert_eq!(client.state, ClientState::Running);
    Ok(())
}

#[tokio::test]
async fn failed_initial_snapshot_is_retried() -> anyhow::Result<()> {
    init_tracing();
    let backend = ScriptedBackend::new();
    backend.push_snapshot(Err(FetchError::transport("connection refused")));
    backend.push_snapshot(Ok(state(
        vec![(1, player((0.0, 0.0), (0.0, 0.0), Direction::Up, &[]))],
        &[],
    )));
    backend.push_roster(Ok(roster(&[1])));

    let mut client = GameClient::new(backend.clone(), HeadlessScene::new(), &config(1000, 1000));
    settle().await;

    client.tick_at(FRAME_MS);
    settle().await;
    assert_eq!(client.state, ClientState::Initializing);
    assert!(client.engine().has_roster());
    assert_eq!(backend.snapshot_calls(), 2);

    client.tick_at(2.0 * FRAME_MS);
    assert_eq!(client.state, ClientState::Running);
    assert_eq!(backend.roster_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_snapshot_never_reaches_the_engine() -> anyhow::Result<()> {
    let backend = scripted();
    backend.push_snapshot(Err(FetchError::malformed("expected `[`")));
    let mut client = running_client(&backend, &config(2, 1000)).await?;

    run_ticks(&mut client, 2..=3).await;
    let applied = client.engine().latest_snapshot().map(|s| s.update_time);
    assert_eq!(applied, Some(FRAME_MS));
    assert_eq!(client.state, ClientState::Running);

    // The next cadence fetch succeeds again.
    run_ticks(&mut client, 4..=5).await;
    let applied = client.engine().latest_snapshot().map(|s| s.update_time);
    assert_eq!(applied, Some(5.0 * FRAME_MS));
    Ok(())
}
