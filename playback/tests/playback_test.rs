use anyhow::Result;
use common::{CursorSample, PlayerInfo, Recording, TimedEvent};
use playback::dispatcher::LogMode;
use playback::{Dispatcher, EventLog, PlaybackConfig, PlaybackController, PlaybackError};
use serde_json::{Value, json};
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn event(t: u64) -> TimedEvent {
    TimedEvent {
        t,
        msg: json!({ "type": "tick", "t": t }),
    }
}

fn cursor(t: u64, player: &str, x: f64) -> CursorSample {
    CursorSample {
        t,
        player_id: player.to_string(),
        x,
        y: x * 2.0,
    }
}

fn players() -> Vec<PlayerInfo> {
    vec![
        PlayerInfo {
            id: "p1".to_string(),
            name: "Ann".to_string(),
            color: "#e33".to_string(),
            icon: "ladybug".to_string(),
        },
        PlayerInfo {
            id: "p2".to_string(),
            name: "Bo".to_string(),
            color: "#3e3".to_string(),
            icon: "beetle".to_string(),
        },
    ]
}

fn three_events() -> Recording {
    Recording::new(vec![event(100), event(300), event(600)], vec![], players())
}

fn mixed() -> Recording {
    Recording::new(
        vec![event(0), event(100), event(250), event(250), event(700)],
        vec![
            cursor(50, "p1", 1.0),
            cursor(250, "p2", 2.0),
            cursor(400, "p1", 3.0),
            cursor(900, "p2", 4.0),
        ],
        players(),
    )
}

fn applied_times(controller: &PlaybackController<EventLog>) -> Vec<u64> {
    controller.with_dispatcher(|log| {
        log.messages()
            .iter()
            .filter_map(|m| m["t"].as_u64())
            .collect()
    })
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

async fn advance(n: u64) {
    tokio::time::advance(ms(n)).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn natural_playback_delivers_in_time_order() {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());
    assert!(controller.is_playing());
    assert_eq!(controller.duration(), ms(600));

    advance(99).await;
    assert!(applied_times(&controller).is_empty());
    advance(1).await;
    assert_eq!(applied_times(&controller), vec![100]);
    advance(200).await;
    assert_eq!(applied_times(&controller), vec![100, 300]);
    advance(300).await;
    assert_eq!(applied_times(&controller), vec![100, 300, 600]);
    assert!(controller.is_finished());
    assert_eq!(controller.current_time(), ms(600));
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_deliver_each_entry_once() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());

    advance(250).await;
    controller.pause();
    assert!(controller.is_paused());
    assert_eq!(controller.current_time(), ms(250));

    advance(1_000).await;
    assert_eq!(applied_times(&controller), vec![100]);
    assert_eq!(controller.current_time(), ms(250));

    controller.resume()?;
    advance(49).await;
    assert_eq!(applied_times(&controller), vec![100]);
    advance(1).await;
    assert_eq!(applied_times(&controller), vec![100, 300]);
    advance(2_000).await;
    assert_eq!(applied_times(&controller), vec![100, 300, 600]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_pause_and_resume_are_no_ops() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());
    controller.resume()?;
    advance(150).await;
    controller.pause();
    controller.pause();
    controller.resume()?;
    controller.resume()?;
    advance(1_000).await;
    assert_eq!(applied_times(&controller), vec![100, 300, 600]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn speed_change_rescales_remaining_delay() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());

    advance(150).await;
    controller.set_speed(4.0)?;
    assert_eq!(controller.current_time(), ms(150));
    assert_eq!(controller.speed(), 4.0);

    // (300 - 150) / 4 = 37.5 ms of wall time
    advance(37).await;
    assert_eq!(applied_times(&controller), vec![100]);
    advance(1).await;
    assert_eq!(applied_times(&controller), vec![100, 300]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn speed_change_while_paused_applies_on_resume() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());

    advance(200).await;
    controller.pause();
    controller.set_speed(2.0)?;
    assert!(controller.is_paused());
    assert_eq!(controller.current_time(), ms(200));
    advance(500).await;
    assert_eq!(applied_times(&controller), vec![100]);

    controller.resume()?;
    advance(50).await;
    assert_eq!(applied_times(&controller), vec![100, 300]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cycle_speed_walks_configured_steps() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    assert!(matches!(controller.cycle_speed(), Err(PlaybackError::NotStarted)));

    controller.start(three_events());
    assert_eq!(controller.cycle_speed()?, 2.0);
    assert_eq!(controller.cycle_speed()?, 4.0);
    assert_eq!(controller.cycle_speed()?, 1.0);

    assert!(matches!(controller.set_speed(0.0), Err(PlaybackError::InvalidSpeed(_))));
    assert_eq!(controller.speed(), 1.0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn extreme_speeds_are_rejected_and_playback_keeps_running() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());
    advance(50).await;

    for speed in [1e300, 1e-20, f64::MAX] {
        assert!(matches!(
            controller.set_speed(speed),
            Err(PlaybackError::SpeedOutOfRange { .. })
        ));
    }
    assert_eq!(controller.speed(), 1.0);

    advance(100).await;
    assert_eq!(controller.current_time(), ms(150));
    assert_eq!(applied_times(&controller), vec![100]);

    let config = PlaybackConfig {
        speed_steps: vec![1.0, 1e300],
        ..PlaybackConfig::default()
    };
    assert!(PlaybackController::with_config(EventLog::new(), config).is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn seek_replays_prefix_and_is_idempotent() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    let recording = mixed();
    controller.start(recording.clone());
    controller.pause();

    for target in [0u64, 99, 100, 250, 400, 899, 900] {
        let expected: Vec<Value> = recording
            .events
            .iter()
            .filter(|e| e.t <= target)
            .map(|e| e.msg.clone())
            .collect();

        controller.seek(ms(target))?;
        let first = controller.with_dispatcher(|log| (log.messages().to_vec(), log.cursors().clone()));
        assert_eq!(first.0, expected, "messages after seek({target})");

        controller.seek(ms(target))?;
        let second = controller.with_dispatcher(|log| (log.messages().to_vec(), log.cursors().clone()));
        assert_eq!(first, second, "repeated seek({target})");
        assert_eq!(controller.current_time(), ms(target));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn seek_while_paused_schedules_nothing() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());
    controller.pause();

    controller.seek(ms(200))?;
    assert!(controller.is_paused());
    assert!(!controller.has_pending());
    advance(5_000).await;
    assert_eq!(applied_times(&controller), vec![100]);

    controller.resume()?;
    advance(100).await;
    assert_eq!(applied_times(&controller), vec![100, 300]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn seek_while_playing_continues_from_target() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());
    advance(50).await;

    controller.seek(ms(300))?;
    assert!(controller.is_playing());
    assert_eq!(applied_times(&controller), vec![100, 300]);

    advance(299).await;
    assert_eq!(applied_times(&controller), vec![100, 300]);
    advance(1).await;
    assert_eq!(applied_times(&controller), vec![100, 300, 600]);

    controller.seek_by(-450)?;
    assert_eq!(controller.current_time(), ms(150));
    assert_eq!(applied_times(&controller), vec![100]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn seek_beyond_end_clamps_with_nothing_pending() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());

    controller.seek(ms(10_000))?;
    assert_eq!(controller.current_time(), ms(600));
    assert_eq!(applied_times(&controller), vec![100, 300, 600]);
    settle().await;
    assert!(!controller.has_pending());
    assert!(controller.is_finished());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn natural_playback_matches_seek_to_end() -> Result<()> {
    let recording = mixed();

    let mut played = PlaybackController::new(EventLog::new());
    played.start(recording.clone());
    advance(1_000).await;

    let mut seeked = PlaybackController::new(EventLog::new());
    seeked.start(recording.clone());
    seeked.seek(recording.duration())?;

    let state = |c: &PlaybackController<EventLog>| {
        c.with_dispatcher(|log| (log.messages().to_vec(), log.cursors().clone(), log.cursor_samples()))
    };
    assert_eq!(state(&played), state(&seeked));
    assert_eq!(state(&played).2, 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_with_pending_timers_dispatches_nothing_more() {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(mixed());
    advance(120).await;
    let delivered = controller.with_dispatcher(EventLog::total_delivered);

    controller.stop();
    assert_eq!(controller.status(), playback::PlaybackStatus::Stopped);
    advance(5_000).await;

    assert_eq!(controller.with_dispatcher(EventLog::total_delivered), delivered);
    controller.with_dispatcher(|log| {
        assert_eq!(log.mode(), LogMode::Live);
        assert!(log.messages().is_empty());
    });
    assert_eq!(controller.duration(), Duration::ZERO);
    assert_eq!(controller.current_time(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.stop();
    assert_eq!(controller.with_dispatcher(EventLog::resets), 0);

    controller.start(three_events());
    controller.stop();
    controller.stop();
    assert_eq!(controller.with_dispatcher(EventLog::resets), 2);
    assert!(matches!(controller.resume(), Err(PlaybackError::NotStarted)));
    assert!(matches!(controller.seek(ms(10)), Err(PlaybackError::NotStarted)));
}

#[tokio::test(start_paused = true)]
async fn duration_spans_both_streams() {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(Recording::new(
        vec![event(500)],
        vec![cursor(900, "p1", 0.0)],
        players(),
    ));
    assert_eq!(controller.duration(), ms(900));
}

#[tokio::test(start_paused = true)]
async fn empty_recording_starts_finished() {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(Recording::default());
    assert_eq!(controller.duration(), Duration::ZERO);
    assert!(controller.is_finished());
    settle().await;
    assert!(!controller.has_pending());
    assert_eq!(controller.with_dispatcher(EventLog::total_delivered), 0);
}

#[tokio::test(start_paused = true)]
async fn start_primes_dispatcher_and_applies_time_zero_entries() {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(mixed());
    controller.with_dispatcher(|log| {
        assert_eq!(log.mode(), LogMode::Playback);
        assert_eq!(log.players(), players().as_slice());
        assert_eq!(log.messages(), &[json!({ "type": "tick", "t": 0 })]);
    });
}

#[tokio::test(start_paused = true)]
async fn toggle_on_finished_session_restarts() -> Result<()> {
    let mut controller = PlaybackController::new(EventLog::new());
    controller.start(three_events());
    advance(700).await;
    assert!(controller.is_finished());

    controller.toggle_pause()?;
    assert!(controller.is_playing());
    assert_eq!(controller.current_time(), Duration::ZERO);
    assert!(applied_times(&controller).is_empty());

    controller.toggle_pause()?;
    assert!(controller.is_paused());
    controller.toggle_pause()?;
    assert!(controller.is_playing());
    advance(100).await;
    assert_eq!(applied_times(&controller), vec![100]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn progress_stream_follows_playhead_and_stops_on_pause() -> Result<()> {
    let config = PlaybackConfig {
        progress_interval_ms: 10,
        ..PlaybackConfig::default()
    };
    let mut controller = PlaybackController::with_config(EventLog::new(), config)?;
    let progress = controller.subscribe_progress();
    controller.start(three_events());

    advance(300).await;
    let seen = *progress.borrow();
    assert_eq!(seen.duration, ms(600));
    assert!(seen.current >= ms(290) && seen.current <= ms(300), "{seen:?}");
    assert_eq!(seen.current_label(), "0:00");

    controller.pause();
    let paused = *progress.borrow();
    assert_eq!(paused.status, playback::PlaybackStatus::Paused);
    assert_eq!(paused.current, ms(300));
    assert_eq!(paused.ratio(), 0.5);

    advance(200).await;
    assert_eq!(*progress.borrow(), paused);
    Ok(())
}

struct Flaky {
    applied: Vec<u64>,
}

impl Dispatcher for Flaky {
    fn apply(&mut self, msg: &Value) -> Result<()> {
        let t = msg["t"].as_u64().unwrap_or_default();
        if t == 300 {
            anyhow::bail!("cannot render message at {t}");
        }
        self.applied.push(t);
        Ok(())
    }

    fn reset_for_playback(&mut self, _players: &[PlayerInfo]) {
        self.applied.clear();
    }

    fn reset_to_live(&mut self) {}
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_does_not_block_later_ones() {
    let mut controller = PlaybackController::new(Flaky { applied: vec![] });
    controller.start(three_events());
    advance(700).await;
    assert_eq!(controller.with_dispatcher(|d| d.applied.clone()), vec![100, 600]);
}
