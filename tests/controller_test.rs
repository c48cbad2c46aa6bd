//! Playback Controller Tests
//!
//! Drives the controller against the scripted engine on a manual clock.
//! Covers session lifecycle, direct-to-proxy failover, retry, stale
//! callbacks and user commands.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver};

use relaytv::models::{Channel, ConnectionMode, EngineId, PlaybackStatus, SessionView, SurfaceId};
use relaytv::stream::controller::{
    ControllerOptions, EventDisposition, PlaybackController, REROUTING, SOURCE_UNREACHABLE,
};
use relaytv::stream::engine::{
    EngineCall, EngineEvent, EngineEventKind, ScriptedEngine, ScriptedOutcome,
};
use relaytv::stream::ProxyRule;

const OK_URL: &str = "https://ok.example/live.m3u8";
const RELAY: &str = "https://relay.test/?u=";
const DELAY: Duration = Duration::from_secs(1);

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    ctrl: PlaybackController<ScriptedEngine>,
    events: UnboundedReceiver<EngineEvent>,
    now: Instant,
}

impl Harness {
    fn new(script: impl FnMut(&str) -> ScriptedOutcome + Send + 'static) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let ctrl = PlaybackController::new(
            ScriptedEngine::new(tx, script),
            SurfaceId::new("main"),
            ProxyRule::new(format!("{}{{url}}", RELAY)),
            ControllerOptions {
                reroute_delay: DELAY,
                ..Default::default()
            },
        );
        Self {
            ctrl,
            events,
            now: Instant::now(),
        }
    }

    /// Direct fails, proxy plays
    fn proxy_only() -> Self {
        Self::new(|url| {
            if url.starts_with(RELAY) {
                ScriptedOutcome::Play
            } else {
                ScriptedOutcome::Fail("403 Forbidden".into())
            }
        })
    }

    fn switch(&mut self, channel: &Channel) {
        self.ctrl.switch_channel(Some(channel), self.now);
    }

    /// Deliver queued events, recording each view
    fn deliver(&mut self) -> Vec<SessionView> {
        let mut views = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            self.ctrl.handle_event(event, self.now);
            views.push(self.ctrl.view());
        }
        views
    }

    /// Move the clock forward and fire timers
    fn advance(&mut self, by: Duration) -> bool {
        self.now += by;
        self.ctrl.poll_timers(self.now)
    }

    /// Deliver events and fire timers until nothing is pending
    fn settle(&mut self) -> Vec<SessionView> {
        let mut views = Vec::new();
        loop {
            views.extend(self.deliver());
            let Some(deadline) = self.ctrl.next_deadline() else {
                break;
            };
            self.now = deadline;
            self.ctrl.poll_timers(self.now);
            views.push(self.ctrl.view());
        }
        views
    }

    fn view(&self) -> SessionView {
        self.ctrl.view()
    }

    fn calls(&self) -> &[EngineCall] {
        self.ctrl.engine().calls()
    }

    fn created_urls(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Create { url, .. } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }
}

fn proxied(url: &str) -> String {
    format!("{}{}", RELAY, urlencoding::encode(url))
}

/// No engine is created while another one is still alive
fn assert_no_overlap(calls: &[EngineCall]) {
    let mut live: Option<EngineId> = None;
    for call in calls {
        match call {
            EngineCall::Create { id, .. } => {
                assert!(live.is_none(), "created {:?} while {:?} was alive", id, live);
                live = Some(*id);
            }
            EngineCall::Dispose(id) => {
                assert_eq!(live, Some(*id), "disposed an engine that was not live");
                live = None;
            }
            _ => {}
        }
    }
}

// =============================================================================
// Scenarios
// =============================================================================

/// Scenario 1: healthy source plays directly
#[test]
fn test_direct_success() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("ok", "OK", OK_URL));

    assert_eq!(h.view().status, PlaybackStatus::Loading);
    assert_eq!(h.view().connection_mode, ConnectionMode::Direct);

    h.settle();
    let view = h.view();
    assert_eq!(view.status, PlaybackStatus::Playing);
    assert_eq!(view.connection_mode, ConnectionMode::Direct);
    assert!(view.last_error.is_none());
    assert_eq!(h.created_urls(), vec![OK_URL.to_string()]);
}

/// Scenario 2: direct fails once, proxy recovers
#[test]
fn test_direct_failure_reroutes_through_proxy() {
    let mut h = Harness::proxy_only();
    h.switch(&Channel::new("geo", "Geo Blocked", OK_URL));

    let views = h.deliver();
    let rerouting = views.last().unwrap();
    assert_eq!(rerouting.status, PlaybackStatus::Loading);
    assert_eq!(rerouting.last_error.as_deref(), Some(REROUTING));
    assert_eq!(rerouting.connection_mode, ConnectionMode::Proxy);

    // Debounce holds the switch back
    assert!(!h.advance(DELAY / 2));
    assert_eq!(h.created_urls().len(), 1);

    assert!(h.advance(DELAY / 2));
    h.settle();

    let view = h.view();
    assert_eq!(view.status, PlaybackStatus::Playing);
    assert_eq!(view.connection_mode, ConnectionMode::Proxy);
    assert!(view.last_error.is_none());
    assert_eq!(h.created_urls(), vec![OK_URL.to_string(), proxied(OK_URL)]);
    assert_no_overlap(h.calls());
}

/// Scenario 3: both transports fail
#[test]
fn test_both_transports_fail() {
    let mut h = Harness::new(|_| ScriptedOutcome::Fail("connection refused".into()));
    h.switch(&Channel::new("down", "Down", OK_URL));
    h.settle();

    let view = h.view();
    assert_eq!(view.status, PlaybackStatus::Errored);
    assert_eq!(view.last_error.as_deref(), Some(SOURCE_UNREACHABLE));
    assert!(view.can_retry());
    // One direct attempt, one proxy attempt, nothing more
    assert_eq!(h.created_urls(), vec![OK_URL.to_string(), proxied(OK_URL)]);
}

/// Scenario 4: retry from errored goes back to direct
#[test]
fn test_retry_from_errored() {
    let mut h = Harness::new(|_| ScriptedOutcome::Fail("down".into()));
    h.switch(&Channel::new("down", "Down", OK_URL));
    h.settle();
    let engine = h.ctrl.current_engine().unwrap();

    assert!(h.ctrl.retry(h.now));

    let view = h.view();
    assert_eq!(view.status, PlaybackStatus::Loading);
    assert_eq!(view.connection_mode, ConnectionMode::Direct);
    assert!(view.last_error.is_none());
    assert_eq!(view.retry_generation, 1);

    // Same instance, reloaded with the direct address and resumed
    assert_eq!(h.ctrl.current_engine(), Some(engine));
    let tail = &h.calls()[h.calls().len() - 2..];
    assert_eq!(
        tail,
        &[
            EngineCall::SetSource {
                id: engine,
                url: OK_URL.to_string()
            },
            EngineCall::Play(engine),
        ]
    );
}

/// Scenario 5: channel without a source never loads
#[test]
fn test_placeholder_channel() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::placeholder("radio", "Off Air"));

    let view = h.view();
    assert_eq!(view.status, PlaybackStatus::Idle);
    assert!(view.placeholder);
    assert_eq!(view.channel_id.as_deref(), Some("radio"));
    assert!(h.calls().is_empty());
    assert!(!h.ctrl.retry(h.now));
    assert!(!h.ctrl.toggle_play());
}

/// Scenario 5b: a blank source counts as no source
#[test]
fn test_blank_source_is_placeholder() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("blank", "Blank", "  "));
    assert!(h.view().placeholder);
    assert!(h.calls().is_empty());
}

/// Scenario 6: A -> B -> C before any callback arrives
#[test]
fn test_rapid_channel_switch() {
    let mut h = Harness::new(|url| {
        if url.contains("/c") {
            ScriptedOutcome::Play
        } else {
            ScriptedOutcome::Fail("slow origin".into())
        }
    });
    h.switch(&Channel::new("a", "A", "http://origin/a"));
    h.switch(&Channel::new("b", "B", "http://origin/b"));
    h.switch(&Channel::new("c", "C", "http://origin/c"));

    let views = h.settle();
    assert!(views.iter().all(|v| v.last_error.is_none()));

    let view = h.view();
    assert_eq!(view.channel_id.as_deref(), Some("c"));
    assert_eq!(view.status, PlaybackStatus::Playing);
    assert_eq!(view.connection_mode, ConnectionMode::Direct);
    assert_eq!(h.ctrl.engine().live_instances(), 1);
    assert_no_overlap(h.calls());
}

// =============================================================================
// Invariants
// =============================================================================

/// Old engine is disposed before the new one is built, on every switch
#[test]
fn test_switch_disposes_before_create() {
    let mut h = Harness::proxy_only();
    for i in 0..5 {
        h.switch(&Channel::new(format!("ch{}", i), "Ch", format!("http://o/{}", i)));
        h.deliver();
        if i % 2 == 0 {
            h.advance(DELAY);
        }
    }
    h.ctrl.unmount();

    assert_no_overlap(h.calls());
    assert_eq!(h.ctrl.engine().live_instances(), 0);
}

/// Escalation happens at most once per session
#[test]
fn test_escalation_at_most_once() {
    let mut h = Harness::new(|_| ScriptedOutcome::Fail("down".into()));
    h.switch(&Channel::new("down", "Down", OK_URL));
    let views = h.settle();

    let mut modes: Vec<ConnectionMode> = views.iter().map(|v| v.connection_mode).collect();
    modes.dedup();
    assert_eq!(modes, vec![ConnectionMode::Direct, ConnectionMode::Proxy]);
    assert_eq!(h.created_urls().len(), 2);

    // More failures from the proxy engine change nothing
    let engine = h.ctrl.current_engine().unwrap();
    let event = EngineEvent::new(engine, 0, EngineEventKind::FatalError("again".into()));
    assert_eq!(h.ctrl.handle_event(event, h.now), EventDisposition::Ignored);
    assert_eq!(h.ctrl.next_deadline(), None);
    assert_eq!(h.view().connection_mode, ConnectionMode::Proxy);
}

/// Errored is only reachable after both transports were tried
#[test]
fn test_errored_requires_proxy_attempt() {
    let mut h = Harness::new(|_| ScriptedOutcome::Fail("down".into()));
    h.switch(&Channel::new("down", "Down", OK_URL));

    // Direct failure alone never errors, however long we wait for events
    let views = h.deliver();
    assert!(views.iter().all(|v| v.status != PlaybackStatus::Errored));

    h.settle();
    assert_eq!(h.view().status, PlaybackStatus::Errored);
    assert!(h.created_urls().contains(&proxied(OK_URL)));
}

/// Failure from a superseded engine leaves the new session untouched
#[test]
fn test_stale_fatal_error_is_discarded() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("a", "A", "http://o/a"));
    let old = h.ctrl.current_engine().unwrap();

    h.switch(&Channel::new("b", "B", "http://o/b"));
    h.settle();
    let before = h.view();

    let stale = EngineEvent::new(old, 0, EngineEventKind::FatalError("late".into()));
    assert_eq!(h.ctrl.handle_event(stale, h.now), EventDisposition::Stale);
    assert_eq!(h.view(), before);
    assert_eq!(h.ctrl.next_deadline(), None);
}

/// Direct fails on the first attempt only, the relay is always down
fn cold_start_then_direct() -> Harness {
    let mut direct_attempts = 0;
    Harness::new(move |url| {
        if url.starts_with(RELAY) {
            ScriptedOutcome::Fail("relay down".into())
        } else {
            direct_attempts += 1;
            if direct_attempts == 1 {
                ScriptedOutcome::Fail("cold start".into())
            } else {
                ScriptedOutcome::Play
            }
        }
    })
}

/// Callbacks of the load a retry replaced do not touch the new attempt
#[test]
fn test_retry_discards_callbacks_of_previous_load() {
    let mut h = cold_start_then_direct();
    h.switch(&Channel::new("geo", "Geo", OK_URL));
    h.deliver();

    // Proxy engine is built; its failure is still queued
    assert!(h.advance(DELAY));
    let engine = h.ctrl.current_engine().unwrap();

    assert!(h.ctrl.retry(h.now));
    assert_eq!(h.ctrl.engine().current_url(engine), Some(OK_URL));

    h.deliver();
    let view = h.view();
    assert_eq!(view.status, PlaybackStatus::Playing);
    assert_eq!(view.connection_mode, ConnectionMode::Direct);
    assert!(view.last_error.is_none());
    assert_eq!(h.ctrl.next_deadline(), None);

    // Nothing left that could fail the reloaded stream
    h.settle();
    assert_eq!(h.view().status, PlaybackStatus::Playing);
    assert_eq!(h.ctrl.current_engine(), Some(engine));
}

/// Same instance, earlier generation: stale
#[test]
fn test_event_from_earlier_generation_is_stale() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("ok", "OK", OK_URL));
    h.ctrl.retry(h.now);
    h.settle();
    let engine = h.ctrl.current_engine().unwrap();
    let before = h.view();
    assert_eq!(before.retry_generation, 1);

    let late = EngineEvent::new(engine, 0, EngineEventKind::FatalError("late".into()));
    assert_eq!(h.ctrl.handle_event(late, h.now), EventDisposition::Stale);
    assert_eq!(h.view(), before);

    let current = EngineEvent::new(engine, 1, EngineEventKind::BufferExhausted);
    assert_eq!(h.ctrl.handle_event(current, h.now), EventDisposition::Applied);
}

/// Pending reroute is cancelled by a channel change
#[test]
fn test_channel_change_cancels_pending_reroute() {
    let mut h = Harness::proxy_only();
    h.switch(&Channel::new("a", "A", "http://o/a"));
    h.deliver();
    assert!(h.ctrl.next_deadline().is_some());

    h.switch(&Channel::new("b", "B", "http://o/b"));
    assert_eq!(h.ctrl.next_deadline(), None);
    assert!(!h.advance(DELAY * 2));

    let view = h.view();
    assert_eq!(view.channel_id.as_deref(), Some("b"));
    assert_eq!(view.connection_mode, ConnectionMode::Direct);
    assert!(!h.created_urls().contains(&proxied("http://o/a")));
}

/// Manual retry never stays on the proxy
#[test]
fn test_retry_after_proxy_success_returns_to_direct() {
    let mut h = Harness::proxy_only();
    h.switch(&Channel::new("geo", "Geo", OK_URL));
    h.settle();
    assert_eq!(h.view().connection_mode, ConnectionMode::Proxy);

    h.ctrl.retry(h.now);
    assert_eq!(h.view().connection_mode, ConnectionMode::Direct);

    // Direct fails again, so the session may escalate once more
    h.settle();
    assert_eq!(h.view().status, PlaybackStatus::Playing);
    assert_eq!(h.view().connection_mode, ConnectionMode::Proxy);
}

/// Retry during a pending reroute cancels the reroute
#[test]
fn test_retry_cancels_pending_reroute() {
    let mut h = Harness::proxy_only();
    h.switch(&Channel::new("geo", "Geo", OK_URL));
    h.deliver();
    assert!(h.ctrl.next_deadline().is_some());

    h.ctrl.retry(h.now);
    assert_eq!(h.ctrl.next_deadline(), None);
    assert_eq!(h.view().connection_mode, ConnectionMode::Direct);
}

/// Engine that refuses to start counts as a failed attempt
#[test]
fn test_engine_creation_failure_escalates() {
    let mut h = Harness::new(|url| {
        if url.starts_with(RELAY) {
            ScriptedOutcome::Play
        } else {
            ScriptedOutcome::Unavailable("unsupported codec".into())
        }
    });
    h.switch(&Channel::new("x", "X", OK_URL));

    assert_eq!(h.ctrl.current_engine(), None);
    assert_eq!(h.view().last_error.as_deref(), Some(REROUTING));

    h.settle();
    assert_eq!(h.view().status, PlaybackStatus::Playing);
    assert_eq!(h.created_urls(), vec![proxied(OK_URL)]);
}

// =============================================================================
// Buffering
// =============================================================================

/// Buffer exhaustion stalls, next frame resumes, nothing is reported as error
#[test]
fn test_stall_and_recover() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("ok", "OK", OK_URL));
    h.settle();
    let engine = h.ctrl.current_engine().unwrap();

    let exhausted = EngineEvent::new(engine, 0, EngineEventKind::BufferExhausted);
    assert_eq!(h.ctrl.handle_event(exhausted, h.now), EventDisposition::Applied);
    assert_eq!(h.view().status, PlaybackStatus::Stalled);
    assert!(h.view().last_error.is_none());

    let frame = EngineEvent::new(engine, 0, EngineEventKind::PlayableFrame);
    assert_eq!(h.ctrl.handle_event(frame, h.now), EventDisposition::Applied);
    assert_eq!(h.view().status, PlaybackStatus::Playing);
}

/// Buffering while loading is a no-op
#[test]
fn test_buffering_while_loading_is_noop() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("ok", "OK", OK_URL));
    let engine = h.ctrl.current_engine().unwrap();

    let buffering = EngineEvent::new(engine, 0, EngineEventKind::BufferingStart);
    assert_eq!(h.ctrl.handle_event(buffering, h.now), EventDisposition::Ignored);
    assert_eq!(h.view().status, PlaybackStatus::Loading);
}

/// Proxy failure while stalled ends the session
#[test]
fn test_fatal_while_stalled_on_proxy() {
    let mut h = Harness::proxy_only();
    h.switch(&Channel::new("geo", "Geo", OK_URL));
    h.settle();
    let engine = h.ctrl.current_engine().unwrap();

    h.ctrl
        .handle_event(EngineEvent::new(engine, 0, EngineEventKind::BufferExhausted), h.now);
    h.ctrl.handle_event(
        EngineEvent::new(engine, 0, EngineEventKind::FatalError("relay reset".into())),
        h.now,
    );
    assert_eq!(h.view().status, PlaybackStatus::Errored);
}

/// End of stream is reported but changes nothing
#[test]
fn test_ended_is_reported() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("ok", "OK", OK_URL));
    h.settle();
    let engine = h.ctrl.current_engine().unwrap();
    let before = h.view();

    let ended = EngineEvent::new(engine, 0, EngineEventKind::Ended);
    assert_eq!(h.ctrl.handle_event(ended, h.now), EventDisposition::Ended);
    assert_eq!(h.view(), before);
}

// =============================================================================
// User Commands
// =============================================================================

/// Play then pause returns to the original state
#[test]
fn test_toggle_play_twice_is_identity() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("ok", "OK", OK_URL));
    h.settle();
    let engine = h.ctrl.current_engine().unwrap();
    assert_eq!(h.ctrl.engine().is_playing(engine), Some(true));

    assert!(h.ctrl.toggle_play());
    assert_eq!(h.ctrl.engine().is_playing(engine), Some(false));
    assert!(h.view().paused);

    assert!(h.ctrl.toggle_play());
    assert_eq!(h.ctrl.engine().is_playing(engine), Some(true));
    assert!(!h.view().paused);
}

/// Commands without an engine do nothing
#[test]
fn test_commands_without_engine_are_noops() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    assert!(!h.ctrl.toggle_play());
    assert!(!h.ctrl.retry(h.now));
    h.ctrl.set_volume(30);
    assert!(h.calls().is_empty());
    assert_eq!(h.view().volume, 30);
}

/// Volume is clamped, survives channel changes, and mute restores it
#[test]
fn test_volume_and_mute() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("a", "A", "http://o/a"));
    h.ctrl.set_volume(150);
    let first = h.ctrl.current_engine().unwrap();
    assert_eq!(h.ctrl.engine().volume(first), Some(100));

    h.ctrl.set_volume(40);
    h.switch(&Channel::new("b", "B", "http://o/b"));
    let second = h.ctrl.current_engine().unwrap();
    assert_eq!(h.ctrl.engine().volume(second), Some(40));

    h.ctrl.toggle_mute();
    assert_eq!(h.ctrl.engine().volume(second), Some(0));
    assert!(h.view().muted);
    assert_eq!(h.view().volume, 40);

    h.ctrl.toggle_mute();
    assert_eq!(h.ctrl.engine().volume(second), Some(40));
}

/// Autoplay off: engines start paused
#[test]
fn test_autoplay_disabled() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut ctrl = PlaybackController::new(
        ScriptedEngine::always_play(tx),
        SurfaceId::new("main"),
        ProxyRule::default(),
        ControllerOptions {
            autoplay: false,
            ..Default::default()
        },
    );
    ctrl.switch_channel(Some(&Channel::new("a", "A", "http://o/a")), Instant::now());

    let engine = ctrl.current_engine().unwrap();
    assert_eq!(ctrl.engine().is_playing(engine), Some(false));
    assert!(ctrl.view().paused);
}

/// Switching to no channel releases the engine
#[test]
fn test_switch_to_none_releases_engine() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("a", "A", "http://o/a"));
    h.ctrl.switch_channel(None, h.now);

    assert_eq!(h.ctrl.engine().live_instances(), 0);
    assert_eq!(h.view().status, PlaybackStatus::Idle);
    assert_eq!(h.view().channel_id, None);
}

/// Retry generation keeps counting across sessions
#[test]
fn test_retry_generation_is_monotonic() {
    let mut h = Harness::new(|_| ScriptedOutcome::Play);
    h.switch(&Channel::new("a", "A", "http://o/a"));
    h.ctrl.retry(h.now);
    h.ctrl.retry(h.now);
    h.switch(&Channel::new("b", "B", "http://o/b"));
    h.ctrl.retry(h.now);
    assert_eq!(h.view().retry_generation, 3);
}
