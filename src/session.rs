//! Recognition session lifecycle.
//!
//! The audio matcher itself is external. This module owns what the map needs from it:
//! one session at a time, an explicit cancellation token per session, exactly one
//! accepted terminal outcome, and no discovery from a result that lands after the
//! session was cancelled or timed out.
//!
//! Control surfaces (widgets, lock-screen controls) drive sessions with
//! [`SessionCommand`] messages instead of global notifications.

use geo::Point;
use parking_lot::Mutex;
use spotmap_types::point::{GeoPoint, PointId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::compute::validation::validate_geographic_point;
use crate::config::SessionConfig;
use crate::error::Result;

/// Shared cancellation flag handed to the matcher with each session.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A successful match reported by the recognition service.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub title: String,
    pub artist: String,
    pub external_ids: BTreeMap<String, String>,
    pub artwork_ref: Option<String>,
}

impl Match {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            external_ids: BTreeMap::new(),
            artwork_ref: None,
        }
    }

    pub fn with_external_id(mut self, catalog: impl Into<String>, id: impl Into<String>) -> Self {
        self.external_ids.insert(catalog.into(), id.into());
        self
    }

    pub fn with_artwork(mut self, artwork_ref: impl Into<String>) -> Self {
        self.artwork_ref = Some(artwork_ref.into());
        self
    }
}

/// Terminal event delivered by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Matched(Match),
    NoMatch,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    UserDismissed,
    Backgrounded,
    TimedOut,
    /// A newer session was started.
    Superseded,
}

/// Messages from control surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start { location: Point<f64> },
    Stop { reason: CancelReason },
}

/// What the caller holds for a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub token: CancellationToken,
}

/// Accepted session result.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionResult {
    Discovered(GeoPoint),
    NoMatch,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Cancelled,
    TimedOut,
    /// The session already delivered its outcome or was never started here.
    NotActive,
}

/// Result of handing an outcome to the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Accepted(SessionResult),
    Dropped(DropReason),
}

#[derive(Debug)]
struct ActiveSession {
    id: Uuid,
    token: CancellationToken,
    location: Point<f64>,
    started_at: SystemTime,
}

/// Owns the single running recognition session.
#[derive(Debug)]
pub struct SessionManager {
    timeout: Duration,
    current: Mutex<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            current: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.timeout())
    }

    /// Start a session at `location`. A session already running is cancelled as
    /// superseded.
    pub fn start(&self, location: Point<f64>, now: SystemTime) -> Result<SessionHandle> {
        validate_geographic_point(&location)?;

        let session = ActiveSession {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
            location,
            started_at: now,
        };
        let handle = SessionHandle {
            id: session.id,
            token: session.token.clone(),
        };

        let mut current = self.current.lock();
        if let Some(previous) = current.replace(session) {
            log::debug!("Session {} superseded by {}", previous.id, handle.id);
            previous.token.cancel();
        }
        Ok(handle)
    }

    /// Cancel the running session. Returns `false` if none was running.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        match self.current.lock().take() {
            Some(session) => {
                log::debug!("Session {} cancelled: {:?}", session.id, reason);
                session.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Apply a control-surface command. `Start` returns the new session's handle.
    pub fn handle_command(
        &self,
        command: SessionCommand,
        now: SystemTime,
    ) -> Result<Option<SessionHandle>> {
        match command {
            SessionCommand::Start { location } => self.start(location, now).map(Some),
            SessionCommand::Stop { reason } => {
                self.cancel(reason);
                Ok(None)
            }
        }
    }

    /// Cancel the running session if it outlived the timeout.
    pub fn expire(&self, now: SystemTime) -> bool {
        let mut current = self.current.lock();
        let timed_out = current
            .as_ref()
            .is_some_and(|session| self.is_timed_out(session, now));
        if timed_out && let Some(session) = current.take() {
            log::debug!("Session {} timed out", session.id);
            session.token.cancel();
        }
        timed_out
    }

    pub fn is_running(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Hand over the terminal outcome of a session.
    ///
    /// The first outcome for the running session is accepted and ends it. Outcomes for
    /// cancelled, timed-out or already finished sessions are dropped.
    pub fn deliver(
        &self,
        handle: &SessionHandle,
        outcome: RecognitionOutcome,
        now: SystemTime,
    ) -> Delivery {
        let mut current = self.current.lock();

        if handle.token.is_cancelled() {
            // the matcher may cancel through its own token; the session still ends here
            if current.as_ref().is_some_and(|session| session.id == handle.id) {
                current.take();
            }
            log::debug!("Dropping late result for cancelled session {}", handle.id);
            return Delivery::Dropped(DropReason::Cancelled);
        }

        let session = match current.take() {
            Some(session) if session.id == handle.id => session,
            other => {
                *current = other;
                return Delivery::Dropped(DropReason::NotActive);
            }
        };

        if self.is_timed_out(&session, now) {
            log::debug!("Dropping result for timed-out session {}", session.id);
            session.token.cancel();
            return Delivery::Dropped(DropReason::TimedOut);
        }

        let result = match outcome {
            RecognitionOutcome::Matched(found) => {
                SessionResult::Discovered(discovery_from_match(found, &session))
            }
            RecognitionOutcome::NoMatch => SessionResult::NoMatch,
            RecognitionOutcome::Error(reason) => SessionResult::Failed(reason),
        };
        Delivery::Accepted(result)
    }

    fn is_timed_out(&self, session: &ActiveSession, now: SystemTime) -> bool {
        now.duration_since(session.started_at)
            .is_ok_and(|elapsed| elapsed > self.timeout)
    }
}

fn discovery_from_match(found: Match, session: &ActiveSession) -> GeoPoint {
    let mut point = GeoPoint::new(PointId::generate(), session.location, found.title)
        .with_subtitle(found.artist)
        .with_discovered_at(session.started_at);
    point.external_ids = found.external_ids;
    point.image_ref = found.artwork_ref;
    point
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn manager() -> SessionManager {
        SessionManager::from_config(&SessionConfig::default())
    }

    #[test]
    fn test_match_becomes_discovery() {
        let sessions = manager();
        let handle = sessions.start(Point::new(-0.1278, 51.5074), at(100)).unwrap();

        let found = Match::new("Waterloo Sunset", "The Kinks")
            .with_external_id("apple_music", "12345")
            .with_artwork("https://example.invalid/art.jpg");
        let delivery = sessions.deliver(&handle, RecognitionOutcome::Matched(found), at(110));

        let Delivery::Accepted(SessionResult::Discovered(point)) = delivery else {
            panic!("expected an accepted discovery, got {:?}", delivery);
        };
        assert_eq!(point.display_title, "Waterloo Sunset");
        assert_eq!(point.subtitle.as_deref(), Some("The Kinks"));
        assert_eq!(point.coordinate, Point::new(-0.1278, 51.5074));
        assert_eq!(point.discovered_at, at(100));
        assert_eq!(point.external_ids.get("apple_music").map(String::as_str), Some("12345"));
        assert!(!sessions.is_running());
    }

    #[test]
    fn test_only_first_outcome_is_accepted() {
        let sessions = manager();
        let handle = sessions.start(Point::new(0.0, 0.0), at(0)).unwrap();

        assert_eq!(
            sessions.deliver(&handle, RecognitionOutcome::NoMatch, at(1)),
            Delivery::Accepted(SessionResult::NoMatch)
        );
        assert_eq!(
            sessions.deliver(&handle, RecognitionOutcome::Error("late".into()), at(2)),
            Delivery::Dropped(DropReason::NotActive)
        );
    }

    #[test]
    fn test_result_after_cancel_is_dropped() {
        let sessions = manager();
        let handle = sessions.start(Point::new(0.0, 0.0), at(0)).unwrap();
        assert!(sessions.cancel(CancelReason::UserDismissed));
        assert!(handle.token.is_cancelled());

        let late = RecognitionOutcome::Matched(Match::new("Late", "Artist"));
        assert_eq!(
            sessions.deliver(&handle, late, at(1)),
            Delivery::Dropped(DropReason::Cancelled)
        );
    }

    #[test]
    fn test_matcher_cancelling_its_token_ends_session() {
        let sessions = manager();
        let handle = sessions.start(Point::new(0.0, 0.0), at(0)).unwrap();
        handle.token.cancel();

        assert_eq!(
            sessions.deliver(&handle, RecognitionOutcome::NoMatch, at(1)),
            Delivery::Dropped(DropReason::Cancelled)
        );
        assert!(!sessions.is_running());
    }

    #[test]
    fn test_superseded_delivery_leaves_newer_session_running() {
        let sessions = manager();
        let first = sessions.start(Point::new(0.0, 0.0), at(0)).unwrap();
        let second = sessions.start(Point::new(1.0, 1.0), at(5)).unwrap();
        assert!(first.token.is_cancelled());

        assert_eq!(
            sessions.deliver(&first, RecognitionOutcome::NoMatch, at(6)),
            Delivery::Dropped(DropReason::Cancelled)
        );
        assert!(sessions.is_running());
        assert_eq!(
            sessions.deliver(&second, RecognitionOutcome::NoMatch, at(7)),
            Delivery::Accepted(SessionResult::NoMatch)
        );
    }

    #[test]
    fn test_result_after_timeout_is_dropped() {
        let sessions = manager();
        let handle = sessions.start(Point::new(0.0, 0.0), at(0)).unwrap();

        let result = sessions.deliver(&handle, RecognitionOutcome::NoMatch, at(31));
        assert_eq!(result, Delivery::Dropped(DropReason::TimedOut));
        assert!(handle.token.is_cancelled());
        assert!(!sessions.is_running());
    }

    #[test]
    fn test_expire() {
        let sessions = manager();
        let handle = sessions.start(Point::new(0.0, 0.0), at(0)).unwrap();
        assert!(!sessions.expire(at(10)));
        assert!(sessions.expire(at(45)));
        assert!(handle.token.is_cancelled());
        assert!(!sessions.expire(at(50)));
    }

    #[test]
    fn test_new_session_supersedes_running_one() {
        let sessions = manager();
        let first = sessions.start(Point::new(0.0, 0.0), at(0)).unwrap();
        let second = sessions.start(Point::new(1.0, 1.0), at(5)).unwrap();

        assert!(first.token.is_cancelled());
        assert_eq!(
            sessions.deliver(&first, RecognitionOutcome::NoMatch, at(6)),
            Delivery::Dropped(DropReason::Cancelled)
        );
        assert!(matches!(
            sessions.deliver(&second, RecognitionOutcome::NoMatch, at(6)),
            Delivery::Accepted(_)
        ));
    }

    #[test]
    fn test_commands() {
        let sessions = manager();
        let handle = sessions
            .handle_command(SessionCommand::Start { location: Point::new(0.0, 0.0) }, at(0))
            .unwrap()
            .unwrap();
        assert!(sessions.is_running());

        let stopped = sessions
            .handle_command(SessionCommand::Stop { reason: CancelReason::Backgrounded }, at(1))
            .unwrap();
        assert!(stopped.is_none());
        assert!(handle.token.is_cancelled());
        assert!(!sessions.cancel(CancelReason::UserDismissed));
    }

    #[test]
    fn test_invalid_location_rejected() {
        let sessions = manager();
        assert!(sessions.start(Point::new(f64::NAN, 0.0), at(0)).is_err());
        assert!(!sessions.is_running());
    }
}
