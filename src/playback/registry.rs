//! One playback session per connection
//!
//! Every active session is owned by its registry entry together with the
//! handle of the tokio task that ticks it. Entries are removed explicitly on
//! stop, supersede, disconnect and exhaustion; removing an entry always
//! cancels its timer before the call returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::core::{ChannelSelection, StreamError, DEFAULT_CHANNEL_COUNT};
use crate::input::DatasetSource;
use crate::playback::{PlaybackConfig, PlaybackSession, PlaybackState, DEFAULT_INTERVAL_MS};
use crate::transport::{ConnectionId, Emission, Transport};

type SharedSession = Arc<Mutex<PlaybackSession>>;
type SessionTable = Mutex<HashMap<ConnectionId, ActiveSession>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settings shared by every session the registry creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Highest valid channel index
    pub channel_count: usize,
    /// Interval used when a request carries none
    pub default_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channel_count: DEFAULT_CHANNEL_COUNT,
            default_interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

/// A streaming session and the task driving it
struct ActiveSession {
    session: SharedSession,
    timer: JoinHandle<()>,
}

impl ActiveSession {
    /// Mark the session stopped under its own lock, then abort the timer.
    /// A tick already holding the lock finishes first; every later tick sees
    /// `Stopped` and emits nothing.
    fn cancel(self) {
        lock(&self.session).stop();
        self.timer.abort();
    }
}

/// Decrements the running-timer count when a timer task ends or is dropped
struct TimerGuard(Arc<AtomicUsize>);

impl TimerGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SessionRegistry {
    sessions: Arc<SessionTable>,
    source: Arc<dyn DatasetSource>,
    transport: Arc<dyn Transport>,
    config: RegistryConfig,
    running_timers: Arc<AtomicUsize>,
}

impl SessionRegistry {
    pub fn new(
        source: Arc<dyn DatasetSource>,
        transport: Arc<dyn Transport>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            source,
            transport,
            config,
            running_timers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    /// Replace whatever is streaming on `connection` with a new session
    ///
    /// Any previous session is stopped before anything else happens. On
    /// failure the client receives an `{ "error": ... }` emission and the
    /// connection is left idle.
    pub async fn start(
        &self,
        connection: ConnectionId,
        query: &str,
        interval_ms: Option<u64>,
    ) -> Result<(), StreamError> {
        if self.stop(connection) {
            info!("Stopping previous stream on {}", connection);
        }

        match self.prepare(connection, query, interval_ms).await {
            Ok(session) => {
                info!(
                    "Streaming {} rows on {} (channels {:?}, every {}ms)",
                    session.total_rows(),
                    connection,
                    session.selection().iter().collect::<Vec<_>>(),
                    session.interval().as_millis()
                );
                self.install(session);
                Ok(())
            }
            Err(err) => {
                warn!("Rejected stream request on {}: {}", connection, err);
                self.notify(connection, Emission::Error(err.client_message().to_string()));
                Err(err)
            }
        }
    }

    /// Parse, load and project; the returned session is ready to stream
    async fn prepare(
        &self,
        connection: ConnectionId,
        query: &str,
        interval_ms: Option<u64>,
    ) -> Result<PlaybackSession, StreamError> {
        let selection = ChannelSelection::parse(query, self.config.channel_count)?;
        let config = PlaybackConfig::from_request(interval_ms, self.config.default_interval_ms);

        let mut session = PlaybackSession::new(connection, selection, config);
        session.begin_loading();

        let dataset = match self.source.load().await {
            Ok(dataset) => dataset,
            Err(err) => {
                session.fail();
                return Err(err);
            }
        };

        session.start_streaming(&dataset)?;
        Ok(session)
    }

    /// Register the session and spawn its timer, cancelling any entry that
    /// appeared for the same connection in the meantime
    fn install(&self, session: PlaybackSession) {
        let connection = session.connection();
        let interval = session.interval();
        let session = Arc::new(Mutex::new(session));

        let mut sessions = lock(&self.sessions);
        if let Some(previous) = sessions.remove(&connection) {
            debug!("Superseding concurrent session on {}", connection);
            previous.cancel();
        }

        let timer = tokio::spawn(run_timer(
            session.clone(),
            Arc::downgrade(&self.sessions),
            self.transport.clone(),
            interval,
            TimerGuard::new(&self.running_timers),
        ));

        sessions.insert(connection, ActiveSession { session, timer });
    }

    /// Stop and discard the session on `connection`, if any
    pub fn stop(&self, connection: ConnectionId) -> bool {
        let previous = lock(&self.sessions).remove(&connection);
        match previous {
            Some(active) => {
                active.cancel();
                debug!("Stopped stream on {}", connection);
                true
            }
            None => false,
        }
    }

    /// Connection closed; same as [`stop`](Self::stop)
    pub fn on_disconnect(&self, connection: ConnectionId) {
        if self.stop(connection) {
            info!("Client {} disconnected mid-stream", connection);
        }
    }

    /// Stop every session
    pub fn shutdown(&self) {
        let drained: Vec<ActiveSession> = lock(&self.sessions).drain().map(|(_, s)| s).collect();
        let count = drained.len();
        for active in drained {
            active.cancel();
        }
        if count > 0 {
            info!("Stopped {} stream(s) on shutdown", count);
        }
    }

    /// State of the session on `connection`; `Idle` when there is none
    pub fn state(&self, connection: ConnectionId) -> PlaybackState {
        lock(&self.sessions)
            .get(&connection)
            .map(|active| lock(&active.session).state())
            .unwrap_or(PlaybackState::Idle)
    }

    /// Cursor of the session on `connection`
    pub fn cursor(&self, connection: ConnectionId) -> Option<usize> {
        lock(&self.sessions)
            .get(&connection)
            .map(|active| lock(&active.session).cursor())
    }

    /// Number of connections with a registered session
    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Number of timer tasks that have not yet finished or been dropped
    pub fn running_timers(&self) -> usize {
        self.running_timers.load(Ordering::SeqCst)
    }

    fn notify(&self, connection: ConnectionId, emission: Emission) {
        if let Err(err) = self.transport.emit(connection, emission) {
            trace!("Dropped notification: {}", err);
        }
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_timer(
    session: SharedSession,
    sessions: Weak<SessionTable>,
    transport: Arc<dyn Transport>,
    period: Duration,
    _guard: TimerGuard,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let (connection, exhausted) = {
            let mut current = lock(&session);
            let Some(emission) = current.tick() else {
                return;
            };
            let connection = current.connection();
            if let Err(err) = transport.emit(connection, emission) {
                trace!("Dropped row: {}", err);
            }
            (connection, current.state() == PlaybackState::Exhausted)
        };

        if exhausted {
            retire(&sessions, connection, &session);
            return;
        }
    }
}

/// Remove a finished session's entry, unless a newer session already replaced it
fn retire(sessions: &Weak<SessionTable>, connection: ConnectionId, session: &SharedSession) {
    let Some(sessions) = sessions.upgrade() else {
        return;
    };

    let mut table = lock(&sessions);
    let is_current = table
        .get(&connection)
        .is_some_and(|active| Arc::ptr_eq(&active.session, session));

    if is_current {
        table.remove(&connection);
        info!("Stream on {} finished", connection);
    }
}
