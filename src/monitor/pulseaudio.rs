//! Default-sink volume and mute via a PulseAudio-compatible server.
//!
//! One worker thread ("pulse-listen") owns a threaded mainloop with two
//! contexts:
//! - an event context subscribed to sink/source changes, whose callback only
//!   feeds raw event indices into the debouncer
//! - a query context that answers default-sink requests sent from the
//!   runtime when a debounce timer fires
//!
//! Works unchanged on PipeWire through `pipewire-pulse`.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use libpulse_binding as pulse;
use parking_lot::Mutex;
use pulse::callbacks::ListResult;
use pulse::context::introspect::SinkInfo as PulseSinkInfo;
use pulse::context::subscribe::{Facility, InterestMaskSet};
use pulse::context::{Context, FlagSet as ContextFlagSet, State as ContextState};
use pulse::mainloop::threaded::Mainloop;
use pulse::volume::{ChannelVolumes, Volume};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use super::MonitorError;
use crate::debounce::Debouncer;
use crate::status::{Icon, StatusModel};

/// Window in which raw events for one index collapse into a single query.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(20);

/// How long `start()` waits for both contexts to become ready.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single introspection round trip.
const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Debounce key of the query that primes the state after connecting.
const PRIME_KEY: u32 = u32::MAX;

/// Volume icon ignoring mute.
pub fn volume_icon_name(volume: f64) -> &'static str {
    if volume > 1.0 {
        "audio-volume-overamplified-symbolic"
    } else if volume > 0.66 {
        "audio-volume-high-symbolic"
    } else if volume > 0.33 {
        "audio-volume-medium-symbolic"
    } else if volume <= 0.0 {
        "audio-volume-muted-symbolic"
    } else {
        "audio-volume-low-symbolic"
    }
}

/// Icon for the sink state; mute always wins.
pub fn audio_icon_name(mute: bool, volume: f64) -> &'static str {
    if mute {
        "audio-volume-muted-symbolic"
    } else {
        volume_icon_name(volume)
    }
}

/// Mean channel volume, 1.0 = `Volume::NORMAL`.
pub fn flat_volume(volumes: &ChannelVolumes) -> f64 {
    if volumes.len() == 0 || !volumes.is_valid() {
        return 0.0;
    }
    f64::from(volumes.avg().0) / f64::from(Volume::NORMAL.0)
}

/// Default sink as reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkInfo {
    pub name: String,
    pub mute: bool,
    /// Mean channel volume, 1.0 = 100%.
    pub volume: f64,
}

impl SinkInfo {
    fn from_pulse(info: &PulseSinkInfo) -> Self {
        Self {
            name: info
                .name
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            mute: info.mute,
            volume: flat_volume(&info.volume),
        }
    }
}

/// Last published sink state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioState {
    pub volume: f64,
    pub mute: bool,
    pub current_sink: String,
}

/// Which fields a query actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SinkChanges {
    mute: bool,
    volume: bool,
    sink: bool,
}

/// Asks the server for the current default sink.
pub type SinkQuery =
    Arc<dyn Fn() -> BoxFuture<'static, Result<SinkInfo, MonitorError>> + Send + Sync>;

/// State shared between the monitor, its models and debounce timers.
#[derive(Debug, Default)]
struct Shared {
    state: Mutex<AudioState>,
    models: Mutex<Vec<Arc<StatusModel>>>,
}

impl Shared {
    fn icon(&self) -> Icon {
        let state = self.state.lock();
        Icon::with_default_fallbacks(audio_icon_name(state.mute, state.volume))
    }

    /// Apply a query result, publishing only fields that changed.
    #[allow(clippy::float_cmp)]
    fn apply_sink(&self, sink: &SinkInfo) -> SinkChanges {
        let mut changes = SinkChanges::default();
        let mute;
        {
            let mut state = self.state.lock();
            // The first query always publishes mute so the icon is right.
            if state.current_sink.is_empty() || state.mute != sink.mute {
                state.mute = sink.mute;
                changes.mute = true;
            }
            if state.volume != sink.volume {
                state.volume = sink.volume;
                changes.volume = true;
            }
            if state.current_sink != sink.name {
                state.current_sink.clone_from(&sink.name);
                changes.sink = true;
            }
            mute = state.mute;
        }

        let models = self.models.lock().clone();
        if changes.mute {
            let icon = self.icon();
            for model in &models {
                model.set_icon(icon.clone());
            }
        }
        if changes.volume {
            for model in &models {
                model.set_value(sink.volume);
                if !mute {
                    model.set_icon(Icon::with_default_fallbacks(volume_icon_name(sink.volume)));
                }
            }
        }
        if changes.sink {
            debug!("Default sink is now {}", sink.name);
        }

        changes
    }

    /// Debounce timer body: query and publish, discarding failures.
    async fn refresh(&self, query: &SinkQuery) {
        match query().await {
            Ok(sink) => {
                let changes = self.apply_sink(&sink);
                trace!("Sink refresh {:?}: {:?}", sink, changes);
            }
            Err(e) => debug!("Discarding failed sink query: {}", e),
        }
    }
}

/// Route one subscription event into the debouncer.
fn on_event(
    facility: Option<Facility>,
    index: u32,
    debouncer: &Debouncer<u32>,
    shared: &Arc<Shared>,
    query: &SinkQuery,
) {
    if !matches!(facility, Some(Facility::Sink | Facility::Source)) {
        return;
    }

    trace!("Audio device event on #{}", index);
    let shared = Arc::clone(shared);
    let query = Arc::clone(query);
    debouncer.trigger(index, move || async move { shared.refresh(&query).await });
}

/// Work sent to the connection thread.
enum Request {
    DefaultSink(oneshot::Sender<Result<SinkInfo, MonitorError>>),
    Shutdown,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefaultSink(_) => f.write_str("DefaultSink"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Query that round-trips through the connection thread.
fn connection_query(requests: Sender<Request>) -> SinkQuery {
    Arc::new(move || {
        let requests = requests.clone();
        async move {
            let closed = || MonitorError::Audio("audio connection closed".to_string());
            let (reply, response) = oneshot::channel();
            requests
                .send(Request::DefaultSink(reply))
                .map_err(|_| closed())?;
            response.await.map_err(|_| closed())?
        }
        .boxed()
    })
}

/// Threaded mainloop with its event and query contexts.
struct Connection {
    events: Context,
    queries: Context,
    mainloop: Mainloop,
}

impl Connection {
    fn open() -> Result<Self, MonitorError> {
        let mut mainloop = Mainloop::new()
            .ok_or_else(|| MonitorError::Audio("failed to create mainloop".to_string()))?;
        let events = Context::new(&mainloop, "osdwatchd-events")
            .ok_or_else(|| MonitorError::Audio("failed to create event context".to_string()))?;
        let queries = Context::new(&mainloop, "osdwatchd-queries")
            .ok_or_else(|| MonitorError::Audio("failed to create query context".to_string()))?;
        mainloop.start()?;

        let mut connection = Self {
            events,
            queries,
            mainloop,
        };

        connection.mainloop.lock();
        let connected = connection
            .events
            .connect(None, ContextFlagSet::NOFLAGS, None)
            .and_then(|()| {
                connection
                    .queries
                    .connect(None, ContextFlagSet::NOFLAGS, None)
            });
        connection.mainloop.unlock();
        connected?;

        connection.wait_ready()?;
        Ok(connection)
    }

    fn wait_ready(&mut self) -> Result<(), MonitorError> {
        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            self.mainloop.lock();
            let states = (self.events.get_state(), self.queries.get_state());
            self.mainloop.unlock();

            match states {
                (ContextState::Ready, ContextState::Ready) => return Ok(()),
                (ContextState::Failed | ContextState::Terminated, _)
                | (_, ContextState::Failed | ContextState::Terminated) => {
                    return Err(MonitorError::Audio(
                        "connection to audio server failed".to_string(),
                    ));
                }
                _ if Instant::now() >= deadline => {
                    return Err(MonitorError::Audio(
                        "timed out connecting to audio server".to_string(),
                    ));
                }
                _ => thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    /// Install the event callback and subscribe to sinks and sources.
    fn subscribe<F>(&mut self, mut on_event: F)
    where
        F: FnMut(Option<Facility>, u32) + 'static,
    {
        self.mainloop.lock();
        self.events
            .set_subscribe_callback(Some(Box::new(move |facility, _operation, index| {
                on_event(facility, index);
            })));
        self.events
            .subscribe(InterestMaskSet::SINK | InterestMaskSet::SOURCE, |success| {
                if !success {
                    warn!("Audio event subscription was rejected");
                }
            });
        self.mainloop.unlock();
    }

    /// Resolve the default sink name, then fetch that sink.
    fn default_sink(&mut self) -> Result<SinkInfo, MonitorError> {
        let (tx, rx) = mpsc::channel();
        self.mainloop.lock();
        self.queries.introspect().get_server_info(move |info| {
            let _ = tx.send(info.default_sink_name.as_ref().map(ToString::to_string));
        });
        self.mainloop.unlock();

        let name = recv_reply(&rx, "server info")?
            .ok_or_else(|| MonitorError::Audio("no default sink".to_string()))?;

        let (tx, rx) = mpsc::channel();
        self.mainloop.lock();
        self.queries
            .introspect()
            .get_sink_info_by_name(&name, move |result| {
                let _ = tx.send(match result {
                    ListResult::Item(info) => Some(SinkInfo::from_pulse(info)),
                    ListResult::End | ListResult::Error => None,
                });
            });
        self.mainloop.unlock();

        recv_reply(&rx, "sink info")?
            .ok_or_else(|| MonitorError::Audio(format!("default sink {name} not found")))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.mainloop.lock();
        self.events.disconnect();
        self.queries.disconnect();
        self.mainloop.unlock();
        self.mainloop.stop();
    }
}

fn recv_reply<T>(rx: &Receiver<T>, what: &str) -> Result<T, MonitorError> {
    rx.recv_timeout(QUERY_TIMEOUT)
        .map_err(|e| MonitorError::Audio(format!("{what} query failed: {e}")))
}

/// Connection thread: open, report readiness, then serve queries until
/// shutdown.
fn run_connection(
    debouncer: Arc<Debouncer<u32>>,
    shared: Arc<Shared>,
    query: SinkQuery,
    requests: &Receiver<Request>,
    ready: &Sender<Result<(), MonitorError>>,
) {
    let mut connection = match Connection::open() {
        Ok(connection) => connection,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    connection.subscribe(move |facility, index| {
        on_event(facility, index, &debouncer, &shared, &query);
    });
    let _ = ready.send(Ok(()));

    while let Ok(request) = requests.recv() {
        match request {
            Request::DefaultSink(reply) => {
                let _ = reply.send(connection.default_sink());
            }
            Request::Shutdown => break,
        }
    }

    debug!("Audio connection closing");
}

/// Running connection thread.
#[derive(Debug)]
struct Worker {
    requests: Sender<Request>,
    thread: JoinHandle<()>,
}

/// Tracks default-sink volume, mute and name.
#[derive(Debug)]
pub struct PulseAudioMonitor {
    levels: u32,
    shared: Arc<Shared>,
    worker: Option<Worker>,
    debouncer: Option<Arc<Debouncer<u32>>>,
}

impl PulseAudioMonitor {
    pub fn new(levels: u32) -> Self {
        Self {
            levels,
            shared: Arc::new(Shared::default()),
            worker: None,
            debouncer: None,
        }
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn state(&self) -> AudioState {
        self.shared.state.lock().clone()
    }

    /// Connect to the server on the worker thread, then prime the state
    /// with one query. Must run inside the tokio runtime.
    ///
    /// Blocks until both contexts are ready or the connection fails.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let debouncer = Arc::new(Debouncer::new(Handle::current(), DEBOUNCE_WINDOW));
        let (requests, incoming) = mpsc::channel();
        let query = connection_query(requests.clone());
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = {
            let debouncer = Arc::clone(&debouncer);
            let shared = Arc::clone(&self.shared);
            let query = Arc::clone(&query);
            thread::Builder::new()
                .name("pulse-listen".to_string())
                .spawn(move || run_connection(debouncer, shared, query, &incoming, &ready_tx))?
        };

        let connected = ready_rx.recv().unwrap_or_else(|_| {
            Err(MonitorError::Audio(
                "audio connection thread exited".to_string(),
            ))
        });
        if let Err(e) = connected {
            if thread.join().is_err() {
                warn!("Audio connection thread panicked");
            }
            return Err(e);
        }

        // Initial state, through the same path as any other event.
        let shared = Arc::clone(&self.shared);
        debouncer.trigger(PRIME_KEY, move || async move { shared.refresh(&query).await });

        info!("PulseAudio monitor started");
        self.worker = Some(Worker { requests, thread });
        self.debouncer = Some(debouncer);
        Ok(())
    }

    /// Disconnect and join the worker thread.
    pub fn close(&mut self) {
        if let Some(debouncer) = self.debouncer.take() {
            debouncer.cancel_all();
        }

        if let Some(Worker { requests, thread }) = self.worker.take() {
            let _ = requests.send(Request::Shutdown);
            if thread.join().is_err() {
                warn!("Audio connection thread panicked");
            }
            debug!("PulseAudio monitor stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.thread.is_finished())
    }

    /// Model whose value follows volume and whose icon follows volume/mute.
    pub fn new_model(&self) -> Result<Arc<StatusModel>, MonitorError> {
        if !self.is_started() {
            return Err(MonitorError::NotStarted("pulseaudio".to_string()));
        }

        let model = StatusModel::new("pulse", self.levels);
        model.set_value(self.shared.state.lock().volume);
        model.set_icon(self.shared.icon());
        self.shared.models.lock().push(Arc::clone(&model));
        Ok(model)
    }
}

impl Drop for PulseAudioMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sink(name: &str, mute: bool, volume: f64) -> SinkInfo {
        SinkInfo {
            name: name.to_string(),
            mute,
            volume,
        }
    }

    fn icon_of(model: &StatusModel) -> String {
        model.icon().map(|i| i.as_str().to_string()).unwrap_or_default()
    }

    /// Fake server: each query reads the current sink and counts itself.
    struct FakeServer {
        sink: Arc<Mutex<SinkInfo>>,
        queries: Arc<AtomicUsize>,
    }

    impl FakeServer {
        fn new(initial: SinkInfo) -> Self {
            Self {
                sink: Arc::new(Mutex::new(initial)),
                queries: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn query(&self) -> SinkQuery {
            let sink = Arc::clone(&self.sink);
            let queries = Arc::clone(&self.queries);
            Arc::new(move || {
                queries.fetch_add(1, Ordering::SeqCst);
                let current = sink.lock().clone();
                async move { Ok(current) }.boxed()
            })
        }

        fn query_count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    struct Harness {
        debouncer: Debouncer<u32>,
        shared: Arc<Shared>,
        model: Arc<StatusModel>,
        server: FakeServer,
        query: SinkQuery,
    }

    impl Harness {
        fn new() -> Self {
            let shared = Arc::new(Shared::default());
            let model = StatusModel::new("pulse", 16);
            shared.models.lock().push(Arc::clone(&model));
            let server = FakeServer::new(sink("speakers", false, 0.1));
            let query = server.query();
            Self {
                debouncer: Debouncer::new(Handle::current(), DEBOUNCE_WINDOW),
                shared,
                model,
                server,
                query,
            }
        }

        fn event(&self, facility: Facility, index: u32) {
            on_event(
                Some(facility),
                index,
                &self.debouncer,
                &self.shared,
                &self.query,
            );
        }
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn test_volume_icons() {
        assert_eq!(volume_icon_name(1.2), "audio-volume-overamplified-symbolic");
        assert_eq!(volume_icon_name(1.0), "audio-volume-high-symbolic");
        assert_eq!(volume_icon_name(0.67), "audio-volume-high-symbolic");
        assert_eq!(volume_icon_name(0.66), "audio-volume-medium-symbolic");
        assert_eq!(volume_icon_name(0.34), "audio-volume-medium-symbolic");
        assert_eq!(volume_icon_name(0.33), "audio-volume-low-symbolic");
        assert_eq!(volume_icon_name(0.01), "audio-volume-low-symbolic");
        assert_eq!(volume_icon_name(0.0), "audio-volume-muted-symbolic");
    }

    #[test]
    fn test_mute_overrides_volume_icon() {
        assert_eq!(audio_icon_name(true, 1.3), "audio-volume-muted-symbolic");
        assert_eq!(audio_icon_name(false, 0.5), "audio-volume-medium-symbolic");
    }

    #[test]
    fn test_flat_volume() {
        let mut volumes = ChannelVolumes::default();
        assert!(flat_volume(&volumes).abs() < f64::EPSILON);

        volumes.set(2, Volume::NORMAL);
        assert!((flat_volume(&volumes) - 1.0).abs() < f64::EPSILON);

        volumes.set(2, Volume::MUTED);
        assert!(flat_volume(&volumes).abs() < f64::EPSILON);

        volumes.set(1, Volume(Volume::NORMAL.0 / 2));
        assert!((flat_volume(&volumes) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_first_query_publishes_everything() {
        let shared = Shared::default();
        let changes = shared.apply_sink(&sink("speakers", false, 0.5));
        assert_eq!(
            changes,
            SinkChanges {
                mute: true,
                volume: true,
                sink: true,
            }
        );
        assert_eq!(
            shared.state.lock().clone(),
            AudioState {
                volume: 0.5,
                mute: false,
                current_sink: "speakers".to_string(),
            }
        );
    }

    #[test]
    fn test_unchanged_query_publishes_nothing() {
        let shared = Shared::default();
        let model = StatusModel::new("pulse", 16);
        shared.models.lock().push(Arc::clone(&model));
        shared.apply_sink(&sink("speakers", false, 0.5));

        let notifications = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&notifications);
        model.connect(move |_, _| *counter.lock() += 1);

        let changes = shared.apply_sink(&sink("speakers", false, 0.5));
        assert_eq!(changes, SinkChanges::default());
        assert_eq!(*notifications.lock(), 0);
    }

    #[test]
    fn test_model_follows_volume_and_mute() {
        let shared = Shared::default();
        let model = StatusModel::new("pulse", 16);
        shared.models.lock().push(Arc::clone(&model));

        shared.apply_sink(&sink("speakers", false, 0.8));
        assert!((model.value() - 0.8).abs() < f64::EPSILON);
        assert_eq!(icon_of(&model), "audio-volume-high-symbolic");

        shared.apply_sink(&sink("speakers", true, 0.8));
        assert_eq!(icon_of(&model), "audio-volume-muted-symbolic");

        // Volume moves while muted: value follows, icon stays muted.
        shared.apply_sink(&sink("speakers", true, 0.2));
        assert!((model.value() - 0.2).abs() < f64::EPSILON);
        assert_eq!(icon_of(&model), "audio-volume-muted-symbolic");

        shared.apply_sink(&sink("speakers", false, 0.2));
        assert_eq!(icon_of(&model), "audio-volume-low-symbolic");

        shared.apply_sink(&sink("speakers", false, 1.25));
        assert_eq!(icon_of(&model), "audio-volume-overamplified-symbolic");
    }

    #[test]
    fn test_sink_switch_only_updates_name() {
        let shared = Shared::default();
        shared.apply_sink(&sink("speakers", false, 0.5));

        let changes = shared.apply_sink(&sink("headphones", false, 0.5));
        assert_eq!(
            changes,
            SinkChanges {
                mute: false,
                volume: false,
                sink: true,
            }
        );
        assert_eq!(shared.state.lock().current_sink, "headphones");
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_on_one_index_queries_once_with_last_state() {
        let harness = Harness::new();

        for volume in [0.2, 0.4, 0.6] {
            harness.server.sink.lock().volume = volume;
            harness.event(Facility::Sink, 3);
            advance(2).await;
        }
        assert_eq!(harness.server.query_count(), 0);

        advance(25).await;
        assert_eq!(harness.server.query_count(), 1);
        assert!((harness.model.value() - 0.6).abs() < f64::EPSILON);
        assert_eq!(icon_of(&harness.model), "audio-volume-medium-symbolic");

        advance(100).await;
        assert_eq!(harness.server.query_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_fires_window_after_last_event() {
        let harness = Harness::new();

        harness.event(Facility::Sink, 3);
        advance(5).await;
        harness.server.sink.lock().mute = true;
        harness.event(Facility::Sink, 3);

        // 19 ms after the second event: still waiting.
        advance(19).await;
        assert_eq!(harness.server.query_count(), 0);

        advance(2).await;
        assert_eq!(harness.server.query_count(), 1);
        assert_eq!(icon_of(&harness.model), "audio-volume-muted-symbolic");
    }

    #[tokio::test(start_paused = true)]
    async fn test_indices_debounce_independently() {
        let harness = Harness::new();

        harness.event(Facility::Sink, 3);
        harness.event(Facility::Source, 1);
        harness.event(Facility::Sink, 3);
        assert_eq!(harness.debouncer.pending(), 2);

        advance(25).await;
        assert_eq!(harness.server.query_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_facilities_are_ignored() {
        let harness = Harness::new();

        harness.event(Facility::SinkInput, 40);
        harness.event(Facility::Server, 0);
        on_event(None, 7, &harness.debouncer, &harness.shared, &harness.query);
        assert_eq!(harness.debouncer.pending(), 0);

        advance(50).await;
        assert_eq!(harness.server.query_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_query_is_discarded() {
        let debouncer = Debouncer::new(Handle::current(), DEBOUNCE_WINDOW);
        let shared = Arc::new(Shared::default());
        let model = StatusModel::new("pulse", 16);
        shared.models.lock().push(Arc::clone(&model));
        let query: SinkQuery = Arc::new(|| {
            async { Err(MonitorError::Audio("connection lost".to_string())) }.boxed()
        });

        on_event(Some(Facility::Sink), 3, &debouncer, &shared, &query);
        advance(25).await;

        assert_eq!(shared.state.lock().clone(), AudioState::default());
        assert!(model.value().abs() < f64::EPSILON);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test]
    async fn test_closed_connection_query_fails() {
        let (requests, incoming) = mpsc::channel();
        let query = connection_query(requests);
        drop(incoming);

        assert!(matches!(query().await, Err(MonitorError::Audio(_))));
    }

    #[test]
    fn test_new_model_requires_start() {
        let monitor = PulseAudioMonitor::new(16);
        assert!(!monitor.is_started());
        assert!(matches!(
            monitor.new_model(),
            Err(MonitorError::NotStarted(_))
        ));
    }
}
