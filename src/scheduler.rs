// THEORY:
// The `PeriodicSamplingScheduler` is the top-level API of the crate. It owns one
// playback-and-sampling session at a time and turns a playing `MediaSource`
// into a stream of `Palette`s.
//
// Key architectural principles:
// 1.  **One context**: a session is a single tokio task. Looping, ticking and
//     publishing all happen on that task, one event at a time, so the
//     subscriber callback is never invoked concurrently with itself.
// 2.  **Offloaded sampling**: frame decoding and the pixel work both run on
//     tokio's blocking pool. The session task awaits them while still
//     listening for `stop`, so stopping never waits on a slow frame, and a
//     result that arrives late is dropped.
// 3.  **Session token**: every session gets a generation number. `stop` bumps
//     the shared generation before it signals the task, and the publish step
//     checks it, so nothing is published once `stop` has returned.
// 4.  **Fan-out**: each palette goes to the callback, to every broadcast
//     subscriber and into a latest-value `watch` slot. Slow subscribers lag
//     and lose old palettes; they never hold the session back.
// 5.  **Looping**: end-of-media is just another timer. When it fires the source
//     is seeked to zero and resumed immediately, and ticking carries on.

use crate::core_modules::grid::Grid;
use crate::core_modules::palette::Palette;
use crate::error::{SamplingError, SchedulerError};
use crate::media::MediaSource;
use crate::sampler::FrameColorSampler;
use crate::ticker::{IntervalTicker, Ticker};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

/// Parameters of one sampling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub grid: Grid,
    /// Wall-clock time between ticks.
    pub interval: Duration,
    /// Delay between `start` and the beginning of playback.
    pub startup_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            interval: Duration::from_millis(500),
            startup_delay: Duration::from_secs(2),
        }
    }
}

/// A snapshot of the current (or last) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub running: bool,
    /// Media position observed at the last tick or loop.
    pub position: Duration,
    pub interval: Duration,
    pub ticks: u64,
    pub published: u64,
    pub skipped: u64,
    pub loops: u64,
}

#[derive(Debug, Clone)]
struct SessionToken {
    generation: Arc<AtomicU64>,
    id: u64,
}

impl SessionToken {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }
}

struct ActiveSession {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<Box<dyn MediaSource>>,
}

/// Drives looping playback of a media source and samples it at a fixed cadence.
pub struct PeriodicSamplingScheduler {
    sampler: Arc<FrameColorSampler>,
    generation: Arc<AtomicU64>,
    palettes_tx: broadcast::Sender<Palette>,
    latest_tx: watch::Sender<Option<Palette>>,
    status_tx: watch::Sender<SessionStatus>,
    session: Option<ActiveSession>,
}

impl Default for PeriodicSamplingScheduler {
    fn default() -> Self {
        Self::new(FrameColorSampler::default())
    }
}

impl PeriodicSamplingScheduler {
    pub fn new(sampler: FrameColorSampler) -> Self {
        Self::with_capacity(sampler, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// `capacity` is how many palettes a broadcast subscriber may fall behind
    /// before it starts losing the oldest ones.
    pub fn with_capacity(sampler: FrameColorSampler, capacity: usize) -> Self {
        let (palettes_tx, _) = broadcast::channel(capacity.max(1));
        let (latest_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(SessionStatus::default());
        Self {
            sampler: Arc::new(sampler),
            generation: Arc::new(AtomicU64::new(0)),
            palettes_tx,
            latest_tx,
            status_tx,
            session: None,
        }
    }

    /// Starts a session ticking every `config.interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S, F>(
        &mut self,
        source: S,
        config: SessionConfig,
        on_palette: F,
    ) -> Result<(), SchedulerError>
    where
        S: MediaSource,
        F: FnMut(Palette) + Send + 'static,
    {
        let ticker = IntervalTicker::new(config.interval);
        self.start_with_ticker(source, config, ticker, on_palette)
    }

    /// Starts a session driven by an arbitrary `Ticker`.
    ///
    /// `config.interval` is only reported through `status`; the ticker decides
    /// when ticks fire.
    pub fn start_with_ticker<S, T, F>(
        &mut self,
        source: S,
        config: SessionConfig,
        ticker: T,
        on_palette: F,
    ) -> Result<(), SchedulerError>
    where
        S: MediaSource,
        T: Ticker,
        F: FnMut(Palette) + Send + 'static,
    {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if config.interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        if config.grid.rows == 0 || config.grid.columns == 0 {
            return Err(SchedulerError::InvalidGrid {
                rows: config.grid.rows,
                columns: config.grid.columns,
            });
        }
        if source.duration().is_zero() {
            return Err(SchedulerError::EmptySource);
        }
        // A session that ended on its own (exhausted ticker) is simply replaced.
        self.session = None;

        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = SessionToken {
            generation: Arc::clone(&self.generation),
            id,
        };

        self.latest_tx.send_replace(None);
        self.status_tx.send_replace(SessionStatus {
            running: true,
            interval: config.interval,
            ..SessionStatus::default()
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let session = SamplingSession {
            source: Box::new(source),
            ticker: Box::new(ticker),
            sampler: Arc::clone(&self.sampler),
            config,
            token,
            on_palette: Box::new(on_palette),
            palettes_tx: self.palettes_tx.clone(),
            latest_tx: self.latest_tx.clone(),
            status_tx: self.status_tx.clone(),
        };
        let handle = tokio::spawn(session.run(stop_rx));
        self.session = Some(ActiveSession { stop_tx, handle });
        Ok(())
    }

    /// Stops the session and hands the source back, paused at position zero.
    ///
    /// No palette is published after this returns. Calling it with no active
    /// session does nothing and returns `None`.
    pub async fn stop(&mut self) -> Option<Box<dyn MediaSource>> {
        let session = self.session.take()?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = session.stop_tx.send(true);

        let source = match session.handle.await {
            Ok(source) => Some(source),
            Err(err) => {
                warn!(%err, "sampling session did not shut down cleanly");
                None
            }
        };
        self.latest_tx.send_replace(None);
        self.status_tx.send_modify(|status| status.running = false);
        source
    }

    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// A receiver for every palette published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Palette> {
        self.palettes_tx.subscribe()
    }

    /// The most recent palette of the active session.
    pub fn latest_palette(&self) -> Option<Palette> {
        self.latest_tx.borrow().clone()
    }

    pub fn watch_latest(&self) -> watch::Receiver<Option<Palette>> {
        self.latest_tx.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }
}

impl Drop for PeriodicSamplingScheduler {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            session.handle.abort();
        }
    }
}

enum SessionEvent {
    Tick,
    EndOfMedia,
    Stop,
}

/// State owned by the session task.
struct SamplingSession {
    source: Box<dyn MediaSource>,
    ticker: Box<dyn Ticker>,
    sampler: Arc<FrameColorSampler>,
    config: SessionConfig,
    token: SessionToken,
    on_palette: Box<dyn FnMut(Palette) + Send>,
    palettes_tx: broadcast::Sender<Palette>,
    latest_tx: watch::Sender<Option<Palette>>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SamplingSession {
    #[tracing::instrument(
        name = "sampling_session",
        skip_all,
        fields(
            session = self.token.id,
            rows = self.config.grid.rows,
            columns = self.config.grid.columns,
        )
    )]
    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) -> Box<dyn MediaSource> {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            startup_delay_ms = self.config.startup_delay.as_millis() as u64,
            duration_ms = self.source.duration().as_millis() as u64,
            "session started"
        );

        let stopped = tokio::select! {
            biased;
            _ = stop_rx.changed() => true,
            _ = tokio::time::sleep(self.config.startup_delay) => false,
        };

        if !stopped {
            self.source.seek(Duration::ZERO);
            self.source.play();
            debug!("playback started");
            self.event_loop(&mut stop_rx).await;
        }

        self.source.seek(Duration::ZERO);
        self.source.pause();
        self.status_tx.send_modify(|status| {
            status.running = false;
            status.position = Duration::ZERO;
        });
        info!("session stopped");
        self.source
    }

    async fn event_loop(&mut self, stop_rx: &mut watch::Receiver<bool>) {
        loop {
            let end_of_media = Instant::now() + self.source.remaining();
            let event = tokio::select! {
                biased;
                _ = stop_rx.changed() => SessionEvent::Stop,
                _ = tokio::time::sleep_until(end_of_media) => SessionEvent::EndOfMedia,
                tick = self.ticker.tick() => match tick {
                    Some(()) => SessionEvent::Tick,
                    None => {
                        debug!("ticker exhausted");
                        SessionEvent::Stop
                    }
                },
            };

            match event {
                SessionEvent::Stop => return,
                SessionEvent::EndOfMedia => self.restart(),
                SessionEvent::Tick => {
                    if !self.on_tick(stop_rx).await {
                        return;
                    }
                }
            }
        }
    }

    fn restart(&mut self) {
        self.source.seek(Duration::ZERO);
        self.source.play();
        self.status_tx.send_modify(|status| {
            status.loops += 1;
            status.position = Duration::ZERO;
        });
        debug!(loops = self.status_tx.borrow().loops, "end of media, looping");
    }

    /// Handles one tick. Returns `false` if a stop arrived while sampling.
    async fn on_tick(&mut self, stop_rx: &mut watch::Receiver<bool>) -> bool {
        let position = self.source.position();
        self.status_tx.send_modify(|status| {
            status.ticks += 1;
            status.position = position;
        });

        let capture = self.source.capture_job();
        let sampler = Arc::clone(&self.sampler);
        let grid = self.config.grid;
        let job = tokio::task::spawn_blocking(move || -> Result<Palette, SamplingError> {
            let frame = capture()?;
            sampler.sample(&frame, grid)
        });

        let outcome = tokio::select! {
            biased;
            _ = stop_rx.changed() => return false,
            outcome = job => outcome,
        };

        match outcome {
            Ok(Ok(palette)) => self.publish(palette),
            Ok(Err(err)) => self.skip(position, &err),
            Err(err) => {
                warn!(%err, "sampling worker failed");
                self.status_tx.send_modify(|status| status.skipped += 1);
            }
        }
        true
    }

    fn publish(&mut self, palette: Palette) {
        if !self.token.is_current() {
            debug!("dropping palette from a stopped session");
            return;
        }
        self.latest_tx.send_replace(Some(palette.clone()));
        let _ = self.palettes_tx.send(palette.clone());
        (self.on_palette)(palette);
        self.status_tx.send_modify(|status| status.published += 1);
    }

    fn skip(&self, position: Duration, err: &SamplingError) {
        match err {
            SamplingError::InvalidGrid { .. } => {
                warn!(%err, position_ms = position.as_millis() as u64, "grid does not fit frame, tick skipped")
            }
            SamplingError::Decode(_) => {
                debug!(%err, position_ms = position.as_millis() as u64, "tick skipped")
            }
        }
        self.status_tx.send_modify(|status| status.skipped += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::color::Color;
    use crate::core_modules::frame::Frame;
    use crate::media::{ClockedSource, FrameDecoder};
    use crate::ticker::ManualTicker;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// A decoder that records requested positions and fails on selected calls.
    #[derive(Clone)]
    struct ScriptedDecoder {
        duration: Duration,
        calls: Arc<AtomicUsize>,
        positions: Arc<Mutex<Vec<Duration>>>,
        fail_on: Vec<usize>,
    }

    impl ScriptedDecoder {
        fn new(duration: Duration) -> Self {
            Self {
                duration,
                calls: Arc::new(AtomicUsize::new(0)),
                positions: Arc::new(Mutex::new(Vec::new())),
                fail_on: Vec::new(),
            }
        }

        fn failing_on(mut self, calls: &[usize]) -> Self {
            self.fail_on = calls.to_vec();
            self
        }
    }

    impl FrameDecoder for ScriptedDecoder {
        fn duration(&self) -> Duration {
            self.duration
        }

        fn decode_at(&self, position: Duration) -> Result<Frame, SamplingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.positions.lock().unwrap().push(position);
            if self.fail_on.contains(&call) {
                return Err(SamplingError::decode("scripted failure"));
            }
            let shade = (call % 200) as u8;
            Frame::filled(8, 8, Color::opaque(shade, 10, 20))
        }
    }

    /// A decoder that reports when a decode begins and then blocks until released.
    struct GatedDecoder {
        started: tokio::sync::mpsc::UnboundedSender<std::thread::ThreadId>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl FrameDecoder for GatedDecoder {
        fn duration(&self) -> Duration {
            Duration::from_secs(60)
        }

        fn decode_at(&self, _position: Duration) -> Result<Frame, SamplingError> {
            let _ = self.started.send(std::thread::current().id());
            let _ = self.release.lock().unwrap().recv();
            Frame::filled(8, 8, Color::opaque(1, 2, 3))
        }
    }

    fn config(interval_ms: u64, startup_ms: u64) -> SessionConfig {
        SessionConfig {
            grid: Grid::new(2, 2),
            interval: Duration::from_millis(interval_ms),
            startup_delay: Duration::from_millis(startup_ms),
        }
    }

    async fn wait_for_handled(scheduler: &PeriodicSamplingScheduler, handled: u64) {
        let mut status = scheduler.watch_status();
        status
            .wait_for(|s| s.published + s.skipped >= handled)
            .await
            .expect("status channel closed");
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_at_the_configured_cadence() {
        let decoder = ScriptedDecoder::new(Duration::from_secs(10));
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lengths);

        scheduler
            .start(ClockedSource::new(decoder), config(500, 2000), move |p| {
                sink.lock().unwrap().push(p.len())
            })
            .unwrap();
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(2000 + 3000 + 100)).await;
        let published = lengths.lock().unwrap().clone();
        assert!(published.len() >= 5, "only {} palettes", published.len());
        assert!(published.iter().all(|&len| len == 4));

        let source = scheduler.stop().await.expect("source returned");
        let after_stop = lengths.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(lengths.lock().unwrap().len(), after_stop);
        assert!(!source.is_playing());
        assert_eq!(source.position(), Duration::ZERO);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_happens_during_startup_delay() {
        let decoder = ScriptedDecoder::new(Duration::from_secs(10));
        let calls = Arc::clone(&decoder.calls);
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        scheduler
            .start(ClockedSource::new(decoder), config(500, 2000), |_| {})
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.latest_palette(), None);

        let source = scheduler.stop().await.unwrap();
        assert!(!source.is_playing());
        assert_eq!(scheduler.status().ticks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loops_back_to_zero_at_end_of_media() {
        let decoder = ScriptedDecoder::new(Duration::from_secs(2));
        let positions = Arc::clone(&decoder.positions);
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        scheduler
            .start(ClockedSource::new(decoder), config(500, 0), |_| {})
            .unwrap();

        tokio::time::sleep(Duration::from_millis(3300)).await;
        let observed = positions.lock().unwrap().clone();
        assert!(
            observed.windows(2).any(|w| w[1] < w[0]),
            "position never wrapped: {observed:?}"
        );
        assert!(observed.iter().all(|p| *p < Duration::from_secs(2)));
        assert!(scheduler.status().loops >= 1);
        assert!(scheduler.is_running());

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ticks_keep_the_previous_palette() {
        let decoder = ScriptedDecoder::new(Duration::from_secs(60)).failing_on(&[1]);
        let (ticks, ticker) = ManualTicker::new();
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        scheduler
            .start_with_ticker(ClockedSource::new(decoder), config(500, 0), ticker, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        ticks.fire();
        wait_for_handled(&scheduler, 1).await;
        let first = scheduler.latest_palette().expect("first palette");
        assert_eq!(first.get(0, 0), Some(Color::opaque(0, 10, 20)));

        ticks.fire();
        wait_for_handled(&scheduler, 2).await;
        assert_eq!(scheduler.latest_palette(), Some(first));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        ticks.fire();
        wait_for_handled(&scheduler, 3).await;
        let third = scheduler.latest_palette().unwrap();
        assert_eq!(third.get(1, 1), Some(Color::opaque(2, 10, 20)));

        let status = scheduler.status();
        assert_eq!((status.ticks, status.published, status.skipped), (3, 2, 1));
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn grid_larger_than_frame_is_skipped_per_tick() {
        let decoder = ScriptedDecoder::new(Duration::from_secs(60));
        let (ticks, ticker) = ManualTicker::new();
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        let cfg = SessionConfig {
            grid: Grid::new(16, 16),
            ..config(500, 0)
        };
        scheduler
            .start_with_ticker(ClockedSource::new(decoder), cfg, ticker, |_| {})
            .unwrap();

        ticks.fire();
        wait_for_handled(&scheduler, 1).await;
        assert_eq!(scheduler.status().skipped, 1);
        assert_eq!(scheduler.latest_palette(), None);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_receive_palettes_in_order() {
        let decoder = ScriptedDecoder::new(Duration::from_secs(60));
        let (ticks, ticker) = ManualTicker::new();
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        let mut rx = scheduler.subscribe();
        scheduler
            .start_with_ticker(ClockedSource::new(decoder), config(500, 0), ticker, |_| {})
            .unwrap();

        for _ in 0..3 {
            ticks.fire();
        }
        let shades: Vec<u8> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|p| p.colors()[0].red)
        .collect();
        assert_eq!(shades, vec![0, 1, 2]);

        scheduler.stop().await;
        assert_eq!(scheduler.latest_palette(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        assert!(scheduler.stop().await.is_none());

        let decoder = ScriptedDecoder::new(Duration::from_secs(10));
        scheduler
            .start(ClockedSource::new(decoder), config(500, 0), |_| {})
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert!(scheduler.stop().await.is_some());
        assert!(scheduler.stop().await.is_none());
        assert!(!scheduler.status().running);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_invalid_sessions() {
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        let source = || ClockedSource::new(ScriptedDecoder::new(Duration::from_secs(10)));

        assert_eq!(
            scheduler.start(source(), config(0, 0), |_| {}),
            Err(SchedulerError::InvalidInterval)
        );
        let zero_grid = SessionConfig {
            grid: Grid::new(0, 3),
            ..config(500, 0)
        };
        assert_eq!(
            scheduler.start(source(), zero_grid, |_| {}),
            Err(SchedulerError::InvalidGrid { rows: 0, columns: 3 })
        );
        let empty = ClockedSource::new(ScriptedDecoder::new(Duration::ZERO));
        assert_eq!(
            scheduler.start(empty, config(500, 0), |_| {}),
            Err(SchedulerError::EmptySource)
        );

        scheduler.start(source(), config(500, 0), |_| {}).unwrap();
        assert_eq!(
            scheduler.start(source(), config(500, 0), |_| {}),
            Err(SchedulerError::AlreadyRunning)
        );
        scheduler.stop().await;
        assert!(scheduler.start(source(), config(500, 0), |_| {}).is_ok());
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_ticker_ends_the_session() {
        let decoder = ScriptedDecoder::new(Duration::from_secs(10));
        let (ticks, ticker) = ManualTicker::new();
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        let mut status = scheduler.watch_status();
        scheduler
            .start_with_ticker(ClockedSource::new(decoder), config(500, 0), ticker, |_| {})
            .unwrap();

        drop(ticks);
        status.wait_for(|s| !s.running).await.unwrap();
        let source = scheduler.stop().await.expect("finished session still returns its source");
        assert_eq!(source.position(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn sample_in_flight_at_stop_is_never_published() {
        let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let decoder = GatedDecoder {
            started: started_tx,
            release: Mutex::new(release_rx),
        };
        let (ticks, ticker) = ManualTicker::new();
        let mut scheduler = PeriodicSamplingScheduler::new(FrameColorSampler::single_threaded());
        let mut rx = scheduler.subscribe();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        scheduler
            .start_with_ticker(ClockedSource::new(decoder), config(500, 0), ticker, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(ticks.fire());
        let decode_thread = started_rx.recv().await.expect("decode started");
        assert_ne!(decode_thread, std::thread::current().id());

        let source = scheduler.stop().await.expect("source returned");
        assert!(!source.is_playing());
        release_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert_eq!(scheduler.latest_palette(), None);
        let status = scheduler.status();
        assert_eq!((status.ticks, status.published), (1, 0));
        assert!(!status.running);
    }

    #[test]
    fn stale_tokens_are_not_current() {
        let generation = Arc::new(AtomicU64::new(3));
        let token = SessionToken {
            generation: Arc::clone(&generation),
            id: 3,
        };
        assert!(token.is_current());
        generation.fetch_add(1, Ordering::SeqCst);
        assert!(!token.is_current());
    }
}
