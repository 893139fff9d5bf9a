//! Audio context: the control-thread end of the render pipeline.
//!
//! An [`AudioContext`] owns the clock the engine schedules against, the
//! sending half of the command channel and the analysis tap. It is created
//! together with the [`Renderer`] that consumes its commands; whoever drives
//! the audio device (or an offline loop) owns the renderer.
//!
//! Engines never construct a context themselves. They receive one by
//! injection as any [`RenderSink`], which lets tests substitute a
//! [`CommandLog`] or a context with a [`ManualClock`].
//!
//! ## Shared instance
//!
//! A process normally has one context. [`AudioContext::acquire`] returns the
//! running instance or creates and starts one; [`AudioContext::release_shared`]
//! closes it and drops the driver. Any number of engines can share it: each
//! one opens its own render lane.
//!
//! ## Lookahead
//!
//! By default the context reports time one rendered block ahead of the
//! renderer, so a note requested while a block is being rendered lands at the
//! start of the next one instead of in the past.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crossbeam_channel::{Sender, TrySendError, bounded};
use parking_lot::Mutex;
use synthualizer_core::{Clock, LookaheadClock, ManualClock, SampleClock};

use crate::error::{EngineError, Result};
use crate::render::{LaneId, RenderCommand, Renderer};
use crate::tap::{AnalysisTap, DEFAULT_TAP_SIZE};

/// Default command queue depth.
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Where an engine sends its render commands.
pub trait RenderSink: Send + Sync {
    /// Current clock time in seconds.
    fn now(&self) -> f64;

    /// Queue a command for the renderer. Never blocks.
    fn submit(&self, command: RenderCommand);

    /// Reserve a render lane. No two calls on one sink return the same lane.
    fn open_lane(&self) -> LaneId;

    /// Render sample rate in Hz.
    fn sample_rate(&self) -> f32;

    /// Handle to the post-mix analysis tap.
    fn analysis_tap(&self) -> AnalysisTap;

    /// `false` once the sink no longer accepts commands.
    fn is_open(&self) -> bool {
        true
    }
}

/// Settings for a new context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextConfig {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Command queue depth.
    pub command_capacity: usize,
    /// Samples kept by the analysis tap.
    pub tap_size: usize,
    /// Report time one rendered block ahead of the renderer.
    pub lookahead: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            tap_size: DEFAULT_TAP_SIZE,
            lookahead: true,
        }
    }
}

impl ContextConfig {
    /// Default settings at `sample_rate`.
    pub fn with_sample_rate(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Same settings with the clock read at the renderer's position.
    ///
    /// For offline rendering, where control and rendering alternate on one
    /// thread and no block is ever in flight.
    #[must_use]
    pub fn without_lookahead(self) -> Self {
        Self {
            lookahead: false,
            ..self
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EngineError::invalid(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.command_capacity == 0 {
            return Err(EngineError::invalid("command capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Control-side handle to a render pipeline.
pub struct AudioContext {
    sample_rate: f32,
    clock: Arc<dyn Clock>,
    commands: Sender<RenderCommand>,
    tap: AnalysisTap,
    next_lane: AtomicU32,
    closed: AtomicBool,
    driver: Mutex<Option<Box<dyn Any + Send>>>,
}

impl std::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioContext")
            .field("sample_rate", &self.sample_rate)
            .field("now", &self.clock.now())
            .field("closed", &self.is_closed())
            .field("queued", &self.commands.len())
            .field("lanes_opened", &self.next_lane.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AudioContext {
    /// Create a context and the renderer that serves it.
    ///
    /// The context's clock is the renderer's frame counter, read one block
    /// ahead when [`ContextConfig::lookahead`] is set.
    ///
    /// # Example
    ///
    /// ```rust
    /// use synthualizer_synth::{AudioContext, ContextConfig, RenderSink};
    ///
    /// let (context, mut renderer) = AudioContext::new(ContextConfig::default()).unwrap();
    /// let mut block = [0.0; 480];
    /// renderer.process(&mut block);
    /// // 480 frames rendered, plus one block of lookahead
    /// assert!((context.now() - 0.02).abs() < 1e-9);
    /// ```
    pub fn new(config: ContextConfig) -> Result<(Arc<Self>, Renderer)> {
        config.validate()?;
        let frames = Arc::new(SampleClock::new(config.sample_rate));
        let clock: Arc<dyn Clock> = if config.lookahead {
            Arc::new(LookaheadClock::new(Arc::clone(&frames)))
        } else {
            Arc::clone(&frames) as Arc<dyn Clock>
        };
        Self::build(config, clock, frames)
    }

    /// Create a context that reads time from `clock` instead of the renderer.
    ///
    /// The renderer still counts its own frames; this is for tests that
    /// want to place control-side events at arbitrary times.
    pub fn with_clock(config: ContextConfig, clock: Arc<dyn Clock>) -> Result<(Arc<Self>, Renderer)> {
        config.validate()?;
        let frames = Arc::new(SampleClock::new(config.sample_rate));
        Self::build(config, clock, frames)
    }

    fn build(
        config: ContextConfig,
        clock: Arc<dyn Clock>,
        frames: Arc<SampleClock>,
    ) -> Result<(Arc<Self>, Renderer)> {
        let (tx, rx) = bounded(config.command_capacity);
        let tap = AnalysisTap::new(config.tap_size);
        let renderer = Renderer::new(config.sample_rate, frames, rx, tap.writer());
        let context = Arc::new(Self {
            sample_rate: config.sample_rate,
            clock,
            commands: tx,
            tap,
            next_lane: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            driver: Mutex::new(None),
        });
        tracing::debug!(sample_rate = config.sample_rate, "audio context created");
        Ok((context, renderer))
    }

    /// Keep `driver` (typically an output stream) alive as long as the context.
    pub fn attach_driver(&self, driver: Box<dyn Any + Send>) {
        *self.driver.lock() = Some(driver);
    }

    /// `true` if a driver is attached.
    pub fn has_driver(&self) -> bool {
        self.driver.lock().is_some()
    }

    /// Stop accepting commands and drop the driver.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.driver.lock().take();
            tracing::debug!("audio context closed");
        }
    }

    /// `true` after [`close`](Self::close).
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Commands waiting for the renderer.
    pub fn queued_commands(&self) -> usize {
        self.commands.len()
    }

    /// Return the process-wide context, creating it if needed.
    ///
    /// On creation `start` receives the renderer and returns the driver that
    /// keeps it running; the driver is attached to the context. A closed
    /// shared context is replaced.
    pub fn acquire<F>(config: ContextConfig, start: F) -> Result<Arc<Self>>
    where
        F: FnOnce(Renderer) -> Result<Box<dyn Any + Send>>,
    {
        let mut shared = SHARED.lock();
        if let Some(context) = shared.as_ref()
            && !context.is_closed()
        {
            return Ok(Arc::clone(context));
        }

        let (context, renderer) = Self::new(config)?;
        let driver = start(renderer)?;
        context.attach_driver(driver);
        *shared = Some(Arc::clone(&context));
        tracing::info!(sample_rate = config.sample_rate, "shared audio context started");
        Ok(context)
    }

    /// The process-wide context, if one is running.
    pub fn shared() -> Option<Arc<Self>> {
        SHARED.lock().as_ref().filter(|c| !c.is_closed()).cloned()
    }

    /// Close and forget the process-wide context.
    ///
    /// Engines still holding it see a closed sink; their commands are dropped.
    pub fn release_shared() {
        if let Some(context) = SHARED.lock().take() {
            context.close();
            tracing::info!("shared audio context released");
        }
    }
}

static SHARED: Mutex<Option<Arc<AudioContext>>> = parking_lot::const_mutex(None);

impl RenderSink for AudioContext {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn submit(&self, command: RenderCommand) {
        if self.is_closed() {
            return;
        }
        match self.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                tracing::warn!(?command, "render queue full, command dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("renderer gone, command dropped");
            }
        }
    }

    fn open_lane(&self) -> LaneId {
        LaneId(self.next_lane.fetch_add(1, Ordering::Relaxed))
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn analysis_tap(&self) -> AnalysisTap {
        self.tap.clone()
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}

/// A sink that records commands instead of rendering them.
///
/// Time comes from a [`ManualClock`] the test moves by hand.
#[derive(Debug)]
pub struct CommandLog {
    sample_rate: f32,
    clock: ManualClock,
    commands: Mutex<Vec<RenderCommand>>,
    next_lane: AtomicU32,
    tap: AnalysisTap,
}

impl CommandLog {
    /// Create an empty log at time zero.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            clock: ManualClock::new(0.0),
            commands: Mutex::new(Vec::new()),
            next_lane: AtomicU32::new(0),
            tap: AnalysisTap::default(),
        }
    }

    /// Move the clock to `time`.
    pub fn set_time(&self, time: f64) {
        self.clock.set(time);
    }

    /// Move the clock forward.
    pub fn advance(&self, seconds: f64) {
        self.clock.advance(seconds);
    }

    /// Take every recorded command, oldest first.
    pub fn take(&self) -> Vec<RenderCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }
}

impl RenderSink for CommandLog {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn submit(&self, command: RenderCommand) {
        self.commands.lock().push(command);
    }

    fn open_lane(&self) -> LaneId {
        LaneId(self.next_lane.fetch_add(1, Ordering::Relaxed))
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn analysis_tap(&self) -> AnalysisTap {
        self.tap.clone()
    }
}
