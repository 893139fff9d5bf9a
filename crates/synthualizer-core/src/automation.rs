//! Time-stamped automation curves.
//!
//! An [`AutomationCurve`] is the control-rate description of how a value
//! (typically a voice's gain) moves over time. The control thread schedules
//! events into it; the render thread evaluates it once per frame.
//!
//! ## Evaluation rules
//!
//! Events are kept sorted by time. For a query time `t`:
//!
//! - Before the first event, the curve reports its default value.
//! - After an event, its value holds until the next event.
//! - If the next event is a ramp, the value is interpolated between the
//!   previous event's `(time, value)` and the ramp's `(end_time, value)`.
//!   Linear ramps interpolate linearly, exponential ramps geometrically
//!   (`v0 * (v1 / v0)^frac`).
//! - An exponential ramp whose endpoints are zero or of opposite sign cannot
//!   be evaluated geometrically and holds the previous value instead.
//!
//! Cancelling removes every event at or after the cancel time. A ramp that is
//! in flight at that moment disappears entirely, so callers that want to keep
//! the instantaneous value must read it first and re-anchor with
//! [`set_value_at_time`](AutomationCurve::set_value_at_time).
//!
//! ## Threading
//!
//! Curves are plain data. Each mutation has a [`AutomationOp`] form that is
//! `Copy`, so the same op can be applied to a control-side mirror and shipped
//! through a channel to the renderer's copy.

use alloc::vec::Vec;

/// Default number of events reserved per curve.
///
/// An attack/decay/release cycle needs at most five events; the extra room
/// keeps the render thread from reallocating while retriggers pile up.
const DEFAULT_EVENT_CAPACITY: usize = 16;

/// How a ramp event interpolates from the previous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampKind {
    /// Straight line between the two points.
    Linear,
    /// Geometric curve between two strictly same-signed, non-zero values.
    Exponential,
}

/// A single scheduled point on an [`AutomationCurve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationEvent {
    /// Time in seconds. For ramps this is the time the ramp *arrives*.
    pub time: f64,
    /// Value at `time`.
    pub value: f32,
    /// `None` for an instantaneous set, `Some` for a ramp ending at `time`.
    pub ramp: Option<RampKind>,
}

/// One mutation of an automation curve.
///
/// Ops are applied in the order they are issued. Non-finite times or values
/// are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationOp {
    /// Remove all events scheduled at or after `time`.
    CancelFrom {
        /// Cancel threshold in seconds.
        time: f64,
    },
    /// Jump to `value` at `time`.
    SetValue {
        /// Target value.
        value: f32,
        /// Time in seconds.
        time: f64,
    },
    /// Ramp linearly from the previous event to `value`, arriving at `end_time`.
    LinearRamp {
        /// Target value.
        value: f32,
        /// Arrival time in seconds.
        end_time: f64,
    },
    /// Ramp exponentially from the previous event to `value`, arriving at `end_time`.
    ExponentialRamp {
        /// Target value.
        value: f32,
        /// Arrival time in seconds.
        end_time: f64,
    },
    /// Drop every event and hold `value` from now on.
    Reset {
        /// New resting value.
        value: f32,
    },
}

/// Anything that accepts automation and can report its value over time.
///
/// Envelope scheduling is written against this trait so it does not care
/// whether the target is a bare curve, a voice's mirrored gain, or a test
/// double.
pub trait Automatable {
    /// Apply one automation op.
    fn apply(&mut self, op: AutomationOp);

    /// Value of the automated parameter at `time` seconds.
    fn value_at(&self, time: f64) -> f32;
}

/// A sorted list of automation events with a resting default value.
///
/// # Example
///
/// ```rust
/// use synthualizer_core::{AutomationCurve, Automatable};
///
/// let mut curve = AutomationCurve::new(0.0);
/// curve.set_value_at_time(0.001, 0.0);
/// curve.exponential_ramp_to_value_at_time(1.0, 1.0);
///
/// // Geometric midpoint of 0.001 and 1.0 sits near 0.0316
/// let mid = curve.value_at(0.5);
/// assert!((mid - 0.031_62).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct AutomationCurve {
    default_value: f32,
    events: Vec<AutomationEvent>,
}

impl Default for AutomationCurve {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AutomationCurve {
    /// Create an empty curve resting at `default_value`.
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::with_capacity(DEFAULT_EVENT_CAPACITY),
        }
    }

    /// Value reported before the first event.
    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    /// Scheduled events, sorted by time.
    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    /// Returns `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time of the last scheduled event, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    /// Schedule an instantaneous change to `value` at `time`.
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(AutomationEvent {
            time,
            value,
            ramp: None,
        });
    }

    /// Schedule a linear ramp from the previous event to `value` at `end_time`.
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(AutomationEvent {
            time: end_time,
            value,
            ramp: Some(RampKind::Linear),
        });
    }

    /// Schedule an exponential ramp from the previous event to `value` at `end_time`.
    ///
    /// The curve stores the event as given; keeping endpoints strictly
    /// positive is the caller's job.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(AutomationEvent {
            time: end_time,
            value,
            ramp: Some(RampKind::Exponential),
        });
    }

    /// Remove every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        if time.is_nan() {
            return;
        }
        self.events.retain(|e| e.time < time);
    }

    /// Drop all events and rest at `value`.
    pub fn reset(&mut self, value: f32) {
        self.events.clear();
        self.default_value = value;
    }

    /// Discard history that can no longer influence `value_at(t)` for any `t >= time`.
    ///
    /// The most recent event at or before `time` is kept as the anchor for
    /// whatever follows it. Its value becomes the new default so a fully
    /// drained curve keeps reporting the same resting value.
    pub fn prune_before(&mut self, time: f64) {
        let settled = self.events.partition_point(|e| e.time <= time);
        if settled >= 2 {
            self.events.drain(..settled - 1);
        }
        if let [only] = self.events.as_slice()
            && only.time <= time
        {
            self.default_value = only.value;
        }
    }

    fn insert(&mut self, event: AutomationEvent) {
        if !event.time.is_finite() || !event.value.is_finite() {
            #[cfg(feature = "tracing")]
            tracing::debug!(time = event.time, value = event.value, "automation: ignoring non-finite event");
            return;
        }
        // Events at the same time keep their insertion order
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
    }

    fn evaluate(&self, time: f64) -> f32 {
        let idx = self.events.partition_point(|e| e.time <= time);

        let Some(prev) = idx.checked_sub(1).map(|i| self.events[i]) else {
            return self.default_value;
        };

        let Some(next) = self.events.get(idx) else {
            return prev.value;
        };

        let span = next.time - prev.time;
        if span <= 0.0 {
            return prev.value;
        }
        let frac = ((time - prev.time) / span).clamp(0.0, 1.0);

        match next.ramp {
            None => prev.value,
            Some(RampKind::Linear) => {
                let v0 = f64::from(prev.value);
                let v1 = f64::from(next.value);
                (v0 + (v1 - v0) * frac) as f32
            }
            Some(RampKind::Exponential) => {
                let v0 = f64::from(prev.value);
                let v1 = f64::from(next.value);
                if v0 == 0.0 || v1 == 0.0 || (v0 < 0.0) != (v1 < 0.0) {
                    prev.value
                } else {
                    (v0 * libm::pow(v1 / v0, frac)) as f32
                }
            }
        }
    }
}

impl Automatable for AutomationCurve {
    fn apply(&mut self, op: AutomationOp) {
        match op {
            AutomationOp::CancelFrom { time } => self.cancel_scheduled_values(time),
            AutomationOp::SetValue { value, time } => self.set_value_at_time(value, time),
            AutomationOp::LinearRamp { value, end_time } => {
                self.linear_ramp_to_value_at_time(value, end_time);
            }
            AutomationOp::ExponentialRamp { value, end_time } => {
                self.exponential_ramp_to_value_at_time(value, end_time);
            }
            AutomationOp::Reset { value } => self.reset(value),
        }
    }

    fn value_at(&self, time: f64) -> f32 {
        self.evaluate(time)
    }
}
