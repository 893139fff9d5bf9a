//! Synthualizer Core - scheduling and DSP primitives for the voice engine
//!
//! This crate holds the pieces that both sides of the engine share: the
//! control thread that decides *what* should happen, and the render thread
//! that turns those decisions into samples.
//!
//! # Core Abstractions
//!
//! ## Automation
//!
//! Time-stamped control trajectories with Web Audio `AudioParam` semantics:
//!
//! - [`AutomationCurve`] - Ordered list of set/ramp events evaluated at any time
//! - [`AutomationOp`] - A single curve mutation, cheap to copy across threads
//! - [`Automatable`] - Anything that accepts automation ops and reports its value
//!
//! ## Timing
//!
//! - [`Clock`] - Monotonic audio-rendering time in seconds
//! - [`SampleClock`] - Clock advanced by the renderer, one frame at a time
//! - [`ManualClock`] - Clock moved by hand, for tests and offline drivers
//!
//! ## Parameter Smoothing
//!
//! - [`LinearSmoothedParam`] - Constant-rate ramps for zipper-free changes
//!
//! ## Filters
//!
//! - [`StateVariableFilter`] - TPT state-variable filter with selectable [`SvfOutput`]
//!
//! # no_std Support
//!
//! Disable the default `std` feature to use the crate on targets without an
//! allocator-backed standard library (an allocator is still required):
//!
//! ```toml
//! [dependencies]
//! synthualizer-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use synthualizer_core::{AutomationCurve, Automatable};
//!
//! let mut gain = AutomationCurve::new(0.0);
//! gain.set_value_at_time(0.0, 1.0);
//! gain.linear_ramp_to_value_at_time(1.0, 1.5);
//!
//! assert!((gain.value_at(1.25) - 0.5).abs() < 1e-6);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod automation;
pub mod clock;
pub mod math;
pub mod param;
pub mod svf;

pub use automation::{Automatable, AutomationCurve, AutomationEvent, AutomationOp, RampKind};
pub use clock::{Clock, LookaheadClock, ManualClock, SampleClock};
pub use math::{fast_tan, flush_denormal};
pub use param::LinearSmoothedParam;
pub use svf::{ParseSvfOutputError, StateVariableFilter, SvfOutput};
