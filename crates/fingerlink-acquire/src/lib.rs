//! Fingerprint acquisition engine.
//!
//! Drives a fingerprint reader through the [`fingerlink_hardware`] driver
//! and matching traits and reports what happens to a host as a stream of
//! [`AcquireEvent`](fingerlink_core::AcquireEvent)s.
//!
//! # Architecture
//!
//! - [`Engine`] is the host-facing entry point.
//! - [`controller`] runs the acquisition loop, the two-phase stop and the
//!   reader monitor.
//! - [`orchestrator`] is the capture state machine, advanced one tick per
//!   loop iteration.
//! - [`session`] tracks attached readers and the open device.
//! - [`bridge`] queues events and hands them to the host one at a time.
//! - [`dispatcher`] runs compare and identify off the host's path.
//! - [`tick`] and [`flags`] rate-limit and deduplicate hardware steps.
//!
//! Raw capture results reach the engine through a channel, so every piece
//! of session state is only ever touched by the task holding the
//! orchestrator.

pub mod bridge;
pub mod controller;
pub mod dispatcher;
pub mod engine;
pub mod flags;
pub mod orchestrator;
pub mod session;
pub mod tick;

pub use dispatcher::Pending;
pub use engine::Engine;
pub use orchestrator::Orchestrator;
