//! # Prometheus Workload
//!
//! Lightweight periodic work orchestrators that exchange small fixed-size
//! messages.
//!
//! Each [`Orchestrator`](core::Orchestrator) owns one dedicated OS thread.
//! Work units are registered before start and re-run on that thread, each no
//! more often than its own minimum interval. Orchestrators talk to each other
//! by posting [`Message`](core::Message)s into the receiver's bounded inbox;
//! the receiver drains and dispatches them on its own thread at the start of
//! every tick.
//!
//! ## Key Features
//!
//! - **Thread per instance**: no async runtime required, no shared executor
//! - **Per-unit intervals**: a tick runs every due unit in registration order,
//!   then sleeps until the next unit falls due, never longer than the
//!   configured idle ceiling
//! - **Lock-free inbox**: [`BoundedChannel`](infra::BoundedChannel) accepts
//!   concurrent posts from any thread and never blocks or grows
//! - **Safe replies**: messages carry a weak [`Origin`](core::Origin); replying
//!   to an orchestrator that is gone fails with an error instead of dangling
//! - **Type-level phases**: registration lives on
//!   [`OrchestratorBuilder`](builders::OrchestratorBuilder), which `start`
//!   consumes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use prometheus_workload::builders::OrchestratorBuilder;
//! use prometheus_workload::config::OrchestratorConfig;
//! use prometheus_workload::core::Message;
//!
//! let mut ping = OrchestratorBuilder::new(OrchestratorConfig::new().with_name("ping"))?;
//! let mut pong = OrchestratorBuilder::new(OrchestratorConfig::new().with_name("pong"))?;
//!
//! let ping_self = ping.handle();
//! let ping_target = ping.handle();
//!
//! ping.register_work_unit(|| println!("4 Hz"), Duration::from_millis(250))
//!     .register_message_handler(move |msg| {
//!         // Echo back to whoever sent it.
//!         let _ = msg.reply(msg);
//!         if msg.payload()[0] == 5 {
//!             ping_self.stop();
//!         }
//!     });
//!
//! let mut counter = 0u8;
//! let me = pong.handle().downgrade();
//! pong.register_work_unit(
//!     move || {
//!         let msg = Message::from_bytes(&[counter]).with_origin(me.clone());
//!         if ping_target.post(&msg).is_ok() {
//!             counter += 1;
//!         }
//!     },
//!     Duration::from_secs(1),
//! );
//!
//! let ping = ping.start()?;
//! let pong = pong.start()?;
//! ping.wait();
//! pong.stop();
//! pong.wait();
//! # Ok::<(), prometheus_workload::core::OrchestratorError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core orchestrator abstractions, messages, and the scheduling loop.
pub mod core;
/// Configuration models for orchestrators.
pub mod config;
/// Builders holding the registration phase of an orchestrator.
pub mod builders;
/// Infrastructure primitives such as the bounded inbox channel.
pub mod infra;
/// Shared utilities.
pub mod util;
