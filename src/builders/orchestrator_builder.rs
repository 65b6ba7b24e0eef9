//! Two-phase construction: register on the builder, then `start`.
//!
//! The builder is the orchestrator's `Idle` phase. `start` consumes it and
//! moves the work units and handler onto the execution thread, so adding
//! work to a running orchestrator does not type-check.

use std::fmt;
use std::time::Duration;

use crate::config::OrchestratorConfig;
use crate::core::orchestrator::MessageHandlerFn;
use crate::core::work_unit::WorkUnitRecord;
use crate::core::{
    Message, Orchestrator, OrchestratorError, OrchestratorHandle, OrchestratorId, PostError,
};

/// An orchestrator that has not been started yet.
///
/// ```
/// use std::time::Duration;
/// use prometheus_workload::builders::OrchestratorBuilder;
/// use prometheus_workload::config::OrchestratorConfig;
///
/// let mut builder = OrchestratorBuilder::new(OrchestratorConfig::new().with_name("worker"))?;
/// let me = builder.handle();
/// builder
///     .register_work_unit(|| {}, Duration::from_millis(250))
///     .register_message_handler(move |msg| {
///         if msg.payload()[0] == 5 {
///             me.stop();
///         }
///     });
///
/// let orchestrator = builder.start()?;
/// orchestrator.stop();
/// orchestrator.wait();
/// # Ok::<(), prometheus_workload::core::OrchestratorError>(())
/// ```
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    handle: OrchestratorHandle,
    units: Vec<WorkUnitRecord>,
    handler: Option<MessageHandlerFn>,
    /// Ownership of the instance passed to a running `Orchestrator`.
    launched: bool,
}

impl OrchestratorBuilder {
    /// Create a builder from `config`.
    ///
    /// The inbox exists from this point: messages posted through
    /// [`handle`](Self::handle) before `start` are delivered on the first tick.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        config.validate().map_err(OrchestratorError::InvalidConfig)?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: OrchestratorConfig) -> Self {
        let handle = OrchestratorHandle::new(&config);
        Self {
            config,
            handle,
            units: Vec::new(),
            handler: None,
            launched: false,
        }
    }

    /// Append a work unit run at most once per `min_interval`.
    ///
    /// Units run in registration order within a tick.
    pub fn register_work_unit<F>(&mut self, cb: F, min_interval: Duration) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        let name = format!("work-unit-{}", self.units.len());
        self.register_named_work_unit(name, cb, min_interval)
    }

    /// Like [`register_work_unit`](Self::register_work_unit), with a name used
    /// in trace output.
    pub fn register_named_work_unit<F>(
        &mut self,
        name: impl Into<String>,
        cb: F,
        min_interval: Duration,
    ) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        self.units
            .push(WorkUnitRecord::new(name.into(), Box::new(cb), min_interval));
        self
    }

    /// Set the handler invoked on the orchestrator's thread for each message.
    ///
    /// The handler may call back into this orchestrator through a handle
    /// (for example to stop it) but should not block: it delays every work
    /// unit of the tick.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered.
    pub fn register_message_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&Message) + Send + 'static,
    {
        assert!(
            self.handler.is_none(),
            "orchestrator `{}` already has a message handler",
            self.config.name
        );
        self.handler = Some(Box::new(handler));
        self
    }

    /// Handle to the orchestrator being built.
    #[must_use]
    pub fn handle(&self) -> OrchestratorHandle {
        self.handle.clone()
    }

    /// Identity of the orchestrator being built.
    #[must_use]
    pub fn id(&self) -> OrchestratorId {
        self.handle.id()
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Queue a message for delivery once started.
    ///
    /// # Errors
    ///
    /// See [`OrchestratorHandle::post`].
    pub fn post(&self, message: &Message) -> Result<(), PostError> {
        self.handle.post(message)
    }

    /// Spawn the execution thread and begin ticking.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Spawn` if the OS refuses the thread. The
    /// orchestrator is then left `Stopped`.
    pub fn start(mut self) -> Result<Orchestrator, OrchestratorError> {
        let units = std::mem::take(&mut self.units);
        let orchestrator =
            Orchestrator::launch(self.handle.clone(), &self.config, units, self.handler.take())?;
        self.launched = true;
        Ok(orchestrator)
    }
}

impl Drop for OrchestratorBuilder {
    /// A builder dropped without a successful `start` takes its instance
    /// with it.
    fn drop(&mut self) {
        if !self.launched {
            self.handle.retire();
        }
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::from_valid_config(OrchestratorConfig::default())
    }
}

impl fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("config", &self.config)
            .field("units", &self.units)
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}
