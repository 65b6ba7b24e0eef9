//! Inter-orchestrator messages and sender identity.

use std::fmt;
use std::sync::Weak;

use uuid::Uuid;

use super::error::PostError;
use super::orchestrator::{OrchestratorHandle, Shared};

/// Size of a message payload in bytes.
pub const PAYLOAD_SIZE: usize = 256;

/// Unique identity of an orchestrator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrchestratorId(Uuid);

impl OrchestratorId {
    pub(crate) fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OrchestratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Non-owning reference to the orchestrator that sent a message.
///
/// Holding an `Origin` does not keep the sender alive. Once the sender is
/// gone (its `Orchestrator` dropped, even while peers still hold handles to
/// it), [`Origin::upgrade`] returns `None` and [`Origin::post`] fails with
/// [`PostError::Disconnected`].
#[derive(Clone)]
pub struct Origin {
    id: OrchestratorId,
    shared: Weak<Shared>,
}

impl Origin {
    pub(crate) const fn new(id: OrchestratorId, shared: Weak<Shared>) -> Self {
        Self { id, shared }
    }

    /// Identity of the sender. Valid even after the sender is gone.
    #[must_use]
    pub const fn id(&self) -> OrchestratorId {
        self.id
    }

    /// Obtain a live handle to the sender, if it still exists.
    #[must_use]
    pub fn upgrade(&self) -> Option<OrchestratorHandle> {
        self.shared
            .upgrade()
            .map(OrchestratorHandle::from_shared)
            .filter(|handle| !handle.is_retired())
    }

    /// Post `message` to the sender.
    ///
    /// # Errors
    ///
    /// [`PostError::Disconnected`] if the sender no longer exists, otherwise
    /// whatever the sender's inbox reports.
    pub fn post(&self, message: &Message) -> Result<(), PostError> {
        self.upgrade()
            .ok_or(PostError::Disconnected)
            .and_then(|handle| handle.post(message))
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin")
            .field("id", &self.id)
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

/// Fixed-size message exchanged between orchestrators.
///
/// Messages are copied into the receiver's inbox on post and handed to the
/// receiver's handler by reference. Cloning never allocates.
#[derive(Clone)]
pub struct Message {
    payload: [u8; PAYLOAD_SIZE],
    origin: Option<Origin>,
}

impl Message {
    /// A zeroed message with no origin.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            payload: [0; PAYLOAD_SIZE],
            origin: None,
        }
    }

    /// A message whose payload starts with `bytes`.
    ///
    /// Bytes beyond [`PAYLOAD_SIZE`] are dropped; the remainder is zeroed.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut message = Self::new();
        let len = bytes.len().min(PAYLOAD_SIZE);
        message.payload[..len].copy_from_slice(&bytes[..len]);
        message
    }

    /// Attach a sender identity.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Payload bytes.
    #[must_use]
    pub const fn payload(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.payload
    }

    /// Mutable payload bytes.
    pub fn payload_mut(&mut self) -> &mut [u8; PAYLOAD_SIZE] {
        &mut self.payload
    }

    /// Sender identity, if one was attached.
    #[must_use]
    pub const fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Post `reply` to this message's sender.
    ///
    /// # Errors
    ///
    /// [`PostError::NoOrigin`] if the message carries no sender, otherwise
    /// see [`Origin::post`].
    pub fn reply(&self, reply: &Self) -> Result<(), PostError> {
        self.origin
            .as_ref()
            .ok_or(PostError::NoOrigin)
            .and_then(|origin| origin.post(reply))
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
            && self.origin.as_ref().map(Origin::id) == other.origin.as_ref().map(Origin::id)
    }
}

impl Eq for Message {}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("head", &&self.payload[..8])
            .field("origin", &self.origin.as_ref().map(Origin::id))
            .finish()
    }
}
