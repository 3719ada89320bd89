//! Per-session state.
//!
//! One [`SessionContext`] exists per live session and is owned by the adapter
//! that hosts it.  Nothing in the client keeps session state anywhere else.

use quick_core::{
    ClipboardBuffer, ClipboardPolicy, ConnectionLifecycle, DecodedPayload, SessionDescriptor,
    ViewportManager,
};

use crate::application::clipboard::{ClipboardBridge, SystemClipboard};

/// Everything one session needs besides its transport.
#[derive(Debug)]
pub struct SessionContext {
    /// The decoded launch payload.  Immutable.
    pub payload: DecodedPayload,
    /// The session minted by the backend.  Immutable.
    pub session: SessionDescriptor,
    pub lifecycle: ConnectionLifecycle,
    pub viewport: ViewportManager,
    pub clipboard: ClipboardBuffer,
}

impl SessionContext {
    pub fn new(payload: DecodedPayload, session: SessionDescriptor, viewport: ViewportManager) -> Self {
        Self {
            payload,
            session,
            lifecycle: ConnectionLifecycle::new(),
            viewport,
            clipboard: ClipboardBuffer::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn protocol(&self) -> &str {
        &self.payload.descriptor.protocol
    }

    pub fn policy(&self) -> ClipboardPolicy {
        ClipboardPolicy::from_session(&self.session)
    }

    /// A clipboard bridge sharing this session's buffer.
    pub fn clipboard_bridge(&self, system: Option<Box<dyn SystemClipboard>>) -> ClipboardBridge {
        ClipboardBridge::new(self.policy(), self.clipboard.clone(), system)
    }
}
