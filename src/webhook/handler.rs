//! Callback intake: signature check, payload parse, then hand-off to the
//! orchestrator. Framework-agnostic on purpose; an HTTP layer passes the
//! raw body and signature header straight through.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{DispatchError, Result};
use crate::orchestration::{CallbackAck, CallbackPayload, Orchestrator};
use crate::webhook::signature;

/// Verifies and applies execution-service callbacks
#[derive(Clone)]
pub struct CallbackHandler {
    orchestrator: Arc<Orchestrator>,
}

impl CallbackHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Process one raw callback request.
    ///
    /// A bad signature or an unparseable body is an error the transport
    /// should surface as a rejection; a valid callback for an unknown
    /// correlation id is acknowledged as [`CallbackAck::Discarded`].
    pub async fn handle(&self, body: &[u8], signature_header: &str) -> Result<CallbackAck> {
        if let Err(e) = signature::verify(
            self.orchestrator.callback_secret(),
            body,
            signature_header,
        ) {
            self.orchestrator.metrics().record_callback_rejected();
            warn!(error = %e, "🚫 Callback rejected: bad signature");
            return Err(e);
        }

        let payload: CallbackPayload = serde_json::from_slice(body).map_err(|e| {
            self.orchestrator.metrics().record_callback_rejected();
            warn!(error = %e, "🚫 Callback rejected: malformed body");
            DispatchError::MalformedCallback(e.to_string())
        })?;

        debug!(
            correlation_id = %payload.correlation_id,
            event = ?payload.event,
            "📨 Callback accepted for processing"
        );
        self.orchestrator.handle_callback(payload).await
    }
}
