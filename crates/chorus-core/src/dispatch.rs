//! Reply dispatcher trait definition.

use chorus_types::error::DispatchError;
use chorus_types::webhook::OutboundReply;

/// Delivers a signed reply back to the messaging platform.
///
/// `callback_url` is the caller-supplied URL from the webhook; when absent,
/// implementations derive a platform REST endpoint from the room token.
/// Delivery failures are the caller's to log; there is no synchronous retry.
pub trait ReplyDispatcher: Send + Sync {
    fn deliver(
        &self,
        reply: &OutboundReply,
        room_token: &str,
        callback_url: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), DispatchError>> + Send;
}
