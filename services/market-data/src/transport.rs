//! Transport seam between the fan-out and the physical connections

use async_trait::async_trait;

/// One outbound feed connection
///
/// The gateway owns the physical socket; the fan-out only ever sees this
/// trait and an opaque connection id. `send` should resolve when the frame
/// is handed to the socket; the fan-out bounds it with its own timeout.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn send(&self, frame: String) -> Result<(), String>;
}
