use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::protocol::OutboundFrame;

/// Spawn the keep-alive task for one connected channel.
///
/// Sends [`OutboundFrame::Ping`] every `period`, starting one period after
/// the call. The task exits when `cancel` fires or the channel's outbound
/// queue is gone. Pass a child of the channel's token so that tearing the
/// channel down always stops its pings.
pub fn spawn_liveness(
    period: Duration,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if outbound.send(OutboundFrame::Ping).is_err() {
                        tracing::debug!("Outbound queue closed, stopping liveness pings");
                        break;
                    }
                    tracing::trace!("Liveness ping sent");
                }
            }
        }
    })
}
