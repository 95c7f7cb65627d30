use tokio::sync::watch;

use crate::LogPosition;

/// Broadcasts the latest committed log position to subscribers.
///
/// A store publishes on every successful commit; the projector waits on a
/// receiver instead of polling blindly. Subscribers only ever observe the
/// most recent position, which is all they need to know there is work.
#[derive(Debug, Clone)]
pub struct CommitFeed {
    tx: watch::Sender<LogPosition>,
}

impl CommitFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LogPosition::start());
        Self { tx }
    }

    /// Records a committed position. Positions never move backwards.
    pub fn publish(&self, position: LogPosition) {
        self.tx.send_if_modified(|current| {
            if position > *current {
                *current = position;
                true
            } else {
                false
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<LogPosition> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> LogPosition {
        *self.tx.borrow()
    }
}

impl Default for CommitFeed {
    fn default() -> Self {
        Self::new()
    }
}
