use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::domain::JTVError;
use crate::schema::Row;
use crate::source::{DataSource, Health, Request};

pub enum Reply {
    Rows {
        sequence: u64,
        request: Request,
        result: Result<Vec<Row>, JTVError>,
    },
    Health(Result<Health, JTVError>),
}

/// Runs source requests on worker threads.
///
/// Every row request gets a sequence number. Only the reply to the most recent
/// request is handed out by [`Fetcher::poll`]; replies that arrive after a newer
/// request was issued are dropped.
pub struct Fetcher {
    source: Arc<dyn DataSource>,
    sender: Sender<Reply>,
    receiver: Receiver<Reply>,
    latest: u64,
    pending: bool,
}

impl Fetcher {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        let (sender, receiver) = channel();
        Fetcher {
            source,
            sender,
            receiver,
            latest: 0,
            pending: false,
        }
    }

    pub fn request(&mut self, request: Request) -> u64 {
        self.latest += 1;
        self.pending = true;
        let sequence = self.latest;
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();

        debug!("Request #{sequence}: {request:?} from {}", source.describe());
        thread::spawn(move || {
            let start_time = Instant::now();
            let result = source.fetch(&request);
            trace!(
                "Request #{sequence} finished in {}ms",
                start_time.elapsed().as_millis()
            );
            // Fails only once the fetcher is gone, nobody is left to care.
            let _ = sender.send(Reply::Rows {
                sequence,
                request,
                result,
            });
        });
        sequence
    }

    pub fn check_health(&self) {
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        thread::spawn(move || {
            let _ = sender.send(Reply::Health(source.health()));
        });
    }

    /// True while the latest request has not been answered.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Wait up to `timeout` for the next relevant reply.
    pub fn poll(&mut self, timeout: Duration) -> Option<Reply> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let reply = self.receiver.recv_timeout(remaining).ok()?;
            match reply {
                Reply::Rows { sequence, .. } if sequence != self.latest => {
                    debug!(
                        "Discarding stale reply #{sequence}, latest request is #{}",
                        self.latest
                    );
                }
                Reply::Rows { .. } => {
                    self.pending = false;
                    return Some(reply);
                }
                Reply::Health(_) => return Some(reply),
            }
        }
    }
}
