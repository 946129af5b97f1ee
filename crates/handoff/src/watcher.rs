//! Push-based observation of the status record.
//!
//! [`StatusWatcher::watch`] subscribes to change notifications on the
//! directory holding the status file (inotify on Linux) and returns a
//! [`StatusSubscription`]. Every notification for a `.json` entry in that
//! directory triggers a fresh read of the status file:
//!
//! - unreadable or malformed contents are a non-event (the worker may be
//!   mid-write), and the watcher waits for the next notification;
//! - a well-formed record with `done == false` is swallowed;
//! - the first record with `done == true` is delivered, after which the
//!   watch is torn down. A subscription yields at most one record.
//!
//! Dropping or [cancelling](StatusSubscription::cancel) the subscription
//! removes the watch and discards any read still in flight.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use mixbuild_core::status::STATUS_FILE_EXTENSION;
use mixbuild_core::StatusRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("cannot watch {path}: {source}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("change notification stream failed: {0}")]
    Notify(#[source] std::io::Error),

    #[error("status watching is not supported on this platform")]
    Unsupported,
}

/// Watches one status file.
#[derive(Debug, Clone)]
pub struct StatusWatcher {
    status_path: PathBuf,
}

/// An active watch. Yields the completed [`StatusRecord`] once.
pub struct StatusSubscription {
    rx: mpsc::Receiver<Result<StatusRecord, WatchError>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StatusWatcher {
    pub fn new(status_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
        }
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    fn watch_dir(&self) -> PathBuf {
        match self.status_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Start watching. Must be called from within a Tokio runtime.
    ///
    /// The watch is armed before this returns, and the status file is
    /// read once right away so a record completed before subscribing is
    /// not missed.
    pub fn watch(&self) -> Result<StatusSubscription, WatchError> {
        let dir = self.watch_dir();
        let events = backend::subscribe(&dir).map_err(|source| {
            if source.kind() == std::io::ErrorKind::Unsupported {
                WatchError::Unsupported
            } else {
                WatchError::Subscribe {
                    path: dir.clone(),
                    source,
                }
            }
        })?;

        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let status_path = self.status_path.clone();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            tracing::debug!(path = %status_path.display(), "Status watch armed");
            run_watch(events, &status_path, &tx, &task_cancel).await;
            tracing::debug!(path = %status_path.display(), "Status watch removed");
        });

        Ok(StatusSubscription { rx, cancel, task })
    }
}

impl StatusSubscription {
    /// Wait for the completed status record.
    ///
    /// Returns `None` once the record has been delivered or the
    /// subscription was cancelled. Returns `Some(Err(_))` if the
    /// notification stream itself failed; the watch is gone after that.
    pub async fn next(&mut self) -> Option<Result<StatusRecord, WatchError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    /// Tear down the watch. No record is delivered after this returns,
    /// even one already read.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    /// `true` while the watch task is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_watch(
    mut events: backend::EventStream,
    status_path: &Path,
    tx: &mpsc::Sender<Result<StatusRecord, WatchError>>,
    cancel: &CancellationToken,
) {
    let initial = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        record = read_completed(status_path) => record,
    };
    if let Some(record) = initial {
        let _ = tx.send(Ok(record)).await;
        return;
    }

    loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            batch = events.next_batch() => batch,
        };

        let names = match batch {
            Ok(names) => names,
            Err(e) => {
                tracing::error!(error = %e, "Status watch failed");
                let _ = tx.send(Err(WatchError::Notify(e))).await;
                return;
            }
        };

        if !names.iter().any(|n| is_relevant(n.as_ref())) {
            continue;
        }

        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            record = read_completed(status_path) => record,
        };
        if let Some(record) = record {
            tracing::info!(result_path = %record.result_path, "Worker reported completion");
            let _ = tx.send(Ok(record)).await;
            return;
        }
    }
}

/// Whether a notification for `name` may concern the status file.
///
/// `None` means the kernel could not say which entry changed (queue
/// overflow), so the file is re-read to be safe.
fn is_relevant(name: Option<&OsString>) -> bool {
    match name {
        None => true,
        Some(name) => Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(STATUS_FILE_EXTENSION)),
    }
}

/// Read the status file, returning the record only if it reports done.
async fn read_completed(status_path: &Path) -> Option<StatusRecord> {
    let bytes = match tokio::fs::read(status_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Status file not readable yet");
            return None;
        }
    };
    match StatusRecord::decode(&bytes) {
        Ok(record) if record.done => Some(record),
        Ok(_) => {
            tracing::debug!("Status record still pending");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring undecodable status record");
            None
        }
    }
}

#[cfg(target_os = "linux")]
mod backend {
    use std::ffi::OsString;
    use std::os::fd::{AsFd, AsRawFd, RawFd};
    use std::path::Path;

    use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};
    use tokio::io::unix::AsyncFd;
    use tokio::io::Interest;

    struct InotifyFd(Inotify);

    impl AsRawFd for InotifyFd {
        fn as_raw_fd(&self) -> RawFd {
            self.0.as_fd().as_raw_fd()
        }
    }

    /// Non-blocking inotify instance registered with the Tokio reactor.
    /// Closing the descriptor on drop removes the watch.
    pub(super) struct EventStream {
        fd: AsyncFd<InotifyFd>,
    }

    pub(super) fn subscribe(dir: &Path) -> std::io::Result<EventStream> {
        let inotify = Inotify::init(InitFlags::IN_CLOEXEC | InitFlags::IN_NONBLOCK)?;
        inotify.add_watch(
            dir,
            AddWatchFlags::IN_CREATE
                | AddWatchFlags::IN_MODIFY
                | AddWatchFlags::IN_CLOSE_WRITE
                | AddWatchFlags::IN_MOVED_TO,
        )?;
        // SAFETY: `InotifyFd` owns the descriptor and always returns it.
        let fd = unsafe { AsyncFd::register_with_interest(InotifyFd(inotify), Interest::READABLE) }
            .map_err(|e| e.into_parts().1)?;
        Ok(EventStream { fd })
    }

    impl EventStream {
        /// Wait for the next batch of notifications and return the entry
        /// names they refer to.
        pub(super) async fn next_batch(&mut self) -> std::io::Result<Vec<Option<OsString>>> {
            loop {
                let mut guard = self.fd.readable().await?;
                match guard.try_io(|inner| inner.get_ref().0.read_events().map_err(Into::into)) {
                    Ok(Ok(events)) => return Ok(events.into_iter().map(|e| e.name).collect()),
                    Ok(Err(e)) => return Err(e),
                    Err(_would_block) => continue,
                }
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod backend {
    use std::ffi::OsString;
    use std::path::Path;

    pub(super) struct EventStream;

    pub(super) fn subscribe(_dir: &Path) -> std::io::Result<EventStream> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "status watching requires inotify",
        ))
    }

    impl EventStream {
        pub(super) async fn next_batch(&mut self) -> std::io::Result<Vec<Option<OsString>>> {
            Err(std::io::ErrorKind::Unsupported.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
