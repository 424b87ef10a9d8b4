use anyhow::{Result, bail};
use async_trait::async_trait;
use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    sync::mpsc::{UnboundedReceiver, unbounded_channel},
    task::JoinHandle,
    time::Duration,
};
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Something that can be hot-reloaded from a file on disk.
#[async_trait]
pub trait WatchedType: Send + Sync + 'static {
    fn is_relevant(&self, path: &Path) -> bool;

    async fn on_create_or_modify(&self, path: &Path) -> Result<()>;

    async fn on_remove(&self, path: &Path) -> Result<()>;
}

/// Polls one file's directory and forwards changes to a [`WatchedType`].
///
/// Events for a path are handled one at a time, in arrival order.
pub struct FileWatcher {
    path: PathBuf,
    // Polling stops when this is dropped.
    poller: PollWatcher,
    dispatch: JoinHandle<()>,
}

impl FileWatcher {
    pub fn new(path: PathBuf, watched: Arc<dyn WatchedType>, poll_interval: Duration) -> Result<FileWatcher> {
        let Some(dir) = path.parent().map(|p| {
            if p.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                p.to_path_buf()
            }
        }) else {
            bail!("{} has no parent directory", path.display());
        };
        if !dir.exists() {
            bail!("Directory {} does not exist", dir.display());
        }

        let (tx, rx): (_, UnboundedReceiver<notify::Result<Event>>) = unbounded_channel();
        let mut poller = PollWatcher::new(
            move |res| {
                // Nobody is listening once the dispatch task is gone.
                let _ = tx.send(res);
            },
            // Poll timestamps have one-second resolution; hashing catches quicker edits.
            Config::default()
                .with_poll_interval(poll_interval)
                .with_compare_contents(true),
        )?;
        poller.watch(&dir, RecursiveMode::NonRecursive)?;

        let dispatch = tokio::spawn(dispatch(rx, watched));
        debug!(path = %path.display(), "watching configuration file");

        Ok(FileWatcher {
            path,
            poller,
            dispatch,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop polling and abort the dispatch task. No events are dispatched after this returns.
    pub fn shutdown(self) {
        drop(self.poller);
        self.dispatch.abort();
    }
}

async fn dispatch(mut rx: UnboundedReceiver<notify::Result<Event>>, watched: Arc<dyn WatchedType>) {
    while let Some(res) = rx.recv().await {
        match res {
            Ok(Event {
                kind: EventKind::Create(_) | EventKind::Modify(_),
                paths,
                ..
            }) => {
                for path in paths.iter().filter(|p| watched.is_relevant(p)) {
                    if let Err(e) = watched.on_create_or_modify(path).await {
                        warn!(?path, ?e, "Failed to handle create/modify");
                    }
                }
            }
            Ok(Event {
                kind: EventKind::Remove(_),
                paths,
                ..
            }) => {
                for path in paths.iter().filter(|p| watched.is_relevant(p)) {
                    if let Err(e) = watched.on_remove(path).await {
                        warn!(?path, ?e, "Failed to handle removal");
                    }
                }
            }
            Err(e) => warn!(?e, "Watcher error"),
            _ => {}
        }
    }
}
