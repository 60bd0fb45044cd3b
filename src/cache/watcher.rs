//! Filesystem change notifications for the file cache.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// A change to one file under a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Changed(PathBuf),
    Created(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Keeps a recursive watch alive; dropping it stops notifications.
pub struct FileWatcher {
    root: PathBuf,
    // Some platform watchers are `Send` but not `Sync`.
    _watcher: Mutex<RecommendedWatcher>,
}

impl FileWatcher {
    /// Watch `root` recursively, forwarding every change to `on_event`.
    ///
    /// The callback runs on the watcher's own thread.
    pub fn watch<F>(root: &Path, on_event: F) -> Result<Self, notify::Error>
    where
        F: Fn(FsEvent) + Send + 'static,
    {
        let watched = root.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => translate(event).into_iter().for_each(&on_event),
                Err(e) => tracing::warn!(root = %watched.display(), error = %e, "File watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        tracing::info!(root = %root.display(), "File watcher started");
        Ok(Self {
            root: root.to_path_buf(),
            _watcher: Mutex::new(watcher),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").field("root", &self.root).finish()
    }
}

/// Map a raw notify event onto cache-relevant changes.
pub fn translate(event: Event) -> Vec<FsEvent> {
    let mut paths = event.paths;
    match event.kind {
        EventKind::Create(_) => paths.into_iter().map(FsEvent::Created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(FsEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let to = paths.pop().unwrap_or_default();
            let from = paths.pop().unwrap_or_default();
            vec![FsEvent::Renamed { from, to }]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.into_iter().map(FsEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.into_iter().map(FsEvent::Created).collect()
        }
        EventKind::Modify(_) | EventKind::Any => paths.into_iter().map(FsEvent::Changed).collect(),
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn rename_carries_both_paths() {
        let events = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/www/a.html", "/www/b.html"],
        ));
        assert_eq!(
            events,
            vec![FsEvent::Renamed {
                from: PathBuf::from("/www/a.html"),
                to: PathBuf::from("/www/b.html"),
            }]
        );
    }

    #[test]
    fn create_modify_remove() {
        assert_eq!(
            translate(event(EventKind::Create(CreateKind::File), &["/www/n"])),
            vec![FsEvent::Created(PathBuf::from("/www/n"))]
        );
        assert_eq!(
            translate(event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/www/m"]
            )),
            vec![FsEvent::Changed(PathBuf::from("/www/m"))]
        );
        assert_eq!(
            translate(event(EventKind::Remove(RemoveKind::File), &["/www/r"])),
            vec![FsEvent::Deleted(PathBuf::from("/www/r"))]
        );
    }

    #[test]
    fn access_is_ignored() {
        let kind = EventKind::Access(notify::event::AccessKind::Any);
        assert!(translate(event(kind, &["/www/a"])).is_empty());
    }
}
