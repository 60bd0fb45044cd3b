//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temporary file and renaming it over the original
//! are still noticed. Only documents that parse and validate are forwarded;
//! anything else is logged and the running configuration stays in place.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ServerConfig;

/// Watches one configuration file and publishes reloaded configurations.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<ServerConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the stream of validated configurations it will
    /// produce once [`run`](Self::run) is called.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServerConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        (Self { path, updates }, rx)
    }

    /// Start watching. Dropping the returned watcher stops the updates.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let path = self.path;
        let updates = self.updates;
        let last = Mutex::new(std::fs::read(&path).ok());

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if concerns(&event, &path) => reload(&path, &last, &updates),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Config watch error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(directory = %dir.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn concerns(event: &Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|p| p == path)
}

fn reload(path: &Path, last: &Mutex<Option<Vec<u8>>>, updates: &mpsc::UnboundedSender<ServerConfig>) {
    let Ok(content) = std::fs::read(path) else {
        return;
    };
    // A single save usually raises several events.
    if let Ok(mut last) = last.lock() {
        if last.as_deref() == Some(content.as_slice()) {
            return;
        }
        *last = Some(content);
    }

    tracing::info!(path = %path.display(), "Config file changed, reloading");
    match load_config(path) {
        Ok(config) => {
            if updates.send(config).is_err() {
                tracing::debug!("Config update dropped; server no longer running");
            }
        }
        Err(e) => tracing::error!(
            path = %path.display(),
            error = %e,
            "Failed to reload config; keeping current configuration"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn only_writes_to_the_config_file_matter() {
        let path = Path::new("/etc/webhost/config.toml");
        assert!(concerns(&event(EventKind::Modify(ModifyKind::Any), path), path));
        assert!(concerns(&event(EventKind::Create(CreateKind::File), path), path));
        assert!(!concerns(&event(EventKind::Remove(RemoveKind::File), path), path));
        assert!(!concerns(
            &event(EventKind::Modify(ModifyKind::Any), Path::new("/etc/webhost/other.toml")),
            path
        ));
    }

    #[test]
    fn valid_changes_are_forwarded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 8080").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let last = Mutex::new(std::fs::read(&path).ok());

        reload(&path, &last, &tx);
        assert!(rx.try_recv().is_err());

        std::fs::write(&path, "port = 9090").unwrap();
        reload(&path, &last, &tx);
        reload(&path, &last, &tx);
        assert_eq!(rx.try_recv().unwrap().port, 9090);
        assert!(rx.try_recv().is_err());

        std::fs::write(&path, "port = \"nope\"").unwrap();
        reload(&path, &last, &tx);
        assert!(rx.try_recv().is_err());
    }
}
