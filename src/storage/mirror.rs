use std::path::PathBuf;
use tracing::debug;

/// Best-effort copy of persisted documents into a directory watched by a
/// companion process. Never blocks the caller and never reports failure.
#[derive(Debug, Clone, Default)]
pub struct CompanionMirror {
    dir: Option<PathBuf>,
}

impl CompanionMirror {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn mirror(&self, file_name: &str, contents: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        let target = dir.join(file_name);
        let contents = contents.to_string();

        let write = move || {
            if let Err(e) = super::write_atomic(&target, &contents) {
                debug!(path = %target.display(), error = %e, "companion mirror write failed");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}
