pub mod models;
pub mod server;

use std::io::Write;

pub use models::{
    select_model_name, short_name, ModelConfigRecord, ModelLibrary, ModelManager, SelectionMode,
    ServerStatus,
};
pub use server::{
    ChatMessage, ConnectError, ConnectSettings, LmStudioClient, ModelServer, RequestParameters,
    Result,
};

/// Return the platform-standard data directory for lmstudio-connect.
///
/// - macOS: `~/Library/Application Support/lmstudio-connect/`
/// - Windows: `{FOLDERID_RoamingAppData}\lmstudio-connect\`
/// - Linux: `$XDG_DATA_HOME/lmstudio-connect/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.lmstudio-connect/` only if none of the above can be resolved.
pub fn data_dir() -> std::path::PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("lmstudio-connect");
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".lmstudio-connect")
}

/// Install a tracing subscriber writing to `<data_dir>/lmstudio-connect.log`.
///
/// Rotates the previous logs (keeps the last 3) and opens a fresh file behind
/// a line-flushing writer. `RUST_LOG` overrides the default filter. Meant for
/// binaries and demos; library code never calls it.
pub fn init_tracing() -> std::io::Result<std::path::PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join(LOG_FILE_NAME);
    let rotation_failures = rotate_log_file(&log_path, LOGS_KEPT);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lmstudio_connect=info,warn"));

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(LineFlushedLog::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| std::io::Error::other(format!("tracing already initialized: {e}")))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== lmstudio-connect starting ==="
    );
    // Rotation ran before the subscriber existed; report what it could not move.
    for failure in &rotation_failures {
        tracing::warn!(error = %failure, "log rotation incomplete");
    }
    Ok(log_path)
}

const LOG_FILE_NAME: &str = "lmstudio-connect.log";
const LOGS_KEPT: u32 = 3;

/// `x.log` → `x.log.{n}`.
fn numbered_log(base: &std::path::Path, n: u32) -> std::path::PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{n}"));
    std::path::PathBuf::from(name)
}

/// Shift `x.log` to `x.log.1`, `.1` to `.2` and so on, dropping `.{keep}`.
///
/// Returns a description of every step that failed for a reason other than
/// the file not existing.
fn rotate_log_file(base: &std::path::Path, keep: u32) -> Vec<String> {
    let mut failures = Vec::new();
    let mut note = |what: String, result: std::io::Result<()>| match result {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => failures.push(format!("{what}: {e}")),
        _ => {}
    };

    let oldest = numbered_log(base, keep);
    note(
        format!("remove {}", oldest.display()),
        std::fs::remove_file(&oldest),
    );

    for n in (0..keep).rev() {
        let from = if n == 0 {
            base.to_path_buf()
        } else {
            numbered_log(base, n)
        };
        let to = numbered_log(base, n + 1);
        note(
            format!("rename {} to {}", from.display(), to.display()),
            std::fs::rename(&from, &to),
        );
    }
    failures
}

/// Shared log file handle that flushes after every write, so each line is
/// on disk before the next request starts.
#[derive(Clone)]
struct LineFlushedLog {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl LineFlushedLog {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }

    fn with_file<T>(
        &self,
        f: impl FnOnce(&mut std::fs::File) -> std::io::Result<T>,
    ) -> std::io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("log file lock poisoned: {e}")))?;
        f(&mut file)
    }
}

impl std::io::Write for LineFlushedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.with_file(|file| {
            let n = file.write(buf)?;
            file.flush()?;
            Ok(n)
        })
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LineFlushedLog {
    type Writer = LineFlushedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
