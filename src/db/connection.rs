use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum WorkerMessage {
    Run(Job),
    Stop,
}

/// Owns the worker thread; stopping it happens when the last handle drops.
struct Worker {
    jobs: mpsc::Sender<WorkerMessage>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };

        if self.jobs.send(WorkerMessage::Stop).is_err() {
            warn!("DB worker already gone at shutdown");
        }
        if let Err(panic) = handle.join() {
            error!("DB worker panicked: {panic:?}");
        }
    }
}

/// Open the file and bring it to the current schema. Readings reference
/// users, so a connection without foreign key enforcement is refused.
fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("WAL journal mode unavailable, using the default: {err}");
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    let enforced: bool = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
    if !enforced {
        bail!("this SQLite build does not enforce foreign keys");
    }

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn serve(mut conn: Connection, jobs: mpsc::Receiver<WorkerMessage>) {
    let mut handled = 0_u64;
    while let Ok(message) = jobs.recv() {
        match message {
            WorkerMessage::Run(job) => {
                job(&mut conn);
                handled += 1;
            }
            WorkerMessage::Stop => break,
        }
    }
    info!("Database thread shutting down after {handled} jobs");
}

/// Handle to the SQLite store holding users and CGM readings.
///
/// A single worker thread owns the `rusqlite::Connection`; every query is
/// shipped to it as a closure and the result comes back over a oneshot
/// channel, so the handle is cheap to clone and safe to share.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    db_path: Arc<PathBuf>,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and migrate it.
    /// Returns once the worker is ready or has failed to start.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        match db_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
            _ => {}
        }

        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let path = db_path.clone();

        let thread = thread::Builder::new()
            .name("cgm-db".into())
            .spawn(move || match open_connection(&path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, jobs_rx);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run `task` on the worker thread and await its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                debug!("DB caller went away before its result arrived");
            }
        });

        self.worker
            .jobs
            .send(WorkerMessage::Run(job))
            .map_err(|_| anyhow!("database worker is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database worker stopped before replying"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_opens_and_migrates_in_nested_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("users.db");
        let db = Database::new(path.clone()).unwrap();
        assert_eq!(db.path(), path.as_path());

        let foreign_keys: i64 = db
            .execute(|conn| {
                conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                    .map_err(Into::into)
            })
            .await
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[tokio::test]
    async fn test_task_errors_are_returned_to_caller() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("users.db")).unwrap();
        let result: Result<()> = db
            .execute(|conn| {
                conn.execute("INSERT INTO no_such_table VALUES (1)", [])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clones_share_one_worker() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("users.db")).unwrap();
        let other = db.clone();
        drop(db);

        let version: i32 = other
            .execute(|conn| {
                conn.pragma_query_value(None, "user_version", |row| row.get(0))
                    .map_err(Into::into)
            })
            .await
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_unopenable_path_fails_fast() {
        let dir = tempdir().unwrap();
        // a directory cannot be opened as a database file
        assert!(Database::new(dir.path().to_path_buf()).is_err());
    }
}
