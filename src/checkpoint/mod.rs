//! Checkpointed state
//!
//! [`Checkpoint`] owns a serializable aggregate together with the file it is saved
//! to. The aggregate can only be changed through [`Checkpoint::transaction`], which
//! writes the whole aggregate back to disk before returning. A crash therefore loses
//! at most the step that was in flight.
//!
//! # Transaction semantics
//!
//! - The closure returns `Ok`: the new state is stored, then the value is returned.
//! - The closure returns `Err`: the in-memory state is restored to what it was before
//!   the closure ran, and nothing is written.
//! - Storing fails: the in-memory state is restored as well, so memory never runs
//!   ahead of disk.

mod snapshot;

pub use snapshot::{read_snapshot, write_snapshot, Snapshot, FORMAT_VERSION};

use crate::{CheckpointError, CheckpointResult};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A restart-safe aggregate bound to its snapshot file
#[derive(Debug)]
pub struct Checkpoint<S> {
    path: PathBuf,
    stage: String,
    fingerprint: String,
    state: S,
}

impl<S> Checkpoint<S>
where
    S: Serialize + DeserializeOwned + Clone + Default,
{
    /// Loads the snapshot at `path`, or starts from an empty state if there is none
    ///
    /// `fingerprint` identifies the taxonomy the caller is about to crawl. A snapshot
    /// saved under another fingerprint is still used: units are matched by identity, so
    /// unchanged units resume and new ones start fresh.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read, parsed, or belongs to another
    /// stage.
    pub fn load(path: impl AsRef<Path>, stage: &str, fingerprint: &str) -> CheckpointResult<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match read_snapshot::<S>(&path)? {
            Some(snapshot) => {
                if snapshot.stage != stage {
                    return Err(CheckpointError::Incompatible {
                        path: path.display().to_string(),
                        reason: format!(
                            "saved by stage '{}', expected '{}'",
                            snapshot.stage, stage
                        ),
                    });
                }
                if snapshot.taxonomy_fingerprint != fingerprint {
                    tracing::warn!(
                        "Snapshot {} was taken with a different taxonomy; matching units will resume",
                        path.display()
                    );
                }
                tracing::info!(
                    "Resuming {} stage from snapshot saved at {}",
                    stage,
                    snapshot.saved_at
                );
                snapshot.state
            }
            None => {
                tracing::info!("No snapshot at {}, starting fresh", path.display());
                S::default()
            }
        };

        Ok(Self {
            path,
            stage: stage.to_string(),
            fingerprint: fingerprint.to_string(),
            state,
        })
    }

    /// Starts from an empty state, ignoring any existing snapshot
    ///
    /// The old snapshot is overwritten by the first transaction.
    pub fn fresh(path: impl AsRef<Path>, stage: &str, fingerprint: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stage: stage.to_string(),
            fingerprint: fingerprint.to_string(),
            state: S::default(),
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Writes the entire current state over the snapshot file
    pub fn store(&self) -> CheckpointResult<()> {
        let snapshot = Snapshot {
            format: FORMAT_VERSION,
            stage: self.stage.clone(),
            taxonomy_fingerprint: self.fingerprint.clone(),
            saved_at: Utc::now(),
            state: &self.state,
        };
        write_snapshot(&self.path, &snapshot)?;
        tracing::trace!("Stored {} snapshot at {}", self.stage, self.path.display());
        Ok(())
    }

    /// Runs one mutating step and makes it durable
    ///
    /// # Arguments
    ///
    /// * `step` - Mutation of the state; it may fail without leaving a trace
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The step's value, once the new state is on disk
    /// * `Err(E)` - The step's own error, or the storing error converted into `E`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use catalog_trawler::checkpoint::Checkpoint;
    /// use catalog_trawler::CheckpointError;
    /// use std::collections::BTreeMap;
    ///
    /// let mut checkpoint: Checkpoint<BTreeMap<String, u32>> =
    ///     Checkpoint::load("cache/counts.json", "counts", "none").unwrap();
    ///
    /// let total = checkpoint
    ///     .transaction(|counts| {
    ///         *counts.entry("north".to_string()).or_default() += 1;
    ///         Ok::<_, CheckpointError>(counts.values().sum::<u32>())
    ///     })
    ///     .unwrap();
    /// println!("{} steps so far", total);
    /// ```
    pub fn transaction<T, E, F>(&mut self, step: F) -> Result<T, E>
    where
        F: FnOnce(&mut S) -> Result<T, E>,
        E: From<CheckpointError>,
    {
        let before = self.state.clone();

        match step(&mut self.state) {
            Ok(value) => {
                if let Err(e) = self.store() {
                    self.state = before;
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                self.state = before;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    type Counts = BTreeMap<String, u32>;

    #[derive(Debug)]
    enum StepError {
        Checkpoint(CheckpointError),
        Refused,
    }

    impl From<CheckpointError> for StepError {
        fn from(e: CheckpointError) -> Self {
            Self::Checkpoint(e)
        }
    }

    fn bump(counts: &mut Counts, key: &str) {
        *counts.entry(key.to_string()).or_default() += 1;
    }

    #[test]
    fn test_load_without_snapshot_is_empty() {
        let dir = TempDir::new().unwrap();
        let checkpoint: Checkpoint<Counts> =
            Checkpoint::load(dir.path().join("listing.json"), "listing", "fp").unwrap();
        assert!(checkpoint.state().is_empty());
        assert!(!checkpoint.path().exists());
    }

    #[test]
    fn test_successful_transaction_is_durable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("listing.json");

        let mut checkpoint: Checkpoint<Counts> = Checkpoint::load(&path, "listing", "fp").unwrap();
        let value = checkpoint
            .transaction(|counts| -> Result<u32, StepError> {
                bump(counts, "north");
                bump(counts, "north");
                Ok(counts["north"])
            })
            .unwrap();
        assert_eq!(value, 2);
        drop(checkpoint);

        let reloaded: Checkpoint<Counts> = Checkpoint::load(&path, "listing", "fp").unwrap();
        assert_eq!(reloaded.state()["north"], 2);
    }

    #[test]
    fn test_failed_transaction_rolls_back_and_is_not_stored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("listing.json");

        let mut checkpoint: Checkpoint<Counts> = Checkpoint::load(&path, "listing", "fp").unwrap();
        checkpoint
            .transaction(|counts| -> Result<(), StepError> {
                bump(counts, "north");
                Ok(())
            })
            .unwrap();
        let stored = std::fs::read_to_string(&path).unwrap();

        let result = checkpoint.transaction(|counts| -> Result<(), StepError> {
            bump(counts, "north");
            bump(counts, "south");
            Err(StepError::Refused)
        });

        assert!(matches!(result, Err(StepError::Refused)));
        assert_eq!(checkpoint.state()["north"], 1);
        assert!(!checkpoint.state().contains_key("south"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), stored);
    }

    #[test]
    fn test_store_failure_rolls_back() {
        let dir = TempDir::new().unwrap();
        // A regular file where the snapshot directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut checkpoint: Checkpoint<Counts> =
            Checkpoint::fresh(blocker.join("listing.json"), "listing", "fp");
        let result = checkpoint.transaction(|counts| -> Result<(), StepError> {
            bump(counts, "north");
            Ok(())
        });

        assert!(matches!(result, Err(StepError::Checkpoint(_))));
        assert!(checkpoint.state().is_empty());
    }

    #[test]
    fn test_stage_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("details.json");

        let checkpoint: Checkpoint<Counts> = Checkpoint::fresh(&path, "listing", "fp");
        checkpoint.store().unwrap();

        let result: CheckpointResult<Checkpoint<Counts>> = Checkpoint::load(&path, "detail", "fp");
        assert!(matches!(result, Err(CheckpointError::Incompatible { .. })));
    }

    #[test]
    fn test_fingerprint_mismatch_still_resumes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("listing.json");

        let mut checkpoint: Checkpoint<Counts> = Checkpoint::fresh(&path, "listing", "old");
        checkpoint
            .transaction(|counts| -> Result<(), StepError> {
                bump(counts, "north");
                Ok(())
            })
            .unwrap();

        let reloaded: Checkpoint<Counts> = Checkpoint::load(&path, "listing", "new").unwrap();
        assert_eq!(reloaded.state()["north"], 1);
    }

    #[test]
    fn test_fresh_ignores_existing_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("listing.json");

        let mut checkpoint: Checkpoint<Counts> = Checkpoint::fresh(&path, "listing", "fp");
        checkpoint
            .transaction(|counts| -> Result<(), StepError> {
                bump(counts, "north");
                Ok(())
            })
            .unwrap();

        let fresh: Checkpoint<Counts> = Checkpoint::fresh(&path, "listing", "fp");
        assert!(fresh.state().is_empty());
    }
}
