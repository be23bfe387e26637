// src/persistence.rs
//
// Route snapshot store. One JSON file holding the full route plus the
// block code (which only extraction can produce, so it must survive a
// reload). A snapshot that fails to parse is cleared on the way out so
// the next launch does not hit the same failure again.

use crate::errors::PersistenceError;
use crate::types::Route;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub route: Route,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_block_code: Option<String>,
}

pub struct RouteStore {
    path: PathBuf,
}

impl RouteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn save(&self, snapshot: &RouteSnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json)?;
        debug!(
            "saved route snapshot ({} stops) to {}",
            snapshot.route.stops.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the stored snapshot. A missing file is a normal first-launch
    /// condition, not an error.
    pub fn load(&self) -> Result<Option<RouteSnapshot>, PersistenceError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&contents) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(
                    "stored route snapshot is corrupt, clearing {}: {}",
                    self.path.display(),
                    e
                );
                if let Err(clear_err) = self.clear() {
                    warn!("could not clear corrupt snapshot: {}", clear_err);
                }
                Err(e.into())
            }
        }
    }

    pub fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
