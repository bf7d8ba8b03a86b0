//! Guest session marker.
//!
//! A guest identity is generated once and remembered for the session so a
//! restart resolves back to the same local watchlist.

use crate::error::SessionResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tradedesk_core::IdentityId;

const MARKER_FILE: &str = "guest.json";
const GUEST_FLAG: &str = "guest";

#[derive(Debug, Serialize, Deserialize)]
struct MarkerRecord {
    authenticated: String,
    guest_id: IdentityId,
}

/// Where the guest marker lives.
pub trait GuestMarker: Send + Sync {
    /// Existing guest id, if a guest session was started.
    fn guest_id(&self) -> SessionResult<Option<IdentityId>>;

    /// Return the existing guest id or create one.
    fn start_guest(&self) -> SessionResult<IdentityId>;

    /// Forget the guest session.
    fn clear(&self) -> SessionResult<()>;
}

/// Marker kept in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryGuestMarker {
    id: RwLock<Option<IdentityId>>,
}

impl MemoryGuestMarker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GuestMarker for MemoryGuestMarker {
    fn guest_id(&self) -> SessionResult<Option<IdentityId>> {
        Ok(self.id.read().clone())
    }

    fn start_guest(&self) -> SessionResult<IdentityId> {
        let mut id = self.id.write();
        Ok(id.get_or_insert_with(IdentityId::generate_guest).clone())
    }

    fn clear(&self) -> SessionResult<()> {
        *self.id.write() = None;
        Ok(())
    }
}

/// Marker stored as `guest.json` in a session directory.
#[derive(Debug, Clone)]
pub struct FileGuestMarker {
    dir: PathBuf,
}

impl FileGuestMarker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(MARKER_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, id: &IdentityId) -> SessionResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let record = MarkerRecord {
            authenticated: GUEST_FLAG.to_string(),
            guest_id: id.clone(),
        };
        std::fs::write(self.path(), serde_json::to_vec_pretty(&record)?)?;
        Ok(())
    }
}

impl GuestMarker for FileGuestMarker {
    fn guest_id(&self) -> SessionResult<Option<IdentityId>> {
        let bytes = match std::fs::read(self.path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: MarkerRecord = serde_json::from_slice(&bytes)?;
        if record.authenticated != GUEST_FLAG {
            debug!(path = %self.path().display(), "Marker is not a guest session");
            return Ok(None);
        }
        Ok(Some(record.guest_id))
    }

    fn start_guest(&self) -> SessionResult<IdentityId> {
        if let Some(id) = self.guest_id()? {
            return Ok(id);
        }
        let id = IdentityId::generate_guest();
        self.write(&id)?;
        info!(guest_id = %id, "Started guest session");
        Ok(id)
    }

    fn clear(&self) -> SessionResult<()> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
