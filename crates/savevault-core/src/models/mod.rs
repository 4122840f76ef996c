pub mod event;
pub mod game;
pub mod location;
pub mod snapshot;

use uuid::Uuid;

/// Allocate a fresh opaque row id.
///
/// Ids are stored and compared as strings throughout the system; rows
/// recovered from disk may carry ids that did not originate here.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
