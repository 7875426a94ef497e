//! Store handle for Lorekeeper's data workspace.

use std::path::PathBuf;

/// Handle for the data workspace holding the content and identity databases.
///
/// All service state (posts, sequence counters, user identities) is scoped
/// to a store rooted at `<project>/.lorekeeper/data/`. Services receive a
/// `Store` from the composition root at construction time; nothing resolves
/// the data directory implicitly.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
}
