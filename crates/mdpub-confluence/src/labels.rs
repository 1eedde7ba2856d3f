//! Label reconciliation.

use std::collections::HashSet;

use tracing::info;

use crate::api::ConfluenceApi;
use crate::error::ConfluenceError;

/// Labels to add and remove so the page carries exactly the local set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelChanges {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelChanges {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Compare labels case-insensitively. Local duplicates are added once.
pub fn diff_labels(local: &[String], remote: &[String]) -> LabelChanges {
    let remote_keys: HashSet<String> = remote.iter().map(|l| l.to_lowercase()).collect();
    let local_keys: HashSet<String> = local.iter().map(|l| l.to_lowercase()).collect();

    let mut seen = HashSet::new();
    let add = local
        .iter()
        .filter(|label| {
            let key = label.to_lowercase();
            !remote_keys.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect();
    let remove = remote
        .iter()
        .filter(|label| !local_keys.contains(&label.to_lowercase()))
        .cloned()
        .collect();

    LabelChanges { add, remove }
}

/// Bring the page's labels in line with `local`: adds in one request,
/// removals one request each.
pub fn reconcile_labels<A: ConfluenceApi + ?Sized>(
    api: &A,
    page_id: &str,
    local: &[String],
    dry_run: bool,
) -> Result<LabelChanges, ConfluenceError> {
    let remote = api.get_labels(page_id)?;
    let changes = diff_labels(local, &remote);
    if dry_run || changes.is_empty() {
        return Ok(changes);
    }

    if !changes.add.is_empty() {
        info!(page_id, labels = ?changes.add, "Adding labels");
        api.add_labels(page_id, &changes.add)?;
    }
    for label in &changes.remove {
        info!(page_id, label, "Removing label");
        api.remove_label(page_id, label)?;
    }
    Ok(changes)
}
