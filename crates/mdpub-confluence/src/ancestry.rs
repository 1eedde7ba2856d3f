//! Parent page resolution and validation.

use mdpub_meta::PageType;
use tracing::{debug, info};

use crate::api::{ConfluenceApi, PageInfo};
use crate::error::PublishError;

/// Result of [`ensure_ancestry`].
#[derive(Clone, Debug, Default)]
pub struct Ancestry {
    /// Page the target belongs under: the deepest resolved ancestor, or the
    /// space home page when no ancestor exists yet. `None` only in dry-run
    /// when pages would have been created.
    pub parent: Option<PageInfo>,
    /// Titles created (or, in dry-run, that would be created), in order.
    pub created: Vec<String>,
}

/// Resolve the chain of parent titles, creating missing trailing pages.
///
/// Titles are looked up front to back; the first missing title and
/// everything after it is created under the last page found (or the space
/// home page), each new page under the previous one.
pub fn ensure_ancestry<A: ConfluenceApi + ?Sized>(
    api: &A,
    space: &str,
    parents: &[String],
    dry_run: bool,
) -> Result<Ancestry, PublishError> {
    let mut parent: Option<PageInfo> = None;
    let mut missing_from = parents.len();

    for (index, title) in parents.iter().enumerate() {
        match api.find_page(space, title, PageType::Page)? {
            Some(page) => {
                debug!(title, page_id = %page.id, "Ancestor exists");
                parent = Some(page);
            }
            None => {
                missing_from = index;
                break;
            }
        }
    }

    let rest = &parents[missing_from..];
    if rest.is_empty() && parent.is_some() {
        return Ok(Ancestry {
            parent,
            created: Vec::new(),
        });
    }

    let mut parent = match parent {
        Some(page) => page,
        None => api.find_home_page(space)?,
    };

    if dry_run {
        if !rest.is_empty() {
            info!(space, count = rest.len(), "Dry run: would create ancestor pages");
        }
        return Ok(Ancestry {
            parent: rest.is_empty().then_some(parent),
            created: rest.to_vec(),
        });
    }

    let mut created = Vec::with_capacity(rest.len());
    for title in rest {
        info!(space, title, parent = %parent.title, "Creating ancestor page");
        parent = api.create_page(space, PageType::Page, Some(&parent), title, "")?;
        created.push(title.clone());
    }

    Ok(Ancestry {
        parent: Some(parent),
        created,
    })
}

/// Look up the page at the end of `chain` and check that the rest of the
/// chain appears among its ancestors, in order.
///
/// Ancestors absent from `chain` (the space root, intermediate pages) are
/// allowed, so a chain with no parents accepts the page wherever it sits.
/// A page without ancestors is accepted only if it is the space home page.
/// Returns `None` when the page does not exist yet.
pub fn validate_ancestry<A: ConfluenceApi + ?Sized>(
    api: &A,
    space: &str,
    chain: &[String],
) -> Result<Option<PageInfo>, PublishError> {
    let Some(title) = chain.last() else {
        return Ok(None);
    };
    let Some(page) = api.find_page(space, title, PageType::Page)? else {
        return Ok(None);
    };

    if page.ancestors.is_empty() {
        let home = api.find_home_page(space)?;
        if home.id != page.id {
            return Err(PublishError::Orphan {
                title: page.title.clone(),
            });
        }
        debug!(title, "Page is the space home page");
        return Ok(Some(page));
    }

    let actual = page.ancestor_titles();
    let expected = match chain.split_last() {
        Some((last, init)) if *last == page.title => init,
        _ => chain,
    };

    let mut remaining = actual.iter();
    let matches = expected
        .iter()
        .all(|title| remaining.any(|ancestor| ancestor == title));
    if !matches {
        return Err(PublishError::AncestryMismatch {
            title: page.title.clone(),
            expected: chain.to_vec(),
            actual,
        });
    }
    Ok(Some(page))
}
