use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::model::{AnnotatedCitation, Revision, RevisionCitations};

/// The outcome of folding one page's revisions: the deduplicated citation
/// list and the subset of revisions referenced by its annotations.
#[derive(Debug, Default)]
pub(crate) struct PageDiff {
    pub citations: Vec<AnnotatedCitation>,
    pub revisions: BTreeMap<u64, Revision>,
}

/// Fold a page's per-revision citations into annotated citations.
///
/// Revisions are visited oldest first, ordered by timestamp; equal
/// timestamps keep their document order. Each citation is attributed to the
/// revision that introduced it, and to the revision in which it disappeared
/// if it did. A citation that is removed and later re-added reads as present
/// since its original introduction; the gap is not recorded.
///
/// `revisions` in the result contains exactly the revisions named by some
/// annotation. A revision that only ever marked a removal which was later
/// rescinded is released again, so no orphans are retained.
pub(crate) fn diff_revisions(citations_by_revision: Vec<RevisionCitations>) -> PageDiff {
    let mut ordered: Vec<_> = citations_by_revision
        .into_iter()
        .filter_map(|rc| rc.revision.map(|revision| (revision, rc.citations)))
        .collect();
    // stable, so ties keep document order
    ordered.sort_by_key(|(revision, _)| (revision.timestamp.seconds, revision.timestamp.nanos));

    let mut discovered: BTreeMap<String, AnnotatedCitation> = BTreeMap::new();
    let mut to_store: BTreeMap<u64, Revision> = BTreeMap::new();
    let mut ref_count: FxHashMap<u64, i32> = FxHashMap::default();

    for (revision, mut citations) in ordered {
        let rid = revision.revision_id;

        // first pass: reconcile citations we have already discovered
        for (fingerprint, annotated) in discovered.iter_mut() {
            if citations.remove(fingerprint).is_some() {
                // still present; rescind a removal recorded earlier
                if let Some(removed_in) = annotated.revision_removed.take() {
                    if let Some(count) = ref_count.get_mut(&removed_in) {
                        *count -= 1;
                        if *count <= 0 {
                            ref_count.remove(&removed_in);
                            to_store.remove(&removed_in);
                        }
                    }
                }
            } else if annotated.revision_removed.is_none() {
                annotated.revision_removed = Some(rid);
                to_store.insert(rid, revision.clone());
                *ref_count.entry(rid).or_insert(0) += 1;
            }
        }

        // second pass: citations first appearing in this revision
        for (fingerprint, citation) in citations {
            if discovered.contains_key(&fingerprint) {
                continue;
            }
            discovered.insert(
                fingerprint,
                AnnotatedCitation {
                    citation,
                    revision_added: rid,
                    revision_removed: None,
                },
            );
            to_store.insert(rid, revision.clone());
            *ref_count.entry(rid).or_insert(0) += 1;
        }
    }

    PageDiff {
        citations: discovered.into_values().collect(),
        revisions: to_store,
    }
}
