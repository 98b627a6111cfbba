//! The note and its reconciliation operations.
//!
//! The scheme is per-endpoint causal history in the FeedSync lineage. Each
//! update an endpoint makes is recorded as one history entry carrying a
//! strictly increasing per-endpoint sequence number. Whether one copy of a
//! note carries strictly more information than another is decided entirely
//! endpoint-by-endpoint on those sequence numbers (subsumption); copies
//! that cannot be ordered are retained side by side as conflicts.
//!
//! Wire layout uses the single-letter field names shared with the module
//! and the hub: `b` body, `p` payload, `c` change counter, `h` histories,
//! `x` conflicts, `u` updates, `d` deleted, `s` sent, `k` bulk; history
//! entries use `w` when, `l` where, `e` endpoint, `s` sequence.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::base64_payload;
use crate::clock;
use crate::NoteError;

/// One endpoint's authorship record for one logical update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    /// When the update was made, seconds since epoch. Zero means unknown
    /// and orders before any known time.
    #[serde(rename = "w", default, skip_serializing_if = "is_zero_i64")]
    pub when: i64,

    /// Opaque location token. Empty on the host side; never interpreted by
    /// reconciliation.
    #[serde(rename = "l", default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    /// The endpoint that authored the update.
    #[serde(rename = "e", default, skip_serializing_if = "String::is_empty")]
    pub endpoint_id: String,

    /// Per-endpoint strictly increasing sequence within the note's lineage.
    #[serde(rename = "s", default, skip_serializing_if = "is_zero_i32")]
    pub sequence: i32,
}

impl History {
    /// True if this entry carries at least the information of `other`:
    /// same endpoint, at-least-as-large sequence.
    fn subsumes(&self, other: &History) -> bool {
        self.endpoint_id == other.endpoint_id && self.sequence >= other.sequence
    }
}

/// A single replicated record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Free-form structured body, or absent.
    #[serde(rename = "b", skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Opaque binary payload, base64 on the wire, or absent.
    #[serde(
        rename = "p",
        default,
        with = "base64_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Vec<u8>>,

    /// Container-assigned change counter; not used by reconciliation.
    #[serde(rename = "c", default, skip_serializing_if = "is_zero_i64")]
    pub change: i64,

    /// Per-endpoint history, newest first. At most one entry per endpoint
    /// after reconciliation.
    #[serde(rename = "h", default, skip_serializing_if = "Vec::is_empty")]
    pub histories: Vec<History>,

    /// Sibling copies retained when concurrent updates could not be
    /// ordered.
    #[serde(rename = "x", default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Note>,

    /// Count of local mutations, excluding the initial create.
    #[serde(rename = "u", default, skip_serializing_if = "is_zero_i32")]
    pub updates: i32,

    /// Tombstone flag. A deleted note still carries history.
    #[serde(rename = "d", default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    /// Advisory: the note has been sent. Not used by reconciliation.
    #[serde(rename = "s", default, skip_serializing_if = "is_false")]
    pub sent: bool,

    /// Advisory: the note was added in bulk. Not used by reconciliation.
    #[serde(rename = "k", default, skip_serializing_if = "is_false")]
    pub bulk: bool,
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Note {
    /// A freshly created note: no body, no payload, no history.
    pub fn new() -> Self {
        Note::default()
    }

    /// A fresh note with the given body.
    pub fn with_body(body: Value) -> Self {
        Note {
            body: Some(body),
            ..Default::default()
        }
    }

    /// Set the body from JSON text. On malformed input the body is left
    /// null and a descriptive error is returned.
    pub fn set_body_json(&mut self, json: &[u8]) -> Result<(), NoteError> {
        match serde_json::from_slice::<Value>(json) {
            Ok(value) => {
                self.body = Some(value);
                Ok(())
            }
            Err(e) => {
                self.body = None;
                Err(NoteError::BodyNotJson(e.to_string()))
            }
        }
    }

    /// The endpoint that authored the newest update, or the empty string
    /// for a note with no history.
    pub fn endpoint_id(&self) -> &str {
        self.histories
            .first()
            .map(|h| h.endpoint_id.as_str())
            .unwrap_or("")
    }

    /// Record a local mutation by `endpoint_id`.
    ///
    /// Prepends a fresh history entry with the next per-endpoint sequence,
    /// replaces any older entry for the same endpoint, and folds pending
    /// conflicts into the history: all of them when `resolve_conflicts` is
    /// set, otherwise only siblings this endpoint itself authored.
    pub fn update(&mut self, endpoint_id: &str, resolve_conflicts: bool, deleted: bool) {
        self.apply_update(
            endpoint_id,
            resolve_conflicts,
            deleted,
            clock::next_timestamp(),
            String::new(),
        );
    }

    fn apply_update(
        &mut self,
        endpoint_id: &str,
        resolve_conflicts: bool,
        deleted: bool,
        when: i64,
        location: String,
    ) {
        let updates = self.updates + 1;
        let mut sequence = updates;
        for h in &self.histories {
            if h.endpoint_id == endpoint_id && h.sequence >= sequence {
                sequence = h.sequence + 1;
            }
        }

        // Sparse history: this endpoint's older authorship is replaced by
        // the fresh entry.
        self.histories.retain(|h| h.endpoint_id != endpoint_id);
        self.histories.insert(
            0,
            History {
                when,
                location,
                endpoint_id: endpoint_id.to_string(),
                sequence,
            },
        );
        self.deleted = deleted;
        self.updates = updates;

        if !self.conflicts.is_empty() {
            let siblings = std::mem::take(&mut self.conflicts);
            let mut kept = Vec::new();
            for sibling in siblings {
                // Implicit mode folds only siblings this endpoint authored;
                // explicit resolution folds them all.
                if !resolve_conflicts && sibling.endpoint_id() != endpoint_id {
                    kept.push(sibling);
                    continue;
                }
                for entry in sibling.histories {
                    let covered = self.histories.iter().any(|cur| cur.subsumes(&entry));
                    if covered {
                        continue;
                    }
                    if entry.endpoint_id == endpoint_id {
                        // The fresh entry must remain this endpoint's
                        // newest.
                        let top = &mut self.histories[0];
                        if top.sequence <= entry.sequence {
                            top.sequence = entry.sequence + 1;
                        }
                        continue;
                    }
                    // News from another endpoint: purge what it subsumes
                    // and slot it just below the fresh entry.
                    self.histories.retain(|cur| !entry.subsumes(cur));
                    let at = 1.min(self.histories.len());
                    self.histories.insert(at, entry);
                }
            }
            self.conflicts = kept;
        }

        if resolve_conflicts {
            self.conflicts.clear();
        }
    }

    /// Order this copy against an incoming copy.
    ///
    /// Returns `(conflict_data_differs, ordering)` where `Less` means this
    /// copy is older. The ordering is decided by update count, then by the
    /// top history entries (zero `when` is oldest, endpoint id breaks
    /// ties); equal-ordered copies additionally compare their conflict
    /// lists as sets, reporting any mismatch in the flag.
    pub fn compare(&self, incoming: &Note) -> (bool, Ordering) {
        if incoming.updates > self.updates {
            return (false, Ordering::Less);
        }
        if self.updates > incoming.updates {
            return (false, Ordering::Greater);
        }

        let ord = history_order(self.histories.first(), incoming.histories.first());
        if ord != Ordering::Equal {
            return (false, ord);
        }

        if self.conflicts.len() != incoming.conflicts.len() {
            return (true, Ordering::Equal);
        }
        let mut used = vec![false; incoming.conflicts.len()];
        'local: for ours in &self.conflicts {
            for (i, theirs) in incoming.conflicts.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let (differs, ord) = ours.compare(theirs);
                if ord == Ordering::Equal && !differs {
                    used[i] = true;
                    continue 'local;
                }
            }
            return (true, Ordering::Equal);
        }
        (false, Ordering::Equal)
    }

    /// True iff every history entry of this note and of its conflicts is
    /// covered by some entry of `incoming` or its conflicts: the remote
    /// copy carries at least all the information of this one.
    pub fn is_subsumed_by(&self, incoming: &Note) -> bool {
        let mut ours = Vec::new();
        collect_histories(self, &mut ours);
        let mut theirs = Vec::new();
        collect_histories(incoming, &mut theirs);

        ours.iter()
            .all(|h| theirs.iter().any(|r| r.subsumes(h)))
    }

    /// Reconcile two copies of a note into one.
    ///
    /// Both sides are flattened into their sets of siblings, anything
    /// subsumed by a surviving sibling on the other side is dropped, and
    /// the newest survivor (compare order) wins; the rest become its
    /// conflict list. Commutative up to conflict-list ordering.
    pub fn merge(local: Note, incoming: Note) -> Note {
        let mut pool = Vec::new();
        flatten(local, &mut pool);
        let split = pool.len();
        flatten(incoming, &mut pool);

        let mut dropped = vec![false; pool.len()];
        for i in 0..split {
            for j in split..pool.len() {
                if !dropped[j] && pool[i].is_subsumed_by(&pool[j]) {
                    dropped[i] = true;
                    break;
                }
            }
        }
        for j in split..pool.len() {
            for i in 0..split {
                if !dropped[i] && pool[j].is_subsumed_by(&pool[i]) {
                    dropped[j] = true;
                    break;
                }
            }
        }

        let mut survivors: Vec<Note> = pool
            .into_iter()
            .zip(dropped)
            .filter(|(_, gone)| !gone)
            .map(|(note, _)| note)
            .collect();

        // Newest first; the head becomes the merged note.
        survivors.sort_by(|a, b| {
            let (_, ord) = a.compare(b);
            ord.reverse()
        });
        let mut winner = survivors.remove(0);
        winner.conflicts = survivors;
        winner
    }
}

/// Order two top history entries: absent is oldest, then zero `when`, then
/// numeric `when`, then lexicographic endpoint id.
fn history_order(a: Option<&History>, b: Option<&History>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.when == 0, b.when == 0) {
            (true, true) => a.endpoint_id.cmp(&b.endpoint_id),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => a
                .when
                .cmp(&b.when)
                .then_with(|| a.endpoint_id.cmp(&b.endpoint_id)),
        },
    }
}

/// Every history entry reachable from `note`, conflicts included.
fn collect_histories<'a>(note: &'a Note, out: &mut Vec<&'a History>) {
    out.extend(note.histories.iter());
    for sibling in &note.conflicts {
        collect_histories(sibling, out);
    }
}

/// Split a note into its flat set of siblings: the note itself (conflict
/// list detached) followed by each conflict.
fn flatten(mut note: Note, out: &mut Vec<Note>) {
    let conflicts = std::mem::take(&mut note.conflicts);
    out.push(note);
    for sibling in conflicts {
        flatten(sibling, out);
    }
}
