//! Best-effort draft version reconciliation.
//!
//! After a draft-save the editor expects the article's `last_updated_at` to
//! be confirmed through the v3 `version_verification` endpoint. The v1
//! responses do not reliably say which note ref (`nf...` / `n...`) that
//! endpoint wants, so refs are gathered by scanning every JSON string the
//! platform returns. Nothing here can fail a run: every miss is an info
//! event.

use indexmap::IndexSet;
use lazy_static::lazy_static;
use note_client::{value_to_string, NoteApi, Session};
use regex::Regex;
use serde_json::Value;

use crate::events::{EventLog, Step};
use crate::orchestrator::ArticleHandle;

lazy_static! {
    static ref NF_REF: Regex = Regex::new(r"^nf[0-9a-z]+$").unwrap();
    static ref N_REF: Regex = Regex::new(r"^n[0-9a-z]+$").unwrap();
    static ref NOTES_PATH_REF: Regex = Regex::new(r"/notes/(nf[0-9a-z]+)").unwrap();
    static ref N_PATH_REF: Regex = Regex::new(r"/n/(n[0-9a-z]+)").unwrap();
}

/// Outcome of [`reconcile_version`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Candidate refs in the order they were tried
    pub refs: Vec<String>,
    /// Ref whose version verification answered 200
    pub verified_ref: Option<String>,
    pub last_updated_at: Option<String>,
}

/// Collect note refs from every string in `value`, `nf` refs first.
pub fn extract_note_refs(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    walk_strings(value, &mut |s| {
        let s = s.trim();
        if NF_REF.is_match(s) || N_REF.is_match(s) {
            found.push(s.to_string());
        } else {
            found.extend(NOTES_PATH_REF.captures_iter(s).map(|c| c[1].to_string()));
            found.extend(N_PATH_REF.captures_iter(s).map(|c| c[1].to_string()));
        }
    });

    let found = dedupe(found);
    let (mut nf, n): (Vec<String>, Vec<String>) =
        found.into_iter().partition(|r| r.starts_with("nf"));
    nf.extend(n);
    nf
}

fn walk_strings(value: &Value, visit: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => visit(s),
        Value::Array(items) => items.iter().for_each(|v| walk_strings(v, visit)),
        Value::Object(map) => map.values().for_each(|v| walk_strings(v, visit)),
        _ => {}
    }
}

/// Fill missing version metadata on `handle` and verify it with the platform.
pub async fn reconcile_version<A>(
    api: &A,
    session: &Session,
    handle: &mut ArticleHandle,
    events: &mut EventLog,
) -> Reconciliation
where
    A: NoteApi + ?Sized,
{
    let mut discovered = Vec::new();

    if handle.last_updated_at.is_none() || handle.note_ref.is_none() {
        match api.get_text_note(session, &handle.id).await {
            Ok(resp) if resp.status == 200 => {
                let body = resp.parsed().unwrap_or(Value::Null);
                absorb_text_note(handle, body.get("data").unwrap_or(&Value::Null));
                discovered = extract_note_refs(&body);
                events.info(
                    Step::Reconcile,
                    format!(
                        "metadata: note_ref={:?} note_key={:?} last_updated_at={:?}",
                        handle.note_ref, handle.note_key, handle.last_updated_at
                    ),
                );
            }
            Ok(resp) => events.info(
                Step::Reconcile,
                format!("metadata lookup answered {}", resp.status),
            ),
            Err(e) => events.info(Step::Reconcile, format!("metadata lookup failed: {}", e)),
        }
    }

    let mut refs: Vec<String> = discovered;
    refs.extend(handle.note_ref.clone());
    refs.extend(handle.note_key.clone());
    refs.push(handle.key.clone());
    let mut refs = dedupe(refs.into_iter().filter(|r| !r.is_empty()).collect());

    if handle.last_updated_at.is_none() {
        find_timestamp(api, session, handle, &mut refs, events).await;
    }

    if handle.last_updated_at.is_none() {
        if let Some(created_at) = handle.created_at.clone() {
            events.info(
                Step::Reconcile,
                format!("using created_at {} as last_updated_at", created_at),
            );
            handle.last_updated_at = Some(created_at);
        }
    }

    let mut result = Reconciliation {
        refs: refs.clone(),
        verified_ref: None,
        last_updated_at: handle.last_updated_at.clone(),
    };

    let timestamp = match handle.last_updated_at.clone() {
        Some(ts) if !refs.is_empty() => ts,
        _ => {
            events.info(
                Step::Reconcile,
                format!(
                    "version verification skipped: refs={:?} last_updated_at={:?}",
                    refs, handle.last_updated_at
                ),
            );
            return result;
        }
    };

    for note_ref in &refs {
        match api.verify_draft_version(session, note_ref, &timestamp).await {
            Ok(resp) if resp.status == 200 => {
                let resolved = resp
                    .data()
                    .and_then(|d| d.get("last_updated_at").and_then(value_to_string))
                    .unwrap_or_else(|| timestamp.clone());
                events.info(Step::Reconcile, format!("version verified for {}", note_ref));
                handle.last_updated_at = Some(resolved.clone());
                result.verified_ref = Some(note_ref.clone());
                result.last_updated_at = Some(resolved);
                return result;
            }
            Ok(resp) => events.info(
                Step::Reconcile,
                format!("version verification for {} answered {}", note_ref, resp.status),
            ),
            Err(e) => events.info(
                Step::Reconcile,
                format!("version verification for {} failed: {}", note_ref, e),
            ),
        }
    }

    events.info(
        Step::Reconcile,
        "no ref passed version verification, keeping current timestamp",
    );
    result
}

/// Look up `last_updated_at` through the v3 note endpoints, growing `refs`
/// with any refs the responses mention.
async fn find_timestamp<A>(
    api: &A,
    session: &Session,
    handle: &mut ArticleHandle,
    refs: &mut Vec<String>,
    events: &mut EventLog,
) where
    A: NoteApi + ?Sized,
{
    let mut i = 0;
    while i < refs.len() {
        let note_ref = refs[i].clone();
        for latest_draft in [true, false] {
            let resp = match api.get_note(session, &note_ref, latest_draft).await {
                Ok(resp) if resp.status == 200 => resp,
                _ => continue,
            };
            let body = resp.parsed().unwrap_or(Value::Null);
            for found in extract_note_refs(&body) {
                if !refs.contains(&found) {
                    refs.push(found);
                }
            }

            let data = body.get("data").unwrap_or(&Value::Null);
            let candidate = string_field(data, "last_updated_at")
                .or_else(|| {
                    data.get("latest_draft")
                        .and_then(|d| string_field(d, "last_updated_at"))
                })
                .or_else(|| string_field(data, "updated_at"));

            if let Some(ts) = candidate {
                events.info(
                    Step::Reconcile,
                    format!("last_updated_at from {}: {}", note_ref, ts),
                );
                handle.last_updated_at = Some(ts);
                return;
            }
        }
        i += 1;
    }
}

fn absorb_text_note(handle: &mut ArticleHandle, data: &Value) {
    let note = data.get("note").filter(|n| n.is_object());

    if handle.note_ref.is_none() {
        handle.note_ref = note
            .and_then(|n| string_field(n, "id"))
            .or_else(|| string_field(data, "note_id"));
    }
    if handle.note_key.is_none() {
        handle.note_key = note
            .and_then(|n| string_field(n, "key"))
            .or_else(|| string_field(data, "note_key"));
    }
    if handle.last_updated_at.is_none() {
        handle.last_updated_at = string_field(data, "last_updated_at")
            .or_else(|| string_field(data, "updated_at"))
            .or_else(|| note.and_then(|n| string_field(n, "last_updated_at")));
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(value_to_string)
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    items.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}
