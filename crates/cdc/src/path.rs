//! Namespace → lakehouse path derivation (spec §4.10, §6).
//!
//! `https://a.b.c/p/q` maps to `.c/.b/.a/p/q`: hostname labels reversed,
//! each prefixed with `.`, followed by the original (non-reversed) path.

use graphdb_core::ids::Namespace;

/// The reversed-domain path prefix for a namespace, e.g.
/// `.c/.b/.a/p/q` for `https://a.b.c/p/q`.
pub fn reversed_path(namespace: &Namespace) -> String {
    let raw = namespace.as_str();
    let without_scheme = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);

    let (host, path) = match without_scheme.split_once('/') {
        Some((h, p)) => (h, p),
        None => (without_scheme, ""),
    };
    // Drop a port suffix if present; it plays no role in the path layout.
    let host = host.split(':').next().unwrap_or(host);

    let reversed_host: String = host
        .split('.')
        .filter(|label| !label.is_empty())
        .rev()
        .map(|label| format!(".{label}"))
        .collect::<Vec<_>>()
        .join("/");

    if path.is_empty() {
        reversed_host
    } else {
        format!("{reversed_host}/{path}")
    }
}

/// Key for a CDC WAL blob: `{reversed}/_wal/YYYY-MM-DD/NNNNNN-SSS.gcol`.
/// `date` is the UTC calendar date derived from the batch's maximum event
/// timestamp; `blob_seq` is a single monotonic counter split into the two
/// path components (`NNNNNN` = high part, `SSS` = low 3 digits).
pub fn cdc_blob_key(namespace: &Namespace, date: &str, blob_seq: u64) -> String {
    format!(
        "{}/_wal/{}/{:06}-{:03}.gcol",
        reversed_path(namespace),
        date,
        blob_seq / 1000,
        blob_seq % 1000,
    )
}

/// Key for a bulk chunk blob: `{reversed}/_chunks/{chunkId}.gcol`.
pub fn chunk_blob_key(namespace: &Namespace, chunk_id: &str) -> String {
    format!("{}/_chunks/{}.gcol", reversed_path(namespace), chunk_id)
}

/// Key for the namespace manifest: `{reversed}/_manifest.json`.
pub fn manifest_key(namespace: &Namespace) -> String {
    format!("{}/_manifest.json", reversed_path(namespace))
}

/// UTC calendar date (`YYYY-MM-DD`) for an epoch-millis timestamp.
pub fn utc_date(epoch_millis: i64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_millis_opt(epoch_millis)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).single().unwrap())
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverses_host_labels() {
        let ns = Namespace::new("https://a.b.c/p/q").unwrap();
        assert_eq!(reversed_path(&ns), ".c/.b/.a/p/q");
    }

    #[test]
    fn handles_host_only_namespace() {
        let ns = Namespace::new("https://example.com").unwrap();
        assert_eq!(reversed_path(&ns), ".com/.example");
    }

    #[test]
    fn cdc_blob_key_layout() {
        let ns = Namespace::new("https://a.b.c/p/q").unwrap();
        let key = cdc_blob_key(&ns, "2026-07-28", 42);
        assert_eq!(key, ".c/.b/.a/p/q/_wal/2026-07-28/000000-042.gcol");
    }

    #[test]
    fn utc_date_formats_as_expected() {
        // 2024-01-15T00:00:00Z
        assert_eq!(utc_date(1_705_276_800_000), "2024-01-15");
    }
}
