//! Unknown config field detection with "did you mean?" suggestions.

use serde_json::Value;

const KNOWN_TOP_LEVEL: &[&str] = &["logging", "scheduler", "http", "installer", "reload", "watch"];

const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    ("logging", &["format", "level", "file"]),
    ("scheduler", &["tick_delay_ms", "endpoint"]),
    ("http", &["timeout_enabled", "timeout_ms"]),
    ("installer", &["prefix", "npm_bin", "registry"]),
    ("reload", &["command"]),
];

const KNOWN_WATCH_ENTRY: &[&str] = &["name", "interval_ms", "endpoint"];

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
        }
        prev = row;
    }
    prev[b.len()]
}

/// Closest known field name, if within edit distance 3.
pub fn suggest_field<'a>(unknown: &str, known: &[&'a str]) -> Option<&'a str> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| k)
}

fn check_keys(obj: &serde_json::Map<String, Value>, known: &[&str], path: &str, out: &mut Vec<String>) {
    for key in obj.keys() {
        if known.contains(&key.as_str()) {
            continue;
        }
        let full = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        match suggest_field(key, known) {
            Some(s) => out.push(format!("unknown field '{}', did you mean '{}'?", full, s)),
            None => out.push(format!("unknown field '{}'", full)),
        }
    }
}

/// Describe every unrecognized field in a raw config document.
///
/// Unknown fields are ignored by deserialization, so a typo silently falls
/// back to the default. The loader logs each returned message as a warning.
pub fn unknown_fields(raw: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let Some(obj) = raw.as_object() else {
        return out;
    };
    check_keys(obj, KNOWN_TOP_LEVEL, "", &mut out);

    for (section, known) in KNOWN_SECTIONS {
        if let Some(inner) = obj.get(*section).and_then(Value::as_object) {
            check_keys(inner, known, section, &mut out);
        }
    }
    if let Some(entries) = obj.get("watch").and_then(Value::as_array) {
        for (i, entry) in entries.iter().enumerate() {
            if let Some(inner) = entry.as_object() {
                check_keys(inner, KNOWN_WATCH_ENTRY, &format!("watch[{}]", i), &mut out);
            }
        }
    }
    out
}
