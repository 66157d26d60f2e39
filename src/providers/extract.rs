//! Response-shape normalization.
//!
//! Provider response bodies drift: fields move, get renamed, or arrive under
//! legacy names. Each adapter decodes the raw JSON into a typed envelope
//! (every field optional), then runs an ordered list of probe functions over
//! it. The first probe yielding non-empty text wins; when none match, the
//! raw body is rendered as a string. Extraction therefore always produces
//! *some* text and never fails.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Applies `probes` in order and returns the first non-empty hit, falling
/// back to the stringified raw body.
pub fn first_match<E>(envelope: &E, probes: &[fn(&E) -> Option<String>], raw: &Value) -> String {
    for probe in probes {
        if let Some(text) = probe(envelope)
            && !text.is_empty()
        {
            return text;
        }
    }
    raw.to_string()
}

/// Decodes a raw body into a typed envelope. A shape mismatch yields the
/// default (all-empty) envelope so every probe misses and `first_match`
/// falls through to stringification.
pub fn decode<E: DeserializeOwned + Default>(raw: &Value) -> E {
    serde_json::from_value(raw.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, Default)]
    struct Envelope {
        primary: Option<String>,
        fallback: Option<String>,
    }

    fn primary(e: &Envelope) -> Option<String> {
        e.primary.clone()
    }

    fn fallback(e: &Envelope) -> Option<String> {
        e.fallback.clone()
    }

    const PROBES: &[fn(&Envelope) -> Option<String>] = &[primary, fallback];

    #[test]
    fn test_primary_wins_when_both_fields_present() {
        let raw = json!({"primary": "first", "fallback": "second"});
        let envelope: Envelope = decode(&raw);
        assert_eq!(first_match(&envelope, PROBES, &raw), "first");
    }

    #[test]
    fn test_falls_through_to_later_probe() {
        let raw = json!({"fallback": "second"});
        let envelope: Envelope = decode(&raw);
        assert_eq!(first_match(&envelope, PROBES, &raw), "second");
    }

    #[test]
    fn test_empty_text_is_skipped() {
        let raw = json!({"primary": "", "fallback": "second"});
        let envelope: Envelope = decode(&raw);
        assert_eq!(first_match(&envelope, PROBES, &raw), "second");
    }

    #[test]
    fn test_unknown_shape_stringifies_raw_body() {
        let raw = json!({"surprise": {"nested": 42}});
        let envelope: Envelope = decode(&raw);
        let text = first_match(&envelope, PROBES, &raw);
        assert!(text.contains("surprise"));
        assert!(text.contains("42"));
    }

    #[test]
    fn test_decode_tolerates_type_mismatch() {
        // "primary" holding a number would fail strict decoding; the default
        // envelope keeps extraction alive.
        let raw = json!({"primary": 7});
        let envelope: Envelope = decode(&raw);
        assert!(envelope.primary.is_none());
        assert_eq!(first_match(&envelope, PROBES, &raw), raw.to_string());
    }
}
