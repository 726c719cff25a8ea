use serde::{Deserialize, Serialize};

use crate::hash::content_hash;

/// The minimal parameter set addressing a file or directory on the remote
/// site. Field order is fixed by the struct declaration, so the canonical
/// serialization of two equal locations is byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    #[serde(default)]
    pub contextid: i64,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub filearea: String,
    #[serde(default)]
    pub itemid: i64,
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub filename: String,
}

impl FileLocation {
    /// Canonical serialized form, the input to [`FileLocation::link_id`].
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("location serializes to json")
    }

    /// Stable local identifier for this location.
    pub fn link_id(&self) -> String {
        content_hash(self.canonical_json().as_bytes())
    }

    pub fn parse(serialized: &str) -> Option<Self> {
        serde_json::from_str(serialized).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileLocation {
        FileLocation {
            contextid: 3,
            component: "mod_x".to_string(),
            filearea: "content".to_string(),
            itemid: 7,
            filepath: "/a/".to_string(),
            filename: "report.pdf".to_string(),
        }
    }

    #[test]
    fn equal_locations_share_a_link_id() {
        assert_eq!(sample().link_id(), sample().link_id());
    }

    #[test]
    fn link_id_changes_with_any_field() {
        let base = sample();
        let mut other = sample();
        other.itemid = 8;
        assert_ne!(base.link_id(), other.link_id());

        let mut other = sample();
        other.filename = "report2.pdf".to_string();
        assert_ne!(base.link_id(), other.link_id());
    }

    #[test]
    fn canonical_json_round_trips_through_parse() {
        let location = sample();
        let parsed = FileLocation::parse(&location.canonical_json()).unwrap();
        assert_eq!(parsed, location);
        assert_eq!(parsed.link_id(), location.link_id());
    }

    #[test]
    fn parse_tolerates_missing_fields() {
        let parsed = FileLocation::parse(r#"{"contextid":5,"filepath":"/a"}"#).unwrap();
        assert_eq!(parsed.contextid, 5);
        assert_eq!(parsed.component, "");
        assert_eq!(parsed.itemid, 0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(FileLocation::parse("not json").is_none());
    }
}
