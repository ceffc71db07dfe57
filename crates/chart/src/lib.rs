use std::collections::BTreeMap;

use common::SongRecord;
use serde_json::Value;

const ARTIST_SEPARATOR: &str = ", ";

#[derive(Debug)]
pub enum ParseError {
    MissingField(&'static str),
    InvalidField(&'static str),
    MissingAlbum,
    Payload(String),
}

impl ParseError {
    /// True for problems confined to a single chart row.
    pub fn is_malformed_record(&self) -> bool {
        !matches!(self, ParseError::Payload(_))
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingField(field) => write!(f, "missing field: {}", field),
            ParseError::InvalidField(field) => write!(f, "invalid field: {}", field),
            ParseError::MissingAlbum => write!(f, "song has no album"),
            ParseError::Payload(err) => write!(f, "payload error: {}", err),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Payload(err.to_string())
    }
}

/// Decodes a chart response body into its rows.
pub fn parse_payload(bytes: &[u8]) -> Result<Vec<Value>, ParseError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(rows) => Ok(rows),
        _ => Err(ParseError::Payload("chart is not an array".to_string())),
    }
}

pub fn parse_records(rows: &[Value]) -> Vec<Result<SongRecord, ParseError>> {
    rows.iter().map(parse_record).collect()
}

pub fn parse_record(row: &Value) -> Result<SongRecord, ParseError> {
    let song = row.get("song").ok_or(ParseError::MissingField("song"))?;
    if !song.is_object() {
        return Err(ParseError::InvalidField("song"));
    }

    let id = required_i64(song, "id", "song.id")?;
    let title = song
        .get("title")
        .ok_or(ParseError::MissingField("song.title"))?
        .as_str()
        .ok_or(ParseError::InvalidField("song.title"))?;
    let album_id = first_album_id(song)?;
    let artist = join_artists(row.get("songArtists"));

    Ok(SongRecord {
        id,
        title: normalize_title(title),
        artist,
        album_id,
    })
}

pub fn normalize_title(title: &str) -> String {
    title.replace('`', "'")
}

fn required_i64(value: &Value, key: &str, field: &'static str) -> Result<i64, ParseError> {
    value
        .get(key)
        .ok_or(ParseError::MissingField(field))?
        .as_i64()
        .ok_or(ParseError::InvalidField(field))
}

fn first_album_id(song: &Value) -> Result<i64, ParseError> {
    let albums = match song.get("Albums") {
        Some(Value::Array(albums)) => albums,
        Some(Value::Null) | None => return Err(ParseError::MissingAlbum),
        Some(_) => return Err(ParseError::InvalidField("song.Albums")),
    };
    let first = albums.first().ok_or(ParseError::MissingAlbum)?;
    required_i64(first, "id", "song.Albums.id")
}

fn join_artists(value: Option<&Value>) -> String {
    let entries = match value {
        Some(Value::Array(entries)) => entries,
        _ => return String::new(),
    };

    // Slots keyed by credit order; empty slots are simply absent.
    let mut slots: BTreeMap<u64, Vec<&str>> = BTreeMap::new();
    for entry in entries {
        let name = entry.get("name").and_then(Value::as_str);
        let order = entry.get("order").and_then(Value::as_u64);
        if let (Some(name), Some(order)) = (name, order) {
            slots.entry(order).or_default().push(name);
        }
    }

    slots
        .into_values()
        .flatten()
        .collect::<Vec<_>>()
        .join(ARTIST_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::{parse_payload, parse_record, parse_records, ParseError};
    use serde_json::json;

    #[test]
    fn parses_full_row() {
        let row = json!({
            "song": { "id": 7, "title": "Ditto", "Albums": [{ "id": 70 }, { "id": 71 }] },
            "songArtists": [{ "name": "NewJeans", "order": 0 }]
        });
        let record = parse_record(&row).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.title, "Ditto");
        assert_eq!(record.artist, "NewJeans");
        assert_eq!(record.album_id, 70);
    }

    #[test]
    fn normalizes_backticks_in_title() {
        let row = json!({
            "song": { "id": 1, "title": "Don`t Stop", "Albums": [{ "id": 2 }] },
            "songArtists": []
        });
        let record = parse_record(&row).unwrap();
        assert_eq!(record.title, "Don't Stop");
    }

    #[test]
    fn joins_artists_by_order_skipping_gaps() {
        let row = json!({
            "song": { "id": 1, "title": "Collab", "Albums": [{ "id": 2 }] },
            "songArtists": [
                { "name": "Third", "order": 4 },
                { "name": "First", "order": 0 },
                { "name": "Second", "order": 2 }
            ]
        });
        let record = parse_record(&row).unwrap();
        assert_eq!(record.artist, "First, Second, Third");
    }

    #[test]
    fn shared_order_keeps_fetched_sequence() {
        let row = json!({
            "song": { "id": 1, "title": "Duet", "Albums": [{ "id": 2 }] },
            "songArtists": [
                { "name": "B", "order": 1 },
                { "name": "C", "order": 1 },
                { "name": "A", "order": 0 },
                { "name": 5, "order": 3 },
                { "name": "Unordered" }
            ]
        });
        let record = parse_record(&row).unwrap();
        assert_eq!(record.artist, "A, B, C");
    }

    #[test]
    fn empty_album_list_is_missing_album() {
        let row = json!({ "song": { "id": 1, "title": "Lost", "Albums": [] } });
        let err = parse_record(&row).unwrap_err();
        assert!(matches!(err, ParseError::MissingAlbum));
        assert!(err.is_malformed_record());
    }

    #[test]
    fn rejects_missing_or_mistyped_fields() {
        let no_id = json!({ "song": { "title": "x", "Albums": [{ "id": 1 }] } });
        assert!(matches!(
            parse_record(&no_id).unwrap_err(),
            ParseError::MissingField("song.id")
        ));

        let string_id = json!({ "song": { "id": "9", "title": "x", "Albums": [{ "id": 1 }] } });
        assert!(matches!(
            parse_record(&string_id).unwrap_err(),
            ParseError::InvalidField("song.id")
        ));

        let no_song = json!({ "songArtists": [] });
        assert!(matches!(
            parse_record(&no_song).unwrap_err(),
            ParseError::MissingField("song")
        ));
    }

    #[test]
    fn per_record_results_keep_row_order() {
        let rows = vec![
            json!({ "song": { "id": 1, "title": "a", "Albums": [{ "id": 10 }] } }),
            json!({ "song": { "id": 2, "title": "b", "Albums": [] } }),
            json!({ "song": { "id": 3, "title": "c", "Albums": [{ "id": 30 }] } }),
        ];
        let results = parse_records(&rows);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().id, 1);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().id, 3);
    }

    #[test]
    fn payload_must_be_array() {
        assert_eq!(parse_payload(b"[]").unwrap().len(), 0);
        let err = parse_payload(br#"{"song": {}}"#).unwrap_err();
        assert!(!err.is_malformed_record());
        assert!(parse_payload(b"not json").is_err());
    }
}
