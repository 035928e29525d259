//! Station records, radio-browser normalisation, seed list and the browser
//! filter predicate.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Length of the random identifier handed to stations the server sent
/// without `stationuuid` or `id`.
pub const RANDOM_ID_LEN: usize = 9;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// One streamable radio source in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Station {
    /// Never empty once a station has gone through [`Station::from_raw`].
    pub id: String,
    pub name: String,
    /// Stream address handed to the player.
    pub url_resolved: String,
    /// Comma-separated free text ("News, National").
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub countrycode: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub bitrate: Option<u32>,
}

/// A station object as radio-browser.info serves it.
///
/// Every field is optional and read leniently (numbers where strings are
/// expected are stringified, anything else becomes `None`).  Only a body that
/// is not an array of objects is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stationuuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url_resolved: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tags: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub favicon: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub homepage: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub countrycode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub codec: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub bitrate: Option<u32>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl Station {
    /// Normalise a server record.  The identifier is taken from
    /// `stationuuid`, then `id`, then a fresh random token.
    pub fn from_raw(raw: RawStation) -> Self {
        let id = non_empty(raw.stationuuid)
            .or_else(|| non_empty(raw.id))
            .unwrap_or_else(random_token);

        Self {
            id,
            name: raw.name.unwrap_or_default(),
            // Older mirrors omit url_resolved on some records; url is the
            // unresolved playlist address which mpv can follow itself.
            url_resolved: non_empty(raw.url_resolved)
                .or_else(|| non_empty(raw.url))
                .unwrap_or_default(),
            tags: non_empty(raw.tags),
            favicon: non_empty(raw.favicon),
            homepage: non_empty(raw.homepage),
            country: non_empty(raw.country),
            countrycode: non_empty(raw.countrycode),
            language: non_empty(raw.language),
            codec: non_empty(raw.codec),
            bitrate: raw.bitrate.filter(|b| *b > 0),
        }
    }

    /// Station with only the fields the seed list carries.
    pub fn seed(id: &str, name: &str, url_resolved: &str, tags: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url_resolved: url_resolved.to_string(),
            tags: Some(tags.to_string()),
            ..Self::default()
        }
    }

    /// Tags for display; falls back to "No tags".
    pub fn tags_label(&self) -> &str {
        self.tags.as_deref().unwrap_or("No tags")
    }
}

/// Normalise a whole response body.
pub fn normalize_all(raw: Vec<RawStation>) -> Vec<Station> {
    raw.into_iter().map(Station::from_raw).collect()
}

/// Random base-36 token used when the server supplies no identifier.
pub fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_ID_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// The three stations used when every network source failed.
pub fn seed_stations() -> Vec<Station> {
    vec![
        Station::seed(
            "1",
            "All India Radio",
            "https://air.pc.cdn.bitgravity.com/air/live/pbaudio001/playlist.m3u8",
            "News, National",
        ),
        Station::seed(
            "2",
            "Radio Mirchi",
            "https://radioindia.net/radio/mirchi98/icecast.audio",
            "Music, Entertainment",
        ),
        Station::seed(
            "3",
            "Radio City",
            "https://prclive1.listenon.in:9302/",
            "Bollywood, Hindi",
        ),
    ]
}

/// Case-insensitive substring match of `term` against the name or the tags.
/// An empty term matches everything.
pub fn station_matches(station: &Station, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let term = term.to_lowercase();
    station.name.to_lowercase().contains(&term)
        || station
            .tags
            .as_deref()
            .map(|t| t.to_lowercase().contains(&term))
            .unwrap_or(false)
}

/// Matching stations in directory order.
pub fn filter_stations<'a>(stations: &'a [Station], term: &str) -> Vec<&'a Station> {
    stations
        .iter()
        .filter(|s| station_matches(s, term))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: Value) -> RawStation {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_id_prefers_uuid() {
        let s = Station::from_raw(raw(serde_json::json!({
            "stationuuid": "9617a958-0601-11e8-ae97-52543be04c81",
            "id": 42,
            "name": "Vividh Bharati",
            "url_resolved": "https://example.org/vb"
        })));
        assert_eq!(s.id, "9617a958-0601-11e8-ae97-52543be04c81");
    }

    #[test]
    fn test_id_falls_back_to_server_id() {
        let s = Station::from_raw(raw(serde_json::json!({ "id": 42, "name": "x" })));
        assert_eq!(s.id, "42");

        let s = Station::from_raw(raw(serde_json::json!({ "stationuuid": "", "id": "abc" })));
        assert_eq!(s.id, "abc");
    }

    #[test]
    fn test_id_random_when_missing() {
        let a = Station::from_raw(raw(serde_json::json!({ "name": "no id" })));
        let b = Station::from_raw(raw(serde_json::json!({ "name": "no id" })));
        assert_eq!(a.id.len(), RANDOM_ID_LEN);
        assert!(a.id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_lenient_fields() {
        let s = Station::from_raw(raw(serde_json::json!({
            "stationuuid": "u",
            "name": "Radio One",
            "tags": "",
            "favicon": null,
            "bitrate": "128",
            "codec": ["weird"]
        })));
        assert_eq!(s.tags, None);
        assert_eq!(s.favicon, None);
        assert_eq!(s.codec, None);
        assert_eq!(s.bitrate, Some(128));
        assert_eq!(s.tags_label(), "No tags");
    }

    #[test]
    fn test_seed_list_is_exact() {
        let seeds = seed_stations();
        let ids: Vec<&str> = seeds.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(seeds[1].name, "Radio Mirchi");
        assert_eq!(seeds[2].url_resolved, "https://prclive1.listenon.in:9302/");
        assert_eq!(seeds[0].tags.as_deref(), Some("News, National"));
    }

    #[test]
    fn test_filter_case_insensitive_name_or_tags() {
        let stations = seed_stations();
        let hits = filter_stations(&stations, "MIRCHI");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2");

        let hits = filter_stations(&stations, "hindi");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "3");

        let hits = filter_stations(&stations, "radio");
        assert_eq!(hits.len(), 3);

        assert!(filter_stations(&stations, "jazz").is_empty());
    }

    #[test]
    fn test_empty_filter_returns_everything_in_order() {
        let stations = seed_stations();
        let hits = filter_stations(&stations, "");
        assert_eq!(hits.len(), stations.len());
        assert!(hits.iter().zip(stations.iter()).all(|(a, b)| *a == b));
    }

    #[test]
    fn test_station_without_tags_matches_name_only() {
        let s = Station {
            id: "x".into(),
            name: "Akashvani".into(),
            ..Station::default()
        };
        assert!(station_matches(&s, "vani"));
        assert!(!station_matches(&s, "news"));
    }
}
