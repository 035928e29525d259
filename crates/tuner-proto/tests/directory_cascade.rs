//! Directory loads against fake radio-browser mirrors.

use serde_json::{json, Value};
use tuner_proto::config::DirectoryConfig;
use tuner_proto::directory::{Directory, DirectoryLoader, DirectoryOrigin};
use tuner_proto::station::seed_stations;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIMARY_PATH: &str = "/json/stations/bycountrycodeexact/in";
const FALLBACK_PATH: &str = "/json/stations/search";

/// Address with nothing listening on it.
fn dead_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn config(primary: String, fallback: String) -> DirectoryConfig {
    DirectoryConfig {
        primary_url: primary,
        fallback_url: fallback,
        request_timeout_secs: 5,
        ..DirectoryConfig::default()
    }
}

fn uuid_only_station(n: usize) -> Value {
    json!({
        "stationuuid": format!("00000000-0000-0000-0000-00000000000{}", n),
        "name": format!("Uuid Station {}", n),
        "url_resolved": format!("https://streams.example/{}", n),
        "tags": "hindi,music",
        "favicon": ""
    })
}

async fn load(cfg: &DirectoryConfig) -> (Directory, tuner_proto::directory::LoadReport) {
    let directory = Directory::new();
    let loader = DirectoryLoader::from_config(cfg).unwrap();
    let report = loader.load(&directory).await;
    (directory, report)
}

#[tokio::test]
async fn primary_uuid_only_stations_keep_their_uuid() {
    let primary = MockServer::start().await;
    let body: Vec<Value> = (1..=5).map(uuid_only_station).collect();

    Mock::given(method("GET"))
        .and(path(PRIMARY_PATH))
        .and(query_param("limit", "1300"))
        .and(query_param("order", "random"))
        .and(header("Origin", "http://localhost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&primary)
        .await;

    let (directory, report) = load(&config(primary.uri(), dead_address())).await;

    assert!(!directory.is_loading());
    assert_eq!(report.count, 5);
    assert_eq!(
        report.origin,
        DirectoryOrigin::Source {
            name: "primary".into()
        }
    );
    let stations = directory.stations().await;
    assert_eq!(stations.len(), 5);
    for (i, s) in stations.iter().enumerate() {
        assert_eq!(s.id, format!("00000000-0000-0000-0000-00000000000{}", i + 1));
        assert_eq!(s.favicon, None);
    }
}

#[tokio::test]
async fn primary_network_error_uses_fallback_only() {
    let fallback = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FALLBACK_PATH))
        .and(query_param("countrycode", "in"))
        .and(query_param("limit", "1300"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "stationuuid": "f-1", "name": "Fallback One", "url_resolved": "https://f.example/1" },
            { "id": 77, "name": "Fallback Two", "url_resolved": "https://f.example/2" }
        ])))
        .expect(1)
        .mount(&fallback)
        .await;

    let (directory, report) = load(&config(dead_address(), fallback.uri())).await;

    let ids: Vec<String> = directory.stations().await.into_iter().map(|s| s.id).collect();
    assert_eq!(ids, ["f-1", "77"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source_name, "primary");
    assert!(ids.iter().all(|id| !["1", "2", "3"].contains(&id.as_str())));
}

#[tokio::test]
async fn non_success_status_cascades() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PRIMARY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .and(path(FALLBACK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([uuid_only_station(9)])))
        .mount(&fallback)
        .await;

    let (directory, report) = load(&config(primary.uri(), fallback.uri())).await;

    assert_eq!(directory.len().await, 1);
    assert!(report.failures[0].error.contains("503"));
}

#[tokio::test]
async fn both_failing_yields_seed_list() {
    let primary = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PRIMARY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&primary)
        .await;

    let (directory, report) = load(&config(primary.uri(), dead_address())).await;

    assert!(!directory.is_loading());
    assert_eq!(report.origin, DirectoryOrigin::Seed);
    assert_eq!(report.failures.len(), 2);
    let stations = directory.stations().await;
    assert_eq!(stations, seed_stations());
    let ids: Vec<&str> = stations.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
}

#[tokio::test]
async fn fallback_does_not_send_origin_header() {
    let fallback = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FALLBACK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fallback)
        .await;

    let (directory, report) = load(&config(dead_address(), fallback.uri())).await;
    assert_eq!(report.count, 0);
    assert!(directory.is_empty().await);

    let requests = fallback.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("origin").is_none());
}
