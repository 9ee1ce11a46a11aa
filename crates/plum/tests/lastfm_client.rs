//! Last.fm client against a mock server.

use anyhow::Result;
use lakh::MsdId;
use plum::lastfm::{fetch_top_genres, LastFmClient, LastFmError, TagQuery};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> Result<LastFmClient> {
    Ok(LastFmClient::new(
        "test-key",
        &format!("{}/2.0/", server.uri()),
        Duration::from_secs(5),
    )?
    .with_retry_base(Duration::from_millis(1)))
}

fn tags(names: &[&str]) -> serde_json::Value {
    json!({
        "toptags": {
            "tag": names.iter().map(|n| json!({"name": n, "count": 100})).collect::<Vec<_>>(),
            "@attr": {}
        }
    })
}

fn not_found() -> serde_json::Value {
    json!({"error": 6, "message": "Track not found", "links": []})
}

#[tokio::test]
async fn sends_expected_query() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2.0/"))
        .and(query_param("method", "track.gettoptags"))
        .and(query_param("artist", "Cyndi Lauper"))
        .and(query_param("track", "Into the Nightlife"))
        .and(query_param("autocorrect", "1"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags(&["Pop", "80s"])))
        .expect(1)
        .mount(&server)
        .await;

    let tags = client(&server)?
        .top_tags("Cyndi Lauper", "Into the Nightlife")
        .await?;
    assert_eq!(tags, vec!["pop", "80s"]);
    Ok(())
}

#[tokio::test]
async fn not_found_is_distinguished() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(not_found()))
        .mount(&server)
        .await;

    let client = client(&server)?;
    assert!(matches!(
        client.top_tags("Nobody", "Nothing").await,
        Err(LastFmError::NotFound { .. })
    ));
    assert!(matches!(
        client.top_genre_tags("Nobody", "Nothing", false).await,
        Err(LastFmError::NotFound { .. })
    ));
    assert!(client.top_genre_tags("Nobody", "Nothing", true).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_api_key_is_not_ignored() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"error": 10, "message": "Invalid API key"})),
        )
        .mount(&server)
        .await;

    let result = client(&server)?.top_genre_tags("A", "B", true).await;
    assert!(matches!(result, Err(LastFmError::Api { code: 10, .. })));
    Ok(())
}

#[tokio::test]
async fn transient_failures_are_retried() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>down</html>"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags(&["rock"])))
        .expect(1)
        .mount(&server)
        .await;

    let tags = client(&server)?
        .with_max_retries(3)
        .top_tags_with_retry("A", "B")
        .await?;
    assert_eq!(tags, vec!["rock"]);
    Ok(())
}

#[tokio::test]
async fn retries_give_up() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let result = client(&server)?
        .with_max_retries(1)
        .top_tags_with_retry("A", "B")
        .await;
    assert!(matches!(result, Err(LastFmError::Http(502))));
    Ok(())
}

#[tokio::test]
async fn fan_out_keeps_input_order_and_isolates_failures() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("artist", "First"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tags(&["jazz", "bebop"]))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("artist", "Second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(not_found()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("artist", "Third"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags(&["Metal"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("artist", "Fourth"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let queries: Vec<TagQuery> = ["First", "Second", "Third", "Fourth"]
        .iter()
        .enumerate()
        .map(|(i, artist)| TagQuery {
            msd_id: MsdId::parse(&format!("TRAAAA{i}")).unwrap(),
            artist: artist.to_string(),
            title: "Song".to_string(),
        })
        .collect();

    let client = client(&server)?;
    let results = fetch_top_genres(&client, queries, 4).await;
    let results: Vec<(String, Option<String>)> = results
        .into_iter()
        .map(|(id, genre)| (id.into_inner(), genre))
        .collect();

    assert_eq!(
        results,
        vec![
            ("TRAAAA0".to_string(), Some("jazz".to_string())),
            ("TRAAAA1".to_string(), None),
            ("TRAAAA2".to_string(), Some("metal".to_string())),
            ("TRAAAA3".to_string(), None),
        ]
    );
    Ok(())
}
