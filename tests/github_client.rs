use assert_matches::assert_matches;
use octocrab::Octocrab;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reltrack::{GitHubClient, ReleaseSource, RepoIdentity, TrackerError};

fn client_for(server: &MockServer) -> GitHubClient {
    let octocrab = Octocrab::builder()
        .base_uri(server.uri())
        .unwrap()
        .build()
        .unwrap();
    GitHubClient::with_octocrab(octocrab)
}

fn widget() -> RepoIdentity {
    RepoIdentity::new("acme", "widget")
}

fn owner_json(login: &str) -> serde_json::Value {
    let api = format!("https://api.github.com/users/{}", login);
    json!({
        "login": login,
        "id": 1001,
        "node_id": "MDQ6VXNlcjEwMDE=",
        "avatar_url": "https://avatars.githubusercontent.com/u/1001?v=4",
        "gravatar_id": "",
        "url": api,
        "html_url": format!("https://github.com/{}", login),
        "followers_url": format!("{}/followers", api),
        "following_url": format!("{}/following{{/other_user}}", api),
        "gists_url": format!("{}/gists{{/gist_id}}", api),
        "starred_url": format!("{}/starred{{/owner}}{{/repo}}", api),
        "subscriptions_url": format!("{}/subscriptions", api),
        "organizations_url": format!("{}/orgs", api),
        "repos_url": format!("{}/repos", api),
        "events_url": format!("{}/events{{/privacy}}", api),
        "received_events_url": format!("{}/received_events", api),
        "type": "Organization",
        "site_admin": false
    })
}

fn release_json() -> serde_json::Value {
    let api = "https://api.github.com/repos/acme/widget/releases/987654";
    json!({
        "url": api,
        "html_url": "https://github.com/acme/widget/releases/tag/v1.0.0",
        "assets_url": format!("{}/assets", api),
        "upload_url": "https://uploads.github.com/repos/acme/widget/releases/987654/assets{?name,label}",
        "tarball_url": "https://api.github.com/repos/acme/widget/tarball/v1.0.0",
        "zipball_url": "https://api.github.com/repos/acme/widget/zipball/v1.0.0",
        "id": 987654,
        "node_id": "RE_kwDOAbCdEf4AAQID",
        "tag_name": "v1.0.0",
        "target_commitish": "main",
        "name": "Widget 1.0",
        "body": "First stable release",
        "draft": false,
        "prerelease": false,
        "created_at": "2025-03-01T11:58:00Z",
        "published_at": "2025-03-01T12:00:00Z",
        "author": owner_json("acme-bot"),
        "assets": []
    })
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "message": "Not Found",
        "documentation_url": "https://docs.github.com/rest/releases/releases#get-the-latest-release"
    }))
}

#[tokio::test]
async fn test_fetch_latest_release_maps_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json()))
        .mount(&server)
        .await;

    let release = client_for(&server)
        .fetch_latest_release(&widget())
        .await
        .unwrap()
        .expect("release should be present");

    assert_eq!(release.release_id, "987654");
    assert_eq!(release.tag, "v1.0.0");
    assert_eq!(release.display_name.as_deref(), Some("Widget 1.0"));
    assert_eq!(
        release.published_at.map(|ts| ts.to_rfc3339()),
        Some("2025-03-01T12:00:00+00:00".to_string())
    );
    assert_eq!(
        release.release_url,
        "https://github.com/acme/widget/releases/tag/v1.0.0"
    );
}

#[tokio::test]
async fn test_fetch_latest_release_not_found_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/releases/latest"))
        .respond_with(not_found())
        .mount(&server)
        .await;

    let result = client_for(&server).fetch_latest_release(&widget()).await;
    assert_matches!(result, Ok(None));
}

#[tokio::test]
async fn test_fetch_latest_release_server_error_is_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/releases/latest"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "message": "Server Error"
        })))
        .mount(&server)
        .await;

    let result = client_for(&server).fetch_latest_release(&widget()).await;
    assert_matches!(
        result,
        Err(TrackerError::UpstreamUnavailable { repository, .. }) if repository == "acme/widget"
    );
}

#[tokio::test]
async fn test_lookup_repository_returns_canonical_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4242,
            "node_id": "R_kgDOAAAQkg",
            "name": "Widget",
            "full_name": "Acme/Widget",
            "owner": owner_json("Acme"),
            "private": false,
            "html_url": "https://github.com/Acme/Widget",
            "url": "https://api.github.com/repos/Acme/Widget",
            "fork": false
        })))
        .mount(&server)
        .await;

    let upstream = client_for(&server)
        .lookup_repository(&widget())
        .await
        .unwrap()
        .expect("repository should exist");

    assert_eq!(upstream.identity, RepoIdentity::new("Acme", "Widget"));
    assert_eq!(
        upstream.html_url.as_deref(),
        Some("https://github.com/Acme/Widget")
    );
}

#[tokio::test]
async fn test_lookup_missing_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget"))
        .respond_with(not_found())
        .mount(&server)
        .await;

    let result = client_for(&server).lookup_repository(&widget()).await;
    assert_matches!(result, Ok(None));
}
