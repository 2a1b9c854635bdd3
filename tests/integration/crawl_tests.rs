//! Integration tests for the crawler
//!
//! These tests use wiremock to stand up a small proceedings site (index page,
//! per-year listing pages, paper detail pages and artifacts) and run the full
//! crawl cycle end-to-end against a temporary database and download folder.

use paper_harvest::config::{parse_config, Config};
use paper_harvest::crawler::{crawl, Coordinator};
use paper_harvest::storage::{open_storage, RunStatus, SqliteStorage, Storage, UNKNOWN_YEAR};
use paper_harvest::HarvestError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Serves artifacts after a fixed delay and records when each request arrived
struct SlowArtifact {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for SlowArtifact {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_bytes(b"%PDF slow".to_vec())
            .set_delay(self.delay)
    }
}

/// Creates a test configuration rooted at the mock server
fn create_test_config(root_url: &str, temp_dir: &TempDir) -> Config {
    let toml = format!(
        r#"
[crawler]
root-url = "{root_url}"
max-depth = 2
max-concurrent-requests = 4
year-filter = ["2019"]
request-timeout-secs = 2
user-agent = "TestHarvester/1.0"

[output]
database-path = "{db}"
download-folder = "{downloads}"
"#,
        db = temp_dir.path().join("papers.db").display(),
        downloads = temp_dir.path().join("downloads").display(),
    );
    parse_config(&toml).expect("test config should be valid")
}

async fn serve_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn serve_artifact(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Index page linking to one listing page, which lists two papers; the
/// second paper's detail page returns 404
async fn mount_three_node_tree(server: &MockServer) {
    let base_url = server.uri();

    serve_html(
        server,
        "/",
        format!(
            r#"<html><body>
            <a href="{base_url}/paper/2019">Advances in NeurIPS 32 (NeurIPS 2019)</a>
            <a href="{base_url}/about">About</a>
            </body></html>"#
        ),
    )
    .await;

    serve_html(
        server,
        "/paper/2019",
        r#"<html><body><ul>
            <li><a href="/paper/2019/hash/aaa-Abstract.html">Learning to Learn</a>
                <i>Ada Lovelace, Alan Turing</i></li>
            <li><a href="/paper/2019/hash/bbb-Abstract.html">Missing Paper</a>
                <i>Grace Hopper</i></li>
        </ul></body></html>"#
            .to_string(),
    )
    .await;

    serve_html(
        server,
        "/paper/2019/hash/aaa-Abstract.html",
        r#"<html><body>
            <a href="/paper/2019/file/aaa-Bibtex.bib">Bibtex</a>
            <a href="/paper/2019/file/aaa-Paper.pdf">Paper</a>
            <a href="/paper/2019/file/aaa-Supplemental.pdf">Supplemental</a>
        </body></html>"#
            .to_string(),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/paper/2019/hash/bbb-Abstract.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;

    serve_artifact(server, "/paper/2019/file/aaa-Paper.pdf", b"%PDF-1.4 learning").await;

    // Non-matching index links and secondary artifacts are never requested
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/paper/2019/file/aaa-Supplemental.pdf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

fn paper_count(temp_dir: &TempDir) -> u64 {
    let storage = SqliteStorage::new(&temp_dir.path().join("papers.db")).unwrap();
    storage.count_papers().unwrap()
}

#[tokio::test]
async fn test_three_node_tree_with_one_404() {
    let mock_server = MockServer::start().await;
    mount_three_node_tree(&mock_server).await;
    let temp_dir = TempDir::new().unwrap();

    let config = create_test_config(&mock_server.uri(), &temp_dir);
    let report = crawl(config, "test-hash").await.unwrap();

    assert_eq!(report.papers_found, 2);
    assert_eq!(report.papers_saved, 1);
    assert_eq!(report.failures(), 1);
    assert_eq!(report.pages_failed, 1);

    let storage = SqliteStorage::new(&temp_dir.path().join("papers.db")).unwrap();
    assert_eq!(storage.count_papers().unwrap(), 1);

    let artifact_url = format!("{}/paper/2019/file/aaa-Paper.pdf", mock_server.uri());
    let paper = storage.get_paper_by_url(&artifact_url).unwrap().unwrap();
    assert_eq!(paper.title, "Learning to Learn");
    assert_eq!(paper.authors, "Ada Lovelace, Alan Turing");
    assert_eq!(paper.year, UNKNOWN_YEAR);
    assert_eq!(paper.label, None);

    // Every persisted record points at a readable file
    assert!(Path::new(&paper.file_path).is_absolute());
    assert_eq!(
        std::fs::read(&paper.file_path).unwrap(),
        b"%PDF-1.4 learning"
    );

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.papers_saved, 1);
    assert_eq!(run.pages_failed, 1);
}

#[tokio::test]
async fn test_crawl_twice_is_idempotent() {
    let mock_server = MockServer::start().await;
    mount_three_node_tree(&mock_server).await;
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &temp_dir);

    let first = crawl(config.clone(), "test-hash").await.unwrap();
    let count_after_first = paper_count(&temp_dir);

    let second = crawl(config, "test-hash").await.unwrap();
    let count_after_second = paper_count(&temp_dir);

    assert_eq!(count_after_first, 1);
    assert_eq!(count_after_second, count_after_first);
    assert_eq!(first.papers_saved, 1);

    // The second crawl still fetches the artifact, but keeps the existing row
    assert_eq!(second.papers_saved, 0);
    assert_eq!(second.papers_existing, 1);
}

#[tokio::test]
async fn test_year_filter_selects_listing_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    serve_html(
        &mock_server,
        "/",
        format!(
            r#"<a href="{base_url}/paper/2018">NeurIPS 2018</a>
               <a href="{base_url}/paper/2019">NeurIPS 2019</a>
               <a href="{base_url}/paper/2020">NeurIPS 2020</a>"#
        ),
    )
    .await;
    for year in ["2019", "2020"] {
        serve_html(
            &mock_server,
            &format!("/paper/{year}"),
            format!(r#"<ul><li><a href="/detail/{year}">Paper {year}</a></li></ul>"#),
        )
        .await;
        serve_html(
            &mock_server,
            &format!("/detail/{year}"),
            format!(r#"<a href="/files/{year}.txt">Text</a>"#),
        )
        .await;
        serve_artifact(&mock_server, &format!("/files/{year}.txt"), b"plain text paper").await;
    }
    Mock::given(method("GET"))
        .and(path("/paper/2018"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&base_url, &temp_dir);
    config.crawler.year_filter = vec!["2019".to_string(), "2020".to_string()];

    let report = crawl(config, "test-hash").await.unwrap();

    assert_eq!(report.papers_saved, 2);
    assert_eq!(report.failures(), 0);
    assert_eq!(paper_count(&temp_dir), 2);
}

#[tokio::test]
async fn test_shared_detail_page_is_visited_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    serve_html(
        &mock_server,
        "/",
        format!(r#"<a href="{base_url}/paper/2019">2019</a>"#),
    )
    .await;
    serve_html(
        &mock_server,
        "/paper/2019",
        r#"<ul>
            <li><a href="/detail/shared">Original Title</a></li>
            <li><a href="/detail/shared">Duplicate Listing</a></li>
        </ul>"#
            .to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/detail/shared"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/shared.pdf">PDF</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    serve_artifact(&mock_server, "/shared.pdf", b"%PDF shared").await;

    let temp_dir = TempDir::new().unwrap();
    let report = crawl(create_test_config(&base_url, &temp_dir), "test-hash")
        .await
        .unwrap();

    assert_eq!(report.papers_found, 2);
    assert_eq!(report.already_visited, 1);
    assert_eq!(report.papers_saved, 1);
    assert_eq!(paper_count(&temp_dir), 1);
}

#[tokio::test]
async fn test_many_papers_downloaded_concurrently() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let paper_count_on_page = 12;

    serve_html(
        &mock_server,
        "/",
        format!(r#"<a href="{base_url}/paper/2019">2019</a>"#),
    )
    .await;

    let items: String = (0..paper_count_on_page)
        .map(|i| format!(r#"<li><a href="/detail/{i}">Paper {i}</a><i>Author {i}</i></li>"#))
        .collect();
    serve_html(&mock_server, "/paper/2019", format!("<ul>{items}</ul>")).await;

    for i in 0..paper_count_on_page {
        serve_html(
            &mock_server,
            &format!("/detail/{i}"),
            format!(r#"<a href="/files/{i}.pdf">PDF</a>"#),
        )
        .await;
        serve_artifact(&mock_server, &format!("/files/{i}.pdf"), b"%PDF").await;
    }

    let temp_dir = TempDir::new().unwrap();
    let report = crawl(create_test_config(&base_url, &temp_dir), "test-hash")
        .await
        .unwrap();

    assert_eq!(report.papers_saved, paper_count_on_page);
    assert_eq!(paper_count(&temp_dir), paper_count_on_page);
}

#[tokio::test]
async fn test_missing_artifact_and_failed_download_do_not_abort() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    serve_html(
        &mock_server,
        "/",
        format!(r#"<a href="{base_url}/paper/2019">2019</a>"#),
    )
    .await;
    serve_html(
        &mock_server,
        "/paper/2019",
        r#"<ul>
            <li><a href="/detail/no-file">No File</a></li>
            <li><a href="/detail/broken">Broken Download</a></li>
            <li><a href="/detail/good">Good Paper</a></li>
        </ul>"#
            .to_string(),
    )
    .await;
    serve_html(&mock_server, "/detail/no-file", r#"<a href="/bib">Bibtex</a>"#.to_string()).await;
    serve_html(&mock_server, "/detail/broken", r#"<a href="/broken.pdf">PDF</a>"#.to_string()).await;
    serve_html(&mock_server, "/detail/good", r#"<a href="/good.pdf">PDF</a>"#.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/broken.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    serve_artifact(&mock_server, "/good.pdf", b"%PDF good").await;

    let temp_dir = TempDir::new().unwrap();
    let report = crawl(create_test_config(&base_url, &temp_dir), "test-hash")
        .await
        .unwrap();

    assert_eq!(report.artifacts_missing, 1);
    assert_eq!(report.downloads_failed, 1);
    assert_eq!(report.papers_saved, 1);
    assert_eq!(report.failures(), 1);
    assert_eq!(paper_count(&temp_dir), 1);
}

#[tokio::test]
async fn test_unreachable_root_is_fatal() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let err = crawl(create_test_config(&mock_server.uri(), &temp_dir), "test-hash")
        .await
        .unwrap_err();

    match err {
        HarvestError::RootUnreachable(fetch_error) => {
            assert_eq!(fetch_error.status_code(), Some(404));
        }
        other => panic!("expected root failure, got {:?}", other),
    }
    assert_eq!(paper_count(&temp_dir), 0);
}

#[tokio::test]
async fn test_stop_request_prevents_new_branches() {
    let mock_server = MockServer::start().await;
    mount_three_node_tree(&mock_server).await;
    let temp_dir = TempDir::new().unwrap();

    let config = create_test_config(&mock_server.uri(), &temp_dir);
    let storage = open_storage(&temp_dir.path().join("papers.db")).unwrap();
    let coordinator = Coordinator::new(config, storage).unwrap();
    coordinator.stop_handle().request_stop();

    let report = coordinator.run().await.unwrap();

    assert!(report.was_interrupted());
    assert_eq!(report.papers_saved, 0);
    assert_eq!(paper_count(&temp_dir), 0);

    let storage = coordinator.storage();
    let run = storage.lock().unwrap().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_max_concurrent_requests_bounds_downloads() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let delay = Duration::from_millis(300);
    let arrivals = Arc::new(Mutex::new(Vec::new()));

    serve_html(
        &mock_server,
        "/",
        format!(r#"<a href="{base_url}/paper/2019">2019</a>"#),
    )
    .await;
    let items: String = (0..6)
        .map(|i| format!(r#"<li><a href="/detail/{i}">Paper {i}</a></li>"#))
        .collect();
    serve_html(&mock_server, "/paper/2019", format!("<ul>{items}</ul>")).await;
    for i in 0..6 {
        serve_html(
            &mock_server,
            &format!("/detail/{i}"),
            format!(r#"<a href="/files/{i}.pdf">PDF</a>"#),
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path_regex(r"^/files/\d+\.pdf$"))
        .respond_with(SlowArtifact {
            delay,
            arrivals: Arc::clone(&arrivals),
        })
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&base_url, &temp_dir);
    config.crawler.max_concurrent_requests = 2;

    let report = crawl(config, "test-hash").await.unwrap();
    assert_eq!(report.papers_saved, 6);

    // An artifact arriving within `delay` of another overlapped it in flight
    let arrivals = arrivals.lock().unwrap();
    let window = delay - Duration::from_millis(20);
    let peak = arrivals
        .iter()
        .map(|&at| {
            arrivals
                .iter()
                .filter(|&&other| other <= at && at.duration_since(other) < window)
                .count()
        })
        .max()
        .unwrap_or(0);
    assert_eq!(arrivals.len(), 6);
    assert!(peak <= 2, "peak artifact downloads in flight was {}", peak);
}
