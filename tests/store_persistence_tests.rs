use pagepin::anchor::AnchorDescriptor;
use pagepin::comments::{
    Comment, CommentInput, CommentService, CommentStore, LocalCommentStore, RemoteBackend,
    StoreConfig, StoreError, StoreMode,
};
use serde_json::Value;
use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PAGE_A: &str = "https://example.test/alpha";
const PAGE_B: &str = "https://example.test/beta";

fn input(text: &str, page_url: &str) -> CommentInput {
    CommentInput {
        text: text.to_string(),
        page_url: page_url.to_string(),
        anchor: AnchorDescriptor {
            page_x: 10.0,
            page_y: 20.0,
            norm_x: Some(0.125),
            norm_y: Some(0.25),
            anchor_selector: Some("#target".to_string()),
            anchor_offset_x: Some(0.5),
            anchor_offset_y: Some(0.5),
        },
    }
}

fn local_service(dir: &Path) -> CommentService {
    CommentService::new(StoreConfig::default(), LocalCommentStore::with_dir(dir))
}

// Store files are named by the md5 of the page URL.
fn store_file(dir: &Path, page_url: &str) -> PathBuf {
    dir.join(format!("comments_{:x}.json", md5::compute(page_url)))
}

#[test]
fn pages_get_their_own_store_files() {
    let dir = TempDir::new().unwrap();
    let mut service = local_service(dir.path());
    service.create_comment(input("alpha note", PAGE_A), "Ana");
    service.create_comment(input("beta note", PAGE_B), "Ben");

    assert!(store_file(dir.path(), PAGE_A).exists());
    assert!(store_file(dir.path(), PAGE_B).exists());

    let mut reopened = local_service(dir.path());
    let alpha = reopened.fetch_comments(PAGE_A);
    assert_eq!(alpha.len(), 1);
    assert_eq!(alpha[0].text, "alpha note");
    assert_eq!(alpha[0].author, "Ana");
    assert_eq!(reopened.fetch_comments(PAGE_B).len(), 1);
}

#[test]
fn stored_json_is_flat_camel_case() {
    let dir = TempDir::new().unwrap();
    let mut service = local_service(dir.path());
    service.create_comment(input("wire check", PAGE_A), "");

    let raw = fs::read_to_string(store_file(dir.path(), PAGE_A)).unwrap();
    let parsed: Value = serde_json::from_str(&raw).unwrap();
    let first = &parsed[0];

    for key in [
        "id",
        "text",
        "author",
        "createdAt",
        "pageUrl",
        "x",
        "y",
        "normX",
        "normY",
        "anchorSelector",
        "anchorOffsetX",
        "anchorOffsetY",
    ] {
        assert!(first.get(key).is_some(), "missing key {key}");
    }
    // The anchor is flattened into the comment, not nested.
    assert!(first.get("anchor").is_none());
    assert!(first.get("page_url").is_none());

    assert_eq!(first["x"].as_f64(), Some(10.0));
    assert_eq!(first["author"].as_str(), Some("Anonymous"));
    assert!(first["id"].as_str().unwrap().starts_with("pin-"));
}

#[test]
fn corrupt_files_read_as_empty_and_recover_on_write() {
    let dir = TempDir::new().unwrap();
    fs::write(store_file(dir.path(), PAGE_A), "{not valid json").unwrap();

    let mut service = local_service(dir.path());
    assert!(service.fetch_comments(PAGE_A).is_empty());

    service.create_comment(input("fresh start", PAGE_A), "Ana");
    let mut reopened = local_service(dir.path());
    assert_eq!(reopened.fetch_comments(PAGE_A).len(), 1);
}

/// Remote that is configured but down.
struct OutageRemote;

impl RemoteBackend for OutageRemote {
    fn fetch_comments(
        &mut self,
        _config: &StoreConfig,
        _page_url: &str,
    ) -> Result<Vec<Comment>, StoreError> {
        Err(StoreError::remote("HTTP 502"))
    }

    fn create_comment(
        &mut self,
        _config: &StoreConfig,
        _comment: &Comment,
    ) -> Result<Comment, StoreError> {
        Err(StoreError::remote("HTTP 502"))
    }
}

#[test]
fn remote_outages_fall_back_to_local_storage() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        mode: StoreMode::Api,
        base_url: Some("https://api.example.test".to_string()),
        project_id: Some("proj-1".to_string()),
        auth_token: None,
    };
    let mut service = CommentService::with_remote(
        config,
        LocalCommentStore::with_dir(dir.path()),
        Box::new(OutageRemote),
    );

    // The caller never sees the outage.
    let created = service.create_comment(input("kept locally", PAGE_A), "Ana");
    assert!(created.id.starts_with("pin-"));

    let fetched = service.fetch_comments(PAGE_A);
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].text, "kept locally");
    assert!(store_file(dir.path(), PAGE_A).exists());
}

#[test]
#[serial]
fn storage_dir_env_override_wins() {
    let dir = TempDir::new().unwrap();
    unsafe { std::env::set_var("PAGEPIN_COMMENTS_DIR", dir.path()) };
    let resolved = LocalCommentStore::default_dir();
    unsafe { std::env::remove_var("PAGEPIN_COMMENTS_DIR") };
    assert_eq!(resolved.as_path(), dir.path());
}
