use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sofa_client::{ClientConfig, DbClient, DocumentHeader, MockCouch, SofaResult, StatusCode};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Album {
    name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Artist {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    artist_id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    artist_rev: Option<String>,
    name: String,
    #[serde(default)]
    albums: Vec<Album>,
}

impl Artist {
    fn new(id: &str, name: &str) -> Self {
        Self {
            artist_id: Some(id.to_string()),
            artist_rev: None,
            name: name.to_string(),
            albums: vec![Album {
                name: format!("{name} - Debut"),
            }],
        }
    }
}

fn client(couch: &MockCouch) -> DbClient<MockCouch> {
    DbClient::new(
        ClientConfig::new("http://mock.local:5984", "music"),
        couch.clone(),
    )
}

fn generation(rev: &str) -> u64 {
    rev.split('-')
        .next()
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

#[tokio::test(flavor = "current_thread")]
async fn post_anonymous_without_id_expected_server_assigned_id() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);

    let response = db.post(&json!({"Name": "Artist"})).await?;

    assert!(response.is_success());
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(!response.id.is_empty());
    assert_eq!(generation(&response.rev), 1);
    let content = response.content.as_ref().expect("post should echo the entity");
    assert_eq!(content["Name"], "Artist");
    assert_eq!(content["_id"], Value::String(response.id.clone()));
    assert_eq!(content["_rev"], Value::String(response.rev.clone()));
    assert_eq!(couch.current_rev(&response.id)?, Some(response.rev.clone()));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn post_entity_with_id_expected_same_id() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);

    let response = db.post(&Artist::new("artist-1", "Fake Artist")).await?;

    assert!(response.is_success());
    assert_eq!(response.id, "artist-1");
    assert_eq!(generation(&response.rev), 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn put_new_entity_expected_created() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);

    let response = db.put("artist-2", &Artist::new("artist-2", "Other")).await?;

    assert!(response.is_success());
    assert_eq!(response.id, "artist-2");
    assert_eq!(generation(&response.rev), 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn put_existing_entity_with_current_rev_expected_next_generation() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    let mut artist = Artist::new("artist-3", "Replaced");
    let created = db.post(&artist).await?;

    artist.artist_rev = Some(created.rev.clone());
    artist.name = "Replaced Again".to_string();
    let replaced = db.put("artist-3", &artist).await?;

    assert!(replaced.is_success());
    assert_eq!(replaced.id, "artist-3");
    assert_eq!(generation(&replaced.rev), 2);
    assert_ne!(replaced.rev, created.rev);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn put_with_stale_rev_expected_conflict_with_uri_id() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    db.post(&Artist::new("known-id", "Conflicted")).await?;

    let mut stale = Artist::new("known-id", "Conflicted");
    stale.artist_rev = Some("2-179d36174ee192594c63b8e8d8f09345".to_string());
    let response = db.put("known-id", &stale).await?;

    assert!(!response.is_success());
    assert!(response.is_conflict());
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error.as_deref(), Some("conflict"));
    assert_eq!(response.id, "known-id");
    assert!(response.rev.is_empty());
    assert!(response.content.is_none());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn post_entity_without_id_expected_content_with_stored_metadata() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    let mut artist = Artist::new("unused", "Anonymous");
    artist.artist_id = None;

    let response = db.post(&artist).await?;

    assert!(response.is_success());
    let content = response.content.expect("post should echo the entity");
    assert_eq!(content.artist_id.as_deref(), Some(response.id.as_str()));
    assert_eq!(content.artist_rev.as_deref(), Some(response.rev.as_str()));
    assert_eq!(content.name, "Anonymous");
    assert_eq!(content.albums, artist.albums);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn put_entity_expected_id_from_entity_and_rewritable_content() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);

    let created = db.put_entity(&Artist::new("artist-8", "Self Addressed")).await?;

    assert!(created.is_success());
    assert_eq!(created.id, "artist-8");
    let mut content = created.content.clone().expect("put should echo the entity");
    assert_eq!(content.artist_rev.as_deref(), Some(created.rev.as_str()));

    content.name = "Renamed".to_string();
    let updated = db.put_entity(&content).await?;

    assert!(updated.is_success());
    assert_eq!(generation(&updated.rev), 2);
    let updated_content = updated.content.expect("update should echo the entity");
    assert_eq!(updated_content.artist_rev.as_deref(), Some(updated.rev.as_str()));
    assert_eq!(updated_content.name, "Renamed");

    let requests = couch.requests()?;
    assert_eq!(requests[0].uri, "http://mock.local:5984/music/artist-8");
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn put_entity_without_id_expected_validation_error_without_request() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    let mut artist = Artist::new("unused", "Nameless");
    artist.artist_id = None;

    let error = db
        .put_entity(&artist)
        .await
        .expect_err("entity without _id should fail");

    assert!(error.is_validation());
    assert!(couch.requests()?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn delete_entity_expected_content_with_tombstone_rev() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    let created = db.post(&Artist::new("artist-9", "Short Lived")).await?;
    let stored = created.content.expect("post should echo the entity");

    let deleted = db.delete_entity(&stored).await?;

    assert!(deleted.is_success());
    assert_eq!(deleted.id, "artist-9");
    assert_eq!(generation(&deleted.rev), 2);
    let content = deleted.content.expect("delete should echo the entity");
    assert_eq!(content.artist_rev.as_deref(), Some(deleted.rev.as_str()));
    assert_eq!(couch.document_count()?, 0);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn delete_entity_without_rev_expected_validation_error() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);

    let error = db
        .delete_entity(&Artist::new("artist-10", "Unsaved"))
        .await
        .expect_err("entity without _rev should fail");

    assert!(error.is_validation());
    assert!(couch.requests()?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn delete_existing_entity_expected_tombstone_rev() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    let created = db.post(&Artist::new("artist-4", "Deleted")).await?;
    let header = created.header().expect("post should resolve id and rev");

    let deleted = db.delete(&header).await?;

    assert!(deleted.is_success());
    assert_eq!(deleted.id, "artist-4");
    assert_eq!(generation(&deleted.rev), 2);

    let fetched = db.get::<Artist>("artist-4", None).await?;
    assert_eq!(fetched.status, StatusCode::NOT_FOUND);
    assert_eq!(fetched.reason.as_deref(), Some("deleted"));
    assert!(fetched.content.is_none());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn delete_with_wrong_rev_expected_conflict() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    db.post(&Artist::new("artist-5", "Kept")).await?;

    let response = db
        .delete(&DocumentHeader::new("artist-5", "9-ffffffffffffffffffffffffffffffff"))
        .await?;

    assert!(response.is_conflict());
    assert_eq!(response.id, "artist-5");
    assert_eq!(couch.document_count()?, 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn get_expected_content_and_metadata_from_body() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    let created = db.post(&Artist::new("artist-6", "Fetched")).await?;

    let fetched = db.get::<Artist>("artist-6", Some(&created.rev)).await?;

    assert!(fetched.is_success());
    assert_eq!(fetched.id, "artist-6");
    assert_eq!(fetched.rev, created.rev);
    let content = fetched.content.expect("get should decode content");
    assert_eq!(content.artist_id.as_deref(), Some("artist-6"));
    assert_eq!(content.artist_rev.as_deref(), Some(created.rev.as_str()));
    assert_eq!(content.albums.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn get_missing_document_expected_not_found_response() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);

    let response = db.get::<Artist>("nobody", None).await?;

    assert!(!response.is_success());
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.error.as_deref(), Some("not_found"));
    assert_eq!(response.id, "nobody");
    assert!(response.content.is_none());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn write_bodies_without_metadata_expected_uri_and_etag_fallbacks() -> SofaResult<()> {
    let couch = MockCouch::new();
    couch.omit_write_metadata(true, true)?;
    let db = client(&couch);

    let put = db.put_json("plain-doc", r#"{"kind":"plain"}"#).await?;
    assert!(put.is_success());
    assert_eq!(put.id, "plain-doc");
    assert_eq!(couch.current_rev("plain-doc")?, Some(put.rev.clone()));

    let post = db.post_json(r#"{"kind":"generated"}"#).await?;
    assert!(post.is_success());
    assert!(post.id.is_empty());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn document_id_with_slash_expected_round_trip() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);

    let put = db.put_json("_design/artists", r#"{"language":"javascript"}"#).await?;
    assert_eq!(put.id, "_design/artists");

    let fetched = db.get::<Value>("_design/artists", None).await?;
    assert!(fetched.is_success());
    assert_eq!(fetched.id, "_design/artists");

    let requests = couch.requests()?;
    assert_eq!(
        requests[0].uri,
        "http://mock.local:5984/music/_design%2Fartists"
    );
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn blank_id_expected_validation_error_without_request() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);

    let error = db
        .get::<Value>("  ", None)
        .await
        .expect_err("blank id should fail");
    assert!(error.is_validation());

    let error = db
        .delete(&DocumentHeader::new("doc", ""))
        .await
        .expect_err("blank rev should fail");
    assert!(error.is_validation());

    assert!(couch.requests()?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_flow_expected_independent_documents() -> SofaResult<()> {
    let couch = MockCouch::new();
    let db = client(&couch);
    let artist1 = Artist::new("flow-1", "First");
    let artist2 = Artist::new("flow-2", "Second");

    let (post1, post2) = tokio::join!(db.post(&artist1), db.post(&artist2));
    let (post1, post2) = (post1?, post2?);
    assert_eq!(post1.id, "flow-1");
    assert_eq!(post2.id, "flow-2");

    let (get1, get2) = tokio::join!(
        db.get::<Artist>(&post1.id, None),
        db.get::<Artist>(&post2.id, None)
    );
    let (get1, get2) = (get1?, get2?);
    assert_eq!(get1.rev, post1.rev);
    assert_eq!(get2.rev, post2.rev);

    let mut content1 = get1.content.expect("first content");
    let mut content2 = get2.content.expect("second content");
    content1.albums.push(Album {
        name: "Test".to_string(),
    });
    content2.albums.push(Album {
        name: "Test".to_string(),
    });

    let (put1, put2) = tokio::join!(db.put_entity(&content1), db.put_entity(&content2));
    let (put1, put2) = (put1?, put2?);
    assert!(put1.is_success() && put2.is_success());
    assert_eq!(generation(&put1.rev), 2);
    assert_eq!(generation(&put2.rev), 2);

    let stored1 = put1.content.expect("first put content");
    let stored2 = put2.content.expect("second put content");
    assert_eq!(stored1.albums.len(), 2);
    let (delete1, delete2) = tokio::join!(db.delete_entity(&stored1), db.delete_entity(&stored2));
    assert!(delete1?.is_success());
    assert!(delete2?.is_success());
    assert_eq!(couch.document_count()?, 0);
    Ok(())
}
