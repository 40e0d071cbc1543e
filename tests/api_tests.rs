use base64::prelude::*;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;
use tempfile::TempDir;

const BOUNDARY: &str = "----depot-test-boundary";

struct TestRocket {
    rocket: rocket::Rocket<rocket::Build>,
    _temp_dir: TempDir, // keep alive for cleanup
}

fn create_test_rocket() -> TestRocket {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let root = temp_dir.path();
    let config = depot::AppConfig {
        database_url: root.join("depot.db").to_string_lossy().into_owned(),
        data_dir: root.to_string_lossy().into_owned(),
        download_dir: root.join("downloads").to_string_lossy().into_owned(),
        tmp_dir: root.join("tmp").to_string_lossy().into_owned(),
        index_dir: root.join("index").to_string_lossy().into_owned(),
        ..depot::AppConfig::default()
    };
    let state = depot::build_state(config).expect("Failed to initialize state");

    let rocket = rocket::build()
        .manage(state)
        .attach(depot::RequestLogger)
        .mount("/", depot::routes::get_routes());

    TestRocket {
        rocket,
        _temp_dir: temp_dir,
    }
}

fn password_digest() -> String {
    BASE64_STANDARD.encode(b"client-side-digest")
}

fn register_user(client: &Client, username: &str) {
    let body = format!(
        "username={username}&password={}&salt=pepper&email={username}%40example.org",
        urlencoded(&password_digest())
    );
    let response = client
        .post("/users")
        .header(ContentType::Form)
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
}

fn urlencoded(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('+', "%2B")
        .replace('=', "%3D")
        .replace('/', "%2F")
}

fn basic_auth(username: &str) -> Header<'static> {
    let credentials = BASE64_STANDARD.encode(format!("{username}:{}", password_digest()));
    Header::new("Authorization", format!("Basic {credentials}"))
}

fn multipart_publish_body(descriptor: &str, archive: &[u8], force: bool) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"descriptor\"\r\n\r\n{descriptor}\r\n"
        )
        .as_bytes(),
    );
    if force {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"force\"\r\n\r\ntrue\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pkg\"; filename=\"upload.zip\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(archive);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn publish<'c>(
    client: &'c Client,
    username: &str,
    name: &str,
    version: &str,
    force: bool,
) -> rocket::local::blocking::LocalResponse<'c> {
    let descriptor = serde_json::json!({
        "name": name,
        "version": version,
        "description": "test package",
        "keywords": ["testing"],
        "contributors": ["alice <alice@example.org>"]
    })
    .to_string();
    client
        .post(format!("/packages/{name}/{version}"))
        .header(basic_auth(username))
        .header(
            ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY)),
        )
        .body(multipart_publish_body(&descriptor, b"zip archive bytes", force))
        .dispatch()
}

#[test]
fn test_catalog_is_empty_initially() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");

    let response = client.get("/packages").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let json: serde_json::Value = response.into_json().expect("valid JSON");
    assert_eq!(json.as_array().expect("array").len(), 0);
}

#[test]
fn test_publish_and_fetch_package() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");

    let response = publish(&client, "bob", "mylib", "1.0.0", false);
    assert_eq!(response.status(), Status::Ok);

    let response = client.get("/packages/mylib").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let json: serde_json::Value = response.into_json().expect("valid JSON");
    assert_eq!(json["name"], "mylib");
    assert_eq!(json["latest"], "1.0.0");
    assert_eq!(json["contributors"][0]["name"], "alice");
    assert_eq!(json["owners"][0]["name"], "bob");
    assert_eq!(json["filename"], "mylib-1.0.0.zip");

    let response = client.get("/packages/mylib/latest").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let json: serde_json::Value = response.into_json().expect("valid JSON");
    assert_eq!(json["version"], "1.0.0");

    let response = client.get("/packages/unknown").dispatch();
    assert_eq!(response.status(), Status::NotFound);
    let response = client.get("/packages/mylib/2.0.0").dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn test_publish_requires_credentials() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");

    let descriptor = serde_json::json!({
        "name": "mylib",
        "version": "1.0.0",
        "contributors": ["alice"]
    })
    .to_string();
    let response = client
        .post("/packages/mylib/1.0.0")
        .header(ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY)))
        .body(multipart_publish_body(&descriptor, b"bytes", false))
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);
}

#[test]
fn test_duplicate_publish_conflicts_unless_forced() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");

    assert_eq!(publish(&client, "bob", "mylib", "1.0.0", false).status(), Status::Ok);
    assert_eq!(
        publish(&client, "bob", "mylib", "1.0.0", false).status(),
        Status::BadRequest
    );
    assert_eq!(publish(&client, "bob", "mylib", "1.0.0", true).status(), Status::Ok);
}

#[test]
fn test_non_owner_publish_is_forbidden() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");
    register_user(&client, "eve");

    assert_eq!(publish(&client, "bob", "mylib", "1.0.0", false).status(), Status::Ok);
    assert_eq!(
        publish(&client, "eve", "mylib", "2.0.0", false).status(),
        Status::Forbidden
    );
}

#[test]
fn test_download_archive_roundtrip() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");
    publish(&client, "bob", "mylib", "1.0.0", false);

    let response = client.get("/download/mylib-1.0.0.zip").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_bytes().unwrap(), b"zip archive bytes".to_vec());

    let response = client.get("/download/mylib/latest").dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let response = client.get("/download/unknown-1.0.0.zip").dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn test_unpublish_version_and_package() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");
    publish(&client, "bob", "mylib", "1.0.0", false);
    publish(&client, "bob", "mylib", "2.0.0", false);

    // unauthenticated unpublish is rejected
    let response = client.delete("/packages/mylib/2.0.0").dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .delete("/packages/mylib/2.0.0")
        .header(basic_auth("bob"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let json: serde_json::Value = client
        .get("/packages/mylib")
        .dispatch()
        .into_json()
        .expect("valid JSON");
    assert_eq!(json["latest"], "1.0.0");

    // the removed version's archive is gone as well
    let response = client.get("/download/mylib-2.0.0.zip").dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let response = client
        .delete("/packages/mylib")
        .header(basic_auth("bob"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(client.get("/packages/mylib").dispatch().status(), Status::NotFound);
}

#[test]
fn test_owner_management_over_http() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");
    register_user(&client, "carol");
    publish(&client, "bob", "mylib", "1.0.0", false);

    let response = client
        .put("/owners/mylib/carol")
        .header(basic_auth("bob"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    // duplicate add conflicts
    let response = client
        .put("/owners/mylib/carol")
        .header(basic_auth("bob"))
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    // unknown user is a 404
    let response = client
        .put("/owners/mylib/nobody")
        .header(basic_auth("bob"))
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let response = client
        .delete("/owners/mylib/bob")
        .header(basic_auth("carol"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    // last owner cannot be removed
    let response = client
        .delete("/owners/mylib/carol")
        .header(basic_auth("carol"))
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn test_search_endpoint() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");
    publish(&client, "bob", "websocket-client", "1.0.0", false);
    publish(&client, "bob", "http-parser", "1.0.0", false);

    let response = client.get("/search?q=websocket").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let json: serde_json::Value = response.into_json().expect("valid JSON");
    assert_eq!(json["total"], 1);
    assert_eq!(json["hits"][0]["name"], "websocket-client");

    // empty query lists the catalog
    let response = client.get("/search").dispatch();
    let json: serde_json::Value = response.into_json().expect("valid JSON");
    assert_eq!(json["total"], 2);
    assert_eq!(json["length"], 2);
}

#[test]
fn test_updates_endpoint() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");

    // no header at all means nothing to report
    let response = client.get("/updates").dispatch();
    assert_eq!(response.status(), Status::NotModified);

    publish(&client, "bob", "mylib", "1.0.0", false);

    let response = client
        .get("/updates")
        .header(Header::new("If-Modified-Since", "Thu, 01 Jan 1970 00:00:00 GMT"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let json: serde_json::Value = response.into_json().expect("valid JSON");
    assert_eq!(json["updated"][0]["name"], "mylib");

    let response = client
        .get("/updates")
        .header(Header::new("If-Modified-Since", "not a date"))
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn test_user_registration_and_salt() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");

    let response = client.get("/users/bob").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let response = client.get("/users/unknown").dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let response = client.get("/users/bob/salt").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let salt: String = response.into_json().expect("valid JSON");
    assert_eq!(salt, "pepper");

    // duplicate username is rejected
    let body = format!(
        "username=bob&password={}&salt=pepper&email=other%40example.org",
        urlencoded(&password_digest())
    );
    let response = client
        .post("/users")
        .header(ContentType::Form)
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn test_malformed_descriptor_is_rejected() {
    let test = create_test_rocket();
    let client = Client::tracked(test.rocket).expect("valid rocket instance");
    register_user(&client, "bob");

    // version in the descriptor is not a semantic version
    let descriptor = serde_json::json!({
        "name": "mylib",
        "version": "not.a.version",
        "contributors": ["alice"]
    })
    .to_string();
    let response = client
        .post("/packages/mylib/not.a.version")
        .header(basic_auth("bob"))
        .header(ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY)))
        .body(multipart_publish_body(&descriptor, b"bytes", false))
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    // descriptor without a responsible party
    let descriptor = serde_json::json!({
        "name": "mylib",
        "version": "1.0.0"
    })
    .to_string();
    let response = client
        .post("/packages/mylib/1.0.0")
        .header(basic_auth("bob"))
        .header(ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY)))
        .body(multipart_publish_body(&descriptor, b"bytes", false))
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}
