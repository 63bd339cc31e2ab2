mod common;

use axum::http::{header, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use secrets_api::api::create_router;
use secrets_api::store::{MemoryStore, SecretStore};

const ALL: &[&str] = &["read:secrets", "write:secrets", "delete:secrets", "decrypt:secrets"];

#[tokio::test]
async fn test_public_health_needs_no_token() {
    for method in ["GET", "POST", "DELETE"] {
        let response = test_router()
            .oneshot(request(method, "/api/health/public", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let obj = body.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj["status"].is_string());
    }
}

#[tokio::test]
async fn test_admin_health_requires_read_scope() {
    let response = test_router()
        .oneshot(request("GET", "/api/health/admin", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = valid_token(&["write:secrets"]);
    let response = test_router()
        .oneshot(request("GET", "/api/health/admin", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = valid_token(&["read:secrets"]);
    let response = test_router()
        .oneshot(request("GET", "/api/health/admin", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["status"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let response = test_router()
        .oneshot(request("GET", "/api/nope", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "message": "Not Found" }));
}

#[tokio::test]
async fn test_security_headers_present() {
    let response = test_router()
        .oneshot(request("GET", "/api/health/public", None, None))
        .await
        .unwrap();
    let headers = response.headers();
    assert!(headers[header::CACHE_CONTROL].to_str().unwrap().contains("no-store"));
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(
        headers[header::CONTENT_SECURITY_POLICY],
        "default-src 'none'; frame-ancestors 'none'"
    );
    assert!(headers[header::STRICT_TRANSPORT_SECURITY]
        .to_str()
        .unwrap()
        .starts_with("max-age=31536000"));
}

#[tokio::test]
async fn test_missing_token_is_401_not_403() {
    let routes = [
        ("GET", "/api/secrets"),
        ("POST", "/api/secrets"),
        ("GET", "/api/secrets/abc"),
        ("PUT", "/api/secrets/abc"),
        ("DELETE", "/api/secrets/abc"),
        ("GET", "/api/secrets/abc/decrypted"),
    ];
    for (method, uri) in routes {
        let response = test_router().oneshot(request(method, uri, None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
}

#[tokio::test]
async fn test_unauthenticated_create_with_bad_body_is_still_401() {
    let response = test_router()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/secrets")
                .header(header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_and_wrong_audience_are_401() {
    let expired = sign_with(
        SIGNING_KEY_PEM,
        Some(TEST_KID),
        &claims(ISSUER, AUDIENCE, -3600, ALL),
    );
    let wrong_aud = sign_with(
        SIGNING_KEY_PEM,
        Some(TEST_KID),
        &claims(ISSUER, "https://other.api", 3600, ALL),
    );
    let forged = sign_with(ROGUE_KEY_PEM, Some(TEST_KID), &claims(ISSUER, AUDIENCE, 3600, ALL));

    for token in [expired, wrong_aud, forged, "not.a.jwt".to_string()] {
        let response = test_router()
            .oneshot(request("GET", "/api/secrets", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_scope_matrix() {
    // read-only token: can list and get, cannot write, delete or decrypt
    let token = valid_token(&["read:secrets"]);
    let cases = [
        ("GET", "/api/secrets", None, StatusCode::OK),
        ("GET", "/api/secrets/missing", None, StatusCode::NOT_FOUND),
        (
            "POST",
            "/api/secrets",
            Some(json!({ "name": "n", "secretValue": "v" })),
            StatusCode::FORBIDDEN,
        ),
        ("DELETE", "/api/secrets/missing", None, StatusCode::FORBIDDEN),
        ("GET", "/api/secrets/missing/decrypted", None, StatusCode::FORBIDDEN),
    ];
    for (method, uri, body, expected) in cases {
        let response = test_router()
            .oneshot(request(method, uri, Some(&token), body))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_scope_claim_string_is_honoured() {
    let mut c = claims(ISSUER, AUDIENCE, 3600, &[]);
    c["scope"] = json!("openid read:secrets");
    let token = sign_with(SIGNING_KEY_PEM, Some(TEST_KID), &c);

    let response = test_router()
        .oneshot(request("GET", "/api/secrets", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_secret_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let app = create_router(Arc::new(test_state(store.clone())));
    let token = valid_token(ALL);

    // create
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/secrets",
            Some(&token),
            Some(json!({ "name": "Test Secret", "description": "d", "secretValue": "v" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Test Secret");
    assert!(created.get("encryptedValue").is_none());
    assert!(created.get("iv").is_none());

    // stored value is ciphertext
    let raw = store.find_by_id(&id).await.unwrap().unwrap();
    assert_ne!(raw.encrypted_value, "v");

    // list
    let response = app
        .clone()
        .oneshot(request("GET", "/api/secrets", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert!(list[0].get("encryptedValue").is_none());

    // decrypt
    let response = app
        .clone()
        .oneshot(request("GET", &format!("/api/secrets/{id}/decrypted"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "decryptedValue": "v" }));

    // update metadata only keeps the value
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/secrets/{id}"),
            Some(&token),
            Some(json!({ "name": "Renamed" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Renamed");
    assert_eq!(store.find_by_id(&id).await.unwrap().unwrap().iv, raw.iv);

    // update with a new value re-encrypts
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/secrets/{id}"),
            Some(&token),
            Some(json!({ "name": "Renamed", "secretValue": "w" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = store.find_by_id(&id).await.unwrap().unwrap();
    assert_ne!(rotated.iv, raw.iv);
    assert_ne!(rotated.encrypted_value, "w");

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/api/secrets/{id}/decrypted"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["decryptedValue"], "w");

    // delete, then delete again
    let response = app
        .clone()
        .oneshot(request("DELETE", &format!("/api/secrets/{id}"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "message": "Secret deleted" }));

    let response = app
        .clone()
        .oneshot(request("DELETE", &format!("/api/secrets/{id}"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(request("GET", &format!("/api/secrets/{id}"), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_validation_is_400() {
    let token = valid_token(&["write:secrets"]);
    let bodies = [
        json!({ "name": "only-name" }),
        json!({ "secretValue": "only-value" }),
        json!({ "name": "", "secretValue": "v" }),
        json!({ "name": "n", "secretValue": "" }),
    ];
    for body in bodies {
        let response = test_router()
            .oneshot(request("POST", "/api/secrets", Some(&token), Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(
            body_json(response).await["message"],
            "Name and secret value are required"
        );
    }

    let response = test_router()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/secrets")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_missing_is_404() {
    let token = valid_token(&["write:secrets"]);
    let response = test_router()
        .oneshot(request(
            "PUT",
            "/api/secrets/does-not-exist",
            Some(&token),
            Some(json!({ "name": "x", "secretValue": "y" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Secret not found");
}

#[tokio::test]
async fn test_corrupt_record_decrypt_is_500() {
    let store = Arc::new(MemoryStore::new());
    let app = create_router(Arc::new(test_state(store.clone())));
    let token = valid_token(ALL);

    // written under a different key
    let other = secrets_api::secrets::SecretService::new(
        store.clone(),
        secrets_api::security::codec::SecretCodec::new(
            secrets_api::security::codec::EncryptionKey::from_bytes(&[7u8; 32]).unwrap(),
        ),
        std::time::Duration::from_secs(5),
    );
    let created = other
        .create(secrets_api::secrets::CreateSecret {
            name: "foreign".into(),
            description: None,
            value: "x".repeat(40),
        })
        .await
        .unwrap();

    // truncate the ciphertext to a non-block length so decryption cannot succeed
    let mut record = store.find_by_id(&created.id).await.unwrap().unwrap();
    record.encrypted_value.truncate(30);
    store
        .update(
            &created.id,
            secrets_api::secrets::model::SecretChanges {
                name: record.name.clone(),
                description: None,
                value: Some(secrets_api::security::codec::EncryptedValue {
                    iv: record.iv.clone(),
                    ciphertext: record.encrypted_value.clone(),
                }),
            },
        )
        .await
        .unwrap();

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/secrets/{}/decrypted", created.id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["message"], "Error decrypting secret");
}

#[tokio::test]
async fn test_cors_preflight_when_origin_configured() {
    let state = test_state(Arc::new(MemoryStore::new()))
        .with_cors_origin(axum::http::HeaderValue::from_static("http://localhost:4040"));
    let app = create_router(Arc::new(state));

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("OPTIONS")
                .uri("/api/secrets")
                .header(header::ORIGIN, "http://localhost:4040")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:4040"
    );
    assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
}

#[tokio::test]
async fn test_cors_preflight_carries_hardening_headers() {
    let state = test_state(Arc::new(MemoryStore::new()))
        .with_cors_origin(axum::http::HeaderValue::from_static("http://localhost:4040"));
    let app = create_router(Arc::new(state));

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("OPTIONS")
                .uri("/api/secrets/abc/decrypted")
                .header(header::ORIGIN, "http://localhost:4040")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:4040");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert!(headers[header::CACHE_CONTROL].to_str().unwrap().contains("no-store"));
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
}
