mod common;

use axum::http::StatusCode;
use carbook::{config::Environment, users::Role};
use common::TestApp;
use serde_json::{json, Value};

async fn create_car(app: &TestApp, token: &str, number: &str, governorate: &str) -> Value {
    let reply = app
        .send(
            "POST",
            "/api/v1/cars",
            Some(token),
            Some(json!({ "number": number, "letters": "ABC", "governorate": governorate })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    reply.body["data"]["car"].clone()
}

#[tokio::test]
async fn test_admin_creates_car() {
    let app = TestApp::new();
    let (_, token) = app.create_user(Role::Admin).await;

    let reply = app
        .send(
            "POST",
            "/api/v1/cars",
            Some(&token),
            Some(json!({ "number": "123", "letters": " ABC ", "governorate": "Cairo" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["status"], "success");
    let car = &reply.body["data"]["car"];
    assert_eq!(car["number"], "123");
    assert_eq!(car["letters"], "ABC");
    assert_eq!(car["governorate"], "Cairo");
    assert!(car["id"].is_string());
}

#[tokio::test]
async fn test_create_car_without_letters_fails() {
    let app = TestApp::new();
    let (_, token) = app.create_user(Role::Admin).await;

    let reply = app
        .send(
            "POST",
            "/api/v1/cars",
            Some(&token),
            Some(json!({ "number": "123", "governorate": "Cairo" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "من فضلك ادخل حروف السيارة");
}

#[tokio::test]
async fn test_cars_are_admin_only() {
    let app = TestApp::new();
    let (_, token) = app.create_user(Role::User).await;

    let reply = app.send("GET", "/api/v1/cars", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .send(
            "GET",
            "/api/v1/cars/search?governorate=Cairo",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app.send("DELETE", "/api/v1/cars/delete-all", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_search_matches_exact_fields() {
    let app = TestApp::new();
    let (_, token) = app.create_user(Role::Admin).await;
    create_car(&app, &token, "111", "Cairo").await;
    create_car(&app, &token, "222", "Giza").await;
    create_car(&app, &token, "333", "Cairo").await;

    let reply = app
        .send(
            "GET",
            "/api/v1/cars/search?governorate=Cairo",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["results"], 2);
    let cars = reply.body["data"]["cars"].as_array().unwrap();
    assert!(cars.iter().all(|c| c["governorate"] == "Cairo"));

    let reply = app
        .send(
            "GET",
            "/api/v1/cars/search?governorate=Cairo&number=333",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(reply.body["results"], 1);
    assert_eq!(reply.body["data"]["cars"][0]["number"], "333");
}

#[tokio::test]
async fn test_listing_supports_query_convention() {
    let app = TestApp::new();
    let (_, token) = app.create_user(Role::Admin).await;
    for (number, governorate) in [("5", "Cairo"), ("40", "Giza"), ("300", "Aswan")] {
        create_car(&app, &token, number, governorate).await;
    }

    let reply = app
        .send(
            "GET",
            "/api/v1/cars?governorate%5Bgte%5D=B&sort=-governorate",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["results"], 2);
    assert_eq!(reply.body["data"]["cars"][0]["governorate"], "Giza");
    assert_eq!(reply.body["data"]["cars"][1]["governorate"], "Cairo");

    let reply = app
        .send(
            "GET",
            "/api/v1/cars?sort=governorate&page=2&limit=1&fields=governorate",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(reply.body["results"], 1);
    let car = &reply.body["data"]["cars"][0];
    assert_eq!(car["governorate"], "Cairo");
    assert!(car.get("number").is_none());
}

#[tokio::test]
async fn test_update_and_delete_car() {
    let app = TestApp::new();
    let (_, token) = app.create_user(Role::Admin).await;
    let car = create_car(&app, &token, "123", "Cairo").await;
    let uri = format!("/api/v1/cars/{}", car["id"].as_str().unwrap());

    let invalid = app
        .send(
            "PATCH",
            &uri,
            Some(&token),
            Some(json!({ "number": "123", "letters": "ABC" })),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body["message"], "من فضلك ادخل اسم المحافظة");

    let updated = app
        .send(
            "PATCH",
            &uri,
            Some(&token),
            Some(json!({ "number": "124", "letters": "XYZ", "governorate": "Luxor" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["car"]["governorate"], "Luxor");

    let fetched = app.send("GET", &uri, Some(&token), None).await;
    assert_eq!(fetched.body["data"]["car"]["number"], "124");

    let deleted = app.send("DELETE", &uri, Some(&token), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let missing = app.send("GET", &uri, Some(&token), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["message"], "No car found with that ID");
}

#[tokio::test]
async fn test_delete_all_cars() {
    let app = TestApp::new();
    let (_, token) = app.create_user(Role::Admin).await;
    create_car(&app, &token, "1", "Cairo").await;
    create_car(&app, &token, "2", "Giza").await;

    let reply = app
        .send("DELETE", "/api/v1/cars/delete-all", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let listing = app.send("GET", "/api/v1/cars", Some(&token), None).await;
    assert_eq!(listing.body["results"], 0);
    assert_eq!(listing.body["data"]["cars"], json!([]));
}

#[tokio::test]
async fn test_malformed_query_and_path_keep_error_envelope() {
    let app = TestApp::new();
    let (_, token) = app.create_user(Role::Admin).await;

    let reply = app
        .send(
            "GET",
            "/api/v1/cars/search?number=1&number=2",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.headers["content-type"], "application/json");
    assert_eq!(reply.body["status"], "error");
    assert!(reply.body["message"]
        .as_str()
        .unwrap()
        .contains("duplicate field"));

    let reply = app.send("GET", "/api/v1/cars/%FF", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.headers["content-type"], "application/json");
    assert_eq!(reply.body["status"], "error");
    assert!(reply.body["message"].is_string());
}

#[tokio::test]
async fn test_unsupported_method_on_known_path_is_not_found() {
    let app = TestApp::with_environment(Environment::Development);
    let (_, token) = app.create_user(Role::Admin).await;

    let reply = app.send("PUT", "/api/v1/cars", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(
        reply.body["message"],
        "Can't find /api/v1/cars on this server!"
    );
    assert_eq!(reply.body["error"]["kind"], "NotFound");
}
