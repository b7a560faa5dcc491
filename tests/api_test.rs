mod common;

use common::{json_body, TestServer};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn health_needs_no_key() {
    let server = TestServer::start().await;
    let response = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn register_login_and_logout() {
    let server = TestServer::start().await;
    let (user_id, first_key) = server.register("Alice").await;

    let me = json_body(server.get(&first_key, "/me").await).await;
    assert_eq!(me["id"], user_id.as_str());
    assert_eq!(me["username"], "alice");
    assert!(me["room_id"].is_null());
    assert!(me.get("password_hash").is_none());

    let login = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
    let second_key = json_body(login).await["api_key"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(first_key, second_key);

    let logout = server.post(&first_key, "/auth/logout", json!({})).await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        server.get(&first_key, "/me").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(server.get(&second_key, "/me").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let server = TestServer::start().await;
    server.register("alice").await;

    let response = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "unauthorized");

    let response = server.client.get(server.url("/me")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        server.get("not-a-real-key", "/rooms/me").await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn registration_is_validated() {
    let server = TestServer::start().await;
    server.register("alice").await;

    let duplicate = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "username": "ALICE", "password": "password123", "name": "A" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let short = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "username": "bob", "password": "short", "name": "Bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(short.status(), StatusCode::BAD_REQUEST);

    let malformed = server
        .client
        .post(server.url("/auth/register"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(malformed).await["error"].is_string());
}

#[tokio::test]
async fn two_users_share_a_room() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let (_, u2) = server.register("bob").await;
    let (_, u3) = server.register("carol").await;

    let created = server.post(&u1, "/rooms", json!({})).await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let room = json_body(created).await;
    assert_eq!(room["display_name"], "My Room");

    let share = json_body(server.post(&u1, "/rooms/share", json!({})).await).await;
    let token = share["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 5);

    let view = json_body(server.get(&u1, "/rooms/me").await).await;
    assert_eq!(view["has_share_token"], true);
    assert!(!view.to_string().contains(&token));

    let joined = server
        .post(&u2, "/rooms/join", json!({ "token": token.to_lowercase() }))
        .await;
    assert_eq!(joined.status(), StatusCode::OK);

    let a = json_body(server.get(&u1, "/rooms/me").await).await;
    let b = json_body(server.get(&u2, "/rooms/me").await).await;
    assert_eq!(a["room_id"], b["room_id"]);
    assert_eq!(a["members"].as_array().unwrap().len(), 2);
    assert_eq!(b["member_count"], 2);

    let third = server
        .post(&u3, "/rooms/join", json!({ "token": token }))
        .await;
    assert!(matches!(
        third.status(),
        StatusCode::CONFLICT | StatusCode::FORBIDDEN
    ));

    let rotate = server.post(&u1, "/rooms/share", json!({})).await;
    assert_eq!(rotate.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn join_rejects_malformed_and_unknown_tokens() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;

    let malformed = server
        .post(&u1, "/rooms/join", json!({ "token": "IO01L" }))
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let unknown = server
        .post(&u1, "/rooms/join", json!({ "token": "ABCDE" }))
        .await;
    assert_eq!(unknown.status(), StatusCode::FORBIDDEN);

    assert_eq!(
        server.get(&u1, "/rooms/me").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn room_settings_update_and_clear() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    server.post(&u1, "/rooms", json!({})).await;

    let updated = json_body(
        server
            .put(
                &u1,
                "/rooms/settings",
                json!({ "display_name": "Flat 4", "description": "Top floor" }),
            )
            .await,
    )
    .await;
    assert_eq!(updated["display_name"], "Flat 4");
    assert_eq!(updated["description"], "Top floor");

    let cleared = json_body(
        server
            .put(&u1, "/rooms/settings", json!({ "description": null }))
            .await,
    )
    .await;
    assert_eq!(cleared["display_name"], "Flat 4");
    assert!(cleared["description"].is_null());

    let invalid = server
        .put(&u1, "/rooms/settings", json!({ "display_name": "Flat #4" }))
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unanimous_vote_deletes_list() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let (_, u2) = server.register("bob").await;
    let room_id = server.shared_room(&u1, &u2).await;

    let lists = format!("/rooms/{}/lists", room_id);
    let list = json_body(
        server
            .post(&u1, &lists, json!({ "name": "Groceries", "icon": "APPLE" }))
            .await,
    )
    .await;
    let list_id = list["id"].as_str().unwrap();
    let vote = format!("{}/{}/deletion/vote", lists, list_id);

    let first = json_body(server.post(&u1, &vote, json!({})).await).await;
    assert_eq!(first["deleted"], false);

    let pending = json_body(server.get(&u2, &lists).await).await;
    assert_eq!(pending[0]["pending_deletion"], true);
    assert_eq!(pending[0]["my_deletion_vote"], false);

    let second = json_body(server.post(&u2, &vote, json!({})).await).await;
    assert_eq!(second["deleted"], true);

    let remaining = json_body(server.get(&u1, &lists).await).await;
    assert_eq!(remaining.as_array().unwrap().len(), 0);

    let items = server
        .get(&u1, &format!("{}/{}/items", lists, list_id))
        .await;
    assert_eq!(items.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn room_vote_can_be_cancelled() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let (_, u2) = server.register("bob").await;
    server.shared_room(&u1, &u2).await;

    let first = json_body(server.post(&u1, "/rooms/deletion/vote", json!({})).await).await;
    assert_eq!(first["deleted"], false);
    assert_eq!(first["state"], "pending_deletion");

    let cancel = server.post(&u1, "/rooms/deletion/cancel", json!({})).await;
    assert_eq!(cancel.status(), StatusCode::NO_CONTENT);

    let second = json_body(server.post(&u2, "/rooms/deletion/vote", json!({})).await).await;
    assert_eq!(second["deleted"], false);

    let last = json_body(server.post(&u1, "/rooms/deletion/vote", json!({})).await).await;
    assert_eq!(last["deleted"], true);
    assert_eq!(
        server.get(&u1, "/rooms/me").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn items_round_trip_through_completion() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let room = json_body(server.post(&u1, "/rooms", json!({})).await).await;
    let room_id = room["room_id"].as_str().unwrap();

    let list = json_body(
        server
            .post(&u1, &format!("/rooms/{}/lists", room_id), json!({ "name": "Shop" }))
            .await,
    )
    .await;
    let items = format!("/rooms/{}/lists/{}/items", room_id, list["id"].as_str().unwrap());

    let created = server
        .post(
            &u1,
            &items,
            json!({ "description": "Milk", "quantity": "2", "unit": "l" }),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let milk = json_body(created).await;
    let milk_path = format!("{}/{}", items, milk["id"].as_str().unwrap());

    let open = json_body(server.get(&u1, &items).await).await;
    assert_eq!(open.as_array().unwrap().len(), 1);

    let done = json_body(server.patch(&u1, &milk_path, json!({ "completed": true })).await).await;
    assert_eq!(done["completed"], true);
    assert_eq!(done["order"], milk["order"]);
    assert_eq!(done["quantity"], "2");

    let open = json_body(server.get(&u1, &items).await).await;
    assert!(open.as_array().unwrap().is_empty());

    let all = json_body(
        server
            .get(&u1, &format!("{}?include_completed=true", items))
            .await,
    )
    .await;
    assert_eq!(all[0]["id"], milk["id"]);

    let cleared = json_body(server.post(&u1, &format!("{}/clear", items), json!({})).await).await;
    assert_eq!(cleared["cleared"], 1);

    let gone = server.delete(&u1, &milk_path, json!({})).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_patch_distinguishes_clear_from_absent() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let room = json_body(server.post(&u1, "/rooms", json!({})).await).await;
    let room_id = room["room_id"].as_str().unwrap();
    let list = json_body(
        server
            .post(&u1, &format!("/rooms/{}/lists", room_id), json!({ "name": "Shop" }))
            .await,
    )
    .await;
    let items = format!("/rooms/{}/lists/{}/items", room_id, list["id"].as_str().unwrap());
    let eggs = json_body(
        server
            .post(
                &u1,
                &items,
                json!({ "description": "Eggs", "quantity": "12", "unit": "pcs" }),
            )
            .await,
    )
    .await;
    let path = format!("{}/{}", items, eggs["id"].as_str().unwrap());

    assert_eq!(eggs["starred"], false);

    let updated = json_body(server.patch(&u1, &path, json!({ "quantity": null })).await).await;
    assert!(updated["quantity"].is_null());
    assert_eq!(updated["unit"], "pcs");

    let starred = json_body(server.patch(&u1, &path, json!({ "starred": true })).await).await;
    assert_eq!(starred["starred"], true);
    assert_eq!(starred["order"], eggs["order"]);

    let empty = server.patch(&u1, &path, json!({})).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let deleted = server.delete(&u1, &path, json!({})).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn reorder_moves_item_between_neighbours() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let room = json_body(server.post(&u1, "/rooms", json!({})).await).await;
    let room_id = room["room_id"].as_str().unwrap();
    let list = json_body(
        server
            .post(&u1, &format!("/rooms/{}/lists", room_id), json!({ "name": "Shop" }))
            .await,
    )
    .await;
    let items = format!("/rooms/{}/lists/{}/items", room_id, list["id"].as_str().unwrap());

    let mut ids = Vec::new();
    for description in ["A", "B", "C"] {
        let item = json_body(
            server
                .post(&u1, &items, json!({ "description": description }))
                .await,
        )
        .await;
        ids.push(item["id"].as_str().unwrap().to_string());
    }

    let moved = server
        .post(
            &u1,
            &format!("{}/{}/reorder", items, ids[0]),
            json!({ "prev_id": ids[1], "next_id": ids[2] }),
        )
        .await;
    assert_eq!(moved.status(), StatusCode::OK);

    let order: Vec<String> = json_body(server.get(&u1, &items).await)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["description"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(order, vec!["B", "A", "C"]);

    let stale = server
        .post(
            &u1,
            &format!("{}/{}/reorder", items, ids[0]),
            json!({ "prev_id": ids[2], "next_id": ids[1] }),
        )
        .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_update_clears_notes_and_icon() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let room = json_body(server.post(&u1, "/rooms", json!({})).await).await;
    let lists = format!("/rooms/{}/lists", room["room_id"].as_str().unwrap());
    let list = json_body(
        server
            .post(&u1, &lists, json!({ "name": "Trip", "icon": "PLANE" }))
            .await,
    )
    .await;
    let path = format!("{}/{}", lists, list["id"].as_str().unwrap());

    let noted = json_body(server.put(&u1, &path, json!({ "notes": "passports" })).await).await;
    assert_eq!(noted["notes"], "passports");
    assert_eq!(noted["icon"], "PLANE");

    let cleared = json_body(
        server
            .put(&u1, &path, json!({ "notes": "", "icon": null }))
            .await,
    )
    .await;
    assert!(cleared["notes"].is_null());
    assert!(cleared["icon"].is_null());
    assert_eq!(cleared["name"], "Trip");

    let bad_icon = server.put(&u1, &path, json!({ "icon": "ROCKET" })).await;
    assert_eq!(bad_icon.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_households_are_invisible() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let (_, u2) = server.register("bob").await;

    let r1 = json_body(server.post(&u1, "/rooms", json!({})).await).await;
    let r2 = json_body(server.post(&u2, "/rooms", json!({})).await).await;
    let r1_id = r1["room_id"].as_str().unwrap();
    let r2_id = r2["room_id"].as_str().unwrap();

    let list = json_body(
        server
            .post(&u1, &format!("/rooms/{}/lists", r1_id), json!({ "name": "Private" }))
            .await,
    )
    .await;
    let list_id = list["id"].as_str().unwrap();

    let foreign_room = server.get(&u2, &format!("/rooms/{}/lists", r1_id)).await;
    assert_eq!(foreign_room.status(), StatusCode::FORBIDDEN);

    let missing_room = server.get(&u2, "/rooms/does-not-exist/lists").await;
    assert_eq!(missing_room.status(), StatusCode::FORBIDDEN);

    let foreign_list = server
        .get(&u2, &format!("/rooms/{}/lists/{}/items", r2_id, list_id))
        .await;
    assert_eq!(foreign_list.status(), StatusCode::NOT_FOUND);

    let foreign_vote = server
        .post(
            &u2,
            &format!("/rooms/{}/lists/{}/deletion/vote", r1_id, list_id),
            json!({}),
        )
        .await;
    assert_eq!(foreign_vote.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn password_change_replaces_every_key() {
    let server = TestServer::start().await;
    let (_, key) = server.register("alice").await;

    let wrong = server
        .put(
            &key,
            "/me/password",
            json!({ "current_password": "nope-nope", "new_password": "newpassword1" }),
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    let changed = server
        .put(
            &key,
            "/me/password",
            json!({ "current_password": "password123", "new_password": "newpassword1" }),
        )
        .await;
    assert_eq!(changed.status(), StatusCode::OK);
    let new_key = json_body(changed).await["api_key"]
        .as_str()
        .unwrap()
        .to_string();

    assert_eq!(server.get(&key, "/me").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(server.get(&new_key, "/me").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn profile_update_changes_name() {
    let server = TestServer::start().await;
    let (_, key) = server.register("alice").await;
    server.register("bob").await;

    let updated = json_body(server.put(&key, "/me", json!({ "name": "Ally" })).await).await;
    assert_eq!(updated["name"], "Ally");
    assert_eq!(updated["username"], "alice");

    let taken = server.put(&key, "/me", json!({ "username": "bob" })).await;
    assert_eq!(taken.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn account_deletion_leaves_partner_in_room() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    let (_, u2) = server.register("bob").await;
    let room_id = server.shared_room(&u1, &u2).await;

    server.post(&u2, "/rooms/deletion/vote", json!({})).await;

    let unconfirmed = server.delete(&u2, "/me", json!({})).await;
    assert_eq!(unconfirmed.status(), StatusCode::BAD_REQUEST);

    let deleted = server.delete(&u2, "/me", json!({ "confirm": "DELETE" })).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.get(&u2, "/me").await.status(), StatusCode::UNAUTHORIZED);

    let view = json_body(server.get(&u1, "/rooms/me").await).await;
    assert_eq!(view["room_id"], room_id.as_str());
    assert_eq!(view["member_count"], 1);
    assert_eq!(view["deletion_votes"], 0);
}

#[tokio::test]
async fn leaving_last_deletes_room() {
    let server = TestServer::start().await;
    let (_, u1) = server.register("alice").await;
    server.post(&u1, "/rooms", json!({})).await;

    let left = json_body(server.post(&u1, "/rooms/leave", json!({})).await).await;
    assert_eq!(left["room_deleted"], true);

    let again = server.post(&u1, "/rooms/leave", json!({})).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let recreated = server.post(&u1, "/rooms", json!({})).await;
    assert_eq!(recreated.status(), StatusCode::CREATED);
}
