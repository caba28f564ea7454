use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use geo_cms::{
    AppState, InMemoryRepository, NoopCache,
    auth::{AuthUser, hash_password},
    config::AppConfig,
    error::ApiError,
    geo::UserCountry,
    handlers::{admin, auth, public},
    models::{
        ContentType, CreateCategoryRequest, CreateDomainRequest, CreatePageRequest,
        CreateTableRequest, DataMode, LoginRequest, NewUser, PageType, SectionInput, TableColumn,
        TableDataRequest, UpdateDomainRequest, UpdatePageRequest, UpdateSectionsRequest,
        UpdateUserRequest, UpsertRichTextRequest,
    },
    repository::Repository,
};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Utilities ---

fn app_state() -> AppState {
    AppState {
        repo: Arc::new(InMemoryRepository::new()),
        cache: Arc::new(NoopCache),
        config: AppConfig::default(),
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn uuid_at(value: &Value, pointer: &str) -> Uuid {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .unwrap()
}

async fn create_domain(state: &AppState, slug: &str, page_type: PageType, countries: Option<Vec<&str>>) -> Uuid {
    let (status, envelope) = admin::create_domain(
        State(state.clone()),
        Json(CreateDomainRequest {
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            page_type,
            is_published: Some(true),
            target_countries: countries.map(|c| c.into_iter().map(str::to_string).collect()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    uuid_at(&body_json(envelope.into_response()).await, "/domain/id")
}

async fn create_page(state: &AppState, domain_id: Uuid, parent_id: Option<Uuid>, slug: &str) -> Uuid {
    let (_, envelope) = admin::create_page(
        State(state.clone()),
        Json(CreatePageRequest {
            domain_id,
            parent_id,
            title: slug.to_string(),
            slug: slug.to_string(),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    uuid_at(&body_json(envelope.into_response()).await, "/page/id")
}

fn admin_user() -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        email: "admin@example.com".to_string(),
        is_admin: true,
    }
}

// --- Categories & Domains ---

#[tokio::test]
async fn test_category_with_domains_cannot_be_deleted() {
    let state = app_state();
    let (_, envelope) = admin::create_category(
        State(state.clone()),
        Json(CreateCategoryRequest {
            name: "Finance".into(),
            slug: "finance".into(),
            column_position: 1,
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let category_id = uuid_at(&body_json(envelope.into_response()).await, "/category/id");

    admin::create_domain(
        State(state.clone()),
        Json(CreateDomainRequest {
            name: "Taxes".into(),
            slug: "taxes".into(),
            category_id: Some(category_id),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    let result = admin::delete_category(State(state.clone()), Path(category_id)).await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));
}

#[tokio::test]
async fn test_domain_with_unknown_category_is_not_found() {
    let state = app_state();
    let result = admin::create_domain(
        State(state),
        Json(CreateDomainRequest {
            name: "Taxes".into(),
            slug: "taxes".into(),
            category_id: Some(Uuid::new_v4()),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_domain_category_can_be_cleared() {
    let state = app_state();
    let (_, envelope) = admin::create_category(
        State(state.clone()),
        Json(CreateCategoryRequest {
            name: "Finance".into(),
            slug: "finance".into(),
            column_position: 2,
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let category_id = uuid_at(&body_json(envelope.into_response()).await, "/category/id");

    let (_, envelope) = admin::create_domain(
        State(state.clone()),
        Json(CreateDomainRequest {
            name: "Taxes".into(),
            slug: "taxes".into(),
            category_id: Some(category_id),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let domain_id = uuid_at(&body_json(envelope.into_response()).await, "/domain/id");

    let combined = admin::update_domain(
        State(state.clone()),
        Path(domain_id),
        Json(UpdateDomainRequest {
            category_id: Some(category_id),
            clear_category: Some(true),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(combined, Err(ApiError::Validation(_))));

    let envelope = admin::update_domain(
        State(state.clone()),
        Path(domain_id),
        Json(UpdateDomainRequest {
            clear_category: Some(true),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let body = body_json(envelope.into_response()).await;
    assert!(body["domain"]["categoryId"].is_null());

    // The category is no longer in use.
    admin::delete_category(State(state.clone()), Path(category_id))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_domain_slug_is_unique() {
    let state = app_state();
    create_domain(&state, "taxes", PageType::Direct, None).await;
    let result = admin::create_domain(
        State(state),
        Json(CreateDomainRequest {
            name: "Again".into(),
            slug: "taxes".into(),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));
}

#[tokio::test]
async fn test_domain_targets_are_normalized() {
    let state = app_state();
    let id = create_domain(&state, "visas", PageType::Direct, Some(vec!["in", "IN", "us"])).await;
    let domain = state.repo.get_domain(id).await.unwrap().unwrap();
    assert_eq!(domain.target_countries, vec!["IN", "US"]);

    let id = create_domain(&state, "loans", PageType::Direct, Some(vec![])).await;
    let domain = state.repo.get_domain(id).await.unwrap().unwrap();
    assert_eq!(domain.target_countries, vec!["ALL"]);
}

// --- Pages ---

#[tokio::test]
async fn test_direct_domain_pages_attach_to_main() {
    let state = app_state();
    let domain_id = create_domain(&state, "taxes", PageType::Direct, None).await;
    let page_id = create_page(&state, domain_id, None, "income").await;

    let page = state.repo.get_page(page_id).await.unwrap().unwrap();
    let main = state.repo.find_main_page(domain_id).await.unwrap().unwrap();
    assert_eq!(page.parent_id, Some(main.id));
    assert_eq!(main.content_type, ContentType::SectionBased);
}

#[tokio::test]
async fn test_main_page_cannot_be_deleted_or_moved() {
    let state = app_state();
    let domain_id = create_domain(&state, "taxes", PageType::Direct, None).await;
    let child = create_page(&state, domain_id, None, "income").await;
    let main = state.repo.find_main_page(domain_id).await.unwrap().unwrap();

    let deleted = admin::delete_page(State(state.clone()), Path(main.id)).await;
    assert!(matches!(deleted, Err(ApiError::Validation(_))));

    let moved = admin::update_page(
        State(state.clone()),
        Path(main.id),
        Json(UpdatePageRequest {
            parent_id: Some(child),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(moved, Err(ApiError::Validation(_))));
}

#[tokio::test]
async fn test_move_under_descendant_is_circular() {
    let state = app_state();
    let domain_id = create_domain(&state, "guides", PageType::Hierarchical, None).await;
    let a = create_page(&state, domain_id, None, "a").await;
    let b = create_page(&state, domain_id, Some(a), "b").await;
    let c = create_page(&state, domain_id, Some(b), "c").await;

    let result = admin::update_page(
        State(state.clone()),
        Path(a),
        Json(UpdatePageRequest {
            parent_id: Some(c),
            ..Default::default()
        }),
    )
    .await;
    match result {
        Err(ApiError::Validation(msg)) => assert!(msg.contains("circular reference")),
        other => panic!("expected circular reference error, got {:?}", other.map(|_| ())),
    }

    let result = admin::update_page(
        State(state.clone()),
        Path(a),
        Json(UpdatePageRequest {
            parent_id: Some(a),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Validation(_))));
}

#[tokio::test]
async fn test_cascade_delete_reports_count_and_removes_content() {
    let state = app_state();
    let domain_id = create_domain(&state, "guides", PageType::Hierarchical, None).await;
    let root = create_page(&state, domain_id, None, "root").await;
    let child = create_page(&state, domain_id, Some(root), "child").await;
    let grandchild = create_page(&state, domain_id, Some(child), "grandchild").await;
    create_page(&state, domain_id, Some(root), "sibling").await;

    admin::upsert_rich_text(
        State(state.clone()),
        Path(grandchild),
        Json(UpsertRichTextRequest {
            title: None,
            html: "<p>hello world</p>".into(),
        }),
    )
    .await
    .unwrap();

    let envelope = admin::delete_page(State(state.clone()), Path(root)).await.unwrap();
    let body = body_json(envelope.into_response()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["deletedCount"], 4);

    assert!(state.repo.get_page(grandchild).await.unwrap().is_none());
    assert!(state.repo.get_rich_text(grandchild).await.unwrap().is_none());
}

// --- Sections ---

#[tokio::test]
async fn test_sections_reject_foreign_pages() {
    let state = app_state();
    let domain_id = create_domain(&state, "guides", PageType::Hierarchical, None).await;
    let root = create_page(&state, domain_id, None, "root").await;
    let other = create_page(&state, domain_id, None, "other").await;

    let result = admin::update_sections(
        State(state.clone()),
        Path(root),
        Json(UpdateSectionsRequest {
            sections: vec![SectionInput {
                title: "Main".into(),
                column: 1,
                page_ids: vec![other],
                ..Default::default()
            }],
        }),
    )
    .await;
    match result {
        Err(ApiError::Validation(msg)) => assert!(msg.contains(&other.to_string())),
        res => panic!("expected validation error, got {:?}", res.map(|_| ())),
    }
}

#[tokio::test]
async fn test_sections_overview_tracks_unorganized_children() {
    let state = app_state();
    let domain_id = create_domain(&state, "guides", PageType::Hierarchical, None).await;
    let root = create_page(&state, domain_id, None, "root").await;
    let listed = create_page(&state, domain_id, Some(root), "listed").await;
    let loose = create_page(&state, domain_id, Some(root), "loose").await;

    admin::update_sections(
        State(state.clone()),
        Path(root),
        Json(UpdateSectionsRequest {
            sections: vec![SectionInput {
                title: "Start here".into(),
                column: 2,
                page_ids: vec![listed],
                ..Default::default()
            }],
        }),
    )
    .await
    .unwrap();

    let envelope = admin::get_sections(State(state.clone()), Path(root)).await.unwrap();
    let body = body_json(envelope.into_response()).await;
    assert_eq!(body["sections"][0]["column"], 2);
    assert!(body["sections"][0]["id"].as_str().is_some_and(|id| !id.is_empty()));
    let unorganized: Vec<Uuid> = body["unorganizedPages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| Uuid::parse_str(p["id"].as_str().unwrap()).unwrap())
        .collect();
    assert_eq!(unorganized, vec![loose]);
}

// --- Tables ---

#[tokio::test]
async fn test_table_rows_filtered_for_public_and_kept_for_admin() {
    let state = app_state();
    let domain_id = create_domain(&state, "rates", PageType::Hierarchical, None).await;
    let page_id = create_page(&state, domain_id, None, "cities").await;

    let (_, envelope) = admin::create_table(
        State(state.clone()),
        Json(CreateTableRequest {
            page_id,
            name: "City rates".into(),
            schema: vec![TableColumn::text("city", "City")],
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let table_id = uuid_at(&body_json(envelope.into_response()).await, "/table/id");

    let rows = vec![
        json!({ "city": "Pune", "targetCountries": "IN" }),
        json!({ "city": "Austin", "targetCountries": ["US"] }),
        json!({ "city": "Anywhere" }),
    ];
    let envelope = admin::put_table_data(
        State(state.clone()),
        Path(table_id),
        Json(TableDataRequest {
            rows: rows.into_iter().map(|r| r.as_object().cloned().unwrap()).collect(),
            mode: DataMode::Replace,
            source: None,
        }),
    )
    .await
    .unwrap();
    let body = body_json(envelope.into_response()).await;
    assert_eq!(body["table"]["metadata"]["rowCount"], 3);

    let page = state.repo.get_page(page_id).await.unwrap().unwrap();
    assert_eq!(page.content_type, ContentType::Table);

    let response = public::get_public_table(
        State(state.clone()),
        UserCountry("US".into()),
        Path(page_id),
        Query(public::TableQuery::default()),
    )
    .await
    .unwrap();
    let body = body_json(response).await;
    let cities: Vec<&str> = body["table"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["city"].as_str().unwrap())
        .collect();
    assert_eq!(cities, vec!["Austin", "Anywhere"]);
    assert!(body["table"]["data"][0].get("targetCountries").is_none());

    let envelope = admin::get_admin_table(State(state.clone()), Path(table_id)).await.unwrap();
    let body = body_json(envelope.into_response()).await;
    assert_eq!(body["table"]["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["table"]["data"][0]["targetCountries"], "IN");
}

#[tokio::test]
async fn test_public_table_requires_visible_domain_and_ancestors() {
    let state = app_state();
    let domain_id = create_domain(&state, "rates", PageType::Hierarchical, None).await;
    let parent_id = create_page(&state, domain_id, None, "cities").await;
    let page_id = create_page(&state, domain_id, Some(parent_id), "metros").await;
    admin::create_table(
        State(state.clone()),
        Json(CreateTableRequest {
            page_id,
            name: "Metro rates".into(),
            schema: vec![TableColumn::text("city", "City")],
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    let fetch = |country: &str| {
        public::get_public_table(
            State(state.clone()),
            UserCountry(country.into()),
            Path(page_id),
            Query(public::TableQuery::default()),
        )
    };
    assert!(fetch("IN").await.is_ok());

    // Parent restricted to US hides the table from IN.
    admin::update_page(
        State(state.clone()),
        Path(parent_id),
        Json(UpdatePageRequest {
            target_countries: Some(vec!["US".into()]),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert!(matches!(fetch("IN").await, Err(ApiError::NotFound(_))));
    assert!(fetch("US").await.is_ok());

    admin::update_domain(
        State(state.clone()),
        Path(domain_id),
        Json(UpdateDomainRequest {
            is_published: Some(false),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert!(matches!(fetch("US").await, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_second_table_on_page_conflicts() {
    let state = app_state();
    let domain_id = create_domain(&state, "rates", PageType::Hierarchical, None).await;
    let page_id = create_page(&state, domain_id, None, "cities").await;
    let request = CreateTableRequest {
        page_id,
        name: "Rates".into(),
        schema: vec![TableColumn::text("city", "City")],
        ..Default::default()
    };

    admin::create_table(State(state.clone()), Json(request.clone())).await.unwrap();
    let result = admin::create_table(State(state.clone()), Json(request)).await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));
}

// --- Users & Auth ---

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let state = app_state();
    let actor = admin_user();
    let result = admin::delete_user(actor.clone(), State(state), Path(actor.id)).await;
    assert!(matches!(result, Err(ApiError::Validation(_))));
}

#[tokio::test]
async fn test_admin_cannot_revoke_own_admin() {
    let state = app_state();
    let actor = admin_user();
    let result = admin::update_user(
        actor.clone(),
        State(state),
        Path(actor.id),
        Json(UpdateUserRequest {
            is_admin: Some(false),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Validation(_))));
}

#[tokio::test]
async fn test_login_issues_token_and_rejects_bad_password() {
    let state = app_state();
    state
        .repo
        .create_user(NewUser {
            email: "editor@example.com".into(),
            name: Some("Editor".into()),
            password_hash: hash_password("s3cret-pass").unwrap(),
            is_admin: true,
            is_active: true,
        })
        .await
        .unwrap();

    let envelope = auth::login(
        State(state.clone()),
        Json(LoginRequest {
            email: "Editor@Example.com".into(),
            password: "s3cret-pass".into(),
        }),
    )
    .await
    .unwrap();
    let body = body_json(envelope.into_response()).await;
    assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["data"]["user"]["email"], "editor@example.com");
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let result = auth::login(
        State(state),
        Json(LoginRequest {
            email: "editor@example.com".into(),
            password: "wrong".into(),
        }),
    )
    .await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}
