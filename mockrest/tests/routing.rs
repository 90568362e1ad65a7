use mockrest::{
    memory::InMemoryStore,
    prelude::*,
    response::{ErrorParts, ResponseParts},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::time::Duration;

async fn build(config: EngineConfig, registry: Registry) -> Router {
    let store = MockStore::builder(InMemoryStore::new())
        .config(config)
        .registry(registry)
        .build();
    store
        .create_collection(
            "customers",
            &[SeedLoader::entities(vec![
                json!({ "name": "Ada" }),
                json!({ "name": "Grace" }),
                json!({ "name": "Linus" }),
            ])],
        )
        .await
        .unwrap();
    Router::new(store)
}

async fn default_router() -> Router {
    build(EngineConfig::default(), Registry::default()).await
}

async fn customer(router: &Router, id: i64) -> Option<Value> {
    router
        .store()
        .backend()
        .get("customers", &EntityId::Number(id))
        .await
        .unwrap()
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .map(|items| items.iter().filter_map(|item| item["id"].as_i64()).collect())
        .unwrap_or_default()
}

async fn with_documents(registry: Registry, documents: Vec<Value>) -> Router {
    let router = build(EngineConfig::default(), registry).await;
    router
        .store()
        .create_collection("documents", &[SeedLoader::entities(documents)])
        .await
        .unwrap();
    router
}

fn documents_join() -> Registry {
    Registry::builder()
        .collection(
            "documents",
            CollectionBehavior::builder()
                .join(JoinSpec::new("customerId", "customers"))
                .build(),
        )
        .build()
}

#[tokio::test]
async fn get_all_embeds_joined_entities() {
    let router = with_documents(
        documents_join(),
        vec![
            json!({ "title": "Invoice", "customerId": 2 }),
            json!({ "title": "Orphan", "customerId": 99 }),
            json!({ "title": "Unlinked" }),
        ],
    )
    .await;

    let body = router
        .handle(MockRequest::get("api/documents"))
        .await
        .unwrap()
        .body
        .unwrap();

    assert_eq!(body[0]["customer"], json!({ "id": 2, "name": "Grace" }));
    assert_eq!(body[1].get("customer"), None);
    assert_eq!(body[2].get("customer"), None);

    let one = router
        .handle(MockRequest::get("api/documents/1"))
        .await
        .unwrap()
        .body
        .unwrap();
    assert_eq!(one["customer"], json!({ "id": 2, "name": "Grace" }));

    // Joins are attached to responses only.
    let stored = router
        .store()
        .backend()
        .get("documents", &EntityId::Number(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("customer"), None);
}

#[tokio::test]
async fn joins_into_missing_collections_attach_nothing() {
    let registry = Registry::builder()
        .collection(
            "documents",
            CollectionBehavior::builder()
                .join(JoinSpec::new("ownerId", "owners"))
                .build(),
        )
        .build();
    let router = with_documents(registry, vec![json!({ "title": "Draft", "ownerId": 1 })]).await;

    let body = router
        .handle(MockRequest::get("api/documents"))
        .await
        .unwrap()
        .body
        .unwrap();

    assert_eq!(body, json!([{ "id": 1, "title": "Draft", "ownerId": 1 }]));
}

#[tokio::test]
async fn array_foreign_keys_attach_found_entities() {
    let registry = Registry::builder()
        .collection(
            "teams",
            CollectionBehavior::builder()
                .join(JoinSpec::new("memberIds", "customers").with_field("members"))
                .build(),
        )
        .build();
    let router = build(EngineConfig::default(), registry).await;
    router
        .store()
        .create_collection(
            "teams",
            &[SeedLoader::entities(vec![json!({ "memberIds": [3, 42, 1] })])],
        )
        .await
        .unwrap();

    let body = router
        .handle(MockRequest::get("api/teams/1"))
        .await
        .unwrap()
        .body
        .unwrap();

    assert_eq!(
        body["members"],
        json!([{ "id": 3, "name": "Linus" }, { "id": 1, "name": "Ada" }])
    );
}

#[tokio::test]
async fn children_filters_apply_after_joining() {
    let config = EngineConfig::builder().page_encapsulation(true).build();
    let store = MockStore::builder(InMemoryStore::new())
        .config(config)
        .registry(documents_join())
        .build();
    store
        .create_collection(
            "customers",
            &[SeedLoader::entities(vec![json!({ "name": "Ada" }), json!({ "name": "Grace" })])],
        )
        .await
        .unwrap();
    store
        .create_collection(
            "documents",
            &[SeedLoader::entities(vec![
                json!({ "customerId": 1 }),
                json!({ "customerId": 2 }),
                json!({ "customerId": 1 }),
                json!({ "customerId": 2 }),
                json!({ "customerId": 1 }),
            ])],
        )
        .await
        .unwrap();
    let router = Router::new(store);

    let body = router
        .handle(MockRequest::get("api/documents?customer.name=grace&pageSize=1"))
        .await
        .unwrap()
        .body
        .unwrap();

    assert_eq!(body["count"], json!(2));
    assert_eq!(body["hasNext"], json!(true));
    assert_eq!(ids(&body["data"]), vec![2]);
}

#[tokio::test]
async fn interceptors_answer_before_and_after_the_id() {
    let registry = Registry::builder()
        .collection(
            "customers",
            CollectionBehavior::builder()
                .interceptor(Interceptor::new(
                    Method::Get,
                    "stats",
                    IdPosition::BeforeId,
                    |ctx: InterceptContext| async move {
                        let total = ctx.store.count(&ctx.collection).await?;
                        Ok::<_, MockError>(Reply::ok(json!({ "total": total })))
                    },
                ))
                .interceptor(Interceptor::new(
                    Method::Post,
                    "/activate",
                    IdPosition::AfterId,
                    |ctx: InterceptContext| async move {
                        let id = ctx.id.unwrap_or_default();
                        ctx.store
                            .update(&ctx.collection, Some(id.as_str()), json!({ "name": "Active" }))
                            .await?;
                        Ok::<_, MockError>(Reply::new(202, None).with_header("X-Activated", id))
                    },
                ))
                .build(),
        )
        .build();
    let router = build(EngineConfig::default(), registry).await;

    let stats = router
        .handle(MockRequest::get("api/customers/stats"))
        .await
        .unwrap();
    assert_eq!(stats.body, Some(json!({ "total": 3 })));

    let activated = router
        .handle(MockRequest::post("api/customers/2/activate", json!({})))
        .await
        .unwrap();
    assert_eq!(activated.status, 202);
    assert_eq!(activated.status_text, "Accepted");
    assert_eq!(activated.header("x-activated"), Some("2"));
    assert_eq!(customer(&router, 2).await, Some(json!({ "id": 2, "name": "Active" })));

    // Other methods on the same path fall through to default routing.
    let err = router
        .handle(MockRequest::get("api/customers/2/activate"))
        .await
        .unwrap_err();
    assert_eq!(err.status, 404);
}

#[tokio::test]
async fn post_remaps_change_the_method() {
    let config = EngineConfig::builder()
        .post_remap(PostRemap::url_segment("delete", Method::Delete))
        .post_remap(PostRemap::query_param("_method", "put", Method::Put))
        .build();
    let registry = Registry::builder()
        .collection(
            "customers",
            CollectionBehavior::builder()
                .post_remap(PostRemap::body_field("action", "remove", Method::Delete))
                .build(),
        )
        .build();
    let router = build(config, registry).await;

    let removed = router
        .handle(MockRequest::post("api/customers/1/delete", json!({})))
        .await
        .unwrap();
    assert_eq!(removed.status, 204);
    assert_eq!(customer(&router, 1).await, None);

    let updated = router
        .handle(MockRequest::post("api/customers/2?_method=PUT", json!({ "name": "Hopper" })))
        .await
        .unwrap();
    assert_eq!(updated.status, 204);
    assert_eq!(customer(&router, 2).await, Some(json!({ "id": 2, "name": "Hopper" })));

    let removed = router
        .handle(MockRequest::post("api/customers", json!({ "id": 3, "action": "REMOVE" })))
        .await
        .unwrap();
    assert_eq!(removed.status, 204);
    assert_eq!(customer(&router, 3).await, None);

    // Plain POSTs still create.
    let created = router
        .handle(MockRequest::post("api/customers", json!({ "name": "New" })))
        .await
        .unwrap();
    assert_eq!(created.status, 201);
}

#[tokio::test]
async fn put_without_url_id_is_rejected() {
    let router = default_router().await;

    let err = router
        .handle(MockRequest::put("api/customers", json!({ "id": 1, "name": "Changed" })))
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
    assert_eq!(customer(&router, 1).await, Some(json!({ "id": 1, "name": "Ada" })));

    let err = router
        .handle(MockRequest::delete("api/customers").with_body(json!({ "id": 1 })))
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
    assert_eq!(customer(&router, 1).await, Some(json!({ "id": 1, "name": "Ada" })));
}

#[tokio::test]
async fn remapped_put_takes_the_id_from_the_body() {
    let config = EngineConfig::builder()
        .post_remap(PostRemap::query_param("_method", "put", Method::Put))
        .build();
    let router = build(config, Registry::default()).await;

    let updated = router
        .handle(MockRequest::post("api/customers?_method=put", json!({ "id": 1, "name": "Changed" })))
        .await
        .unwrap();

    assert_eq!(updated.status, 204);
    assert_eq!(customer(&router, 1).await, Some(json!({ "id": 1, "name": "Changed" })));
}

#[tokio::test]
async fn segment_replacements_run_globally_then_per_collection() {
    let config = EngineConfig::builder()
        .segment_replacement("clients", "customers")
        .build();
    let registry = Registry::builder()
        .collection(
            "customers",
            CollectionBehavior::builder()
                .segment_replacement("first", "1")
                .build(),
        )
        .build();
    let router = build(config, registry).await;

    let body = router
        .handle(MockRequest::get("api/clients/first"))
        .await
        .unwrap()
        .body
        .unwrap();

    assert_eq!(body, json!({ "id": 1, "name": "Ada" }));
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let router = default_router().await;

    let err = router.handle(MockRequest::get("api/orders")).await.unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(err.url, "api/orders");

    let err = router
        .handle(MockRequest::get("api/customers/1/orders"))
        .await
        .unwrap_err();
    assert_eq!(err.status, 404);

    let err = router.handle(MockRequest::get("api")).await.unwrap_err();
    assert_eq!(err.status, 404);
}

#[tokio::test]
async fn unsupported_methods_are_rejected() {
    let router = default_router().await;

    let err = router
        .handle(MockRequest::new(Method::Patch, "api/customers/1").with_body(json!({})))
        .await
        .unwrap_err();
    assert_eq!(err.status, 405);
    assert_eq!(err.status_text, "Method Not Allowed");

    let err = router
        .handle_raw("BREW", "api/customers", None)
        .await
        .unwrap_err();
    assert_eq!(err.status, 405);

    let ok = router
        .handle_raw("get", "api/customers/1", None)
        .await
        .unwrap();
    assert_eq!(ok.status, 200);
}

#[tokio::test]
async fn created_responses_carry_a_location() {
    let router = default_router().await;

    let created = router
        .handle(MockRequest::post("api/customers?source=test", json!({ "name": "Barbara" })))
        .await
        .unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.status_text, "Created");
    assert_eq!(created.header("Location"), Some("api/customers/4"));

    let upserted = router
        .handle(MockRequest::put("api/customers/10", json!({ "name": "Ken" })))
        .await
        .unwrap();
    assert_eq!(upserted.status, 201);
    assert_eq!(upserted.header("location"), Some("api/customers/10"));

    let updated = router
        .handle(MockRequest::put("api/customers/10", json!({ "name": "Ken T." })))
        .await
        .unwrap();
    assert_eq!(updated.status, 204);
    assert_eq!(updated.header("Location"), None);
    assert_eq!(updated.body, None);
}

#[tokio::test]
async fn absolute_urls_and_root_paths() {
    let router = build(
        EngineConfig::builder().root_path(Some("api/v1")).build(),
        Registry::default(),
    )
    .await;

    let response = router
        .handle(MockRequest::get("https://mock.example.com/api/v1/customers/2"))
        .await
        .unwrap();
    assert_eq!(response.body, Some(json!({ "id": 2, "name": "Grace" })));

    let unrooted = router
        .handle(MockRequest::get("/customers/3"))
        .await
        .unwrap();
    assert_eq!(unrooted.body, Some(json!({ "id": 3, "name": "Linus" })));
}

#[tokio::test]
async fn url_with_params_supplies_the_query() {
    let router = default_router().await;

    let response = router
        .handle(MockRequest::get("api/customers").with_params("api/customers?name=grace"))
        .await
        .unwrap();

    assert_eq!(response.url, "api/customers");
    assert_eq!(ids(response.body.as_ref().unwrap()), vec![2]);
}

#[tokio::test]
async fn malformed_ids_read_as_missing() {
    let router = default_router().await;

    let err = router
        .handle(MockRequest::get("api/customers/abc"))
        .await
        .unwrap_err();
    assert_eq!(err.status, 404);

    let deleted = router
        .handle(MockRequest::delete("api/customers/abc"))
        .await
        .unwrap();
    assert_eq!(deleted.status, 204);

    let err = router
        .handle(MockRequest::put("api/customers/abc", json!({})))
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
}

#[tokio::test(start_paused = true)]
async fn delay_applies_to_every_outcome() {
    let router = build(EngineConfig::builder().delay(500).build(), Registry::default()).await;

    let started = tokio::time::Instant::now();
    router.handle(MockRequest::get("api/customers/1")).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(500));

    let started = tokio::time::Instant::now();
    router.handle(MockRequest::get("api/nothing")).await.unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(500));
}

/// Answers with bare status codes, like a test double for an HTTP client.
struct StatusOnly;

impl ResponseFactory for StatusOnly {
    type Response = (u16, Option<Value>);
    type Error = (u16, String);

    fn success(&self, parts: ResponseParts) -> Self::Response {
        (parts.status, parts.body)
    }

    fn failure(&self, parts: ErrorParts) -> Self::Error {
        (parts.status, parts.error.to_string())
    }
}

#[tokio::test]
async fn custom_response_factories_shape_both_outcomes() {
    let store = default_router().await.store().clone();
    let router = Router::with_factory(store, StatusOnly);

    let ok = router.handle(MockRequest::get("api/customers/1")).await.unwrap();
    assert_eq!(ok, (200, Some(json!({ "id": 1, "name": "Ada" }))));

    let err = router
        .handle(MockRequest::post("api/customers/1", json!({ "id": 2 })))
        .await
        .unwrap_err();
    assert_eq!(err, (400, "Id in URL (1) does not match id in body (2)".to_string()));
}
