use mockrest::{memory::InMemoryStore, prelude::*};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::cmp::Ordering;

fn customers() -> SeedLoader {
    SeedLoader::entities(
        ["12345", "23451", "34512", "45123", "51234"]
            .iter()
            .map(|digits| json!({ "name": format!("Customer {digits}") }))
            .collect(),
    )
}

async fn router(config: EngineConfig, registry: Registry) -> Router {
    let store = MockStore::builder(InMemoryStore::new())
        .config(config)
        .registry(registry)
        .build();
    store.create_collection("customers", &[customers()]).await.unwrap();
    Router::new(store)
}

async fn get(router: &Router, url: &str) -> Value {
    let response = router.handle(MockRequest::get(url)).await.unwrap();
    assert_eq!(response.status, 200, "GET {url}");
    response.body.unwrap()
}

fn field<'a>(body: &'a Value, name: &str) -> Vec<&'a Value> {
    body.as_array()
        .map(|items| items.iter().map(|item| &item[name]).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn seeded_customers_filter_and_delete() {
    let router = router(EngineConfig::default(), Registry::default()).await;

    let body = get(&router, "api/customers?name=23451").await;
    assert_eq!(body, json!([{ "id": 2, "name": "Customer 23451" }]));

    let deleted = router
        .handle(MockRequest::delete("api/customers/5"))
        .await
        .unwrap();
    assert_eq!(deleted.status, 204);

    let err = router
        .handle(MockRequest::get("api/customers/5"))
        .await
        .unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(err.status_text, "Not Found");
    assert!(err.error["message"].as_str().unwrap().contains('5'));
}

#[tokio::test]
async fn composite_order_groups_then_breaks_ties() {
    let router = router(EngineConfig::default(), Registry::default()).await;
    router
        .store()
        .create_collection(
            "documents",
            &[SeedLoader::entities(vec![
                json!({ "customerId": 2, "identifier": "a" }),
                json!({ "customerId": 1, "identifier": "b" }),
                json!({ "customerId": 2, "identifier": "c" }),
                json!({ "customerId": 1, "identifier": "d" }),
                json!({ "customerId": 3, "identifier": "e" }),
            ])],
        )
        .await
        .unwrap();

    let body = get(&router, "api/documents?orderBy=customerId,-identifier").await;

    let pairs: Vec<(i64, &str)> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| (doc["customerId"].as_i64().unwrap(), doc["identifier"].as_str().unwrap()))
        .collect();
    assert_eq!(pairs, vec![(1, "d"), (1, "b"), (2, "c"), (2, "a"), (3, "e")]);

    // Repeating the key appends clauses in the same way.
    let repeated = get(&router, "api/documents?orderBy=customerId&orderBy=-identifier").await;
    assert_eq!(repeated, body);
}

#[tokio::test]
async fn or_groups_match_any_value() {
    let router = router(EngineConfig::default(), Registry::default()).await;

    let body = get(&router, "api/customers?name[]=12345&name[]=45123").await;
    assert_eq!(field(&body, "id"), vec![&json!(1), &json!(4)]);

    // Without the suffix repeated values must all match.
    let body = get(&router, "api/customers?name=12345&name=45123").await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn term_filters_follow_case_sensitivity() {
    let insensitive = router(EngineConfig::default(), Registry::default()).await;
    assert_eq!(get(&insensitive, "api/customers?name=customer+1").await.as_array().unwrap().len(), 1);

    let sensitive = router(
        EngineConfig::builder().case_sensitive_search(true).build(),
        Registry::default(),
    )
    .await;
    assert_eq!(get(&sensitive, "api/customers?name=customer").await, json!([]));
    assert_eq!(get(&sensitive, "api/customers?name=Customer").await.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn page_envelope_reports_has_next() {
    let router = router(
        EngineConfig::builder().page_encapsulation(true).build(),
        Registry::default(),
    )
    .await;

    let body = get(&router, "api/customers?page=2&pageSize=2").await;
    assert_eq!(body["hasNext"], json!(true));
    assert_eq!(body["page"], json!(2));
    assert_eq!(body["pageSize"], json!(2));
    assert_eq!(body["count"], json!(5));
    assert_eq!(field(&body["data"], "id"), vec![&json!(3), &json!(4)]);

    let last = get(&router, "api/customers?page=3&pageSize=2").await;
    assert_eq!(last["hasNext"], json!(false));
    assert_eq!(field(&last["data"], "id"), vec![&json!(5)]);

    // Without pagination keys the result is a plain array.
    assert!(get(&router, "api/customers").await.is_array());
}

#[tokio::test]
async fn empty_collection_has_no_next_page() {
    let router = router(
        EngineConfig::builder().page_encapsulation(true).build(),
        Registry::default(),
    )
    .await;
    router.store().create_collection("orders", &[]).await.unwrap();

    let body = get(&router, "api/orders?pageSize=5").await;
    assert_eq!(
        body,
        json!({ "data": [], "hasNext": false, "page": 1, "pageSize": 5, "count": 0 })
    );
}

#[tokio::test]
async fn data_encapsulation_wraps_lists_and_entities() {
    let router = router(
        EngineConfig::builder().data_encapsulation(true).build(),
        Registry::default(),
    )
    .await;

    let one = get(&router, "api/customers/1").await;
    assert_eq!(one, json!({ "data": { "id": 1, "name": "Customer 12345" } }));

    let all = get(&router, "api/customers?name=51234").await;
    assert_eq!(all, json!({ "data": [{ "id": 5, "name": "Customer 51234" }] }));
}

#[tokio::test]
async fn operator_fields_compare_typed_literals() {
    let registry = Registry::builder()
        .collection(
            "people",
            CollectionBehavior::builder()
                .operator("age", FieldOp::Ge)
                .operator("active", FieldOp::Eq)
                .build(),
        )
        .build();
    let router = router(EngineConfig::default(), registry).await;
    router
        .store()
        .create_collection(
            "people",
            &[SeedLoader::entities(vec![
                json!({ "age": 9, "active": true }),
                json!({ "age": 30, "active": false }),
                json!({ "age": 41, "active": true }),
                json!({ "active": true }),
            ])],
        )
        .await
        .unwrap();

    let adults = get(&router, "api/people?age=30").await;
    assert_eq!(field(&adults, "id"), vec![&json!(2), &json!(3)]);

    let active_adults = get(&router, "api/people?age=30&active=true").await;
    assert_eq!(field(&active_adults, "id"), vec![&json!(3)]);
}

#[tokio::test]
async fn custom_predicates_see_absent_fields() {
    let registry = Registry::builder()
        .collection(
            "people",
            CollectionBehavior::builder()
                .filter("nickname", |value, literal| match value {
                    Some(Value::String(nickname)) => nickname == literal,
                    None => literal == "none",
                    Some(_) => false,
                })
                .build(),
        )
        .build();
    let router = router(EngineConfig::default(), registry).await;
    router
        .store()
        .create_collection(
            "people",
            &[SeedLoader::entities(vec![
                json!({ "nickname": "Ace" }),
                json!({}),
                json!({ "nickname": "Acer" }),
            ])],
        )
        .await
        .unwrap();

    assert_eq!(field(&get(&router, "api/people?nickname=Ace").await, "id"), vec![&json!(1)]);
    assert_eq!(field(&get(&router, "api/people?nickname=none").await, "id"), vec![&json!(2)]);
}

#[tokio::test]
async fn custom_comparator_wins_for_its_field() {
    fn rank(value: &Value) -> u8 {
        match value.as_str() {
            Some("high") => 3,
            Some("medium") => 2,
            Some("low") => 1,
            _ => 0,
        }
    }

    let registry = Registry::builder()
        .collection(
            "tasks",
            CollectionBehavior::builder()
                .comparator("priority", |left: &Value, right: &Value, _| rank(left).cmp(&rank(right)))
                .build(),
        )
        .build();
    let router = router(EngineConfig::default(), registry).await;
    router
        .store()
        .create_collection(
            "tasks",
            &[SeedLoader::entities(vec![
                json!({ "priority": "medium" }),
                json!({ "priority": "high" }),
                json!({ "priority": "low" }),
            ])],
        )
        .await
        .unwrap();

    let body = get(&router, "api/tasks?orderBy=-priority").await;
    assert_eq!(
        field(&body, "priority"),
        vec![&json!("high"), &json!("medium"), &json!("low")]
    );
}

#[tokio::test]
async fn nested_paths_filter_and_order() {
    let router = router(EngineConfig::default(), Registry::default()).await;
    router
        .store()
        .create_collection(
            "offices",
            &[SeedLoader::entities(vec![
                json!({ "address": { "city": "Paris", "floor": 3 } }),
                json!({ "address": { "city": "Lisbon", "floor": 1 } }),
                json!({ "address": { "city": "Paris", "floor": 2 } }),
            ])],
        )
        .await
        .unwrap();

    let body = get(&router, "api/offices?address.city=paris&orderBy=address.floor").await;
    assert_eq!(field(&body, "id"), vec![&json!(3), &json!(1)]);
}

#[tokio::test]
async fn dates_order_chronologically() {
    let router = router(EngineConfig::default(), Registry::default()).await;
    router
        .store()
        .create_collection(
            "events",
            &[SeedLoader::entities(vec![
                json!({ "at": "2024-03-01T10:00:00+02:00" }),
                json!({ "at": "2024-03-01T09:00:00Z" }),
                json!({ "at": "2023-12-31T23:59:59Z" }),
            ])],
        )
        .await
        .unwrap();

    // 10:00+02:00 is 08:00Z, before 09:00Z.
    let body = get(&router, "api/events?orderBy=at").await;
    assert_eq!(field(&body, "id"), vec![&json!(3), &json!(1), &json!(2)]);
}

#[tokio::test]
async fn get_all_hook_runs_once_over_the_page() {
    let registry = Registry::builder()
        .collection(
            "customers",
            CollectionBehavior::builder()
                .get_all(Transform::sync(|_, page| {
                    let items = page.as_array().cloned().unwrap_or_default();
                    let total = items.len();
                    Ok(Value::Array(
                        items
                            .into_iter()
                            .map(|mut item| {
                                item["pageLength"] = json!(total);
                                item
                            })
                            .collect(),
                    ))
                }))
                .build(),
        )
        .build();
    let router = router(EngineConfig::default(), registry).await;

    let body = get(&router, "api/customers?pageSize=2").await;
    assert_eq!(field(&body, "pageLength"), vec![&json!(2), &json!(2)]);
}

#[tokio::test]
async fn query_specs_can_be_built_directly() {
    let router = router(EngineConfig::default(), Registry::default()).await;
    let spec = QuerySpec::builder()
        .filter(Filter::or([Filter::eq("id", 1), Filter::gt("id", 4)]))
        .order_by("id", SortDirection::Desc)
        .paginate(1, 1)
        .build();

    let page = router.store().query("customers", &spec).await.unwrap();
    assert_eq!(page.count, 2);
    assert!(page.has_next);
    assert_eq!(page.items, vec![json!({ "id": 5, "name": "Customer 51234" })]);
}

#[test]
fn default_ordering_puts_missing_first() {
    use mockrest::evaluator::default_compare;

    assert_eq!(default_compare(&Value::Null, &json!(1), false), Ordering::Less);
    assert_eq!(default_compare(&json!("b"), &json!("A"), false), Ordering::Greater);
    assert_eq!(default_compare(&json!(false), &json!(true), false), Ordering::Less);
}
