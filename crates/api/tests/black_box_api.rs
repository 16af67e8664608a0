use std::sync::Arc;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use shopledger_api::app::{build_app, services::AppServices};
use shopledger_core::UserId;
use shopledger_infra::{InMemoryLedgerStore, LedgerConfig};
use shopledger_inventory::ProductId;

struct TestServer {
    base_url: String,
    store: Arc<InMemoryLedgerStore>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = LedgerConfig::from_lookup(|var| match var {
            LedgerConfig::LOCAL_RATE => Some("570".to_string()),
            LedgerConfig::RECONCILE_ON_STARTUP => Some("off".to_string()),
            _ => None,
        })
        .unwrap();
        let store = Arc::new(InMemoryLedgerStore::new());
        let services = Arc::new(AppServices::new(Arc::clone(&store), &config).unwrap());

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        actor: &TestActor,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-actor-id", actor.id.to_string())
            .header("x-actor-name", actor.name)
            .header("x-actor-permissions", actor.permissions)
            .header("x-forwarded-for", "198.51.100.4")
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        actor: &TestActor,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = self.request(method, path, actor);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn post(&self, path: &str, actor: &TestActor, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, actor, Some(body)).await
    }

    async fn put(&self, path: &str, actor: &TestActor, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, actor, Some(body)).await
    }

    async fn get(&self, path: &str, actor: &TestActor) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, actor, None).await
    }

    async fn product(&self, price: &str, opening_stock: i64) -> String {
        let (status, body) = self
            .post(
                "/products",
                &manager(),
                json!({
                    "name": "Tyre 195/65",
                    "unit_price": price,
                    "cost_basis": "1",
                    "low_stock_threshold": 2,
                    "opening_stock": opening_stock,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn customer(&self) -> String {
        let (status, body) = self
            .post(
                "/customers",
                &cashier(),
                json!({ "name": "Faadumo", "phone": "+252 61 000 0000" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct TestActor {
    id: UserId,
    name: &'static str,
    permissions: &'static str,
}

fn manager() -> TestActor {
    TestActor {
        id: UserId::new(),
        name: "manager",
        permissions: "*",
    }
}

fn cashier() -> TestActor {
    TestActor {
        id: UserId::new(),
        name: "cashier",
        permissions: "sales.post",
    }
}

fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

#[tokio::test]
async fn health_needs_no_actor() {
    let server = TestServer::spawn().await;
    let res = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn ledger_routes_require_an_actor() {
    let server = TestServer::spawn().await;
    let res = server
        .client
        .get(format!("{}/products/low-stock", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn credit_sale_then_payment_settles_debt() {
    let server = TestServer::spawn().await;
    let product = server.product("25", 10).await;
    let customer = server.customer().await;

    let (status, receipt) = server
        .post(
            "/sales",
            &cashier(),
            json!({
                "customer_id": customer,
                "lines": [{ "product_id": product, "quantity": 4 }],
                "amount_paid": "40",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(dec(&receipt["total_amount"]), Decimal::from(100));
    assert_eq!(dec(&receipt["debt_portion"]), Decimal::from(60));
    assert_eq!(receipt["stock_levels"][0]["stock_on_hand"], 6);

    let (status, ledger) = server.get(&format!("/customers/{customer}/ledger"), &cashier()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&ledger["outstanding_debt"]), Decimal::from(60));
    assert_eq!(ledger["movements"]["total"], 1);

    let (status, paid) = server
        .post("/payments", &cashier(), json!({ "customer_id": customer, "amount": "60" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{paid}");
    assert_eq!(dec(&paid["balance"]), Decimal::ZERO);

    let (status, err) = server
        .post("/payments", &cashier(), json!({ "customer_id": customer, "amount": "0.01" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "OVERPAYMENT_REJECTED");
}

#[tokio::test]
async fn overselling_is_a_conflict_and_leaves_stock() {
    let server = TestServer::spawn().await;
    let product = server.product("12", 3).await;

    let (status, err) = server
        .post(
            "/sales",
            &cashier(),
            json!({ "lines": [{ "product_id": product, "quantity": 5 }], "amount_paid": "60" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "INSUFFICIENT_STOCK");

    let (status, ledger) = server.get(&format!("/products/{product}/ledger"), &cashier()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger["stock_on_hand"], 3);
    assert_eq!(ledger["movements"]["total"], 1);
}

#[tokio::test]
async fn local_currency_sale_uses_the_configured_rate() {
    let server = TestServer::spawn().await;
    let product = server.product("20", 5).await;
    let customer = server.customer().await;

    let (status, receipt) = server
        .post(
            "/sales",
            &cashier(),
            json!({
                "customer_id": customer,
                "lines": [{ "product_id": product, "quantity": 1 }],
                "amount_paid": "5700",
                "currency": "SOS",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(dec(&receipt["amount_paid"]), Decimal::from(10));
    assert_eq!(dec(&receipt["debt_portion"]), Decimal::from(10));
    assert_eq!(dec(&receipt["total_in_currency"]), Decimal::from(11400));

    let (status, _) = server
        .put("/settings/exchange-rate", &cashier(), json!({ "rate": "600" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, rate) = server
        .put("/settings/exchange-rate", &manager(), json!({ "rate": "600" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rate["local"], "SOS");
    assert_eq!(dec(&rate["rate"]), Decimal::from(600));

    let (status, err) = server
        .post(
            "/sales",
            &cashier(),
            json!({
                "lines": [{ "product_id": product, "quantity": 1 }],
                "amount_paid": "20",
                "currency": "EUR",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "VALIDATION");
}

#[tokio::test]
async fn permissions_are_enforced_per_operation() {
    let server = TestServer::spawn().await;
    let product = server.product("8", 1).await;

    let (status, err) = server
        .post(&format!("/products/{product}/restock"), &cashier(), json!({ "quantity": 5 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "FORBIDDEN");

    let (status, err) = server
        .post("/reconciliation", &cashier(), json!({ "mode": "verify" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{err}");

    let (status, restocked) = server
        .post(
            &format!("/products/{product}/restock"),
            &manager(),
            json!({ "quantity": 5, "note": "delivery" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(restocked["stock_on_hand"], 6);
}

#[tokio::test]
async fn reconciliation_detects_and_repairs_drift() {
    let server = TestServer::spawn().await;
    let product = server.product("5", 47).await;
    let id: ProductId = product.parse().unwrap();
    server.store.tamper_product_stock(id, 50).unwrap();

    let (status, report) = server
        .post(
            "/reconciliation",
            &manager(),
            json!({ "mode": "verify", "scope": { "kind": "products", "ids": [product] } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["drifts"].as_array().unwrap().len(), 1);
    assert_eq!(report["drifts"][0]["recorded"], 50);
    assert_eq!(report["drifts"][0]["computed"], 47);

    let (status, report) = server
        .post("/reconciliation", &manager(), json!({ "mode": "repair" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["corrections"].as_array().unwrap().len(), 1);

    let (_, ledger) = server.get(&format!("/products/{product}/ledger"), &manager()).await;
    assert_eq!(ledger["stock_on_hand"], 47);

    let (_, report) = server.post("/reconciliation", &manager(), json!({ "mode": "repair" })).await;
    assert!(report["corrections"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn audit_scan_filters_and_records_origin() {
    let server = TestServer::spawn().await;
    let product = server.product("3", 10).await;
    server
        .post(
            "/sales",
            &cashier(),
            json!({ "lines": [{ "product_id": product, "quantity": 2 }], "amount_paid": "6" }),
        )
        .await;

    let (status, page) = server.get("/audit?action=SALE_CREATED", &manager()).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["actor_name"], "cashier");
    assert_eq!(page["items"][0]["origin"], "198.51.100.4");

    let (status, page) = server
        .get(&format!("/audit?entity_type=product&entity_id={product}&limit=1"), &manager())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["has_more"], true);
    assert_eq!(page["items"][0]["action"], "PRODUCT_REGISTERED");

    let (status, err) = server.get(&format!("/audit?entity_id={product}"), &manager()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "VALIDATION");
}

#[tokio::test]
async fn malformed_and_unknown_ids() {
    let server = TestServer::spawn().await;

    let (status, err) = server.get("/products/not-a-uuid/ledger", &manager()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "INVALID_ID");

    let unknown = ProductId::generate();
    let (status, err) = server.get(&format!("/products/{unknown}/ledger"), &manager()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "NOT_FOUND");
}

#[tokio::test]
async fn deactivated_customer_cannot_buy_on_credit() {
    let server = TestServer::spawn().await;
    let product = server.product("10", 5).await;
    let customer = server.customer().await;

    let (status, body) = server
        .put(&format!("/customers/{customer}/active"), &cashier(), json!({ "active": false }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (status, err) = server
        .post(
            "/sales",
            &cashier(),
            json!({
                "customer_id": customer,
                "lines": [{ "product_id": product, "quantity": 1 }],
                "amount_paid": "0"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "VALIDATION");

    let (_, low) = server.get("/products/low-stock", &cashier()).await;
    assert!(low.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn manager_can_adjust_debt_by_hand() {
    let server = TestServer::spawn().await;
    let product = server.product("25", 10).await;
    let customer = server.customer().await;
    server
        .post(
            "/sales",
            &cashier(),
            json!({
                "customer_id": customer,
                "lines": [{ "product_id": product, "quantity": 4 }],
                "amount_paid": "40",
            }),
        )
        .await;
    let path = format!("/customers/{customer}/debt-adjustments");

    let (status, err) = server
        .post(&path, &cashier(), json!({ "new_balance": "50", "reason": "discount" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "FORBIDDEN");

    let (status, err) = server
        .post(&path, &manager(), json!({ "new_balance": "-5", "reason": "discount" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "VALIDATION");

    let (status, receipt) = server
        .post(&path, &manager(), json!({ "new_balance": "50", "reason": "discount" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(dec(&receipt["adjustment"]), Decimal::from(-10));

    let (_, ledger) = server.get(&format!("/customers/{customer}/ledger"), &cashier()).await;
    assert_eq!(dec(&ledger["outstanding_debt"]), Decimal::from(50));
    assert_eq!(ledger["movements"]["items"][1]["reason"], "ADJUSTMENT");

    let (status, report) = server
        .post("/reconciliation", &manager(), json!({ "mode": "verify" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(report["drifts"].as_array().unwrap().is_empty(), "{report}");
}

#[tokio::test]
async fn oversized_quantities_are_client_errors() {
    let server = TestServer::spawn().await;
    let product = server.product("99999999999", 10).await;

    let (status, err) = server
        .post(
            "/sales",
            &cashier(),
            json!({
                "lines": [{ "product_id": product, "quantity": i64::MAX }],
                "amount_paid": "0"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{err}");
    assert_eq!(err["error"], "VALIDATION");

    let (status, err) = server
        .post(
            &format!("/products/{product}/restock"),
            &manager(),
            json!({ "quantity": i64::MAX }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{err}");

    let (_, ledger) = server.get(&format!("/products/{product}/ledger"), &cashier()).await;
    assert_eq!(ledger["stock_on_hand"], 10);
}
