mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{FakeUpstream, TestClient, API_KEY};
use serde_json::json;

const REPUBLICA: &str = "1700000000001x101";
const CAMPO_LIMPO: &str = "1700000000001x102";
const OTHER_TENANT_AGF: &str = "1700000000001x199";
const LEDGER_REPUBLICA: &str = "1700000000002x201";
const LEDGER_CAMPO_LIMPO: &str = "1700000000002x202";
const CATEGORY_RENT: &str = "1700000000003x301";
const CATEGORY_MISSING: &str = "1700000000003x399";

async fn tenant_upstream() -> FakeUpstream {
    FakeUpstream::builder()
        .objects(
            "AGF",
            vec![
                json!({"_id": REPUBLICA, "Nome": "Republica", "Empresa Mãe": "emp1"}),
                json!({"_id": CAMPO_LIMPO, "Nome": "Campo Limpo", "Empresa Mãe": "emp1"}),
                json!({"_id": OTHER_TENANT_AGF, "Nome": "Outra", "Empresa Mãe": "emp2"}),
            ],
        )
        .objects(
            "LancamentoMensal",
            vec![
                json!({
                    "_id": LEDGER_REPUBLICA,
                    "Empresa Mãe": "emp1",
                    "AGF": REPUBLICA,
                    "Ano": 2025,
                    "Mês": "Março",
                    "Total Receita": "R$ 75.000,00",
                    "Total Despesa": 5000
                }),
                json!({
                    "_id": LEDGER_CAMPO_LIMPO,
                    "Empresa Mãe": "emp1",
                    "AGF": CAMPO_LIMPO,
                    "Ano": "2025",
                    "Mês": 3,
                    "Total Receita": 52000,
                    "Total Despesa": "1.234,50"
                }),
            ],
        )
        .objects(
            "Categoria",
            vec![json!({"_id": CATEGORY_RENT, "Categoria": "Aluguel da loja"})],
        )
        .objects(
            "SubConta",
            vec![
                json!({
                    "_id": "1700000000004x401",
                    "AGF": REPUBLICA,
                    "Lançamento Mensal": LEDGER_REPUBLICA,
                    "Categoria": CATEGORY_RENT,
                    "Valor": "2.000,00"
                }),
                json!({
                    "_id": "1700000000004x402",
                    "AGF": REPUBLICA,
                    "Lançamento Mensal": LEDGER_REPUBLICA,
                    "Categoria": CATEGORY_MISSING,
                    "Descrição": "Posto Shell",
                    "Valor": 300
                }),
                json!({
                    "_id": "1700000000004x403",
                    "AGF": OTHER_TENANT_AGF,
                    "Lançamento Mensal": "1700000000002x299",
                    "Valor": 999
                }),
            ],
        )
        .objects(
            "Balancete",
            vec![
                json!({
                    "_id": "1700000000005x501",
                    "Lançamento Mensal": LEDGER_REPUBLICA,
                    "Tipo Objeto": "Total",
                    "Quantidade": 18500
                }),
                json!({
                    "_id": "1700000000005x502",
                    "Lançamento Mensal": LEDGER_REPUBLICA,
                    "Tipo Objeto": "Sedex",
                    "Quantidade": 99
                }),
            ],
        )
        .start()
        .await
}

#[tokio::test]
async fn test_missing_empresa_id_is_bad_request_without_upstream_calls() {
    let upstream = tenant_upstream().await;
    let client = TestClient::for_upstream(&upstream);

    for uri in ["/api/dash-data", "/api/dash-data?empresa_id=", "/api/dash-data?empresa_id=%20"] {
        let (status, body) = client.get_json(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, json!({"error": "empresa_id ausente"}));
    }
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn test_tenant_without_franchises_stops_after_first_call() {
    let upstream = tenant_upstream().await;
    let client = TestClient::for_upstream(&upstream);

    let (status, body) = client.get_json("/api/dash-data?empresa_id=vazia").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agfs"], json!([]));
    assert_eq!(body["dados"], json!({}));
    assert_eq!(body["categoriasDespesa"].as_array().unwrap().len(), 9);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].object_type(), "AGF");
}

#[tokio::test]
async fn test_full_aggregation() {
    let upstream = tenant_upstream().await;
    let client = TestClient::for_upstream(&upstream);

    let (status, body) = client.get_json("/api/dash-data?empresa_id=emp1").await;
    assert_eq!(status, StatusCode::OK, "{body}");

    assert_eq!(
        body["agfs"],
        json!([
            {"id": REPUBLICA, "nome": "Republica"},
            {"id": CAMPO_LIMPO, "nome": "Campo Limpo"}
        ])
    );

    let march = &body["dados"]["2025"]["3"];
    assert_eq!(march.as_object().unwrap().len(), 2);

    let republica = &march["Republica"];
    assert_eq!(republica["receita"], 75000.0);
    assert_eq!(republica["objetos"], 18500.0);
    assert_eq!(republica["despesas"]["aluguel"], 2000.0);
    assert_eq!(republica["despesas"]["veiculos"], 300.0);
    assert_eq!(republica["despesas"]["extras"], 0.0);
    // Sub-records supersede the ledger's own total.
    assert_eq!(republica["despesa_total"], 2300.0);

    let campo_limpo = &march["Campo Limpo"];
    assert_eq!(campo_limpo["receita"], 52000.0);
    assert_eq!(campo_limpo["despesa_total"], 1234.5);
    assert_eq!(campo_limpo["despesas"]["extras"], 1234.5);
    assert_eq!(campo_limpo["objetos"], 0.0);

    for cell in march.as_object().unwrap().values() {
        assert_eq!(cell["despesas"].as_object().unwrap().len(), 9);
    }
}

#[tokio::test]
async fn test_upstream_requests_carry_key_and_filters() {
    let upstream = tenant_upstream().await;
    let client = TestClient::for_upstream(&upstream);

    let (status, _) = client.get("/api/dash-data?empresa_id=emp1").await;
    assert_eq!(status, StatusCode::OK);

    let requests = upstream.requests();
    let expected_auth = format!("Bearer {API_KEY}");
    assert!(requests
        .iter()
        .all(|r| r.authorization.as_deref() == Some(expected_auth.as_str())));

    let agf = upstream.requests_for("AGF");
    assert_eq!(
        agf[0].constraints(),
        vec![json!({"key": "Empresa Mãe", "constraint_type": "equals", "value": "emp1"})]
    );

    let expenses = upstream.requests_for("SubConta");
    assert_eq!(expenses.len(), 1);
    assert_eq!(
        expenses[0].constraints()[0]["value"],
        json!([REPUBLICA, CAMPO_LIMPO])
    );

    let counts = upstream.requests_for("Balancete");
    let constraints = counts[0].constraints();
    assert_eq!(constraints[0]["key"], "Lançamento Mensal");
    assert_eq!(
        constraints[1],
        json!({"key": "Tipo Objeto", "constraint_type": "equals", "value": "Total"})
    );

    // The unknown category id is looked up on its own.
    let lookup_path = format!("/api/1.1/obj/Categoria/{CATEGORY_MISSING}");
    assert!(requests.iter().any(|r| r.path == lookup_path));
}

#[tokio::test]
async fn test_response_is_not_cacheable() {
    let upstream = tenant_upstream().await;
    let client = TestClient::for_upstream(&upstream);

    let (status, headers, _) = client
        .send(
            Request::builder()
                .uri("/api/dash-data?empresa_id=emp1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["cache-control"], "no-store");
}

#[tokio::test]
async fn test_identical_input_gives_identical_output() {
    let upstream = tenant_upstream().await;
    let client = TestClient::for_upstream(&upstream);

    let (_, first) = client.get("/api/dash-data?empresa_id=emp1").await;
    let (_, second) = client.get("/api/dash-data?empresa_id=emp1").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_pagination_follows_cursor() {
    let upstream = FakeUpstream::builder()
        .objects(
            "AGF",
            (1..=3)
                .map(|i| {
                    json!({
                        "_id": format!("1700000000001x10{i}"),
                        "Nome": format!("AGF {i}"),
                        "Empresa Mãe": "emp1"
                    })
                })
                .collect(),
        )
        .page_size(1)
        .start()
        .await;
    let client = TestClient::for_upstream(&upstream);

    let (status, body) = client.get_json("/api/dash-data?empresa_id=emp1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agfs"].as_array().unwrap().len(), 3);

    let agf_requests = upstream.requests_for("AGF");
    assert_eq!(agf_requests.len(), 3);
    let cursors: Vec<Option<&str>> = agf_requests
        .iter()
        .map(|r| r.params.get("cursor").map(String::as_str))
        .collect();
    assert_eq!(cursors, vec![None, Some("1"), Some("2")]);

    // No ledgers means an empty `in` filter on Balancete: no request at all.
    assert!(upstream.requests_for("Balancete").is_empty());
}

#[tokio::test]
async fn test_upstream_failure_is_server_error() {
    let upstream = FakeUpstream::builder().failing(503).start().await;
    let client = TestClient::for_upstream(&upstream);

    let (status, body) = client.get_json("/api/dash-data?empresa_id=emp1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("503"), "{message}");
    assert!(message.contains("boom"), "{message}");
}

#[tokio::test]
async fn test_missing_credentials_is_server_error() {
    let client = TestClient::new();

    let (status, body) = client.get_json("/api/dash-data?empresa_id=emp1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("BUBBLE_BASE_URL"));
}

#[tokio::test]
async fn test_count_filter_can_be_disabled() {
    let upstream = tenant_upstream().await;
    let mut config = upstream.config();
    config.count_type_filter = None;
    let client = TestClient::with_config(config);

    let (status, body) = client.get_json("/api/dash-data?empresa_id=emp1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dados"]["2025"]["3"]["Republica"]["objetos"], 18599.0);

    let counts = upstream.requests_for("Balancete");
    assert_eq!(counts[0].constraints().len(), 1);
}

#[tokio::test]
async fn test_known_category_ids_skip_individual_lookup() {
    const PAYROLL_ID: &str = "1754514204139x526063856276349100";
    let upstream = FakeUpstream::builder()
        .objects(
            "AGF",
            vec![json!({"_id": REPUBLICA, "Nome": "Republica", "Empresa Mãe": "emp1"})],
        )
        .objects(
            "LancamentoMensal",
            vec![json!({
                "_id": LEDGER_REPUBLICA,
                "Empresa Mãe": "emp1",
                "AGF": REPUBLICA,
                "Mês/Ano": "05/2025",
                "Total Receita": 1000
            })],
        )
        .objects(
            "SubConta",
            vec![json!({
                "_id": "1700000000004x401",
                "AGF": REPUBLICA,
                "Lançamento Mensal": LEDGER_REPUBLICA,
                "Categoria": PAYROLL_ID,
                "Valor": 400
            })],
        )
        .start()
        .await;
    let client = TestClient::for_upstream(&upstream);

    let (status, body) = client.get_json("/api/dash-data?empresa_id=emp1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["dados"]["2025"]["5"]["Republica"]["despesas"]["folha_pagamento"],
        400.0
    );

    let lookup_path = format!("/api/1.1/obj/Categoria/{PAYROLL_ID}");
    assert!(upstream.requests().iter().all(|r| r.path != lookup_path));
}
