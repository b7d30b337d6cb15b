//! Integration tests for the boundary operations over a live database

use crate::common::{exec, test_store, unique_table};
use cadastro::boundary::{Dispatcher, OperationResult, Response, TableAllowList, serve};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

fn outcome(response: Response) -> OperationResult {
    match response {
        Response::Outcome(outcome) => outcome,
        Response::Rows(rows) => panic!("Expected an operation result, got {} rows", rows.len()),
    }
}

#[tokio::test]
async fn test_insert_and_query_scenario() {
    let Some(store) = test_store().await else {
        return;
    };
    let table = unique_table("profissionais_departamento");
    exec(
        &store,
        &[&format!(
            "CREATE TABLE {} (id serial PRIMARY KEY, departamento text)",
            table
        )],
    )
    .await;
    let dispatcher = Dispatcher::new(store, TableAllowList::default());

    let inserted = dispatcher
        .dispatch_named(
            "insert-records",
            json!({ "table": table, "columns": ["departamento"], "values": ["RH"] }),
        )
        .await
        .unwrap();
    assert_eq!(outcome(inserted), OperationResult::ok());

    let rows = dispatcher
        .dispatch_named(
            "query-database",
            json!(format!(
                "SELECT departamento FROM {} WHERE departamento='RH'",
                table
            )),
        )
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(rows).unwrap(),
        json!([{ "departamento": "RH" }])
    );

    exec(dispatcher.store(), &[&format!("DROP TABLE {}", table)]).await;
}

#[tokio::test]
async fn test_mutation_failure_is_reported_not_raised() {
    let Some(store) = test_store().await else {
        return;
    };
    let dispatcher = Dispatcher::new(store, TableAllowList::default());

    let response = dispatcher
        .dispatch_named(
            "delete-records",
            json!({ "table": unique_table("nao_existe"), "ids": [1], "idColumn": "id" }),
        )
        .await
        .unwrap();

    let result = outcome(response);
    assert!(!result.success);
    assert!(result.message.unwrap().starts_with("Error deleting records: "));
}

#[tokio::test]
async fn test_serve_over_live_pool() {
    let Some(store) = test_store().await else {
        return;
    };
    let table = unique_table("servidor");
    exec(
        &store,
        &[
            &format!("CREATE TABLE {} (id int PRIMARY KEY, nome text)", table),
            &format!("INSERT INTO {} VALUES (1, 'a'), (2, 'b')", table),
        ],
    )
    .await;
    let dispatcher = Arc::new(Dispatcher::new(store, TableAllowList::default()));

    let input = [
        json!({ "id": 1, "operation": "update-records", "payload": {
            "table": table, "updates": { "nome": "z" }, "ids": [1], "idColumn": "id"
        }}),
        json!({ "id": 2, "operation": "delete-records", "payload": {
            "table": table, "ids": [2], "idColumn": "id"
        }}),
    ]
    .iter()
    .map(|v| format!("{}\n", v))
    .collect::<String>();

    let (client, mut server) = tokio::io::duplex(64 * 1024);
    serve(Arc::clone(&dispatcher), input.as_bytes(), client)
        .await
        .unwrap();
    let mut output = String::new();
    server.read_to_string(&mut output).await.unwrap();

    let responses: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 2);
    assert!(
        responses
            .iter()
            .all(|r| r["result"] == json!({ "success": true }))
    );

    let remaining = dispatcher
        .dispatch_named(
            "query-database",
            json!({ "statement": format!("SELECT id, nome FROM {}", table) }),
        )
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(remaining).unwrap(),
        json!([{ "id": 1, "nome": "z" }])
    );

    exec(dispatcher.store(), &[&format!("DROP TABLE {}", table)]).await;
}
