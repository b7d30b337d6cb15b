//! Integration tests for the record operations
//!
//! These tests require a reachable PostgreSQL database (see tests/integration.rs).

use crate::common::{exec, test_store, unique_table};
use cadastro::RecordError;
use cadastro::db::types::CellValue;
use cadastro::db::{PgPool, SqlValue};
use cadastro::records::{
    Assignments, InsertRequest, MutateRequest, QueryRequest, RecordStore, RelocateRequest,
    RemoveRequest,
};

async fn count(store: &RecordStore<PgPool>, table: &str) -> i64 {
    let rows = store
        .query(&QueryRequest::new(
            format!("SELECT count(*) AS n FROM {}", table),
            vec![],
        ))
        .await
        .unwrap();
    match rows[0].get("n") {
        Some(CellValue::Integer(n)) => *n,
        other => panic!("Expected Integer, got {:?}", other),
    }
}

#[tokio::test]
async fn test_insert_then_query() {
    let Some(store) = test_store().await else {
        return;
    };
    let table = unique_table("departamento");
    exec(
        &store,
        &[&format!(
            "CREATE TABLE {} (id serial PRIMARY KEY, departamento text NOT NULL)",
            table
        )],
    )
    .await;

    let affected = store
        .insert(&InsertRequest {
            table: table.clone(),
            columns: vec!["departamento".to_string()],
            values: vec![SqlValue::from("RH")],
        })
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let rows = store
        .query(&QueryRequest::new(
            format!("SELECT departamento FROM {} WHERE departamento = $1", table),
            vec![SqlValue::from("RH")],
        ))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("departamento"),
        Some(&CellValue::Text("RH".to_string()))
    );

    exec(&store, &[&format!("DROP TABLE {}", table)]).await;
}

#[tokio::test]
async fn test_values_are_bound_not_interpolated() {
    let Some(store) = test_store().await else {
        return;
    };
    let table = unique_table("injecao");
    exec(
        &store,
        &[&format!("CREATE TABLE {} (id serial PRIMARY KEY, nome text)", table)],
    )
    .await;

    let hostile = "x'); DROP TABLE profissionais; --";
    store
        .insert(&InsertRequest {
            table: table.clone(),
            columns: vec!["nome".to_string()],
            values: vec![SqlValue::from(hostile)],
        })
        .await
        .unwrap();

    let rows = store
        .query(&QueryRequest::new(format!("SELECT nome FROM {}", table), vec![]))
        .await
        .unwrap();
    assert_eq!(rows[0].get("nome"), Some(&CellValue::Text(hostile.to_string())));

    exec(&store, &[&format!("DROP TABLE {}", table)]).await;
}

#[tokio::test]
async fn test_insert_constraint_violation() {
    let Some(store) = test_store().await else {
        return;
    };
    let table = unique_table("unico");
    exec(
        &store,
        &[&format!("CREATE TABLE {} (codigo int PRIMARY KEY)", table)],
    )
    .await;

    let request = InsertRequest {
        table: table.clone(),
        columns: vec!["codigo".to_string()],
        values: vec![SqlValue::Integer(1)],
    };
    store.insert(&request).await.unwrap();
    let err = store.insert(&request).await.unwrap_err();

    assert!(matches!(err, RecordError::Insert(ref m) if m.contains("duplicate key")));

    exec(&store, &[&format!("DROP TABLE {}", table)]).await;
}

#[tokio::test]
async fn test_update_by_ids() {
    let Some(store) = test_store().await else {
        return;
    };
    let table = unique_table("profissionais");
    exec(
        &store,
        &[
            &format!(
                "CREATE TABLE {} (profissional_id int PRIMARY KEY, profissional_nome text, ativo boolean)",
                table
            ),
            &format!(
                "INSERT INTO {} VALUES (7, 'Bia', true), (8, 'Caio', true), (9, 'Duda', true)",
                table
            ),
        ],
    )
    .await;

    let affected = store
        .update(&MutateRequest {
            table: table.clone(),
            updates: Assignments::new()
                .set("profissional_nome", "Ana")
                .set("ativo", false),
            ids: vec![SqlValue::Integer(7), SqlValue::from("8")],
            id_column: "profissional_id".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let rows = store
        .query(&QueryRequest::new(
            format!(
                "SELECT profissional_id FROM {} WHERE profissional_nome = $1 AND NOT ativo ORDER BY 1",
                table
            ),
            vec![SqlValue::from("Ana")],
        ))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    exec(&store, &[&format!("DROP TABLE {}", table)]).await;
}

#[tokio::test]
async fn test_delete_twice_is_idempotent() {
    let Some(store) = test_store().await else {
        return;
    };
    let table = unique_table("remover");
    exec(
        &store,
        &[
            &format!("CREATE TABLE {} (id int PRIMARY KEY)", table),
            &format!("INSERT INTO {} VALUES (1), (2), (3)", table),
        ],
    )
    .await;

    let request = RemoveRequest {
        table: table.clone(),
        ids: vec![SqlValue::Integer(1), SqlValue::Integer(2)],
        id_column: "id".to_string(),
    };
    assert_eq!(store.delete(&request).await.unwrap(), 2);
    assert_eq!(store.delete(&request).await.unwrap(), 0);
    assert_eq!(count(&store, &table).await, 1);

    exec(&store, &[&format!("DROP TABLE {}", table)]).await;
}

#[tokio::test]
async fn test_relocate_moves_rows() {
    let Some(store) = test_store().await else {
        return;
    };
    let source = unique_table("profissionais_unidade");
    let destination = unique_table("profissionais_unidades_inativas");
    exec(
        &store,
        &[
            &format!("CREATE TABLE {} (id int PRIMARY KEY, unidade text)", source),
            &format!("CREATE TABLE {} (id int PRIMARY KEY, unidade text)", destination),
            &format!(
                "INSERT INTO {} VALUES (3, 'Centro'), (4, 'Norte'), (5, 'Sul')",
                source
            ),
        ],
    )
    .await;

    let outcome = store
        .relocate(&RelocateRequest {
            source_table: source.clone(),
            destination_table: destination.clone(),
            ids: vec![SqlValue::Integer(3), SqlValue::from("4")],
            id_column: "id".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.copied, 2);
    assert_eq!(outcome.removed, 2);
    assert_eq!(count(&store, &source).await, 1);
    assert_eq!(count(&store, &destination).await, 2);

    exec(
        &store,
        &[
            &format!("DROP TABLE {}", source),
            &format!("DROP TABLE {}", destination),
        ],
    )
    .await;
}

#[tokio::test]
async fn test_relocate_with_no_matching_rows_succeeds() {
    let Some(store) = test_store().await else {
        return;
    };
    let source = unique_table("origem_vazia");
    let destination = unique_table("destino_vazio");
    exec(
        &store,
        &[
            &format!("CREATE TABLE {} (id int PRIMARY KEY)", source),
            &format!("CREATE TABLE {} (id int PRIMARY KEY)", destination),
        ],
    )
    .await;

    let outcome = store
        .relocate(&RelocateRequest {
            source_table: source.clone(),
            destination_table: destination.clone(),
            ids: vec![SqlValue::Integer(3), SqlValue::Integer(4)],
            id_column: "id".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(outcome.copied, 0);

    exec(
        &store,
        &[
            &format!("DROP TABLE {}", source),
            &format!("DROP TABLE {}", destination),
        ],
    )
    .await;
}

#[tokio::test]
async fn test_failed_relocate_leaves_both_tables_untouched() {
    let Some(store) = test_store().await else {
        return;
    };
    let source = unique_table("origem");
    let destination = unique_table("destino");
    exec(
        &store,
        &[
            &format!("CREATE TABLE {} (id int PRIMARY KEY, unidade text)", source),
            // Missing the `unidade` column, so the copy fails
            &format!("CREATE TABLE {} (id int PRIMARY KEY)", destination),
            &format!("INSERT INTO {} VALUES (3, 'Centro')", source),
        ],
    )
    .await;

    let err = store
        .relocate(&RelocateRequest {
            source_table: source.clone(),
            destination_table: destination.clone(),
            ids: vec![SqlValue::Integer(3)],
            id_column: "id".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RecordError::Relocate(_)));
    assert_eq!(count(&store, &source).await, 1);
    assert_eq!(count(&store, &destination).await, 0);

    exec(
        &store,
        &[
            &format!("DROP TABLE {}", source),
            &format!("DROP TABLE {}", destination),
        ],
    )
    .await;
}

#[tokio::test]
async fn test_relocate_from_missing_table_fails() {
    let Some(store) = test_store().await else {
        return;
    };

    let err = store
        .relocate(&RelocateRequest {
            source_table: unique_table("nao_existe"),
            destination_table: unique_table("tambem_nao"),
            ids: vec![SqlValue::Integer(1)],
            id_column: "id".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RecordError::Relocate(ref m) if m.contains("no columns found")));
}
