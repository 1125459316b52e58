//! Create, update and delete against SQLite.

mod common;

use common::{Fixture, page_ids};
use pretty_assertions::assert_eq;
use serde_json::json;
use weave::error::ErrorCode;
use weave::pointer::ResourceIdentifier;
use weave::prelude::*;

async fn count(fx: &Fixture, sql: &str) -> i64 {
    let row = fx.sqlite.query_row(sql, &[]).await.unwrap().unwrap();
    match row.value(0).unwrap() {
        Value::Int(n) => *n,
        other => panic!("expected a count, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_with_relationships() {
    let fx = Fixture::new().await;
    let payload = json!({
        "data": {
            "type": "books",
            "id": "b5",
            "attributes": {"title": "The Dispossessed", "pages": 387, "published": "1974-05-01"},
            "relationships": {
                "author": {"data": {"type": "authors", "id": "a1"}},
                "tags": {"data": [{"type": "tags", "id": "t3"}, {"type": "tags", "id": "t4"}]}
            }
        }
    });

    let doc = fx.resolver().create("books", &payload).await.unwrap();
    let book = doc.primary().unwrap();
    assert_eq!(book.id(), "b5");
    assert_eq!(book.attribute("pages"), Some(&Value::Int(387)));
    assert_eq!(
        book.pointer("author").unwrap().data,
        Some(ResourceIdentifier::new("authors", "a1"))
    );
    assert_eq!(page_ids(book, "tags"), vec!["t4", "t3"]);

    let found = fx
        .resolver()
        .find("authors", "a1", &IncludeTree::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page_ids(found.primary().unwrap(), "books"), vec!["b1", "b2", "b5"]);
}

#[tokio::test]
async fn test_create_generates_an_id() {
    let fx = Fixture::new().await;
    let doc = fx
        .resolver()
        .create("tags", &json!({"attributes": {"name": "utopia"}}))
        .await
        .unwrap();
    let tag = doc.primary().unwrap();
    assert_eq!(tag.id().len(), 36);
    assert_eq!(tag.attribute("name"), Some(&Value::from("utopia")));
}

#[tokio::test]
async fn test_invalid_create_touches_nothing() {
    let fx = Fixture::new().await;
    let resolver = fx.resolver();

    let err = resolver
        .create("books", &json!({"attributes": {"title": ""}}))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let err = resolver
        .create("books", &json!({"attributes": {"pages": 10}}))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let err = resolver
        .create("books", &json!({"type": "tags", "attributes": {"title": "x"}}))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidValue);
    let err = resolver
        .create("books", &json!({"attributes": {"title": "x", "isbn": "123"}}))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownField);

    assert_eq!(count(&fx, "SELECT COUNT(*) FROM books").await, 4);
}

#[tokio::test]
async fn test_missing_reference_rolls_back() {
    let fx = Fixture::new().await;
    let payload = json!({
        "attributes": {"title": "Ghost Writer"},
        "relationships": {
            "tags": {"data": [{"type": "tags", "id": "t1"}, {"type": "tags", "id": "t99"}]}
        }
    });

    let err = fx.resolver().create("books", &payload).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingReference);
    assert_eq!(count(&fx, "SELECT COUNT(*) FROM books").await, 4);
    assert_eq!(count(&fx, "SELECT COUNT(*) FROM book_tags").await, 11);
}

#[tokio::test]
async fn test_update_changes_only_supplied_fields() {
    let fx = Fixture::new().await;
    let payload = json!({
        "data": {
            "type": "books",
            "id": "b4",
            "attributes": {"title": "Finished Draft", "pages": 90},
            "relationships": {"author": {"data": {"type": "authors", "id": "a3"}}}
        }
    });

    let doc = fx
        .resolver()
        .update("books", "b4", &payload)
        .await
        .unwrap()
        .unwrap();
    let book = doc.primary().unwrap();
    assert_eq!(book.attribute("title"), Some(&Value::from("Finished Draft")));
    assert_eq!(book.attribute("pages"), Some(&Value::Int(90)));
    assert_eq!(book.attribute("published"), Some(&Value::Null));
    assert_eq!(
        book.pointer("author").unwrap().data,
        Some(ResourceIdentifier::new("authors", "a3"))
    );
}

#[tokio::test]
async fn test_update_replaces_many_to_many_members() {
    let fx = Fixture::new().await;
    let payload = json!({
        "relationships": {"tags": {"data": [{"type": "tags", "id": "t5"}]}}
    });

    let doc = fx
        .resolver()
        .update("books", "b1", &payload)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page_ids(doc.primary().unwrap(), "tags"), vec!["t5"]);
    assert_eq!(
        count(&fx, "SELECT COUNT(*) FROM book_tags WHERE book_id = 'b1'").await,
        1
    );
}

#[tokio::test]
async fn test_update_reverse_relationship_reassigns_rows() {
    let fx = Fixture::new().await;
    let payload = json!({
        "relationships": {"books": {"data": [{"type": "books", "id": "b4"}]}}
    });

    fx.resolver()
        .update("authors", "a3", &payload)
        .await
        .unwrap()
        .unwrap();

    let resolver = fx.resolver();
    let a3 = resolver
        .find("authors", "a3", &IncludeTree::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page_ids(a3.primary().unwrap(), "books"), vec!["b4"]);
}

#[tokio::test]
async fn test_update_rejects_null_for_required_field() {
    let fx = Fixture::new().await;
    let err = fx
        .resolver()
        .update("books", "b1", &json!({"attributes": {"title": null}}))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = fx
        .resolver()
        .update("books", "b1", &json!({"id": "b2", "attributes": {"pages": 5}}))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_update_missing_row_is_none() {
    let fx = Fixture::new().await;
    let updated = fx
        .resolver()
        .update("books", "b404", &json!({"attributes": {"pages": 5}}))
        .await
        .unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn test_delete_clears_join_rows() {
    let fx = Fixture::new().await;
    let resolver = fx.resolver();

    // b2 has tags but no chapters.
    assert!(resolver.delete("books", "b2").await.unwrap());
    assert_eq!(
        count(&fx, "SELECT COUNT(*) FROM book_tags WHERE book_id = 'b2'").await,
        0
    );
    assert!(!resolver.delete("books", "b2").await.unwrap());
}

#[tokio::test]
async fn test_failed_delete_leaves_data_intact() {
    let fx = Fixture::new().await;

    // c4 still references b1, so the foreign key rejects the delete after the
    // join rows were already cleared inside the transaction.
    let err = fx.resolver().delete("books", "b1").await.unwrap_err();
    assert!(err.is_storage());
    assert_eq!(
        count(&fx, "SELECT COUNT(*) FROM book_tags WHERE book_id = 'b1'").await,
        2
    );
    assert_eq!(count(&fx, "SELECT COUNT(*) FROM books").await, 4);
}
