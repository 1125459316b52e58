//! Compiled filters executed against SQLite.

mod common;

use common::{Fixture, primary_ids};
use pretty_assertions::assert_eq;
use weave::error::ErrorCode;
use weave::prelude::*;

async fn ids(fx: &Fixture, type_name: &str, params: &str) -> Vec<String> {
    let query = fx.query(type_name, params).unwrap();
    let doc = fx.resolver().list(type_name, &query).await.unwrap();
    primary_ids(&doc)
}

#[tokio::test]
async fn test_attribute_comparisons() {
    let fx = Fixture::new().await;

    assert_eq!(ids(&fx, "books", "pages__gt=200").await, vec!["b3", "b2"]);
    assert_eq!(ids(&fx, "books", "pages__lt=200").await, vec!["b1"]);
    assert_eq!(ids(&fx, "books", "pages=412").await, vec!["b3"]);
    assert_eq!(ids(&fx, "books", "pages__is_null=true").await, vec!["b4"]);
    assert_eq!(
        ids(&fx, "books", "pages__is_null=false").await,
        vec!["b1", "b3", "b2"]
    );
}

#[tokio::test]
async fn test_decimals_compare_numerically() {
    let fx = Fixture::new().await;

    // Stored as text, so a string comparison would put "9.99" above "10".
    assert_eq!(ids(&fx, "books", "price__gt=10").await, vec!["b3", "b2"]);
    assert_eq!(ids(&fx, "books", "price__lt=10").await, vec!["b1"]);
    assert_eq!(ids(&fx, "books", "price=9.990").await, vec!["b1"]);
    assert_eq!(ids(&fx, "books", "price=15").await, vec!["b3"]);
    assert_eq!(
        ids(&fx, "books", "sort=price").await,
        vec!["b4", "b1", "b2", "b3"]
    );
    assert_eq!(
        ids(&fx, "books", "sort=-price").await,
        vec!["b3", "b2", "b1", "b4"]
    );
}

#[tokio::test]
async fn test_equal_bounds_are_allowed() {
    let fx = Fixture::new().await;
    assert!(ids(&fx, "books", "pages__gt=183&pages__lt=183").await.is_empty());
}

#[tokio::test]
async fn test_temporal_and_textual_suffixes() {
    let fx = Fixture::new().await;

    assert_eq!(ids(&fx, "books", "published__before=1966-01-01").await, vec!["b3"]);
    assert_eq!(ids(&fx, "books", "published__after=1968-12-31").await, vec!["b2"]);
    assert_eq!(ids(&fx, "books", "title__contains=of").await, vec!["b1", "b2"]);
    assert_eq!(ids(&fx, "books", "title__length__lt=5").await, vec!["b3"]);
    assert_eq!(ids(&fx, "books", "title__length=14").await, vec!["b4"]);
    // Wildcards in the needle match literally.
    assert!(ids(&fx, "books", "title__contains=%25").await.is_empty());
}

#[tokio::test]
async fn test_conflicting_filters_fail_before_any_query() {
    let fx = Fixture::new().await;

    let err = fx.query("books", "pages=1&pages__is_null=true").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFilter);
    let err = fx
        .query("books", "published__before=2000-01-01&published__after=2001-01-01")
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFilter);
    let err = fx.query("books", "author=a1&author__is_null=true").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFilter);

    assert_eq!(fx.store.queries(), 0);
}

#[tokio::test]
async fn test_malformed_literals_are_rejected() {
    let fx = Fixture::new().await;

    let err = fx.query("books", "pages__gt=many").unwrap_err();
    assert!(err.is_validation());
    let err = fx.query("books", "published__before=yesterday").unwrap_err();
    assert!(err.is_validation());
    let err = fx.query("books", "pages__is_null=maybe").unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_direct_relationship_filters() {
    let fx = Fixture::new().await;

    assert_eq!(ids(&fx, "books", "author=a1").await, vec!["b1", "b2"]);
    assert_eq!(ids(&fx, "books", "author__is_null=true").await, vec!["b4"]);
    assert_eq!(ids(&fx, "chapters", "book=b3").await, vec!["c1", "c2", "c3"]);
}

#[tokio::test]
async fn test_collection_relationship_filters() {
    let fx = Fixture::new().await;

    assert_eq!(ids(&fx, "books", "tags__contains=t1").await, vec!["b1", "b3"]);
    assert_eq!(ids(&fx, "books", "tags__contains=t1,t3").await, vec!["b3"]);
    assert_eq!(ids(&fx, "books", "tags__excludes=t1").await, vec!["b2", "b4"]);
    assert_eq!(ids(&fx, "books", "tags__count__gt=2").await, vec!["b3"]);
    assert_eq!(ids(&fx, "books", "tags__count=0").await, vec!["b4"]);
    assert_eq!(ids(&fx, "authors", "books__count=0").await, vec!["a3"]);
    assert_eq!(ids(&fx, "authors", "books__contains=b2").await, vec!["a1"]);

    // Polymorphic reverse links only count rows typed as the owner.
    assert_eq!(ids(&fx, "books", "comments__count=2").await, vec!["b3"]);
    assert_eq!(ids(&fx, "authors", "comments__contains=m2").await, vec!["a1"]);
    assert!(ids(&fx, "authors", "comments__contains=m1").await.is_empty());
}

#[tokio::test]
async fn test_collection_exact_match_is_set_equality() {
    let fx = Fixture::new().await;

    // b3 also carries t3 and t4, so only b2 matches exactly.
    assert_eq!(ids(&fx, "books", "tags=t4,t3").await, vec!["b2"]);
    assert!(ids(&fx, "books", "tags=t3").await.is_empty());
}

#[tokio::test]
async fn test_count_bounds_must_overlap() {
    let fx = Fixture::new().await;
    let err = fx
        .query("books", "tags__count__lt=1&tags__count__gt=3")
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFilter);
    let err = fx.query("books", "tags__count=-1").unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_polymorphic_filters() {
    let fx = Fixture::new().await;

    assert_eq!(ids(&fx, "comments", "subject=books:b3&sort=id").await, vec!["m1", "m4"]);
    assert_eq!(ids(&fx, "comments", "subject__type=authors").await, vec!["m2"]);
    assert_eq!(ids(&fx, "comments", "subject__is_null=true").await, vec!["m3"]);

    let err = fx.query("comments", "subject=tags:t1").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFilter);
    let err = fx.query("comments", "subject=b3").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFilter);
}

#[tokio::test]
async fn test_id_filter_and_sort() {
    let fx = Fixture::new().await;

    assert_eq!(ids(&fx, "books", "id=b3,b1").await, vec!["b1", "b3"]);
    assert_eq!(ids(&fx, "books", "sort=-title").await, vec!["b4", "b2", "b3", "b1"]);
    assert_eq!(
        ids(&fx, "chapters", "sort=-position,title").await,
        vec!["c3", "c2", "c1", "c4"]
    );
}

#[tokio::test]
async fn test_unknown_parameters_are_rejected() {
    let fx = Fixture::new().await;

    let err = fx.query("books", "colour=red").unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownField);
    let err = fx.query("books", "pages__gte=3").unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownField);
    let err = fx.query("books", "sort=colour").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidSort);
    let err = fx.query("books", "include=publisher").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInclude);
}

#[tokio::test]
async fn test_filters_combine_with_pagination() {
    let fx = Fixture::new().await;
    let query = fx.query("books", "author=a1&page[size]=1&page[offset]=2").unwrap();
    let doc = fx.resolver().list("books", &query).await.unwrap();

    assert_eq!(primary_ids(&doc), vec!["b2"]);
    let links = doc.links.unwrap();
    assert_eq!(links.prev.as_deref(), Some("/books?page[offset]=1&page[size]=1"));
    assert_eq!(links.next, None);
}
