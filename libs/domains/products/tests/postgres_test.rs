//! PostgreSQL store tests
//!
//! Run against a throwaway container via testcontainers.

use domain_products::*;
use rust_decimal::Decimal;
use test_utils::{TestDataBuilder, TestDatabase, assertions::*};
use uuid::Uuid;

fn product(owner: Uuid, name: &str, price: i64) -> Product {
    Product::new(
        owner,
        CreateProduct {
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            price: Decimal::from(price),
            is_available: true,
        },
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_add_and_get_keeps_decimal_price() {
    let db = TestDatabase::with_migrator::<migration::ProductsMigrator>().await;
    let store = PgProductStore::new(db.connection());
    let owner = TestDataBuilder::from_test_name("pg_add_get").user_id();

    let mut input = product(owner, "Lamp", 0);
    input.price = Decimal::new(1999, 2);
    let created = store.add(input).await.unwrap();

    let fetched = assert_some(store.get_by_id(created.id).await.unwrap(), "product");
    assert_uuid_eq(fetched.owner_id, owner, "owner");
    assert_eq!(fetched.price, Decimal::new(1999, 2));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_owner_guard_leaves_row_untouched() {
    let db = TestDatabase::with_migrator::<migration::ProductsMigrator>().await;
    let store = PgProductStore::new(db.connection());
    let builder = TestDataBuilder::from_test_name("pg_owner_guard");
    let owner = builder.user_id();

    let created = store.add(product(owner, "Lamp", 10)).await.unwrap();

    let result = store
        .update_owned(
            created.id,
            Uuid::new_v4(),
            UpdateProduct {
                name: Some("Stolen".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(ProductError::Forbidden)));

    let missing = store.soft_delete_owned(Uuid::new_v4(), owner).await;
    assert!(matches!(missing, Err(ProductError::NotFound(_))));

    let fetched = assert_some(store.get_by_id(created.id).await.unwrap(), "product");
    assert_eq!(fetched.name, "Lamp");
    assert!(!fetched.is_deleted);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_bulk_toggle_and_filters() {
    let db = TestDatabase::with_migrator::<migration::ProductsMigrator>().await;
    let store = PgProductStore::new(db.connection());
    let owner = TestDataBuilder::from_test_name("pg_bulk").user_id();
    let other = Uuid::new_v4();

    store.add(product(owner, "Coffee Mug", 10)).await.unwrap();
    store.add(product(owner, "Tea Pot", 30)).await.unwrap();
    store.add(product(other, "Mug Rack", 20)).await.unwrap();

    let search = store
        .list(ProductFilter {
            search_term: Some("MUG".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(search.len(), 2);

    let priced = store
        .list(ProductFilter {
            min_price: Some(Decimal::from(15)),
            max_price: Some(Decimal::from(25)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(priced.len(), 1);

    assert_eq!(store.set_deleted_by_owner(owner, true).await.unwrap(), 2);
    assert_eq!(store.set_deleted_by_owner(owner, true).await.unwrap(), 0);
    assert!(store.list(ProductFilter::for_owner(owner)).await.unwrap().is_empty());
    assert_eq!(store.list(ProductFilter::for_owner(other)).await.unwrap().len(), 1);

    assert_eq!(store.set_deleted_by_owner(owner, false).await.unwrap(), 2);
    assert_eq!(store.list(ProductFilter::for_owner(owner)).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_search_treats_wildcards_literally() {
    let db = TestDatabase::with_migrator::<migration::ProductsMigrator>().await;
    let store = PgProductStore::new(db.connection());
    let owner = TestDataBuilder::from_test_name("pg_search_literal").user_id();

    store.add(product(owner, "Mug 100% cotton", 10)).await.unwrap();
    store.add(product(owner, "Tea_Pot", 10)).await.unwrap();
    store.add(product(owner, "Lamp", 10)).await.unwrap();

    let search = |term: &str| ProductFilter {
        search_term: Some(term.into()),
        ..ProductFilter::for_owner(owner)
    };

    assert_eq!(store.list(search("%")).await.unwrap().len(), 1);
    assert_eq!(store.list(search("_")).await.unwrap().len(), 1);
    assert_eq!(store.list(search("tea_pot")).await.unwrap().len(), 1);
    assert!(store.list(search("tea%pot")).await.unwrap().is_empty());
}
