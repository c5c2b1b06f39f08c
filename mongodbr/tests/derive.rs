use mongodbr::{
    Entity,
    bson::{doc, oid::ObjectId},
    memory::InMemoryRepository,
    prelude::*,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct User {
    #[serde(rename = "_id")]
    id: ObjectId,
    name: String,
    age: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
struct Order {
    #[entity(id)]
    #[serde(rename = "_id")]
    order_id: ObjectId,
    total: i64,
}

fn user(name: &str, age: i32) -> User {
    User { id: ObjectId::new(), name: name.to_string(), age }
}

#[test]
fn derive_uses_the_id_field() {
    let ada = user("ada", 36);

    assert_eq!(ada.object_id(), ada.id);
}

#[test]
fn derive_honors_the_id_attribute() {
    let order = Order { order_id: ObjectId::new(), total: 12 };
    let erased: &dyn AnyEntity = &order;

    assert_eq!(erased.entity_id(), order.order_id);
    assert_eq!(erased.downcast_ref::<Order>(), Some(&order));
}

#[test]
fn derived_entities_convert_through_documents() {
    let order = Order { order_id: ObjectId::new(), total: 12 };

    let document = order.to_document().unwrap();
    assert_eq!(document, doc! { "_id": order.order_id, "total": 12i64 });
    assert_eq!(Order::from_document(document).unwrap(), order);
}

#[tokio::test]
async fn derived_entities_round_trip_through_a_repository() {
    let users = InMemoryRepository::builder("users").build().await.unwrap();
    let ada = user("ada", 36);
    let grace = user("grace", 45);

    let ids = users.create_many_entities(&[ada.clone(), grace.clone()], None).await.unwrap();
    assert_eq!(ids, vec![ada.id, grace.id]);

    let found: Option<User> = users.find_by_object_id(grace.id).one().await.unwrap();
    assert_eq!(found, Some(grace));

    let older: Vec<User> = users
        .find_by_filter(doc! { "age": { "$gt": 40 } }, Vec::new())
        .all()
        .await
        .unwrap();
    assert_eq!(older.len(), 1);
}

#[tokio::test]
async fn repositories_work_behind_generic_code() {
    async fn rename<R: Repository>(repository: &R, id: ObjectId, name: &str) -> RepositoryResult<()> {
        repository
            .update_one(doc! { "_id": id }, doc! { "$set": { "name": name } }, None)
            .await
    }

    let users = InMemoryRepository::new("users");
    let ada = user("ada", 36);
    users.create_entity(&ada, None).await.unwrap();

    rename(&users, ada.id, "countess").await.unwrap();

    let renamed: Option<User> = users.find_by_object_id(ada.id).one().await.unwrap();
    assert_eq!(renamed.map(|u| u.name), Some("countess".to_string()));
}

#[tokio::test]
async fn lazy_stream_decodes_one_entity_at_a_time() {
    let users = InMemoryRepository::new("users");
    users
        .create_many_entities(&[user("ada", 36), user("grace", 45), user("alan", 41)], None)
        .await
        .unwrap();

    let names = users
        .find_all(vec![FindOption::with_sort(doc! { "age": 1 })])
        .stream::<User>()
        .await
        .unwrap()
        .map_ok(|user| user.name)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(names, vec!["ada", "alan", "grace"]);
}
