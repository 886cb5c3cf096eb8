//! Runs the Postgres stores against a real database. Needs `DATABASE_URL`;
//! run with `cargo test -- --ignored`.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use eventor_server::db::PgStore;
use eventor_server::models::{Event, EventPatch, NewEvent, NewUser};
use eventor_server::store::{
    Admission, EventStore, EventUpdate, ReservationStore, UserInsert, UserStore,
};

async fn seed(store: &PgStore, max: Option<i32>) -> (Uuid, Event) {
    let UserInsert::Created(user) = store
        .insert_user(NewUser {
            username: format!("user{}", Uuid::new_v4().simple()),
            email: format!("{}@example.com", Uuid::new_v4().simple()),
            password_hash: "hash".into(),
        })
        .await
        .unwrap()
    else {
        panic!("user was not created");
    };

    let event = store
        .insert_event(NewEvent {
            creator_id: user.id,
            title: "Rust meetup".into(),
            description: None,
            max_reservations: max,
            start_date: Utc::now() + Duration::days(1),
            end_date: None,
        })
        .await
        .unwrap();
    (user.id, event)
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn concurrent_admissions_stop_at_capacity(pool: PgPool) {
    let store = PgStore::new(pool);
    let (_, event) = seed(&store, Some(3)).await;

    let attempts: Vec<_> = (0..12)
        .map(|n| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .admit(event.id, &format!("guest{n}@example.com"), "Guest")
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut admitted = 0;
    let mut full = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Admission::Admitted { .. } => admitted += 1,
            Admission::CapacityReached => full += 1,
            Admission::EventNotFound => panic!("event vanished"),
        }
    }
    assert_eq!((admitted, full), (3, 9));

    let event = store.find_event(event.id).await.unwrap().unwrap();
    assert_eq!(event.amount_reservations, 3);
    assert_eq!(store.reservations_for_event(event.id).await.unwrap().len(), 3);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn admit_unknown_event(pool: PgPool) {
    let store = PgStore::new(pool);
    assert_eq!(
        store
            .admit(Uuid::new_v4(), "guest@example.com", "Guest")
            .await
            .unwrap(),
        Admission::EventNotFound
    );
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn conditional_update_guards_capacity(pool: PgPool) {
    let store = PgStore::new(pool);
    let (owner, event) = seed(&store, Some(5)).await;
    store.admit(event.id, "a@example.com", "A").await.unwrap();
    store.admit(event.id, "b@example.com", "B").await.unwrap();

    let lower = EventPatch {
        max_reservations: Some(Some(1)),
        ..Default::default()
    };
    assert_eq!(
        store.update_event(event.id, owner, lower).await.unwrap(),
        EventUpdate::BelowCurrentAmount
    );

    let stranger = EventPatch {
        title: Some("Hijacked event".into()),
        ..Default::default()
    };
    assert_eq!(
        store.update_event(event.id, Uuid::new_v4(), stranger).await.unwrap(),
        EventUpdate::NotFound
    );

    let unlimited = EventPatch {
        max_reservations: Some(None),
        title: Some("Rust meetup #2".into()),
        ..Default::default()
    };
    let EventUpdate::Updated(updated) = store.update_event(event.id, owner, unlimited).await.unwrap()
    else {
        panic!("owner update was refused");
    };
    assert_eq!(updated.max_reservations, None);
    assert_eq!(updated.title, "Rust meetup #2");
    assert_eq!(updated.amount_reservations, 2);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn delete_cascades_to_reservations(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let (owner, event) = seed(&store, None).await;
    store.admit(event.id, "a@example.com", "A").await.unwrap();
    store.admit(event.id, "b@example.com", "B").await.unwrap();

    assert!(!store.delete_event(event.id, Uuid::new_v4()).await.unwrap());
    assert!(store.delete_event(event.id, owner).await.unwrap());

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE event_id = $1")
        .bind(event.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orphans, 0);
    assert!(store.find_event(event.id).await.unwrap().is_none());
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn owner_listing_pages_by_cursor(pool: PgPool) {
    let store = PgStore::new(pool);
    let (owner, event) = seed(&store, None).await;
    let (_, other) = seed(&store, None).await;
    for n in 0..5 {
        store
            .admit(event.id, &format!("guest{n}@example.com"), "Guest")
            .await
            .unwrap();
    }
    store.admit(other.id, "x@example.com", "X").await.unwrap();

    let first = store.reservations_by_owner(owner, None, 3).await.unwrap();
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|r| r.event_id == event.id));

    let rest = store
        .reservations_by_owner(owner, Some(first[2].created_at), 3)
        .await
        .unwrap();
    assert_eq!(rest.len(), 2);
    assert!(rest.iter().all(|r| r.event_id == event.id));
}
