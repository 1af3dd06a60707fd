//! Integration tests for the service layer over the in-memory store.
//!
//! Tests: EntityService → RelationMutator → Store
//!
//! Verifies:
//! - count and find-many agree, and page windows partition the ordering
//! - relationship connect/disconnect/replace semantics
//! - lenient reference resolution on create/update
//! - SET NULL on delete
//! - concurrency failures split into NotFound (own row deleted) and fatal

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    use hotelbook_bookings::{Booking, BookingCreateInput, BookingUpdateInput, BookingWhereInput};
    use hotelbook_core::{
        Catalog, EntityDef, EntityId, FindManyArgs, IdRef, PageLimits, Predicate, Query, Row,
        SortKey,
    };
    use hotelbook_customers::{Customer, CustomerCreateInput};
    use hotelbook_hotels::{Hotel, HotelCreateInput, HotelUpdateInput, HotelWhereInput};
    use hotelbook_rooms::{Room, RoomCreateInput, RoomWhereInput};

    use crate::schema::CATALOG;
    use crate::services::{EntityService, ServiceError};
    use crate::store::{InMemoryStore, Store, StoreError, WriteBatch, WriteOp};

    struct Fixture<S> {
        hotels: EntityService<Hotel, S>,
        rooms: EntityService<Room, S>,
        bookings: EntityService<Booking, S>,
        customers: EntityService<Customer, S>,
    }

    fn fixture_over<S: Store + Clone>(store: S) -> Fixture<S> {
        let limits = PageLimits::default();
        Fixture {
            hotels: EntityService::new(store.clone(), limits),
            rooms: EntityService::new(store.clone(), limits),
            bookings: EntityService::new(store.clone(), limits),
            customers: EntityService::new(store, limits),
        }
    }

    fn fixture() -> Fixture<Arc<InMemoryStore>> {
        fixture_over(Arc::new(InMemoryStore::new(&CATALOG)))
    }

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    fn ids(list: &[&str]) -> Vec<EntityId> {
        list.iter().map(|s| id(s)).collect()
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    async fn hotel<S: Store>(f: &Fixture<S>, hotel_id: &str, name: &str, rating: f64) -> Hotel {
        f.hotels
            .create(HotelCreateInput {
                id: Some(id(hotel_id)),
                name: Some(name.to_string()),
                rating: Some(rating),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn room<S: Store>(f: &Fixture<S>, room_id: &str, hotel_id: Option<&str>) -> Room {
        f.rooms
            .create(RoomCreateInput {
                id: Some(id(room_id)),
                room_number: Some(room_id.to_uppercase()),
                hotel: hotel_id.map(IdRef::new),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn room_ids_of<S: Store>(f: &Fixture<S>, hotel_id: &str) -> Vec<EntityId> {
        f.hotels.get(&id(hotel_id)).await.unwrap().rooms
    }

    #[tokio::test]
    async fn get_hotel_of_room_then_delete_hotel_orphans_room() {
        let f = fixture();
        let h1 = hotel(&f, "h1", "Grand", 4.5).await;
        room(&f, "r1", Some("h1")).await;

        let of_room: Hotel = f.rooms.get_related(&id("r1"), "hotel").await.unwrap();
        assert_eq!(of_room.id, h1.id);
        assert_eq!(of_room.name.as_deref(), Some("Grand"));
        assert_eq!(of_room.rating, Some(4.5));
        assert_eq!(of_room.rooms, ids(&["r1"]));

        f.hotels.delete(&id("h1")).await.unwrap();
        let orphaned = f.rooms.get_related::<Hotel>(&id("r1"), "hotel").await;
        assert!(matches!(orphaned, Err(ServiceError::NotFound)));
        assert_eq!(f.rooms.get(&id("r1")).await.unwrap().hotel, None);
    }

    #[tokio::test]
    async fn update_with_only_total_price_leaves_other_fields() {
        let f = fixture();
        room(&f, "r1", None).await;
        f.customers
            .create(CustomerCreateInput { id: Some(id("c1")), ..Default::default() })
            .await
            .unwrap();
        let before = f
            .bookings
            .create(BookingCreateInput {
                id: Some(id("b1")),
                start_date: Some(at("2024-06-01T14:00:00Z")),
                end_date: Some(at("2024-06-05T10:00:00Z")),
                total_price: Some(400.0),
                room: Some(IdRef::new("r1")),
                customer: Some(IdRef::new("c1")),
                ..Default::default()
            })
            .await
            .unwrap();

        f.bookings
            .update(&id("b1"), BookingUpdateInput { total_price: Some(320.0), ..Default::default() })
            .await
            .unwrap();

        let after = f.bookings.get(&id("b1")).await.unwrap();
        assert_eq!(after.total_price, Some(320.0));
        assert_eq!(after.start_date, before.start_date);
        assert_eq!(after.end_date, before.end_date);
        assert_eq!(after.room, Some(id("r1")));
        assert_eq!(after.customer, Some(id("c1")));
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn connect_with_one_unknown_id_attaches_the_rest() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        room(&f, "r1", None).await;

        f.hotels.connect(&id("h1"), "rooms", &ids(&["r1", "r-missing"])).await.unwrap();
        assert_eq!(room_ids_of(&f, "h1").await, ids(&["r1"]));
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        room(&f, "r1", None).await;
        room(&f, "r2", None).await;

        f.hotels.connect(&id("h1"), "rooms", &ids(&["r1", "r2"])).await.unwrap();
        let once = room_ids_of(&f, "h1").await;
        f.hotels.connect(&id("h1"), "rooms", &ids(&["r1", "r2"])).await.unwrap();
        assert_eq!(room_ids_of(&f, "h1").await, once);
        assert_eq!(once, ids(&["r1", "r2"]));
    }

    #[tokio::test]
    async fn connect_fails_when_nothing_resolves_or_source_missing() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        room(&f, "r1", None).await;

        let none = f.hotels.connect(&id("h1"), "rooms", &ids(&["nope"])).await;
        assert!(matches!(none, Err(ServiceError::NotFound)));
        let empty = f.hotels.connect(&id("h1"), "rooms", &[]).await;
        assert!(matches!(empty, Err(ServiceError::NotFound)));
        let source = f.hotels.connect(&id("h9"), "rooms", &ids(&["r1"])).await;
        assert!(matches!(source, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn disconnect_of_unconnected_rooms_is_a_noop() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        hotel(&f, "h2", "Plaza", 3.0).await;
        room(&f, "r1", Some("h1")).await;
        room(&f, "r2", Some("h2")).await;

        f.hotels.disconnect(&id("h1"), "rooms", &ids(&["r2", "ghost"])).await.unwrap();
        assert_eq!(room_ids_of(&f, "h1").await, ids(&["r1"]));
        assert_eq!(room_ids_of(&f, "h2").await, ids(&["r2"]));

        f.hotels.disconnect(&id("h1"), "rooms", &ids(&["r1"])).await.unwrap();
        assert!(room_ids_of(&f, "h1").await.is_empty());
    }

    #[tokio::test]
    async fn replace_all_semantics() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        room(&f, "r1", Some("h1")).await;
        room(&f, "r2", Some("h1")).await;
        room(&f, "r3", None).await;

        f.hotels.replace_all(&id("h1"), "rooms", &ids(&["r2", "r3", "ghost"])).await.unwrap();
        assert_eq!(room_ids_of(&f, "h1").await, ids(&["r2", "r3"]));
        assert_eq!(f.rooms.get(&id("r1")).await.unwrap().hotel, None);

        let invalid = f.hotels.replace_all(&id("h1"), "rooms", &ids(&["ghost"])).await;
        assert!(matches!(invalid, Err(ServiceError::NotFound)));
        assert_eq!(room_ids_of(&f, "h1").await, ids(&["r2", "r3"]));

        f.hotels.replace_all(&id("h1"), "rooms", &[]).await.unwrap();
        assert!(room_ids_of(&f, "h1").await.is_empty());
    }

    #[tokio::test]
    async fn relation_names_are_checked() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        let err = f.hotels.connect(&id("h1"), "bookings", &ids(&["b1"])).await;
        assert!(matches!(err, Err(ServiceError::Validation(_))));
        let err = f.rooms.connect(&id("r1"), "hotel", &ids(&["h1"])).await;
        assert!(matches!(err, Err(ServiceError::NotFound) | Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn create_is_lenient_about_references() {
        let f = fixture();
        let r = f
            .rooms
            .create(RoomCreateInput {
                hotel: Some(IdRef::new("no-such-hotel")),
                bookings: Some(vec![IdRef::new("no-such-booking")]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(r.hotel, None);
        assert!(r.bookings.is_empty());
        assert!(!r.id.as_str().is_empty());
        assert_eq!(r.created_at, r.updated_at);
    }

    #[tokio::test]
    async fn create_attaches_children_and_moves_them_from_other_parents() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        room(&f, "r1", Some("h1")).await;
        room(&f, "r2", None).await;

        let h2 = f
            .hotels
            .create(HotelCreateInput {
                id: Some(id("h2")),
                rooms: Some(vec![IdRef::new("r1"), IdRef::new("r2")]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(h2.rooms, ids(&["r1", "r2"]));
        assert!(room_ids_of(&f, "h1").await.is_empty());
    }

    #[tokio::test]
    async fn update_replaces_has_many_and_keeps_unsupplied_fields() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        room(&f, "r1", Some("h1")).await;
        room(&f, "r2", None).await;

        f.hotels
            .update(
                &id("h1"),
                HotelUpdateInput { rooms: Some(ids(&["r2", "ghost"])), ..Default::default() },
            )
            .await
            .unwrap();
        let h1 = f.hotels.get(&id("h1")).await.unwrap();
        assert_eq!(h1.rooms, ids(&["r2"]));
        assert_eq!(h1.name.as_deref(), Some("Grand"));
        assert_eq!(h1.rating, Some(4.5));
    }

    #[tokio::test]
    async fn duplicate_id_is_a_conflict() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        let dup = f
            .hotels
            .create(HotelCreateInput { id: Some(id("h1")), ..Default::default() })
            .await;
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let f = fixture();
        assert!(matches!(f.hotels.get(&id("x")).await, Err(ServiceError::NotFound)));
        assert!(matches!(
            f.hotels.update(&id("x"), HotelUpdateInput::default()).await,
            Err(ServiceError::NotFound)
        ));
        assert!(matches!(f.hotels.delete(&id("x")).await, Err(ServiceError::NotFound)));
        assert!(matches!(
            f.bookings.get_related::<Customer>(&id("x"), "customer").await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn null_single_reference_is_not_found() {
        let f = fixture();
        f.bookings
            .create(BookingCreateInput { id: Some(id("b1")), ..Default::default() })
            .await
            .unwrap();
        let customer = f.bookings.get_related::<Customer>(&id("b1"), "customer").await;
        assert!(matches!(customer, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn find_related_filters_sorts_and_requires_source() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        hotel(&f, "h2", "Plaza", 3.0).await;
        for (rid, hid, price) in [("r1", "h1", 90.0), ("r2", "h1", 150.0), ("r3", "h2", 150.0)] {
            f.rooms
                .create(RoomCreateInput {
                    id: Some(id(rid)),
                    price: Some(price),
                    type_field: Some("double".into()),
                    hotel: Some(IdRef::new(hid)),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let args = FindManyArgs::filtered(RoomWhereInput {
            type_field: Some("double".into()),
            ..Default::default()
        })
        .sorted(SortKey::desc("price"));
        let rooms: Vec<Room> = f.hotels.find_related(&id("h1"), "rooms", &args).await.unwrap();
        let got: Vec<_> = rooms.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec!["r2", "r1"]);

        let missing = f.hotels.find_related::<Room>(&id("h9"), "rooms", &args).await;
        assert!(matches!(missing, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn find_many_by_relation_and_meta() {
        let f = fixture();
        hotel(&f, "h1", "Grand", 4.5).await;
        hotel(&f, "h2", "Plaza", 4.5).await;
        room(&f, "r1", Some("h2")).await;

        let by_room = FindManyArgs::filtered(HotelWhereInput {
            rooms: Some(ids(&["r1"])),
            ..Default::default()
        });
        let found = f.hotels.find_many(&by_room).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id("h2"));

        let rated = HotelWhereInput { rating: Some(4.5), ..Default::default() };
        assert_eq!(f.hotels.meta(Some(&rated)).await.unwrap(), 2);
        assert_eq!(f.hotels.meta(None).await.unwrap(), 2);

        let by_booking = FindManyArgs::filtered(BookingWhereInput {
            room: Some(id("r1")),
            ..Default::default()
        });
        assert!(f.bookings.find_many(&by_booking).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_sort_field_is_a_validation_error() {
        let f = fixture();
        let args = FindManyArgs::<HotelWhereInput>::default().sorted(SortKey::asc("stars"));
        assert!(matches!(f.hotels.find_many(&args).await, Err(ServiceError::Validation(_))));
    }

    /// Runs a competing batch right before every commit it forwards.
    #[derive(Clone)]
    struct RacingStore {
        inner: Arc<InMemoryStore>,
        race: Arc<std::sync::Mutex<Option<WriteBatch>>>,
    }

    impl RacingStore {
        fn arm(&self, batch: WriteBatch) {
            *self.race.lock().unwrap() = Some(batch);
        }
    }

    #[async_trait::async_trait]
    impl Store for RacingStore {
        fn catalog(&self) -> &'static Catalog {
            self.inner.catalog()
        }

        async fn find(&self, def: &'static EntityDef, query: &Query) -> Result<Vec<Row>, StoreError> {
            self.inner.find(def, query).await
        }

        async fn count(
            &self,
            def: &'static EntityDef,
            predicate: &Predicate,
        ) -> Result<u64, StoreError> {
            self.inner.count(def, predicate).await
        }

        async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
            let race = self.race.lock().unwrap().take();
            if let Some(race) = race {
                self.inner.commit(race).await?;
            }
            self.inner.commit(batch).await
        }
    }

    fn racing() -> (RacingStore, Fixture<RacingStore>) {
        let store = RacingStore {
            inner: Arc::new(InMemoryStore::new(&CATALOG)),
            race: Arc::new(std::sync::Mutex::new(None)),
        };
        (store.clone(), fixture_over(store))
    }

    #[tokio::test]
    async fn update_racing_a_delete_is_not_found() {
        let (store, f) = racing();
        hotel(&f, "h1", "Grand", 4.5).await;

        let mut delete = WriteBatch::new();
        delete.push(WriteOp::Delete { def: &hotelbook_hotels::HOTEL, id: id("h1") });
        store.arm(delete);

        let result = f
            .hotels
            .update(&id("h1"), HotelUpdateInput { rating: Some(1.0), ..Default::default() })
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn update_racing_another_write_is_fatal() {
        let (store, f) = racing();
        hotel(&f, "h1", "Grand", 4.5).await;

        let mut bump = WriteBatch::new();
        bump.push(WriteOp::Touch { def: &hotelbook_hotels::HOTEL, id: id("h1"), expected_version: 1 });
        store.arm(bump);

        let result = f
            .hotels
            .update(&id("h1"), HotelUpdateInput { rating: Some(1.0), ..Default::default() })
            .await;
        assert!(matches!(result, Err(ServiceError::Concurrency(_))));
        assert_eq!(f.hotels.get(&id("h1")).await.unwrap().rating, Some(4.5));
    }

    #[tokio::test]
    async fn connect_racing_a_target_delete_is_fatal() {
        let (store, f) = racing();
        hotel(&f, "h1", "Grand", 4.5).await;
        room(&f, "r1", None).await;

        let mut delete = WriteBatch::new();
        delete.push(WriteOp::Delete { def: &hotelbook_rooms::ROOM, id: id("r1") });
        store.arm(delete);

        let result = f.hotels.connect(&id("h1"), "rooms", &ids(&["r1"])).await;
        assert!(matches!(result, Err(ServiceError::Concurrency(_))));
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread().build().unwrap()
    }

    async fn seed_hotels(f: &Fixture<Arc<InMemoryStore>>, ratings: &[Option<u8>]) {
        for (i, rating) in ratings.iter().enumerate() {
            f.hotels
                .create(HotelCreateInput {
                    id: Some(id(&format!("h{i:03}"))),
                    name: Some(if i % 2 == 0 { "even" } else { "odd" }.to_string()),
                    rating: rating.map(f64::from),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn count_matches_unpaged_find_many(
            ratings in proptest::collection::vec(proptest::option::of(1u8..4), 0..30),
            filter_rating in proptest::option::of(1u8..4),
            filter_name in proptest::option::of(prop_oneof![Just("even"), Just("odd")]),
        ) {
            let rt = runtime();
            let (count, found) = rt.block_on(async {
                let f = fixture();
                seed_hotels(&f, &ratings).await;
                let filter = HotelWhereInput {
                    rating: filter_rating.map(f64::from),
                    name: filter_name.map(str::to_string),
                    ..Default::default()
                };
                let count = f.hotels.meta(Some(&filter)).await.unwrap();
                let args = FindManyArgs::filtered(filter).page(0, ratings.len() as u32);
                let found = f.hotels.find_many(&args).await.unwrap();
                (count, found.len())
            });
            prop_assert_eq!(count as usize, found);
        }

        #[test]
        fn page_windows_partition_the_sorted_result(
            ratings in proptest::collection::vec(proptest::option::of(1u8..4), 0..30),
            take in 1u32..6,
        ) {
            let rt = runtime();
            let (paged, full) = rt.block_on(async {
                let f = fixture();
                seed_hotels(&f, &ratings).await;
                let base = FindManyArgs::<HotelWhereInput>::default().sorted(SortKey::desc("rating"));
                let full: Vec<EntityId> = f
                    .hotels
                    .find_many(&base.clone().page(0, 1000))
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|h| h.id)
                    .collect();

                let mut paged = Vec::new();
                let mut skip = 0;
                loop {
                    let page = f.hotels.find_many(&base.clone().page(skip, take)).await.unwrap();
                    if page.is_empty() {
                        break;
                    }
                    paged.extend(page.into_iter().map(|h| h.id));
                    skip += take;
                }
                (paged, full)
            });
            prop_assert_eq!(full.len(), ratings.len());
            prop_assert_eq!(paged, full);
        }
    }
}
