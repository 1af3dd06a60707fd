use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelbook_core::{
    Changeset, DomainResult, Entity, EntityDef, EntityId, FieldDef, IdRef, Predicate,
    RelationDef, Row, WhereInput,
};

pub static ROOM: EntityDef = EntityDef {
    name: "Room",
    table: "rooms",
    fields: &[
        FieldDef::timestamp("created_at", "createdAt").required(),
        FieldDef::timestamp("updated_at", "updatedAt").required(),
        FieldDef::float("price", "price"),
        FieldDef::text("room_number", "roomNumber"),
        FieldDef::text("type_field", "typeField"),
    ],
    relations: &[
        RelationDef::belongs_to("hotel", "hotels", "hotel_id"),
        RelationDef::has_many("bookings", "bookings", "room_id"),
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub price: Option<f64>,
    pub room_number: Option<String>,
    pub type_field: Option<String>,
    /// Owning hotel id, if any.
    pub hotel: Option<EntityId>,
    pub bookings: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreateInput {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub room_number: Option<String>,
    pub type_field: Option<String>,
    pub hotel: Option<IdRef>,
    pub bookings: Option<Vec<IdRef>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdateInput {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub room_number: Option<String>,
    pub type_field: Option<String>,
    pub hotel: Option<EntityId>,
    pub bookings: Option<Vec<EntityId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomWhereInput {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub room_number: Option<String>,
    pub type_field: Option<String>,
    pub hotel: Option<EntityId>,
    pub bookings: Option<Vec<EntityId>>,
}

impl WhereInput for RoomWhereInput {
    fn to_predicate(&self) -> Predicate {
        Predicate::builder()
            .eq("id", self.id.clone())
            .eq("created_at", self.created_at)
            .eq("updated_at", self.updated_at)
            .eq("price", self.price)
            .eq("room_number", self.room_number.clone())
            .eq("type_field", self.type_field.clone())
            .related("hotel", self.hotel.clone().map(|id| vec![id]))
            .related("bookings", self.bookings.clone())
            .build()
    }
}

impl Entity for Room {
    type Create = RoomCreateInput;
    type Update = RoomUpdateInput;
    type Where = RoomWhereInput;

    fn definition() -> &'static EntityDef {
        &ROOM
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_row(row: &Row) -> DomainResult<Self> {
        Ok(Self {
            id: row.id().clone(),
            created_at: row.required_timestamp("created_at")?,
            updated_at: row.required_timestamp("updated_at")?,
            price: row.float("price")?,
            room_number: row.text("room_number")?,
            type_field: row.text("type_field")?,
            hotel: row.reference("hotel_id"),
            bookings: row.related("bookings"),
        })
    }

    fn create_changeset(input: RoomCreateInput, now: DateTime<Utc>) -> Changeset {
        Changeset::new()
            .with_id(input.id)
            .set("created_at", input.created_at.unwrap_or(now))
            .set("updated_at", input.updated_at.unwrap_or(now))
            .set("price", input.price)
            .set("room_number", input.room_number)
            .set("type_field", input.type_field)
            .link_one("hotel", input.hotel.map(|r| r.id))
            .link_many("bookings", input.bookings.map(IdRef::into_ids))
    }

    fn update_changeset(input: RoomUpdateInput) -> Changeset {
        Changeset::new()
            .set_opt("created_at", input.created_at)
            .set_opt("updated_at", input.updated_at)
            .set_opt("price", input.price)
            .set_opt("room_number", input.room_number)
            .set_opt("type_field", input.type_field)
            .link_one("hotel", input.hotel)
            .link_many("bookings", input.bookings)
    }
}
