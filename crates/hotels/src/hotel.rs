use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelbook_core::{
    Changeset, DomainResult, Entity, EntityDef, EntityId, FieldDef, IdRef, Predicate,
    RelationDef, Row, WhereInput,
};

pub static HOTEL: EntityDef = EntityDef {
    name: "Hotel",
    table: "hotels",
    fields: &[
        FieldDef::timestamp("created_at", "createdAt").required(),
        FieldDef::timestamp("updated_at", "updatedAt").required(),
        FieldDef::text("location", "location"),
        FieldDef::text("name", "name"),
        FieldDef::float("rating", "rating"),
    ],
    relations: &[RelationDef::has_many("rooms", "rooms", "hotel_id")],
};

/// Hotel as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub rating: Option<f64>,
    pub rooms: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelCreateInput {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub rating: Option<f64>,
    pub rooms: Option<Vec<IdRef>>,
}

/// Partial update: absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelUpdateInput {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub rating: Option<f64>,
    pub rooms: Option<Vec<EntityId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HotelWhereInput {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub rating: Option<f64>,
    pub rooms: Option<Vec<EntityId>>,
}

impl WhereInput for HotelWhereInput {
    fn to_predicate(&self) -> Predicate {
        Predicate::builder()
            .eq("id", self.id.clone())
            .eq("created_at", self.created_at)
            .eq("updated_at", self.updated_at)
            .eq("location", self.location.clone())
            .eq("name", self.name.clone())
            .eq("rating", self.rating)
            .related("rooms", self.rooms.clone())
            .build()
    }
}

impl Entity for Hotel {
    type Create = HotelCreateInput;
    type Update = HotelUpdateInput;
    type Where = HotelWhereInput;

    fn definition() -> &'static EntityDef {
        &HOTEL
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_row(row: &Row) -> DomainResult<Self> {
        Ok(Self {
            id: row.id().clone(),
            created_at: row.required_timestamp("created_at")?,
            updated_at: row.required_timestamp("updated_at")?,
            location: row.text("location")?,
            name: row.text("name")?,
            rating: row.float("rating")?,
            rooms: row.related("rooms"),
        })
    }

    fn create_changeset(input: HotelCreateInput, now: DateTime<Utc>) -> Changeset {
        Changeset::new()
            .with_id(input.id)
            .set("created_at", input.created_at.unwrap_or(now))
            .set("updated_at", input.updated_at.unwrap_or(now))
            .set("location", input.location)
            .set("name", input.name)
            .set("rating", input.rating)
            .link_many("rooms", input.rooms.map(IdRef::into_ids))
    }

    fn update_changeset(input: HotelUpdateInput) -> Changeset {
        Changeset::new()
            .set_opt("created_at", input.created_at)
            .set_opt("updated_at", input.updated_at)
            .set_opt("location", input.location)
            .set_opt("name", input.name)
            .set_opt("rating", input.rating)
            .link_many("rooms", input.rooms)
    }
}
