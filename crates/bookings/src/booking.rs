use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelbook_core::{
    Changeset, DomainResult, Entity, EntityDef, EntityId, FieldDef, IdRef, Predicate,
    RelationDef, Row, WhereInput,
};

pub static BOOKING: EntityDef = EntityDef {
    name: "Booking",
    table: "bookings",
    fields: &[
        FieldDef::timestamp("created_at", "createdAt").required(),
        FieldDef::timestamp("updated_at", "updatedAt").required(),
        FieldDef::timestamp("start_date", "startDate"),
        FieldDef::timestamp("end_date", "endDate"),
        FieldDef::float("total_price", "totalPrice"),
    ],
    relations: &[
        RelationDef::belongs_to("room", "rooms", "room_id"),
        RelationDef::belongs_to("customer", "customers", "customer_id"),
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub total_price: Option<f64>,
    pub room: Option<EntityId>,
    pub customer: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreateInput {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub total_price: Option<f64>,
    pub room: Option<IdRef>,
    pub customer: Option<IdRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdateInput {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub total_price: Option<f64>,
    pub room: Option<EntityId>,
    pub customer: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookingWhereInput {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub total_price: Option<f64>,
    pub room: Option<EntityId>,
    pub customer: Option<EntityId>,
}

impl WhereInput for BookingWhereInput {
    fn to_predicate(&self) -> Predicate {
        Predicate::builder()
            .eq("id", self.id.clone())
            .eq("created_at", self.created_at)
            .eq("updated_at", self.updated_at)
            .eq("start_date", self.start_date)
            .eq("end_date", self.end_date)
            .eq("total_price", self.total_price)
            .related("room", self.room.clone().map(|id| vec![id]))
            .related("customer", self.customer.clone().map(|id| vec![id]))
            .build()
    }
}

impl Entity for Booking {
    type Create = BookingCreateInput;
    type Update = BookingUpdateInput;
    type Where = BookingWhereInput;

    fn definition() -> &'static EntityDef {
        &BOOKING
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_row(row: &Row) -> DomainResult<Self> {
        Ok(Self {
            id: row.id().clone(),
            created_at: row.required_timestamp("created_at")?,
            updated_at: row.required_timestamp("updated_at")?,
            start_date: row.timestamp("start_date")?,
            end_date: row.timestamp("end_date")?,
            total_price: row.float("total_price")?,
            room: row.reference("room_id"),
            customer: row.reference("customer_id"),
        })
    }

    fn create_changeset(input: BookingCreateInput, now: DateTime<Utc>) -> Changeset {
        Changeset::new()
            .with_id(input.id)
            .set("created_at", input.created_at.unwrap_or(now))
            .set("updated_at", input.updated_at.unwrap_or(now))
            .set("start_date", input.start_date)
            .set("end_date", input.end_date)
            .set("total_price", input.total_price)
            .link_one("room", input.room.map(|r| r.id))
            .link_one("customer", input.customer.map(|r| r.id))
    }

    fn update_changeset(input: BookingUpdateInput) -> Changeset {
        Changeset::new()
            .set_opt("created_at", input.created_at)
            .set_opt("updated_at", input.updated_at)
            .set_opt("start_date", input.start_date)
            .set_opt("end_date", input.end_date)
            .set_opt("total_price", input.total_price)
            .link_one("room", input.room)
            .link_one("customer", input.customer)
    }
}
