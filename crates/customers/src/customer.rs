use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelbook_core::{
    Changeset, DomainResult, Entity, EntityDef, EntityId, FieldDef, IdRef, Predicate,
    RelationDef, Row, WhereInput,
};

pub static CUSTOMER: EntityDef = EntityDef {
    name: "Customer",
    table: "customers",
    fields: &[
        FieldDef::timestamp("created_at", "createdAt").required(),
        FieldDef::timestamp("updated_at", "updatedAt").required(),
        FieldDef::text("email", "email"),
        FieldDef::text("first_name", "firstName"),
        FieldDef::text("last_name", "lastName"),
        FieldDef::text("phone_number", "phoneNumber"),
    ],
    relations: &[RelationDef::has_many("bookings", "bookings", "customer_id")],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub bookings: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreateInput {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub bookings: Option<Vec<IdRef>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdateInput {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub bookings: Option<Vec<EntityId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomerWhereInput {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub bookings: Option<Vec<EntityId>>,
}

impl WhereInput for CustomerWhereInput {
    fn to_predicate(&self) -> Predicate {
        Predicate::builder()
            .eq("id", self.id.clone())
            .eq("created_at", self.created_at)
            .eq("updated_at", self.updated_at)
            .eq("email", self.email.clone())
            .eq("first_name", self.first_name.clone())
            .eq("last_name", self.last_name.clone())
            .eq("phone_number", self.phone_number.clone())
            .related("bookings", self.bookings.clone())
            .build()
    }
}

impl Entity for Customer {
    type Create = CustomerCreateInput;
    type Update = CustomerUpdateInput;
    type Where = CustomerWhereInput;

    fn definition() -> &'static EntityDef {
        &CUSTOMER
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_row(row: &Row) -> DomainResult<Self> {
        Ok(Self {
            id: row.id().clone(),
            created_at: row.required_timestamp("created_at")?,
            updated_at: row.required_timestamp("updated_at")?,
            email: row.text("email")?,
            first_name: row.text("first_name")?,
            last_name: row.text("last_name")?,
            phone_number: row.text("phone_number")?,
            bookings: row.related("bookings"),
        })
    }

    fn create_changeset(input: CustomerCreateInput, now: DateTime<Utc>) -> Changeset {
        Changeset::new()
            .with_id(input.id)
            .set("created_at", input.created_at.unwrap_or(now))
            .set("updated_at", input.updated_at.unwrap_or(now))
            .set("email", input.email)
            .set("first_name", input.first_name)
            .set("last_name", input.last_name)
            .set("phone_number", input.phone_number)
            .link_many("bookings", input.bookings.map(IdRef::into_ids))
    }

    fn update_changeset(input: CustomerUpdateInput) -> Changeset {
        Changeset::new()
            .set_opt("created_at", input.created_at)
            .set_opt("updated_at", input.updated_at)
            .set_opt("email", input.email)
            .set_opt("first_name", input.first_name)
            .set_opt("last_name", input.last_name)
            .set_opt("phone_number", input.phone_number)
            .link_many("bookings", input.bookings)
    }
}
