use axum::response::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use hotelbook_core::{EntityId, FindManyArgs, IdRef, SortKey, WhereInput};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Query string of a list request.
///
/// `where` is the JSON-encoded where input of the listed entity and `sortBy`
/// a comma-separated list of `field[:asc|desc]`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindManyQuery {
    #[serde(rename = "where")]
    pub where_: Option<String>,
    pub skip: Option<u32>,
    pub take: Option<u32>,
    pub sort_by: Option<String>,
}

impl FindManyQuery {
    pub fn into_args<W>(self) -> Result<FindManyArgs<W>, Response>
    where
        W: WhereInput + DeserializeOwned,
    {
        let sort_by = match self.sort_by.as_deref() {
            Some(raw) => SortKey::parse_list(raw).map_err(errors::domain_error_to_response)?,
            None => Vec::new(),
        };
        Ok(FindManyArgs {
            where_: parse_where(self.where_.as_deref())?,
            skip: self.skip,
            take: self.take,
            sort_by,
        })
    }
}

/// Query string of a count request.
#[derive(Debug, Default, Deserialize)]
pub struct MetaQuery {
    #[serde(rename = "where")]
    pub where_: Option<String>,
}

/// Body of connect/disconnect/replace: `[{"id": ..}, ..]`.
pub type RelationBody = Vec<IdRef>;

pub fn relation_ids(body: RelationBody) -> Vec<EntityId> {
    IdRef::into_ids(body)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_where<W: DeserializeOwned>(raw: Option<&str>) -> Result<Option<W>, Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(json) => serde_json::from_str(json)
            .map(Some)
            .map_err(|e| errors::bad_request(format!("invalid where: {e}"))),
    }
}

pub fn parse_id(raw: &str) -> Result<EntityId, Response> {
    raw.parse()
        .map_err(|_| errors::json_error(axum::http::StatusCode::BAD_REQUEST, "invalid_id", "invalid id"))
}
