//! In-memory contacts API speaking the envelope protocol.
//!
//! Every JSON response is wrapped as `{status, data, message?, meta?}`;
//! delete answers a bare 204. Ids are sequential, starting at 1, with the
//! list endpoint supporting pagination, case-insensitive name search and
//! last-name ordering.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub birthdate: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
}

/// Incoming payload for create and update. The id, if present, is ignored —
/// it comes from the path (update) or the store (create).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub birthdate: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub notes: String,
}

impl ContactInput {
    fn into_contact(self, id: u64) -> Contact {
        Contact {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            emails: self.emails,
            phone_numbers: self.phone_numbers,
            addresses: self.addresses,
            birthdate: self.birthdate,
            occupation: self.occupation,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default = "default_page_count")]
    pub page_count: u32,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub desc_order: bool,
}

fn default_page_count() -> u32 {
    10
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Default)]
pub struct Store {
    contacts: BTreeMap<u64, Contact>,
    next_id: u64,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route(
            "/contacts/{id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn success(data: Value) -> Json<Value> {
    Json(json!({ "status": "success", "data": data }))
}

fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}

async fn list_contacts(State(db): State<Db>, Query(params): Query<ListParams>) -> Response {
    let page_count = params.page_count.clamp(1, 100) as usize;
    let page = params.page.max(1) as usize;
    let needle = params.query.to_lowercase();

    let store = db.read().await;
    let mut matches: Vec<&Contact> = store
        .contacts
        .values()
        .filter(|c| {
            needle.is_empty()
                || c.first_name.to_lowercase().contains(&needle)
                || c.last_name.to_lowercase().contains(&needle)
        })
        .collect();
    matches.sort_by(|a, b| {
        (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name))
    });
    if params.desc_order {
        matches.reverse();
    }

    let total = matches.len();
    let total_pages = total.div_ceil(page_count);
    let contacts: Vec<&Contact> = matches
        .into_iter()
        .skip((page - 1) * page_count)
        .take(page_count)
        .collect();

    Json(json!({
        "status": "success",
        "data": contacts,
        "meta": {
            "total": total,
            "page": page,
            "pageSize": page_count,
            "totalPages": total_pages,
        }
    }))
    .into_response()
}

async fn get_contact(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let store = db.read().await;
    match store.contacts.get(&id) {
        Some(contact) => success(json!(contact)).into_response(),
        None => failure(StatusCode::NOT_FOUND, "Contact not found"),
    }
}

async fn create_contact(State(db): State<Db>, Json(input): Json<ContactInput>) -> Response {
    if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
        return failure(StatusCode::BAD_REQUEST, "First and last name are required");
    }
    let mut store = db.write().await;
    store.next_id += 1;
    let id = store.next_id;
    let contact = input.into_contact(id);
    store.contacts.insert(id, contact.clone());
    (StatusCode::CREATED, success(json!(contact))).into_response()
}

async fn update_contact(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<ContactInput>,
) -> Response {
    if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
        return failure(StatusCode::BAD_REQUEST, "First and last name are required");
    }
    let mut store = db.write().await;
    if !store.contacts.contains_key(&id) {
        return failure(StatusCode::NOT_FOUND, "Contact not found");
    }
    let contact = input.into_contact(id);
    store.contacts.insert(id, contact.clone());
    success(json!(contact)).into_response()
}

async fn delete_contact(State(db): State<Db>, Path(id): Path<u64>) -> Response {
    let mut store = db.write().await;
    match store.contacts.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => failure(StatusCode::NOT_FOUND, "Contact not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_serializes_camel_case() {
        let contact = Contact {
            id: 1,
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            emails: Vec::new(),
            phone_numbers: vec![PhoneNumber {
                kind: "work".to_string(),
                number: "555".to_string(),
            }],
            addresses: Vec::new(),
            birthdate: String::new(),
            occupation: String::new(),
            notes: String::new(),
        };
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["firstName"], "Grace");
        assert_eq!(json["phoneNumbers"][0]["type"], "work");
    }

    #[test]
    fn input_defaults_optional_fields() {
        let input: ContactInput =
            serde_json::from_str(r#"{"firstName":"Grace","lastName":"Hopper"}"#).unwrap();
        assert!(input.emails.is_empty());
        assert!(input.addresses.is_empty());
        assert_eq!(input.birthdate, "");
    }

    #[test]
    fn input_ignores_unknown_id_field() {
        let input: ContactInput =
            serde_json::from_str(r#"{"id":9,"firstName":"Grace","lastName":"Hopper"}"#).unwrap();
        let contact = input.into_contact(2);
        assert_eq!(contact.id, 2);
    }

    #[test]
    fn list_params_parse_from_query_strings() {
        let params: ListParams =
            serde_json::from_value(json!({"pageCount": 25, "descOrder": true})).unwrap();
        assert_eq!(params.page_count, 25);
        assert_eq!(params.page, 1);
        assert!(params.desc_order);
        assert_eq!(params.query, "");
    }
}
