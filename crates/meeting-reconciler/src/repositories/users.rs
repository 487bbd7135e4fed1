//! Users repository.

use super::client::{with_timeout, StoreHandle};
use super::meetings::parse_object_id;
use super::UsersRepository;
use crate::errors::ReconcilerError;
use crate::models::{Device, User};
use async_trait::async_trait;
use common::types::UserId;
use mongodb::bson::{self, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Device sub-document embedded in a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub platform: Option<String>,
}

/// User document as stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(rename = "firstName", default)]
    pub first_name: Option<String>,

    #[serde(rename = "lastName", default)]
    pub last_name: Option<String>,

    #[serde(default)]
    pub devices: Vec<DeviceDocument>,
}

impl From<UserDocument> for User {
    fn from(document: UserDocument) -> Self {
        User {
            id: UserId(document.id.to_hex()),
            first_name: document.first_name.unwrap_or_default(),
            last_name: document.last_name.unwrap_or_default(),
            devices: document
                .devices
                .into_iter()
                .map(|d| Device {
                    token: d.token.unwrap_or_default(),
                    name: d.name.unwrap_or_default(),
                    platform: d.platform.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// MongoDB-backed users repository.
#[derive(Clone, Debug)]
pub struct MongoUsersRepository {
    store: StoreHandle,
}

impl MongoUsersRepository {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UsersRepository for MongoUsersRepository {
    #[instrument(skip_all, fields(user_id = %id))]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, ReconcilerError> {
        let object_id = parse_object_id(id.as_str())?;
        let collection = self.store.users();

        let found = with_timeout(
            self.store.operation_timeout(),
            "find user",
            collection.find_one(doc! { "_id": object_id }),
        )
        .await?;

        match found {
            Some(raw) => {
                let document: UserDocument = bson::from_document(raw).map_err(|e| {
                    ReconcilerError::InvalidDocument(format!("user {}: {}", id, e))
                })?;
                Ok(Some(User::from(document)))
            }
            None => Ok(None),
        }
    }
}
