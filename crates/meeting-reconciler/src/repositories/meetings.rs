//! Meetings repository.
//!
//! Documents are fetched untyped and decoded one by one so that a single
//! malformed meeting is skipped (and logged) instead of failing the whole
//! due-set query every cycle.

use super::client::{with_timeout, StoreHandle};
use super::MeetingsRepository;
use crate::errors::ReconcilerError;
use crate::models::{Meeting, MeetingStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{MeetingId, UserId};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Meeting document as stored in the `meetings` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub goal: String,

    #[serde(default)]
    pub participants: Vec<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<BsonDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<BsonDateTime>,

    pub status: i64,
}

impl TryFrom<MeetingDocument> for Meeting {
    type Error = ReconcilerError;

    fn try_from(document: MeetingDocument) -> Result<Self, Self::Error> {
        let id = document.id.to_hex();

        let status = MeetingStatus::try_from(document.status).map_err(|ordinal| {
            ReconcilerError::InvalidDocument(format!(
                "meeting {} has unknown status {}",
                id, ordinal
            ))
        })?;

        let start_time = document
            .start_time
            .and_then(to_chrono)
            .ok_or_else(|| {
                ReconcilerError::InvalidDocument(format!("meeting {} has no start_time", id))
            })?;

        Ok(Meeting {
            id: MeetingId(id),
            goal: document.goal,
            participants: document
                .participants
                .iter()
                .map(|p| UserId(p.to_hex()))
                .collect(),
            owner: document.owner.map(|o| UserId(o.to_hex())),
            company: document.company.map(|c| c.to_hex()),
            room: document.room.map(|r| r.to_hex()),
            start_time,
            end_time: document.end_time.and_then(to_chrono),
            status,
        })
    }
}

fn to_chrono(value: BsonDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value.timestamp_millis())
}

/// Parse a domain meeting id into a store id.
pub(crate) fn parse_object_id(id: &str) -> Result<ObjectId, ReconcilerError> {
    ObjectId::parse_str(id).map_err(|e| ReconcilerError::InvalidId(format!("{}: {}", id, e)))
}

/// Query for meetings in `status` whose start time has passed.
pub fn due_filter(status: MeetingStatus, now: DateTime<Utc>) -> Document {
    doc! {
        "status": status.ordinal(),
        "start_time": { "$lte": BsonDateTime::from_millis(now.timestamp_millis()) },
    }
}

/// Status-guarded update: matches the id and the expected current status.
pub fn guarded_update(
    id: ObjectId,
    from: MeetingStatus,
    to: MeetingStatus,
) -> (Document, Document) {
    (
        doc! { "_id": id, "status": from.ordinal() },
        doc! { "$set": { "status": to.ordinal() } },
    )
}

/// MongoDB-backed meetings repository.
#[derive(Clone, Debug)]
pub struct MongoMeetingsRepository {
    store: StoreHandle,
}

impl MongoMeetingsRepository {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MeetingsRepository for MongoMeetingsRepository {
    #[instrument(skip_all, fields(status = %status, limit = limit))]
    async fn find_due(
        &self,
        status: MeetingStatus,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Meeting>, ReconcilerError> {
        let collection = self.store.meetings();
        let timeout = self.store.operation_timeout();

        let documents: Vec<Document> = with_timeout(timeout, "find due meetings", async {
            collection
                .find(due_filter(status, now))
                .sort(doc! { "start_time": 1 })
                .limit(i64::from(limit))
                .await?
                .try_collect::<Vec<Document>>()
                .await
        })
        .await?;

        let mut meetings = Vec::with_capacity(documents.len());
        for raw in documents {
            let decoded = bson::from_document::<MeetingDocument>(raw)
                .map_err(|e| ReconcilerError::InvalidDocument(e.to_string()))
                .and_then(Meeting::try_from);

            match decoded {
                Ok(meeting) => meetings.push(meeting),
                Err(e) => {
                    warn!(
                        target: "reconciler.store",
                        error = %e,
                        "Skipping undecodable meeting document"
                    );
                }
            }
        }

        Ok(meetings)
    }

    #[instrument(skip_all, fields(meeting_id = %id, from = %from, to = %to))]
    async fn update_status(
        &self,
        id: &MeetingId,
        from: MeetingStatus,
        to: MeetingStatus,
    ) -> Result<bool, ReconcilerError> {
        let object_id = parse_object_id(id.as_str())?;
        let (filter, update) = guarded_update(object_id, from, to);
        let collection = self.store.meetings();

        let result = with_timeout(
            self.store.operation_timeout(),
            "update meeting status",
            collection.update_one(filter, update),
        )
        .await?;

        Ok(result.matched_count > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn document(status: i64, start_time: Option<BsonDateTime>) -> MeetingDocument {
        MeetingDocument {
            id: ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap(),
            goal: "Design review".to_string(),
            participants: vec![
                ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60001").unwrap(),
                ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60002").unwrap(),
            ],
            owner: Some(ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60001").unwrap()),
            company: None,
            room: None,
            start_time,
            end_time: None,
            status,
        }
    }

    #[test]
    fn test_document_converts_to_meeting() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let meeting = Meeting::try_from(document(
            1,
            Some(BsonDateTime::from_millis(start.timestamp_millis())),
        ))
        .unwrap();

        assert_eq!(meeting.id.as_str(), "64b7f0c2a1b2c3d4e5f60718");
        assert_eq!(meeting.status, MeetingStatus::Scheduled);
        assert_eq!(meeting.start_time, start);
        assert_eq!(
            meeting.participants,
            vec![
                UserId::new("64b7f0c2a1b2c3d4e5f60001"),
                UserId::new("64b7f0c2a1b2c3d4e5f60002"),
            ]
        );
        assert_eq!(meeting.owner, Some(UserId::new("64b7f0c2a1b2c3d4e5f60001")));
    }

    #[test]
    fn test_document_with_unknown_status_is_invalid() {
        let result = Meeting::try_from(document(9, Some(BsonDateTime::now())));
        assert!(matches!(result, Err(ReconcilerError::InvalidDocument(msg)) if msg.contains("unknown status 9")));
    }

    #[test]
    fn test_document_without_start_time_is_invalid() {
        let result = Meeting::try_from(document(1, None));
        assert!(matches!(result, Err(ReconcilerError::InvalidDocument(msg)) if msg.contains("start_time")));
    }

    #[test]
    fn test_document_decodes_from_stored_field_names() {
        let raw = doc! {
            "_id": ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap(),
            "goal": "Standup",
            "participants": [ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60001").unwrap()],
            "start_time": BsonDateTime::now(),
            "status": 1_i32,
        };

        let decoded: MeetingDocument = bson::from_document(raw).unwrap();
        assert_eq!(decoded.goal, "Standup");
        assert_eq!(decoded.status, 1);
        assert_eq!(decoded.participants.len(), 1);
        assert!(decoded.owner.is_none());
    }

    #[test]
    fn test_due_filter_matches_status_and_start_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let filter = due_filter(MeetingStatus::Scheduled, now);

        assert_eq!(filter.get_i32("status").unwrap(), 1);
        let start = filter.get_document("start_time").unwrap();
        assert_eq!(
            start.get_datetime("$lte").unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
    }

    #[test]
    fn test_guarded_update_includes_expected_status() {
        let id = ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap();
        let (filter, update) =
            guarded_update(id, MeetingStatus::Scheduled, MeetingStatus::Active);

        assert_eq!(filter.get_object_id("_id").unwrap(), id);
        assert_eq!(filter.get_i32("status").unwrap(), 1);
        assert_eq!(
            update.get_document("$set").unwrap().get_i32("status").unwrap(),
            2
        );
    }

    #[test]
    fn test_parse_object_id_rejects_malformed_id() {
        assert!(matches!(
            parse_object_id("not-an-object-id"),
            Err(ReconcilerError::InvalidId(_))
        ));
    }

    // ========================================================================
    // Live store
    //
    // These run against a real MongoDB server:
    //   MONGO_TEST_URI=mongodb://localhost:27017 cargo test -- --ignored
    // ========================================================================

    async fn live_repository() -> (MongoMeetingsRepository, mongodb::Database) {
        let uri = std::env::var("MONGO_TEST_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let client = mongodb::Client::with_uri_str(&uri).await.unwrap();
        let database = client.database(&format!("reconciler_test_{}", ObjectId::new().to_hex()));
        let store = StoreHandle::new(database.clone(), std::time::Duration::from_secs(10));
        (MongoMeetingsRepository::new(store), database)
    }

    fn stored_meeting(id: ObjectId, status: MeetingStatus, minutes_ago: i64) -> Document {
        let start = Utc::now() - chrono::Duration::minutes(minutes_ago);
        doc! {
            "_id": id,
            "goal": "Standup",
            "participants": [],
            "start_time": BsonDateTime::from_millis(start.timestamp_millis()),
            "status": status.ordinal(),
        }
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGO_TEST_URI)"]
    async fn test_live_update_status_matches_only_expected_status() {
        let (repository, database) = live_repository().await;
        let id = ObjectId::new();
        database
            .collection::<Document>("meetings")
            .insert_one(stored_meeting(id, MeetingStatus::Scheduled, 5))
            .await
            .unwrap();
        let meeting_id = MeetingId(id.to_hex());

        let first = repository
            .update_status(&meeting_id, MeetingStatus::Scheduled, MeetingStatus::Active)
            .await
            .unwrap();
        let second = repository
            .update_status(&meeting_id, MeetingStatus::Scheduled, MeetingStatus::Active)
            .await
            .unwrap();

        assert!(first);
        assert!(!second, "no document matched the guard");

        let stored = database
            .collection::<Document>("meetings")
            .find_one(doc! { "_id": id })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.get_i32("status").unwrap(),
            MeetingStatus::Active.ordinal()
        );

        database.drop().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB (MONGO_TEST_URI)"]
    async fn test_live_find_due_returns_oldest_scheduled_first() {
        let (repository, database) = live_repository().await;
        let oldest = ObjectId::new();
        let newer = ObjectId::new();
        database
            .collection::<Document>("meetings")
            .insert_many(vec![
                stored_meeting(newer, MeetingStatus::Scheduled, 1),
                stored_meeting(oldest, MeetingStatus::Scheduled, 30),
                stored_meeting(ObjectId::new(), MeetingStatus::Active, 60),
                stored_meeting(ObjectId::new(), MeetingStatus::Scheduled, -30),
                doc! {
                    "_id": ObjectId::new(),
                    "status": MeetingStatus::Scheduled.ordinal(),
                    "start_time": BsonDateTime::from_millis(Utc::now().timestamp_millis() - 1_000),
                    "participants": "not-a-list",
                },
            ])
            .await
            .unwrap();

        let due = repository
            .find_due(MeetingStatus::Scheduled, Utc::now(), 10)
            .await
            .unwrap();
        let capped = repository
            .find_due(MeetingStatus::Scheduled, Utc::now(), 1)
            .await
            .unwrap();

        let ids: Vec<String> = due.iter().map(|m| m.id.as_str().to_string()).collect();
        assert_eq!(ids, vec![oldest.to_hex(), newer.to_hex()]);
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id.as_str(), oldest.to_hex());

        database.drop().await.unwrap();
    }
}
