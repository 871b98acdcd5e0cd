use chrono::{DateTime, Duration, SubsecRound, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A user record as persisted in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub age: i32,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, age: i32) -> Self {
        let now = timestamp_now();
        Self {
            id: ObjectId::new(),
            name,
            email,
            age,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field assignments for an update. `None` leaves the stored value untouched;
/// `updated_at` is always written and always moves forward.
#[derive(Debug, Clone, PartialEq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl UserChanges {
    pub fn new(name: Option<String>, email: Option<String>, age: Option<i32>) -> Self {
        Self {
            name,
            email,
            age,
            updated_at: timestamp_now(),
        }
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(age) = self.age {
            user.age = age;
        }
        user.updated_at = self.next_updated_at(user.updated_at);
    }

    /// The later of this update's clock reading and one tick past `previous`.
    pub fn next_updated_at(&self, previous: DateTime<Utc>) -> DateTime<Utc> {
        self.updated_at.max(previous + Duration::milliseconds(1))
    }
}

/// Current time at the millisecond precision BSON dates can hold, so a record
/// returned from a write compares equal to the same record read back.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
