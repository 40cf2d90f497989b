//! Repository for session records
//!
//! Every read filters out soft-deleted rows. Name uniqueness among live rows
//! is enforced by a partial unique index; a violation surfaces as
//! [`AppError::Duplicate`] through the `DbErr` conversion.

use crate::db::models::*;
use crate::db::query::{ListParams, Pagination};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

/// Session payload for create and update
///
/// Update is a full overwrite: callers send the complete record. Omitted
/// `url` and `description` become null and an omitted `isActive` becomes
/// `true`; nothing is carried over from the stored version.
///
/// Text fields also take numbers and booleans, stored in their JSON text
/// form. `isActive` takes `"true"`/`"false"`, `"1"`/`"0"`, `"yes"`/`"no"` and
/// `1`/`0` besides real booleans. Anything else fails to deserialize.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionInput {
    #[validate(required, length(min = 1))]
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,

    #[validate(required, length(min = 1))]
    #[serde(deserialize_with = "lenient_text")]
    pub value: Option<String>,

    #[serde(deserialize_with = "lenient_text")]
    pub url: Option<String>,

    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,

    #[serde(deserialize_with = "lenient_flag")]
    pub is_active: Option<bool>,
}

impl SessionInput {
    /// Parse a request body; an empty body is an empty payload
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        serde_json::from_slice(body).map_err(|e| AppError::Validation {
            message: format!("Invalid session payload: {}", e),
            field: None,
        })
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(de::Error::custom("expected a string, number or boolean")),
    }
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<bool>, D::Error> {
    let flag = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => return Err(de::Error::custom("expected a boolean")),
        },
        Some(Value::String(s)) => match s.as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => return Err(de::Error::custom("expected a boolean")),
        },
        Some(_) => return Err(de::Error::custom("expected a boolean")),
    };
    Ok(flag)
}

/// Validated fields written on create or update
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionFields {
    name: String,
    value: String,
    url: Option<String>,
    description: Option<String>,
    is_active: bool,
}

impl SessionInput {
    fn into_fields(self) -> Result<SessionFields> {
        self.validate().map_err(|errors| {
            let field = errors.field_errors().keys().min().map(|k| k.to_string());
            AppError::missing_fields(field)
        })?;

        match (self.name, self.value) {
            (Some(name), Some(value)) => Ok(SessionFields {
                name,
                value,
                url: self.url,
                description: self.description,
                is_active: self.is_active.unwrap_or(true),
            }),
            _ => Err(AppError::missing_fields(None)),
        }
    }
}

/// Result of a list query
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ListOutcome {
    /// `getAll` requested: bare array
    All(Vec<Session>),
    /// One page and the total number of matching records
    Page { rows: Vec<Session>, count: u64 },
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Records that have not been soft-deleted
    fn live() -> Select<SessionEntity> {
        SessionEntity::find().filter(SessionColumn::IsDeleted.eq(false))
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Insert a new record
    pub async fn create_session(&self, input: SessionInput) -> Result<Session> {
        let fields = input.into_fields()?;
        let now = chrono::Utc::now();

        let session = SessionActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(fields.name),
            value: Set(fields.value),
            url: Set(fields.url),
            description: Set(fields.description),
            is_active: Set(fields.is_active),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        session.insert(self.conn()).await.map_err(Into::into)
    }

    /// Overwrite every field of an existing record
    pub async fn update_session(&self, id: Uuid, input: SessionInput) -> Result<Session> {
        let existing = self
            .find_session(id)
            .await?
            .ok_or_else(|| AppError::session_not_found(id.to_string()))?;

        let fields = input.into_fields()?;

        let mut session: SessionActiveModel = existing.into();
        session.name = Set(fields.name);
        session.value = Set(fields.value);
        session.url = Set(fields.url);
        session.description = Set(fields.description);
        session.is_active = Set(fields.is_active);
        session.updated_at = Set(chrono::Utc::now().into());

        session.update(self.conn()).await.map_err(Into::into)
    }

    /// Find a live record by ID
    pub async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        Self::live()
            .filter(SessionColumn::Id.eq(id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Live record by ID, or `SessionNotFound`
    pub async fn get_session(&self, id: Uuid) -> Result<Session> {
        self.find_session(id)
            .await?
            .ok_or_else(|| AppError::session_not_found(id.to_string()))
    }

    /// Every live record in insertion order
    pub async fn all_sessions(&self) -> Result<Vec<Session>> {
        Self::live()
            .order_by_asc(SessionColumn::Id)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Filtered listing, paginated newest first unless everything is requested
    pub async fn list_sessions(&self, params: &ListParams) -> Result<ListOutcome> {
        let mut filter = Condition::all().add(SessionColumn::IsDeleted.eq(false));
        if let Some(search) = params.search_condition() {
            filter = filter.add(search);
        }

        match params.pagination {
            Pagination::All => {
                let rows = SessionEntity::find()
                    .filter(filter)
                    .order_by_asc(SessionColumn::Id)
                    .all(self.conn())
                    .await?;

                Ok(ListOutcome::All(rows))
            }
            Pagination::Page { per_page, .. } => {
                let rows = SessionEntity::find()
                    .filter(filter.clone())
                    .order_by_desc(SessionColumn::Id)
                    .offset(params.pagination.offset())
                    .limit(per_page)
                    .all(self.conn());

                let count = SessionEntity::find().filter(filter).count(self.conn());

                let (rows, count) = futures::try_join!(rows, count)?;

                Ok(ListOutcome::Page { rows, count })
            }
        }
    }

    /// Mark a record deleted; it disappears from every read afterwards
    pub async fn soft_delete_session(&self, id: Uuid) -> Result<Session> {
        let existing = self.get_session(id).await?;

        let mut session: SessionActiveModel = existing.into();
        session.is_deleted = Set(true);
        session.updated_at = Set(chrono::Utc::now().into());

        session.update(self.conn()).await.map_err(Into::into)
    }
}
