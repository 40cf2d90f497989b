use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Names are unique among rows that are not soft-deleted. Both Postgres and
/// SQLite support partial indexes, so the same statement serves either backend.
const CREATE_LIVE_NAME_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uq_sessions_live_name \
     ON sessions (name) WHERE is_deleted = false";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(CREATE_LIVE_NAME_INDEX)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uq_sessions_live_name").to_owned())
            .await
    }
}
