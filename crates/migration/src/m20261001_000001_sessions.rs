use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sessions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sessions::Name).text().not_null())
                    .col(ColumnDef::new(Sessions::Value).text().not_null())
                    .col(ColumnDef::new(Sessions::Url).text())
                    .col(ColumnDef::new(Sessions::Description).text())
                    .col(
                        ColumnDef::new(Sessions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Sessions::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Every list query filters on the soft-delete flag.
        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_is_deleted")
                    .table(Sessions::Table)
                    .col(Sessions::IsDeleted)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Dropping the table takes its indexes with it
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Sessions {
    Table,
    Id,
    Name,
    Value,
    Url,
    Description,
    IsActive,
    IsDeleted,
    CreatedAt,
    UpdatedAt,
}
