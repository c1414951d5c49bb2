//! Create complaint table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Complaint::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Complaint::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Complaint::Title).string_len(512).not_null())
                    .col(ColumnDef::new(Complaint::Description).text().not_null())
                    .col(
                        ColumnDef::new(Complaint::Category)
                            .string_len(128)
                            .not_null()
                            .default("other"),
                    )
                    .col(
                        ColumnDef::new(Complaint::CreatedBy)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Complaint::CreatedByRole)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Complaint::Stage).string_len(32).not_null())
                    .col(ColumnDef::new(Complaint::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Complaint::ResponseDueAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Complaint::AutoForwarded)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Complaint::Revision)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Complaint::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Complaint::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_complaint_creator")
                            .from(Complaint::Table, Complaint::CreatedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (stage, status, created_at) (for role inboxes)
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_stage_status_created_at")
                    .table(Complaint::Table)
                    .col(Complaint::Stage)
                    .col(Complaint::Status)
                    .col(Complaint::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (created_by, created_at) (for "my complaints")
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_created_by_created_at")
                    .table(Complaint::Table)
                    .col(Complaint::CreatedBy)
                    .col(Complaint::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: response_due_at (for the escalation sweep)
        manager
            .create_index(
                Index::create()
                    .name("idx_complaint_response_due_at")
                    .table(Complaint::Table)
                    .col(Complaint::ResponseDueAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Complaint::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Complaint {
    Table,
    Id,
    Title,
    Description,
    Category,
    CreatedBy,
    CreatedByRole,
    Stage,
    Status,
    ResponseDueAt,
    AutoForwarded,
    Revision,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
