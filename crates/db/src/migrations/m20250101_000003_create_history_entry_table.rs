//! Create history entry table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HistoryEntry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HistoryEntry::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(HistoryEntry::ComplaintId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(HistoryEntry::ActorId).string_len(32))
                    .col(
                        ColumnDef::new(HistoryEntry::ActorRole)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HistoryEntry::ActorEmail)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HistoryEntry::Action)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(HistoryEntry::Comment).text())
                    .col(ColumnDef::new(HistoryEntry::Reason).text())
                    .col(ColumnDef::new(HistoryEntry::Seq).integer().not_null())
                    .col(
                        ColumnDef::new(HistoryEntry::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_history_entry_complaint")
                            .from(HistoryEntry::Table, HistoryEntry::ComplaintId)
                            .to(Complaint::Table, Complaint::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_history_entry_actor")
                            .from(HistoryEntry::Table, HistoryEntry::ActorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (complaint_id, seq) (ledger ordering, one entry per slot)
        manager
            .create_index(
                Index::create()
                    .name("idx_history_entry_complaint_seq")
                    .table(HistoryEntry::Table)
                    .col(HistoryEntry::ComplaintId)
                    .col(HistoryEntry::Seq)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (actor_id, action) (for acted-on-by-me views)
        manager
            .create_index(
                Index::create()
                    .name("idx_history_entry_actor_action")
                    .table(HistoryEntry::Table)
                    .col(HistoryEntry::ActorId)
                    .col(HistoryEntry::Action)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HistoryEntry::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum HistoryEntry {
    Table,
    Id,
    ComplaintId,
    ActorId,
    ActorRole,
    ActorEmail,
    Action,
    Comment,
    Reason,
    Seq,
    CreatedAt,
}

#[derive(Iden)]
enum Complaint {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
