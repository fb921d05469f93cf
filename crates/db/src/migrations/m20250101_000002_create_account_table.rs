//! Create account table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Account::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Account::Id).string_len(32).not_null().primary_key())
                    .col(
                        ColumnDef::new(Account::Email)
                            .string_len(256)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Account::PasswordHash).text().not_null())
                    .col(ColumnDef::new(Account::Name).string_len(128))
                    .col(ColumnDef::new(Account::Role).string_len(16).not_null())
                    .col(ColumnDef::new(Account::OrganizationId).string_len(32))
                    .col(ColumnDef::new(Account::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(Account::ApprovalStatus)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Account::ApprovedBy).string_len(32))
                    .col(ColumnDef::new(Account::ApprovedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Account::ApprovalNotes).text())
                    .col(
                        ColumnDef::new(Account::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Account::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_account_organization")
                            .from(Account::Table, Account::OrganizationId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .check(
                        Expr::col(Account::ApprovedBy)
                            .is_null()
                            .eq(Expr::col(Account::ApprovedAt).is_null()),
                    )
                    .check(
                        Expr::col(Account::Role)
                            .eq("admin")
                            .or(Expr::col(Account::OrganizationId).is_not_null()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (organization_id, role, approval_status) (cascade lookup)
        manager
            .create_index(
                Index::create()
                    .name("idx_account_organization_role_status")
                    .table(Account::Table)
                    .col(Account::OrganizationId)
                    .col(Account::Role)
                    .col(Account::ApprovalStatus)
                    .to_owned(),
            )
            .await?;

        // Index: approval_status (pending list)
        manager
            .create_index(
                Index::create()
                    .name("idx_account_approval_status")
                    .table(Account::Table)
                    .col(Account::ApprovalStatus)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Account::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Account {
    Table,
    Id,
    Email,
    PasswordHash,
    Name,
    Role,
    OrganizationId,
    IsActive,
    ApprovalStatus,
    ApprovedBy,
    ApprovedAt,
    ApprovalNotes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Organization {
    Table,
    Id,
}
