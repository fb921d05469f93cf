//! Create organization table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Organization::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Organization::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Organization::Name)
                            .string_len(256)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Organization::Domain)
                            .string_len(256)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Organization::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(Organization::PartnerUniversityId).string_len(32))
                    .col(
                        ColumnDef::new(Organization::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Organization::ApprovalStatus)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Organization::ApprovedBy).string_len(32))
                    .col(ColumnDef::new(Organization::ApprovedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Organization::ApprovalNotes).text())
                    .col(
                        ColumnDef::new(Organization::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Organization::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organization_partner_university")
                            .from(Organization::Table, Organization::PartnerUniversityId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .check(
                        Expr::col(Organization::ApprovedBy)
                            .is_null()
                            .eq(Expr::col(Organization::ApprovedAt).is_null()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: approval_status (pending list)
        manager
            .create_index(
                Index::create()
                    .name("idx_organization_approval_status")
                    .table(Organization::Table)
                    .col(Organization::ApprovalStatus)
                    .to_owned(),
            )
            .await?;

        // Index: partner_university_id (placement officer scope)
        manager
            .create_index(
                Index::create()
                    .name("idx_organization_partner_university_id")
                    .table(Organization::Table)
                    .col(Organization::PartnerUniversityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Organization::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Organization {
    Table,
    Id,
    Name,
    Domain,
    Kind,
    PartnerUniversityId,
    IsVerified,
    ApprovalStatus,
    ApprovedBy,
    ApprovedAt,
    ApprovalNotes,
    CreatedAt,
    UpdatedAt,
}
