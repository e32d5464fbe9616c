use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_jobs_table(manager).await?;
        self.create_execution_records_table(manager).await?;
        self.create_indexes(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExecutionRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_jobs_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Jobs::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Jobs::OrganizationId).uuid().not_null())
                    .col(ColumnDef::new(Jobs::Name).string().not_null())
                    .col(ColumnDef::new(Jobs::Kind).string().not_null())
                    .col(ColumnDef::new(Jobs::Schedule).string().not_null())
                    .col(ColumnDef::new(Jobs::Payload).text().not_null())
                    .col(
                        ColumnDef::new(Jobs::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Jobs::RetryLimit)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Jobs::WebhookUrl).string())
                    .col(ColumnDef::new(Jobs::DependsOn).text().not_null())
                    .col(
                        ColumnDef::new(Jobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Jobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_execution_records_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        // No foreign key to jobs: history rows are removed explicitly on delete
        manager
            .create_table(
                Table::create()
                    .table(ExecutionRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExecutionRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExecutionRecords::JobId).uuid().not_null())
                    .col(
                        ColumnDef::new(ExecutionRecords::OrganizationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExecutionRecords::ExecutedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExecutionRecords::Status).string().not_null())
                    .col(
                        ColumnDef::new(ExecutionRecords::Attempts)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExecutionRecords::Output).text())
                    .col(ColumnDef::new(ExecutionRecords::Error).text())
                    .col(
                        ColumnDef::new(ExecutionRecords::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_jobs_organization_id")
                    .table(Jobs::Table)
                    .col(Jobs::OrganizationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_jobs_enabled")
                    .table(Jobs::Table)
                    .col(Jobs::Enabled)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_execution_records_job_executed_at")
                    .table(ExecutionRecords::Table)
                    .col(ExecutionRecords::JobId)
                    .col(ExecutionRecords::ExecutedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_execution_records_org_executed_at")
                    .table(ExecutionRecords::Table)
                    .col(ExecutionRecords::OrganizationId)
                    .col(ExecutionRecords::ExecutedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    OwnerId,
    OrganizationId,
    Name,
    Kind,
    Schedule,
    Payload,
    Enabled,
    RetryLimit,
    WebhookUrl,
    DependsOn,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ExecutionRecords {
    Table,
    Id,
    JobId,
    OrganizationId,
    ExecutedAt,
    Status,
    Attempts,
    Output,
    Error,
    RetryCount,
}
