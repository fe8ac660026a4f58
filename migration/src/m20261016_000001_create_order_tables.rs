use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::Uuid).string_len(64).not_null())
                    .col(ColumnDef::new(Orders::CustomerName).string())
                    .col(ColumnDef::new(Orders::CustomerUnit).string())
                    .col(ColumnDef::new(Orders::CustomerPhone).string())
                    .col(ColumnDef::new(Orders::CustomerEmail).string())
                    .col(ColumnDef::new(Orders::CustomerDepartment).string())
                    .col(ColumnDef::new(Orders::SalesmanName).string())
                    .col(ColumnDef::new(Orders::SalesmanContact).string())
                    .col(ColumnDef::new(Orders::SpeciesName).string())
                    .col(ColumnDef::new(Orders::SpeciesLatinName).string())
                    .col(ColumnDef::new(Orders::SampleType).string())
                    .col(ColumnDef::new(Orders::SampleTypeDetail).text())
                    .col(ColumnDef::new(Orders::CellCount).integer())
                    .col(ColumnDef::new(Orders::PreservationMedium).string())
                    .col(ColumnDef::new(Orders::PreProcessing).text())
                    .col(ColumnDef::new(Orders::SpecialInstructions).text())
                    .col(ColumnDef::new(Orders::RemainingSampleHandling).string())
                    .col(ColumnDef::new(Orders::DetectionQuantity).integer())
                    .col(ColumnDef::new(Orders::ShippingMethod).string())
                    .col(ColumnDef::new(Orders::ExpressCompanyWaybill).string())
                    .col(ColumnDef::new(Orders::ShippingTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Orders::NeedBioinformaticsAnalysis).boolean())
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Orders::TableStatus).string())
                    .col(ColumnDef::new(Orders::ExternalInstanceId).string())
                    .col(ColumnDef::new(Orders::SamplesViewToken).string_len(64))
                    .col(ColumnDef::new(Orders::UserId).string())
                    .col(ColumnDef::new(Orders::SubmittedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Orders::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Backstop for concurrent first-access syncs of the same order
        manager
            .create_index(
                Index::create()
                    .name("orders_uuid_key")
                    .table(Orders::Table)
                    .col(Orders::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("orders_samples_view_token_key")
                    .table(Orders::Table)
                    .col(Orders::SamplesViewToken)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SampleList::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SampleList::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SampleList::OrderId).integer().not_null())
                    .col(ColumnDef::new(SampleList::SequenceNo).integer().not_null())
                    .col(ColumnDef::new(SampleList::SampleName).string())
                    .col(ColumnDef::new(SampleList::AnalysisName).string())
                    .col(ColumnDef::new(SampleList::GroupName).string())
                    .col(ColumnDef::new(SampleList::DetectionOrStorage).string())
                    .col(ColumnDef::new(SampleList::SampleTubeCount).integer())
                    .col(ColumnDef::new(SampleList::ExperimentDescription).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sample_list_order_id")
                            .from(SampleList::Table, SampleList::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PairwiseComparison::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PairwiseComparison::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PairwiseComparison::OrderId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PairwiseComparison::SequenceNo)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PairwiseComparison::ControlGroup).string())
                    .col(ColumnDef::new(PairwiseComparison::TreatmentGroup).string())
                    .col(ColumnDef::new(PairwiseComparison::ComparisonName).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pairwise_comparison_order_id")
                            .from(PairwiseComparison::Table, PairwiseComparison::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MultiGroupComparison::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MultiGroupComparison::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MultiGroupComparison::OrderId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MultiGroupComparison::SequenceNo)
                            .integer()
                            .not_null(),
                    )
                    // JSON-encoded array of group names
                    .col(
                        ColumnDef::new(MultiGroupComparison::ComparisonGroups)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MultiGroupComparison::ComparisonName).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_multi_group_comparison_order_id")
                            .from(MultiGroupComparison::Table, MultiGroupComparison::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sample_list_order_sequence")
                    .table(SampleList::Table)
                    .col(SampleList::OrderId)
                    .col(SampleList::SequenceNo)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pairwise_comparison_order_sequence")
                    .table(PairwiseComparison::Table)
                    .col(PairwiseComparison::OrderId)
                    .col(PairwiseComparison::SequenceNo)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_multi_group_comparison_order_sequence")
                    .table(MultiGroupComparison::Table)
                    .col(MultiGroupComparison::OrderId)
                    .col(MultiGroupComparison::SequenceNo)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MultiGroupComparison::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PairwiseComparison::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SampleList::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    Uuid,
    CustomerName,
    CustomerUnit,
    CustomerPhone,
    CustomerEmail,
    CustomerDepartment,
    SalesmanName,
    SalesmanContact,
    SpeciesName,
    SpeciesLatinName,
    SampleType,
    SampleTypeDetail,
    CellCount,
    PreservationMedium,
    PreProcessing,
    SpecialInstructions,
    RemainingSampleHandling,
    DetectionQuantity,
    ShippingMethod,
    ExpressCompanyWaybill,
    ShippingTime,
    NeedBioinformaticsAnalysis,
    Status,
    TableStatus,
    ExternalInstanceId,
    SamplesViewToken,
    UserId,
    SubmittedAt,
    CreatedAt,
    LastUpdated,
}

#[derive(DeriveIden)]
enum SampleList {
    Table,
    Id,
    OrderId,
    SequenceNo,
    SampleName,
    AnalysisName,
    GroupName,
    DetectionOrStorage,
    SampleTubeCount,
    ExperimentDescription,
}

#[derive(DeriveIden)]
enum PairwiseComparison {
    Table,
    Id,
    OrderId,
    SequenceNo,
    ControlGroup,
    TreatmentGroup,
    ComparisonName,
}

#[derive(DeriveIden)]
enum MultiGroupComparison {
    Table,
    Id,
    OrderId,
    SequenceNo,
    ComparisonGroups,
    ComparisonName,
}
