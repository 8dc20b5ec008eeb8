use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AccountsUsers::Table)
                    .if_not_exists()
                    .col(pk_uuid(AccountsUsers::Id))
                    .col(string_len(AccountsUsers::Username, 150))
                    .col(string_len(AccountsUsers::FirstName, 150).default(""))
                    .col(string_len(AccountsUsers::LastName, 150).default(""))
                    .col(string_len_null(AccountsUsers::Email, 254))
                    .col(string_len_null(AccountsUsers::Iban, 34))
                    .col(string(AccountsUsers::PasswordHash))
                    .col(boolean(AccountsUsers::IsActive).default(true))
                    .col(boolean(AccountsUsers::IsStaff).default(false))
                    .col(boolean(AccountsUsers::IsSuperuser).default(false))
                    .col(json_binary(AccountsUsers::Groups).default(Expr::cust("'[]'::jsonb")))
                    .col(json_binary(AccountsUsers::Permissions).default(Expr::cust("'[]'::jsonb")))
                    .col(uuid_null(AccountsUsers::CreatedBy))
                    .col(timestamp_with_time_zone_null(AccountsUsers::LastLogin))
                    .col(
                        timestamp_with_time_zone(AccountsUsers::DateJoined)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_accounts_users_created_by")
                            .from(AccountsUsers::Table, AccountsUsers::CreatedBy)
                            .to(AccountsUsers::Table, AccountsUsers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_accounts_users_created_by")
                    .table(AccountsUsers::Table)
                    .col(AccountsUsers::CreatedBy)
                    .to_owned(),
            )
            .await?;

        // Expression indexes enforce case-insensitive uniqueness; NULL email/iban never collide
        let db = manager.get_connection();
        for (name, column) in [
            ("uq_accounts_users_username_ci", "username"),
            ("uq_accounts_users_email_ci", "email"),
            ("uq_accounts_users_iban_ci", "iban"),
        ] {
            db.execute_unprepared(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON accounts_users (LOWER({column}))"
            ))
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccountsUsers::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum AccountsUsers {
    Table,
    Id,
    Username,
    FirstName,
    LastName,
    Email,
    Iban,
    PasswordHash,
    IsActive,
    IsStaff,
    IsSuperuser,
    Groups,
    Permissions,
    CreatedBy,
    LastLogin,
    DateJoined,
}
