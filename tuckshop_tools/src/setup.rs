use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use sqlx::{
    migrate::{MigrateDatabase, Migrator},
    Sqlite,
};
use tuckshop_engine::{sqlite::db::db_url, SqliteDatabase};

#[derive(Debug, Subcommand)]
pub enum SetupCommand {
    /// Run the database migrations.
    Migrate(MigrateParams),
}

#[derive(Debug, Args)]
pub struct MigrateParams {
    /// The path to the migrations directory. The migrations are embedded in the binary by default, and so this
    /// parameter is optional. If provided, the migrations at <path> will be executed instead.
    #[arg(short, long)]
    pub path: Option<String>,
}

pub async fn handle_setup_command(command: SetupCommand) {
    match command {
        SetupCommand::Migrate(params) => migrate_db(params).await,
    }
}

async fn migrate_db(params: MigrateParams) {
    async fn migrate_embedded() -> Result<()> {
        create_database_if_not_exist().await?;
        println!("Running embedded migrations");
        let db = SqliteDatabase::new(1).await?;
        let pool = db.pool();
        sqlx::migrate!("../tuckshop_engine/src/sqlite/migrations").run(pool).await?;
        Ok(())
    }

    async fn migrate_custom(path: &str) -> Result<()> {
        create_database_if_not_exist().await?;
        println!("Running migrations at: {path}");
        let db = SqliteDatabase::new(1).await?;
        let path = Path::new(path);
        let migrator = Migrator::new(path).await?;
        let pool = db.pool();
        migrator.run(pool).await?;
        Ok(())
    }

    let result = match &params.path {
        Some(path) => migrate_custom(path).await,
        None => migrate_embedded().await,
    };

    match result {
        Ok(_) => println!("Migrations complete"),
        Err(e) => println!("Error running migrations: {e}"),
    }
}

async fn create_database_if_not_exist() -> Result<()> {
    let db = db_url();
    if !Sqlite::database_exists(&db).await? {
        println!("Creating new database at: {db}");
        Sqlite::create_database(&db).await?;
    }
    Ok(())
}
