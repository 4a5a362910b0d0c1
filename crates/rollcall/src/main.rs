//! `rollcall` - CLI for the student record store
//!
//! Each command loads the current list through the sync controller, applies
//! at most one change and prints what the store holds afterwards.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{anyhow, Context};
use clap::Parser;

use rollcall::cli::{Cli, Command, ConfigCommand, OutputFormat, UpdateCommand};
use rollcall::{init_logging, Config, SqliteStore, StoreId, Student, SyncController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        Command::List(list) => {
            let sync = open(&config).await?;
            print_records(&sync.records(), list.format)
        }
        Command::Add(add) => {
            let sync = open(&config).await?;
            sync.submit(Student::draft(add.fields()))
                .await
                .context("adding student")?;
            print_records(&sync.records(), OutputFormat::Plain)
        }
        Command::Update(update) => handle_update(&config, &update).await,
        Command::Delete(delete) => {
            let sync = open(&config).await?;
            let student = find(&sync, &delete.store_id)?;
            sync.delete(&student).await.context("deleting student")?;
            print_records(&sync.records(), OutputFormat::Plain)
        }
    }
}

/// Open the configured store and load the current list.
async fn open(config: &Config) -> anyhow::Result<SyncController<SqliteStore>> {
    let store = SqliteStore::from_config(config).with_context(|| {
        format!(
            "opening student store at {}",
            config.database_path().display()
        )
    })?;
    let sync = SyncController::new(store).with_config(&config.sync);
    sync.refresh().await.context("loading students")?;
    Ok(sync)
}

fn find(sync: &SyncController<SqliteStore>, store_id: &str) -> anyhow::Result<Student> {
    let store_id = StoreId::from(store_id);
    sync.records()
        .iter()
        .find(|record| record.store_id == store_id)
        .cloned()
        .ok_or_else(|| anyhow!("no student with store id {store_id}"))
}

async fn handle_update(config: &Config, cmd: &UpdateCommand) -> anyhow::Result<()> {
    let sync = open(config).await?;
    let current = find(&sync, &cmd.store_id)?;

    sync.select_for_edit(&current);
    let updated = cmd.apply(&current);
    sync.update_form(|form| {
        form.external_id = updated.fields.external_id;
        form.name = updated.fields.name;
        form.program = updated.fields.program;
        form.phones = updated.fields.phones;
    });

    sync.submit_form().await.context("updating student")?;
    print_records(&sync.records(), OutputFormat::Plain)
}

fn print_records(records: &[Student], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Plain => {
            if records.is_empty() {
                println!("No students.");
            }
            for record in records {
                println!("[{}]", record.store_id);
                println!("  ID:      {}", record.fields.external_id);
                println!("  Name:    {}", record.fields.name);
                println!("  Program: {}", record.fields.program);
                for phone in &record.fields.phones {
                    println!("  - {phone}");
                }
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Store]");
                println!("  Database path:       {}", config.database_path().display());
                println!("  Collection:          {}", config.store.collection);
                println!("  Phone subcollection: {}", config.store.phone_subcollection);
                println!();
                println!("[Sync]");
                println!("  Verify phone sync:   {}", config.sync.verify_phone_sync);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
