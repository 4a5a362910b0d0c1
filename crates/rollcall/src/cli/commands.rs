//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::record::{Student, StudentFields};

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Student id (business key)
    #[arg(long)]
    pub id: String,

    /// Student name
    #[arg(short, long)]
    pub name: String,

    /// Study program
    #[arg(short, long)]
    pub program: String,

    /// Phone number (repeat for several)
    #[arg(long = "phone", value_name = "NUMBER")]
    pub phones: Vec<String>,
}

impl AddCommand {
    /// The fields this command creates.
    #[must_use]
    pub fn fields(&self) -> StudentFields {
        StudentFields::new(
            self.id.clone(),
            self.name.clone(),
            self.program.clone(),
            self.phones.clone(),
        )
    }
}

/// Update command arguments.
///
/// Unset options keep the record's current values.
#[derive(Debug, Args)]
pub struct UpdateCommand {
    /// Store id of the record to update
    pub store_id: String,

    /// New student id
    #[arg(long)]
    pub id: Option<String>,

    /// New name
    #[arg(short, long)]
    pub name: Option<String>,

    /// New program
    #[arg(short, long)]
    pub program: Option<String>,

    /// Replace the phone list (repeat for several)
    #[arg(long = "phone", value_name = "NUMBER", conflicts_with = "clear_phones")]
    pub phones: Vec<String>,

    /// Remove every phone
    #[arg(long)]
    pub clear_phones: bool,
}

impl UpdateCommand {
    /// Apply the requested changes to `current`.
    #[must_use]
    pub fn apply(&self, current: &Student) -> Student {
        let mut updated = current.clone();
        let fields = &mut updated.fields;
        if let Some(id) = &self.id {
            fields.external_id.clone_from(id);
        }
        if let Some(name) = &self.name {
            fields.name.clone_from(name);
        }
        if let Some(program) = &self.program {
            fields.program.clone_from(program);
        }
        if self.clear_phones {
            fields.phones.clear();
        } else if !self.phones.is_empty() {
            fields.phones.clone_from(&self.phones);
        }
        updated
    }
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Store id of the record to delete
    pub store_id: String,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output
    Json,
}
