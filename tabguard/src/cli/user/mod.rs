use crate::access::{LegacyRole, OperationResult};
use crate::cli::{report, CliHarness};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::ASCII_MARKDOWN, Cell, CellAlignment, Color, ContentArrangement};
use polyfmt::{println, success};

#[derive(Debug, Args, Clone)]
pub struct UserSubcommands {
    #[clap(subcommand)]
    pub command: UserCommands,
}

#[derive(Debug, Subcommand, Clone)]
pub enum UserCommands {
    /// List all users and the role they hold.
    List,

    /// Register a user so they can be given a role.
    Create {
        username: String,

        /// Role string from before roles existed; "admin" and "user" are the recognized values.
        #[arg(long, value_name = "ROLE")]
        legacy_role: Option<String>,
    },

    /// Assign a role to a user.
    Assign {
        /// User Identifier.
        user_id: i64,

        /// Role Identifier.
        role_id: i64,
    },

    /// Show the tabs a user is allowed to see.
    Tabs {
        /// User Identifier.
        user_id: i64,
    },

    /// Move users that only carry a legacy role onto the role of the same name.
    MigrateLegacy,
}

impl CliHarness {
    pub async fn handle_user_subcommands(&self, command: UserSubcommands) -> Result<()> {
        let cmds = command.command;
        match cmds {
            UserCommands::List => self.user_list().await,
            UserCommands::Create {
                username,
                legacy_role,
            } => self.user_create(&username, legacy_role).await,
            UserCommands::Assign { user_id, role_id } => self.user_assign(user_id, role_id).await,
            UserCommands::Tabs { user_id } => self.user_tabs(user_id).await,
            UserCommands::MigrateLegacy => self.user_migrate_legacy().await,
        }
    }
}

impl CliHarness {
    pub async fn user_list(&self) -> Result<()> {
        let users = self
            .access
            .list_users()
            .await
            .context("Could not successfully retrieve users")?;

        let mut table = comfy_table::Table::new();
        table
            .load_preset(ASCII_MARKDOWN)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("id")
                    .set_alignment(CellAlignment::Center)
                    .fg(Color::Blue),
                Cell::new("username")
                    .set_alignment(CellAlignment::Center)
                    .fg(Color::Blue),
                Cell::new("role_id")
                    .set_alignment(CellAlignment::Center)
                    .fg(Color::Blue),
                Cell::new("legacy_role")
                    .set_alignment(CellAlignment::Center)
                    .fg(Color::Blue),
            ]);

        for user in users {
            table.add_row(vec![
                Cell::new(user.id),
                Cell::new(user.username).fg(Color::Green),
                Cell::new(
                    user.role_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".into()),
                ),
                Cell::new(
                    user.legacy_role
                        .as_ref()
                        .map(LegacyRole::as_str)
                        .unwrap_or("-"),
                ),
            ]);
        }

        println!("{}", &table.to_string());
        Ok(())
    }

    pub async fn user_create(&self, username: &str, legacy_role: Option<String>) -> Result<()> {
        let result = self
            .access
            .create_user(username, legacy_role.as_deref().map(LegacyRole::parse))
            .await;

        let message = match &result {
            Ok(id) => format!("Successfully created user '{}' ({})!", username.trim(), id),
            Err(_) => String::new(),
        };

        report(OperationResult::from(result), &message)
    }

    pub async fn user_assign(&self, user_id: i64, role_id: i64) -> Result<()> {
        let result = self.access.assign_role(user_id, role_id).await;
        report(
            result.into(),
            &format!("role {} assigned to user {}!", role_id, user_id),
        )
    }

    pub async fn user_tabs(&self, user_id: i64) -> Result<()> {
        let tabs = self.access.get_allowed_tabs(user_id).await;

        if tabs.is_empty() {
            println!("User {} cannot see any tabs", user_id);
            return Ok(());
        }

        for tab in tabs.iter() {
            println!("{}", tab);
        }

        Ok(())
    }

    pub async fn user_migrate_legacy(&self) -> Result<()> {
        let migrated = self
            .access
            .migrate_legacy_users()
            .await
            .context("Could not migrate legacy users")?;

        success!("{} user(s) migrated onto roles", migrated);
        Ok(())
    }
}
