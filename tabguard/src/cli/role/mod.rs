use crate::access::{AllowedTabs, OperationResult, RoleUpdate};
use crate::cli::{report, CliHarness};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::ASCII_MARKDOWN, Cell, CellAlignment, Color, ContentArrangement};
use polyfmt::{println, success};

#[derive(Debug, Args, Clone)]
pub struct RoleSubcommands {
    #[clap(subcommand)]
    pub command: RoleCommands,
}

#[derive(Debug, Subcommand, Clone)]
pub enum RoleCommands {
    /// List all roles.
    List,

    /// Fetch information about an individual role.
    Get {
        /// Role Identifier.
        id: i64,
    },

    /// Create a new role.
    Create {
        /// Role name. Surrounding whitespace is dropped; must be unique.
        name: String,

        /// A short description about the role.
        #[arg(short, long)]
        description: Option<String>,

        /// Tab this role grants; repeat for more. Unknown tab names are stored as given.
        #[arg(short, long = "tab", value_name = "TAB")]
        tabs: Vec<String>,
    },

    /// Update a role's name, description or tabs.
    Update {
        /// Role Identifier.
        id: i64,

        /// New role name.
        #[arg(short, long)]
        name: Option<String>,

        /// Short description about the role.
        #[arg(short, long)]
        description: Option<String>,

        /// Replaces the role's tabs; repeat for more.
        #[arg(short, long = "tab", value_name = "TAB", conflicts_with = "clear_tabs")]
        tabs: Vec<String>,

        /// Remove every tab from the role.
        #[arg(long)]
        clear_tabs: bool,
    },

    /// Delete a role. Refused while any user still holds it.
    Delete {
        /// Role Identifier.
        id: i64,
    },

    /// Create the built-in "admin" and "user" roles if they are missing.
    Seed,
}

impl CliHarness {
    pub async fn handle_role_subcommands(&self, command: RoleSubcommands) -> Result<()> {
        let cmds = command.command;
        match cmds {
            RoleCommands::List => self.role_list().await,
            RoleCommands::Get { id } => self.role_get(id).await,
            RoleCommands::Create {
                name,
                description,
                tabs,
            } => self.role_create(&name, description, tabs).await,
            RoleCommands::Update {
                id,
                name,
                description,
                tabs,
                clear_tabs,
            } => {
                let allowed_tabs = if clear_tabs {
                    Some(AllowedTabs::default())
                } else if tabs.is_empty() {
                    None
                } else {
                    Some(AllowedTabs::new(tabs))
                };

                self.role_update(
                    id,
                    RoleUpdate {
                        name,
                        description,
                        allowed_tabs,
                    },
                )
                .await
            }
            RoleCommands::Delete { id } => self.role_delete(id).await,
            RoleCommands::Seed => self.role_seed().await,
        }
    }
}

impl CliHarness {
    pub async fn role_list(&self) -> Result<()> {
        let roles = self
            .access
            .list_roles()
            .await
            .context("Could not successfully retrieve roles")?;

        let mut table = comfy_table::Table::new();
        table
            .load_preset(ASCII_MARKDOWN)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("id")
                    .set_alignment(CellAlignment::Center)
                    .fg(Color::Blue),
                Cell::new("name")
                    .set_alignment(CellAlignment::Center)
                    .fg(Color::Blue),
                Cell::new("description")
                    .set_alignment(CellAlignment::Center)
                    .fg(Color::Blue),
                Cell::new("tabs")
                    .set_alignment(CellAlignment::Center)
                    .fg(Color::Blue),
            ]);

        for role in roles {
            table.add_row(vec![
                Cell::new(role.id),
                Cell::new(role.name).fg(Color::Green),
                Cell::new(role.description),
                Cell::new(role.allowed_tabs.iter().collect::<Vec<_>>().join(", ")),
            ]);
        }

        println!("{}", &table.to_string());
        Ok(())
    }

    pub async fn role_get(&self, id: i64) -> Result<()> {
        let role = self
            .access
            .get_role(id)
            .await
            .context("Could not successfully retrieve role")?;

        let mut tab_table = comfy_table::Table::new();
        tab_table
            .load_preset(comfy_table::presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic);

        let known = role.allowed_tabs.known();
        for tab in role.allowed_tabs.iter() {
            let cell = if known.iter().any(|known| known.to_string() == tab) {
                Cell::new(tab).fg(Color::Blue)
            } else {
                // The shell has nothing to render for these.
                Cell::new(format!("{tab} (unknown)")).fg(Color::DarkGrey)
            };
            tab_table.add_row(vec![cell]);
        }

        println!("  Role: {} ({})", role.name, role.id);
        println!();
        if !role.description.is_empty() {
            println!("  {}", role.description);
            println!();
        }
        println!("  Tabs:");
        for line in tab_table.lines() {
            println!("  {}", line);
        }

        Ok(())
    }

    pub async fn role_create(
        &self,
        name: &str,
        description: Option<String>,
        tabs: Vec<String>,
    ) -> Result<()> {
        let result = self
            .access
            .create_role(name, description.as_deref(), Some(AllowedTabs::new(tabs)))
            .await;

        let message = match &result {
            Ok(id) => format!("Successfully created role '{}' ({})!", name.trim(), id),
            Err(_) => String::new(),
        };

        report(OperationResult::from(result), &message)
    }

    pub async fn role_update(&self, id: i64, update: RoleUpdate) -> Result<()> {
        let result = self.access.update_role(id, update).await;
        report(result.into(), &format!("role {} updated!", id))
    }

    pub async fn role_delete(&self, id: i64) -> Result<()> {
        let result = self.access.delete_role(id).await;
        report(result.into(), &format!("role {} deleted!", id))
    }

    pub async fn role_seed(&self) -> Result<()> {
        let created = self
            .access
            .ensure_default_roles()
            .await
            .context("Could not create default roles")?;

        success!("{} default role(s) created", created);
        Ok(())
    }
}
