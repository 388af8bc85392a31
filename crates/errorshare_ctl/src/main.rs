use anyhow::{Context, Result};
#[cfg(feature = "completion")]
use clap::CommandFactory;
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "completion")]
use clap_complete::{Shell, generate};
use errorshare_core::db::{Database, ListEntry, Open};
use errorshare_core::env::vars;
use errorshare_core::id::Name;
use std::path::PathBuf;
use std::str::FromStr;
use tabled::settings::{Alignment, Style};
use tabled::{Table, Tabled};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completion.
    #[cfg(feature = "completion")]
    Completion { shell: Shell },
    /// List stored error pages
    List {
        /// Path to the database file
        #[arg(long, env = vars::DATABASE_PATH)]
        database: PathBuf,

        /// List only entries whose parameters contain the given string (case-sensitive)
        #[arg(short, long)]
        contains: Option<String>,

        /// Order the results
        #[arg(short, long)]
        sort: Option<SortOrder>,
    },
    /// Print the stored parameters of an entry
    Show {
        /// Path to the database file
        #[arg(long, env = vars::DATABASE_PATH)]
        database: PathBuf,

        /// Name of the entry
        name: String,
    },
    /// Delete specific entries
    Delete {
        /// Path to the database file
        #[arg(long, env = vars::DATABASE_PATH)]
        database: PathBuf,

        /// Names of the entries to delete
        names: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortOrder {
    CreatedAsc,
    CreatedDesc,
    SizeAsc,
    SizeDesc,
}

#[derive(Tabled)]
struct Entry {
    name: String,
    created: String,
    size: i64,
}

impl From<ListEntry> for Entry {
    fn from(entry: ListEntry) -> Self {
        Self {
            name: entry.name,
            created: entry.created,
            size: entry.size,
        }
    }
}

fn parse_names(names: &[String]) -> Result<Vec<Name>> {
    names
        .iter()
        .map(|name| Name::from_str(name).with_context(|| format!("Invalid name `{name}`")))
        .collect()
}

#[allow(clippy::print_stdout)]
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.commands {
        #[cfg(feature = "completion")]
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let cmd = &mut cmd;

            generate(
                shell,
                cmd,
                cmd.get_name().to_string(),
                &mut std::io::stdout(),
            );
        }
        Commands::List {
            database,
            contains,
            sort,
        } => {
            let db = Database::new(Open::Path(database))?;

            let mut entries = Vec::new();

            for entry in db.list().await? {
                if let Some(needle) = &contains {
                    let item = db.get(Name::from_str(&entry.name)?).await?;

                    if !serde_json::to_string(&item.params)?.contains(needle.as_str()) {
                        continue;
                    }
                }

                entries.push(Entry::from(entry));
            }

            if let Some(sort_order) = sort {
                match sort_order {
                    SortOrder::CreatedAsc => entries.sort_by(|a, b| a.created.cmp(&b.created)),
                    SortOrder::CreatedDesc => {
                        entries.sort_by(|a, b| a.created.cmp(&b.created).reverse());
                    }
                    SortOrder::SizeAsc => entries.sort_by_key(|entry| entry.size),
                    SortOrder::SizeDesc => {
                        entries.sort_by(|a, b| a.size.cmp(&b.size).reverse());
                    }
                }
            }

            let mut table = Table::new(&entries);
            table.with(Style::psql()).with(Alignment::left());

            println!("{table}");
        }
        Commands::Show { database, name } => {
            let name = Name::from_str(&name).with_context(|| format!("Invalid name `{name}`"))?;
            let db = Database::new(Open::Path(database))?;
            let item = db.get(name).await?;

            println!("{}", serde_json::to_string_pretty(&item.params)?);
        }
        Commands::Delete { database, names } => {
            let names = parse_names(&names)?;
            let db = Database::new(Open::Path(database))?;

            let affected = db.delete_many(names).await?;
            println!(
                "Deleted {affected} {}",
                if affected == 1 { "entry" } else { "entries" }
            );
        }
    }

    Ok(())
}
