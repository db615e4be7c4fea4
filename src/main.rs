#[macro_use]
extern crate prettytable;

use clap::{Parser, Subcommand};
use prettytable::Table;
use std::path::PathBuf;
use std::process;

use slotdb::database::{Database, DatabaseConfig, DatabaseResult};
use slotdb::file::{BUFFER_POOL_SIZE, PAGE_SIZE, PageId};

/// Inspect a slotdb database file
#[derive(Parser, Debug)]
#[command(name = "slotdb", version)]
struct Cli {
    /// Database file to open (created if missing)
    db_path: PathBuf,

    /// Page size for a new file; existing files keep theirs
    #[arg(long, default_value_t = PAGE_SIZE)]
    page_size: usize,

    /// Number of pages held in the buffer pool
    #[arg(long, default_value_t = BUFFER_POOL_SIZE)]
    buffer_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page size, page count and free list
    Info,
    /// Decode one data page and print its slots
    DumpPage {
        /// Page to decode (page 0 is the header)
        page_id: PageId,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> DatabaseResult<()> {
    let config = DatabaseConfig::new(cli.db_path)
        .with_page_size(cli.page_size)
        .with_buffer_capacity(cli.buffer_size);
    let db = Database::open(&config)?;

    match cli.command {
        Command::Info => print_info(&db)?,
        Command::DumpPage { page_id } => dump_page(&db, page_id)?,
    }

    db.close()
}

fn print_info(db: &Database) -> DatabaseResult<()> {
    let free_pages = db.free_pages()?;
    let free_list = if free_pages.is_empty() {
        "(empty)".to_string()
    } else {
        free_pages
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let page_size = db.page_size()?;
    let page_count = db.page_count()?;

    let mut table = Table::new();
    table.add_row(row!["File", db.path().display()]);
    table.add_row(row!["Page size", page_size]);
    table.add_row(row!["Page count", page_count]);
    table.add_row(row!["Free list", free_list]);
    table.printstd();
    Ok(())
}

fn dump_page(db: &Database, page_id: PageId) -> DatabaseResult<()> {
    let page = db.page(page_id)?;
    println!(
        "Page {}: {} records, {} bytes free",
        page.id(),
        page.len(),
        page.free_space()
    );

    let mut table = Table::new();
    table.set_titles(row!["Slot", "Offset", "Size", "Values"]);

    let mut offset = page.page_size();
    for (slot, record) in page.records().iter().enumerate() {
        let size = record.encoded_len();
        offset -= size;
        let values = record
            .values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(row![slot, offset, size, values]);
    }

    table.printstd();
    Ok(())
}
