// ABOUTME: CLI entry point for tablehop
// ABOUTME: Parses commands, merges the config file, and routes to handlers

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tablehop::commands::{self, ExportOptions, PostgresImportOptions, SqliteImportOptions};
use tablehop::config::{self, TransferConfig};
use tablehop::filters::TableFilter;
use tablehop::firebird::queries::DEFAULT_FIELD_LENGTH;
use tablehop::interactive;

#[derive(Parser)]
#[command(name = "tablehop")]
#[command(
    about = "Move tables between Firebird, PostgreSQL and SQLite through pipe-delimited files",
    long_about = None
)]
struct Cli {
    /// Optional TOML file with connection defaults and tool paths
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which database command-line clients are installed
    CheckTools {
        /// Also print the report as JSON on stdout
        #[arg(long)]
        json: bool,
        /// Exit non-zero when any client is missing
        #[arg(long)]
        strict: bool,
    },
    /// Export every Firebird user table to .csv or .csv.gz files
    ExportFirebird {
        /// Firebird database URI, e.g. localhost:/var/lib/firebird/data/employee.fdb
        #[arg(long)]
        uri: Option<String>,
        #[arg(long)]
        username: Option<String>,
        /// Falls back to ISC_PASSWORD, then a prompt
        #[arg(long)]
        password: Option<String>,
        /// Full path to isql; discovered when omitted
        #[arg(long)]
        isql_path: Option<PathBuf>,
        #[arg(long)]
        output_dir: PathBuf,
        /// Character encoding of isql output (e.g. utf-8, latin-1, cp1252)
        #[arg(long)]
        encoding: Option<String>,
        /// Connection character set passed to isql with -ch
        #[arg(long)]
        charset: Option<String>,
        /// Compress output files with gzip (.csv.gz)
        #[arg(long)]
        compress: bool,
        /// Maximum characters kept per field
        #[arg(long, default_value_t = DEFAULT_FIELD_LENGTH)]
        field_length: u32,
        /// Include only these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        include_tables: Option<Vec<String>>,
        /// Exclude these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude_tables: Option<Vec<String>>,
    },
    /// Load .csv/.csv.gz files into PostgreSQL through psql
    ImportPostgres {
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long)]
        dbname: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// Falls back to PGPASSWORD, then a prompt
        #[arg(long)]
        password: Option<String>,
        /// Defaults to localhost
        #[arg(long)]
        host: Option<String>,
        /// Defaults to 5432
        #[arg(long)]
        port: Option<u16>,
        /// Full path to psql; discovered when omitted
        #[arg(long)]
        psql_path: Option<PathBuf>,
        /// Drop each target table before loading it
        #[arg(long)]
        drop_existing: bool,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
        /// Include only these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        include_tables: Option<Vec<String>>,
        /// Exclude these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude_tables: Option<Vec<String>>,
    },
    /// Load .csv/.csv.gz files into a SQLite database through sqlite3
    ImportSqlite {
        #[arg(long)]
        input_dir: PathBuf,
        /// SQLite database file; created when missing
        #[arg(long)]
        sqlite_db: Option<String>,
        /// Full path to sqlite3; discovered when omitted
        #[arg(long)]
        sqlite3_path: Option<PathBuf>,
        /// Drop each target table before loading it
        #[arg(long)]
        drop_existing: bool,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
        /// Include only these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        include_tables: Option<Vec<String>>,
        /// Exclude these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude_tables: Option<Vec<String>>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = TransferConfig::load_optional(cli.config.as_deref())?;

    match cli.command {
        Commands::CheckTools { json, strict } => {
            commands::check_tools(json, strict)?;
        }
        Commands::ExportFirebird {
            uri,
            username,
            password,
            isql_path,
            output_dir,
            encoding,
            charset,
            compress,
            field_length,
            include_tables,
            exclude_tables,
        } => {
            let firebird = settings.firebird;
            let options = ExportOptions {
                uri: config::require(config::pick(uri, firebird.uri), "--uri", "firebird.uri")?,
                username: config::require(
                    config::pick(username, firebird.username),
                    "--username",
                    "firebird.username",
                )?,
                password: interactive::resolve_password(
                    password,
                    firebird.password,
                    "ISC_PASSWORD",
                    "Firebird password",
                )?,
                isql_path: config::pick(isql_path, settings.tools.isql),
                output_dir,
                encoding: config::pick(encoding, firebird.encoding)
                    .unwrap_or_else(|| "utf-8".to_string()),
                charset,
                compress,
                field_length,
                filter: TableFilter::new(include_tables, exclude_tables)?,
            };
            commands::export_firebird(options).await?;
        }
        Commands::ImportPostgres {
            input_dir,
            dbname,
            user,
            password,
            host,
            port,
            psql_path,
            drop_existing,
            yes,
            include_tables,
            exclude_tables,
        } => {
            let postgres = settings.postgres;
            let options = PostgresImportOptions {
                input_dir,
                host: config::pick(host, postgres.host).unwrap_or_else(|| "localhost".to_string()),
                port: config::pick(port, postgres.port).unwrap_or(5432),
                dbname: config::require(
                    config::pick(dbname, postgres.dbname),
                    "--dbname",
                    "postgres.dbname",
                )?,
                user: config::require(config::pick(user, postgres.user), "--user", "postgres.user")?,
                password: interactive::resolve_password(
                    password,
                    postgres.password,
                    "PGPASSWORD",
                    "PostgreSQL password",
                )?,
                psql_path: config::pick(psql_path, settings.tools.psql),
                drop_existing,
                assume_yes: yes,
                filter: TableFilter::new(include_tables, exclude_tables)?,
            };
            commands::import_postgres(options).await?;
        }
        Commands::ImportSqlite {
            input_dir,
            sqlite_db,
            sqlite3_path,
            drop_existing,
            yes,
            include_tables,
            exclude_tables,
        } => {
            let configured_db = settings
                .sqlite
                .database
                .map(|p| p.to_string_lossy().into_owned());
            let options = SqliteImportOptions {
                input_dir,
                sqlite_db: config::require(
                    config::pick(sqlite_db, configured_db),
                    "--sqlite-db",
                    "sqlite.database",
                )?,
                sqlite3_path: config::pick(sqlite3_path, settings.tools.sqlite3),
                drop_existing,
                assume_yes: yes,
                filter: TableFilter::new(include_tables, exclude_tables)?,
            };
            commands::import_sqlite(options).await?;
        }
    }

    Ok(())
}
