use clap::Parser;
use invoice_registry::{
    DataDir,
    Record,
    RecordStore,
    StoreOptions,
    error::{self, Error},
    ingestion::{self, IngestOptions},
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("INVOICE_REGISTRY_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let mut options = StoreOptions::default();
    if let Some(limit) = cli.commit_limit {
        options.commit_limit = limit;
    }
    let store = RecordStore::open_with(&data_dir.store_db(), options)?;

    match cli.command {
        Command::Import(args) => cmd_import(&store, &args)?,
        Command::Find(args) => {
            let records = if let Some(name) = &args.name {
                store.find_exact_by_name(name)?
            } else {
                store.find(&args.ids)?
            };
            print_records(&records)?;
        }
        Command::Search(args) => {
            print_records(&store.search_by_name(&args.fragment)?)?;
        }
        Command::Count => {
            println!("{}", store.count()?);
        }
        Command::Delete { id } => match store.delete(&id)? {
            Some(_) => eprintln!("Deleted {id}"),
            None => eprintln!("No record with id {id}"),
        },
        Command::Reset => {
            let receipt = store.reset()?;
            eprintln!(
                "Reset store ({} keys removed in {} commit(s))",
                receipt.mutations, receipt.groups
            );
        }
        Command::Status(args) => cmd_status(&store, &data_dir, args.json)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_import(store: &RecordStore, args: &cli::ImportArgs) -> error::Result<()> {
    if !args.path.exists() {
        return Err(Error::Config(format!(
            "path does not exist: {}",
            args.path.display()
        )));
    }

    let snapshot_date = args
        .snapshot_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let options = IngestOptions {
        batch_size: args.batch_size,
        snapshot_date,
    };

    let reports = ingestion::ingest_path(store, &args.path, &options)?;

    let mut saved = 0;
    let mut failed = Vec::new();
    for report in &reports {
        match &report.outcome {
            Ok(stats) => saved += stats.saved,
            Err(e) => failed.push(format!(
                "{}: {e}",
                report.file.relative_path.display()
            )),
        }
    }

    eprintln!(
        "Imported {saved} records from {} file(s) as of {snapshot_date}",
        reports.len() - failed.len()
    );

    if !failed.is_empty() {
        for line in &failed {
            eprintln!("  failed: {line}");
        }
        return Err(Error::Config(format!(
            "{} of {} file(s) failed to import",
            failed.len(),
            reports.len()
        )));
    }
    Ok(())
}

fn cmd_status(
    store: &RecordStore,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let count = store.count()?;
    let last_update = store.last_update_date()?;

    if json {
        let status = serde_json::json!({
            "dataDir": data_dir.root().display().to_string(),
            "dataDirSource": data_dir.source().to_string(),
            "lastUpdateDate": last_update,
            "records": count,
        });
        println!("{status}");
    } else {
        println!(
            "Data directory: {} (from {})",
            data_dir.root().display(),
            data_dir.source()
        );
        match last_update {
            Some(date) => println!("Last update: {date}"),
            None => println!("Last update: never"),
        }
        println!("Records: {count}");
    }
    Ok(())
}

fn print_records(records: &[Record]) -> error::Result<()> {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}
