use clap::{Parser, Subcommand};
use csv::{ReaderBuilder, StringRecord};
use prettytable::{Cell, Row, Table};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use heapdb::{
    BufferPool, Catalog, Field, HeapFile, HeapPage, PageId, Permission, RecordError,
    StorageConfig, TransactionId, Tuple, TupleDesc, WriteAheadLog,
};

#[derive(Parser, Debug)]
#[command(version, about = "Inspect and load heap files", long_about = None)]
struct Args {
    /// JSON storage config; built-in defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page count and per-page occupancy
    Info {
        file: PathBuf,
        /// Column types, e.g. `int,float,char(16)`
        #[arg(long)]
        schema: String,
    },
    /// Print every tuple as a table
    Dump {
        file: PathBuf,
        #[arg(long)]
        schema: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Insert one tuple given as comma separated values
    Insert {
        file: PathBuf,
        #[arg(long)]
        schema: String,
        #[arg(long)]
        values: String,
    },
    /// Bulk insert CSV rows, committing in batches
    Load {
        file: PathBuf,
        #[arg(long)]
        schema: String,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = ",")]
        delimiter: char,
        #[arg(long)]
        has_headers: bool,
        /// Rows per committed transaction. Keep the pages one batch
        /// dirties below the pool capacity.
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
    },
}

/// A single heap file served through its own buffer pool.
/// The write-ahead log lives next to the file as `<file>.wal`.
struct Session {
    file: Arc<HeapFile>,
    pool: BufferPool,
}

impl Session {
    fn open(config: &StorageConfig, path: &Path, schema: &str) -> Result<Self, Box<dyn Error>> {
        let desc = Arc::new(TupleDesc::parse(schema)?);
        let file = Arc::new(HeapFile::open_or_create(path, desc, config.page_size)?);

        let mut wal_path = file.path().as_os_str().to_owned();
        wal_path.push(".wal");
        let wal = Arc::new(WriteAheadLog::open(PathBuf::from(wal_path))?);

        let catalog = Arc::new(Catalog::new());
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        catalog.add_table(file.clone(), &name);

        let pool = BufferPool::new(config.clone(), catalog, wal)?;
        Ok(Self { file, pool })
    }

    fn parse_tuple(&self, cells: &[&str]) -> Result<Tuple, Box<dyn Error>> {
        let desc = self.file.tuple_desc();
        if cells.len() != desc.num_fields() {
            return Err(RecordError::SchemaMismatch(format!(
                "expected {} values, got {}",
                desc.num_fields(),
                cells.len()
            ))
            .into());
        }
        let fields = cells
            .iter()
            .zip(desc.columns())
            .map(|(cell, column)| Field::parse(cell, &column.data_type))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Tuple::with_fields(desc.clone(), fields)?)
    }
}

fn info(session: &Session) -> Result<(), Box<dyn Error>> {
    let file = &session.file;
    let desc = file.tuple_desc();
    let num_pages = file.num_pages()?;
    println!("file:        {}", file.path().display());
    println!("table id:    {}", file.id());
    println!("page size:   {}", file.page_size());
    println!("tuple size:  {}", desc.tuple_size());
    println!(
        "slots/page:  {}",
        HeapPage::slots_per_page(file.page_size(), desc.tuple_size())
    );
    println!("pages:       {}", num_pages);

    let tid = TransactionId::allocate();
    let mut table = Table::new();
    table.set_titles(Row::new(vec![
        Cell::new("page"),
        Cell::new("used"),
        Cell::new("free"),
    ]));
    for page_number in 0..num_pages {
        let page_id = PageId::new(file.id(), page_number);
        let page = session.pool.get_page(tid, page_id, Permission::ReadOnly)?;
        let page = page.read();
        let free = page.num_empty_slots();
        table.add_row(Row::new(vec![
            Cell::new(&page_number.to_string()),
            Cell::new(&(page.num_slots() - free).to_string()),
            Cell::new(&free.to_string()),
        ]));
    }
    session.pool.transaction_complete(tid, true);

    if num_pages > 0 {
        table.printstd();
    }
    Ok(())
}

fn dump(session: &Session, limit: Option<usize>) -> Result<(), Box<dyn Error>> {
    let tid = TransactionId::allocate();
    let mut table = Table::new();
    table.set_titles(Row::new(
        session
            .file
            .tuple_desc()
            .columns()
            .iter()
            .map(|c| Cell::new(&c.name))
            .collect(),
    ));

    let mut iter = session.file.iterator(&session.pool, tid);
    iter.open()?;
    let mut rows = 0;
    for tuple in iter.by_ref().take(limit.unwrap_or(usize::MAX)) {
        let tuple = tuple?;
        table.add_row(Row::new(
            tuple
                .fields()
                .iter()
                .map(|f| Cell::new(&f.to_string()))
                .collect(),
        ));
        rows += 1;
    }
    iter.close();
    session.pool.transaction_complete(tid, true);

    table.printstd();
    println!("{} rows", rows);
    Ok(())
}

fn insert(session: &Session, values: &str) -> Result<(), Box<dyn Error>> {
    let cells: Vec<&str> = values.split(',').collect();
    let mut tuple = session.parse_tuple(&cells)?;

    let tid = TransactionId::allocate();
    if let Err(err) = session
        .pool
        .insert_tuple(tid, session.file.id(), &mut tuple)
    {
        session.pool.transaction_complete(tid, false);
        return Err(err.into());
    }
    session.pool.transaction_complete(tid, true);

    if let Some(rid) = tuple.record_id() {
        println!("inserted at page {} slot {}", rid.page_id.page_number, rid.slot);
    }
    Ok(())
}

fn insert_record(
    session: &Session,
    tid: TransactionId,
    record: csv::Result<StringRecord>,
) -> Result<(), Box<dyn Error>> {
    let record = record?;
    let cells: Vec<&str> = record.iter().collect();
    let mut tuple = session.parse_tuple(&cells)?;
    session
        .pool
        .insert_tuple(tid, session.file.id(), &mut tuple)?;
    Ok(())
}

/// Insert every CSV row, committing after each `batch_size` rows. A failure
/// rolls back the current batch only. Returns the number of rows committed.
fn load(
    session: &Session,
    csv_path: &Path,
    delimiter: char,
    has_headers: bool,
    batch_size: usize,
) -> Result<usize, Box<dyn Error>> {
    let batch_size = batch_size.max(1);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(has_headers)
        .from_path(csv_path)?;

    let mut tid = TransactionId::allocate();
    let mut loaded = 0;
    let mut pending = 0;
    for record in reader.records() {
        if let Err(err) = insert_record(session, tid, record) {
            log::warn!("load stopped after {} committed rows", loaded);
            session.pool.transaction_complete(tid, false);
            return Err(err);
        }

        pending += 1;
        if pending == batch_size {
            session.pool.transaction_complete(tid, true);
            loaded += pending;
            pending = 0;
            tid = TransactionId::allocate();
        }
    }
    session.pool.transaction_complete(tid, true);
    Ok(loaded + pending)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig::default(),
    };

    match args.command {
        Command::Info { file, schema } => info(&Session::open(&config, &file, &schema)?),
        Command::Dump {
            file,
            schema,
            limit,
        } => dump(&Session::open(&config, &file, &schema)?, limit),
        Command::Insert {
            file,
            schema,
            values,
        } => insert(&Session::open(&config, &file, &schema)?, &values),
        Command::Load {
            file,
            schema,
            csv,
            delimiter,
            has_headers,
            batch_size,
        } => {
            let session = Session::open(&config, &file, &schema)?;
            let loaded = load(&session, &csv, delimiter, has_headers, batch_size)?;
            println!("loaded {} rows into {}", loaded, session.file.path().display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
