use authsettle::application::pipeline::{AuthorizationPipeline, PipelinePorts};
use authsettle::config::PipelineConfig;
use authsettle::domain::money::MinorUnits;
use authsettle::domain::payment::MerchantTier;
use authsettle::domain::ports::{ClockArc, IdGeneratorArc, IdempotencyStoreBox, TransactionLoggerBox};
use authsettle::infrastructure::clock::{RandomIdGenerator, SystemClock};
use authsettle::infrastructure::in_memory::{InMemoryIdempotencyStore, InMemoryRiskData};
use authsettle::infrastructure::simulated::{DEFAULT_DECLINE_ABOVE, simulated_registry};
use authsettle::infrastructure::tracing_logger::TracingTransactionLogger;
use authsettle::interfaces::csv::outcome_writer::OutcomeWriter;
use authsettle::interfaces::csv::payment_reader::PaymentReader;
use authsettle::interfaces::iso8583::MessageCodec;
use authsettle::logging::{LogFormat, init_logging};
use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authorize every payment request in a CSV file and print the outcomes
    Process(ProcessArgs),
    /// Decode one wire message and print it as JSON
    Decode {
        /// File holding the raw message
        input: PathBuf,
    },
}

#[derive(Args)]
struct ProcessArgs {
    /// Input payment requests CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[arg(long, default_value = "MERCHANT0000001")]
    merchant_id: String,

    #[arg(long, default_value = "standard")]
    merchant_tier: MerchantTier,

    /// Settle instantly unless a request says otherwise
    #[arg(long)]
    instant_settlement: bool,

    #[arg(long, default_value_t = 30_000)]
    processor_timeout_ms: u64,

    /// Card amounts above this (minor units) are declined by the simulated acquirer
    #[arg(long, default_value_t = DEFAULT_DECLINE_ABOVE)]
    decline_above: MinorUnits,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format).into_diagnostic()?;

    match cli.command {
        Command::Process(args) => process(args).await,
        Command::Decode { input } => decode(&input),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn stores(db_path: Option<&Path>) -> Result<(IdempotencyStoreBox, TransactionLoggerBox)> {
    use authsettle::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok((Box::new(store.clone()), Box::new(store)))
        }
        None => Ok((
            Box::new(InMemoryIdempotencyStore::new()),
            Box::new(TracingTransactionLogger),
        )),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn stores(db_path: Option<&Path>) -> Result<(IdempotencyStoreBox, TransactionLoggerBox)> {
    if db_path.is_some() {
        eprintln!(
            "Warning: --db-path requires the storage-rocksdb feature; falling back to in-memory storage"
        );
    }
    Ok((
        Box::new(InMemoryIdempotencyStore::new()),
        Box::new(TracingTransactionLogger),
    ))
}

async fn process(args: ProcessArgs) -> Result<()> {
    let config = PipelineConfig {
        instant_settlement: args.instant_settlement,
        processor_timeout: Duration::from_millis(args.processor_timeout_ms),
        ..PipelineConfig::for_merchant(&args.merchant_id, args.merchant_tier).into_diagnostic()?
    };
    let (idempotency, logger) = stores(args.db_path.as_deref())?;
    let clock: ClockArc = Arc::new(SystemClock);
    let ids: IdGeneratorArc = Arc::new(RandomIdGenerator);

    let pipeline = AuthorizationPipeline::new(
        config,
        PipelinePorts {
            processors: simulated_registry(
                MessageCodec::default(),
                args.decline_above,
                clock.clone(),
                ids.clone(),
            ),
            risk_data: Box::new(InMemoryRiskData::new()),
            logger,
            idempotency,
            clock,
            ids,
        },
    );

    let file = File::open(args.input).into_diagnostic()?;
    let reader = PaymentReader::new(file);
    let stdout = io::stdout();
    let mut writer = OutcomeWriter::new(stdout.lock());

    for request in reader.requests() {
        match request {
            Ok(request) => {
                let outcome = pipeline.process(request).await;
                writer.write_outcome(&outcome).into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Error reading payment request: {}", e);
            }
        }
    }
    writer.flush().into_diagnostic()?;

    Ok(())
}

#[derive(Serialize)]
struct DecodedMessage {
    mti: String,
    bitmap: String,
    fields: BTreeMap<u8, String>,
}

fn decode(input: &Path) -> Result<()> {
    let raw = std::fs::read(input).into_diagnostic()?;
    let message = MessageCodec::default()
        .decode(raw.trim_ascii_end())
        .into_diagnostic()?;

    let decoded = DecodedMessage {
        mti: message.mti().to_string(),
        bitmap: message.bitmap().into_diagnostic()?.to_hex(),
        fields: message
            .fields()
            .map(|(number, value)| (number, String::from_utf8_lossy(value).into_owned()))
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&decoded).into_diagnostic()?
    );
    Ok(())
}
