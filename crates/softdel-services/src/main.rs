//! CLI entry point for the softdel services.
//!
//! Reads a JSON dataset (entity model plus committed rows) from stdin, runs
//! one operation against it, and writes the status and the resulting dataset
//! as JSON to stdout.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

use softdel_core::{
    KeyValue, RecordId, SoftDeleteConfig, SoftDeleteSettings, SoftDeleteStatus,
    SOFT_DELETED_PROPERTY, SOFT_DELETE_LEVEL_PROPERTY,
};
use softdel_services::{
    register_query_filters, CascadeSoftDeleteServiceAsync, SingleSoftDeleteServiceAsync,
};
use softdel_store::{Dataset, MemoryStore, Query, Store};

#[derive(Parser)]
#[command(name = "softdel")]
#[command(about = "Single and cascade soft delete over a JSON dataset")]
struct Cli {
    #[command(subcommand)]
    service: Service,

    /// Config file prefix (default: softdel).
    #[arg(short, long, default_value = "softdel", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Service {
    /// Single soft delete: one boolean flag per record.
    Single(OperationArgs),
    /// Cascade soft delete: a record and its dependents, by level.
    Cascade(OperationArgs),
}

#[derive(Args)]
struct OperationArgs {
    #[arg(value_enum)]
    operation: Operation,

    /// Entity type name.
    #[arg(long)]
    entity: String,

    /// Primary key value, repeated in key order.
    #[arg(long = "key")]
    keys: Vec<String>,

    /// Apply the change to the tracked records without committing it.
    #[arg(long)]
    no_save: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Operation {
    Set,
    Reset,
    /// Count what a hard delete would remove (cascade only).
    Check,
    HardDelete,
    /// List the soft deleted entries of the entity type.
    Deleted,
}

/// Property names the conventional bindings read and write.
struct PropertyNames {
    flag: String,
    level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let settings = SoftDeleteSettings::load(&cli.config)?;
    let names = load_property_names(&cli.config);

    let input = std::io::read_to_string(std::io::stdin())?;
    let dataset: Dataset = serde_json::from_str(&input)?;
    let mut store = MemoryStore::from_dataset(dataset)?;

    let output = match cli.service {
        Service::Single(args) => {
            let config = SoftDeleteConfig::flag_property(&names.flag).with_settings(settings);
            register_query_filters(&mut store, &config)?;
            let keys = parse_keys(&store, &args)?;
            let service = SingleSoftDeleteServiceAsync::new(store, config)?;
            run_single(service, &args, &keys).await?
        }
        Service::Cascade(args) => {
            let config = SoftDeleteConfig::level_property(&names.level).with_settings(settings);
            register_query_filters(&mut store, &config)?;
            let keys = parse_keys(&store, &args)?;
            let service = CascadeSoftDeleteServiceAsync::new(store, config)?;
            run_cascade(service, &args, &keys).await?
        }
    };

    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

async fn run_single(
    mut service: SingleSoftDeleteServiceAsync<MemoryStore>,
    args: &OperationArgs,
    keys: &[KeyValue],
) -> anyhow::Result<Value> {
    match args.operation {
        Operation::Check => anyhow::bail!("check is only available for cascade soft delete"),
        Operation::Deleted => {
            let query = service.get_soft_deleted_entries(&args.entity)?;
            return deleted_records(service.store_mut(), &query).await;
        }
        _ => {}
    }

    let save = !args.no_save;
    let status = match service.find_via_keys(&args.entity, keys).await? {
        None => SoftDeleteStatus::not_found(service.config().settings.not_found_is_not_an_error),
        Some(id) => match args.operation {
            Operation::Set => service.set_soft_delete(id, save).await?,
            Operation::Reset => service.reset_soft_delete(id, save).await?,
            _ => service.hard_delete_soft_deleted_entry(id, save).await?,
        },
    };
    Ok(report(&status, service.store()))
}

async fn run_cascade(
    mut service: CascadeSoftDeleteServiceAsync<MemoryStore>,
    args: &OperationArgs,
    keys: &[KeyValue],
) -> anyhow::Result<Value> {
    if args.operation == Operation::Deleted {
        let query = service.get_soft_deleted_entries(&args.entity)?;
        return deleted_records(service.store_mut(), &query).await;
    }

    let save = !args.no_save;
    let status = match service.find_via_keys(&args.entity, keys).await? {
        None => SoftDeleteStatus::not_found(service.config().settings.not_found_is_not_an_error),
        Some(id) => cascade_operation(&mut service, args.operation, id, save).await?,
    };
    Ok(report(&status, service.store()))
}

async fn cascade_operation(
    service: &mut CascadeSoftDeleteServiceAsync<MemoryStore>,
    operation: Operation,
    id: RecordId,
    save: bool,
) -> anyhow::Result<SoftDeleteStatus> {
    let status = match operation {
        Operation::Set => service.set_cascade_soft_delete(id, save).await?,
        Operation::Reset => service.reset_cascade_soft_delete(id, save).await?,
        Operation::Check => service.check_cascade_soft_delete(id).await?,
        Operation::HardDelete => service.hard_delete_soft_deleted_entries(id, save).await?,
        Operation::Deleted => anyhow::bail!("deleted does not take a record"),
    };
    Ok(status)
}

async fn deleted_records(store: &mut MemoryStore, query: &Query) -> anyhow::Result<Value> {
    let ids = store.fetch(query).await?;
    let records: Vec<_> = ids
        .iter()
        .filter_map(|id| store.record(*id))
        .map(|r| &r.properties)
        .collect();
    Ok(json!({ "records": records }))
}

fn report(status: &SoftDeleteStatus, store: &MemoryStore) -> Value {
    json!({ "status": status, "dataset": store.dataset() })
}

/// Parse `--key` values by the kinds of the entity's primary key. Values
/// past the key's arity (or for an unknown type) are kept as text so the
/// loader reports the mismatch.
fn parse_keys(store: &MemoryStore, args: &OperationArgs) -> anyhow::Result<Vec<KeyValue>> {
    let kinds: Vec<_> = store
        .model()
        .entity_type(&args.entity)
        .map(|def| def.primary_key.iter().map(|p| p.kind).collect())
        .unwrap_or_default();

    args.keys
        .iter()
        .enumerate()
        .map(|(i, raw)| match kinds.get(i) {
            Some(kind) => KeyValue::parse(*kind, raw)
                .with_context(|| format!("key {} ({raw}) is not a valid {kind} key", i + 1)),
            None => Ok(KeyValue::Text(raw.clone())),
        })
        .collect()
}

fn load_property_names(file_prefix: &str) -> PropertyNames {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("SOFTDEL")
                .separator("__")
                .try_parsing(true),
        )
        .build();

    match cfg {
        Ok(c) => PropertyNames {
            flag: c
                .get_string("flag_property")
                .unwrap_or_else(|_| SOFT_DELETED_PROPERTY.to_string()),
            level: c
                .get_string("level_property")
                .unwrap_or_else(|_| SOFT_DELETE_LEVEL_PROPERTY.to_string()),
        },
        Err(_) => PropertyNames {
            flag: SOFT_DELETED_PROPERTY.to_string(),
            level: SOFT_DELETE_LEVEL_PROPERTY.to_string(),
        },
    }
}
