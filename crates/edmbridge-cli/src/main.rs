mod display;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use arrow::datatypes::Schema;
use clap::{Parser, Subcommand, ValueEnum};
use edmbridge_core::{
    EntryReader, EntryTransformer, MetadataDocument, SourceConfig, infer_schema, output_schema,
    records_to_batch, schema_to_json,
};

#[derive(Parser)]
#[command(name = "edmbridge", version, about = "OData EDM schema inference and entry conversion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the output schema inferred from entity metadata
    Schema {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Convert an OData JSON payload into Arrow records
    Convert {
        #[command(flatten)]
        source: SourceArgs,
        /// OData JSON payload (v4 `value` array or v2 `d` results)
        #[arg(long)]
        entries: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Validate a source configuration file
    Check {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Entity metadata document (`{"version": ..., "properties": [...]}`)
    #[arg(long)]
    metadata: PathBuf,
    /// Source configuration; supplies query, schema and annotation settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// OData query options, e.g. `$select=Name,Price`
    #[arg(long)]
    query: Option<String>,
    /// Override schema in record schema JSON
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Include metadata annotations alongside annotated properties
    #[arg(long)]
    annotations: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Card,
    Json,
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_config(path: &Path) -> anyhow::Result<SourceConfig> {
    let config = SourceConfig::from_json(&read(path)?)
        .with_context(|| format!("parsing {}", path.display()))?;
    config.validate().context("invalid source configuration")?;
    Ok(config)
}

/// Metadata plus the schema entries are extracted against.
struct Resolved {
    metadata: MetadataDocument,
    schema: arrow::datatypes::SchemaRef,
}

impl SourceArgs {
    fn resolve(&self) -> anyhow::Result<Resolved> {
        let metadata = MetadataDocument::from_json(&read(&self.metadata)?)
            .with_context(|| format!("parsing {}", self.metadata.display()))?;

        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SourceConfig::default(),
        };
        if let Some(query) = &self.query {
            config.query = Some(query.clone());
        }
        if let Some(path) = &self.schema {
            config.schema = Some(read(path)?);
        }
        config.include_metadata_annotations |= self.annotations;

        let override_schema: Option<Schema> =
            config.parsed_schema().context("parsing override schema")?;
        let inferred = infer_schema(
            &metadata.properties,
            &config.select_properties(),
            config.include_metadata_annotations,
        )
        .context("inferring schema")?;
        let schema = output_schema(inferred, override_schema).context("checking override schema")?;
        Ok(Resolved { metadata, schema })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::info!("edmbridge v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    match cli.command {
        Command::Schema { source } => {
            let resolved = source.resolve()?;
            let json = schema_to_json(&resolved.schema);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::Convert {
            source,
            entries,
            format,
        } => {
            let Resolved { metadata, schema } = source.resolve()?;
            let entries = EntryReader::new(&metadata)
                .read(&read(&entries)?)
                .context("decoding entries")?;
            let transformer = EntryTransformer::new(schema.clone(), metadata.version)
                .with_annotations(&metadata.properties);
            let records = entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    transformer
                        .transform(entry)
                        .with_context(|| format!("converting entry {}", i + 1))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let batch = records_to_batch(schema, &records).context("building record batch")?;

            match format {
                Format::Table => {
                    println!("{}", arrow::util::pretty::pretty_format_batches(&[batch])?);
                }
                Format::Card => display::print_record_cards(&batch)?,
                Format::Json => {
                    let mut writer = arrow::json::ArrayWriter::new(std::io::stdout());
                    writer.write(&batch)?;
                    writer.finish()?;
                    println!();
                }
            }
        }
        Command::Check { config } => {
            let config = load_config(&config)?;
            println!("Configuration '{}' is valid.", config.reference_name);
            let selected = config.select_properties();
            if !selected.is_empty() {
                println!("  selected properties: {}", selected.join(", "));
            }
        }
    }

    Ok(())
}
