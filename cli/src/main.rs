use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use brine_region::{
    compile_schema, decode_data, encode_data, expr_to_json, format_data, load_region, region_to_json, schema_to_json,
    CompileError, RegionSchema,
};

#[derive(Parser)]
#[command(name = "bregion")]
#[command(about = "Compile region schemas, and encode or decode region data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema file and print its regions
    Schema {
        /// Input schema file
        #[arg(short, long)]
        input: PathBuf,

        /// Print a JSON description instead of the schema text
        #[arg(long)]
        json: bool,
    },

    /// Bind a data file into a region and write its binary encoding
    Encode {
        /// Schema file declaring the region
        #[arg(short, long)]
        schema: PathBuf,

        /// Region to bind into
        #[arg(short, long)]
        region: String,

        /// Input data file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to the input name with a `.bin` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a binary file and print the region's pools
    Decode {
        /// Schema file declaring the region
        #[arg(short, long)]
        schema: PathBuf,

        /// Region the buffer was encoded from
        #[arg(short, long)]
        region: String,

        /// Input binary file
        #[arg(short, long)]
        input: PathBuf,

        /// Print the pools as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a data file and print its expression tree as JSON
    Parse {
        /// Input data file
        #[arg(short, long)]
        input: PathBuf,

        /// Print the tree back as formatted data text instead
        #[arg(long)]
        text: bool,
    },
}

fn read(path: &Path) -> Result<Vec<u8>, CompileError> {
    fs::read(path).map_err(CompileError::Io)
}

fn load(schema: &Path, region: &str) -> Result<std::sync::Arc<RegionSchema>, CompileError> {
    load_region(&schema.display().to_string(), &read(schema)?, region)
}

fn main() -> Result<(), CompileError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Schema { input, json } => {
            let schemas = compile_schema(&input.display().to_string(), &read(input)?)?;
            if *json {
                println!("{}", schema_to_json(&schemas)?);
            } else {
                for schema in &schemas {
                    println!("{}", schema);
                }
            }
            Ok(())
        }

        Commands::Encode { schema, region, input, output } => {
            let region = load(schema, region)?;
            let bytes = encode_data(&region, &input.display().to_string(), &read(input)?)?;
            let out_path = if let Some(o) = output {
                o.clone()
            } else {
                input.with_extension("bin")
            };
            fs::write(&out_path, &bytes).map_err(CompileError::Io)?;
            info!(bytes = bytes.len(), "wrote {}", out_path.display());
            println!("Encoded {} → {}", input.display(), out_path.display());
            Ok(())
        }

        Commands::Decode { schema, region, input, json } => {
            let region = load(schema, region)?;
            let decoded = decode_data(&region, &read(input)?)?;
            if *json {
                println!("{}", region_to_json(&decoded)?);
            } else {
                print!("{}", decoded);
            }
            Ok(())
        }

        Commands::Parse { input, text } => {
            let file = input.display().to_string();
            let data = read(input)?;
            if *text {
                println!("{}", format_data(&file, &data)?);
            } else {
                println!("{}", expr_to_json(&file, &data)?);
            }
            Ok(())
        }
    }
}
