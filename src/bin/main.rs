//! HAWG CLI
//!
//! Command-line tool for flattening HAWG documents and querying the
//! resulting graph.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hawg::vocab::{
    ANNOTATION_FIELD, ANNOTATION_TYPE, ID, MEMBER_FIELD, NAME_FIELD, RENDER_OPTION_FIELD,
    ROOT_FIELD, STRUCTURE_TYPE,
};
use hawg::{
    classify_id, load_document, to_document, to_json_string, AnnotationQuery, BlankNodeAllocator,
    Flattener, Hawg, HawgError, IdKind, NodeKey, ReferenceFields,
};

#[derive(Parser)]
#[command(name = "hawg")]
#[command(about = "Flatten and query linked-data node graphs")]
#[command(version)]
struct Cli {
    /// Reference-field table (TOML, or JSON with a .json extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the flattened document
    Flatten(FlattenArgs),
    /// Print ids of nodes referencing matching annotations
    Annotated(AnnotatedArgs),
    /// Print composed renderOption and annotation maps of each header root
    Roots(InputArgs),
    /// Print ids of the node tree under the header roots
    Tree(TreeArgs),
    /// Print ids of structures and groups whose annotation name matches
    Search(SearchArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Path to the JSON document
    input: PathBuf,
}

#[derive(Args)]
struct FlattenArgs {
    /// Path to the JSON document
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct AnnotatedArgs {
    /// Path to the JSON document
    input: PathBuf,

    /// Only annotations whose `name` equals this value
    #[arg(long)]
    name: Option<String>,

    /// Only subjects of this type (repeatable)
    #[arg(long = "type", value_name = "TYPE")]
    node_types: Vec<String>,

    /// Type of annotation nodes
    #[arg(long, default_value = ANNOTATION_TYPE)]
    annotation_type: String,

    /// Field linking subjects to annotations
    #[arg(long, default_value = ANNOTATION_FIELD)]
    field: String,
}

#[derive(Args)]
struct TreeArgs {
    /// Path to the JSON document
    input: PathBuf,

    /// Structural field to descend through
    #[arg(long, default_value = MEMBER_FIELD)]
    field: String,

    /// Types not descended into (repeatable; default: Structure)
    #[arg(long = "leaf-type", value_name = "TYPE")]
    leaf_types: Vec<String>,
}

#[derive(Args)]
struct SearchArgs {
    /// Path to the JSON document
    input: PathBuf,

    /// Terms that must all match a word of the annotation name
    #[arg(required = true)]
    terms: Vec<String>,
}

fn init_tracing() {
    // HAWG_LOG_FORMAT=json switches to machine-parseable output
    let log_format = std::env::var("HAWG_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hawg=warn".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn load_fields(config: Option<&PathBuf>) -> Result<ReferenceFields, HawgError> {
    match config {
        Some(path) => ReferenceFields::load(path),
        None => Ok(ReferenceFields::default()),
    }
}

fn load_store(input: &PathBuf, fields: ReferenceFields) -> Result<Hawg, HawgError> {
    let doc = load_document(input)?;
    Hawg::from_document(&doc, fields)
}

/// Write output to file or stdout
fn write_output(content: &str, output: Option<&PathBuf>) -> Result<(), HawgError> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            tracing::info!(path = %path.display(), "wrote flattened document");
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn header_roots(store: &Hawg) -> Result<Vec<NodeKey>, HawgError> {
    Ok(store
        .get_header_node()?
        .refs(ROOT_FIELD)
        .map(|n| n.key())
        .collect())
}

fn run_flatten(args: FlattenArgs, fields: ReferenceFields) -> Result<(), HawgError> {
    let doc = load_document(&args.input)?;
    let mut allocator = BlankNodeAllocator::new();
    let flat = Flattener::new(&fields, &mut allocator).flatten(&doc)?;

    let blank = flat
        .iter()
        .filter(|n| classify_id(&n.id) == IdKind::Blank)
        .count();
    let header = flat.iter().any(|n| classify_id(&n.id) == IdKind::Header);
    tracing::info!(
        nodes = flat.len(),
        blank,
        header,
        "flattened {}",
        args.input.display()
    );

    let output = to_json_string(&to_document(&flat), args.pretty)?;
    write_output(&output, args.output.as_ref())
}

fn run_annotated(args: AnnotatedArgs, fields: ReferenceFields) -> Result<(), HawgError> {
    let store = load_store(&args.input, fields)?;

    let mut query = AnnotationQuery::new()
        .annotation_type(args.annotation_type)
        .field_name(args.field)
        .node_types(&args.node_types);
    if let Some(name) = args.name {
        query = query.filter(move |a| {
            a.data(NAME_FIELD).and_then(Value::as_str) == Some(name.as_str())
        });
    }

    let ids: Vec<&str> = store
        .get_nodes_with_annotation(&query)
        .iter()
        .map(|n| n.id())
        .collect();
    println!("{}", serde_json::to_string(&ids)?);
    Ok(())
}

fn run_roots(args: InputArgs, fields: ReferenceFields) -> Result<(), HawgError> {
    let store = load_store(&args.input, fields)?;
    for root in header_roots(&store)? {
        let render_option = store.compose_field_values(root, RENDER_OPTION_FIELD, None, None)?;
        let annotation = store.compose_field_values(root, ANNOTATION_FIELD, None, None)?;
        let mut line = Map::new();
        line.insert(ID.to_string(), json!(store.select(root)?.id()));
        line.insert(RENDER_OPTION_FIELD.to_string(), Value::Object(render_option));
        line.insert(ANNOTATION_FIELD.to_string(), Value::Object(annotation));
        println!("{}", Value::Object(line));
    }
    Ok(())
}

fn run_tree(args: TreeArgs, fields: ReferenceFields) -> Result<(), HawgError> {
    let store = load_store(&args.input, fields)?;
    let roots = header_roots(&store)?;

    let leaf_types: Vec<&str> = if args.leaf_types.is_empty() {
        vec![STRUCTURE_TYPE]
    } else {
        args.leaf_types.iter().map(String::as_str).collect()
    };
    for node in store.node_tree(&roots, &args.field, &leaf_types) {
        println!("{}", node.id());
    }
    Ok(())
}

fn run_search(args: SearchArgs, fields: ReferenceFields) -> Result<(), HawgError> {
    let store = load_store(&args.input, fields)?;
    let ids: Vec<&str> = store
        .search_nodes(&args.terms.join(" "))
        .iter()
        .map(|n| n.id())
        .collect();
    println!("{}", serde_json::to_string(&ids)?);
    Ok(())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = load_fields(cli.config.as_ref()).and_then(|fields| match cli.command {
        Commands::Flatten(args) => run_flatten(args, fields),
        Commands::Annotated(args) => run_annotated(args, fields),
        Commands::Roots(args) => run_roots(args, fields),
        Commands::Tree(args) => run_tree(args, fields),
        Commands::Search(args) => run_search(args, fields),
    });

    if let Err(e) = result {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
