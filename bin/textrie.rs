use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use textrie::{
    BuildSettings, FtIndex, PostingLayout, QueryToken, SearchSettings, Tokenizer, TokenizerConfig,
    TrieBuilder,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "textrie")]
#[command(about = "Build and query compressed-trie full-text indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a text file, one document per line
    Build(BuildArgs),
    /// Look up a token
    Query(QueryArgs),
    /// Print index statistics
    Info {
        /// Index directory
        #[arg(long, env = "TEXTRIE_INDEX", default_value = "./index")]
        index: PathBuf,

        /// Number of largest and smallest tokens to list
        #[arg(long, default_value = "10")]
        top: usize,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Input text file
    input: PathBuf,

    /// Output index directory
    #[arg(long, env = "TEXTRIE_INDEX", default_value = "./index")]
    index: PathBuf,

    /// Keep token case
    #[arg(long)]
    case_sensitive: bool,

    /// Posting layout (grouped, interleaved)
    #[arg(long, default_value = "grouped")]
    layout: PostingLayout,

    #[arg(long, default_value = "1")]
    min_token_length: usize,

    #[arg(long, default_value = "64")]
    max_token_length: usize,
}

#[derive(Args)]
struct QueryArgs {
    /// Token, wildcard pattern, or fuzzy search term
    token: Option<String>,

    #[arg(long, env = "TEXTRIE_INDEX", default_value = "./index")]
    index: PathBuf,

    /// Treat the token as a wildcard pattern (`.`, `.?`, `.*`, `.+`)
    #[arg(long, conflicts_with_all = ["fuzzy", "range"])]
    wildcard: bool,

    /// Fuzzy search; `--fuzzy=N` sets the edit distance
    #[arg(long, num_args = 0..=1, default_missing_value = "0", conflicts_with = "range")]
    fuzzy: Option<u32>,

    /// Inclusive range between two numbers or name tokens
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    range: Option<Vec<String>>,

    #[arg(long)]
    case_sensitive: bool,

    /// Print distinct document ids only
    #[arg(long)]
    ids: bool,

    #[arg(long)]
    json: bool,

    /// Print the lookup metrics in Prometheus text format to stderr
    #[arg(long)]
    metrics: bool,
}

fn build(args: BuildArgs) -> Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {:?}", args.input))?;

    let tokenizer = Tokenizer::new(&TokenizerConfig {
        lowercase: false,
        min_token_length: args.min_token_length,
        max_token_length: args.max_token_length,
    });
    let mut builder = TrieBuilder::new(
        BuildSettings::default()
            .with_case_sensitive(args.case_sensitive)
            .with_layout(args.layout),
    );

    let mut occurrences = 0;
    for (doc_id, line) in text.lines().enumerate() {
        occurrences += builder.add_text(doc_id as u32, line, &tokenizer)?;
    }
    info!("Tokenized {} occurrences of {} tokens", occurrences, builder.token_count());

    let image = builder.build()?;
    image.write_to(&args.index)?;
    println!(
        "Indexed {} tokens into {:?} ({} bytes)",
        image.meta.token_count,
        args.index,
        image.disk_size()
    );
    Ok(())
}

fn query(args: QueryArgs) -> Result<()> {
    let token = args.token.clone().unwrap_or_default();
    let query = if let Some(bounds) = &args.range {
        QueryToken::range(&bounds[0], &bounds[1])
    } else if token.is_empty() {
        bail!("a token is required unless --range is given");
    } else if args.wildcard {
        QueryToken::wildcard(token)
    } else if let Some(distance) = args.fuzzy {
        QueryToken::fuzzy(token, (distance > 0).then_some(distance))
    } else {
        QueryToken::literal(token)
    };
    let query = query.case_sensitive(args.case_sensitive);

    let index = FtIndex::open(&args.index, SearchSettings::default())
        .with_context(|| format!("opening index {:?}", args.index))?;

    if args.ids {
        let docs: Vec<u32> = index.matching_docs(&query)?.iter().collect();
        if args.json {
            println!("{}", serde_json::to_string(&docs)?);
        } else {
            for doc in docs {
                println!("{}", doc);
            }
        }
        return report(&index, args.metrics);
    }

    let matches: Vec<textrie::DocMatch> = index
        .lookup(&query)?
        .by_document()
        .collect::<textrie::Result<_>>()?;
    if args.json {
        let rows: Vec<serde_json::Value> = matches
            .iter()
            .map(|m| serde_json::json!({ "doc": m.doc_id, "positions": m.positions }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for m in &matches {
            let positions: Vec<String> = m.positions.iter().map(|p| p.to_string()).collect();
            println!("{}\t{}", m.doc_id, positions.join(","));
        }
        info!("{} documents matched {}", matches.len(), query);
    }
    report(&index, args.metrics)
}

fn report(index: &FtIndex, metrics: bool) -> Result<()> {
    if metrics {
        eprint!("{}", index.metrics().gather()?);
    }
    index.close();
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Build(args) => build(args),
        Command::Query(args) => query(args),
        Command::Info { index, top, json } => {
            let index = FtIndex::open(&index, SearchSettings::default())?;
            let info = index.info(top)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!("{}", info);
            }
            Ok(())
        }
    }
}
