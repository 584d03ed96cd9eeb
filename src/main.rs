use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::Context as _;
use bbcodec::{
    Config, ParseOptions, Parser as BbcParser, SmileyTable, TagCatalog, TagSet, Unparser,
    escape_special_chars,
};
use clap::Parser;
use rayon::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Convert forum BBCode to HTML and back")]
struct Cli {
    /// Convert HTML to BBCode instead of BBCode to HTML
    #[arg(long)]
    unparse: bool,
    /// Leave smiley codes as plain text
    #[arg(long = "no-smileys")]
    no_smileys: bool,
    /// Render TAG with its disabled template; may be repeated
    #[arg(long = "disable", value_name = "TAG")]
    disable: Vec<String>,
    /// Convert only TAG and leave other tags as text; may be repeated
    #[arg(long = "only", value_name = "TAG", conflicts_with = "unparse")]
    only: Vec<String>,
    /// Escape `& " ' < >` the way the forum stores posts before converting
    #[arg(long = "escape", conflicts_with = "unparse")]
    escape: bool,
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Files to convert; standard input is read when none are given
    files: Vec<PathBuf>,
}

/// Everything one conversion needs, built once per run.
struct Engine {
    catalog: TagCatalog,
    smileys: SmileyTable,
    options: ParseOptions,
    restrict: TagSet,
}

fn lowercase(tags: &[String]) -> impl Iterator<Item = String> + '_ {
    tags.iter().map(|t| t.trim().to_ascii_lowercase())
}

impl Engine {
    fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        let mut options = config.parse_options();
        options.disabled.extend(lowercase(&cli.disable));
        let catalog =
            TagCatalog::builtin(&config.context()).context("building the tag catalog")?;
        Ok(Self {
            catalog,
            smileys: config.smiley_table(),
            options,
            restrict: lowercase(&cli.only).collect(),
        })
    }

    fn convert(&self, cli: &Cli, input: &str) -> String {
        let input = input.trim_end_matches(['\n', '\r']);
        if cli.unparse {
            let mut unparser =
                Unparser::new(&self.catalog).with_disabled(self.options.disabled.clone());
            if !cli.no_smileys {
                unparser = unparser.with_smileys(&self.smileys);
            }
            return unparser.unparse(input);
        }
        let text = if cli.escape {
            escape_special_chars(input)
        } else {
            input.to_string()
        };
        BbcParser::new(&self.catalog)
            .with_options(self.options.clone())
            .with_smileys(&self.smileys)
            .parse(&text, !cli.no_smileys, &self.restrict)
    }
}

/// Log to standard error, filtered by `BBCODEC_LOG` (`warn` when unset).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("BBCODEC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Entry point for the `bbcodec` command-line tool.
///
/// Converts each file named on the command line, or standard input when
/// there are none, and prints the results in argument order. Files are
/// converted in parallel.
///
/// # Examples
///
/// ```sh
/// # BBCode to HTML
/// echo '[b]hi[/b]' | bbcodec
///
/// # HTML to BBCode
/// bbcodec --unparse post.html
/// ```
fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let engine = Engine::new(&cli)?;

    if cli.files.is_empty() {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        println!("{}", engine.convert(&cli, &input));
        return Ok(());
    }

    let outputs: Vec<anyhow::Result<String>> = cli
        .files
        .par_iter()
        .map(|path| {
            let input = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            debug!(path = %path.display(), "converting");
            Ok(engine.convert(&cli, &input))
        })
        .collect();
    for output in outputs {
        println!("{}", output?);
    }
    Ok(())
}
