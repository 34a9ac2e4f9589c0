//! ck - command-line front end for a citekeys library.

use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ck_core::{CitationKey, CkConfig, CkError, EntrySummary, KeyPolicy, Library, Tag};

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "CK_LOG";

#[derive(Parser)]
#[command(name = "ck", version, about = "Manage a tagged library of papers")]
struct Cli {
    /// Config file (default: $CK_CONFIG, then the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List papers, optionally only those carrying one of TAGS
    List {
        tags: Vec<String>,
        /// Do not include papers tagged only with a subtag
        #[arg(long)]
        flat: bool,
    },
    /// Show the tag tree
    Tags,
    /// List papers without any tag
    Untagged,
    /// Tag a paper
    Tag {
        key: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove tags from a paper (all of them if none are given)
    Untag { key: String, tags: Vec<String> },
    /// Rename a paper, moving its files and tags
    Rename { old: String, new: String },
    /// Derive a citation key for the entry in a .bib file
    Genck {
        file: PathBuf,
        #[arg(long, value_enum)]
        policy: Option<KeyPolicy>,
    },
    /// Rewrite the key inside .bib files to match their names
    Canonicalize { keys: Vec<String> },
    /// Report broken links and mismatched keys
    Check,
    /// Delete broken tag links
    Cleanup,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = CkConfig::load(cli.config.as_deref())?;
    let library = Library::open(config)?;
    let json = cli.json;

    match cli.command {
        Command::List { tags, flat } => {
            let tags = parse_tags(&tags)?;
            let listing = library.list(&tags, !flat)?;
            for tag in &listing.unknown_tags {
                eprintln!("#{tag} does not exist as a tag");
            }
            let rows = summaries(&library, listing.keys.iter())?;
            emit(json, &rows, |rows| {
                for row in rows {
                    println!("{row}");
                }
            })
        }
        Command::Tags => {
            let index = library.index()?;
            let hierarchy = index.hierarchy();
            let counts: BTreeMap<&Tag, usize> = index
                .tags()
                .map(|t| (t, index.keys_with(t).len()))
                .collect();
            emit(json, &counts, |_| print!("{}", hierarchy.format_tree()))
        }
        Command::Untagged => {
            let keys = library.untagged()?;
            let rows = summaries(&library, keys.iter())?;
            emit(json, &rows, |rows| {
                for row in rows {
                    println!("{row}");
                }
            })
        }
        Command::Tag { key, tags } => {
            let key = parse_key(&key)?;
            let mutator = library.mutator();
            for tag in parse_tags(&tags)? {
                if !mutator.apply_tag(&key, &tag)? {
                    eprintln!("{key} is already tagged #{tag}");
                }
            }
            Ok(())
        }
        Command::Untag { key, tags } => {
            let key = parse_key(&key)?;
            let mutator = library.mutator();
            if tags.is_empty() {
                let removed = mutator.remove_all_tags(&key)?;
                return emit(json, &removed, |removed| {
                    for tag in removed {
                        println!("#{tag}");
                    }
                });
            }
            for tag in parse_tags(&tags)? {
                if !mutator.remove_tag(&key, &tag)? {
                    eprintln!("{key} is not tagged #{tag}");
                }
            }
            Ok(())
        }
        Command::Rename { old, new } => {
            let report = library.rename(&parse_key(&old)?, &parse_key(&new)?)?;
            emit(json, &report, |r| {
                for tag in r.relinked() {
                    println!("#{tag}");
                }
            })?;
            report.into_result()?;
            Ok(())
        }
        Command::Canonicalize { keys } => {
            if keys.is_empty() {
                let report = library.canonicalize_all()?;
                return emit(json, &report, |r| {
                    for key in r.rewritten() {
                        println!("rewrote {key}.bib");
                    }
                    for key in r.failed() {
                        eprintln!("could not canonicalize {key}");
                    }
                });
            }
            for key in keys {
                let key = parse_key(&key)?;
                if library.canonicalize(&key)? {
                    println!("rewrote {key}.bib");
                }
            }
            Ok(())
        }
        Command::Check => {
            let issues = library.check()?;
            emit(json, &issues, |issues| {
                for issue in issues {
                    println!("{issue}");
                }
            })
        }
        Command::Cleanup => {
            let removed = library.cleanup()?;
            emit(json, &removed, |removed| {
                for link in removed {
                    println!("removed {}", link.display());
                }
            })
        }
        Command::Genck { file, policy } => {
            let bytes = std::fs::read(&file).map_err(|source| CkError::Io {
                path: file.clone(),
                source,
            })?;
            let record = ck_bibtex::parse(&bytes).map_err(|source| CkError::Parse {
                path: file.clone(),
                source,
            })?;
            let policy = policy.unwrap_or(library.config().key_policy);
            let key = library.derive_key(&record, policy)?;
            emit(json, &key, |k| println!("{k}"))
        }
    }
}

fn parse_key(raw: &str) -> ck_core::Result<CitationKey> {
    Ok(raw.parse::<CitationKey>()?)
}

fn parse_tags(raw: &[String]) -> ck_core::Result<Vec<Tag>> {
    raw.iter()
        .map(|t| Tag::parse(t).map_err(CkError::from))
        .collect()
}

/// Listing rows; a paper without a readable .bib still gets its key printed.
fn summaries<'a>(
    library: &Library,
    keys: impl Iterator<Item = &'a CitationKey>,
) -> ck_core::Result<Vec<Row>> {
    let index = library.index()?;
    Ok(keys
        .map(|key| {
            let summary = match library.store().summary(key) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    tracing::warn!("{}: {}", key, e);
                    None
                }
            };
            Row {
                key: key.clone(),
                summary,
                tags: index.tags_of(key).into_iter().collect(),
            }
        })
        .collect())
}

#[derive(Serialize)]
struct Row {
    key: CitationKey,
    summary: Option<EntrySummary>,
    tags: Vec<Tag>,
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.summary {
            Some(summary) => write!(f, "{summary}")?,
            None => write!(f, "{}", self.key)?,
        }
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|t| format!("#{t}")).collect();
            write!(f, ", {}", tags.join(" "))?;
        }
        Ok(())
    }
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T),
) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}
