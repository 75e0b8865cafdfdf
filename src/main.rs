use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tagdb::config::Config;
use tagdb::highlight::{self, Dialect};
use tagdb::query::{PathStyle, QueryMode, QueryOptions};
use tagdb::telemetry;
use tagdb::update::Confirm;
use tagdb::{TagStore, UpdateRequest};
use tracing::{debug, info, Level};

/// tagdb - per-project GNU GLOBAL tag databases
#[derive(Parser, Debug)]
#[command(name = "tagdb")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Base cache directory (overrides config file)
    #[arg(long, value_name = "DIR", global = true)]
    cache_dir: Option<String>,

    /// Alternate gtags.conf (overrides config file)
    #[arg(long, value_name = "FILE", global = true)]
    gtagsconf: Option<String>,

    /// Parser label in gtags.conf (overrides config file)
    #[arg(long, value_name = "LABEL", global = true)]
    gtagslabel: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Generate a template configuration file and exit
    #[arg(long, value_name = "FILE")]
    init: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the project root and database directory for a file
    Resolve {
        /// Source file (defaults to the working directory)
        file: Option<PathBuf>,
    },

    /// Build or update the tag database covering a file
    Update {
        /// Source file (defaults to the working directory)
        file: Option<PathBuf>,

        /// Re-index only this file in an existing database
        #[arg(long, conflicts_with = "auto")]
        single: bool,

        /// Build only if the file is in a project without a database
        #[arg(long)]
        auto: bool,

        /// Index files whose names start with a dot
        #[arg(long)]
        accept_dotfiles: bool,

        /// Ignore unreadable files
        #[arg(long)]
        skip_unreadable: bool,

        /// Skip symbolic links, optionally only of TYPE (f, d or a)
        #[arg(long, value_name = "TYPE", num_args = 0..=1, default_missing_value = "")]
        skip_symlink: Option<String>,

        /// Library directory indexed alongside the project (can be repeated)
        #[arg(long = "gtagslibpath", value_name = "PATH")]
        lib_paths: Vec<String>,
    },

    /// Delete the tag database covering a file
    Remove {
        /// Source file (defaults to the working directory)
        file: Option<PathBuf>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Query the tag database covering a file
    Query {
        #[command(flatten)]
        mode: QueryModeArgs,

        /// Word looked up with --from-here
        #[arg(long, requires = "from_here")]
        word: Option<String>,

        /// File the query is issued from (defaults to the working directory)
        #[arg(long, value_name = "FILE")]
        context: Option<PathBuf>,

        /// Treat the pattern as plain text
        #[arg(long)]
        literal: bool,

        /// Ignore case
        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// relative, absolute, shorter, abslib or through
        #[arg(long, value_name = "STYLE")]
        path_style: Option<PathStyle>,

        /// Only report results under DIR
        #[arg(short = 'S', long, value_name = "DIR")]
        scope: Option<PathBuf>,

        /// Print the Vim highlight pattern after the results
        #[arg(long)]
        highlight: bool,
    },

    /// Translate a PCRE pattern into a Vim regex
    Translate {
        pattern: String,

        /// Accept Perl extensions (lookaround, possessive quantifiers, comments)
        #[arg(long, conflicts_with = "literal")]
        perl: bool,

        /// Treat the pattern as plain text
        #[arg(long)]
        literal: bool,
    },
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct QueryModeArgs {
    /// Definitions of PATTERN
    #[arg(short = 'd', long, value_name = "PATTERN")]
    definition: Option<String>,

    /// References to PATTERN
    #[arg(short = 'r', long, value_name = "PATTERN")]
    reference: Option<String>,

    /// Symbols matching PATTERN that have no definition
    #[arg(short = 's', long, value_name = "PATTERN")]
    symbol: Option<String>,

    /// Lines matching PATTERN
    #[arg(short = 'g', long, value_name = "PATTERN")]
    grep: Option<String>,

    /// Definition or reference of --word, decided by context
    #[arg(long, value_name = "LINE:FILE")]
    from_here: Option<String>,

    /// Tags defined in FILES
    #[arg(short = 'f', long, value_name = "FILES", num_args = 1..)]
    file_tags: Vec<PathBuf>,
}

impl QueryModeArgs {
    fn into_mode(self, word: Option<String>) -> Result<QueryMode> {
        if let Some(p) = self.definition {
            return Ok(QueryMode::Definition(p));
        }
        if let Some(p) = self.reference {
            return Ok(QueryMode::Reference(p));
        }
        if let Some(p) = self.symbol {
            return Ok(QueryMode::Symbol(p));
        }
        if let Some(p) = self.grep {
            return Ok(QueryMode::Grep(p));
        }
        if let Some(location) = self.from_here {
            let (line, file) = location
                .split_once(':')
                .context("--from-here expects LINE:FILE")?;
            let line = line
                .parse()
                .with_context(|| format!("Invalid line number in --from-here: {}", line))?;
            let word = word.context("--from-here requires --word")?;
            return Ok(QueryMode::FromHere {
                line,
                file: PathBuf::from(file),
                word,
            });
        }
        Ok(QueryMode::FileTags {
            files: self.file_tags,
        })
    }
}

fn main() -> Result<()> {
    let mut args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_logging(log_level)?;

    // Handle --init flag: generate template config and exit
    if let Some(init_path) = args.init.take() {
        let path = if init_path.as_os_str().is_empty() {
            PathBuf::from("tagdb.toml")
        } else {
            init_path
        };

        if path.exists() {
            anyhow::bail!(
                "Config file already exists: {}\nRemove it first or choose a different path.",
                path.display()
            );
        }

        Config::write_template(&path)?;
        println!("✓ Generated config file: {}", path.display());
        return Ok(());
    }

    let Some(command) = args.command.take() else {
        anyhow::bail!("No command given. Run `tagdb --help` for usage.");
    };

    // Translation needs neither configuration nor a store
    if let Command::Translate {
        pattern,
        perl,
        literal,
    } = &command
    {
        print_translation(pattern, *perl, *literal);
        return Ok(());
    }

    let mut config = load_config(&args)?;
    if let Command::Update {
        accept_dotfiles,
        skip_unreadable,
        skip_symlink,
        lib_paths,
        ..
    } = &command
    {
        config.gtags.accept_dotfiles |= *accept_dotfiles;
        config.gtags.skip_unreadable |= *skip_unreadable;
        if skip_symlink.is_some() {
            config.gtags.skip_symlink = skip_symlink.clone();
        }
        config.gtags.lib_paths.extend(lib_paths.iter().cloned());
    }
    config.validate()?;

    let assume_yes = matches!(command, Command::Remove { yes: true, .. });
    let confirm: Arc<dyn Confirm> = if assume_yes {
        Arc::new(|_: &str| true)
    } else {
        Arc::new(ask_on_terminal)
    };
    let mut store = TagStore::open(&config, confirm).context("Failed to open tag store")?;

    let result = run(&store, command);
    // Wait for queued updates before exiting
    store.shutdown();
    result
}

fn run(store: &TagStore, command: Command) -> Result<()> {
    match command {
        Command::Resolve { file } => {
            let file = file_or_cwd(file)?;
            let resolved = store.resolve(&file);
            println!("root\t{}", resolved.root.display());
            println!("db\t{}", resolved.db_path.display());
            println!("indexed\t{}", resolved.index_exists);
        }
        Command::Update {
            file, single, auto, ..
        } => {
            let file = file_or_cwd(file)?;
            let request = if single {
                UpdateRequest::SingleFile
            } else if auto {
                UpdateRequest::AutoGenerate
            } else {
                UpdateRequest::Build
            };
            let queued = store.submit_update(&file, request)?;
            info!(file = %file.display(), ?request, queued, "Update submitted");
        }
        Command::Remove { file, .. } => {
            let file = file_or_cwd(file)?;
            store.submit_removal(&file)?;
        }
        Command::Query {
            mode,
            word,
            context,
            literal,
            ignore_case,
            path_style,
            scope,
            highlight,
        } => {
            let context = match context {
                Some(file) => file,
                None => std::env::current_dir()?.join("no_name"),
            };
            let options = QueryOptions {
                path_style,
                scope,
                literal,
                ignore_case,
                append: false,
            };
            let query = store.new_query(mode.into_mode(word)?, options);
            let results = store.query(&context, &query)?;
            debug!(count = results.len(), "Query finished");

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for line in &results {
                writeln!(out, "{}", line)?;
            }
            if highlight {
                for pattern in store.highlight_patterns() {
                    writeln!(out, "{}", pattern)?;
                }
            }
        }
        Command::Translate {
            pattern,
            perl,
            literal,
        } => print_translation(&pattern, perl, literal),
    }
    Ok(())
}

fn print_translation(pattern: &str, perl: bool, literal: bool) {
    let dialect = if literal {
        Dialect::Literal
    } else if perl {
        Dialect::PerlExtended
    } else {
        Dialect::Pcre
    };
    println!("{}", highlight::translate(pattern, dialect));
}

fn file_or_cwd(file: Option<PathBuf>) -> Result<PathBuf> {
    match file {
        Some(file) => Ok(file),
        None => Ok(std::env::current_dir()
            .context("Failed to read working directory")?
            .join("no_name")),
    }
}

/// Ask a yes/no question on the terminal; anything but `y` is a no.
fn ask_on_terminal(prompt: &str) -> bool {
    eprint!("{}", prompt);
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y"),
        Err(_) => false,
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let base_config = if let Some(ref config_path) = args.config {
        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found: {}\nUse --init {} to generate a template.",
                config_path.display(),
                config_path.display()
            );
        }
        info!(path = %config_path.display(), "Loading config from file");
        Config::from_file(config_path)?
    } else {
        match Config::from_default_locations()? {
            Some((config, path)) => {
                info!(path = %path.display(), "Loading config from default location");
                config
            }
            None => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        }
    };

    Ok(base_config.with_env_overrides().with_overrides(
        args.cache_dir.clone(),
        args.gtagsconf.clone(),
        args.gtagslabel.clone(),
        Vec::new(),
    ))
}
