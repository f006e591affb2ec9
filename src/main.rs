use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use transcrypt::cli::{
    check_digits, decrypt, encrypt, keygen, search_key, show_info, show_stats, verify_key_files,
    write_public_key, KeygenOptions,
};
use transcrypt::keys::{KeyConfig, PatternChoice, SaltChoice};
use transcrypt::pattern::parse_window;
use transcrypt::{
    Alphabet, CombinationRule, Engine, EngineConfig, Overlap, Pattern, PublicForm, Result,
    SpacingRule, TokenHash,
};
use tracing_subscriber::EnvFilter;

/// Version info from build.rs
const VERSION: &str = env!("TRANSCRYPT_VERSION");
const BUILD: &str = env!("TRANSCRYPT_BUILD");
const PROFILE: &str = env!("TRANSCRYPT_PROFILE");
const GIT_HASH: &str = env!("TRANSCRYPT_GIT_HASH");

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} {} build {} ({})", PROFILE, VERSION, BUILD, GIT_HASH))
}

#[derive(Parser)]
#[command(name = "transcrypt")]
#[command(author, about = "Key derivation from pattern positions in the digits of pi and e", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    /// Directory holding pi_1m.txt and e_1m.txt
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Digit file alphabet (decimal or raw)
    #[arg(long, global = true, value_parser = parse_alphabet)]
    alphabet: Option<Alphabet>,

    /// Scan worker threads
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Candidate starts per scan chunk
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair
    #[command(alias = "k")]
    Keygen {
        /// Output private key file
        #[arg(long, required = true)]
        private: PathBuf,

        /// Output public key file
        #[arg(long, required = true)]
        public: PathBuf,

        /// Pattern symbols, e.g. 3,1,4 or 314 (random if omitted)
        #[arg(long)]
        pattern: Option<String>,

        /// Exact gaps between pattern symbols, e.g. 5,2
        #[arg(long, requires = "pattern", conflicts_with = "window")]
        spacing: Option<String>,

        /// Gap window MIN:MAX between pattern symbols
        #[arg(long, requires = "pattern")]
        window: Option<String>,

        /// Whether matches may share positions
        #[arg(long, default_value = "allowed", value_parser = parse_overlap)]
        overlap: Overlap,

        /// Length of a random pattern
        #[arg(long, default_value = "3")]
        pattern_length: usize,

        /// Largest gap of a random pattern
        #[arg(long, default_value = "10")]
        max_spacing: u32,

        /// Random pattern without gaps
        #[arg(long)]
        no_spacing: bool,

        /// Offsets into pi
        #[arg(long, default_value = "100")]
        pi_offsets: usize,

        /// Offsets into e
        #[arg(long, default_value = "100")]
        e_offsets: usize,

        /// Seed for pi offsets
        #[arg(long, requires = "e_seed")]
        pi_seed: Option<u64>,

        /// Seed for e offsets
        #[arg(long, requires = "pi_seed")]
        e_seed: Option<u64>,

        /// Stream length in symbols
        #[arg(long, default_value = "10000")]
        length: u64,

        /// Combination rule (additive, additive:N, interleave)
        #[arg(long, default_value = "additive", value_parser = parse_rule)]
        rule: CombinationRule,

        /// Matches hashed into the token (K)
        #[arg(long)]
        matches: usize,

        /// Token hash
        #[arg(long, default_value = "sha256", value_parser = parse_hash)]
        hash: TokenHash,

        /// Publish the token or a commitment to it
        #[arg(long, default_value = "token", value_parser = parse_form)]
        form: PublicForm,

        /// Random salt bytes
        #[arg(long, default_value = "16")]
        salt_bytes: usize,

        /// Recipes to try before giving up
        #[arg(long, default_value = "10")]
        attempts: usize,
    },

    /// Recompute the public key of a private key
    Pubkey {
        private: PathBuf,
        public: PathBuf,
    },

    /// Check that a private key matches a public key
    #[command(alias = "v")]
    Verify {
        private: PathBuf,
        public: PathBuf,
    },

    /// Show the match positions of a private key
    Search {
        private: PathBuf,
    },

    /// Encrypt a file for a public key
    #[command(alias = "e")]
    Encrypt {
        public: PathBuf,
        input: PathBuf,
        output: PathBuf,
    },

    /// Decrypt a file with a private key
    #[command(alias = "d")]
    Decrypt {
        private: PathBuf,
        input: PathBuf,
        output: PathBuf,
    },

    /// Show information about a key file
    #[command(alias = "i")]
    Info {
        file: PathBuf,
    },

    /// Statistics of a private key's stream
    #[command(alias = "s")]
    Stats {
        private: PathBuf,
    },

    /// Check the digit files in the data directory
    Digits,
}

fn parse_alphabet(s: &str) -> std::result::Result<Alphabet, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_overlap(s: &str) -> std::result::Result<Overlap, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_rule(s: &str) -> std::result::Result<CombinationRule, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_hash(s: &str) -> std::result::Result<TokenHash, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_form(s: &str) -> std::result::Result<PublicForm, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(alphabet) = cli.alphabet {
        config.alphabet = alphabet;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    Ok(config)
}

fn pattern_choice(
    pattern: Option<String>,
    spacing: Option<String>,
    window: Option<String>,
    overlap: Overlap,
    pattern_length: usize,
    max_spacing: u32,
    no_spacing: bool,
) -> Result<PatternChoice> {
    let Some(symbols) = pattern else {
        return Ok(PatternChoice::Random {
            length: pattern_length,
            max_gap: max_spacing,
            use_spacing: !no_spacing,
            overlap,
        });
    };
    let pattern = match window {
        Some(window) => {
            let (min, max) = parse_window(&window)?;
            let symbols = Pattern::parse(&symbols, None)?.symbols().to_vec();
            Pattern::new(symbols, SpacingRule::window(min, max))?
        }
        None => Pattern::parse(&symbols, spacing.as_deref())?,
    };
    Ok(PatternChoice::Fixed(pattern.with_overlap(overlap)))
}

fn run(cli: &Cli, command: Commands) -> Result<ExitCode> {
    let config = engine_config(cli)?;

    match command {
        Commands::Keygen {
            private,
            public,
            pattern,
            spacing,
            window,
            overlap,
            pattern_length,
            max_spacing,
            no_spacing,
            pi_offsets,
            e_offsets,
            pi_seed,
            e_seed,
            length,
            rule,
            matches,
            hash,
            form,
            salt_bytes,
            attempts,
        } => {
            let options = KeygenOptions {
                config: KeyConfig {
                    pattern: pattern_choice(
                        pattern,
                        spacing,
                        window,
                        overlap,
                        pattern_length,
                        max_spacing,
                        no_spacing,
                    )?,
                    salt: SaltChoice::Random(salt_bytes),
                    pi_offsets,
                    e_offsets,
                    length,
                    rule,
                    matches,
                    hash,
                    form,
                },
                seeds: pi_seed.zip(e_seed),
                attempts,
            };
            let engine = Engine::open(&config)?;
            print!("{}", keygen(&engine, &private, &public, &options)?);
        }

        Commands::Pubkey { private, public } => {
            let engine = Engine::open(&config)?;
            let key = write_public_key(&engine, &private, &public)?;
            println!("Wrote {} public key to {}", key.form(), public.display());
        }

        Commands::Verify { private, public } => {
            let engine = Engine::open(&config)?;
            if verify_key_files(&engine, &private, &public)? {
                println!("valid");
            } else {
                println!("invalid");
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Search { private } => {
            let engine = Engine::open(&config)?;
            print!("{}", search_key(&engine, &private)?);
        }

        Commands::Encrypt {
            public,
            input,
            output,
        } => {
            let bytes = encrypt(&public, &input, &output)?;
            println!("Encrypted {} bytes to {}", bytes, output.display());
        }

        Commands::Decrypt {
            private,
            input,
            output,
        } => {
            let engine = Engine::open(&config)?;
            let bytes = decrypt(&engine, &private, &input, &output)?;
            println!("Decrypted {} bytes to {}", bytes, output.display());
        }

        Commands::Info { file } => {
            print!("{}", show_info(&file)?);
        }

        Commands::Stats { private } => {
            let engine = Engine::open(&config)?;
            print!("{}", show_stats(&engine, &private)?);
        }

        Commands::Digits => {
            let (report, ok) = check_digits(&config)?;
            print!("{}", report);
            if !ok {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();

    if cli.version {
        println!("transcrypt {}", get_version());
        return ExitCode::SUCCESS;
    }

    let Some(command) = cli.command.take() else {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    };

    init_tracing(cli.verbose);

    match run(&cli, command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
