use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use wordstat_rs::{Engine, EngineConfig};

/// Learns co-occurrence statistics from a directory of plain-text files and
/// answers similarity queries interactively.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Directory searched recursively for corpus files
    #[clap(value_parser)]
    corpus: PathBuf,
    #[clap(long, value_parser, default_value_t = 2)]
    window_size: usize,
    #[clap(long, value_parser, help = "file with one noise word per line")]
    noise_words: Option<PathBuf>,
    #[clap(
        long,
        value_parser,
        help = "file with one synonym group per line, canonical form first"
    )]
    synonyms: Option<PathBuf>,
    #[clap(long, value_parser, default_value = "txt")]
    extension: String,
    #[clap(long, value_parser, default_value_t = 200)]
    batch_size: usize,
    #[clap(long, value_parser, default_value_t = 0, help = "0: one per core")]
    threads: usize,
    #[clap(long, value_parser, default_value_t = 30)]
    top_n: usize,
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_word_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading noise words from {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn read_synonyms(path: &Path) -> Result<Vec<Vec<String>>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading synonyms from {}", path.display()))?;
    Ok(text
        .lines()
        .map(|l| l.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>())
        .filter(|group| !group.is_empty())
        .collect())
}

fn collect_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(%err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|x| x == extension))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

// Files are learned in parallel, one batch at a time.
fn learn_corpus(engine: &Engine, files: &[PathBuf], batch_size: usize) {
    let start = Instant::now();
    for (n, batch) in files.chunks(batch_size.max(1)).enumerate() {
        batch.par_iter().for_each(|path| match fs::read_to_string(path) {
            Ok(text) => {
                engine.learn(&engine.normalize(&text));
                debug!(path = %path.display(), "learned");
            }
            Err(err) => warn!(path = %path.display(), %err, "skipping file"),
        });
        info!(
            batch = n + 1,
            files = batch.len(),
            words = engine.word_count(),
            "batch learned"
        );
    }
    info!(
        files = files.len(),
        words = engine.word_count(),
        elapsed = ?start.elapsed(),
        "corpus learned"
    );
}

fn get_input() -> io::Result<Option<String>> {
    let mut s = String::new();
    if io::stdin().read_line(&mut s)? == 0 {
        return Ok(None);
    }
    Ok(Some(s.trim().to_string()))
}

fn print_ranking(title: &str, ranking: &[(String, f64)]) {
    if ranking.is_empty() {
        println!("No near words!");
        return;
    }
    println!("\n{title}");
    println!("{:>4} {:>10} Word", "Rank", "Score");
    println!("{}", "-".repeat(30));
    for (i, (word, score)) in ranking.iter().enumerate() {
        println!("{:4}: {:10.6} {}", i + 1, score, word);
    }
}

fn describe_word(engine: &Engine, word: &str, top_n: usize) -> wordstat_rs::Result<()> {
    let handle = engine.resolve(word, false);
    {
        let record = handle.read();
        println!("\n'{word}': norm {:.3}, vector length {}", record.norm(), record.vector_len());
    }
    print_ranking(
        &format!("Strongest collocates of '{word}':"),
        &engine.frequency_environment(word, top_n),
    );
    print_ranking(
        &format!("Nearest words to '{word}':"),
        &engine.find_synonyms_of(word, top_n)?,
    );
    Ok(())
}

fn query_loop(engine: &Engine, top_n: usize) -> Result<()> {
    println!("Word Statistics Tool - Type 'EXIT' to quit\n");
    loop {
        println!("\nOne word: its statistics. Three words: nearest to w1 + w2 - w3.");
        print!("Enter 1 or more words: ");
        io::stdout().flush()?;
        let Some(s) = get_input()? else {
            break;
        };
        if s == "EXIT" {
            println!("Goodbye!");
            break;
        }
        let s = s.to_lowercase();
        let words: Vec<&str> = s.split_whitespace().collect();
        if words.is_empty() {
            println!("No words were input. Try again");
            continue;
        }

        let oov_words: Vec<&str> = words
            .iter()
            .filter(|w| !engine.resolve(w, false).is_known())
            .copied()
            .collect();
        if !oov_words.is_empty() {
            for word in &oov_words {
                println!("'{word}' is out of vocabulary");
            }
            continue;
        }

        let outcome = match words.as_slice() {
            [word] => describe_word(engine, word, top_n),
            [a, b, c] => engine
                .analogy(a, c, b, top_n)
                .map(|r| print_ranking(&format!("Nearest words to '{a} + {b} - {c}':"), &r)),
            _ => engine
                .nearest_to_sum(&words, top_n)
                .map(|r| print_ranking(&format!("Nearest words to '{}':", words.join(" + ")), &r)),
        };
        if let Err(err) = outcome {
            println!("Invalid request: {err}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()?;
    }

    let config = EngineConfig {
        window_size: cli.window_size,
        noise_words: match &cli.noise_words {
            Some(path) => read_word_list(path)?,
            None => Vec::new(),
        },
        synonyms: match &cli.synonyms {
            Some(path) => read_synonyms(path)?,
            None => Vec::new(),
        },
    };
    let engine = Engine::from_config(config)?;

    let files = collect_files(&cli.corpus, &cli.extension);
    if files.is_empty() {
        warn!(corpus = %cli.corpus.display(), extension = %cli.extension, "no corpus files found");
    }
    learn_corpus(&engine, &files, cli.batch_size);
    println!("Vocabulary: {} words", engine.word_count());

    query_loop(&engine, cli.top_n)
}
