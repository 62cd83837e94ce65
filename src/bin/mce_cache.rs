//! mce-cache: 文件响应缓存的运维工具
//!
//! Usage:
//!   mce-cache stats [--dir <path>] [--config <file>]   Show live entry count and disk usage
//!   mce-cache purge [--dir <path>] [--config <file>]   Delete expired and unreadable entries
//!   mce-cache clear [--dir <path>] [--config <file>]   Delete every entry
//!   mce-cache key <messages.json> [--model <name>]     Print the cache key for a chat request

use mce_llm::cache::{CacheBackend, CacheKeyGenerator, FileCache};
use mce_llm::config::{CacheSettings, ConfigLoader};
use mce_llm::types::{ChatMessage, ModelConfig};
use mce_llm::{Error, Result};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "stats" => cmd_stats(&args[2..]).await,
        "purge" => cmd_purge(&args[2..]).await,
        "clear" => cmd_clear(&args[2..]).await,
        "key" => cmd_key(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("mce-cache {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"mce-cache: LLM response cache maintenance

USAGE:
    mce-cache <COMMAND> [OPTIONS]

COMMANDS:
    stats                       Show live entry count and disk usage
    purge                       Delete expired and unreadable entries
    clear                       Delete every entry
    key <messages.json>         Print the cache key for a chat request
    version                     Show version information
    help                        Show this help message

OPTIONS:
    --dir <path>                Cache directory (overrides configuration)
    --config <file>             YAML configuration file
    --model <name>              Model name used by `key` (default: configured model)
    --temperature <value>       Temperature used by `key`

ENVIRONMENT:
    MCE_LLM_CACHE_DIR           Cache directory
    RUST_LOG                    Log filter"#
    );
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn load_settings(args: &[String]) -> Result<mce_llm::LlmSettings> {
    let config = ConfigLoader::from_process_env().load(flag(args, "--config").map(Path::new))?;
    mce_llm::logging::init_logging(&config.log_level)?;
    Ok(config.llm)
}

fn open_cache(args: &[String]) -> Result<FileCache> {
    let settings = load_settings(args)?;
    let cache = CacheSettings {
        cache_dir: flag(args, "--dir")
            .map(PathBuf::from)
            .unwrap_or(settings.cache.cache_dir.clone()),
        ..settings.cache
    };
    cache.validate()?;
    Ok(FileCache::new(
        &cache.cache_dir,
        cache.default_ttl(),
        cache.max_file_size as u64,
    )?)
}

async fn disk_usage(dir: &Path) -> Result<(usize, u64)> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let (mut files, mut bytes) = (0usize, 0u64);
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files += 1;
            bytes += entry.metadata().await?.len();
        }
    }
    Ok((files, bytes))
}

async fn cmd_stats(args: &[String]) -> Result<()> {
    let cache = open_cache(args)?;
    let (files_before, _) = disk_usage(cache.dir()).await?;
    let live = cache.size().await;
    let (_, bytes) = disk_usage(cache.dir()).await?;
    println!("directory:      {}", cache.dir().display());
    println!("live entries:   {live}");
    println!("reaped:         {}", files_before.saturating_sub(live));
    println!("disk usage:     {bytes} bytes");
    println!("max entry size: {} bytes", cache.max_file_size());
    Ok(())
}

async fn cmd_purge(args: &[String]) -> Result<()> {
    let cache = open_cache(args)?;
    let removed = cache.purge_expired().await;
    println!("removed {removed} expired or unreadable entries from {}", cache.dir().display());
    Ok(())
}

async fn cmd_clear(args: &[String]) -> Result<()> {
    let cache = open_cache(args)?;
    let before = cache.size().await;
    cache.clear().await;
    println!("cleared {before} entries from {}", cache.dir().display());
    Ok(())
}

fn cmd_key(args: &[String]) -> Result<()> {
    let Some(path) = args.first().filter(|a| !a.starts_with("--")) else {
        return Err(Error::validation("missing <messages.json> argument"));
    };
    let settings = load_settings(args)?;
    let messages: Vec<ChatMessage> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let mut config = settings.model_config();
    if let Some(model) = flag(args, "--model") {
        config = ModelConfig { model_name: model.to_string(), ..config };
    }
    if let Some(t) = flag(args, "--temperature") {
        let t = t
            .parse::<f64>()
            .map_err(|_| Error::validation(format!("invalid temperature: {t}")))?;
        config = config.temperature(t);
    }
    config.validate()?;
    let keygen: CacheKeyGenerator = settings.cache.key_generator();
    println!("{}", keygen.chat_key(&messages, &config));
    Ok(())
}
