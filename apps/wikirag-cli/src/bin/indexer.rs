use std::env;

use wikirag_cli::{build_pipeline, init_tracing, load_settings, CommonArgs};
use wikirag_core::types::TopicKey;
use wikirag_index::IndexOrigin;

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} [--rebuild] [--list] [--from-file <path>] [--fake-embeddings] <topic>...", prog);
    eprintln!("Example: {} --rebuild Photosynthesis 'Machine learning'", prog);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let prog = args.first().cloned().unwrap_or_else(|| "wikirag-index".to_string());
    let mut common = CommonArgs::default();
    let (mut rebuild, mut list) = (false, false);
    let mut topics = Vec::new();
    let mut i = 1;
    while i < args.len() {
        let used = common.take(&args, i)?;
        if used > 0 { i += used; continue; }
        match args[i].as_str() {
            "--rebuild" | "-r" => rebuild = true,
            "--list" | "-l" => list = true,
            "--help" | "-h" => usage(&prog),
            a if a.starts_with('-') => { eprintln!("Unknown flag: {}", a); usage(&prog); }
            a => topics.push(a.to_string()),
        }
        i += 1;
    }
    if topics.is_empty() && !list { usage(&prog); }

    let settings = load_settings(&common)?;
    let pipeline = build_pipeline(settings, &common)?;
    let store = pipeline.store();
    println!("wikirag-index\n=============");
    println!("Cache directory: {}", store.root().display());

    let mut failures = 0usize;
    for topic in &topics {
        if rebuild {
            match TopicKey::new(topic) {
                Ok(key) => { store.evict(&key)?; }
                Err(e) => { println!("  {}: {}", topic, e.user_message()); failures += 1; continue; }
            }
        }
        match pipeline.resolve(topic).await {
            Ok(resolved) => {
                let origin = match &resolved.origin {
                    IndexOrigin::Cached => "cached".to_string(),
                    IndexOrigin::Built => "built".to_string(),
                    IndexOrigin::Unpersisted { reason } => format!("built, not cached: {reason}"),
                };
                println!("  {} -> {} ({} passages, {})", topic, resolved.key, resolved.index.len(), origin);
            }
            Err(e) => { println!("  {}: {}", topic, e.user_message()); failures += 1; }
        }
    }

    if list {
        let keys = store.cached_topics()?;
        println!("\nCached topics ({}):", keys.len());
        for key in keys {
            let raw = store.stored_topic(&key).await.ok().flatten().unwrap_or_default();
            println!("  {:<32} {}", key, raw);
        }
    }
    if failures > 0 { std::process::exit(1); }
    Ok(())
}
