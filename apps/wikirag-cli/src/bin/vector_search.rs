use std::env;

use wikirag_cli::{build_pipeline, init_tracing, load_settings, CommonArgs};

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} <topic> <query> [--limit N] [--from-file <path>] [--fake-embeddings]", prog);
    eprintln!("Example: {} Photosynthesis 'what does chlorophyll absorb' --limit 3", prog);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let prog = args.first().cloned().unwrap_or_else(|| "wikirag-search".to_string());
    let mut common = CommonArgs::default();
    let mut limit = 10usize;
    let mut positional = Vec::new();
    let mut i = 1;
    while i < args.len() {
        let used = common.take(&args, i)?;
        if used > 0 { i += used; continue; }
        match args[i].as_str() {
            "--limit" => match args.get(i + 1).and_then(|l| l.parse::<usize>().ok()) {
                Some(l) => { limit = l; i += 1; }
                None => { eprintln!("Error: --limit requires a number"); std::process::exit(1); }
            },
            "--help" | "-h" => usage(&prog),
            a => positional.push(a.to_string()),
        }
        i += 1;
    }
    let [topic, query] = positional.as_slice() else { usage(&prog) };

    let settings = load_settings(&common)?;
    let pipeline = build_pipeline(settings, &common)?;
    println!("wikirag-search\n==============");
    println!("Topic: {}", topic);
    println!("Query: {}", query);

    match pipeline.search(topic, query, limit).await {
        Ok(hits) => {
            println!("\nFound {} results for: \"{}\"", hits.len(), query);
            for (i, hit) in hits.iter().enumerate() {
                println!("\n  {}. score={:.4}  passage={}  source={}", i + 1, hit.score, hit.passage.order, hit.passage.source);
                println!("     Content: {}", hit.passage.text);
            }
        }
        Err(e) => {
            println!("{}", e.user_message());
            std::process::exit(1);
        }
    }
    Ok(())
}
