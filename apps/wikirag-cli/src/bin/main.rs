use std::env;
use std::io::{self, BufRead, Write};

use wikirag_chat::ChatSession;
use wikirag_cli::{build_pipeline, init_tracing, load_settings, parse_repl_line, CommonArgs, ReplCommand};

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} [--topic <topic>] [--from-file <path>] [--fake-embeddings]", prog);
    std::process::exit(1);
}

fn prompt_line(label: &str) -> io::Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let prog = args.first().cloned().unwrap_or_else(|| "wikirag".to_string());
    let mut common = CommonArgs::default();
    let mut topic = None;
    let mut i = 1;
    while i < args.len() {
        let used = common.take(&args, i)?;
        if used > 0 { i += used; continue; }
        match args[i].as_str() {
            "--topic" => match args.get(i + 1) {
                Some(t) => { topic = Some(t.clone()); i += 1; }
                None => { eprintln!("Error: --topic requires a value"); usage(&prog); }
            },
            "--help" | "-h" => usage(&prog),
            other => { eprintln!("Unknown argument: {}", other); usage(&prog); }
        }
        i += 1;
    }

    let settings = load_settings(&common)?;
    let pipeline = build_pipeline(settings, &common)?;
    let mut session = ChatSession::new();

    println!("\nWelcome to wikirag, a Wikipedia chatbot with memory. Type 'exit' to quit.");
    println!("Commands: :topic <topic>, :clear, :history\n");

    let topic = match topic {
        Some(t) => Some(t),
        None => prompt_line("What topic would you like to explore? ")?,
    };
    if let Some(t) = topic.filter(|t| !t.is_empty()) {
        if let Err(e) = pipeline.open_topic(&mut session, &t).await {
            println!("{}", e.user_message());
        }
    }

    loop {
        let Some(line) = prompt_line("\nYou: ")? else { break };
        if line.is_empty() { continue; }
        match parse_repl_line(&line) {
            ReplCommand::Exit => break,
            ReplCommand::Clear => {
                session.clear();
                println!("Chat cleared ({} archived conversation(s)).", session.archive().len());
            }
            ReplCommand::History => {
                let transcript = session.messages().render();
                println!("{}", if transcript.is_empty() { "(no messages yet)" } else { transcript.as_str() });
            }
            ReplCommand::Topic(t) => match pipeline.open_topic(&mut session, t).await {
                Ok(()) => {
                    if let Some(active) = session.topic() {
                        println!("Topic: {} ({} passages)", active.topic, active.index.len());
                    }
                }
                Err(e) => println!("{}", e.user_message()),
            },
            ReplCommand::Ask(question) => {
                let reply = pipeline.ask(&mut session, question).await;
                println!("\nBot: {}", reply);
            }
        }
    }
    println!("Exiting. Bye!");
    Ok(())
}
