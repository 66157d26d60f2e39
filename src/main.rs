use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use confab::Provider;
use confab::core::command::respond;
use confab::core::config::{ResolvedConfig, load_config, resolve};
use confab::core::session::SessionStore;
use confab::providers::{
    AudioSource, ChatInput, Dispatcher, GeminiAdapter, GroqAdapter, ImageReference, OpenAiAdapter,
    Role, Selector, is_warning,
};

#[derive(Parser)]
#[command(name = "confab", about = "Multi-provider AI chat dispatcher")]
struct Args {
    /// AI provider to send chat turns to
    #[arg(short, long, default_value_t, value_enum)]
    provider: Provider,
}

const HELP: &str = "\
commands:
  /image <prompt>     generate an image
  /askimage <question> ask about this chat's uploaded image
  /upload <path>      upload an image (attach) or audio (transcribe + reply)
  /new                start a new chat
  /delete             delete the current chat
  /chats              list chats
  /switch <name>      switch to a chat
  /model <name>       switch provider (openai, gemini, groq)
  /save               export this chat as <name>.txt
  /quit               exit";

fn build_dispatcher(config: &ResolvedConfig) -> Dispatcher {
    Dispatcher::new(
        OpenAiAdapter::new(config.openai_api_key.clone(), config.openai_base_url.clone()),
        GeminiAdapter::new(config.gemini_api_key.clone(), config.gemini_base_url.clone()),
        GroqAdapter::new(config.groq_api_key.clone(), config.groq_base_url.clone()),
    )
}

/// Copies an uploaded image next to the process under a best-effort unique
/// name and attaches it to the current session.
fn attach_uploaded_image(store: &mut SessionStore, path: &Path) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.png".to_string());
    let copy = PathBuf::from(format!("temp_{}_{}", Utc::now().timestamp(), file_name));
    std::fs::copy(path, &copy)?;
    store.attach_image(ImageReference::Path(copy.clone()));
    Ok(copy)
}

/// Audio uploads run the full round trip: transcribe, post the transcript as
/// the user turn, fetch a reply, then synthesize the reply to speech.
async fn handle_audio_upload(
    dispatcher: &Dispatcher,
    store: &mut SessionStore,
    config: &ResolvedConfig,
    selector: &str,
    path: &Path,
) {
    let transcript = dispatcher
        .transcribe(&AudioSource::Path(path.to_path_buf()))
        .await;
    if is_warning(&transcript) {
        println!("{transcript}");
        return;
    }

    println!("user: {transcript}");
    store.push(Role::User, transcript.clone());

    let reply = dispatcher
        .dispatch(selector, &ChatInput::Text(transcript), None)
        .await;
    println!("assistant: {reply}");
    store.push(Role::Assistant, reply.clone());

    let speech = dispatcher
        .speak(
            &reply,
            config.tts_voice.as_deref(),
            config.tts_instructions.as_deref(),
        )
        .await;
    if is_warning(&speech) {
        println!("{speech}");
    } else {
        println!("(speech saved to {speech})");
    }
}

async fn handle_upload(
    dispatcher: &Dispatcher,
    store: &mut SessionStore,
    config: &ResolvedConfig,
    selector: &str,
    raw_path: &str,
) {
    let path = Path::new(raw_path.trim());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" | "jpg" | "jpeg" => match attach_uploaded_image(store, path) {
            Ok(copy) => println!(
                "Image uploaded and saved to {} for visual Q&A. Use /askimage <question> to query it.",
                copy.display()
            ),
            Err(e) => println!("Image handling error: {e}"),
        },
        "wav" | "mp3" => {
            handle_audio_upload(dispatcher, store, config, selector, path).await;
        }
        other => println!("Unsupported upload type: .{other} (use wav, mp3, png, jpg, jpeg)"),
    }
}

fn save_transcript(store: &SessionStore) {
    let file_name = format!("{}.txt", store.current().name);
    match std::fs::write(&file_name, store.export()) {
        Ok(()) => println!("Saved transcript to {file_name}"),
        Err(e) => println!("Could not save transcript: {e}"),
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to confab.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create("confab.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    info!("Confab starting up with provider: {:?}", args.provider);

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            warn!("Falling back to default config: {e}");
            eprintln!("{e}");
            Default::default()
        }
    };
    let resolved = resolve(&config, Some(args.provider.selector()));
    let dispatcher = build_dispatcher(&resolved);

    let mut store = SessionStore::new();
    let mut selector = resolved.provider.clone();

    println!("confab: chatting via {selector} (type /help for commands)");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{}> ", store.current().name);
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/new" => {
                let name = store.new_chat().to_string();
                println!("Started {name}");
            }
            "/delete" => match store.delete_current() {
                Ok(()) => println!("Deleted. Now in {}", store.current().name),
                Err(e) => println!("{e}"),
            },
            "/chats" => {
                for name in store.names() {
                    let marker = if name == store.current().name { "*" } else { " " };
                    println!("{marker} {name}");
                }
            }
            "/save" => save_transcript(&store),
            _ => {
                if let Some(name) = input.strip_prefix("/switch ") {
                    if !store.switch(name.trim()) {
                        println!("No chat named {}", name.trim());
                    }
                } else if let Some(name) = input.strip_prefix("/model ") {
                    let name = name.trim();
                    match Selector::parse(name) {
                        Some(parsed) => {
                            selector = name.to_ascii_lowercase();
                            println!("Now chatting via {}", parsed.label());
                        }
                        None => println!("Model not available."),
                    }
                } else if let Some(path) = input.strip_prefix("/upload ") {
                    handle_upload(&dispatcher, &mut store, &resolved, &selector, path).await;
                } else {
                    store.push(Role::User, input);
                    let reply = respond(&dispatcher, &selector, store.current(), input).await;
                    println!("assistant: {reply}");
                    store.push(Role::Assistant, reply);
                }
            }
        }
    }

    Ok(())
}
