//! `talkback chat`: interactive or single-message chat.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use talkback_chat::{ChatSession, Submission, TranslationHook, TurnOrchestrator, TurnOutcome};
use talkback_config::AppConfig;
use talkback_core::attachment::Artifact;
use talkback_core::error::TurnError;
use talkback_core::event::{DomainEvent, EventBus};
use talkback_extract::AttachmentGateway;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

pub struct ChatArgs {
    pub message: Option<String>,
    pub attach: Option<PathBuf>,
    pub model: Option<String>,
    pub translate: Option<String>,
}

/// One line typed in interactive mode.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Exit,
    Blank,
    Message(String),
    Attach { path: PathBuf, text: String },
    AttachUsage,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line {
        "" => return Input::Blank,
        "exit" | "quit" => return Input::Exit,
        _ => {}
    }

    if let Some(rest) = line.strip_prefix("/attach") {
        if rest.is_empty() {
            return Input::AttachUsage;
        }
        if rest.starts_with(char::is_whitespace) {
            let rest = rest.trim_start();
            let (path, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            return Input::Attach {
                path: PathBuf::from(path),
                text: text.trim().to_string(),
            };
        }
    }

    Input::Message(line.to_string())
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early and give a clear error
    if let Err(e) = config.require_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export GROQ_API_KEY='gsk_...'        (default provider)");
        eprintln!("    export OPENAI_API_KEY='sk-...'       (for OpenAI direct)");
        eprintln!("    export TALKBACK_API_KEY='...'        (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err(e.into());
    }

    let router = talkback_providers::router::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let event_bus = Arc::new(EventBus::default());
    let gateway = Arc::new(AttachmentGateway::from_config(&config.extraction));

    let mut orchestrator =
        TurnOrchestrator::from_config(&config, Arc::clone(&provider), Arc::clone(&event_bus))?
            .with_extractor(gateway);

    if let Some(model) = &args.model {
        if !orchestrator.is_model_allowed(model) {
            return Err(TurnError::UnknownModel(model.clone()).into());
        }
    }

    let language = args.translate.clone().or_else(|| {
        config
            .translation
            .enabled
            .then(|| config.translation.target_language.clone())
    });
    if let Some(language) = &language {
        let model = config
            .translation
            .model
            .clone()
            .unwrap_or_else(|| config.default_model.clone());
        orchestrator = orchestrator.with_hook(Arc::new(TranslationHook::new(
            Arc::clone(&provider),
            model,
            language.clone(),
            Arc::clone(&event_bus),
        )));
    }

    let session = ChatSession::new();

    if args.message.is_some() || args.attach.is_some() {
        // Single message mode
        let mut translations = event_bus.subscribe();
        let mut submission = Submission::text(args.message.unwrap_or_default());
        if let Some(path) = &args.attach {
            let artifact = load_attachment(path)
                .await
                .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
            submission = submission.with_attachment(artifact);
        }
        if let Some(model) = args.model {
            submission = submission.with_model(model);
        }

        let outcome = orchestrator.submit(&session, submission, print_fragment).await?;
        finish_reply(&outcome);

        if language.is_some() && !matches!(outcome, TurnOutcome::Failed { .. }) {
            let wait = next_translation(&mut translations);
            if let Ok(Some((language, text))) = tokio::time::timeout(config.request_timeout(), wait).await {
                println!("[{language}] {text}");
            }
        }
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║{:^46}║", config.display.title);
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", args.model.as_deref().unwrap_or(orchestrator.model()));
    if let Some(language) = &language {
        println!("  Translate: {language}");
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Use '/attach <path> [message]' to send a file.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    if language.is_some() {
        spawn_translation_printer(&event_bus);
    }

    let user_prompt = format!("  {} > ", config.display.user_avatar);
    let assistant_prompt = format!("  {} > ", config.display.assistant_avatar);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("{user_prompt}");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let submission = match parse_input(&line) {
            Input::Exit => break,
            Input::Blank => None,
            Input::AttachUsage => {
                eprintln!("  usage: /attach <path> [message]");
                None
            }
            Input::Message(text) => Some(Submission::text(text)),
            Input::Attach { path, text } => match load_attachment(&path).await {
                Ok(artifact) => Some(Submission::text(text).with_attachment(artifact)),
                Err(e) => {
                    eprintln!("  [Error] Cannot read {}: {e}", path.display());
                    None
                }
            },
        };

        if let Some(mut submission) = submission {
            if let Some(model) = &args.model {
                submission = submission.with_model(model.clone());
            }

            print!("{assistant_prompt}");
            std::io::stdout().flush()?;
            match orchestrator.submit(&session, submission, print_fragment).await {
                Ok(outcome) => finish_reply(&outcome),
                Err(e) => {
                    println!();
                    eprintln!("  [Error] {e}");
                }
            }
            println!();
        }

        print!("{user_prompt}");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

async fn load_attachment(path: &Path) -> std::io::Result<Artifact> {
    let data = tokio::fs::read(path).await?;
    Ok(Artifact::from_path_and_bytes(path, data))
}

fn print_fragment(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

fn finish_reply(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Replied(_) => println!(),
        TurnOutcome::Truncated { reason, .. } => {
            println!();
            eprintln!("  [reply cut off: {reason}]");
        }
        // Nothing was streamed; show the error turn itself
        TurnOutcome::Failed { turn, .. } => println!("{}", turn.content()),
    }
}

async fn next_translation(
    rx: &mut tokio::sync::broadcast::Receiver<Arc<DomainEvent>>,
) -> Option<(String, String)> {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let DomainEvent::TranslationReady { language, text, .. } = event.as_ref() {
                    return Some((language.clone(), text.clone()));
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return None,
        }
    }
}

fn spawn_translation_printer(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Some((language, text)) = next_translation(&mut rx).await {
            println!("  [{language}] {text}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_and_blank_lines() {
        assert_eq!(parse_input("exit"), Input::Exit);
        assert_eq!(parse_input("  quit \n"), Input::Exit);
        assert_eq!(parse_input("   "), Input::Blank);
    }

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse_input(" hello there "), Input::Message("hello there".into()));
        assert_eq!(parse_input("/attachments please"), Input::Message("/attachments please".into()));
    }

    #[test]
    fn attach_with_and_without_text() {
        assert_eq!(
            parse_input("/attach scan.png what does this say?"),
            Input::Attach {
                path: PathBuf::from("scan.png"),
                text: "what does this say?".into()
            }
        );
        assert_eq!(
            parse_input("/attach report.pdf"),
            Input::Attach {
                path: PathBuf::from("report.pdf"),
                text: String::new()
            }
        );
        assert_eq!(parse_input("/attach"), Input::AttachUsage);
    }
}
