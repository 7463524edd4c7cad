//! `conductor chat`: interactive or single-message chat.

use std::sync::Arc;

use conductor_config::EngineConfig;
use conductor_core::session::InMemorySessionStore;
use conductor_providers::OpenAiCompatProvider;
use conductor_workflow::{ChatService, EngineError, FinalResult, Pipeline, ServiceBindings};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Wire the provider, built-in tools and pipeline from config.
fn build_service(config: EngineConfig) -> Result<ChatService, Box<dyn std::error::Error>> {
    let provider = OpenAiCompatProvider::from_config(&config)?;
    let pipeline = Pipeline::new(&config.pipeline);
    let services = ServiceBindings::new(
        Arc::new(provider),
        conductor_tools::default_registry(),
        config,
    );
    Ok(ChatService::new(
        pipeline,
        services,
        Arc::new(InMemorySessionStore::new()),
    ))
}

fn print_result(result: &FinalResult, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", result.response);
    }
    Ok(())
}

/// The error and what the user can do about it, as printed to stderr.
fn failure_message(error: &EngineError) -> String {
    format!("  [Error] {error}\n  {}", error.remediation())
}

fn print_error(error: &EngineError) {
    eprintln!("{}", failure_message(error));
}

pub async fn run(
    message: Option<String>,
    session: String,
    context: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    CONDUCTOR_API_KEY    (generic)");
        eprintln!("    OPENAI_API_KEY       (OpenAI)");
        eprintln!("    OPENROUTER_API_KEY   (OpenRouter, with CONDUCTOR_BASE_URL)");
        eprintln!();
        eprintln!("  Or add `api_key` to your config file:");
        eprintln!("    {}", EngineConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let model = config.model.primary.clone();
    let service = build_service(config)?;

    if let Some(msg) = message {
        match service.chat(&session, &msg, context).await {
            Ok(result) => return print_result(&result, json),
            Err(e) => {
                print_error(&e);
                std::process::exit(1);
            }
        }
    }

    println!();
    println!("  Conductor, interactive mode");
    println!("  Model:    {model}");
    println!("  Tools:    {}", service.services().tools.names().join(", "));
    println!("  Session:  {session}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/reset' to forget this session, 'exit' to quit.");
    println!();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"  You > ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                service.reset(&session).await;
                println!("  Session cleared.\n");
                continue;
            }
            _ => {}
        }

        match service.chat(&session, line, context.clone()).await {
            Ok(result) if json => print_result(&result, true)?,
            Ok(result) => {
                println!();
                for text in result.response.lines() {
                    println!("  Assistant > {text}");
                }
                println!();
            }
            Err(e) => {
                print_error(&e);
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_reports_error_once_with_remediation() {
        let text = failure_message(&EngineError::Timeout { secs: 120 });
        assert_eq!(text.matches("[Error]").count(), 1);
        assert_eq!(text.matches("Request timed out after 120s").count(), 1);
        assert!(text.contains("request_timeout_secs"));
        assert_eq!(text.lines().count(), 2);
    }
}
