use std::io::{self, Write};

use hermes::parser::{self, Command};

const DEFAULT_ADDR: &str = "http://127.0.0.1:50051";

#[tokio::main]
async fn main() {
    print_banner();

    let host = std::env::var("HERMES_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let client = reqwest::Client::new();

    match client.get(format!("{host}/healthz")).send().await {
        Ok(_) => println!("[\u{2713}] Connected to Hermes at {}!", host),
        Err(_) => {
            println!("[\u{2717}] Could not reach the gateway at {}.", host);
            println!("    Make sure 'hermes' is running (set HERMES_ADDR to override).");
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("hermes> ");
        io::stdout().flush().unwrap();
        buffer.clear();

        if stdin.read_line(&mut buffer).unwrap() == 0 { break; }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(cmd) => {
                if let Err(e) = execute_command(&client, &host, cmd).await {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                if buffer.trim().to_uppercase().starts_with("SEND") {
                    println!("    \u{2139}\u{fe0f}  Hint: SEND <eventType> \"<data>\" (quote payloads containing spaces)");
                }
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   Hermes CLI - Telemetry Producer");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. SEND:   SEND cpu.load \"0.73\"");
    println!("2. STATS:  Show gateway ingestion counters");
    println!("3. HELP:   This text");
    println!("4. EXIT:   Quit\n");
}

async fn execute_command(
    client: &reqwest::Client,
    host: &str,
    cmd: Command,
) -> Result<(), String> {
    match cmd {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Exit => std::process::exit(0),
        Command::Stats => perform_stats(client, host).await,
        Command::Send { event_type, data } => perform_send(client, host, event_type, data).await,
    }
}

// --- NETWORK HANDLERS ---

async fn perform_send(
    client: &reqwest::Client,
    host: &str,
    event_type: String,
    data: String,
) -> Result<(), String> {
    let resp = client
        .post(format!("{host}/v1/metrics"))
        .json(&serde_json::json!({"eventType": event_type, "data": data}))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;

    match body["status"].as_str() {
        Some("success") => {
            println!("[\u{2713}] {}", body["message"].as_str().unwrap_or(""));
        }
        _ => {
            println!(
                "[\u{2717}] {} (reason: {}, http: {})",
                body["message"].as_str().unwrap_or("error"),
                body["reason"].as_str().unwrap_or("unknown"),
                status
            );
        }
    }
    Ok(())
}

async fn perform_stats(client: &reqwest::Client, host: &str) -> Result<(), String> {
    let body: serde_json::Value = client
        .get(format!("{host}/v1/stats"))
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json()
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", serde_json::to_string_pretty(&body).map_err(|e| e.to_string())?);
    Ok(())
}
