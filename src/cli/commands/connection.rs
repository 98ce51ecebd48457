//! Chat API connection check.

use console::style;

use reqvector::config::Settings;
use reqvector::llm::{ChatRequest, ChatService, LlmClient};

/// Send a one-line request and report what happened. Returns `false` on any
/// failure so the caller can exit non-zero.
pub async fn cmd_test_connection(settings: &Settings, api_key: Option<String>) -> bool {
    let mut llm_config = settings.llm.clone();
    if let Some(key) = api_key {
        llm_config = llm_config.with_api_key(key);
    }

    println!("{} Testing connection to {}", style("→").cyan(), llm_config.endpoint);

    let client = match LlmClient::new(llm_config) {
        Ok(c) => c,
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            println!();
            println!("  Set up a key with one of:");
            println!("  1. Create a .env file containing DEEPSEEK_API_KEY=your_api_key_here");
            println!("  2. export DEEPSEEK_API_KEY=your_api_key_here");
            println!("  3. reqvector test-connection -k your_api_key_here");
            return false;
        }
    };

    let llm_config = client.config();
    if let Some(masked) = llm_config.masked_api_key() {
        println!("{} API key: {}", style("✓").green(), masked);
    }

    match client.complete(&ChatRequest::connection_test()).await {
        Ok(completion) => {
            println!("{} Reply: {}", style("✓").green(), completion.content);
            if let Some(usage) = completion.usage {
                println!(
                    "  {} tokens: {} prompt, {} completion, {} total",
                    style("→").dim(),
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens
                );
            }
            println!("{} Connection OK (model: {})", style("✓").green(), llm_config.model);
            true
        }
        Err(e) => {
            println!("{} Request failed: {}", style("✗").red(), e);
            println!();
            println!("  Possible causes:");
            println!("  - API key invalid or expired");
            println!("  - Network problems");
            println!("  - Service temporarily unavailable");
            println!("  - Insufficient account balance");
            println!("  {}", llm_config.availability_hint());
            false
        }
    }
}
