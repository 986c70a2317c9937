//! Compile command - turn a natural-language rule into a policy document
//!
//! Thin adapter over the OpenAI chat-completions API. The decision pipeline
//! never depends on this; it exists for authoring convenience.

use clap::Args;
use serde_json::{json, Value};

use crate::{Error, Result};

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You translate natural-language authorization rules into YAML policy \
documents with fields: id, effect (allow|deny), subjects (list of {role}), resource (list), \
action (list), conditions (map), when (map), advice. Output only the YAML document.";

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Natural-language rule, e.g. "admins may read every file in prod"
    pub rule: String,

    /// Model to use
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,
}

pub async fn run(args: CompileArgs) -> Result<()> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| Error::compiler("OPENAI_API_KEY is not set"))?;

    let body = json!({
        "model": args.model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": args.rule },
        ],
    });

    let response = reqwest::Client::new()
        .post(COMPLETIONS_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::compiler(format!("request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::compiler(format!("HTTP {}", response.status())));
    }

    let completion: Value = response
        .json()
        .await
        .map_err(|e| Error::compiler(format!("invalid response: {e}")))?;
    let document = completion["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| Error::compiler("no completion in response"))?;

    println!("{document}");
    Ok(())
}
