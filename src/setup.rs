//! Interactive first-run setup wizard (`voicebot setup`)

use std::path::PathBuf;

use dialoguer::{Input, Password, Select};

use crate::config::file::{
    self, ApiKeysFileConfig, LlmFileConfig, VoiceFileConfig, VoicebotConfigFile,
};
use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::llm::ChatModel;

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("Voicebot Setup\n");

    // Load existing config if present
    let existing = file::load_config_file();
    let config_path = file::config_file_path()
        .unwrap_or_else(|| PathBuf::from("~/.config/voicebot/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. API key
    let existing_key = existing.api_keys.openai.as_deref();
    let prompt = existing_key.map_or_else(
        || "OpenAI API key (OPENAI_API_KEY)".to_string(),
        |k| format!("OpenAI API key (current: {}, leave blank to keep)", mask_key(k)),
    );

    let key_input: String = Password::new()
        .with_prompt(&prompt)
        .allow_empty_password(true)
        .interact()?;

    let openai = if key_input.trim().is_empty() {
        existing_key.map(str::to_string)
    } else {
        Some(key_input.trim().to_string())
    };

    if openai.is_none() {
        println!("No key saved; set OPENAI_API_KEY before starting a conversation.");
    }

    // 2. Reply model
    let labels: Vec<&str> = ChatModel::ALL.iter().map(|m| m.as_str()).collect();
    let default_model = existing
        .llm
        .model
        .as_deref()
        .and_then(|m| m.parse::<ChatModel>().ok())
        .and_then(|m| ChatModel::ALL.iter().position(|&c| c == m))
        .unwrap_or(0);

    let model_idx = Select::new()
        .with_prompt("Reply model")
        .items(&labels)
        .default(default_model)
        .interact()?;

    // 3. Persona prompt
    let system_prompt: String = Input::new()
        .with_prompt("System prompt")
        .default(
            existing
                .llm
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        )
        .interact_text()?;

    // 4. Voice
    let language: String = Input::new()
        .with_prompt("Reply language")
        .default(
            existing
                .voice
                .language
                .clone()
                .unwrap_or_else(|| crate::voice::DEFAULT_LANGUAGE.to_string()),
        )
        .interact_text()?;

    let providers = ["google", "openai"];
    let default_provider = existing
        .voice
        .tts_provider
        .as_deref()
        .and_then(|p| providers.iter().position(|&l| l.eq_ignore_ascii_case(p)))
        .unwrap_or(0);

    let provider_idx = Select::new()
        .with_prompt("Speech synthesis")
        .items(&providers)
        .default(default_provider)
        .interact()?;

    // 5. Build and write config
    let config_file = VoicebotConfigFile {
        llm: LlmFileConfig {
            model: Some(labels[model_idx].to_string()),
            system_prompt: Some(system_prompt),
        },
        voice: VoiceFileConfig {
            language: Some(language),
            tts_provider: Some(providers[provider_idx].to_string()),
            ..existing.voice
        },
        api_keys: ApiKeysFileConfig { openai },
        server: existing.server,
    };

    file::write_config_file(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `voicebot` to start talking.");

    Ok(())
}

/// Show only the ends of a key
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
