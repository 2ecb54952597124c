//! Privacy Disclosure
//!
//! One-line notice telling the user where their messages are processed.

use fidus_core::preference::AiConfig;

pub fn privacy_disclosure(config: &AiConfig) -> String {
    if config.is_local {
        format!(
            "Your conversations stay on this device. Replies are generated locally by {}.",
            config.model
        )
    } else {
        format!(
            "Your messages are sent to {} to generate replies. Learned preferences are stored by Fidus.",
            provider_label(&config.provider)
        )
    }
}

fn provider_label(provider: &str) -> String {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => "OpenAI".to_string(),
        "anthropic" => "Anthropic".to_string(),
        "google" | "gemini" => "Google".to_string(),
        "mistral" => "Mistral".to_string(),
        "" => "a cloud AI provider".to_string(),
        _ => provider.to_string(),
    }
}
