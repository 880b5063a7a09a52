//! Terminal implementations of the presentation-boundary collaborators

use pairkit_core::permission::{PermissionError, PermissionKind};
use pairkit_core::platform::PlatformError;
use pairkit_core::{PermissionRequester, PromptSpec, Prompter, SettingsLink, SettingsOpener};

fn read_line() -> String {
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
    line.trim().to_string()
}

/// Prompts on stdout, answers from stdin
pub struct TermPrompter;

#[async_trait::async_trait]
impl Prompter for TermPrompter {
    async fn confirm(&self, prompt: PromptSpec) -> bool {
        println!("{} [y/N]", prompt.title_key);
        if let Some(message) = &prompt.message_key {
            println!("  {message}");
        }
        let answer = tokio::task::spawn_blocking(read_line)
            .await
            .unwrap_or_default();
        answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
    }

    async fn acknowledge(&self, prompt: PromptSpec) {
        println!("{}", prompt.title_key);
        if let Some(message) = &prompt.message_key {
            println!("  {message}");
        }
        println!("  (press enter to continue)");
        let _ = tokio::task::spawn_blocking(read_line).await;
    }
}

/// Prints the deep link instead of opening it
pub struct TermSettings;

impl SettingsOpener for TermSettings {
    fn open(&self, link: SettingsLink) -> Result<(), PlatformError> {
        println!("open settings: {}", link.url());
        Ok(())
    }
}

/// Desktop hosts have no scan permission to request
pub struct GrantAll;

#[async_trait::async_trait]
impl PermissionRequester for GrantAll {
    async fn check(&self, _kind: PermissionKind) -> Result<bool, PermissionError> {
        Ok(true)
    }

    async fn request(&self, _kind: PermissionKind) -> Result<bool, PermissionError> {
        Ok(true)
    }
}
