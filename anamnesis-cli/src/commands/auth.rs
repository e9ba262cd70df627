//! API key management.

use anamnesis_models::ProviderKind;
use anamnesis_models::auth::{CredentialSource, env_var_for_provider, GENERIC_ENV_VAR};
use anyhow::{Result, bail};
use clap::Args;
use dialoguer::{Password, theme::ColorfulTheme};

use crate::setup;

#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Provider to configure (openai, ollama)
    pub provider: String,

    /// Show where the key is resolved from
    #[arg(long, conflicts_with = "delete")]
    pub status: bool,

    /// Delete the stored key
    #[arg(long)]
    pub delete: bool,
}

pub fn run(args: AuthArgs) -> Result<()> {
    let provider: ProviderKind = args.provider.parse()?;
    let name = provider.as_str();
    let store = setup::credentials();

    if args.status {
        match store.credential_source(name) {
            Some(CredentialSource::Keyring) => println!("{}: key stored in keyring", name),
            Some(CredentialSource::Environment) => println!("{}: key from environment", name),
            None => println!("{}: no key configured", name),
        }
        return Ok(());
    }

    if args.delete {
        match store.delete(name) {
            Ok(()) => println!("Credentials for '{}' deleted.", name),
            Err(anamnesis_models::Error::CredentialsNotFound(_)) => {
                println!("No credentials found for '{}'.", name);
            }
            Err(e) => bail!("Failed to delete credentials: {}", e),
        }
        return Ok(());
    }

    println!("Enter API key for {} (or set {})", name, env_hint(name));

    let key = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("API key")
        .interact()?;

    if key.trim().is_empty() {
        bail!("API key cannot be empty");
    }

    store.set(name, key.trim())?;
    println!("Credentials for '{}' saved to keyring.", name);
    Ok(())
}

fn env_hint(provider: &str) -> String {
    match env_var_for_provider(provider) {
        Some(var) => format!("{} or {}", GENERIC_ENV_VAR, var),
        None => GENERIC_ENV_VAR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_hint_names_both_variables() {
        assert_eq!(env_hint("openai"), "API_KEY or OPENAI_API_KEY");
        assert_eq!(env_hint("custom"), "API_KEY");
    }
}
