//! Operator credential acquisition
//!
//! The user name comes from `--user`, the config file, or a prompt. The
//! password comes from `CLUSTERLEVEL_PASSWORD` or a hidden prompt. With a
//! key file configured there is no prompt; `CLUSTERLEVEL_PASSWORD`, if set,
//! unlocks the key. The secret stays in this process and is handed to the
//! SSH library directly.

use console::Term;
use dialoguer::{Input, Password};
use reconcile::{Credential, CredentialSource, Error, Result};

/// Environment variable holding the password for non-interactive runs
pub const ENV_PASSWORD: &str = "CLUSTERLEVEL_PASSWORD";

pub struct PromptCredentials {
    user: Option<String>,
    password: Option<String>,
    key_auth: bool,
    interactive: bool,
}

impl PromptCredentials {
    pub fn new(user: Option<String>, key_auth: bool) -> Self {
        Self {
            user,
            password: std::env::var(ENV_PASSWORD).ok(),
            key_auth,
            interactive: Term::stderr().is_term(),
        }
    }

    /// Never prompts; missing values stay missing
    #[cfg(test)]
    pub fn non_interactive(user: Option<String>, password: Option<String>, key_auth: bool) -> Self {
        Self {
            user,
            password,
            key_auth,
            interactive: false,
        }
    }

    fn username(&mut self) -> Result<String> {
        let name = match self.user.take() {
            Some(name) => name,
            None if self.interactive => Input::<String>::new()
                .with_prompt("Username")
                .allow_empty(true)
                .interact_text()
                .map_err(|e| Error::Prompt(e.to_string()))?,
            None => return Err(Error::NoCredential),
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(Error::NoCredential);
        }
        Ok(name.to_string())
    }

    fn secret(&mut self, username: &str) -> Result<Option<String>> {
        if let Some(password) = self.password.take() {
            return Ok(Some(password));
        }
        if self.key_auth || !self.interactive {
            return Ok(None);
        }

        let password = Password::new()
            .with_prompt(format!("Password for {username}"))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))?;
        Ok(Some(password))
    }
}

impl CredentialSource for PromptCredentials {
    fn acquire(&mut self) -> Result<Credential> {
        let username = self.username()?;
        let secret = self.secret(&username)?;
        log::debug!(
            "Using credential for {username} ({})",
            if secret.is_some() { "password" } else { "key/agent" }
        );
        Ok(Credential::new(username, secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_user_is_no_credential() {
        let mut source = PromptCredentials::non_interactive(None, Some("pw".into()), false);
        assert!(matches!(source.acquire(), Err(Error::NoCredential)));
    }

    #[test]
    fn test_blank_user_is_no_credential() {
        let mut source = PromptCredentials::non_interactive(Some("   ".into()), None, false);
        assert!(matches!(source.acquire(), Err(Error::NoCredential)));
    }

    #[test]
    fn test_user_and_password() {
        let mut source =
            PromptCredentials::non_interactive(Some(" CORP\\admin ".into()), Some("pw".into()), false);
        let cred = source.acquire().unwrap();
        assert_eq!(cred.username, "CORP\\admin");
        assert_eq!(cred.secret.as_deref(), Some("pw"));
    }

    #[test]
    fn test_key_auth_needs_no_password() {
        let mut source = PromptCredentials::non_interactive(Some("admin".into()), None, true);
        let cred = source.acquire().unwrap();
        assert_eq!(cred.secret, None);
    }
}
