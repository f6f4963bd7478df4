// ABOUTME: Terminal prompts for secrets and destructive-operation confirmation
// ABOUTME: Falls back to errors when stdin is not a terminal

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use std::io::IsTerminal;

/// Resolve a password from flag, config, environment, then an interactive prompt
///
/// The environment variable is the one the client itself honours
/// (`ISC_PASSWORD` for isql, `PGPASSWORD` for psql), so existing shell
/// setups keep working.
///
/// # Errors
///
/// Returns an error when no source provides a password and stdin is not a
/// terminal, or when the prompt itself fails.
pub fn resolve_password(
    flag: Option<String>,
    configured: Option<String>,
    env_var: &str,
    prompt: &str,
) -> Result<String> {
    if let Some(password) = flag.or(configured) {
        return Ok(password);
    }

    if let Ok(password) = std::env::var(env_var) {
        tracing::debug!("Using password from {}", env_var);
        return Ok(password);
    }

    if !std::io::stdin().is_terminal() {
        bail!(
            "No password given. Pass --password, set it in the config file, or export {}.",
            env_var
        );
    }

    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .context("Failed to read password")
}

/// Ask before dropping tables unless `--yes` was given
///
/// Returns `Ok(true)` when the caller may proceed.
pub fn confirm_drop(target: &str, table_count: usize, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    if !std::io::stdin().is_terminal() {
        bail!("--drop-existing needs confirmation; re-run with --yes to skip the prompt");
    }

    println!();
    println!(
        "--drop-existing will DROP up to {} table(s) in {} before loading.",
        table_count, target
    );

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Proceed?")
        .default(false)
        .interact()
        .context("Failed to get confirmation")?;

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins() {
        let password = resolve_password(
            Some("from-flag".into()),
            Some("from-config".into()),
            "TABLEHOP_TEST_UNUSED_PASSWORD",
            "Password",
        )
        .unwrap();
        assert_eq!(password, "from-flag");
    }

    #[test]
    fn test_config_before_env() {
        let password = resolve_password(
            None,
            Some("from-config".into()),
            "TABLEHOP_TEST_UNUSED_PASSWORD",
            "Password",
        )
        .unwrap();
        assert_eq!(password, "from-config");
    }

    #[test]
    fn test_env_fallback() {
        std::env::set_var("TABLEHOP_TEST_ENV_PASSWORD", "from-env");
        let password =
            resolve_password(None, None, "TABLEHOP_TEST_ENV_PASSWORD", "Password").unwrap();
        assert_eq!(password, "from-env");
        std::env::remove_var("TABLEHOP_TEST_ENV_PASSWORD");
    }

    #[test]
    fn test_assume_yes_skips_prompt() {
        assert!(confirm_drop("db", 3, true).unwrap());
    }
}
