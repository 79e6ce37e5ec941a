//! Profile command implementation.

use crate::cli::{ProfileAction, ProfileArgs};
use crate::config::{Config, Profile};
use crate::error::{CliError, Result};
use crate::output::Formatter;

/// Execute the profile command.
pub fn execute_profile(args: ProfileArgs, config: &mut Config, formatter: &Formatter) -> Result<()> {
    match args.action {
        ProfileAction::List => list_profiles(config, formatter),
        ProfileAction::Show => show_active_profile(config, formatter),
        ProfileAction::Use { name } => use_profile(config, name, formatter),
        ProfileAction::Add { name, url, user } => add_profile(config, name, url, user, formatter),
        ProfileAction::Delete { name } => delete_profile(config, &name, formatter),
    }
}

fn list_profiles(config: &Config, formatter: &Formatter) -> Result<()> {
    if config.profiles.is_empty() {
        println!("{}", formatter.info("No profiles configured"));
        return Ok(());
    }

    println!("Available profiles:");
    for (name, profile) in &config.profiles {
        if name == &config.active_profile {
            println!("* {}", formatter.success(name));
        } else {
            println!("  {}", name);
        }
        println!("    Relay: {}", profile.relay_url);
        println!("    User: {}", profile.user);
    }

    Ok(())
}

fn show_active_profile(config: &Config, formatter: &Formatter) -> Result<()> {
    let profile = config.get_active_profile()?;

    println!("Active profile: {}", formatter.success(&config.active_profile));
    println!("  Relay: {}", profile.relay_url);
    println!("  User: {}", profile.user);

    Ok(())
}

fn use_profile(config: &mut Config, name: String, formatter: &Formatter) -> Result<()> {
    config.switch_profile(name.clone())?;
    config.save()?;
    println!("{}", formatter.success(&format!("Switched to profile '{}'", name)));
    Ok(())
}

fn add_profile(
    config: &mut Config,
    name: String,
    url: String,
    user: Option<String>,
    formatter: &Formatter,
) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(CliError::InvalidInput(format!(
            "Relay URL must start with http:// or https://, got '{}'",
            url
        )));
    }

    // Updating keeps the existing user unless a new one is given
    let user = user
        .or_else(|| config.profiles.get(&name).map(|p| p.user.clone()))
        .unwrap_or_else(|| "docstream".to_string());

    let action = if config.profiles.contains_key(&name) {
        "Updated"
    } else {
        "Created"
    };

    config.set_profile(name.clone(), Profile { relay_url: url, user });
    config.save()?;

    println!("{}", formatter.success(&format!("{} profile '{}'", action, name)));
    Ok(())
}

fn delete_profile(config: &mut Config, name: &str, formatter: &Formatter) -> Result<()> {
    config.remove_profile(name)?;
    config.save()?;
    println!("{}", formatter.success(&format!("Deleted profile '{}'", name)));
    Ok(())
}
