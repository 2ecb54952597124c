//! Interactive Commands
//!
//! Parsing of the lines typed into `fidus-chat`. Anything not starting with
//! `/` is a chat message.

use crate::models::settings::SettingsUpdate;

/// One line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Message(String),
    Conflicts,
    /// Accept the new value of conflict N (1-based as displayed)
    Accept(usize),
    /// Keep the old value of conflict N
    Keep(usize),
    Dismiss(usize),
    Preferences,
    /// Reinforce stored preference N (1-based as listed by `/prefs`)
    Like(usize),
    /// Weaken stored preference N
    Dislike(usize),
    /// Delete stored preference N
    Forget(usize),
    /// Delete every stored preference, after confirmation
    ForgetAll,
    Situations,
    WhoAmI,
    /// Drop the stored identity; the backend assigns a new one
    ResetIdentity,
    ShowConfig,
    /// Persist one setting, applied on next start
    SetConfig { key: String, value: String },
    ResetConfig,
    Help,
    Quit,
    Empty,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ReplCommand::Empty);
        }
        let Some(command) = line.strip_prefix('/') else {
            return Ok(ReplCommand::Message(line.to_string()));
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        let rest: Vec<&str> = parts.collect();

        match name {
            "conflicts" => Ok(ReplCommand::Conflicts),
            "accept" => Ok(ReplCommand::Accept(position(name, arg)?)),
            "keep" => Ok(ReplCommand::Keep(position(name, arg)?)),
            "dismiss" => Ok(ReplCommand::Dismiss(position(name, arg)?)),
            "prefs" => Ok(ReplCommand::Preferences),
            "like" => Ok(ReplCommand::Like(position(name, arg)?)),
            "dislike" => Ok(ReplCommand::Dislike(position(name, arg)?)),
            "forget" => Ok(ReplCommand::Forget(position(name, arg)?)),
            "forget-all" => Ok(ReplCommand::ForgetAll),
            "situations" => Ok(ReplCommand::Situations),
            "whoami" => Ok(ReplCommand::WhoAmI),
            "reset-identity" => Ok(ReplCommand::ResetIdentity),
            "config" => match (arg, rest.as_slice()) {
                (None, _) => Ok(ReplCommand::ShowConfig),
                (Some("reset"), []) => Ok(ReplCommand::ResetConfig),
                (Some("set"), [key, value]) => Ok(ReplCommand::SetConfig {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
                _ => Err("Usage: /config [set KEY VALUE | reset]".to_string()),
            },
            "help" => Ok(ReplCommand::Help),
            "quit" | "exit" => Ok(ReplCommand::Quit),
            other => Err(format!("Unknown command: /{}. Type /help for commands.", other)),
        }
    }
}

/// Zero-based index from a 1-based argument.
fn position(command: &str, arg: Option<&str>) -> Result<usize, String> {
    let raw = arg.ok_or_else(|| format!("Usage: /{} N", command))?;
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("Invalid number: {}", raw)),
    }
}

/// Build a settings update from `/config set KEY VALUE`.
pub fn settings_update(key: &str, value: &str) -> Result<SettingsUpdate, String> {
    let mut update = SettingsUpdate::default();
    match key {
        "backend_url" => update.backend_url = Some(value.to_string()),
        "fallback_user_id" => update.fallback_user_id = Some(value.to_string()),
        "connect_timeout_secs" => {
            let secs = value
                .parse::<u64>()
                .map_err(|_| format!("Not a number of seconds: {}", value))?;
            update.connect_timeout_secs = Some(secs);
        }
        "log_level" => update.log_level = Some(value.to_string()),
        "proxy" if value == "none" => update.clear_proxy = true,
        "proxy" => {
            return Err("Only `proxy none` can be set here; edit config.json for a proxy".to_string())
        }
        other => {
            return Err(format!(
                "Unknown setting: {}. Known: backend_url, fallback_user_id, connect_timeout_secs, log_level, proxy",
                other
            ))
        }
    }
    Ok(update)
}

pub const HELP: &str = "\
Type a message to chat. Commands:
  /conflicts     list pending preference conflicts
  /accept N      use the new value for conflict N
  /keep N        keep the old value for conflict N
  /dismiss N     drop conflict N without saving anything
  /prefs         show stored preferences
  /like N        reinforce stored preference N
  /dislike N     weaken stored preference N
  /forget N      delete stored preference N
  /forget-all    delete every stored preference (asks first)
  /situations    show recorded situations
  /whoami        show the session identity
  /reset-identity  start over with a new identity
  /config        show settings; /config set KEY VALUE; /config reset
  /quit          exit (also Ctrl-D, or Ctrl-C at the prompt)
Ctrl-C while a reply is streaming stops that reply.";
