use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, INDEX_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args.get(key).and_then(Value::as_str)
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Turns one line of studio input into an intent.
///
/// Slash commands map through the command registry; any other non-blank line
/// replaces the prompt text.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("value".to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, INDEX_COMMANDS) {
                let mut intent = Intent::new(action, text);
                // Listed entries are numbered from 1.
                let index = arg
                    .parse::<u64>()
                    .ok()
                    .filter(|value| *value > 0)
                    .map(|value| Value::Number((value - 1).into()))
                    .unwrap_or(Value::Null);
                intent.command_args.insert("index".to_string(), index);
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("edit_prompt", text);
    intent
        .command_args
        .insert("value".to_string(), Value::String(raw_trimmed.to_string()));
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::parse_intent;

    #[test]
    fn parse_answer_commands_keep_raw_value() {
        let category = parse_intent("/category Tech");
        assert_eq!(category.action, "set_category");
        assert_eq!(category.command_args["value"], json!("Tech"));

        let overlay = parse_intent("/overlay   5 Tips \"now\"  ");
        assert_eq!(overlay.action, "set_text_overlay");
        assert_eq!(overlay.arg_str("value"), Some("5 Tips \"now\""));

        let cleared = parse_intent("/overlay");
        assert_eq!(cleared.arg_str("value"), Some(""));
    }

    #[test]
    fn parse_upload_quoted_path() {
        let intent = parse_intent("/upload \"/tmp/my face.png\"");
        assert_eq!(intent.action, "attach_reference");
        assert_eq!(intent.command_args["path"], json!("/tmp/my face.png"));

        let download = parse_intent("/download");
        assert_eq!(download.action, "download");
        assert_eq!(download.command_args["path"], json!(""));
    }

    #[test]
    fn parse_select_is_one_based() {
        assert_eq!(parse_intent("/select 1").command_args["index"], json!(0));
        assert_eq!(parse_intent("/select 3").command_args["index"], json!(2));
        assert_eq!(parse_intent("/select 0").command_args["index"], Value::Null);
        assert_eq!(parse_intent("/select x").command_args["index"], Value::Null);
    }

    #[test]
    fn parse_no_arg_commands() {
        assert_eq!(parse_intent("/generate").action, "submit");
        assert_eq!(parse_intent("/REGENERATE").action, "regenerate");
        assert_eq!(parse_intent("/clear_upload").action, "clear_reference");
        assert_eq!(parse_intent("/theme").action, "toggle_theme");
    }

    #[test]
    fn plain_text_edits_prompt() {
        let intent = parse_intent("  a neon city at night  ");
        assert_eq!(intent.action, "edit_prompt");
        assert_eq!(intent.arg_str("value"), Some("a neon city at night"));
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
