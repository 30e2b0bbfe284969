//! Control commands: payloads starting with `/`.

/// Reserved first character of a command payload.
pub const COMMAND_PREFIX: char = '/';

const START: &str = "/start";
const RESET: &str = "/reset";
const SYSTEM: &str = "/system";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`: sent by Telegram clients on first open; no reply.
    Start,
    /// `/reset`: drop the conversation back to the directive prefix.
    Reset,
    /// `/system <text>`: replace the directive.
    SetDirective(String),
    /// `/system` alone: show the directive.
    ShowDirective,
    /// Anything else with the prefix; carries the command word.
    Unknown(String),
}

pub fn is_command(text: &str) -> bool {
    text.starts_with(COMMAND_PREFIX)
}

impl Command {
    /// Parse a payload already known to start with [`COMMAND_PREFIX`].
    ///
    /// The command word ends at the first whitespace. A `@botname` suffix on
    /// the word (as clients send in groups) is ignored.
    pub fn parse(text: &str) -> Command {
        let word_end = text.find(char::is_whitespace).unwrap_or(text.len());
        let (word, rest) = text.split_at(word_end);
        let name = word.split('@').next().unwrap_or(word);

        match name {
            START => Command::Start,
            RESET => Command::Reset,
            SYSTEM => {
                let directive = rest.trim();
                if directive.is_empty() {
                    Command::ShowDirective
                } else {
                    Command::SetDirective(directive.to_string())
                }
            }
            _ => Command::Unknown(name.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_prefix() {
        assert!(is_command("/reset"));
        assert!(!is_command("reset"));
        assert!(!is_command(" /reset"));
        assert!(!is_command(""));
    }

    #[test]
    fn parses_fixed_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/reset"), Command::Reset);
        assert_eq!(Command::parse("/reset now please"), Command::Reset);
    }

    #[test]
    fn system_with_text_sets_directive() {
        assert_eq!(
            Command::parse("/system You are terse."),
            Command::SetDirective("You are terse.".to_string())
        );
        assert_eq!(
            Command::parse("/system\nMultiline\ndirective "),
            Command::SetDirective("Multiline\ndirective".to_string())
        );
    }

    #[test]
    fn bare_system_shows_directive() {
        assert_eq!(Command::parse("/system"), Command::ShowDirective);
        assert_eq!(Command::parse("/system   "), Command::ShowDirective);
    }

    #[test]
    fn bot_mention_suffix_is_ignored() {
        assert_eq!(Command::parse("/reset@relay_bot"), Command::Reset);
    }

    #[test]
    fn unknown_commands_keep_their_name() {
        assert_eq!(Command::parse("/help me"), Command::Unknown("/help".to_string()));
        assert_eq!(Command::parse("/"), Command::Unknown("/".to_string()));
        assert_eq!(
            Command::parse("/systemprompt x"),
            Command::Unknown("/systemprompt".to_string())
        );
    }
}
