//! Chat command parsing.
//!
//! Messenger adapters hand over raw message text; everything after that (parsing,
//! dispatch, reply text) lives in the core.

use crate::domain::Scope;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Query { campus: Scope, area: Scope },
    Refresh,
    ListAreas { campus: Option<String> },
    SetCredential { device_id: String, credential: String },
    /// Recognized command with missing/invalid arguments; carries the usage line.
    Usage(&'static str),
    Help,
}

pub const QUERY_USAGE: &str = "/电桩 [校区] [区域]";
pub const AREAS_USAGE: &str = "/区域 [校区]";
pub const SET_CREDENTIAL_USAGE: &str = "/绑定 <设备ID> <SUID>";

/// Split `/cmd@botname arg1 ...` into the lowercased command name and the argument text.
pub fn split_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Bot username a command is addressed to (`/cmd@name`), if any.
pub fn addressee(text: &str) -> Option<&str> {
    let first = text.trim().split(char::is_whitespace).next()?;
    let (_, name) = first.split_once('@')?;
    Some(name.trim()).filter(|n| !n.is_empty())
}

/// Whether a command is meant for the bot called `username`. Bare commands are; a
/// `/cmd@name` command only when `name` matches (case-insensitively).
pub fn is_addressed_to(text: &str, username: Option<&str>) -> bool {
    match addressee(text) {
        None => true,
        Some(target) => username.map_or(false, |me| target.eq_ignore_ascii_case(me)),
    }
}

/// Parse a chat message. `None` means "not one of our commands".
pub fn parse(text: &str) -> Option<Command> {
    if !text.trim_start().starts_with('/') {
        return None;
    }
    let (cmd, rest) = split_command(text);
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match cmd.as_str() {
        "电桩" | "charge" => {
            if args.len() > 2 {
                Command::Usage(QUERY_USAGE)
            } else {
                Command::Query {
                    campus: Scope::from_arg(args.first().copied()),
                    area: Scope::from_arg(args.get(1).copied()),
                }
            }
        }
        "刷新" | "refresh" => Command::Refresh,
        "区域" | "areas" => match args.as_slice() {
            [] => Command::ListAreas { campus: None },
            [campus] => Command::ListAreas {
                campus: Some((*campus).to_string()),
            },
            _ => Command::Usage(AREAS_USAGE),
        },
        "绑定" | "setsuid" => match args.as_slice() {
            [device_id, credential] => Command::SetCredential {
                device_id: (*device_id).to_string(),
                credential: (*credential).to_string(),
            },
            _ => Command::Usage(SET_CREDENTIAL_USAGE),
        },
        "帮助" | "help" | "start" => Command::Help,
        _ => return None,
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bot_suffix_and_lowercases() {
        assert_eq!(
            split_command("/Charge@campus_bot 南湖 学院"),
            ("charge".to_string(), "南湖 学院".to_string())
        );
    }

    #[test]
    fn commands_for_other_bots_are_not_ours() {
        assert_eq!(addressee("/help@other_bot x"), Some("other_bot"));
        assert_eq!(addressee("/help x@y"), None);
        assert!(is_addressed_to("/foo", Some("campus_bot")));
        assert!(is_addressed_to("/foo@Campus_Bot", Some("campus_bot")));
        assert!(!is_addressed_to("/foo@other_bot", Some("campus_bot")));
        assert!(!is_addressed_to("/foo@other_bot", None));
    }

    #[test]
    fn query_arguments_become_scopes() {
        assert_eq!(
            parse("/电桩"),
            Some(Command::Query {
                campus: Scope::All,
                area: Scope::All
            })
        );
        assert_eq!(
            parse("/电桩@bot  南湖   学院 "),
            Some(Command::Query {
                campus: Scope::Named("南湖".into()),
                area: Scope::Named("学院".into())
            })
        );
        assert_eq!(parse("/电桩 a b c"), Some(Command::Usage(QUERY_USAGE)));
    }

    #[test]
    fn literal_all_is_a_name_not_a_wildcard() {
        assert_eq!(
            parse("/charge all"),
            Some(Command::Query {
                campus: Scope::Named("all".into()),
                area: Scope::All
            })
        );
    }

    #[test]
    fn set_credential_requires_two_args() {
        assert_eq!(
            parse("/绑定 609529 abc"),
            Some(Command::SetCredential {
                device_id: "609529".into(),
                credential: "abc".into()
            })
        );
        assert_eq!(
            parse("/setsuid 609529"),
            Some(Command::Usage(SET_CREDENTIAL_USAGE))
        );
    }

    #[test]
    fn other_commands() {
        assert_eq!(parse("/刷新"), Some(Command::Refresh));
        assert_eq!(parse("/areas"), Some(Command::ListAreas { campus: None }));
        assert_eq!(
            parse("/区域 南湖"),
            Some(Command::ListAreas {
                campus: Some("南湖".into())
            })
        );
        assert_eq!(parse("/start"), Some(Command::Help));
        assert_eq!(parse("/unknown"), None);
        assert_eq!(parse("电桩 南湖"), None);
    }
}
