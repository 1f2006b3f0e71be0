//! Command parsing for the `vote` surface.
//!
//! Syntax:
//! - `vote <kind> <target...>` open a ballot (or second an identical one)
//! - `vote <id> <y|n>` / `vote <y|n> [id]` cast a vote
//! - `vote list [--type <kind>]` list open or recent ballots
//! - `vote <id>` detailed ballot info
//!
//! A leading `!` is tolerated so wire adapters can pass prefixed commands
//! through unchanged. The parser does not know the ballot kinds; an
//! unrecognized first word becomes an `Open` for the engine to validate.

/// A parsed `vote` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteCommand {
    Open { kind: String, target: String },
    Cast { election: Option<i64>, yea: bool },
    List { kind: Option<String> },
    Info { election: i64 },
}

/// Parse one message. Returns `None` for anything that is not a vote
/// command, `Some(Err(usage))` for a malformed one.
pub fn parse(text: &str) -> Option<Result<VoteCommand, &'static str>> {
    let text = text.trim();
    let text = text.strip_prefix('!').unwrap_or(text);
    let mut words = text.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("vote") {
        return None;
    }
    let args: Vec<&str> = words.collect();
    Some(parse_args(&args))
}

fn parse_args(args: &[&str]) -> Result<VoteCommand, &'static str> {
    let Some(&first) = args.first() else {
        return Err("usage: vote <kind> <target> | vote <id> [y|n] | vote list");
    };
    let first_lower = first.to_ascii_lowercase();
    let head = first_lower.trim_start_matches('#');

    if head == "list" {
        return parse_list(&args[1..]);
    }

    if let Ok(id) = head.parse::<i64>() {
        return match args.get(1).map(|a| a.to_ascii_lowercase()) {
            None => Ok(VoteCommand::Info { election: id }),
            Some(polarity) => match parse_polarity(&polarity) {
                Some(yea) => Ok(VoteCommand::Cast {
                    election: Some(id),
                    yea,
                }),
                None => Err("usage: vote <id> <y|n>"),
            },
        };
    }

    if let Some(yea) = parse_polarity(head) {
        return match args.get(1) {
            None => Ok(VoteCommand::Cast {
                election: None,
                yea,
            }),
            Some(id) => match id.trim_start_matches('#').parse::<i64>() {
                Ok(id) => Ok(VoteCommand::Cast {
                    election: Some(id),
                    yea,
                }),
                Err(_) => Err("usage: vote <y|n> [id]"),
            },
        };
    }

    // Anything else is a ballot kind; the engine rejects unknown ones.
    // Target keeps its original case for free-text ballots.
    Ok(VoteCommand::Open {
        kind: head.to_string(),
        target: args[1..].join(" "),
    })
}

fn parse_list(args: &[&str]) -> Result<VoteCommand, &'static str> {
    match args {
        [] => Ok(VoteCommand::List { kind: None }),
        ["--type", kind] => Ok(VoteCommand::List {
            kind: Some(kind.to_ascii_lowercase()),
        }),
        _ => Err("usage: vote list [--type <kind>]"),
    }
}

fn parse_polarity(word: &str) -> Option<bool> {
    match word {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_non_vote_messages() {
        assert_eq!(parse("hello world"), None);
        assert_eq!(parse("voter turnout"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn parses_open_with_free_text_target() {
        let cmd = parse("vote topic Quiet Hours After Midnight").unwrap().unwrap();
        assert_eq!(
            cmd,
            VoteCommand::Open {
                kind: "topic".to_string(),
                target: "Quiet Hours After Midnight".to_string(),
            }
        );
    }

    #[test]
    fn tolerates_prefix_and_case() {
        let cmd = parse("  !VOTE ban Mallory ").unwrap().unwrap();
        assert_eq!(
            cmd,
            VoteCommand::Open {
                kind: "ban".to_string(),
                target: "Mallory".to_string(),
            }
        );
    }

    #[test]
    fn parses_cast_both_orders() {
        assert_eq!(
            parse("vote 12 y").unwrap().unwrap(),
            VoteCommand::Cast { election: Some(12), yea: true }
        );
        assert_eq!(
            parse("vote no #12").unwrap().unwrap(),
            VoteCommand::Cast { election: Some(12), yea: false }
        );
        assert_eq!(
            parse("vote yes").unwrap().unwrap(),
            VoteCommand::Cast { election: None, yea: true }
        );
    }

    #[test]
    fn bare_id_is_an_info_request() {
        assert_eq!(
            parse("vote #7").unwrap().unwrap(),
            VoteCommand::Info { election: 7 }
        );
    }

    #[test]
    fn parses_list_with_optional_type() {
        assert_eq!(
            parse("vote list").unwrap().unwrap(),
            VoteCommand::List { kind: None }
        );
        assert_eq!(
            parse("vote list --type civis").unwrap().unwrap(),
            VoteCommand::List { kind: Some("civis".to_string()) }
        );
        assert!(parse("vote list --kind civis").unwrap().is_err());
    }

    #[test]
    fn malformed_commands_report_usage() {
        assert!(parse("vote").unwrap().is_err());
        assert!(parse("vote 12 maybe").unwrap().is_err());
        assert!(parse("vote y twelve").unwrap().is_err());
    }
}
