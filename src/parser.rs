use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while1},
    character::complete::{char, multispace1},
    combinator::map,
    IResult,
};

/// Commands understood by the hermes-cli REPL.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Send { event_type: String, data: String },
    Stats,
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

// --- COMMAND PARSERS ---

fn parse_send(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("SEND")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, event_type) = parse_token(input)?;
    let (input, _) = multispace1(input)?;
    // Payloads with spaces need quoting; bare tokens pass through as-is.
    let (input, data) = alt((
        parse_quoted_string,
        map(parse_token, |s: &str| s.to_string()),
    ))(input)?;

    Ok((
        input,
        Command::Send {
            event_type: event_type.to_string(),
            data,
        },
    ))
}

fn parse_stats(input: &str) -> IResult<&str, Command> {
    map(tag_no_case("STATS"), |_| Command::Stats)(input)
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    map(tag_no_case("HELP"), |_| Command::Help)(input)
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    map(tag_no_case("EXIT"), |_| Command::Exit)(input)
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let trimmed = input.trim();

    match alt((parse_send, parse_stats, parse_help, parse_exit))(trimmed) {
        Ok((rest, cmd)) if rest.trim().is_empty() => Ok(cmd),
        Ok((rest, _)) => Err(format!("Unexpected trailing input: '{}'", rest.trim())),
        Err(_) => Err(format!("Unknown command: '{trimmed}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_with_bare_payload() {
        let cmd = parse_command("SEND cpu.load 0.73").unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                event_type: "cpu.load".into(),
                data: "0.73".into()
            }
        );
    }

    #[test]
    fn send_with_quoted_payload_keeps_spaces() {
        let cmd = parse_command(r#"send disk.io "{"rate": "high", "unit": "mb"}"#).unwrap_err();
        // Unbalanced embedded quotes are trailing garbage, not a panic.
        assert!(cmd.contains("trailing"));

        let cmd = parse_command(r#"send disk.io "rate high""#).unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                event_type: "disk.io".into(),
                data: "rate high".into()
            }
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(parse_command("stats").unwrap(), Command::Stats);
        assert_eq!(parse_command("Help").unwrap(), Command::Help);
        assert_eq!(parse_command("EXIT").unwrap(), Command::Exit);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_command("FLUSH ALL").is_err());
        assert!(parse_command("SEND").is_err());
        assert!(parse_command("STATS now").is_err());
    }
}
