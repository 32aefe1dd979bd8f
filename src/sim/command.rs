use std::{fmt, str::FromStr};

use crate::core::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    RoundRobin,
    Priority,
}

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        argv: Vec<String>,
        priority: i64,
        pages: Option<i64>,
        burst: Option<i64>,
    },
    SetQuantum(i64),
    Schedule(SchedulePolicy),
    StartProducerConsumer {
        items: Option<usize>,
    },
    Ps,
    Metrics(Option<Pid>),
    Kill(Pid),
    Refill(Pid),
    Mem,
    Random {
        count: usize,
        seed: u64,
    },
    Help,
    Exit,
}

/// The closed set of command names the shell understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Add,
    Set,
    Schedule,
    Start,
    Ps,
    Metrics,
    Kill,
    Refill,
    Mem,
    Random,
    Help,
    Exit,
}

impl CommandKind {
    pub const ALL: [Self; 12] = [
        Self::Add,
        Self::Set,
        Self::Schedule,
        Self::Start,
        Self::Ps,
        Self::Metrics,
        Self::Kill,
        Self::Refill,
        Self::Mem,
        Self::Random,
        Self::Help,
        Self::Exit,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "add" => Self::Add,
            "set" => Self::Set,
            "schedule" => Self::Schedule,
            "start" => Self::Start,
            "ps" | "jobs" => Self::Ps,
            "metrics" => Self::Metrics,
            "kill" => Self::Kill,
            "refill" => Self::Refill,
            "mem" => Self::Mem,
            "random" => Self::Random,
            "help" => Self::Help,
            "exit" | "quit" => Self::Exit,
            _ => return None,
        };
        Some(kind)
    }

    pub fn usage(self) -> &'static str {
        match self {
            Self::Add => "add [--burst N] <command...> <priority> [pages]",
            Self::Set => "set quantum <ticks>",
            Self::Schedule => "schedule rr|priority",
            Self::Start => "start producer-consumer [items]",
            Self::Ps => "ps",
            Self::Metrics => "metrics [pid]",
            Self::Kill => "kill <pid>",
            Self::Refill => "refill <pid>",
            Self::Mem => "mem",
            Self::Random => "random <count> [seed]",
            Self::Help => "help",
            Self::Exit => "exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    Unknown(String),
    Usage(CommandKind),
    Number(String),
    UnterminatedQuote,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::Unknown(name) => write!(f, "unknown command: {name} (try `help`)"),
            Self::Usage(kind) => write!(f, "usage: {}", kind.usage()),
            Self::Number(token) => write!(f, "not a number: {token}"),
            Self::UnterminatedQuote => write!(f, "unterminated quote"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Splits on whitespace; single or double quotes group words.
pub fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn number<T: FromStr>(token: &str) -> Result<T, ParseError> {
    token
        .parse()
        .map_err(|_| ParseError::Number(token.to_string()))
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(line)?;
        let Some((name, args)) = tokens.split_first() else {
            return Err(ParseError::Empty);
        };
        let kind =
            CommandKind::from_name(name).ok_or_else(|| ParseError::Unknown(name.clone()))?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let usage = Err(ParseError::Usage(kind));

        match (kind, args.as_slice()) {
            (CommandKind::Add, args) => parse_add(args),
            (CommandKind::Set, ["quantum", q]) => Ok(Self::SetQuantum(number(q)?)),
            (CommandKind::Schedule, ["rr" | "round-robin"]) => {
                Ok(Self::Schedule(SchedulePolicy::RoundRobin))
            }
            (CommandKind::Schedule, ["priority"]) => Ok(Self::Schedule(SchedulePolicy::Priority)),
            (CommandKind::Start, ["producer-consumer"]) => {
                Ok(Self::StartProducerConsumer { items: None })
            }
            (CommandKind::Start, ["producer-consumer", n]) => Ok(Self::StartProducerConsumer {
                items: Some(number(n)?),
            }),
            (CommandKind::Ps, []) => Ok(Self::Ps),
            (CommandKind::Metrics, []) => Ok(Self::Metrics(None)),
            (CommandKind::Metrics, [pid]) => Ok(Self::Metrics(Some(number(pid)?))),
            (CommandKind::Kill, [pid]) => Ok(Self::Kill(number(pid)?)),
            (CommandKind::Refill, [pid]) => Ok(Self::Refill(number(pid)?)),
            (CommandKind::Mem, []) => Ok(Self::Mem),
            (CommandKind::Random, [count]) => Ok(Self::Random {
                count: number(count)?,
                seed: 0,
            }),
            (CommandKind::Random, [count, seed]) => Ok(Self::Random {
                count: number(count)?,
                seed: number(seed)?,
            }),
            (CommandKind::Help, []) => Ok(Self::Help),
            (CommandKind::Exit, []) => Ok(Self::Exit),
            _ => usage,
        }
    }
}

// Trailing integers: "<priority> <pages>" when both parse, else "<priority>"
fn parse_add(args: &[&str]) -> Result<Command, ParseError> {
    let usage = || ParseError::Usage(CommandKind::Add);

    let (burst, args) = match args {
        ["--burst", n, rest @ ..] => (Some(number(n)?), rest),
        _ => (None, args),
    };

    fn int(s: &str) -> Option<i64> {
        s.parse().ok()
    }
    let (argv, priority, pages) = match args {
        [argv @ .., p, n] if !argv.is_empty() && int(p).is_some() && int(n).is_some() => {
            (argv, int(p), int(n))
        }
        [argv @ .., p] if !argv.is_empty() => (argv, Some(number(p)?), None),
        _ => return Err(usage()),
    };

    Ok(Command::Add {
        argv: argv.iter().map(|s| s.to_string()).collect(),
        priority: priority.ok_or_else(usage)?,
        pages,
        burst,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_groups_quotes() {
        assert_eq!(
            tokenize(r#"add "ls -l" 2"#).unwrap(),
            vec!["add", "ls -l", "2"]
        );
        assert_eq!(tokenize("  a   'b c'd ").unwrap(), vec!["a", "b cd"]);
        assert_eq!(tokenize("echo \"\"").unwrap(), vec!["echo", ""]);
        assert_eq!(tokenize("a \"b"), Err(ParseError::UnterminatedQuote));
    }

    #[test]
    fn add_with_priority_and_pages() {
        assert_eq!(
            "add sleep 1 3 4".parse(),
            Ok(Command::Add {
                argv: vec!["sleep".into(), "1".into()],
                priority: 3,
                pages: Some(4),
                burst: None,
            })
        );
    }

    #[test]
    fn add_with_priority_only() {
        assert_eq!(
            "add --burst 7 \"ls -l\" 2".parse(),
            Ok(Command::Add {
                argv: vec!["ls -l".into()],
                priority: 2,
                pages: None,
                burst: Some(7),
            })
        );
        // A lone integer after the program is the priority
        assert_eq!(
            "add 5 3".parse(),
            Ok(Command::Add {
                argv: vec!["5".into()],
                priority: 3,
                pages: None,
                burst: None,
            })
        );
    }

    #[test]
    fn add_needs_a_priority() {
        assert_eq!(
            "add ls".parse::<Command>(),
            Err(ParseError::Usage(CommandKind::Add))
        );
        assert_eq!(
            "add ls high".parse::<Command>(),
            Err(ParseError::Number("high".into()))
        );
    }

    #[test]
    fn scheduling_commands() {
        assert_eq!("set quantum 3".parse(), Ok(Command::SetQuantum(3)));
        assert_eq!("set quantum -1".parse(), Ok(Command::SetQuantum(-1)));
        assert_eq!(
            "schedule rr".parse(),
            Ok(Command::Schedule(SchedulePolicy::RoundRobin))
        );
        assert_eq!(
            "schedule fifo".parse::<Command>(),
            Err(ParseError::Usage(CommandKind::Schedule))
        );
    }

    #[test]
    fn unknown_and_empty_lines() {
        assert_eq!("   ".parse::<Command>(), Err(ParseError::Empty));
        assert_eq!(
            "frobnicate".parse::<Command>(),
            Err(ParseError::Unknown("frobnicate".into()))
        );
    }

    #[test]
    fn every_kind_has_usage() {
        for kind in CommandKind::ALL {
            assert!(!kind.usage().is_empty());
        }
        assert_eq!(
            "start producer-consumer 8".parse(),
            Ok(Command::StartProducerConsumer { items: Some(8) })
        );
        assert_eq!(
            "random 10".parse(),
            Ok(Command::Random { count: 10, seed: 0 })
        );
    }
}
