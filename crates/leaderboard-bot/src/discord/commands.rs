//! Slash command definitions and parsing.
//!
//! Serenity's resolved options are first copied into [`CommandOption`] so the
//! parser can be tested without a gateway.

use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::{CommandOptionType, ResolvedOption, ResolvedValue};
use serenity::model::permissions::Permissions;
use thiserror::Error;

use crate::config::LeaderboardSettings;

pub const CLAIMTAG: &str = "claimtag";
pub const HISTORY: &str = "history";
pub const SEASON: &str = "season";
pub const LEADERBOARD: &str = "leaderboard";

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Integer(i64),
    String(String),
    User(u64),
    SubCommand(Vec<CommandOption>),
    /// Anything this bot never declares.
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOption {
    pub name: String,
    pub value: OptionValue,
}

impl CommandOption {
    pub fn new(name: &str, value: OptionValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

pub fn from_resolved(options: &[ResolvedOption<'_>]) -> Vec<CommandOption> {
    options
        .iter()
        .map(|opt| {
            let value = match &opt.value {
                ResolvedValue::Integer(i) => OptionValue::Integer(*i),
                ResolvedValue::String(s) => OptionValue::String(s.to_string()),
                ResolvedValue::User(u, _) => OptionValue::User(u.id.get()),
                ResolvedValue::SubCommand(inner) => OptionValue::SubCommand(from_resolved(inner)),
                _ => OptionValue::Other,
            };
            CommandOption {
                name: opt.name.to_string(),
                value,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderboardCommand {
    ClaimTag { tag: i64 },
    HistoryMember { member: Option<String>, limit: Option<i64> },
    HistoryChart { member: Option<String> },
    SeasonStart { name: String },
    SeasonStandings { season_id: Option<String> },
    SeasonEnd,
    Leaderboard,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unknown command /{0}")]
    UnknownCommand(String),

    #[error("unknown subcommand /{command} {subcommand}")]
    UnknownSubcommand { command: String, subcommand: String },

    #[error("/{command} needs a subcommand")]
    MissingSubcommand { command: String },

    #[error("missing option {option} on /{command}")]
    MissingOption { command: String, option: &'static str },
}

fn integer(options: &[CommandOption], name: &str) -> Option<i64> {
    options.iter().find_map(|o| match &o.value {
        OptionValue::Integer(i) if o.name == name => Some(*i),
        _ => None,
    })
}

fn string(options: &[CommandOption], name: &str) -> Option<String> {
    options.iter().find_map(|o| match &o.value {
        OptionValue::String(s) if o.name == name => Some(s.clone()),
        _ => None,
    })
}

fn user(options: &[CommandOption], name: &str) -> Option<String> {
    options.iter().find_map(|o| match &o.value {
        OptionValue::User(id) if o.name == name => Some(id.to_string()),
        _ => None,
    })
}

fn subcommand<'a>(command: &str, options: &'a [CommandOption]) -> Result<(&'a str, &'a [CommandOption]), CommandParseError> {
    options
        .iter()
        .find_map(|o| match &o.value {
            OptionValue::SubCommand(inner) => Some((o.name.as_str(), inner.as_slice())),
            _ => None,
        })
        .ok_or_else(|| CommandParseError::MissingSubcommand {
            command: command.to_string(),
        })
}

pub fn parse(name: &str, options: &[CommandOption]) -> Result<LeaderboardCommand, CommandParseError> {
    match name {
        CLAIMTAG => {
            let tag = integer(options, "tag").ok_or(CommandParseError::MissingOption {
                command: CLAIMTAG.to_string(),
                option: "tag",
            })?;
            Ok(LeaderboardCommand::ClaimTag { tag })
        }
        HISTORY => match subcommand(HISTORY, options)? {
            ("member", inner) => Ok(LeaderboardCommand::HistoryMember {
                member: user(inner, "user"),
                limit: integer(inner, "limit"),
            }),
            ("chart", inner) => Ok(LeaderboardCommand::HistoryChart {
                member: user(inner, "user"),
            }),
            (other, _) => Err(CommandParseError::UnknownSubcommand {
                command: HISTORY.to_string(),
                subcommand: other.to_string(),
            }),
        },
        SEASON => match subcommand(SEASON, options)? {
            ("start", inner) => {
                let name = string(inner, "name").ok_or(CommandParseError::MissingOption {
                    command: SEASON.to_string(),
                    option: "name",
                })?;
                Ok(LeaderboardCommand::SeasonStart { name })
            }
            ("standings", inner) => Ok(LeaderboardCommand::SeasonStandings {
                season_id: string(inner, "season_id"),
            }),
            ("end", _) => Ok(LeaderboardCommand::SeasonEnd),
            (other, _) => Err(CommandParseError::UnknownSubcommand {
                command: SEASON.to_string(),
                subcommand: other.to_string(),
            }),
        },
        LEADERBOARD => Ok(LeaderboardCommand::Leaderboard),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

/// Options carry no numeric bounds: the managers check ranges so that
/// out-of-range input gets the bot's own message.
pub fn definitions(settings: &LeaderboardSettings) -> Vec<CreateCommand> {
    vec![
        CreateCommand::new(CLAIMTAG)
            .description("Claim a tag number")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "tag",
                    format!("Tag number to claim ({}-{})", settings.tag_min, settings.tag_max),
                )
                .required(true),
            ),
        CreateCommand::new(HISTORY)
            .description("Tag history")
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "member", "Show a member's tag history")
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::User,
                        "user",
                        "Member to look up (defaults to you)",
                    ))
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "limit",
                        format!(
                            "Number of entries (default {}, max {})",
                            settings.history_default_limit, settings.history_max_limit
                        ),
                    )),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "chart", "Chart a member's tag history")
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::User,
                        "user",
                        "Member to chart (defaults to you)",
                    )),
            ),
        CreateCommand::new(SEASON)
            .description("Manage seasons")
            .default_member_permissions(Permissions::ADMINISTRATOR)
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "start", "Start a new season")
                    .add_sub_option(
                        CreateCommandOption::new(CommandOptionType::String, "name", "Season name")
                            .required(true),
                    ),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "standings", "Show season standings")
                    .add_sub_option(CreateCommandOption::new(
                        CommandOptionType::String,
                        "season_id",
                        "Season ID (defaults to the current season)",
                    )),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "end",
                "End the current season",
            )),
        CreateCommand::new(LEADERBOARD)
            .description("Show the leaderboard")
    ]
}
