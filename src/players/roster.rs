//! Parsing of the console's `list` and `op list` replies.
//!
//! Each reply kind goes through one entry point backed by an ordered table of
//! known shapes. A reply that matches no shape yields zero names.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::Result;
use crate::rcon::Console;

pub const PLAYERS_QUERY: &str = "list";
pub const OPERATORS_QUERY: &str = "op list";
pub const OPERATORS_PREAMBLE: &str = "The following players are operators:";

const AVATAR_BASE: &str = "https://cravatar.eu/helmavatar";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub name: String,
    pub avatar: String,
    #[serde(rename = "isOp")]
    pub is_op: bool,
}

impl PlayerRecord {
    pub fn new(name: &str, is_op: bool) -> Self {
        Self {
            name: name.to_string(),
            avatar: avatar_url(name),
            is_op,
        }
    }
}

pub fn avatar_url(name: &str) -> String {
    format!("{}/{}/80.png", AVATAR_BASE, name)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    pub players: Vec<PlayerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

/// Names plus whatever counts the reply shape carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub names: Vec<String>,
    pub online: Option<u32>,
    pub max: Option<u32>,
}

static ONLINE_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // 1.13+: "There are 2 of a max of 20 players online: a, b"
        r"(?s)^There are (?P<online>\d+) of a max of (?P<max>\d+) players online:(?P<names>.*)$",
        // older servers: "There are 2/20 players online: a, b"
        r"(?s)^There are (?P<online>\d+)/(?P<max>\d+) players online:(?P<names>.*)$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Split on `", "`, trim, drop empties.
pub fn split_names(segment: &str) -> Vec<String> {
    segment
        .split(", ")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the `list` reply. No colon at all means nobody is online.
pub fn parse_online(reply: &str) -> Listing {
    let reply = reply.trim();

    for shape in ONLINE_SHAPES.iter() {
        if let Some(caps) = shape.captures(reply) {
            return Listing {
                names: caps.name("names").map(|m| split_names(m.as_str())).unwrap_or_default(),
                online: caps.name("online").and_then(|m| m.as_str().parse().ok()),
                max: caps.name("max").and_then(|m| m.as_str().parse().ok()),
            };
        }
    }

    match reply.split_once(':') {
        Some((_, names)) => Listing {
            names: split_names(names),
            ..Default::default()
        },
        None => Listing::default(),
    }
}

/// Parse the `op list` reply. Without the preamble there are no operators.
pub fn parse_operators(reply: &str) -> Vec<String> {
    match reply.trim().strip_prefix(OPERATORS_PREAMBLE) {
        Some(names) => split_names(names),
        None => Vec::new(),
    }
}

/// Online players in reply order, flagged when also an operator.
pub fn merge(online: &[String], operators: &[String]) -> Vec<PlayerRecord> {
    let ops: HashSet<&str> = operators.iter().map(String::as_str).collect();
    online
        .iter()
        .map(|name| PlayerRecord::new(name, ops.contains(name.as_str())))
        .collect()
}

/// Query both lists over two console sessions. Any console failure fails the
/// whole roster.
pub async fn fetch_roster(console: &dyn Console) -> Result<Roster> {
    let operators = parse_operators(&console.execute(OPERATORS_QUERY).await?);
    let listing = parse_online(&console.execute(PLAYERS_QUERY).await?);

    Ok(Roster {
        players: merge(&listing.names, &operators),
        online: listing.online,
        max: listing.max,
    })
}
