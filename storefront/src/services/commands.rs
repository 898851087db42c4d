// storefront/src/services/commands.rs

//! Turns a purchased product into one console command.
//!
//! Every string that reaches a command goes through [`sanitize`] or
//! [`is_valid_player_name`] first; nothing is escaped, disallowed characters
//! are dropped.

use std::fmt;

use thiserror::Error;

use crate::models::ProductType;

/// Duration argument passed to the permissions plugin for rank grants.
pub const RANK_GRANT_DURATION: &str = "30d";

/// Largest currency grant a single product may carry.
pub const MAX_CURRENCY_AMOUNT: f64 = 1e12;

/// Known crate products, keyed by lowercase, single-spaced display name.
const CRATE_IDS: &[(&str, &str)] = &[
  ("astix crate", "astix"),
  ("vote crate", "vote"),
  ("common crate", "common"),
  ("rare crate", "rare"),
  ("epic crate", "epic"),
  ("legendary crate", "legendary"),
  ("mythic crate", "mythic"),
  ("spawner crate", "spawner"),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
  #[error("Invalid Minecraft username: {0:?}")]
  InvalidPlayerName(String),

  #[error("Could not derive a rank from product {0:?}")]
  EmptyRankToken(String),

  #[error("Invalid currency amount in product {0:?}")]
  InvalidAmount(String),

  #[error("Could not derive a crate from product {0:?}")]
  EmptyCrateId(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommand {
  GrantRank { player: String, rank: String },
  RevokeRank { player: String, rank: String },
  GiveCurrency { player: String, amount: u64 },
  GiveCrateKey { player: String, crate_id: String },
}

impl GameCommand {
  /// Rank granted by this command, if it grants one.
  pub fn granted_rank(&self) -> Option<&str> {
    match self {
      GameCommand::GrantRank { rank, .. } => Some(rank),
      _ => None,
    }
  }
}

impl fmt::Display for GameCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GameCommand::GrantRank { player, rank } => {
        write!(f, "lp user {} parent addtemp {} {}", player, rank, RANK_GRANT_DURATION)
      }
      GameCommand::RevokeRank { player, rank } => write!(f, "lp user {} parent removetemp {}", player, rank),
      GameCommand::GiveCurrency { player, amount } => write!(f, "eco give {} {}", player, amount),
      GameCommand::GiveCrateKey { player, crate_id } => write!(f, "crate key give {} {} 1", player, crate_id),
    }
  }
}

/// 3 to 16 ASCII letters, digits or underscores.
pub fn is_valid_player_name(name: &str) -> bool {
  (3..=16).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Keeps `[A-Za-z0-9_-]`, drops everything else.
pub fn sanitize(input: &str) -> String {
  input
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
    .collect()
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> &'a str {
  let Some(split) = value.len().checked_sub(suffix.len()) else {
    return value;
  };
  if value.is_char_boundary(split) && value[split..].eq_ignore_ascii_case(suffix) {
    &value[..split]
  } else {
    value
  }
}

/// `"Mythic Rank"` becomes `"mythic"`.
/// A name that is only `"Rank"` has no token.
pub fn rank_token(product_name: &str) -> String {
  let name = product_name.trim();
  let base = if name.eq_ignore_ascii_case("rank") {
    ""
  } else {
    strip_suffix_ignore_case(name, " rank")
  };
  sanitize(&base.to_lowercase())
}

/// Parses `"<number><M|B> In-Game Money"` into a whole amount of currency.
/// A bare number is taken as-is.
pub fn currency_amount(product_name: &str) -> Result<u64, CommandError> {
  let invalid = || CommandError::InvalidAmount(product_name.to_string());

  let magnitude = strip_suffix_ignore_case(product_name.trim(), "in-game money").trim();
  let (number, multiplier) = match magnitude.chars().last() {
    Some('M') | Some('m') => (&magnitude[..magnitude.len() - 1], 1e6),
    Some('B') | Some('b') => (&magnitude[..magnitude.len() - 1], 1e9),
    Some(_) => (magnitude, 1.0),
    None => return Err(invalid()),
  };
  let value: f64 = number.trim().parse().map_err(|_| invalid())?;
  let amount = (value * multiplier).round();
  if !amount.is_finite() || amount <= 0.0 || amount > MAX_CURRENCY_AMOUNT {
    return Err(invalid());
  }
  Ok(amount as u64)
}

/// Maps a crate product to the crate plugin's identifier.
pub fn crate_id(product_name: &str) -> String {
  let normalized = product_name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
  if let Some((_, id)) = CRATE_IDS.iter().find(|(name, _)| *name == normalized) {
    return (*id).to_string();
  }
  sanitize(strip_suffix_ignore_case(&normalized, " crate"))
}

/// Validated as stored; surrounding whitespace is not forgiven.
fn checked_player(player: &str) -> Result<String, CommandError> {
  if !is_valid_player_name(player) {
    return Err(CommandError::InvalidPlayerName(player.to_string()));
  }
  Ok(sanitize(player))
}

/// Builds the delivery command for a product.
///
/// `Ok(None)` means the product type has no in-game action.
pub fn synthesize(
  product: Option<ProductType>,
  product_name: &str,
  player: &str,
) -> Result<Option<GameCommand>, CommandError> {
  let player = checked_player(player)?;
  let command = match product {
    Some(ProductType::Rank) => {
      let rank = rank_token(product_name);
      if rank.is_empty() {
        return Err(CommandError::EmptyRankToken(product_name.to_string()));
      }
      GameCommand::GrantRank { player, rank }
    }
    Some(ProductType::Currency) => GameCommand::GiveCurrency {
      player,
      amount: currency_amount(product_name)?,
    },
    Some(ProductType::Crate) => {
      let crate_id = crate_id(product_name);
      if crate_id.is_empty() {
        return Err(CommandError::EmptyCrateId(product_name.to_string()));
      }
      GameCommand::GiveCrateKey { player, crate_id }
    }
    None => return Ok(None),
  };
  Ok(Some(command))
}

/// Removes a temporary rank; both values usually come from the database.
pub fn revoke_rank(player: &str, rank_name: &str) -> Result<GameCommand, CommandError> {
  let player = checked_player(player)?;
  let rank = sanitize(rank_name);
  if rank.is_empty() {
    return Err(CommandError::EmptyRankToken(rank_name.to_string()));
  }
  Ok(GameCommand::RevokeRank { player, rank })
}
