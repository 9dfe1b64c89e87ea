//! Wire codec for the broadcast channel.
//!
//! Messages are short pipe-delimited ASCII lines. The first field is a
//! one-letter kind tag followed by the protocol version; the oldest clients
//! predate kind tags and send a bare `<version>|<abilityId>|<duration>`
//! ability-used line, which decode still accepts.
//!
//! Decode failures are not errors to surface: a version from the future, a
//! garbled field, or an ability id we do not know all mean "drop the line and
//! move on". Callers log at `trace` and ignore.

use thiserror::Error;

use crate::catalog::AbilityCatalog;

/// Protocol version this build speaks. Lines carrying any other version are
/// dropped rather than misinterpreted.
pub const PROTOCOL_VERSION: u32 = 1;

/// A decoded channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// A peer used a timed ability; `duration_secs` is the cooldown length.
    AbilityUsed { ability_id: u32, duration_secs: u32 },

    /// Full snapshot of the sender's interrupt kit (sorted ascending, may be
    /// empty). Replaces whatever we previously knew about the sender.
    CapabilityList { ability_ids: Vec<u32> },

    /// Ask everyone on the channel to re-broadcast their capability list.
    CapabilityRequest,

    /// "Who is running this addon?" Answered by a whispered ack.
    PresenceQuery { request_id: String },

    /// Direct answer to a presence query.
    PresenceAck { request_id: String },
}

/// Why a line was dropped. Never surfaced to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty message")]
    Empty,
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(String),
    #[error("unknown message kind {0:?}")]
    UnknownKind(String),
    #[error("expected {expected} fields, got {got}")]
    FieldCount { expected: usize, got: usize },
    #[error("malformed numeric field {0:?}")]
    MalformedNumber(String),
    #[error("non-positive duration {0}")]
    NonPositiveDuration(i64),
    #[error("ability id {0} not in catalog")]
    UnknownAbility(u32),
    #[error("empty request token")]
    EmptyToken,
}

/// Encode a message to its wire line.
pub fn encode(msg: &WireMessage) -> String {
    match msg {
        WireMessage::AbilityUsed {
            ability_id,
            duration_secs,
        } => format!("I|{PROTOCOL_VERSION}|{ability_id}|{duration_secs}"),
        WireMessage::CapabilityList { ability_ids } => {
            let ids: Vec<String> = ability_ids.iter().map(u32::to_string).collect();
            format!("L|{PROTOCOL_VERSION}|{}", ids.join(","))
        }
        WireMessage::CapabilityRequest => format!("R|{PROTOCOL_VERSION}"),
        WireMessage::PresenceQuery { request_id } => {
            format!("Q|{PROTOCOL_VERSION}|{request_id}")
        }
        WireMessage::PresenceAck { request_id } => {
            format!("A|{PROTOCOL_VERSION}|{request_id}")
        }
    }
}

/// Decode a wire line, validating ability ids against `catalog`.
pub fn decode(raw: &str, catalog: &AbilityCatalog) -> Result<WireMessage, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }
    let fields: Vec<&str> = raw.split('|').collect();
    let tag = fields[0];

    // Legacy clients send no kind tag: the first field is the version number
    // itself and the shape is always ability-used.
    if tag.chars().all(|c| c.is_ascii_digit()) {
        check_version(tag)?;
        expect_fields(&fields, 3)?;
        return decode_ability_used(fields[1], fields[2], catalog);
    }

    match tag {
        "I" => {
            expect_fields(&fields, 4)?;
            check_version(fields[1])?;
            decode_ability_used(fields[2], fields[3], catalog)
        }
        "L" => {
            expect_fields(&fields, 3)?;
            check_version(fields[1])?;
            decode_capability_list(fields[2], catalog)
        }
        "R" => {
            expect_fields(&fields, 2)?;
            check_version(fields[1])?;
            Ok(WireMessage::CapabilityRequest)
        }
        "Q" => {
            expect_fields(&fields, 3)?;
            check_version(fields[1])?;
            Ok(WireMessage::PresenceQuery {
                request_id: request_token(fields[2])?,
            })
        }
        "A" => {
            expect_fields(&fields, 3)?;
            check_version(fields[1])?;
            Ok(WireMessage::PresenceAck {
                request_id: request_token(fields[2])?,
            })
        }
        other => Err(DecodeError::UnknownKind(other.to_string())),
    }
}

fn expect_fields(fields: &[&str], expected: usize) -> Result<(), DecodeError> {
    if fields.len() != expected {
        return Err(DecodeError::FieldCount {
            expected,
            got: fields.len(),
        });
    }
    Ok(())
}

fn check_version(field: &str) -> Result<(), DecodeError> {
    match field.parse::<u32>() {
        Ok(PROTOCOL_VERSION) => Ok(()),
        _ => Err(DecodeError::UnsupportedVersion(field.to_string())),
    }
}

fn parse_u32(field: &str) -> Result<u32, DecodeError> {
    field
        .parse::<u32>()
        .map_err(|_| DecodeError::MalformedNumber(field.to_string()))
}

fn request_token(field: &str) -> Result<String, DecodeError> {
    if field.is_empty() {
        return Err(DecodeError::EmptyToken);
    }
    Ok(field.to_string())
}

fn decode_ability_used(
    id_field: &str,
    duration_field: &str,
    catalog: &AbilityCatalog,
) -> Result<WireMessage, DecodeError> {
    let ability_id = parse_u32(id_field)?;
    let duration = duration_field
        .parse::<i64>()
        .map_err(|_| DecodeError::MalformedNumber(duration_field.to_string()))?;
    if duration <= 0 {
        return Err(DecodeError::NonPositiveDuration(duration));
    }
    if !catalog.is_valid(ability_id) {
        return Err(DecodeError::UnknownAbility(ability_id));
    }
    Ok(WireMessage::AbilityUsed {
        ability_id,
        duration_secs: duration as u32,
    })
}

/// A capability payload is a full snapshot, so an empty payload is a valid
/// "confirmed empty" kit. Ids outside the catalog are dropped individually;
/// a token that is not a number at all poisons the whole line.
fn decode_capability_list(
    payload: &str,
    catalog: &AbilityCatalog,
) -> Result<WireMessage, DecodeError> {
    let mut ability_ids = Vec::new();
    if !payload.is_empty() {
        for token in payload.split(',') {
            let id = parse_u32(token)?;
            if catalog.is_valid(id) {
                ability_ids.push(id);
            }
        }
    }
    ability_ids.sort_unstable();
    ability_ids.dedup();
    Ok(WireMessage::CapabilityList { ability_ids })
}
