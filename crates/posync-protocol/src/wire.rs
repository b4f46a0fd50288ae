//! The text grammar.
//!
//! ```text
//! message   = header *( "|" field )
//! roster    = "ASKNAME" "|" id *( "|" name "%" id )
//! positions = "ASKPOSITION" *( "|" id "%" float "%" float "%" float )
//! ```
//!
//! Tuple lists hold zero or more entries. Empty segments inside a tuple
//! list (`ASKNAME|3|` or `ASKPOSITION||1%0%0%0`) are not entries and are
//! skipped; the encoder never produces them. Fixed-arity messages
//! (`NAMEIS`, `CNN`, `DC`, `MYPOSITION`) must have exactly their field
//! count.
//!
//! Numbers are plain decimal text. Floats use Rust's shortest round-trip
//! formatting, so `1.0` is written as `1` and decodes back bit-for-bit.

use std::str::FromStr;

use posync_transport::ConnectionId;

use crate::{Header, Message, PositionEntry, ProtocolError, RosterEntry, Vec3};

/// Separates top-level fields.
pub const FIELD_SEPARATOR: char = '|';
/// Separates the members of a tuple field.
pub const TUPLE_SEPARATOR: char = '%';

impl Message {
    /// Renders the message as protocol text.
    ///
    /// # Errors
    /// [`ProtocolError::Unencodable`] if a name contains a separator (or a
    /// `NAMEIS` name is empty), or a coordinate is NaN or infinite.
    pub fn to_wire(&self) -> Result<String, ProtocolError> {
        let mut out = String::from(self.header().as_str());

        match self {
            Self::AskName { id, roster } => {
                push_id(&mut out, *id);
                for entry in roster {
                    out.push(FIELD_SEPARATOR);
                    push_name(&mut out, &entry.name)?;
                    out.push(TUPLE_SEPARATOR);
                    out.push_str(&entry.id.into_inner().to_string());
                }
            }
            Self::NameIs { name } => {
                validate_name(name)?;
                out.push(FIELD_SEPARATOR);
                push_name(&mut out, name)?;
            }
            Self::Connected { name, id } => {
                out.push(FIELD_SEPARATOR);
                push_name(&mut out, name)?;
                push_id(&mut out, *id);
            }
            Self::Disconnected { id } => push_id(&mut out, *id),
            Self::AskPosition { positions } => {
                for entry in positions {
                    push_id(&mut out, entry.id);
                    for coord in coords(entry.position) {
                        out.push(TUPLE_SEPARATOR);
                        push_coord(&mut out, coord)?;
                    }
                }
            }
            Self::MyPosition { position } => {
                for coord in coords(*position) {
                    out.push(FIELD_SEPARATOR);
                    push_coord(&mut out, coord)?;
                }
            }
        }

        Ok(out)
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut fields = text.split(FIELD_SEPARATOR);
        // `split` always yields at least one item.
        let header: Header = fields.next().unwrap_or_default().parse()?;
        let rest: Vec<&str> = fields.collect();

        match header {
            Header::AskName => {
                let (id, tuples) = rest.split_first().ok_or_else(|| {
                    ProtocolError::malformed("ASKNAME is missing the id field")
                })?;
                let roster = entries(tuples)
                    .map(parse_roster_entry)
                    .collect::<Result<_, _>>()?;
                Ok(Self::AskName {
                    id: parse_id(id)?,
                    roster,
                })
            }
            Header::NameIs => {
                let [name] = exact(header, &rest)?;
                if name.is_empty() {
                    return Err(ProtocolError::malformed("NAMEIS with empty name"));
                }
                Ok(Self::NameIs {
                    name: parse_name(name)?,
                })
            }
            Header::Cnn => {
                let [name, id] = exact(header, &rest)?;
                Ok(Self::Connected {
                    name: parse_name(name)?,
                    id: parse_id(id)?,
                })
            }
            Header::Dc => {
                let [id] = exact(header, &rest)?;
                Ok(Self::Disconnected { id: parse_id(id)? })
            }
            Header::AskPosition => {
                let positions = entries(&rest)
                    .map(parse_position_entry)
                    .collect::<Result<_, _>>()?;
                Ok(Self::AskPosition { positions })
            }
            Header::MyPosition => {
                let [x, y, z] = exact(header, &rest)?;
                Ok(Self::MyPosition {
                    position: Vec3::new(parse_coord(x)?, parse_coord(y)?, parse_coord(z)?),
                })
            }
        }
    }
}

/// Checks that `name` can be announced as a display name: non-empty and
/// free of both separators.
///
/// # Errors
/// [`ProtocolError::Unencodable`] otherwise.
pub fn validate_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::unencodable("empty name"));
    }
    if name.contains([FIELD_SEPARATOR, TUPLE_SEPARATOR]) {
        return Err(ProtocolError::unencodable(format!(
            "name {name:?} contains a separator"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn coords(v: Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

fn push_id(out: &mut String, id: ConnectionId) {
    out.push(FIELD_SEPARATOR);
    out.push_str(&id.into_inner().to_string());
}

fn push_name(out: &mut String, name: &str) -> Result<(), ProtocolError> {
    if name.contains([FIELD_SEPARATOR, TUPLE_SEPARATOR]) {
        return Err(ProtocolError::unencodable(format!(
            "name {name:?} contains a separator"
        )));
    }
    out.push_str(name);
    Ok(())
}

fn push_coord(out: &mut String, value: f32) -> Result<(), ProtocolError> {
    if !value.is_finite() {
        return Err(ProtocolError::unencodable(format!(
            "non-finite coordinate {value}"
        )));
    }
    out.push_str(&value.to_string());
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

/// Non-empty segments of a tuple list.
fn entries<'a>(segments: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
    segments.iter().copied().filter(|s| !s.is_empty())
}

/// Checks a fixed-arity message has exactly `N` fields after the header.
fn exact<'a, const N: usize>(
    header: Header,
    rest: &[&'a str],
) -> Result<[&'a str; N], ProtocolError> {
    <[&str; N]>::try_from(rest).map_err(|_| {
        ProtocolError::malformed(format!(
            "{header} expects {N} field(s), got {}",
            rest.len()
        ))
    })
}

fn parse_id(field: &str) -> Result<ConnectionId, ProtocolError> {
    field
        .parse::<u64>()
        .map(ConnectionId::new)
        .map_err(|_| ProtocolError::malformed(format!("invalid id {field:?}")))
}

fn parse_coord(field: &str) -> Result<f32, ProtocolError> {
    let value = field
        .parse::<f32>()
        .map_err(|_| ProtocolError::malformed(format!("invalid number {field:?}")))?;
    if !value.is_finite() {
        return Err(ProtocolError::malformed(format!(
            "non-finite number {field:?}"
        )));
    }
    Ok(value)
}

fn parse_name(field: &str) -> Result<String, ProtocolError> {
    if field.contains(TUPLE_SEPARATOR) {
        return Err(ProtocolError::malformed(format!(
            "name {field:?} contains a separator"
        )));
    }
    Ok(field.to_owned())
}

fn parse_roster_entry(segment: &str) -> Result<RosterEntry, ProtocolError> {
    let parts: Vec<&str> = segment.split(TUPLE_SEPARATOR).collect();
    let [name, id] = parts.as_slice() else {
        return Err(ProtocolError::malformed(format!(
            "roster entry {segment:?} needs 2 members, got {}",
            parts.len()
        )));
    };
    Ok(RosterEntry::new(*name, parse_id(id)?))
}

fn parse_position_entry(segment: &str) -> Result<PositionEntry, ProtocolError> {
    let parts: Vec<&str> = segment.split(TUPLE_SEPARATOR).collect();
    let [id, x, y, z] = parts.as_slice() else {
        return Err(ProtocolError::malformed(format!(
            "position entry {segment:?} needs 4 members, got {}",
            parts.len()
        )));
    };
    Ok(PositionEntry::new(
        parse_id(id)?,
        Vec3::new(parse_coord(x)?, parse_coord(y)?, parse_coord(z)?),
    ))
}
