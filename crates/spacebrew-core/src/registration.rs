//! Registration announcement parsing
//!
//! Clients announce themselves on the registration topic with:
//! ```text
//! name, description, pubs(ch1:type1, ch2:type2), subs(ch3:type3)
//! ```
//!
//! Older clients send exactly four plain fields instead:
//! ```text
//! name, description, publisher, subscriber
//! ```
//!
//! The structured grammar is tried first; the legacy split is the fallback.

use crate::{Channel, ClientDescriptor, ParseError, Result};

const PUBS_OPEN: &str = "pubs(";
const SUBS_OPEN: &str = "subs(";
const LEGACY_FIELDS: usize = 4;

/// Which grammar an announcement matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// `name, desc, pubs(...), subs(...)`
    Structured(ClientDescriptor),
    /// `name, desc, pub, sub`
    Legacy(ClientDescriptor),
}

impl Registration {
    pub fn descriptor(&self) -> &ClientDescriptor {
        match self {
            Registration::Structured(d) | Registration::Legacy(d) => d,
        }
    }

    pub fn into_descriptor(self) -> ClientDescriptor {
        match self {
            Registration::Structured(d) | Registration::Legacy(d) => d,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Registration::Legacy(_))
    }
}

/// Parse a registration announcement
pub fn parse_registration(announcement: &str) -> Result<Registration> {
    let announcement = announcement.trim();
    if announcement.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(descriptor) = parse_structured(announcement) {
        return validate(descriptor).map(Registration::Structured);
    }

    parse_legacy(announcement)
        .and_then(validate)
        .map(Registration::Legacy)
}

fn validate(descriptor: ClientDescriptor) -> Result<ClientDescriptor> {
    if descriptor.name.is_empty() {
        return Err(ParseError::EmptyName);
    }
    Ok(descriptor)
}

fn parse_structured(announcement: &str) -> Option<ClientDescriptor> {
    let (name, rest) = announcement.split_once(',')?;
    let (description, rest) = rest.split_once(',')?;

    let groups = rest
        .trim_start()
        .strip_prefix(PUBS_OPEN)?
        .strip_suffix(')')?;
    let (pubs, subs) = split_groups(groups)?;

    Some(ClientDescriptor {
        name: name.trim().to_string(),
        description: description.trim().to_string(),
        publishers: parse_channels(pubs),
        subscribers: parse_channels(subs),
    })
}

/// Split `<pubs>),  subs(<subs>` at the last separator, so a `)` inside
/// the publisher group stays part of it.
fn split_groups(groups: &str) -> Option<(&str, &str)> {
    groups.rmatch_indices(SUBS_OPEN).find_map(|(idx, _)| {
        let pubs = groups[..idx].trim_end().strip_suffix("),")?;
        Some((pubs, &groups[idx + SUBS_OPEN.len()..]))
    })
}

fn parse_channels(group: &str) -> Vec<Channel> {
    group
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(Channel::parse)
        .collect()
}

fn parse_legacy(announcement: &str) -> Result<ClientDescriptor> {
    let fields: Vec<&str> = announcement.split(',').map(str::trim).collect();
    if fields.len() != LEGACY_FIELDS {
        return Err(ParseError::FieldCount(fields.len()));
    }

    Ok(ClientDescriptor {
        name: fields[0].to_string(),
        description: fields[1].to_string(),
        // each legacy field is exactly one channel, even when blank
        publishers: vec![Channel::parse(fields[2])],
        subscribers: vec![Channel::parse(fields[3])],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured() {
        let reg =
            parse_registration("Name, Desc, pubs(a:boolean, b:range), subs(c:string)").unwrap();
        assert!(!reg.is_legacy());

        let d = reg.descriptor();
        assert_eq!(d.name, "Name");
        assert_eq!(d.description, "Desc");
        assert_eq!(
            d.publishers,
            vec![Channel::new("a", "boolean"), Channel::new("b", "range")]
        );
        assert_eq!(d.subscribers, vec![Channel::new("c", "string")]);
    }

    #[test]
    fn test_legacy() {
        let reg = parse_registration("Name, Desc, pub1, sub1").unwrap();
        assert!(reg.is_legacy());

        let d = reg.into_descriptor();
        assert_eq!(d.publishers, vec![Channel::untyped("pub1")]);
        assert_eq!(d.subscribers, vec![Channel::untyped("sub1")]);
    }

    #[test]
    fn test_split_groups_uses_last_separator() {
        let (pubs, subs) = split_groups("a:x), b:y),subs(c").unwrap();
        assert_eq!(pubs, "a:x), b:y");
        assert_eq!(subs, "c");
    }

    #[test]
    fn test_split_groups_requires_comma_after_paren() {
        assert!(split_groups("a) ,subs(c").is_none());
    }
}
