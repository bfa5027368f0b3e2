//! Field validators shared by resource schemas.
//!
//! These run before any API call is issued; a failure here is a
//! precondition error and is never retried.

use std::net::Ipv4Addr;
use thiserror::Error;

/// Maximum span a single port range may cover.
pub const MAX_PORT_RANGE_SPAN: u32 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn fail(msg: impl Into<String>) -> Result<(), ValidationError> {
    Err(ValidationError(msg.into()))
}

/// Parse `a.b.c.d/len` into (address bits, prefix length).
pub fn parse_cidr4(s: &str) -> Result<(u32, u8), ValidationError> {
    let (addr, len) = s
        .split_once('/')
        .ok_or_else(|| ValidationError(format!("{s:?} is not in CIDR notation")))?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|_| ValidationError(format!("{s:?} has an invalid address part")))?;
    let len: u8 = len
        .parse()
        .map_err(|_| ValidationError(format!("{s:?} has an invalid prefix length")))?;
    if len > 32 {
        return Err(ValidationError(format!("{s:?} prefix length exceeds 32")));
    }
    Ok((u32::from(addr), len))
}

fn mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (32 - len)
    }
}

/// The input must parse as a CIDR and equal its own network form (no host
/// bits set).
pub fn validate_cidr_network(s: &str) -> Result<(), ValidationError> {
    let (addr, len) = parse_cidr4(s)?;
    if addr & mask(len) != addr {
        return fail(format!("{s:?} has host bits set; expected the network form"));
    }
    Ok(())
}

const RFC1918_BLOCKS: &[(u32, u8)] = &[
    (0x0A00_0000, 8),  // 10.0.0.0/8
    (0xAC10_0000, 12), // 172.16.0.0/12
    (0xC0A8_0000, 16), // 192.168.0.0/16
];

/// The CIDR must be a subset of one of the RFC-1918 private blocks.
pub fn validate_private_cidr(s: &str) -> Result<(), ValidationError> {
    validate_cidr_network(s)?;
    let (addr, len) = parse_cidr4(s)?;
    let inside = RFC1918_BLOCKS
        .iter()
        .any(|&(block, block_len)| len >= block_len && addr & mask(block_len) == block);
    if !inside {
        return fail(format!("{s:?} is not within the RFC-1918 private ranges"));
    }
    Ok(())
}

/// Dotted-quad IPv4 address.
pub fn validate_ip(s: &str) -> Result<(), ValidationError> {
    s.parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| ValidationError(format!("{s:?} is not a valid IPv4 address")))
}

/// Port in 1..=65535.
pub fn validate_port(port: i64) -> Result<(), ValidationError> {
    if (1..=65535).contains(&port) {
        Ok(())
    } else {
        fail(format!("port {port} out of range 1-65535"))
    }
}

/// A single port (`80`) or a `bport/eport` range with
/// 1 ≤ bport ≤ eport ≤ 65535 and a span of at most
/// [`MAX_PORT_RANGE_SPAN`]. Returns the parsed (bport, eport).
pub fn parse_port_range(s: &str) -> Result<(u16, u16), ValidationError> {
    let (b, e) = match s.split_once('/') {
        Some((b, e)) => (b, e),
        None => (s, s),
    };
    let bport: u16 = b
        .parse()
        .map_err(|_| ValidationError(format!("{s:?} has an invalid start port")))?;
    let eport: u16 = e
        .parse()
        .map_err(|_| ValidationError(format!("{s:?} has an invalid end port")))?;
    if bport == 0 || eport == 0 {
        return Err(ValidationError(format!("{s:?} ports must be at least 1")));
    }
    if bport > eport {
        return Err(ValidationError(format!(
            "{s:?} start port is greater than end port"
        )));
    }
    if u32::from(eport) - u32::from(bport) > MAX_PORT_RANGE_SPAN {
        return Err(ValidationError(format!(
            "{s:?} spans more than {MAX_PORT_RANGE_SPAN} ports"
        )));
    }
    Ok((bport, eport))
}

/// Validate a `bport/eport` range string.
pub fn validate_port_range(s: &str) -> Result<(), ValidationError> {
    parse_port_range(s).map(|_| ())
}

/// String length in `min..=max` characters.
pub fn validate_string_len(s: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let n = s.chars().count();
    if n < min || n > max {
        return fail(format!(
            "length of {s:?} is {n}, expected between {min} and {max}"
        ));
    }
    Ok(())
}

/// Membership in a closed enum of literal strings (case-sensitive).
pub fn validate_in(s: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    if allowed.contains(&s) {
        Ok(())
    } else {
        fail(format!("{s:?} is not one of {allowed:?}"))
    }
}

/// Strictly positive integer.
pub fn validate_positive(v: i64) -> Result<(), ValidationError> {
    if v > 0 {
        Ok(())
    } else {
        fail(format!("{v} is not a positive integer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_must_equal_network_form() {
        assert!(validate_cidr_network("10.0.0.0/8").is_ok());
        assert!(validate_cidr_network("10.1.2.0/24").is_ok());
        assert!(validate_cidr_network("10.1.2.1/24").is_err());
        assert!(validate_cidr_network("10.1.2.0").is_err());
        assert!(validate_cidr_network("10.1.2.0/33").is_err());
    }

    #[test]
    fn private_cidr_subsets() {
        assert!(validate_private_cidr("10.5.0.0/16").is_ok());
        assert!(validate_private_cidr("172.16.8.0/24").is_ok());
        assert!(validate_private_cidr("192.168.1.0/24").is_ok());
        assert!(validate_private_cidr("8.8.8.0/24").is_err());
        // wider than the private block it intersects
        assert!(validate_private_cidr("172.0.0.0/8").is_err());
    }

    #[test]
    fn port_ranges() {
        assert_eq!(parse_port_range("80").unwrap(), (80, 80));
        assert_eq!(parse_port_range("80/90").unwrap(), (80, 90));
        assert!(parse_port_range("90/80").is_err());
        assert!(parse_port_range("0/10").is_err());
        assert!(parse_port_range("1/400").is_err());
        assert!(parse_port_range("1/301").is_ok());
        assert!(parse_port_range("1/302").is_err());
        assert!(parse_port_range("a/b").is_err());
    }

    #[test]
    fn misc_validators() {
        assert!(validate_ip("1.2.3.4").is_ok());
        assert!(validate_ip("1.2.3").is_err());
        assert!(validate_port(65535).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_string_len("abc", 1, 3).is_ok());
        assert!(validate_string_len("abcd", 1, 3).is_err());
        assert!(validate_in("PREPAID", &["PREPAID", "POSTPAID"]).is_ok());
        assert!(validate_in("prepaid", &["PREPAID", "POSTPAID"]).is_err());
        assert!(validate_positive(1).is_ok());
        assert!(validate_positive(0).is_err());
    }
}
