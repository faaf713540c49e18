//! Parser for the backend's machine-readable secret key listing.
//!
//! The listing is a sequence of colon-delimited records. Only four record
//! types matter here:
//!
//! - `sec` opens a key block
//! - the first `fpr` inside a block supplies the fingerprint
//! - the first `uid` inside a block supplies the identity
//! - `ssb` (a subkey) closes the block
//!
//! Everything else is ignored. Malformed or out-of-order records never fail
//! the parse; they simply leave the block incomplete so no record is emitted.

use crate::constants::LISTING_VALUE_FIELD;
use crate::keys::KeyRecord;
use std::collections::HashSet;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Outside,
    InKeyBlock {
        fingerprint: Option<String>,
        identity: Option<String>,
        emitted: bool,
    },
}

/// Incremental parser over listing lines.
///
/// # Example
///
/// ```
/// use gpgpad::keys::listing::ListingParser;
///
/// let mut parser = ListingParser::new();
/// assert!(parser.feed_line("sec:u:2048:1:AAAA:1700000000:::u:::scESC:").is_none());
/// assert!(parser.feed_line("fpr:::::::::ABCDEF0123456789:").is_none());
/// let record = parser.feed_line("uid:u::::1700000000::HASH::Alice <a@example.com>:").unwrap();
/// assert_eq!(record.fingerprint, "ABCDEF0123456789");
/// assert_eq!(record.identity, "Alice <a@example.com>");
/// ```
#[derive(Debug)]
pub struct ListingParser {
    state: State,
    seen: HashSet<String>,
}

impl Default for ListingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingParser {
    pub fn new() -> Self {
        Self {
            state: State::Outside,
            seen: HashSet::new(),
        }
    }

    /// Consumes one listing line, returning a record once its block is complete.
    pub fn feed_line(&mut self, line: &str) -> Option<KeyRecord> {
        let fields: Vec<&str> = line.split(':').collect();
        let record_type = fields.first()?.trim();
        let value = fields
            .get(LISTING_VALUE_FIELD)
            .copied()
            .filter(|v| !v.is_empty());

        match record_type {
            "sec" => {
                self.state = State::InKeyBlock {
                    fingerprint: None,
                    identity: None,
                    emitted: false,
                };
                None
            }
            "ssb" => {
                self.state = State::Outside;
                None
            }
            "fpr" => {
                if let State::InKeyBlock { fingerprint, .. } = &mut self.state {
                    if fingerprint.is_none() {
                        *fingerprint = value.map(str::to_string);
                    }
                }
                self.try_emit()
            }
            "uid" => {
                if let State::InKeyBlock { identity, .. } = &mut self.state {
                    if identity.is_none() {
                        *identity = value.map(unescape_field);
                    }
                }
                self.try_emit()
            }
            other => {
                trace!(record_type = other, "Ignoring listing record");
                None
            }
        }
    }

    fn try_emit(&mut self) -> Option<KeyRecord> {
        let State::InKeyBlock {
            fingerprint: Some(fingerprint),
            identity: Some(identity),
            emitted,
        } = &mut self.state
        else {
            return None;
        };

        if *emitted {
            return None;
        }
        *emitted = true;

        if !self.seen.insert(fingerprint.clone()) {
            debug!("Skipping duplicate key {} in listing", fingerprint);
            return None;
        }

        Some(KeyRecord::new(fingerprint.clone(), identity.clone()))
    }
}

/// Parses a complete secret key listing.
///
/// Fingerprints are unique in the result; the first block for a fingerprint
/// wins.
///
/// # Example
///
/// ```
/// use gpgpad::keys::parse_secret_key_listing;
///
/// let listing = "\
/// sec:u:2048:1:AAAA:1700000000:::u:::scESC:
/// fpr:::::::::FPR1:
/// uid:u::::1700000000::HASH::Test User <test@example.com>:
/// ssb:u:2048:1:BBBB:1700000000::::::e:
/// fpr:::::::::SUBKEYFPR:
/// ";
/// let keys = parse_secret_key_listing(listing);
/// assert_eq!(keys.len(), 1);
/// assert_eq!(keys[0].identity, "Test User <test@example.com>");
/// ```
pub fn parse_secret_key_listing(listing: &str) -> Vec<KeyRecord> {
    let mut parser = ListingParser::new();
    listing
        .lines()
        .filter_map(|line| parser.feed_line(line))
        .collect()
}

/// Decodes the `\xHH` escapes the backend uses inside colon fields.
fn unescape_field(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1] == b'x'
            && bytes[i + 2].is_ascii_hexdigit()
            && bytes[i + 3].is_ascii_hexdigit()
        {
            decoded.push((hex_value(bytes[i + 2]) << 4) | hex_value(bytes[i + 3]));
            i += 4;
            continue;
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_KEY: &str = "\
sec:u:2048:1:1234567890ABCDEF:1700000000:::u:::scESC:::+:::23::0:
fpr:::::::::0123456789ABCDEF0123456789ABCDEF01234567:
grp:::::::::AAAABBBBCCCCDDDDEEEEFFFF0000111122223333:
uid:u::::1700000000::HASHHASHHASH::Test User <test@example.com>::::::::::0:
ssb:u:2048:1:FEDCBA0987654321:1700000000::::::ea:::+:::23:
fpr:::::::::FFFFEEEEDDDDCCCCBBBBAAAA9999888877776666:
grp:::::::::1111222233334444555566667777888899990000:
";

    #[test]
    fn test_single_block_emits_one_record() {
        let keys = parse_secret_key_listing(SINGLE_KEY);
        assert_eq!(
            keys,
            vec![KeyRecord::new(
                "0123456789ABCDEF0123456789ABCDEF01234567",
                "Test User <test@example.com>"
            )]
        );
    }

    #[test]
    fn test_sec_without_fpr_emits_nothing() {
        let listing = "\
sec:u:2048:1:AAAA:1700000000:::u:::scESC:
uid:u::::1700000000::HASH::Missing Fingerprint <m@example.com>:
sec:u:2048:1:BBBB:1700000000:::u:::scESC:
fpr:::::::::FPR2:
uid:u::::1700000000::HASH::Second <s@example.com>:
";
        let keys = parse_secret_key_listing(listing);
        assert_eq!(keys, vec![KeyRecord::new("FPR2", "Second <s@example.com>")]);
    }

    #[test]
    fn test_subkey_fingerprint_does_not_leak() {
        // ssb closes the block, so the subkey's fpr must not start a record
        let listing = "\
sec:u:2048:1:AAAA:1700000000:::u:::scESC:
ssb:u:2048:1:BBBB:1700000000::::::e:
fpr:::::::::SUBKEY:
uid:u::::1700000000::HASH::Orphan <o@example.com>:
";
        assert!(parse_secret_key_listing(listing).is_empty());
    }

    #[test]
    fn test_first_uid_wins() {
        let listing = "\
sec:u:2048:1:AAAA:1700000000:::u:::scESC:
fpr:::::::::FPR1:
uid:u::::1700000000::HASH::Primary <p@example.com>:
uid:u::::1700000000::HASH::Secondary <s@example.com>:
";
        let keys = parse_secret_key_listing(listing);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].identity, "Primary <p@example.com>");
    }

    #[test]
    fn test_uid_before_fpr_still_emits() {
        let listing = "\
sec:u:2048:1:AAAA:1700000000:::u:::scESC:
uid:u::::1700000000::HASH::Early <e@example.com>:
fpr:::::::::FPR1:
";
        let keys = parse_secret_key_listing(listing);
        assert_eq!(keys, vec![KeyRecord::new("FPR1", "Early <e@example.com>")]);
    }

    #[test]
    fn test_multiple_keys_and_duplicates() {
        let listing = "\
sec:u:2048:1:AAAA:1700000000:::u:::scESC:
fpr:::::::::FPR1:
uid:u::::1700000000::HASH::One <1@example.com>:
ssb:u:2048:1:BBBB:1700000000::::::e:
sec:u:2048:1:CCCC:1700000000:::u:::scESC:
fpr:::::::::FPR2:
uid:u::::1700000000::HASH::Two <2@example.com>:
sec:u:2048:1:AAAA:1700000000:::u:::scESC:
fpr:::::::::FPR1:
uid:u::::1700000000::HASH::One again <1@example.com>:
";
        let keys = parse_secret_key_listing(listing);
        let fingerprints: Vec<&str> = keys.iter().map(|k| k.fingerprint.as_str()).collect();
        assert_eq!(fingerprints, vec!["FPR1", "FPR2"]);
        assert_eq!(keys[0].identity, "One <1@example.com>");
    }

    #[test]
    fn test_malformed_lines_are_tolerated() {
        let listing = "\
garbage
fpr
uid:::
sec
fpr:::::::::
uid:u::::1700000000::HASH::No Fingerprint <n@example.com>:

tru::1:1700000000:0:3:1:5
";
        assert!(parse_secret_key_listing(listing).is_empty());
    }

    #[test]
    fn test_identity_escapes_are_decoded() {
        let listing = "\
sec:u:2048:1:AAAA:1700000000:::u:::scESC:
fpr:::::::::FPR1:
uid:u::::1700000000::HASH::Ops\\x3a Team <ops@example.com>:
";
        let keys = parse_secret_key_listing(listing);
        assert_eq!(keys[0].identity, "Ops: Team <ops@example.com>");
    }

    #[test]
    fn test_unescape_field() {
        assert_eq!(unescape_field("plain"), "plain");
        assert_eq!(unescape_field("a\\x3ab"), "a:b");
        assert_eq!(unescape_field("J\\xc3\\xbcrgen"), "Jürgen");
        assert_eq!(unescape_field("bad\\xZZ"), "bad\\xZZ");
        assert_eq!(unescape_field("trailing\\x4"), "trailing\\x4");
    }

    #[test]
    fn test_crlf_line_endings() {
        let listing = "sec:u:2048:1:AAAA:1700000000:::u:::scESC:\r\nfpr:::::::::FPR1:\r\nuid:u::::1700000000::HASH::Win <w@example.com>:\r\n";
        let keys = parse_secret_key_listing(listing);
        assert_eq!(keys, vec![KeyRecord::new("FPR1", "Win <w@example.com>")]);
    }
}
