//! Friendly sortable identifiers.
//!
//! A fulid is a ULID cut down to its 10 character timestamp and 9 characters
//! of randomness, followed by a 7 character counter written with a small
//! user-chosen alphabet. The counter keeps ids easy to type; the sulid (short
//! ulid) is the shortest suffix of the counter that is unique among a set of
//! ids.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::config::FulidConfig;
use crate::error::{TaskError, TaskResult};

const TIMESTAMP_LEN: usize = 10;
const RANDOMNESS_LEN: usize = 9;
const ID_LEN: usize = 7;
pub const FULID_LEN: usize = TIMESTAMP_LEN + RANDOMNESS_LEN + ID_LEN;

/// Generator of fulids over a configured alphabet.
#[derive(Debug, Clone)]
pub struct Fulid {
    charset: Vec<char>,
}

impl Fulid {
    pub fn new(characters: &str, forbidden_characters: &str) -> TaskResult<Self> {
        let charset: Vec<char> = characters.chars().map(|c| c.to_ascii_lowercase()).collect();
        if charset.len() < 2 {
            return Err(TaskError::invalid_value(
                "fulid.characters",
                "The fulid charset needs at least two characters",
            ));
        }

        let forbidden: BTreeSet<char> = charset
            .iter()
            .copied()
            .filter(|c| forbidden_characters.contains(*c))
            .collect();
        if !forbidden.is_empty() {
            let listed: Vec<String> = forbidden.iter().map(char::to_string).collect();
            return Err(TaskError::invalid_value(
                "fulid.characters",
                format!(
                    "The characters {} were found in the fulid charset, but they are forbidden",
                    listed.join(", ")
                ),
            ));
        }

        let unique: BTreeSet<char> = charset.iter().copied().collect();
        if unique.len() != charset.len() {
            return Err(TaskError::invalid_value(
                "fulid.characters",
                "The fulid charset can't repeat characters",
            ));
        }

        Ok(Self { charset })
    }

    pub fn from_config(config: &FulidConfig) -> TaskResult<Self> {
        Self::new(&config.characters, &config.forbidden_characters)
    }

    /// Next fulid after `last`, stamped with the current time.
    pub fn next(&self, last: Option<&str>) -> TaskResult<String> {
        self.next_at(last, Utc::now().timestamp_millis().max(0) as u64)
    }

    /// Next fulid after `last`, stamped with `now_ms`.
    ///
    /// The timestamp never goes backwards from the one in `last`, so the
    /// result always sorts after it.
    pub fn next_at(&self, last: Option<&str>, now_ms: u64) -> TaskResult<String> {
        let (timestamp_ms, counter) = match last {
            None => (now_ms, 0),
            Some(last) => {
                let last_ms = timestamp_ms(last)?;
                (now_ms.max(last_ms + 1), self.decode_id(id_part(last)?)? + 1)
            }
        };

        let ulid = Ulid::from_parts(timestamp_ms, rand::random::<u128>()).to_string();
        Ok(format!(
            "{}{}",
            &ulid[..TIMESTAMP_LEN + RANDOMNESS_LEN],
            self.encode_id(counter, ID_LEN)
        ))
    }

    /// Read a counter string written with the charset.
    pub fn decode_id(&self, id: &str) -> TaskResult<u64> {
        let id = if id.len() > ID_LEN {
            &id[id.len() - ID_LEN..]
        } else {
            id
        };
        let base = self.charset.len() as u64;

        id.chars().try_fold(0u64, |number, character| {
            let digit = self
                .charset
                .iter()
                .position(|c| *c == character.to_ascii_lowercase())
                .ok_or_else(|| {
                    TaskError::invalid_value(
                        "fulid.characters",
                        format!(
                            "Error decoding {} into a number as character {} is not in the \
                             configuration fulid.characters",
                            id, character
                        ),
                    )
                })?;
            Ok(number * base + digit as u64)
        })
    }

    /// Write `number` with the charset, upper case, left padded to `pad`.
    pub fn encode_id(&self, mut number: u64, pad: usize) -> String {
        let base = self.charset.len() as u64;
        let mut digits = Vec::new();
        while number > 0 {
            digits.push(self.charset[(number % base) as usize]);
            number /= base;
        }
        while digits.len() < pad {
            digits.push(self.charset[0]);
        }
        digits.iter().rev().map(|c| c.to_ascii_uppercase()).collect()
    }
}

fn id_part(fulid: &str) -> TaskResult<&str> {
    fulid
        .get(TIMESTAMP_LEN + RANDOMNESS_LEN..)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TaskError::invalid_value("id", format!("{} is not a fulid", fulid)))
}

fn timestamp_ms(fulid: &str) -> TaskResult<u64> {
    let prefix = fulid
        .get(..TIMESTAMP_LEN)
        .ok_or_else(|| TaskError::invalid_value("id", format!("{} is not a fulid", fulid)))?;
    let ulid = Ulid::from_string(&format!("{}{}", prefix, "0".repeat(16)))
        .map_err(|e| TaskError::invalid_value("id", format!("{} is not a fulid: {}", fulid, e)))?;
    Ok(ulid.timestamp_ms())
}

/// Creation time encoded in a fulid.
pub fn timestamp(fulid: &str) -> TaskResult<DateTime<Utc>> {
    let ms = timestamp_ms(fulid)?;
    DateTime::from_timestamp_millis(ms as i64)
        .ok_or_else(|| TaskError::invalid_value("id", format!("{} is out of range", fulid)))
}

/// Shortest lower case suffix of each id that is unique within `fulids`.
pub fn sulids<S: AsRef<str>>(fulids: &[S]) -> HashMap<String, String> {
    let unique: BTreeSet<&str> = fulids.iter().map(|f| f.as_ref()).collect();
    let reversed: Vec<(&str, Vec<char>)> = unique
        .iter()
        .map(|f| (*f, f.to_lowercase().chars().rev().collect()))
        .collect();

    let mut len = 1;
    loop {
        let prefixes: BTreeSet<&[char]> = reversed
            .iter()
            .map(|(_, chars)| &chars[..len.min(chars.len())])
            .collect();
        let longest = reversed.iter().map(|(_, chars)| chars.len()).max().unwrap_or(0);
        if prefixes.len() == reversed.len() || len >= longest {
            return reversed
                .iter()
                .map(|(fulid, chars)| {
                    let sulid: String = chars[..len.min(chars.len())].iter().rev().collect();
                    (fulid.to_string(), sulid)
                })
                .collect();
        }
        len += 1;
    }
}

/// Expand `sulid` to the id of `fulids` it identifies.
pub fn sulid_to_fulid<S: AsRef<str>>(sulid: &str, fulids: &[S]) -> Option<String> {
    let wanted = sulid.to_lowercase();
    sulids(fulids)
        .into_iter()
        .find(|(_, short)| *short == wanted)
        .map(|(fulid, _)| fulid)
}

/// Short form of `fulid` among `fulids`.
pub fn fulid_to_sulid<S: AsRef<str>>(fulid: &str, fulids: &[S]) -> Option<String> {
    sulids(fulids).remove(fulid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> Fulid {
        let config = FulidConfig::default();
        Fulid::from_config(&config).unwrap()
    }

    #[test]
    fn first_id_starts_the_counter() {
        let id = generator().next(None).unwrap();
        assert_eq!(id.len(), FULID_LEN);
        assert!(id.ends_with("AAAAAAA"));
    }

    #[test]
    fn counter_increments_from_last() {
        let fulid = generator();
        let first = fulid.next(None).unwrap();
        let second = fulid.next(Some(&first)).unwrap();
        assert!(second.ends_with("AAAAAAS"));
        assert!(second > first);
    }

    #[test]
    fn ids_increase_even_when_the_clock_stalls() {
        let fulid = generator();
        let mut last = fulid.next_at(None, 1_000).unwrap();
        for _ in 0..20 {
            let next = fulid.next_at(Some(&last), 1_000).unwrap();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn timestamp_is_recoverable() {
        let fulid = generator();
        let id = fulid.next_at(None, 1_590_000_000_123).unwrap();
        assert_eq!(timestamp(&id).unwrap().timestamp_millis(), 1_590_000_000_123);
    }

    #[test]
    fn encode_decode_counter() {
        let fulid = generator();
        assert_eq!(fulid.encode_id(0, 7), "AAAAAAA");
        assert_eq!(fulid.encode_id(10, 7), "AAAAASA");
        assert_eq!(fulid.encode_id(123, 0), "SDF");
        assert_eq!(fulid.decode_id("AAAAASA").unwrap(), 10);
        assert_eq!(fulid.decode_id("sdf").unwrap(), 123);
        assert!(fulid.decode_id("AAAZ").is_err());
    }

    #[test]
    fn forbidden_characters_are_rejected() {
        let err = Fulid::new("asdfi", "ilou").unwrap_err();
        assert!(err.message.contains('i'));
        assert!(Fulid::new("a", "").is_err());
        assert!(Fulid::new("aab", "").is_err());
    }

    #[test]
    fn sulids_are_shortest_unique_suffixes() {
        let ids = [
            "01E7ZGKDNN0ABCDEFGAAAAAAA",
            "01E7ZGKDNN0ABCDEFGAAAAAAS",
            "01E7ZGKDNN0ABCDEFGAAAAASA",
        ];
        let short = sulids(&ids);
        assert_eq!(short[ids[0]], "aa");
        assert_eq!(short[ids[1]], "as");
        assert_eq!(short[ids[2]], "sa");
    }

    #[test]
    fn single_id_has_one_char_sulid() {
        let ids = ["01E7ZGKDNN0ABCDEFGAAAAAAD"];
        assert_eq!(sulids(&ids)[ids[0]], "d");
    }

    #[test]
    fn sulid_expansion_and_contraction() {
        let ids = ["01E7ZGKDNN0ABCDEFGAAAAAAA", "01E7ZGKDNN0ABCDEFGAAAAAAS"];
        assert_eq!(sulid_to_fulid("S", &ids).as_deref(), Some(ids[1]));
        assert_eq!(sulid_to_fulid("zz", &ids), None);
        assert_eq!(fulid_to_sulid(ids[0], &ids).as_deref(), Some("a"));
        assert_eq!(fulid_to_sulid("missing", &ids), None);
    }

    #[test]
    fn sulids_grow_until_every_suffix_is_unique() {
        let ids = [
            "01E7ZGKDNN0ABCDEFGAAAAAAA",
            "01E7ZGKDNN0ABCDEFGAAAAAAS",
            "01E7ZGKDNN0ABCDEFGAAAAABS",
        ];
        let short = sulids(&ids);
        assert_eq!(short[ids[0]], "aa");
        assert_eq!(short[ids[1]], "as");
        assert_eq!(short[ids[2]], "bs");
        assert_eq!(sulid_to_fulid("BS", &ids).as_deref(), Some(ids[2]));
    }

    #[test]
    fn duplicate_ids_do_not_hang() {
        let ids = ["01E7ZGKDNN0ABCDEFGAAAAAAA", "01E7ZGKDNN0ABCDEFGAAAAAAA"];
        assert_eq!(sulids(&ids).len(), 1);
    }
}
