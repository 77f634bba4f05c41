use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Single ASCII byte written to the recorder's serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerCode(u8);

impl TriggerCode {
    /// Marks the start of a task block.
    pub const SESSION_START: TriggerCode = TriggerCode(b'Z');
    pub const RESTING_START: TriggerCode = TriggerCode(b'G');
    pub const RESTING_END: TriggerCode = TriggerCode(b'H');
    pub const ENCODING_BLOCK: TriggerCode = TriggerCode(b'J');
    pub const RECALL_BLOCK: TriggerCode = TriggerCode(b'L');
    /// Rest condition of the motor task.
    pub const REST: TriggerCode = TriggerCode(b'C');

    pub fn new(byte: u8) -> Result<Self> {
        if byte.is_ascii() && !byte.is_ascii_control() {
            Ok(TriggerCode(byte))
        } else {
            Err(Error::InvalidTrigger(format!("{byte:#04x}")))
        }
    }

    pub fn from_char(c: char) -> Result<Self> {
        if c.is_ascii() {
            Self::new(c as u8)
        } else {
            Err(Error::InvalidTrigger(c.to_string()))
        }
    }

    pub fn byte(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }
}

impl fmt::Display for TriggerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for TriggerCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => Err(Error::InvalidTrigger(s.to_string())),
        }
    }
}

impl Serialize for TriggerCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TriggerCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_characters() {
        assert_eq!("C".parse::<TriggerCode>().unwrap().byte(), b'C');
        assert_eq!(" Z ".parse::<TriggerCode>().unwrap(), TriggerCode::SESSION_START);
    }

    #[test]
    fn rejects_multi_character_and_non_ascii_codes() {
        assert!("AB".parse::<TriggerCode>().is_err());
        assert!("".parse::<TriggerCode>().is_err());
        assert!("é".parse::<TriggerCode>().is_err());
        assert!(TriggerCode::new(b'\n').is_err());
    }
}
