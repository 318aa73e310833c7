//! SEARCH criteria.

use chrono::NaiveDate;

use super::{Wire, write_astring};
use crate::types::UidSet;

/// A search key. Sequences of keys are ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// `ALL`
    All,
    /// `YOUNGER <seconds>` (requires `WITHIN`)
    Younger(u64),
    /// `SINCE <date>`
    Since(NaiveDate),
    /// `TEXT <string>`
    Text(String),
    /// `HEADER <field> <value>`
    Header(String, String),
    /// `UID <set>`
    Uid(UidSet),
    /// `DELETED`
    Deleted,
    /// `NOT <key>`
    Not(Box<Self>),
    /// All of the keys.
    And(Vec<Self>),
}

impl SearchCriteria {
    /// Combines keys into an AND, flattening singletons.
    #[must_use]
    pub fn all_of(mut keys: Vec<Self>) -> Self {
        match keys.len() {
            0 => Self::All,
            1 => keys.remove(0),
            _ => Self::And(keys),
        }
    }

    pub(crate) fn write(&self, buf: &mut Wire, top_level: bool) {
        match self {
            Self::All => buf.extend_from_slice(b"ALL"),
            Self::Younger(secs) => buf.extend_from_slice(format!("YOUNGER {secs}").as_bytes()),
            Self::Since(date) => {
                buf.extend_from_slice(format!("SINCE {}", date.format("%-d-%b-%Y")).as_bytes());
            }
            Self::Text(text) => {
                buf.extend_from_slice(b"TEXT ");
                write_astring(buf, text);
            }
            Self::Header(field, value) => {
                buf.extend_from_slice(b"HEADER ");
                write_astring(buf, field);
                buf.push(b' ');
                write_astring(buf, value);
            }
            Self::Uid(set) => buf.extend_from_slice(format!("UID {set}").as_bytes()),
            Self::Deleted => buf.extend_from_slice(b"DELETED"),
            Self::Not(inner) => {
                buf.extend_from_slice(b"NOT ");
                inner.write(buf, false);
            }
            Self::And(keys) => {
                if !top_level {
                    buf.push(b'(');
                }
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    key.write(buf, false);
                }
                if !top_level {
                    buf.push(b')');
                }
            }
        }
    }
}
