use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Length of a registration id, including the leading prefix.
pub const ID_LEN: usize = 14;

/// Every registration id starts with this character.
pub const ID_PREFIX: char = 'T';

/// Legal personality of the registrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Individual,
    Corporate,
    Unknown,
}

impl Kind {
    /// Map a source-feed code (`"1"`, `"2"` or empty) to a kind.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Individual),
            "2" => Some(Self::Corporate),
            "" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Whether the registrant is a domestic or foreign business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Country {
    Domestic,
    Foreign,
    Unknown,
}

impl Country {
    /// Codes `"2"` and `"3"` are both foreign registrants in the source feed.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Domestic),
            "2" | "3" => Some(Self::Foreign),
            "" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// What happened to the registrant in the revision that produced a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    New,
    Changed,
    Disposed,
    Expired,
    Deleted,
}

impl ProcessKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::New),
            "02" => Some(Self::Changed),
            "03" => Some(Self::Disposed),
            "04" => Some(Self::Expired),
            "99" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// A free-text address with its optional administrative codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub text: String,
    /// Two-digit prefecture code.
    pub prefecture_code: Option<String>,
    /// Three-digit city code.
    pub city_code: Option<String>,
}

/// One registry entry, identified by its registration id.
///
/// Only revisions with `is_latest` set are ever persisted; the store holds
/// the current revision per id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub sequence_number: String,
    pub process: ProcessKind,
    pub correction: Option<bool>,
    pub kind: Kind,
    pub country: Country,
    pub is_latest: bool,
    pub registration_date: NaiveDate,
    pub update_date: Option<NaiveDate>,
    pub disposal_date: Option<NaiveDate>,
    pub expire_date: Option<NaiveDate>,
    pub address: Address,
    pub address_request: Address,
    pub address_inside: Address,
    pub kana: String,
    pub name: String,
    pub trade_name: String,
    pub popular_or_previous_name: String,
}

/// Whether `id` has the fixed registration-number shape.
pub fn is_valid_id(id: &str) -> bool {
    id.chars().count() == ID_LEN && id.starts_with(ID_PREFIX)
}
