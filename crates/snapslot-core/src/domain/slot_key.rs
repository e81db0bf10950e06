//! SlotKey - `<role>-<identityKey>-slot-<n>` 命名規約の型
//!
//! リモートストアはこのキーを上書き対象として扱います。
//! 文字列の組み立て・解析はすべてこの型の `Display` / `FromStr` に集約し、
//! 呼び出し側でアドホックな文字列マッチをしないようにします。
//!
//! リモートは保存時に拡張子を付ける（例: `guest-k1-slot-3.jpg`）ため、
//! 解析時は末尾の拡張子を 1 つだけ許容します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::identity::{Role, UploadIdentity};

const SLOT_SEPARATOR: &str = "-slot-";

/// 1 始まりの slot 番号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SlotNumber(u32);

impl SlotNumber {
    /// Returns `None` for 0.
    pub fn new(n: u32) -> Option<Self> {
        (n >= 1).then_some(Self(n))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// 0 始まりの配列インデックス
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }
}

impl TryFrom<u32> for SlotNumber {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        Self::new(n).ok_or_else(|| "slot numbers start at 1".to_string())
    }
}

impl From<SlotNumber> for u32 {
    fn from(slot: SlotNumber) -> Self {
        slot.0
    }
}

impl fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Structured form of a remote photo id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    role: Role,
    identity_key: String,
    slot: SlotNumber,
}

impl SlotKey {
    pub fn new(role: Role, identity_key: impl Into<String>, slot: SlotNumber) -> Self {
        Self {
            role,
            identity_key: identity_key.into(),
            slot,
        }
    }

    pub fn for_identity(identity: &UploadIdentity, slot: SlotNumber) -> Self {
        Self::new(identity.role(), identity.identity_key(), slot)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    pub fn slot(&self) -> SlotNumber {
        self.slot
    }

    /// この identity の枠かどうか
    pub fn belongs_to(&self, identity: &UploadIdentity) -> bool {
        self.role == identity.role() && self.identity_key == identity.identity_key()
    }

    /// アップロード時のファイル名（`<key>.<ext>`）
    pub fn file_name(&self, ext: &str) -> String {
        format!("{self}.{ext}")
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}{}{}",
            self.role, self.identity_key, SLOT_SEPARATOR, self.slot
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSlotKeyError {
    #[error("unknown role prefix in {0:?}")]
    Role(String),

    #[error("missing '-slot-' separator in {0:?}")]
    MissingSlot(String),

    #[error("empty identity key in {0:?}")]
    EmptyKey(String),

    #[error("invalid slot number in {0:?}")]
    SlotNumber(String),
}

impl FromStr for SlotKey {
    type Err = ParseSlotKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (role, rest) = s
            .split_once('-')
            .ok_or_else(|| ParseSlotKeyError::Role(s.to_string()))?;
        let role: Role = role
            .parse()
            .map_err(|_| ParseSlotKeyError::Role(s.to_string()))?;

        // キー側に "-slot-" が含まれても番号は末尾にあるので rsplit で切る
        let (identity_key, tail) = rest
            .rsplit_once(SLOT_SEPARATOR)
            .ok_or_else(|| ParseSlotKeyError::MissingSlot(s.to_string()))?;
        if identity_key.is_empty() {
            return Err(ParseSlotKeyError::EmptyKey(s.to_string()));
        }

        let digits = match tail.split_once('.') {
            Some((digits, ext))
                if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                digits
            }
            Some(_) => return Err(ParseSlotKeyError::SlotNumber(s.to_string())),
            None => tail,
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseSlotKeyError::SlotNumber(s.to_string()));
        }
        let slot = digits
            .parse::<u32>()
            .ok()
            .and_then(SlotNumber::new)
            .ok_or_else(|| ParseSlotKeyError::SlotNumber(s.to_string()))?;

        Ok(Self::new(role, identity_key, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn slot(n: u32) -> SlotNumber {
        SlotNumber::new(n).unwrap()
    }

    #[test]
    fn format_matches_naming_convention() {
        let key = SlotKey::new(Role::Guest, "k1", slot(3));
        assert_eq!(key.to_string(), "guest-k1-slot-3");
        assert_eq!(key.file_name("jpg"), "guest-k1-slot-3.jpg");
    }

    #[rstest]
    #[case(Role::Host, "abc", 1)]
    #[case(Role::Guest, "k1", 20)]
    #[case(Role::Guest, "with-dash", 7)]
    #[case(Role::Host, "odd-slot-key", 12)]
    fn parse_format_roundtrip(#[case] role: Role, #[case] identity_key: &str, #[case] n: u32) {
        let key = SlotKey::new(role, identity_key, slot(n));
        let parsed: SlotKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[rstest]
    #[case("guest-k1-slot-3.jpg", Role::Guest, "k1", 3)]
    #[case("host-h9-slot-10.webp", Role::Host, "h9", 10)]
    #[case("guest-k1-slot-04", Role::Guest, "k1", 4)]
    fn parse_tolerates_extension_and_leading_zero(
        #[case] raw: &str,
        #[case] role: Role,
        #[case] identity_key: &str,
        #[case] n: u32,
    ) {
        let key: SlotKey = raw.parse().unwrap();
        assert_eq!(key, SlotKey::new(role, identity_key, slot(n)));
    }

    #[rstest]
    #[case("")]
    #[case("admin-k1-slot-1")]
    #[case("guest-k1-1")]
    #[case("guest--slot-1")]
    #[case("guest-k1-slot-")]
    #[case("guest-k1-slot-0")]
    #[case("guest-k1-slot-+3")]
    #[case("guest-k1-slot-3.")]
    #[case("guest-k1-slot-3.tar.gz")]
    #[case("guest-k1-slot-abc")]
    #[case("guest-k1-slot-99999999999")]
    #[case("01HZX3C4-some-uuid.jpg")]
    fn parse_rejects_malformed(#[case] raw: &str) {
        assert!(raw.parse::<SlotKey>().is_err(), "{raw:?} should not parse");
    }

    #[test]
    fn belongs_to_compares_role_and_key() {
        let identity = UploadIdentity::new(crate::domain::EventId::new("e1"), Role::Guest, "k1");
        assert!(SlotKey::new(Role::Guest, "k1", slot(1)).belongs_to(&identity));
        assert!(!SlotKey::new(Role::Host, "k1", slot(1)).belongs_to(&identity));
        assert!(!SlotKey::new(Role::Guest, "k2", slot(1)).belongs_to(&identity));
    }

    #[test]
    fn slot_number_rejects_zero() {
        assert_eq!(SlotNumber::new(0), None);
        assert_eq!(slot(1).index(), 0);
        assert_eq!(SlotNumber::from_index(2), slot(3));
        assert!(serde_json::from_str::<SlotNumber>("0").is_err());
    }
}
