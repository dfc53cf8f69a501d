// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt;

use serde::Serialize;

/// Separator between the owner id and the block id in a block file name.
/// Decimal digits never contain it, so the encoding stays injective.
const NAME_DELIMITER: &str = "___";

/// Suffix of every block file in the swap directory.
pub const BLOCK_FILE_SUFFIX: &str = ".block";

/// Identifies one spilled block.
///
/// A block is scoped by the execution context (site) that created it. Any
/// bit pattern is a valid id, negative values included.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockKey {
    owner_id: i64,
    block_id: i64,
}

impl BlockKey {
    pub const fn new(owner_id: i64, block_id: i64) -> Self {
        Self { owner_id, block_id }
    }

    pub const fn owner_id(&self) -> i64 {
        self.owner_id
    }

    pub const fn block_id(&self) -> i64 {
        self.block_id
    }

    /// Name of the file backing this block, e.g. `555___333.block`.
    ///
    /// Both ids are printed as unsigned so that no file name starts with `-`.
    pub fn file_name(&self) -> String {
        format!(
            "{}{}{}{}",
            self.owner_id as u64, NAME_DELIMITER, self.block_id as u64, BLOCK_FILE_SUFFIX
        )
    }

    /// Parse a name produced by [`BlockKey::file_name`]. Returns `None` for
    /// anything that is not exactly a canonical block file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(BLOCK_FILE_SUFFIX)?;
        let (owner, block) = stem.split_once(NAME_DELIMITER)?;
        Some(Self::new(
            parse_canonical_u64(owner)? as i64,
            parse_canonical_u64(block)? as i64,
        ))
    }
}

/// Accepts only the form `u64::to_string` produces: ascii digits, no sign,
/// no leading zeros beyond a lone "0".
fn parse_canonical_u64(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner_id, self.block_id)
    }
}

impl From<(i64, i64)> for BlockKey {
    fn from((owner_id, block_id): (i64, i64)) -> Self {
        Self::new(owner_id, block_id)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, 0, "0___0.block")]
    #[test_case(100, 1, "100___1.block")]
    #[test_case(555, 333, "555___333.block")]
    #[test_case(i64::MAX, i64::MAX, "9223372036854775807___9223372036854775807.block")]
    #[test_case(-1, -1, "18446744073709551615___18446744073709551615.block")]
    #[test_case(i64::MIN, i64::MIN, "9223372036854775808___9223372036854775808.block")]
    #[test_case(-2, 7, "18446744073709551614___7.block")]
    fn test_file_name(owner_id: i64, block_id: i64, expected: &str) {
        let key = BlockKey::new(owner_id, block_id);
        assert_eq!(key.file_name(), expected);
        assert_eq!(BlockKey::from_file_name(expected), Some(key));
    }

    #[test_case("0___0"; "missing suffix")]
    #[test_case("555_333.block"; "short delimiter")]
    #[test_case("-1___1.block"; "signed owner")]
    #[test_case("01___1.block"; "leading zero")]
    #[test_case("1___1.block.tmp"; "temp file")]
    #[test_case("18446744073709551616___0.block"; "overflow")]
    #[test_case("1___2___3.block"; "extra delimiter")]
    #[test_case("___.block"; "empty ids")]
    fn test_foreign_file_name(name: &str) {
        assert_eq!(BlockKey::from_file_name(name), None);
    }

    #[test]
    fn test_display_is_signed() {
        assert_eq!(BlockKey::new(110, 444).to_string(), "110::444");
        assert_eq!(BlockKey::new(-1, 3).to_string(), "-1::3");
    }
}
