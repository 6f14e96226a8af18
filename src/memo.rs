//! Hex memo codec
//!
//! Shielded payment memos travel as hex-encoded bytes, zero-padded by the
//! node to the fixed memo field width. Decoding stops at the first zero byte.

pub type Result<T> = std::result::Result<T, MemoError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoError {
    InvalidHex(String),
}

impl std::fmt::Display for MemoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidHex(msg) => write!(f, "Invalid hex memo: {}", msg),
        }
    }
}

impl std::error::Error for MemoError {}

const CONTRIBUTION_PREFIX: &str = "Contribution ";
const CONTRIBUTION_SUFFIX: &str = " on Grant.io";

/// Encode UTF-8 text as lowercase hex
pub fn encode_hex_memo(memo: &str) -> String {
    hex::encode(memo.as_bytes())
}

/// Decode a hex memo, discarding everything from the first zero byte on
pub fn decode_hex_memo(memo_hex: &str) -> Result<String> {
    let bytes = hex::decode(memo_hex).map_err(|e| MemoError::InvalidHex(e.to_string()))?;
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Build the hex memo attached to a Grant.io contribution payment
pub fn make_contribution_memo(contribution_id: u64) -> String {
    encode_hex_memo(&format!(
        "{}{}{}",
        CONTRIBUTION_PREFIX, contribution_id, CONTRIBUTION_SUFFIX
    ))
}

/// Extract the contribution id from a (possibly zero-padded) hex memo
///
/// Returns `None` when the memo is not valid hex or does not contain the
/// contribution template anywhere in its text.
pub fn contribution_id_from_memo(memo_hex: &str) -> Option<u64> {
    let text = decode_hex_memo(memo_hex).ok()?;
    let mut rest = text.as_str();
    while let Some(start) = rest.find(CONTRIBUTION_PREFIX) {
        let after = &rest[start + CONTRIBUTION_PREFIX.len()..];
        let digits = after
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after.len());
        if digits > 0 && after[digits..].starts_with(CONTRIBUTION_SUFFIX) {
            if let Ok(id) = after[..digits].parse() {
                return Some(id);
            }
        }
        rest = after;
    }
    None
}

/// Convert a ZEC amount to zatoshis, rounding down
pub fn to_base_unit(unit: f64) -> u64 {
    (100_000_000.0 * unit).floor() as u64
}
