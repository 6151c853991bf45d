//! # Output Extraction
//!
//! Recovers response fields from the free-text output of an operation run.
//! The markers are a de-facto protocol shared with external tools:
//!
//! | Field | Marker |
//! |---|---|
//! | address | `<label> address is 0x<40 hex>` |
//! | tx | `tx:0x<hex>` |
//! | status | `status=<1\|0>` |
//! | wallet / clear / decrypted | `<label> : <digits>` (label case-insensitive) |
//! | encrypted | `encrypted balance: 0x<hex>` |
//! | accounts | a line holding only `0x<40 hex>` |
//!
//! A field without a match stays `None`; extraction never fails.

use crate::chain::{is_hex_of_len, TxStatus};

/// Every field the gateway can report. Which ones are rendered depends on
/// the endpoint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResponseFields {
    pub address: Option<String>,
    pub accounts: Vec<String>,
    pub wallet: Option<String>,
    pub encrypted: Option<String>,
    pub clear: Option<String>,
    pub decrypted: Option<String>,
    pub tx: Option<String>,
    pub status: Option<String>,
}

pub fn extract(raw: &str) -> ResponseFields {
    ResponseFields {
        address: contract_address(raw),
        accounts: accounts(raw),
        wallet: labeled(raw, "wallet eth balance").and_then(leading_decimal),
        encrypted: labeled(raw, "encrypted balance").and_then(leading_hex),
        clear: labeled(raw, "clear balance").and_then(leading_decimal),
        decrypted: labeled(raw, "decrypted balance").and_then(leading_decimal),
        tx: tx_hash(raw),
        status: tx_status(raw),
    }
}

fn hex_run(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_hexdigit).count()
}

/// `0x` followed by at least one hex digit, greedy.
fn leading_hex(s: &str) -> Option<String> {
    let body = s.strip_prefix("0x")?;
    match hex_run(body) {
        0 => None,
        n => Some(s[..2 + n].to_string()),
    }
}

fn leading_decimal(s: &str) -> Option<String> {
    let n = s.bytes().take_while(u8::is_ascii_digit).count();
    (n > 0).then(|| s[..n].to_string())
}

/// Text following the first `<label>\s*:\s*` occurrence, label matched
/// case-insensitively.
fn labeled<'a>(raw: &'a str, label: &str) -> Option<&'a str> {
    let lower = raw.to_ascii_lowercase();
    for (idx, _) in lower.match_indices(label) {
        let rest = raw[idx + label.len()..].trim_start();
        if let Some(value) = rest.strip_prefix(':') {
            return Some(value.trim_start());
        }
    }
    None
}

fn contract_address(raw: &str) -> Option<String> {
    const MARKER: &str = " address is";
    for (idx, _) in raw.match_indices(MARKER) {
        let rest = &raw[idx + MARKER.len()..];
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let candidate = rest.trim_start();
        if let Some(body) = candidate.strip_prefix("0x") {
            if hex_run(body) >= 40 {
                return Some(candidate[..42].to_string());
            }
        }
    }
    None
}

fn tx_hash(raw: &str) -> Option<String> {
    raw.match_indices("tx:")
        .find_map(|(idx, m)| leading_hex(&raw[idx + m.len()..]))
}

fn tx_status(raw: &str) -> Option<String> {
    raw.match_indices("status=").find_map(|(idx, m)| {
        let code = raw[idx + m.len()..].bytes().next()?;
        let status = TxStatus::from_code(code.checked_sub(b'0')?)?;
        Some(status.as_str().to_string())
    })
}

fn accounts(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| is_hex_of_len(l, 40))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TX: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";

    #[test]
    fn test_contract_address() {
        let raw = "Compiling...\nRedactedToken address is 0x5FbDB2315678afecb367f032d93F642f64180aa3\n";
        let fields = extract(raw);
        assert_eq!(
            fields.address.as_deref(),
            Some("0x5FbDB2315678afecb367f032d93F642f64180aa3")
        );
        assert_eq!(extract("RedactedToken address is 0x1234").address, None);
    }

    #[test]
    fn test_transaction_marker() {
        let raw = format!("Wait for tx:{TX}...\ntx:{TX} status=1\n");
        let fields = extract(&raw);
        assert_eq!(fields.tx.as_deref(), Some(TX));
        assert_eq!(fields.status.as_deref(), Some("succeeded"));

        let reverted = format!("tx:{TX} status=0");
        assert_eq!(extract(&reverted).status.as_deref(), Some("reverted"));
        assert_eq!(extract(&format!("tx:{TX} status=null")).status, None);
    }

    #[test]
    fn test_balance_labels() {
        let raw = "\
Wallet ETH balance: 9999998765432100000000
Encrypted balance: 0x00AbCd0000000000000000000000000000000000000000000000000000000001
Decrypted balance: 100
Clear balance    : 0
";
        let fields = extract(raw);
        assert_eq!(fields.wallet.as_deref(), Some("9999998765432100000000"));
        assert_eq!(
            fields.encrypted.as_deref(),
            Some("0x00AbCd0000000000000000000000000000000000000000000000000000000001")
        );
        assert_eq!(fields.decrypted.as_deref(), Some("100"));
        assert_eq!(fields.clear.as_deref(), Some("0"));
    }

    #[test]
    fn test_labels_ignore_case() {
        let raw = "WALLET ETH BALANCE:5\nclear balance: 7\n";
        let fields = extract(raw);
        assert_eq!(fields.wallet.as_deref(), Some("5"));
        assert_eq!(fields.clear.as_deref(), Some("7"));
    }

    #[test]
    fn test_label_without_colon_is_skipped() {
        let raw = "Encrypted balance after transfer: 0xabc\nEncrypted balance: 0xdef\n";
        assert_eq!(extract(raw).encrypted.as_deref(), Some("0xdef"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let fields = extract("Error: HH108: Cannot connect to the network localhost.");
        assert_eq!(fields, ResponseFields::default());
    }

    #[test]
    fn test_accounts_on_their_own_line() {
        let raw = "\
0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266
  0x70997970C51812dc3A010C7d01b50e0d17dc79C8
not an account 0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC
0x1234
";
        assert_eq!(
            extract(raw).accounts,
            vec![
                "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string(),
                "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string(),
            ]
        );
    }
}
