use crate::chain::Address;
use crate::orchestrator::OperationError;

/// A provisioned account identity able to submit transactions and decrypt
/// its own ciphertexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    pub index: usize,
    pub address: Address,
}

/// Ordered list of signers provisioned for a network. Index 0 is the default.
#[derive(Debug, Clone, Default)]
pub struct SignerSet {
    signers: Vec<Signer>,
}

impl SignerSet {
    pub fn new(addresses: Vec<Address>) -> Self {
        SignerSet {
            signers: addresses
                .into_iter()
                .enumerate()
                .map(|(index, address)| Signer { index, address })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.signers.iter().map(|s| &s.address)
    }

    /// Resolves an optional textual signer index. Missing or empty selects
    /// signer 0; anything that is not an integer in `[0, len)` is rejected.
    pub fn resolve(&self, index: Option<&str>) -> Result<&Signer, OperationError> {
        let raw = index.map(str::trim).filter(|s| !s.is_empty());
        let idx = match raw {
            None => 0,
            Some(s) => s
                .parse::<usize>()
                .map_err(|_| OperationError::SignerOutOfRange(s.to_string(), self.len()))?,
        };
        self.signers
            .get(idx)
            .ok_or_else(|| OperationError::SignerOutOfRange(idx.to_string(), self.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(n: u8) -> SignerSet {
        SignerSet::new((0..n).map(|i| Address::from_bytes(&[i + 1; 20])).collect())
    }

    #[test]
    fn test_default_signer_is_zero() {
        let signers = set(3);
        assert_eq!(signers.resolve(None).unwrap().index, 0);
        assert_eq!(signers.resolve(Some("")).unwrap().index, 0);
        assert_eq!(signers.resolve(Some("2")).unwrap().index, 2);
    }

    #[test]
    fn test_out_of_range_indexes() {
        let signers = set(3);
        for bad in ["3", "99", "-1", "abc", "1.5"] {
            assert!(
                matches!(
                    signers.resolve(Some(bad)),
                    Err(OperationError::SignerOutOfRange(_, 3))
                ),
                "index {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_empty_set_rejects_default() {
        let signers = SignerSet::default();
        assert!(signers.resolve(None).is_err());
    }
}
