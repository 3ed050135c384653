use alloy::signers::local::{LocalSignerError, PrivateKeySigner};

use crate::SiteContractError;

pub fn signer_from_private_key(private_key: &str) -> Result<PrivateKeySigner, SiteContractError> {
    private_key
        .trim()
        .parse()
        .map_err(|e: LocalSignerError| {
            SiteContractError::Configuration(format!(
                "invalid private key (length: {}): {}",
                private_key.len(),
                e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    // Well-known development key (anvil account #1)
    const DEV_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn test_signer_accepts_prefixed_and_bare_keys() {
        let bare = signer_from_private_key(DEV_KEY).unwrap();
        let prefixed = signer_from_private_key(&format!("0x{}", DEV_KEY)).unwrap();

        assert_eq!(bare.address(), prefixed.address());
        assert_eq!(
            bare.address(),
            address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );
    }

    #[test]
    fn test_signer_rejects_garbage() {
        match signer_from_private_key("not-a-key") {
            Err(SiteContractError::Configuration(message)) => {
                assert!(message.contains("length: 9"));
            }
            other => panic!("unexpected result: {:?}", other.map(|s| s.address())),
        }
    }
}
