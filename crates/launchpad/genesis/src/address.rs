//! Bech32 address re-encoding

use crate::GenesisError;
use bech32::{Bech32, Hrp};

/// Re-encode a bech32 `address` under `prefix`, keeping its payload
pub fn change_address_prefix(address: &str, prefix: &str) -> Result<String, GenesisError> {
    let invalid = |reason: String| GenesisError::AddressFormat { address: address.to_owned(), reason };

    let (_, data) = bech32::decode(address).map_err(|err| invalid(err.to_string()))?;
    let hrp = Hrp::parse(prefix).map_err(|err| invalid(format!("prefix {prefix:?}: {err}")))?;
    bech32::encode::<Bech32>(hrp, &data).map_err(|err| invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn address(prefix: &str, payload: &[u8]) -> String {
        bech32::encode::<Bech32>(Hrp::parse(prefix).unwrap(), payload).unwrap()
    }

    #[test]
    fn keeps_payload_under_new_prefix() {
        let payload = [7u8; 20];
        let original = address("cosmos", &payload);

        let converted = change_address_prefix(&original, "spn").unwrap();
        assert!(converted.starts_with("spn1"));

        let (hrp, data) = bech32::decode(&converted).unwrap();
        assert_eq!(hrp.as_str(), "spn");
        assert_eq!(data, payload);
        assert_eq!(change_address_prefix(&converted, "cosmos").unwrap(), original);
    }

    #[test]
    fn same_prefix_is_identity() {
        let original = address("spn", &[1, 2, 3, 4]);
        assert_eq!(change_address_prefix(&original, "spn").unwrap(), original);
    }

    #[test]
    fn rejects_invalid_address_and_prefix() {
        assert_matches!(
            change_address_prefix("not-an-address", "spn"),
            Err(GenesisError::AddressFormat { address, .. }) if address == "not-an-address"
        );

        let valid = address("cosmos", &[9u8; 20]);
        let mut corrupted = valid.clone();
        corrupted.pop();
        corrupted.push(if valid.ends_with('q') { 'p' } else { 'q' });
        assert_matches!(change_address_prefix(&corrupted, "spn"), Err(GenesisError::AddressFormat { .. }));

        assert_matches!(change_address_prefix(&valid, ""), Err(GenesisError::AddressFormat { .. }));
    }
}
