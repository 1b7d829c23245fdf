//! Deterministic account address derivation.
//!
//! Addresses are `sha256(program_id || label || seeds...)`. This is a pure
//! function of its inputs; both the HTTP client and the mock ledger use it, so
//! a position listed by either can be re-located for the liveness check.

use crate::domain::{Address, PoolName, PositionKey, ADDRESS_LEN};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressDeriver {
    program_id: Address,
}

impl AddressDeriver {
    pub fn new(program_id: Address) -> Self {
        Self { program_id }
    }

    pub fn derive(&self, label: &str, seeds: &[&[u8]]) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(self.program_id.to_bytes());
        hasher.update(label.as_bytes());
        for seed in seeds {
            hasher.update(seed);
        }
        let digest = hasher.finalize();
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest);
        Address::from_bytes(out)
    }

    pub fn pool(&self, name: &PoolName) -> Address {
        self.derive("pool", &[name.as_str().as_bytes()])
    }

    pub fn custody(&self, pool: &Address, mint: &Address) -> Address {
        self.derive("custody", &[&pool.to_bytes(), &mint.to_bytes()])
    }

    pub fn position(&self, key: &PositionKey) -> Address {
        self.derive(
            "position",
            &[
                &key.owner.to_bytes(),
                &key.pool.to_bytes(),
                &key.custody.to_bytes(),
                &[key.side.seed()],
            ],
        )
    }

    pub fn token_account(&self, owner: &Address, mint: &Address) -> Address {
        self.derive("token_account", &[&owner.to_bytes(), &mint.to_bytes()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(Address::from_bytes([9; 32]))
    }

    fn key(side: Side) -> PositionKey {
        PositionKey {
            owner: Address::from_bytes([1; 32]),
            pool: Address::from_bytes([2; 32]),
            custody: Address::from_bytes([3; 32]),
            side,
        }
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let d = deriver();
        assert_eq!(d.position(&key(Side::Long)), d.position(&key(Side::Long)));
        assert_eq!(
            d.pool(&PoolName::new("main")),
            d.pool(&PoolName::new("main"))
        );
    }

    #[test]
    fn test_side_changes_position_address() {
        let d = deriver();
        assert_ne!(d.position(&key(Side::Long)), d.position(&key(Side::Short)));
    }

    #[test]
    fn test_program_id_scopes_addresses() {
        let other = AddressDeriver::new(Address::from_bytes([8; 32]));
        assert_ne!(
            deriver().pool(&PoolName::new("main")),
            other.pool(&PoolName::new("main"))
        );
    }

    #[test]
    fn test_labels_do_not_collide() {
        let d = deriver();
        let owner = Address::from_bytes([1; 32]);
        let mint = Address::from_bytes([2; 32]);
        assert_ne!(d.custody(&owner, &mint), d.token_account(&owner, &mint));
    }
}
