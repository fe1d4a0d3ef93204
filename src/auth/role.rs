use serde::{Deserialize, Serialize};

/// Closed set of account roles, stored as the Postgres `user_role` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Merchant,
}

/// Things a request may be required to be able to do. Authorization is a
/// predicate over (role, capability) rather than string comparison scattered
/// through handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageShops,
}

impl Role {
    pub fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::ManageShops => self == Role::Merchant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_merchants_manage_shops() {
        assert!(Role::Merchant.allows(Capability::ManageShops));
        assert!(!Role::Customer.allows(Capability::ManageShops));
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Merchant).unwrap(), "\"merchant\"");
        assert_eq!(serde_json::to_string(&Role::Customer).unwrap(), "\"customer\"");
        let parsed: Role = serde_json::from_str("\"merchant\"").unwrap();
        assert_eq!(parsed, Role::Merchant);
    }
}
