/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps supplier roles to permission sets. Region scoping is applied on top of
 * these grants by [`super::AuthUser`].
 */

use super::permissions::{consts, is_permission_implied};
use crate::entities::types::SupplierRole;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: Vec<&'static str>,
}

lazy_static! {
    pub static ref ROLES: HashMap<SupplierRole, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            SupplierRole::Admin,
            Role {
                name: "ADMIN",
                description: "Full access across every region",
                permissions: vec!["*"],
            },
        );

        roles.insert(
            SupplierRole::WarehouseManager,
            Role {
                name: "WAREHOUSE_MANAGER",
                description: "Runs warehouses and stock in assigned regions",
                permissions: vec![
                    "inventory:*",
                    "warehouses:*",
                    "orders:*",
                    "compliance:*",
                    consts::ANALYTICS_READ,
                    consts::REPORTS_GENERATE,
                    consts::AUDIT_READ,
                ],
            },
        );

        roles.insert(
            SupplierRole::Supplier,
            Role {
                name: "SUPPLIER",
                description: "Places and tracks orders, views stock",
                permissions: vec![
                    consts::INVENTORY_READ,
                    consts::WAREHOUSES_READ,
                    consts::ORDERS_READ,
                    consts::ORDERS_CREATE,
                    consts::ORDERS_CANCEL,
                    consts::COMPLIANCE_READ,
                    consts::COMPLIANCE_CHECK,
                    consts::ANALYTICS_READ,
                ],
            },
        );

        roles.insert(
            SupplierRole::Viewer,
            Role {
                name: "VIEWER",
                description: "Read-only access",
                permissions: vec![
                    consts::INVENTORY_READ,
                    consts::WAREHOUSES_READ,
                    consts::ORDERS_READ,
                    consts::COMPLIANCE_READ,
                    consts::ANALYTICS_READ,
                ],
            },
        );

        roles
    };
}

/// Permission strings granted to a role
pub fn permissions_for_role(role: SupplierRole) -> Vec<String> {
    ROLES
        .get(&role)
        .map(|r| r.permissions.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

/// Check whether a role grants `required`
pub fn role_allows(role: SupplierRole, required: &str) -> bool {
    ROLES.get(&role).map_or(false, |r| {
        r.permissions
            .iter()
            .any(|granted| is_permission_implied(granted, required))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_role_is_defined() {
        for role in SupplierRole::iter() {
            assert!(ROLES.contains_key(&role), "missing role {role}");
        }
    }

    #[test]
    fn viewer_cannot_mutate_inventory() {
        assert!(role_allows(SupplierRole::Viewer, consts::INVENTORY_READ));
        assert!(!role_allows(SupplierRole::Viewer, consts::INVENTORY_UPDATE));
        assert!(!role_allows(SupplierRole::Supplier, consts::INVENTORY_TRANSFER));
        assert!(role_allows(SupplierRole::WarehouseManager, consts::INVENTORY_TRANSFER));
        assert!(role_allows(SupplierRole::Admin, consts::SUPPLIERS_MANAGE));
    }
}
