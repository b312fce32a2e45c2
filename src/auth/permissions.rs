/*!
 * # Permissions Module
 *
 * Permission strings are `resource:action`. A `resource:*` grant implies every
 * action on that resource and `*` implies everything.
 */

/// Permission string constants
pub mod consts {
    // Inventory
    pub const INVENTORY_READ: &str = "inventory:read";
    pub const INVENTORY_UPDATE: &str = "inventory:update";
    pub const INVENTORY_TRANSFER: &str = "inventory:transfer";

    // Warehouses
    pub const WAREHOUSES_READ: &str = "warehouses:read";
    pub const WAREHOUSES_MANAGE: &str = "warehouses:manage";

    // Orders
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_UPDATE: &str = "orders:update";
    pub const ORDERS_CANCEL: &str = "orders:cancel";

    // Compliance
    pub const COMPLIANCE_READ: &str = "compliance:read";
    pub const COMPLIANCE_CHECK: &str = "compliance:check";
    pub const COMPLIANCE_RESOLVE: &str = "compliance:resolve";

    // Analytics & reporting
    pub const ANALYTICS_READ: &str = "analytics:read";
    pub const REPORTS_GENERATE: &str = "reports:generate";
    pub const AUDIT_READ: &str = "audit:read";

    // Supplier administration
    pub const SUPPLIERS_MANAGE: &str = "suppliers:manage";
}

/// Format a permission string
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Check if `granted` covers `required`
pub fn is_permission_implied(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }

    match (granted.split_once(':'), required.split_once(':')) {
        (Some((granted_resource, "*")), Some((required_resource, _))) => {
            granted_resource == required_resource
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("inventory:update", "inventory:update", true)]
    #[case("inventory:*", "inventory:transfer", true)]
    #[case("inventory:*", "orders:read", false)]
    #[case("inventory:read", "inventory:update", false)]
    #[case("*", "audit:read", true)]
    #[case("invent:*", "inventory:read", false)]
    fn wildcard_rules(#[case] granted: &str, #[case] required: &str, #[case] expected: bool) {
        assert_eq!(is_permission_implied(granted, required), expected);
    }

    #[test]
    fn formats_resource_and_action() {
        assert_eq!(format_permission("orders", "create"), consts::ORDERS_CREATE);
    }
}
