//! Authorization decisions. Pure functions, evaluated fresh on every read and
//! publish since courier assignment can change between requests.

use crate::models::identity::{Identity, Role};
use crate::models::package::Package;

/// Sender, assigned courier, or admin may read a package and its logs.
pub fn can_access(actor: &Identity, package: &Package) -> bool {
    actor.id == package.sender_id
        || package.courier_id == Some(actor.id)
        || actor.role == Role::Admin
}

/// Only couriers and admins may transition package status.
pub fn can_write_status(actor: &Identity) -> bool {
    matches!(actor.role, Role::Courier | Role::Admin)
}

/// Only the assigned courier may publish location updates.
pub fn can_publish_location(actor: &Identity, package: &Package) -> bool {
    package.courier_id == Some(actor.id)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{can_access, can_publish_location, can_write_status};
    use crate::models::identity::{Identity, Role};
    use crate::models::package::{Package, PackageStatus};

    fn identity(id: i64, role: Role) -> Identity {
        Identity {
            id,
            username: format!("user{id}"),
            display_name: format!("User {id}"),
            role,
        }
    }

    fn package(sender_id: i64, courier_id: Option<i64>) -> Package {
        let now = Utc::now();
        Package {
            id: 1,
            tracking_number: "PKG0000000001".to_string(),
            sender_id,
            receiver_name: "Ana".to_string(),
            receiver_phone: None,
            receiver_address: "Calle 1".to_string(),
            description: None,
            weight: None,
            status: PackageStatus::Pending,
            courier_id,
            created_at: now,
            updated_at: now,
            delivered_at: None,
        }
    }

    #[test]
    fn sender_courier_and_admin_can_access() {
        let pkg = package(1, Some(5));

        assert!(can_access(&identity(1, Role::User), &pkg));
        assert!(can_access(&identity(5, Role::Courier), &pkg));
        assert!(can_access(&identity(9, Role::Admin), &pkg));
        assert!(!can_access(&identity(2, Role::User), &pkg));
        assert!(!can_access(&identity(6, Role::Courier), &pkg));
    }

    #[test]
    fn unassigned_package_is_visible_to_sender_only() {
        let pkg = package(1, None);

        assert!(can_access(&identity(1, Role::User), &pkg));
        assert!(!can_access(&identity(2, Role::User), &pkg));
    }

    #[test]
    fn only_courier_and_admin_write_status() {
        assert!(!can_write_status(&identity(1, Role::User)));
        assert!(can_write_status(&identity(5, Role::Courier)));
        assert!(can_write_status(&identity(9, Role::Admin)));
    }

    #[test]
    fn only_assigned_courier_publishes_location() {
        let pkg = package(1, Some(5));

        assert!(can_publish_location(&identity(5, Role::Courier), &pkg));
        assert!(!can_publish_location(&identity(6, Role::Courier), &pkg));
        assert!(!can_publish_location(&identity(9, Role::Admin), &pkg));
        assert!(!can_publish_location(&identity(5, Role::Courier), &package(1, None)));
    }
}
