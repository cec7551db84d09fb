use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use tracing::{error, warn};

use crate::error::AppError;
use crate::models::identity::UserId;
use crate::models::package::{Package, PackageStatus};

const TOKEN_PREFIX: &str = "PKG";
const TOKEN_DIGITS: u64 = 10_000_000_000;
const TOKEN_ATTEMPTS: usize = 25;

#[derive(Debug, Clone)]
pub struct NewPackage {
    pub sender_id: UserId,
    pub receiver_name: String,
    pub receiver_phone: Option<String>,
    pub receiver_address: String,
    pub description: Option<String>,
    pub weight: Option<f64>,
}

/// Owns package records and their lifecycle. Tracking tokens are generated
/// here and are immutable once assigned.
pub struct PackageRegistry {
    packages: DashMap<i64, Package>,
    tracking_index: DashMap<String, i64>,
    next_id: AtomicI64,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self {
            packages: DashMap::new(),
            tracking_index: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn create(&self, new: NewPackage) -> Result<Package, AppError> {
        if new.receiver_name.trim().is_empty() {
            return Err(AppError::Validation(
                "receiver_name cannot be empty".to_string(),
            ));
        }

        if new.receiver_address.trim().is_empty() {
            return Err(AppError::Validation(
                "receiver_address cannot be empty".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tracking_number = self.claim_token(id)?;
        let now = Utc::now();

        let package = Package {
            id,
            tracking_number,
            sender_id: new.sender_id,
            receiver_name: new.receiver_name,
            receiver_phone: new.receiver_phone,
            receiver_address: new.receiver_address,
            description: new.description,
            weight: new.weight,
            status: PackageStatus::Pending,
            courier_id: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
        };

        self.packages.insert(id, package.clone());
        Ok(package)
    }

    /// Generate a token and claim it in the tracking index. The random draw
    /// plus contains-check is a best-effort pre-check; the vacant-entry insert
    /// is the authoritative uniqueness guard against concurrent creates.
    fn claim_token(&self, id: i64) -> Result<String, AppError> {
        for attempt in 0..TOKEN_ATTEMPTS {
            let digits = rand::thread_rng().gen_range(0..TOKEN_DIGITS);
            let token = format!("{TOKEN_PREFIX}{digits:010}");

            if self.tracking_index.contains_key(&token) {
                warn!(attempt, "tracking token collision, retrying");
                continue;
            }

            match self.tracking_index.entry(token.clone()) {
                Entry::Occupied(_) => {
                    warn!(attempt, "lost tracking token race, retrying");
                    continue;
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                    return Ok(token);
                }
            }
        }

        error!(attempts = TOKEN_ATTEMPTS, "tracking token space exhausted");
        Err(AppError::TokenExhaustion)
    }

    pub fn find_by_tracking(&self, tracking: &str) -> Option<Package> {
        let id = *self.tracking_index.get(tracking)?;
        self.packages.get(&id).map(|entry| entry.value().clone())
    }

    pub fn list_by_sender(&self, sender_id: UserId) -> Vec<Package> {
        let mut packages: Vec<Package> = self
            .packages
            .iter()
            .filter(|entry| entry.value().sender_id == sender_id)
            .map(|entry| entry.value().clone())
            .collect();

        packages.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        packages
    }

    /// Whoever changes the status becomes (or stays) the courier of record.
    pub fn transition_status(
        &self,
        tracking: &str,
        status: PackageStatus,
        acting_user: UserId,
    ) -> Result<Package, AppError> {
        let id = *self
            .tracking_index
            .get(tracking)
            .ok_or_else(|| AppError::NotFound(format!("package {tracking} not found")))?;

        let mut package = self
            .packages
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("package {tracking} not found")))?;

        package.status = status;
        package.courier_id = Some(acting_user);
        package.updated_at = Utc::now();
        if status == PackageStatus::Delivered {
            package.delivered_at = Some(package.updated_at);
        }

        Ok(package.clone())
    }
}

impl Default for PackageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{NewPackage, PackageRegistry};
    use crate::error::AppError;
    use crate::models::package::PackageStatus;

    fn new_package(sender_id: i64, name: &str, address: &str) -> NewPackage {
        NewPackage {
            sender_id,
            receiver_name: name.to_string(),
            receiver_phone: None,
            receiver_address: address.to_string(),
            description: None,
            weight: None,
        }
    }

    #[test]
    fn create_assigns_token_with_fixed_format() {
        let registry = PackageRegistry::new();
        let package = registry.create(new_package(1, "Ana", "Calle 1")).unwrap();

        assert_eq!(package.tracking_number.len(), 13);
        assert!(package.tracking_number.starts_with("PKG"));
        assert!(
            package.tracking_number[3..]
                .chars()
                .all(|c| c.is_ascii_digit())
        );
        assert_eq!(package.status, PackageStatus::Pending);
        assert!(package.courier_id.is_none());
    }

    #[test]
    fn create_assigns_unique_tokens() {
        let registry = PackageRegistry::new();
        let mut tokens = std::collections::HashSet::new();

        for _ in 0..100 {
            let package = registry.create(new_package(1, "Ana", "Calle 1")).unwrap();
            assert!(tokens.insert(package.tracking_number));
        }
    }

    #[test]
    fn create_rejects_blank_receiver_fields() {
        let registry = PackageRegistry::new();

        assert!(matches!(
            registry.create(new_package(1, "  ", "Calle 1")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            registry.create(new_package(1, "Ana", "")),
            Err(AppError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn find_by_tracking_roundtrip() {
        let registry = PackageRegistry::new();
        let created = registry.create(new_package(1, "Ana", "Calle 1")).unwrap();

        let found = registry.find_by_tracking(&created.tracking_number).unwrap();
        assert_eq!(found.id, created.id);
        assert!(registry.find_by_tracking("PKG0000000000").is_none());
    }

    #[test]
    fn list_by_sender_is_newest_first() {
        let registry = PackageRegistry::new();
        let first = registry.create(new_package(1, "Ana", "Calle 1")).unwrap();
        let second = registry.create(new_package(1, "Bea", "Calle 2")).unwrap();
        registry.create(new_package(2, "Eva", "Calle 3")).unwrap();

        let listed = registry.list_by_sender(1);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn transition_sets_status_and_courier() {
        let registry = PackageRegistry::new();
        let created = registry.create(new_package(1, "Ana", "Calle 1")).unwrap();

        let updated = registry
            .transition_status(&created.tracking_number, PackageStatus::InTransit, 5)
            .unwrap();

        assert_eq!(updated.status, PackageStatus::InTransit);
        assert_eq!(updated.courier_id, Some(5));
        assert!(updated.delivered_at.is_none());

        let delivered = registry
            .transition_status(&created.tracking_number, PackageStatus::Delivered, 5)
            .unwrap();
        assert!(delivered.delivered_at.is_some());
    }

    #[test]
    fn transition_unknown_token_is_not_found() {
        let registry = PackageRegistry::new();

        assert!(matches!(
            registry.transition_status("PKG0000000000", PackageStatus::InTransit, 5),
            Err(AppError::NotFound(_))
        ));
    }
}
