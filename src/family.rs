//! Decides which family a member record belongs to.
//!
//! A head of family owns a short `familyId` (initials plus four digits,
//! e.g. `MS5678`) that is recorded in the `families` index; dependents copy
//! the id of an existing head.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use tracing::{debug, info, warn};

use crate::{
    error::ServiceError,
    model::family::Family,
    store::{Store, StoreError},
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const FALLBACK_INITIALS: &str = "FAM";

/// The family-relevant parts of a submitted member record.
#[derive(Debug, Clone, Copy, Default)]
pub struct FamilyClaim<'a> {
    pub name: &'a str,
    pub mobile_number: &'a str,
    pub is_head_of_family: bool,
    pub family_id: Option<&'a str>,
    pub family_head: Option<&'a str>,
}

impl FamilyClaim<'_> {
    /// Explicit flag, or a `familyHead` naming the member itself.
    pub fn is_head(&self) -> bool {
        self.is_head_of_family
            || self
                .family_head
                .is_some_and(|head| same_name(head, self.name))
    }
}

pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Up to three upper-cased initials of `name`.
pub fn initials(name: &str) -> String {
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .take(3)
        .collect();

    if initials.is_empty() {
        FALLBACK_INITIALS.to_string()
    } else {
        initials
    }
}

/// Last four digits of the mobile number, when it has at least four.
fn mobile_suffix(mobile_number: &str) -> Option<u32> {
    let digits: Vec<u32> = mobile_number.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 4 {
        return None;
    }
    Some(digits[digits.len() - 4..].iter().fold(0, |acc, d| acc * 10 + d))
}

fn random_suffix() -> u32 {
    OsRng.next_u32() % 10_000
}

pub fn candidate_id(initials: &str, suffix: u32) -> String {
    format!("{initials}{:04}", suffix % 10_000)
}

pub struct FamilyResolver<'a> {
    store: &'a dyn Store,
    max_attempts: u32,
}

impl<'a> FamilyResolver<'a> {
    pub fn new(store: &'a dyn Store, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns the `familyId` the claimed member should carry.
    pub async fn resolve(&self, claim: &FamilyClaim<'_>) -> Result<String, ServiceError> {
        if claim.is_head() {
            match claim.family_id {
                Some(family_id) => self.adopt_head_family(family_id, claim.name).await,
                None => self.head_family(claim).await,
            }
        } else {
            self.dependent_family(claim).await
        }
    }

    async fn dependent_family(&self, claim: &FamilyClaim<'_>) -> Result<String, ServiceError> {
        if let Some(family_id) = claim.family_id {
            return match self.store.find_head_by_family_id(family_id).await? {
                Some(_) => Ok(family_id.to_string()),
                None => Err(ServiceError::ReferenceNotFound(format!(
                    "No family head found with familyId {family_id}"
                ))),
            };
        }

        if let Some(head_name) = claim.family_head {
            let head = self.store.find_head_by_name(head_name).await?.ok_or_else(|| {
                ServiceError::ReferenceNotFound(format!(
                    "No family head found with name {}",
                    head_name.trim()
                ))
            })?;
            return head.family_id.ok_or_else(|| {
                ServiceError::ReferenceNotFound(format!(
                    "Family head {} has no familyId",
                    head.name
                ))
            });
        }

        Err(ServiceError::validation(
            "familyId or familyHead is required for members who are not head of family",
        ))
    }

    /// A head that brought its own id keeps it; the index row is created on
    /// first sight.
    async fn adopt_head_family(&self, family_id: &str, name: &str) -> Result<String, ServiceError> {
        if let Some(family) = self.store.find_family(family_id).await? {
            if !same_name(&family.head_name, name) {
                return Err(ServiceError::Conflict(format!(
                    "familyId {family_id} already belongs to {}",
                    family.head_name
                )));
            }
            return Ok(family.family_id);
        }

        let family = Family {
            family_id: family_id.to_string(),
            head_name: name.trim().to_string(),
        };
        match self.store.insert_family(&family).await {
            Ok(()) => Ok(family.family_id),
            Err(StoreError::Duplicate(_)) => Err(ServiceError::Conflict(format!(
                "A family headed by {} already exists",
                family.head_name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn head_family(&self, claim: &FamilyClaim<'_>) -> Result<String, ServiceError> {
        let head_name = claim.name.trim();
        if let Some(family) = self.store.find_family_by_head_name(head_name).await? {
            debug!(family_id = %family.family_id, head_name, "Reusing existing family");
            return Ok(family.family_id);
        }

        let initials = initials(head_name);
        for attempt in 1..=self.max_attempts {
            let suffix = match attempt {
                1 => mobile_suffix(claim.mobile_number).unwrap_or_else(random_suffix),
                _ => random_suffix(),
            };
            let family = Family {
                family_id: candidate_id(&initials, suffix),
                head_name: head_name.to_string(),
            };

            match self.store.insert_family(&family).await {
                Ok(()) => {
                    info!(family_id = %family.family_id, head_name, attempt, "Family created");
                    return Ok(family.family_id);
                }
                Err(StoreError::Duplicate(_)) => {
                    // a concurrent registration of the same head wins
                    if let Some(existing) = self.store.find_family_by_head_name(head_name).await? {
                        return Ok(existing.family_id);
                    }
                    warn!(candidate = %family.family_id, attempt, "Family id collision");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::FamilyIdExhausted(self.max_attempts))
    }
}
