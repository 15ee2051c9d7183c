//! Member registration and maintenance on top of the family resolver.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    error::ServiceError,
    family::{FamilyClaim, FamilyResolver},
    model::{
        family::Family,
        member::{Member, NewMember},
    },
    store::{Store, StoreError},
};

/// Member fields as submitted by clients. Registration requires the
/// identity fields; updates apply only what is present.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberInput {
    #[schema(example = "Maria Silva")]
    pub name: Option<String>,
    #[schema(value_type = Option<String>, format = "date", example = "1980-04-12")]
    pub date_of_birth: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_baptism: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_confirmation: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_marriage: Option<NaiveDate>,
    #[schema(example = "12 Church Road")]
    pub permanent_address: Option<String>,
    #[schema(example = "12 Church Road")]
    pub present_address: Option<String>,
    #[schema(example = "+8801712345678")]
    pub mobile_number: Option<String>,
    /// Existing family to join, or the id a new head wants to own
    pub family_id: Option<String>,
    /// Name of the family head; equal to `name` when registering a head
    pub family_head: Option<String>,
    pub is_head_of_family: Option<bool>,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn required(value: Option<&String>, field: &str) -> Result<String, ServiceError> {
    non_blank(value)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::validation(format!("{field} is required")))
}

/// Rejects a present-but-blank value for a required column.
fn replacement(value: Option<&String>, field: &str) -> Result<Option<String>, ServiceError> {
    match value {
        None => Ok(None),
        Some(_) => required(value, field).map(Some),
    }
}

pub struct Registry<'a> {
    store: &'a dyn Store,
    family_id_attempts: u32,
}

impl<'a> Registry<'a> {
    pub fn new(store: &'a dyn Store, family_id_attempts: u32) -> Self {
        Self {
            store,
            family_id_attempts,
        }
    }

    fn resolver(&self) -> FamilyResolver<'a> {
        FamilyResolver::new(self.store, self.family_id_attempts)
    }

    pub async fn register(&self, input: &MemberInput) -> Result<Member, ServiceError> {
        let name = required(input.name.as_ref(), "name")?;
        let permanent_address = required(input.permanent_address.as_ref(), "permanentAddress")?;
        let present_address = required(input.present_address.as_ref(), "presentAddress")?;
        let mobile_number = required(input.mobile_number.as_ref(), "mobileNumber")?;

        let claim = FamilyClaim {
            name: &name,
            mobile_number: &mobile_number,
            is_head_of_family: input.is_head_of_family.unwrap_or(false),
            family_id: non_blank(input.family_id.as_ref()),
            family_head: non_blank(input.family_head.as_ref()),
        };
        let is_head_of_family = claim.is_head();
        let family_id = self.resolver().resolve(&claim).await?;

        let member = self
            .store
            .insert_member(&NewMember {
                name,
                date_of_birth: input.date_of_birth,
                date_of_baptism: input.date_of_baptism,
                date_of_confirmation: input.date_of_confirmation,
                date_of_marriage: input.date_of_marriage,
                permanent_address,
                present_address,
                mobile_number,
                family_id,
                is_head_of_family,
            })
            .await?;

        info!(
            member_id = member.id,
            member_number = member.member_number,
            family_id = ?member.family_id,
            is_head_of_family,
            "Member registered"
        );
        Ok(member)
    }

    pub async fn get(&self, id: u64) -> Result<Member, ServiceError> {
        self.store
            .get_member(id)
            .await?
            .ok_or(ServiceError::NotFound("Member"))
    }

    pub async fn list(&self) -> Result<Vec<Member>, ServiceError> {
        Ok(self.store.list_members().await?)
    }

    pub async fn heads(&self) -> Result<Vec<Member>, ServiceError> {
        Ok(self.store.list_family_heads().await?)
    }

    pub async fn family(&self, family_id: &str) -> Result<Vec<Member>, ServiceError> {
        Ok(self.store.list_family_members(family_id).await?)
    }

    pub async fn update(&self, id: u64, changes: &MemberInput) -> Result<Member, ServiceError> {
        let current = self.get(id).await?;
        let mut member = current.clone();

        if let Some(name) = replacement(changes.name.as_ref(), "name")? {
            member.name = name;
        }
        if let Some(address) = replacement(changes.permanent_address.as_ref(), "permanentAddress")? {
            member.permanent_address = address;
        }
        if let Some(address) = replacement(changes.present_address.as_ref(), "presentAddress")? {
            member.present_address = address;
        }
        if let Some(mobile) = replacement(changes.mobile_number.as_ref(), "mobileNumber")? {
            member.mobile_number = mobile;
        }
        member.date_of_birth = changes.date_of_birth.or(member.date_of_birth);
        member.date_of_baptism = changes.date_of_baptism.or(member.date_of_baptism);
        member.date_of_confirmation = changes.date_of_confirmation.or(member.date_of_confirmation);
        member.date_of_marriage = changes.date_of_marriage.or(member.date_of_marriage);

        let requested_id = non_blank(changes.family_id.as_ref());
        let family_head = non_blank(changes.family_head.as_ref());
        let claim = FamilyClaim {
            name: &member.name,
            mobile_number: &member.mobile_number,
            is_head_of_family: changes
                .is_head_of_family
                .unwrap_or(current.is_head_of_family),
            family_id: requested_id,
            family_head,
        };
        let becomes_head = claim.is_head();

        match (current.is_head_of_family, becomes_head) {
            (true, true) => {
                let family_id = self.update_head_family(&current, &member, requested_id).await?;
                member.family_id = Some(family_id);
            }
            (false, true) => {
                member.family_id = Some(self.resolver().resolve(&claim).await?);
            }
            (true, false) => {
                self.ensure_no_dependents(&current).await?;
                let family_id = self.resolver().resolve(&claim).await?;
                // the only head of this family is the member being demoted
                if current.family_id.as_deref() == Some(family_id.as_str()) {
                    return Err(ServiceError::ReferenceNotFound(format!(
                        "No other family head found with familyId {family_id}"
                    )));
                }
                member.family_id = Some(family_id);
            }
            (false, false) if requested_id.is_some() || family_head.is_some() => {
                member.family_id = Some(self.resolver().resolve(&claim).await?);
            }
            (false, false) => {}
        }
        member.is_head_of_family = becomes_head;

        self.store.update_member(&member).await?;
        info!(member_id = id, family_id = ?member.family_id, "Member updated");
        Ok(member)
    }

    /// Renames the head's family index row and moves every member carrying
    /// the old id over to the new one.
    async fn update_head_family(
        &self,
        current: &Member,
        updated: &Member,
        requested_id: Option<&str>,
    ) -> Result<String, ServiceError> {
        let Some(old_id) = current.family_id.as_deref() else {
            // legacy head without an id gets one like a fresh registration
            let claim = FamilyClaim {
                name: &updated.name,
                mobile_number: &updated.mobile_number,
                is_head_of_family: true,
                family_id: requested_id,
                family_head: None,
            };
            return self.resolver().resolve(&claim).await;
        };
        let new_id = requested_id.unwrap_or(old_id);

        if new_id == old_id && current.name == updated.name {
            return Ok(old_id.to_string());
        }
        if new_id != old_id && self.store.find_head_by_family_id(new_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "familyId {new_id} is already in use"
            )));
        }
        if self.shares_family(current).await? {
            // the index row still names the other head
            if new_id != old_id {
                return Err(ServiceError::Conflict(format!(
                    "familyId {old_id} is shared with another head of family"
                )));
            }
            return Ok(old_id.to_string());
        }

        let family = Family {
            family_id: new_id.to_string(),
            head_name: updated.name.trim().to_string(),
        };
        let written = match self.store.find_family(old_id).await? {
            Some(_) => self.store.update_family(old_id, &family).await,
            None => self.store.insert_family(&family).await,
        };
        match written {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(ServiceError::Conflict(format!(
                    "familyId {new_id} or head name {} is already in use",
                    family.head_name
                )));
            }
            Err(e) => return Err(e.into()),
        }

        if new_id != old_id {
            let moved = self.store.reassign_family(old_id, new_id).await?;
            let assessments = self.store.reassign_payment_family(old_id, new_id).await?;
            info!(from = old_id, to = new_id, moved, assessments, "Family id changed");
        }
        Ok(family.family_id)
    }

    /// Whether another head of family carries the same family id.
    async fn shares_family(&self, head: &Member) -> Result<bool, ServiceError> {
        let Some(family_id) = head.family_id.as_deref() else {
            return Ok(false);
        };
        Ok(self
            .store
            .list_family_members(family_id)
            .await?
            .iter()
            .any(|m| m.is_head_of_family && m.id != head.id))
    }

    async fn ensure_no_dependents(&self, head: &Member) -> Result<(), ServiceError> {
        let Some(family_id) = head.family_id.as_deref() else {
            return Ok(());
        };
        let count = self
            .store
            .count_family_members_except(family_id, head.id)
            .await?;
        if count > 0 {
            return Err(ServiceError::DependentsExist {
                family_id: family_id.to_string(),
                count,
            });
        }
        Ok(())
    }

    pub async fn delete(&self, id: u64) -> Result<(), ServiceError> {
        let member = self.get(id).await?;
        if member.is_head_of_family {
            self.ensure_no_dependents(&member).await?;
        }

        if !self.store.delete_member(id).await? {
            return Err(ServiceError::NotFound("Member"));
        }
        info!(member_id = id, family_id = ?member.family_id, "Member deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        family::DEFAULT_MAX_ATTEMPTS,
        model::tax_payment::{LedgerFilter, NewTaxPayment},
        store::memory::MemoryStore,
    };
    use pretty_assertions::assert_eq;

    fn input(name: &str) -> MemberInput {
        MemberInput {
            name: Some(name.into()),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 4, 12),
            permanent_address: Some("12 Church Road".into()),
            present_address: Some("12 Church Road".into()),
            mobile_number: Some("+8801712345678".into()),
            ..MemberInput::default()
        }
    }

    fn head(name: &str) -> MemberInput {
        MemberInput {
            is_head_of_family: Some(true),
            ..input(name)
        }
    }

    fn dependent_of(name: &str, family_id: &str) -> MemberInput {
        MemberInput {
            family_id: Some(family_id.into()),
            ..input(name)
        }
    }

    #[actix_web::test]
    async fn required_fields_are_checked_before_writes() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);

        let blank = MemberInput {
            present_address: Some("   ".into()),
            ..head("Maria Silva")
        };
        let err = registry.register(&blank).await.unwrap_err();
        assert!(err.to_string().contains("presentAddress"));
        assert!(store.families().is_empty());
    }

    #[actix_web::test]
    async fn head_registration_allocates_number_and_family() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);

        let maria = registry.register(&head("Maria Silva")).await.unwrap();
        assert_eq!(maria.member_number, 1000);
        assert_eq!(maria.family_id.as_deref(), Some("MS5678"));
        assert!(maria.is_head_of_family);

        let by_family_head = MemberInput {
            family_head: Some("Maria Silva".into()),
            ..input("Maria Silva")
        };
        let again = registry.register(&by_family_head).await.unwrap();
        assert!(again.is_head_of_family);
        assert_eq!(again.family_id, maria.family_id);
        assert_eq!(again.member_number, 1001);
        assert_eq!(store.families().len(), 1);
    }

    #[actix_web::test]
    async fn dependent_joins_head_family() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        registry.register(&head("Maria Silva")).await.unwrap();

        let ana = registry
            .register(&dependent_of("Ana Silva", "MS5678"))
            .await
            .unwrap();
        assert_eq!(ana.family_id.as_deref(), Some("MS5678"));
        assert!(!ana.is_head_of_family);

        let family: Vec<String> = registry
            .family("MS5678")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(family, vec!["Maria Silva", "Ana Silva"]);

        let err = registry
            .register(&dependent_of("Rui", "ZZ0000"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ReferenceNotFound(_)));
    }

    #[actix_web::test]
    async fn head_delete_waits_for_dependents() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        let maria = registry.register(&head("Maria Silva")).await.unwrap();
        let ana = registry
            .register(&dependent_of("Ana Silva", "MS5678"))
            .await
            .unwrap();

        let err = registry.delete(maria.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::DependentsExist { ref family_id, count: 1 } if family_id == "MS5678"
        ));

        registry.delete(ana.id).await.unwrap();
        registry.delete(maria.id).await.unwrap();
        assert!(registry.list().await.unwrap().is_empty());

        assert!(matches!(
            registry.delete(maria.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn head_family_id_change_propagates() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        let maria = registry.register(&head("Maria Silva")).await.unwrap();
        let ana = registry
            .register(&dependent_of("Ana Silva", "MS5678"))
            .await
            .unwrap();

        let changes = MemberInput {
            family_id: Some("SILVA1".into()),
            ..MemberInput::default()
        };
        let updated = registry.update(maria.id, &changes).await.unwrap();
        assert_eq!(updated.family_id.as_deref(), Some("SILVA1"));

        let ana = registry.get(ana.id).await.unwrap();
        assert_eq!(ana.family_id.as_deref(), Some("SILVA1"));
        assert_eq!(
            store.families(),
            vec![Family {
                family_id: "SILVA1".into(),
                head_name: "Maria Silva".into(),
            }]
        );
    }

    #[actix_web::test]
    async fn head_family_id_change_rejects_taken_id() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        let maria = registry.register(&head("Maria Silva")).await.unwrap();
        let pedro = MemberInput {
            mobile_number: Some("0191110000".into()),
            ..head("Pedro Costa")
        };
        registry.register(&pedro).await.unwrap();

        let changes = MemberInput {
            family_id: Some("PC0000".into()),
            ..MemberInput::default()
        };
        let err = registry.update(maria.id, &changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(
            registry.get(maria.id).await.unwrap().family_id.as_deref(),
            Some("MS5678")
        );
    }

    #[actix_web::test]
    async fn head_rename_updates_family_index() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        let maria = registry.register(&head("Maria Silva")).await.unwrap();

        let changes = MemberInput {
            name: Some("Maria S. Costa".into()),
            ..MemberInput::default()
        };
        registry.update(maria.id, &changes).await.unwrap();

        assert_eq!(store.families()[0].head_name, "Maria S. Costa");
        assert_eq!(store.families()[0].family_id, "MS5678");
    }

    #[actix_web::test]
    async fn dependent_move_requires_known_head() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        registry.register(&head("Maria Silva")).await.unwrap();
        let ana = registry
            .register(&dependent_of("Ana Silva", "MS5678"))
            .await
            .unwrap();

        let changes = MemberInput {
            family_id: Some("NOPE01".into()),
            ..MemberInput::default()
        };
        let err = registry.update(ana.id, &changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReferenceNotFound(_)));

        let changes = MemberInput {
            present_address: Some("3 Harbour St".into()),
            ..MemberInput::default()
        };
        let moved = registry.update(ana.id, &changes).await.unwrap();
        assert_eq!(moved.present_address, "3 Harbour St");
        assert_eq!(moved.family_id.as_deref(), Some("MS5678"));
    }

    #[actix_web::test]
    async fn lone_head_cannot_become_dependent_of_itself() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        let maria = registry.register(&head("Maria Silva")).await.unwrap();

        let changes = MemberInput {
            is_head_of_family: Some(false),
            family_id: Some("MS5678".into()),
            ..MemberInput::default()
        };
        let err = registry.update(maria.id, &changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReferenceNotFound(_)));

        let by_old_name = MemberInput {
            name: Some("Maria Costa".into()),
            is_head_of_family: Some(false),
            family_head: Some("Maria Silva".into()),
            ..MemberInput::default()
        };
        let err = registry.update(maria.id, &by_old_name).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReferenceNotFound(_)));

        let unchanged = registry.get(maria.id).await.unwrap();
        assert!(unchanged.is_head_of_family);
        assert!(store.find_head_by_family_id("MS5678").await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn lone_head_may_join_another_family() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        registry.register(&head("Maria Silva")).await.unwrap();
        let pedro = MemberInput {
            mobile_number: Some("0191110000".into()),
            ..head("Pedro Costa")
        };
        let pedro = registry.register(&pedro).await.unwrap();

        let changes = MemberInput {
            is_head_of_family: Some(false),
            family_id: Some("MS5678".into()),
            ..MemberInput::default()
        };
        let moved = registry.update(pedro.id, &changes).await.unwrap();
        assert!(!moved.is_head_of_family);
        assert_eq!(moved.family_id.as_deref(), Some("MS5678"));
    }

    #[actix_web::test]
    async fn shared_family_keeps_index_name_on_rename() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        let first = registry.register(&head("Maria Silva")).await.unwrap();
        let second = registry.register(&head("Maria Silva")).await.unwrap();
        assert_eq!(first.family_id, second.family_id);

        let rename = MemberInput {
            name: Some("Maria S. Costa".into()),
            ..MemberInput::default()
        };
        let renamed = registry.update(second.id, &rename).await.unwrap();
        assert_eq!(renamed.family_id.as_deref(), Some("MS5678"));
        assert_eq!(
            store.families(),
            vec![Family {
                family_id: "MS5678".into(),
                head_name: "Maria Silva".into(),
            }]
        );

        let move_id = MemberInput {
            family_id: Some("SILVA1".into()),
            ..MemberInput::default()
        };
        let err = registry.update(first.id, &move_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(
            registry.get(second.id).await.unwrap().family_id.as_deref(),
            Some("MS5678")
        );
    }

    #[actix_web::test]
    async fn family_id_change_restamps_assessments() {
        let store = MemoryStore::new();
        let registry = Registry::new(&store, DEFAULT_MAX_ATTEMPTS);
        let maria = registry.register(&head("Maria Silva")).await.unwrap();
        store
            .insert_payments(&[NewTaxPayment {
                member_id: maria.id,
                year: 2023,
                due_amount: 1000.0,
                family_id: "MS5678".into(),
            }])
            .await
            .unwrap();

        let changes = MemberInput {
            family_id: Some("SILVA1".into()),
            ..MemberInput::default()
        };
        registry.update(maria.id, &changes).await.unwrap();

        let moved = store
            .list_payments(&LedgerFilter::new(None, Some("SILVA1")))
            .await
            .unwrap();
        assert_eq!(moved.len(), 1);
        assert!(
            store
                .list_payments(&LedgerFilter::new(None, Some("MS5678")))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
