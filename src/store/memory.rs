use async_trait::async_trait;
use std::sync::Mutex;

use super::{Store, StoreError};
use crate::family::same_name;
use crate::model::{
    family::Family,
    member::{Member, NewMember},
    tax_payment::{LedgerFilter, NewTaxPayment, PaymentStatus, TaxPayment},
    tax_rate::TaxRate,
};

/// Store kept entirely in memory, enforcing the same unique keys as the schema.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    members: Vec<Member>,
    families: Vec<Family>,
    rates: Vec<TaxRate>,
    payments: Vec<TaxPayment>,
    next_member_id: u64,
    next_payment_id: u64,
    member_number: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store poisoned")
    }

    pub fn families(&self) -> Vec<Family> {
        self.lock().families.clone()
    }

    pub fn payments(&self) -> Vec<TaxPayment> {
        self.lock().payments.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_member(&self, member: &NewMember) -> Result<Member, StoreError> {
        let mut inner = self.lock();
        inner.next_member_id += 1;
        inner.member_number = inner.member_number.max(999) + 1;

        let stored = Member {
            id: inner.next_member_id,
            member_number: inner.member_number,
            name: member.name.clone(),
            date_of_birth: member.date_of_birth,
            date_of_baptism: member.date_of_baptism,
            date_of_confirmation: member.date_of_confirmation,
            date_of_marriage: member.date_of_marriage,
            permanent_address: member.permanent_address.clone(),
            present_address: member.present_address.clone(),
            mobile_number: member.mobile_number.clone(),
            family_id: Some(member.family_id.clone()),
            is_head_of_family: member.is_head_of_family,
        };
        inner.members.push(stored.clone());
        Ok(stored)
    }

    async fn get_member(&self, id: u64) -> Result<Option<Member>, StoreError> {
        Ok(self.lock().members.iter().find(|m| m.id == id).cloned())
    }

    async fn list_members(&self) -> Result<Vec<Member>, StoreError> {
        let mut members = self.lock().members.clone();
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    async fn list_family_heads(&self) -> Result<Vec<Member>, StoreError> {
        let mut heads: Vec<_> = self
            .lock()
            .members
            .iter()
            .filter(|m| m.is_head_of_family)
            .cloned()
            .collect();
        heads.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(heads)
    }

    async fn list_family_members(&self, family_id: &str) -> Result<Vec<Member>, StoreError> {
        let mut members: Vec<_> = self
            .lock()
            .members
            .iter()
            .filter(|m| m.family_id.as_deref() == Some(family_id))
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            b.is_head_of_family
                .cmp(&a.is_head_of_family)
                .then(a.name.cmp(&b.name))
                .then(a.id.cmp(&b.id))
        });
        Ok(members)
    }

    async fn find_head_by_family_id(
        &self,
        family_id: &str,
    ) -> Result<Option<Member>, StoreError> {
        Ok(self
            .lock()
            .members
            .iter()
            .find(|m| m.is_head_of_family && m.family_id.as_deref() == Some(family_id))
            .cloned())
    }

    async fn find_head_by_name(&self, name: &str) -> Result<Option<Member>, StoreError> {
        Ok(self
            .lock()
            .members
            .iter()
            .find(|m| m.is_head_of_family && same_name(&m.name, name))
            .cloned())
    }

    async fn update_member(&self, member: &Member) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.members.iter_mut().find(|m| m.id == member.id) {
            Some(stored) => {
                *stored = member.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reassign_family(&self, from: &str, to: &str) -> Result<u64, StoreError> {
        let mut moved = 0;
        for member in self
            .lock()
            .members
            .iter_mut()
            .filter(|m| m.family_id.as_deref() == Some(from))
        {
            member.family_id = Some(to.to_string());
            moved += 1;
        }
        Ok(moved)
    }

    async fn reassign_payment_family(&self, from: &str, to: &str) -> Result<u64, StoreError> {
        let mut moved = 0;
        for payment in self
            .lock()
            .payments
            .iter_mut()
            .filter(|p| p.family_id == from)
        {
            payment.family_id = to.to_string();
            moved += 1;
        }
        Ok(moved)
    }

    async fn count_family_members_except(
        &self,
        family_id: &str,
        member_id: u64,
    ) -> Result<i64, StoreError> {
        Ok(self
            .lock()
            .members
            .iter()
            .filter(|m| m.id != member_id && m.family_id.as_deref() == Some(family_id))
            .count() as i64)
    }

    async fn delete_member(&self, id: u64) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let before = inner.members.len();
        inner.members.retain(|m| m.id != id);
        Ok(inner.members.len() < before)
    }

    async fn find_family(&self, family_id: &str) -> Result<Option<Family>, StoreError> {
        Ok(self
            .lock()
            .families
            .iter()
            .find(|f| f.family_id == family_id)
            .cloned())
    }

    async fn find_family_by_head_name(
        &self,
        head_name: &str,
    ) -> Result<Option<Family>, StoreError> {
        Ok(self
            .lock()
            .families
            .iter()
            .find(|f| same_name(&f.head_name, head_name))
            .cloned())
    }

    async fn insert_family(&self, family: &Family) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.families.iter().any(|f| {
            f.family_id == family.family_id || same_name(&f.head_name, &family.head_name)
        }) {
            return Err(StoreError::Duplicate(format!(
                "family {} / {}",
                family.family_id, family.head_name
            )));
        }
        inner.families.push(family.clone());
        Ok(())
    }

    async fn update_family(&self, family_id: &str, updated: &Family) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.families.iter().any(|f| {
            f.family_id != family_id
                && (f.family_id == updated.family_id || same_name(&f.head_name, &updated.head_name))
        }) {
            return Err(StoreError::Duplicate(format!("family {}", updated.family_id)));
        }
        if let Some(stored) = inner.families.iter_mut().find(|f| f.family_id == family_id) {
            *stored = updated.clone();
        }
        Ok(())
    }

    async fn get_rate(&self, year: i32) -> Result<Option<TaxRate>, StoreError> {
        Ok(self.lock().rates.iter().find(|r| r.year == year).cloned())
    }

    async fn insert_rate_if_absent(&self, rate: &TaxRate) -> Result<TaxRate, StoreError> {
        let mut inner = self.lock();
        if let Some(existing) = inner.rates.iter().find(|r| r.year == rate.year) {
            return Ok(existing.clone());
        }
        inner.rates.push(rate.clone());
        Ok(rate.clone())
    }

    async fn upsert_rate(&self, rate: &TaxRate) -> Result<TaxRate, StoreError> {
        let mut inner = self.lock();
        inner.rates.retain(|r| r.year != rate.year);
        inner.rates.push(rate.clone());
        Ok(rate.clone())
    }

    async fn insert_payments(&self, payments: &[NewTaxPayment]) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let mut written = 0;
        for payment in payments {
            if inner
                .payments
                .iter()
                .any(|p| p.member_id == payment.member_id && p.year == payment.year)
            {
                continue;
            }
            inner.next_payment_id += 1;
            let id = inner.next_payment_id;
            inner.payments.push(TaxPayment {
                id,
                member_id: payment.member_id,
                year: payment.year,
                due_amount: payment.due_amount,
                is_paid: false,
                paid_amount: 0.0,
                paid_date: None,
                payment_method: "cash".into(),
                family_id: payment.family_id.clone(),
            });
            written += 1;
        }
        Ok(written)
    }

    async fn get_payment(&self, id: u64) -> Result<Option<TaxPayment>, StoreError> {
        Ok(self.lock().payments.iter().find(|p| p.id == id).cloned())
    }

    async fn find_payment(
        &self,
        member_id: u64,
        year: i32,
    ) -> Result<Option<TaxPayment>, StoreError> {
        Ok(self
            .lock()
            .payments
            .iter()
            .find(|p| p.member_id == member_id && p.year == year)
            .cloned())
    }

    async fn list_payments(&self, filter: &LedgerFilter) -> Result<Vec<TaxPayment>, StoreError> {
        let mut payments: Vec<_> = self
            .lock()
            .payments
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.year.cmp(&a.year).then(a.id.cmp(&b.id)));
        Ok(payments)
    }

    async fn update_due_amount(
        &self,
        id: u64,
        due_amount: f64,
        paid_amount: f64,
    ) -> Result<(), StoreError> {
        if let Some(p) = self.lock().payments.iter_mut().find(|p| p.id == id) {
            p.due_amount = due_amount;
            p.paid_amount = paid_amount;
        }
        Ok(())
    }

    async fn update_payment_status(
        &self,
        id: u64,
        status: &PaymentStatus,
    ) -> Result<bool, StoreError> {
        match self.lock().payments.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.is_paid = status.is_paid;
                p.paid_amount = status.paid_amount;
                p.paid_date = status.paid_date;
                p.payment_method = status.payment_method.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn payment_years(&self) -> Result<Vec<i32>, StoreError> {
        let mut years: Vec<i32> = self.lock().payments.iter().map(|p| p.year).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years)
    }
}

/// A `MemoryStore` that replays the races a shared database allows between
/// a read and the write that follows it.
#[derive(Default)]
pub struct RacingStore {
    pub inner: MemoryStore,
    /// `list_payments` answers as if nothing had been assessed yet.
    pub stale_payments: bool,
    /// Written just before the next `insert_family`, as another request would.
    pub family_first: Mutex<Option<Family>>,
}

impl RacingStore {
    pub fn stale_payments(inner: MemoryStore) -> Self {
        Self {
            inner,
            stale_payments: true,
            ..Self::default()
        }
    }

    pub fn family_first(inner: MemoryStore, family: Family) -> Self {
        Self {
            inner,
            family_first: Mutex::new(Some(family)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Store for RacingStore {
    async fn insert_member(&self, member: &NewMember) -> Result<Member, StoreError> {
        self.inner.insert_member(member).await
    }

    async fn get_member(&self, id: u64) -> Result<Option<Member>, StoreError> {
        self.inner.get_member(id).await
    }

    async fn list_members(&self) -> Result<Vec<Member>, StoreError> {
        self.inner.list_members().await
    }

    async fn list_family_heads(&self) -> Result<Vec<Member>, StoreError> {
        self.inner.list_family_heads().await
    }

    async fn list_family_members(&self, family_id: &str) -> Result<Vec<Member>, StoreError> {
        self.inner.list_family_members(family_id).await
    }

    async fn find_head_by_family_id(
        &self,
        family_id: &str,
    ) -> Result<Option<Member>, StoreError> {
        self.inner.find_head_by_family_id(family_id).await
    }

    async fn find_head_by_name(&self, name: &str) -> Result<Option<Member>, StoreError> {
        self.inner.find_head_by_name(name).await
    }

    async fn update_member(&self, member: &Member) -> Result<bool, StoreError> {
        self.inner.update_member(member).await
    }

    async fn reassign_family(&self, from: &str, to: &str) -> Result<u64, StoreError> {
        self.inner.reassign_family(from, to).await
    }

    async fn reassign_payment_family(&self, from: &str, to: &str) -> Result<u64, StoreError> {
        self.inner.reassign_payment_family(from, to).await
    }

    async fn count_family_members_except(
        &self,
        family_id: &str,
        member_id: u64,
    ) -> Result<i64, StoreError> {
        self.inner
            .count_family_members_except(family_id, member_id)
            .await
    }

    async fn delete_member(&self, id: u64) -> Result<bool, StoreError> {
        self.inner.delete_member(id).await
    }

    async fn find_family(&self, family_id: &str) -> Result<Option<Family>, StoreError> {
        self.inner.find_family(family_id).await
    }

    async fn find_family_by_head_name(
        &self,
        head_name: &str,
    ) -> Result<Option<Family>, StoreError> {
        self.inner.find_family_by_head_name(head_name).await
    }

    async fn insert_family(&self, family: &Family) -> Result<(), StoreError> {
        let winner = self.family_first.lock().expect("race slot poisoned").take();
        if let Some(winner) = winner {
            self.inner.insert_family(&winner).await?;
        }
        self.inner.insert_family(family).await
    }

    async fn update_family(&self, family_id: &str, updated: &Family) -> Result<(), StoreError> {
        self.inner.update_family(family_id, updated).await
    }

    async fn get_rate(&self, year: i32) -> Result<Option<TaxRate>, StoreError> {
        self.inner.get_rate(year).await
    }

    async fn insert_rate_if_absent(&self, rate: &TaxRate) -> Result<TaxRate, StoreError> {
        self.inner.insert_rate_if_absent(rate).await
    }

    async fn upsert_rate(&self, rate: &TaxRate) -> Result<TaxRate, StoreError> {
        self.inner.upsert_rate(rate).await
    }

    async fn insert_payments(&self, payments: &[NewTaxPayment]) -> Result<u64, StoreError> {
        self.inner.insert_payments(payments).await
    }

    async fn get_payment(&self, id: u64) -> Result<Option<TaxPayment>, StoreError> {
        self.inner.get_payment(id).await
    }

    async fn find_payment(
        &self,
        member_id: u64,
        year: i32,
    ) -> Result<Option<TaxPayment>, StoreError> {
        self.inner.find_payment(member_id, year).await
    }

    async fn list_payments(&self, filter: &LedgerFilter) -> Result<Vec<TaxPayment>, StoreError> {
        if self.stale_payments {
            return Ok(Vec::new());
        }
        self.inner.list_payments(filter).await
    }

    async fn update_due_amount(
        &self,
        id: u64,
        due_amount: f64,
        paid_amount: f64,
    ) -> Result<(), StoreError> {
        self.inner.update_due_amount(id, due_amount, paid_amount).await
    }

    async fn update_payment_status(
        &self,
        id: u64,
        status: &PaymentStatus,
    ) -> Result<bool, StoreError> {
        self.inner.update_payment_status(id, status).await
    }

    async fn payment_years(&self) -> Result<Vec<i32>, StoreError> {
        self.inner.payment_years().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(name: &str, family_id: &str) -> NewMember {
        NewMember {
            name: name.into(),
            date_of_birth: None,
            date_of_baptism: None,
            date_of_confirmation: None,
            date_of_marriage: None,
            permanent_address: "3 Rua da Igreja".into(),
            present_address: "3 Rua da Igreja".into(),
            mobile_number: "01712340000".into(),
            family_id: family_id.into(),
            is_head_of_family: true,
        }
    }

    #[actix_web::test]
    async fn head_names_compare_beyond_ascii() {
        let store = MemoryStore::new();
        store.insert_member(&head("José Évora", "JÉ0000")).await.unwrap();
        store
            .insert_family(&Family {
                family_id: "JÉ0000".into(),
                head_name: "José Évora".into(),
            })
            .await
            .unwrap();

        let found = store.find_head_by_name("  JOSÉ ÉVORA ").await.unwrap();
        assert_eq!(found.map(|m| m.name).as_deref(), Some("José Évora"));
        assert!(
            store
                .find_family_by_head_name("josé évora")
                .await
                .unwrap()
                .is_some()
        );
    }
}
