use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    error::ServiceError,
    model::tax_payment::{PaymentMethod, PaymentStatus, TaxPayment},
    store::Store,
};

/// A requested flip of an assessment's paid state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusChange {
    pub is_paid: bool,
    pub paid_amount: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
}

/// Computes the columns to write for `change`. Paid rows default to the due
/// amount and are stamped `now`; unpaid rows always drop amount and date.
pub fn resolve_status(
    payment: &TaxPayment,
    change: &StatusChange,
    now: DateTime<Utc>,
) -> Result<PaymentStatus, ServiceError> {
    let payment_method = change.payment_method.unwrap_or_default();

    if !change.is_paid {
        return Ok(PaymentStatus {
            is_paid: false,
            paid_amount: 0.0,
            paid_date: None,
            payment_method,
        });
    }

    let paid_amount = change.paid_amount.unwrap_or(payment.due_amount);
    if !paid_amount.is_finite() || paid_amount < 0.0 {
        return Err(ServiceError::validation("paidAmount must be 0 or greater"));
    }

    Ok(PaymentStatus {
        is_paid: true,
        paid_amount,
        paid_date: Some(now),
        payment_method,
    })
}

pub async fn set_payment_status(
    store: &dyn Store,
    payment_id: u64,
    change: StatusChange,
    now: DateTime<Utc>,
) -> Result<TaxPayment, ServiceError> {
    let payment = store
        .get_payment(payment_id)
        .await?
        .ok_or(ServiceError::NotFound("Payment record"))?;

    let status = resolve_status(&payment, &change, now)?;
    store.update_payment_status(payment_id, &status).await?;

    info!(
        payment_id,
        member_id = payment.member_id,
        year = payment.year,
        is_paid = status.is_paid,
        paid_amount = status.paid_amount,
        method = %status.payment_method,
        "Payment status updated"
    );

    Ok(TaxPayment {
        is_paid: status.is_paid,
        paid_amount: status.paid_amount,
        paid_date: status.paid_date,
        payment_method: status.payment_method.to_string(),
        ..payment
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tax_payment::NewTaxPayment;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;

    fn assessment(due_amount: f64) -> TaxPayment {
        TaxPayment {
            id: 9,
            member_id: 3,
            year: 2024,
            due_amount,
            is_paid: true,
            paid_amount: 650.0,
            paid_date: Some(Utc.with_ymd_and_hms(2024, 2, 2, 8, 0, 0).unwrap()),
            payment_method: "bank".into(),
            family_id: "MS5678".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 10, 15, 0).unwrap()
    }

    #[test]
    fn paid_defaults_to_due_amount() {
        let change = StatusChange {
            is_paid: true,
            paid_amount: None,
            payment_method: None,
        };

        let status = resolve_status(&assessment(500.0), &change, now()).unwrap();
        assert_eq!(status.paid_amount, 500.0);
        assert_eq!(status.paid_date, Some(now()));
        assert_eq!(status.payment_method, PaymentMethod::Cash);
    }

    #[test]
    fn paid_amount_may_differ_from_due() {
        let change = StatusChange {
            is_paid: true,
            paid_amount: Some(300.0),
            payment_method: Some(PaymentMethod::Online),
        };

        let status = resolve_status(&assessment(500.0), &change, now()).unwrap();
        assert_eq!(status.paid_amount, 300.0);
        assert_eq!(status.payment_method, PaymentMethod::Online);
    }

    #[test]
    fn unpaid_always_clears_amount_and_date() {
        for paid_amount in [None, Some(0.0), Some(999.0)] {
            let change = StatusChange {
                is_paid: false,
                paid_amount,
                payment_method: Some(PaymentMethod::Bank),
            };

            let status = resolve_status(&assessment(500.0), &change, now()).unwrap();
            assert!(!status.is_paid);
            assert_eq!(status.paid_amount, 0.0);
            assert_eq!(status.paid_date, None);
        }
    }

    #[test]
    fn negative_paid_amount_is_rejected() {
        let change = StatusChange {
            is_paid: true,
            paid_amount: Some(-1.0),
            payment_method: None,
        };

        assert!(matches!(
            resolve_status(&assessment(500.0), &change, now()),
            Err(ServiceError::Validation(_))
        ));
    }

    #[actix_web::test]
    async fn missing_payment_is_not_found() {
        let store = MemoryStore::new();
        let change = StatusChange {
            is_paid: true,
            paid_amount: None,
            payment_method: None,
        };

        let err = set_payment_status(&store, 404, change, now())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_web::test]
    async fn status_round_trip_through_store() {
        let store = MemoryStore::new();
        store
            .insert_payments(&[NewTaxPayment {
                member_id: 1,
                year: 2024,
                due_amount: 1000.0,
                family_id: "MS5678".into(),
            }])
            .await
            .unwrap();
        let id = store.payments()[0].id;

        let paid = set_payment_status(
            &store,
            id,
            StatusChange {
                is_paid: true,
                paid_amount: None,
                payment_method: Some(PaymentMethod::Bank),
            },
            now(),
        )
        .await
        .unwrap();
        assert_eq!(paid.paid_amount, 1000.0);
        assert_eq!(paid.payment_method, "bank");
        assert_eq!(store.get_payment(id).await.unwrap(), Some(paid));

        let unpaid = set_payment_status(
            &store,
            id,
            StatusChange {
                is_paid: false,
                paid_amount: Some(1000.0),
                payment_method: None,
            },
            now(),
        )
        .await
        .unwrap();
        assert_eq!(unpaid.paid_amount, 0.0);
        assert_eq!(unpaid.paid_date, None);
        assert_eq!(store.get_payment(id).await.unwrap(), Some(unpaid));
    }
}
