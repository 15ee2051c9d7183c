use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::ServiceError,
    model::{
        member::Member,
        tax_payment::{LedgerFilter, PaymentMethod, TaxPayment},
        tax_rate::TaxRate,
    },
    store::Store,
    tax::{
        generator, ledger,
        ledger::StatusChange,
        rates::{self, RateUpdate},
        report::{self, ExportReport, MemberTaxDetail},
        require_year,
        summary::{self, TaxSummary},
        validate_year,
    },
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateReq {
    #[schema(example = 1000.0)]
    pub adult_tax: Option<f64>,
    #[schema(example = 500.0)]
    pub child_tax: Option<f64>,
    #[schema(example = 18)]
    pub adult_age_threshold: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdateReq {
    pub is_paid: bool,
    /// Defaults to the due amount when marking paid
    pub paid_amount: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[schema(example = "Tax payments generated for 2024")]
    pub message: String,
    pub new_payments: u64,
    pub existing_payments: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerQuery {
    pub year: Option<i32>,
    pub family_id: Option<String>,
}

impl LedgerQuery {
    fn year_filter(&self) -> Result<LedgerFilter, ServiceError> {
        let year = require_year(self.year)?;
        Ok(LedgerFilter::new(Some(year), self.family_id.as_deref()))
    }

    fn all_years_filter(&self) -> LedgerFilter {
        LedgerFilter::new(None, self.family_id.as_deref())
    }
}

/// Get tax rates for a year
#[utoipa::path(
    get,
    path = "/api/tax/rates/{year}",
    params(("year", Path, description = "Tax year (2000-2100)")),
    responses(
        (status = 200, description = "Rate row, created with defaults when missing", body = TaxRate),
        (status = 400, description = "Year out of range")
    ),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn get_rates(
    store: web::Data<dyn Store>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let year = validate_year(path.into_inner())?;
    let rate = rates::get_rates(store.get_ref(), year).await?;
    Ok(HttpResponse::Ok().json(rate))
}

/// Set tax rates for a year
///
/// Existing assessments of the year are re-priced after the rates are saved.
#[utoipa::path(
    put,
    path = "/api/tax/rates/{year}",
    params(("year", Path, description = "Tax year (2000-2100)")),
    request_body = RateReq,
    responses(
        (status = 200, description = "Rates saved", body = TaxRate),
        (status = 400, description = "Invalid rate values", body = Object, example = json!({
            "error": "adultTax must be greater than 0",
            "code": "validation_error"
        }))
    ),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
#[instrument(name = "tax_set_rates", skip(auth, store, config, body), fields(admin = %auth.username))]
pub async fn set_rates(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    path: web::Path<i32>,
    body: web::Json<RateReq>,
) -> Result<HttpResponse, ServiceError> {
    let year = validate_year(path.into_inner())?;
    let update = RateUpdate::new(body.adult_tax, body.child_tax, body.adult_age_threshold)?;

    let rate = rates::set_rates(
        store.get_ref(),
        year,
        update,
        config.regeneration_policy,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(rate))
}

/// Generate assessments for every member not yet assessed in the year
#[utoipa::path(
    post,
    path = "/api/tax/generate/{year}",
    params(("year", Path, description = "Tax year (2000-2100)")),
    responses(
        (status = 200, description = "Generation counts", body = GenerateResponse)
    ),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
#[instrument(name = "tax_generate", skip(auth, store, config), fields(admin = %auth.username))]
pub async fn generate(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ServiceError> {
    let year = validate_year(path.into_inner())?;
    let outcome = generator::generate(
        store.get_ref(),
        year,
        Utc::now().date_naive(),
        config.generation_batch_size,
    )
    .await?;

    Ok(HttpResponse::Ok().json(GenerateResponse {
        message: format!("Tax payments generated for {year}"),
        new_payments: outcome.new_payments,
        existing_payments: outcome.existing_payments,
    }))
}

/// Mark an assessment paid or unpaid
#[utoipa::path(
    put,
    path = "/api/tax/payment/{payment_id}",
    params(("payment_id", Path, description = "Assessment ID")),
    request_body = PaymentUpdateReq,
    responses(
        (status = 200, description = "Updated assessment", body = TaxPayment),
        (status = 404, description = "Payment record not found")
    ),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
#[instrument(name = "tax_update_payment", skip(auth, store, body), fields(admin_id = auth.admin_id))]
pub async fn update_payment(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    body: web::Json<PaymentUpdateReq>,
) -> Result<HttpResponse, ServiceError> {
    let change = StatusChange {
        is_paid: body.is_paid,
        paid_amount: body.paid_amount,
        payment_method: body.payment_method,
    };

    let payment =
        ledger::set_payment_status(store.get_ref(), path.into_inner(), change, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

/// Collection summary for one year
#[utoipa::path(
    get,
    path = "/api/tax/summary",
    params(
        ("year", Query, description = "Tax year"),
        ("familyId", Query, description = "Family filter; `all` or empty selects every family")
    ),
    responses((status = 200, description = "Year summary", body = TaxSummary)),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn year_summary(
    store: web::Data<dyn Store>,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse, ServiceError> {
    let filter = query.year_filter()?;
    let payments = store.list_payments(&filter).await?;
    let year = filter.year.unwrap_or_default();
    Ok(HttpResponse::Ok().json(summary::summarize(year, &payments)))
}

/// Collection summaries for every assessed year, newest first
#[utoipa::path(
    get,
    path = "/api/tax/summary/all-years",
    params(("familyId", Query, description = "Family filter")),
    responses((status = 200, description = "Yearly summaries", body = [TaxSummary])),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn all_years_summary(
    store: web::Data<dyn Store>,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse, ServiceError> {
    let payments = store.list_payments(&query.all_years_filter()).await?;
    Ok(HttpResponse::Ok().json(summary::summarize_by_year(&payments)))
}

/// Assessments of one year joined with member details
#[utoipa::path(
    get,
    path = "/api/tax/details",
    params(
        ("year", Query, description = "Tax year"),
        ("familyId", Query, description = "Family filter")
    ),
    responses((status = 200, description = "Detail rows", body = [MemberTaxDetail])),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn details(
    store: web::Data<dyn Store>,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse, ServiceError> {
    let filter = query.year_filter()?;
    let rows = report::load_details(store.get_ref(), &filter, Utc::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/tax/details/all-years",
    params(("familyId", Query, description = "Family filter")),
    responses((status = 200, description = "Detail rows across years", body = [MemberTaxDetail])),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn all_years_details(
    store: web::Data<dyn Store>,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse, ServiceError> {
    let filter = query.all_years_filter();
    let rows = report::load_details(store.get_ref(), &filter, Utc::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Spreadsheet-ready rows for one year
#[utoipa::path(
    get,
    path = "/api/tax/export",
    params(
        ("year", Query, description = "Tax year"),
        ("familyId", Query, description = "Family filter")
    ),
    responses((status = 200, description = "Export report", body = ExportReport)),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn export(
    store: web::Data<dyn Store>,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse, ServiceError> {
    let filter = query.year_filter()?;
    let report = report::load_export(store.get_ref(), &filter, Utc::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    get,
    path = "/api/tax/export/all-years",
    params(("familyId", Query, description = "Family filter")),
    responses((status = 200, description = "Export report across years", body = ExportReport)),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn all_years_export(
    store: web::Data<dyn Store>,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse, ServiceError> {
    let filter = query.all_years_filter();
    let report = report::load_export(store.get_ref(), &filter, Utc::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// A member's assessment for one year
#[utoipa::path(
    get,
    path = "/api/tax/members/{member_id}/payment",
    params(
        ("member_id", Path, description = "Member ID"),
        ("year", Query, description = "Tax year")
    ),
    responses(
        (status = 200, description = "Assessment", body = TaxPayment),
        (status = 404, description = "Payment record not found")
    ),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn member_payment(
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse, ServiceError> {
    let year = require_year(query.year)?;
    let payment = store
        .find_payment(path.into_inner(), year)
        .await?
        .ok_or(ServiceError::NotFound("Payment record"))?;
    Ok(HttpResponse::Ok().json(payment))
}

#[utoipa::path(
    get,
    path = "/api/tax/family-heads",
    responses((status = 200, description = "Heads of family", body = [Member])),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn family_heads(store: web::Data<dyn Store>) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(store.list_family_heads().await?))
}

/// Years that have at least one assessment, newest first
#[utoipa::path(
    get,
    path = "/api/tax/years",
    responses((status = 200, description = "Assessed years", body = [i32], example = json!([2024, 2023]))),
    tag = "Tax",
    security(("bearer_auth" = []))
)]
pub async fn years(store: web::Data<dyn Store>) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(store.payment_years().await?))
}
