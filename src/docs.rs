use crate::api::{
    expense::{CreateExpense, ExpenseListResponse},
    income::CreateIncome,
    ledger::Balance,
    tax::{GenerateResponse, PaymentUpdateReq, RateReq},
};
use crate::model::{
    expense::Expense,
    income::Income,
    member::Member,
    tax_payment::{PaymentMethod, TaxPayment},
    tax_rate::TaxRate,
};
use crate::registry::MemberInput;
use crate::tax::{
    report::{ExportReport, ExportRow, MemberTaxDetail},
    summary::TaxSummary,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parish Management API",
        version = "1.0.0",
        description = r#"
## Parish Management System

Back office for a parish: member register, family grouping and the yearly
per-member dues ("tax") with its payment ledger and reports.

### Key Features
- **Members**
  - Register heads of family and their dependents; family ids are allocated automatically
- **Tax**
  - Per-year rates, assessment generation, payment status, summaries and exports
- **Income & Expense**
  - Donations, expenses with bills, and the running balance

### Security
All `/api` endpoints require a **JWT Bearer** access token obtained from `/auth/login`.
"#,
    ),
    paths(
        crate::api::tax::get_rates,
        crate::api::tax::set_rates,
        crate::api::tax::generate,
        crate::api::tax::update_payment,
        crate::api::tax::year_summary,
        crate::api::tax::all_years_summary,
        crate::api::tax::details,
        crate::api::tax::all_years_details,
        crate::api::tax::export,
        crate::api::tax::all_years_export,
        crate::api::tax::member_payment,
        crate::api::tax::family_heads,
        crate::api::tax::years,

        crate::api::member::create_member,
        crate::api::member::list_members,
        crate::api::member::list_heads,
        crate::api::member::family_members,
        crate::api::member::get_member,
        crate::api::member::update_member,
        crate::api::member::delete_member,

        crate::api::income::list_incomes,
        crate::api::income::create_income,

        crate::api::expense::list_expenses,
        crate::api::expense::create_expense,
        crate::api::expense::get_expense,
        crate::api::expense::update_expense,
        crate::api::expense::delete_expense,

        crate::api::ledger::balance
    ),
    components(
        schemas(
            Member,
            MemberInput,
            TaxRate,
            RateReq,
            TaxPayment,
            PaymentMethod,
            PaymentUpdateReq,
            GenerateResponse,
            TaxSummary,
            MemberTaxDetail,
            ExportRow,
            ExportReport,
            Income,
            CreateIncome,
            Expense,
            CreateExpense,
            ExpenseListResponse,
            Balance
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Tax", description = "Rates, assessments, payments and reports"),
        (name = "Member", description = "Member register and families"),
        (name = "Income", description = "Donations and other income"),
        (name = "Expense", description = "Parish expenses"),
        (name = "Ledger", description = "Income and expense balance"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
