use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::api::accrual::AccrualRun;
use crate::api::department::CreateDepartment;
use crate::api::employee::{BalanceAdjustment, BalanceView, CreateEmployee};
use crate::api::leave_request::{CreateLeave, Decision, LeaveResponse};
use crate::api::leave_type::LeaveTypeInput;
use crate::api::notification::MarkRead;
use crate::api::{EmployeePage, LeavePage};
use crate::leave::overlap::Conflict;
use crate::leave::report::{BalanceTotal, Dashboard, DepartmentTotal, EmployeeTotal, LeaveTypeTotal, ReportFilter};
use crate::model::department::Department;
use crate::model::employee::Employee;
use crate::model::leave_request::{DayPortion, LeaveStatus};
use crate::model::leave_type::LeaveType;
use crate::model::notification::Notification;
use crate::model::role::Role;
use crate::models::{LoginReqDto, TokenPair};

struct SecurityAddon;

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

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Desk API",
        version = "1.0.0",
        description = r#"
## Leave eligibility and balance accounting

### Key Features
- **Leave Requests**
  - Apply for leave, with date-range and overlap checks against pending and approved requests
  - Approve (debits the balance in the same transaction) or reject with a comment
  - Team calendar and upcoming-leave views
- **Leave Types**
  - Annual allocation, monthly accrual and carry-forward cap per type
- **Balances**
  - Per employee and leave type, never negative, with a journal of every change
  - Monthly accrual run and manual admin adjustments
- **Reports**
  - Days per employee, department and leave type, balance totals, dashboard counts, CSV export

### Security
Endpoints under the API prefix require a **JWT Bearer** access token.
Decisions and reports are limited to **ADMIN** and **MANAGER**; catalogue
and balance changes to **ADMIN**.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::leave_calendar,
        crate::api::leave_request::upcoming_leave,

        crate::api::leave_type::list_leave_types,
        crate::api::leave_type::get_leave_type,
        crate::api::leave_type::create_leave_type,
        crate::api::leave_type::update_leave_type,
        crate::api::leave_type::delete_leave_type,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::get_balances,
        crate::api::employee::adjust_balance,

        crate::api::department::list_departments,
        crate::api::department::create_department,

        crate::api::report::employee_report,
        crate::api::report::department_report,
        crate::api::report::leave_type_report,
        crate::api::report::balance_report,
        crate::api::report::dashboard,
        crate::api::report::export_csv,

        crate::api::accrual::run_monthly_accrual,

        crate::api::notification::list_notifications,
        crate::api::notification::mark_as_read
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            CreateLeave,
            Decision,
            LeaveResponse,
            LeavePage,
            LeaveStatus,
            DayPortion,
            Conflict,
            LeaveType,
            LeaveTypeInput,
            CreateEmployee,
            Employee,
            EmployeePage,
            Role,
            BalanceView,
            BalanceAdjustment,
            Department,
            CreateDepartment,
            ReportFilter,
            EmployeeTotal,
            DepartmentTotal,
            LeaveTypeTotal,
            BalanceTotal,
            Dashboard,
            AccrualRun,
            Notification,
            MarkRead
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Leave", description = "Leave requests, decisions and calendar"),
        (name = "LeaveType", description = "Leave type catalogue"),
        (name = "Employee", description = "Employees and their balances"),
        (name = "Department", description = "Departments"),
        (name = "Report", description = "Usage statistics and export"),
        (name = "Accrual", description = "Scheduled balance credits"),
        (name = "Notification", description = "Decision notifications"),
    )
)]
pub struct ApiDoc;
