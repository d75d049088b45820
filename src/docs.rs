use crate::api::advance::{AdvanceSummaryEntry, CreateAdvance, SettleAdvance};
use crate::api::chat::{CreateDm, CreateGroup, GroupAdd, GroupRemove, JoinNote};
use crate::api::fine::{CreateFine, FineSummaryEntry};
use crate::api::main_category::CreateMainCategory;
use crate::api::payroll::{EmployeePeriodEntry, EmployeeSummary, GeneratePayroll, PeriodSummary};
use crate::api::remark::{CreateRemark, UpdateRemark};
use crate::api::subcategory::{CreateSubcategory, ReorderItem, ReorderReq};
use crate::api::user::{AuthResponse, ChangePasswordReq, UpdateProfileReq};
use crate::api::work_log::{CreateDeliveryLog, CreateWorkLog, CurrentSalary};
use crate::model::advance::{AdvanceView, Settlement};
use crate::model::conversation::{ConversationView, LastMessage};
use crate::model::fine::Fine;
use crate::model::main_category::MainCategory;
use crate::model::message::{MessageView, ReplyBrief, ReplySender};
use crate::model::payroll::{Deductions, PayrollView};
use crate::model::remark::Remark;
use crate::model::subcategory::{MainCategoryRef, SubcategoryView};
use crate::model::user::{ChatListEntry, UserBrief, UserView};
use crate::model::work_log::{WorkLogAdminRow, WorkLogView};
use crate::models::{LoginReq, RegisterReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Back Office API",
        version = "1.0.0",
        description = r#"
## Small Business Back Office

This API powers the back office of a small piecework business: employee
accounts, daily work logging, payroll with deductions, and internal chat.

### 🔹 Key Features
- **Accounts**
  - Self-registration with admin approval, profile and password management
- **Work Logs**
  - Piecework, hourly and delivery entries with frozen rates
- **Payroll**
  - Period summaries and payroll generation with advance and fine deductions
- **Advances & Fines**
  - Balances, settlements and per-employee histories
- **Chat**
  - Conversations, groups, recall and read tracking (real-time via /ws)

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Admin-only operations check the role claim.

### 📦 Response Format
- JSON-based RESTful responses

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::user::register,
        crate::api::user::login,
        crate::api::user::get_profile,
        crate::api::user::update_profile,
        crate::api::user::change_password,
        crate::api::user::approve_user,
        crate::api::user::decline_user,
        crate::api::user::pending_users,
        crate::api::user::chat_list,
        crate::api::user::list_all_users,
        crate::api::user::list_employees,
        crate::api::user::get_employee,
        crate::api::user::delete_employee,

        crate::api::main_category::list_main_categories,
        crate::api::main_category::create_main_category,
        crate::api::main_category::delete_main_category,

        crate::api::subcategory::list_subcategories,
        crate::api::subcategory::create_subcategory,
        crate::api::subcategory::update_subcategory,
        crate::api::subcategory::delete_subcategory,
        crate::api::subcategory::reorder_subcategories,

        crate::api::work_log::create_work_log,
        crate::api::work_log::create_delivery_log,
        crate::api::work_log::list_all_work_logs,
        crate::api::work_log::my_work_logs,
        crate::api::work_log::current_salary,
        crate::api::work_log::update_work_log,
        crate::api::work_log::delete_work_log,

        crate::api::payroll::current_period_summary,
        crate::api::payroll::employee_summary,
        crate::api::payroll::generate_payroll,
        crate::api::payroll::payroll_history,

        crate::api::advance::advance_summary,
        crate::api::advance::employee_advances,
        crate::api::advance::get_advance,
        crate::api::advance::create_advance,
        crate::api::advance::settle_advance,
        crate::api::advance::update_settlement,
        crate::api::advance::delete_settlement,
        crate::api::advance::update_advance,
        crate::api::advance::delete_advance,

        crate::api::fine::fine_summary,
        crate::api::fine::employee_fines,
        crate::api::fine::create_fine,
        crate::api::fine::update_fine,
        crate::api::fine::delete_fine,

        crate::api::remark::list_remarks,
        crate::api::remark::create_remark,
        crate::api::remark::update_remark,
        crate::api::remark::delete_remark,

        crate::api::chat::list_conversations,
        crate::api::chat::get_messages,
        crate::api::chat::create_dm,
        crate::api::chat::create_group,
        crate::api::chat::update_group,
        crate::api::chat::group_add,
        crate::api::chat::group_remove,
        crate::api::chat::join_note,
        crate::api::chat::mark_read,
        crate::api::chat::recall_message,
        crate::api::chat::delete_message
    ),
    components(
        schemas(
            RegisterReq,
            LoginReq,
            AuthResponse,
            UpdateProfileReq,
            ChangePasswordReq,
            UserView,
            UserBrief,
            ChatListEntry,
            MainCategory,
            CreateMainCategory,
            MainCategoryRef,
            SubcategoryView,
            CreateSubcategory,
            ReorderItem,
            ReorderReq,
            WorkLogView,
            WorkLogAdminRow,
            CreateWorkLog,
            CreateDeliveryLog,
            CurrentSalary,
            EmployeePeriodEntry,
            PeriodSummary,
            EmployeeSummary,
            GeneratePayroll,
            Deductions,
            PayrollView,
            CreateAdvance,
            SettleAdvance,
            AdvanceSummaryEntry,
            Settlement,
            AdvanceView,
            CreateFine,
            FineSummaryEntry,
            Fine,
            CreateRemark,
            UpdateRemark,
            Remark,
            CreateDm,
            CreateGroup,
            GroupAdd,
            GroupRemove,
            JoinNote,
            LastMessage,
            ConversationView,
            ReplySender,
            ReplyBrief,
            MessageView
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Accounts, approval and profiles"),
        (name = "Categories", description = "Rate table management APIs"),
        (name = "WorkLogs", description = "Work and delivery logging APIs"),
        (name = "Payroll", description = "Salary summaries and payroll generation"),
        (name = "Advances", description = "Advance and settlement APIs"),
        (name = "Fines", description = "Fine management APIs"),
        (name = "Remarks", description = "Employee remark APIs"),
        (name = "Chat", description = "Conversation and message APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
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
}
