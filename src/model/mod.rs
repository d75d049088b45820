pub mod advance;
pub mod conversation;
pub mod fine;
pub mod main_category;
pub mod message;
pub mod payroll;
pub mod remark;
pub mod role;
pub mod subcategory;
pub mod user;
pub mod work_log;
