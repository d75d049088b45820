pub mod advance;
pub mod chat;
pub mod fine;
pub mod main_category;
pub mod payroll;
pub mod remark;
pub mod subcategory;
pub mod user;
pub mod work_log;
