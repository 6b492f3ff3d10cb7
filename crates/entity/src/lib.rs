pub mod attendance;
pub mod department;
pub mod document_type;
pub mod employee;
pub mod employment_history;
pub mod er_document;
pub mod er_document_history;
pub mod er_template;
pub mod hr_process;
pub mod position;
pub mod vacation_request;
