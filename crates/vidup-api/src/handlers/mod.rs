pub mod form_upload;
pub mod health;
pub mod resumable_upload;
