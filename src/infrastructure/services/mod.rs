//! Service layer - cache-aside reads and write invalidation over the
//! repositories

mod account_service;
mod activity_service;
mod payment_service;

pub use account_service::{AccountService, CreateAccountRequest};
pub use activity_service::{ActivityService, LogActivityRequest};
pub use payment_service::{PaymentService, RecordPaymentRequest};
