pub mod modem;
pub mod sms;
pub mod timer;
pub mod tls;

pub use modem::Modem;
pub use sms::Sms;
pub use tls::{CertificateLoader, SecurityData};
