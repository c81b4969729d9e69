//! Argument and parameter types used by Security Commands and Responses

use atat::atat_derive::AtatEnum;

#[derive(Debug, Clone, Copy, PartialEq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SecurityDataType {
    TrustedRootCA = 0,
    ClientCertificate = 1,
    ClientPrivateKey = 2,
}
