//! ### 26 - Security Commands
pub mod types;

use atat::atat_derive::AtatCmd;
use types::*;

use super::NoResponse;

/// 26.1 SSL/TLS certificates and private keys manager +USECMNG
///
/// Starts the import of a certificate or private key. The module answers with
/// a `>` prompt and then expects exactly `data_size` bytes.
#[derive(Clone, AtatCmd)]
#[at_cmd("+USECMNG=0,", NoResponse, value_sep = false, timeout_ms = 10000)]
pub struct PrepareSecurityDataImport<'a> {
    /// Type of the security data
    #[at_arg(position = 0)]
    pub data_type: SecurityDataType,
    /// Unique identifier of an imported certificate or private key. If an existing name is
    /// used, the data will be overridden. The module accepts up to 200 characters,
    /// the driver limits names to 64.
    #[at_arg(position = 1, len = 64)]
    pub internal_name: &'a str,
    /// Size in bytes of a certificate or private key being imported. The maximum allowed
    /// size is 8192 bytes.
    #[at_arg(position = 2)]
    pub data_size: usize,
}

/// 26.1 SSL/TLS certificates and private keys manager +USECMNG
///
/// Removes an imported certificate or private key.
#[derive(Clone, AtatCmd)]
#[at_cmd("+USECMNG=2,", NoResponse, value_sep = false, timeout_ms = 10000)]
pub struct RemoveSecurityData<'a> {
    #[at_arg(position = 0)]
    pub data_type: SecurityDataType,
    #[at_arg(position = 1, len = 64)]
    pub internal_name: &'a str,
}

#[cfg(test)]
mod test {
    use super::*;
    use atat::AtatCmd;

    #[test]
    fn prepare_import() {
        let cmd = PrepareSecurityDataImport {
            data_type: SecurityDataType::TrustedRootCA,
            internal_name: "AmazonRootCA1",
            data_size: 1188,
        };
        let mut buf = [0u8; <PrepareSecurityDataImport as AtatCmd>::MAX_LEN];
        let len = cmd.write(&mut buf);
        assert_eq!(&buf[..len], b"AT+USECMNG=0,0,\"AmazonRootCA1\",1188\r\n");
    }

    #[test]
    fn remove() {
        let cmd = RemoveSecurityData {
            data_type: SecurityDataType::ClientPrivateKey,
            internal_name: "device",
        };
        let mut buf = [0u8; <RemoveSecurityData as AtatCmd>::MAX_LEN];
        let len = cmd.write(&mut buf);
        assert_eq!(&buf[..len], b"AT+USECMNG=2,2,\"device\"\r\n");
    }
}
