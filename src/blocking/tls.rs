//! Provisioning of TLS root certificates, client certificates and keys.
use heapless::Vec;

use super::modem::{Modem, DEFAULT_PROMPT_TIMEOUT};
use crate::{
    command::security::{types::SecurityDataType, PrepareSecurityDataImport, RemoveSecurityData},
    config::{ModemConfig, Transport},
    error::Error,
};

pub const MAX_SECURITY_DATA: usize = 4;
/// Longest internal name the import and remove commands are rendered with.
pub const MAX_NAME_LEN: usize = 64;

/// One certificate or key to install. Empty `data` removes `name` instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecurityData<'a> {
    pub data_type: SecurityDataType,
    pub name: &'a str,
    pub data: &'a [u8],
}

impl<'a> SecurityData<'a> {
    pub const fn new(data_type: SecurityDataType, name: &'a str, data: &'a [u8]) -> Self {
        Self {
            data_type,
            name,
            data,
        }
    }

    pub const fn remove(data_type: SecurityDataType, name: &'a str) -> Self {
        Self::new(data_type, name, &[])
    }

    pub fn is_removal(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    LoadNext,
    AwaitUploadResponse,
    AwaitRemoveResponse,
    Done,
}

/// Installs a list of `SecurityData` one command at a time.
///
/// `ready` has to be called until the loader reports done; every call does
/// at most one step and never sends while the modem still has a command
/// outstanding. Once done, `ready` just reports the modem's outcome, so the
/// owner can keep polling it the same way for its own traffic.
pub struct CertificateLoader<'a, const M: usize = MAX_SECURITY_DATA> {
    items: Vec<SecurityData<'a>, M>,
    index: usize,
    phase: Phase,
}

impl<'a, const M: usize> Default for CertificateLoader<'a, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const M: usize> CertificateLoader<'a, M> {
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            index: 0,
            phase: Phase::LoadNext,
        }
    }

    pub fn add(&mut self, item: SecurityData<'a>) -> Result<(), Error> {
        if item.name.len() > MAX_NAME_LEN {
            error!("Security data name too long: {:?}", item.name);
            return Err(Error::Overflow);
        }
        self.items.push(item).map_err(|_| Error::Overflow)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Start over from the first item, e.g. before a new connection.
    pub fn restart(&mut self) {
        self.index = 0;
        self.phase = Phase::LoadNext;
    }

    pub fn ready<T, C, const N: usize>(
        &mut self,
        modem: &mut Modem<'_, T, C, N>,
    ) -> nb::Result<(), Error>
    where
        T: Transport,
        C: ModemConfig,
    {
        let ready = modem.ready();

        match self.phase {
            Phase::Done => ready.into_nb(),
            _ if ready.is_pending() => Err(nb::Error::WouldBlock),
            Phase::LoadNext => {
                let Some(item) = self.items.get(self.index).copied() else {
                    self.phase = Phase::Done;
                    return Err(nb::Error::WouldBlock);
                };

                if item.is_removal() {
                    debug!("Removing security data {:?}", item.name);
                    modem.send_cmd(&RemoveSecurityData {
                        data_type: item.data_type,
                        internal_name: item.name,
                    })?;
                    self.phase = Phase::AwaitRemoveResponse;
                } else {
                    debug!(
                        "Importing security data {:?} ({} bytes)",
                        item.name,
                        item.data.len()
                    );
                    modem.send_cmd(&PrepareSecurityDataImport {
                        data_type: item.data_type,
                        internal_name: item.name,
                        data_size: item.data.len(),
                    })?;
                    modem.wait_for_prompt(DEFAULT_PROMPT_TIMEOUT)?;
                    modem.write(item.data);
                    self.phase = Phase::AwaitUploadResponse;
                }
                Err(nb::Error::WouldBlock)
            }
            Phase::AwaitUploadResponse => {
                if let Some(Err(e)) = ready.into_result() {
                    error!("Failed to import security data: {:?}", e);
                    return Err(nb::Error::Other(e));
                }
                self.advance();
                Err(nb::Error::WouldBlock)
            }
            Phase::AwaitRemoveResponse => {
                // The item may never have been installed.
                self.advance();
                Err(nb::Error::WouldBlock)
            }
        }
    }

    fn advance(&mut self) {
        self.index += 1;
        self.phase = if self.index >= self.items.len() {
            debug!("All security data loaded");
            Phase::Done
        } else {
            Phase::LoadNext
        };
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::digest::ResultCode;
    use crate::test_helpers::{setup_modem, TestModem};

    const CA: &[u8] = b"CERTDATA";

    /// Drive the loader until it is done, returning how many steps it took.
    fn run(loader: &mut CertificateLoader<'_>, modem: &mut TestModem<'_>) -> usize {
        let mut steps = 0;
        while !loader.is_done() {
            assert_eq!(loader.ready(modem), Err(nb::Error::WouldBlock));
            steps += 1;
            assert!(steps < 100);
        }
        steps
    }

    #[test]
    fn imports_and_removes_in_order() {
        let (mut modem, link) = setup_modem();
        link.expect(b"AT+USECMNG=0,0,\"ca\",8\r\n", b"\r\n>")
            .expect(CA, b"\r\nOK\r\n")
            .expect(b"AT+USECMNG=2,1,\"old\"\r\n", b"\r\n+CME ERROR: 2\r\n");

        let mut loader: CertificateLoader<'_> = CertificateLoader::new();
        loader
            .add(SecurityData::new(SecurityDataType::TrustedRootCA, "ca", CA))
            .unwrap();
        loader
            .add(SecurityData::remove(SecurityDataType::ClientCertificate, "old"))
            .unwrap();

        // One send and one completion per item.
        assert_eq!(run(&mut loader, &mut modem), 4);
        assert!(link.script_done());
        assert_eq!(
            link.tx(),
            "AT+USECMNG=0,0,\"ca\",8\r\nCERTDATAAT+USECMNG=2,1,\"old\"\r\n"
        );
    }

    #[test]
    fn delegates_to_modem_when_done() {
        let (mut modem, link) = setup_modem();
        link.expect(b"AT+USECMNG=2,0,\"ca\"\r\n", b"\r\nERROR\r\n")
            .expect(b"AT+CSQ\r\n", b"\r\n+CSQ: 12,99\r\n");

        let mut loader: CertificateLoader<'_> = CertificateLoader::new();
        loader
            .add(SecurityData::remove(SecurityDataType::TrustedRootCA, "ca"))
            .unwrap();
        run(&mut loader, &mut modem);

        modem.send("AT+CSQ");
        assert_eq!(loader.ready(&mut modem), Err(nb::Error::WouldBlock));
        link.feed(b"\r\nOK\r\n");
        assert_eq!(loader.ready(&mut modem), Ok(()));
        assert_eq!(modem.ready(), ResultCode::Ok);
    }

    #[test]
    fn failed_import_is_reported_until_restart() {
        let (mut modem, link) = setup_modem();
        link.expect(b"AT+USECMNG=0,2,\"key\",8\r\n", b"\r\n>")
            .expect(CA, b"\r\n+CME ERROR: 1\r\n");

        let mut loader: CertificateLoader<'_> = CertificateLoader::new();
        loader
            .add(SecurityData::new(SecurityDataType::ClientPrivateKey, "key", CA))
            .unwrap();

        assert_eq!(loader.ready(&mut modem), Err(nb::Error::WouldBlock));
        assert_eq!(
            loader.ready(&mut modem),
            Err(nb::Error::Other(Error::CmeError))
        );
        assert_eq!(
            loader.ready(&mut modem),
            Err(nb::Error::Other(Error::CmeError))
        );
        assert!(!loader.is_done());

        link.expect(b"AT+USECMNG=0,2,\"key\",8\r\n", b"\r\n>")
            .expect(CA, b"\r\nOK\r\n");
        loader.restart();
        assert_eq!(run(&mut loader, &mut modem), 2);
    }

    #[test]
    fn refused_prompt_is_an_error() {
        let (mut modem, link) = setup_modem();
        link.expect(b"AT+USECMNG=0,0,\"ca\",8\r\n", b"\r\nERROR\r\n");

        let mut loader: CertificateLoader<'_> = CertificateLoader::new();
        loader
            .add(SecurityData::new(SecurityDataType::TrustedRootCA, "ca", CA))
            .unwrap();

        assert_eq!(loader.ready(&mut modem), Err(nb::Error::Other(Error::Error)));
        assert!(!link.tx().contains("CERTDATA"));
    }

    #[test]
    fn empty_loader_is_done_after_one_step() {
        let (mut modem, _link) = setup_modem();
        let mut loader: CertificateLoader<'_> = CertificateLoader::new();

        assert_eq!(run(&mut loader, &mut modem), 1);
        assert_eq!(loader.ready(&mut modem), Ok(()));
    }

    #[test]
    fn list_is_bounded() {
        let mut loader: CertificateLoader<'_, 2> = CertificateLoader::new();
        let item = SecurityData::new(SecurityDataType::TrustedRootCA, "ca", CA);

        assert_eq!(loader.add(item), Ok(()));
        assert_eq!(loader.add(item), Ok(()));
        assert_eq!(loader.add(item), Err(Error::Overflow));

        let long = "n".repeat(MAX_NAME_LEN + 1);
        let mut loader: CertificateLoader<'_> = CertificateLoader::new();
        assert_eq!(
            loader.add(SecurityData::remove(SecurityDataType::TrustedRootCA, &long)),
            Err(Error::Overflow)
        );
    }
}
