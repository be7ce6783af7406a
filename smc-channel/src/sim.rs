//! An in-process stand-in for the controller and its kernel service.
//!
//! [`SimulatedSmc`] implements [`Transport`] against a key table held in
//! memory. Clones share state, so a test can keep one handle for inspection
//! while a channel owns the other.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::trace;

use crate::{
    config::SMC_SERVICE_NAME,
    fourcc::FourCc,
    status::{
        IO_RETURN_NOT_FOUND, IO_RETURN_NOT_OPEN, IO_RETURN_NOT_PRIVILEGED, IO_RETURN_UNSUPPORTED,
        KernError, SmcResult,
    },
    structs::{Command, KERNEL_INDEX_SMC, SMC_BYTES_LEN, SMCParamBlock},
    transport::{RawConnection, Transport},
};

#[derive(Clone, Debug)]
struct SimKey {
    data_type: FourCc,
    bytes: Vec<u8>,
    writable: bool,
    declared_size: Option<u32>,
}

#[derive(Debug)]
struct SimState {
    service_name: String,
    service_present: bool,
    access_denied: bool,
    selector: u32,
    keys: BTreeMap<FourCc, SimKey>,
    open: BTreeSet<RawConnection>,
    next_conn: RawConnection,
    calls: usize,
    last_request: Option<SMCParamBlock>,
}

impl SimState {
    fn execute(&mut self, request: &SMCParamBlock, response: &mut SMCParamBlock) -> SmcResult {
        let key = request.key();
        let Ok(command) = Command::try_from(request.command) else {
            return SmcResult::BadCommand;
        };
        let Some(entry) = self.keys.get_mut(&key) else {
            return SmcResult::KeyNotFound;
        };
        let size = entry.bytes.len();
        match command {
            Command::ReadKeyInfo => {
                response.data_size = entry.declared_size.unwrap_or(size as u32);
                response.data_type = entry.data_type.to_u32();
            }
            Command::ReadBytes => {
                if request.data_size as usize != size {
                    return SmcResult::KeySizeMismatch;
                }
                response.data = [0; SMC_BYTES_LEN];
                response.data[..size].copy_from_slice(&entry.bytes);
                response.data_type = entry.data_type.to_u32();
            }
            Command::WriteBytes => {
                if !entry.writable {
                    return SmcResult::KeyNotWritable;
                }
                if request.data_size as usize != size {
                    return SmcResult::KeySizeMismatch;
                }
                entry.bytes.copy_from_slice(&request.data[..size]);
            }
        }
        SmcResult::Success
    }
}

/// Simulated controller reachable through the [`Transport`] interface.
#[derive(Clone, Debug)]
pub struct SimulatedSmc {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedSmc {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSmc {
    /// An empty controller registered as `AppleSMC` on selector 2.
    pub fn new() -> Self {
        let state = SimState {
            service_name: SMC_SERVICE_NAME.to_owned(),
            service_present: true,
            access_denied: false,
            selector: KERNEL_INDEX_SMC,
            keys: BTreeMap::new(),
            open: BTreeSet::new(),
            next_conn: 0x2103,
            calls: 0,
            last_request: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A controller with a handful of typical temperature and fan keys.
    pub fn with_default_keys() -> Self {
        Self::new()
            .with_key(FourCc::new(*b"TC0P"), FourCc::new(*b"sp78"), &[0x2f, 0x40])
            .with_key(FourCc::new(*b"TB0T"), FourCc::new(*b"flt "), &29.5f32.to_le_bytes())
            .with_read_only_key(FourCc::new(*b"F0Ac"), FourCc::new(*b"fpe2"), &[0x1f, 0x40])
            .with_key(FourCc::new(*b"F0Md"), FourCc::new(*b"ui8 "), &[0x00])
            .with_key(FourCc::new(*b"F0Tg"), FourCc::new(*b"fpe2"), &[0x1f, 0x40])
            .with_key(FourCc::new(*b"FS! "), FourCc::new(*b"ui16"), &[0x00, 0x00])
            .with_read_only_key(FourCc::new(*b"#KEY"), FourCc::new(*b"ui32"), &[0, 0, 0, 6])
    }

    /// Adds a writable key. Values longer than the data field are truncated.
    pub fn with_key(self, key: FourCc, data_type: FourCc, value: &[u8]) -> Self {
        self.insert(key, data_type, value, true);
        self
    }

    pub fn with_read_only_key(self, key: FourCc, data_type: FourCc, value: &[u8]) -> Self {
        self.insert(key, data_type, value, false);
        self
    }

    /// Adds a read-only key whose key info reports `data_size` whatever it holds.
    pub fn with_declared_size(self, key: FourCc, data_type: FourCc, data_size: u32) -> Self {
        self.insert(key, data_type, &[], false);
        if let Some(entry) = self.lock().keys.get_mut(&key) {
            entry.declared_size = Some(data_size);
        }
        self
    }

    /// Removes the service from the registry so that `open` finds nothing.
    pub fn without_service(self) -> Self {
        self.lock().service_present = false;
        self
    }

    /// Makes `open` fail with a privilege violation.
    pub fn deny_access(self) -> Self {
        self.lock().access_denied = true;
        self
    }

    pub fn with_selector(self, selector: u32) -> Self {
        self.lock().selector = selector;
        self
    }

    /// Number of structured calls attempted so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn open_connections(&self) -> usize {
        self.lock().open.len()
    }

    pub fn last_request(&self) -> Option<SMCParamBlock> {
        self.lock().last_request
    }

    pub fn value(&self, key: FourCc) -> Option<Vec<u8>> {
        self.lock().keys.get(&key).map(|k| k.bytes.clone())
    }

    fn insert(&self, key: FourCc, data_type: FourCc, value: &[u8], writable: bool) {
        let len = value.len().min(SMC_BYTES_LEN);
        let entry = SimKey {
            data_type,
            bytes: value[..len].to_vec(),
            writable,
            declared_size: None,
        };
        self.lock().keys.insert(key, entry);
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for SimulatedSmc {
    fn open(&mut self, service_name: &str) -> Result<RawConnection, KernError> {
        let mut state = self.lock();
        if !state.service_present || state.service_name != service_name {
            return Err(KernError::from_raw(IO_RETURN_NOT_FOUND));
        }
        if state.access_denied {
            return Err(KernError::from_raw(IO_RETURN_NOT_PRIVILEGED));
        }
        let conn = state.next_conn;
        state.next_conn += 1;
        state.open.insert(conn);
        Ok(conn)
    }

    fn close(&mut self, conn: RawConnection) -> Result<(), KernError> {
        if self.lock().open.remove(&conn) {
            Ok(())
        } else {
            Err(KernError::from_raw(IO_RETURN_NOT_OPEN))
        }
    }

    fn call_struct_method(
        &mut self,
        conn: RawConnection,
        selector: u32,
        input: &SMCParamBlock,
        output: &mut SMCParamBlock,
    ) -> Result<(), KernError> {
        let mut state = self.lock();
        state.calls += 1;
        state.last_request = Some(*input);
        if !state.open.contains(&conn) {
            return Err(KernError::from_raw(IO_RETURN_NOT_OPEN));
        }
        if selector != state.selector {
            return Err(KernError::from_raw(IO_RETURN_UNSUPPORTED));
        }
        let mut response = *input;
        let result = state.execute(input, &mut response);
        response.result = result.code();
        trace!("sim {} cmd {} -> {:#04x}", input.key(), input.command, response.result);
        *output = response;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::KernErrorKind;

    fn code(s: &str) -> FourCc {
        s.parse().unwrap()
    }

    #[test]
    fn close_twice_is_an_error() {
        let mut smc = SimulatedSmc::new();
        let conn = smc.open(SMC_SERVICE_NAME).unwrap();
        smc.close(conn).unwrap();
        let err = smc.close(conn).unwrap_err();
        assert_eq!(err.kind(), KernErrorKind::InvalidHandle);
    }

    #[test]
    fn close_never_opened() {
        let mut smc = SimulatedSmc::new();
        assert!(smc.close(0x1234).is_err());
    }

    #[test]
    fn call_on_unknown_connection_fails() {
        let mut smc = SimulatedSmc::with_default_keys();
        let request = SMCParamBlock::key_info_request(code("TC0P"));
        let mut output = SMCParamBlock::default();
        let err = smc.call_struct_method(7, KERNEL_INDEX_SMC, &request, &mut output).unwrap_err();
        assert_eq!(err.kind(), KernErrorKind::InvalidHandle);
        assert_eq!(output, SMCParamBlock::default());
    }

    #[test]
    fn open_failures() {
        let err = SimulatedSmc::new().without_service().open(SMC_SERVICE_NAME).unwrap_err();
        assert_eq!(err.kind(), KernErrorKind::NotFound);
        let err = SimulatedSmc::new().open("AppleSMCFake").unwrap_err();
        assert_eq!(err.kind(), KernErrorKind::NotFound);
        let err = SimulatedSmc::new().deny_access().open(SMC_SERVICE_NAME).unwrap_err();
        assert_eq!(err.kind(), KernErrorKind::PermissionDenied);
    }

    #[test]
    fn connections_are_distinct() {
        let mut smc = SimulatedSmc::new();
        let a = smc.open(SMC_SERVICE_NAME).unwrap();
        let b = smc.open(SMC_SERVICE_NAME).unwrap();
        assert_ne!(a, b);
        assert_eq!(smc.open_connections(), 2);
    }

    #[test]
    fn key_info_and_read() {
        let mut smc = SimulatedSmc::with_default_keys();
        let conn = smc.open(SMC_SERVICE_NAME).unwrap();
        let mut out = SMCParamBlock::default();

        let info = SMCParamBlock::key_info_request(code("TC0P"));
        smc.call_struct_method(conn, KERNEL_INDEX_SMC, &info, &mut out).unwrap();
        assert_eq!(SmcResult::from(out.result), SmcResult::Success);
        assert_eq!(out.data_size, 2);
        assert_eq!(out.data_type(), code("sp78"));

        let read = SMCParamBlock::read_request(code("TC0P"), code("sp78"), 2).unwrap();
        smc.call_struct_method(conn, KERNEL_INDEX_SMC, &read, &mut out).unwrap();
        assert_eq!(out.valid_bytes(), &[0x2f, 0x40]);

        let bad = SMCParamBlock::read_request(code("TC0P"), code("sp78"), 1).unwrap();
        smc.call_struct_method(conn, KERNEL_INDEX_SMC, &bad, &mut out).unwrap();
        assert_eq!(SmcResult::from(out.result), SmcResult::KeySizeMismatch);
    }

    #[test]
    fn declared_size_overrides_key_info() {
        let mut smc = SimulatedSmc::new().with_declared_size(code("HUGE"), code("ch8*"), 40);
        let conn = smc.open(SMC_SERVICE_NAME).unwrap();
        let mut out = SMCParamBlock::default();
        let info = SMCParamBlock::key_info_request(code("HUGE"));
        smc.call_struct_method(conn, KERNEL_INDEX_SMC, &info, &mut out).unwrap();
        assert_eq!(out.data_size, 40);
        assert_eq!(smc.value(code("HUGE")), Some(vec![]));
    }

    #[test]
    fn value_truncated_to_data_field() {
        let smc = SimulatedSmc::new().with_key(code("LONG"), code("ch8*"), &[b'x'; 40]);
        assert_eq!(smc.value(code("LONG")).map(|v| v.len()), Some(SMC_BYTES_LEN));
    }
}
