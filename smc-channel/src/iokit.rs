use crate::{
    status::{IO_RETURN_BAD_ARGUMENT, IO_RETURN_NOT_FOUND, IO_RETURN_UNDERRUN, KernError, KernReturn},
    structs::{SMC_PARAM_BLOCK_LEN, SMCParamBlock},
    transport::{RawConnection, Transport},
};
use libc::{mach_error_string, mach_port_t};
use log::debug;
use objc2_io_kit::{
    IOConnectCallStructMethod, IOIteratorNext, IOMainPort, IOObjectRelease, IOServiceClose,
    IOServiceGetMatchingServices, IOServiceMatching, IOServiceOpen,
};
use std::{
    borrow::Cow,
    ffi::{CStr, CString, c_void},
};
use zerocopy::AsBytes;

unsafe extern "C" {
    static mach_task_self_: mach_port_t;
}

fn mach_task_self() -> mach_port_t {
    unsafe { mach_task_self_ }
}

pub fn err_str(error_value: KernReturn) -> Cow<'static, str> {
    unsafe { CStr::from_ptr(mach_error_string(error_value)).to_string_lossy() }
}

/// [`Transport`] backed by the IOKit user-client interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct IoKitTransport;

impl Transport for IoKitTransport {
    fn open(&mut self, service_name: &str) -> Result<RawConnection, KernError> {
        let Ok(name) = CString::new(service_name) else {
            return Err(KernError::from_raw(IO_RETURN_BAD_ARGUMENT));
        };
        unsafe {
            let mut main_port = 0;
            KernError::check(IOMainPort(0, &raw mut main_port))?;
            let matching_dict = IOServiceMatching(name.as_ptr()).and_then(|d| d.downcast().ok());
            let mut iterator = 0;
            KernError::check(IOServiceGetMatchingServices(
                main_port,
                matching_dict,
                &raw mut iterator,
            ))?;
            let device = IOIteratorNext(iterator);
            IOObjectRelease(iterator);
            if device == 0 {
                debug!("no service matches {service_name}");
                return Err(KernError::from_raw(IO_RETURN_NOT_FOUND));
            }
            let mut conn = 0;
            let res = IOServiceOpen(device, mach_task_self(), 0, &raw mut conn);
            IOObjectRelease(device);
            KernError::check(res)?;
            Ok(conn)
        }
    }

    fn close(&mut self, conn: RawConnection) -> Result<(), KernError> {
        KernError::check(IOServiceClose(conn))
    }

    fn call_struct_method(
        &mut self,
        conn: RawConnection,
        selector: u32,
        input: &SMCParamBlock,
        output: &mut SMCParamBlock,
    ) -> Result<(), KernError> {
        let mut output_cnt = SMC_PARAM_BLOCK_LEN;
        let res = unsafe {
            IOConnectCallStructMethod(
                conn,
                selector,
                input.as_bytes().as_ptr() as *const c_void,
                SMC_PARAM_BLOCK_LEN,
                output.as_bytes_mut().as_mut_ptr() as *mut c_void,
                &raw mut output_cnt,
            )
        };
        KernError::check(res)?;
        if output_cnt != SMC_PARAM_BLOCK_LEN {
            debug!("short response: {output_cnt} of {SMC_PARAM_BLOCK_LEN} bytes");
            return Err(KernError::from_raw(IO_RETURN_UNDERRUN));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel::SmcChannel, fourcc::FourCc};

    #[test]
    fn unknown_service_is_not_found() {
        let mut transport = IoKitTransport;
        let err = transport.open("NoSuchSMCService").unwrap_err();
        assert_eq!(err.kind(), crate::status::KernErrorKind::NotFound);
    }

    #[test]
    #[ignore = "the key may not exist"]
    fn basic_example() -> Result<(), Box<dyn std::error::Error>> {
        let mut smc = SmcChannel::open()?;

        let key = FourCc::new(*b"TB0T");
        let info = smc.read_key_info(key)?;
        println!("{info}");

        let value = smc.read(key)?;
        println!("{value}");

        smc.close()?;
        Ok(())
    }
}
