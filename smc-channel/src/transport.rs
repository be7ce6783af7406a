//! The privileged call boundary.
//!
//! A [`Transport`] resolves the controller's kernel service, hands out raw
//! connections and performs the blocking structured call. Connections are
//! plain integers at this level: nothing stops a caller from closing one
//! twice or using it after close, and implementations must report both as
//! transport errors. [`crate::channel::SmcChannel`] adds ownership on top.

use crate::{status::KernError, structs::SMCParamBlock};

/// Kernel-issued connection identifier (`io_connect_t`).
pub type RawConnection = u32;

pub trait Transport {
    /// Looks up the service registered under `service_name` and connects to it.
    fn open(&mut self, service_name: &str) -> Result<RawConnection, KernError>;

    /// Releases a connection obtained from [`Transport::open`].
    fn close(&mut self, conn: RawConnection) -> Result<(), KernError>;

    /// Calls structured method `selector` with `input` and fills `output`.
    ///
    /// Both buffers are exactly one parameter block. Blocks until the
    /// controller answers or the transport fails; `output` is only
    /// meaningful on `Ok`.
    fn call_struct_method(
        &mut self,
        conn: RawConnection,
        selector: u32,
        input: &SMCParamBlock,
        output: &mut SMCParamBlock,
    ) -> Result<(), KernError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self, service_name: &str) -> Result<RawConnection, KernError> {
        (**self).open(service_name)
    }

    fn close(&mut self, conn: RawConnection) -> Result<(), KernError> {
        (**self).close(conn)
    }

    fn call_struct_method(
        &mut self,
        conn: RawConnection,
        selector: u32,
        input: &SMCParamBlock,
        output: &mut SMCParamBlock,
    ) -> Result<(), KernError> {
        (**self).call_struct_method(conn, selector, input, output)
    }
}
