use std::fmt;

use log::{debug, info, warn};

use crate::{
    config::ChannelConfig,
    error::{Result, SmcError},
    fourcc::FourCc,
    status::SmcResult,
    structs::{KeyInfo, SMC_BYTES_LEN, SMCParamBlock},
    transport::{RawConnection, Transport},
};

/// An open line of communication to the controller.
///
/// The channel owns its kernel connection and releases it exactly once:
/// through [`SmcChannel::close`], or on drop if `close` was never called.
/// Every exchange takes `&mut self`, so one channel never has two requests
/// in flight. Share it between threads behind a lock, or open one channel
/// per thread.
///
/// # Example
///
/// ```
/// use smc_channel::{channel::SmcChannel, config::ChannelConfig, fourcc::FourCc, sim::SimulatedSmc};
///
/// let smc = SimulatedSmc::with_default_keys();
/// let mut channel = SmcChannel::open_with(smc, ChannelConfig::default())?;
///
/// let response = channel.write(FourCc::new(*b"F0Md"), FourCc::new(*b"ui8 "), &[1])?;
/// assert!(response.is_success());
///
/// channel.close()?;
/// # Ok::<(), smc_channel::error::SmcError>(())
/// ```
pub struct SmcChannel<T: Transport> {
    transport: T,
    conn: RawConnection,
    open: bool,
    config: ChannelConfig,
}

#[cfg(target_os = "macos")]
impl SmcChannel<crate::iokit::IoKitTransport> {
    /// Connects to `AppleSMC` through IOKit.
    pub fn open() -> Result<Self> {
        Self::open_with(crate::iokit::IoKitTransport, ChannelConfig::default())
    }
}

impl<T: Transport> SmcChannel<T> {
    /// Resolves the service named in `config` and connects to it.
    ///
    /// On failure no connection exists and nothing needs to be closed.
    pub fn open_with(mut transport: T, config: ChannelConfig) -> Result<Self> {
        if config.service_name.is_empty() || config.service_name.contains('\0') {
            return Err(SmcError::InvalidServiceName(config.service_name));
        }
        let conn = transport.open(&config.service_name).inspect_err(|e| {
            warn!("can not open {}: {e}", config.service_name);
        })?;
        info!("opened {} connection {conn:#x}", config.service_name);
        Ok(Self {
            transport,
            conn,
            open: true,
            config,
        })
    }

    /// Adopts a connection opened elsewhere; the channel will close it.
    pub fn from_raw(transport: T, conn: RawConnection, config: ChannelConfig) -> Self {
        Self {
            transport,
            conn,
            open: true,
            config,
        }
    }

    pub fn raw_connection(&self) -> RawConnection {
        self.conn
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Switches the structured-method selector used by later exchanges.
    pub fn set_selector(&mut self, selector: u32) {
        self.config.selector = selector;
    }

    /// Sends one parameter block and returns the controller's answer.
    ///
    /// This is the single call pattern every operation is built on; callers
    /// may use it directly for commands this type has no method for.
    /// A transport failure is an `Err`. The controller's verdict is in the
    /// returned [`SmcResponse::result`], success or not.
    pub fn exchange(&mut self, request: &SMCParamBlock) -> Result<SmcResponse> {
        let mut output = SMCParamBlock::default();
        self.transport
            .call_struct_method(self.conn, self.config.selector, request, &mut output)
            .inspect_err(|e| debug!("{} cmd {}: {e}", request.key(), request.command))?;
        let response = SmcResponse::new(output);
        debug!(
            "{} cmd {} -> {}",
            request.key(),
            request.command,
            response.result()
        );
        Ok(response)
    }

    /// Writes `data` to `key`, declaring it as `data_type`.
    ///
    /// More than 32 bytes of data is rejected before anything is sent.
    pub fn write(&mut self, key: FourCc, data_type: FourCc, data: &[u8]) -> Result<SmcResponse> {
        let request = SMCParamBlock::write_request(key, data_type, data)?;
        let response = self.exchange(&request)?;
        if !response.is_success() {
            warn!("write to {key} rejected: {}", response.result());
        }
        Ok(response)
    }

    /// Asks the controller for the size and type of `key`.
    pub fn read_key_info(&mut self, key: FourCc) -> Result<SmcResponse> {
        self.exchange(&SMCParamBlock::key_info_request(key))
    }

    /// Reads the current value of `key`.
    ///
    /// Issues a key info request and then a read with the declared size.
    /// If the key info request is refused, that response is returned as is.
    /// A declared size of zero or above 32 bytes ends the read after key info.
    pub fn read(&mut self, key: FourCc) -> Result<SmcResponse> {
        let info = self.read_key_info(key)?;
        let Some(KeyInfo {
            data_size,
            data_type,
        }) = info.key_info()
        else {
            return Ok(info);
        };
        if data_size == 0 {
            return Err(SmcError::EmptyKey(key));
        }
        if data_size as usize > SMC_BYTES_LEN {
            return Err(SmcError::KeyInfoTooLarge { key, data_size });
        }
        let request = SMCParamBlock::read_request(key, data_type, data_size)?;
        let mut response = self.exchange(&request)?;
        if response.is_success() {
            // not every controller echoes size and type on a byte read
            response.block.data_size = data_size;
            response.block.data_type = data_type.to_u32();
        }
        Ok(response)
    }

    /// [`SmcChannel::read`] for a key given as text.
    pub fn read_named(&mut self, key: &str) -> Result<SmcResponse> {
        let key = key.parse::<FourCc>()?;
        self.read(key)
    }

    /// [`SmcChannel::write`] for a key and data type given as text.
    pub fn write_named(&mut self, key: &str, data_type: &str, data: &[u8]) -> Result<SmcResponse> {
        let key = key.parse::<FourCc>()?;
        let data_type = data_type.parse::<FourCc>()?;
        self.write(key, data_type, data)
    }

    /// Releases the connection.
    ///
    /// The connection is given up even if the transport reports an error.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        self.open = false;
        self.transport.close(self.conn)?;
        info!("closed {} connection {:#x}", self.config.service_name, self.conn);
        Ok(())
    }
}

impl<T: Transport> Drop for SmcChannel<T> {
    fn drop(&mut self) {
        if self.open
            && let Err(e) = self.release()
        {
            warn!("closing connection {:#x} on drop: {e}", self.conn);
        }
    }
}

impl<T: Transport> fmt::Debug for SmcChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmcChannel")
            .field("conn", &format_args!("{:#x}", self.conn))
            .field("open", &self.open)
            .field("config", &self.config)
            .finish()
    }
}

/// A parameter block returned by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmcResponse {
    block: SMCParamBlock,
}

impl SmcResponse {
    pub fn new(block: SMCParamBlock) -> Self {
        Self { block }
    }

    pub fn result(&self) -> SmcResult {
        SmcResult::from(self.block.result)
    }

    pub fn is_success(&self) -> bool {
        self.result().is_success()
    }

    pub fn key(&self) -> FourCc {
        self.block.key()
    }

    pub fn data_type(&self) -> FourCc {
        self.block.data_type()
    }

    pub fn data_size(&self) -> u32 {
        self.block.data_size
    }

    /// The valid payload bytes, or `None` if the controller reported a failure.
    pub fn payload(&self) -> Option<&[u8]> {
        self.is_success().then(|| self.block.valid_bytes())
    }

    /// Size and type as declared by a successful response.
    ///
    /// Only a reply to [`crate::structs::Command::ReadKeyInfo`] is guaranteed to carry them.
    pub fn key_info(&self) -> Option<KeyInfo> {
        self.is_success().then(|| KeyInfo {
            data_size: self.block.data_size,
            data_type: self.block.data_type(),
        })
    }

    pub fn block(&self) -> &SMCParamBlock {
        &self.block
    }

    /// Turns a controller failure into [`SmcError::Controller`].
    pub fn into_checked(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SmcError::Controller(self.result()))
        }
    }
}

impl fmt::Display for SmcResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(bytes) = self.payload() else {
            return write!(f, "{} {}", self.key(), self.result());
        };
        write!(
            f,
            "{} {} size: {}(bytes",
            self.key(),
            self.data_type(),
            self.data_size()
        )?;
        for b in bytes {
            write!(f, " {b:02x}")?;
        }
        write!(f, ")")
    }
}
