use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};
use smc_channel::{
    channel::SmcChannel,
    config::ChannelConfig,
    fourcc::FourCc,
    sim::SimulatedSmc,
    structs::{KeyInfo, SMC_BYTES_LEN},
    transport::Transport,
};

use crate::command::{CliArgs, Commands};

/// Keys tried by `scan` when none are given.
pub const SCAN_KEYS: [&str; 3] = ["F0Md", "F0Tg", "FS! "];

pub fn run(args: &CliArgs) -> Result<()> {
    let config = ChannelConfig::default()
        .with_service_name(args.service.as_str())
        .with_selector(args.selector);
    if args.simulate {
        info!("using the simulated controller");
        return with_channel(SimulatedSmc::with_default_keys(), config, &args.command);
    }
    run_hardware(config, &args.command)
}

#[cfg(target_os = "macos")]
fn run_hardware(config: ChannelConfig, command: &Commands) -> Result<()> {
    with_channel(smc_channel::iokit::IoKitTransport, config, command)
}

#[cfg(not(target_os = "macos"))]
fn run_hardware(_config: ChannelConfig, _command: &Commands) -> Result<()> {
    bail!("the SMC is only reachable on macOS, use --simulate")
}

/// Opens a channel, runs `command` on it and closes it whatever the outcome.
pub fn with_channel<T: Transport>(
    transport: T,
    config: ChannelConfig,
    command: &Commands,
) -> Result<()> {
    let service = config.service_name.clone();
    let mut channel = SmcChannel::open_with(transport, config)
        .with_context(|| format!("can not open {service}"))?;
    let res = match command {
        Commands::Scan { keys, selectors } => scan(&mut channel, keys, selectors),
        Commands::Read { key } => read(&mut channel, key),
        Commands::Write {
            key,
            value,
            data_type,
        } => write(&mut channel, key, value, data_type.as_deref()),
    };
    let closed = channel.close().context("can not close the SMC connection");
    match (res, closed) {
        (Err(e), Err(close_err)) => {
            warn!("{close_err:#}");
            Err(e)
        }
        (res, closed) => res.and(closed),
    }
}

fn parse_key(key: &str) -> Result<FourCc> {
    key.parse::<FourCc>().with_context(|| format!("invalid key {key:?}"))
}

pub fn scan<T: Transport>(
    channel: &mut SmcChannel<T>,
    keys: &[String],
    selectors: &[u32],
) -> Result<()> {
    let keys: Vec<&str> = if keys.is_empty() {
        SCAN_KEYS.to_vec()
    } else {
        keys.iter().map(String::as_str).collect()
    };
    let selectors = if selectors.is_empty() {
        vec![channel.config().selector]
    } else {
        selectors.to_vec()
    };
    for selector in selectors {
        channel.set_selector(selector);
        for key in &keys {
            println!("[*] Testing key {key:?} on selector {selector}...");
            match channel.read_named(key) {
                Ok(response) if response.is_success() => println!("[+] {response}"),
                Ok(response) => println!("[-] {key}: {}", response.result()),
                Err(e) => eprintln!("[!] {key}: {e}"),
            }
        }
    }
    Ok(())
}

pub fn read<T: Transport>(channel: &mut SmcChannel<T>, key: &str) -> Result<()> {
    let response = channel
        .read_named(key)
        .with_context(|| format!("can not read {key:?}"))?;
    if !response.is_success() {
        bail!("{key}: {}", response.result());
    }
    println!("{response}");
    Ok(())
}

pub fn write<T: Transport>(
    channel: &mut SmcChannel<T>,
    key: &str,
    value: &str,
    data_type: Option<&str>,
) -> Result<()> {
    let key = parse_key(key)?;
    let value = parse_hex(value)?;
    let data_type = match data_type {
        Some(t) => t
            .parse::<FourCc>()
            .with_context(|| format!("invalid data type {t:?}"))?,
        None => {
            let KeyInfo {
                data_size,
                data_type,
            } = channel
                .read_key_info(key)?
                .into_checked()?
                .key_info()
                .ok_or_else(|| anyhow!("{key}: no key info"))?;
            if data_size as usize != value.len() {
                bail!("{key} holds {data_size} bytes, value has {}", value.len());
            }
            data_type
        }
    };
    channel
        .write(key, data_type, &value)?
        .into_checked()
        .with_context(|| format!("can not write {key}"))?;
    println!("{key} {data_type} <- {}", hex(&value));
    Ok(())
}

/// Parses a string of hex digit pairs such as `031000`.
pub fn parse_hex(value: &str) -> Result<Vec<u8>> {
    if !value.is_ascii() {
        bail!("Value should be ascii!");
    }
    let (chunks, other) = value.as_bytes().as_chunks::<2>();
    if !other.is_empty() {
        bail!("Invalid value!");
    }
    if chunks.len() > SMC_BYTES_LEN {
        bail!("value is too long!");
    }
    chunks
        .iter()
        .map(|b| {
            std::str::from_utf8(b)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| anyhow!("can not parse {} as hex", String::from_utf8_lossy(b)))
        })
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smc_channel::{
        error::SmcError, status::KernError, structs::SMCParamBlock, transport::RawConnection,
    };

    fn code(s: &str) -> FourCc {
        s.parse().unwrap()
    }

    #[test]
    fn hex_values() {
        assert_eq!(parse_hex("031000").unwrap(), vec![0x03, 0x10, 0x00]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex("031").is_err());
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex(&"00".repeat(SMC_BYTES_LEN + 1)).is_err());
    }

    #[test]
    fn write_takes_type_from_key_info() {
        let smc = SimulatedSmc::with_default_keys();
        let command = Commands::Write {
            key: "F0Tg".into(),
            value: "1770".into(),
            data_type: None,
        };
        with_channel(smc.clone(), ChannelConfig::default(), &command).unwrap();
        assert_eq!(smc.value(code("F0Tg")), Some(vec![0x17, 0x70]));
        assert_eq!(smc.open_connections(), 0);
    }

    #[test]
    fn write_size_checked_against_key() {
        let smc = SimulatedSmc::with_default_keys();
        let command = Commands::Write {
            key: "F0Md".into(),
            value: "0101".into(),
            data_type: None,
        };
        assert!(with_channel(smc.clone(), ChannelConfig::default(), &command).is_err());
        assert_eq!(smc.value(code("F0Md")), Some(vec![0x00]));
        assert_eq!(smc.open_connections(), 0);
    }

    #[test]
    fn read_unknown_key_fails() {
        let smc = SimulatedSmc::with_default_keys();
        let command = Commands::Read { key: "ZZZZ".into() };
        let err = with_channel(smc.clone(), ChannelConfig::default(), &command).unwrap_err();
        assert!(err.to_string().contains("key not found"));
        assert_eq!(smc.open_connections(), 0);
    }

    #[test]
    fn scan_survives_bad_keys() {
        let smc = SimulatedSmc::with_default_keys();
        let command = Commands::Scan {
            keys: vec!["F0Md".into(), "bad".into(), "ZZZZ".into()],
            selectors: vec![],
        };
        with_channel(smc.clone(), ChannelConfig::default(), &command).unwrap();
        assert_eq!(smc.open_connections(), 0);
    }

    #[test]
    fn missing_service() {
        let smc = SimulatedSmc::with_default_keys().without_service();
        let command = Commands::Scan {
            keys: vec![],
            selectors: vec![],
        };
        assert!(with_channel(smc, ChannelConfig::default(), &command).is_err());
    }

    #[test]
    fn scan_tries_every_selector() {
        let smc = SimulatedSmc::with_default_keys().with_selector(2);
        let command = Commands::Scan {
            keys: vec!["F0Md".into()],
            selectors: vec![1, 2],
        };
        with_channel(smc.clone(), ChannelConfig::default().with_selector(1), &command).unwrap();
        // selector 1 fails at transport level on key info, selector 2 does key info and read
        assert_eq!(smc.calls(), 3);
        assert_eq!(smc.open_connections(), 0);
    }

    #[test]
    fn invalid_key_reported_with_name() {
        let smc = SimulatedSmc::with_default_keys();
        let command = Commands::Read { key: "F0M".into() };
        let err = with_channel(smc.clone(), ChannelConfig::default(), &command).unwrap_err();
        assert!(err.to_string().contains("\"F0M\""));
        assert!(matches!(
            err.downcast_ref::<SmcError>(),
            Some(SmcError::InvalidCode(_))
        ));
        assert_eq!(smc.calls(), 0);
    }

    #[test]
    fn command_error_kept_when_close_also_fails() {
        let smc = SimulatedSmc::with_default_keys();
        let command = Commands::Read { key: "ZZZZ".into() };
        let transport = ClosingTwice(smc.clone());
        let err = with_channel(transport, ChannelConfig::default(), &command).unwrap_err();
        assert!(err.to_string().contains("key not found"));
        assert!(!err.to_string().contains("close"));
        assert_eq!(smc.open_connections(), 0);
    }

    /// Releases the connection, then reports the close as failed.
    struct ClosingTwice(SimulatedSmc);

    impl Transport for ClosingTwice {
        fn open(&mut self, service_name: &str) -> Result<RawConnection, KernError> {
            self.0.open(service_name)
        }

        fn close(&mut self, conn: RawConnection) -> Result<(), KernError> {
            self.0.close(conn)?;
            self.0.close(conn)
        }

        fn call_struct_method(
            &mut self,
            conn: RawConnection,
            selector: u32,
            input: &SMCParamBlock,
            output: &mut SMCParamBlock,
        ) -> Result<(), KernError> {
            self.0.call_struct_method(conn, selector, input, output)
        }
    }
}
