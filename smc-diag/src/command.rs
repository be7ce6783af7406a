use clap::{Parser, Subcommand};
use smc_channel::{config::SMC_SERVICE_NAME, structs::KERNEL_INDEX_SMC};

#[derive(Parser)]
#[command(
    name = "smc-diag",
    version,
    about = "Exchange raw parameter blocks with the Apple System Management Controller (SMC)"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    /// Talk to a simulated controller instead of the hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// IOKit service class of the SMC driver
    #[arg(long, global = true, default_value = SMC_SERVICE_NAME)]
    pub service: String,

    /// Structured-method selector used for every call
    #[arg(long, global = true, default_value_t = KERNEL_INDEX_SMC)]
    pub selector: u32,

    /// Log every exchange
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a list of keys and report what the controller answers for each
    Scan {
        #[arg(help = "Four-character SMC keys to try (default: F0Md F0Tg \"FS! \")")]
        keys: Vec<String>,
        #[arg(
            long,
            value_delimiter = ',',
            help = "Method selectors to try each key on (default: --selector)"
        )]
        selectors: Vec<u32>,
    },
    /// Read a single SMC key and display its value
    Read {
        #[arg(help = "Four-character SMC key name (e.g. TC0P, F0Ac)")]
        key: String,
    },

    /// Write a value to a SMC key
    Write {
        #[arg(help = "Four-character SMC key name (e.g. F0Md, F0Tg)")]
        key: String,
        #[arg(
            help = "Hexadecimal value to write (without `0x` prefix), for 0x031000, write 031000"
        )]
        value: String,
        #[arg(
            long = "type",
            help = "Four-character data type (e.g. \"ui8 \"); read from the key when omitted"
        )]
        data_type: Option<String>,
    },
}
