use crate::structs::KERNEL_INDEX_SMC;

/// Service class name the SMC driver registers under.
pub const SMC_SERVICE_NAME: &str = "AppleSMC";

/// Where to find the controller and which method to call on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub service_name: String,
    /// Structured-method selector used for every exchange.
    pub selector: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            service_name: SMC_SERVICE_NAME.to_owned(),
            selector: KERNEL_INDEX_SMC,
        }
    }
}

impl ChannelConfig {
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_selector(mut self, selector: u32) -> Self {
        self.selector = selector;
        self
    }
}
