mod gateways;

pub use gateways::ProviderGateways;
