use crate::domain::model::{AddressInput, ServiceLevel, ShipmentType};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "freight-engine")]
#[command(about = "Transfer packing and freight quoting engine")]
pub struct CliConfig {
    /// Transfer identifier, used for snapshot naming
    #[arg(long, default_value = "local")]
    pub transfer_id: String,

    /// JSON file with the transfer item lines
    #[arg(long)]
    pub items_file: String,

    /// Optional engine config (TOML); built-in defaults apply when omitted
    #[arg(long)]
    pub config: Option<String>,

    /// Optional weight catalog (TOML)
    #[arg(long)]
    pub catalog: Option<String>,

    /// Directory for session snapshots
    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "")]
    pub address1: String,

    #[arg(long, default_value = "")]
    pub address2: String,

    #[arg(long, default_value = "")]
    pub suburb: String,

    #[arg(long, default_value = "")]
    pub city: String,

    #[arg(long, default_value = "")]
    pub postcode: String,

    #[arg(long, default_value = "NZ")]
    pub country: String,

    #[arg(long, value_enum, default_value_t = ShipmentType::Delivery)]
    pub shipment_type: ShipmentType,

    #[arg(long, value_enum, default_value_t = ServiceLevel::Standard)]
    pub service_level: ServiceLevel,

    /// Select the Nth ranked quote (0-based) after rates come back
    #[arg(long)]
    pub select_quote: Option<usize>,

    /// Finish the transfer after selecting a quote
    #[arg(long)]
    pub finish: bool,

    /// Acknowledge Under/Over-pack discrepancies on finish
    #[arg(long)]
    pub acknowledge_discrepancies: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn destination(&self) -> AddressInput {
        AddressInput {
            address1: self.address1.clone(),
            address2: self.address2.clone(),
            suburb: self.suburb.clone(),
            city: self.city.clone(),
            postcode: self.postcode.clone(),
            country: self.country.clone(),
        }
    }
}
