use clap::Parser;
use freight_engine::core::rates::RateOutcome;
use freight_engine::domain::ports::RateProvider;
use freight_engine::utils::{logger, validation::Validate};
use freight_engine::{
    BoxPacker, CarrierRateEngine, CliConfig, EngineConfig, HttpRateProvider, LocalSnapshotStore,
    PackingSession, SessionCoordinator, TableRateProvider, WeightCatalog, WeightResolver,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting freight-engine CLI");

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let catalog = match &cli.catalog {
        Some(path) => WeightCatalog::from_file(path)?,
        None => {
            tracing::warn!("No weight catalog supplied; all weights fall back to default");
            WeightCatalog::new()
        }
    };

    let raw_items: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&cli.items_file)?)?;

    let resolver = WeightResolver::new(catalog, config.default_weight_g());
    let packer = BoxPacker::new(config.pack_constraints());
    let session = PackingSession::from_json(cli.transfer_id.clone(), raw_items, resolver, packer)?;

    let result = match config.rates_provider() {
        "http" => {
            let endpoint = config.quotes.endpoint.clone().unwrap_or_default();
            let engine = CarrierRateEngine::new(
                HttpRateProvider::new(endpoint),
                config.recommend_weights(),
                config.quote_ttl(),
                config.retry_policy(),
            );
            run(&cli, &config, session, engine).await
        }
        _ => {
            let engine = CarrierRateEngine::new(
                TableRateProvider::new(config.carriers.clone()),
                config.recommend_weights(),
                config.quote_ttl(),
                config.retry_policy(),
            );
            run(&cli, &config, session, engine).await
        }
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ Packing run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(match e.severity() {
            freight_engine::utils::error::ErrorSeverity::Low => 0,
            freight_engine::utils::error::ErrorSeverity::Medium => 2,
            freight_engine::utils::error::ErrorSeverity::High => 1,
            freight_engine::utils::error::ErrorSeverity::Critical => 3,
        });
    }

    Ok(())
}

async fn run<P: RateProvider + 'static>(
    cli: &CliConfig,
    config: &EngineConfig,
    session: PackingSession<WeightCatalog>,
    engine: CarrierRateEngine<P>,
) -> freight_engine::Result<()> {
    let store = LocalSnapshotStore::new(cli.output_path.clone());
    let coordinator =
        SessionCoordinator::new(session, engine, store, config.coordinator_settings());

    coordinator.set_destination(cli.destination()).await;
    coordinator
        .set_shipment(cli.shipment_type, cli.service_level)
        .await;

    let outcome = coordinator.recompute_now().await;

    {
        let session = coordinator.session();
        let session = session.lock().await;

        println!("📦 Transfer {}", session.transfer_id());
        for item in session.items() {
            println!(
                "  {} x{} ({:.3} kg/unit, {}) [{:?}]",
                item.name,
                item.quantity_packed,
                item.unit_weight_g as f64 / 1000.0,
                item.weight_confidence.legend_code(),
                item.status()
            );
        }
        println!("  Weight sources: {}", session.legend_summary());

        for line in session.unpackable() {
            println!(
                "  ⚠️ {} cannot be packed: one unit is {:.2} kg against a {:.0} kg box cap",
                line.product_id,
                line.unit_weight_g as f64 / 1000.0,
                line.max_weight_kg
            );
        }

        let summary = session.manifest_summary();
        println!(
            "📦 Parcels: {} ({} satchel), {:.2} kg billable",
            summary.parcel_count, summary.satchel_count, summary.billable_weight_kg
        );
        for parcel in session.parcels() {
            println!(
                "  Parcel {} ({:?}): {:.2} kg, {} lines{}",
                parcel.parcel_id,
                parcel.kind,
                parcel.weight_kg,
                parcel.contents.len(),
                if parcel.over_limit { " [over limit]" } else { "" }
            );
        }
    }

    match outcome {
        Some(RateOutcome::Quotes(quotes)) => {
            println!("🚚 Carrier options:");
            for (index, quote) in quotes.iter().enumerate() {
                let tags: Vec<String> = quote.tags.iter().map(|t| format!("{:?}", t)).collect();
                println!(
                    "  [{}] {} — ${:.2}, {} day(s) {}",
                    index,
                    quote.service_name,
                    quote.price,
                    quote.eta_days,
                    if tags.is_empty() {
                        String::new()
                    } else {
                        format!("({})", tags.join(", "))
                    }
                );
            }
        }
        Some(RateOutcome::AddressValidationRequired { missing_fields }) => {
            println!(
                "⚠️ Destination address incomplete; missing: {}",
                missing_fields.join(", ")
            );
        }
        Some(RateOutcome::RatesUnavailable { reason }) => {
            println!("⚠️ Carrier rates unavailable: {}", reason);
        }
        None => {
            println!("Nothing packed yet; no rates requested.");
        }
    }

    if let Some(index) = cli.select_quote {
        match coordinator.select_quote(index).await {
            Ok(()) => println!("✅ Quote {} selected", index),
            Err(e) => {
                eprintln!("❌ Could not select quote: {}", e);
                std::process::exit(2);
            }
        }

        if cli.finish {
            match coordinator.finish(cli.acknowledge_discrepancies).await {
                Ok(parcels) => {
                    println!("✅ Transfer completed with {} parcel(s)", parcels.len());
                }
                Err(e) => {
                    eprintln!("❌ Could not finish transfer: {}", e);
                    std::process::exit(2);
                }
            }
        }
    }

    coordinator.save_now().await?;
    tracing::info!("📁 Snapshot saved to {}", cli.output_path);

    Ok(())
}
