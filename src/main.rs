// Fleet Autopilot - Main Entry Point
// Keeps the bunker stocked and the fleet moving, one polling cycle at a time

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use fleet_autopilot::operations::{consumption, ready_by_fuel_need, RouteSettingsOutcome};
use fleet_autopilot::{logging, ConfigManager, Controller, RoutePrices, RouteIntent, VesselId, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "fleet-autopilot", about = "Bunker rebuy and departure autopilot for a shipping fleet")]
struct Cli {
    /// Verbosity: -v for operational info, -vv for full detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run cycles on the configured interval until Ctrl-C
    Run,
    /// Run a single cycle and exit
    Once,
    /// Show bunker, current prices and ready vessels
    Status,
    /// Apply route settings to a vessel, or store them until it is in port
    SetRoute {
        #[arg(long)]
        vessel: u64,
        #[arg(long)]
        speed: u32,
        #[arg(long, default_value_t = 0)]
        guards: u32,
        #[arg(long)]
        dry: Option<f64>,
        #[arg(long)]
        refrigerated: Option<f64>,
        #[arg(long)]
        fuel: Option<f64>,
        #[arg(long)]
        crude_oil: Option<f64>,
    },
    /// List stored route settings waiting for their vessel
    Pending,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let manager = ConfigManager::new(&cli.config)?;
    let controller = Arc::new(Controller::from_config(manager.config())?);

    match cli.command {
        Command::Run => {
            info!("🚢 Fleet autopilot starting, press Ctrl+C to stop");
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to listen for Ctrl+C");
                }
            };
            controller.run_forever(Some(manager), shutdown).await;
            info!("autopilot stopped");
        }
        Command::Once => match controller.run_cycle().await {
            Some(report) => println!(
                "Cycle done: {} vessel(s) departed, {}t fuel and {}t CO2 bought, income ${:.0}",
                report.departed.len(),
                report.fuel_bought,
                report.co2_bought,
                report.income
            ),
            None => println!("A cycle is already running"),
        },
        Command::Status => print_status(&controller).await,
        Command::SetRoute {
            vessel,
            speed,
            guards,
            dry,
            refrigerated,
            fuel,
            crude_oil,
        } => {
            let intent = RouteIntent {
                speed,
                guards,
                prices: RoutePrices {
                    dry,
                    refrigerated,
                    fuel,
                    crude_oil,
                },
            };
            match controller.request_route_settings(VesselId(vessel), intent).await? {
                RouteSettingsOutcome::Applied => println!("✅ Route settings applied to vessel {}", vessel),
                RouteSettingsOutcome::Deferred => {
                    println!("⏳ Vessel {} is not in port, settings stored until it is", vessel)
                }
            }
        }
        Command::Pending => {
            let entries = controller.pending().lock().entries();
            if entries.is_empty() {
                println!("No pending route settings");
            }
            for entry in entries {
                println!(
                    "vessel {}: speed {}, guards {}, saved {}",
                    entry.vessel_id,
                    entry.intent.speed,
                    entry.intent.guards,
                    entry.saved_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
    }

    Ok(())
}

async fn print_status(controller: &Controller) {
    let oracle = controller.oracle();
    match oracle.bunker().await {
        Some(bunker) => {
            println!("⛽ Fuel: {:.0}/{:.0}t", bunker.fuel, bunker.max_fuel);
            println!("🌫️  CO2: {:.0}/{:.0}t", bunker.co2, bunker.max_co2);
            println!("💰 Cash: ${}", bunker.cash);
        }
        None => println!("Bunker unavailable"),
    }
    match oracle.prices().await {
        Some(quote) => println!("📈 Prices: fuel ${:.0}/t, CO2 ${:.0}/t", quote.fuel_price, quote.co2_price),
        None => println!("Prices unavailable"),
    }
    if let Some(vessels) = oracle.vessels().await {
        let ready = ready_by_fuel_need(&vessels);
        println!("🚢 {} vessel(s), {} ready to depart", vessels.len(), ready.len());
        for vessel in ready {
            println!(
                "  {} {} -> {}: fuel {:.1}t, CO2 {:.1}t",
                vessel.id,
                vessel.name,
                vessel.destination().unwrap_or("?"),
                consumption::fuel_needed(&vessel),
                consumption::co2_needed(&vessel)
            );
        }
    }
}
