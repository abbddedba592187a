#![forbid(unsafe_code)]
//! RaceChain CLI: run transfers against a fresh in-memory simulation.

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color as TableColor, ContentArrangement, Table};
use racechain::config::{Config, DEFAULT_CONFIG_PATH};
use racechain::participant::Role;
use racechain::simulation::Simulation;
use racechain::transaction::Coin;
use racechain::transfer::TransferReceipt;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "racechain", version, about = "Proof-of-work ledger where miners race to commit transfers")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send coins from one participant to another
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: Coin,
        /// Paid to the miner that commits the block
        #[arg(long, default_value = "10")]
        reward: Coin,
        /// Print the receipt as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a scripted sequence of transfers
    Demo,
    /// Show participants and balances
    Roster,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    let config = Config::load(&cli.config)?;
    let sim = Simulation::new(config)?;

    match cli.command {
        Command::Transfer {
            from,
            to,
            amount,
            reward,
            json,
        } => {
            let receipt = sim.transfer(&from, &to, amount, reward).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                print_receipt(&receipt);
                println!();
                print_roster(&sim);
            }
        }
        Command::Demo => {
            let reward = Coin::from_num(10);
            let script: [(&str, &str, Coin); 5] = [
                ("Saahil Mahato", "Yoda", Coin::from_num(30)),
                ("Yoda", "yoda", Coin::from_num(10)),
                ("Han Solo", "Ciri", Coin::ZERO),
                ("Ciri", "Anakin Skywalker", Coin::from_num(500)),
                ("Geralt", "Obi-wan Kenobi", Coin::from_num(20)),
            ];
            for (from, to, amount) in script {
                println!("{} {} -> {} ({})", "▶".bright_cyan(), from, to, amount);
                print_receipt(&sim.transfer(from, to, amount, reward).await);
            }
            println!();
            println!("{}", format!("Chain height: {}", sim.chain_height().await).bright_white());
            match sim.verify_ledger().await {
                Ok(()) => println!("{}", "Ledger and every view verified".green()),
                Err(e) => println!("{}", format!("Ledger verification failed: {}", e).red()),
            }
            print_roster(&sim);
        }
        Command::Roster => print_roster(&sim),
    }

    Ok(())
}

fn print_receipt(receipt: &TransferReceipt) {
    let line = format!("[{}] {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"), receipt.message);
    if receipt.status {
        println!("{}", line.green());
    } else {
        println!("{}", line.red());
    }
}

fn print_roster(sim: &Simulation) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Role").add_attribute(Attribute::Bold),
            Cell::new("Balance").add_attribute(Attribute::Bold),
            Cell::new("Blocks seen").add_attribute(Attribute::Bold),
            Cell::new("Blocks won").add_attribute(Attribute::Bold),
        ]);

    for participant in sim.registry().participants() {
        let won = match participant.role() {
            Role::Miner => sim
                .registry()
                .miner(participant.name())
                .map(|m| m.stats().blocks_won.to_string())
                .unwrap_or_default(),
            Role::User => "-".to_string(),
        };
        let color = match participant.role() {
            Role::Miner => TableColor::Yellow,
            Role::User => TableColor::Cyan,
        };
        table.add_row(vec![
            Cell::new(participant.name()).fg(color),
            Cell::new(participant.role()),
            Cell::new(participant.balance()),
            Cell::new(participant.ledger_view().len()),
            Cell::new(won),
        ]);
    }

    println!("{table}");
}
