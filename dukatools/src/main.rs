use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Select};
use duka_payment_engine::db_types::OrderId;
use duka_payment_server::helpers::calculate_callback_token;
use indicatif::{ProgressBar, ProgressStyle};

mod duka_server;
mod formatting;
mod poller;

use crate::{
    duka_server::client::DukaServerClient,
    formatting::{format_attempts, format_payment_status, format_push_initiated},
    poller::{poll_until_settled, PollOutcome, PollerConfig},
};

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Command-line client for the Duka payment server")]
pub struct Arguments {
    /// The payment server to talk to
    #[arg(short, long, env = "DUKA_SERVER_URL", default_value = "http://127.0.0.1:8370")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the server is up
    Health,
    /// Show the payment status of an order
    Status { order_id: OrderId },
    /// List the push payment requests sent for an order
    Attempts { order_id: OrderId },
    /// Send a payment prompt to a phone, then wait for the customer to respond
    Pay(PayParams),
    /// Send a fresh payment prompt to the phone used last time
    Resend {
        order_id: OrderId,
        /// Wait for the customer to respond
        #[arg(short, long)]
        wait: bool,
        #[command(flatten)]
        poll: PollParams,
    },
    /// Cancel an outstanding payment prompt
    Cancel { order_id: OrderId },
    /// Wait for an order's payment to be paid or to fail
    Wait {
        order_id: OrderId,
        #[command(flatten)]
        poll: PollParams,
    },
    /// Ask the server to check the outstanding payment request with the network
    Query { order_id: OrderId },
    /// Calculate the token that authenticates a payment callback
    #[clap(name = "callback-token")]
    CallbackToken(CallbackTokenParams),
}

#[derive(Debug, Args)]
pub struct PayParams {
    order_id: OrderId,
    /// The phone to prompt, in any common Kenyan format (07.., +2547.., 2547..)
    #[arg(short, long)]
    phone: String,
    /// Return as soon as the prompt has been sent
    #[arg(long)]
    no_wait: bool,
    #[command(flatten)]
    poll: PollParams,
}

#[derive(Debug, Args)]
pub struct PollParams {
    /// Seconds between status checks
    #[arg(long, default_value = "2")]
    interval: u64,
    /// Seconds to wait before giving up
    #[arg(long, default_value = "300")]
    timeout: u64,
}

impl From<&PollParams> for PollerConfig {
    fn from(p: &PollParams) -> Self {
        PollerConfig { interval: Duration::from_secs(p.interval.max(1)), timeout: Duration::from_secs(p.timeout) }
    }
}

#[derive(Debug, Args)]
pub struct CallbackTokenParams {
    /// The shared callback secret
    #[arg(short, long, env = "DUKA_CALLBACK_SECRET", hide_env_values = true)]
    secret: String,
    /// The checkout request id the callback is for
    #[arg(short, long)]
    checkout_request_id: String,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Arguments) -> Result<()> {
    if let Command::CallbackToken(params) = &cli.command {
        let token = calculate_callback_token(&params.secret, &params.checkout_request_id)?;
        println!("{token}");
        return Ok(());
    }
    let client = DukaServerClient::new(&cli.server)?;
    match cli.command {
        Command::Health => println!("{}", client.health().await?),
        Command::Status { order_id } => print!("{}", format_payment_status(&client.payment_status(&order_id).await?)?),
        Command::Attempts { order_id } => println!("{}", format_attempts(&client.payment_attempts(&order_id).await?)),
        Command::Pay(params) => {
            let res = client.initiate_push(&params.order_id, &params.phone).await?;
            print!("{}", format_push_initiated(&res)?);
            if !params.no_wait {
                wait_for_payment(&client, &params.order_id, (&params.poll).into()).await?;
            }
        },
        Command::Resend { order_id, wait, poll } => {
            let res = client.resend_push(&order_id).await?;
            print!("{}", format_push_initiated(&res)?);
            if wait {
                wait_for_payment(&client, &order_id, (&poll).into()).await?;
            }
        },
        Command::Cancel { order_id } => println!("{}", client.cancel_push(&order_id).await?.message),
        Command::Wait { order_id, poll } => wait_for_payment(&client, &order_id, (&poll).into()).await?,
        Command::Query { order_id } => print!("{}", format_payment_status(&client.query_push(&order_id).await?)?),
        Command::CallbackToken(_) => {},
    }
    Ok(())
}

/// Polls until the payment settles. If it fails or times out, the user can resend or cancel the prompt.
async fn wait_for_payment(client: &DukaServerClient, order_id: &OrderId, config: PollerConfig) -> Result<()> {
    loop {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::with_template("{spinner:5} {msg} [{elapsed}]")
                .map_err(|e| anyhow!("Invalid progress template. {e}"))?
                .tick_strings(&["🕛 ", "🕐 ", "🕑 ", "🕒 ", "🕓 ", "🕔 ", "🕕 ", "🕖 ", "🕗 ", "🕘 ", "🕙 ", "🕚 "]),
        );
        pb.set_message("Waiting for the customer to approve the payment...");
        let outcome = poll_until_settled(client, order_id, config, |record| {
            let status = record.mobile_money_status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".into());
            pb.set_message(format!("Waiting for the customer to approve the payment ({status})..."));
        })
        .await;
        match outcome {
            PollOutcome::Paid(record) => {
                pb.finish_with_message("Paid!");
                print!("{}", format_payment_status(&record)?);
                return Ok(());
            },
            PollOutcome::TimedOut(_) => {
                pb.finish_with_message("Timed out");
                println!(
                    "No result yet. The payment may still complete. Use `dukatools query {order_id}` to check with the \
                     network."
                );
                if !offer_resend_or_cancel(client, order_id, "Still waiting for the customer. What next?").await? {
                    return Ok(());
                }
            },
            PollOutcome::Failed(record) => {
                pb.finish_with_message("Failed");
                print!("{}", format_payment_status(&record)?);
                if !offer_resend_or_cancel(client, order_id, "The payment did not go through. What next?").await? {
                    return Ok(());
                }
            },
        }
    }
}

/// Returns true if a new prompt was sent and is worth waiting for.
async fn offer_resend_or_cancel(client: &DukaServerClient, order_id: &OrderId, prompt: &str) -> Result<bool> {
    let options = ["Resend the payment request", "Cancel the payment", "Leave it for now"];
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&options)
        .default(0)
        .interact()?;
    match choice {
        0 => {
            let res = client.resend_push(order_id).await?;
            print!("{}", format_push_initiated(&res)?);
            Ok(true)
        },
        1 => {
            println!("{}", client.cancel_push(order_id).await?.message);
            Ok(false)
        },
        _ => Ok(false),
    }
}
