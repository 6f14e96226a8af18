use anyhow::bail;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use zcash_monkey::store::{AppState, Nav};
use zcash_monkey::{
    contribution_id_from_memo, decode_hex_memo, Actions, ClientConfig, RpcConnector, Settings,
    StateChange,
};

/// zcash-monkey: companion client for a wallet-enabled zcashd
#[derive(Parser, Debug)]
#[command(name = "zcash-monkey")]
#[command(about = "Inspect a zcashd wallet, derive and import contribution addresses, send funds")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show chain info for the configured node
    Info,

    /// List wallet addresses by balance
    Addresses {
        #[arg(long, default_value = "0")]
        page: usize,
        #[arg(long, default_value = "20")]
        per_page: usize,
    },

    /// Derive a page of contribution addresses from the xpub
    Contributions {
        #[arg(long, default_value = "0")]
        page: usize,
        #[arg(long, default_value = "20")]
        per_page: usize,
    },

    /// Derive a page of contribution addresses and import the missing ones (rescans)
    Import {
        #[arg(long, default_value = "0")]
        page: usize,
        #[arg(long, default_value = "20")]
        per_page: usize,
    },

    /// Send funds and watch the resulting operation
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: f64,
        /// Plain-text memo (shielded recipients only)
        #[arg(long, default_value = "", conflicts_with = "contribution")]
        memo: String,
        /// Tag the payment with a Grant.io contribution memo
        #[arg(long)]
        contribution: Option<u64>,
    },

    /// Show or change the connection settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    /// Check the node with new settings and save them if it answers
    Set {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        user: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value = "")]
        xpub: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ClientConfig::from_env();
    let connector = Arc::new(RpcConnector::new(config.rpc_timeout));
    let actions = Actions::new(config, connector);

    tokio::spawn(log_changes(actions.store().subscribe()));

    actions.init_settings().await;
    let state = actions.store().read();

    if !matches!(args.command, Command::Settings { .. }) && state.nav == Nav::Settings {
        bail!(
            "Cannot reach node ({}). Configure it with `zcash-monkey settings set`.",
            state.network_error
        );
    }

    match args.command {
        Command::Info => {
            actions.get_info().await;
            let state = check(&actions)?;
            println!("chain:   {}", state.info.chain);
            println!("blocks:  {}", state.info.blocks);
            println!("headers: {}", state.info.headers);
            println!("best:    {}", state.info.bestblockhash);
        }
        Command::Addresses { page, per_page } => {
            actions.get_current_addresses().await;
            actions.populate_address_list(page, per_page);
            let state = check(&actions)?;
            println!(
                "transparent {}  private {}  total {}",
                state.total_balances.transparent,
                state.total_balances.private,
                state.total_balances.total
            );
            for a in &state.address_page.items {
                println!("{:>14.8}  {}  {}", a.balance, a.address, a.account);
            }
        }
        Command::Contributions { page, per_page } => {
            actions.get_contributions(page, per_page).await;
            let state = check(&actions)?;
            print_contributions(&state);
        }
        Command::Import { page, per_page } => {
            actions.get_contributions(page, per_page).await;
            check(&actions)?;
            actions.add_contributions().await;
            let state = check(&actions)?;
            if state.nav == Nav::AddedToWallet {
                println!("Imported contribution addresses");
            }
            for line in &state.log {
                println!("{}", line);
            }
            print_contributions(&state);
        }
        Command::Send {
            from,
            to,
            amount,
            memo,
            contribution,
        } => {
            match contribution {
                Some(id) => actions.send_contribution(&from, &to, amount, id).await,
                None => actions.send_coins(&from, &to, amount, &memo).await,
            }
            check(&actions)?;
            while actions.watcher().is_watching() {
                tokio::time::sleep(actions.config().poll_interval).await;
            }
            if let Some(op) = actions.store().latest_operation() {
                println!("operation {}: {}", op.id, op.status);
                if !op.txid.is_empty() {
                    println!("txid: {}", op.txid);
                }
                if !op.memo.is_empty() {
                    println!("memo: {}", decode_hex_memo(&op.memo)?);
                    if let Some(id) = contribution_id_from_memo(&op.memo) {
                        println!("contribution: {}", id);
                    }
                }
                if !op.error.is_empty() {
                    bail!("{}", op.error);
                }
            }
        }
        Command::Settings { action } => run_settings(&actions, action).await?,
    }

    Ok(())
}

async fn run_settings(actions: &Actions, action: SettingsCommand) -> anyhow::Result<()> {
    match action {
        SettingsCommand::Show => {
            let state = actions.store().read();
            println!("file:  {}", state.settings_path);
            println!("url:   {}", state.settings.rpc_url);
            println!("user:  {}", state.settings.rpc_user);
            println!("xpub:  {}", state.settings.xpub);
        }
        SettingsCommand::Set {
            url,
            user,
            password,
            xpub,
        } => {
            actions
                .set_settings(Settings {
                    rpc_url: url,
                    rpc_user: user,
                    rpc_password: password,
                    xpub,
                })
                .await;
            let state = check(actions)?;
            if !state.network_error.is_empty() {
                bail!("Settings rejected: {}", state.network_error);
            }
            println!("Connected to {} chain, settings saved", state.info.chain);
        }
    }
    Ok(())
}

/// Fail if the last workflow left an error behind
fn check(actions: &Actions) -> anyhow::Result<Arc<AppState>> {
    let state = actions.store().read();
    if !state.error.is_empty() {
        bail!("{}", state.error);
    }
    Ok(state)
}

fn print_contributions(state: &AppState) {
    for c in &state.contribution_page.items {
        let owner = match (c.in_wallet, c.is_mine) {
            (true, true) => "mine",
            (true, false) => "watch",
            _ => "-",
        };
        println!("{:<10} {}  {:>14.8}  {}", c.path, c.address, c.balance, owner);
    }
}

async fn log_changes(mut changes: tokio::sync::broadcast::Receiver<StateChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                if change.state.status != change.prev.status && !change.state.status.is_empty() {
                    log::debug!("{}", change.state.status);
                }
            }
            Err(RecvError::Lagged(skipped)) => log::debug!("Skipped {} state changes", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
