//! Wagerbot operator CLI
//!
//! Runs single economy operations against the configured ledger, or the
//! passive income loop. Output is plain text; chat rendering lives elsewhere.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wagerbot::accounts::Ranking;
use wagerbot::games::{Color, Hand};
use wagerbot::{AccountId, Bet, ConfigLoader, Economy, EconomyError};

#[derive(Parser, Debug)]
#[command(name = "wagerbot")]
#[command(about = "Virtual economy engine for chat bots", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database directory, overrides the configuration file
    #[arg(long)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a user with the starting balance
    Register { id: i64, username: String },
    /// Show balance and profile
    Balance { id: i64 },
    /// Pay another user
    Pay { from: i64, to: i64, amount: i64 },
    /// Credit a user as the configured operator
    Grant { operator: i64, to: i64, amount: i64 },
    /// Play one round
    Play {
        id: i64,
        wager: i64,
        #[command(subcommand)]
        game: GameArg,
    },
    /// Silence another user
    Mute { payer: i64, target: i64, duration: String },
    /// Lift a silence early, paying for the remaining time
    Unmute { payer: i64, target: i64 },
    /// Silence yourself for a reward
    SelfMute { id: i64, duration: String },
    /// End your own silence, returning the reward
    SelfUnmute { id: i64 },
    /// Show active silences of a user
    Status { id: i64 },
    /// Try to take currency from another user
    Steal { thief: i64, victim: i64, amount: i64 },
    /// Leaderboard
    Top {
        #[arg(long, default_value = "balance")]
        by: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Personal savings account
    Bank {
        #[command(subcommand)]
        action: BankAction,
    },
    /// Run the passive income loop until interrupted
    Income {
        /// Apply a single pass and exit
        #[arg(long)]
        once: bool,
    },
    /// Print this process's metrics in Prometheus text format.
    ///
    /// Counters start at zero on every invocation.
    Metrics,
}

#[derive(Subcommand, Debug)]
enum GameArg {
    Slots,
    Roulette { number: i64 },
    Color { color: String },
    Dice { sum: i64 },
    Rps { hand: String },
}

#[derive(Subcommand, Debug)]
enum BankAction {
    Deposit { id: i64, amount: i64 },
    Withdraw { id: i64, amount: i64 },
    Show { id: i64 },
    Summary,
}

impl TryFrom<GameArg> for Bet {
    type Error = EconomyError;

    fn try_from(game: GameArg) -> Result<Self, Self::Error> {
        Ok(match game {
            GameArg::Slots => Bet::Slots,
            GameArg::Roulette { number } => Bet::Number(number),
            GameArg::Color { color } => Bet::Color(color.parse::<Color>()?),
            GameArg::Dice { sum } => Bet::Dice(sum),
            GameArg::Rps { hand } => Bet::Rps(hand.parse::<Hand>()?),
        })
    }
}

fn parse_ranking(by: &str) -> Result<Ranking, String> {
    match by {
        "balance" => Ok(Ranking::Balance),
        "level" | "lvl" => Ok(Ranking::Level),
        "income" => Ok(Ranking::Income),
        other => Err(format!("unknown ranking '{}', use balance, level or income", other)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(ref path) = args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;
    if let Some(db_path) = args.db_path {
        config.storage.data_directory = db_path;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.monitoring.log_filter.clone().into()),
        )
        .init();

    let economy = Economy::open(config).await?;

    match args.command {
        Command::Register { id, username } => {
            let registration = economy.accounts().register(AccountId(id), &username).await?;
            let summary = registration.summary;
            let verb = if registration.created { "registered" } else { "already registered" };
            println!("{} {} ({}), balance {}", summary.profile.username, verb, id, summary.balance);
        }
        Command::Balance { id } => {
            let summary = economy.accounts().summary(AccountId(id)).await?;
            println!(
                "{}: balance {}, level {}, income {}",
                summary.profile.username, summary.balance, summary.profile.level, summary.profile.income
            );
        }
        Command::Pay { from, to, amount } => {
            let outcome = economy.payments().pay(AccountId(from), AccountId(to), amount).await?;
            println!("paid {} to {}, balance {}", amount, to, outcome.payer_balance);
        }
        Command::Grant { operator, to, amount } => {
            let balance = economy
                .payments()
                .grant(AccountId(operator), AccountId(to), amount)
                .await?;
            println!("granted {} to {}, balance {}", amount, to, balance);
        }
        Command::Play { id, wager, game } => {
            let round = economy.play(AccountId(id), wager, Bet::try_from(game)?).await?;
            let verdict = match (round.won, round.forced_loss) {
                (true, _) => format!("won {}", round.payout),
                (false, true) => "lost (house edge)".to_string(),
                (false, false) => "lost".to_string(),
            };
            println!(
                "{} {} -> {}, chance {}%, balance {}",
                round.game, round.raw_result, verdict, round.chance, round.new_balance
            );
        }
        Command::Mute { payer, target, duration } => {
            let outcome = economy
                .silence()
                .mute(AccountId(payer), AccountId(target), &duration)
                .await?;
            println!(
                "{} silenced until {}, cost {}, balance {}",
                target, outcome.until, outcome.cost, outcome.payer_balance
            );
        }
        Command::Unmute { payer, target } => {
            let outcome = economy.silence().unmute(AccountId(payer), AccountId(target)).await?;
            println!(
                "{} unsilenced ({} left), cost {}, balance {}",
                target, outcome.remaining, outcome.cost, outcome.payer_balance
            );
        }
        Command::SelfMute { id, duration } => {
            let outcome = economy.silence().self_mute(AccountId(id), &duration).await?;
            println!(
                "silenced until {}, earned {}, balance {}",
                outcome.until, outcome.reward, outcome.balance
            );
        }
        Command::SelfUnmute { id } => {
            let outcome = economy.silence().self_unmute(AccountId(id)).await?;
            println!("unsilenced, returned {}, balance {}", outcome.clawback, outcome.balance);
        }
        Command::Status { id } => {
            let status = economy.silence().status(AccountId(id)).await?;
            match status.silenced_until() {
                Some(until) => println!("{} silenced until {}", id, until),
                None => println!("{} is not silenced", id),
            }
        }
        Command::Steal { thief, victim, amount } => {
            let outcome = economy
                .theft()
                .steal(AccountId(victim), AccountId(thief), amount)
                .await?;
            if outcome.succeeded {
                println!("took {} from {}, balance {}", amount, victim, outcome.thief_balance);
            } else {
                println!(
                    "caught, fined {}, balance {}",
                    outcome.penalty, outcome.thief_balance
                );
            }
        }
        Command::Top { by, limit } => {
            let ranking = parse_ranking(&by)?;
            for (place, row) in economy.accounts().top(ranking, limit).await?.iter().enumerate() {
                let value = match ranking {
                    Ranking::Balance => row.balance,
                    Ranking::Level => row.profile.level,
                    Ranking::Income => row.profile.income,
                };
                println!("{:>2}. {} {}", place + 1, row.profile.username, value);
            }
        }
        Command::Bank { action } => match action {
            BankAction::Deposit { id, amount } => {
                let balances = economy.payments().bank_deposit(AccountId(id), amount).await?;
                println!("wallet {}, bank {}", balances.wallet, balances.bank);
            }
            BankAction::Withdraw { id, amount } => {
                let balances = economy.payments().bank_withdraw(AccountId(id), amount).await?;
                println!("wallet {}, bank {}", balances.wallet, balances.bank);
            }
            BankAction::Show { id } => {
                let balances = economy.payments().bank_balances(AccountId(id)).await?;
                println!("wallet {}, bank {}", balances.wallet, balances.bank);
            }
            BankAction::Summary => {
                let summary = economy.payments().bank_summary().await?;
                println!(
                    "casino {}, deposits {} across {} accounts, total {}",
                    summary.casino,
                    summary.deposits,
                    summary.accounts,
                    summary.casino.saturating_add(summary.deposits)
                );
            }
        },
        Command::Income { once } => {
            if once {
                let report = economy.income().run_once().await?;
                println!("credited {} accounts, {} in total", report.credited, report.total);
            } else {
                let Some(handle) = economy.start_income() else {
                    println!("passive income is disabled in the configuration");
                    return Ok(());
                };
                tokio::signal::ctrl_c().await?;
                handle.abort();
                tracing::info!("passive income job stopped");
            }
        }
        Command::Metrics => {
            print!("{}", economy.metrics().render()?);
        }
    }

    Ok(())
}
