//! Terminal front-end. Each subcommand is one screen of the watchlist app.
use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};

use coinwatch::models::{CoinId, Currency};
use coinwatch::services::catalog::history_summary;
use coinwatch::views::display::{format_amount, format_change, format_money, format_rank};
use coinwatch::views::CoinBrowser;
use coinwatch::{AppContext, ClientError};

#[derive(Debug, Parser)]
#[command(version, about = "Browse coins and manage your price-alert watchlist", long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides COINWATCH_API_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Log in and remember the session.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the session.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// List coins, ten per page by default.
    Coins {
        /// Filter by name or symbol.
        #[arg(long, short)]
        search: Option<String>,
        #[arg(long, short, default_value_t = 1)]
        page: usize,
        /// Display currency (usd, eur, inr).
        #[arg(long)]
        currency: Option<String>,
    },
    /// Show one coin with its price history.
    Coin {
        id: CoinId,
        #[arg(long)]
        currency: Option<String>,
    },
    /// List watched coins and their alert prices.
    Watchlist,
    /// Watch a coin with an alert price.
    Watch { id: CoinId, alert_price: String },
    /// Stop watching a coin.
    Unwatch { id: CoinId },
}

pub async fn run(command: Command, mut ctx: AppContext) -> Result<()> {
    match command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            ctx.session
                .register(&username, &email, &password)
                .await
                .map_err(visible)?;
            println!("Account created for {username}. You can log in now.");
        }
        Command::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let user = ctx.session.login(&email, &password).await.map_err(visible)?;
            println!("Welcome back, {}.", user.username);
        }
        Command::Logout => {
            ctx.session.logout().await;
            println!("Logged out.");
        }
        Command::Whoami => match ctx.session.check_session().await {
            Some(user) => println!("{} <{}>", user.username, user.email),
            None => println!("Not logged in."),
        },
        Command::Coins {
            search,
            page,
            currency,
        } => {
            if let Some(name) = currency {
                ctx.set_currency(Currency::from_name(&name));
            }
            require_login(&ctx).await?;
            ctx.load_data().await;
            show_coins(&ctx, search, page);
        }
        Command::Coin { id, currency } => {
            if let Some(name) = currency {
                ctx.set_currency(Currency::from_name(&name));
            }
            require_login(&ctx).await?;
            show_coin(&ctx, id).await?;
        }
        Command::Watchlist => {
            require_login(&ctx).await?;
            ctx.load_data().await;
            show_watchlist(&ctx);
        }
        Command::Watch { id, alert_price } => {
            require_login(&ctx).await?;
            ctx.watchlist.add(id, &alert_price).await.map_err(visible)?;
            println!("Coin {id} added to your watchlist!");
        }
        Command::Unwatch { id } => {
            require_login(&ctx).await?;
            ctx.watchlist.remove(id).await.map_err(visible)?;
            println!("Coin {id} removed from your watchlist!");
        }
    }
    Ok(())
}

async fn require_login(ctx: &AppContext) -> Result<()> {
    if ctx.session.check_session().await.is_none() {
        bail!("Please log in first (coinwatch login --email <EMAIL>).");
    }
    Ok(())
}

fn show_coins(ctx: &AppContext, search: Option<String>, page: usize) {
    if let Some(err) = ctx.catalog.last_error() {
        eprintln!("Could not load coins: {err}");
    }
    let coins = ctx.catalog.coins();
    let mut browser = CoinBrowser::new(ctx.config.page_size);
    if let Some(query) = search {
        browser.set_query(query);
    }
    let matches = browser.filter(&coins).len();
    browser.go_to(page, matches);

    let watchlist = &ctx.watchlist;
    let view = browser.page(&coins, |id| watchlist.is_watched(id));
    let price_header = format!("Price ({})", ctx.currency.symbol);
    println!("{:>4}  {:<28} {:>16} {:>20}  {}", "#", "Coin", price_header, "Market Cap", "Watch");
    for row in &view.rows {
        println!(
            "{:>4}  {:<28} {:>16} {:>20}  {}",
            row.rank,
            format!("{} ({})", row.coin.name, row.coin.symbol.to_uppercase()),
            format_money(&ctx.currency, row.coin.market_price),
            format_money(&ctx.currency, row.coin.market_cap),
            if row.watched { "Watching" } else { "-" },
        );
    }
    println!("{view}");
}

async fn show_coin(ctx: &AppContext, id: CoinId) -> Result<()> {
    let page = ctx
        .catalog
        .load_coin_page(id, &ctx.currency, |pct| tracing::debug!("Loading... {pct}%"))
        .await
        .map_err(|e| {
            tracing::warn!("Error loading coin {id}: {e}");
            anyhow!("Error loading data. Please try again later.")
        })?;
    let detail = &page.detail;
    let currency = &ctx.currency;

    println!("{} ({})", detail.name, detail.symbol.to_uppercase());
    println!("  Crypto Market Rank  {}", format_rank(detail.market_cap_rank));
    println!("  Current Price       {}", format_money(currency, detail.price()));
    println!("  Market Cap          {}", format_money(currency, detail.market_cap));
    println!("  24 Hour High        {}", format_money(currency, detail.high_24h));
    println!("  24 Hour Low         {}", format_money(currency, detail.low_24h));

    match history_summary(&page.history) {
        Some(summary) => {
            println!(
                "  History             {} points, {} to {}",
                page.history.len(),
                summary.start.format("%Y-%m-%d"),
                summary.end.format("%Y-%m-%d"),
            );
            println!(
                "  Range               {} - {} ({})",
                format_amount(Some(summary.min)),
                format_amount(Some(summary.max)),
                format_change(summary.change_pct),
            );
        }
        None => println!("  History             none recorded"),
    }
    Ok(())
}

fn show_watchlist(ctx: &AppContext) {
    if let Some(err) = ctx.watchlist.last_error() {
        eprintln!("Could not refresh watchlist: {err}");
    }
    let entries = ctx.watchlist.entries();
    if entries.is_empty() {
        println!("Your watchlist is empty.");
        return;
    }
    for entry in entries {
        let name = ctx
            .catalog
            .find(entry.cryptocurrency_id)
            .map(|c| format!("{} ({})", c.name, c.symbol.to_uppercase()))
            .unwrap_or_else(|| format!("coin #{}", entry.cryptocurrency_id));
        println!(
            "{:<28} alert at {}",
            name,
            format_money(&ctx.currency, entry.alert_price)
        );
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn visible(err: ClientError) -> anyhow::Error {
    tracing::debug!("{err:?}");
    anyhow!(err.user_message())
}
