use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use production_tracker::{
    auth::{FileSessionStorage, SessionGate},
    config,
    gateway::HttpGateway,
    models::{Product, ProductChanges, ProductPayload, StatusFilter, Step},
    services::status::ProductMetrics,
    store::{ProductStore, SaveOutcome},
};
use serde::Serialize;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize()?;

    match cli.command {
        Commands::Login(args) => handle_login(&context, args, cli.json),
        Commands::Logout => handle_logout(&context, cli.json),
        command => {
            context.gate.require()?;
            context
                .store
                .fetch_products(false)
                .await
                .context("failed to load products from the gateway")?;
            handle_store_command(&context, command, cli.json).await
        }
    }
}

#[derive(Parser)]
#[command(
    name = "tracker-cli",
    about = "Track production orders kept in a spreadsheet gateway",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unlock the tracker for this session
    Login(LoginArgs),
    /// Forget the session
    Logout,
    /// List orders, optionally filtered
    List(ListArgs),
    /// Show one order with its progress figures
    Show(IdArgs),
    /// Create a new order
    Add(AddArgs),
    /// Change fields of an existing order
    Edit(EditArgs),
    /// Record units produced today
    Produce(ProduceArgs),
    /// Manage an order's checklist
    #[command(subcommand)]
    Steps(StepsCommands),
    /// Delete an order
    Delete(IdArgs),
}

#[derive(Args)]
struct LoginArgs {
    #[arg(long, help = "Shared access password")]
    password: String,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, help = "Case-insensitive match on name or company")]
    search: Option<String>,
    #[arg(
        long,
        default_value = "all",
        help = "One of: all, active, urgent, completed"
    )]
    status: StatusFilter,
}

#[derive(Args)]
struct IdArgs {
    #[arg(help = "Order identifier")]
    id: String,
}

#[derive(Args)]
struct OrderFields {
    #[arg(long, help = "Company placing the order")]
    company: Option<String>,
    #[arg(long, help = "Customer contact")]
    customer: Option<String>,
    #[arg(long, help = "Salesperson")]
    salesperson: Option<String>,
    #[arg(long, help = "Designer")]
    designer: Option<String>,
    #[arg(long, help = "Total units ordered")]
    qty: Option<u64>,
    #[arg(long, value_parser = parse_date, help = "Order date (YYYY-MM-DD)")]
    order_date: Option<NaiveDate>,
    #[arg(long, conflicts_with = "order_date", help = "Remove the order date")]
    clear_order_date: bool,
    #[arg(long, value_parser = parse_date, help = "Deadline (YYYY-MM-DD)")]
    deadline: Option<NaiveDate>,
    #[arg(long, conflicts_with = "deadline", help = "Remove the deadline")]
    clear_deadline: bool,
    #[arg(long, help = "Image URL")]
    image: Option<String>,
}

impl OrderFields {
    fn into_changes(self, name: Option<String>) -> ProductChanges {
        ProductChanges {
            name: normalize_optional_string(name),
            company: normalize_optional_string(self.company),
            customer: normalize_optional_string(self.customer),
            salesperson: normalize_optional_string(self.salesperson),
            designer: normalize_optional_string(self.designer),
            qty: self.qty,
            order_date: date_change(self.order_date, self.clear_order_date),
            deadline: date_change(self.deadline, self.clear_deadline),
            image: normalize_optional_string(self.image),
            ..Default::default()
        }
    }
}

#[derive(Args)]
struct AddArgs {
    #[arg(long, help = "Product name")]
    name: String,
    #[command(flatten)]
    fields: OrderFields,
    #[arg(long = "step", help = "Checklist step; repeat for several")]
    steps: Vec<String>,
}

#[derive(Args)]
struct EditArgs {
    #[arg(help = "Order identifier")]
    id: String,
    #[arg(long, help = "New product name")]
    name: Option<String>,
    #[command(flatten)]
    fields: OrderFields,
    #[arg(long, help = "Overwrite the completed unit count")]
    completed: Option<u64>,
}

#[derive(Args)]
struct ProduceArgs {
    #[arg(help = "Order identifier")]
    id: String,
    #[arg(value_parser = parse_positive_u64, help = "Units produced")]
    units: u64,
}

#[derive(Subcommand)]
enum StepsCommands {
    /// Append a step
    Add {
        id: String,
        name: String,
    },
    /// Flip a step between done and not done (1-based position)
    Toggle {
        id: String,
        #[arg(value_parser = parse_position)]
        position: usize,
    },
    /// Remove a step (1-based position)
    Remove {
        id: String,
        #[arg(value_parser = parse_position)]
        position: usize,
    },
}

#[derive(Serialize)]
struct ProductDetail<'a> {
    product: &'a Product,
    metrics: ProductMetrics,
}

struct CliContext {
    store: ProductStore,
    gate: SessionGate,
}

impl CliContext {
    fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(&config.log_level, config.log_json);

        let gateway = HttpGateway::from_config(&config).context("failed to build gateway client")?;
        debug!(target: "tracker_cli", gateway = %gateway.endpoint(), "using gateway");
        let store = ProductStore::new(Arc::new(gateway)).with_policy(config.completion_policy);

        let storage = config
            .session_file
            .clone()
            .map(FileSessionStorage::new)
            .unwrap_or_default();
        debug!(target: "tracker_cli", path = %storage.path().display(), "using session file");
        let gate = SessionGate::new(Arc::new(storage), config.access_password_sha256.clone());

        Ok(Self {
            store,
            gate,
        })
    }
}

fn handle_login(context: &CliContext, args: LoginArgs, json: bool) -> Result<()> {
    context.gate.sign_in(&args.password)?;
    if json {
        print_json(&serde_json::json!({ "authenticated": true }))
    } else {
        println!("Signed in for this session.");
        Ok(())
    }
}

fn handle_logout(context: &CliContext, json: bool) -> Result<()> {
    context.gate.sign_out()?;
    if json {
        print_json(&serde_json::json!({ "authenticated": false }))
    } else {
        println!("Signed out.");
        Ok(())
    }
}

async fn handle_store_command(context: &CliContext, command: Commands, json: bool) -> Result<()> {
    let store = &context.store;
    match command {
        Commands::List(args) => {
            if let Some(search) = args.search {
                store.set_search_query(search).await;
            }
            store.set_status_filter(args.status).await;
            let products = store.filtered_products().await;
            if json {
                return print_json(&products);
            }
            println!("{} order(s)", products.len());
            for product in &products {
                let metrics = store.metrics_for(&product.id).await?;
                render_product_line(product, &metrics);
            }
            Ok(())
        }
        Commands::Show(args) => {
            let product = store.select_product(&args.id).await?;
            let metrics = store.metrics_for(&args.id).await?;
            if json {
                return print_json(&ProductDetail {
                    product: &product,
                    metrics,
                });
            }
            render_product_detail(&product, &metrics);
            Ok(())
        }
        Commands::Add(args) => {
            let mut changes = args.fields.into_changes(Some(args.name));
            let steps: Vec<Step> = args
                .steps
                .into_iter()
                .filter_map(|s| normalize_optional_string(Some(s)))
                .map(Step::new)
                .collect();
            if !steps.is_empty() {
                changes.steps = Some(steps);
            }
            let outcome = store.save_product(ProductPayload::add(changes)).await?;
            report_outcome(&outcome, json)
        }
        Commands::Edit(args) => {
            let mut changes = args.fields.into_changes(args.name);
            changes.completed_qty = args.completed;
            if changes.is_empty() {
                return Err(anyhow!("nothing to change; pass at least one field"));
            }
            let outcome = store
                .save_product(ProductPayload::edit(args.id, changes))
                .await?;
            report_outcome(&outcome, json)
        }
        Commands::Produce(args) => {
            let outcome = store.record_production(&args.id, args.units).await?;
            report_outcome(&outcome, json)
        }
        Commands::Steps(command) => {
            let outcome = match command {
                StepsCommands::Add { id, name } => store.add_step(&id, &name).await?,
                StepsCommands::Toggle { id, position } => {
                    store.toggle_step(&id, position - 1).await?
                }
                StepsCommands::Remove { id, position } => {
                    store.remove_step(&id, position - 1).await?
                }
            };
            report_outcome(&outcome, json)
        }
        Commands::Delete(args) => {
            let outcome = store.delete_product(&args.id).await?;
            report_outcome(&outcome, json)
        }
        Commands::Login(_) | Commands::Logout => Ok(()),
    }
}

fn report_outcome(outcome: &SaveOutcome, json: bool) -> Result<()> {
    debug!(target: "tracker_cli", outcome = outcome.label(), "save finished");
    if json {
        print_json(outcome)?;
    } else {
        match outcome {
            SaveOutcome::Confirmed {
                product_id: Some(id),
            } => println!("Saved (order {}).", id),
            SaveOutcome::Confirmed { product_id: None } => println!("Saved."),
            SaveOutcome::Unconfirmed { reason } => {
                println!("Sent, but not yet visible on the gateway: {}", reason)
            }
            SaveOutcome::TransportFailure { .. } => {}
        }
    }

    if let SaveOutcome::TransportFailure { reason } = outcome {
        return Err(anyhow!("failed to save changes: {}", reason));
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_product_line(product: &Product, metrics: &ProductMetrics) {
    let deadline = product
        .deadline
        .map(|d| d.to_string())
        .unwrap_or_else(|| "no deadline".to_string());
    println!(
        "- {} • {} • {} • {}/{} ({}%) • {} • {}",
        product.id,
        product.name,
        display_or_dash(&product.company),
        metrics.completed,
        metrics.total,
        metrics.efficiency,
        deadline,
        metrics.status
    );
}

fn render_product_detail(product: &Product, metrics: &ProductMetrics) {
    println!("{} ({})", product.name, product.id);
    println!("  Company:      {}", display_or_dash(&product.company));
    println!("  Customer:     {}", display_or_dash(&product.customer));
    println!("  Salesperson:  {}", display_or_dash(&product.salesperson));
    println!("  Designer:     {}", display_or_dash(&product.designer));
    if let Some(order_date) = product.order_date {
        println!("  Ordered:      {}", order_date);
    }
    match (product.deadline, metrics.days_left) {
        (Some(deadline), Some(days)) if metrics.is_overdue => {
            println!("  Deadline:     {} (overdue by {} day(s))", deadline, -days)
        }
        (Some(deadline), Some(days)) => {
            println!("  Deadline:     {} ({} day(s) left)", deadline, days)
        }
        _ => println!("  Deadline:     -"),
    }
    println!(
        "  Progress:     {}/{} done, {} remaining ({}%)",
        metrics.completed, metrics.total, metrics.remaining, metrics.efficiency
    );
    println!("  Daily target: {}", metrics.daily_target);
    println!("  Status:       {}", metrics.status);

    if !product.steps.is_empty() {
        println!("  Steps ({}/{}):", metrics.steps_done, metrics.steps_total);
        for (position, step) in product.steps.iter().enumerate() {
            let mark = if step.done { "x" } else { " " };
            println!("    {}. [{}] {}", position + 1, mark, step.name);
        }
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// A date flag and its `--clear-*` counterpart as a partial-update field.
fn date_change(date: Option<NaiveDate>, clear: bool) -> Option<Option<NaiveDate>> {
    if clear {
        Some(None)
    } else {
        date.map(Some)
    }
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", raw))
}

fn parse_positive_u64(raw: &str) -> Result<u64, String> {
    let value: u64 = raw
        .parse()
        .map_err(|_| format!("invalid integer '{raw}'"))?;
    if value == 0 {
        Err("value must be greater than zero".to_string())
    } else {
        Ok(value)
    }
}

fn parse_position(raw: &str) -> Result<usize, String> {
    parse_positive_u64(raw).and_then(|v| usize::try_from(v).map_err(|e| e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit_changes(args: &[&str]) -> ProductChanges {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Edit(edit) => edit.fields.into_changes(edit.name),
            _ => panic!("expected an edit command"),
        }
    }

    #[test]
    fn clear_flags_send_blank_dates() {
        let changes = edit_changes(&["tracker-cli", "edit", "p1", "--clear-deadline"]);
        assert_eq!(changes.deadline, Some(None));
        assert_eq!(changes.order_date, None);

        let changes = edit_changes(&["tracker-cli", "edit", "p1", "--order-date", "2026-09-01"]);
        assert_eq!(changes.order_date, Some(NaiveDate::from_ymd_opt(2026, 9, 1)));
        assert_eq!(changes.deadline, None);
    }

    #[test]
    fn clear_flag_conflicts_with_a_date() {
        let parsed = Cli::try_parse_from([
            "tracker-cli",
            "edit",
            "p1",
            "--deadline",
            "2026-11-01",
            "--clear-deadline",
        ]);
        assert!(parsed.is_err());
    }
}
