//! # Shell Commands
//!
//! Parses one input line into a [`Command`] and runs it against the POS
//! services.
//!
//! ```text
//!   tabs | new | select N | rm N | refresh
//!   search TEXT | add N [QTY] | cart | inc N | dec N | qty N QTY | del N
//!   vouchers | voucher CODE | voucher clear
//!   discount amount|percent VALUE | discount toggle
//!   ship FEE [PARTNER] | pickup | customer QUERY | customer clear
//!   disease ID | cash | qr | confirm | cancel | history [reload] | quit
//! ```
//!
//! Tab and line numbers are the 1-based positions printed by `tabs` and
//! `cart`; product numbers refer to the last `search`.

use agro_core::cart::LineKey;
use agro_core::catalog::Product;
use agro_core::discount::DiscountMode;
use agro_core::error::CoreError;
use agro_core::money::Money;
use agro_core::types::Fulfillment;
use agro_pos::{PosError, PosResult, PosServices, SearchQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Refresh,
    Tabs,
    New,
    Select(usize),
    Remove(usize),
    Search(String),
    Add { index: usize, quantity: i64 },
    Cart,
    Increment(usize),
    Decrement(usize),
    Quantity { line: usize, quantity: i64 },
    Delete(usize),
    Vouchers,
    /// `None` clears the selected voucher.
    Voucher(Option<String>),
    Discount { mode: DiscountMode, raw: i64 },
    ToggleDiscount,
    Ship { fee: i64, partner: Option<String> },
    Pickup,
    /// `None` detaches the customer.
    Customer(Option<String>),
    Disease(String),
    Cash,
    Qr,
    Confirm,
    Cancel,
    History { reload: bool },
}

const USAGE: &str = "tabs, new, select N, rm N, refresh, search TEXT, add N [QTY], cart, \
inc N, dec N, qty N QTY, del N, vouchers, voucher CODE|clear, discount amount|percent V, \
discount toggle, ship FEE [PARTNER], pickup, customer QUERY|clear, disease ID, cash, qr, \
confirm, cancel, history [reload], quit";

impl Command {
    /// `Ok(None)` for a blank line; `Err` carries a usage hint.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match (head.to_lowercase().as_str(), rest.as_slice()) {
            ("help" | "?", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            ("refresh", []) => Command::Refresh,
            ("tabs", []) => Command::Tabs,
            ("new", []) => Command::New,
            ("select", [n]) => Command::Select(number(n)?),
            ("rm", [n]) => Command::Remove(number(n)?),
            ("search", words) => Command::Search(words.join(" ")),
            ("add", [n]) => Command::Add {
                index: number(n)?,
                quantity: 1,
            },
            ("add", [n, qty]) => Command::Add {
                index: number(n)?,
                quantity: amount(qty)?,
            },
            ("cart", []) => Command::Cart,
            ("inc", [n]) => Command::Increment(number(n)?),
            ("dec", [n]) => Command::Decrement(number(n)?),
            ("qty", [n, qty]) => Command::Quantity {
                line: number(n)?,
                quantity: amount(qty)?,
            },
            ("del", [n]) => Command::Delete(number(n)?),
            ("vouchers", []) => Command::Vouchers,
            ("voucher", ["clear"]) => Command::Voucher(None),
            ("voucher", [code]) => Command::Voucher(Some(code.to_string())),
            ("discount", ["toggle"]) => Command::ToggleDiscount,
            ("discount", [mode, raw]) => Command::Discount {
                mode: match *mode {
                    "amount" => DiscountMode::Amount,
                    "percent" | "%" => DiscountMode::Percent,
                    other => return Err(format!("unknown discount mode '{}'", other)),
                },
                raw: amount(raw)?,
            },
            ("ship", [fee, partner @ ..]) => Command::Ship {
                fee: amount(fee)?,
                partner: Some(partner.join(" ")).filter(|p| !p.is_empty()),
            },
            ("pickup", []) => Command::Pickup,
            ("customer", ["clear"]) => Command::Customer(None),
            ("customer", words) if !words.is_empty() => Command::Customer(Some(words.join(" "))),
            ("disease", [id]) => Command::Disease(id.to_string()),
            ("cash", []) => Command::Cash,
            ("qr", []) => Command::Qr,
            ("confirm", []) => Command::Confirm,
            ("cancel", []) => Command::Cancel,
            ("history", []) => Command::History { reload: false },
            ("history", ["reload"]) => Command::History { reload: true },
            _ => return Err(format!("usage: {}", USAGE)),
        };
        Ok(Some(command))
    }
}

fn number(word: &str) -> Result<usize, String> {
    match word.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("expected a number from 1, got '{}'", word)),
    }
}

fn amount(word: &str) -> Result<i64, String> {
    word.replace('.', "")
        .parse::<i64>()
        .map_err(|_| format!("expected an amount, got '{}'", word))
}

// =============================================================================
// Shell
// =============================================================================

pub struct Shell {
    services: PosServices,
    last_search: Vec<Product>,
}

impl Shell {
    pub fn new(services: PosServices) -> Self {
        Shell {
            services,
            last_search: Vec::new(),
        }
    }

    /// Runs a command and prints its outcome.
    pub async fn run(&mut self, command: Command) {
        if let Err(e) = self.dispatch(command).await {
            println!("! {}", e);
        }
    }

    async fn dispatch(&mut self, command: Command) -> PosResult<()> {
        let engine = self.services.engine.clone();
        let checkout = self.services.checkout.clone();

        match command {
            Command::Help => println!("{}", USAGE),
            Command::Quit => {}
            Command::Refresh => {
                engine.refresh().await?;
                self.print_tabs().await;
            }
            Command::Tabs => self.print_tabs().await,
            Command::New => {
                let tab = engine.create_tab().await?;
                println!("Opened Đơn {}", tab.label);
                self.print_tabs().await;
            }
            Command::Select(n) => {
                engine.select_tab(&self.tab_id(n).await?).await?;
                self.print_cart().await;
            }
            Command::Remove(n) => {
                engine.remove_tab(&self.tab_id(n).await?).await?;
                self.print_tabs().await;
            }
            Command::Search(text) => self.search(text).await?,
            Command::Add { index, quantity } => {
                let Some(product) = self.last_search.get(index - 1).cloned() else {
                    println!("No search result #{}", index);
                    return Ok(());
                };
                let line = self.services.catalog.line_for(&product, None, quantity).await?;
                engine.add_to_cart(line).await?;
                self.print_cart().await;
            }
            Command::Cart => self.print_cart().await,
            Command::Increment(n) => {
                engine.change_quantity(&self.line_key(n).await?, 1).await?;
                self.print_cart().await;
            }
            Command::Decrement(n) => {
                engine.change_quantity(&self.line_key(n).await?, -1).await?;
                self.print_cart().await;
            }
            Command::Quantity { line, quantity } => {
                engine.set_quantity(&self.line_key(line).await?, quantity).await?;
                self.print_cart().await;
            }
            Command::Delete(n) => {
                engine.remove_line(&self.line_key(n).await?).await?;
                self.print_cart().await;
            }
            Command::Vouchers => {
                for voucher in engine.vouchers() {
                    println!("  {:<12} {}", voucher.code, voucher.label);
                }
            }
            Command::Voucher(Some(code)) => {
                engine.select_voucher(&code).await?;
                self.print_cart().await;
            }
            Command::Voucher(None) => {
                engine.clear_voucher().await?;
                self.print_cart().await;
            }
            Command::Discount { mode, raw } => {
                engine.set_manual_discount(mode, raw).await?;
                self.print_cart().await;
            }
            Command::ToggleDiscount => {
                engine.toggle_manual_mode().await?;
                self.print_cart().await;
            }
            Command::Ship { fee, partner } => {
                engine
                    .set_fulfillment(Fulfillment::Delivery {
                        shipping_fee: Money::from_minor(fee),
                        shipping_partner: partner,
                    })
                    .await?;
                self.print_cart().await;
            }
            Command::Pickup => {
                engine.set_fulfillment(Fulfillment::Pickup).await?;
                self.print_cart().await;
            }
            Command::Customer(Some(query)) => {
                let found = self.services.catalog.search_customers(Some(&query)).await?;
                match found.first() {
                    Some(record) => {
                        let tab = engine.set_customer(record.to_customer()).await?;
                        if let Some(customer) = tab.customer {
                            println!("Customer: {} ({})", customer.name, customer.phone);
                        }
                    }
                    None => println!("No customer matches '{}'", query),
                }
            }
            Command::Customer(None) => {
                engine.clear_customer().await?;
            }
            Command::Disease(id) => match self.services.catalog.disease_detail(&id) {
                Some(disease) => {
                    println!("{}", disease.name);
                    println!("  {}", disease.description);
                    println!("  Cause: {}", disease.cause);
                    for symptom in &disease.symptoms {
                        println!("  - {}", symptom);
                    }
                    println!("  Remedies: {}", disease.recommended_ingredients.join(", "));
                }
                None => println!("No disease '{}'", id),
            },
            Command::Cash => {
                let tab_id = self.active_id().await?;
                let order = checkout.pay_cash(&tab_id).await?;
                println!("Paid cash: order {} total {}", order.id, order.total);
                self.print_tabs().await;
            }
            Command::Qr => {
                let tab_id = self.active_id().await?;
                let status = checkout.start_qr(&tab_id).await?;
                if let (Some(amount), Some(link)) = (status.amount, status.qr_payload) {
                    println!("Scan to pay {}: {}", amount, link);
                }
            }
            Command::Confirm => {
                let order = checkout.confirm_qr().await?;
                println!("Paid by transfer: order {} total {}", order.id, order.total);
                self.print_tabs().await;
            }
            Command::Cancel => {
                checkout.cancel_qr().await?;
                println!("QR payment cancelled");
            }
            Command::History { reload } => {
                let orders = if reload {
                    checkout.history().refresh_history().await?
                } else {
                    checkout.history().recent_orders().await
                };
                for order in orders {
                    let payment = order.payment.map(|p| p.to_string()).unwrap_or_default();
                    println!(
                        "  {}  {:>14}  {:<5} {}",
                        order.id,
                        order.total.to_string(),
                        payment,
                        order.completed_at.format("%d/%m %H:%M")
                    );
                }
            }
        }
        Ok(())
    }

    async fn search(&mut self, text: String) -> PosResult<()> {
        let results = self.services.catalog.search(&SearchQuery::text(text)).await?;
        let currency = self.services.context.currency().await;

        for disease in &results.diseases {
            println!(
                "Disease: {} → {}",
                disease.name,
                disease.recommended_ingredients.join(", ")
            );
        }
        for (i, ranked) in results.products.iter().enumerate() {
            let price = ranked
                .product
                .from_price(&currency)
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string());
            let mark = if ranked.recommended { "★" } else { " " };
            println!("{:>3}. {} {:<40} {:>14}", i + 1, mark, ranked.product.title, price);
        }
        if results.products.is_empty() {
            println!("No products");
        }

        self.last_search = results.products.into_iter().map(|r| r.product).collect();
        Ok(())
    }

    // =========================================================================
    // Printing
    // =========================================================================

    pub async fn print_tabs(&self) {
        for (i, tab) in self.services.engine.tabs().await.iter().enumerate() {
            let marker = if tab.active { "*" } else { " " };
            let mut flags = String::new();
            if tab.syncing {
                flags.push_str(" syncing");
            }
            if tab.has_failed_lines {
                flags.push_str(" unsynced-lines");
            }
            if tab.status == agro_pos::TabStatus::Deleting {
                flags.push_str(" deleting");
            }
            println!(
                "{}{}. Đơn {:<3} {:>2} lines {:>14}  {}{}",
                marker,
                i + 1,
                tab.label,
                tab.line_count,
                tab.total.to_string(),
                tab.session,
                flags
            );
        }
    }

    async fn print_cart(&self) {
        let engine = &self.services.engine;
        let Some(tab) = engine.active_tab().await else {
            println!("No active tab");
            return;
        };
        let totals = tab.totals(engine.settings().vat_rate);

        println!("Đơn {}", tab.label);
        for (i, line) in tab.cart.lines().iter().enumerate() {
            let flag = if line.sync.is_failed() { " !" } else { "" };
            println!(
                "{:>3}. {:<32} {:<8} x{:<4} {:>14}{}",
                i + 1,
                line.name,
                line.variant_label,
                line.quantity,
                line.line_total().to_string(),
                flag
            );
        }
        println!("     Subtotal {:>14}", totals.subtotal.to_string());
        if !totals.discount.is_zero() {
            let source = tab.selected_voucher.as_deref().unwrap_or("manual");
            println!("     Discount {:>14} ({})", totals.discount.to_string(), source);
        }
        if tab.fulfillment.is_delivery() {
            println!("     Shipping {:>14}", totals.shipping_fee.to_string());
        }
        println!("     Total    {:>14}", totals.total.to_string());
        if totals.is_negative_total() {
            println!("! discount exceeds the order value");
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    async fn tab_id(&self, n: usize) -> PosResult<String> {
        self.services
            .engine
            .tabs()
            .await
            .get(n - 1)
            .map(|t| t.id.clone())
            .ok_or_else(|| PosError::TabNotFound(format!("#{}", n)))
    }

    async fn active_id(&self) -> PosResult<String> {
        self.services
            .engine
            .active_tab_id()
            .await
            .ok_or(PosError::NoActiveTab)
    }

    async fn line_key(&self, n: usize) -> PosResult<LineKey> {
        let tab = self
            .services
            .engine
            .active_tab()
            .await
            .ok_or(PosError::NoActiveTab)?;
        tab.cart
            .lines()
            .get(n - 1)
            .map(|l| l.key())
            .ok_or_else(|| CoreError::LineNotFound(format!("#{}", n)).into())
    }
}
