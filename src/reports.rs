//! Dashboard figures and the DRE (income statement).
//!
//! Both reports are computed from one [`RecordReader`] so callers can pass a
//! read scope and get figures that agree with each other.

use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::config::FinanceConfig;
use crate::models::{Contract, FlowKind, Invoice, Product, Transaction};
use crate::storage::{RecordReader, StoreError};

/// Business lines always present in the statement.
pub const CORE_LINES: [&str; 2] = ["hardware", "software"];

/// Outbound categories booked as cost of goods sold.
const COGS_CATEGORIES: [&str; 3] = ["cogs", "purchases", "inventory"];

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn is_paid(invoice: &Invoice) -> bool {
    invoice.status == "paid"
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub revenue: f64,
    pub active_contracts: usize,
    pub stock_alerts: usize,
}

pub fn dashboard_stats(reader: &impl RecordReader, stock_alert_threshold: i64) -> Result<DashboardStats, StoreError> {
    let invoiced: f64 = reader
        .list::<Invoice>()?
        .iter()
        .filter(|invoice| is_paid(invoice))
        .map(|invoice| invoice.total_amount)
        .sum();
    let inbound: f64 = reader
        .list::<Transaction>()?
        .iter()
        .filter(|tx| tx.kind == FlowKind::In)
        .map(|tx| tx.amount)
        .sum();
    let active_contracts = reader
        .list::<Contract>()?
        .iter()
        .filter(|contract| contract.status == "active")
        .count();
    let stock_alerts = reader
        .list::<Product>()?
        .iter()
        .filter(|product| product.stock_quantity < stock_alert_threshold)
        .count();

    Ok(DashboardStats {
        revenue: round_cents(invoiced + inbound),
        active_contracts,
        stock_alerts,
    })
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementFigures {
    pub gross_revenue: f64,
    pub taxes: f64,
    pub net_revenue: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub operating_expenses: f64,
    pub ebitda: f64,
    pub net_profit: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineStatement {
    pub business_type: String,
    #[serde(flatten)]
    pub figures: StatementFigures,
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct IncomeStatement {
    #[serde(flatten)]
    pub total: StatementFigures,
    pub lines: Vec<LineStatement>,
}

/// Raw sums for one ledger slice, before the waterfall is applied.
#[derive(Debug, Default, Clone, Copy)]
struct Ledger {
    invoiced: f64,
    invoiced_vat: f64,
    inbound: f64,
    cogs: f64,
    opex: f64,
}

impl Ledger {
    fn add_invoice(&mut self, invoice: &Invoice) {
        self.invoiced += invoice.total_amount;
        self.invoiced_vat += invoice.vat_amount;
    }

    fn add_transaction(&mut self, tx: &Transaction) {
        match tx.kind {
            FlowKind::In => self.inbound += tx.amount,
            FlowKind::Out if is_cogs(&tx.category) => self.cogs += tx.amount,
            FlowKind::Out => self.opex += tx.amount,
        }
    }

    fn figures(&self, finance: &FinanceConfig) -> StatementFigures {
        let rate = finance.default_vat_rate;
        let gross_revenue = self.invoiced + self.inbound;
        // Inbound cash is VAT-inclusive.
        let taxes = self.invoiced_vat + self.inbound * rate / (100.0 + rate);
        let net_revenue = gross_revenue - taxes;
        let gross_profit = net_revenue - self.cogs;
        let ebitda = gross_profit - self.opex;
        let net_profit = ebitda - ebitda.max(0.0) * finance.income_tax_rate;

        StatementFigures {
            gross_revenue: round_cents(gross_revenue),
            taxes: round_cents(taxes),
            net_revenue: round_cents(net_revenue),
            cogs: round_cents(self.cogs),
            gross_profit: round_cents(gross_profit),
            operating_expenses: round_cents(self.opex),
            ebitda: round_cents(ebitda),
            net_profit: round_cents(net_profit),
        }
    }
}

fn is_cogs(category: &str) -> bool {
    COGS_CATEGORIES
        .iter()
        .any(|cogs| category.trim().eq_ignore_ascii_case(cogs))
}

/// Build the statement from paid invoices and the cash-flow ledger.
pub fn income_statement(invoices: &[Invoice], transactions: &[Transaction], finance: &FinanceConfig) -> IncomeStatement {
    let mut total = Ledger::default();
    let mut lines: BTreeMap<String, Ledger> = CORE_LINES
        .iter()
        .map(|line| (line.to_string(), Ledger::default()))
        .collect();

    for invoice in invoices.iter().filter(|invoice| is_paid(invoice)) {
        total.add_invoice(invoice);
        lines.entry(invoice.business_type.clone()).or_default().add_invoice(invoice);
    }
    for tx in transactions {
        total.add_transaction(tx);
        lines.entry(tx.business_type.clone()).or_default().add_transaction(tx);
    }

    // Core lines lead, the rest follow alphabetically.
    let mut ordered: Vec<(String, Ledger)> = lines.into_iter().collect();
    ordered.sort_by_key(|(name, _)| {
        let rank = CORE_LINES.iter().position(|core| *core == name.as_str()).unwrap_or(CORE_LINES.len());
        (rank, name.clone())
    });

    IncomeStatement {
        total: total.figures(finance),
        lines: ordered
            .into_iter()
            .map(|(business_type, ledger)| LineStatement {
                business_type,
                figures: ledger.figures(finance),
            })
            .collect(),
    }
}

pub fn load_income_statement(reader: &impl RecordReader, finance: &FinanceConfig) -> Result<IncomeStatement, StoreError> {
    let invoices = reader.list::<Invoice>()?;
    let transactions = reader.list::<Transaction>()?;
    Ok(income_statement(&invoices, &transactions, finance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use chrono::Utc;

    fn invoice(total: f64, vat: f64, status: &str, line: &str) -> Invoice {
        Invoice {
            id: 0,
            customer_name: "ACME".to_string(),
            customer_email: None,
            issue_date: Utc::now(),
            total_amount: total,
            vat_amount: vat,
            status: status.to_string(),
            business_type: line.to_string(),
        }
    }

    fn tx(kind: FlowKind, amount: f64, category: &str, line: &str) -> Transaction {
        Transaction {
            id: 0,
            date: "2026-01-15".to_string(),
            description: "entry".to_string(),
            category: category.to_string(),
            kind,
            amount,
            business_type: line.to_string(),
        }
    }

    #[test]
    fn test_statement_matches_hand_computed_figures() {
        let invoices = vec![
            invoice(1230.0, 230.0, "paid", "hardware"),
            invoice(999.0, 99.0, "pending", "hardware"),
        ];
        let transactions = vec![
            tx(FlowKind::In, 615.0, "services", "software"),
            tx(FlowKind::Out, 400.0, "Purchases", "hardware"),
            tx(FlowKind::Out, 100.0, "rent", "software"),
        ];
        let statement = income_statement(&invoices, &transactions, &FinanceConfig::default());

        // gross 1230 + 615 = 1845; taxes 230 + 615 * 23/123 = 345
        // net 1500; gross profit 1100; ebitda 1000; tax 20% -> 800
        assert_eq!(
            statement.total,
            StatementFigures {
                gross_revenue: 1845.0,
                taxes: 345.0,
                net_revenue: 1500.0,
                cogs: 400.0,
                gross_profit: 1100.0,
                operating_expenses: 100.0,
                ebitda: 1000.0,
                net_profit: 800.0,
            }
        );

        let names: Vec<&str> = statement.lines.iter().map(|l| l.business_type.as_str()).collect();
        assert_eq!(names, vec!["hardware", "software"]);

        let hardware = &statement.lines[0].figures;
        assert_eq!(hardware.gross_revenue, 1230.0);
        assert_eq!(hardware.ebitda, 600.0);
        assert_eq!(hardware.net_profit, 480.0);

        let software = &statement.lines[1].figures;
        assert_eq!(software.taxes, 115.0);
        assert_eq!(software.ebitda, 400.0);
    }

    #[test]
    fn test_losses_are_not_taxed_and_extra_lines_are_listed() {
        let transactions = vec![tx(FlowKind::Out, 250.0, "salaries", "repairs")];
        let statement = income_statement(&[], &transactions, &FinanceConfig::default());

        assert_eq!(statement.total.ebitda, -250.0);
        assert_eq!(statement.total.net_profit, -250.0);
        assert_eq!(statement.lines.len(), 3);
        assert_eq!(statement.lines[2].business_type, "repairs");
        assert_eq!(statement.lines[0].figures, StatementFigures::default());
    }

    #[test]
    fn test_statement_serializes_flat_camel_case() {
        let statement = income_statement(&[], &[], &FinanceConfig::default());
        let json = serde_json::to_value(&statement).unwrap();
        assert!(json.get("grossRevenue").is_some());
        assert!(json.get("netProfit").is_some());
        assert_eq!(json["lines"][0]["businessType"], "hardware");
        assert!(json["lines"][0].get("operatingExpenses").is_some());
    }

    #[test]
    fn test_dashboard_counts_from_one_scope() {
        let storage = Storage::temporary().unwrap();
        storage.insert(invoice(100.0, 18.7, "paid", "hardware")).unwrap();
        storage.insert(invoice(50.0, 9.35, "draft", "hardware")).unwrap();
        storage.insert(tx(FlowKind::In, 20.5, "services", "software")).unwrap();
        storage.insert(tx(FlowKind::Out, 70.0, "rent", "software")).unwrap();
        storage
            .insert(Contract {
                id: 0,
                customer_name: "ACME".to_string(),
                terms: String::new(),
                start_date: None,
                end_date: None,
                status: "active".to_string(),
            })
            .unwrap();

        let stats = dashboard_stats(&storage.read(), 10).unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                revenue: 120.5,
                active_contracts: 1,
                stock_alerts: 0,
            }
        );
    }
}
