//! Sale history grouping and reporting
//!
//! Sale lines are stored flat; the history view regroups them by checkout.
//! All functions here produce the same output for any input row order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;

use crate::models::{
    SaleFilters, SaleGroup, SaleGroupLine, SaleLine, SaleRow, SaleSortKey, SellerSummary,
};
use crate::types::DateRange;

/// Grouping key of a line; lines written before group ids existed form a
/// group of their own.
pub fn group_key(line: &SaleLine) -> String {
    match line.sale_group_id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("sale_line_{}", line.id),
    }
}

/// Regroup sale rows by checkout, ordered newest first
pub fn group_sale_rows(rows: Vec<SaleRow>) -> Vec<SaleGroup> {
    let mut buckets: BTreeMap<String, Vec<SaleRow>> = BTreeMap::new();
    for row in rows {
        buckets.entry(group_key(&row.line)).or_default().push(row);
    }

    let mut groups: Vec<SaleGroup> = buckets
        .into_iter()
        .map(|(key, mut rows)| {
            rows.sort_by_key(|r| r.line.id);
            build_group(key, rows)
        })
        .collect();

    sort_sale_groups(&mut groups, SaleSortKey::Newest);
    groups
}

fn build_group(key: String, rows: Vec<SaleRow>) -> SaleGroup {
    // Header fields come from the earliest line of the group
    let head = rows[0].line.clone();
    let created_at = rows
        .iter()
        .map(|r| r.line.created_at)
        .min()
        .unwrap_or(head.created_at);
    let transferred = rows.iter().any(|r| r.line.transferred);
    let original_seller = rows.iter().find_map(|r| r.line.original_seller.clone());

    let lines: Vec<SaleGroupLine> = rows
        .into_iter()
        .map(|row| SaleGroupLine {
            id: row.line.id,
            allocation_id: row.line.allocation_id,
            batch_id: row.batch_id,
            product_name: row.line.product_name,
            quantity: row.line.quantity,
            unit_price: row.line.unit_price,
            line_total: row.line.line_total,
            serial_number: row.serial_number,
            barcode: row.barcode,
            color: row.color,
            description: row.description,
            created_at: row.line.created_at,
        })
        .collect();
    let total = lines.iter().map(|l| l.line_total).sum();

    SaleGroup {
        sale_group_id: key,
        customer_name: head.customer_name,
        phone: head.phone,
        address: head.address,
        customer_type: head.customer_type,
        notes: head.notes,
        seller_id: head.seller_id,
        seller_name: head.seller_name,
        seller_email: head.seller_email,
        payment_method: head.payment_method,
        pix_amount: head.pix_amount,
        card_amount: head.card_amount,
        cash_amount: head.cash_amount,
        photo_path: head.photo_path,
        transferred,
        original_seller,
        created_at,
        total,
        lines,
    }
}

impl SaleFilters {
    pub fn date_range(&self) -> DateRange {
        DateRange {
            start: self.from,
            end: self.to,
        }
    }

    /// Whether a whole group passes the filters
    pub fn matches(&self, group: &SaleGroup) -> bool {
        if let Some(seller_id) = self.seller_id {
            if group.seller_id != seller_id {
                return false;
            }
        }

        if let Some(customer) = non_blank(&self.customer) {
            if !group
                .customer_name
                .to_lowercase()
                .contains(&customer.to_lowercase())
            {
                return false;
            }
        }

        if let Some(code) = non_blank(&self.identity_code) {
            let code = code.to_lowercase();
            let hit = group.lines.iter().any(|l| {
                [l.serial_number.as_deref(), l.barcode.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|v| v.to_lowercase().contains(&code))
            });
            if !hit {
                return false;
            }
        }

        self.date_range().contains(group.created_at.date_naive())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn filter_sale_groups(groups: Vec<SaleGroup>, filters: &SaleFilters) -> Vec<SaleGroup> {
    groups.into_iter().filter(|g| filters.matches(g)).collect()
}

/// Sort groups; ties fall back to the group id so the order is total
pub fn sort_sale_groups(groups: &mut [SaleGroup], key: SaleSortKey) {
    groups.sort_by(|a, b| {
        let primary = match key {
            SaleSortKey::Newest => b.created_at.cmp(&a.created_at),
            SaleSortKey::Oldest => a.created_at.cmp(&b.created_at),
            SaleSortKey::HighestValue => b.total.cmp(&a.total),
            SaleSortKey::LowestValue => a.total.cmp(&b.total),
            SaleSortKey::Seller => a
                .seller_name
                .to_lowercase()
                .cmp(&b.seller_name.to_lowercase()),
        };
        match primary {
            Ordering::Equal => a.sale_group_id.cmp(&b.sale_group_id),
            other => other,
        }
    });
}

/// Per-seller totals, highest value first
pub fn summarize_sellers(lines: &[SaleLine]) -> Vec<SellerSummary> {
    #[derive(Default)]
    struct Acc {
        seller_name: String,
        groups: BTreeSet<String>,
        total_value: Decimal,
        units_sold: i64,
        products: BTreeSet<String>,
    }

    let mut by_email: HashMap<&str, Acc> = HashMap::new();
    let mut ordered: Vec<&SaleLine> = lines.iter().collect();
    ordered.sort_by_key(|l| l.id);

    for line in ordered {
        let acc = by_email.entry(line.seller_email.as_str()).or_default();
        if acc.seller_name.is_empty() {
            acc.seller_name = line.seller_name.clone();
        }
        acc.groups.insert(group_key(line));
        acc.total_value += line.line_total;
        acc.units_sold += i64::from(line.quantity);
        acc.products.insert(line.product_name.clone());
    }

    let mut summaries: Vec<SellerSummary> = by_email
        .into_iter()
        .map(|(email, acc)| SellerSummary {
            seller_name: acc.seller_name,
            seller_email: email.to_string(),
            sale_count: acc.groups.len(),
            total_value: acc.total_value,
            units_sold: acc.units_sold,
            distinct_products: acc.products.len(),
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.total_value
            .cmp(&a.total_value)
            .then_with(|| a.seller_email.cmp(&b.seller_email))
    });
    summaries
}
