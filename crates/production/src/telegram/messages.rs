//! Channel message builders.
//!
//! Messages are Uzbek, the shop floor's working language, and use the Bot
//! API's HTML subset. Free text from orders is escaped before it is embedded.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::models::Order;

const DATE_TIME: &str = "%Y-%m-%d %H:%M";

/// Escape text for Telegram's HTML parse mode.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(DATE_TIME).to_string()
}

fn order_header(order: &Order) -> String {
    format!(
        "Buyurtma raqami: <b>{}</b>\nMijoz: {}\n",
        order.order_number,
        escape_html(&order.customer_name)
    )
}

/// A new order was entered.
#[must_use]
pub fn build_new_order_message(order: &Order) -> String {
    let mut message = format!("🔔 <b>Yangi Buyurtma Qo'shildi!</b>\n\n{}", order_header(order));
    let _ = writeln!(message, "Ish turi: {}", order.worker_type);
    let _ = writeln!(message, "Kvadratura: {} m²", order.area);
    if let Some(deadline) = order.deadline {
        let _ = writeln!(message, "Muddat: {}", format_time(deadline));
    }
    message.truncate(message.trim_end().len());
    message
}

/// A worker finished their stage.
#[must_use]
pub fn build_worker_finished_message(order: &Order, worker_name: &str) -> String {
    let mut message = format!("✅ <b>Buyurtma Yakunlandi!</b>\n\n{}", order_header(order));
    let _ = writeln!(message, "Usta: {}", escape_html(worker_name));
    if let Some(finished) = order.worker_finished_at {
        let _ = writeln!(message, "Yakunlandi: {}", format_time(finished));
    }
    if let Some(comment) = order.worker_comment.as_deref() {
        let _ = writeln!(message, "Izoh: {}", escape_html(comment));
    }
    message.truncate(message.trim_end().len());
    message
}

/// A worker finished after the deadline.
#[must_use]
pub fn build_deadline_breach_message(order: &Order) -> String {
    let mut message = format!(
        "⚠️ <b>Muddatidan kech yakunlandi!</b>\n\n{}",
        order_header(order)
    );
    if let Some(deadline) = order.deadline {
        let _ = writeln!(message, "Muddat: {}", format_time(deadline));
    }
    if let Some(finished) = order.worker_finished_at {
        let _ = writeln!(message, "Yakunlandi: {}", format_time(finished));
    }
    message.truncate(message.trim_end().len());
    message
}

/// An open order is past its deadline.
#[must_use]
pub fn build_overdue_message(order: &Order) -> String {
    let mut message = format!("❗️ <b>MUDDATI O'TDI!</b> ⏳\n\n{}", order_header(order));
    if let Some(deadline) = order.deadline {
        let _ = writeln!(message, "Muddat: {}", format_time(deadline));
    }
    let _ = writeln!(message, "Status: {}", order.status.label());
    message.push_str("\nIltimos, zudlik bilan tekshiring!");
    message
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use eco_prom_core::{Money, OrderId, OrderNumber, OrderStatus, UserId, WorkerType};
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{DoorSpec, PanelSpec};

    fn order() -> Order {
        let created = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        Order {
            id: OrderId::new(12),
            order_number: OrderNumber::new(2026, 12).unwrap(),
            customer_name: "Aziz & Co <LLC>".to_owned(),
            product_name: None,
            worker_type: WorkerType::Panel,
            status: OrderStatus::UstaBoshla,
            panel: PanelSpec::default(),
            door: DoorSpec::default(),
            area: Decimal::new(8450, 2),
            total_price: Money::ZERO,
            prepayment: Money::ZERO,
            deadline: Some(Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap()),
            comment: None,
            worker_comment: None,
            drawing_reference: None,
            parent_order_id: None,
            created_by: UserId::new(1),
            worker_started_at: None,
            worker_finished_at: Some(Utc.with_ymd_and_hms(2026, 3, 11, 8, 30, 0).unwrap()),
            start_evidence: None,
            start_evidence_uploaded_at: None,
            finish_evidence: None,
            finish_evidence_uploaded_at: None,
            deadline_breach_alert_sent: false,
            overdue_channel_alert_sent: false,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & c > \"d\""), "a &lt; b &amp; c &gt; &quot;d&quot;");
        assert_eq!(escape_html("oddiy matn"), "oddiy matn");
    }

    #[test]
    fn test_new_order_message() {
        let message = build_new_order_message(&order());
        assert!(message.starts_with("🔔 <b>Yangi Buyurtma Qo'shildi!</b>"));
        assert!(message.contains("<b>ORD-2026-0012</b>"));
        assert!(message.contains("Mijoz: Aziz &amp; Co &lt;LLC&gt;"));
        assert!(message.contains("Kvadratura: 84.50 m²"));
        assert!(message.ends_with("Muddat: 2026-03-10 18:00"));
    }

    #[test]
    fn test_worker_finished_message() {
        let mut o = order();
        o.worker_comment = Some("2 ta list qoldi".to_owned());
        let message = build_worker_finished_message(&o, "Jasur");
        assert!(message.contains("Usta: Jasur"));
        assert!(message.contains("Yakunlandi: 2026-03-11 08:30"));
        assert!(message.ends_with("Izoh: 2 ta list qoldi"));
    }

    #[test]
    fn test_deadline_breach_message() {
        let message = build_deadline_breach_message(&order());
        assert!(message.contains("Muddatidan kech"));
        assert!(message.contains("Muddat: 2026-03-10 18:00"));
        assert!(message.contains("Yakunlandi: 2026-03-11 08:30"));
    }

    #[test]
    fn test_overdue_message() {
        let message = build_overdue_message(&order());
        assert!(message.contains("MUDDATI O'TDI!"));
        assert!(message.contains("Status: 4. Usta Boshladi"));
        assert!(message.ends_with("Iltimos, zudlik bilan tekshiring!"));
    }
}
