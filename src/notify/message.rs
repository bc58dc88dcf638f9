use crate::models::TenderRecord;

const NO_VALUE: &str = "—";

/// A notification rendered twice: with Telegram HTML markup and as plain
/// text for transports that reject the markup.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub html: String,
    pub plain: String,
}

pub fn format_tender(record: &TenderRecord) -> OutgoingMessage {
    let price = if record.has_known_price() {
        format!("{} ₽", format_price(record.price))
    } else {
        NO_VALUE.to_string()
    };
    let region = if record.region.trim().is_empty() {
        NO_VALUE
    } else {
        record.region.trim()
    };
    let published = record
        .published_at
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NO_VALUE.to_string());

    let html = format!(
        "<b>НОВЫЙ ТЕНДЕР!</b>\n<b>{}</b>\nЦена: {}\nРегион: {}\nОпубликовано: {}\n<a href=\"{}\">Открыть в ЕИС</a>",
        html_escape::encode_text(&record.title),
        html_escape::encode_text(&price),
        html_escape::encode_text(region),
        published,
        html_escape::encode_double_quoted_attribute(&record.url),
    );
    let plain = format!(
        "НОВЫЙ ТЕНДЕР!\n{}\nЦена: {}\nРегион: {}\nОпубликовано: {}\nОткрыть в ЕИС: {}",
        record.title, price, region, published, record.url,
    );

    OutgoingMessage { html, plain }
}

/// Group thousands with spaces, keeping kopecks only when present:
/// `1234567.5` -> `1 234 567,50`.
pub fn format_price(price: f64) -> String {
    let kopecks = (price * 100.0).round() as u64;
    let rubles = (kopecks / 100).to_string();
    let fraction = kopecks % 100;

    let mut grouped = String::with_capacity(rubles.len() + rubles.len() / 3);
    for (i, ch) in rubles.chars().enumerate() {
        if i > 0 && (rubles.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    if fraction == 0 {
        grouped
    } else {
        format!("{grouped},{fraction:02}")
    }
}
