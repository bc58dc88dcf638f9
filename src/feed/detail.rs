use crate::models::parse_price;

const PRICE_LABELS: &[&str] = &[
    "начальная (максимальная) цена контракта",
    "начальная цена контракта",
    "начальная (максимальная) цена",
];

const REGION_LABELS: &[&str] = &["регион", "субъект рф", "место поставки товара"];

/// Fields of a notice page that the feed entry itself does not carry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoticeDetail {
    pub price: f64,
    pub region: String,
}

/// Extract price and region from a notice HTML page. Missing fields come
/// back as `0.0` and an empty string.
pub fn parse_detail_page(html: &str) -> NoticeDetail {
    let text = match html2text::from_read(html.as_bytes(), 200) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert notice page to text: {}", e);
            return NoticeDetail::default();
        }
    };

    let lines: Vec<&str> = text
        .lines()
        .map(clean_line)
        .filter(|l| !l.is_empty())
        .collect();

    NoticeDetail {
        price: value_after(&lines, PRICE_LABELS)
            .map(parse_price)
            .unwrap_or(0.0),
        region: value_after(&lines, REGION_LABELS)
            .unwrap_or_default()
            .to_string(),
    }
}

fn clean_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '│' | '─' | '|' | '*'))
}

// The value sits either after the label on the same line or on the next one
fn value_after<'a>(lines: &[&'a str], labels: &[&str]) -> Option<&'a str> {
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        let Some(label) = labels.iter().find(|label| lower.starts_with(*label)) else {
            continue;
        };

        let rest = line
            .char_indices()
            .nth(label.chars().count())
            .map(|(pos, _)| &line[pos..])
            .unwrap_or("")
            .trim_matches(|c: char| c.is_whitespace() || c == ':');
        if !rest.is_empty() {
            return Some(rest);
        }
        return lines.get(i + 1).copied();
    }
    None
}
