use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{AppError, Result};
use crate::models::{parse_price, TenderRecord};

use super::NOTICE_URL_PREFIX;

// Element local names per field, most specific first
const ID_TAGS: &[&str] = &["regNum", "purchaseNumber"];
const TITLE_TAGS: &[&str] = &["purchaseObjectInfo", "name"];
const PRICE_TAGS: &[&str] = &["initialSum", "maxPrice"];
const REGION_TAGS: &[&str] = &["region", "regionName", "deliveryPlace"];
const URL_TAGS: &[&str] = &["href", "printForm"];
const PUBLISHED_TAGS: &[&str] = &["publishDate", "docPublishDate", "publishDTInEIS"];

/// Normalize one notice document from the bulk archive. Namespaces are
/// ignored; the first occurrence of each element wins.
pub fn parse_notice_xml(xml: &str) -> Result<TenderRecord> {
    let found = collect_fields(xml)?;
    let first = |tags: &[&str]| tags.iter().find_map(|t| found.get(*t).cloned());

    let id = first(ID_TAGS)
        .ok_or_else(|| AppError::Other(anyhow::anyhow!("notice without regNum")))?;
    let url = first(URL_TAGS)
        .filter(|u| u.starts_with("http"))
        .unwrap_or_else(|| format!("{NOTICE_URL_PREFIX}{id}"));

    Ok(TenderRecord {
        title: first(TITLE_TAGS).unwrap_or_else(|| "Без названия".to_string()),
        price: first(PRICE_TAGS).map(|p| parse_price(&p)).unwrap_or(0.0),
        region: first(REGION_TAGS).unwrap_or_default(),
        published_at: first(PUBLISHED_TAGS).and_then(|s| parse_published(&s)),
        url,
        id,
    })
}

// Field -> (depth, text). The shallowest occurrence wins, so a nested
// `<placingWay><name>` cannot shadow the notice's own `<name>`.
fn collect_fields(xml: &str) -> Result<HashMap<&'static str, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let wanted: Vec<&'static str> = [ID_TAGS, TITLE_TAGS, PRICE_TAGS, REGION_TAGS, URL_TAGS, PUBLISHED_TAGS]
        .concat();
    let mut found: HashMap<&'static str, (usize, String)> = HashMap::new();
    let mut current: Option<(&'static str, usize)> = None;
    let mut depth = 0usize;

    let mut keep = |field: Option<(&'static str, usize)>, text: String| {
        let Some((tag, at)) = field else { return };
        if text.is_empty() {
            return;
        }
        match found.get(tag) {
            Some((seen_at, _)) if *seen_at <= at => {}
            _ => {
                found.insert(tag, (at, text));
            }
        }
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let local = e.local_name();
                current = wanted
                    .iter()
                    .copied()
                    .find(|tag| tag.as_bytes() == local.as_ref())
                    .map(|tag| (tag, depth));
            }
            Event::Text(t) => keep(current, t.unescape()?.trim().to_string()),
            Event::CData(c) => keep(current, String::from_utf8_lossy(&c.into_inner()).trim().to_string()),
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                current = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found.into_iter().map(|(tag, (_, text))| (tag, text)).collect())
}

fn parse_published(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_notice() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ns2:export xmlns:ns2="http://zakupki.gov.ru/oos/export/1" xmlns="http://zakupki.gov.ru/oos/types/1">
  <ns2:notification>
    <regNum>0373100000126000001</regNum>
    <publishDate>2026-10-17T09:55:00+03:00</publishDate>
    <name>Поставка ноутбуков</name>
    <region>Москва</region>
    <initialSum>900000.00</initialSum>
    <placingWay><name>Электронный аукцион</name></placingWay>
  </ns2:notification>
</ns2:export>"#;

        let record = parse_notice_xml(xml).unwrap();
        assert_eq!(record.id, "0373100000126000001");
        assert_eq!(record.title, "Поставка ноутбуков");
        assert_eq!(record.price, 900_000.0);
        assert_eq!(record.region, "Москва");
        assert_eq!(
            record.url,
            "https://zakupki.gov.ru/epz/order/notice/ea20/view/common-info.html?regNumber=0373100000126000001"
        );
        assert!(record.published_at.is_some());
    }

    #[test]
    fn unparsable_sum_becomes_unknown_price() {
        let xml = "<notification><regNum>1</regNum><name>Бумага</name><initialSum>n/a</initialSum></notification>";
        let record = parse_notice_xml(xml).unwrap();
        assert_eq!(record.price, 0.0);
        assert!(!record.has_known_price());
    }

    #[test]
    fn purchase_object_info_wins_over_name() {
        let xml = r#"<fcsNotificationEA44>
            <purchaseNumber>0456</purchaseNumber>
            <placingWay><name>Электронный аукцион</name></placingWay>
            <purchaseObjectInfo>Ремонт кровли</purchaseObjectInfo>
            <lot><maxPrice>1500000</maxPrice></lot>
        </fcsNotificationEA44>"#;

        let record = parse_notice_xml(xml).unwrap();
        assert_eq!(record.id, "0456");
        assert_eq!(record.title, "Ремонт кровли");
        assert_eq!(record.price, 1_500_000.0);
    }

    #[test]
    fn nested_name_does_not_shadow_the_notice_name() {
        let xml = r#"<export>
  <notification>
    <regNum>0789</regNum>
    <placingWay><code>EA44</code><name>Электронный аукцион</name></placingWay>
    <name>Поставка бумаги</name>
  </notification>
</export>"#;

        let record = parse_notice_xml(xml).unwrap();
        assert_eq!(record.title, "Поставка бумаги");
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let xml = "<notification><name>Без номера</name></notification>";
        assert!(parse_notice_xml(xml).is_err());
    }
}
