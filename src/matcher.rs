use crate::models::{SubscriberFilter, TenderRecord};

/// Decide whether `record` satisfies `filter`. Keyword, region and price
/// tests must all pass.
pub fn matches(record: &TenderRecord, filter: &SubscriberFilter) -> bool {
    keywords_match(record, filter) && region_matches(record, filter) && price_matches(record, filter)
}

fn keywords_match(record: &TenderRecord, filter: &SubscriberFilter) -> bool {
    if filter.keywords.is_empty() {
        return true;
    }
    let title = record.title.to_lowercase();
    filter
        .keywords
        .iter()
        .any(|kw| title.contains(&kw.to_lowercase()))
}

fn region_matches(record: &TenderRecord, filter: &SubscriberFilter) -> bool {
    if filter.matches_any_region() {
        return true;
    }
    match &filter.region {
        Some(region) => record
            .region
            .to_lowercase()
            .contains(&region.trim().to_lowercase()),
        None => true,
    }
}

// Unknown price never violates a ceiling
fn price_matches(record: &TenderRecord, filter: &SubscriberFilter) -> bool {
    match filter.max_price {
        Some(ceiling) if record.has_known_price() => record.price <= ceiling,
        _ => true,
    }
}
