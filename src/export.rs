use crate::models::Listing;

pub const HISTORY_FILE_NAME: &str = "adventure-history.csv";
pub const EMPTY_CATALOG_PLACEHOLDER: &str = "No data to export";

const HISTORY_HEADER: &str = "Title,Type,Duration (Days),Cost (₹),Rating";
const CATALOG_HEADER: &str =
    "id,title,description,imageUrl,duration,cost,type,rating,location_name";

/// CSV of the given completed listings, `None` when there is nothing to export
pub fn history_csv<'a, I>(completed: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Listing>,
{
    let rows: Vec<String> = completed
        .into_iter()
        .map(|listing| {
            format!(
                "{},{},{},{},{}",
                quoted(&listing.title),
                quoted(listing.category.as_str()),
                listing.duration,
                listing.cost,
                listing.rating
            )
        })
        .collect();

    if rows.is_empty() {
        return None;
    }
    Some(format!("{HISTORY_HEADER}\n{}", rows.join("\n")))
}

/// Full catalogue dump for administrators
pub fn catalog_csv(listings: &[Listing]) -> String {
    if listings.is_empty() {
        return EMPTY_CATALOG_PLACEHOLDER.to_string();
    }

    let rows: Vec<String> = listings
        .iter()
        .map(|l| {
            [
                field(&l.id),
                field(&l.title),
                field(&l.description),
                field(&l.image_url),
                l.duration.to_string(),
                l.cost.to_string(),
                field(l.category.as_str()),
                l.rating.to_string(),
                field(l.location_name()),
            ]
            .join(",")
        })
        .collect();

    format!("{CATALOG_HEADER}\n{}", rows.join("\n"))
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

// Quote only when the value would break the row
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        quoted(value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fallback;

    #[test]
    fn empty_history_produces_nothing() {
        assert!(history_csv(&Vec::<Listing>::new()).is_none());
    }

    #[test]
    fn history_rows_quote_text_columns() {
        let mut listings = fallback::catalog();
        listings[0].title = "Trek \"the\" Himalaya".into();

        let csv = history_csv(&listings[..2]).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines[0], HISTORY_HEADER);
        assert_eq!(lines[1], "\"Trek \"\"the\"\" Himalaya\",\"outdoors\",3,15000,4.8");
        assert_eq!(lines[2], "\"Goa Beach Relaxation\",\"outdoors\",2,8000,4.5");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn catalog_quotes_fields_with_commas() {
        let listings = fallback::catalog();
        let csv = catalog_csv(&listings);
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines[0], CATALOG_HEADER);
        assert_eq!(lines.len(), listings.len() + 1);
        assert!(lines[1].starts_with("mock-1,Himalayan Trek Adventure,Experience"));
        assert!(lines[1].ends_with(",3,15000,outdoors,4.8,Himachal Pradesh"));
        assert!(lines[4].starts_with("mock-4,Jaipur Heritage Walk,\"Wander the pink city's"));
    }

    #[test]
    fn empty_catalog_uses_placeholder() {
        assert_eq!(catalog_csv(&[]), EMPTY_CATALOG_PLACEHOLDER);
    }
}
