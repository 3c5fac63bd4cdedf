//! Invoice numbering

/// Next invoice number for `prefix`, one above the highest number already issued.
///
/// Ids carrying another prefix or a non-numeric suffix are ignored.
pub fn next_invoice_number<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let next = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|number| number.parse::<u64>().ok())
        .max()
        .map_or(1, |highest| highest.saturating_add(1));

    format!("{prefix}{next}")
}
