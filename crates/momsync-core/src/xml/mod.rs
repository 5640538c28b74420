//! Planning-system (MoM) XML vocabulary.
//!
//! Elements are matched by local name only; the planning system does not
//! guarantee a stable namespace prefix.

pub mod inbound;
pub mod outbound;

use chrono::{DateTime, NaiveDateTime, Utc};
use roxmltree::Node;

/// Generic MoM envelope vocabulary.
pub const MOM2_NS: &str = "http://www.astron.nl/MoM2";
/// LOFAR-specific extension vocabulary.
pub const LOFAR_NS: &str = "http://www.astron.nl/MoM2-Lofar";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// The only measurement type that becomes a beam.
pub const UV_MEASUREMENT_TYPE: &str = "UVMeasurementType";

/// Planning-system date-time convention.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_date_time(t: DateTime<Utc>) -> String {
    t.format(DATE_TIME_FORMAT).to_string()
}

/// Parse a planning-system date-time. Values without an offset are UTC;
/// RFC 3339 values are accepted as well.
pub fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Strip a namespace prefix from a qualified name (`lofar:UVMeasurementType`).
pub(crate) fn local_part(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}

pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == local)
}

pub(crate) fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    local: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == local)
}

/// Follow a path of local element names from `node`.
pub(crate) fn descend<'a, 'input>(
    node: Node<'a, 'input>,
    path: &[&str],
) -> Option<Node<'a, 'input>> {
    path.iter().try_fold(node, |n, local| child(n, local))
}

/// Trimmed, non-empty text of a leaf element.
pub(crate) fn leaf<'a>(node: Node<'a, '_>, local: &str) -> Option<&'a str> {
    child(node, local)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Attribute value by local name, whatever namespace it was written in.
pub(crate) fn attribute<'a>(node: Node<'a, '_>, local: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == local)
        .map(|a| a.value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_time_round_trip() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(format_date_time(t), "2024-03-01T12:30:00");
        assert_eq!(parse_date_time("2024-03-01T12:30:00"), Some(t));
        assert_eq!(parse_date_time("2024-03-01T13:30:00+01:00"), Some(t));
        assert_eq!(parse_date_time("yesterday"), None);
    }

    #[test]
    fn local_part_strips_any_prefix() {
        assert_eq!(local_part("lofar:UVMeasurementType"), "UVMeasurementType");
        assert_eq!(local_part("ns7:UVMeasurementType"), "UVMeasurementType");
        assert_eq!(local_part("UVMeasurementType"), "UVMeasurementType");
    }

    #[test]
    fn lookups_ignore_prefixes() {
        let xml = r#"<a:root xmlns:a="urn:a" xmlns:b="urn:b">
            <b:outer><a:inner b:id="3"> text </a:inner></b:outer>
        </a:root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let outer = descend(doc.root_element(), &["outer"]).unwrap();
        assert_eq!(leaf(outer, "inner"), Some("text"));
        let inner = child(outer, "inner").unwrap();
        assert_eq!(attribute(inner, "id"), Some("3"));
    }
}
