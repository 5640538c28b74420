//! Planning-system XML → [`ObservationRecord`].
//!
//! ```text
//! observation @mom2Id
//! ├── currentStatus/<x>Status
//! ├── observationAttributes
//! │   ├── startTime, endTime
//! │   └── specification/{antenna, clock, instrumentFilter, stationSet, stations}
//! └── children/item*/measurement[@xsi:type=UVMeasurementType] @mom2Id
//!     └── measurementAttributes/specification
//!         ├── ra, dec, equinox, duration
//!         └── subbandsSpecification/subbands
//! ```
//!
//! Absent leaves leave their field unset. Present values that cannot be
//! parsed or translated reject the whole document.

use std::collections::HashSet;

use roxmltree::{Document, Node};

use super::{attribute, child, children, descend, leaf, local_part, parse_date_time, XSI_NS};
use crate::duration;
use crate::error::CodecError;
use crate::model::{Beam, ObservationRecord};
use crate::subbands::Subbands;
use crate::translate;

pub fn decode(xml: &str) -> Result<ObservationRecord, CodecError> {
    let doc = Document::parse(xml)?;
    decode_document(&doc)
}

pub fn decode_document(doc: &Document<'_>) -> Result<ObservationRecord, CodecError> {
    let root = doc.root_element();
    if root.tag_name().name() != "observation" {
        return Err(CodecError::UnexpectedRoot(root.tag_name().name().to_string()));
    }

    let mut record = ObservationRecord {
        mom2_id: mom2_id(root)?,
        ..Default::default()
    };

    if let Some(status) = status_value(root) {
        record.status = Some(translate::to_execution_status(&status)?);
    }

    if let Some(attrs) = child(root, "observationAttributes") {
        record.start_time = date_time_leaf(attrs, "startTime")?;
        record.end_time = date_time_leaf(attrs, "endTime")?;
        if let Some(spec) = child(attrs, "specification") {
            apply_specification(&mut record, spec)?;
        }
    }

    if let Some(items) = child(root, "children") {
        let mut seen = HashSet::new();
        for item in children(items, "item") {
            let Some(measurement) = child(item, "measurement") else {
                continue;
            };
            if !is_uv_measurement(measurement) {
                tracing::debug!(
                    kind = measurement_type(measurement).unwrap_or("<none>"),
                    "skipping non-UV measurement"
                );
                continue;
            }
            let beam = decode_beam(measurement)?;
            if let Some(id) = beam.mom2_id {
                if !seen.insert(id) {
                    return Err(CodecError::DuplicateBeam(id));
                }
            }
            record.beams.push(beam);
        }
    }

    Ok(record)
}

fn mom2_id(node: Node<'_, '_>) -> Result<Option<i64>, CodecError> {
    match attribute(node, "mom2Id").map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| CodecError::invalid("mom2Id", v)),
    }
}

/// Local name of the single element under `currentStatus`, minus its
/// `Status` suffix.
fn status_value(node: Node<'_, '_>) -> Option<String> {
    let status = child(node, "currentStatus")?
        .children()
        .find(|c| c.is_element())?;
    let name = status.tag_name().name();
    Some(name.strip_suffix("Status").unwrap_or(name).to_string())
}

fn date_time_leaf(
    node: Node<'_, '_>,
    local: &'static str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, CodecError> {
    leaf(node, local)
        .map(|v| parse_date_time(v).ok_or_else(|| CodecError::invalid(local, v)))
        .transpose()
}

fn apply_specification(
    record: &mut ObservationRecord,
    spec: Node<'_, '_>,
) -> Result<(), CodecError> {
    let antenna = leaf(spec, "antenna");
    if let Some(antenna) = antenna {
        record.antenna_array = Some(translate::to_execution_antenna_array(antenna)?);
        record.antenna_set = Some(translate::to_execution_antenna_set(antenna)?);
    }
    if let Some(clock) = leaf(spec, "clock") {
        record.clock_mode = Some(translate::to_execution_clock_mode(clock)?);
    }
    // A band filter is named per antenna array.
    match (leaf(spec, "instrumentFilter"), antenna) {
        (Some(filter), Some(antenna)) => {
            record.band_filter = Some(translate::to_execution_band_filter(antenna, filter)?);
        }
        (Some(filter), None) => {
            tracing::debug!(filter, "instrumentFilter without antenna; band filter left unset");
        }
        (None, _) => {}
    }
    record.station_set = leaf(spec, "stationSet").map(str::to_string);
    if let Some(stations) = child(spec, "stations") {
        record.stations = station_names(stations);
    }
    Ok(())
}

/// Either `station` children (named by attribute or text) or a
/// comma-separated leaf.
fn station_names(stations: Node<'_, '_>) -> Vec<String> {
    let named: Vec<String> = children(stations, "station")
        .filter_map(|s| attribute(s, "name").or_else(|| s.text()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if !named.is_empty() {
        return named;
    }
    stations
        .text()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn measurement_type<'a>(measurement: Node<'a, '_>) -> Option<&'a str> {
    measurement
        .attributes()
        .find(|a| a.name() == "type" && a.namespace() == Some(XSI_NS))
        .map(|a| a.value())
}

fn is_uv_measurement(measurement: Node<'_, '_>) -> bool {
    measurement_type(measurement)
        .is_some_and(|t| local_part(t.trim()) == super::UV_MEASUREMENT_TYPE)
}

fn decode_beam(measurement: Node<'_, '_>) -> Result<Beam, CodecError> {
    let mut beam = Beam {
        mom2_id: mom2_id(measurement)?,
        ..Default::default()
    };
    let Some(spec) = descend(measurement, &["measurementAttributes", "specification"]) else {
        return Ok(beam);
    };

    beam.ra = float_leaf(spec, "ra")?;
    beam.dec = float_leaf(spec, "dec")?;
    beam.equinox = leaf(spec, "equinox").map(str::to_string);
    if let Some(d) = leaf(spec, "duration") {
        beam.duration_secs =
            Some(duration::parse_seconds(d).ok_or_else(|| CodecError::invalid("duration", d))?);
    }
    if let Some(sb) = child(spec, "subbandsSpecification").and_then(|s| leaf(s, "subbands")) {
        beam.subbands = Some(Subbands::parse(sb)?);
    }
    Ok(beam)
}

fn float_leaf(node: Node<'_, '_>, local: &'static str) -> Result<Option<f64>, CodecError> {
    leaf(node, local)
        .map(|v| {
            v.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| CodecError::invalid(local, v))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Domain;
    use crate::types::ExecutionStatus;

    const OBSERVATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<lofar:observation xmlns:lofar="http://www.astron.nl/MoM2-Lofar"
                   xmlns:mom2="http://www.astron.nl/MoM2"
                   xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                   mom2Id="1042">
  <currentStatus><mom2:specifiedStatus/></currentStatus>
  <lofar:observationAttributes>
    <startTime>2024-03-01T12:00:00</startTime>
    <endTime>2024-03-01T14:00:00</endTime>
    <specification>
      <antenna>HBA Dual</antenna>
      <clock>200 MHz</clock>
      <instrumentFilter>110-190 MHz</instrumentFilter>
      <stationSet>Custom</stationSet>
      <stations><station name="CS001"/><station name="RS106"/></stations>
    </specification>
  </lofar:observationAttributes>
  <children>
    <item index="0">
      <lofar:measurement xsi:type="lofar:UVMeasurementType" mom2Id="1043">
        <measurementAttributes>
          <specification>
            <ra>123.4</ra>
            <dec>-12.5</dec>
            <equinox>J2000</equinox>
            <duration>PT3600S</duration>
            <subbandsSpecification><subbands>1,2,3</subbands></subbandsSpecification>
          </specification>
        </measurementAttributes>
      </lofar:measurement>
    </item>
    <item index="1">
      <lofar:measurement xsi:type="lofar:BFMeasurementType" mom2Id="1044"/>
    </item>
    <item index="2"/>
  </children>
</lofar:observation>"#;

    #[test]
    fn decodes_full_observation() {
        let r = decode(OBSERVATION).unwrap();
        assert_eq!(r.mom2_id, Some(1042));
        assert_eq!(r.status, Some(ExecutionStatus::Approved));
        assert_eq!(r.antenna_array.as_deref(), Some("HBA"));
        assert_eq!(r.antenna_set.as_deref(), Some("HBA_DUAL"));
        assert_eq!(r.clock_mode.as_deref(), Some("<<ClockMode200"));
        assert_eq!(r.band_filter.as_deref(), Some("HBA_110_190"));
        assert_eq!(r.station_set.as_deref(), Some("Custom"));
        assert_eq!(r.stations, vec!["CS001", "RS106"]);
        assert!(r.start_time.is_some() && r.end_time.is_some());
    }

    #[test]
    fn only_uv_measurements_become_beams() {
        let r = decode(OBSERVATION).unwrap();
        assert_eq!(r.beams.len(), 1);
        let beam = r.beam(1043).unwrap();
        assert_eq!(beam.ra, Some(123.4));
        assert_eq!(beam.dec, Some(-12.5));
        assert_eq!(beam.equinox.as_deref(), Some("J2000"));
        assert_eq!(beam.duration_secs, Some(3600));
        let subbands = beam.subbands.as_ref().unwrap();
        assert_eq!(subbands.to_string(), "[1,2,3]");
    }

    #[test]
    fn prefixes_do_not_matter() {
        let xml = r#"<p:observation xmlns:p="http://www.astron.nl/MoM2-Lofar"
                         xmlns:q="http://www.astron.nl/MoM2"
                         xmlns:i="http://www.w3.org/2001/XMLSchema-instance" mom2Id="5">
            <p:currentStatus><q:activeStatus/></p:currentStatus>
            <p:children><p:item>
              <p:measurement i:type="p:UVMeasurementType" mom2Id="6"/>
            </p:item></p:children>
        </p:observation>"#;
        let r = decode(xml).unwrap();
        assert_eq!(r.status, Some(ExecutionStatus::Running));
        assert_eq!(r.beams.len(), 1);
        assert_eq!(r.beams[0].mom2_id, Some(6));
    }

    #[test]
    fn missing_mom2_id_is_unset() {
        let r = decode("<observation/>").unwrap();
        assert_eq!(r.mom2_id, None);
        assert_eq!(r.status, None);
        assert!(r.beams.is_empty());
    }

    #[test]
    fn non_numeric_mom2_id_is_rejected() {
        let err = decode(r#"<observation mom2Id="abc"/>"#).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { field: "mom2Id", .. }));
    }

    #[test]
    fn unmapped_status_is_rejected() {
        let xml = r#"<observation mom2Id="1"><currentStatus><onHoldStatus/></currentStatus></observation>"#;
        match decode(xml) {
            Err(CodecError::Unmapped(u)) => {
                assert_eq!(u.domain, Domain::Status);
                assert_eq!(u.value, "onHold");
            }
            other => panic!("expected Unmapped, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_beam_ids_are_rejected() {
        let xml = r#"<observation xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" mom2Id="1">
            <children>
              <item><measurement xsi:type="UVMeasurementType" mom2Id="2"/></item>
              <item><measurement xsi:type="UVMeasurementType" mom2Id="2"/></item>
            </children>
        </observation>"#;
        assert!(matches!(decode(xml), Err(CodecError::DuplicateBeam(2))));
    }

    #[test]
    fn filter_without_antenna_leaves_band_filter_unset() {
        let xml = OBSERVATION.replace("<antenna>HBA Dual</antenna>", "");
        let r = decode(&xml).unwrap();
        assert_eq!(r.band_filter, None);
        assert_eq!(r.antenna_array, None);
        assert_eq!(r.clock_mode.as_deref(), Some("<<ClockMode200"));
    }

    #[test]
    fn comma_separated_stations() {
        let xml = r#"<observation><observationAttributes><specification>
            <stations>CS001, CS002 ,CS003</stations>
        </specification></observationAttributes></observation>"#;
        let r = decode(xml).unwrap();
        assert_eq!(r.stations, vec!["CS001", "CS002", "CS003"]);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(decode("<observation>"), Err(CodecError::Malformed(_))));
        assert!(matches!(
            decode("<project/>"),
            Err(CodecError::UnexpectedRoot(_))
        ));
    }

    #[test]
    fn bad_duration_is_rejected() {
        let xml = r#"<observation xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
            <children><item><measurement xsi:type="UVMeasurementType">
              <measurementAttributes><specification><duration>an hour</duration></specification></measurementAttributes>
            </measurement></item></children>
        </observation>"#;
        assert!(matches!(
            decode(xml),
            Err(CodecError::InvalidValue { field: "duration", .. })
        ));
    }
}
