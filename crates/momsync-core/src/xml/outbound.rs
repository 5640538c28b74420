//! [`ObservationRecord`] → planning-system XML.
//!
//! The document mirrors what [`super::inbound`] reads: observation status and
//! specification, then one `measurement` per beam with its own status and,
//! when the timing is determinable, its start and end time.
//!
//! Beam timing walks the record's angle-time offsets positionally: beam `i`
//! starts at `start_time + angle_times[i]` and runs for its requested
//! duration. A finished observation reports a beam that starts or ends
//! after the observation's end as failed.

use chrono::{DateTime, Duration, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{format_date_time, LOFAR_NS, MOM2_NS, UV_MEASUREMENT_TYPE, XSI_NS};
use crate::error::CodecError;
use crate::model::{parse_offset, Beam, ObservationRecord};
use crate::translate;
use crate::types::ExecutionStatus;

pub fn encode(record: &ObservationRecord) -> Result<String, CodecError> {
    let mut out = XmlOut::new();
    out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("lofar:observation");
    root.push_attribute(("xmlns:lofar", LOFAR_NS));
    root.push_attribute(("xmlns:mom2", MOM2_NS));
    root.push_attribute(("xmlns:xsi", XSI_NS));
    let id;
    if let Some(mom2_id) = record.mom2_id {
        id = mom2_id.to_string();
        root.push_attribute(("mom2Id", id.as_str()));
    }
    out.event(Event::Start(root))?;

    if let Some(status) = record.status {
        out.status(&status_words(status))?;
    }
    write_observation_attributes(&mut out, record)?;

    if !record.beams.is_empty() {
        out.start("children")?;
        for (index, beam) in record.beams.iter().enumerate() {
            let idx = index.to_string();
            let mut item = BytesStart::new("item");
            item.push_attribute(("index", idx.as_str()));
            out.event(Event::Start(item))?;
            write_measurement(&mut out, record, index, beam)?;
            out.end("item")?;
        }
        out.end("children")?;
    }

    out.end("lofar:observation")?;
    out.finish()
}

/// Planning-system words for an execution status.
fn status_words(status: ExecutionStatus) -> String {
    status.to_planning().as_str().to_string()
}

fn write_observation_attributes(
    out: &mut XmlOut,
    record: &ObservationRecord,
) -> Result<(), CodecError> {
    out.start("lofar:observationAttributes")?;
    if let Some(t) = record.start_time {
        out.leaf("startTime", &format_date_time(t))?;
    }
    if let Some(t) = record.end_time {
        out.leaf("endTime", &format_date_time(t))?;
    }

    out.start("specification")?;
    if let Some(set) = &record.antenna_set {
        if let Some(antenna) = mapped(translate::to_planning_antenna(set), record)? {
            out.leaf("antenna", &antenna)?;
        }
    }
    if let Some(clock) = &record.clock_mode {
        if let Some(clock) = mapped(translate::to_planning_clock_mode(clock), record)? {
            out.leaf("clock", &clock)?;
        }
    }
    if let Some(filter) = &record.band_filter {
        if let Some(filter) = mapped(translate::to_planning_band_filter(filter), record)? {
            out.leaf("instrumentFilter", &filter)?;
        }
    }
    if let Some(set) = &record.station_set {
        out.leaf("stationSet", set)?;
    }
    if !record.stations.is_empty() {
        out.start("stations")?;
        for name in &record.stations {
            let mut station = BytesStart::new("station");
            station.push_attribute(("name", name.as_str()));
            out.event(Event::Empty(station))?;
        }
        out.end("stations")?;
    }
    out.end("specification")?;
    out.end("lofar:observationAttributes")
}

/// Unmappable execution values are left out of the document rather than
/// holding back the status update.
fn mapped(
    result: Result<String, crate::error::UnmappedValue>,
    record: &ObservationRecord,
) -> Result<Option<String>, CodecError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(mom2_id = ?record.mom2_id, "omitting field: {e}");
            Ok(None)
        }
    }
}

fn write_measurement(
    out: &mut XmlOut,
    record: &ObservationRecord,
    index: usize,
    beam: &Beam,
) -> Result<(), CodecError> {
    let mut measurement = BytesStart::new("lofar:measurement");
    let kind = format!("lofar:{UV_MEASUREMENT_TYPE}");
    measurement.push_attribute(("xsi:type", kind.as_str()));
    let id;
    if let Some(mom2_id) = beam.mom2_id {
        id = mom2_id.to_string();
        measurement.push_attribute(("mom2Id", id.as_str()));
    }
    out.event(Event::Start(measurement))?;

    let timing = beam_timing(record, index, beam);
    if let Some(status) = beam_status(record, timing) {
        out.status(&status_words(status))?;
    }
    if let Some((start, end)) = timing {
        out.start("lofar:measurementAttributes")?;
        out.leaf("startTime", &format_date_time(start))?;
        out.leaf("endTime", &format_date_time(end))?;
        out.end("lofar:measurementAttributes")?;
    }

    out.end("lofar:measurement")
}

/// Start and end of beam `index`, when the observation start, the beam's
/// offset token and its duration are all known.
pub fn beam_timing(
    record: &ObservationRecord,
    index: usize,
    beam: &Beam,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let obs_start = record.start_time?;
    let offset = record.angle_times.get(index).and_then(|t| parse_offset(t))?;
    let duration = i64::try_from(beam.duration_secs?).ok()?;
    let start = obs_start.checked_add_signed(Duration::try_seconds(offset)?)?;
    let end = start.checked_add_signed(Duration::try_seconds(duration)?)?;
    Some((start, end))
}

/// A beam shares its observation's status, except that a finished
/// observation reports an overrunning beam as failed.
pub fn beam_status(
    record: &ObservationRecord,
    timing: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Option<ExecutionStatus> {
    let status = record.status?;
    if status != ExecutionStatus::Finished {
        return Some(status);
    }
    match (timing, record.end_time) {
        (Some((start, end)), Some(obs_end)) if start > obs_end || end > obs_end => {
            Some(ExecutionStatus::Failed)
        }
        _ => Some(status),
    }
}

// ---------------------------------------------------------------------------
// XmlOut
// ---------------------------------------------------------------------------

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), CodecError> {
        self.writer
            .write_event(event)
            .map_err(|e| CodecError::Write(e.to_string()))
    }

    fn start(&mut self, name: &str) -> Result<(), CodecError> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<(), CodecError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<(), CodecError> {
        self.start(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// `<currentStatus><mom2:{camelCase}Status/></currentStatus>`
    fn status(&mut self, words: &str) -> Result<(), CodecError> {
        let element = format!("mom2:{}", translate::status_element_name(words));
        self.start("currentStatus")?;
        self.event(Event::Empty(BytesStart::new(element.as_str())))?;
        self.end("currentStatus")
    }

    fn finish(self) -> Result<String, CodecError> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| CodecError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subbands::Subbands;
    use crate::xml::inbound;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn finished_record() -> ObservationRecord {
        ObservationRecord {
            mom2_id: Some(1042),
            status: Some(ExecutionStatus::Finished),
            start_time: Some(at(12, 0)),
            end_time: Some(at(14, 0)),
            beams: vec![
                Beam {
                    mom2_id: Some(1043),
                    duration_secs: Some(3600),
                    subbands: Some(Subbands::parse("1,2,3").unwrap()),
                    ..Default::default()
                },
                Beam {
                    mom2_id: Some(1044),
                    duration_secs: Some(3600),
                    ..Default::default()
                },
            ],
            angle_times: vec!["+0".into(), "+5400".into()],
            ..Default::default()
        }
    }

    #[test]
    fn declares_both_namespaces() {
        let xml = encode(&finished_record()).unwrap();
        assert!(xml.contains(r#"xmlns:lofar="http://www.astron.nl/MoM2-Lofar""#));
        assert!(xml.contains(r#"xmlns:mom2="http://www.astron.nl/MoM2""#));
        assert!(xml.contains(r#"mom2Id="1042""#));
    }

    #[test]
    fn beam_timing_walks_offsets() {
        let record = finished_record();
        let (start, end) = beam_timing(&record, 1, &record.beams[1]).unwrap();
        assert_eq!(start, at(13, 30));
        assert_eq!(end, at(14, 30));
        assert!(beam_timing(&record, 2, &record.beams[1]).is_none());
    }

    #[test]
    fn overrunning_beam_is_failed() {
        let xml = encode(&finished_record()).unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let statuses: Vec<&str> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "measurement")
            .map(|m| {
                let current = m
                    .children()
                    .find(|n| n.tag_name().name() == "currentStatus")
                    .unwrap();
                current
                    .children()
                    .find(|n| n.is_element())
                    .unwrap()
                    .tag_name()
                    .name()
            })
            .collect();
        assert_eq!(statuses, vec!["finishedStatus", "failedStatus"]);
        assert!(xml.contains("<startTime>2024-03-01T13:30:00</startTime>"));
    }

    #[test]
    fn running_observation_beams_inherit_status() {
        let mut record = finished_record();
        record.status = Some(ExecutionStatus::Running);
        let timing = beam_timing(&record, 1, &record.beams[1]);
        assert_eq!(beam_status(&record, timing), Some(ExecutionStatus::Running));
    }

    #[test]
    fn beams_without_timing_omit_times() {
        let mut record = finished_record();
        record.angle_times.clear();
        let xml = encode(&record).unwrap();
        assert!(!xml.contains("measurementAttributes"));
        assert!(!xml.contains("failedStatus"));
    }

    #[test]
    fn mapped_fields_round_trip_through_inbound() {
        let planning = r#"<lofar:observation xmlns:lofar="http://www.astron.nl/MoM2-Lofar"
                              xmlns:mom2="http://www.astron.nl/MoM2" mom2Id="77">
            <currentStatus><mom2:describedStatus/></currentStatus>
            <lofar:observationAttributes><specification>
              <antenna>LBA Outer</antenna>
              <clock>160 MHz</clock>
              <instrumentFilter>30-90 MHz</instrumentFilter>
              <stationSet>Core</stationSet>
            </specification></lofar:observationAttributes>
        </lofar:observation>"#;
        let record = inbound::decode(planning).unwrap();
        let xml = encode(&record).unwrap();
        assert!(xml.contains("<mom2:describedStatus/>"));
        assert!(xml.contains("<antenna>LBA Outer</antenna>"));
        assert!(xml.contains("<clock>160 MHz</clock>"));
        assert!(xml.contains("<instrumentFilter>30-90 MHz</instrumentFilter>"));
        assert!(xml.contains("<stationSet>Core</stationSet>"));
        assert_eq!(inbound::decode(&xml).unwrap(), record);
    }

    #[test]
    fn unmappable_fields_are_omitted() {
        let record = ObservationRecord {
            mom2_id: Some(1),
            status: Some(ExecutionStatus::Approved),
            clock_mode: Some("turbo".into()),
            ..Default::default()
        };
        let xml = encode(&record).unwrap();
        assert!(!xml.contains("<clock>"));
        assert!(xml.contains("<mom2:specifiedStatus/>"));
    }

    #[test]
    fn text_is_escaped() {
        let record = ObservationRecord {
            station_set: Some("A&B <core>".into()),
            ..Default::default()
        };
        let xml = encode(&record).unwrap();
        assert!(xml.contains("A&amp;B &lt;core&gt;"));
    }
}
