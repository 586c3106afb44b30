//! AIT private section reassembly and binary descriptor decoding
//! (MPEG-2 `private_section` syntax, TS 102 809 §5.3).

use std::sync::Arc;

use crate::{
    ait::table::{
        AitAppDesc, AitTable, AppDesc, AppProfile, ControlCode, LangString,
        ParentalRating, TransportProtocolDesc, APP_TYPE_HBBTV,
        PROTOCOL_HTTP, PROTOCOL_OBJECT_CAROUSEL, RATING_SCHEME_DVB_SI,
        VISIBILITY_UNPARSED,
    },
    log::prelude::*,
};

/// Descriptor tags handled by the decoder; everything else is skipped by
/// its advertised length.
const DTAG_APP_DESC: u8 = 0x00;
const DTAG_APP_NAME: u8 = 0x01;
const DTAG_TRANSPORT_PROTOCOL: u8 = 0x02;
const DTAG_SIMPLE_APP_LOCATION: u8 = 0x15;
const DTAG_APP_USAGE: u8 = 0x16;
const DTAG_SIMPLE_APP_BOUNDARY: u8 = 0x17;
const DTAG_PARENTAL_RATING: u8 = 0x55;

/// Bounds checked byte cursor over section or descriptor payloads.
/// `None` from any read means the advertised length lied.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn be16(&mut self) -> Option<u16> {
        let bytes = self.take(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn be24(&mut self) -> Option<u32> {
        let bytes = self.take(3)?;
        Some(u32::from(bytes[0]) << 16
            | u32::from(bytes[1]) << 8
            | u32::from(bytes[2]))
    }

    fn be32(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.data.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(slice)
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// AIT section reassembler.
///
/// Feeds on raw private sections and keeps two tables: the one being
/// reassembled for the current version (never exposed) and the last
/// completed one, handed out as an immutable shared snapshot.
#[derive(Debug, Default)]
pub struct Ait {
    /// Table being reassembled for the current version.
    table: Option<AitTable>,
    /// Last completed table.
    completed: Option<Arc<AitTable>>,
}

impl Ait {
    /// The last completed AIT table, if any. Partial tables are never
    /// exposed.
    #[must_use]
    pub fn get(&self) -> Option<Arc<AitTable>> {
        self.completed.clone()
    }

    /// Drops any partial or completed data. Called on service or AIT PID
    /// changes.
    pub fn clear(&mut self) {
        self.table = None;
        self.completed = None;
    }

    /// Processes one AIT section, returning whether the table returned by
    /// [`Ait::get`] changed (a table was completed or updated).
    pub fn process_section(&mut self, data: &[u8]) -> bool {
        if data.len() <= 2 {
            error!("AIT section too small: {} bytes", data.len());
            return false;
        }
        let section_size =
            ((usize::from(data[1]) << 8 | usize::from(data[2])) & 0xFFF) + 3;
        if data.len() != section_size {
            error!(
                "AIT section size mismatch: {}/{}",
                data.len(),
                section_size,
            );
            return false;
        }

        if !self.parse_section(data) {
            return false;
        }
        match &self.table {
            Some(table) if table.complete => {
                self.completed = Some(Arc::new(table.clone()));
                true
            }
            _ => false,
        }
    }

    /// Marks the transport of a signalled application as failed to load,
    /// in both the partial and the completed table, so that later
    /// selection passes pick another transport. Snapshots already handed
    /// out are unaffected.
    pub fn set_transport_failed(
        &mut self,
        org_id: u32,
        app_id: u16,
        protocol_id: u16,
    ) {
        if let Some(table) = &mut self.table {
            if let Some(app) = table.find_app_mut(org_id, app_id) {
                app.set_transport_failed(protocol_id);
            }
        }
        if let Some(completed) = &mut self.completed {
            let table = Arc::make_mut(completed);
            if let Some(app) = table.find_app_mut(org_id, app_id) {
                app.set_transport_failed(protocol_id);
            }
        }
    }

    /// Parses one framed section into the partial table. Returns whether
    /// the table structure changed.
    fn parse_section(&mut self, data: &[u8]) -> bool {
        if data.len() < 10 {
            error!("AIT section shorter than its header");
            return false;
        }
        let app_type = u16::from_be_bytes([data[3], data[4]]);
        let version = (data[5] & 0x3E) >> 1;
        let section_number = data[6];
        let last_section_number = data[7];

        if app_type != APP_TYPE_HBBTV {
            debug!(
                "AIT sub-table with unsupported application_type {:#x} \
                 ignored",
                app_type,
            );
            return false;
        }

        if let Some(table) = &self.table {
            if table.version == version
                && Self::section_received(table, section_number)
            {
                debug!(
                    "AIT section {}/{} already received for version {}",
                    section_number, last_section_number, version,
                );
                return false;
            }
        }

        // A new version discards whatever was reassembled so far.
        let mut table = match &self.table {
            Some(table) if table.version == version => table.clone(),
            _ => AitTable {
                app_type,
                version,
                ..AitTable::default()
            },
        };
        table.complete = Self::mark_section_received(
            &mut table,
            section_number,
            last_section_number,
        );

        if Self::decode_application_loop(&mut table, data).is_none() {
            warn!(
                "dropping malformed AIT section {}/{} (version {})",
                section_number, last_section_number, version,
            );
            return false;
        }

        debug!(
            "AIT section {}/{} decoded: version={} apps={} complete={}",
            section_number,
            last_section_number,
            version,
            table.apps.len(),
            table.complete,
        );
        self.table = Some(table);
        true
    }

    /// Walks the application loop of a section into `table`. `None` means
    /// a header or loop length lied and the section must be dropped.
    fn decode_application_loop(
        table: &mut AitTable,
        data: &[u8],
    ) -> Option<()> {
        let mut r = Reader::new(&data[8..]);
        let common_descriptors_length = usize::from(r.be16()? & 0x0FFF);
        let _ = r.take(common_descriptors_length)?;
        let application_loop_length = usize::from(r.be16()? & 0x0FFF);
        let mut apps = Reader::new(r.take(application_loop_length)?);

        while apps.len() >= 9 {
            let org_id = apps.be32()?;
            let app_id = apps.be16()?;
            let control_code = apps.u8()?;
            let descriptors_length = usize::from(apps.be16()? & 0x0FFF);
            let descriptors = apps.take(descriptors_length)?;

            let index = table
                .apps
                .iter()
                .position(|a| a.org_id == org_id && a.app_id == app_id);
            let app = match index {
                Some(i) => &mut table.apps[i],
                None => {
                    table.apps.push(AitAppDesc {
                        org_id,
                        app_id,
                        control_code: ControlCode::from_u8(control_code),
                        app_desc: AppDesc {
                            visibility: VISIBILITY_UNPARSED,
                            ..AppDesc::default()
                        },
                        ..AitAppDesc::default()
                    });
                    table.apps.last_mut()?
                }
            };
            parse_application(descriptors, app);
        }
        Some(())
    }

    /// Pure bit test of the received-section mask.
    fn section_received(table: &AitTable, section_number: u8) -> bool {
        let index = usize::from(section_number / 8);
        let mask = 1u8 << (section_number % 8);
        table.section_mask[index] & mask != 0
    }

    /// Marks a section as received and returns whether every section up
    /// to `last_section_number` has now arrived.
    fn mark_section_received(
        table: &mut AitTable,
        section_number: u8,
        last_section_number: u8,
    ) -> bool {
        let index = usize::from(section_number / 8);
        table.section_mask[index] |= 1 << (section_number % 8);

        if section_number == 0 && last_section_number == 0 {
            // Shortcut for the most frequent single section case.
            return true;
        }

        let last_index = usize::from(last_section_number / 8);
        if table.section_mask[..last_index].iter().any(|b| *b != 0xFF) {
            return false;
        }
        // The last slot may be partially populated.
        let final_mask =
            (1u16 << (u16::from(last_section_number % 8) + 1)) as u8;
        table.section_mask[last_index] == final_mask.wrapping_sub(1)
    }
}

/// Dispatches the descriptor loop of one application entry. Malformed
/// descriptors are skipped; decoding continues with the next advertised
/// length.
fn parse_application(data: &[u8], app: &mut AitAppDesc) {
    let mut r = Reader::new(data);
    loop {
        let tag = match r.u8() {
            Some(tag) => tag,
            None => break,
        };
        let length = match r.u8() {
            Some(length) => usize::from(length),
            None => break,
        };
        let body = match r.take(length) {
            Some(body) => body,
            None => break,
        };

        match tag {
            DTAG_APP_DESC => {
                if app.app_desc.visibility == VISIBILITY_UNPARSED {
                    if let Some(desc) = parse_app_desc(body) {
                        app.app_desc = desc;
                    }
                } else {
                    debug!("application_descriptor already parsed, skipping");
                }
            }
            DTAG_APP_NAME => {
                if app.names.is_empty() {
                    if let Some(names) = parse_app_names(body) {
                        app.names = names;
                    }
                } else {
                    debug!("application_name already parsed, skipping");
                }
            }
            DTAG_TRANSPORT_PROTOCOL => {
                if let Some(desc) = parse_transport_protocol(body) {
                    insert_transport(&mut app.transports, desc);
                }
            }
            DTAG_SIMPLE_APP_LOCATION => {
                if app.location.is_empty() && !body.is_empty() {
                    app.location =
                        String::from_utf8_lossy(body).into_owned();
                }
            }
            DTAG_APP_USAGE => {
                if body.len() >= 2
                    && body[0] == 0x01
                    && app.usage_type != 0x01
                {
                    app.usage_type = body[1];
                }
            }
            DTAG_SIMPLE_APP_BOUNDARY => {
                if let Some(mut boundaries) = parse_boundaries(body) {
                    app.boundaries.append(&mut boundaries);
                }
            }
            DTAG_PARENTAL_RATING => {
                if app.parental_ratings.is_empty() {
                    if let Some(ratings) = parse_parental_ratings(body) {
                        app.parental_ratings = ratings;
                    }
                } else {
                    debug!("parental_rating already parsed, skipping");
                }
            }
            _ => {}
        }
    }
}

/// `application_descriptor` (0x00): profile list, flags, priority and
/// transport protocol labels.
fn parse_app_desc(body: &[u8]) -> Option<AppDesc> {
    let mut r = Reader::new(body);
    let mut desc = AppDesc::default();

    let mut profiles_length = usize::from(r.u8()?);
    while profiles_length >= 5 {
        desc.app_profiles.push(AppProfile {
            app_profile: r.be16()?,
            version_major: r.u8()?,
            version_minor: r.u8()?,
            version_micro: r.u8()?,
        });
        profiles_length -= 5;
    }

    let flags = r.u8()?;
    desc.service_bound = flags & 0x80 != 0;
    desc.visibility = (flags & 0x60) >> 5;
    desc.priority = r.u8()?;
    desc.transport_protocol_labels = r.remaining().to_vec();
    Some(desc)
}

/// `application_name_descriptor` (0x01): language → name records;
/// zero-length names are dropped.
fn parse_app_names(body: &[u8]) -> Option<Vec<LangString>> {
    let mut r = Reader::new(body);
    let mut names = Vec::new();
    while r.len() > 4 {
        let lang_code = r.be24()?;
        let name_length = usize::from(r.u8()?);
        let name = r.take(name_length)?;
        if !name.is_empty() {
            names.push(LangString {
                lang_code,
                name: String::from_utf8_lossy(name).into_owned(),
            });
        }
    }
    Some(names)
}

/// `transport_protocol_descriptor` (0x02): protocol id, label and the
/// protocol specific selector bytes.
fn parse_transport_protocol(body: &[u8]) -> Option<TransportProtocolDesc> {
    if body.len() < 3 {
        return None;
    }
    let mut r = Reader::new(body);
    let mut desc = TransportProtocolDesc {
        protocol_id: r.be16()?,
        transport_protocol_label: r.u8()?,
        ..TransportProtocolDesc::default()
    };

    match desc.protocol_id {
        PROTOCOL_OBJECT_CAROUSEL if !r.is_empty() => {
            desc.oc.remote_connection = r.u8()? & 0x80 != 0;
            if desc.oc.remote_connection {
                desc.oc.original_network_id = r.be16()?;
                desc.oc.transport_stream_id = r.be16()?;
                desc.oc.service_id = r.be16()?;
            }
            desc.oc.component_tag = r.u8()?;
        }
        PROTOCOL_HTTP if !r.is_empty() => {
            let url_length = usize::from(r.u8()?);
            desc.url.base_url =
                String::from_utf8_lossy(r.take(url_length)?).into_owned();
            let extension_count = r.u8()?;
            for _ in 0..extension_count {
                let url_length = usize::from(r.u8()?);
                desc.url.extension_urls.push(
                    String::from_utf8_lossy(r.take(url_length)?)
                        .into_owned(),
                );
            }
        }
        _ => {}
    }
    Some(desc)
}

/// Stores a transport descriptor in the first empty slot. Descriptors for
/// an already present protocol are rejected; slots are never freed.
pub(crate) fn insert_transport(
    transports: &mut [TransportProtocolDesc],
    desc: TransportProtocolDesc,
) -> bool {
    if transports.iter().any(|t| t.protocol_id == desc.protocol_id) {
        debug!(
            "transport protocol {:#06x} already present, skipping",
            desc.protocol_id,
        );
        return false;
    }
    match transports.iter_mut().find(|t| t.is_empty_slot()) {
        Some(slot) => {
            *slot = desc;
            true
        }
        None => {
            error!(
                "no free transport slot for protocol {:#06x}",
                desc.protocol_id,
            );
            false
        }
    }
}

/// `simple_application_boundary_descriptor` (0x17): counted,
/// length-prefixed boundary extension URLs.
fn parse_boundaries(body: &[u8]) -> Option<Vec<String>> {
    let mut r = Reader::new(body);
    let count = r.u8()?;
    let mut boundaries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let length = usize::from(r.u8()?);
        boundaries
            .push(String::from_utf8_lossy(r.take(length)?).into_owned());
    }
    Some(boundaries)
}

/// `parental_rating_descriptor` (0x55): 4-byte country records with the
/// scheme fixed to `dvb-si` and the rating offset by 3 years.
fn parse_parental_ratings(body: &[u8]) -> Option<Vec<ParentalRating>> {
    let mut r = Reader::new(body);
    let mut ratings = Vec::new();
    while r.len() >= 4 {
        let region = String::from_utf8_lossy(r.take(3)?).into_owned();
        let value = r.u8()?.saturating_add(3);
        ratings.push(ParentalRating {
            scheme: RATING_SCHEME_DVB_SI.into(),
            region,
            value,
        });
    }
    Some(ratings)
}

#[cfg(test)]
pub(crate) mod encode {
    //! Builders fabricating binary AIT sections for tests.

    use crate::ait::table::APP_TYPE_HBBTV;

    /// One application entry of [`section`]: identity, control code and
    /// raw descriptors (tag + length already included).
    pub(crate) struct App {
        pub org_id: u32,
        pub app_id: u16,
        pub control_code: u8,
        pub descriptors: Vec<Vec<u8>>,
    }

    /// Frames a full AIT private section.
    pub(crate) fn section(
        app_type: u16,
        version: u8,
        section_number: u8,
        last_section_number: u8,
        apps: &[App],
    ) -> Vec<u8> {
        let mut app_loop = Vec::new();
        for app in apps {
            let descriptors: Vec<u8> =
                app.descriptors.iter().flatten().copied().collect();
            app_loop.extend_from_slice(&app.org_id.to_be_bytes());
            app_loop.extend_from_slice(&app.app_id.to_be_bytes());
            app_loop.push(app.control_code);
            app_loop.extend_from_slice(
                &(descriptors.len() as u16 | 0xF000).to_be_bytes(),
            );
            app_loop.extend_from_slice(&descriptors);
        }

        let mut body = Vec::new();
        body.extend_from_slice(&app_type.to_be_bytes());
        body.push(0xC1 | (version << 1));
        body.push(section_number);
        body.push(last_section_number);
        body.extend_from_slice(&0xF000u16.to_be_bytes()); // no common descriptors
        body.extend_from_slice(
            &(app_loop.len() as u16 | 0xF000).to_be_bytes(),
        );
        body.extend_from_slice(&app_loop);

        let mut out = vec![0x74];
        out.extend_from_slice(&(body.len() as u16 | 0xF000).to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn descriptor(tag: u8, body: Vec<u8>) -> Vec<u8> {
        let mut out = vec![tag, body.len() as u8];
        out.extend_from_slice(&body);
        out
    }

    pub(crate) fn application_descriptor(
        profiles: &[(u16, u8, u8, u8)],
        service_bound: bool,
        visibility: u8,
        priority: u8,
        labels: &[u8],
    ) -> Vec<u8> {
        let mut body = vec![(profiles.len() * 5) as u8];
        for (profile, major, minor, micro) in profiles {
            body.extend_from_slice(&profile.to_be_bytes());
            body.extend_from_slice(&[*major, *minor, *micro]);
        }
        let mut flags = (visibility & 0x03) << 5 | 0x1F;
        if service_bound {
            flags |= 0x80;
        }
        body.push(flags);
        body.push(priority);
        body.extend_from_slice(labels);
        descriptor(super::DTAG_APP_DESC, body)
    }

    pub(crate) fn application_name_descriptor(
        names: &[(&str, &str)],
    ) -> Vec<u8> {
        let mut body = Vec::new();
        for (lang, name) in names {
            body.extend_from_slice(lang.as_bytes());
            body.push(name.len() as u8);
            body.extend_from_slice(name.as_bytes());
        }
        descriptor(super::DTAG_APP_NAME, body)
    }

    pub(crate) fn transport_http(
        label: u8,
        base_url: &str,
        extensions: &[&str],
    ) -> Vec<u8> {
        let mut body = vec![0x00, 0x03, label, base_url.len() as u8];
        body.extend_from_slice(base_url.as_bytes());
        body.push(extensions.len() as u8);
        for extension in extensions {
            body.push(extension.len() as u8);
            body.extend_from_slice(extension.as_bytes());
        }
        descriptor(super::DTAG_TRANSPORT_PROTOCOL, body)
    }

    pub(crate) fn transport_oc(
        label: u8,
        remote: Option<(u16, u16, u16)>,
        component_tag: u8,
    ) -> Vec<u8> {
        let mut body = vec![0x00, 0x01, label];
        match remote {
            Some((onid, tsid, sid)) => {
                body.push(0x80);
                body.extend_from_slice(&onid.to_be_bytes());
                body.extend_from_slice(&tsid.to_be_bytes());
                body.extend_from_slice(&sid.to_be_bytes());
            }
            None => body.push(0x00),
        }
        body.push(component_tag);
        descriptor(super::DTAG_TRANSPORT_PROTOCOL, body)
    }

    pub(crate) fn simple_application_location(location: &str) -> Vec<u8> {
        descriptor(
            super::DTAG_SIMPLE_APP_LOCATION,
            location.as_bytes().to_vec(),
        )
    }

    pub(crate) fn application_usage(usage_type: u8) -> Vec<u8> {
        descriptor(super::DTAG_APP_USAGE, vec![0x01, usage_type])
    }

    pub(crate) fn simple_application_boundary(
        boundaries: &[&str],
    ) -> Vec<u8> {
        let mut body = vec![boundaries.len() as u8];
        for boundary in boundaries {
            body.push(boundary.len() as u8);
            body.extend_from_slice(boundary.as_bytes());
        }
        descriptor(super::DTAG_SIMPLE_APP_BOUNDARY, body)
    }

    pub(crate) fn parental_rating(ratings: &[(&str, u8)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (region, value) in ratings {
            body.extend_from_slice(region.as_bytes());
            body.push(value - 3);
        }
        descriptor(super::DTAG_PARENTAL_RATING, body)
    }

    /// Single section AIT signalling one HTTP AUTOSTART application.
    pub(crate) fn autostart_section(
        version: u8,
        org_id: u32,
        app_id: u16,
        base_url: &str,
        location: &str,
        priority: u8,
    ) -> Vec<u8> {
        section(
            APP_TYPE_HBBTV,
            version,
            0,
            0,
            &[App {
                org_id,
                app_id,
                control_code: 0x01,
                descriptors: vec![
                    application_descriptor(
                        &[(0x0000, 1, 6, 1)],
                        true,
                        0x03,
                        priority,
                        &[1],
                    ),
                    transport_http(1, base_url, &[]),
                    simple_application_location(location),
                ],
            }],
        )
    }
}

#[cfg(test)]
mod spec {
    use super::{encode, *};
    use crate::ait::table::{APP_TYPE_XML, VISIBLE_ALL};

    fn full_app(org_id: u32, app_id: u16) -> encode::App {
        encode::App {
            org_id,
            app_id,
            control_code: 0x01,
            descriptors: vec![
                encode::application_descriptor(
                    &[(0x0001, 1, 6, 1), (0x0000, 2, 0, 0)],
                    true,
                    VISIBLE_ALL,
                    5,
                    &[1, 2],
                ),
                encode::application_name_descriptor(&[
                    ("eng", "Red Button"),
                    ("deu", ""),
                    ("fra", "Bouton Rouge"),
                ]),
                encode::transport_http(1, "http://x/", &["http://y/"]),
                encode::transport_oc(2, None, 0x6F),
                encode::simple_application_location("index.html?x=1"),
                encode::application_usage(0x01),
                encode::simple_application_boundary(&[
                    "https://cdn.x/",
                ]),
                encode::parental_rating(&[("GBR", 15), ("DEU", 12)]),
            ],
        }
    }

    #[test]
    fn single_section_table_completes() {
        let mut ait = Ait::default();
        let data =
            encode::section(APP_TYPE_HBBTV, 1, 0, 0, &[full_app(0x13, 0x7)]);
        assert!(ait.process_section(&data));

        let table = ait.get().unwrap();
        assert_eq!(table.version, 1);
        assert!(table.complete);
        assert_eq!(table.apps.len(), 1);

        let app = &table.apps[0];
        assert_eq!((app.org_id, app.app_id), (0x13, 0x7));
        assert_eq!(app.control_code, ControlCode::Autostart);
        assert_eq!(app.app_desc.priority, 5);
        assert!(app.app_desc.service_bound);
        assert_eq!(app.app_desc.visibility, VISIBLE_ALL);
        assert_eq!(app.app_desc.app_profiles.len(), 2);
        assert_eq!(app.app_desc.transport_protocol_labels, vec![1, 2]);
        // The empty German name is filtered out.
        assert_eq!(app.names.len(), 2);
        assert_eq!(app.names[0].name, "Red Button");
        assert_eq!(app.names[0].lang_code, 0x656E67);
        assert_eq!(app.location, "index.html?x=1");
        assert_eq!(app.usage_type, 0x01);
        assert_eq!(app.boundaries, vec!["https://cdn.x/".to_owned()]);
        assert_eq!(app.parental_ratings.len(), 2);
        assert_eq!(app.parental_ratings[0].region, "GBR");
        assert_eq!(app.parental_ratings[0].value, 15);
        assert_eq!(app.parental_ratings[0].scheme, "dvb-si");

        assert_eq!(app.transports[0].protocol_id, PROTOCOL_HTTP);
        assert_eq!(app.transports[0].url.base_url, "http://x/");
        assert_eq!(
            app.transports[0].url.extension_urls,
            vec!["http://y/".to_owned()],
        );
        assert_eq!(
            app.transports[1].protocol_id,
            PROTOCOL_OBJECT_CAROUSEL,
        );
        assert_eq!(app.transports[1].oc.component_tag, 0x6F);
        assert!(!app.transports[1].oc.remote_connection);
    }

    #[test]
    fn replayed_section_is_ignored() {
        let mut ait = Ait::default();
        let data =
            encode::section(APP_TYPE_HBBTV, 3, 0, 0, &[full_app(1, 2)]);
        assert!(ait.process_section(&data));
        let before = ait.get().unwrap();

        assert!(!ait.process_section(&data));
        assert!(Arc::ptr_eq(&before, &ait.get().unwrap()));
    }

    #[test]
    fn multi_section_table_completes_only_when_all_arrive() {
        let mut ait = Ait::default();
        let first =
            encode::section(APP_TYPE_HBBTV, 0, 0, 1, &[full_app(1, 1)]);
        let second =
            encode::section(APP_TYPE_HBBTV, 0, 1, 1, &[full_app(1, 2)]);

        assert!(!ait.process_section(&first));
        assert!(ait.get().is_none());

        assert!(ait.process_section(&second));
        let table = ait.get().unwrap();
        assert_eq!(table.apps.len(), 2);
        // Insertion order is the decode order of first sighting.
        assert_eq!(table.apps[0].app_id, 1);
        assert_eq!(table.apps[1].app_id, 2);
    }

    #[test]
    fn version_change_discards_previous_table() {
        let mut ait = Ait::default();
        let v1 = encode::section(APP_TYPE_HBBTV, 1, 0, 0, &[full_app(1, 1)]);
        let v2 = encode::section(APP_TYPE_HBBTV, 2, 0, 0, &[full_app(1, 9)]);

        assert!(ait.process_section(&v1));
        assert!(ait.process_section(&v2));

        let table = ait.get().unwrap();
        assert_eq!(table.version, 2);
        assert_eq!(table.apps.len(), 1);
        assert_eq!(table.apps[0].app_id, 9);
    }

    #[test]
    fn unsupported_application_type_is_ignored() {
        let mut ait = Ait::default();
        let data = encode::section(APP_TYPE_XML, 1, 0, 0, &[full_app(1, 1)]);
        assert!(!ait.process_section(&data));
        assert!(ait.get().is_none());
    }

    #[test]
    fn size_mismatch_drops_section_without_state_change() {
        let mut ait = Ait::default();
        let mut data =
            encode::section(APP_TYPE_HBBTV, 1, 0, 0, &[full_app(1, 1)]);
        data.push(0x00); // one trailing byte too many
        assert!(!ait.process_section(&data));
        assert!(ait.get().is_none());
    }

    #[test]
    fn duplicate_transport_protocol_is_rejected() {
        let mut ait = Ait::default();
        let app = encode::App {
            org_id: 1,
            app_id: 1,
            control_code: 0x01,
            descriptors: vec![
                encode::transport_http(1, "http://first/", &[]),
                encode::transport_http(2, "http://second/", &[]),
            ],
        };
        let data = encode::section(APP_TYPE_HBBTV, 1, 0, 0, &[app]);
        assert!(ait.process_section(&data));

        let table = ait.get().unwrap();
        let app = &table.apps[0];
        assert_eq!(app.transports[0].url.base_url, "http://first/");
        assert!(app.transports[1].is_empty_slot());
    }

    #[test]
    fn malformed_descriptor_does_not_abort_the_section() {
        let mut ait = Ait::default();
        let app = encode::App {
            org_id: 1,
            app_id: 1,
            control_code: 0x01,
            // An unknown tag followed by a valid location descriptor.
            descriptors: vec![
                vec![0x42, 0x02, 0xAA, 0xBB],
                encode::simple_application_location("a.html"),
            ],
        };
        let data = encode::section(APP_TYPE_HBBTV, 1, 0, 0, &[app]);
        assert!(ait.process_section(&data));
        assert_eq!(ait.get().unwrap().apps[0].location, "a.html");
    }

    #[test]
    fn clear_forgets_partial_and_completed_tables() {
        let mut ait = Ait::default();
        let data = encode::section(APP_TYPE_HBBTV, 1, 0, 0, &[full_app(1, 1)]);
        assert!(ait.process_section(&data));
        ait.clear();
        assert!(ait.get().is_none());
        // The same section is new again after a clear.
        assert!(ait.process_section(&data));
    }
}
