//! AIT table model: applications with their transport, profile, name,
//! boundary and parental rating descriptors, plus the selection logic
//! (autostart, teletext, base URL resolution) that operates on it.
//!
//! Both the broadcast section decoder and the XML AIT decoder produce this
//! shape, so everything downstream is decoder agnostic.

use derive_more::Display;

use crate::utils::DvbTriplet;

/// Highest HbbTV version this terminal runs applications for.
pub const HBBTV_VERSION: (u8, u8, u8) = (1, 6, 1);

/// At most one transport descriptor per protocol, two slots per app.
pub const MAX_NUM_PROTOCOLS: usize = 2;

/// Transport protocol carried in a DSM-CC object carousel.
pub const PROTOCOL_OBJECT_CAROUSEL: u16 = 0x0001;
/// Transport protocol delivered over HTTP(S).
pub const PROTOCOL_HTTP: u16 = 0x0003;

/// `application_type` of HbbTV AIT sub-tables.
pub const APP_TYPE_HBBTV: u16 = 0x0010;
/// `application_type` marker used for tables decoded from an XML AIT.
pub const APP_TYPE_XML: u16 = 0x8000;

/// `application_usage` signalling a Teletext replacement application.
pub const USAGE_TELETEXT: u8 = 0x01;

/// `visibility` values (TS 102 809 application descriptor).
pub const NOT_VISIBLE_ALL: u8 = 0x00;
pub const NOT_VISIBLE_USERS: u8 = 0x01;
pub const VISIBLE_ALL: u8 = 0x03;

/// Out-of-range `visibility` used by the section decoder to mark an
/// application whose application descriptor has not been parsed yet.
pub(crate) const VISIBILITY_UNPARSED: u8 = 2;

/// Rating scheme of DVB broadcast parental rating descriptors.
pub const RATING_SCHEME_DVB_SI: &str = "dvb-si";

/// `application_control_code` of a signalled application.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ControlCode {
    Unknown,
    Autostart,
    Present,
    Destroy,
    Kill,
    Prefetch,
    Remote,
    Disabled,
    PlaybackAutostart,
}

impl ControlCode {
    /// Maps a broadcast control code byte; unassigned values map to
    /// [`ControlCode::Unknown`] and keep the application ineligible for
    /// autostart.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::Autostart,
            0x02 => Self::Present,
            0x03 => Self::Destroy,
            0x04 => Self::Kill,
            0x05 => Self::Prefetch,
            0x06 => Self::Remote,
            0x07 => Self::Disabled,
            0x08 => Self::PlaybackAutostart,
            _ => Self::Unknown,
        }
    }
}

impl Default for ControlCode {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Selector bytes of an object carousel transport.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OcSelector {
    /// Whether the carousel lives on another service (then the triplet
    /// below applies, otherwise the currently selected service does).
    pub remote_connection: bool,
    pub original_network_id: u16,
    pub transport_stream_id: u16,
    pub service_id: u16,
    pub component_tag: u8,
}

/// Selector bytes of an HTTP transport.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UrlSelector {
    pub base_url: String,
    pub extension_urls: Vec<String>,
}

/// One transport protocol descriptor slot of an application.
///
/// `protocol_id == 0` marks an empty slot; slots are never freed within a
/// table version.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransportProtocolDesc {
    pub protocol_id: u16,
    pub transport_protocol_label: u8,
    pub oc: OcSelector,
    pub url: UrlSelector,
    /// Set once the browser reported a load failure over this transport;
    /// later selection passes skip it.
    pub failed_to_load: bool,
}

impl TransportProtocolDesc {
    #[must_use]
    pub fn is_empty_slot(&self) -> bool {
        self.protocol_id == 0
    }
}

/// One entry of the application profile list.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AppProfile {
    pub app_profile: u16,
    pub version_major: u8,
    pub version_minor: u8,
    pub version_micro: u8,
}

impl AppProfile {
    /// Whether this profile is within the HbbTV version of the terminal.
    #[must_use]
    pub fn is_supported(self) -> bool {
        (self.version_major, self.version_minor, self.version_micro)
            <= HBBTV_VERSION
    }
}

/// Application descriptor payload (profiles, visibility, priority,
/// transport protocol labels).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AppDesc {
    pub visibility: u8,
    pub priority: u8,
    pub app_profiles: Vec<AppProfile>,
    pub transport_protocol_labels: Vec<u8>,
    pub service_bound: bool,
}

/// Application name in one language.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LangString {
    /// 24-bit packed ISO 639-2 language code.
    pub lang_code: u32,
    pub name: String,
}

/// One parental rating record of an application.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParentalRating {
    pub scheme: String,
    /// 2-letter (XML AIT, ISO 3166-1) or 3-letter (DVB SI, ISO 3166)
    /// region code.
    pub region: String,
    /// Minimum age.
    pub value: u8,
}

/// One application signalled in an AIT.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AitAppDesc {
    pub org_id: u32,
    pub app_id: u16,
    pub control_code: ControlCode,
    pub transports: [TransportProtocolDesc; MAX_NUM_PROTOCOLS],
    pub location: String,
    /// Display names; unique per language code, in decode order.
    pub names: Vec<LangString>,
    pub app_desc: AppDesc,
    pub usage_type: u8,
    pub boundaries: Vec<String>,
    pub parental_ratings: Vec<ParentalRating>,
}

impl AitAppDesc {
    /// Whether some transport slot carries the given protocol.
    #[must_use]
    pub fn has_transport(&self, protocol_id: u16) -> bool {
        self.transports.iter().any(|t| t.protocol_id == protocol_id)
    }

    /// Marks the transport carrying the given protocol as failed.
    pub fn set_transport_failed(&mut self, protocol_id: u16) {
        for transport in &mut self.transports {
            if transport.protocol_id == protocol_id {
                transport.failed_to_load = true;
            }
        }
    }

    /// Whether at least one profile of this application is runnable on
    /// this terminal.
    #[must_use]
    pub fn has_supported_profile(&self) -> bool {
        self.app_desc
            .app_profiles
            .iter()
            .any(|profile| profile.is_supported())
    }

    /// Whether some transport slot is still worth trying: HTTP or object
    /// carousel that has not failed to load.
    #[must_use]
    pub fn has_viable_transport(&self) -> bool {
        self.transports.iter().any(|t| {
            (t.protocol_id == PROTOCOL_HTTP
                || t.protocol_id == PROTOCOL_OBJECT_CAROUSEL)
                && !t.failed_to_load
        })
    }

    /// Resolves the base URL for loading this application, returning it
    /// with the protocol of the selected transport.
    ///
    /// Transports are tried in declaration order: HTTP requires network
    /// availability, an object carousel builds a `dvb://` URL from either
    /// its own triplet (remote carousels) or the current service. With no
    /// usable transport the URL is empty and the protocol 0.
    #[must_use]
    pub fn base_url(
        &self,
        current_service: DvbTriplet,
        network_available: bool,
    ) -> (String, u16) {
        for transport in &self.transports {
            if transport.failed_to_load {
                continue;
            }
            match transport.protocol_id {
                PROTOCOL_HTTP if network_available => {
                    return (transport.url.base_url.clone(), PROTOCOL_HTTP);
                }
                PROTOCOL_OBJECT_CAROUSEL => {
                    let oc = &transport.oc;
                    let url = if oc.remote_connection {
                        format!(
                            "dvb://{:x}.{:x}.{:x}.{:x}/",
                            oc.original_network_id,
                            oc.transport_stream_id,
                            oc.service_id,
                            oc.component_tag,
                        )
                    } else {
                        format!(
                            "dvb://{:x}.{:x}.{:x}.{:x}/",
                            current_service.original_network_id,
                            current_service.transport_stream_id,
                            current_service.service_id,
                            oc.component_tag,
                        )
                    };
                    return (url, PROTOCOL_OBJECT_CAROUSEL);
                }
                _ => {}
            }
        }
        (String::new(), 0)
    }

    /// Whether the terminal's parental control blocks this application.
    #[must_use]
    pub fn is_age_restricted(
        &self,
        age: u8,
        region: &str,
        region3: &str,
    ) -> bool {
        is_age_restricted(&self.parental_ratings, age, region, region3)
    }
}

/// Whether the terminal's parental control blocks content carrying these
/// ratings.
///
/// Without ratings nothing is blocked; otherwise some rating must be
/// `dvb-si` scheme, match the terminal's 2- or 3-letter region
/// (case-insensitively) and be within the configured age.
#[must_use]
pub fn is_age_restricted(
    ratings: &[ParentalRating],
    age: u8,
    region: &str,
    region3: &str,
) -> bool {
    if ratings.is_empty() {
        return false;
    }
    !ratings.iter().any(|rating| {
        let region_matches = match rating.region.len() {
            2 => rating.region.eq_ignore_ascii_case(region),
            3 => rating.region.eq_ignore_ascii_case(region3),
            _ => false,
        };
        rating.scheme == RATING_SCHEME_DVB_SI
            && region_matches
            && rating.value <= age
    })
}

/// Number of bytes in the received-section bitmap (256 sections).
pub const SECTION_MASK_BYTES: usize = 256 / 8;

/// A (possibly partially) reassembled AIT.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AitTable {
    pub app_type: u16,
    /// Table version (modulo 32).
    pub version: u8,
    /// Bitmap of received section numbers for the current version.
    pub section_mask: [u8; SECTION_MASK_BYTES],
    /// Whether every section up to `last_section_number` has arrived.
    pub complete: bool,
    /// Applications in the decode order of their first sighting.
    pub apps: Vec<AitAppDesc>,
}

impl AitTable {
    /// Looks an application up by its `(org_id, app_id)` identity.
    #[must_use]
    pub fn find_app(&self, org_id: u32, app_id: u16) -> Option<&AitAppDesc> {
        self.apps
            .iter()
            .find(|app| app.org_id == org_id && app.app_id == app_id)
    }

    /// Mutable [`AitTable::find_app`].
    pub fn find_app_mut(
        &mut self,
        org_id: u32,
        app_id: u16,
    ) -> Option<&mut AitAppDesc> {
        self.apps
            .iter_mut()
            .find(|app| app.org_id == org_id && app.app_id == app_id)
    }

    /// Selects the application to automatically start: signalled
    /// `AUTOSTART`, runnable on this terminal, not parentally restricted
    /// and with a viable transport. Among candidates the highest priority
    /// wins; ties resolve to the first seen.
    #[must_use]
    pub fn autostart_app(
        &self,
        parental_control_age: u8,
        parental_control_region: &str,
        parental_control_region3: &str,
    ) -> Option<&AitAppDesc> {
        let mut selected: Option<&AitAppDesc> = None;
        for candidate in &self.apps {
            if candidate.control_code != ControlCode::Autostart
                || !candidate.has_supported_profile()
            {
                continue;
            }
            if candidate.is_age_restricted(
                parental_control_age,
                parental_control_region,
                parental_control_region3,
            ) {
                continue;
            }
            if !candidate.has_viable_transport() {
                continue;
            }
            let beats_selected = selected.map_or(true, |app| {
                app.app_desc.priority < candidate.app_desc.priority
            });
            if beats_selected {
                selected = Some(candidate);
            }
        }
        selected
    }

    /// First application signalled with Teletext usage, if any.
    #[must_use]
    pub fn teletext_app(&self) -> Option<&AitAppDesc> {
        self.apps
            .iter()
            .find(|app| app.usage_type == USAGE_TELETEXT)
    }
}

#[cfg(test)]
mod spec {
    use super::*;

    fn http_transport(base_url: &str) -> TransportProtocolDesc {
        TransportProtocolDesc {
            protocol_id: PROTOCOL_HTTP,
            url: UrlSelector {
                base_url: base_url.into(),
                extension_urls: vec![],
            },
            ..TransportProtocolDesc::default()
        }
    }

    fn oc_transport(component_tag: u8) -> TransportProtocolDesc {
        TransportProtocolDesc {
            protocol_id: PROTOCOL_OBJECT_CAROUSEL,
            oc: OcSelector {
                component_tag,
                ..OcSelector::default()
            },
            ..TransportProtocolDesc::default()
        }
    }

    fn autostart_app(app_id: u16, priority: u8) -> AitAppDesc {
        AitAppDesc {
            org_id: 1,
            app_id,
            control_code: ControlCode::Autostart,
            transports: [http_transport("http://x/"), <_>::default()],
            location: "a.html".into(),
            app_desc: AppDesc {
                priority,
                app_profiles: vec![AppProfile {
                    version_major: 1,
                    version_minor: 6,
                    version_micro: 1,
                    ..AppProfile::default()
                }],
                ..AppDesc::default()
            },
            ..AitAppDesc::default()
        }
    }

    fn service() -> DvbTriplet {
        DvbTriplet {
            original_network_id: 0x2A,
            transport_stream_id: 0x1,
            service_id: 0x10,
        }
    }

    #[test]
    fn autostart_prefers_highest_priority_with_first_seen_ties() {
        let table = AitTable {
            apps: vec![
                autostart_app(1, 3),
                autostart_app(2, 5),
                autostart_app(3, 5),
            ],
            ..AitTable::default()
        };
        let selected = table.autostart_app(18, "GB", "GBR").unwrap();
        assert_eq!(selected.app_id, 2);
    }

    #[test]
    fn autostart_skips_unsupported_profiles() {
        let mut newer = autostart_app(1, 9);
        newer.app_desc.app_profiles = vec![AppProfile {
            version_major: 1,
            version_minor: 7,
            version_micro: 0,
            ..AppProfile::default()
        }];
        let table = AitTable {
            apps: vec![newer, autostart_app(2, 1)],
            ..AitTable::default()
        };
        assert_eq!(table.autostart_app(18, "GB", "GBR").unwrap().app_id, 2);
    }

    #[test]
    fn autostart_respects_parental_restrictions() {
        let mut rated = autostart_app(1, 9);
        rated.parental_ratings = vec![ParentalRating {
            scheme: RATING_SCHEME_DVB_SI.into(),
            region: "GB".into(),
            value: 18,
        }];
        let table = AitTable {
            apps: vec![rated],
            ..AitTable::default()
        };
        assert!(table.autostart_app(12, "gb", "gbr").is_none());
        assert_eq!(table.autostart_app(18, "gb", "gbr").unwrap().app_id, 1);
    }

    #[test]
    fn age_restriction_requires_dvb_si_scheme_and_region_match() {
        let mut app = autostart_app(1, 1);
        app.parental_ratings = vec![ParentalRating {
            scheme: "urn:other".into(),
            region: "GB".into(),
            value: 4,
        }];
        assert!(app.is_age_restricted(18, "GB", "GBR"));

        app.parental_ratings[0].scheme = RATING_SCHEME_DVB_SI.into();
        assert!(!app.is_age_restricted(18, "GB", "GBR"));
        assert!(app.is_age_restricted(18, "DE", "DEU"));

        app.parental_ratings[0].region = "GBR".into();
        assert!(!app.is_age_restricted(18, "DE", "gbr"));
    }

    #[test]
    fn autostart_needs_a_viable_transport() {
        let mut failed = autostart_app(1, 9);
        failed.transports[0].failed_to_load = true;
        let table = AitTable {
            apps: vec![failed],
            ..AitTable::default()
        };
        assert!(table.autostart_app(18, "GB", "GBR").is_none());
    }

    #[test]
    fn base_url_prefers_declaration_order() {
        let mut app = autostart_app(1, 1);
        app.transports = [http_transport("http://x/"), oc_transport(0x6F)];

        assert_eq!(
            app.base_url(service(), true),
            ("http://x/".to_owned(), PROTOCOL_HTTP),
        );
        // Without network the HTTP transport is not eligible.
        assert_eq!(
            app.base_url(service(), false),
            ("dvb://2a.1.10.6f/".to_owned(), PROTOCOL_OBJECT_CAROUSEL),
        );
    }

    #[test]
    fn base_url_uses_remote_carousel_triplet() {
        let mut app = autostart_app(1, 1);
        let mut oc = oc_transport(0x11);
        oc.oc.remote_connection = true;
        oc.oc.original_network_id = 0xAB;
        oc.oc.transport_stream_id = 0xCD;
        oc.oc.service_id = 0xEF;
        app.transports = [oc, <_>::default()];

        assert_eq!(
            app.base_url(service(), true),
            ("dvb://ab.cd.ef.11/".to_owned(), PROTOCOL_OBJECT_CAROUSEL),
        );
    }

    #[test]
    fn base_url_empty_when_only_failed_transports_remain() {
        let mut app = autostart_app(1, 1);
        app.transports[0].failed_to_load = true;
        assert_eq!(app.base_url(service(), true), (String::new(), 0));
    }

    #[test]
    fn transport_failure_is_recorded_per_protocol() {
        let mut app = autostart_app(1, 1);
        app.transports = [http_transport("http://x/"), oc_transport(1)];
        app.set_transport_failed(PROTOCOL_HTTP);
        assert!(app.transports[0].failed_to_load);
        assert!(!app.transports[1].failed_to_load);
        assert!(app.has_viable_transport());
    }

    #[test]
    fn teletext_app_is_found_by_usage_type() {
        let mut teletext = autostart_app(7, 1);
        teletext.usage_type = USAGE_TELETEXT;
        let table = AitTable {
            apps: vec![autostart_app(1, 1), teletext],
            ..AitTable::default()
        };
        assert_eq!(table.teletext_app().unwrap().app_id, 7);
    }
}
