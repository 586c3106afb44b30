//! XML AIT decoder (TS 102 809 §5.4): turns a `ServiceDiscovery` document
//! into the same [`AitTable`] shape the broadcast section decoder
//! produces, so everything downstream is decoder agnostic.

use failure::Fail;
use quick_xml::{events::Event, Reader};

use crate::ait::{
    section::insert_transport,
    table::{
        AitAppDesc, AitTable, AppProfile, ControlCode, LangString,
        ParentalRating, TransportProtocolDesc, APP_TYPE_XML,
        NOT_VISIBLE_ALL, NOT_VISIBLE_USERS, PROTOCOL_HTTP,
        PROTOCOL_OBJECT_CAROUSEL, VISIBLE_ALL,
    },
};

/// Error of decoding an XML AIT document.
#[derive(Debug, Fail)]
pub enum XmlAitError {
    /// The document is not well formed XML.
    #[fail(display = "malformed XML AIT: {}", _0)]
    Malformed(String),

    /// The root element is not `ServiceDiscovery`.
    #[fail(display = "unexpected root element: {}", _0)]
    UnexpectedRoot(String),
}

/// Decodes an XML AIT.
///
/// Unknown elements and attributes are ignored; an unknown `controlCode`
/// keeps the application in the table with [`ControlCode::Unknown`], which
/// makes it ineligible for autostart.
pub fn parse_ait(content: &str) -> Result<AitTable, XmlAitError> {
    let root = read_document(content)?;
    if root.name != "ServiceDiscovery" {
        return Err(XmlAitError::UnexpectedRoot(root.name));
    }

    let application_elements = || {
        root.children_named("ApplicationDiscovery")
            .flat_map(|d| d.children_named("ApplicationList"))
            .flat_map(|l| l.children_named("Application"))
    };

    // Sizing pass, then content pass.
    let mut apps = Vec::with_capacity(application_elements().count());
    for element in application_elements() {
        apps.push(parse_application(element));
    }

    Ok(AitTable {
        app_type: APP_TYPE_XML,
        complete: true,
        apps,
        ..AitTable::default()
    })
}

/// Minimal element tree; just enough structure to walk the AIT schema.
struct Element {
    /// Local (prefix stripped) element name.
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn text(&self) -> &str {
        self.text.trim()
    }

    fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }
}

/// Reads a whole document into an [`Element`] tree.
fn read_document(content: &str) -> Result<Element, XmlAitError> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    fn attach(
        stack: &mut Vec<Element>,
        root: &mut Option<Element>,
        element: Element,
    ) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                if root.is_none() {
                    *root = Some(element);
                }
            }
        }
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let mut element = Element {
                    name: local_name(start.local_name().as_ref()),
                    attributes: Vec::new(),
                    text: String::new(),
                    children: Vec::new(),
                };
                for attribute in start.attributes().flatten() {
                    let key = local_name(attribute.key.local_name().as_ref());
                    let value = attribute
                        .unescape_value()
                        .map_err(|e| XmlAitError::Malformed(e.to_string()))?
                        .into_owned();
                    element.attributes.push((key, value));
                }
                stack.push(element);
            }
            Ok(Event::Empty(empty)) => {
                let mut element = Element {
                    name: local_name(empty.local_name().as_ref()),
                    attributes: Vec::new(),
                    text: String::new(),
                    children: Vec::new(),
                };
                for attribute in empty.attributes().flatten() {
                    let key = local_name(attribute.key.local_name().as_ref());
                    let value = attribute
                        .unescape_value()
                        .map_err(|e| XmlAitError::Malformed(e.to_string()))?
                        .into_owned();
                    element.attributes.push((key, value));
                }
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| XmlAitError::Malformed(e.to_string()))?;
                    top.text.push_str(&unescaped);
                }
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(XmlAitError::Malformed(e.to_string())),
        }
    }

    root.ok_or_else(|| XmlAitError::Malformed("empty document".into()))
}

/// Decodes an element or attribute name, stripping any namespace prefix.
fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    name.rsplit(':').next().unwrap_or_default().to_owned()
}

fn parse_application(element: &Element) -> AitAppDesc {
    let mut app = AitAppDesc::default();

    for child in &element.children {
        match child.name.as_str() {
            "appName" => {
                let name = child.text();
                if name.is_empty() {
                    continue;
                }
                let code =
                    child.attr("Language").map_or(0, pack_language_code);
                if app.names.iter().all(|n| n.lang_code != code) {
                    app.names.push(LangString {
                        lang_code: code,
                        name: name.to_owned(),
                    });
                }
            }
            "applicationIdentifier" => {
                for id in &child.children {
                    match id.name.as_str() {
                        "orgId" => app.org_id = parse_int(id.text()),
                        "appId" => {
                            app.app_id = parse_int(id.text()) as u16;
                        }
                        _ => {}
                    }
                }
            }
            "applicationDescriptor" => {
                parse_descriptor(child, &mut app);
            }
            "applicationBoundary" => {
                for boundary in child.children_named("BoundaryExtension") {
                    let value = boundary.text();
                    if !value.is_empty() {
                        app.boundaries.push(value.to_owned());
                    }
                }
            }
            "applicationTransport" => {
                parse_transport(child, &mut app.transports);
            }
            "applicationLocation" => {
                app.location = child.text().to_owned();
            }
            _ => {}
        }
    }
    app
}

fn parse_descriptor(element: &Element, app: &mut AitAppDesc) {
    // TS 102 809 §5.4.4.4: service_bound defaults to true when absent.
    app.app_desc.service_bound = true;

    for child in &element.children {
        match child.name.as_str() {
            "controlCode" => {
                app.control_code = parse_control_code(child.text());
            }
            "visibility" => {
                app.app_desc.visibility = match child.text() {
                    "VISIBLE_ALL" => VISIBLE_ALL,
                    "NOT_VISIBLE_USERS" => NOT_VISIBLE_USERS,
                    _ => NOT_VISIBLE_ALL,
                };
            }
            "serviceBound" => {
                app.app_desc.service_bound = child.text() == "true";
            }
            "priority" => {
                app.app_desc.priority = parse_hex(child.text(), 2) as u8;
            }
            "mhpVersion" => {
                let mut profile = AppProfile::default();
                for version in &child.children {
                    match version.name.as_str() {
                        "profile" => {
                            profile.app_profile =
                                parse_hex(version.text(), 4) as u16;
                        }
                        "versionMajor" => {
                            profile.version_major =
                                parse_hex(version.text(), 2) as u8;
                        }
                        "versionMinor" => {
                            profile.version_minor =
                                parse_hex(version.text(), 2) as u8;
                        }
                        "versionMicro" => {
                            profile.version_micro =
                                parse_hex(version.text(), 2) as u8;
                        }
                        _ => {}
                    }
                }
                app.app_desc.app_profiles.push(profile);
            }
            "ParentalRating" => {
                app.parental_ratings.push(ParentalRating {
                    scheme: child.attr("Scheme").unwrap_or_default().into(),
                    region: child.attr("Region").unwrap_or_default().into(),
                    value: parse_int(child.text()) as u8,
                });
            }
            _ => {}
        }
    }
}

fn parse_transport(
    element: &Element,
    transports: &mut [TransportProtocolDesc],
) {
    let protocol_id = match element.attr("type") {
        Some("mhp:HTTPTransportType") => PROTOCOL_HTTP,
        Some("mhp:OCTransportType") => PROTOCOL_OBJECT_CAROUSEL,
        _ => return,
    };
    let mut desc = TransportProtocolDesc {
        protocol_id,
        ..TransportProtocolDesc::default()
    };

    match protocol_id {
        // TS 102 809 §5.4.4.20
        PROTOCOL_HTTP => {
            for child in &element.children {
                match child.name.as_str() {
                    "URLBase" => {
                        desc.url.base_url = child.text().to_owned();
                    }
                    "URLExtension" => {
                        desc.url
                            .extension_urls
                            .push(child.text().to_owned());
                    }
                    _ => {}
                }
            }
        }
        // TS 102 809 §5.4.4.21
        PROTOCOL_OBJECT_CAROUSEL => {
            for child in &element.children {
                match child.name.as_str() {
                    "DvbTriplet" => {
                        desc.oc.remote_connection = true;
                        if let Some(onid) = child.attr("OrigNetId") {
                            desc.oc.original_network_id =
                                parse_int(onid) as u16;
                        }
                        if let Some(tsid) = child.attr("TSId") {
                            desc.oc.transport_stream_id =
                                parse_int(tsid) as u16;
                        }
                        if let Some(sid) = child.attr("ServiceId") {
                            desc.oc.service_id = parse_int(sid) as u16;
                        }
                    }
                    "ComponentTag" => {
                        if let Some(tag) = child.attr("ComponentTag") {
                            desc.oc.component_tag = parse_hex(tag, 2) as u8;
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    insert_transport(transports, desc);
}

fn parse_control_code(value: &str) -> ControlCode {
    match value {
        "AUTOSTART" => ControlCode::Autostart,
        "PRESENT" => ControlCode::Present,
        "DESTROY" => ControlCode::Destroy,
        "KILL" => ControlCode::Kill,
        "PREFETCH" => ControlCode::Prefetch,
        "REMOTE" => ControlCode::Remote,
        "DISABLED" => ControlCode::Disabled,
        "PLAYBACK_AUTOSTART" => ControlCode::PlaybackAutostart,
        _ => ControlCode::Unknown,
    }
}

/// Parses the leading decimal digits of `value`; anything else yields 0.
fn parse_int(value: &str) -> u32 {
    let digits: String =
        value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Parses up to `nibbles` leading hex digits of `value`.
fn parse_hex(value: &str, nibbles: usize) -> u32 {
    let digits: String = value
        .chars()
        .take(nibbles)
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u32::from_str_radix(&digits, 16).unwrap_or(0)
}

/// Packs a 3-letter ISO 639-2 code into its 24-bit form.
fn pack_language_code(code: &str) -> u32 {
    code.bytes()
        .take(3)
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(byte))
}

#[cfg(test)]
mod spec {
    use super::*;
    use crate::ait::table::PROTOCOL_HTTP;

    static SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mhp:ServiceDiscovery xmlns:mhp="urn:dvb:mhp:2009" DomainAttribute="x.tv">
  <mhp:ApplicationDiscovery DomainAttribute="x.tv">
    <mhp:ApplicationList>
      <mhp:Application>
        <mhp:appName Language="eng">Catch-up TV</mhp:appName>
        <mhp:appName Language="fra">Télé de rattrapage</mhp:appName>
        <mhp:applicationIdentifier>
          <mhp:orgId>17</mhp:orgId>
          <mhp:appId>3</mhp:appId>
        </mhp:applicationIdentifier>
        <mhp:applicationDescriptor>
          <mhp:type>
            <mhp:OtherApp>application/vnd.hbbtv.xhtml+xml</mhp:OtherApp>
          </mhp:type>
          <mhp:controlCode>AUTOSTART</mhp:controlCode>
          <mhp:visibility>VISIBLE_ALL</mhp:visibility>
          <mhp:serviceBound>false</mhp:serviceBound>
          <mhp:priority>c8</mhp:priority>
          <mhp:mhpVersion>
            <mhp:profile>0000</mhp:profile>
            <mhp:versionMajor>01</mhp:versionMajor>
            <mhp:versionMinor>06</mhp:versionMinor>
            <mhp:versionMicro>01</mhp:versionMicro>
          </mhp:mhpVersion>
          <mhp:ParentalRating Scheme="dvb-si" Region="GB">8</mhp:ParentalRating>
        </mhp:applicationDescriptor>
        <mhp:applicationBoundary>
          <mhp:BoundaryExtension>https://cdn.x.tv/</mhp:BoundaryExtension>
        </mhp:applicationBoundary>
        <mhp:applicationTransport xsi:type="mhp:HTTPTransportType"
            xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
          <mhp:URLBase>https://x.tv/apps/</mhp:URLBase>
          <mhp:URLExtension>https://mirror.x.tv/apps/</mhp:URLExtension>
        </mhp:applicationTransport>
        <mhp:applicationLocation>catchup/index.html</mhp:applicationLocation>
      </mhp:Application>
      <mhp:Application>
        <mhp:applicationIdentifier>
          <mhp:orgId>17</mhp:orgId>
          <mhp:appId>4</mhp:appId>
        </mhp:applicationIdentifier>
        <mhp:applicationDescriptor>
          <mhp:controlCode>FUTURE_CODE</mhp:controlCode>
          <mhp:priority>1</mhp:priority>
        </mhp:applicationDescriptor>
        <mhp:applicationTransport xsi:type="mhp:OCTransportType"
            xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
          <mhp:DvbTriplet OrigNetId="42" TSId="1" ServiceId="100"/>
          <mhp:ComponentTag ComponentTag="5f"/>
        </mhp:applicationTransport>
        <mhp:applicationLocation>menu</mhp:applicationLocation>
      </mhp:Application>
    </mhp:ApplicationList>
  </mhp:ApplicationDiscovery>
</mhp:ServiceDiscovery>"#;

    #[test]
    fn decodes_service_discovery_documents() {
        let table = parse_ait(SAMPLE).unwrap();
        assert_eq!(table.app_type, APP_TYPE_XML);
        assert!(table.complete);
        assert_eq!(table.apps.len(), 2);

        let app = &table.apps[0];
        assert_eq!((app.org_id, app.app_id), (17, 3));
        assert_eq!(app.control_code, ControlCode::Autostart);
        assert_eq!(app.app_desc.visibility, VISIBLE_ALL);
        assert!(!app.app_desc.service_bound);
        assert_eq!(app.app_desc.priority, 0xC8);
        assert_eq!(
            app.app_desc.app_profiles,
            vec![AppProfile {
                app_profile: 0,
                version_major: 1,
                version_minor: 6,
                version_micro: 1,
            }],
        );
        assert_eq!(app.names.len(), 2);
        assert_eq!(app.names[0].lang_code, 0x656E67);
        assert_eq!(app.names[0].name, "Catch-up TV");
        assert_eq!(app.location, "catchup/index.html");
        assert_eq!(app.boundaries, vec!["https://cdn.x.tv/".to_owned()]);
        assert_eq!(app.parental_ratings.len(), 1);
        assert_eq!(app.parental_ratings[0].scheme, "dvb-si");
        assert_eq!(app.parental_ratings[0].region, "GB");
        assert_eq!(app.parental_ratings[0].value, 8);
        assert_eq!(app.transports[0].protocol_id, PROTOCOL_HTTP);
        assert_eq!(app.transports[0].url.base_url, "https://x.tv/apps/");
        assert_eq!(
            app.transports[0].url.extension_urls,
            vec!["https://mirror.x.tv/apps/".to_owned()],
        );
    }

    #[test]
    fn unknown_control_code_is_kept_but_not_autostartable() {
        let table = parse_ait(SAMPLE).unwrap();
        let app = &table.apps[1];
        assert_eq!(app.control_code, ControlCode::Unknown);
        // service_bound defaults to true when the element is absent.
        assert!(app.app_desc.service_bound);
        assert!(table.autostart_app(18, "GB", "GBR").is_some());
        assert_eq!(table.autostart_app(18, "GB", "GBR").unwrap().app_id, 3);
    }

    #[test]
    fn oc_transport_carries_triplet_and_component_tag() {
        let table = parse_ait(SAMPLE).unwrap();
        let oc = &table.apps[1].transports[0];
        assert_eq!(oc.protocol_id, PROTOCOL_OBJECT_CAROUSEL);
        assert!(oc.oc.remote_connection);
        assert_eq!(oc.oc.original_network_id, 42);
        assert_eq!(oc.oc.transport_stream_id, 1);
        assert_eq!(oc.oc.service_id, 100);
        assert_eq!(oc.oc.component_tag, 0x5F);
    }

    #[test]
    fn rejects_documents_with_a_foreign_root() {
        assert!(matches!(
            parse_ait("<dsmcc></dsmcc>"),
            Err(XmlAitError::UnexpectedRoot(_)),
        ));
        assert!(parse_ait("not xml at all").is_err());
    }

    #[test]
    fn empty_application_list_yields_empty_table() {
        let doc = r#"<ServiceDiscovery xmlns="urn:dvb:mhp:2009">
            <ApplicationDiscovery><ApplicationList/></ApplicationDiscovery>
        </ServiceDiscovery>"#;
        let table = parse_ait(doc).unwrap();
        assert!(table.apps.is_empty());
    }
}
