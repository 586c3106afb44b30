//! App↔terminal JSON-RPC 2.0 protocol implementation for Iris terminal
//! middleware.
//!
//! Implements the message shapes of the [HbbTV] accessibility and voice
//! negotiation protocol: method negotiation, feature subscription,
//! accessibility feature queries, media state reporting and terminal
//! originated intents.
//!
//! [HbbTV]: https://www.hbbtv.org/resource-library

use std::{fmt, str::FromStr};

use derive_more::Display;
use serde::{
    de::{self, Deserializer, Visitor},
    ser::{SerializeMap, Serializer},
    Deserialize, Serialize,
};
use serde_json::Value;

/// JSON-RPC method names understood by the terminal or by applications.
pub mod methods {
    /// Method negotiation (always callable, even before negotiation).
    pub const NEGOTIATE_METHODS: &str = "org.hbbtv.negotiateMethods";

    /// Subscription to feature preference change notifications.
    pub const SUBSCRIBE: &str = "org.hbbtv.subscribe";
    /// Removal of feature preference change subscriptions.
    pub const UNSUBSCRIBE: &str = "org.hbbtv.unsubscribe";

    /// Terminal-to-app preference change notification.
    pub const NOTIFY: &str = "org.hbbtv.notify";

    /// Accessibility feature support interrogation.
    pub const AF_FEATURE_SUPPORT_INFO: &str = "org.hbbtv.af.featureSupportInfo";
    /// Accessibility feature settings interrogation.
    pub const AF_FEATURE_SETTINGS_QUERY: &str =
        "org.hbbtv.af.featureSettingsQuery";
    /// Accessibility feature suppression.
    pub const AF_FEATURE_SUPPRESS: &str = "org.hbbtv.af.featureSuppress";
    /// Dialogue enhancement gain override.
    pub const AF_DIALOGUE_ENHANCEMENT_OVERRIDE: &str =
        "org.hbbtv.af.dialogueEnhancementOverride";
    /// Haptic/audible "response to user action" trigger.
    pub const AF_TRIGGER_RESPONSE_TO_USER_ACTION: &str =
        "org.hbbtv.af.triggerResponseToUserAction";

    /// App-to-terminal voice readiness notification.
    pub const APP_VOICE_READY: &str = "org.hbbtv.app.voice.ready";
    /// App-to-terminal media state report.
    pub const APP_STATE_MEDIA: &str = "org.hbbtv.app.state.media";

    /// Terminal-to-app media intents.
    pub const INTENT_MEDIA_PAUSE: &str = "org.hbbtv.app.intent.media.pause";
    pub const INTENT_MEDIA_PLAY: &str = "org.hbbtv.app.intent.media.play";
    pub const INTENT_MEDIA_FAST_FORWARD: &str =
        "org.hbbtv.app.intent.media.fast-forward";
    pub const INTENT_MEDIA_FAST_REVERSE: &str =
        "org.hbbtv.app.intent.media.fast-reverse";
    pub const INTENT_MEDIA_STOP: &str = "org.hbbtv.app.intent.media.stop";
    pub const INTENT_MEDIA_SEEK_CONTENT: &str =
        "org.hbbtv.app.intent.media.seek-content";
    pub const INTENT_MEDIA_SEEK_RELATIVE: &str =
        "org.hbbtv.app.intent.media.seek-relative";
    pub const INTENT_MEDIA_SEEK_LIVE: &str =
        "org.hbbtv.app.intent.media.seek-live";
    pub const INTENT_MEDIA_SEEK_WALLCLOCK: &str =
        "org.hbbtv.app.intent.media.seek-wallclock";
    /// Terminal-to-app search intent.
    pub const INTENT_SEARCH: &str = "org.hbbtv.app.intent.search";
    /// Terminal-to-app display intent.
    pub const INTENT_DISPLAY: &str = "org.hbbtv.app.intent.display";
    /// Terminal-to-app playback intent.
    pub const INTENT_PLAYBACK: &str = "org.hbbtv.app.intent.playback";

    /// Operator app to terminal IP playback reports.
    pub const IPPLAYBACK_STATUS_UPDATE: &str =
        "org.hbbtv.ipplayback.statusUpdate";
    pub const IPPLAYBACK_MEDIA_POSITION_UPDATE: &str =
        "org.hbbtv.ipplayback.mediaPositionUpdate";
    pub const IPPLAYBACK_SET_COMPONENTS: &str =
        "org.hbbtv.ipplayback.setComponents";
    pub const IPPLAYBACK_SET_TIMELINE_MAPPING: &str =
        "org.hbbtv.ipplayback.setTimelineMapping";
    pub const IPPLAYBACK_SET_PRESENT_FOLLOWING: &str =
        "org.hbbtv.ipplayback.setPresentFollowing";

    /// Terminal to operator app IP player control.
    pub const IPPLAYER_SELECT_CHANNEL: &str =
        "org.hbbtv.ipplayer.selectChannel";
    pub const IPPLAYER_PLAY: &str = "org.hbbtv.ipplayer.play";
    pub const IPPLAYER_PAUSE: &str = "org.hbbtv.ipplayer.pause";
    pub const IPPLAYER_STOP: &str = "org.hbbtv.ipplayer.stop";
    pub const IPPLAYER_RESUME: &str = "org.hbbtv.ipplayer.resume";
    pub const IPPLAYER_SEEK: &str = "org.hbbtv.ipplayer.seek";
    pub const IPPLAYER_SET_VIDEO_WINDOW: &str =
        "org.hbbtv.ipplayer.setVideoWindow";
    pub const IPPLAYER_SET_RELATIVE_VOLUME: &str =
        "org.hbbtv.ipplayer.setRelativeVolume";
    pub const IPPLAYER_SELECT_COMPONENTS: &str =
        "org.hbbtv.ipplayer.selectComponents";
    pub const IPPLAYER_RESOLVE_TIMELINE: &str =
        "org.hbbtv.ipplayer.resolveTimeline";
}

/// Protocol version marker: serializes as the literal `"2.0"` and refuses
/// anything else on deserialization.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let version = String::deserialize(d)?;
        if version == "2.0" {
            Ok(Version)
        } else {
            Err(de::Error::custom("jsonrpc version is not 2.0"))
        }
    }
}

/// ID of a JSON-RPC request.
///
/// Applications may use either numbers or strings; responses must echo the
/// exact type that was received, so the original wire type is preserved as
/// a tagged union rather than a prefixed string.
#[derive(Clone, Debug, Display, Eq, Hash, PartialEq)]
pub enum RequestId {
    /// ID that arrived as a JSON number.
    Num(i64),
    /// ID that arrived as a JSON string.
    Str(String),
}

impl RequestId {
    /// Extracts a [`RequestId`] from a raw JSON value, if it is of a type
    /// permitted by JSON-RPC 2.0.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Num),
            Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Num(n) => s.serialize_i64(*n),
            Self::Str(id) => s.serialize_str(id),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RpcError {
    /// Machine readable error code.
    pub code: i64,
    /// Human readable error description.
    pub message: String,
    /// Optional additional information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl RpcError {
    /// `-32700 Parse error`: invalid JSON was received.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    /// `-32600 Invalid Request`: the JSON is not a valid request object.
    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(-32600, "Invalid Request")
    }

    /// `-32601 Method not found`: unknown or not negotiated method.
    #[must_use]
    pub fn method_not_found() -> Self {
        Self::new(-32601, "Method not found")
    }

    /// `-32602 Invalid params`: parameters fail the method schema.
    #[must_use]
    pub fn invalid_params() -> Self {
        Self::new(-32602, "Invalid params")
    }

    fn new(code: i64, message: &str) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Message sent by the terminal to an application.
///
/// All four JSON-RPC shapes that ever leave the terminal: responses to
/// application requests, error responses, terminal originated requests
/// (intents, IP player control) and notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum TerminalMsg {
    /// Successful response to an application request.
    Result {
        /// ID echoed from the application request.
        id: RequestId,
        /// Method specific result object.
        result: Value,
    },

    /// Error response to an application request. `id` is absent when the
    /// request was not parseable enough to recover one.
    Error {
        id: Option<RequestId>,
        error: RpcError,
    },

    /// Terminal originated request expecting a confirmation.
    Request {
        id: RequestId,
        method: String,
        params: Value,
    },

    /// Terminal originated notification (no confirmation expected).
    Notification { method: String, params: Value },
}

impl Serialize for TerminalMsg {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(None)?;
        map.serialize_entry("jsonrpc", &Version)?;
        match self {
            Self::Result { id, result } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("result", result)?;
            }
            Self::Error { id, error } => {
                match id {
                    Some(id) => map.serialize_entry("id", id)?,
                    None => map.serialize_entry("id", &Value::Null)?,
                }
                map.serialize_entry("error", error)?;
            }
            Self::Request { id, method, params } => {
                map.serialize_entry("id", id)?;
                map.serialize_entry("method", method)?;
                map.serialize_entry("params", params)?;
            }
            Self::Notification { method, params } => {
                map.serialize_entry("method", method)?;
                map.serialize_entry("params", params)?;
            }
        }
        map.end()
    }
}

/// Accessibility feature negotiated over the protocol.
///
/// The wire order is fixed; the `feature` parameter of the `org.hbbtv.af.*`
/// methods may arrive either as the feature index or as its name.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Feature {
    #[display(fmt = "subtitles")]
    Subtitles,
    #[display(fmt = "dialogueEnhancement")]
    DialogueEnhancement,
    #[display(fmt = "uiMagnifier")]
    UiMagnifier,
    #[display(fmt = "highContrastUI")]
    HighContrastUi,
    #[display(fmt = "screenReader")]
    ScreenReader,
    #[display(fmt = "responseToUserAction")]
    ResponseToUserAction,
    #[display(fmt = "audioDescription")]
    AudioDescription,
    #[display(fmt = "inVisionSigning")]
    InVisionSigning,
}

impl Feature {
    /// All features in wire order (`subtitles = 0` … `inVisionSigning = 7`).
    pub const ALL: [Feature; 8] = [
        Feature::Subtitles,
        Feature::DialogueEnhancement,
        Feature::UiMagnifier,
        Feature::HighContrastUi,
        Feature::ScreenReader,
        Feature::ResponseToUserAction,
        Feature::AudioDescription,
        Feature::InVisionSigning,
    ];

    /// Wire name of this feature.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Subtitles => "subtitles",
            Self::DialogueEnhancement => "dialogueEnhancement",
            Self::UiMagnifier => "uiMagnifier",
            Self::HighContrastUi => "highContrastUI",
            Self::ScreenReader => "screenReader",
            Self::ResponseToUserAction => "responseToUserAction",
            Self::AudioDescription => "audioDescription",
            Self::InVisionSigning => "inVisionSigning",
        }
    }

    /// Wire index of this feature.
    #[must_use]
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or_default()
    }

    /// Looks a feature up by its wire index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Name of the preference change notification of this feature, as used
    /// in `subscribe`/`unsubscribe` `msgType` lists and `notify` messages.
    #[must_use]
    pub fn pref_change_name(self) -> String {
        format!("{}PrefChange", self.name())
    }

    /// Resolves a `msgType` entry (`<feature>PrefChange`) back to the
    /// feature it refers to.
    #[must_use]
    pub fn from_pref_change_name(msg_type: &str) -> Option<Self> {
        let name = msg_type.strip_suffix("PrefChange")?;
        name.parse().ok()
    }
}

impl FromStr for Feature {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|f| f.name() == s)
            .copied()
            .ok_or(())
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct FeatureVisitor;

        impl<'de> Visitor<'de> for FeatureVisitor {
            type Value = Feature;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a feature name or its index")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Feature, E> {
                Feature::from_index(v as usize).ok_or_else(|| {
                    E::custom(format!("unknown feature index: {}", v))
                })
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Feature, E> {
                if v < 0 {
                    return Err(E::custom("negative feature index"));
                }
                self.visit_u64(v as u64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Feature, E> {
                v.parse().map_err(|_| {
                    E::custom(format!("unknown feature name: {}", v))
                })
            }
        }

        d.deserialize_any(FeatureVisitor)
    }
}

/// Level of terminal support for a [`Feature`], as reported by
/// `org.hbbtv.af.featureSupportInfo`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FeatureSupport {
    #[serde(rename = "notSupported")]
    NotSupported,
    #[serde(rename = "tvosOnly")]
    TvosOnly,
    #[serde(rename = "tvosAndHbbTV")]
    TvosAndHbbTv,
    #[serde(rename = "supportedNoSetting")]
    SupportedNoSetting,
}

/// Result of an `org.hbbtv.af.featureSuppress` request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SuppressStatus {
    #[serde(rename = "suppressing")]
    Suppressing,
    #[serde(rename = "notSuppressing")]
    NotSuppressing,
    #[serde(rename = "featureNotSupported")]
    FeatureNotSupported,
}

/// Parameters of `org.hbbtv.negotiateMethods`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateMethodsParams {
    /// Methods the application offers to receive from the terminal.
    #[serde(default)]
    pub terminal_to_app: Vec<String>,
    /// Methods the application intends to call on the terminal.
    #[serde(default)]
    pub app_to_terminal: Vec<String>,
}

/// Parameters of `org.hbbtv.subscribe` and `org.hbbtv.unsubscribe`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeParams {
    /// `<feature>PrefChange` message type names.
    pub msg_type: Vec<String>,
}

/// Parameters of `org.hbbtv.app.voice.ready`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct VoiceReadyParams {
    /// Whether the application is ready to receive voice intents.
    pub ready: bool,
}

/// Parameters of `org.hbbtv.af.dialogueEnhancementOverride`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueEnhancementOverrideParams {
    /// Requested gain in dB; absent means "restore the user preference".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_enhancement_gain: Option<i64>,
}

/// Magnitude of an `org.hbbtv.af.triggerResponseToUserAction` request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ResponseMagnitude {
    #[serde(rename = "triggerPrimary")]
    TriggerPrimary,
    #[serde(rename = "triggerSecondary")]
    TriggerSecondary,
    #[serde(rename = "triggerException")]
    TriggerException,
}

/// Parameters of `org.hbbtv.af.triggerResponseToUserAction`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct TriggerResponseToUserActionParams {
    pub magnitude: ResponseMagnitude,
}

/// Parameters of the `org.hbbtv.af.*` feature interrogation methods.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct FeatureParams {
    pub feature: Feature,
}

/// User settings of the subtitles feature.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitlesSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_colour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_opacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_colour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_colour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_opacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_colour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_opacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Gain range of the dialogue enhancement feature.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DialogueEnhancementLimit {
    pub min: i64,
    pub max: i64,
}

/// User settings of the dialogue enhancement feature.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueEnhancementSettings {
    pub dialogue_enhancement_gain_preference: i64,
    pub dialogue_enhancement_gain: i64,
    pub dialogue_enhancement_limit: DialogueEnhancementLimit,
}

/// User settings of the UI magnification feature.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMagnifierSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag_type: Option<String>,
}

/// User settings of the high contrast UI feature.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighContrastUiSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hc_type: Option<String>,
}

/// User settings of the screen reader feature.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenReaderSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// User settings of the "response to user action" feature.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseToUserActionSettings {
    pub enabled: bool,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_type: Option<String>,
}

/// User settings of the audio description feature.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDescriptionSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_preference: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_azimuth_preference: Option<i64>,
}

/// User settings of the in-vision signing feature.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct InVisionSigningSettings {
    pub enabled: bool,
}

/// Settings value of some [`Feature`], as carried in the `value` member of
/// `featureSettingsQuery` responses and `notify` messages.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureSettings {
    DialogueEnhancement(DialogueEnhancementSettings),
    Subtitles(SubtitlesSettings),
    ScreenReader(ScreenReaderSettings),
    AudioDescription(AudioDescriptionSettings),
    UiMagnifier(UiMagnifierSettings),
    HighContrastUi(HighContrastUiSettings),
    ResponseToUserAction(ResponseToUserActionSettings),
    InVisionSigning(InVisionSigningSettings),
}

impl FeatureSettings {
    /// The [`Feature`] these settings belong to.
    #[must_use]
    pub fn feature(&self) -> Feature {
        match self {
            Self::Subtitles(_) => Feature::Subtitles,
            Self::DialogueEnhancement(_) => Feature::DialogueEnhancement,
            Self::UiMagnifier(_) => Feature::UiMagnifier,
            Self::HighContrastUi(_) => Feature::HighContrastUi,
            Self::ScreenReader(_) => Feature::ScreenReader,
            Self::ResponseToUserAction(_) => Feature::ResponseToUserAction,
            Self::AudioDescription(_) => Feature::AudioDescription,
            Self::InVisionSigning(_) => Feature::InVisionSigning,
        }
    }
}

/// Presentation state reported via `org.hbbtv.app.state.media`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaState {
    NoPresentation,
    Stopped,
    Buffering,
    Paused,
    Playing,
}

/// Kind of the presented media.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum MediaKind {
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "audio-video")]
    AudioVideo,
}

/// Type of the presented media.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    Live,
    OnDemand,
}

/// Seekable range of the presented media. Anchors are either numeric
/// offsets or wallclock strings, so they are kept as raw values.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MediaRange {
    pub start: Value,
    pub end: Value,
}

/// Action availability flags of the presented media.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AvailableActions {
    #[serde(default)]
    pub pause: bool,
    #[serde(default)]
    pub play: bool,
    #[serde(default, rename = "fast-forward")]
    pub fast_forward: bool,
    #[serde(default, rename = "fast-reverse")]
    pub fast_reverse: bool,
    #[serde(default)]
    pub stop: bool,
    #[serde(default, rename = "seek-content")]
    pub seek_content: bool,
    #[serde(default, rename = "seek-relative")]
    pub seek_relative: bool,
    #[serde(default, rename = "seek-live")]
    pub seek_live: bool,
    #[serde(default, rename = "seek-wallclock")]
    pub seek_wallclock: bool,
}

/// Descriptive metadata of the presented media.
///
/// All four fields are distinct; none of them mirrors the
/// `state`/`kind`/`type` values.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "secTitle", skip_serializing_if = "Option::is_none")]
    pub second_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
}

/// Enabled/available state of one accessibility aspect of the media.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AccessibilityState {
    pub enabled: bool,
    pub available: bool,
}

/// Accessibility aspects of the presented media.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAccessibility {
    pub subtitles: AccessibilityState,
    pub audio_description: AccessibilityState,
    pub sign_language: AccessibilityState,
}

/// Parameters of `org.hbbtv.app.state.media`.
///
/// Which members are required depends on the reported [`MediaState`]; see
/// [`StateMediaParams::validate`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMediaParams {
    pub state: MediaState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<MediaRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_actions: Option<AvailableActions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<MediaAccessibility>,
}

impl StateMediaParams {
    /// Checks the state dependent member requirements:
    ///
    /// - `buffering`/`paused`/`playing`/`stopped` require `kind` and
    ///   `type`;
    /// - `buffering`/`paused`/`playing` additionally require
    ///   `currentTime`, `range` and the full `accessibility` object;
    /// - every state except `noPresentation` requires `metadata.title`.
    pub fn validate(&self) -> Result<(), &'static str> {
        use MediaState as S;

        let presenting = matches!(
            self.state,
            S::Buffering | S::Paused | S::Playing | S::Stopped
        );
        let timed = matches!(self.state, S::Buffering | S::Paused | S::Playing);

        if presenting && (self.kind.is_none() || self.media_type.is_none()) {
            return Err("kind and type are required in this state");
        }
        if timed {
            if self.current_time.is_none() {
                return Err("currentTime is required in this state");
            }
            if self.range.is_none() {
                return Err("range is required in this state");
            }
            if self.accessibility.is_none() {
                return Err("accessibility is required in this state");
            }
        }
        if self.state != S::NoPresentation {
            let has_title = self
                .metadata
                .as_ref()
                .map_or(false, |m| m.title.is_some());
            if !has_title {
                return Err("metadata.title is required in this state");
            }
        }
        Ok(())
    }
}

/// Anchor of a content or playback seek.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekAnchor {
    Start,
    End,
}

/// Terminal-to-app intent expressing a (voice originated) user action.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    MediaPause,
    MediaPlay,
    MediaFastForward,
    MediaFastReverse,
    MediaStop,
    MediaSeekContent { anchor: SeekAnchor, offset: i64 },
    MediaSeekRelative { offset: i64 },
    MediaSeekLive { offset: i64 },
    MediaSeekWallclock { date_time: String },
    Search { query: String },
    Display { media_id: String },
    Playback {
        media_id: String,
        anchor: Option<SeekAnchor>,
        offset: Option<i64>,
    },
}

impl Intent {
    /// JSON-RPC method name delivering this intent.
    #[must_use]
    pub fn method(&self) -> &'static str {
        use methods as m;
        match self {
            Self::MediaPause => m::INTENT_MEDIA_PAUSE,
            Self::MediaPlay => m::INTENT_MEDIA_PLAY,
            Self::MediaFastForward => m::INTENT_MEDIA_FAST_FORWARD,
            Self::MediaFastReverse => m::INTENT_MEDIA_FAST_REVERSE,
            Self::MediaStop => m::INTENT_MEDIA_STOP,
            Self::MediaSeekContent { .. } => m::INTENT_MEDIA_SEEK_CONTENT,
            Self::MediaSeekRelative { .. } => m::INTENT_MEDIA_SEEK_RELATIVE,
            Self::MediaSeekLive { .. } => m::INTENT_MEDIA_SEEK_LIVE,
            Self::MediaSeekWallclock { .. } => m::INTENT_MEDIA_SEEK_WALLCLOCK,
            Self::Search { .. } => m::INTENT_SEARCH,
            Self::Display { .. } => m::INTENT_DISPLAY,
            Self::Playback { .. } => m::INTENT_PLAYBACK,
        }
    }

    /// Builds the `params` object of this intent. Every intent carries the
    /// `origin` of the user action.
    #[must_use]
    pub fn params(&self, origin: &str) -> Value {
        let mut params = serde_json::Map::new();
        let _ = params.insert("origin".into(), origin.into());
        match self {
            Self::MediaPause
            | Self::MediaPlay
            | Self::MediaFastForward
            | Self::MediaFastReverse
            | Self::MediaStop => {}
            Self::MediaSeekContent { anchor, offset } => {
                let _ = params.insert(
                    "anchor".into(),
                    serde_json::to_value(anchor).unwrap_or(Value::Null),
                );
                let _ = params.insert("offset".into(), (*offset).into());
            }
            Self::MediaSeekRelative { offset }
            | Self::MediaSeekLive { offset } => {
                let _ = params.insert("offset".into(), (*offset).into());
            }
            Self::MediaSeekWallclock { date_time } => {
                let _ = params
                    .insert("date-time".into(), date_time.clone().into());
            }
            Self::Search { query } => {
                let _ = params.insert("query".into(), query.clone().into());
            }
            Self::Display { media_id } => {
                let _ =
                    params.insert("mediaId".into(), media_id.clone().into());
            }
            Self::Playback {
                media_id,
                anchor,
                offset,
            } => {
                let _ =
                    params.insert("mediaId".into(), media_id.clone().into());
                if let Some(anchor) = anchor {
                    let _ = params.insert(
                        "anchor".into(),
                        serde_json::to_value(anchor).unwrap_or(Value::Null),
                    );
                }
                if let Some(offset) = offset {
                    let _ = params.insert("offset".into(), (*offset).into());
                }
            }
        }
        Value::Object(params)
    }
}

/// Builds the `params` of an `org.hbbtv.notify` preference change message.
#[must_use]
pub fn notify_params(settings: &FeatureSettings) -> Value {
    let mut params = serde_json::Map::new();
    let _ = params.insert(
        "msgType".into(),
        settings.feature().pref_change_name().into(),
    );
    let _ = params.insert(
        "value".into(),
        serde_json::to_value(settings).unwrap_or(Value::Null),
    );
    Value::Object(params)
}

#[cfg(test)]
mod spec {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_id_round_trips_with_original_type() {
        let num = RequestId::from_value(&json!(7)).unwrap();
        assert_eq!(serde_json::to_value(&num).unwrap(), json!(7));

        let s = RequestId::from_value(&json!("7")).unwrap();
        assert_eq!(serde_json::to_value(&s).unwrap(), json!("7"));

        assert!(RequestId::from_value(&json!({"a": 1})).is_none());
        assert!(RequestId::from_value(&json!(true)).is_none());
    }

    #[test]
    fn feature_accepts_index_and_name() {
        let by_name: Feature =
            serde_json::from_value(json!("highContrastUI")).unwrap();
        assert_eq!(by_name, Feature::HighContrastUi);

        let by_index: Feature = serde_json::from_value(json!(4)).unwrap();
        assert_eq!(by_index, Feature::ScreenReader);

        assert!(serde_json::from_value::<Feature>(json!(8)).is_err());
        assert!(serde_json::from_value::<Feature>(json!("bogus")).is_err());
    }

    #[test]
    fn feature_pref_change_names() {
        assert_eq!(
            Feature::Subtitles.pref_change_name(),
            "subtitlesPrefChange"
        );
        assert_eq!(
            Feature::from_pref_change_name("audioDescriptionPrefChange"),
            Some(Feature::AudioDescription),
        );
        assert_eq!(Feature::from_pref_change_name("subtitles"), None);
        assert_eq!(Feature::from_pref_change_name("bogusPrefChange"), None);
    }

    #[test]
    fn terminal_msg_result_shape() {
        let msg = TerminalMsg::Result {
            id: RequestId::Num(3),
            result: json!({"method": methods::SUBSCRIBE}),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "result": {"method": "org.hbbtv.subscribe"},
            }),
        );
    }

    #[test]
    fn terminal_msg_error_without_id_serializes_null_id() {
        let msg = TerminalMsg::Error {
            id: None,
            error: RpcError::parse_error(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": -32700, "message": "Parse error"},
            }),
        );
    }

    #[test]
    fn state_media_requirements_follow_state() {
        let mut params = StateMediaParams {
            state: MediaState::Playing,
            kind: Some(MediaKind::AudioVideo),
            media_type: Some(MediaType::OnDemand),
            current_time: Some(json!(12.5)),
            range: Some(MediaRange {
                start: json!(0),
                end: json!(90),
            }),
            available_actions: Some(AvailableActions::default()),
            metadata: Some(MediaMetadata {
                title: Some("News".into()),
                ..MediaMetadata::default()
            }),
            accessibility: Some(MediaAccessibility {
                subtitles: AccessibilityState::default(),
                audio_description: AccessibilityState::default(),
                sign_language: AccessibilityState::default(),
            }),
        };
        assert!(params.validate().is_ok());

        params.range = None;
        assert!(params.validate().is_err());
        params.range = Some(MediaRange {
            start: json!(0),
            end: json!(90),
        });

        params.state = MediaState::Stopped;
        params.current_time = None;
        params.accessibility = None;
        assert!(params.validate().is_ok());

        params.metadata = None;
        assert!(params.validate().is_err());

        params.state = MediaState::NoPresentation;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn intent_params_carry_origin() {
        let intent = Intent::MediaSeekContent {
            anchor: SeekAnchor::Start,
            offset: 30,
        };
        assert_eq!(intent.method(), methods::INTENT_MEDIA_SEEK_CONTENT);
        assert_eq!(
            intent.params("voice"),
            json!({"origin": "voice", "anchor": "start", "offset": 30}),
        );
    }

    #[test]
    fn notify_params_shape() {
        let settings =
            FeatureSettings::InVisionSigning(InVisionSigningSettings {
                enabled: true,
            });
        assert_eq!(
            notify_params(&settings),
            json!({
                "msgType": "inVisionSigningPrefChange",
                "value": {"enabled": true},
            }),
        );
    }
}
