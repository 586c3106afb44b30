//! JSON-RPC 2.0 WebSocket service implementing the HbbTV accessibility
//! and voice negotiation protocol.

pub mod server;
pub mod service;
pub mod session;

use derive_more::Display;
use iris_app_api_proto::{
    Feature, FeatureSettings, FeatureSupport, InVisionSigningSettings,
    ResponseMagnitude, StateMediaParams, SubtitlesSettings, SuppressStatus,
    UiMagnifierSettings, methods,
};
use serde_json::Value;

use crate::log::prelude::*;

#[doc(inline)]
pub use self::service::RpcService;

/// ID of an admitted WebSocket connection.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub struct ConnectionId(pub u64);

/// Maximum accepted WebSocket frame size; larger frames close the
/// connection with code 1009.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Methods a regular application may call on the terminal.
pub static SUPPORTED_APP_TO_TERMINAL: &[&str] = &[
    methods::NEGOTIATE_METHODS,
    methods::SUBSCRIBE,
    methods::UNSUBSCRIBE,
    methods::AF_FEATURE_SUPPORT_INFO,
    methods::AF_FEATURE_SETTINGS_QUERY,
    methods::AF_FEATURE_SUPPRESS,
    methods::AF_DIALOGUE_ENHANCEMENT_OVERRIDE,
    methods::AF_TRIGGER_RESPONSE_TO_USER_ACTION,
    methods::APP_VOICE_READY,
    methods::APP_STATE_MEDIA,
];

/// Methods the terminal may call on a regular application.
pub static SUPPORTED_TERMINAL_TO_APP: &[&str] = &[
    methods::NOTIFY,
    methods::INTENT_MEDIA_PAUSE,
    methods::INTENT_MEDIA_PLAY,
    methods::INTENT_MEDIA_FAST_FORWARD,
    methods::INTENT_MEDIA_FAST_REVERSE,
    methods::INTENT_MEDIA_STOP,
    methods::INTENT_MEDIA_SEEK_CONTENT,
    methods::INTENT_MEDIA_SEEK_RELATIVE,
    methods::INTENT_MEDIA_SEEK_LIVE,
    methods::INTENT_MEDIA_SEEK_WALLCLOCK,
    methods::INTENT_SEARCH,
    methods::INTENT_DISPLAY,
    methods::INTENT_PLAYBACK,
];

/// Additional methods an operator application may call on the terminal.
pub static SUPPORTED_OPAPP_TO_TERMINAL: &[&str] = &[
    methods::IPPLAYBACK_STATUS_UPDATE,
    methods::IPPLAYBACK_MEDIA_POSITION_UPDATE,
    methods::IPPLAYBACK_SET_COMPONENTS,
    methods::IPPLAYBACK_SET_TIMELINE_MAPPING,
    methods::IPPLAYBACK_SET_PRESENT_FOLLOWING,
];

/// Additional methods the terminal may call on an operator application.
pub static SUPPORTED_TERMINAL_TO_OPAPP: &[&str] = &[
    methods::IPPLAYER_SELECT_CHANNEL,
    methods::IPPLAYER_PLAY,
    methods::IPPLAYER_PAUSE,
    methods::IPPLAYER_STOP,
    methods::IPPLAYER_RESUME,
    methods::IPPLAYER_SEEK,
    methods::IPPLAYER_SET_VIDEO_WINDOW,
    methods::IPPLAYER_SET_RELATIVE_VOLUME,
    methods::IPPLAYER_SELECT_COMPONENTS,
    methods::IPPLAYER_RESOLVE_TIMELINE,
];

/// Whether a connection may call the given method on the terminal at all
/// (before considering what it negotiated).
#[must_use]
pub fn is_supported_app_to_terminal(method: &str, opapp: bool) -> bool {
    SUPPORTED_APP_TO_TERMINAL.contains(&method)
        || (opapp && SUPPORTED_OPAPP_TO_TERMINAL.contains(&method))
}

/// Whether the terminal may offer the given method towards a connection.
#[must_use]
pub fn is_supported_terminal_to_app(method: &str, opapp: bool) -> bool {
    SUPPORTED_TERMINAL_TO_APP.contains(&method)
        || (opapp && SUPPORTED_TERMINAL_TO_OPAPP.contains(&method))
}

/// Platform side of the accessibility protocol: the terminal settings the
/// service answers queries from, and the sink for application reports.
///
/// Invoked from the service's execution context; implementations must not
/// block.
pub trait AccessibilityPlatform: Send {
    /// Level of support of a feature.
    fn feature_support(&self, feature: Feature) -> FeatureSupport;

    /// Current user settings of a feature.
    fn feature_settings(&self, feature: Feature) -> FeatureSettings;

    /// Requests suppression of a feature and reports the outcome.
    fn feature_suppress(&self, feature: Feature) -> SuppressStatus;

    /// Overrides the dialogue enhancement gain (`None` restores the user
    /// preference) and returns the applied gain.
    fn dialogue_enhancement_override(&self, gain: Option<i64>) -> i64;

    /// Triggers a response to a user action; returns whether it was
    /// actioned.
    fn trigger_response_to_user_action(
        &self,
        magnitude: ResponseMagnitude,
    ) -> bool;

    /// An application reported (voice) readiness.
    fn on_voice_ready(&self, ready: bool);

    /// An application reported its media presentation state.
    fn on_state_media(&self, state: &StateMediaParams);

    /// An operator application reported an IP playback update.
    fn on_ip_playback(&self, method: &str, params: &Value);
}

/// Stand-in [`AccessibilityPlatform`] logging every interaction and
/// answering with neutral defaults. Real integrations replace it with
/// glue to the terminal's settings store.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPlatform;

impl AccessibilityPlatform for DefaultPlatform {
    fn feature_support(&self, feature: Feature) -> FeatureSupport {
        debug!("feature support queried: {}", feature);
        match feature {
            Feature::Subtitles | Feature::UiMagnifier => {
                FeatureSupport::TvosAndHbbTv
            }
            _ => FeatureSupport::TvosOnly,
        }
    }

    fn feature_settings(&self, feature: Feature) -> FeatureSettings {
        debug!("feature settings queried: {}", feature);
        match feature {
            Feature::Subtitles => {
                FeatureSettings::Subtitles(SubtitlesSettings::default())
            }
            Feature::DialogueEnhancement => {
                FeatureSettings::DialogueEnhancement(<_>::default())
            }
            Feature::UiMagnifier => {
                FeatureSettings::UiMagnifier(UiMagnifierSettings::default())
            }
            Feature::HighContrastUi => {
                FeatureSettings::HighContrastUi(<_>::default())
            }
            Feature::ScreenReader => {
                FeatureSettings::ScreenReader(<_>::default())
            }
            Feature::ResponseToUserAction => {
                FeatureSettings::ResponseToUserAction(<_>::default())
            }
            Feature::AudioDescription => {
                FeatureSettings::AudioDescription(<_>::default())
            }
            Feature::InVisionSigning => FeatureSettings::InVisionSigning(
                InVisionSigningSettings::default(),
            ),
        }
    }

    fn feature_suppress(&self, feature: Feature) -> SuppressStatus {
        debug!("feature suppress requested: {}", feature);
        SuppressStatus::NotSuppressing
    }

    fn dialogue_enhancement_override(&self, gain: Option<i64>) -> i64 {
        debug!("dialogue enhancement override: {:?}", gain);
        gain.unwrap_or(0)
    }

    fn trigger_response_to_user_action(
        &self,
        magnitude: ResponseMagnitude,
    ) -> bool {
        debug!("response to user action: {:?}", magnitude);
        false
    }

    fn on_voice_ready(&self, ready: bool) {
        info!("application voice ready: {}", ready);
    }

    fn on_state_media(&self, state: &StateMediaParams) {
        debug!("application media state: {:?}", state.state);
    }

    fn on_ip_playback(&self, method: &str, _: &Value) {
        debug!("IP playback update: {}", method);
    }
}
