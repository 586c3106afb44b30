//! Application lifecycle domain: the running application entity, its
//! key-set handling and the manager driving starts, kills and
//! transitions.

pub mod callback;
pub mod keyset;
pub mod manager;

use std::collections::HashMap;

use derive_more::Display;

use crate::{
    ait::table::{AitAppDesc, ControlCode, ParentalRating},
    apps::keyset::{
        key_set_for_code, KEY_SET_NUMERIC, KEY_SET_OTHER, KEY_SET_VCR,
    },
    utils::{self, DvbTriplet},
};

#[doc(inline)]
pub use self::{callback::SessionCallback, manager::ApplicationManager};

/// Application IDs are never 0; the value marks "no application".
pub const INVALID_APP_ID: u16 = 0;

/// Kind of a running application.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AppType {
    Hbbtv,
    OpApp,
}

/// Presentation state of a running application. Regular HbbTV
/// applications only use the first two; operator applications add the
/// transient and overlaid states.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum AppState {
    #[display(fmt = "foreground")]
    Foreground,
    #[display(fmt = "background")]
    Background,
    #[display(fmt = "transient")]
    Transient,
    #[display(fmt = "overlaid-foreground")]
    OverlaidForeground,
    #[display(fmt = "overlaid-transient")]
    OverlaidTransient,
}

/// Linked application scheme governing which key sets an application may
/// claim before its activation.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum LinkedAppScheme {
    #[display(fmt = "linked-app-scheme-1.1")]
    Scheme11,
    #[display(fmt = "linked-app-scheme-1.2")]
    Scheme12,
    #[display(fmt = "linked-app-scheme-2")]
    Scheme2,
}

impl LinkedAppScheme {
    /// Derives the scheme from launch URL parameters.
    #[must_use]
    pub fn from_url_params(params: &str) -> Self {
        if params.contains("lloc=service") {
            Self::Scheme12
        } else if params.contains("lloc=availability") {
            Self::Scheme2
        } else {
            Self::Scheme11
        }
    }
}

/// The (single) application the terminal is running.
#[derive(Clone, Debug)]
pub struct Application {
    /// Monotonically assigned, never [`INVALID_APP_ID`].
    pub id: u16,

    pub entry_url: String,
    pub loaded_url: String,
    pub base_url: String,
    /// Protocol of the transport the base URL was resolved over.
    pub protocol_id: u16,

    pub org_id: u32,
    pub app_id: u16,
    pub control_code: ControlCode,

    pub key_set_mask: u16,
    pub other_keys: Vec<u16>,

    pub app_type: AppType,
    pub state: AppState,
    pub scheme: LinkedAppScheme,
    /// Smallest minor version over the signalled profiles.
    pub version_minor: u8,

    pub is_trusted: bool,
    pub is_broadcast: bool,
    pub is_service_bound: bool,
    pub is_hidden: bool,
    pub is_running: bool,
    /// Autostarted applications activate on their first accepted key.
    pub is_activated: bool,

    pub names: HashMap<u32, String>,
    pub boundaries: Vec<String>,
    pub parental_ratings: Vec<ParentalRating>,
}

impl Application {
    /// Creates a broadcast-independent application from a plain URL.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        Self {
            id: INVALID_APP_ID,
            entry_url: url.to_owned(),
            loaded_url: url.to_owned(),
            base_url: url.to_owned(),
            protocol_id: 0,
            org_id: 0,
            app_id: 0,
            control_code: ControlCode::Unknown,
            key_set_mask: 0,
            other_keys: Vec::new(),
            app_type: AppType::Hbbtv,
            state: AppState::Foreground,
            scheme: LinkedAppScheme::from_url_params(url),
            version_minor: 0,
            is_trusted: false,
            is_broadcast: false,
            is_service_bound: false,
            is_hidden: false,
            is_running: !url.is_empty(),
            is_activated: true,
            names: HashMap::new(),
            boundaries: Vec::new(),
            parental_ratings: Vec::new(),
        }
    }

    /// Creates an application from a signalled AIT entry.
    #[must_use]
    pub fn from_ait_desc(
        desc: &AitAppDesc,
        current_service: DvbTriplet,
        network_available: bool,
        url_params: &str,
        is_broadcast: bool,
        is_trusted: bool,
    ) -> Self {
        let (base_url, protocol_id) =
            desc.base_url(current_service, network_available);
        let entry_url =
            utils::merge_url_params(&base_url, &desc.location, url_params);

        let version_minor = desc
            .app_desc
            .app_profiles
            .iter()
            .map(|profile| profile.version_minor)
            .min()
            .unwrap_or(i8::MAX as u8);

        Self {
            id: INVALID_APP_ID,
            loaded_url: entry_url.clone(),
            entry_url,
            base_url,
            protocol_id,
            org_id: desc.org_id,
            app_id: desc.app_id,
            control_code: desc.control_code,
            key_set_mask: 0,
            other_keys: Vec::new(),
            app_type: AppType::Hbbtv,
            // Broadcast-related applications need to call show.
            state: if is_broadcast {
                AppState::Background
            } else {
                AppState::Foreground
            },
            scheme: LinkedAppScheme::from_url_params(url_params),
            version_minor,
            is_trusted,
            is_broadcast,
            is_service_bound: desc.app_desc.service_bound,
            is_hidden: is_broadcast,
            is_running: false,
            is_activated: desc.control_code != ControlCode::Autostart,
            names: desc
                .names
                .iter()
                .map(|n| (n.lang_code, n.name.clone()))
                .collect(),
            boundaries: desc.boundaries.clone(),
            parental_ratings: desc.parental_ratings.clone(),
        }
    }

    /// Applies a key-set mask requested by the application, stripping the
    /// sets that are not available before activation, and returns the
    /// effective mask.
    ///
    /// Before activation (and outside [`LinkedAppScheme::Scheme2`]) VCR
    /// and NUMERIC are withheld, and OTHER too unless the scheme is
    /// [`LinkedAppScheme::Scheme12`]. Media-control linked applications
    /// (scheme 1.2 at minor version 7) keep VCR so they can control
    /// presentation without being activated first.
    pub fn set_key_set_mask(
        &mut self,
        mut key_set_mask: u16,
        other_keys: Vec<u16>,
    ) -> u16 {
        let scheme12 = self.scheme == LinkedAppScheme::Scheme12;
        let media_control = scheme12 && self.version_minor == 7;

        if !self.is_activated && self.scheme != LinkedAppScheme::Scheme2 {
            if !media_control {
                key_set_mask &= !KEY_SET_VCR;
            }
            key_set_mask &= !KEY_SET_NUMERIC;
            if !scheme12 {
                key_set_mask &= !KEY_SET_OTHER;
            }
        }

        self.key_set_mask = key_set_mask;
        if key_set_mask & KEY_SET_OTHER != 0 {
            self.other_keys = other_keys;
        }
        key_set_mask
    }

    /// Whether the application's key set accepts a key code. Accepting a
    /// key activates the application; activation is never reverted.
    pub fn in_key_set(&mut self, key_code: u16) -> bool {
        if self.key_set_mask & key_set_for_code(key_code) == 0 {
            return false;
        }
        if self.key_set_mask & KEY_SET_OTHER != 0
            && !self.other_keys.contains(&key_code)
        {
            return false;
        }
        if !self.is_activated {
            self.is_activated = true;
        }
        true
    }

    /// Moves the application to `state` if the transition is allowed for
    /// its type, returning whether it was.
    ///
    /// HbbTV applications move freely between foreground and background
    /// and know no other states. Operator applications follow the
    /// transition table of ETSI TS 103 606: foreground may yield to
    /// background or transient; the transient and overlaid states may
    /// yield to foreground or background; background is left only by
    /// relaunch.
    pub fn set_state(&mut self, state: AppState) -> bool {
        if state == self.state {
            return true;
        }
        let allowed = match self.app_type {
            AppType::Hbbtv => matches!(
                state,
                AppState::Foreground | AppState::Background
            ),
            AppType::OpApp => match self.state {
                AppState::Foreground => matches!(
                    state,
                    AppState::Background | AppState::Transient
                ),
                AppState::Transient
                | AppState::OverlaidTransient
                | AppState::OverlaidForeground => matches!(
                    state,
                    AppState::Foreground | AppState::Background
                ),
                AppState::Background => false,
            },
        };
        if allowed {
            self.state = state;
        }
        allowed
    }
}

#[cfg(test)]
mod spec {
    use super::{keyset::*, *};

    fn autostarted_app() -> Application {
        let mut app = Application::from_url("http://x/a.html");
        app.is_activated = false;
        app.version_minor = 1;
        app
    }

    #[test]
    fn scheme_derives_from_url_params() {
        assert_eq!(
            LinkedAppScheme::from_url_params("?lloc=service"),
            LinkedAppScheme::Scheme12,
        );
        assert_eq!(
            LinkedAppScheme::from_url_params("?a=1&lloc=availability"),
            LinkedAppScheme::Scheme2,
        );
        assert_eq!(
            LinkedAppScheme::from_url_params(""),
            LinkedAppScheme::Scheme11,
        );
    }

    #[test]
    fn mask_strips_vcr_and_numeric_before_activation() {
        let mut app = autostarted_app();
        let requested = KEY_SET_NAVIGATION
            | KEY_SET_VCR
            | KEY_SET_NUMERIC
            | KEY_SET_OTHER;
        let effective = app.set_key_set_mask(requested, vec![VK_RECORD]);
        assert_eq!(effective, KEY_SET_NAVIGATION);
        assert!(app.other_keys.is_empty());
    }

    #[test]
    fn scheme_1_2_keeps_other_keys_before_activation() {
        let mut app = autostarted_app();
        app.scheme = LinkedAppScheme::Scheme12;
        let effective = app.set_key_set_mask(
            KEY_SET_VCR | KEY_SET_OTHER,
            vec![VK_RECORD],
        );
        assert_eq!(effective, KEY_SET_OTHER);
        assert_eq!(app.other_keys, vec![VK_RECORD]);
    }

    #[test]
    fn media_control_linked_apps_keep_vcr() {
        let mut app = autostarted_app();
        app.scheme = LinkedAppScheme::Scheme12;
        app.version_minor = 7;
        let effective = app.set_key_set_mask(KEY_SET_VCR, vec![]);
        assert_eq!(effective, KEY_SET_VCR);
    }

    #[test]
    fn scheme_2_apps_are_not_stripped() {
        let mut app = autostarted_app();
        app.scheme = LinkedAppScheme::Scheme2;
        let requested = KEY_SET_VCR | KEY_SET_NUMERIC | KEY_SET_OTHER;
        let effective = app.set_key_set_mask(requested, vec![VK_RECORD]);
        assert_eq!(effective, requested);
    }

    #[test]
    fn activated_apps_keep_the_full_mask() {
        let mut app = autostarted_app();
        app.is_activated = true;
        let requested = KEY_SET_VCR | KEY_SET_NUMERIC;
        assert_eq!(app.set_key_set_mask(requested, vec![]), requested);
    }

    #[test]
    fn accepted_key_activates_once_and_for_all() {
        let mut app = autostarted_app();
        let _ = app.set_key_set_mask(KEY_SET_NAVIGATION, vec![]);
        assert!(!app.is_activated);

        assert!(!app.in_key_set(VK_RED));
        assert!(!app.is_activated);

        assert!(app.in_key_set(VK_ENTER));
        assert!(app.is_activated);

        assert!(app.in_key_set(VK_UP));
        assert!(app.is_activated);
    }

    #[test]
    fn other_bit_requires_listed_keys() {
        let mut app = autostarted_app();
        app.is_activated = true;
        let _ = app.set_key_set_mask(
            KEY_SET_OTHER,
            vec![VK_RECORD],
        );
        assert!(app.in_key_set(VK_RECORD));
        assert!(!app.in_key_set(9999));
    }

    #[test]
    fn hbbtv_states_are_foreground_and_background_only() {
        let mut app = Application::from_url("http://x/");
        assert!(app.set_state(AppState::Background));
        assert!(app.set_state(AppState::Foreground));
        assert!(!app.set_state(AppState::Transient));
    }

    #[test]
    fn opapp_transition_table() {
        let mut app = Application::from_url("http://x/");
        app.app_type = AppType::OpApp;
        app.state = AppState::Foreground;

        assert!(app.set_state(AppState::Transient));
        assert!(app.set_state(AppState::Foreground));
        assert!(app.set_state(AppState::Background));
        // Background is only left by relaunch.
        assert!(!app.set_state(AppState::Foreground));
        assert!(!app.set_state(AppState::Transient));
        // Same state is always a no-op success.
        assert!(app.set_state(AppState::Background));
    }

    #[test]
    fn from_ait_desc_defaults() {
        use crate::ait::table::{
            AitAppDesc, AppDesc, AppProfile, TransportProtocolDesc,
            UrlSelector, PROTOCOL_HTTP,
        };

        let desc = AitAppDesc {
            org_id: 1,
            app_id: 2,
            control_code: ControlCode::Autostart,
            transports: [
                TransportProtocolDesc {
                    protocol_id: PROTOCOL_HTTP,
                    url: UrlSelector {
                        base_url: "http://x/".into(),
                        extension_urls: vec![],
                    },
                    ..TransportProtocolDesc::default()
                },
                TransportProtocolDesc::default(),
            ],
            location: "a.html".into(),
            app_desc: AppDesc {
                service_bound: true,
                app_profiles: vec![
                    AppProfile {
                        version_major: 1,
                        version_minor: 6,
                        version_micro: 1,
                        ..AppProfile::default()
                    },
                    AppProfile {
                        version_major: 1,
                        version_minor: 2,
                        version_micro: 1,
                        ..AppProfile::default()
                    },
                ],
                ..AppDesc::default()
            },
            ..AitAppDesc::default()
        };

        let app = Application::from_ait_desc(
            &desc,
            DvbTriplet::invalid(),
            true,
            "?a=1",
            true,
            false,
        );
        assert_eq!(app.entry_url, "http://x/a.html?a=1");
        assert_eq!(app.loaded_url, app.entry_url);
        assert_eq!(app.protocol_id, PROTOCOL_HTTP);
        assert_eq!(app.state, AppState::Background);
        assert!(app.is_hidden);
        assert!(app.is_service_bound);
        // Autostarted applications await activation by a key event.
        assert!(!app.is_activated);
        assert_eq!(app.version_minor, 2);
    }
}
