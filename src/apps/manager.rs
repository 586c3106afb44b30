//! The application lifecycle state machine.
//!
//! A single-writer [`actix`] actor owns the AIT reassembler and the (at
//! most one) running application, and reacts to channel changes, AIT
//! updates, network changes and load failures. External collaborators are
//! reached through the injected [`SessionCallback`]; everything else
//! talks to the actor through its mailbox, which serialises all state
//! access.

use std::time::Duration;

use actix::{
    Actor, AsyncContext, Context, Handler, Message, SpawnHandle,
};
use bytes::Bytes;

use crate::{
    ait::{
        section::Ait,
        table::{AitAppDesc, AitTable, ControlCode, PROTOCOL_HTTP},
        xml,
    },
    apps::{AppState, AppType, Application, SessionCallback, INVALID_APP_ID},
    log::prelude::*,
    utils::{self, CreateLocator, DvbTriplet},
};

/// How long a transient operator application may stay transient before
/// it is demoted to background.
const TRANSIENT_COUNTDOWN: Duration = Duration::from_secs(60);

/// Requirement class guarding a privileged request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MethodRequirement {
    ForRunningAppOnly,
    ForBroadcastAppOnly,
    ForBroadcastOrTransitioningAppOnly,
    ForTrustedAppOnly,
}

/// Application lifecycle manager actor.
pub struct ApplicationManager {
    callback: Box<dyn SessionCallback>,

    next_app_id: u16,
    app: Option<Application>,

    ait: Ait,

    current_service: DvbTriplet,
    current_service_received_first_ait: bool,
    current_service_ait_pid: u16,
    is_network_available: bool,

    ait_timeout: Duration,
    ait_timeout_handle: Option<SpawnHandle>,
    transient_handle: Option<SpawnHandle>,
}

impl ApplicationManager {
    /// Creates a manager around the given host callback. `ait_timeout` is
    /// how long to wait for the first AIT after a channel change before
    /// killing the running application.
    #[must_use]
    pub fn new(
        callback: Box<dyn SessionCallback>,
        ait_timeout: Duration,
    ) -> Self {
        Self {
            callback,
            next_app_id: INVALID_APP_ID,
            app: None,
            ait: Ait::default(),
            current_service: DvbTriplet::invalid(),
            current_service_received_first_ait: false,
            current_service_ait_pid: 0,
            is_network_available: false,
            ait_timeout,
            ait_timeout_handle: None,
            transient_handle: None,
        }
    }

    fn is_app_running(&self) -> bool {
        self.app.as_ref().map_or(false, |app| app.is_running)
    }

    /// Next application ID, wrapping and skipping [`INVALID_APP_ID`].
    fn bump_app_id(&mut self) -> u16 {
        self.next_app_id = self.next_app_id.wrapping_add(1);
        if self.next_app_id == INVALID_APP_ID {
            self.next_app_id = 1;
        }
        self.next_app_id
    }

    /// Runs `app`, replacing whatever ran before. Fails on an empty entry
    /// URL or a parental restriction.
    fn run_app(&mut self, mut app: Application) -> bool {
        if app.entry_url.is_empty() {
            return false;
        }

        // XML AITs use the alpha-2 region codes of ISO 3166-1; DVB's
        // parental_rating_descriptor uses the 3-character ISO 3166 code.
        let age = self.callback.parental_control_age();
        let region = self.callback.parental_control_region();
        let region3 = self.callback.parental_control_region3();
        if crate::ait::table::is_age_restricted(
            &app.parental_ratings,
            age,
            &region,
            &region3,
        ) {
            error!(
                "{}: parental control restricted for {} (age {})",
                app.entry_url, region, age,
            );
            return false;
        }

        app.id = self.bump_app_id();
        app.is_running = true;

        if app.is_hidden {
            self.callback.hide_application();
        }

        if !app.is_broadcast && !self.current_service.is_invalid() {
            // Broadcast-independent launch stops any current service.
            self.callback.stop_broadcast();
            self.current_service = DvbTriplet::invalid();
        }

        self.callback.load_application(app.id, &app.entry_url);
        if !app.is_hidden {
            self.callback.show_application();
        }
        self.callback
            .dispatch_application_scheme_updated(app.id, &app.scheme.to_string());

        self.app = Some(app);
        true
    }

    /// Kills the running application: hide, load `about:blank` under a
    /// fresh ID, mark not running.
    fn kill_running_app(&mut self, ctx: &mut Context<Self>) {
        self.cancel_transient_countdown(ctx);
        self.callback.hide_application();
        let blank_id = self.bump_app_id();
        self.callback.load_application(blank_id, "about:blank");
        if let Some(app) = &mut self.app {
            app.is_running = false;
        }
    }

    /// Called when the running application has exited.
    fn on_running_app_exited(&mut self) {
        if self.current_service.is_invalid() {
            error!("unhandled condition (broadcast-independent app exited)");
        } else {
            self.perform_broadcast_autostart();
        }
    }

    /// Creates and runs a new application from a URL, checking that the
    /// caller is allowed to do so.
    fn create_application(&mut self, calling_app_id: u16, url: &str) -> bool {
        info!("create application (url={})", url);
        if calling_app_id != INVALID_APP_ID {
            let calling_app_is_running = self
                .app
                .as_ref()
                .map_or(false, |a| a.is_running && a.id == calling_app_id);
            if !calling_app_is_running {
                info!("called by non-running app, early out");
                return false;
            }
        }
        if url.is_empty() {
            info!("called with empty URL, early out");
            self.callback.dispatch_application_load_error();
            return false;
        }

        let result = match utils::parse_create_locator(
            url,
            self.current_service,
        ) {
            CreateLocator::AitApplication {
                org_id,
                app_id,
                params,
            } => match self.ait.get() {
                None => {
                    info!("no AIT, early out");
                    false
                }
                Some(table) => match table.find_app(org_id, app_id) {
                    Some(desc) => {
                        let app = Application::from_ait_desc(
                            desc,
                            self.current_service,
                            self.is_network_available,
                            &params,
                            true,
                            false,
                        );
                        self.run_app(app)
                    }
                    None => {
                        error!(
                            "could not find app (org_id={}, app_id={})",
                            org_id, app_id,
                        );
                        false
                    }
                },
            },
            CreateLocator::EntryOrXmlAit => {
                let contents = self.callback.get_xml_ait_contents(url);
                if contents.is_empty() {
                    info!("locator resource is an entry page");
                    self.run_app(Application::from_url(url))
                } else {
                    info!("locator resource is an XML AIT");
                    self.process_xml_ait(&contents)
                }
            }
            CreateLocator::Unknown => {
                info!("not creating for unknown locator (url={})", url);
                false
            }
        };

        if !result {
            self.callback.dispatch_application_load_error();
        }
        result
    }

    /// Parses an XML AIT and runs its autostart application.
    fn process_xml_ait(&mut self, contents: &str) -> bool {
        if contents.is_empty() {
            return false;
        }
        let table = match xml::parse_ait(contents) {
            Ok(table) => table,
            Err(e) => {
                error!("failed to parse XML AIT: {}", e);
                return false;
            }
        };
        if table.apps.is_empty() {
            return false;
        }

        let app = match self.autostart_candidate(&table) {
            Some(desc) => Application::from_ait_desc(
                desc,
                self.current_service,
                self.is_network_available,
                "",
                false,
                false,
            ),
            None => return false,
        };
        self.run_app(app)
    }

    /// Autostart selection with the terminal's parental settings applied.
    fn autostart_candidate<'t>(
        &self,
        table: &'t AitTable,
    ) -> Option<&'t AitAppDesc> {
        let age = self.callback.parental_control_age();
        let region = self.callback.parental_control_region();
        let region3 = self.callback.parental_control_region3();
        table.autostart_app(age, &region, &region3)
    }

    /// Handles the first complete AIT after a channel change.
    fn on_first_ait(&mut self, ctx: &mut Context<Self>) {
        let table = match self.ait.get() {
            Some(table) => table,
            None => return,
        };
        info!("new service selected and first AIT received");

        let running = self
            .app
            .as_ref()
            .filter(|app| app.is_running)
            .map(|app| {
                (
                    app.is_broadcast,
                    app.is_service_bound,
                    app.org_id,
                    app.app_id,
                    app.protocol_id,
                )
            });
        if let Some((is_broadcast, service_bound, org_id, app_id, protocol)) =
            running
        {
            if is_broadcast {
                let kill_reason = if service_bound {
                    Some("is service bound")
                } else {
                    Self::signalling_kill_reason(
                        &table, org_id, app_id, protocol,
                    )
                };
                if let Some(reason) = kill_reason {
                    info!("kill running app ({})", reason);
                    self.kill_running_app(ctx);
                }
            } else if !self.transition_to_broadcast_related() {
                info!(
                    "kill running app (could not transition to \
                     broadcast-related)",
                );
                self.kill_running_app(ctx);
            }
        }

        if !self.is_app_running() {
            self.perform_broadcast_autostart();
        }
    }

    /// Handles an updated AIT for the selected service.
    fn on_updated_ait(&mut self, ctx: &mut Context<Self>) {
        let table = match self.ait.get() {
            Some(table) => table,
            None => {
                error!("unexpected condition (AIT updated but missing)");
                return;
            }
        };

        let running = self
            .app
            .as_ref()
            .filter(|app| app.is_running)
            .map(|app| {
                (app.is_broadcast, app.org_id, app.app_id, app.protocol_id)
            });
        if let Some((is_broadcast, org_id, app_id, protocol)) = running {
            if !is_broadcast {
                // A running broadcast-independent app means we should not
                // be tuned to broadcast at all.
                error!(
                    "unexpected condition (AIT updated but app is not \
                     broadcast-related)",
                );
                return;
            }
            let kill_reason = Self::signalling_kill_reason(
                &table, org_id, app_id, protocol,
            );
            if let Some(reason) = kill_reason {
                info!("kill running app ({})", reason);
                self.kill_running_app(ctx);
            }
        }

        if !self.is_app_running() {
            self.perform_broadcast_autostart();
        }
    }

    /// Why a running broadcast-related app must die given the (new or
    /// updated) signalling, if it must.
    fn signalling_kill_reason(
        table: &AitTable,
        org_id: u32,
        app_id: u16,
        protocol_id: u16,
    ) -> Option<&'static str> {
        match table.find_app(org_id, app_id) {
            None => Some("is not signalled in the AIT"),
            Some(signalled)
                if signalled.control_code == ControlCode::Kill =>
            {
                Some("signalled with control code KILL")
            }
            Some(signalled) if !signalled.has_transport(protocol_id) => {
                Some("is not signalled with the same transport protocol")
            }
            Some(_) => None,
        }
    }

    /// Starts the broadcast autostart application, if one is signalled
    /// and eligible.
    fn perform_broadcast_autostart(&mut self) {
        let table = match self.ait.get() {
            Some(table) if self.current_service_received_first_ait => table,
            _ => {
                info!("autostart: no service selected or no AIT, early out");
                return;
            }
        };
        let app = match self.autostart_candidate(&table) {
            Some(desc) => Application::from_ait_desc(
                desc,
                self.current_service,
                self.is_network_available,
                "",
                true,
                false,
            ),
            None => {
                info!("autostart: no eligible app found");
                return;
            }
        };
        if !self.run_app(app) {
            error!("autostart: failed to create app");
        }
    }

    /// Re-classifies the running broadband application as
    /// broadcast-related, when the new AIT signals it as AUTOSTART or
    /// PRESENT and both its entry and loaded URLs lie within an HTTP
    /// transport extended by the signalled boundaries.
    fn transition_to_broadcast_related(&mut self) -> bool {
        let table = match self.ait.get() {
            Some(table) => table,
            None => {
                info!("cannot transition to broadcast (no broadcast AIT)");
                return false;
            }
        };
        let app = match &self.app {
            Some(app)
                if app.is_running && app.app_id != 0 && app.org_id != 0 =>
            {
                app
            }
            _ => {
                info!(
                    "cannot transition to broadcast (no running app or \
                     app/org id is 0)",
                );
                return false;
            }
        };
        let signalled = match table.find_app(app.org_id, app.app_id) {
            Some(signalled) => signalled,
            None => {
                info!(
                    "cannot transition to broadcast (app is not signalled \
                     in the new AIT)",
                );
                return false;
            }
        };
        if signalled.control_code != ControlCode::Autostart
            && signalled.control_code != ControlCode::Present
        {
            info!(
                "cannot transition to broadcast (app is not signalled as \
                 AUTOSTART or PRESENT)",
            );
            return false;
        }

        let url_in_boundaries = |url: &str| {
            signalled.transports.iter().any(|transport| {
                transport.protocol_id == PROTOCOL_HTTP
                    && utils::check_boundaries(
                        url,
                        &transport.url.base_url,
                        &signalled.boundaries,
                    )
            })
        };
        if !url_in_boundaries(&app.entry_url) {
            info!("cannot transition to broadcast (entry URL outside boundaries)");
            return false;
        }
        if !url_in_boundaries(&app.loaded_url) {
            info!("cannot transition to broadcast (loaded URL outside boundaries)");
            return false;
        }

        let service_bound = signalled.app_desc.service_bound;
        if let Some(app) = &mut self.app {
            app.is_broadcast = true;
            app.is_service_bound = service_bound;
        }
        self.callback.dispatch_transitioned_to_broadcast_related();
        true
    }

    /// Re-classifies the running application as broadcast-independent.
    fn transition_to_broadcast_independent(&mut self) -> bool {
        if let Some(app) = &mut self.app {
            app.is_broadcast = false;
        }
        true
    }

    fn start_ait_timeout(&mut self, ctx: &mut Context<Self>) {
        self.stop_ait_timeout(ctx);
        self.ait_timeout_handle =
            Some(ctx.run_later(self.ait_timeout, |act, ctx| {
                act.ait_timeout_handle = None;
                info!("AIT timed out for the selected service");
                act.kill_running_app(ctx);
            }));
    }

    /// Always safe to call, also when no timeout is pending.
    fn stop_ait_timeout(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.ait_timeout_handle.take() {
            let _ = ctx.cancel_future(handle);
        }
    }

    fn start_transient_countdown(&mut self, ctx: &mut Context<Self>) {
        self.cancel_transient_countdown(ctx);
        self.transient_handle =
            Some(ctx.run_later(TRANSIENT_COUNTDOWN, |act, _| {
                act.transient_handle = None;
                let transient = act.app.as_mut().filter(|app| {
                    app.is_running
                        && matches!(
                            app.state,
                            AppState::Transient | AppState::OverlaidTransient,
                        )
                });
                if let Some(app) = transient {
                    if app.set_state(AppState::Background) {
                        act.callback.hide_application();
                    }
                }
            }));
    }

    fn cancel_transient_countdown(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.transient_handle.take() {
            let _ = ctx.cancel_future(handle);
        }
    }
}

impl Actor for ApplicationManager {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        self.callback.hide_application();
    }
}

/// Creates and runs a new application. `calling_app_id` is
/// [`INVALID_APP_ID`] when not called by an application.
#[derive(Debug, Message)]
#[rtype(result = "bool")]
pub struct CreateApplication {
    pub calling_app_id: u16,
    pub url: String,
}

impl Handler<CreateApplication> for ApplicationManager {
    type Result = bool;

    fn handle(
        &mut self,
        msg: CreateApplication,
        _: &mut Context<Self>,
    ) -> bool {
        self.create_application(msg.calling_app_id, &msg.url)
    }
}

/// Destroys the calling application.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct DestroyApplication {
    pub calling_app_id: u16,
}

impl Handler<DestroyApplication> for ApplicationManager {
    type Result = ();

    fn handle(&mut self, msg: DestroyApplication, ctx: &mut Context<Self>) {
        let calling_app_is_running = self
            .app
            .as_ref()
            .map_or(false, |a| a.is_running && a.id == msg.calling_app_id);
        if !calling_app_is_running {
            info!("destroy called by non-running app, early out");
            return;
        }
        self.kill_running_app(ctx);
        self.on_running_app_exited();
    }
}

/// Shows the calling application.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct ShowApplication {
    pub calling_app_id: u16,
}

impl Handler<ShowApplication> for ApplicationManager {
    type Result = ();

    fn handle(&mut self, msg: ShowApplication, _: &mut Context<Self>) {
        if let Some(app) = &mut self.app {
            if app.id == msg.calling_app_id && app.is_hidden {
                app.is_hidden = false;
                if app.is_running {
                    self.callback.show_application();
                }
            }
        }
    }
}

/// Hides the calling application.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct HideApplication {
    pub calling_app_id: u16,
}

impl Handler<HideApplication> for ApplicationManager {
    type Result = ();

    fn handle(&mut self, msg: HideApplication, _: &mut Context<Self>) {
        if let Some(app) = &mut self.app {
            if app.id == msg.calling_app_id && !app.is_hidden {
                app.is_hidden = true;
                if app.is_running {
                    self.callback.hide_application();
                }
            }
        }
    }
}

/// Sets the key-set mask of an application, returning the effective mask.
#[derive(Debug, Message)]
#[rtype(result = "u16")]
pub struct SetKeySetMask {
    pub app_id: u16,
    pub key_set_mask: u16,
    pub other_keys: Vec<u16>,
}

impl Handler<SetKeySetMask> for ApplicationManager {
    type Result = u16;

    fn handle(&mut self, msg: SetKeySetMask, _: &mut Context<Self>) -> u16 {
        match &mut self.app {
            Some(app) if app.id == msg.app_id => {
                app.set_key_set_mask(msg.key_set_mask, msg.other_keys)
            }
            _ => 0,
        }
    }
}

/// Reads the key-set mask of an application.
#[derive(Debug, Message)]
#[rtype(result = "u16")]
pub struct GetKeySetMask {
    pub app_id: u16,
}

impl Handler<GetKeySetMask> for ApplicationManager {
    type Result = u16;

    fn handle(&mut self, msg: GetKeySetMask, _: &mut Context<Self>) -> u16 {
        match &self.app {
            Some(app) if app.id == msg.app_id => app.key_set_mask,
            _ => 0,
        }
    }
}

/// Checks whether a key code is accepted by an application's key set,
/// activating the application when it is.
#[derive(Debug, Message)]
#[rtype(result = "bool")]
pub struct InKeySet {
    pub app_id: u16,
    pub key_code: u16,
}

impl Handler<InKeySet> for ApplicationManager {
    type Result = bool;

    fn handle(&mut self, msg: InKeySet, _: &mut Context<Self>) -> bool {
        match &mut self.app {
            Some(app) if app.id == msg.app_id => {
                app.in_key_set(msg.key_code)
            }
            _ => false,
        }
    }
}

/// Feeds one broadcast AIT section into the pipeline.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct ProcessAitSection {
    pub ait_pid: u16,
    pub service_id: u16,
    pub data: Bytes,
}

impl Handler<ProcessAitSection> for ApplicationManager {
    type Result = ();

    fn handle(&mut self, msg: ProcessAitSection, ctx: &mut Context<Self>) {
        if msg.service_id != self.current_service.service_id {
            info!("AIT is not for the current service, early out");
            return;
        }

        if msg.ait_pid != self.current_service_ait_pid {
            if self.current_service_ait_pid != 0 {
                info!(
                    "AIT moved to another PID (now={}, before={})",
                    msg.ait_pid, self.current_service_ait_pid,
                );
                self.ait.clear();
            }
            self.current_service_ait_pid = msg.ait_pid;
        }

        if !self.ait.process_section(&msg.data) {
            return;
        }
        if self.ait.get().is_none() {
            return;
        }

        if self.current_service_received_first_ait {
            self.on_updated_ait(ctx);
        } else {
            self.stop_ait_timeout(ctx);
            self.current_service_received_first_ait = true;
            self.on_first_ait(ctx);
        }
    }
}

/// Parses an XML AIT and runs the autostart application from it.
#[derive(Debug, Message)]
#[rtype(result = "bool")]
pub struct ProcessXmlAit {
    pub contents: String,
}

impl Handler<ProcessXmlAit> for ApplicationManager {
    type Result = bool;

    fn handle(&mut self, msg: ProcessXmlAit, _: &mut Context<Self>) -> bool {
        self.process_xml_ait(&msg.contents)
    }
}

/// Whether a Teletext application is signalled in the current AIT.
#[derive(Debug, Message)]
#[rtype(result = "bool")]
pub struct IsTeletextApplicationSignalled;

impl Handler<IsTeletextApplicationSignalled> for ApplicationManager {
    type Result = bool;

    fn handle(
        &mut self,
        _: IsTeletextApplicationSignalled,
        _: &mut Context<Self>,
    ) -> bool {
        self.ait
            .get()
            .map_or(false, |table| table.teletext_app().is_some())
    }
}

/// Runs the signalled Teletext application.
#[derive(Debug, Message)]
#[rtype(result = "bool")]
pub struct RunTeletextApplication;

impl Handler<RunTeletextApplication> for ApplicationManager {
    type Result = bool;

    fn handle(
        &mut self,
        _: RunTeletextApplication,
        _: &mut Context<Self>,
    ) -> bool {
        let table = match self.ait.get() {
            Some(table) => table,
            None => return false,
        };
        let app = match table.teletext_app() {
            Some(desc) => Application::from_ait_desc(
                desc,
                self.current_service,
                self.is_network_available,
                "",
                true,
                false,
            ),
            None => {
                error!("could not find Teletext app");
                return false;
            }
        };
        self.run_app(app)
    }
}

/// Checks whether a privileged request from an application is allowed.
#[derive(Debug, Message)]
#[rtype(result = "bool")]
pub struct IsRequestAllowed {
    pub calling_app_id: u16,
    pub calling_page_url: String,
    pub method_requirement: MethodRequirement,
}

impl Handler<IsRequestAllowed> for ApplicationManager {
    type Result = bool;

    fn handle(
        &mut self,
        msg: IsRequestAllowed,
        _: &mut Context<Self>,
    ) -> bool {
        let app = match &self.app {
            Some(app)
                if app.is_running && app.id == msg.calling_app_id =>
            {
                app
            }
            _ => return false,
        };
        if msg.calling_page_url.is_empty()
            || utils::compare_urls(&msg.calling_page_url, "about:blank")
        {
            return false;
        }
        match msg.method_requirement {
            MethodRequirement::ForRunningAppOnly => true,
            MethodRequirement::ForBroadcastAppOnly => app.is_broadcast,
            MethodRequirement::ForBroadcastOrTransitioningAppOnly => {
                !self.current_service.is_invalid()
            }
            MethodRequirement::ForTrustedAppOnly => {
                utils::check_boundaries(
                    &msg.calling_page_url,
                    &app.entry_url,
                    &app.boundaries,
                ) && app.is_trusted
            }
        }
    }
}

/// Broadcast presentation stopped (e.g. `setChannel(null)`).
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct OnBroadcastStopped;

impl Handler<OnBroadcastStopped> for ApplicationManager {
    type Result = ();

    fn handle(&mut self, _: OnBroadcastStopped, ctx: &mut Context<Self>) {
        debug!("broadcast stopped");
        self.current_service_received_first_ait = false;
        self.current_service_ait_pid = 0;
        self.ait.clear();
        self.current_service = DvbTriplet::invalid();
        if !self.transition_to_broadcast_independent() {
            info!(
                "kill running app (could not transition to \
                 broadcast-independent)",
            );
            self.kill_running_app(ctx);
        }
    }
}

/// The selected broadcast channel changed.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct OnChannelChanged {
    pub service: DvbTriplet,
}

impl Handler<OnChannelChanged> for ApplicationManager {
    type Result = ();

    fn handle(&mut self, msg: OnChannelChanged, ctx: &mut Context<Self>) {
        debug!(
            "channel changed (service: {} -> {})",
            self.current_service, msg.service,
        );
        self.current_service_received_first_ait = false;
        self.current_service_ait_pid = 0;
        self.ait.clear();
        self.start_ait_timeout(ctx);
        self.current_service = msg.service;
    }
}

/// Network availability changed.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct OnNetworkAvailabilityChanged {
    pub available: bool,
}

impl Handler<OnNetworkAvailabilityChanged> for ApplicationManager {
    type Result = ();

    fn handle(
        &mut self,
        msg: OnNetworkAvailabilityChanged,
        _: &mut Context<Self>,
    ) {
        debug!("network availability changed: {}", msg.available);
        self.is_network_available = msg.available;
    }
}

/// The browser failed to load an application's entry page.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct OnLoadApplicationFailed {
    pub app_id: u16,
}

impl Handler<OnLoadApplicationFailed> for ApplicationManager {
    type Result = ();

    fn handle(
        &mut self,
        msg: OnLoadApplicationFailed,
        ctx: &mut Context<Self>,
    ) {
        if self.current_service.is_invalid() {
            error!(
                "unhandled condition (failed to load application while \
                 broadcast-independent)",
            );
            return;
        }
        let failed = self
            .app
            .as_ref()
            .filter(|app| app.is_running && app.id == msg.app_id)
            .map(|app| (app.org_id, app.app_id, app.protocol_id));
        let (org_id, app_id, protocol_id) = match failed {
            Some(app) => app,
            None => return,
        };
        if org_id != 0 && app_id != 0 {
            self.ait.set_transport_failed(org_id, app_id, protocol_id);
        }
        self.kill_running_app(ctx);
        self.perform_broadcast_autostart();
    }
}

/// The application navigated; `url` is the page about to load.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct OnApplicationPageChanged {
    pub app_id: u16,
    pub url: String,
}

impl Handler<OnApplicationPageChanged> for ApplicationManager {
    type Result = ();

    fn handle(
        &mut self,
        msg: OnApplicationPageChanged,
        _: &mut Context<Self>,
    ) {
        let matches = self
            .app
            .as_ref()
            .map_or(false, |app| app.is_running && app.id == msg.app_id);
        if !matches {
            return;
        }
        if let Some(app) = &mut self.app {
            app.loaded_url = msg.url;
        }
        if !self.current_service.is_invalid() {
            // Dead JS objects of the previous page may have suspended
            // presentation, set the video rectangle or selected
            // components.
            self.callback.reset_broadcast_presentation();
        }
    }
}

/// Moves an application to another presentation state.
#[derive(Debug, Message)]
#[rtype(result = "bool")]
pub struct SetApplicationState {
    pub app_id: u16,
    pub state: AppState,
}

impl Handler<SetApplicationState> for ApplicationManager {
    type Result = bool;

    fn handle(
        &mut self,
        msg: SetApplicationState,
        ctx: &mut Context<Self>,
    ) -> bool {
        let (changed, app_type) = {
            let app = match &mut self.app {
                Some(app)
                    if app.is_running && app.id == msg.app_id =>
                {
                    app
                }
                _ => return false,
            };
            let previous = app.state;
            if !app.set_state(msg.state) {
                info!(
                    "invalid state transition: {} -> {}",
                    previous, msg.state,
                );
                return false;
            }
            (previous != msg.state, app.app_type)
        };

        if changed {
            if msg.state == AppState::Background {
                self.callback.hide_application();
            } else {
                self.callback.show_application();
            }
        }
        if app_type == AppType::OpApp {
            if matches!(
                msg.state,
                AppState::Transient | AppState::OverlaidTransient,
            ) {
                self.start_transient_countdown(ctx);
            } else {
                self.cancel_transient_countdown(ctx);
            }
        }
        true
    }
}

/// ID of the running application, or [`INVALID_APP_ID`].
#[derive(Debug, Message)]
#[rtype(result = "u16")]
pub struct GetRunningAppId;

impl Handler<GetRunningAppId> for ApplicationManager {
    type Result = u16;

    fn handle(&mut self, _: GetRunningAppId, _: &mut Context<Self>) -> u16 {
        self.app
            .as_ref()
            .filter(|app| app.is_running)
            .map_or(INVALID_APP_ID, |app| app.id)
    }
}
