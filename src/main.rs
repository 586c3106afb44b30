//! Iris server binary: boots the configuration, the logger, the
//! application manager and the JSON-RPC WebSocket service.
//!
//! The browser and platform collaborators are stand-ins here; an
//! embedding integrates the middleware by replacing them with glue to
//! its renderer, broadcast stack and settings store.

use std::io;

use actix::Actor as _;
use dotenv::dotenv;
use iris::{
    api::rpc::{server, DefaultPlatform, RpcService},
    apps::{ApplicationManager, SessionCallback},
    log::{self, prelude::*},
    Conf,
};

/// Stand-in [`SessionCallback`] logging every browser interaction.
struct HostStub;

impl SessionCallback for HostStub {
    fn load_application(&self, app_id: u16, entry_url: &str) {
        info!("browser: load app {} from {}", app_id, entry_url);
    }

    fn show_application(&self) {
        debug!("browser: show application");
    }

    fn hide_application(&self) {
        debug!("browser: hide application");
    }

    fn stop_broadcast(&self) {
        debug!("broadcast: stop");
    }

    fn reset_broadcast_presentation(&self) {
        debug!("broadcast: reset presentation");
    }

    fn dispatch_application_load_error(&self) {
        warn!("browser: dispatch ApplicationLoadError");
    }

    fn dispatch_transitioned_to_broadcast_related(&self) {
        debug!("browser: dispatch TransitionedToBroadcastRelated");
    }

    fn dispatch_application_scheme_updated(&self, app_id: u16, scheme: &str) {
        debug!("browser: app {} scheme updated to {}", app_id, scheme);
    }

    fn get_xml_ait_contents(&self, url: &str) -> String {
        debug!("browser: fetch XML AIT candidate {}", url);
        String::new()
    }

    fn parental_control_age(&self) -> u8 {
        18
    }

    fn parental_control_region(&self) -> String {
        "GB".to_owned()
    }

    fn parental_control_region3(&self) -> String {
        "GBR".to_owned()
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();

    let conf = Conf::parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let _log_guard = log::init(conf.log.level());
    info!("starting with {:?}", conf);

    let _manager = ApplicationManager::new(
        Box::new(HostStub),
        conf.lifecycle.ait_timeout,
    )
    .start();
    let service = RpcService::new(Box::new(DefaultPlatform)).start();

    server::run(&conf, service).await
}
