//! Contract between the application manager and its host: the embedded
//! browser, the broadcast integration and the parental control module.

/// Collaborator interface consumed by the
/// [`ApplicationManager`](super::ApplicationManager).
///
/// Implementations are invoked from the manager's own execution context
/// and must not block: return quickly or enqueue work on another
/// executor.
pub trait SessionCallback: Send {
    /// Tells the browser to load an application. If the entry page fails
    /// to load, the browser reports back through
    /// `OnLoadApplicationFailed`.
    fn load_application(&self, app_id: u16, entry_url: &str);

    /// Tells the browser to show the loaded application.
    fn show_application(&self);

    /// Tells the browser to hide the loaded application.
    fn hide_application(&self);

    /// Tells the broadcast integration to stop presenting any broadcast
    /// component, equivalent to selecting a null service.
    fn stop_broadcast(&self);

    /// Tells the broadcast integration to reset any suspended
    /// presentation, video rectangle or component selection requested by
    /// the previous page.
    fn reset_broadcast_presentation(&self);

    /// Dispatches `ApplicationLoadError` to the loaded application.
    fn dispatch_application_load_error(&self);

    /// Dispatches `TransitionedToBroadcastRelated` to the loaded
    /// application.
    fn dispatch_transitioned_to_broadcast_related(&self);

    /// Dispatches a linked application scheme update for an application.
    fn dispatch_application_scheme_updated(&self, app_id: u16, scheme: &str);

    /// Fetches a URL that may be an XML AIT. An empty return means
    /// "treat the URL as an entry page".
    fn get_xml_ait_contents(&self, url: &str) -> String;

    fn parental_control_age(&self) -> u8;

    /// 2-letter ISO 3166-1 region code.
    fn parental_control_region(&self) -> String;

    /// 3-letter ISO 3166 region code.
    fn parental_control_region3(&self) -> String;
}
