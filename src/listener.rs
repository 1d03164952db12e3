use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::SyncSender,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, error, trace, warn};

use crate::error::XrMonitorManagerError;
use crate::state::XrMonitorAction;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Server side change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrChangeEvent {
    ScreenChanged,
    CrtcChanged,
    OutputChanged,
    Other,
}

/// A subscription to change notifications
pub trait XrChangeEventSource: Send + 'static {
    fn subscribe(&self) -> Result<(), XrMonitorManagerError>;

    /// Waits up to `timeout`, `Ok(None)` when nothing arrived
    fn next_change_event(
        &self,
        timeout: Duration,
    ) -> Result<Option<XrChangeEvent>, XrMonitorManagerError>;
}

/// Background thread turning screen changes into refresh requests
///
/// The listener never reads the topology. It only sends
/// [`XrMonitorAction::Refresh`] to whoever owns the session.
pub struct XrEventListener {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl XrEventListener {
    /// Spawn the listener thread
    ///
    /// A failed subscription is logged and ends the thread, the rest of the
    /// program keeps working without live updates.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::mpsc::sync_channel;
    /// use xrx_monitors::{RandrClient, XrEventListener, XrMonitorAction};
    ///
    /// let client = RandrClient::connect(None).unwrap();
    /// let (tx, rx) = sync_channel::<XrMonitorAction>(16);
    /// let listener = XrEventListener::spawn(client.event_source(), tx).unwrap();
    /// ```
    pub fn spawn<S, T>(source: S, emitter: SyncSender<T>) -> std::io::Result<Self>
    where
        S: XrChangeEventSource,
        T: From<XrMonitorAction> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("xrx-listener".into())
            .spawn(move || listen(&source, &emitter, &flag))?;
        Ok(Self { stop, handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the thread to exit and wait for it
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

fn listen<S, T>(source: &S, emitter: &SyncSender<T>, stop: &AtomicBool)
where
    S: XrChangeEventSource,
    T: From<XrMonitorAction>,
{
    if let Err(e) = source.subscribe() {
        warn!("live updates disabled, could not subscribe: {e}");
        return;
    }
    debug!("subscribed to screen change notifications");

    while !stop.load(Ordering::Relaxed) {
        let event = match source.next_change_event(POLL_INTERVAL) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                error!("lost the event connection: {e}");
                return;
            }
        };

        match event {
            XrChangeEvent::ScreenChanged => {
                if emitter.send(XrMonitorAction::Refresh.into()).is_err() {
                    debug!("refresh receiver dropped, listener exiting");
                    return;
                }
            }
            XrChangeEvent::CrtcChanged
            | XrChangeEvent::OutputChanged
            | XrChangeEvent::Other => {
                trace!(?event, "ignored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::sync_channel;

    use super::*;
    use crate::mock::MockChangeEventSource;

    #[test]
    fn only_screen_changes_request_refresh() {
        let source = MockChangeEventSource::new(vec![
            Ok(XrChangeEvent::CrtcChanged),
            Ok(XrChangeEvent::ScreenChanged),
            Ok(XrChangeEvent::OutputChanged),
            Ok(XrChangeEvent::Other),
            Ok(XrChangeEvent::ScreenChanged),
        ]);
        let (tx, rx) = sync_channel::<XrMonitorAction>(8);
        let listener = XrEventListener::spawn(source, tx).unwrap();

        let timeout = Duration::from_secs(2);
        assert_eq!(rx.recv_timeout(timeout), Ok(XrMonitorAction::Refresh));
        assert_eq!(rx.recv_timeout(timeout), Ok(XrMonitorAction::Refresh));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        listener.stop();
    }

    #[test]
    fn failed_subscription_ends_the_thread() {
        let source = MockChangeEventSource::failing_subscribe();
        let (tx, rx) = sync_channel::<XrMonitorAction>(8);
        let _listener = XrEventListener::spawn(source, tx).unwrap();

        // the sender is dropped with the thread
        assert!(rx.recv().is_err());
    }

    #[test]
    fn broken_connection_ends_the_thread() {
        let source = MockChangeEventSource::new(vec![
            Ok(XrChangeEvent::ScreenChanged),
            Err(XrMonitorManagerError::QueryError("broken pipe".into())),
            Ok(XrChangeEvent::ScreenChanged),
        ]);
        let (tx, rx) = sync_channel::<XrMonitorAction>(8);
        let _listener = XrEventListener::spawn(source, tx).unwrap();

        assert_eq!(rx.recv(), Ok(XrMonitorAction::Refresh));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn stop_joins_an_idle_listener() {
        let source = MockChangeEventSource::new(Vec::new());
        let (tx, _rx) = sync_channel::<XrMonitorAction>(8);
        let listener = XrEventListener::spawn(source, tx).unwrap();
        assert!(!listener.is_finished());
        listener.stop();
    }
}
