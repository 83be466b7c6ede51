use std::time::Instant;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{CommandCallback, FanController, Icon};
use crate::config::BleConfig;
use crate::protocol::state::FanState;


#[derive(Debug, PartialEq, Eq)]
enum LinkEvent {
    Command(String),
    Subscribed,
    Unsubscribed,
    Failed,
}


/// Bluetooth LE peripheral transport.
///
/// Serves one GATT service with a writable command characteristic and a
/// readable, notifying status characteristic. Connected means at least one
/// central is subscribed to status notifications.
pub struct BleController {
    local_name: String,

    #[cfg_attr(not(feature = "ble"), allow(dead_code))]
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    status: watch::Sender<String>,
    task: Option<JoinHandle<()>>,

    callback: Option<CommandCallback>,
    subscribers: usize,
    failed: bool,

    published: Option<FanState>,
}

impl BleController {
    pub fn new(config: BleConfig, device_name: &str) -> Self {
        let local_name = if config.local_name.is_empty() {
            device_name.to_owned()
        } else {
            config.local_name
        };

        let (events_tx, events) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(FanState::new().to_json());

        Self {
            local_name,
            events_tx,
            events,
            status,
            task: None,
            callback: None,
            subscribers: 0,
            failed: false,
            published: None,
        }
    }

    fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Command(payload) => {
                debug!("ble: command {payload}");
                match self.callback.as_mut() {
                    Some(callback) => callback(&payload),
                    None => warn!("ble: no command callback registered"),
                }
            },
            LinkEvent::Subscribed => {
                self.subscribers += 1;
                if self.subscribers == 1 {
                    info!("ble: central subscribed");
                }
            },
            LinkEvent::Unsubscribed => {
                self.subscribers = self.subscribers.saturating_sub(1);
                if self.subscribers == 0 {
                    info!("ble: no subscribed centrals");
                }
            },
            LinkEvent::Failed => {
                self.failed = true;
                self.subscribers = 0;
            },
        }
    }
}

impl FanController for BleController {
    #[cfg(feature = "ble")]
    fn begin(&mut self) -> Result<()> {
        let task = tokio::spawn(gatt::serve(self.local_name.clone(), self.status.subscribe(), self.events_tx.clone()));

        info!("ble: advertising as {:?}", self.local_name);
        self.task = Some(task);

        Ok(())
    }

    #[cfg(not(feature = "ble"))]
    fn begin(&mut self) -> Result<()> {
        anyhow::bail!("cannot advertise as {:?}: built without BLE support", self.local_name)
    }

    fn set_command_callback(&mut self, callback: CommandCallback) {
        self.callback = Some(callback);
    }

    fn notify_status(&mut self, state: &FanState) {
        if self.published == Some(*state) {
            return;
        }

        // readers always see the latest value; notifications only go out while subscribed
        self.status.send_replace(state.to_json());
        self.published = Some(*state);
    }

    fn poll(&mut self, _now: Instant) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    fn is_connected(&self) -> bool {
        self.subscribers > 0
    }

    fn icon(&self) -> Icon {
        Icon::Ble
    }

    fn indicator_letter(&self) -> Option<char> {
        self.failed.then_some('E')
    }
}

impl Drop for BleController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}


#[cfg(feature = "ble")]
mod gatt {
    use bluer::adv::Advertisement;
    use bluer::gatt::local::{
        Application, Characteristic, CharacteristicNotifier, CharacteristicNotify, CharacteristicNotifyMethod,
        CharacteristicRead, CharacteristicWrite, CharacteristicWriteMethod, Service,
    };
    use bluer::Uuid;
    use futures::FutureExt;
    use log::{error, info};
    use tokio::sync::{mpsc, watch};

    use super::LinkEvent;

    const SERVICE_UUID: Uuid = Uuid::from_u128(0x4fafc201_1fb5_459e_8fcc_c5c9c331914b);
    const COMMAND_UUID: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26a8);
    const STATUS_UUID: Uuid = Uuid::from_u128(0xcba1d466_344c_4be3_ab3f_1890d5c0c0c0);

    pub async fn serve(local_name: String, status: watch::Receiver<String>, events: mpsc::UnboundedSender<LinkEvent>) {
        if let Err(err) = run(local_name, status, events.clone()).await {
            error!("ble: {err}");
            let _ = events.send(LinkEvent::Failed);
        }
    }

    async fn run(
        local_name: String,
        status: watch::Receiver<String>,
        events: mpsc::UnboundedSender<LinkEvent>
    ) -> bluer::Result<()> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;

        info!("ble: using adapter {} ({})", adapter.name(), adapter.address().await?);

        let advertisement = Advertisement {
            service_uuids: [SERVICE_UUID].into_iter().collect(),
            local_name: Some(local_name),
            discoverable: Some(true),
            ..Default::default()
        };
        let _advertisement = adapter.advertise(advertisement).await?;

        let command_events = events.clone();
        let read_status = status.clone();

        let application = Application {
            services: vec![Service {
                uuid: SERVICE_UUID,
                primary: true,
                characteristics: vec![
                    Characteristic {
                        uuid: COMMAND_UUID,
                        write: Some(CharacteristicWrite {
                            write: true,
                            write_without_response: true,
                            method: CharacteristicWriteMethod::Fun(Box::new(move |value, _request| {
                                let payload = String::from_utf8_lossy(&value).into_owned();
                                let _ = command_events.send(LinkEvent::Command(payload));
                                async { Ok(()) }.boxed()
                            })),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    Characteristic {
                        uuid: STATUS_UUID,
                        read: Some(CharacteristicRead {
                            read: true,
                            fun: Box::new(move |_request| {
                                let value = read_status.borrow().clone().into_bytes();
                                async move { Ok(value) }.boxed()
                            }),
                            ..Default::default()
                        }),
                        notify: Some(CharacteristicNotify {
                            notify: true,
                            method: CharacteristicNotifyMethod::Fun(Box::new(move |notifier| {
                                let session = notify_session(notifier, status.clone(), events.clone());
                                async move {
                                    tokio::spawn(session);
                                }.boxed()
                            })),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        let _application = adapter.serve_gatt_application(application).await?;

        // the handles unregister the service and advertisement when dropped
        std::future::pending::<()>().await;

        Ok(())
    }

    async fn notify_session(
        mut notifier: CharacteristicNotifier,
        mut status: watch::Receiver<String>,
        events: mpsc::UnboundedSender<LinkEvent>
    ) {
        if events.send(LinkEvent::Subscribed).is_err() {
            return;
        }

        let mut value = status.borrow_and_update().clone();

        loop {
            if notifier.notify(value.into_bytes()).await.is_err() {
                break;
            }

            tokio::select! {
                _ = notifier.stopped() => break,
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    value = status.borrow_and_update().clone();
                },
            }
        }

        let _ = events.send(LinkEvent::Unsubscribed);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CommandInbox;
    use crate::protocol::state::Mode;

    fn controller() -> (BleController, CommandInbox) {
        let inbox = CommandInbox::new();
        let mut ble = BleController::new(BleConfig::default(), "attic");
        ble.set_command_callback(inbox.callback());
        (ble, inbox)
    }

    #[test]
    fn test_local_name() {
        let (ble, _) = controller();
        assert_eq!(ble.local_name, "attic");

        let config = BleConfig { local_name: "porch fan".to_owned() };
        assert_eq!(BleController::new(config, "attic").local_name, "porch fan");
    }

    #[test]
    fn test_commands_forwarded_from_poll() {
        let (mut ble, inbox) = controller();

        ble.events_tx.send(LinkEvent::Command(r#"{"mode":"AUTO"}"#.to_owned())).unwrap();
        assert_eq!(inbox.pop(), None, "nothing before poll");

        ble.poll(Instant::now());
        assert_eq!(inbox.pop().as_deref(), Some(r#"{"mode":"AUTO"}"#));
    }

    #[test]
    fn test_connected_while_subscribed() {
        let (mut ble, _) = controller();
        assert!(!ble.is_connected());

        ble.handle_event(LinkEvent::Subscribed);
        ble.handle_event(LinkEvent::Subscribed);
        ble.handle_event(LinkEvent::Unsubscribed);
        assert!(ble.is_connected());

        ble.handle_event(LinkEvent::Unsubscribed);
        ble.handle_event(LinkEvent::Unsubscribed);
        assert!(!ble.is_connected());
        assert_eq!(ble.icon(), Icon::Ble);
    }

    #[test]
    fn test_status_only_changes() {
        let (mut ble, _) = controller();
        let mut reader = ble.status.subscribe();

        let mut state = FanState::new();
        ble.notify_status(&state);
        assert!(reader.has_changed().unwrap());
        reader.borrow_and_update();

        ble.notify_status(&state);
        assert!(!reader.has_changed().unwrap());

        state.set_mode(Mode::Manual);
        ble.notify_status(&state);
        assert!(reader.has_changed().unwrap());
        assert_eq!(*reader.borrow_and_update(), state.to_json());
    }

    #[test]
    fn test_failure_indicator() {
        let (mut ble, _) = controller();
        assert_eq!(ble.indicator_letter(), None);

        ble.handle_event(LinkEvent::Subscribed);
        ble.handle_event(LinkEvent::Failed);
        assert_eq!(ble.indicator_letter(), Some('E'));
        assert!(!ble.is_connected());
    }

    #[cfg(not(feature = "ble"))]
    #[test]
    fn test_begin_without_support() {
        let (mut ble, _) = controller();
        let err = ble.begin().unwrap_err();
        assert!(err.to_string().contains("without BLE support"));
    }
}
