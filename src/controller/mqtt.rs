use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::{CommandCallback, FanController, Icon};
use crate::config::MqttConfig;
use crate::protocol::state::FanState;


const KEEP_ALIVE: Duration = Duration::from_secs(15);
const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 10;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fault {
    Unreachable,
    Credentials,
}

#[derive(Debug, PartialEq, Eq)]
enum LinkEvent {
    Connected,
    Message(String),
    Disconnected(Fault),
}


/// Topics must be non-empty and free of whitespace.
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.chars().any(char::is_whitespace)
}


/// Broker transport.
///
/// Commands arrive on the command topic; the state is published (retained) on
/// the state topic whenever it changes and after every reconnect.
pub struct MqttController {
    config: MqttConfig,
    client_id: String,

    client: Option<AsyncClient>,
    events: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    task: Option<JoinHandle<()>>,

    callback: Option<CommandCallback>,
    connected: bool,
    fault: Option<Fault>,

    latest: Option<FanState>,
    published: Option<FanState>,
}

impl MqttController {
    pub fn new(config: MqttConfig, device_name: &str) -> Self {
        let client_id = if config.client_id.is_empty() {
            device_name.to_owned()
        } else {
            config.client_id.clone()
        };

        Self {
            config,
            client_id,
            client: None,
            events: None,
            task: None,
            callback: None,
            connected: false,
            fault: None,
            latest: None,
            published: None,
        }
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.config.host, self.config.port);

        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            options.set_credentials(username, password);
        }

        options
    }

    fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                info!("mqtt: connected to {}:{}", self.config.host, self.config.port);
                self.connected = true;
                self.fault = None;

                // retained state may be stale after a reconnect
                self.published = None;
            },
            LinkEvent::Disconnected(fault) => {
                if self.connected {
                    info!("mqtt: disconnected");
                }
                self.connected = false;
                self.fault = Some(fault);
            },
            LinkEvent::Message(payload) => {
                debug!("mqtt: command {payload}");
                match self.callback.as_mut() {
                    Some(callback) => callback(&payload),
                    None => warn!("mqtt: no command callback registered"),
                }
            }
        }
    }

    /// State that still has to be published, if any.
    fn unpublished(&self) -> Option<FanState> {
        match self.latest {
            Some(state) if self.connected && self.published != Some(state) => Some(state),
            _ => None,
        }
    }
}

impl FanController for MqttController {
    fn begin(&mut self) -> Result<()> {
        for topic in [&self.config.command_topic, &self.config.state_topic] {
            if !is_valid_topic(topic) {
                bail!("invalid mqtt topic {topic:?}");
            }
        }

        let (client, event_loop) = AsyncClient::new(self.mqtt_options(), REQUEST_CAPACITY);
        let (events_tx, events) = mpsc::unbounded_channel();

        let task = tokio::spawn(event_task(event_loop, client.clone(), self.config.command_topic.clone(), events_tx));

        info!("mqtt: connecting to {}:{} as {}", self.config.host, self.config.port, self.client_id);

        self.client = Some(client);
        self.events = Some(events);
        self.task = Some(task);

        Ok(())
    }

    fn set_command_callback(&mut self, callback: CommandCallback) {
        self.callback = Some(callback);
    }

    fn notify_status(&mut self, state: &FanState) {
        self.latest = Some(*state);
    }

    fn poll(&mut self, _now: Instant) {
        let mut received = Vec::new();
        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.try_recv() {
                received.push(event);
            }
        }

        for event in received {
            self.handle_event(event);
        }

        let (Some(state), Some(client)) = (self.unpublished(), self.client.as_ref()) else {
            return;
        };

        match client.try_publish(&self.config.state_topic, QoS::AtLeastOnce, true, state.to_json()) {
            Ok(()) => {
                debug!("mqtt: published {state}");
                self.published = Some(state);
            },
            Err(err) => warn!("mqtt: publish failed: {err}"),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn icon(&self) -> Icon {
        Icon::Broker
    }

    fn indicator_letter(&self) -> Option<char> {
        if self.connected {
            return None;
        }

        match self.fault {
            Some(Fault::Credentials) => Some('C'),
            _ => Some('R'),
        }
    }
}

impl Drop for MqttController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}


async fn event_task(
    mut event_loop: EventLoop,
    client: AsyncClient,
    command_topic: String,
    events: mpsc::UnboundedSender<LinkEvent>
) {
    let mut backoff = RECONNECT_MIN;

    loop {
        let event = match event_loop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                backoff = RECONNECT_MIN;

                if let Err(err) = client.try_subscribe(&command_topic, QoS::AtLeastOnce) {
                    error!("mqtt: failed to subscribe to {command_topic}: {err}");
                }

                LinkEvent::Connected
            },
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                if publish.topic != command_topic {
                    continue;
                }

                LinkEvent::Message(String::from_utf8_lossy(&publish.payload).into_owned())
            },
            Ok(_) => continue,
            Err(err) => {
                let fault = match err {
                    ConnectionError::ConnectionRefused(
                        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized
                    ) => Fault::Credentials,
                    _ => Fault::Unreachable,
                };

                warn!("mqtt: {err}, retrying in {backoff:?}");

                if events.send(LinkEvent::Disconnected(fault)).is_err() {
                    return;
                }

                sleep(backoff).await;
                backoff = (backoff * 2).min(RECONNECT_MAX);
                continue;
            }
        };

        if events.send(event).is_err() {
            return;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CommandInbox;
    use crate::protocol::state::Mode;

    fn controller() -> (MqttController, CommandInbox) {
        let inbox = CommandInbox::new();
        let mut mqtt = MqttController::new(MqttConfig::default(), "attic");
        mqtt.set_command_callback(inbox.callback());
        (mqtt, inbox)
    }

    #[test]
    fn test_topic_validation() {
        assert!(is_valid_topic("maxfan/state"));
        assert!(!is_valid_topic(""));
        assert!(!is_valid_topic("max fan/state"));
        assert!(!is_valid_topic("maxfan/state\n"));
    }

    #[test]
    fn test_begin_rejects_bad_topic() {
        let config = MqttConfig {
            command_topic: "fan\tcommand".to_owned(),
            ..Default::default()
        };

        let mut mqtt = MqttController::new(config, "attic");
        assert!(mqtt.begin().is_err());
        assert!(!mqtt.is_connected());
    }

    #[test]
    fn test_client_id_defaults_to_device_name() {
        let (mqtt, _) = controller();
        assert_eq!(mqtt.client_id, "attic");
    }

    #[test]
    fn test_indicator() {
        let (mut mqtt, _) = controller();
        assert_eq!(mqtt.indicator_letter(), Some('R'));

        mqtt.handle_event(LinkEvent::Disconnected(Fault::Credentials));
        assert_eq!(mqtt.indicator_letter(), Some('C'));

        mqtt.handle_event(LinkEvent::Connected);
        assert_eq!(mqtt.indicator_letter(), None);
        assert!(mqtt.is_connected());

        mqtt.handle_event(LinkEvent::Disconnected(Fault::Unreachable));
        assert_eq!(mqtt.indicator_letter(), Some('R'));
        assert!(!mqtt.is_connected());
    }

    #[test]
    fn test_messages_go_to_callback() {
        let (mut mqtt, inbox) = controller();

        mqtt.handle_event(LinkEvent::Message(r#"{"mode":"AUTO"}"#.to_owned()));
        assert_eq!(inbox.pop().as_deref(), Some(r#"{"mode":"AUTO"}"#));
    }

    #[test]
    fn test_publish_only_changes() {
        let (mut mqtt, _) = controller();
        let mut state = FanState::new();

        mqtt.notify_status(&state);
        assert_eq!(mqtt.unpublished(), None, "not connected yet");

        mqtt.handle_event(LinkEvent::Connected);
        assert_eq!(mqtt.unpublished(), Some(state));
        mqtt.published = Some(state);
        assert_eq!(mqtt.unpublished(), None);

        state.set_mode(Mode::Manual);
        mqtt.notify_status(&state);
        assert_eq!(mqtt.unpublished(), Some(state));
        mqtt.published = Some(state);

        // reconnecting republishes
        mqtt.handle_event(LinkEvent::Disconnected(Fault::Unreachable));
        mqtt.handle_event(LinkEvent::Connected);
        assert_eq!(mqtt.unpublished(), Some(state));
    }
}
