use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axis_schema::BusMessage;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    EventLogged,
    EventRemoved,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::EventLogged, Topic::EventRemoved];

    pub fn from_message(msg: &BusMessage) -> Self {
        match msg {
            BusMessage::EventLogged { .. } => Topic::EventLogged,
            BusMessage::EventRemoved { .. } => Topic::EventRemoved,
        }
    }
}

type Subscriber = mpsc::Sender<BusMessage>;
type SubscriberMap = Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>;

/// Push channel for freshly written or removed rows.
pub struct EventBus {
    subscribers: SubscriberMap,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    /// One receiver for every topic, used by recap watchers.
    pub async fn subscribe_all(&self) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        for topic in Topic::ALL {
            subs.entry(topic).or_default().push(tx.clone());
        }
        rx
    }

    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        publish_to(&self.subscribers, msg).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BusPublisher {
    subscribers: SubscriberMap,
}

impl BusPublisher {
    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        publish_to(&self.subscribers, msg).await
    }
}

async fn publish_to(subscribers: &SubscriberMap, msg: BusMessage) -> Result<()> {
    let topic = Topic::from_message(&msg);
    let mut subs = subscribers.write().await;
    if let Some(list) = subs.get_mut(&topic) {
        list.retain(|tx| !tx.is_closed());
        for tx in list.iter() {
            if tx.try_send(msg.clone()).is_err() {
                tracing::debug!(?topic, "subscriber full, dropping bus message");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axis_schema::Event;
    use chrono::Utc;
    use tokio::time::{timeout, Duration};

    fn logged() -> BusMessage {
        BusMessage::EventLogged {
            event: Event::new(1, Utc::now()).with_outcome("GOOD"),
        }
    }

    #[tokio::test]
    async fn publish_to_no_subscribers_succeeds() {
        let bus = EventBus::new(8);
        assert!(bus.publish(logged()).await.is_ok());
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::EventLogged).await;

        bus.publish(logged()).await.unwrap();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, BusMessage::EventLogged { .. }));
    }

    #[tokio::test]
    async fn different_topics_no_crosstalk() {
        let bus = EventBus::new(8);
        let mut logged_rx = bus.subscribe(Topic::EventLogged).await;

        bus.publish(BusMessage::EventRemoved {
            id: Some(1),
            subject: None,
        })
        .await
        .unwrap();

        let received = timeout(Duration::from_millis(50), logged_rx.recv()).await;
        assert!(received.is_err());
    }

    #[tokio::test]
    async fn subscribe_all_sees_both_topics() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe_all().await;
        let publisher = bus.publisher();

        publisher.publish(logged()).await.unwrap();
        publisher
            .publish(BusMessage::EventRemoved {
                id: Some(1),
                subject: Some("cole".into()),
            })
            .await
            .unwrap();

        let first = timeout(Duration::from_millis(100), rx.recv()).await.unwrap();
        let second = timeout(Duration::from_millis(100), rx.recv()).await.unwrap();
        assert!(matches!(first, Some(BusMessage::EventLogged { .. })));
        assert!(matches!(second, Some(BusMessage::EventRemoved { .. })));
    }

    #[tokio::test]
    async fn channel_backpressure_drops_when_full() {
        let bus = EventBus::new(1);
        let mut rx = bus.subscribe(Topic::EventLogged).await;

        bus.publish(logged()).await.unwrap();
        bus.publish(logged()).await.unwrap();

        let first = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(first.is_ok());

        let second = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn closed_subscribers_are_pruned() {
        let bus = EventBus::new(4);
        let rx = bus.subscribe(Topic::EventLogged).await;
        drop(rx);

        bus.publish(logged()).await.unwrap();

        let subs = bus.subscribers.read().await;
        assert!(subs.get(&Topic::EventLogged).unwrap().is_empty());
    }
}
