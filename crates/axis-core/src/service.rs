use std::sync::Arc;

use anyhow::Result;
use axis_engine::{Engine, HealthVerdict, Recap, TransferInsight};
use axis_schema::{BusMessage, Event, SessionKind};
use axis_store::{EventStore, WindowQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Pulls a fresh window from the store and runs the engine on it. Holds no
/// cached results; every call re-reads.
pub struct RecapService {
    store: Arc<EventStore>,
    engine: Engine,
    window_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexExport {
    pub axis: String,
    pub owner_label: String,
    pub subject: Option<String>,
    pub recap: Recap,
    pub recent_events: Vec<Event>,
    pub generated_at: DateTime<Utc>,
}

impl RecapService {
    pub fn new(store: Arc<EventStore>, engine: Engine, window_size: usize) -> Self {
        Self {
            store,
            engine,
            window_size,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Fills in the default window size when the caller did not bound it.
    pub fn bounded(&self, query: &WindowQuery) -> WindowQuery {
        let mut query = query.clone();
        if query.limit.is_none() {
            query.limit = Some(self.window_size);
        }
        query
    }

    pub async fn window(&self, query: &WindowQuery) -> Result<Vec<Event>> {
        self.store.window(&self.bounded(query)).await
    }

    pub async fn recap(&self, query: &WindowQuery) -> Result<Recap> {
        let window = self.window(query).await?;
        Ok(self.engine.recap(&window))
    }

    pub async fn health(&self, query: &WindowQuery) -> Result<HealthVerdict> {
        let window = self.window(query).await?;
        Ok(self.engine.evaluate(&window))
    }

    /// Compare the practice and game windows for one outcome.
    pub async fn transfer(&self, query: &WindowQuery, outcome: &str) -> Result<TransferInsight> {
        let practice = self
            .window(&query.clone().session(SessionKind::Practice))
            .await?;
        let game = self.window(&query.clone().session(SessionKind::Game)).await?;
        Ok(self.engine.transfer(&practice, &game, outcome))
    }

    pub async fn export_index(&self, query: &WindowQuery, owner_label: &str) -> Result<IndexExport> {
        let recap = self.recap(query).await?;
        let mut recent = self.store.recent(&self.bounded(query)).await?;
        recent.truncate(25);
        Ok(IndexExport {
            axis: "AXIS LIVE".to_string(),
            owner_label: owner_label.to_string(),
            subject: query.subject.clone(),
            recap,
            recent_events: recent,
            generated_at: Utc::now(),
        })
    }

    /// Recompute on every bus message until the channel closes. Messages for
    /// other subjects are skipped. A failed re-read is logged and the previous
    /// recap stays on screen.
    pub async fn watch<F>(
        &self,
        mut rx: mpsc::Receiver<BusMessage>,
        query: WindowQuery,
        mut on_recap: F,
    ) -> Result<()>
    where
        F: FnMut(Recap),
    {
        on_recap(self.recap(&query).await?);

        while let Some(msg) = rx.recv().await {
            if !concerns(&msg, query.subject.as_deref()) {
                continue;
            }
            match self.recap(&query).await {
                Ok(recap) => on_recap(recap),
                Err(e) => tracing::warn!("recap refresh failed, keeping previous: {e:#}"),
            }
        }
        Ok(())
    }
}

fn concerns(msg: &BusMessage, subject: Option<&str>) -> bool {
    let Some(subject) = subject else {
        return true;
    };
    match msg {
        BusMessage::EventLogged { event } => event.subject.as_deref() == Some(subject),
        // pollers cannot see who a deleted row belonged to
        BusMessage::EventRemoved { subject: None, .. } => true,
        BusMessage::EventRemoved {
            subject: Some(removed),
            ..
        } => removed == subject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_filter_on_messages() {
        let logged = BusMessage::EventLogged {
            event: Event::new(1, Utc::now()).with_subject("cole"),
        };
        assert!(concerns(&logged, None));
        assert!(concerns(&logged, Some("cole")));
        assert!(!concerns(&logged, Some("hailey")));

        let unknown = BusMessage::EventRemoved {
            id: None,
            subject: None,
        };
        assert!(concerns(&unknown, Some("cole")));

        let other = BusMessage::EventRemoved {
            id: Some(2),
            subject: Some("rocket".into()),
        };
        assert!(!concerns(&other, Some("cole")));
    }
}
