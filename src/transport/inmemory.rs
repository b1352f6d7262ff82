use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{record::ProducerRecord, transport::Sender};

/// In-memory producer for testing or local pipelines.
///
/// This sender stores records in a shared queue instead of talking to a
/// broker. It is useful for:
/// - Unit and integration testing
/// - Inspecting what a converter produces for a given envelope
/// - Debugging message flows
///
/// Clones share the same queue.
pub struct InMemory<K, V> {
    /// Shared record queue
    queue: Arc<Mutex<Vec<ProducerRecord<K, V>>>>,
}

impl<K, V> InMemory<K, V> {
    /// Return all records that have been "sent" and clear the internal queue.
    pub async fn sent_records(self) -> Vec<ProducerRecord<K, V>> {
        let mut queue = self.queue.lock_owned().await;
        std::mem::take(&mut *queue)
    }
}

impl<K, V> Clone for InMemory<K, V> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<K, V> Default for InMemory<K, V> {
    /// Create a new empty in-memory producer.
    fn default() -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait::async_trait]
impl<K, V> Sender for InMemory<K, V>
where
    K: std::fmt::Debug + Send,
    V: std::fmt::Debug + Send,
{
    type Key = K;
    type Value = V;
    type Error = std::convert::Infallible;

    /// "Send" a record by appending it to the in-memory queue.
    #[tracing::instrument(skip_all, fields(topic = %record.topic))]
    async fn send(&mut self, record: ProducerRecord<K, V>) -> Result<(), Self::Error> {
        tracing::info!(
            partition = ?record.partition,
            key = ?record.key,
            value = ?record.value,
            "Record sent to in-memory queue",
        );
        self.queue.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_the_queue() {
        let producer = InMemory::<String, String>::default();
        let mut handle = producer.clone();

        handle
            .send(ProducerRecord::to("orders").value("a".to_owned()))
            .await
            .unwrap();
        handle.send(ProducerRecord::to("orders")).await.unwrap();

        let records = producer.clone().sent_records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].value, None);

        assert!(producer.sent_records().await.is_empty());
    }
}
