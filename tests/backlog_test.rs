use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use webshop_search::backlog::{BacklogStore, EntityRef, InMemoryBacklog, SledBacklog};

fn products(ids: impl IntoIterator<Item = i64>) -> Vec<EntityRef> {
    ids.into_iter().map(EntityRef::product).collect()
}

/// Behavior every backlog backend must share
async fn test_backlog_operations<S: BacklogStore + 'static>(backlog: Arc<S>) {
    // Enqueue is a no-op for entities already pending
    assert_eq!(backlog.enqueue(&products(1..=4)).await.unwrap(), 4);
    assert_eq!(backlog.enqueue(&products([2, 3])).await.unwrap(), 0);
    assert_eq!(backlog.count().await.unwrap(), 4);

    // Draining claims the oldest entries
    let batch = backlog.drain(2).await.unwrap();
    let ids: Vec<i64> = batch.iter().map(|e| e.entity_id).collect();
    assert_eq!(ids, vec![1, 2]);

    // Claimed entries stay counted but are not drained again
    assert_eq!(backlog.count().await.unwrap(), 4);
    let rest = backlog.drain(10).await.unwrap();
    let ids: Vec<i64> = rest.iter().map(|e| e.entity_id).collect();
    assert_eq!(ids, vec![3, 4]);

    // Confirm removes, release puts back
    assert_eq!(backlog.confirm(&batch).await.unwrap(), 2);
    backlog.release(&rest).await.unwrap();
    assert_eq!(backlog.count().await.unwrap(), 2);

    let again = backlog.drain(10).await.unwrap();
    assert_eq!(again.len(), 2);
    assert_eq!(backlog.confirm(&again).await.unwrap(), 2);
    assert_eq!(backlog.count().await.unwrap(), 0);
}

/// A mutation that lands while its entity is in flight must not be lost
async fn test_mutation_during_push<S: BacklogStore + 'static>(backlog: Arc<S>) {
    backlog.enqueue(&products([9])).await.unwrap();
    let in_flight = backlog.drain(10).await.unwrap();
    assert_eq!(in_flight.len(), 1);

    // The entity changes while its old state is being pushed
    assert_eq!(backlog.enqueue(&products([9])).await.unwrap(), 1);
    assert_eq!(backlog.count().await.unwrap(), 2);

    // The successor waits for the in-flight entry
    assert!(backlog.drain(10).await.unwrap().is_empty());

    assert_eq!(backlog.confirm(&in_flight).await.unwrap(), 1);
    let successor = backlog.drain(10).await.unwrap();
    assert_eq!(successor.len(), 1);
    assert_eq!(successor[0].entity_id, 9);
    assert_ne!(successor[0].seq, in_flight[0].seq);

    backlog.confirm(&successor).await.unwrap();
    assert_eq!(backlog.count().await.unwrap(), 0);
}

/// Claims lapse so a crashed worker's batch is picked up again
async fn test_lease_expiry<S: BacklogStore + 'static>(backlog: Arc<S>) {
    backlog.enqueue(&products([1, 2])).await.unwrap();
    let first = backlog.drain(10).await.unwrap();
    assert_eq!(first.len(), 2);
    assert!(backlog.drain(10).await.unwrap().is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let reclaimed = backlog.drain(10).await.unwrap();
    assert_eq!(reclaimed, first);
}

#[tokio::test]
async fn test_in_memory_backlog() {
    test_backlog_operations(Arc::new(InMemoryBacklog::new())).await;
    test_mutation_during_push(Arc::new(InMemoryBacklog::new())).await;
    test_lease_expiry(Arc::new(InMemoryBacklog::with_lease(Duration::milliseconds(100)))).await;
}

#[tokio::test]
async fn test_sled_backlog() {
    let temp_dir = TempDir::new().unwrap();
    test_backlog_operations(Arc::new(SledBacklog::new(temp_dir.path().join("ops")).unwrap())).await;
    test_mutation_during_push(Arc::new(SledBacklog::new(temp_dir.path().join("succ")).unwrap())).await;
    test_lease_expiry(Arc::new(
        SledBacklog::with_lease(temp_dir.path().join("lease"), Duration::milliseconds(100)).unwrap(),
    ))
    .await;
}

#[tokio::test]
async fn test_sled_backlog_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("backlog");

    {
        let backlog = SledBacklog::new(&path).unwrap();
        backlog.enqueue(&products([3, 1, 2])).await.unwrap();
        backlog.flush().await.unwrap();
    }

    let backlog = SledBacklog::new(&path).unwrap();
    assert_eq!(backlog.count().await.unwrap(), 3);

    // Insertion order survives the reopen
    let ids: Vec<i64> = backlog
        .drain(10)
        .await
        .unwrap()
        .iter()
        .map(|e| e.entity_id)
        .collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

#[tokio::test]
async fn test_concurrent_drains_claim_disjoint_entries() {
    let temp_dir = TempDir::new().unwrap();
    let backlog = Arc::new(SledBacklog::new(temp_dir.path().join("backlog")).unwrap());
    backlog.enqueue(&products(1..=200)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let backlog = backlog.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            loop {
                let batch = backlog.drain(7).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                claimed.extend(batch.into_iter().map(|e| e.entity_id));
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for id in handle.await.unwrap() {
            total += 1;
            assert!(seen.insert(id), "entity {} claimed twice", id);
        }
    }
    assert_eq!(total, 200);
}

#[tokio::test]
async fn test_clear() {
    let backlog = InMemoryBacklog::new();
    backlog.enqueue(&products(1..=3)).await.unwrap();
    backlog.clear().await.unwrap();
    assert_eq!(backlog.count().await.unwrap(), 0);
    assert!(backlog.drain(10).await.unwrap().is_empty());
}
