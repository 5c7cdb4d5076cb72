use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Result;
use crate::resource::Resource;

/// Handle to a related object taking part in save/reload cascades.
#[async_trait]
pub trait Association: Send + Sync {
    async fn save(&self) -> Result<bool>;

    async fn reload(&self) -> Result<()>;

    /// Stable identity of the underlying object; two handles to the same
    /// object report the same value.
    fn identity(&self) -> usize;
}

#[async_trait]
impl Association for Resource {
    async fn save(&self) -> Result<bool> {
        Resource::save(self).await
    }

    async fn reload(&self) -> Result<()> {
        Resource::reload(self).await
    }

    fn identity(&self) -> usize {
        self.identity_ptr()
    }
}

/// Outgoing edges of one resource in the association graph, in insertion
/// order, at most one per related object.
#[derive(Clone, Default)]
pub struct AssociationList {
    edges: Vec<Arc<dyn Association>>,
}

impl AssociationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edge: Arc<dyn Association>) -> bool {
        let identity = edge.identity();
        if self.edges.iter().any(|existing| existing.identity() == identity) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn Association>> {
        self.edges.clone()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        id: usize,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl Association for Counter {
        async fn save(&self) -> Result<bool> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn reload(&self) -> Result<()> {
            Ok(())
        }

        fn identity(&self) -> usize {
            self.id
        }
    }

    fn counter(id: usize) -> Arc<Counter> {
        Arc::new(Counter {
            id,
            saves: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_push_keeps_insertion_order_and_skips_duplicates() {
        let mut list = AssociationList::new();
        assert!(list.push(counter(2)));
        assert!(list.push(counter(1)));
        assert!(!list.push(counter(2)));

        let order: Vec<usize> = list.snapshot().iter().map(|edge| edge.identity()).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_edges_are_shared_handles() {
        let edge = counter(7);
        let mut list = AssociationList::new();
        list.push(edge.clone());

        for linked in list.snapshot() {
            assert!(tokio_test::block_on(linked.save()).unwrap());
        }
        assert_eq!(edge.saves.load(Ordering::SeqCst), 1);
    }
}
