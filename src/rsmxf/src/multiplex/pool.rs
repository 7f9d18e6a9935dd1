/// One content package's worth of per-element payloads, indexed the same
/// way as the multiplexer's element slots.
#[derive(Debug, Clone)]
pub struct ContentPackage {
    pub position: i64,
    pub elements: Vec<Option<Vec<u8>>>,
}

impl ContentPackage {
    fn new(element_count: usize) -> Self {
        ContentPackage {
            position: 0,
            elements: vec![None; element_count],
        }
    }

    fn reset(&mut self, position: i64, element_count: usize) {
        self.position = position;
        self.elements.clear();
        self.elements.resize(element_count, None);
    }

    pub fn is_complete(&self) -> bool {
        self.elements.iter().all(Option::is_some)
    }
}

/// Default cap, matching the index engine's unresolved-entry backlog
/// bound (§5, `IndexBacklog`) in spirit: a small bounded free-list rather
/// than unbounded growth.
pub const POOL_CAP: usize = 250;

/// Stack-backed free-list of `ContentPackage`s, owned exclusively by the
/// multiplexer. `acquire` pops a recycled package or allocates a new one;
/// `release` clears it and returns it to the pool, dropping it instead
/// once the pool is at capacity.
pub struct ContentPackagePool {
    free: Vec<ContentPackage>,
    cap: usize,
}

impl ContentPackagePool {
    pub fn new() -> Self {
        ContentPackagePool { free: Vec::new(), cap: POOL_CAP }
    }

    pub fn acquire(&mut self, position: i64, element_count: usize) -> ContentPackage {
        match self.free.pop() {
            Some(mut cp) => {
                cp.reset(position, element_count);
                cp
            }
            None => {
                let mut cp = ContentPackage::new(element_count);
                cp.position = position;
                cp
            }
        }
    }

    pub fn release(&mut self, cp: ContentPackage) {
        if self.free.len() < self.cap {
            self.free.push(cp);
        }
    }
}

impl Default for ContentPackagePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_packages_are_recycled() {
        let mut pool = ContentPackagePool::new();
        let cp = pool.acquire(0, 3);
        pool.release(cp);
        let cp2 = pool.acquire(1, 3);
        assert_eq!(cp2.position, 1);
        assert_eq!(cp2.elements.len(), 3);
        assert!(cp2.elements.iter().all(Option::is_none));
    }

    #[test]
    fn pool_drops_past_capacity() {
        let mut pool = ContentPackagePool { free: Vec::new(), cap: 2 };
        for i in 0..4 {
            pool.release(ContentPackage::new(1));
            let _ = i;
        }
        assert_eq!(pool.free.len(), 2);
    }
}
