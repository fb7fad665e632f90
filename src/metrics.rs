//! [Prometheus][prometheus]用のメトリクス.
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, MetricBuilder};

/// `Allocator`のメトリクス.
///
/// 同じ`AllocatorBuilder`から生成された全ての`Allocator`(およびその私有化コピー)で共有される.
#[derive(Debug, Clone)]
pub struct AllocatorMetrics {
    pub(crate) allocations: Counter,
    pub(crate) allocated_bytes: Counter,
    pub(crate) privatized_copies: Counter,
    pub(crate) releases: Counter,
    pub(crate) released_bytes: Counter,
}
impl AllocatorMetrics {
    /// メモリブロックの確保回数.
    ///
    /// 私有化に伴うコピーも含まれる.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// cowkit_allocator_allocations_total <COUNTER>
    /// ```
    pub fn allocations(&self) -> u64 {
        self.allocations.value() as u64
    }

    /// これまでに確保されたバイト数の合計.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// cowkit_allocator_allocated_bytes_total <COUNTER>
    /// ```
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.value() as u64
    }

    /// 私有化(copy-on-write)によって複製が発生した回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// cowkit_allocator_privatized_copies_total <COUNTER>
    /// ```
    pub fn privatized_copies(&self) -> u64 {
        self.privatized_copies.value() as u64
    }

    /// 最後の参照が破棄されて解放されたメモリブロックの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// cowkit_allocator_releases_total <COUNTER>
    /// ```
    pub fn releases(&self) -> u64 {
        self.releases.value() as u64
    }

    /// これまでに解放されたバイト数の合計.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// cowkit_allocator_released_bytes_total <COUNTER>
    /// ```
    pub fn released_bytes(&self) -> u64 {
        self.released_bytes.value() as u64
    }

    /// 現在生存しているメモリブロックのバイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// cowkit_allocator_allocated_bytes_total - cowkit_allocator_released_bytes_total
    /// ```
    pub fn usage_bytes(&self) -> u64 {
        // NOTE: 以下の順番で値を取得しないとアンダーフローする可能性がある
        let dec = self.released_bytes();
        let inc = self.allocated_bytes();
        inc - dec
    }

    pub(crate) fn new(builder: &MetricBuilder) -> Self {
        let mut builder = builder.clone();
        builder.namespace("cowkit").subsystem("allocator");
        AllocatorMetrics {
            allocations: builder
                .counter("allocations_total")
                .help("Number of allocated memory blocks")
                .finish()
                .expect("Never fails"),
            allocated_bytes: builder
                .counter("allocated_bytes_total")
                .help("Number of bytes allocated for memory blocks")
                .finish()
                .expect("Never fails"),
            privatized_copies: builder
                .counter("privatized_copies_total")
                .help("Number of copies made by copy-on-write privatization")
                .finish()
                .expect("Never fails"),
            releases: builder
                .counter("releases_total")
                .help("Number of memory blocks released by dropping the last reference")
                .finish()
                .expect("Never fails"),
            released_bytes: builder
                .counter("released_bytes_total")
                .help("Number of bytes released")
                .finish()
                .expect("Never fails"),
        }
    }

    pub(crate) fn record_allocation(&self, bytes: usize) {
        self.allocations.increment();
        self.allocated_bytes.add_u64(bytes as u64);
    }

    pub(crate) fn record_release(&self, bytes: usize) {
        self.releases.increment();
        self.released_bytes.add_u64(bytes as u64);
    }
}
